use log::debug;

use gatelink_shared::{EndpointKey, TravelerSnapshot};

use crate::{
    endpoint::{EndpointPolicy, LocalEndpoint, RouteTier},
    error::ReservationError,
    reservation::{
        filters::{filter_effects, filter_items},
        reservation::ArrivalPlan,
    },
    world::{nodes, Economy, Permissions},
};

fn check_pin(policy: &EndpointPolicy, traveler: &TravelerSnapshot) -> Result<(), ReservationError> {
    if !policy.require_pin {
        return Ok(());
    }
    let Some(pin) = traveler.pin() else {
        return Err(ReservationError::PinRequired);
    };
    if policy.require_valid_pin && !policy.pins.contains(pin) {
        return Err(ReservationError::InvalidPin);
    }
    Ok(())
}

fn check_funds(
    economy: &dyn Economy,
    player: &str,
    cost: f64,
) -> Result<(), ReservationError> {
    if cost > 0.0 && !economy.can_afford(player, cost) {
        return Err(ReservationError::InsufficientFunds {
            cost: economy.format(cost),
        });
    }
    Ok(())
}

/// Checks run on the sending side before anything moves. Returns the cost
/// to charge the traveler once the crossing lands.
///
/// The destination's receive cost is included only when the destination is
/// hosted here, so a remote destination never charges twice.
pub fn check_departure(
    traveler: &TravelerSnapshot,
    departure: Option<&LocalEndpoint>,
    arrival_key: &EndpointKey,
    local_arrival: Option<&LocalEndpoint>,
    tier: RouteTier,
    permissions: &dyn Permissions,
    economy: &dyn Economy,
) -> Result<f64, ReservationError> {
    let Some(player) = traveler.player_name() else {
        return Ok(0.0);
    };
    let mut cost = 0.0;
    if let Some(departure) = departure {
        if !permissions.has(player, &nodes::use_endpoint(departure.key())) {
            return Err(ReservationError::NotPermitted);
        }
        check_pin(&departure.policy, traveler)?;
        cost += departure.policy.costs.send(tier);
    }
    if let Some(arrival) = local_arrival {
        cost += arrival.policy.costs.receive(tier);
    }
    check_funds(economy, player, cost)?;
    if let Some(departure) = departure {
        if !permissions.has(player, &nodes::route(departure.key(), arrival_key)) {
            return Err(ReservationError::RouteDenied);
        }
    }
    debug!("departure checks passed for {} towards {}", player, arrival_key);
    Ok(cost)
}

/// Checks run by the process hosting the arrival endpoint. Only charges a
/// receive cost when `charge_receive` is set.
pub fn check_arrival(
    traveler: &TravelerSnapshot,
    arrival: &LocalEndpoint,
    tier: RouteTier,
    charge_receive: bool,
    permissions: &dyn Permissions,
    economy: &dyn Economy,
) -> Result<ArrivalPlan, ReservationError> {
    let policy = &arrival.policy;
    let mut plan = ArrivalPlan::default();

    if let Some(player) = traveler.player_name() {
        if !permissions.has(player, &nodes::receive(arrival.key())) {
            return Err(ReservationError::NotPermitted);
        }
        check_pin(policy, traveler)?;
        if !policy.accepts_game_mode(traveler.game_mode()) {
            return Err(ReservationError::GameModeNotAllowed);
        }
        if charge_receive {
            plan.receive_cost = policy.costs.receive(tier);
            check_funds(economy, player, plan.receive_cost)?;
        }
    }

    let inventory = filter_items(&policy.items, &traveler.inventory);
    let armor = filter_items(&policy.items, &traveler.armor);
    if policy.require_allowed_items {
        if let Some(item) = inventory.rejected.first().or(armor.rejected.first()) {
            return Err(ReservationError::ItemNotAllowed { item: item.clone() });
        }
    }
    let effects = filter_effects(&policy.effects, &traveler.effects);
    if policy.require_allowed_effects {
        if let Some(effect) = effects.rejected.first() {
            return Err(ReservationError::EffectNotAllowed {
                effect: effect.clone(),
            });
        }
    }

    plan.items_changed = inventory.changed() || armor.changed();
    plan.effects_changed = effects.changed();
    plan.notices.extend(inventory.notices("item"));
    plan.notices.extend(armor.notices("armor"));
    plan.notices.extend(effects.notices("effect"));
    plan.inventory = inventory.kept;
    plan.armor = armor.kept;
    plan.effects = effects.kept;
    Ok(plan)
}
