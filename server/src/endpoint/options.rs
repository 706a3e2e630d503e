use std::collections::BTreeSet;

use gatelink_shared::GameMode;

use crate::{
    endpoint::{endpoint::LocalEndpoint, gate::GateOptions, policy::EndpointPolicy},
    error::GateError,
};

/// Option names understood by `GateOptions::get`/`set`.
pub const GATE_OPTIONS: [&str; 11] = [
    "duration",
    "randomNextLink",
    "sendNextLink",
    "restoreOnClose",
    "multiLink",
    "linkLocal",
    "linkWorld",
    "linkServer",
    "protect",
    "sendLightning",
    "receiveLightning",
];

/// Option names understood by `EndpointPolicy::get`/`set`.
pub const POLICY_OPTIONS: [&str; 13] = [
    "requirePin",
    "requireValidPin",
    "requireAllowedItems",
    "requireAllowedPotions",
    "receiveInventory",
    "receiveGameMode",
    "allowGameModes",
    "receiveXP",
    "receivePotions",
    "receiveStats",
    "deleteInventory",
    "hidden",
    "pins",
];

fn canonical<'a>(names: &[&'a str], name: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
        .copied()
}

fn unknown(name: &str) -> GateError {
    GateError::UnknownOption {
        name: name.to_string(),
    }
}

fn invalid(name: &str, value: &str) -> GateError {
    GateError::InvalidOptionValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, GateError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

fn parse_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && *entry != "*")
}

fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl GateOptions {
    pub fn get(&self, name: &str) -> Result<String, GateError> {
        let value = match canonical(&GATE_OPTIONS, name).ok_or_else(|| unknown(name))? {
            "duration" => self.duration.to_string(),
            "randomNextLink" => self.random_next_link.to_string(),
            "sendNextLink" => self.send_next_link.to_string(),
            "restoreOnClose" => self.restore_on_close.to_string(),
            "multiLink" => self.multi_link.to_string(),
            "linkLocal" => self.link_local.to_string(),
            "linkWorld" => self.link_world.to_string(),
            "linkServer" => self.link_server.to_string(),
            "protect" => self.protect.to_string(),
            "sendLightning" => self.send_lightning.to_string(),
            "receiveLightning" => self.receive_lightning.to_string(),
            _ => return Err(unknown(name)),
        };
        Ok(value)
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<(), GateError> {
        let name = canonical(&GATE_OPTIONS, name).ok_or_else(|| unknown(name))?;
        if name == "duration" {
            self.duration = value.trim().parse().map_err(|_| invalid(name, value))?;
            return Ok(());
        }
        let flag = parse_bool(name, value)?;
        let field = match name {
            "randomNextLink" => &mut self.random_next_link,
            "sendNextLink" => &mut self.send_next_link,
            "restoreOnClose" => &mut self.restore_on_close,
            "multiLink" => &mut self.multi_link,
            "linkLocal" => &mut self.link_local,
            "linkWorld" => &mut self.link_world,
            "linkServer" => &mut self.link_server,
            "protect" => &mut self.protect,
            "sendLightning" => &mut self.send_lightning,
            "receiveLightning" => &mut self.receive_lightning,
            _ => return Err(unknown(name)),
        };
        *field = flag;
        Ok(())
    }
}

impl EndpointPolicy {
    pub fn get(&self, name: &str) -> Result<String, GateError> {
        let value = match canonical(&POLICY_OPTIONS, name).ok_or_else(|| unknown(name))? {
            "requirePin" => self.require_pin.to_string(),
            "requireValidPin" => self.require_valid_pin.to_string(),
            "requireAllowedItems" => self.require_allowed_items.to_string(),
            "requireAllowedPotions" => self.require_allowed_effects.to_string(),
            "receiveInventory" => self.receive_inventory.to_string(),
            "receiveGameMode" => self.receive_game_mode.to_string(),
            "allowGameModes" => join(self.allow_game_modes.iter()),
            "receiveXP" => self.receive_xp.to_string(),
            "receivePotions" => self.receive_effects.to_string(),
            "receiveStats" => self.receive_stats.to_string(),
            "deleteInventory" => self.delete_inventory.to_string(),
            "hidden" => self.hidden.to_string(),
            "pins" => join(self.pins.iter()),
            _ => return Err(unknown(name)),
        };
        Ok(value)
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<(), GateError> {
        let name = canonical(&POLICY_OPTIONS, name).ok_or_else(|| unknown(name))?;
        match name {
            "allowGameModes" => {
                let modes = parse_list(value)
                    .map(|mode| mode.parse::<GameMode>().map_err(|_| invalid(name, value)))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                self.allow_game_modes = modes;
                return Ok(());
            }
            "pins" => {
                self.pins = parse_list(value).map(str::to_string).collect();
                return Ok(());
            }
            _ => {}
        }
        let flag = parse_bool(name, value)?;
        let field = match name {
            "requirePin" => &mut self.require_pin,
            "requireValidPin" => &mut self.require_valid_pin,
            "requireAllowedItems" => &mut self.require_allowed_items,
            "requireAllowedPotions" => &mut self.require_allowed_effects,
            "receiveInventory" => &mut self.receive_inventory,
            "receiveGameMode" => &mut self.receive_game_mode,
            "receiveXP" => &mut self.receive_xp,
            "receivePotions" => &mut self.receive_effects,
            "receiveStats" => &mut self.receive_stats,
            "deleteInventory" => &mut self.delete_inventory,
            "hidden" => &mut self.hidden,
            _ => return Err(unknown(name)),
        };
        *field = flag;
        Ok(())
    }
}

impl LocalEndpoint {
    /// Reads a named option from the gate options or the policy.
    pub fn option(&self, name: &str) -> Result<String, GateError> {
        if canonical(&GATE_OPTIONS, name).is_some() {
            return match self.gate() {
                Some(gate) => gate.options.get(name),
                None => Err(GateError::NotAGate {
                    name: self.key().to_string(),
                }),
            };
        }
        self.policy.get(name)
    }

    /// Sets a named option and marks the endpoint dirty.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), GateError> {
        if canonical(&GATE_OPTIONS, name).is_some() {
            let key = self.key().to_string();
            let gate = self
                .gate_mut()
                .ok_or(GateError::NotAGate { name: key })?;
            gate.options.set(name, value)?;
        } else {
            self.policy.set(name, value)?;
        }
        self.mark_dirty();
        Ok(())
    }
}
