use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};

use gatelink_shared::{BlockCoord, BlockState, Direction, EndpointKey, Instant};

use crate::endpoint::footprint::BlockFootprint;

/// Gate-only options. Traveler policy lives in `EndpointPolicy`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateOptions {
    /// Milliseconds a gate stays open once nothing holds it; below 1 means
    /// it stays open until it has neither a destination nor inbound gates.
    pub duration: i64,
    pub random_next_link: bool,
    /// Advance to the next link after every successful send
    pub send_next_link: bool,
    pub restore_on_close: bool,
    pub multi_link: bool,
    pub link_local: bool,
    pub link_world: bool,
    pub link_server: bool,
    pub protect: bool,
    pub send_lightning: bool,
    pub receive_lightning: bool,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            duration: -1,
            random_next_link: false,
            send_next_link: false,
            restore_on_close: false,
            multi_link: true,
            link_local: true,
            link_world: true,
            link_server: true,
            protect: false,
            send_lightning: false,
            receive_lightning: false,
        }
    }
}

/// Facts about the rest of the link graph needed to decide auto-close.
#[derive(Clone, Copy, Debug)]
pub struct CloseContext {
    pub now: Instant,
    pub grace: Duration,
    /// The selected destination currently resolves
    pub outgoing_valid: bool,
    /// The destination selects us and we are its only inbound gate
    pub partner_mutual: bool,
}

/// Link list, attachment set and open state of a portal gate.
#[derive(Clone, Debug)]
pub struct Gate {
    pub direction: Direction,
    pub design: String,
    pub options: GateOptions,
    pub footprint: BlockFootprint,
    links: Vec<EndpointKey>,
    outgoing: Option<EndpointKey>,
    incoming: BTreeSet<EndpointKey>,
    portal_open: bool,
    opened_at: Option<Instant>,
    saved_blocks: Vec<(BlockCoord, BlockState)>,
}

impl Gate {
    pub fn new(
        direction: Direction,
        design: impl Into<String>,
        options: GateOptions,
        footprint: BlockFootprint,
    ) -> Self {
        Self {
            direction,
            design: design.into(),
            options,
            footprint,
            links: Vec::new(),
            outgoing: None,
            incoming: BTreeSet::new(),
            portal_open: false,
            opened_at: None,
            saved_blocks: Vec::new(),
        }
    }

    pub fn links(&self) -> &[EndpointKey] {
        &self.links
    }

    pub fn outgoing(&self) -> Option<&EndpointKey> {
        self.outgoing.as_ref()
    }

    pub fn incoming(&self) -> &BTreeSet<EndpointKey> {
        &self.incoming
    }

    pub fn is_open(&self) -> bool {
        self.portal_open
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn is_permanent(&self) -> bool {
        self.options.duration < 1
    }

    pub fn has_link(&self, key: &EndpointKey) -> bool {
        self.links.contains(key)
    }

    /// `outgoing`, when set, is one of `links`.
    pub fn link_invariant_holds(&self) -> bool {
        match &self.outgoing {
            Some(outgoing) => self.links.contains(outgoing),
            None => true,
        }
    }

    /// Appends a link. Returns false if it is already present. The first
    /// link becomes the selected one.
    pub fn add_link(&mut self, key: EndpointKey) -> bool {
        if self.links.contains(&key) {
            return false;
        }
        if self.outgoing.is_none() && self.links.is_empty() {
            self.outgoing = Some(key.clone());
        }
        self.links.push(key);
        true
    }

    /// Removes a link, clearing the selection if it was the selected one.
    pub fn remove_link(&mut self, key: &EndpointKey) -> bool {
        let Some(position) = self.links.iter().position(|link| link == key) else {
            return false;
        };
        self.links.remove(position);
        if self.outgoing.as_ref() == Some(key) {
            self.outgoing = None;
        }
        true
    }

    /// Selects the first link if nothing is selected.
    pub fn ensure_outgoing(&mut self) -> Option<&EndpointKey> {
        if self.outgoing.is_none() {
            self.outgoing = self.links.first().cloned();
        }
        self.outgoing.as_ref()
    }

    /// Whether `select_next` would leave the selection unchanged.
    pub fn next_is_noop(&self) -> bool {
        self.links.len() == 1 && self.outgoing.as_ref() == self.links.first()
    }

    /// Advances the selection, sequentially with wraparound or uniformly
    /// among the other links when `random_next_link` is set.
    pub fn select_next(&mut self, rng: &mut fastrand::Rng) -> Option<&EndpointKey> {
        if self.links.is_empty() {
            self.outgoing = None;
            return None;
        }
        let current = self
            .outgoing
            .as_ref()
            .and_then(|outgoing| self.links.iter().position(|link| link == outgoing));
        let next = match current {
            None => 0,
            Some(_) if self.links.len() == 1 => 0,
            Some(index) if self.options.random_next_link => {
                // uniform over the other links
                let pick = rng.usize(..self.links.len() - 1);
                if pick >= index {
                    pick + 1
                } else {
                    pick
                }
            }
            Some(index) => (index + 1) % self.links.len(),
        };
        self.outgoing = Some(self.links[next].clone());
        self.outgoing.as_ref()
    }

    /// Records `origin` as attached. Returns false if it already was.
    pub fn attach_incoming(&mut self, origin: EndpointKey) -> bool {
        self.incoming.insert(origin)
    }

    pub fn detach_incoming(&mut self, origin: &EndpointKey) -> bool {
        self.incoming.remove(origin)
    }

    /// Drops every attached origin matching `stale`. Returns true if any
    /// were dropped.
    pub fn release_incoming(&mut self, mut stale: impl FnMut(&EndpointKey) -> bool) -> bool {
        let before = self.incoming.len();
        self.incoming.retain(|origin| !stale(origin));
        self.incoming.len() != before
    }

    pub(crate) fn mark_open(&mut self, now: Instant) {
        self.portal_open = true;
        self.opened_at = Some(now);
    }

    /// Restores open state from a persisted snapshot.
    pub(crate) fn restore_state(
        &mut self,
        links: Vec<EndpointKey>,
        outgoing: Option<EndpointKey>,
        incoming: BTreeSet<EndpointKey>,
        open: bool,
        now: Instant,
    ) {
        self.links = links;
        self.outgoing = outgoing.filter(|outgoing| self.links.contains(outgoing));
        self.incoming = incoming;
        self.portal_open = open;
        self.opened_at = if open { Some(now) } else { None };
    }

    /// Marks the gate closed and returns the block states saved on open.
    pub(crate) fn mark_closed(&mut self) -> Vec<(BlockCoord, BlockState)> {
        self.portal_open = false;
        self.opened_at = None;
        self.incoming.clear();
        std::mem::take(&mut self.saved_blocks)
    }

    pub(crate) fn save_block(&mut self, coord: BlockCoord, state: BlockState) {
        self.saved_blocks.push((coord, state));
    }

    pub fn is_expired(&self, now: Instant, grace: Duration) -> bool {
        if self.is_permanent() {
            return false;
        }
        let Some(opened_at) = self.opened_at else {
            return false;
        };
        let age = opened_at.elapsed(&now) + grace;
        age.as_millis() >= self.options.duration as u128
    }

    /// Exactly one inbound gate, and it is the one we send to.
    pub fn is_mutual_with_outgoing(&self) -> bool {
        match &self.outgoing {
            Some(outgoing) => self.incoming.len() == 1 && self.incoming.contains(outgoing),
            None => false,
        }
    }

    /// Auto-close policy.
    pub fn can_close(&self, context: &CloseContext) -> bool {
        if self.is_permanent() {
            return !context.outgoing_valid && self.incoming.is_empty();
        }
        let expired = self.is_expired(context.now, context.grace);
        if self.is_mutual_with_outgoing() && context.partner_mutual {
            return expired;
        }
        self.incoming.is_empty() && (!context.outgoing_valid || expired)
    }

    /// Rewrites every reference to `old` as `new`.
    pub fn rename_references(&mut self, old: &EndpointKey, new: &EndpointKey) -> bool {
        let mut changed = false;
        for link in self.links.iter_mut() {
            if link == old {
                *link = new.clone();
                changed = true;
            }
        }
        if self.outgoing.as_ref() == Some(old) {
            self.outgoing = Some(new.clone());
            changed = true;
        }
        if self.incoming.remove(old) {
            self.incoming.insert(new.clone());
            changed = true;
        }
        changed
    }

    /// Drops every reference to a destroyed endpoint.
    pub fn remove_references(&mut self, key: &EndpointKey) -> bool {
        let removed_link = self.remove_link(key);
        let removed_incoming = self.incoming.remove(key);
        removed_link || removed_incoming
    }
}
