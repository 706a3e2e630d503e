use gatelink_shared::{ItemStack, StatusEffect};

use crate::endpoint::{FilterOutcome, FilterTable};

/// Result of passing a traveler's belongings through a filter table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filtered<T> {
    pub kept: T,
    pub replaced: Vec<(String, String)>,
    pub rejected: Vec<String>,
}

impl<T> Filtered<T> {
    pub fn changed(&self) -> bool {
        !self.replaced.is_empty() || !self.rejected.is_empty()
    }

    pub fn notices(&self, noun: &str) -> Vec<String> {
        let replaced = self
            .replaced
            .iter()
            .map(|(from, to)| format!("Your {} '{}' was replaced by '{}'", noun, from, to));
        let rejected = self
            .rejected
            .iter()
            .map(|kind| format!("Your {} '{}' was not allowed and was removed", noun, kind));
        replaced.chain(rejected).collect()
    }
}

/// Filters inventory slots, keeping slot positions. Rejected stacks leave an
/// empty slot.
pub fn filter_items(table: &FilterTable, slots: &[Option<ItemStack>]) -> Filtered<Vec<Option<ItemStack>>> {
    let mut filtered: Filtered<Vec<Option<ItemStack>>> = Filtered::default();
    for slot in slots {
        let Some(stack) = slot else {
            filtered.kept.push(None);
            continue;
        };
        match table.apply(&stack.kind) {
            FilterOutcome::Keep => filtered.kept.push(Some(stack.clone())),
            FilterOutcome::Replace(kind) => {
                filtered.replaced.push((stack.kind.clone(), kind.clone()));
                filtered.kept.push(Some(stack.with_kind(kind)));
            }
            FilterOutcome::Reject => {
                filtered.rejected.push(stack.kind.clone());
                filtered.kept.push(None);
            }
        }
    }
    filtered
}

pub fn filter_effects(table: &FilterTable, effects: &[StatusEffect]) -> Filtered<Vec<StatusEffect>> {
    let mut filtered: Filtered<Vec<StatusEffect>> = Filtered::default();
    for effect in effects {
        match table.apply(&effect.kind) {
            FilterOutcome::Keep => filtered.kept.push(effect.clone()),
            FilterOutcome::Replace(kind) => {
                filtered.replaced.push((effect.kind.clone(), kind.clone()));
                filtered.kept.push(effect.with_kind(kind));
            }
            FilterOutcome::Reject => filtered.rejected.push(effect.kind.clone()),
        }
    }
    filtered
}
