use std::collections::{BTreeSet, HashSet};

use dashmap::DashMap;
use serde::Serialize;

use crate::call_site::CallSite;
use crate::method_ref::MethodRef;

/// A call site together with the method it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CallingContext {
    pub caller: MethodRef,
    pub site: CallSite,
}

/// Unresolved calls keyed by the owner name the call site names.
///
/// `declarations` answers "which targets on this owner are missing";
/// `references` remembers who made those calls so they can be relinked once
/// the owner (re)appears.
#[derive(Debug, Default)]
pub struct UnresolvedIndex {
    declarations: DashMap<String, HashSet<MethodRef>>,
    references: DashMap<String, HashSet<CallingContext>>,
}

impl UnresolvedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, owner: &str, target: MethodRef) {
        self.declarations
            .entry(owner.to_string())
            .or_default()
            .insert(target);
    }

    pub fn record_reference(&self, owner: &str, context: CallingContext) {
        self.references
            .entry(owner.to_string())
            .or_default()
            .insert(context);
    }

    /// Removes `target` from `owner`'s entry. Returns whether it was present.
    pub fn satisfy(&self, owner: &str, target: &MethodRef) -> bool {
        let removed = match self.declarations.get_mut(owner) {
            Some(mut entry) => entry.remove(target),
            None => return false,
        };
        self.declarations.remove_if(owner, |_, targets| targets.is_empty());
        removed
    }

    pub fn remove_reference(&self, owner: &str, context: &CallingContext) -> bool {
        let removed = match self.references.get_mut(owner) {
            Some(mut entry) => entry.remove(context),
            None => return false,
        };
        self.references.remove_if(owner, |_, contexts| contexts.is_empty());
        removed
    }

    /// Drops every reference made from a method of `caller_owner`, under any owner,
    /// along with the declarations no remaining reference still names.
    pub fn forget_callers_in(&self, caller_owner: &str) {
        let mut forgotten = Vec::new();
        self.references.retain(|owner, contexts| {
            contexts.retain(|context| {
                if context.caller.owner != caller_owner {
                    return true;
                }
                forgotten.push((owner.clone(), context.site.target()));
                false
            });
            !contexts.is_empty()
        });

        for (owner, target) in forgotten {
            let still_referenced = self.references.get(&owner).is_some_and(|contexts| {
                contexts.iter().any(|context| context.site.target() == target)
            });
            if !still_referenced {
                self.satisfy(&owner, &target);
            }
        }
    }

    /// Takes all pending references to `owner`, leaving none behind.
    pub fn take_references(&self, owner: &str) -> Vec<CallingContext> {
        let mut taken: Vec<_> = self
            .references
            .remove(owner)
            .map(|(_, contexts)| contexts.into_iter().collect())
            .unwrap_or_default();
        taken.sort();
        taken
    }

    pub fn declarations_for(&self, owner: &str) -> BTreeSet<MethodRef> {
        self.declarations
            .get(owner)
            .map(|entry| entry.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn references_for(&self, owner: &str) -> BTreeSet<CallingContext> {
        self.references
            .get(owner)
            .map(|entry| entry.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Owners with at least one unresolved declaration, sorted.
    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<_> = self
            .declarations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        owners.sort();
        owners
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
