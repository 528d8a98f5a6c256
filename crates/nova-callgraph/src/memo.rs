use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::call_site::LinkageKind;
use crate::lookup::{CodeUnitLookup, LookupError};
use crate::resolver::{LinkResolver, Resolution};
use crate::unit::ClassUnit;

/// Which resolver operation a cached result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionKind {
    Direct,
    Static,
    Virtual,
    Interface { owner_is_interface: bool },
    StaticField,
    VirtualField,
}

impl ResolutionKind {
    pub fn for_call(kind: LinkageKind, is_interface: bool) -> Self {
        match kind {
            LinkageKind::Direct => ResolutionKind::Direct,
            LinkageKind::Static => ResolutionKind::Static,
            LinkageKind::Virtual => ResolutionKind::Virtual,
            LinkageKind::Interface => ResolutionKind::Interface {
                owner_is_interface: is_interface,
            },
        }
    }
}

/// Hashes and compares a published unit by allocation, not by contents.
#[derive(Debug, Clone)]
pub struct UnitKey(pub Arc<ClassUnit>);

impl PartialEq for UnitKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for UnitKey {}

impl Hash for UnitKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

type Slot = Arc<OnceCell<Resolution>>;

/// [`LinkResolver`] with a per-owner, per-kind result cache.
///
/// Concurrent first lookups of the same key share one [`OnceCell`], so the
/// underlying resolver runs at most once per key. Lookup failures are not cached.
#[derive(Debug, Default)]
pub struct MemoizingResolver {
    resolver: LinkResolver,
    caches: DashMap<(UnitKey, ResolutionKind), DashMap<(String, String), Slot>>,
    computed: AtomicU64,
}

impl MemoizingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        lookup: &dyn CodeUnitLookup,
        kind: ResolutionKind,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
    ) -> Result<Resolution, LookupError> {
        // Both shard guards are released before the resolver walks the hierarchy.
        let slot = {
            let per_owner = self
                .caches
                .entry((UnitKey(Arc::clone(owner)), kind))
                .or_default();
            let slot = per_owner
                .entry((name.to_string(), descriptor.to_string()))
                .or_default();
            Arc::clone(slot.value())
        };

        slot.get_or_try_init(|| {
            self.computed.fetch_add(1, Ordering::Relaxed);
            self.compute(lookup, kind, owner, name, descriptor)
        })
        .cloned()
    }

    fn compute(
        &self,
        lookup: &dyn CodeUnitLookup,
        kind: ResolutionKind,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
    ) -> Result<Resolution, LookupError> {
        let resolver = &self.resolver;
        match kind {
            ResolutionKind::Direct => Ok(resolver.resolve_direct(owner, name, descriptor)),
            ResolutionKind::Static => resolver.resolve_static(lookup, owner, name, descriptor),
            ResolutionKind::Virtual => resolver.resolve_virtual(lookup, owner, name, descriptor),
            ResolutionKind::Interface { owner_is_interface } => {
                resolver.resolve_interface(lookup, owner, name, descriptor, owner_is_interface)
            }
            ResolutionKind::StaticField => {
                resolver.resolve_static_field(lookup, owner, name, descriptor)
            }
            ResolutionKind::VirtualField => {
                resolver.resolve_virtual_field(lookup, owner, name, descriptor)
            }
        }
    }

    /// Drops every cached result.
    pub fn clear(&self) {
        self.caches.clear();
    }

    /// Number of times the underlying resolver ran.
    pub fn computed(&self) -> u64 {
        self.computed.load(Ordering::Relaxed)
    }

    /// Number of cached `(name, descriptor)` results across all owners.
    pub fn len(&self) -> usize {
        self.caches.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
