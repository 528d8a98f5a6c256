use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::Serialize;

use crate::method_ref::MethodRef;
use crate::resolver::Resolved;

/// Stable handle of a vertex. Handles are never reused, so a handle to a pruned
/// vertex simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VertexId(u32);

impl VertexId {
    pub fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A declared method in the graph.
///
/// Edges are stored as handles on both sides: `b ∈ a.calls` exactly when
/// `a ∈ b.callers`, once every in-flight link has completed.
#[derive(Debug)]
pub struct MethodVertex {
    id: VertexId,
    method: MethodRef,
    declaration: Resolved,
    calls: DashSet<VertexId>,
    callers: DashSet<VertexId>,
}

impl MethodVertex {
    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    pub fn declaration(&self) -> &Resolved {
        &self.declaration
    }

    pub fn calls(&self) -> Vec<VertexId> {
        snapshot(&self.calls)
    }

    pub fn callers(&self) -> Vec<VertexId> {
        snapshot(&self.callers)
    }

    pub fn calls_contains(&self, id: VertexId) -> bool {
        self.calls.contains(&id)
    }

    pub fn callers_contains(&self, id: VertexId) -> bool {
        self.callers.contains(&id)
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}

fn snapshot(set: &DashSet<VertexId>) -> Vec<VertexId> {
    let mut ids: Vec<_> = set.iter().map(|id| *id).collect();
    ids.sort_unstable();
    ids
}

/// Owns every vertex of a graph.
#[derive(Debug, Default)]
pub struct VertexArena {
    vertices: DashMap<VertexId, Arc<MethodVertex>>,
    next: AtomicU32,
}

impl VertexArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&self, method: MethodRef, declaration: Resolved) -> Arc<MethodVertex> {
        let id = VertexId(self.next.fetch_add(1, Ordering::Relaxed));
        let vertex = Arc::new(MethodVertex {
            id,
            method,
            declaration,
            calls: DashSet::new(),
            callers: DashSet::new(),
        });
        self.vertices.insert(id, Arc::clone(&vertex));
        vertex
    }

    pub fn get(&self, id: VertexId) -> Option<Arc<MethodVertex>> {
        self.vertices.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Adds `caller -> callee`. Returns `false` when the edge already existed or either
    /// vertex is gone.
    pub fn link(&self, caller: VertexId, callee: VertexId) -> bool {
        let (Some(from), Some(to)) = (self.get(caller), self.get(callee)) else {
            return false;
        };
        let added = from.calls.insert(callee);
        to.callers.insert(caller);
        added
    }

    /// Removes a vertex and every edge touching it, on both sides.
    pub fn prune(&self, id: VertexId) -> Option<Arc<MethodVertex>> {
        let (_, vertex) = self.vertices.remove(&id)?;
        for callee in vertex.calls.iter() {
            if let Some(callee) = self.get(*callee) {
                callee.callers.remove(&id);
            }
        }
        for caller in vertex.callers.iter() {
            if let Some(caller) = self.get(*caller) {
                caller.calls.remove(&id);
            }
        }
        vertex.calls.clear();
        vertex.callers.clear();
        Some(vertex)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.vertices.iter().map(|entry| entry.value().calls.len()).sum()
    }

    pub fn ids(&self) -> Vec<VertexId> {
        let mut ids: Vec<_> = self.vertices.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}
