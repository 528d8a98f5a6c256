use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use dashmap::DashMap;
use nova_config::CallGraphConfig;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::call_site::{CallSite, LinkageKind};
use crate::lookup::{CodeUnitLookup, CodeUnitSource, LookupError};
use crate::memo::{MemoizingResolver, ResolutionKind, UnitKey};
use crate::method_ref::MethodRef;
use crate::resolver::{Resolution, ResolutionFailure, Resolved};
use crate::table::ClassMethodTable;
use crate::unit::ClassUnit;
use crate::unresolved::{CallingContext, UnresolvedIndex};
use crate::vertex::{MethodVertex, VertexArena, VertexId};
use crate::workspace::{Resource, Workspace, WorkspaceListener};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallGraphError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallGraphStats {
    pub classes: usize,
    pub vertices: usize,
    pub edges: usize,
    pub unresolved_owners: usize,
    pub unresolved_calls: usize,
}

/// Method-level call graph over the code units of a [`CodeUnitSource`].
///
/// Each visited unit gets a [`ClassMethodTable`]; every call site found in its
/// method bodies is resolved and either linked to the declaring method's vertex
/// or recorded in the unresolved index under the owner it names.
///
/// Mutations of one unit must not race with a visit of that unit or of units
/// referencing it. Bulk [`CallGraph::initialize`] visits units in parallel.
pub struct CallGraph {
    source: Arc<dyn CodeUnitSource>,
    active: bool,
    threads: usize,
    resolver: MemoizingResolver,
    arena: VertexArena,
    tables: DashMap<UnitKey, Arc<ClassMethodTable>>,
    unresolved: UnresolvedIndex,
    initialized: AtomicBool,
    ready: AtomicBool,
}

impl fmt::Debug for CallGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallGraph")
            .field("active", &self.active)
            .field("ready", &self.is_ready())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CallGraph {
    pub fn new(source: Arc<dyn CodeUnitSource>, config: &CallGraphConfig) -> Self {
        Self {
            source,
            active: config.active,
            threads: config.effective_threads(),
            resolver: MemoizingResolver::new(),
            arena: VertexArena::new(),
            tables: DashMap::new(),
            unresolved: UnresolvedIndex::new(),
            initialized: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// Creates a graph over `workspace` and subscribes it to workspace mutations.
    ///
    /// Mutations are ignored until [`CallGraph::initialize`] has run.
    pub fn for_workspace(workspace: &Arc<Workspace>, config: &CallGraphConfig) -> Arc<Self> {
        let source: Arc<dyn CodeUnitSource> = workspace.clone();
        let graph = Arc::new(Self::new(source, config));
        let listener: Weak<CallGraph> = Arc::downgrade(&graph);
        workspace.add_listener(listener);
        graph
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// `true` once the bulk visit of [`CallGraph::initialize`] completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Visits every unit of the source. Runs at most once; later calls return `Ok(())`.
    ///
    /// A unit whose visit fails is logged and skipped; the others are still visited
    /// and the graph becomes ready. The first failure (in source order) is returned.
    pub fn initialize(&self) -> Result<(), CallGraphError> {
        if !self.active {
            tracing::debug!(target: "nova.callgraph", "call graph inactive; skipping initialization");
            return Ok(());
        }
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let started = Instant::now();
        let units = self.source.all_code_units();
        let visit = |unit: &Arc<ClassUnit>| {
            self.visit_unit(unit)
                .err()
                .map(|err| (unit.name.clone(), err))
        };
        let failures: Vec<(String, CallGraphError)> = match build_rayon_pool(self.threads) {
            Some(pool) => pool.install(|| units.par_iter().filter_map(visit).collect()),
            None => units.iter().filter_map(visit).collect(),
        };
        for (class, err) in &failures {
            tracing::error!(target: "nova.callgraph", class = %class, error = %err, "failed to visit class");
        }

        self.ready.store(true, Ordering::Release);
        let stats = self.stats();
        tracing::info!(
            target: "nova.callgraph",
            classes = stats.classes,
            vertices = stats.vertices,
            edges = stats.edges,
            unresolved = stats.unresolved_calls,
            failed = failures.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "call graph initialized"
        );
        match failures.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }

    /// Builds the unit's method table if needed and links every call site in its methods.
    ///
    /// Visiting the same unit again adds nothing: vertices are per unit and edges are sets.
    pub fn visit(&self, unit: &Arc<ClassUnit>) -> Result<(), CallGraphError> {
        if !self.active {
            return Ok(());
        }
        self.resolver.clear();
        self.visit_unit(unit)?;
        self.log_mutation("visit", &unit.name);
        Ok(())
    }

    /// Prunes every vertex of `unit` (matched by identity) and records its methods as unresolved.
    pub fn remove(&self, unit: &Arc<ClassUnit>) {
        if !self.active {
            return;
        }
        self.resolver.clear();
        self.remove_unit(unit);
        self.log_mutation("remove", &unit.name);
    }

    pub fn update(&self, old: &Arc<ClassUnit>, new: &Arc<ClassUnit>) -> Result<(), CallGraphError> {
        if !self.active {
            return Ok(());
        }
        self.resolver.clear();
        self.remove_unit(old);
        self.visit_unit(new)?;
        self.log_mutation("update", &new.name);
        Ok(())
    }

    /// Visits the units of a library that are visible through the source.
    pub fn add_library(&self, units: &[Arc<ClassUnit>]) -> Result<(), CallGraphError> {
        if !self.active {
            return Ok(());
        }
        self.resolver.clear();
        for unit in units {
            let visible = self.source.lookup(&unit.name)?;
            if visible.is_some_and(|visible| Arc::ptr_eq(&visible, unit)) {
                self.visit_unit(unit)?;
            }
        }
        tracing::debug!(target: "nova.callgraph", units = units.len(), "library added");
        Ok(())
    }

    /// Prunes the units of a removed library. Returns the ones that had been visited.
    pub fn remove_library(&self, units: &[Arc<ClassUnit>]) -> Vec<Arc<ClassUnit>> {
        if !self.active {
            return Vec::new();
        }
        self.resolver.clear();
        let pruned: Vec<_> = units
            .iter()
            .filter(|unit| self.remove_unit(unit))
            .cloned()
            .collect();
        tracing::debug!(
            target: "nova.callgraph",
            units = units.len(),
            pruned = pruned.len(),
            "library removed"
        );
        pruned
    }

    /// The unit's method table, creating one without edges if the unit was never visited.
    pub fn get_method_table(&self, unit: &Arc<ClassUnit>) -> Arc<ClassMethodTable> {
        let table = self
            .tables
            .entry(UnitKey(Arc::clone(unit)))
            .or_insert_with(|| Arc::new(ClassMethodTable::build(unit, &self.arena)));
        Arc::clone(table.value())
    }

    /// What a call of `kind` against `owner` links to, using the graph's resolution cache.
    pub fn resolve(
        &self,
        kind: LinkageKind,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<Resolution, LookupError> {
        self.resolver.resolve(
            self.lookup(),
            ResolutionKind::for_call(kind, is_interface),
            owner,
            name,
            descriptor,
        )
    }

    pub fn resolve_field(
        &self,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<Resolution, LookupError> {
        let kind = if is_static {
            ResolutionKind::StaticField
        } else {
            ResolutionKind::VirtualField
        };
        self.resolver.resolve(self.lookup(), kind, owner, name, descriptor)
    }

    /// Like [`CallGraph::resolve`], but looks the owner up by name first.
    pub fn resolve_call(&self, site: &CallSite) -> Result<Resolution, LookupError> {
        let Some(owner) = self.source.lookup(&site.owner)? else {
            return Ok(Resolution::Failed(ResolutionFailure::OwnerNotFound));
        };
        self.resolve(site.kind, &owner, &site.name, &site.descriptor, site.is_interface)
    }

    pub fn unresolved_calls_for_owner(&self, owner: &str) -> BTreeSet<MethodRef> {
        self.unresolved.declarations_for(owner)
    }

    pub fn unresolved_references_for_owner(&self, owner: &str) -> BTreeSet<CallingContext> {
        self.unresolved.references_for(owner)
    }

    pub fn unresolved_owners(&self) -> Vec<String> {
        self.unresolved.owners()
    }

    /// The vertex of a method declared by the unit currently visible under `method.owner`.
    pub fn vertex(&self, method: &MethodRef) -> Result<Option<Arc<MethodVertex>>, LookupError> {
        Ok(self
            .vertex_id(method)?
            .and_then(|id| self.arena.get(id)))
    }

    pub fn vertex_by_id(&self, id: VertexId) -> Option<Arc<MethodVertex>> {
        self.arena.get(id)
    }

    /// Every live vertex, ordered by id.
    pub fn vertices(&self) -> Vec<Arc<MethodVertex>> {
        self.arena
            .ids()
            .into_iter()
            .filter_map(|id| self.arena.get(id))
            .collect()
    }

    /// Methods `method` calls, sorted. Empty when the method has no vertex.
    pub fn calls_of(&self, method: &MethodRef) -> Result<Vec<MethodRef>, LookupError> {
        self.neighbours(method, MethodVertex::calls)
    }

    /// Methods calling `method`, sorted. Empty when the method has no vertex.
    pub fn callers_of(&self, method: &MethodRef) -> Result<Vec<MethodRef>, LookupError> {
        self.neighbours(method, MethodVertex::callers)
    }

    pub fn stats(&self) -> CallGraphStats {
        CallGraphStats {
            classes: self.tables.len(),
            vertices: self.arena.len(),
            edges: self.arena.edge_count(),
            unresolved_owners: self.unresolved.owners().len(),
            unresolved_calls: self.unresolved.declaration_count(),
        }
    }

    pub(crate) fn method_refs(&self, ids: Vec<VertexId>) -> Vec<MethodRef> {
        let mut methods: Vec<_> = ids
            .into_iter()
            .filter_map(|id| self.arena.get(id))
            .map(|vertex| vertex.method().clone())
            .collect();
        methods.sort();
        methods
    }

    fn neighbours(
        &self,
        method: &MethodRef,
        edges: fn(&MethodVertex) -> Vec<VertexId>,
    ) -> Result<Vec<MethodRef>, LookupError> {
        Ok(match self.vertex(method)? {
            Some(vertex) => self.method_refs(edges(&vertex)),
            None => Vec::new(),
        })
    }

    fn lookup(&self) -> &dyn CodeUnitLookup {
        &*self.source
    }

    /// Vertex of an already-built table; never builds one.
    fn vertex_id(&self, method: &MethodRef) -> Result<Option<VertexId>, LookupError> {
        let Some(unit) = self.source.lookup(&method.owner)? else {
            return Ok(None);
        };
        Ok(self
            .tables
            .get(&UnitKey(unit))
            .and_then(|table| table.vertex(&method.name, &method.descriptor)))
    }

    fn visit_unit(&self, unit: &Arc<ClassUnit>) -> Result<(), CallGraphError> {
        let table = self.get_method_table(unit);

        for (index, method) in unit.methods.iter().enumerate() {
            let Some(caller) = table.vertex_at(index) else {
                continue;
            };
            let instructions = match unit.instruction_stream(method) {
                Ok(instructions) => instructions,
                Err(err) => {
                    tracing::warn!(
                        target: "nova.callgraph",
                        class = %unit.name,
                        method = %method.name,
                        descriptor = %method.descriptor,
                        error = %err,
                        "skipping malformed method body"
                    );
                    continue;
                }
            };
            let caller_ref = MethodRef::new(&unit.name, &method.name, &method.descriptor);
            for site in instructions.iter().filter_map(CallSite::from_instruction) {
                self.link_call(caller, &caller_ref, &site)?;
            }
        }

        for method in &unit.methods {
            self.unresolved.satisfy(
                &unit.name,
                &MethodRef::new(&unit.name, &method.name, &method.descriptor),
            );
        }

        // Calls recorded before this unit existed (or while it was removed).
        for context in self.unresolved.take_references(&unit.name) {
            // A caller without a table is linked by its own visit.
            if let Some(caller) = self.vertex_id(&context.caller)? {
                self.link_call(caller, &context.caller, &context.site)?;
            }
        }
        Ok(())
    }

    fn link_call(
        &self,
        caller: VertexId,
        caller_ref: &MethodRef,
        site: &CallSite,
    ) -> Result<(), CallGraphError> {
        let context = CallingContext {
            caller: caller_ref.clone(),
            site: site.clone(),
        };

        let resolution = self.resolve_call(site)?;
        let callee = match &resolution {
            Resolution::Resolved(resolved) => self.vertex_of(resolved),
            Resolution::Failed(_) => None,
        };

        match callee {
            Some(callee) => {
                self.arena.link(caller, callee);
                if self.unresolved.satisfy(&site.owner, &site.target()) {
                    tracing::debug!(
                        target: "nova.callgraph",
                        caller = %caller_ref,
                        target = %site.target(),
                        "satisfied unresolved call"
                    );
                }
                self.unresolved.remove_reference(&site.owner, &context);
            }
            None => {
                // Reference first: a concurrent visit of the owner satisfies the
                // declaration and then retries whatever references it finds.
                self.unresolved.record_reference(&site.owner, context);
                self.unresolved.record(&site.owner, site.target());
                tracing::debug!(
                    target: "nova.callgraph",
                    caller = %caller_ref,
                    site = %site,
                    reason = %resolution.failure().unwrap_or(ResolutionFailure::NoSuchMethod),
                    "unresolved call"
                );
            }
        }
        Ok(())
    }

    fn vertex_of(&self, resolved: &Resolved) -> Option<VertexId> {
        self.get_method_table(&resolved.unit).vertex_for(resolved)
    }

    /// Returns `false` when the unit had no table.
    fn remove_unit(&self, unit: &Arc<ClassUnit>) -> bool {
        let Some((_, table)) = self.tables.remove(&UnitKey(Arc::clone(unit))) else {
            return false;
        };

        self.unresolved.forget_callers_in(&unit.name);

        // Remember which outside callers reached into this unit so a later visit of
        // a unit with the same name relinks them.
        for &id in table.vertices() {
            let Some(vertex) = self.arena.get(id) else {
                continue;
            };
            for caller_id in vertex.callers() {
                if table.contains(caller_id) {
                    continue;
                }
                if let Some(caller) = self.arena.get(caller_id) {
                    self.remember_calls(&caller, &unit.name, vertex.method());
                }
            }
        }

        for &id in table.vertices() {
            if let Some(vertex) = self.arena.prune(id) {
                self.unresolved.record(&unit.name, vertex.method().clone());
            }
        }
        true
    }

    /// A visited unit named like `unit` but not `unit` itself.
    fn hidden_by(&self, unit: &Arc<ClassUnit>) -> Option<Arc<ClassUnit>> {
        self.tables
            .iter()
            .find(|entry| entry.key().0.name == unit.name && !Arc::ptr_eq(&entry.key().0, unit))
            .map(|entry| Arc::clone(&entry.key().0))
    }

    fn remember_calls(&self, caller: &MethodVertex, removed_owner: &str, callee: &MethodRef) {
        let declaration = caller.declaration();
        let Some(method) = declaration.method() else {
            return;
        };
        let Ok(instructions) = declaration.unit.instruction_stream(method) else {
            return;
        };
        for site in instructions.iter().filter_map(CallSite::from_instruction) {
            if site.name == callee.name && site.descriptor == callee.descriptor {
                self.unresolved.record_reference(
                    removed_owner,
                    CallingContext {
                        caller: caller.method().clone(),
                        site,
                    },
                );
            }
        }
    }

    fn log_mutation(&self, operation: &'static str, class: &str) {
        if tracing::enabled!(target: "nova.callgraph", tracing::Level::DEBUG) {
            let stats = self.stats();
            tracing::debug!(
                target: "nova.callgraph",
                operation,
                class,
                vertices = stats.vertices,
                edges = stats.edges,
                unresolved = stats.unresolved_calls,
                "call graph updated"
            );
        }
    }

    fn reveal(&self, name: &str) {
        match self.source.lookup(name) {
            Ok(Some(revealed)) => self.visit_logged(&revealed),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(target: "nova.callgraph", class = name, error = %err, "failed to look up class")
            }
        }
    }

    fn visit_logged(&self, unit: &Arc<ClassUnit>) {
        if let Err(err) = self.visit(unit) {
            tracing::warn!(target: "nova.callgraph", class = %unit.name, error = %err, "failed to visit class");
        }
    }
}

/// Builds the initialization pool, halving the thread count when the OS refuses
/// threads. `None` means visit inline on the calling thread.
fn build_rayon_pool(threads: usize) -> Option<rayon::ThreadPool> {
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("nova-callgraph-{idx}"))
            .build()
        {
            Ok(pool) => return Some(pool),
            Err(_) if threads > 1 => threads = (threads / 2).max(1),
            Err(err) => {
                tracing::warn!(target: "nova.callgraph", error = %err, "no worker threads; visiting inline");
                return None;
            }
        }
    }
}

impl WorkspaceListener for CallGraph {
    fn on_class_added(&self, class: &Arc<ClassUnit>) {
        if !self.is_initialized() {
            return;
        }
        // A new primary class shadows the library copy visited so far.
        let Some(hidden) = self.hidden_by(class) else {
            self.visit_logged(class);
            return;
        };
        if let Err(err) = self.update(&hidden, class) {
            tracing::warn!(target: "nova.callgraph", class = %class.name, error = %err, "failed to update class");
        }
    }

    fn on_class_updated(&self, old: &Arc<ClassUnit>, new: &Arc<ClassUnit>) {
        if !self.is_initialized() {
            return;
        }
        if let Err(err) = self.update(old, new) {
            tracing::warn!(target: "nova.callgraph", class = %new.name, error = %err, "failed to update class");
        }
    }

    fn on_class_removed(&self, class: &Arc<ClassUnit>) {
        if !self.is_initialized() {
            return;
        }
        self.remove(class);
        // A library class of the same name may have been shadowed.
        self.reveal(&class.name);
    }

    fn on_library_added(&self, library: &Arc<Resource>) {
        if !self.is_initialized() {
            return;
        }
        let units: Vec<_> = library.classes().cloned().collect();
        if let Err(err) = self.add_library(&units) {
            tracing::warn!(target: "nova.callgraph", library = library.name(), error = %err, "failed to add library");
        }
    }

    fn on_library_removed(&self, library: &Arc<Resource>) {
        if !self.is_initialized() {
            return;
        }
        let units: Vec<_> = library.classes().cloned().collect();
        for pruned in self.remove_library(&units) {
            // A later library may hold a copy of the same class.
            self.reveal(&pruned.name);
        }
    }
}
