//! Method-level call graph and JVM symbolic reference resolution.
//!
//! [`CallGraph`] keeps one [`MethodVertex`] per declared method of every visited
//! [`ClassUnit`], linked by `calls`/`callers` edges found by resolving each call
//! site with [`LinkResolver`] (through a [`MemoizingResolver`] cache). Calls that
//! cannot be resolved are kept in an [`UnresolvedIndex`] and relinked when their
//! owner shows up later.
//!
//! The graph can follow a [`Workspace`] incrementally: class additions, updates and
//! removals, and library additions and removals, are applied as they happen.

mod call_site;
mod graph;
mod lookup;
mod memo;
mod method_ref;
mod resolver;
mod table;
mod tree;
mod unit;
mod unresolved;
mod vertex;
mod workspace;

pub use call_site::{
    CallSite, LinkageKind, LAMBDA_METAFACTORY_DESCRIPTOR, LAMBDA_METAFACTORY_NAME,
    LAMBDA_METAFACTORY_OWNER,
};
pub use graph::{CallGraph, CallGraphError, CallGraphStats};
pub use lookup::{CodeUnitLookup, CodeUnitSource, LookupError};
pub use memo::{MemoizingResolver, ResolutionKind, UnitKey};
pub use method_ref::{MethodRef, ParseMethodRefError};
pub use resolver::{LinkResolver, Member, Resolution, ResolutionFailure, Resolved};
pub use table::ClassMethodTable;
pub use tree::{CallTree, Direction};
pub use unit::{AccessFlags, ClassUnit, ClassUnitBuilder, FieldDecl, MethodCode, MethodDecl};
pub use unresolved::{CallingContext, UnresolvedIndex};
pub use vertex::{MethodVertex, VertexArena, VertexId};
pub use workspace::{Resource, Workspace, WorkspaceListener};
