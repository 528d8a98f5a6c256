use std::collections::BTreeSet;
use std::sync::Arc;

use nova_callgraph::{CallGraph, CallingContext, ClassUnitBuilder, Resource};
use pretty_assertions::assert_eq;

use super::support::*;

#[test]
fn removal_prunes_and_readding_relinks() {
    let b = static_leaf("B", "g");
    let workspace = workspace([static_caller("A", "f", &method("B.g()V")), Arc::clone(&b)]);
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();
    let f = graph.vertex(&method("A.f()V")).unwrap().unwrap();
    let old_g = graph.vertex(&method("B.g()V")).unwrap().unwrap();
    assert!(f.calls_contains(old_g.id()));

    workspace.remove_class("B");
    graph.remove(&b);

    assert!(f.calls().is_empty());
    assert!(graph.vertex_by_id(old_g.id()).is_none());
    assert_eq!(
        graph.unresolved_calls_for_owner("B"),
        BTreeSet::from([method("B.g()V")])
    );
    assert_edges_mirrored(&graph);

    let replacement = static_leaf("B", "g");
    workspace.put_class(Arc::clone(&replacement));
    graph.visit(&replacement).unwrap();

    let new_g = graph.vertex(&method("B.g()V")).unwrap().unwrap();
    assert_ne!(new_g.id(), old_g.id());
    assert_eq!(f.calls(), vec![new_g.id()]);
    assert_eq!(new_g.callers(), vec![f.id()]);
    assert!(graph.unresolved_calls_for_owner("B").is_empty());
    assert!(graph.unresolved_references_for_owner("B").is_empty());
    assert_edges_mirrored(&graph);
}

#[test]
fn update_that_drops_a_method_leaves_the_call_unresolved() {
    let b = ClassUnitBuilder::new("B")
        .method(PUBLIC_STATIC, "g", "()V", vec![])
        .method(PUBLIC_STATIC, "h", "()V", vec![])
        .build();
    let workspace = workspace([static_caller("A", "f", &method("B.g()V")), Arc::clone(&b)]);
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();

    let slimmer = static_leaf("B", "h");
    workspace.put_class(Arc::clone(&slimmer));
    graph.update(&b, &slimmer).unwrap();

    assert!(graph.calls_of(&method("A.f()V")).unwrap().is_empty());
    assert_eq!(
        graph.unresolved_calls_for_owner("B"),
        BTreeSet::from([method("B.g()V")])
    );
    let callers: Vec<_> = graph
        .unresolved_references_for_owner("B")
        .into_iter()
        .map(|CallingContext { caller, .. }| caller)
        .collect();
    assert_eq!(callers, vec![method("A.f()V")]);
    assert_eq!(graph.stats().vertices, 2);
    assert_edges_mirrored(&graph);
}

#[test]
fn update_replaces_outgoing_edges() {
    let a = static_caller("A", "f", &method("B.g()V"));
    let workspace = workspace([
        Arc::clone(&a),
        static_leaf("B", "g"),
        static_leaf("C", "h"),
    ]);
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();

    let rewritten = static_caller("A", "f", &method("C.h()V"));
    workspace.put_class(Arc::clone(&rewritten));
    graph.update(&a, &rewritten).unwrap();

    assert_eq!(graph.calls_of(&method("A.f()V")).unwrap(), vec![method("C.h()V")]);
    assert!(graph.callers_of(&method("B.g()V")).unwrap().is_empty());
    // The new A declares f again, so the removed f is not left unresolved.
    assert!(graph.unresolved_calls_for_owner("A").is_empty());
    assert_edges_mirrored(&graph);
}

#[test]
fn forward_references_link_when_the_owner_arrives() {
    let workspace = workspace([static_caller("A", "f", &method("B.g()V"))]);
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();
    assert_eq!(
        graph.unresolved_calls_for_owner("B"),
        BTreeSet::from([method("B.g()V")])
    );

    let b = static_leaf("B", "g");
    workspace.put_class(Arc::clone(&b));
    graph.visit(&b).unwrap();

    assert_eq!(graph.calls_of(&method("A.f()V")).unwrap(), vec![method("B.g()V")]);
    assert!(graph.unresolved_owners().is_empty());
}

#[test]
fn workspace_events_drive_the_graph() {
    let workspace = workspace([static_caller("A", "f", &method("B.g()V"))]);
    let graph = CallGraph::for_workspace(&workspace, &config());

    // Ignored: the graph is not initialized yet.
    workspace.put_class(static_leaf("Early", "e"));
    assert_eq!(graph.stats().classes, 0);

    graph.initialize().unwrap();
    assert_eq!(graph.stats().classes, 2);

    workspace.put_class(static_leaf("B", "g"));
    assert_eq!(graph.calls_of(&method("A.f()V")).unwrap(), vec![method("B.g()V")]);

    workspace.put_class(ClassUnitBuilder::new("B").build());
    assert!(graph.calls_of(&method("A.f()V")).unwrap().is_empty());
    assert!(graph.unresolved_calls_for_owner("B").contains(&method("B.g()V")));

    workspace.remove_class("A");
    assert!(graph.vertex(&method("A.f()V")).unwrap().is_none());
    assert!(graph.unresolved_references_for_owner("B").is_empty());
    assert_edges_mirrored(&graph);
}

#[test]
fn libraries_are_visited_and_removed_as_a_batch() {
    let workspace = workspace([static_caller("A", "f", &method("lib/L.h()V"))]);
    let graph = CallGraph::for_workspace(&workspace, &config());
    graph.initialize().unwrap();
    assert!(!graph.unresolved_calls_for_owner("lib/L").is_empty());

    workspace.add_library(Resource::with_classes(
        "lib.jar",
        [
            static_leaf("lib/L", "h"),
            static_caller("lib/M", "k", &method("lib/L.h()V")),
        ],
    ));
    assert_eq!(
        graph.callers_of(&method("lib/L.h()V")).unwrap(),
        vec![method("A.f()V"), method("lib/M.k()V")]
    );
    assert!(graph.unresolved_owners().is_empty());

    workspace.remove_library("lib.jar");
    assert!(graph.calls_of(&method("A.f()V")).unwrap().is_empty());
    assert!(graph.unresolved_calls_for_owner("lib/L").contains(&method("lib/L.h()V")));
    assert_eq!(graph.stats().vertices, 1);
    assert_edges_mirrored(&graph);
}

#[test]
fn removing_a_primary_class_reveals_the_library_copy() {
    let workspace = workspace([
        static_caller("A", "f", &method("S.g()V")),
        static_leaf("S", "g"),
    ]);
    workspace.add_library(Resource::with_classes(
        "lib.jar",
        [ClassUnitBuilder::new("S")
            .method(PUBLIC_STATIC, "g", "()V", vec![])
            .method(PUBLIC_STATIC, "fromLibrary", "()V", vec![])
            .build()],
    ));
    let graph = CallGraph::for_workspace(&workspace, &config());
    graph.initialize().unwrap();
    assert!(graph.vertex(&method("S.fromLibrary()V")).unwrap().is_none());

    workspace.remove_class("S");

    assert!(graph.vertex(&method("S.fromLibrary()V")).unwrap().is_some());
    assert_eq!(graph.calls_of(&method("A.f()V")).unwrap(), vec![method("S.g()V")]);
    assert!(graph.unresolved_owners().is_empty());
}

#[test]
fn adding_a_primary_class_hides_the_library_copy() {
    let workspace = workspace([static_caller("A", "f", &method("S.g()V"))]);
    workspace.add_library(Resource::with_classes("lib.jar", [static_leaf("S", "g")]));
    let graph = CallGraph::for_workspace(&workspace, &config());
    graph.initialize().unwrap();
    let library_g = graph.vertex(&method("S.g()V")).unwrap().unwrap();

    workspace.put_class(static_leaf("S", "g"));

    let g = graph.vertex(&method("S.g()V")).unwrap().unwrap();
    assert_ne!(g.id(), library_g.id());
    assert!(graph.vertex_by_id(library_g.id()).is_none());
    assert_eq!(graph.callers_of(&method("S.g()V")).unwrap(), vec![method("A.f()V")]);
    assert_eq!(graph.calls_of(&method("A.f()V")).unwrap(), vec![method("S.g()V")]);
    let stats = graph.stats();
    assert_eq!((stats.classes, stats.vertices, stats.edges), (2, 2, 1));
    assert!(graph.unresolved_owners().is_empty());
    assert_edges_mirrored(&graph);
}

#[test]
fn removing_a_library_reveals_the_next_library_copy() {
    let workspace = workspace([static_caller("A", "f", &method("S.g()V"))]);
    workspace.add_library(Resource::with_classes("one.jar", [static_leaf("S", "g")]));
    workspace.add_library(Resource::with_classes(
        "two.jar",
        [ClassUnitBuilder::new("S")
            .method(PUBLIC_STATIC, "g", "()V", vec![])
            .method(PUBLIC_STATIC, "fromTwo", "()V", vec![])
            .build()],
    ));
    let graph = CallGraph::for_workspace(&workspace, &config());
    graph.initialize().unwrap();
    assert!(graph.vertex(&method("S.fromTwo()V")).unwrap().is_none());

    workspace.remove_library("one.jar");

    assert!(graph.vertex(&method("S.fromTwo()V")).unwrap().is_some());
    assert_eq!(graph.calls_of(&method("A.f()V")).unwrap(), vec![method("S.g()V")]);
    assert!(graph.unresolved_owners().is_empty());
    assert_eq!(graph.stats().classes, 2);
    assert_edges_mirrored(&graph);
}

#[test]
fn removing_the_only_caller_clears_its_unresolved_calls() {
    let a = static_caller("A", "f", &method("Unknown.x()V"));
    let workspace = workspace([
        Arc::clone(&a),
        static_caller("B", "g", &method("Unknown.y()V")),
    ]);
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();
    assert_eq!(graph.unresolved_calls_for_owner("Unknown").len(), 2);

    workspace.remove_class("A");
    graph.remove(&a);

    assert_eq!(
        graph.unresolved_calls_for_owner("Unknown"),
        BTreeSet::from([method("Unknown.y()V")])
    );
    // The pruned method itself waits for a class named A to reappear.
    assert_eq!(
        graph.unresolved_calls_for_owner("A"),
        BTreeSet::from([method("A.f()V")])
    );
    assert_edges_mirrored(&graph);
}

#[test]
fn dropping_the_graph_detaches_it_from_the_workspace() {
    let workspace = workspace([static_leaf("A", "f")]);
    let graph = CallGraph::for_workspace(&workspace, &config());
    graph.initialize().unwrap();
    drop(graph);

    workspace.put_class(static_leaf("B", "g"));
    assert!(workspace.class("B").is_some());
}
