//! Graphs built from assembled class files rather than in-memory units.

use std::sync::Arc;

use nova_callgraph::{ClassUnit, MethodCode};
use nova_classfile::access::{ABSTRACT, PRIVATE, PUBLIC, STATIC};
use nova_test_utils::{handle_kind, BootstrapArg, ClassFileBuilder};
use pretty_assertions::assert_eq;

use super::support::*;

fn unit(bytes: Vec<u8>) -> Arc<ClassUnit> {
    Arc::new(ClassUnit::parse(&bytes).unwrap())
}

fn shapes() -> Vec<Arc<ClassUnit>> {
    vec![
        unit(
            ClassFileBuilder::interface("shapes/Shape")
                .abstract_method(PUBLIC, "area", "()D")
                .method(PUBLIC, "describe", "()Ljava/lang/String;", |code| {
                    code.invokeinterface("shapes/Shape", "area", "()D");
                })
                .build(),
        ),
        unit(
            ClassFileBuilder::new("shapes/Circle")
                .implements("shapes/Shape")
                .field(PRIVATE, "radius", "D")
                .field(PUBLIC | STATIC, "UNIT", "Lshapes/Circle;")
                .method(PUBLIC, "<init>", "()V", |_| {})
                .method(PUBLIC, "area", "()D", |code| {
                    code.invokestatic("shapes/Geometry", "square", "(D)D");
                })
                .build(),
        ),
        unit(
            ClassFileBuilder::new("shapes/Geometry")
                .method(PUBLIC | STATIC, "square", "(D)D", |_| {})
                .build(),
        ),
        unit(
            ClassFileBuilder::new("app/Main")
                .method(PUBLIC | STATIC, "main", "([Ljava/lang/String;)V", |code| {
                    code.invokespecial("shapes/Circle", "<init>", "()V")
                        .invokevirtual("shapes/Circle", "describe", "()Ljava/lang/String;")
                        .pop()
                        .getstatic("java/lang/System", "out", "Ljava/io/PrintStream;")
                        .invokevirtual("java/io/PrintStream", "println", "(Ljava/lang/String;)V")
                        .lambda(handle_kind::INVOKE_STATIC, "app/Main", "lambda$main$0", "()V", false)
                        .lambda(handle_kind::NEW_INVOKE_SPECIAL, "shapes/Circle", "<init>", "()V", false)
                        .invokeinterface("java/lang/Runnable", "run", "()V");
                })
                .method(PRIVATE | STATIC, "lambda$main$0", "()V", |code| {
                    code.invokevirtual("shapes/Circle", "area", "()D");
                })
                .build(),
        ),
    ]
}

#[test]
fn assembled_classes_link_across_linkage_kinds() {
    let workspace = workspace(shapes());
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();

    assert_eq!(
        graph.calls_of(&method("app/Main.main([Ljava/lang/String;)V")).unwrap(),
        vec![
            method("app/Main.lambda$main$0()V"),
            method("shapes/Circle.<init>()V"),
            method("shapes/Shape.describe()Ljava/lang/String;"),
        ]
    );
    assert_eq!(
        graph.calls_of(&method("app/Main.lambda$main$0()V")).unwrap(),
        vec![method("shapes/Circle.area()D")]
    );
    assert_eq!(
        graph.callers_of(&method("shapes/Shape.area()D")).unwrap(),
        vec![method("shapes/Shape.describe()Ljava/lang/String;")]
    );
    assert_eq!(
        graph.callers_of(&method("shapes/Geometry.square(D)D")).unwrap(),
        vec![method("shapes/Circle.area()D")]
    );

    // JDK classes are not in the workspace.
    assert_eq!(
        graph.unresolved_owners(),
        vec!["java/io/PrintStream".to_string(), "java/lang/Runnable".to_string()]
    );
    assert_edges_mirrored(&graph);
}

#[test]
fn abstract_methods_keep_their_vertex() {
    let workspace = workspace(shapes());
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();

    let area = graph.vertex(&method("shapes/Shape.area()D")).unwrap().unwrap();
    assert!(area.declaration().access().contains(nova_callgraph::AccessFlags::ABSTRACT));
    assert!(area.calls().is_empty());
    let shape = workspace.class("shapes/Shape").unwrap();
    assert_eq!(shape.methods[0].code, MethodCode::Absent);
    assert_eq!(shape.access.bits() & ABSTRACT, ABSTRACT);
}

#[test]
fn fields_resolve_through_the_graph() {
    let workspace = workspace(shapes());
    let graph = detached_graph(&workspace);
    let circle = workspace.class("shapes/Circle").unwrap();

    let unit_field = graph
        .resolve_field(&circle, "UNIT", "Lshapes/Circle;", true)
        .unwrap();
    assert_eq!(unit_field.resolved().unwrap().name(), "UNIT");

    let radius = graph.resolve_field(&circle, "radius", "D", false).unwrap();
    assert!(radius.resolved().unwrap().field().is_some());
    assert!(!graph.resolve_field(&circle, "radius", "D", true).unwrap().is_resolved());
}

#[test]
fn malformed_body_skips_only_that_method() {
    let broken = unit(
        ClassFileBuilder::new("b/Broken")
            // invokestatic with its index cut off
            .method_with_raw_code(PUBLIC | STATIC, "bad", "()V", vec![0xb8, 0x00])
            .method(PUBLIC | STATIC, "good", "()V", |code| {
                code.invokestatic("b/Broken", "bad", "()V");
            })
            .build(),
    );
    let workspace = workspace([broken]);
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();

    assert!(graph.vertex(&method("b/Broken.bad()V")).unwrap().is_some());
    assert!(graph.calls_of(&method("b/Broken.bad()V")).unwrap().is_empty());
    assert_eq!(
        graph.calls_of(&method("b/Broken.good()V")).unwrap(),
        vec![method("b/Broken.bad()V")]
    );
}

#[test]
fn non_metafactory_bootstraps_are_ignored() {
    let concat = unit(
        ClassFileBuilder::new("c/Concat")
            .method(PUBLIC | STATIC, "join", "(I)Ljava/lang/String;", |code| {
                code.raw(&[0x1a]) // iload_0
                    .invokedynamic(
                        "java/lang/invoke/StringConcatFactory",
                        "makeConcatWithConstants",
                        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
                        &[BootstrapArg::String("n=\u{1}".to_string())],
                        "makeConcatWithConstants",
                        "(I)Ljava/lang/String;",
                    )
                    .raw(&[0xb0]); // areturn
            })
            .build(),
    );
    let workspace = workspace([concat]);
    let graph = detached_graph(&workspace);
    graph.initialize().unwrap();

    assert_eq!(graph.stats().edges, 0);
    assert!(graph.unresolved_owners().is_empty());
}
