use std::sync::Arc;

use nova_callgraph::{CallGraph, MethodRef, Workspace};
use nova_classfile::access::{PUBLIC, STATIC};
use nova_classpath::ClasspathEntry;
use nova_config::CallGraphConfig;
use nova_test_utils::{write_class_dir, write_jar, ClassFileBuilder};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn method(text: &str) -> MethodRef {
    text.parse().unwrap()
}

#[test]
fn loaded_resources_feed_the_call_graph() {
    let tmp = TempDir::new().unwrap();
    let classes = tmp.path().join("classes");
    std::fs::create_dir(&classes).unwrap();
    write_class_dir(
        &classes,
        &[(
            "app/Main",
            ClassFileBuilder::new("app/Main")
                .method(PUBLIC | STATIC, "main", "()V", |code| {
                    code.invokestatic("lib/Util", "help", "()V");
                })
                .build(),
        )],
    )
    .unwrap();
    let jar = tmp.path().join("util.jar");
    write_jar(
        &jar,
        &[(
            "lib/Util.class",
            ClassFileBuilder::new("lib/Util")
                .method(PUBLIC | STATIC, "help", "()V", |_| {})
                .build(),
        )],
    )
    .unwrap();

    let workspace = Arc::new(Workspace::new(
        ClasspathEntry::from_path(&classes).load_resource().unwrap(),
    ));
    let graph = CallGraph::for_workspace(
        &workspace,
        &CallGraphConfig {
            active: true,
            threads: 1,
        },
    );
    graph.initialize().unwrap();
    assert_eq!(graph.unresolved_owners(), vec!["lib/Util".to_string()]);

    workspace.add_library(ClasspathEntry::from_path(&jar).load_resource().unwrap());

    assert_eq!(
        graph.calls_of(&method("app/Main.main()V")).unwrap(),
        vec![method("lib/Util.help()V")]
    );
    assert!(graph.unresolved_owners().is_empty());
}
