use std::sync::Arc;

use nova_callgraph::{
    AccessFlags, CallGraph, ClassUnit, ClassUnitBuilder, CodeUnitSource, MethodRef, Resource,
    Workspace,
};
use nova_classfile::{opcodes, Instruction};
use nova_config::CallGraphConfig;

pub const PUBLIC: AccessFlags = AccessFlags::PUBLIC;
pub const PUBLIC_STATIC: AccessFlags = AccessFlags::from_bits(0x0009);

pub fn method(text: &str) -> MethodRef {
    text.parse().unwrap()
}

fn invoke(opcode: u8, owner: &str, name: &str, descriptor: &str, is_interface: bool) -> Instruction {
    Instruction::Invoke {
        opcode,
        owner: owner.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        is_interface,
    }
}

pub fn invokestatic(owner: &str, name: &str, descriptor: &str) -> Instruction {
    invoke(opcodes::INVOKESTATIC, owner, name, descriptor, false)
}

pub fn invokevirtual(owner: &str, name: &str, descriptor: &str) -> Instruction {
    invoke(opcodes::INVOKEVIRTUAL, owner, name, descriptor, false)
}

pub fn invokeinterface(owner: &str, name: &str, descriptor: &str) -> Instruction {
    invoke(opcodes::INVOKEINTERFACE, owner, name, descriptor, true)
}

/// `class <name> { static void <method>() { <callee>(); } }` with a static call.
pub fn static_caller(name: &str, method: &str, callee: &MethodRef) -> Arc<ClassUnit> {
    ClassUnitBuilder::new(name)
        .method(
            PUBLIC_STATIC,
            method,
            "()V",
            vec![invokestatic(&callee.owner, &callee.name, &callee.descriptor)],
        )
        .build()
}

/// `class <name> { static void <method>() {} }`.
pub fn static_leaf(name: &str, method: &str) -> Arc<ClassUnit> {
    ClassUnitBuilder::new(name)
        .method(PUBLIC_STATIC, method, "()V", vec![])
        .build()
}

pub fn workspace(classes: impl IntoIterator<Item = Arc<ClassUnit>>) -> Arc<Workspace> {
    Arc::new(Workspace::new(Resource::with_classes("app", classes)))
}

pub fn config() -> CallGraphConfig {
    CallGraphConfig {
        active: true,
        threads: 2,
    }
}

/// A graph over `workspace` that is driven by hand rather than by workspace events.
pub fn detached_graph(workspace: &Arc<Workspace>) -> CallGraph {
    let source: Arc<dyn CodeUnitSource> = workspace.clone();
    CallGraph::new(source, &config())
}

/// Every edge is present on both of its endpoints.
pub fn assert_edges_mirrored(graph: &CallGraph) {
    for vertex in graph.vertices() {
        for callee in vertex.calls() {
            let callee = graph
                .vertex_by_id(callee)
                .unwrap_or_else(|| panic!("{} calls a pruned vertex", vertex.method()));
            assert!(
                callee.callers_contains(vertex.id()),
                "{} -> {} is missing its caller side",
                vertex.method(),
                callee.method()
            );
        }
        for caller in vertex.callers() {
            let caller = graph
                .vertex_by_id(caller)
                .unwrap_or_else(|| panic!("{} is called by a pruned vertex", vertex.method()));
            assert!(
                caller.calls_contains(vertex.id()),
                "{} -> {} is missing its callee side",
                caller.method(),
                vertex.method()
            );
        }
    }
}
