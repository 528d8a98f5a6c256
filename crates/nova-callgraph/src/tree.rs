use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::graph::CallGraph;
use crate::lookup::LookupError;
use crate::method_ref::MethodRef;
use crate::vertex::{MethodVertex, VertexId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Callees,
    Callers,
}

/// A method's callees (or callers) expanded to a fixed depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTree {
    pub method: MethodRef,
    /// The method already appears on the path from the root; not expanded again.
    #[serde(skip_serializing_if = "is_false")]
    pub recursive: bool,
    /// The depth limit cut off further neighbours.
    #[serde(skip_serializing_if = "is_false")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CallTree>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl CallTree {
    /// Indented text form, two spaces per level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let marker = match (self.recursive, self.truncated) {
            (true, _) => " (recursive)",
            (false, true) => " ...",
            (false, false) => "",
        };
        let _ = writeln!(out, "{:indent$}{}{marker}", "", self.method, indent = depth * 2);
        for child in &self.children {
            child.render_into(out, depth + 1);
        }
    }
}

impl fmt::Display for CallTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl CallGraph {
    /// Expands `root` up to `max_depth` edges away. `None` when `root` has no vertex.
    pub fn call_tree(
        &self,
        root: &MethodRef,
        direction: Direction,
        max_depth: usize,
    ) -> Result<Option<CallTree>, LookupError> {
        let Some(vertex) = self.vertex(root)? else {
            return Ok(None);
        };
        let mut path = Vec::new();
        Ok(Some(self.expand(&vertex, direction, max_depth, &mut path)))
    }

    fn expand(
        &self,
        vertex: &MethodVertex,
        direction: Direction,
        depth_left: usize,
        path: &mut Vec<VertexId>,
    ) -> CallTree {
        let mut tree = CallTree {
            method: vertex.method().clone(),
            recursive: false,
            truncated: false,
            children: Vec::new(),
        };
        if path.contains(&vertex.id()) {
            tree.recursive = true;
            return tree;
        }

        let neighbours = match direction {
            Direction::Callees => vertex.calls(),
            Direction::Callers => vertex.callers(),
        };
        if neighbours.is_empty() {
            return tree;
        }
        if depth_left == 0 {
            tree.truncated = true;
            return tree;
        }

        let mut children: Vec<_> = neighbours
            .into_iter()
            .filter_map(|id| self.vertex_by_id(id))
            .collect();
        children.sort_by(|a, b| a.method().cmp(b.method()));

        path.push(vertex.id());
        tree.children = children
            .iter()
            .map(|child| self.expand(child, direction, depth_left - 1, path))
            .collect();
        path.pop();
        tree
    }
}
