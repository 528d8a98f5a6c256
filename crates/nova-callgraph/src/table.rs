use std::sync::Arc;

use crate::method_ref::MethodRef;
use crate::resolver::{Member, Resolved};
use crate::unit::ClassUnit;
use crate::vertex::{VertexArena, VertexId};

/// One vertex per declared method of a unit, index-aligned with `unit.methods`.
#[derive(Debug)]
pub struct ClassMethodTable {
    unit: Arc<ClassUnit>,
    vertices: Vec<VertexId>,
}

impl ClassMethodTable {
    /// Allocates a vertex for every declared method. No edges are created.
    pub fn build(unit: &Arc<ClassUnit>, arena: &VertexArena) -> Self {
        let vertices = unit
            .methods
            .iter()
            .enumerate()
            .map(|(index, method)| {
                let declaration = Resolved {
                    unit: Arc::clone(unit),
                    member: Member::Method(index),
                };
                arena
                    .alloc(
                        MethodRef::new(&unit.name, &method.name, &method.descriptor),
                        declaration,
                    )
                    .id()
            })
            .collect();
        Self {
            unit: Arc::clone(unit),
            vertices,
        }
    }

    pub fn unit(&self) -> &Arc<ClassUnit> {
        &self.unit
    }

    pub fn vertex(&self, name: &str, descriptor: &str) -> Option<VertexId> {
        self.unit
            .method_index(name, descriptor)
            .map(|index| self.vertices[index])
    }

    pub fn vertex_at(&self, index: usize) -> Option<VertexId> {
        self.vertices.get(index).copied()
    }

    /// Vertex of a member resolved against this table's unit.
    pub fn vertex_for(&self, resolved: &Resolved) -> Option<VertexId> {
        if !Arc::ptr_eq(&resolved.unit, &self.unit) {
            return None;
        }
        match resolved.member {
            Member::Method(index) => self.vertex_at(index),
            Member::Field(_) => None,
        }
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
