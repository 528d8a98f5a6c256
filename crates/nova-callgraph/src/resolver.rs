//! JVM-style symbolic reference resolution.
//!
//! Resolution is purely static: it answers "which declaration does this symbolic
//! reference link against", never "which override runs for a given receiver".
//! Not finding a member is a [`Resolution::Failed`] value; only a failing
//! [`CodeUnitLookup`] is an error.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::call_site::LinkageKind;
use crate::lookup::{CodeUnitLookup, LookupError};
use crate::method_ref::MethodRef;
use crate::unit::{AccessFlags, ClassUnit, FieldDecl, MethodDecl};

const OBJECT: &str = "java/lang/Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionFailure {
    #[error("owner not found")]
    OwnerNotFound,
    #[error("no such method")]
    NoSuchMethod,
    #[error("no such field")]
    NoSuchField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Member {
    Method(usize),
    Field(usize),
}

/// A member together with the unit that declares it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub unit: Arc<ClassUnit>,
    pub member: Member,
}

impl Resolved {
    pub fn method(&self) -> Option<&MethodDecl> {
        match self.member {
            Member::Method(index) => self.unit.methods.get(index),
            Member::Field(_) => None,
        }
    }

    pub fn field(&self) -> Option<&FieldDecl> {
        match self.member {
            Member::Field(index) => self.unit.fields.get(index),
            Member::Method(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match (self.method(), self.field()) {
            (Some(method), _) => &method.name,
            (_, Some(field)) => &field.name,
            _ => "",
        }
    }

    pub fn descriptor(&self) -> &str {
        match (self.method(), self.field()) {
            (Some(method), _) => &method.descriptor,
            (_, Some(field)) => &field.descriptor,
            _ => "",
        }
    }

    pub fn access(&self) -> AccessFlags {
        match (self.method(), self.field()) {
            (Some(method), _) => method.access,
            (_, Some(field)) => field.access,
            _ => AccessFlags::default(),
        }
    }

    /// `declaring unit.name descriptor` of a resolved method.
    pub fn method_ref(&self) -> Option<MethodRef> {
        self.method()
            .map(|m| MethodRef::new(&self.unit.name, &m.name, &m.descriptor))
    }
}

impl PartialEq for Resolved {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.unit, &other.unit) && self.member == other.member
    }
}

impl Eq for Resolved {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Resolved),
    Failed(ResolutionFailure),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn resolved(&self) -> Option<&Resolved> {
        match self {
            Resolution::Resolved(resolved) => Some(resolved),
            Resolution::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<ResolutionFailure> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::Failed(failure) => Some(*failure),
        }
    }
}

fn method_at(unit: &Arc<ClassUnit>, index: usize) -> Resolution {
    Resolution::Resolved(Resolved {
        unit: Arc::clone(unit),
        member: Member::Method(index),
    })
}

/// Stateless resolution algorithms, one per linkage kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkResolver;

impl LinkResolver {
    pub fn new() -> Self {
        Self
    }

    /// Dispatches on the linkage kind of a call site.
    pub fn resolve_method(
        &self,
        lookup: &dyn CodeUnitLookup,
        kind: LinkageKind,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
        is_interface_owner: bool,
    ) -> Result<Resolution, LookupError> {
        match kind {
            LinkageKind::Direct => Ok(self.resolve_direct(owner, name, descriptor)),
            LinkageKind::Static => self.resolve_static(lookup, owner, name, descriptor),
            LinkageKind::Virtual => self.resolve_virtual(lookup, owner, name, descriptor),
            LinkageKind::Interface => {
                self.resolve_interface(lookup, owner, name, descriptor, is_interface_owner)
            }
        }
    }

    /// Looks only at the named owner.
    pub fn resolve_direct(&self, owner: &Arc<ClassUnit>, name: &str, descriptor: &str) -> Resolution {
        match owner.method_index(name, descriptor) {
            Some(index) => method_at(owner, index),
            None => Resolution::Failed(ResolutionFailure::NoSuchMethod),
        }
    }

    /// First `static` declaration along the superclass chain.
    pub fn resolve_static(
        &self,
        lookup: &dyn CodeUnitLookup,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
    ) -> Result<Resolution, LookupError> {
        let found = walk_superclasses(lookup, owner, |unit| {
            unit.method_index(name, descriptor)
                .filter(|&i| unit.methods[i].access.is_static())
                .map(|i| method_at(unit, i))
        })?;
        Ok(found.unwrap_or(Resolution::Failed(ResolutionFailure::NoSuchMethod)))
    }

    /// Most derived non-static declaration along the superclass chain, then default
    /// methods of the chain's interfaces. Private members count only on the owner.
    pub fn resolve_virtual(
        &self,
        lookup: &dyn CodeUnitLookup,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
    ) -> Result<Resolution, LookupError> {
        if owner.is_interface() {
            return self.resolve_interface(lookup, owner, name, descriptor, true);
        }

        let mut chain = Vec::new();
        let found = walk_superclasses(lookup, owner, |unit| {
            chain.push(Arc::clone(unit));
            unit.method_index(name, descriptor)
                .filter(|&i| {
                    let access = unit.methods[i].access;
                    !access.is_static() && (!access.is_private() || Arc::ptr_eq(unit, owner))
                })
                .map(|i| method_at(unit, i))
        })?;
        if let Some(found) = found {
            return Ok(found);
        }

        let mut seen = HashSet::new();
        for unit in &chain {
            if let Some(found) = search_superinterfaces(lookup, unit, &mut seen, &|iface: &Arc<ClassUnit>| {
                inherited_interface_method(iface, name, descriptor)
            })? {
                return Ok(found);
            }
        }
        Ok(Resolution::Failed(ResolutionFailure::NoSuchMethod))
    }

    /// Owner, then its superinterfaces depth-first, then public methods of `java/lang/Object`.
    ///
    /// The first match in traversal order wins; diamond defaults are not disambiguated.
    /// When `is_interface_owner` is false and the owner is a class, this is virtual
    /// resolution.
    pub fn resolve_interface(
        &self,
        lookup: &dyn CodeUnitLookup,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
        is_interface_owner: bool,
    ) -> Result<Resolution, LookupError> {
        if !is_interface_owner && !owner.is_interface() {
            return self.resolve_virtual(lookup, owner, name, descriptor);
        }

        if let Some(index) = owner
            .method_index(name, descriptor)
            .filter(|&i| !owner.methods[i].access.is_static())
        {
            return Ok(method_at(owner, index));
        }

        let mut seen = HashSet::from([owner.name.clone()]);
        if let Some(found) = search_superinterfaces(lookup, owner, &mut seen, &|iface: &Arc<ClassUnit>| {
            inherited_interface_method(iface, name, descriptor)
        })? {
            return Ok(found);
        }

        if let Some(object) = lookup.lookup(OBJECT)? {
            if let Some(index) = object.method_index(name, descriptor).filter(|&i| {
                let access = object.methods[i].access;
                access.is_public() && !access.is_static()
            }) {
                return Ok(method_at(&object, index));
            }
        }

        Ok(Resolution::Failed(ResolutionFailure::NoSuchMethod))
    }

    pub fn resolve_static_field(
        &self,
        lookup: &dyn CodeUnitLookup,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
    ) -> Result<Resolution, LookupError> {
        self.resolve_field(lookup, owner, name, descriptor, true)
    }

    pub fn resolve_virtual_field(
        &self,
        lookup: &dyn CodeUnitLookup,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
    ) -> Result<Resolution, LookupError> {
        self.resolve_field(lookup, owner, name, descriptor, false)
    }

    /// JVM field lookup order: owner, superinterfaces, then the superclass.
    fn resolve_field(
        &self,
        lookup: &dyn CodeUnitLookup,
        owner: &Arc<ClassUnit>,
        name: &str,
        descriptor: &str,
        want_static: bool,
    ) -> Result<Resolution, LookupError> {
        let mut seen = HashSet::new();
        let found = find_field(lookup, owner, name, descriptor, want_static, &mut seen)?;
        Ok(found.unwrap_or(Resolution::Failed(ResolutionFailure::NoSuchField)))
    }
}

fn inherited_interface_method(iface: &Arc<ClassUnit>, name: &str, descriptor: &str) -> Option<Resolution> {
    iface
        .method_index(name, descriptor)
        .filter(|&i| {
            let access = iface.methods[i].access;
            !access.is_static() && !access.is_private()
        })
        .map(|i| method_at(iface, i))
}

/// Visits `owner` and its superclasses until `visit` returns a value.
///
/// A superclass missing from the lookup ends the walk, as does a cycle.
fn walk_superclasses<T>(
    lookup: &dyn CodeUnitLookup,
    owner: &Arc<ClassUnit>,
    mut visit: impl FnMut(&Arc<ClassUnit>) -> Option<T>,
) -> Result<Option<T>, LookupError> {
    let mut seen = HashSet::new();
    let mut current = Some(Arc::clone(owner));
    while let Some(unit) = current {
        if !seen.insert(unit.name.clone()) {
            break;
        }
        if let Some(found) = visit(&unit) {
            return Ok(Some(found));
        }
        current = match &unit.super_name {
            Some(super_name) => lookup.lookup(super_name)?,
            None => None,
        };
    }
    Ok(None)
}

/// Depth-first, pre-order search of the interfaces `unit` declares (transitively),
/// in declaration order. Interfaces already in `seen` are skipped.
fn search_superinterfaces(
    lookup: &dyn CodeUnitLookup,
    unit: &ClassUnit,
    seen: &mut HashSet<String>,
    visit: &dyn Fn(&Arc<ClassUnit>) -> Option<Resolution>,
) -> Result<Option<Resolution>, LookupError> {
    for name in &unit.interfaces {
        if !seen.insert(name.clone()) {
            continue;
        }
        let Some(iface) = lookup.lookup(name)? else {
            continue;
        };
        if let Some(found) = visit(&iface) {
            return Ok(Some(found));
        }
        if let Some(found) = search_superinterfaces(lookup, &iface, seen, visit)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn find_field(
    lookup: &dyn CodeUnitLookup,
    unit: &Arc<ClassUnit>,
    name: &str,
    descriptor: &str,
    want_static: bool,
    seen: &mut HashSet<String>,
) -> Result<Option<Resolution>, LookupError> {
    if !seen.insert(unit.name.clone()) {
        return Ok(None);
    }

    if let Some(index) = unit
        .field_index(name, descriptor)
        .filter(|&i| unit.fields[i].access.is_static() == want_static)
    {
        return Ok(Some(Resolution::Resolved(Resolved {
            unit: Arc::clone(unit),
            member: Member::Field(index),
        })));
    }

    for iface in &unit.interfaces {
        if let Some(iface) = lookup.lookup(iface)? {
            if let Some(found) = find_field(lookup, &iface, name, descriptor, want_static, seen)? {
                return Ok(Some(found));
            }
        }
    }

    if let Some(super_name) = &unit.super_name {
        if let Some(parent) = lookup.lookup(super_name)? {
            return find_field(lookup, &parent, name, descriptor, want_static, seen);
        }
    }

    Ok(None)
}
