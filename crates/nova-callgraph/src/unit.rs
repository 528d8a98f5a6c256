//! Immutable view of a class as the call graph sees it.
//!
//! A [`ClassUnit`] is published behind an `Arc` and never mutated afterwards.
//! Replacing a class always publishes a new `Arc`, and the graph keys its method
//! tables and resolution caches on that allocation rather than on the class name.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use nova_classfile::{access, ClassFile, ConstantPool, Instruction};
use serde::Serialize;

/// Class or member access flags, using the class file bit values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccessFlags(u16);

impl AccessFlags {
    pub const PUBLIC: Self = Self(access::PUBLIC);
    pub const PRIVATE: Self = Self(access::PRIVATE);
    pub const PROTECTED: Self = Self(access::PROTECTED);
    pub const STATIC: Self = Self(access::STATIC);
    pub const FINAL: Self = Self(access::FINAL);
    pub const INTERFACE: Self = Self(access::INTERFACE);
    pub const ABSTRACT: Self = Self(access::ABSTRACT);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub const fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub const fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    pub const fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }
}

impl BitOr for AccessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessFlags({:#06x})", self.0)
    }
}

/// Body of a method.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodCode {
    /// Abstract and native methods.
    Absent,
    /// Already decoded invocation instructions.
    Instructions(Vec<Instruction>),
    /// Undecoded `Code` attribute body together with the constant pool it refers to.
    Bytecode {
        code: Arc<[u8]>,
        pool: Arc<ConstantPool>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub code: MethodCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassUnit {
    /// Internal name, e.g. `java/util/List`.
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub access: AccessFlags,
    pub methods: Vec<MethodDecl>,
    pub fields: Vec<FieldDecl>,
}

impl ClassUnit {
    pub fn builder(name: impl Into<String>) -> ClassUnitBuilder {
        ClassUnitBuilder::new(name)
    }

    /// Parses a class file and converts it with [`ClassUnit::from_classfile`].
    pub fn parse(bytes: &[u8]) -> nova_classfile::Result<Self> {
        ClassFile::parse(bytes).map(Self::from_classfile)
    }

    /// Method bodies stay encoded; they are decoded by [`ClassUnit::instruction_stream`].
    pub fn from_classfile(class: ClassFile) -> Self {
        let pool = class.constant_pool;
        let methods = class
            .methods
            .into_iter()
            .map(|member| MethodDecl {
                name: member.name,
                descriptor: member.descriptor,
                access: AccessFlags::from_bits(member.access_flags),
                code: match member.code {
                    Some(code) => MethodCode::Bytecode {
                        code,
                        pool: Arc::clone(&pool),
                    },
                    None => MethodCode::Absent,
                },
            })
            .collect();
        let fields = class
            .fields
            .into_iter()
            .map(|member| FieldDecl {
                name: member.name,
                descriptor: member.descriptor,
                access: AccessFlags::from_bits(member.access_flags),
            })
            .collect();

        Self {
            name: class.this_class,
            super_name: class.super_class,
            interfaces: class.interfaces,
            access: AccessFlags::from_bits(class.access_flags),
            methods,
            fields,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    pub fn method_index(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodDecl> {
        self.method_index(name, descriptor).map(|i| &self.methods[i])
    }

    pub fn field_index(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name && f.descriptor == descriptor)
    }

    /// Invocation instructions of one of this unit's methods.
    ///
    /// Decoding happens on every call; a malformed body is reported here and
    /// nowhere else.
    pub fn instruction_stream(
        &self,
        method: &MethodDecl,
    ) -> nova_classfile::Result<Vec<Instruction>> {
        match &method.code {
            MethodCode::Absent => Ok(Vec::new()),
            MethodCode::Instructions(instructions) => Ok(instructions.clone()),
            MethodCode::Bytecode { code, pool } => {
                nova_classfile::decode_code_attribute(code, pool)
            }
        }
    }
}

/// In-memory construction of [`ClassUnit`]s.
#[derive(Debug, Clone)]
pub struct ClassUnitBuilder {
    unit: ClassUnit,
}

impl ClassUnitBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            unit: ClassUnit {
                name: name.into(),
                super_name: Some("java/lang/Object".to_string()),
                interfaces: Vec::new(),
                access: AccessFlags::PUBLIC,
                methods: Vec::new(),
                fields: Vec::new(),
            },
        }
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.unit.access = access;
        self
    }

    /// Marks the unit as an interface.
    pub fn interface(mut self) -> Self {
        self.unit.access = self.unit.access | AccessFlags::INTERFACE | AccessFlags::ABSTRACT;
        self
    }

    pub fn extends(mut self, super_name: impl Into<String>) -> Self {
        self.unit.super_name = Some(super_name.into());
        self
    }

    pub fn no_super(mut self) -> Self {
        self.unit.super_name = None;
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.unit.interfaces.push(interface.into());
        self
    }

    pub fn field(
        mut self,
        access: AccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.unit.fields.push(FieldDecl {
            name: name.into(),
            descriptor: descriptor.into(),
            access,
        });
        self
    }

    pub fn method(
        self,
        access: AccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        instructions: Vec<Instruction>,
    ) -> Self {
        self.method_with_code(access, name, descriptor, MethodCode::Instructions(instructions))
    }

    pub fn abstract_method(
        self,
        access: AccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.method_with_code(access | AccessFlags::ABSTRACT, name, descriptor, MethodCode::Absent)
    }

    pub fn method_with_code(
        mut self,
        access: AccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        code: MethodCode,
    ) -> Self {
        self.unit.methods.push(MethodDecl {
            name: name.into(),
            descriptor: descriptor.into(),
            access,
            code,
        });
        self
    }

    pub fn build(self) -> Arc<ClassUnit> {
        Arc::new(self.unit)
    }
}
