//! JVM class file decoding for call graph construction.
//!
//! [`ClassFile::parse`] reads the class header, members and the attributes the
//! call graph needs (`Code`, `BootstrapMethods`, `Signature`). Method bodies
//! stay encoded until [`ClassFile::method_instructions`] or
//! [`decode_code_attribute`] is asked for them.

#![forbid(unsafe_code)]

mod classfile;
mod code;
mod constant_pool;
mod descriptor;
mod error;
mod reader;

pub use crate::classfile::{ClassFile, ClassMember};
pub use crate::code::{decode_code_attribute, decode_instructions, opcodes, Instruction};
pub use crate::constant_pool::{
    BootstrapArgument, BootstrapMethod, ConstantPool, MemberRef, MethodHandle, ReferenceKind,
};
pub use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};

/// Class file access flags shared by classes and members.
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
}
