//! Utilities shared by Nova tests.
//!
//! Call graph tests need real class files without depending on `javac`, so this
//! crate contains a small class file assembler ([`ClassFileBuilder`]) and helpers
//! to lay the resulting bytes out as class directories or jars.

mod archive;
mod classfile_builder;

pub use archive::{write_class_dir, write_jar};
pub use classfile_builder::{BootstrapArg, ClassFileBuilder, CodeBuilder, LAMBDA_METAFACTORY_DESC};

/// Method handle reference kinds (JVMS 5.4.3.5).
pub mod handle_kind {
    pub const GET_FIELD: u8 = 1;
    pub const INVOKE_VIRTUAL: u8 = 5;
    pub const INVOKE_STATIC: u8 = 6;
    pub const INVOKE_SPECIAL: u8 = 7;
    pub const NEW_INVOKE_SPECIAL: u8 = 8;
    pub const INVOKE_INTERFACE: u8 = 9;
}
