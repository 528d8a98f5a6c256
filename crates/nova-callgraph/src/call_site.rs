use std::fmt;
use std::str::FromStr;

use nova_classfile::{opcodes, BootstrapArgument, BootstrapMethod, Instruction, ReferenceKind};
use serde::{Deserialize, Serialize};

use crate::method_ref::MethodRef;

pub const LAMBDA_METAFACTORY_OWNER: &str = "java/lang/invoke/LambdaMetafactory";
pub const LAMBDA_METAFACTORY_NAME: &str = "metafactory";
pub const LAMBDA_METAFACTORY_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

/// Which resolution algorithm a call site is linked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkageKind {
    /// `invokespecial`: constructors, private methods and `super.` calls.
    Direct,
    Static,
    Virtual,
    Interface,
}

impl LinkageKind {
    /// Linkage of an `invoke*` opcode; `None` for `invokedynamic` and non-invocations.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            opcodes::INVOKEVIRTUAL => Some(LinkageKind::Virtual),
            opcodes::INVOKESPECIAL => Some(LinkageKind::Direct),
            opcodes::INVOKESTATIC => Some(LinkageKind::Static),
            opcodes::INVOKEINTERFACE => Some(LinkageKind::Interface),
            _ => None,
        }
    }

    /// Linkage of a method handle; field accessors and `newInvokeSpecial` have none.
    pub fn from_reference_kind(kind: ReferenceKind) -> Option<Self> {
        match kind {
            ReferenceKind::InvokeVirtual => Some(LinkageKind::Virtual),
            ReferenceKind::InvokeStatic => Some(LinkageKind::Static),
            ReferenceKind::InvokeSpecial => Some(LinkageKind::Direct),
            ReferenceKind::InvokeInterface => Some(LinkageKind::Interface),
            ReferenceKind::GetField
            | ReferenceKind::GetStatic
            | ReferenceKind::PutField
            | ReferenceKind::PutStatic
            | ReferenceKind::NewInvokeSpecial => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkageKind::Direct => "direct",
            LinkageKind::Static => "static",
            LinkageKind::Virtual => "virtual",
            LinkageKind::Interface => "interface",
        }
    }
}

impl fmt::Display for LinkageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "special" => Ok(LinkageKind::Direct),
            "static" => Ok(LinkageKind::Static),
            "virtual" => Ok(LinkageKind::Virtual),
            "interface" => Ok(LinkageKind::Interface),
            other => Err(format!(
                "unknown linkage kind `{other}` (expected direct, static, virtual or interface)"
            )),
        }
    }
}

/// A call found in a method body: the symbolic target plus how it links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSite {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: LinkageKind,
    /// Whether the symbolic reference was an `InterfaceMethodref`.
    pub is_interface: bool,
}

impl CallSite {
    pub fn target(&self) -> MethodRef {
        MethodRef::new(&self.owner, &self.name, &self.descriptor)
    }

    /// Extracts the call site of an instruction, if it has one.
    ///
    /// `invokedynamic` only yields a call site when it is a `LambdaMetafactory.metafactory`
    /// site capturing a method handle; every other bootstrap is ignored.
    ///
    /// # Panics
    ///
    /// Panics when an [`Instruction::Invoke`] carries an opcode that is not one of the
    /// four `invoke*` opcodes. The decoder never produces one, so this is a bug in
    /// whoever built the instruction.
    pub fn from_instruction(instruction: &Instruction) -> Option<CallSite> {
        match instruction {
            Instruction::Invoke {
                opcode,
                owner,
                name,
                descriptor,
                is_interface,
            } => {
                let Some(kind) = LinkageKind::from_opcode(*opcode) else {
                    panic!("invalid invocation opcode {opcode:#04x} for {owner}.{name}{descriptor}");
                };
                Some(CallSite {
                    owner: owner.clone(),
                    name: name.clone(),
                    descriptor: descriptor.clone(),
                    kind,
                    is_interface: *is_interface,
                })
            }
            Instruction::InvokeDynamic { bootstrap, .. } => Self::from_metafactory(bootstrap),
        }
    }

    fn from_metafactory(bootstrap: &BootstrapMethod) -> Option<CallSite> {
        let handle = &bootstrap.handle;
        if handle.owner != LAMBDA_METAFACTORY_OWNER
            || handle.name != LAMBDA_METAFACTORY_NAME
            || handle.descriptor != LAMBDA_METAFACTORY_DESCRIPTOR
        {
            return None;
        }

        // (samMethodType, implMethod, instantiatedMethodType)
        let [_, BootstrapArgument::MethodHandle(implementation), _] = bootstrap.arguments.as_slice()
        else {
            return None;
        };
        let kind = LinkageKind::from_reference_kind(implementation.kind)?;
        Some(CallSite {
            owner: implementation.owner.clone(),
            name: implementation.name.clone(),
            descriptor: implementation.descriptor.clone(),
            kind,
            is_interface: implementation.is_interface,
        })
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}{}",
            self.kind, self.owner, self.name, self.descriptor
        )
    }
}
