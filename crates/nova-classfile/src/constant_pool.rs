use crate::error::{Error, Result};
use crate::reader::Reader;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CpInfo {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
    /// Second slot of a `Long`/`Double` entry, and slot 0.
    Unusable,
}

impl CpInfo {
    fn kind(&self) -> &'static str {
        match self {
            CpInfo::Utf8(_) => "Utf8",
            CpInfo::Integer(_) => "Integer",
            CpInfo::Float(_) => "Float",
            CpInfo::Long(_) => "Long",
            CpInfo::Double(_) => "Double",
            CpInfo::Class(_) => "Class",
            CpInfo::String(_) => "String",
            CpInfo::FieldRef { .. } => "Fieldref",
            CpInfo::MethodRef { .. } => "Methodref",
            CpInfo::InterfaceMethodRef { .. } => "InterfaceMethodref",
            CpInfo::NameAndType { .. } => "NameAndType",
            CpInfo::MethodHandle { .. } => "MethodHandle",
            CpInfo::MethodType(_) => "MethodType",
            CpInfo::Dynamic { .. } => "Dynamic",
            CpInfo::InvokeDynamic { .. } => "InvokeDynamic",
            CpInfo::Module(_) => "Module",
            CpInfo::Package(_) => "Package",
            CpInfo::Unusable => "unusable",
        }
    }
}

/// Symbolic reference to a field or method as it appears in the constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    /// `true` when the reference is an `InterfaceMethodref`.
    pub is_interface: bool,
}

/// `reference_kind` of a `CONSTANT_MethodHandle` (JVMS 5.4.3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl ReferenceKind {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => ReferenceKind::GetField,
            2 => ReferenceKind::GetStatic,
            3 => ReferenceKind::PutField,
            4 => ReferenceKind::PutStatic,
            5 => ReferenceKind::InvokeVirtual,
            6 => ReferenceKind::InvokeStatic,
            7 => ReferenceKind::InvokeSpecial,
            8 => ReferenceKind::NewInvokeSpecial,
            9 => ReferenceKind::InvokeInterface,
            other => return Err(Error::InvalidReferenceKind(other)),
        })
    }

    pub fn tag(self) -> u8 {
        match self {
            ReferenceKind::GetField => 1,
            ReferenceKind::GetStatic => 2,
            ReferenceKind::PutField => 3,
            ReferenceKind::PutStatic => 4,
            ReferenceKind::InvokeVirtual => 5,
            ReferenceKind::InvokeStatic => 6,
            ReferenceKind::InvokeSpecial => 7,
            ReferenceKind::NewInvokeSpecial => 8,
            ReferenceKind::InvokeInterface => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    pub kind: ReferenceKind,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

/// Static argument of a bootstrap method, resolved from the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapArgument {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(String),
    String(String),
    MethodHandle(MethodHandle),
    MethodType(String),
    Dynamic { name: String, descriptor: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    pub handle: MethodHandle,
    pub arguments: Vec<BootstrapArgument>,
}

/// Raw `BootstrapMethods` attribute entry; arguments are constant pool indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BootstrapEntry {
    pub(crate) method_ref: u16,
    pub(crate) arguments: Vec<u16>,
}

/// Parsed constant pool, together with the class's bootstrap method table so
/// `invokedynamic` sites can be resolved lazily from method bodies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<CpInfo>,
    bootstrap_methods: Vec<BootstrapEntry>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count.max(1));
        entries.push(CpInfo::Unusable);

        while entries.len() < count {
            let tag = reader.read_u1()?;
            let info = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    CpInfo::Utf8(decode_modified_utf8(reader.read_bytes(len)?)?)
                }
                3 => CpInfo::Integer(reader.read_i4()?),
                4 => CpInfo::Float(f32::from_bits(reader.read_u4()?)),
                5 => CpInfo::Long(reader.read_u8()? as i64),
                6 => CpInfo::Double(f64::from_bits(reader.read_u8()?)),
                7 => CpInfo::Class(reader.read_u2()?),
                8 => CpInfo::String(reader.read_u2()?),
                9 => CpInfo::FieldRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                10 => CpInfo::MethodRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                11 => CpInfo::InterfaceMethodRef {
                    class: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                12 => CpInfo::NameAndType {
                    name: reader.read_u2()?,
                    descriptor: reader.read_u2()?,
                },
                15 => CpInfo::MethodHandle {
                    kind: reader.read_u1()?,
                    reference: reader.read_u2()?,
                },
                16 => CpInfo::MethodType(reader.read_u2()?),
                17 => CpInfo::Dynamic {
                    bootstrap: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                18 => CpInfo::InvokeDynamic {
                    bootstrap: reader.read_u2()?,
                    name_and_type: reader.read_u2()?,
                },
                19 => CpInfo::Module(reader.read_u2()?),
                20 => CpInfo::Package(reader.read_u2()?),
                other => return Err(Error::InvalidConstantPoolTag(other)),
            };

            let wide = matches!(info, CpInfo::Long(_) | CpInfo::Double(_));
            entries.push(info);
            if wide {
                entries.push(CpInfo::Unusable);
            }
        }

        Ok(Self {
            entries,
            bootstrap_methods: Vec::new(),
        })
    }

    pub(crate) fn set_bootstrap_methods(&mut self, methods: Vec<BootstrapEntry>) {
        self.bootstrap_methods = methods;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn bootstrap_method_count(&self) -> usize {
        self.bootstrap_methods.len()
    }

    fn get(&self, index: u16) -> Result<&CpInfo> {
        match self.entries.get(index as usize) {
            Some(CpInfo::Unusable) | None => Err(Error::InvalidConstantPoolIndex(index)),
            Some(info) => Ok(info),
        }
    }

    fn mismatch(&self, index: u16, expected: &'static str) -> Error {
        match self.get(index) {
            Ok(found) => Error::ConstantPoolTypeMismatch {
                index,
                expected,
                found: found.kind(),
            },
            Err(err) => err,
        }
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CpInfo::Utf8(value) => Ok(value),
            _ => Err(self.mismatch(index, "Utf8")),
        }
    }

    pub fn get_class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpInfo::Class(name) => Ok(self.get_utf8(*name)?.to_string()),
            _ => Err(self.mismatch(index, "Class")),
        }
    }

    fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.get(index)? {
            CpInfo::NameAndType { name, descriptor } => Ok((
                self.get_utf8(*name)?.to_string(),
                self.get_utf8(*descriptor)?.to_string(),
            )),
            _ => Err(self.mismatch(index, "NameAndType")),
        }
    }

    /// Resolves a `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef> {
        let (class, name_and_type, is_interface) = match self.get(index)? {
            CpInfo::FieldRef {
                class,
                name_and_type,
            }
            | CpInfo::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            CpInfo::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            _ => return Err(self.mismatch(index, "Methodref")),
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner: self.get_class_name(class)?,
            name,
            descriptor,
            is_interface,
        })
    }

    pub fn method_handle(&self, index: u16) -> Result<MethodHandle> {
        match self.get(index)? {
            CpInfo::MethodHandle { kind, reference } => {
                let kind = ReferenceKind::from_tag(*kind)?;
                let member = self.member_ref(*reference)?;
                Ok(MethodHandle {
                    kind,
                    owner: member.owner,
                    name: member.name,
                    descriptor: member.descriptor,
                    is_interface: member.is_interface,
                })
            }
            _ => Err(self.mismatch(index, "MethodHandle")),
        }
    }

    /// Resolves an `InvokeDynamic` entry into its bootstrap method, name and descriptor.
    pub fn invoke_dynamic(&self, index: u16) -> Result<(BootstrapMethod, String, String)> {
        match self.get(index)? {
            CpInfo::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                Ok((self.bootstrap_method(*bootstrap)?, name, descriptor))
            }
            _ => Err(self.mismatch(index, "InvokeDynamic")),
        }
    }

    pub fn bootstrap_method(&self, index: u16) -> Result<BootstrapMethod> {
        let entry = self
            .bootstrap_methods
            .get(index as usize)
            .ok_or(Error::InvalidBootstrapMethodIndex(index))?;
        let handle = self.method_handle(entry.method_ref)?;
        let arguments = entry
            .arguments
            .iter()
            .map(|&arg| self.bootstrap_argument(arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(BootstrapMethod { handle, arguments })
    }

    fn bootstrap_argument(&self, index: u16) -> Result<BootstrapArgument> {
        Ok(match self.get(index)? {
            CpInfo::Integer(value) => BootstrapArgument::Integer(*value),
            CpInfo::Float(value) => BootstrapArgument::Float(*value),
            CpInfo::Long(value) => BootstrapArgument::Long(*value),
            CpInfo::Double(value) => BootstrapArgument::Double(*value),
            CpInfo::Class(name) => BootstrapArgument::Class(self.get_utf8(*name)?.to_string()),
            CpInfo::String(value) => BootstrapArgument::String(self.get_utf8(*value)?.to_string()),
            CpInfo::MethodHandle { .. } => BootstrapArgument::MethodHandle(self.method_handle(index)?),
            CpInfo::MethodType(desc) => {
                BootstrapArgument::MethodType(self.get_utf8(*desc)?.to_string())
            }
            CpInfo::Dynamic { name_and_type, .. } => {
                let (name, descriptor) = self.name_and_type(*name_and_type)?;
                BootstrapArgument::Dynamic { name, descriptor }
            }
            _ => return Err(self.mismatch(index, "loadable constant")),
        })
    }
}

/// Decodes the JVM's "modified UTF-8" (JVMS 4.4.7): `U+0000` is encoded as
/// `C0 80` and supplementary characters as surrogate pairs of 3-byte sequences.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidModifiedUtf8);
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let a = bytes[i] as u16;
        match bytes[i] {
            0x01..=0x7F => {
                units.push(a);
                i += 1;
            }
            0xC0..=0xDF => {
                let b = continuation(bytes, i + 1)?;
                units.push(((a & 0x1F) << 6) | b);
                i += 2;
            }
            0xE0..=0xEF => {
                let b = continuation(bytes, i + 1)?;
                let c = continuation(bytes, i + 2)?;
                units.push(((a & 0x0F) << 12) | (b << 6) | c);
                i += 3;
            }
            _ => return Err(Error::InvalidModifiedUtf8),
        }
    }
    String::from_utf16(&units).map_err(|_| Error::InvalidModifiedUtf8)
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        _ => Err(Error::InvalidModifiedUtf8),
    }
}
