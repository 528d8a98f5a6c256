use std::sync::Arc;

use crate::code::{decode_code_attribute, Instruction};
use crate::constant_pool::{BootstrapEntry, ConstantPool};
use crate::error::{Error, Result};
use crate::reader::Reader;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    pub signature: Option<String>,
    /// Shared with every method body so instructions can be decoded lazily.
    pub constant_pool: Arc<ConstantPool>,
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    /// Raw body of the `Code` attribute, if the member has one.
    ///
    /// The body is only decoded on demand (see [`ClassFile::method_instructions`]),
    /// so a malformed method does not prevent the rest of the class from loading.
    pub code: Option<Arc<[u8]>>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != 0xCAFEBABE {
            return Err(Error::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let mut cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class_idx = reader.read_u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_member(&mut reader, &cp)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_member(&mut reader, &cp)?);
        }

        let class_attrs = parse_class_attributes(&mut reader, &cp)?;
        reader.ensure_empty()?;
        cp.set_bootstrap_methods(class_attrs.bootstrap_methods);

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            signature: class_attrs.signature,
            constant_pool: Arc::new(cp),
        })
    }

    /// Decodes the invocation instructions of `self.methods[index]`.
    ///
    /// Members without a `Code` attribute (abstract/native) yield no instructions.
    pub fn method_instructions(&self, index: usize) -> Result<Vec<Instruction>> {
        match self.methods.get(index).and_then(|m| m.code.as_deref()) {
            Some(code) => decode_code_attribute(code, &self.constant_pool),
            None => Ok(Vec::new()),
        }
    }
}

fn parse_member(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ClassMember> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();

    let mut signature = None;
    let mut code = None;
    let attributes_count = reader.read_u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        match cp.get_utf8(name_index)? {
            "Signature" => signature = Some(parse_signature(info, cp)?),
            "Code" => code = Some(Arc::from(info)),
            _ => {}
        }
    }

    Ok(ClassMember {
        access_flags,
        name,
        descriptor,
        signature,
        code,
    })
}

#[derive(Default)]
struct ClassAttributes {
    signature: Option<String>,
    bootstrap_methods: Vec<BootstrapEntry>,
}

fn parse_class_attributes(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<ClassAttributes> {
    let attributes_count = reader.read_u2()? as usize;
    let mut parsed = ClassAttributes::default();
    for _ in 0..attributes_count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        match cp.get_utf8(name_index)? {
            "Signature" => parsed.signature = Some(parse_signature(info, cp)?),
            "BootstrapMethods" => {
                let mut sub = Reader::new(info);
                let num = sub.read_u2()? as usize;
                let mut methods = Vec::with_capacity(num);
                for _ in 0..num {
                    let method_ref = sub.read_u2()?;
                    let arg_count = sub.read_u2()? as usize;
                    let mut arguments = Vec::with_capacity(arg_count);
                    for _ in 0..arg_count {
                        arguments.push(sub.read_u2()?);
                    }
                    methods.push(BootstrapEntry {
                        method_ref,
                        arguments,
                    });
                }
                sub.ensure_empty()
                    .map_err(|_| Error::MalformedAttribute("BootstrapMethods"))?;
                parsed.bootstrap_methods = methods;
            }
            _ => {
                // Unknown attribute: intentionally skipped.
            }
        }
    }
    Ok(parsed)
}

fn parse_signature(info: &[u8], cp: &ConstantPool) -> Result<String> {
    let mut sub = Reader::new(info);
    let index = sub.read_u2()?;
    sub.ensure_empty()
        .map_err(|_| Error::MalformedAttribute("Signature"))?;
    Ok(cp.get_utf8(index)?.to_string())
}
