use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    let mut cursor = Cursor::new(desc);
    let ty = cursor.field_type()?;
    cursor.finish()?;
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let mut cursor = Cursor::new(desc);
    cursor.expect(b'(')?;
    let mut params = Vec::new();
    while cursor.peek() != Some(b')') {
        params.push(cursor.field_type()?);
    }
    cursor.expect(b')')?;

    let return_type = if cursor.peek() == Some(b'V') {
        cursor.pos += 1;
        ReturnType::Void
    } else {
        ReturnType::Type(cursor.field_type()?)
    };
    cursor.finish()?;

    Ok(MethodDescriptor { params, return_type })
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self) -> Error {
        Error::InvalidDescriptor(self.input.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.input.len() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn field_type(&mut self) -> Result<FieldType> {
        let tag = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;
        let base = match tag {
            b'B' => BaseType::Byte,
            b'C' => BaseType::Char,
            b'D' => BaseType::Double,
            b'F' => BaseType::Float,
            b'I' => BaseType::Int,
            b'J' => BaseType::Long,
            b'S' => BaseType::Short,
            b'Z' => BaseType::Boolean,
            b'L' => {
                let rest = &self.input[self.pos..];
                let end = rest.find(';').ok_or_else(|| self.error())?;
                if end == 0 {
                    return Err(self.error());
                }
                self.pos += end + 1;
                return Ok(FieldType::Object(rest[..end].to_string()));
            }
            b'[' => return Ok(FieldType::Array(Box::new(self.field_type()?))),
            _ => return Err(self.error()),
        };
        Ok(FieldType::Base(base))
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        })
    }
}

/// Java source spelling, e.g. `java.lang.String[]`.
impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(base) => fmt::Display::fmt(base, f),
            FieldType::Object(name) => f.write_str(&name.replace('/', ".")),
            FieldType::Array(component) => write!(f, "{component}[]"),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => f.write_str("void"),
            ReturnType::Type(ty) => fmt::Display::fmt(ty, f),
        }
    }
}
