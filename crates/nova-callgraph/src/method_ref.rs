use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Symbolic reference to a method: internal owner name, method name and descriptor.
///
/// Renders as `java/lang/String.valueOf(I)Ljava/lang/String;`, which is also the
/// format accepted by [`FromStr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// `true` for constructors and static initializers.
    pub fn is_initializer(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseMethodRefError {
    #[error("expected `owner.name(descriptor)`, got `{0}`")]
    Malformed(String),
    #[error("invalid method descriptor in `{input}`: {source}")]
    Descriptor {
        input: String,
        #[source]
        source: nova_classfile::Error,
    },
}

impl FromStr for MethodRef {
    type Err = ParseMethodRefError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseMethodRefError::Malformed(input.to_string());

        let paren = input.find('(').ok_or_else(malformed)?;
        let (qualified, descriptor) = input.split_at(paren);
        // Owner names use `/` separators, so the last `.` splits owner from name.
        let (owner, name) = qualified.rsplit_once('.').ok_or_else(malformed)?;
        if owner.is_empty() || name.is_empty() {
            return Err(malformed());
        }

        nova_classfile::parse_method_descriptor(descriptor).map_err(|source| {
            ParseMethodRefError::Descriptor {
                input: input.to_string(),
                source,
            }
        })?;

        Ok(Self::new(owner, name, descriptor))
    }
}
