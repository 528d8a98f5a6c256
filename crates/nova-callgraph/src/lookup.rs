use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::unit::ClassUnit;

/// The lookup capability itself failed (as opposed to "no such class").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to look up `{name}`: {message}")]
pub struct LookupError {
    pub name: String,
    pub message: String,
}

impl LookupError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Resolves an internal class name to the unit currently known under that name.
pub trait CodeUnitLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Option<Arc<ClassUnit>>, LookupError>;
}

/// A lookup that can also enumerate every unit it knows, used for bulk graph construction.
pub trait CodeUnitSource: CodeUnitLookup {
    fn all_code_units(&self) -> Vec<Arc<ClassUnit>>;
}

impl CodeUnitLookup for HashMap<String, Arc<ClassUnit>> {
    fn lookup(&self, name: &str) -> Result<Option<Arc<ClassUnit>>, LookupError> {
        Ok(self.get(name).cloned())
    }
}

impl CodeUnitSource for HashMap<String, Arc<ClassUnit>> {
    fn all_code_units(&self) -> Vec<Arc<ClassUnit>> {
        self.values().cloned().collect()
    }
}

impl<F> CodeUnitLookup for F
where
    F: Fn(&str) -> Result<Option<Arc<ClassUnit>>, LookupError> + Send + Sync,
{
    fn lookup(&self, name: &str) -> Result<Option<Arc<ClassUnit>>, LookupError> {
        self(name)
    }
}
