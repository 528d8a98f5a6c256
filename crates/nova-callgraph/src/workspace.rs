//! In-memory workspace: one primary resource plus any number of libraries.
//!
//! Lookups consult the primary resource first, then libraries in the order they
//! were added. Mutations notify registered [`WorkspaceListener`]s after the
//! workspace state has changed and with no workspace lock held, so listeners may
//! query the workspace freely.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::lookup::{CodeUnitLookup, CodeUnitSource, LookupError};
use crate::unit::ClassUnit;

/// A named set of classes, keyed by internal name.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    name: String,
    classes: BTreeMap<String, Arc<ClassUnit>>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: BTreeMap::new(),
        }
    }

    pub fn with_classes(
        name: impl Into<String>,
        classes: impl IntoIterator<Item = Arc<ClassUnit>>,
    ) -> Self {
        let mut resource = Self::new(name);
        for class in classes {
            resource.insert(class);
        }
        resource
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds or replaces a class, returning the one it replaced.
    pub fn insert(&mut self, class: Arc<ClassUnit>) -> Option<Arc<ClassUnit>> {
        self.classes.insert(class.name.clone(), class)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ClassUnit>> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassUnit>> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Receives workspace mutation notifications. Every method defaults to a no-op.
pub trait WorkspaceListener: Send + Sync {
    fn on_class_added(&self, _class: &Arc<ClassUnit>) {}

    fn on_class_updated(&self, _old: &Arc<ClassUnit>, _new: &Arc<ClassUnit>) {}

    fn on_class_removed(&self, _class: &Arc<ClassUnit>) {}

    fn on_library_added(&self, _library: &Arc<Resource>) {}

    fn on_library_removed(&self, _library: &Arc<Resource>) {}
}

#[derive(Default)]
pub struct Workspace {
    primary: RwLock<Resource>,
    libraries: RwLock<Vec<Arc<Resource>>>,
    listeners: RwLock<Vec<Weak<dyn WorkspaceListener>>>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("primary", &self.primary.read().name)
            .field("primary_classes", &self.primary.read().len())
            .field("libraries", &self.libraries.read().len())
            .finish_non_exhaustive()
    }
}

impl Workspace {
    pub fn new(primary: Resource) -> Self {
        Self {
            primary: RwLock::new(primary),
            libraries: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Registers a listener. The workspace does not keep it alive.
    pub fn add_listener(&self, listener: Weak<dyn WorkspaceListener>) {
        self.listeners.write().push(listener);
    }

    /// Adds or replaces a class of the primary resource.
    pub fn put_class(&self, class: Arc<ClassUnit>) -> Option<Arc<ClassUnit>> {
        let old = self.primary.write().insert(Arc::clone(&class));
        match &old {
            Some(old) => self.notify(|l| l.on_class_updated(old, &class)),
            None => self.notify(|l| l.on_class_added(&class)),
        }
        old
    }

    pub fn remove_class(&self, name: &str) -> Option<Arc<ClassUnit>> {
        let removed = self.primary.write().classes.remove(name)?;
        self.notify(|l| l.on_class_removed(&removed));
        Some(removed)
    }

    pub fn add_library(&self, library: Resource) -> Arc<Resource> {
        let library = Arc::new(library);
        self.libraries.write().push(Arc::clone(&library));
        self.notify(|l| l.on_library_added(&library));
        library
    }

    pub fn remove_library(&self, name: &str) -> Option<Arc<Resource>> {
        let removed = {
            let mut libraries = self.libraries.write();
            let index = libraries.iter().position(|lib| lib.name == name)?;
            libraries.remove(index)
        };
        self.notify(|l| l.on_library_removed(&removed));
        Some(removed)
    }

    pub fn libraries(&self) -> Vec<Arc<Resource>> {
        self.libraries.read().clone()
    }

    /// The class visible under `name`: primary resource first, then libraries.
    pub fn class(&self, name: &str) -> Option<Arc<ClassUnit>> {
        if let Some(class) = self.primary.read().get(name) {
            return Some(Arc::clone(class));
        }
        self.libraries
            .read()
            .iter()
            .find_map(|lib| lib.get(name).cloned())
    }

    fn notify(&self, event: impl Fn(&dyn WorkspaceListener)) {
        let live: Vec<Arc<dyn WorkspaceListener>> = {
            let mut listeners = self.listeners.write();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            event(listener.as_ref());
        }
    }
}

impl CodeUnitLookup for Workspace {
    fn lookup(&self, name: &str) -> Result<Option<Arc<ClassUnit>>, LookupError> {
        Ok(self.class(name))
    }
}

impl CodeUnitSource for Workspace {
    /// Every visible class; library classes shadowed by an earlier resource are skipped.
    fn all_code_units(&self) -> Vec<Arc<ClassUnit>> {
        let primary = self.primary.read();
        let libraries = self.libraries.read();

        let mut seen = HashSet::new();
        let mut units = Vec::new();
        for class in primary
            .classes()
            .chain(libraries.iter().flat_map(|lib| lib.classes()))
        {
            if seen.insert(class.name.as_str()) {
                units.push(Arc::clone(class));
            }
        }
        units
    }
}
