//! Bytecode providers

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::classfile::{BinaryClass, ClassFileError};

/// Supplies the raw bytes of classes by internal name
pub trait ClassSource: Send + Sync {
    /// Bytes of the class named `name`, if available
    fn bytecode_for(&self, name: &str) -> Option<Arc<[u8]>>;

    /// Every class name this source can provide
    fn class_names(&self) -> Vec<String>;
}

/// In-memory class source
#[derive(Default)]
pub struct MapClassSource {
    classes: RwLock<FxHashMap<String, Arc<[u8]>>>,
}

impl MapClassSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register raw bytes under a name
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.classes.write().insert(name.into(), bytes.into());
    }

    /// Encode and register a decoded class, returning its name
    pub fn insert_class(&self, class: &BinaryClass) -> Result<String, ClassFileError> {
        let name = class.name()?.to_string();
        self.insert(name.clone(), class.encode());
        Ok(name)
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClassSource for MapClassSource {
    fn bytecode_for(&self, name: &str) -> Option<Arc<[u8]>> {
        self.classes.read().get(name).cloned()
    }

    fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }
}
