//! Isolated class-loading namespaces
//!
//! A [`ClassSpace`] maps internal names to defined classes and falls back to
//! its parent on lookup. A [`BytesClassLoader`] defines classes from raw
//! bytes into one space after decoding and verifying them.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::class::RuntimeClass;
use crate::classfile::{verify_class, BinaryClass, ClassFileError, VerifyError};

/// Why a class could not be defined
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    /// Bytes did not decode
    #[error(transparent)]
    ClassFile(#[from] ClassFileError),

    /// Structural checks rejected the class
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// The space already defines a class with this name
    #[error("class is already defined in this space")]
    Duplicate,

    /// Superclass is not defined in the space or its parents
    #[error("superclass {0} is not defined")]
    MissingSuperclass(String),
}

/// Class definition failure, naming the class
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to load class {class}: {source}")]
pub struct LoadError {
    /// Internal name, or `<unknown>` when the bytes did not decode
    pub class: String,
    /// What went wrong
    #[source]
    pub source: LoadFailure,
}

impl LoadError {
    fn new(class: impl Into<String>, source: impl Into<LoadFailure>) -> Self {
        Self {
            class: class.into(),
            source: source.into(),
        }
    }
}

/// A class-loading namespace
pub struct ClassSpace {
    parent: Option<Arc<ClassSpace>>,
    classes: RwLock<FxHashMap<String, Arc<RuntimeClass>>>,
}

impl ClassSpace {
    /// Create a root space
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            classes: RwLock::new(FxHashMap::default()),
        })
    }

    /// Create a child space that falls back to `parent`
    pub fn child(parent: &Arc<ClassSpace>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            classes: RwLock::new(FxHashMap::default()),
        })
    }

    /// Parent space
    pub fn parent(&self) -> Option<&Arc<ClassSpace>> {
        self.parent.as_ref()
    }

    /// Find a class here or in a parent
    pub fn lookup(&self, name: &str) -> Option<Arc<RuntimeClass>> {
        if let Some(class) = self.classes.read().get(name) {
            return Some(Arc::clone(class));
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Whether this space itself defines `name`
    pub fn defines(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// Number of classes defined in this space
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Whether this space defines nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, class: Arc<RuntimeClass>) -> Result<(), LoadFailure> {
        let mut classes = self.classes.write();
        if classes.contains_key(class.name()) {
            return Err(LoadFailure::Duplicate);
        }
        classes.insert(class.name().to_string(), class);
        Ok(())
    }

    fn remove(&self, name: &str) {
        self.classes.write().remove(name);
    }
}

/// Defines classes from raw bytes into one space
#[derive(Clone)]
pub struct BytesClassLoader {
    space: Arc<ClassSpace>,
}

impl BytesClassLoader {
    /// Loader defining into `space`
    pub fn new(space: Arc<ClassSpace>) -> Self {
        Self { space }
    }

    /// Target space
    pub fn space(&self) -> &Arc<ClassSpace> {
        &self.space
    }

    /// Decode, verify, link and define one class
    pub fn define_class(&self, bytes: &[u8]) -> Result<Arc<RuntimeClass>, LoadError> {
        let binary =
            BinaryClass::decode(bytes).map_err(|e| LoadError::new("<unknown>", e))?;
        self.define_binary(binary)
    }

    /// Verify, link and define an already decoded class
    pub fn define_binary(&self, binary: BinaryClass) -> Result<Arc<RuntimeClass>, LoadError> {
        let name = binary
            .name()
            .map_err(|e| LoadError::new("<unknown>", e))?
            .to_string();
        verify_class(&binary).map_err(|e| LoadError::new(&name, e))?;
        self.link_verified(name, binary)
    }

    fn link_verified(
        &self,
        name: String,
        binary: BinaryClass,
    ) -> Result<Arc<RuntimeClass>, LoadError> {
        if self.space.defines(&name) {
            return Err(LoadError::new(&name, LoadFailure::Duplicate));
        }

        let superclass = match binary.super_name().map_err(|e| LoadError::new(&name, e))? {
            Some(super_name) => Some(self.space.lookup(super_name).ok_or_else(|| {
                LoadError::new(&name, LoadFailure::MissingSuperclass(super_name.to_string()))
            })?),
            None => None,
        };

        let class = Arc::new(
            RuntimeClass::link(Arc::new(binary), superclass)
                .map_err(|e| LoadError::new(&name, e))?,
        );
        self.space
            .insert(Arc::clone(&class))
            .map_err(|e| LoadError::new(&name, e))?;
        debug!(class = %name, id = ?class.id(), "defined class");
        Ok(class)
    }

    /// Define a batch of classes that may extend one another
    ///
    /// Classes are defined superclass-first regardless of input order. The
    /// whole batch is verified before anything is defined, and a failure
    /// while linking removes the classes the batch already defined.
    pub fn define_classes<'a, I>(&self, batch: I) -> Result<Vec<Arc<RuntimeClass>>, LoadError>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut pending = Vec::new();
        let mut names = FxHashSet::default();
        for bytes in batch {
            let binary =
                BinaryClass::decode(bytes).map_err(|e| LoadError::new("<unknown>", e))?;
            let name = binary
                .name()
                .map_err(|e| LoadError::new("<unknown>", e))?
                .to_string();
            verify_class(&binary).map_err(|e| LoadError::new(&name, e))?;
            if self.space.defines(&name) || !names.insert(name.clone()) {
                return Err(LoadError::new(&name, LoadFailure::Duplicate));
            }
            let super_name = binary
                .super_name()
                .map_err(|e| LoadError::new(&name, e))?
                .map(str::to_string);
            pending.push((name, super_name, binary));
        }

        let mut defined: Vec<Arc<RuntimeClass>> = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let waiting: FxHashSet<String> =
                pending.iter().map(|(name, _, _)| name.clone()).collect();
            let ready = pending.iter().position(|(_, super_name, _)| {
                super_name
                    .as_ref()
                    .map_or(true, |super_name| !waiting.contains(super_name))
            });
            // A cycle: define in order and let the missing superclass surface
            let (name, _, binary) = pending.remove(ready.unwrap_or(0));
            match self.link_verified(name, binary) {
                Ok(class) => defined.push(class),
                Err(err) => {
                    for class in &defined {
                        self.space.remove(class.name());
                    }
                    return Err(err);
                }
            }
        }
        Ok(defined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{access, ClassBuilder};

    fn bytes_of(builder: ClassBuilder) -> Vec<u8> {
        builder.build().encode()
    }

    #[test]
    fn test_define_and_lookup_through_parent() {
        let root = ClassSpace::new();
        let loader = BytesClassLoader::new(root.clone());
        loader
            .define_class(&bytes_of(ClassBuilder::new("Base")))
            .unwrap();

        let child = ClassSpace::child(&root);
        let mut derived = ClassBuilder::new("Derived");
        derived.extends("Base");
        let class = BytesClassLoader::new(child.clone())
            .define_class(&bytes_of(derived))
            .unwrap();

        assert_eq!(class.superclass().unwrap().name(), "Base");
        assert!(child.lookup("Base").is_some());
        assert!(root.lookup("Derived").is_none());
        assert_eq!(child.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let loader = BytesClassLoader::new(ClassSpace::new());
        let bytes = bytes_of(ClassBuilder::new("Once"));
        loader.define_class(&bytes).unwrap();
        let err = loader.define_class(&bytes).unwrap_err();
        assert_eq!(err.class, "Once");
        assert_eq!(err.source, LoadFailure::Duplicate);
    }

    #[test]
    fn test_verify_failure_surfaces() {
        let mut builder = ClassBuilder::new("Broken");
        builder.method(access::STATIC, "f", "()I").iadd().ret().finish();
        let err = BytesClassLoader::new(ClassSpace::new())
            .define_class(&bytes_of(builder))
            .unwrap_err();
        assert!(matches!(err.source, LoadFailure::Verify(_)));
        assert!(err.to_string().starts_with("Failed to load class Broken"));
    }

    #[test]
    fn test_batch_orders_superclasses() {
        let mut leaf = ClassBuilder::new("Leaf");
        leaf.extends("Middle");
        let mut middle = ClassBuilder::new("Middle");
        middle.extends("Root");
        let batch = [
            bytes_of(leaf),
            bytes_of(middle),
            bytes_of(ClassBuilder::new("Root")),
        ];

        let loader = BytesClassLoader::new(ClassSpace::new());
        let defined = loader
            .define_classes(batch.iter().map(Vec::as_slice))
            .unwrap();
        let names: Vec<_> = defined.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["Root", "Middle", "Leaf"]);
    }

    #[test]
    fn test_batch_verified_before_defining() {
        let mut broken = ClassBuilder::new("Broken");
        broken.method(access::STATIC, "f", "()I").iadd().ret().finish();
        let batch = [bytes_of(ClassBuilder::new("Fine")), bytes_of(broken)];

        let space = ClassSpace::new();
        let err = BytesClassLoader::new(space.clone())
            .define_classes(batch.iter().map(Vec::as_slice))
            .unwrap_err();
        assert_eq!(err.class, "Broken");
        assert!(matches!(err.source, LoadFailure::Verify(_)));
        assert!(space.is_empty());
    }

    #[test]
    fn test_batch_link_failure_leaves_space_unchanged() {
        let mut orphan = ClassBuilder::new("Orphan");
        orphan.extends("Nowhere");
        let batch = [bytes_of(ClassBuilder::new("Root")), bytes_of(orphan)];

        let space = ClassSpace::new();
        let err = BytesClassLoader::new(space.clone())
            .define_classes(batch.iter().map(Vec::as_slice))
            .unwrap_err();
        assert_eq!(err.class, "Orphan");
        assert!(space.is_empty());
    }

    #[test]
    fn test_missing_superclass() {
        let mut orphan = ClassBuilder::new("Orphan");
        orphan.extends("Nowhere");
        let err = BytesClassLoader::new(ClassSpace::new())
            .define_class(&bytes_of(orphan))
            .unwrap_err();
        assert_eq!(
            err.source,
            LoadFailure::MissingSuperclass("Nowhere".to_string())
        );
    }
}
