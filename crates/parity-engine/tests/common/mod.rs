//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parity_engine::classfile::{BinaryClass, ClassBuilder};
use parity_engine::{BytesClassLoader, ClassSpace, ComparisonSession, EngineConfig, MapClassSource};

/// Reference and submission classes, available both as bytes and as
/// defined classes in a base space
pub struct Fixture {
    classes: Vec<BinaryClass>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
        }
    }

    pub fn add(&mut self, builder: ClassBuilder) -> &mut Self {
        self.classes.push(builder.build());
        self
    }

    /// Register every class with a source without defining any
    pub fn source(&self) -> Arc<MapClassSource> {
        let source = MapClassSource::new();
        for class in &self.classes {
            source.insert_class(class).unwrap();
        }
        Arc::new(source)
    }

    /// Define every class in a fresh base space
    pub fn space(&self) -> Arc<ClassSpace> {
        let space = ClassSpace::new();
        let encoded: Vec<Vec<u8>> = self.classes.iter().map(BinaryClass::encode).collect();
        BytesClassLoader::new(space.clone())
            .define_classes(encoded.iter().map(Vec::as_slice))
            .unwrap();
        space
    }

    pub fn session(&self) -> ComparisonSession {
        ComparisonSession::new(&self.space(), self.source(), EngineConfig::default())
    }
}

/// Tag type names of the default configuration
pub fn tags() -> parity_engine::TagNames {
    parity_engine::TagNames::default()
}
