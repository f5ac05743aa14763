//! One comparative run
//!
//! A [`ComparisonSession`] audits reference types, mirrors them onto
//! submission types and creates proxies. Mirrors are defined in a class space
//! private to the session; nothing rewrite-scoped outlives it.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::audit::{AuditError, AuditViolation, Auditor};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::mirror::{Mirror, Patcher};
use crate::proxy::create_proxy;
use crate::source::ClassSource;
use crate::vm::{BytesClassLoader, ClassSpace, Interpreter, ObjectRef, RuntimeClass, Value};

/// A mirror defined in a session's class space
#[derive(Debug)]
pub struct LoadedMirror {
    mirror: Mirror,
    class: Arc<RuntimeClass>,
}

impl LoadedMirror {
    /// Internal name of the top-level mirror
    pub fn name(&self) -> &str {
        self.mirror.name()
    }

    /// Produced classes and their bytes
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// The defined top-level mirror class
    pub fn class(&self) -> &Arc<RuntimeClass> {
        &self.class
    }
}

/// One comparative run against one submission
pub struct ComparisonSession {
    config: EngineConfig,
    source: Arc<dyn ClassSource>,
    loader: BytesClassLoader,
    interpreter: Interpreter,
    audits: Mutex<FxHashMap<String, Result<(), AuditViolation>>>,
    mirrors: Mutex<FxHashMap<(String, String), Arc<LoadedMirror>>>,
}

impl ComparisonSession {
    /// Start a run over `base`, which already defines the reference and
    /// submission classes; `source` provides their bytes
    pub fn new(
        base: &Arc<ClassSpace>,
        source: Arc<dyn ClassSource>,
        config: EngineConfig,
    ) -> Self {
        let space = ClassSpace::child(base);
        Self {
            config,
            source,
            loader: BytesClassLoader::new(Arc::clone(&space)),
            interpreter: Interpreter::new(space),
            audits: Mutex::new(FxHashMap::default()),
            mirrors: Mutex::new(FxHashMap::default()),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The session's private class space
    pub fn space(&self) -> &Arc<ClassSpace> {
        self.loader.space()
    }

    /// Interpreter executing in the session's class space
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Audit a reference type; the outcome is cached per reference
    pub fn audit(&self, reference: &str) -> EngineResult<()> {
        if let Some(outcome) = self.audits.lock().get(reference) {
            return outcome.clone().map_err(EngineError::from);
        }
        let outcome = match Auditor::new(&*self.source, &self.config).audit(reference) {
            Ok(()) => Ok(()),
            Err(AuditError::Violation(violation)) => Err(violation),
            Err(AuditError::Construction(err)) => return Err(err.into()),
        };
        self.audits
            .lock()
            .insert(reference.to_string(), outcome.clone());
        outcome.map_err(EngineError::from)
    }

    /// Mirror `reference` onto `target` and define the result
    ///
    /// Refuses references that fail the audit. Repeated calls with the same
    /// pair return the same mirror.
    pub fn mirror(&self, reference: &str, target: &str) -> EngineResult<Arc<LoadedMirror>> {
        let key = (reference.to_string(), target.to_string());
        let mut mirrors = self.mirrors.lock();
        if let Some(existing) = mirrors.get(&key) {
            return Ok(Arc::clone(existing));
        }

        self.audit(reference)?;
        let mirror = Patcher::new(&*self.source, &self.config).mirror(reference, target)?;
        self.loader
            .define_classes(mirror.classes().iter().map(|class| class.bytes.as_slice()))?;
        let class = self.interpreter.resolve_class(mirror.name())?;
        debug!(
            reference,
            target,
            mirror = mirror.name(),
            classes = mirror.classes().len(),
            "mirror defined"
        );

        let loaded = Arc::new(LoadedMirror { mirror, class });
        mirrors.insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Create a proxy of `supertype` forwarding to `backing`
    pub fn proxy(&self, supertype: &str, backing: &Value) -> EngineResult<ObjectRef> {
        let class = self.interpreter.resolve_class(supertype)?;
        Ok(create_proxy(
            &class,
            backing,
            &self.config.proxy_excluded_methods,
        )?)
    }
}
