//! Process-wide cache of generated proxy subtypes
//!
//! One subtype and one allocator exist per supertype for the lifetime of the
//! process. Lookup and creation happen under a single lock, so concurrent
//! first use of a supertype generates exactly one subtype.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::vm::{ClassId, Instantiator, MethodBody, ObjectRef, RuntimeClass, RuntimeMethod};

/// Suffix appended to the supertype name to name its proxy subtype
pub const PROXY_SUFFIX: &str = "$$Proxy";

/// A generated proxy subtype together with its allocator
pub struct ProxyInstantiator {
    supertype: Arc<RuntimeClass>,
    instantiator: Instantiator,
}

impl ProxyInstantiator {
    fn generate(supertype: &Arc<RuntimeClass>, excluded: &[String]) -> Self {
        let methods: Vec<RuntimeMethod> = supertype
            .overridable_methods()
            .into_iter()
            .filter(|method| !excluded.iter().any(|name| *name == method.name))
            .map(|method| RuntimeMethod {
                body: MethodBody::Intercepted,
                ..method
            })
            .collect();
        let name = format!("{}{}", supertype.name(), PROXY_SUFFIX);
        let class = Arc::new(RuntimeClass::synthesize(
            name,
            Arc::clone(supertype),
            methods,
        ));
        Self {
            supertype: Arc::clone(supertype),
            instantiator: Instantiator::new(class),
        }
    }

    /// Supertype the proxy class extends
    pub fn supertype(&self) -> &Arc<RuntimeClass> {
        &self.supertype
    }

    /// The generated subtype
    pub fn proxy_class(&self) -> &Arc<RuntimeClass> {
        self.instantiator.class()
    }

    /// Allocate a proxy object without running any constructor
    pub fn new_instance(&self) -> ObjectRef {
        self.instantiator.new_instance()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Generated subtypes keyed by supertype identity
struct InstantiatorRegistry {
    entries: FxHashMap<ClassId, Arc<ProxyInstantiator>>,
}

impl InstantiatorRegistry {
    fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

static INSTANTIATOR_REGISTRY: Lazy<Mutex<InstantiatorRegistry>> =
    Lazy::new(|| Mutex::new(InstantiatorRegistry::new()));

/// Get or create the proxy subtype for `supertype`
///
/// `excluded` names methods that are never intercepted. It only takes effect
/// when the subtype is first generated.
pub fn instantiator_for(
    supertype: &Arc<RuntimeClass>,
    excluded: &[String],
) -> Arc<ProxyInstantiator> {
    let mut registry = INSTANTIATOR_REGISTRY.lock();
    if let Some(existing) = registry.entries.get(&supertype.id()) {
        return Arc::clone(existing);
    }
    let created = Arc::new(ProxyInstantiator::generate(supertype, excluded));
    debug!(
        supertype = supertype.name(),
        proxy = created.proxy_class().name(),
        intercepted = created.proxy_class().methods().len(),
        "generated proxy subtype"
    );
    registry
        .entries
        .insert(supertype.id(), Arc::clone(&created));
    created
}
