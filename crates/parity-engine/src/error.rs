//! Engine error types.

use crate::audit::{AuditError, AuditViolation};
use crate::classfile::ClassFileError;
use crate::config::ConfigError;
use crate::mirror::ConstructionError;
use crate::proxy::ForwardingFailure;
use crate::vm::{LoadError, VmError};

/// Errors surfaced by a comparison session
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed class data
    #[error("Class file error: {0}")]
    ClassFile(#[from] ClassFileError),

    /// Mirror or audit input is missing or malformed
    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    /// Produced or submitted bytes were rejected by the loader
    #[error("{0}")]
    Load(#[from] LoadError),

    /// The reference type reaches a non-public member
    #[error("Audit violation: {0}")]
    Audit(#[from] AuditViolation),

    /// Proxy and backing type do not match
    #[error("Forwarding failure: {0}")]
    Forwarding(#[from] ForwardingFailure),

    /// Execution error
    #[error("Runtime error: {0}")]
    Vm(#[from] VmError),
}

impl From<AuditError> for EngineError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Violation(violation) => EngineError::Audit(violation),
            AuditError::Construction(err) => EngineError::Construction(err),
        }
    }
}

/// Result type for session operations
pub type EngineResult<T> = Result<T, EngineError>;
