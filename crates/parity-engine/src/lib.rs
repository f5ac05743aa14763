//! Parity Engine
//!
//! Runs test-driver code written against a trusted reference type, unmodified,
//! against an untrusted submission type:
//! - **Class files**: codec, assembler and structural verifier (`classfile`)
//! - **Runtime**: isolated class spaces and an interpreter (`vm`)
//! - **Mirrors**: reference classes rewritten onto a target type (`mirror`)
//! - **Audit**: proof that test-driver code only uses the public contract (`audit`)
//! - **Proxies**: live adapters forwarding to a backing instance (`proxy`)
//!
//! # Example
//!
//! ```rust,ignore
//! use parity_engine::{ComparisonSession, EngineConfig, MapClassSource};
//!
//! let session = ComparisonSession::new(&base_space, source, EngineConfig::default());
//! session.audit("lab/Counter")?;
//! let mirror = session.mirror("lab/Counter", "student/Counter")?;
//! let result = session.interpreter().invoke_static(
//!     mirror.name(),
//!     "check",
//!     "(Lstudent/Counter;)I",
//!     vec![submission.into()],
//! )?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Binary class model: codec, assembler and verifier
pub mod classfile;

/// Member metadata and trust tags
pub mod reflect;

/// Runtime: class spaces, objects and the interpreter
pub mod vm;

/// Symbol table patching
pub mod mirror;

/// Member access auditing
pub mod audit;

/// Proxy forwarding and the instantiator cache
pub mod proxy;

/// Engine configuration
pub mod config;

/// Bytecode providers
pub mod source;

/// Comparative-run facade
pub mod session;

/// Aggregated error type
pub mod error;

// ============================================================================
// Re-exports
// ============================================================================

pub use audit::{AccessedMember, AuditError, AuditViolation, Auditor};
pub use classfile::{BinaryClass, ClassBuilder, ClassFileError};
pub use config::{ConfigError, EngineConfig, TagNames};
pub use error::{EngineError, EngineResult};
pub use mirror::{ConstructionError, Mirror, MirroredClass, Patcher};
pub use proxy::{create_proxy, ForwardingFailure};
pub use session::{ComparisonSession, LoadedMirror};
pub use source::{ClassSource, MapClassSource};
pub use vm::{BytesClassLoader, ClassSpace, Interpreter, LoadError, ObjectRef, Value, VmError};
