//! Audit violations and their causal chains

use std::fmt;
use thiserror::Error;

use crate::mirror::ConstructionError;

/// The member an offending instruction reaches
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessedMember {
    /// A field, by name
    Field(String),
    /// A method, by name and descriptor
    Method {
        /// Method name
        name: String,
        /// Method descriptor
        descriptor: String,
    },
}

impl AccessedMember {
    /// Member name
    pub fn name(&self) -> &str {
        match self {
            AccessedMember::Field(name) => name,
            AccessedMember::Method { name, .. } => name,
        }
    }
}

impl fmt::Display for AccessedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessedMember::Field(name) => write!(f, "field {}", name),
            AccessedMember::Method { name, descriptor } => {
                write!(f, "method {}{}", name, descriptor)
            }
        }
    }
}

/// Illegal access to a non-public member of the type under test
///
/// `blame_method` in `blame_class` is the caller. When the access was found
/// through a nested type or a synthesized accessor, `cause` holds the
/// violation found there, so the outermost caller is always the one named.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{blame_class}.{blame_method} accesses non-public {member} of the type under test")]
pub struct AuditViolation {
    /// Offending caller method
    pub blame_method: String,
    /// Class declaring the caller
    pub blame_class: String,
    /// The member reached
    pub member: AccessedMember,
    /// Violation this one was derived from
    #[source]
    pub cause: Option<Box<AuditViolation>>,
}

impl AuditViolation {
    /// A violation with no predecessor
    pub fn new(
        blame_method: impl Into<String>,
        blame_class: impl Into<String>,
        member: AccessedMember,
    ) -> Self {
        Self {
            blame_method: blame_method.into(),
            blame_class: blame_class.into(),
            member,
            cause: None,
        }
    }

    /// Attribute `cause` to an outer caller, keeping the accessed member
    pub fn chained(
        blame_method: impl Into<String>,
        blame_class: impl Into<String>,
        cause: AuditViolation,
    ) -> Self {
        Self {
            blame_method: blame_method.into(),
            blame_class: blame_class.into(),
            member: cause.member.clone(),
            cause: Some(Box::new(cause)),
        }
    }

    /// The innermost violation of the chain
    pub fn root(&self) -> &AuditViolation {
        let mut current = self;
        while let Some(cause) = &current.cause {
            current = cause;
        }
        current
    }

    /// Every violation of the chain, outermost first
    pub fn chain(&self) -> impl Iterator<Item = &AuditViolation> {
        std::iter::successors(Some(self), |v| v.cause.as_deref())
    }
}

/// Audit failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// The reference type reaches a non-public member
    #[error(transparent)]
    Violation(#[from] AuditViolation),

    /// A class needed by the audit is missing or malformed
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_chain_walks_to_root() {
        let inner = AuditViolation::new(
            "poke",
            "pkg/Ref$Helper",
            AccessedMember::Field("secret".into()),
        );
        let outer = AuditViolation::chained("check", "pkg/Ref", inner.clone());

        assert_eq!(outer.member, AccessedMember::Field("secret".into()));
        assert_eq!(outer.root(), &inner);
        assert_eq!(outer.chain().count(), 2);
        assert_eq!(
            outer.to_string(),
            "pkg/Ref.check accesses non-public field secret of the type under test"
        );
        let source = outer.source().unwrap();
        assert!(source.to_string().starts_with("pkg/Ref$Helper.poke"));
    }
}
