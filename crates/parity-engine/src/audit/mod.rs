//! Member access auditing of reference types
//!
//! Once a mirror exists, calls that test-driver code makes on "its own" type
//! land in submission code. The audit proves those calls only reach the
//! type's public contract or trusted helpers before any mirror is trusted.

mod auditor;
mod violation;

pub use auditor::Auditor;
pub use violation::{AccessedMember, AuditError, AuditViolation};
