//! Member introspection
//!
//! Visibility, declared members and trust tags of a decoded class.

mod class_info;
mod trusted;

pub use class_info::{ClassInfo, MemberInfo, Tag};
pub use trusted::TrustedMembers;
