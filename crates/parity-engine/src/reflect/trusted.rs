//! Trusted test-infrastructure members

use rustc_hash::FxHashSet;

use super::class_info::{ClassInfo, Tag};

/// Static members of a reference type that are test infrastructure
///
/// Built fresh for every top-level rewrite. Methods are matched by name,
/// so every overload of a trusted name is trusted.
#[derive(Debug, Clone, Default)]
pub struct TrustedMembers {
    methods: FxHashSet<String>,
    fields: FxHashSet<String>,
}

impl TrustedMembers {
    /// Static Generator/Next/Helper methods and static Helper fields of `class`
    pub fn collect(class: &ClassInfo) -> Self {
        let methods = class
            .methods()
            .iter()
            .filter(|m| m.is_static() && m.has_any_tag(&Tag::TRUSTED))
            .map(|m| m.name.clone())
            .collect();
        let fields = class
            .fields()
            .iter()
            .filter(|f| f.is_static() && f.has_tag(Tag::Helper))
            .map(|f| f.name.clone())
            .collect();
        Self { methods, fields }
    }

    /// Whether a method name is trusted
    pub fn is_trusted_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }

    /// Whether a field name is trusted
    pub fn is_trusted_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Number of trusted members
    pub fn len(&self) -> usize {
        self.methods.len() + self.fields.len()
    }

    /// Whether nothing is trusted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{access, ClassBuilder};
    use crate::config::TagNames;

    #[test]
    fn test_only_static_tagged_members_are_trusted() {
        let tags = TagNames::default();
        let mut builder = ClassBuilder::new("Ref");
        builder.tagged_field(access::STATIC, "pool", "[I", &[tags.helper.as_str()]);
        builder.tagged_field(0, "cache", "I", &[tags.helper.as_str()]);
        builder
            .method(access::STATIC, "make", "()LRef;")
            .tag(&tags.generator)
            .const_null()
            .ret()
            .finish();
        builder
            .method(0, "step", "()V")
            .tag(&tags.next)
            .ret_void()
            .finish();
        builder
            .method(access::PUBLIC | access::STATIC, "plain", "()V")
            .ret_void()
            .finish();

        let info = ClassInfo::new(&builder.build(), &tags).unwrap();
        let trusted = TrustedMembers::collect(&info);
        assert!(trusted.is_trusted_method("make"));
        assert!(!trusted.is_trusted_method("step"));
        assert!(!trusted.is_trusted_method("plain"));
        assert!(trusted.is_trusted_field("pool"));
        assert!(!trusted.is_trusted_field("cache"));
        assert_eq!(trusted.len(), 2);
    }
}
