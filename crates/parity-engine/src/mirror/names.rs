//! Mirror naming and descriptor renaming

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::classfile::{DescriptorError, MethodDescriptor, TypeDescriptor};
use crate::config::EngineConfig;

/// A fresh, collision-free top-level mirror name
pub fn top_level_mirror_name(config: &EngineConfig) -> String {
    format!(
        "{}/{}{}",
        config.mirror_package,
        config.mirror_prefix,
        Uuid::new_v4().simple()
    )
}

/// Class-name mapping for one top-level rewrite
///
/// The reference type maps to the target type; a nested type of the reference
/// (`Ref$X`) maps to the matching nested type of the mirror (`Mirror$X`).
#[derive(Debug, Clone)]
pub struct NameMap {
    reference: String,
    target: String,
    mirror: String,
    nested_prefix: String,
    separator: char,
}

impl NameMap {
    /// Mapping for `reference` → `target`, nesting under `mirror`
    pub fn new(reference: &str, target: &str, mirror: &str, separator: char) -> Self {
        Self {
            reference: reference.to_string(),
            target: target.to_string(),
            mirror: mirror.to_string(),
            nested_prefix: format!("{}{}", reference, separator),
            separator,
        }
    }

    /// Reference type name
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Target type name
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Top-level mirror name
    pub fn mirror(&self) -> &str {
        &self.mirror
    }

    /// Nesting separator
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Whether `name` is a nested type of the reference type
    pub fn is_nested(&self, name: &str) -> bool {
        name.len() > self.nested_prefix.len() && name.starts_with(&self.nested_prefix)
    }

    /// Mirror name of a nested type of the reference type
    pub fn nested_mirror_name(&self, nested: &str) -> Option<String> {
        if !self.is_nested(nested) {
            return None;
        }
        let rest = &nested[self.nested_prefix.len()..];
        Some(format!("{}{}{}", self.mirror, self.separator, rest))
    }

    /// New name of a class, if it changes
    pub fn map_class(&self, name: &str) -> Option<String> {
        if name == self.reference {
            Some(self.target.clone())
        } else {
            self.nested_mirror_name(name)
        }
    }

    /// Rename a field or method descriptor
    ///
    /// Returns `None` when nothing changes. Nested types the descriptor
    /// mentions are added to `discovered`.
    pub fn rename_descriptor(
        &self,
        text: &str,
        discovered: &mut BTreeSet<String>,
    ) -> Result<Option<String>, DescriptorError> {
        let map = |name: &str| self.map_class(name);
        if text.starts_with('(') {
            let descriptor = MethodDescriptor::parse(text)?;
            for ty in descriptor.params.iter().chain(std::iter::once(&descriptor.ret)) {
                self.note_nested(ty, discovered);
            }
            let renamed = descriptor.rename(map);
            Ok((renamed != descriptor).then(|| renamed.to_string()))
        } else {
            let descriptor = TypeDescriptor::parse(text)?;
            self.note_nested(&descriptor, discovered);
            Ok(descriptor.rename(map).map(|renamed| renamed.to_string()))
        }
    }

    fn note_nested(&self, ty: &TypeDescriptor, discovered: &mut BTreeSet<String>) {
        if let Some(name) = ty.object_name() {
            if self.is_nested(name) {
                discovered.insert(name.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> NameMap {
        NameMap::new("pkg/Ref", "sub/Target", "mirror/mabc", '$')
    }

    #[test]
    fn test_class_mapping() {
        let names = names();
        assert_eq!(names.map_class("pkg/Ref").as_deref(), Some("sub/Target"));
        assert_eq!(
            names.map_class("pkg/Ref$Node$Leaf").as_deref(),
            Some("mirror/mabc$Node$Leaf")
        );
        assert_eq!(names.map_class("pkg/Reference"), None);
        assert_eq!(names.map_class("pkg/Ref$"), None);
        assert_eq!(names.map_class("other/Type"), None);
    }

    #[test]
    fn test_descriptor_renaming_records_nested() {
        let names = names();
        let mut discovered = BTreeSet::new();
        let renamed = names
            .rename_descriptor("(Lpkg/Ref;[[Lpkg/Ref$Node;I)Lpkg/Ref$Pair;", &mut discovered)
            .unwrap();
        assert_eq!(
            renamed.as_deref(),
            Some("(Lsub/Target;[[Lmirror/mabc$Node;I)Lmirror/mabc$Pair;")
        );
        let found: Vec<_> = discovered.iter().map(String::as_str).collect();
        assert_eq!(found, ["pkg/Ref$Node", "pkg/Ref$Pair"]);

        assert_eq!(names.rename_descriptor("[I", &mut discovered).unwrap(), None);
        assert_eq!(
            names.rename_descriptor("(Lpkg/Other;)V", &mut discovered).unwrap(),
            None
        );
        assert!(names.rename_descriptor("(Lpkg/Ref", &mut discovered).is_err());
    }

    #[test]
    fn test_top_level_names_are_unique() {
        let config = EngineConfig::default();
        let a = top_level_mirror_name(&config);
        let b = top_level_mirror_name(&config);
        assert!(a.starts_with("mirror/m"));
        assert!(!a.contains('$'));
        assert_ne!(a, b);
    }
}
