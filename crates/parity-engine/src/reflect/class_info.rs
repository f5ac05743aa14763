//! Declared-member metadata for a decoded class
//!
//! Answers the questions the auditor and the patcher ask about a type:
//! which members exist, their visibility, and which trust tags they carry.

use rustc_hash::FxHashMap;

use crate::classfile::{access, BinaryClass, ClassFileError};
use crate::config::TagNames;

/// Trust tags recognized on members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Verification entry point
    Verify,
    /// Value generator
    Generator,
    /// Case producer
    Next,
    /// Test helper
    Helper,
}

impl Tag {
    /// Tags whose static members are trusted infrastructure
    pub const TRUSTED: [Tag; 3] = [Tag::Generator, Tag::Next, Tag::Helper];

    fn from_type_name(name: &str, tags: &TagNames) -> Option<Self> {
        if name == tags.verify {
            Some(Tag::Verify)
        } else if name == tags.generator {
            Some(Tag::Generator)
        } else if name == tags.next {
            Some(Tag::Next)
        } else if name == tags.helper {
            Some(Tag::Helper)
        } else {
            None
        }
    }
}

/// A declared field or method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Member name
    pub name: String,
    /// Member descriptor
    pub descriptor: String,
    /// Access flags
    pub access: u16,
    /// Recognized tags
    pub tags: Vec<Tag>,
}

impl MemberInfo {
    /// Whether the member is public
    pub fn is_public(&self) -> bool {
        self.access & access::PUBLIC != 0
    }

    /// Whether the member is static
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    /// Whether the member carries `tag`
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Whether the member carries any of `tags`
    pub fn has_any_tag(&self, tags: &[Tag]) -> bool {
        tags.iter().any(|tag| self.has_tag(*tag))
    }

    /// Whether the name marks a compiler-synthesized member
    pub fn is_synthetic_name(&self, separator: char) -> bool {
        self.name.contains(separator)
    }
}

/// Reflection view of one class
#[derive(Debug, Clone)]
pub struct ClassInfo {
    name: String,
    super_name: Option<String>,
    fields: Vec<MemberInfo>,
    methods: Vec<MemberInfo>,
    field_indices: FxHashMap<String, usize>,
    inner_classes: Vec<String>,
}

impl ClassInfo {
    /// Read member metadata out of a decoded class
    pub fn new(class: &BinaryClass, tags: &TagNames) -> Result<Self, ClassFileError> {
        let symbols = &class.symbols;
        let read_tags = |annotations: &[u32]| -> Result<Vec<Tag>, ClassFileError> {
            let mut found = Vec::new();
            for &index in annotations {
                if let Some(tag) = Tag::from_type_name(symbols.utf8(index)?, tags) {
                    found.push(tag);
                }
            }
            Ok(found)
        };

        let mut fields = Vec::with_capacity(class.fields.len());
        let mut field_indices = FxHashMap::default();
        for field in &class.fields {
            let (name, descriptor) = class.field_signature(field)?;
            field_indices.insert(name.to_string(), fields.len());
            fields.push(MemberInfo {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                access: field.access,
                tags: read_tags(&field.annotations)?,
            });
        }

        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            let (name, descriptor) = class.method_signature(method)?;
            methods.push(MemberInfo {
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                access: method.access,
                tags: read_tags(&method.annotations)?,
            });
        }

        let inner_classes = class
            .inner_classes
            .iter()
            .map(|entry| symbols.class_name(entry.inner).map(str::to_string))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name: class.name()?.to_string(),
            super_name: class.super_name()?.map(str::to_string),
            fields,
            methods,
            field_indices,
            inner_classes,
        })
    }

    /// Internal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Superclass internal name
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    /// Declared fields in declaration order
    pub fn fields(&self) -> &[MemberInfo] {
        &self.fields
    }

    /// Declared methods in declaration order
    pub fn methods(&self) -> &[MemberInfo] {
        &self.methods
    }

    /// Declared field by name
    pub fn field(&self, name: &str) -> Option<&MemberInfo> {
        self.field_indices.get(name).map(|&index| &self.fields[index])
    }

    /// Declared method by name and descriptor
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MemberInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Declared methods (all overloads) with a name
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MemberInfo> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    /// The method carrying the verification tag, if any
    pub fn verify_method(&self) -> Option<&MemberInfo> {
        self.methods.iter().find(|m| m.has_tag(Tag::Verify))
    }

    /// Internal names listed in the inner-class table
    pub fn inner_class_names(&self) -> &[String] {
        &self.inner_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassBuilder;

    fn widget() -> BinaryClass {
        let tags = TagNames::default();
        let mut builder = ClassBuilder::new("Widget");
        builder.field(access::PUBLIC, "size", "I");
        builder.tagged_field(access::STATIC, "seed", "I", &[tags.helper.as_str()]);
        builder
            .method(access::PUBLIC | access::STATIC, "gen", "()I")
            .tag(&tags.generator)
            .const_i32(1)
            .ret()
            .finish();
        builder
            .method(access::PUBLIC, "check", "(LWidget;)V")
            .tag(&tags.verify)
            .ret_void()
            .finish();
        builder.inner_class("Widget$Part", Some("Widget"), Some("Part"), access::PRIVATE);
        builder.build()
    }

    #[test]
    fn test_members_and_tags() {
        let info = ClassInfo::new(&widget(), &TagNames::default()).unwrap();
        assert_eq!(info.name(), "Widget");
        assert!(info.field("size").unwrap().is_public());

        let seed = info.field("seed").unwrap();
        assert!(seed.is_static() && seed.has_tag(Tag::Helper));

        let gen = info.method("gen", "()I").unwrap();
        assert!(gen.has_any_tag(&Tag::TRUSTED));
        assert_eq!(info.verify_method().unwrap().name, "check");
        assert_eq!(info.inner_class_names(), ["Widget$Part".to_string()]);
    }

    #[test]
    fn test_custom_tag_names() {
        let custom = TagNames {
            generator: "other/Gen".to_string(),
            ..TagNames::default()
        };
        let info = ClassInfo::new(&widget(), &custom).unwrap();
        assert!(info.method("gen", "()I").unwrap().tags.is_empty());
    }
}
