//! Per-call record of produced mirrors

use rustc_hash::FxHashMap;

/// One produced mirror class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredClass {
    /// Internal name of the mirror
    pub name: String,
    /// Internal name of the class it was rewritten from
    pub base: String,
    /// Encoded class bytes
    pub bytes: Vec<u8>,
}

struct MemoEntry {
    base: String,
    bytes: Option<Vec<u8>>,
}

/// Mirror names produced during one top-level rewrite, keyed by mirror name
///
/// A name is reserved before its base is rewritten, so a nested type that is
/// reached again while its own rewrite is pending is not descended into twice.
#[derive(Default)]
pub struct MirrorMemo {
    entries: FxHashMap<String, MemoEntry>,
    order: Vec<String>,
}

impl MirrorMemo {
    /// Empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `mirror` for `base`; false if it is already known
    pub fn reserve(&mut self, mirror: &str, base: &str) -> bool {
        if self.entries.contains_key(mirror) {
            return false;
        }
        self.entries.insert(
            mirror.to_string(),
            MemoEntry {
                base: base.to_string(),
                bytes: None,
            },
        );
        self.order.push(mirror.to_string());
        true
    }

    /// Store the finished bytes of a reserved mirror
    pub fn fill(&mut self, mirror: &str, bytes: Vec<u8>) -> bool {
        match self.entries.get_mut(mirror) {
            Some(entry) => {
                entry.bytes = Some(bytes);
                true
            }
            None => false,
        }
    }

    /// Whether `mirror` is reserved or finished
    pub fn contains(&self, mirror: &str) -> bool {
        self.entries.contains_key(mirror)
    }

    /// Whether `mirror` has finished bytes
    pub fn is_finished(&self, mirror: &str) -> bool {
        self.entries
            .get(mirror)
            .map_or(false, |entry| entry.bytes.is_some())
    }

    /// Number of known mirror names
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is known
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Finished mirrors in reservation order
    pub fn into_classes(mut self) -> Vec<MirroredClass> {
        self.order
            .into_iter()
            .filter_map(|name| {
                let entry = self.entries.remove(&name)?;
                let bytes = entry.bytes?;
                Some(MirroredClass {
                    name,
                    base: entry.base,
                    bytes,
                })
            })
            .collect()
    }
}
