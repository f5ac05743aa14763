//! Mirror classes
//!
//! A mirror is a rewritten copy of a reference class whose self-references
//! point at a target type instead. Test-driver code compiled against the
//! reference type then runs unmodified against the target.
//!
//! - [`Patcher`] rewrites one reference type and every nested type it reaches
//! - [`NameMap`] maps reference names to target and mirror names
//! - [`MirrorMemo`] records the mirrors produced during one call

mod memo;
mod names;
mod patcher;

pub use memo::{MirrorMemo, MirroredClass};
pub use names::{top_level_mirror_name, NameMap};
pub use patcher::{ConstructionError, Mirror, Patcher};
