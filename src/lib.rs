//! A persistent (copy-on-write, structurally shared) unicode rope.
//!
//! The data structure here is a reference counted B-tree with text payloads
//! in its leaves. Cloning a [`Rope`] is O(1) - it just bumps the refcount on
//! the root node. Edits copy the O(log n) nodes along the edited path and
//! share everything else with the version they were derived from, so keeping
//! old versions around (undo stacks, concurrent readers, ...) is cheap.
//!
//! Two things make this more than a byte rope:
//!
//! - All stored text is kept canonically composed. Edits renormalize the
//!   small window around the splice point, so combining characters join up
//!   with their base characters no matter how the edits were chunked.
//! - The [`transcode`] module bridges UTF-8 storage to UTF-16 / UTF-32
//!   consumers in both directions, with U+FFFD replacement for malformed
//!   input (or strict validation if you want errors instead).
//!
//! The `sync` feature (on by default) uses atomic refcounts, so rope
//! versions can be freely shared across threads for reading. Turn it off to
//! get cheaper non-atomic refcounts in single threaded programs.

mod error;
mod normalize;
mod segment;
mod text;
mod tree;

pub mod rope;
pub mod transcode;

pub use error::{Encoding, InvalidEncoding};
pub use rope::{RepeatedText, Rope, RopeSlice};
pub use text::Text;

// The whole point of the COW design is that `Shared::make_mut` either hands
// back the uniquely owned node or transparently clones a shared one. Arc and
// Rc have identical APIs for everything we use.
#[cfg(feature = "sync")]
pub(crate) type Shared<T> = std::sync::Arc<T>;
#[cfg(not(feature = "sync"))]
pub(crate) type Shared<T> = std::rc::Rc<T>;
