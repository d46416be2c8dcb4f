//! Hierarchical playlists and a cursor that plays them back.
//!
//! A [`PlayTree`] stores containers and leaves in an arena; a [`Cursor`]
//! walks one subtree in playback order, honouring per-container repeat
//! counts and shuffling, and opens a [`ConfigScope`] layer for every entry it
//! passes through.

pub mod config;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod model;
pub mod scope;
pub mod shuffle;
pub mod tree;

pub use cursor::Cursor;
pub use error::{Error, Result};
pub use model::{Entry, EntryFlags, EntryId, EntryKind, IterMode, Param, Step};
pub use scope::{ConfigScope, OptionStack, ScopeError};
pub use tree::PlayTree;
