//! # Paged record storage
//!
//! The generic machinery behind every record store: the file system interface, the page cache, id
//! generation, the format and cursor abstractions, and the store engine that ties them together.

pub mod cursor;
pub mod format;
pub mod ids;
pub mod paging;
pub mod store;
pub mod vfs;
