//! # Recstore
//!
//! A fixed-size record store: typed records live in equally sized slots of a single file, read and
//! written through a page cache. Slot `id` sits at `header_size + id * record_size`.
//!
//! - [`storage::store::StandardStore`] is the store engine. It is generic over a
//!   [`storage::format::StoreFormat`], which fixes the record layout, and over an
//!   [`storage::ids::IdGenerator`].
//! - Reads go through cursors that never lock: they validate page stamps after reading and ask the
//!   caller to retry when a write raced them. See [`storage::cursor`].
//! - [`format::v2_2`] is the version 2.2 node format; [`direct::DirectNodeStore`] is an independent
//!   implementation of the same layout without a page cache.

pub mod config;
pub mod direct;
pub mod error;
pub mod format;
pub mod record;
pub mod storage;

pub use error::{Result, StoreError};
