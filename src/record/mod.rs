//! # Records
//!
//! Entity types persisted in fixed-size slots. Each entity type is a plain value; how it is laid out
//! on disk is decided by a [`StoreFormat`](crate::storage::format::StoreFormat).

mod node;

pub use node::{NodeRecord, NO_LABELS, NO_NEXT_PROPERTY, NO_NEXT_RELATIONSHIP};

/// # Record interface
///
/// The parts of a record every store needs, independent of the entity type.
pub trait Record {
  /// The id the record lives at.
  fn id(&self) -> u64;

  /// Whether the slot holds a live record.
  fn in_use(&self) -> bool;
}
