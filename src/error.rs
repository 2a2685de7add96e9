//! # Error types
//!
//! Every fallible operation in the crate returns [`StoreError`]. The optimistic read retry signal
//! of a cursor is not an error and never shows up here.

use std::io;
use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// # Store errors
#[derive(Debug, Error)]
pub enum StoreError {
  /// A data operation was attempted while the store was not started.
  #[error("cannot {operation} while the store is {state}")]
  InvalidState {
    /// The rejected operation.
    operation: &'static str,
    /// Lifecycle state at the time of the call.
    state: &'static str,
  },

  /// The file on disk was written with a different layout than the bound format.
  #[error("format mismatch: {0}")]
  FormatMismatch(String),

  /// The file system or the page cache failed.
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  /// No more ids can be handed out.
  #[error("resource exhausted: {0}")]
  ResourceExhausted(String),

  /// The caller broke the cursor or lifecycle protocol.
  #[error("protocol misuse: {0}")]
  ProtocolMisuse(String),

  /// A record field does not fit into the slot the format reserves for it.
  #[error("{field} value {value} does not fit the record format")]
  RecordOutOfRange {
    /// Name of the offending field.
    field: &'static str,
    /// The rejected value.
    value: i128,
  },

  /// A configuration value was rejected.
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
}
