//! # Concrete store formats
//!
//! One module per on-disk version. A version module contains the formats of every record type that
//! version defines.

pub mod v2_2;
