//! Domain model for kfaddr
//!
//! This module contains core domain types and errors that provide:
//! - A tagged query variant instead of a magic `length == 0`
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

pub use types::{AddressSpec, Query};

pub use errors::{MatchError, SpecError, SymbolizeError};
