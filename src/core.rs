//! Core abstractions for the register connector.
//!
//! This module provides the value model, error taxonomy and trait seams the
//! rest of the crate builds on.

pub mod data;
pub mod error;
pub mod traits;

pub use data::*;
pub use error::{CodecError, ConnectorError, Result, SchemaError};
pub use traits::*;
