//! Protocol transport adapters.
//!
//! This module contains adapters that implement the crate's
//! [`Transport`](crate::core::traits::Transport) seams on top of protocol
//! crates. The connector itself is transport-agnostic; enable the feature for
//! the wire protocol you need.

#[cfg(feature = "modbus-tcp")]
#[cfg_attr(docsrs, doc(cfg(feature = "modbus-tcp")))]
pub mod modbus;
