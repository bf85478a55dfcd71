//! # regbus
//!
//! A schema-driven Modbus holding-register codec and polling connector.
//!
//! `regbus` maps named logical variables onto fixed-width fields packed
//! across 16-bit holding registers and keeps a local register image
//! synchronized with a remote device over a pluggable register transport.
//!
//! ## Features
//!
//! - **Register schema**: variable name → data kind → register offset, built
//!   in code or parsed from device configuration text
//! - **Value codec**: exact pack/unpack of 16/32/64-bit integers and IEEE
//!   floats into register words, with device-faithful word-order rules
//! - **Polling connector**: connect / single-flight poll / write /
//!   disconnect, delivering decoded field maps to a reception callback
//! - **Device emulator**: in-memory slave for round-trip testing
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use regbus::prelude::*;
//! use regbus::protocols::modbus::TcpTransportFactory;
//!
//! let layout = r#""Day" : {"offset" : 1282, "type" : "ushort"},"#;
//! let config = ConnectorConfig::tcp("192.168.1.100:502");
//! let factory = Arc::new(TcpTransportFactory::from_config(&config));
//!
//! let connector = ModbusConnector::from_layout_text(config, layout, factory)?;
//! connector.connect().await?;
//! connector.poll().await;
//! let day = connector.get("Day")?;
//! ```
//!
//! ## Scope
//!
//! The Modbus wire protocol itself (framing, MBAP header, CRC) is not
//! implemented here. The production transport is an adapter over the
//! `voltage_modbus` crate, enabled with the `modbus-tcp` feature; everything
//! in this crate operates at the holding-register level above it.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod connector;
pub mod core;
pub mod emulator;
pub mod image;
pub mod protocols;
pub mod schema;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::connector::{ConnectorConfig, ModbusConnector};
    pub use crate::core::{
        data::{FieldMap, Value},
        error::{CodecError, ConnectorError, Result, SchemaError},
        traits::*,
    };
    pub use crate::image::{RegisterImage, OUT_OF_RANGE_WORD};
    pub use crate::schema::{parse_layout, DataKind, RegisterSchema, SchemaEntry};
}

// Re-export core types at crate root for convenience
pub use crate::connector::{ConnectorConfig, ModbusConnector};
pub use crate::core::data::{FieldMap, Value};
pub use crate::core::error::{CodecError, ConnectorError, Result, SchemaError};
pub use crate::core::traits::{
    ConnectorState, Diagnostics, ReceptionCallback, Transport, TransportFactory,
};
pub use crate::emulator::DeviceEmulator;
pub use crate::image::{RegisterImage, OUT_OF_RANGE_WORD};
pub use crate::schema::{parse_layout, DataKind, RegisterSchema, SchemaEntry};
