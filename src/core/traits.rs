//! Core traits and shared types for the register connector.
//!
//! The connector talks to the outside world through two seams:
//!
//! ```text
//! Layer 1: Transport (consumed)
//! ├── TransportFactory   // open(endpoint) -> Transport handle
//! └── Transport          // read_registers / write_registers / close
//!
//! Layer 2: Data delivery (exposed)
//! └── ReceptionCallback  // received(FieldMap) once per successful poll
//! ```
//!
//! The physical Modbus master (framing, MBAP header, CRC) lives behind
//! `Transport`; this crate only deals in spans of 16-bit holding registers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::data::FieldMap;
use crate::core::error::Result;

/// Connection state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorState {
    /// Not connected to the device.
    #[default]
    Disconnected,

    /// Connected and able to poll.
    Connected,

    /// The last connect attempt failed.
    Error,
}

impl ConnectorState {
    /// Check if currently connected.
    #[inline]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connect attempt is allowed from this state.
    #[inline]
    pub const fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl std::fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// An open register transport to one device.
///
/// Implementations block the calling task until the underlying
/// request/response transaction completes or fails; the connector performs no
/// queueing, retry or timeout handling on top of this. Register addressing is
/// zero-based and in 16-bit word units.
#[async_trait]
pub trait Transport: Send {
    /// Read `count` holding registers starting at `start`.
    async fn read_registers(&mut self, start: u16, count: usize) -> Result<Vec<u16>>;

    /// Write a block of holding registers starting at `start`.
    async fn write_registers(&mut self, start: u16, words: &[u16]) -> Result<()>;

    /// Release the underlying connection. Further calls on this handle fail.
    async fn close(&mut self) -> Result<()>;
}

/// Opens [`Transport`] handles for a given endpoint.
///
/// The production implementation is the TCP adapter in
/// [`protocols::modbus`](crate::protocols); the device emulator implements the
/// same trait so tests can run the full connector path in memory.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Open a transport to `endpoint` (`host:port`).
    ///
    /// Fails with [`ConnectorError::Connect`](crate::core::error::ConnectorError)
    /// when the device is unreachable.
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>>;
}

/// Callback invoked once per successful poll cycle with the decoded fields.
///
/// A cycle that fails at the transport layer produces no invocation; the
/// caller observes "no update" rather than an error.
#[async_trait]
pub trait ReceptionCallback: Send + Sync {
    /// Deliver the fully decoded field map of one poll cycle.
    async fn received(&self, fields: FieldMap);
}

/// Connector statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Connector name.
    pub connector: String,

    /// Current connection state.
    pub state: ConnectorState,

    /// Number of completed poll read cycles.
    pub read_count: u64,

    /// Number of successful register writes.
    pub write_count: u64,

    /// Number of transport/connect errors observed.
    pub error_count: u64,

    /// Last error message, if any.
    pub last_error: Option<String>,

    /// Timestamp of the last successful poll cycle.
    pub last_update: Option<DateTime<Utc>>,

    /// Connector-specific extra information.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl Diagnostics {
    /// Create an empty diagnostics record for a connector.
    pub fn new(connector: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            state: ConnectorState::Disconnected,
            read_count: 0,
            write_count: 0,
            error_count: 0,
            last_error: None,
            last_update: None,
            extra: serde_json::Value::Null,
        }
    }
}
