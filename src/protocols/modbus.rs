//! Modbus TCP transport adapter.
//!
//! Implements [`Transport`]/[`TransportFactory`] on top of
//! `voltage_modbus`'s `ModbusTcpClient`, so the connector can talk to real
//! devices. Wire-level concerns (MBAP framing, transaction ids, timeouts)
//! belong to `voltage_modbus`; this adapter only maps register spans onto
//! protocol transactions.
//!
//! # Example
//!
//! ```rust,ignore
//! use regbus::connector::{ConnectorConfig, ModbusConnector};
//! use regbus::protocols::modbus::TcpTransportFactory;
//!
//! let config = ConnectorConfig::tcp("192.168.1.100:502").with_unit_id(1);
//! let factory = Arc::new(TcpTransportFactory::from_config(&config));
//! let connector = ModbusConnector::from_layout_text(config, layout, factory)?;
//! connector.connect().await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use voltage_modbus::{ModbusClient, ModbusTcpClient};

use crate::connector::ConnectorConfig;
use crate::core::error::{ConnectorError, Result};
use crate::core::traits::{Transport, TransportFactory};

/// Register count limit of one read transaction (FC03).
const READ_TRANSACTION_LIMIT: usize = 125;

/// Register count limit of one write transaction (FC16).
const WRITE_TRANSACTION_LIMIT: usize = 123;

/// Opens [`TcpTransport`] handles for Modbus TCP endpoints.
#[derive(Debug, Clone)]
pub struct TcpTransportFactory {
    unit_id: u8,
    timeout: Duration,
}

impl TcpTransportFactory {
    /// Create a factory with an explicit unit id and transaction timeout.
    pub fn new(unit_id: u8, timeout: Duration) -> Self {
        Self { unit_id, timeout }
    }

    /// Create a factory from a connector configuration.
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self::new(config.unit_id, config.timeout)
    }
}

impl Default for TcpTransportFactory {
    fn default() -> Self {
        Self::new(1, Duration::from_millis(1000))
    }
}

#[async_trait]
impl TransportFactory for TcpTransportFactory {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let client = ModbusTcpClient::from_address(endpoint, self.timeout)
            .await
            .map_err(|e| ConnectorError::connect(e.to_string()))?;
        Ok(Box::new(TcpTransport {
            client,
            unit_id: self.unit_id,
        }))
    }
}

/// One open Modbus TCP connection.
pub struct TcpTransport {
    client: ModbusTcpClient,
    unit_id: u8,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read_registers(&mut self, start: u16, count: usize) -> Result<Vec<u16>> {
        let mut words = Vec::with_capacity(count);
        for (address, quantity) in transaction_spans(start, count, READ_TRANSACTION_LIMIT)? {
            let part = self
                .client
                .read_03(self.unit_id, address, quantity)
                .await
                .map_err(|e| ConnectorError::transport(e.to_string()))?;
            words.extend_from_slice(&part);
        }
        Ok(words)
    }

    async fn write_registers(&mut self, start: u16, words: &[u16]) -> Result<()> {
        let mut written = 0usize;
        for (address, quantity) in transaction_spans(start, words.len(), WRITE_TRANSACTION_LIMIT)? {
            let chunk = &words[written..written + quantity as usize];
            self.client
                .write_10(self.unit_id, address, chunk)
                .await
                .map_err(|e| ConnectorError::transport(e.to_string()))?;
            written += quantity as usize;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| ConnectorError::transport(e.to_string()))
    }
}

/// Split a register span into `(address, quantity)` transactions of at most
/// `limit` registers each.
fn transaction_spans(start: u16, count: usize, limit: usize) -> Result<Vec<(u16, u16)>> {
    if start as usize + count > 0x1_0000 {
        return Err(ConnectorError::transport(format!(
            "register span {}..{} exceeds the 16-bit address space",
            start,
            start as usize + count
        )));
    }

    let mut spans = Vec::with_capacity(count.div_ceil(limit.max(1)));
    let mut address = start;
    let mut remaining = count;
    while remaining > 0 {
        let quantity = remaining.min(limit);
        spans.push((address, quantity as u16));
        address = address.wrapping_add(quantity as u16);
        remaining -= quantity;
    }
    Ok(spans)
}
