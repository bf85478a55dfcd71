//! Modbus holding-register polling connector.
//!
//! [`ModbusConnector`] owns the local [`RegisterImage`] for one device and
//! drives the request/response cycle that keeps it synchronized with the
//! remote register space:
//!
//! - [`connect`](ModbusConnector::connect) / [`disconnect`](ModbusConnector::disconnect)
//!   manage the transport handle (both idempotent),
//! - [`poll`](ModbusConnector::poll) reads the schema's full register span
//!   into the image and delivers the decoded field map to the reception
//!   callback; concurrent polls are admitted single-flight,
//! - [`write`](ModbusConnector::write) encodes a partial field map into the
//!   image and pushes the full span to the device,
//! - [`get`](ModbusConnector::get) / [`set`](ModbusConnector::set) are the
//!   thin per-field forwarders the model-access layer binds to.
//!
//! # Error policy
//!
//! Schema problems are fatal at construction. Transport failures during
//! `poll` are logged and absorbed — the callback simply sees no update for
//! that cycle — while failures during an explicit `write` propagate to the
//! caller. `connect` likewise logs-and-absorbs, so a caller facing a dead
//! device observes "no updates", not an exception storm. No reconnection or
//! retry is attempted here; that is the caller's decision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::codec;
use crate::core::data::{FieldMap, Value};
use crate::core::error::{ConnectorError, Result, SchemaError};
use crate::core::traits::{
    ConnectorState, Diagnostics, ReceptionCallback, Transport, TransportFactory,
};
use crate::image::RegisterImage;
use crate::schema::RegisterSchema;

/// Connector name, as reported in diagnostics.
pub const NAME: &str = "MODBUS TCP/IP";

/// Connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Device endpoint (e.g. "192.168.1.100:502").
    pub endpoint: String,

    /// Modbus unit identifier.
    pub unit_id: u8,

    /// Transaction timeout, enforced by the transport layer.
    pub timeout: Duration,
}

impl ConnectorConfig {
    /// Create a configuration for a TCP endpoint with default unit id (1)
    /// and timeout (1s).
    pub fn tcp(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            unit_id: 1,
            timeout: Duration::from_millis(1000),
        }
    }

    /// Set the unit identifier.
    #[must_use]
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Set the transaction timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    read_count: u64,
    write_count: u64,
    error_count: u64,
    last_error: Option<String>,
    last_update: Option<DateTime<Utc>>,
}

/// Schema-driven polling connector for one Modbus device.
pub struct ModbusConnector {
    config: ConnectorConfig,
    schema: RegisterSchema,
    factory: Arc<dyn TransportFactory>,
    transport: AsyncMutex<Option<Box<dyn Transport>>>,
    image: Mutex<RegisterImage>,
    in_poll: AtomicBool,
    state: RwLock<ConnectorState>,
    callback: RwLock<Option<Arc<dyn ReceptionCallback>>>,
    counters: Mutex<Counters>,
}

impl ModbusConnector {
    /// Create a connector for a prebuilt schema.
    ///
    /// The register image is sized from the schema's register span and owned
    /// exclusively by this connector.
    pub fn new(
        config: ConnectorConfig,
        schema: RegisterSchema,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let image = RegisterImage::for_schema(&schema);
        Self {
            config,
            schema,
            factory,
            transport: AsyncMutex::new(None),
            image: Mutex::new(image),
            in_poll: AtomicBool::new(false),
            state: RwLock::new(ConnectorState::Disconnected),
            callback: RwLock::new(None),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Create a connector from a textual register layout
    /// (see [`schema::parse_layout`](crate::schema::parse_layout)).
    ///
    /// Layout problems are fatal here, at construction time.
    pub fn from_layout_text(
        config: ConnectorConfig,
        layout: &str,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self> {
        let schema = crate::schema::parse_layout(layout)?;
        Ok(Self::new(config, schema, factory))
    }

    /// Connector name.
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// The register schema this connector was built with.
    pub fn schema(&self) -> &RegisterSchema {
        &self.schema
    }

    /// The connector configuration.
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectorState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(ConnectorState::Error)
    }

    fn set_state(&self, state: ConnectorState) {
        if let Ok(mut s) = self.state.write() {
            *s = state;
        }
    }

    /// Install the callback invoked with the decoded field map after each
    /// successful poll cycle. Replaces any previous callback.
    pub fn set_reception_callback(&self, callback: Arc<dyn ReceptionCallback>) {
        if let Ok(mut cb) = self.callback.write() {
            *cb = Some(callback);
        }
    }

    /// Open the transport to the configured endpoint.
    ///
    /// Idempotent: a connector that is already connected returns immediately.
    /// A failed attempt is logged and absorbed — the state moves to
    /// [`ConnectorState::Error`] and the call still returns `Ok`, so polling
    /// callers keep observing "no update" instead of an error. Connect again
    /// to retry.
    pub async fn connect(&self) -> Result<()> {
        if self.state().is_connected() {
            return Ok(());
        }

        match self.factory.open(&self.config.endpoint).await {
            Ok(transport) => {
                *self.transport.lock().await = Some(transport);
                self.set_state(ConnectorState::Connected);
                info!(endpoint = %self.config.endpoint, "{} connected", NAME);
            }
            Err(e) => {
                self.set_state(ConnectorState::Error);
                self.record_error(&e);
                warn!(endpoint = %self.config.endpoint, error = %e, "{} connection failed", NAME);
            }
        }

        Ok(())
    }

    /// Release the transport. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(mut transport) = self.transport.lock().await.take() {
            if let Err(e) = transport.close().await {
                debug!(error = %e, "transport close reported an error");
            }
        }
        self.set_state(ConnectorState::Disconnected);
        Ok(())
    }

    /// Run one poll cycle: read the full register span, refresh the image,
    /// decode every schema field and deliver the map to the reception
    /// callback.
    ///
    /// Admission is single-flight: if a cycle is already in flight, this call
    /// returns immediately without touching the transport — the attempt is
    /// dropped, not queued. Transport failures are logged and absorbed; the
    /// callback sees no update for the failed cycle.
    ///
    /// The in-flight guard has no timeout: if the transport never completes
    /// a read, no further cycles are admitted until the stuck call returns.
    pub async fn poll(&self) {
        if self.in_poll.swap(true, Ordering::SeqCst) {
            debug!("poll already in flight, skipping");
            return;
        }

        match self.read_cycle().await {
            Ok(fields) => {
                {
                    let mut counters = lock_counters(&self.counters);
                    counters.read_count += 1;
                    counters.last_update = Some(Utc::now());
                }
                let callback = self
                    .callback
                    .read()
                    .ok()
                    .and_then(|guard| guard.as_ref().map(Arc::clone));
                if let Some(callback) = callback {
                    callback.received(fields).await;
                }
            }
            Err(e) => {
                self.record_error(&e);
                warn!(error = %e, "poll cycle failed, no update delivered");
            }
        }

        self.in_poll.store(false, Ordering::SeqCst);
    }

    async fn read_cycle(&self) -> Result<FieldMap> {
        let span = self.schema.register_span();

        let mut transport = self.transport.lock().await;
        let transport = transport.as_mut().ok_or(ConnectorError::NotConnected)?;
        let words = transport.read_registers(0, span).await?;

        let mut image = lock_image(&self.image);
        image.load(&words);

        let mut fields = FieldMap::new();
        for entry in &self.schema {
            let value = codec::decode_field(&image, entry.offset as usize, entry.kind);
            fields.insert(entry.name.clone(), value);
        }
        Ok(fields)
    }

    /// Encode the given fields into the register image and write the image's
    /// full span to the device in a single transaction.
    ///
    /// The map may name any subset of the schema's fields; registers of
    /// fields not named keep their values from the last poll. Unlike `poll`,
    /// transport failures here propagate to the caller.
    pub async fn write(&self, fields: &FieldMap) -> Result<()> {
        let words = {
            let mut image = lock_image(&self.image);
            for (name, value) in fields.iter() {
                let entry = self
                    .schema
                    .get(name)
                    .ok_or_else(|| SchemaError::UnknownField(name.to_string()))?;
                codec::encode_field(&mut image, entry.offset as usize, entry.kind, value)?;
            }
            image.words().to_vec()
        };

        let result = {
            let mut transport = self.transport.lock().await;
            let transport = transport.as_mut().ok_or(ConnectorError::NotConnected)?;
            transport.write_registers(0, &words).await
        };

        match result {
            Ok(()) => {
                lock_counters(&self.counters).write_count += 1;
                Ok(())
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Decode one named field from the current register image.
    pub fn get(&self, name: &str) -> Result<Value> {
        let entry = self
            .schema
            .get(name)
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))?;
        let image = lock_image(&self.image);
        Ok(codec::decode_field(&image, entry.offset as usize, entry.kind))
    }

    /// Write one named field to the device, then poll so the next decoded
    /// view reflects the device's state.
    pub async fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut fields = FieldMap::new();
        fields.insert(name, value);
        self.write(&fields).await?;
        self.poll().await;
        Ok(())
    }

    /// Raw view of one register in the local image (sentinel on
    /// out-of-range, like all image reads).
    pub fn register(&self, index: usize) -> u16 {
        lock_image(&self.image).get_or_sentinel(index)
    }

    /// Snapshot of the connector statistics.
    pub fn diagnostics(&self) -> Diagnostics {
        let counters = lock_counters(&self.counters);
        Diagnostics {
            connector: NAME.to_string(),
            state: self.state(),
            read_count: counters.read_count,
            write_count: counters.write_count,
            error_count: counters.error_count,
            last_error: counters.last_error.clone(),
            last_update: counters.last_update,
            extra: serde_json::json!({
                "endpoint": self.config.endpoint,
                "unit_id": self.config.unit_id,
                "fields": self.schema.len(),
                "register_span": self.schema.register_span(),
            }),
        }
    }

    fn record_error(&self, error: &ConnectorError) {
        let mut counters = lock_counters(&self.counters);
        counters.error_count += 1;
        counters.last_error = Some(error.to_string());
    }
}

// Lock helpers: a poisoned lock only means another thread panicked while
// holding it; the register data itself is always structurally valid, so we
// keep going with the inner value rather than propagating the panic.
fn lock_image(image: &Mutex<RegisterImage>) -> std::sync::MutexGuard<'_, RegisterImage> {
    image.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_counters(counters: &Mutex<Counters>) -> std::sync::MutexGuard<'_, Counters> {
    counters
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
