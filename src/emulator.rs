//! In-memory device emulator.
//!
//! [`DeviceEmulator`] plays the passive Modbus slave side for tests: given a
//! register schema it allocates a zero-initialized process image of
//! `max_offset + 4` registers, binds it to a configured endpoint name, and
//! serves connector traffic through the same [`Transport`] seams the real
//! TCP adapter uses. This validates the connector + codec round trip without
//! a device on the network; it is not part of production control flow.
//!
//! Wire framing is out of scope for this crate, so the emulator works at the
//! register level: reads and writes outside the process image fail the
//! transaction the way a slave answers an illegal-data-address request.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::{ConnectorError, Result};
use crate::core::traits::{Transport, TransportFactory};
use crate::schema::RegisterSchema;

/// A passive register device bound to an endpoint name.
///
/// Clone-cheap: the process image is shared, so a test can hold the emulator
/// while a connector polls it through an opened transport.
#[derive(Debug, Clone)]
pub struct DeviceEmulator {
    endpoint: String,
    image: Arc<Mutex<Vec<u16>>>,
}

impl DeviceEmulator {
    /// Create an emulator for a schema, bound to `endpoint` (`host:port`).
    ///
    /// The process image holds `schema.register_span()` zeroed registers.
    pub fn new(schema: &RegisterSchema, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            image: Arc::new(Mutex::new(vec![0; schema.register_span()])),
        }
    }

    /// The endpoint this emulator answers on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Number of registers in the process image.
    pub fn register_count(&self) -> usize {
        self.lock_image().len()
    }

    /// Read one register of the process image directly (test setup/assert).
    pub fn get_register(&self, index: usize) -> Option<u16> {
        self.lock_image().get(index).copied()
    }

    /// Write one register of the process image directly (test setup).
    /// Out-of-range indices are ignored.
    pub fn set_register(&self, index: usize, word: u16) {
        if let Some(slot) = self.lock_image().get_mut(index) {
            *slot = word;
        }
    }

    fn lock_image(&self) -> MutexGuard<'_, Vec<u16>> {
        self.image.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TransportFactory for DeviceEmulator {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        if endpoint != self.endpoint {
            return Err(ConnectorError::connect(format!(
                "no device listening on {endpoint} (emulator is bound to {})",
                self.endpoint
            )));
        }
        debug!(endpoint, "emulator transport opened");
        Ok(Box::new(EmulatorTransport {
            image: Arc::clone(&self.image),
            open: true,
        }))
    }
}

/// One open connection to the emulator's process image.
struct EmulatorTransport {
    image: Arc<Mutex<Vec<u16>>>,
    open: bool,
}

impl EmulatorTransport {
    fn lock_image(&self) -> MutexGuard<'_, Vec<u16>> {
        self.image.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(ConnectorError::transport("transport is closed"))
        }
    }

    fn check_span(&self, start: u16, count: usize) -> Result<()> {
        let len = self.lock_image().len();
        if start as usize + count > len {
            return Err(ConnectorError::transport(format!(
                "illegal data address: {}..{} (process image holds {} registers)",
                start,
                start as usize + count,
                len
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for EmulatorTransport {
    async fn read_registers(&mut self, start: u16, count: usize) -> Result<Vec<u16>> {
        self.check_open()?;
        self.check_span(start, count)?;
        let image = self.lock_image();
        Ok(image[start as usize..start as usize + count].to_vec())
    }

    async fn write_registers(&mut self, start: u16, words: &[u16]) -> Result<()> {
        self.check_open()?;
        self.check_span(start, words.len())?;
        let mut image = self.lock_image();
        image[start as usize..start as usize + words.len()].copy_from_slice(words);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}
