//! End-to-end connector scenarios against the in-memory device emulator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use regbus::prelude::*;
use regbus::DeviceEmulator;

const ENDPOINT: &str = "127.0.0.1:1502";

/// Reception callback that captures the last delivered field map.
#[derive(Default)]
struct Capture {
    last: Mutex<Option<FieldMap>>,
    count: AtomicUsize,
}

#[async_trait]
impl ReceptionCallback for Capture {
    async fn received(&self, fields: FieldMap) {
        *self.last.lock().unwrap() = Some(fields);
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn counter_schema() -> RegisterSchema {
    RegisterSchema::builder()
        .field("Counter", DataKind::I32, 1)
        .build()
}

#[tokio::test]
async fn write_then_poll_roundtrips_an_i32() {
    let schema = counter_schema();
    let emulator = DeviceEmulator::new(&schema, ENDPOINT);
    let connector = ModbusConnector::new(
        ConnectorConfig::tcp(ENDPOINT),
        schema,
        Arc::new(emulator.clone()),
    );
    let capture = Arc::new(Capture::default());
    connector.set_reception_callback(capture.clone());

    connector.connect().await.unwrap();
    assert_eq!(connector.state(), ConnectorState::Connected);

    let fields = FieldMap::new().with("Counter", 1_000_000i64);
    connector.write(&fields).await.unwrap();

    // little-endian word order on the device: low word at the field offset
    assert_eq!(emulator.get_register(1), Some(0x4240));
    assert_eq!(emulator.get_register(2), Some(0x000F));

    connector.poll().await;

    let received = capture.last.lock().unwrap().clone().unwrap();
    assert_eq!(received.get("Counter"), Some(&Value::Integer(1_000_000)));
    assert_eq!(connector.get("Counter").unwrap(), Value::Integer(1_000_000));
    assert_eq!(connector.register(1), 0x4240);
    assert_eq!(connector.register(2), 0x000F);

    let diag = connector.diagnostics();
    assert_eq!(diag.read_count, 1);
    assert_eq!(diag.write_count, 1);
    assert!(diag.last_update.is_some());
}

#[tokio::test]
async fn f64_fields_use_the_opposite_word_order() {
    // 1.5f64 = 0x3FF8_0000_0000_0000: the most significant word lands at the
    // field offset, unlike every other multi-word kind. Device-faithful
    // behavior; do not "fix".
    let schema = RegisterSchema::builder()
        .field("Energy", DataKind::F64, 9)
        .build();
    let emulator = DeviceEmulator::new(&schema, ENDPOINT);
    let connector = ModbusConnector::new(
        ConnectorConfig::tcp(ENDPOINT),
        schema,
        Arc::new(emulator.clone()),
    );

    connector.connect().await.unwrap();
    let fields = FieldMap::new().with("Energy", 1.5f64);
    connector.write(&fields).await.unwrap();

    assert_eq!(emulator.get_register(9), Some(0x3FF8));
    assert_eq!(emulator.get_register(10), Some(0x0000));
    assert_eq!(emulator.get_register(11), Some(0x0000));
    assert_eq!(emulator.get_register(12), Some(0x0000));

    connector.poll().await;
    assert_eq!(connector.get("Energy").unwrap(), Value::Float(1.5));
}

#[tokio::test]
async fn partial_writes_keep_unnamed_fields() {
    let schema = RegisterSchema::builder()
        .field("Day", DataKind::U16, 0)
        .field("Month", DataKind::U16, 1)
        .build();
    let emulator = DeviceEmulator::new(&schema, ENDPOINT);
    let connector = ModbusConnector::new(
        ConnectorConfig::tcp(ENDPOINT),
        schema,
        Arc::new(emulator.clone()),
    );

    // device already holds Month = 5
    emulator.set_register(1, 5);

    connector.connect().await.unwrap();
    connector.poll().await;

    // write only Day; Month must keep its value from the last poll
    let fields = FieldMap::new().with("Day", 27u16);
    connector.write(&fields).await.unwrap();

    assert_eq!(emulator.get_register(0), Some(27));
    assert_eq!(emulator.get_register(1), Some(5));
}

#[tokio::test]
async fn set_writes_then_polls() {
    let schema = counter_schema();
    let emulator = DeviceEmulator::new(&schema, ENDPOINT);
    let connector = ModbusConnector::new(
        ConnectorConfig::tcp(ENDPOINT),
        schema,
        Arc::new(emulator.clone()),
    );
    let capture = Arc::new(Capture::default());
    connector.set_reception_callback(capture.clone());

    connector.connect().await.unwrap();
    connector.set("Counter", 42i64).await.unwrap();

    // set = write + poll, so the callback observed the fresh device state
    assert_eq!(capture.count.load(Ordering::SeqCst), 1);
    assert_eq!(connector.get("Counter").unwrap(), Value::Integer(42));
}

#[tokio::test]
async fn layout_text_drives_the_connector() {
    let layout = r#"{"Day" : {"offset" : 2, "type" : "ushort"},"U12" : {"offset" : 4, "type" : "float"}}"#;
    let schema = parse_layout(layout).unwrap();
    let emulator = DeviceEmulator::new(&schema, ENDPOINT);
    let connector = ModbusConnector::from_layout_text(
        ConnectorConfig::tcp(ENDPOINT),
        layout,
        Arc::new(emulator.clone()),
    )
    .unwrap();

    connector.connect().await.unwrap();
    let fields = FieldMap::new().with("Day", 27u16).with("U12", 229.5f32);
    connector.write(&fields).await.unwrap();
    connector.poll().await;

    assert_eq!(connector.get("Day").unwrap(), Value::Integer(27));
    assert_eq!(connector.get("U12").unwrap(), Value::Float(229.5));
}

// ============================================================================
// Single-flight admission
// ============================================================================

/// Transport whose reads block until released, counting every read issued.
struct GatedTransport {
    reads: Arc<AtomicUsize>,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn read_registers(&mut self, _start: u16, count: usize) -> Result<Vec<u16>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(vec![0; count])
    }

    async fn write_registers(&mut self, _start: u16, _words: &[u16]) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct GatedFactory {
    reads: Arc<AtomicUsize>,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl TransportFactory for GatedFactory {
    async fn open(&self, _endpoint: &str) -> Result<Box<dyn Transport>> {
        Ok(Box::new(GatedTransport {
            reads: self.reads.clone(),
            started: self.started.clone(),
            release: self.release.clone(),
        }))
    }
}

#[tokio::test]
async fn concurrent_polls_are_admitted_single_flight() {
    let reads = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let connector = Arc::new(ModbusConnector::new(
        ConnectorConfig::tcp(ENDPOINT),
        counter_schema(),
        Arc::new(GatedFactory {
            reads: reads.clone(),
            started: started.clone(),
            release: release.clone(),
        }),
    ));
    connector.connect().await.unwrap();

    // first poll parks inside the transport read
    let first = {
        let connector = connector.clone();
        tokio::spawn(async move { connector.poll().await })
    };
    started.notified().await;

    // second poll must return immediately without a transport interaction
    connector.poll().await;
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    release.notify_one();
    first.await.unwrap();
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    // the guard is released again: the next poll reaches the transport
    release.notify_one();
    connector.poll().await;
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Failure policy
// ============================================================================

/// Transport whose reads and writes always fail.
struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn read_registers(&mut self, _start: u16, _count: usize) -> Result<Vec<u16>> {
        Err(ConnectorError::transport("device stopped answering"))
    }

    async fn write_registers(&mut self, _start: u16, _words: &[u16]) -> Result<()> {
        Err(ConnectorError::transport("device stopped answering"))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct FailingFactory;

#[async_trait]
impl TransportFactory for FailingFactory {
    async fn open(&self, _endpoint: &str) -> Result<Box<dyn Transport>> {
        Ok(Box::new(FailingTransport))
    }
}

#[tokio::test]
async fn poll_absorbs_transport_errors_but_write_surfaces_them() {
    let connector = ModbusConnector::new(
        ConnectorConfig::tcp(ENDPOINT),
        counter_schema(),
        Arc::new(FailingFactory),
    );
    let capture = Arc::new(Capture::default());
    connector.set_reception_callback(capture.clone());

    connector.connect().await.unwrap();

    // the observer sees no update, and no error either
    connector.poll().await;
    assert_eq!(capture.count.load(Ordering::SeqCst), 0);
    assert_eq!(connector.diagnostics().error_count, 1);

    // an explicit write reports the failure to the caller
    let fields = FieldMap::new().with("Counter", 1i64);
    assert!(matches!(
        connector.write(&fields).await,
        Err(ConnectorError::Transport(_))
    ));
}

#[tokio::test]
async fn connecting_to_a_dead_endpoint_is_quiet() {
    let schema = counter_schema();
    let emulator = DeviceEmulator::new(&schema, "127.0.0.1:1502");
    let connector = ModbusConnector::new(
        ConnectorConfig::tcp("127.0.0.1:9999"),
        schema,
        Arc::new(emulator),
    );

    connector.connect().await.unwrap();
    assert_eq!(connector.state(), ConnectorState::Error);

    // polling a never-connected device is also quiet
    connector.poll().await;
    assert_eq!(connector.diagnostics().read_count, 0);

    connector.disconnect().await.unwrap();
    assert_eq!(connector.state(), ConnectorState::Disconnected);
}
