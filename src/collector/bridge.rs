//! Background bridge between the serial-attached insole and the frame slot.
//!
//! The bridge thread opens the serial endpoint, retrying forever on
//! failure, then reads newline-delimited JSON frames and publishes each
//! valid one into the shared [`FrameSlot`]. Any read failure closes the
//! port and sends the thread back to the connect loop. Nothing here is
//! ever reported to callers; the [`BridgeStats`] counters record it.
//!
//! [`FrameSlot`]: crate::collector::slot::FrameSlot
//! [`BridgeStats`]: crate::collector::stats::BridgeStats

use crate::collector::slot::SharedFrameSlot;
use crate::collector::stats::SharedBridgeStats;
use crate::collector::types::{parse_line, LineOutcome};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Granularity used when sleeping so `stop()` is honoured promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Longest line kept while waiting for its newline. Real frames are a
/// few hundred bytes.
const MAX_LINE_BYTES: usize = 4096;

/// Something that can produce a byte stream from the sensor.
///
/// The production implementation is [`SerialConnector`]; tests script
/// their own streams.
pub trait PortConnector: Send + 'static {
    /// Open the endpoint, ready for reading.
    fn connect(&mut self) -> io::Result<Box<dyn Read + Send>>;

    /// Human-readable endpoint name for logs.
    fn describe(&self) -> String;
}

/// Settings for a serial endpoint.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Device path or port name (`/dev/ttyACM0`, `COM3`)
    pub port: String,
    /// Line speed
    pub baud_rate: u32,
    /// Per-read timeout
    pub read_timeout: Duration,
    /// Wait after opening, while the board resets
    pub settle_delay: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: crate::config::default_serial_port(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Opens a real serial port via the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    settings: SerialSettings,
}

impl SerialConnector {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }
}

impl PortConnector for SerialConnector {
    fn connect(&mut self) -> io::Result<Box<dyn Read + Send>> {
        let port = serialport::new(&self.settings.port, self.settings.baud_rate)
            .timeout(self.settings.read_timeout)
            .open()
            .map_err(io::Error::from)?;

        // Opening the port resets most boards; let it boot, then drop the
        // banner and any half-written frame.
        thread::sleep(self.settings.settle_delay);
        port.clear(ClearBuffer::Input).map_err(io::Error::from)?;

        Ok(Box::new(SerialReader(port)))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.settings.port, self.settings.baud_rate)
    }
}

struct SerialReader(Box<dyn SerialPort>);

impl Read for SerialReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Errors from managing the bridge thread.
#[derive(Debug)]
pub enum BridgeError {
    AlreadyRunning,
    Spawn(String),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::AlreadyRunning => write!(f, "Serial bridge is already running"),
            BridgeError::Spawn(e) => write!(f, "Failed to spawn serial bridge thread: {e}"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Owner of the background serial thread.
pub struct SerialBridge {
    slot: SharedFrameSlot,
    stats: SharedBridgeStats,
    reconnect_backoff: Duration,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SerialBridge {
    /// Create a bridge publishing into `slot`.
    pub fn new(
        slot: SharedFrameSlot,
        stats: SharedBridgeStats,
        reconnect_backoff: Duration,
    ) -> Self {
        Self {
            slot,
            stats,
            reconnect_backoff,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start the connect/read loop on a dedicated thread.
    pub fn start<C: PortConnector>(&mut self, connector: C) -> Result<(), BridgeError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(BridgeError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let worker = BridgeWorker {
            slot: self.slot.clone(),
            stats: self.stats.clone(),
            running: self.running.clone(),
            reconnect_backoff: self.reconnect_backoff,
        };

        let handle = thread::Builder::new()
            .name("serial-bridge".into())
            .spawn(move || worker.run(connector))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                BridgeError::Spawn(e.to_string())
            })?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SerialBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

struct BridgeWorker {
    slot: SharedFrameSlot,
    stats: SharedBridgeStats,
    running: Arc<AtomicBool>,
    reconnect_backoff: Duration,
}

impl BridgeWorker {
    fn run<C: PortConnector>(self, mut connector: C) {
        let endpoint = connector.describe();
        info!(endpoint = %endpoint, "Serial bridge started");

        while self.is_running() {
            let Some(reader) = self.acquire(&mut connector, &endpoint) else {
                break;
            };
            self.read_frames(reader, &endpoint);
            self.stats.record_disconnected();
        }

        info!(endpoint = %endpoint, "Serial bridge stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Retry until the endpoint opens or the bridge is stopped.
    fn acquire<C: PortConnector>(
        &self,
        connector: &mut C,
        endpoint: &str,
    ) -> Option<Box<dyn Read + Send>> {
        while self.is_running() {
            self.stats.record_connection_attempt();
            match connector.connect() {
                Ok(reader) => {
                    self.stats.record_connected();
                    info!(endpoint = %endpoint, "Connected to pressure sensor");
                    return Some(reader);
                }
                Err(e) => {
                    warn!(
                        endpoint = %endpoint,
                        "Could not open serial port: {}. Retrying in {:?}",
                        e,
                        self.reconnect_backoff
                    );
                    self.pause(self.reconnect_backoff);
                }
            }
        }
        None
    }

    /// Read lines until an I/O failure, EOF or stop.
    ///
    /// A line growing past [`MAX_LINE_BYTES`] is dropped and the rest of it
    /// skipped up to the next newline.
    fn read_frames(&self, reader: Box<dyn Read + Send>, endpoint: &str) {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::with_capacity(256);
        let mut skipping = false;

        while self.is_running() {
            let (consumed, complete) = {
                let available = match reader.fill_buf() {
                    Ok(available) => available,
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::TimedOut
                                | io::ErrorKind::WouldBlock
                                | io::ErrorKind::Interrupted
                        ) =>
                    {
                        // Partial bytes stay in `line` until the rest arrives.
                        continue;
                    }
                    Err(e) => {
                        warn!(endpoint = %endpoint, "Serial read error: {}. Reconnecting", e);
                        self.stats.record_io_failure();
                        return;
                    }
                };

                if available.is_empty() {
                    if !line.is_empty() && !skipping {
                        self.handle_line(&line);
                    }
                    warn!(endpoint = %endpoint, "Serial stream closed, reconnecting");
                    self.stats.record_io_failure();
                    return;
                }

                match available.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        if !skipping {
                            line.extend_from_slice(&available[..=end]);
                        }
                        (end + 1, true)
                    }
                    None => {
                        if !skipping {
                            line.extend_from_slice(available);
                        }
                        (available.len(), false)
                    }
                }
            };
            reader.consume(consumed);

            if complete {
                if skipping {
                    skipping = false;
                } else if line.len() > MAX_LINE_BYTES {
                    self.drop_oversized_line(line.len());
                } else {
                    self.handle_line(&line);
                }
                line.clear();
            } else if line.len() > MAX_LINE_BYTES {
                self.drop_oversized_line(line.len());
                line.clear();
                skipping = true;
            }
        }
    }

    fn drop_oversized_line(&self, len: usize) {
        debug!(bytes = len, "Discarded oversized serial line");
        self.stats.record_discarded_line();
    }

    fn handle_line(&self, raw: &[u8]) {
        match parse_line(raw) {
            LineOutcome::Frame(frame) => {
                self.slot.publish(frame);
                self.stats.record_frame();
            }
            LineOutcome::Blank => {}
            LineOutcome::Discarded => {
                debug!(line = %String::from_utf8_lossy(raw).trim(), "Discarded serial line");
                self.stats.record_discarded_line();
            }
        }
    }

    fn pause(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
