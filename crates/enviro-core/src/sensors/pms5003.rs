// ── PMS5003 particulate sensor ──
//
// The sensor streams 32-byte frames at 9600 baud in active mode. A reader
// thread copies bytes off the serial port into a channel; `read` drains
// stale bytes, then scans fresh ones for the next valid frame until the
// timeout.
//
// Frame layout: 0x42 0x4D, u16 length (28), 13 u16 data words, u16
// checksum (sum of the first 30 bytes). All words big-endian.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{ParticulateSensor, SensorError};
use crate::model::ParticulateReading;

const SENSOR: &str = "pms5003";

pub const FRAME_LEN: usize = 32;
const START: [u8; 2] = [0x42, 0x4D];
const FRAME_DATA_LEN: u16 = 28;
const RESET_PULSE: Duration = Duration::from_millis(100);

/// Decode one complete frame.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<ParticulateReading, SensorError> {
    let word = |offset: usize| u16::from_be_bytes([frame[offset], frame[offset + 1]]);

    if frame[..2] != START {
        return Err(frame_error("bad start bytes"));
    }
    let length = word(2);
    if length != FRAME_DATA_LEN {
        return Err(frame_error(format!("length {length}, expected {FRAME_DATA_LEN}")));
    }
    let expected = word(30);
    let actual = frame[..30]
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)));
    if expected != actual {
        return Err(frame_error(format!(
            "checksum {actual:#06x}, frame says {expected:#06x}"
        )));
    }

    // Data word n lives at byte 4 + 2n; words 0..3 are the CF=1 values.
    Ok(ParticulateReading {
        pm1: word(4),
        pm25: word(6),
        pm10: word(8),
    })
}

fn frame_error(reason: impl Into<String>) -> SensorError {
    SensorError::Frame {
        sensor: SENSOR,
        reason: reason.into(),
    }
}

/// Reassembles frames from an arbitrary byte stream.
#[derive(Debug, Default)]
pub struct FrameScanner {
    buf: Vec<u8>,
}

impl FrameScanner {
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Next decoded frame, or `None` until enough bytes have arrived.
    ///
    /// A frame that fails to decode only consumes its start bytes so a
    /// real frame starting inside it is still found.
    pub fn next_frame(&mut self) -> Option<Result<ParticulateReading, SensorError>> {
        let Some(start) = self.buf.windows(2).position(|w| w == START) else {
            // Keep a trailing 0x42, it may be the first half of a start marker.
            let keep = usize::from(self.buf.last() == Some(&START[0]));
            self.buf.drain(..self.buf.len() - keep);
            return None;
        };
        self.buf.drain(..start);

        let frame: [u8; FRAME_LEN] = self.buf.get(..FRAME_LEN)?.try_into().ok()?;
        match decode_frame(&frame) {
            Ok(reading) => {
                self.buf.drain(..FRAME_LEN);
                Some(Ok(reading))
            }
            Err(e) => {
                self.buf.drain(..START.len());
                Some(Err(e))
            }
        }
    }
}

/// PMS5003 on a pre-configured serial port.
pub struct Pms5003 {
    rx: Receiver<Vec<u8>>,
    scanner: FrameScanner,
    timeout: Duration,
    reset_gpio: Option<PathBuf>,
}

impl Pms5003 {
    /// Open the port and start the reader thread.
    pub fn open(
        port: &Path,
        reset_gpio: Option<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, SensorError> {
        let file = File::open(port).map_err(|e| SensorError::io(SENSOR, port, e))?;
        let (tx, rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("pms5003-reader".into())
            .spawn(move || reader_thread(file, &tx))
            .map_err(|e| SensorError::io(SENSOR, port, e))?;

        debug!(port = %port.display(), "pms5003 reader started");
        Ok(Self::from_receiver(rx, reset_gpio, timeout))
    }

    /// Build on top of an existing byte channel.
    pub fn from_receiver(
        rx: Receiver<Vec<u8>>,
        reset_gpio: Option<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            rx,
            scanner: FrameScanner::default(),
            timeout,
            reset_gpio,
        }
    }

    fn discard_buffered(&mut self) {
        while self.rx.try_recv().is_ok() {}
        self.scanner.clear();
    }

    fn write_gpio(path: &Path, level: &str) -> Result<(), SensorError> {
        std::fs::write(path, level).map_err(|e| SensorError::io(SENSOR, path, e))
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

fn reader_thread(mut port: File, tx: &mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; 64];
    loop {
        match port.read(&mut buf) {
            Ok(0) => {
                warn!("pms5003 serial port closed");
                break;
            }
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(error = %e, "pms5003 serial read failed");
                break;
            }
        }
    }
}

impl ParticulateSensor for Pms5003 {
    fn read(&mut self) -> Result<ParticulateReading, SensorError> {
        self.discard_buffered();

        let deadline = Instant::now() + self.timeout;
        let mut received = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let chunk = match self.rx.recv_timeout(remaining) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) if received => {
                    return Err(SensorError::ReadTimeout { sensor: SENSOR });
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SensorError::SerialTimeout {
                        sensor: SENSOR,
                        timeout_ms: self.timeout_ms(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SensorError::Io {
                        sensor: SENSOR,
                        path: "serial reader".into(),
                        source: std::io::ErrorKind::BrokenPipe.into(),
                    });
                }
            };

            received = true;
            self.scanner.extend(&chunk);
            while let Some(frame) = self.scanner.next_frame() {
                match frame {
                    Ok(reading) => return Ok(reading),
                    Err(e) => debug!(error = %e, "skipping pms5003 frame"),
                }
            }
        }
    }

    fn reset(&mut self) -> Result<(), SensorError> {
        if let Some(ref gpio) = self.reset_gpio {
            Self::write_gpio(gpio, "0")?;
            std::thread::sleep(RESET_PULSE);
            Self::write_gpio(gpio, "1")?;
        }
        self.discard_buffered();
        debug!("pms5003 reset");
        Ok(())
    }
}
