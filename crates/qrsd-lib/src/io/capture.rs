use anyhow::{Context, Result};
use csv::WriterBuilder;
use log::{debug, info};
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Timing of a line-oriented device capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// How long to record once settled.
    pub duration: Duration,
    /// Idle time before recording, lets electrode artifacts die down.
    pub settle: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            settle: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub written: usize,
    pub dropped: usize,
}

/// A device line carries one amplitude; anything else is dropped. Blank lines
/// are skipped by the capture loop before they get here.
pub fn parse_capture_line(line: &str) -> Option<f64> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Serial link settings for the acquisition board.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound on a single blocking read; the capture deadline is
    /// re-checked after each timeout.
    pub timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 115_200,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Open and configure a serial port for line capture.
pub fn open_serial(cfg: &SerialConfig) -> Result<BufReader<Box<dyn SerialPort>>> {
    let port = serialport::new(cfg.port.as_str(), cfg.baud_rate)
        .timeout(cfg.timeout)
        .open()
        .with_context(|| format!("opening serial port {} at {} baud", cfg.port, cfg.baud_rate))?;
    info!("opened {} at {} baud", cfg.port, cfg.baud_rate);
    Ok(BufReader::new(port))
}

/// Stream `reader` into a `timestamp,ecg_value` CSV until EOF or the duration elapses.
///
/// Timestamps are seconds since the end of the settle period. A read that times
/// out keeps any partial line and goes back to the deadline check, so a silent
/// device cannot hold the capture open.
pub fn capture_samples<R: BufRead, W: Write>(
    mut reader: R,
    writer: W,
    cfg: &CaptureConfig,
) -> Result<CaptureStats> {
    if !cfg.settle.is_zero() {
        info!("waiting {:?} before capture", cfg.settle);
        thread::sleep(cfg.settle);
    }
    let mut writer = WriterBuilder::new().from_writer(writer);
    writer.write_record(["timestamp", "ecg_value"])?;

    let start = Instant::now();
    let mut stats = CaptureStats::default();
    let mut buf = Vec::new();
    while start.elapsed() < cfg.duration {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            // EOF inside a line; the next read returns 0.
            Ok(_) if buf.last() != Some(&b'\n') => continue,
            Ok(_) => {
                record_line(&buf, start, &mut writer, &mut stats)?;
                buf.clear();
            }
            Err(e) if is_transient(e.kind()) => continue,
            Err(e) => return Err(e).context("reading device line"),
        }
    }
    if !buf.is_empty() && start.elapsed() < cfg.duration {
        record_line(&buf, start, &mut writer, &mut stats)?;
    }
    writer.flush()?;
    info!(
        "captured {} samples ({} lines dropped)",
        stats.written, stats.dropped
    );
    Ok(stats)
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

fn record_line<W: Write>(
    raw: &[u8],
    start: Instant,
    writer: &mut csv::Writer<W>,
    stats: &mut CaptureStats,
) -> Result<()> {
    let line = String::from_utf8_lossy(raw);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match parse_capture_line(trimmed) {
        Some(value) => {
            let timestamp = start.elapsed().as_secs_f64();
            writer.write_record([timestamp.to_string(), value.to_string()])?;
            stats.written += 1;
        }
        None => {
            debug!("dropping malformed capture line {:?}", trimmed);
            stats.dropped += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::csv::read_ecg_csv_from;
    use std::io::{self, Cursor, Read};

    /// Reader that replays a script of chunks and read timeouts, then EOF.
    struct Scripted(Vec<Option<&'static [u8]>>);

    impl Read for Scripted {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            match self.0.remove(0) {
                Some(chunk) => {
                    out[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(ErrorKind::TimedOut, "no data")),
            }
        }
    }

    /// A device that never answers.
    struct Silent;

    impl Read for Silent {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_millis(1));
            Err(io::Error::new(ErrorKind::TimedOut, "no data"))
        }
    }

    fn quick() -> CaptureConfig {
        CaptureConfig {
            duration: Duration::from_secs(30),
            settle: Duration::ZERO,
        }
    }

    #[test]
    fn malformed_lines_never_reach_the_output() {
        let input = "0.12\nhello\n\n0.50\n0.4.4\nNaN\n-0.3\n";
        let mut out = Vec::new();
        let stats = capture_samples(Cursor::new(input), &mut out, &quick()).unwrap();
        assert_eq!(stats.written, 3);
        // Blank lines are not malformed.
        assert_eq!(stats.dropped, 3);
        let rec = read_ecg_csv_from(out.as_slice(), 100.0).unwrap();
        assert_eq!(rec.amplitudes(), vec![0.12, 0.5, -0.3]);
        assert!(rec.samples.windows(2).all(|w| w[1].timestamp >= w[0].timestamp));
    }

    #[test]
    fn zero_duration_writes_only_the_header() {
        let cfg = CaptureConfig {
            duration: Duration::ZERO,
            settle: Duration::ZERO,
        };
        let mut out = Vec::new();
        let stats = capture_samples(Cursor::new("1.0\n2.0\n"), &mut out, &cfg).unwrap();
        assert_eq!(stats, CaptureStats::default());
        assert_eq!(String::from_utf8(out).unwrap().trim(), "timestamp,ecg_value");
    }

    #[test]
    fn tolerates_invalid_utf8() {
        let mut input = b"0.25\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(b"0.75\r\n");
        let mut out = Vec::new();
        let stats = capture_samples(Cursor::new(input), &mut out, &quick()).unwrap();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn timeouts_keep_partial_lines() {
        let script = Scripted(vec![
            Some(b"0.5\n"),
            None,
            Some(b"0."),
            None,
            Some(b"7\n"),
            None,
            Some(b"-0.25"),
        ]);
        let mut out = Vec::new();
        let stats = capture_samples(BufReader::new(script), &mut out, &quick()).unwrap();
        assert_eq!(stats, CaptureStats { written: 3, dropped: 0 });
        let rec = read_ecg_csv_from(out.as_slice(), 100.0).unwrap();
        assert_eq!(rec.amplitudes(), vec![0.5, 0.7, -0.25]);
    }

    #[test]
    fn silent_device_stops_at_the_deadline() {
        let cfg = CaptureConfig {
            duration: Duration::from_millis(30),
            settle: Duration::ZERO,
        };
        let begun = Instant::now();
        let mut out = Vec::new();
        let stats = capture_samples(BufReader::new(Silent), &mut out, &cfg).unwrap();
        assert_eq!(stats, CaptureStats::default());
        assert!(begun.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_serial_port_is_an_error() {
        let cfg = SerialConfig {
            timeout: Duration::from_millis(10),
            ..SerialConfig::new("/nonexistent/ttyQRS0")
        };
        assert_eq!(cfg.baud_rate, 115_200);
        let err = open_serial(&cfg).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/ttyQRS0"));
    }
}
