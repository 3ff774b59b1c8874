//! Trace recording and offline replay
//!
//! The recorder keeps a capped ring of structured session events
//! (negotiation, send, recv, state changes, errors) stamped with seconds
//! since session start. The replayer reads s3270-format text traces and
//! reconstructs a screen buffer by feeding the received records through
//! the data stream parser.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::codes::{CommandCode, DataType, CTRL_SOH, STRUCTURED_FIELD};
use crate::parser::DataStreamParser;
use crate::screen::ScreenBuffer;

/// Default ring capacity of the recorder
const DEFAULT_CAPACITY: usize = 1024;

/// Event categories recorded during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Negotiation,
    Send,
    Recv,
    StateChange,
    Error,
}

/// One recorded event
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Seconds since session start
    pub ts: f32,
    pub kind: EventKind,
    pub details: HashMap<String, String>,
}

/// Capped ring of session events
#[derive(Debug)]
pub struct TraceRecorder {
    start: Instant,
    events: VecDeque<TraceEvent>,
    capacity: usize,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TraceRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            start: Instant::now(),
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Record an event; the oldest entry is dropped when the ring is full.
    pub fn record(&mut self, kind: EventKind, details: &[(&str, String)]) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(TraceEvent {
            ts: self.start.elapsed().as_secs_f32(),
            kind,
            details: details
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
    }

    /// Convenience for single-detail events
    pub fn record_one(&mut self, kind: EventKind, key: &str, value: String) {
        self.record(kind, &[(key, value)]);
    }

    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialize the ring as a JSON array.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.events.iter().collect::<Vec<_>>())
            .unwrap_or_else(|_| "[]".to_string())
    }
}

/// Direction of one trace record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `<` lines: client to host
    Send,
    /// `>` lines: host to client
    Recv,
}

/// One hex record from a trace file
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub direction: Direction,
    pub data: Vec<u8>,
}

/// Result of replaying a trace file
#[derive(Debug)]
pub struct ReplayOutcome {
    pub screen: ScreenBuffer,
    pub records_processed: usize,
    pub records_failed: usize,
    pub parsed_successfully: bool,
}

impl ReplayOutcome {
    /// The reconstructed screen as text
    pub fn text(&self) -> String {
        self.screen.to_text(false)
    }
}

/// Offline replayer for s3270-format trace files
///
/// Trace lines look like `> 0x0000  f5c31100...`; `//` lines are comments,
/// with `// rows N` and `// columns N` supplying geometry. Received (`>`)
/// records are fed through the parser in order; leading Telnet negotiation
/// records (first byte 0xFF) are skipped, and a TN3270E header prefix is
/// stripped before dispatch.
#[derive(Debug, Default)]
pub struct Replayer {
    rows: Option<usize>,
    cols: Option<usize>,
}

impl Replayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay a trace file from disk.
    pub fn replay_file(&mut self, path: &Path) -> io::Result<ReplayOutcome> {
        let text = fs::read_to_string(path)?;
        Ok(self.replay_text(&text))
    }

    /// Replay trace content already in memory.
    pub fn replay_text(&mut self, text: &str) -> ReplayOutcome {
        let records = self.parse_trace(text);
        let mut screen = ScreenBuffer::new(self.rows.unwrap_or(24), self.cols.unwrap_or(80));
        let mut parser = DataStreamParser::new();

        let mut processed = 0;
        let mut failed = 0;
        for record in records {
            if record.direction != Direction::Recv {
                continue;
            }
            let data = record.data;
            if data.is_empty() {
                continue;
            }
            // Telnet negotiation records are not 3270 data
            if data[0] == 0xFF {
                continue;
            }
            let payload = strip_tn3270e_header(&data);
            let payload = translate_legacy_commands(payload);
            match parser.parse(&payload, DataType::Tn3270Data, &mut screen, None) {
                Ok(_) => processed += 1,
                Err(err) => {
                    log::warn!("failed to parse trace record: {err}");
                    failed += 1;
                }
            }
        }

        ReplayOutcome {
            screen,
            records_processed: processed,
            records_failed: failed,
            parsed_successfully: failed == 0 && processed > 0,
        }
    }

    /// Extract direction + hex payload records and geometry comments.
    fn parse_trace(&mut self, text: &str) -> Vec<TraceRecord> {
        let mut records = Vec::new();
        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix("//") {
                self.parse_geometry(comment.trim());
                continue;
            }
            let direction = match line.chars().next() {
                Some('<') => Direction::Send,
                Some('>') => Direction::Recv,
                _ => continue,
            };
            // Format: "< 0xOFFSET   HEXDATA"
            let mut parts = line[1..].split_whitespace();
            let Some(offset) = parts.next() else { continue };
            if !offset.starts_with("0x") && !offset.starts_with("0X") {
                log::debug!("skipping unrecognized trace line {}", line_no + 1);
                continue;
            }
            let Some(hex) = parts.next() else { continue };
            match decode_hex(hex) {
                Some(data) => records.push(TraceRecord { direction, data }),
                None => {
                    log::warn!("could not parse hex data on line {}", line_no + 1);
                }
            }
        }
        records
    }

    fn parse_geometry(&mut self, comment: &str) {
        let mut parts = comment.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("rows"), Some(value)) => {
                self.rows = value.parse().ok();
            }
            (Some("columns"), Some(value)) => {
                self.cols = value.parse().ok();
            }
            _ => {}
        }
    }
}

/// Strip a 5-byte TN3270E header when the record plainly carries one: a
/// known data type byte followed, at offset 5, by a plausible 3270 lead
/// byte.
fn strip_tn3270e_header(data: &[u8]) -> &[u8] {
    if data.len() > 5
        && DataType::from_u8(data[0]).is_some()
        && (CommandCode::from_u8(data[5]).is_some()
            || data[5] == STRUCTURED_FIELD
            || data[5] == CTRL_SOH)
    {
        &data[5..]
    } else {
        data
    }
}

/// Old capture tools wrote the SNA-internal command codes instead of the
/// wire values. Translate the lead byte of such records.
fn translate_legacy_commands(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    if let Some(first) = out.first_mut() {
        match *first {
            0x01 => *first = crate::codes::CMD_WRITE,
            0x05 => *first = crate::codes::CMD_ERASE_WRITE,
            _ => {}
        }
    }
    out
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || hex.is_empty() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
