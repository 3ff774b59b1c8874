//! TN3270 connection handler
//!
//! Owns the connection lifecycle: transport setup (TCP, optionally TLS),
//! Telnet negotiation, record framing (IAC escaping + EOR), TN3270E
//! headers with sequence numbers, and dispatch of parsed records into the
//! screen buffer or printer sink.
//!
//! Locking follows one rule per resource: one async mutex per transport
//! direction, one for the protocol core, a std mutex for the state
//! machine, and a small one for sequence numbers. Reads of the current
//! state are snapshots of a single Copy value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_rustls::TlsConnector;

use crate::builder::DataStreamSender;
use crate::codes::{AidKey, DataType};
use crate::errors::{
    ConnectionError, NegotiationError, ProtocolError, Tn3270Error, Tn3270Result,
};
use crate::parser::{DataStreamParser, ReadCommand, StreamEvent};
use crate::printer::PrinterBuffer;
use crate::screen::ScreenBuffer;
use crate::state::{SessionState, StateMachine, StateObserver};
use crate::telnet::{self, TelnetNegotiator, EOR_MARK, IAC, NEGOTIATION_TIMEOUT};
use crate::tls::{server_name, TlsWrapper};
use crate::trace::{EventKind, TraceRecorder};

/// Default receive timeout when the caller does not supply one
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Combined transport trait so TCP and TLS streams share one type
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type BoxedStream = Box<dyn AsyncStream>;

/// TN3270E record header (5 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tn3270eHeader {
    pub data_type: u8,
    pub request_flag: u8,
    pub response_flag: u8,
    pub seq_no: u16,
}

impl Tn3270eHeader {
    pub fn new(data_type: DataType, seq_no: u16) -> Self {
        Self {
            data_type: data_type.to_u8(),
            request_flag: 0,
            response_flag: 0,
            seq_no,
        }
    }

    /// Split a record into header and payload.
    pub fn decode(record: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        if record.len() < 5 {
            return Err(ProtocolError::ShortHeader {
                length: record.len(),
            });
        }
        Ok((
            Self {
                data_type: record[0],
                request_flag: record[1],
                response_flag: record[2],
                seq_no: u16::from_be_bytes([record[3], record[4]]),
            },
            &record[5..],
        ))
    }

    pub fn encode(&self) -> [u8; 5] {
        let seq = self.seq_no.to_be_bytes();
        [
            self.data_type,
            self.request_flag,
            self.response_flag,
            seq[0],
            seq[1],
        ]
    }
}

/// Everything the inbound path produced from one chunk of raw bytes
#[derive(Debug, Default)]
pub struct InboundResult {
    /// Negotiation replies to send back
    pub responses: Vec<u8>,
    /// Record payloads for the application
    pub payload: Vec<u8>,
    /// Unframed streams to send (answers to host read commands)
    pub outbound: Vec<Vec<u8>>,
    /// ASCII fallback was detected in this chunk
    pub ascii_detected: bool,
    /// Critical errors encountered while parsing records
    pub errors: Vec<Tn3270Error>,
}

/// Protocol state shared by the inbound and outbound paths
///
/// The handler keeps this behind one async mutex; the session façade
/// borrows it for screen inspection and edits, preserving happens-before
/// between host mutations and client edits.
#[derive(Debug)]
pub struct SessionCore {
    pub screen: ScreenBuffer,
    pub parser: DataStreamParser,
    pub negotiator: TelnetNegotiator,
    pub printer: PrinterBuffer,
    pub sender: DataStreamSender,
    pub recorder: TraceRecorder,
    /// Bytes accumulated until IAC EOR completes a record
    pending_record: Vec<u8>,
    /// Payload bytes buffered for the next read() call
    buffered_payload: Vec<u8>,
    /// Sequence numbers seen on inbound TN3270E records
    pub last_received_seq: Option<u16>,
    strict_parsing: bool,
}

impl Default for SessionCore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCore {
    pub fn new() -> Self {
        Self {
            screen: ScreenBuffer::default(),
            parser: DataStreamParser::new(),
            negotiator: TelnetNegotiator::new(),
            printer: PrinterBuffer::new(),
            sender: DataStreamSender::new(),
            recorder: TraceRecorder::default(),
            pending_record: Vec::new(),
            buffered_payload: Vec::new(),
            last_received_seq: None,
            strict_parsing: false,
        }
    }

    /// Re-raise critical parse errors to the caller instead of logging
    pub fn set_strict_parsing(&mut self, strict: bool) {
        self.strict_parsing = strict;
    }

    /// Drain payload bytes buffered by earlier processing.
    pub fn take_buffered_payload(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffered_payload)
    }

    /// Keep payload bytes for a later read() (negotiation-phase arrivals).
    pub fn buffer_payload(&mut self, bytes: &[u8]) {
        self.buffered_payload.extend_from_slice(bytes);
    }

    /// Feed raw transport bytes through negotiation, framing and parsing.
    pub fn process_raw(&mut self, raw: &[u8]) -> InboundResult {
        let mut result = InboundResult::default();
        self.recorder
            .record_one(EventKind::Recv, "bytes", raw.len().to_string());

        result.responses = self.negotiator.process_incoming_data(raw);
        if !result.responses.is_empty() {
            self.recorder.record_one(
                EventKind::Negotiation,
                "response_bytes",
                result.responses.len().to_string(),
            );
        }
        let data = self.negotiator.take_data();
        if data.is_empty() {
            return result;
        }

        // NVT fallback: CSI sequences before any negotiation mean the peer
        // is a plain ASCII host.
        if !self.negotiator.ascii_mode()
            && !self.negotiator.negotiation_seen()
            && contains_csi(&data)
        {
            self.negotiator.set_ascii_mode(true);
            result.ascii_detected = true;
        }

        if self.negotiator.ascii_mode() {
            result.payload.extend_from_slice(&data);
            return result;
        }

        self.pending_record.extend_from_slice(&data);
        for record in extract_records(&mut self.pending_record) {
            self.process_record(&record, &mut result);
        }
        result
    }

    /// One complete (unescaped) record.
    fn process_record(&mut self, record: &[u8], result: &mut InboundResult) {
        // Geometry implied by negotiation applies before any further data
        self.apply_pending_geometry();

        let (raw_type, payload): (u8, &[u8]) = if self.negotiator.tn3270e_negotiated() {
            match Tn3270eHeader::decode(record) {
                Ok((header, payload)) => {
                    self.last_received_seq = Some(header.seq_no);
                    (header.data_type, payload)
                }
                Err(err) => {
                    self.recorder
                        .record_one(EventKind::Error, "error", err.to_string());
                    result.errors.push(err.into());
                    return;
                }
            }
        } else {
            (DataType::Tn3270Data.to_u8(), record)
        };

        result.payload.extend_from_slice(payload);

        let parse = self.parser.parse_with_raw_type(
            payload,
            raw_type,
            &mut self.screen,
            Some(&mut self.printer),
        );
        match parse {
            Ok(outcome) => {
                for event in outcome.events {
                    self.handle_event(event, result);
                }
            }
            Err(err) => {
                self.recorder
                    .record_one(EventKind::Error, "error", err.to_string());
                if self.strict_parsing {
                    result.errors.push(err.into());
                } else {
                    log::warn!("write rolled back: {err}");
                }
            }
        }

        // A BIND processed in this record may itself imply a new geometry
        self.apply_pending_geometry();
    }

    fn apply_pending_geometry(&mut self) {
        if let Some((rows, cols)) = self.negotiator.take_pending_screen_size() {
            if (rows, cols) != (self.screen.rows(), self.screen.cols()) {
                self.screen.resize(rows, cols);
            }
            self.sender.set_columns(cols);
            self.sender.set_14bit_addressing(rows * cols > 4095);
        }
    }

    /// Reset protocol state for a fresh connection attempt. The recorder
    /// and its event history survive across reconnects.
    pub fn reset_for_reconnect(&mut self) {
        self.screen = ScreenBuffer::default();
        self.parser = DataStreamParser::new();
        self.negotiator = TelnetNegotiator::new();
        self.sender = DataStreamSender::new();
        self.pending_record.clear();
        self.buffered_payload.clear();
        self.last_received_seq = None;
    }

    fn handle_event(&mut self, event: StreamEvent, result: &mut InboundResult) {
        match event {
            StreamEvent::PendingRead(command) => {
                let response = self.build_read_response(command);
                result.outbound.push(response);
            }
            StreamEvent::PrinterStatus(code) => {
                self.negotiator.update_printer_status(code);
            }
            StreamEvent::PrintEoj => {
                self.printer.end_job();
            }
            StreamEvent::SnaResponse(response) => {
                self.negotiator.handle_sna_response(response);
            }
            StreamEvent::BindImage(image) => {
                self.negotiator.handle_bind_image(image);
                self.screen.clear();
            }
            StreamEvent::Unbind => {
                self.negotiator.handle_unbind();
                self.screen.clear();
            }
            StreamEvent::NvtData(data) => {
                result.payload.extend_from_slice(&data);
            }
        }
    }

    /// Answer a host read command from current screen state.
    fn build_read_response(&self, command: ReadCommand) -> Vec<u8> {
        let aid = self.screen.aid_pending().unwrap_or(AidKey::NoAid);
        match command {
            ReadCommand::Buffer => {
                let mut stream = self.sender.build_key_press(aid);
                stream.extend_from_slice(
                    &self.sender.build_sba_addr(self.screen.cursor_address()),
                );
                stream.extend_from_slice(&self.screen.buffer_data());
                stream
            }
            ReadCommand::Modified | ReadCommand::ModifiedAll => {
                self.sender.build_submission(aid, &self.screen)
            }
        }
    }
}

/// Detect a VT100 CSI introducer.
fn contains_csi(data: &[u8]) -> bool {
    data.windows(2).any(|w| w == [0x1B, b'['])
}

/// Split completed records off the pending buffer at IAC EOR boundaries,
/// unescaping IAC IAC. Incomplete trailing bytes stay buffered.
fn extract_records(pending: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    let mut current = Vec::new();
    let mut consumed = 0;
    let mut i = 0;
    while i < pending.len() {
        let byte = pending[i];
        if byte == IAC {
            match pending.get(i + 1) {
                Some(&IAC) => {
                    current.push(IAC);
                    i += 2;
                }
                Some(&EOR_MARK) => {
                    records.push(std::mem::take(&mut current));
                    i += 2;
                    consumed = i;
                }
                Some(&other) => {
                    // Stray command the negotiator let through; drop it
                    log::debug!("dropping stray IAC 0x{other:02X} in record stream");
                    i += 2;
                }
                None => break, // lone IAC at end, wait for more bytes
            }
        } else {
            current.push(byte);
            i += 1;
        }
    }
    pending.drain(..consumed);
    records
}

/// Asynchronous TN3270/TN3270E connection handler
pub struct TN3270Handler {
    host: String,
    port: u16,
    tls: Option<TlsWrapper>,
    reader: AsyncMutex<Option<ReadHalf<BoxedStream>>>,
    writer: AsyncMutex<Option<WriteHalf<BoxedStream>>>,
    state: StdMutex<StateMachine>,
    next_sent_seq: StdMutex<u16>,
    core: AsyncMutex<SessionCore>,
    ascii_mode: AtomicBool,
}

impl std::fmt::Debug for TN3270Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TN3270Handler")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "state",
                &self
                    .state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .current(),
            )
            .finish()
    }
}

impl TN3270Handler {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            tls: None,
            reader: AsyncMutex::new(None),
            writer: AsyncMutex::new(None),
            state: StdMutex::new(StateMachine::new()),
            next_sent_seq: StdMutex::new(0),
            core: AsyncMutex::new(SessionCore::new()),
            ascii_mode: AtomicBool::new(false),
        }
    }

    /// Handler with TLS transport
    pub fn with_tls(host: &str, port: u16, tls: TlsWrapper) -> Self {
        let mut handler = Self::new(host, port);
        handler.tls = Some(tls);
        handler
    }

    /// Lock-free snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .current()
    }

    pub fn add_state_observer(&self, observer: StateObserver) {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .add_observer(observer);
    }

    /// The protocol core (screen, negotiator, builder) behind its lock
    pub fn core(&self) -> &AsyncMutex<SessionCore> {
        &self.core
    }

    pub fn is_ascii_mode(&self) -> bool {
        self.ascii_mode.load(Ordering::SeqCst)
    }

    /// Flip both the handler and negotiator ASCII flags (kept in lockstep).
    pub async fn set_ascii_mode(&self) {
        self.ascii_mode.store(true, Ordering::SeqCst);
        self.core.lock().await.negotiator.set_ascii_mode(true);
        self.transition(SessionState::AsciiMode, "ascii fallback");
    }

    pub(crate) fn transition(&self, to: SessionState, reason: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .transition_to(to, reason)
    }

    /// Next outbound sequence number, wrapping mod 2^16.
    pub fn next_seq(&self) -> u16 {
        let mut seq = self
            .next_sent_seq
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *seq;
        *seq = seq.wrapping_add(1);
        current
    }

    // --- lifecycle --------------------------------------------------------

    /// Connect the transport and run the negotiation exchange.
    pub async fn connect(&self) -> Tn3270Result<()> {
        if !self.transition(SessionState::Connecting, "connect requested") {
            return Err(Tn3270Error::NotConnected {
                operation: "connect".into(),
                state: self.state().name().into(),
            });
        }

        let stream = match self.open_transport().await {
            Ok(stream) => stream,
            Err(err) => {
                self.transition(SessionState::Error, "transport failed");
                return Err(err);
            }
        };
        let (read_half, write_half) = tokio::io::split(stream);
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);

        self.transition(SessionState::Negotiating, "transport established");

        let offers = {
            let mut core = self.core.lock().await;
            core.recorder
                .record_one(EventKind::Negotiation, "phase", "offers sent".into());
            core.negotiator.start_negotiation()
        };
        self.write_raw(&offers).await?;

        self.negotiate_loop().await?;

        self.transition(SessionState::Connected, "negotiation settled");
        let (tn3270, ascii) = {
            let core = self.core.lock().await;
            (
                core.negotiator.tn3270e_negotiated() || core.negotiator.classic_tn3270(),
                core.negotiator.ascii_mode(),
            )
        };
        if ascii {
            self.ascii_mode.store(true, Ordering::SeqCst);
            self.transition(SessionState::AsciiMode, "ascii fallback detected");
        } else if tn3270 {
            self.transition(SessionState::Tn3270Mode, "3270 data stream mode");
        }
        Ok(())
    }

    async fn open_transport(&self) -> Tn3270Result<BoxedStream> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    Tn3270Error::Connection(ConnectionError::Refused {
                        host: self.host.clone(),
                        port: self.port,
                    })
                }
                _ => {
                    if err.to_string().contains("failed to lookup") {
                        Tn3270Error::Connection(ConnectionError::DnsResolution {
                            host: self.host.clone(),
                        })
                    } else {
                        err.into()
                    }
                }
            })?;

        match &self.tls {
            None => Ok(Box::new(tcp)),
            Some(wrapper) => {
                let config = wrapper.create_config()?;
                let connector = TlsConnector::from(config);
                let name = server_name(&self.host)?;
                let tls = connector.connect(name, tcp).await.map_err(|err| {
                    Tn3270Error::Ssl(crate::errors::SslError::Handshake {
                        reason: err.to_string(),
                    })
                })?;
                Ok(Box::new(tls))
            }
        }
    }

    /// Exchange negotiation traffic until a mode settles or the budget runs
    /// out. Data records arriving early stay buffered for the first read().
    async fn negotiate_loop(&self) -> Tn3270Result<()> {
        let deadline = tokio::time::Instant::now() + NEGOTIATION_TIMEOUT;
        loop {
            {
                let core = self.core.lock().await;
                if core.negotiator.tn3270e_negotiated()
                    || core.negotiator.classic_tn3270()
                    || core.negotiator.ascii_mode()
                {
                    return Ok(());
                }
                if core.negotiator.negotiation_failed() {
                    return Err(NegotiationError::DeviceTypeRejected {
                        attempts: telnet::MAX_DEVICE_TYPE_ATTEMPTS,
                    }
                    .into());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                // Some hosts negotiate lazily; stay connected and let the
                // receive path finish the exchange.
                log::debug!("negotiation budget elapsed, continuing");
                return Ok(());
            }

            match self.receive_chunk(Duration::from_millis(250)).await {
                Ok(payload) => {
                    if !payload.is_empty() {
                        // Data that raced ahead of negotiation belongs to
                        // the first read()
                        self.core.lock().await.buffer_payload(&payload);
                    }
                }
                Err(Tn3270Error::Timeout { .. }) => {}
                Err(err) => return Err(err),
            }
        }
    }

    /// Bounded reconnect: ERROR -> RECOVERING -> CONNECTING per attempt.
    ///
    /// Protocol state is reset before each attempt; the trace recorder
    /// keeps its history across attempts.
    pub async fn reconnect(&self, max_attempts: u32) -> Tn3270Result<()> {
        let mut last_err = Tn3270Error::NotConnected {
            operation: "reconnect".into(),
            state: self.state().name().into(),
        };
        for attempt in 1..=max_attempts {
            if !self.transition(SessionState::Recovering, "reconnect") {
                return Err(last_err);
            }
            {
                let mut core = self.core.lock().await;
                core.reset_for_reconnect();
                core.recorder.record_one(
                    EventKind::StateChange,
                    "reconnect_attempt",
                    attempt.to_string(),
                );
            }
            *self.reader.lock().await = None;
            *self.writer.lock().await = None;
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    log::warn!("reconnect attempt {attempt}/{max_attempts} failed: {err}");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// Close the connection. Idempotent and safe from any state.
    pub async fn close(&self) -> Tn3270Result<()> {
        if self.state() == SessionState::Disconnected {
            return Ok(());
        }
        self.transition(SessionState::Closing, "close requested");
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        *self.reader.lock().await = None;
        self.transition(SessionState::Disconnected, "closed");
        Ok(())
    }

    // --- outbound ---------------------------------------------------------

    /// Send one application record, framed for the negotiated mode.
    pub async fn send_data(&self, data: &[u8]) -> Tn3270Result<()> {
        if !self.state().is_operational() {
            return Err(Tn3270Error::NotConnected {
                operation: "send".into(),
                state: self.state().name().into(),
            });
        }
        let framed = self.frame_outbound(data, None).await;
        self.write_raw(&framed).await
    }

    /// Send an SCS record (printer sessions pick the SCS-DATA type).
    pub async fn send_scs_data(&self, data: &[u8]) -> Tn3270Result<()> {
        let framed = self.frame_outbound(data, Some(DataType::ScsData)).await;
        self.write_raw(&framed).await
    }

    async fn frame_outbound(&self, data: &[u8], data_type: Option<DataType>) -> Vec<u8> {
        let core = self.core.lock().await;
        if core.negotiator.ascii_mode() {
            return data.to_vec();
        }
        let mut framed = Vec::with_capacity(data.len() + 8);
        if core.negotiator.tn3270e_negotiated() {
            let data_type = data_type.unwrap_or(if core.negotiator.is_printer() {
                DataType::ScsData
            } else {
                DataType::Tn3270Data
            });
            let header = Tn3270eHeader::new(data_type, self.next_seq());
            framed.extend_from_slice(&telnet::escape_iac(&header.encode()));
        }
        framed.extend_from_slice(&telnet::escape_iac(data));
        framed.push(IAC);
        framed.push(EOR_MARK);
        framed
    }

    /// Write raw bytes under the send-direction lock.
    async fn write_raw(&self, data: &[u8]) -> Tn3270Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard
            .as_mut()
            .ok_or_else(|| Tn3270Error::NotConnected {
                operation: "send".into(),
                state: self.state().name().into(),
            })?;
        writer.write_all(data).await.map_err(|err| {
            self.transition(SessionState::Error, "write failed");
            Tn3270Error::from(err)
        })?;
        writer.flush().await.map_err(Tn3270Error::from)?;
        self.core
            .lock()
            .await
            .recorder
            .record_one(EventKind::Send, "bytes", data.len().to_string());
        Ok(())
    }

    /// Build and send an AID submission from the current screen state.
    pub async fn submit_aid(&self, aid: AidKey) -> Tn3270Result<()> {
        let stream = {
            let mut core = self.core.lock().await;
            core.screen.set_aid_pending(Some(aid));
            core.screen.set_keyboard_lock(true);
            core.sender.build_submission(aid, &core.screen)
        };
        self.send_data(&stream).await
    }

    // --- inbound ----------------------------------------------------------

    /// Receive application payload bytes, waiting up to `timeout`.
    ///
    /// Negotiation exchanges happen transparently; a deadline returns
    /// `Timeout` without disturbing the partially accumulated record.
    pub async fn receive(&self, timeout: Option<Duration>) -> Tn3270Result<Vec<u8>> {
        if !self.state().is_operational() && self.state() != SessionState::Negotiating {
            return Err(Tn3270Error::NotConnected {
                operation: "receive".into(),
                state: self.state().name().into(),
            });
        }
        let timeout = timeout.unwrap_or(DEFAULT_RECEIVE_TIMEOUT);
        let deadline = tokio::time::Instant::now() + timeout;

        {
            let mut core = self.core.lock().await;
            let buffered = core.take_buffered_payload();
            if !buffered.is_empty() {
                return Ok(buffered);
            }
        }

        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .unwrap_or_default();
            if remaining.is_zero() {
                return Err(Tn3270Error::Timeout {
                    operation: "receive".into(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            let payload = self.receive_chunk(remaining).await?;
            if !payload.is_empty() {
                return Ok(payload);
            }
        }
    }

    /// One socket read plus processing; may legitimately yield no payload.
    ///
    /// The read-direction lock is held through record processing so that
    /// concurrent receives observe records in arrival order.
    async fn receive_chunk(&self, timeout: Duration) -> Tn3270Result<Vec<u8>> {
        let mut buf = vec![0u8; 4096];
        let mut reader_guard = self.reader.lock().await;
        let reader = reader_guard
            .as_mut()
            .ok_or_else(|| Tn3270Error::NotConnected {
                operation: "receive".into(),
                state: self.state().name().into(),
            })?;
        let n = match tokio::time::timeout(timeout, reader.read(&mut buf)).await {
            Err(_) => {
                return Err(Tn3270Error::Timeout {
                    operation: "receive".into(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(err)) => {
                self.transition(SessionState::Error, "read failed");
                return Err(err.into());
            }
            Ok(Ok(0)) => {
                self.transition(SessionState::Error, "peer closed connection");
                return Err(ConnectionError::Eof.into());
            }
            Ok(Ok(n)) => n,
        };

        let (result, sb_timeout) = {
            let mut core = self.core.lock().await;
            let result = core.process_raw(&buf[..n]);
            let sb_timeout = core
                .negotiator
                .check_subnegotiation_timeout(NEGOTIATION_TIMEOUT);
            (result, sb_timeout)
        };
        drop(reader_guard);

        if result.ascii_detected {
            self.set_ascii_mode().await;
        }
        self.write_raw(&result.responses).await?;
        for stream in &result.outbound {
            let framed = self.frame_outbound(stream, None).await;
            self.write_raw(&framed).await?;
        }
        if let Some(err) = sb_timeout {
            return Err(err.into());
        }
        if let Some(err) = result.errors.into_iter().next() {
            return Err(err);
        }
        Ok(result.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{CMD_ERASE_WRITE, CMD_READ_MODIFIED};
    use crate::telnet::{DO, TELOPT_TN3270E, WILL};

    #[test]
    fn test_header_round_trip() {
        let header = Tn3270eHeader::new(DataType::Tn3270Data, 0x1234);
        let bytes = header.encode();
        let (decoded, rest) = Tn3270eHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_header_too_short() {
        let err = Tn3270eHeader::decode(&[0x00, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortHeader { length: 2 }));
    }

    #[test]
    fn test_extract_records_basic() {
        let mut pending = vec![0xF5, 0xC3, 0xC1, IAC, EOR_MARK, 0xF1];
        let records = extract_records(&mut pending);
        assert_eq!(records, vec![vec![0xF5, 0xC3, 0xC1]]);
        // Trailing partial record stays buffered
        assert_eq!(pending, vec![0xF1]);
    }

    #[test]
    fn test_extract_records_unescapes_iac() {
        let mut pending = vec![0xC1, IAC, IAC, 0xC2, IAC, EOR_MARK];
        let records = extract_records(&mut pending);
        assert_eq!(records, vec![vec![0xC1, IAC, 0xC2]]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_extract_records_partial_iac_buffered() {
        let mut pending = vec![0xC1, IAC];
        let records = extract_records(&mut pending);
        assert!(records.is_empty());
        assert_eq!(pending, vec![0xC1, IAC]);
    }

    #[test]
    fn test_seq_wraps() {
        let handler = TN3270Handler::new("localhost", 23);
        *handler.next_sent_seq.lock().unwrap() = u16::MAX;
        assert_eq!(handler.next_seq(), u16::MAX);
        assert_eq!(handler.next_seq(), 0);
    }

    #[test]
    fn test_core_processes_classic_record() {
        let mut core = SessionCore::new();
        // Classic mode: no TN3270E header
        let mut raw = vec![CMD_ERASE_WRITE, 0xC3, 0xC1, 0xC2];
        raw.extend_from_slice(&[IAC, EOR_MARK]);
        let result = core.process_raw(&raw);
        assert!(result.errors.is_empty());
        assert_eq!(core.screen.read_char_at(0), Some(0xC1));
        assert_eq!(result.payload, vec![CMD_ERASE_WRITE, 0xC3, 0xC1, 0xC2]);
    }

    #[test]
    fn test_core_processes_tn3270e_record() {
        let mut core = SessionCore::new();
        // Negotiate TN3270E first so the header is expected
        core.negotiator.process_incoming_data(&[IAC, DO, TELOPT_TN3270E]);
        let mut sb = vec![IAC, 0xFA, TELOPT_TN3270E, 0x02, 0x04];
        sb.extend_from_slice(b"IBM-3279-4-E");
        sb.extend_from_slice(&[IAC, 0xF0]);
        core.negotiator.process_incoming_data(&sb);
        assert!(core.negotiator.tn3270e_negotiated());

        // Header 00 00 00 00 01 (3270-DATA, seq 1) + EW record
        let mut raw = vec![0x00, 0x00, 0x00, 0x00, 0x01];
        raw.extend_from_slice(&[
            0xF5, 0xC3, 0x11, 0x00, 0x00, 0x1D, 0xF0, 0xC1, 0xC2, 0xC3, 0x11, 0x00, 0x50, 0xC4,
            0xC5, 0xC6,
        ]);
        raw.extend_from_slice(&[IAC, EOR_MARK]);

        let result = core.process_raw(&raw);
        assert!(result.errors.is_empty());
        assert_eq!(core.last_received_seq, Some(1));
        assert_eq!(core.screen.fields().fields().len(), 1);
        assert_eq!(core.screen.read_char_at(1), Some(0xC1));
        assert_eq!(core.screen.read_char_at(80), Some(0xC4));
    }

    #[test]
    fn test_core_read_modified_produces_outbound() {
        let mut core = SessionCore::new();
        let mut raw = vec![CMD_READ_MODIFIED];
        raw.extend_from_slice(&[IAC, EOR_MARK]);
        let result = core.process_raw(&raw);
        assert_eq!(result.outbound.len(), 1);
        // AID + cursor SBA at minimum
        assert!(result.outbound[0].len() >= 4);
    }

    #[test]
    fn test_core_ascii_detection() {
        let mut core = SessionCore::new();
        let result = core.process_raw(b"\x1b[2JHello, VT100!\r\n");
        assert!(result.ascii_detected);
        assert!(core.negotiator.ascii_mode());
        assert_eq!(result.payload, b"\x1b[2JHello, VT100!\r\n".to_vec());
    }

    #[test]
    fn test_core_no_ascii_detection_after_negotiation() {
        let mut core = SessionCore::new();
        core.process_raw(&[IAC, WILL, crate::telnet::TELOPT_EOR]);
        let result = core.process_raw(b"\x1b[0m");
        assert!(!result.ascii_detected);
    }

    #[test]
    fn test_core_rollback_not_strict_by_default() {
        let mut core = SessionCore::new();
        // Incomplete SBA in classic record: logged, not surfaced
        let mut raw = vec![CMD_ERASE_WRITE, 0xC1, 0x11, 0x00];
        raw.extend_from_slice(&[IAC, EOR_MARK]);
        let result = core.process_raw(&raw);
        assert!(result.errors.is_empty());

        core.set_strict_parsing(true);
        let mut raw = vec![CMD_ERASE_WRITE, 0xC1, 0x11, 0x00];
        raw.extend_from_slice(&[IAC, EOR_MARK]);
        let result = core.process_raw(&raw);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_refused_moves_to_error() {
        let handler = TN3270Handler::new("127.0.0.1", 1);
        let err = handler.connect().await.unwrap_err();
        assert!(matches!(err, Tn3270Error::Connection(_)));
        assert_eq!(handler.state(), SessionState::Error);
    }

    #[tokio::test]
    async fn test_close_idempotent() {
        let handler = TN3270Handler::new("localhost", 23);
        handler.close().await.unwrap();
        handler.close().await.unwrap();
        assert_eq!(handler.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let handler = TN3270Handler::new("localhost", 23);
        let err = handler.send_data(&[0x7D]).await.unwrap_err();
        assert!(matches!(err, Tn3270Error::NotConnected { .. }));
    }
}
