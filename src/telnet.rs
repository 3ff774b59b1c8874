//! Telnet option negotiation and TN3270E subnegotiation
//!
//! Implements the Q-method (RFC 1143) per Telnet option and the TN3270E
//! DEVICE-TYPE / FUNCTIONS subnegotiation of RFC 2355. The negotiator is
//! sans-IO: the handler feeds it raw inbound bytes, collects the response
//! bytes it queues, and drains the pass-through application data (record
//! framing, IAC IAC and IAC EOR included, is the handler's business).
//!
//! The negotiated outcome parameterises the handler's framing: EOR vs
//! line mode, and whether each record carries a TN3270E header.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::errors::NegotiationError;
use crate::parser::{BindImage, SnaResponse};

/// Telnet command codes (RFC 854)
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const GA: u8 = 249;
pub const NOP: u8 = 241;
pub const SE: u8 = 240;
/// End-of-record marker command (RFC 885)
pub const EOR_MARK: u8 = 239;

/// Telnet option codes relevant to TN3270
pub const TELOPT_BINARY: u8 = 0;
pub const TELOPT_ECHO: u8 = 1;
pub const TELOPT_SGA: u8 = 3;
pub const TELOPT_TTYPE: u8 = 24;
pub const TELOPT_EOR: u8 = 25;
pub const TELOPT_TN3270E: u8 = 40;

/// TN3270E subnegotiation operations (RFC 2355 §8.2)
pub const TN3270E_ASSOCIATE: u8 = 0x00;
pub const TN3270E_CONNECT: u8 = 0x01;
pub const TN3270E_DEVICE_TYPE: u8 = 0x02;
pub const TN3270E_FUNCTIONS: u8 = 0x03;
pub const TN3270E_IS: u8 = 0x04;
pub const TN3270E_REASON: u8 = 0x05;
pub const TN3270E_REQUEST: u8 = 0x07;
pub const TN3270E_SEND: u8 = 0x08;
pub const TN3270E_REJECT: u8 = 0x09;
/// Some hosts emit the older REJECT value; accepted on parse.
pub const TN3270E_REJECT_ALT: u8 = 0x06;

/// TN3270E function bits (bit n = function code n)
pub const FUNC_BIND_IMAGE: u8 = 0x01;
pub const FUNC_DATA_STREAM_CTL: u8 = 0x02;
pub const FUNC_RESPONSES: u8 = 0x04;
pub const FUNC_SCS_CTL_CODES: u8 = 0x08;
pub const FUNC_SYSREQ: u8 = 0x10;

/// Default function set requested: BIND-IMAGE, RESPONSES, SYSREQ
pub const DEFAULT_FUNCTIONS: u8 = FUNC_BIND_IMAGE | FUNC_RESPONSES | FUNC_SYSREQ;

/// Terminal type offered in classic TERMINAL-TYPE subnegotiation
const TERMINAL_TYPE_NAME: &[u8] = b"IBM-3279-4-E";

/// Device types tried in order until the host accepts one
pub const DEVICE_TYPE_FALLBACKS: [&str; 4] = [
    "IBM-3279-4-E",
    "IBM-3278-4-E",
    "IBM-3279-2-E",
    "IBM-3278-2",
];

/// Default retry and time budget for TN3270E device negotiation
pub const MAX_DEVICE_TYPE_ATTEMPTS: u32 = 3;
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Q-method state for one side of one option (RFC 1143)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QState {
    #[default]
    No,
    WantYes,
    Yes,
    WantNo,
}

/// Negotiation state of one option, both directions
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionState {
    /// Our side (WILL/WONT discipline)
    pub us: QState,
    /// Their side (DO/DONT discipline)
    pub him: QState,
}

impl OptionState {
    pub fn is_active(&self) -> bool {
        self.us == QState::Yes || self.him == QState::Yes
    }
}

/// Map a device type name to its screen geometry.
///
/// IBM-DYNAMIC starts at 24x80 and may be resized later by a BIND-IMAGE
/// PSC subfield.
pub fn device_type_screen_size(device_type: &str) -> (usize, usize) {
    let name = device_type.to_ascii_uppercase();
    if name.contains("-2") && (name.contains("3278") || name.contains("3279")) {
        (24, 80)
    } else if name.contains("-3") && (name.contains("3278") || name.contains("3279")) {
        (32, 80)
    } else if name.contains("-4") && (name.contains("3278") || name.contains("3279")) {
        (43, 80)
    } else if name.contains("-5") && (name.contains("3278") || name.contains("3279")) {
        (27, 132)
    } else {
        (24, 80)
    }
}

/// Whether a device type name designates a printer session.
pub fn is_printer_device(device_type: &str) -> bool {
    device_type.to_ascii_uppercase().contains("3287")
}

/// Build an IAC command sequence (WILL/WONT/DO/DONT)
pub fn build_negotiation(command: u8, option: u8) -> Vec<u8> {
    vec![IAC, command, option]
}

/// Build a complete subnegotiation block, escaping IAC bytes in the body.
pub fn build_subnegotiation(option: u8, data: &[u8]) -> Vec<u8> {
    let mut result = vec![IAC, SB, option];
    for &byte in data {
        result.push(byte);
        if byte == IAC {
            result.push(IAC);
        }
    }
    result.push(IAC);
    result.push(SE);
    result
}

/// Escape IAC bytes in a binary payload (IAC becomes IAC IAC).
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    for &byte in data {
        result.push(byte);
        if byte == IAC {
            result.push(IAC);
        }
    }
    result
}

/// Remove IAC escaping from a received payload.
pub fn unescape_iac(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == IAC && i + 1 < data.len() && data[i + 1] == IAC {
            result.push(IAC);
            i += 2;
        } else {
            result.push(data[i]);
            i += 1;
        }
    }
    result
}

/// Telnet + TN3270E option negotiator for one session
#[derive(Debug)]
pub struct TelnetNegotiator {
    /// Q-method state per option code
    options: HashMap<u8, OptionState>,

    /// Bytes to send back to the peer, drained by the handler
    output: Vec<u8>,

    /// Pass-through bytes (application data and record markers)
    data_out: Vec<u8>,

    /// Carry-over for IAC sequences split across reads
    carry: Vec<u8>,

    /// In-progress subnegotiation: (option, body, trailing-IAC seen, started)
    pending_sb: Option<SbInProgress>,

    /// TN3270E negotiated for the current session epoch
    tn3270e_negotiated: bool,

    /// Negotiated device type name (empty until IS received)
    device_type: String,

    /// LU name assigned by the host, when present
    lu_name: Option<String>,

    /// Negotiated function bitmap
    functions: u8,

    /// Function set we request
    requested_functions: u8,

    /// Device types still to offer, most preferred first
    device_type_candidates: Vec<String>,

    /// REJECTs seen so far
    device_type_attempts: u32,

    /// Reason byte of the most recent DEVICE-TYPE REJECT
    last_reject_reason: Option<u8>,

    /// Set when negotiation exhausted its retry or time budget
    negotiation_failed: bool,

    /// Session continues as classic TN3270 after TN3270E refusal
    tn3270e_refused: bool,

    /// Last BIND image received
    bind_image: Option<BindImage>,

    /// Printer session (by device designator or PRINTER-STATUS function)
    is_printer: bool,

    /// NVT/ASCII fallback detected; kept in lockstep with the handler
    ascii_mode: bool,

    /// Any Telnet negotiation command has been observed this session
    saw_negotiation: bool,

    /// Screen geometry implied by negotiation, applied by the handler
    pending_screen_size: Option<(usize, usize)>,

    /// Last printer status code delivered by the parser
    printer_status: Option<u8>,

    /// Last SNA response delivered by the parser
    last_sna_response: Option<SnaResponse>,
}

impl Default for TelnetNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetNegotiator {
    pub fn new() -> Self {
        Self {
            options: HashMap::new(),
            output: Vec::new(),
            data_out: Vec::new(),
            carry: Vec::new(),
            pending_sb: None,
            tn3270e_negotiated: false,
            device_type: String::new(),
            lu_name: None,
            functions: 0,
            requested_functions: DEFAULT_FUNCTIONS,
            device_type_candidates: DEVICE_TYPE_FALLBACKS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            device_type_attempts: 0,
            last_reject_reason: None,
            negotiation_failed: false,
            tn3270e_refused: false,
            bind_image: None,
            is_printer: false,
            ascii_mode: false,
            saw_negotiation: false,
            pending_screen_size: None,
            printer_status: None,
            last_sna_response: None,
        }
    }

    /// Use a specific preferred device type (prepended to the fallback list).
    pub fn with_device_type(device_type: &str) -> Self {
        let mut negotiator = Self::new();
        negotiator
            .device_type_candidates
            .retain(|c| c != device_type);
        negotiator
            .device_type_candidates
            .insert(0, device_type.to_string());
        negotiator
    }

    // --- accessors --------------------------------------------------------

    pub fn tn3270e_negotiated(&self) -> bool {
        self.tn3270e_negotiated
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn lu_name(&self) -> Option<&str> {
        self.lu_name.as_deref()
    }

    pub fn functions(&self) -> u8 {
        self.functions
    }

    pub fn is_printer(&self) -> bool {
        self.is_printer
    }

    pub fn ascii_mode(&self) -> bool {
        self.ascii_mode
    }

    pub fn set_ascii_mode(&mut self, enabled: bool) {
        self.ascii_mode = enabled;
    }

    /// Whether any Telnet negotiation command has been seen this session
    pub fn negotiation_seen(&self) -> bool {
        self.saw_negotiation
    }

    pub fn negotiation_failed(&self) -> bool {
        self.negotiation_failed
    }

    /// The peer explicitly refused TN3270E this session
    pub fn tn3270e_refused(&self) -> bool {
        self.tn3270e_refused
    }

    /// Reason byte of the most recent DEVICE-TYPE REJECT, when one was seen
    pub fn last_reject_reason(&self) -> Option<u8> {
        self.last_reject_reason
    }

    pub fn bind_image(&self) -> Option<&BindImage> {
        self.bind_image.as_ref()
    }

    pub fn printer_status(&self) -> Option<u8> {
        self.printer_status
    }

    pub fn last_sna_response(&self) -> Option<&SnaResponse> {
        self.last_sna_response.as_ref()
    }

    /// Screen geometry decided by negotiation, consumed once by the handler.
    pub fn take_pending_screen_size(&mut self) -> Option<(usize, usize)> {
        self.pending_screen_size.take()
    }

    pub fn option_state(&self, option: u8) -> OptionState {
        self.options.get(&option).copied().unwrap_or_default()
    }

    /// EOR framing is in effect when either side has it active.
    pub fn eor_active(&self) -> bool {
        self.option_state(TELOPT_EOR).is_active()
    }

    pub fn binary_active(&self) -> bool {
        self.option_state(TELOPT_BINARY).is_active()
    }

    /// Classic TN3270 (EOR + BINARY, no TN3270E headers)
    pub fn classic_tn3270(&self) -> bool {
        !self.tn3270e_negotiated && self.eor_active() && self.binary_active()
    }

    // --- offers -----------------------------------------------------------

    /// Queue the connect-time offers: WILL/DO for EOR, BINARY, TERMINAL-TYPE
    /// and TN3270E. Returns the bytes to send.
    pub fn start_negotiation(&mut self) -> Vec<u8> {
        for option in [TELOPT_BINARY, TELOPT_EOR, TELOPT_TTYPE, TELOPT_TN3270E] {
            let state = self.options.entry(option).or_default();
            if state.us == QState::No {
                state.us = QState::WantYes;
                self.output.extend(build_negotiation(WILL, option));
            }
        }
        for option in [TELOPT_BINARY, TELOPT_EOR] {
            let state = self.options.entry(option).or_default();
            if state.him == QState::No {
                state.him = QState::WantYes;
                self.output.extend(build_negotiation(DO, option));
            }
        }
        self.take_output()
    }

    /// Drain queued response bytes.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Drain pass-through bytes for the handler's record framer.
    pub fn take_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data_out)
    }

    // --- inbound processing -----------------------------------------------

    /// Consume raw inbound bytes, reacting to negotiation commands and
    /// queueing responses. Non-negotiation bytes (including IAC IAC and
    /// IAC EOR sequences) pass through to [`take_data`](Self::take_data).
    pub fn process_incoming_data(&mut self, data: &[u8]) -> Vec<u8> {
        let mut stream = std::mem::take(&mut self.carry);
        stream.extend_from_slice(data);

        // A subnegotiation may still be waiting for its IAC SE
        if let Some(mut sb) = self.pending_sb.take() {
            match find_sb_end(&stream, 0, &mut sb.body, &mut sb.pending_iac) {
                Some(next) => {
                    self.handle_subnegotiation(sb.option, &sb.body);
                    return self.finish_processing(&stream, next);
                }
                None => {
                    self.pending_sb = Some(sb);
                    return self.take_output();
                }
            }
        }

        self.finish_processing(&stream, 0)
    }

    fn finish_processing(&mut self, stream: &[u8], start: usize) -> Vec<u8> {
        let mut i = start;
        while i < stream.len() {
            if stream[i] != IAC {
                self.data_out.push(stream[i]);
                i += 1;
                continue;
            }
            // IAC at end of chunk: carry it into the next read
            if i + 1 >= stream.len() {
                self.carry = stream[i..].to_vec();
                break;
            }
            let command = stream[i + 1];
            match command {
                IAC | EOR_MARK => {
                    // Framing concerns: pass through untouched
                    self.data_out.push(stream[i]);
                    self.data_out.push(command);
                    i += 2;
                }
                DO | DONT | WILL | WONT => {
                    if i + 2 >= stream.len() {
                        self.carry = stream[i..].to_vec();
                        break;
                    }
                    let option = stream[i + 2];
                    self.saw_negotiation = true;
                    match command {
                        DO => self.handle_do(option),
                        DONT => self.handle_dont(option),
                        WILL => self.handle_will(option),
                        WONT => self.handle_wont(option),
                        _ => unreachable!(),
                    }
                    i += 3;
                }
                SB => {
                    if i + 2 >= stream.len() {
                        self.carry = stream[i..].to_vec();
                        break;
                    }
                    let option = stream[i + 2];
                    self.saw_negotiation = true;
                    let mut body = Vec::new();
                    let mut pending_iac = false;
                    match find_sb_end(stream, i + 3, &mut body, &mut pending_iac) {
                        Some(next) => {
                            self.handle_subnegotiation(option, &body);
                            i = next;
                        }
                        None => {
                            self.pending_sb = Some(SbInProgress {
                                option,
                                body,
                                pending_iac,
                                started: Instant::now(),
                            });
                            i = stream.len();
                        }
                    }
                }
                NOP | GA => {
                    i += 2;
                }
                other => {
                    log::debug!("ignoring telnet command 0x{other:02X}");
                    i += 2;
                }
            }
        }
        self.take_output()
    }

    /// Enforce the subnegotiation deadline. An SB block whose SE never
    /// arrives must not block future records.
    ///
    /// Returns the error once when the deadline has passed; the partial
    /// block is dropped so subsequent bytes parse normally.
    pub fn check_subnegotiation_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<NegotiationError> {
        if let Some(sb) = &self.pending_sb {
            if sb.started.elapsed() >= timeout {
                let option = sb.option;
                self.pending_sb = None;
                self.negotiation_failed = true;
                log::warn!("subnegotiation for option {option} timed out");
                return Some(NegotiationError::UnterminatedSubnegotiation { option });
            }
        }
        None
    }

    // --- option commands --------------------------------------------------

    fn supports(&self, option: u8) -> bool {
        matches!(
            option,
            TELOPT_BINARY | TELOPT_EOR | TELOPT_SGA | TELOPT_TTYPE | TELOPT_TN3270E
        )
    }

    fn handle_do(&mut self, option: u8) {
        log::debug!("received DO {option}");
        let supported = self.supports(option);
        let state = self.options.entry(option).or_default();
        match state.us {
            QState::Yes => {} // already agreed, no reply
            QState::WantYes => state.us = QState::Yes,
            _ => {
                if supported {
                    state.us = QState::Yes;
                    self.output.extend(build_negotiation(WILL, option));
                } else {
                    state.us = QState::No;
                    self.output.extend(build_negotiation(WONT, option));
                }
            }
        }
        if option == TELOPT_TN3270E && self.option_state(TELOPT_TN3270E).us == QState::Yes {
            self.request_device_type();
        }
    }

    fn handle_dont(&mut self, option: u8) {
        log::debug!("received DONT {option}");
        let state = self.options.entry(option).or_default();
        let was = state.us;
        state.us = QState::No;
        if was == QState::Yes {
            self.output.extend(build_negotiation(WONT, option));
        }
        if option == TELOPT_TN3270E {
            self.tn3270e_negotiated = false;
            self.tn3270e_refused = true;
            log::info!("TN3270E refused by peer, continuing as classic TN3270");
        }
    }

    fn handle_will(&mut self, option: u8) {
        log::debug!("received WILL {option}");
        let supported = self.supports(option);
        let state = self.options.entry(option).or_default();
        match state.him {
            QState::Yes => {}
            QState::WantYes => state.him = QState::Yes,
            _ => {
                if supported {
                    state.him = QState::Yes;
                    self.output.extend(build_negotiation(DO, option));
                } else {
                    state.him = QState::No;
                    self.output.extend(build_negotiation(DONT, option));
                }
            }
        }
    }

    fn handle_wont(&mut self, option: u8) {
        log::debug!("received WONT {option}");
        let state = self.options.entry(option).or_default();
        let was = state.him;
        state.him = QState::No;
        if was == QState::Yes {
            self.output.extend(build_negotiation(DONT, option));
        }
        if option == TELOPT_TN3270E {
            self.tn3270e_negotiated = false;
            self.tn3270e_refused = true;
        }
    }

    // --- subnegotiation ---------------------------------------------------

    fn handle_subnegotiation(&mut self, option: u8, body: &[u8]) {
        match option {
            TELOPT_TTYPE => {
                // SEND (0x01) asks for our terminal type
                if body.first() == Some(&0x01) {
                    let mut reply = vec![0x00]; // IS
                    reply.extend_from_slice(TERMINAL_TYPE_NAME);
                    self.output
                        .extend(build_subnegotiation(TELOPT_TTYPE, &reply));
                }
            }
            TELOPT_TN3270E => self.handle_tn3270e_subnegotiation(body),
            _ => {
                log::debug!("ignoring subnegotiation for option {option}");
            }
        }
    }

    fn handle_tn3270e_subnegotiation(&mut self, body: &[u8]) {
        let Some(&operation) = body.first() else {
            return;
        };
        match operation {
            TN3270E_DEVICE_TYPE => self.handle_device_type(&body[1..]),
            TN3270E_FUNCTIONS => self.handle_functions(&body[1..]),
            TN3270E_SEND => {
                // SEND DEVICE-TYPE: the host asks us to (re)issue our request
                if body.get(1) == Some(&TN3270E_DEVICE_TYPE) {
                    self.request_device_type();
                }
            }
            other => {
                log::debug!("ignoring TN3270E subnegotiation operation 0x{other:02X}");
            }
        }
    }

    fn handle_device_type(&mut self, body: &[u8]) {
        let Some(&verb) = body.first() else {
            return;
        };
        match verb {
            TN3270E_IS => {
                let payload = &body[1..];
                // Name runs to the CONNECT separator, which introduces the LU
                let (name, lu) = match payload.iter().position(|&b| b == TN3270E_CONNECT) {
                    Some(split) => (&payload[..split], Some(&payload[split + 1..])),
                    None => (payload, None),
                };
                self.device_type = String::from_utf8_lossy(name).trim().to_string();
                self.lu_name = lu
                    .filter(|l| !l.is_empty())
                    .map(|l| String::from_utf8_lossy(l).trim().to_string());
                self.tn3270e_negotiated = true;
                self.is_printer = is_printer_device(&self.device_type);
                self.pending_screen_size = Some(device_type_screen_size(&self.device_type));
                log::info!(
                    "TN3270E device type accepted: {} (lu: {:?})",
                    self.device_type,
                    self.lu_name
                );
                self.request_functions();
            }
            TN3270E_REJECT | TN3270E_REJECT_ALT => {
                let reason = body.get(1).copied().unwrap_or(0);
                self.last_reject_reason = Some(reason);
                log::warn!("device type rejected (reason 0x{reason:02X})");
                self.device_type_attempts += 1;
                if self.device_type_attempts >= MAX_DEVICE_TYPE_ATTEMPTS
                    || self.device_type_candidates.is_empty()
                {
                    self.negotiation_failed = true;
                    log::warn!(
                        "device type negotiation failed after {} attempts",
                        self.device_type_attempts
                    );
                } else {
                    self.request_device_type();
                }
            }
            other => {
                log::debug!("ignoring DEVICE-TYPE verb 0x{other:02X}");
            }
        }
    }

    fn handle_functions(&mut self, body: &[u8]) {
        let Some(&verb) = body.first() else {
            return;
        };
        let bitmap = body.get(1).copied().unwrap_or(0);
        match verb {
            TN3270E_IS => {
                self.functions = bitmap;
                if (bitmap & FUNC_SCS_CTL_CODES) != 0 {
                    self.is_printer = true;
                }
                log::info!("TN3270E functions negotiated: 0x{bitmap:02X}");
            }
            TN3270E_REQUEST => {
                // Accept the intersection of what both sides want
                let agreed = bitmap & self.requested_functions;
                self.functions = agreed;
                self.output.extend(build_subnegotiation(
                    TELOPT_TN3270E,
                    &[TN3270E_FUNCTIONS, TN3270E_IS, agreed],
                ));
            }
            other => {
                log::debug!("ignoring FUNCTIONS verb 0x{other:02X}");
            }
        }
    }

    /// Offer the next device type candidate.
    fn request_device_type(&mut self) {
        let Some(candidate) = self.device_type_candidates.first().cloned() else {
            self.negotiation_failed = true;
            return;
        };
        self.device_type_candidates.remove(0);
        let mut body = vec![TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
        body.extend_from_slice(candidate.as_bytes());
        self.output.extend(build_subnegotiation(TELOPT_TN3270E, &body));
        log::debug!("requesting device type {candidate}");
    }

    fn request_functions(&mut self) {
        self.output.extend(build_subnegotiation(
            TELOPT_TN3270E,
            &[TN3270E_FUNCTIONS, TN3270E_REQUEST, self.requested_functions],
        ));
    }

    // --- parser deliveries ------------------------------------------------

    /// BIND-IMAGE arrived: store it and derive a screen resize when the PSC
    /// subfield carries one.
    pub fn handle_bind_image(&mut self, image: BindImage) {
        if let (Some(rows), Some(cols)) = (image.rows, image.cols) {
            if rows > 0 && cols > 0 {
                self.pending_screen_size = Some((rows as usize, cols as usize));
            }
        }
        self.bind_image = Some(image);
    }

    /// UNBIND closes the bound epoch; TN3270E must be renegotiated.
    pub fn handle_unbind(&mut self) {
        self.bind_image = None;
        self.tn3270e_negotiated = false;
        log::info!("session unbound");
    }

    pub fn update_printer_status(&mut self, code: u8) {
        log::debug!("printer status 0x{code:02X}");
        self.printer_status = Some(code);
    }

    pub fn handle_sna_response(&mut self, response: SnaResponse) {
        if response.is_negative() {
            log::warn!(
                "negative SNA response, sense {:04X?}",
                response.sense_code
            );
        }
        self.last_sna_response = Some(response);
    }
}

/// Subnegotiation block still waiting for its IAC SE terminator
#[derive(Debug)]
struct SbInProgress {
    option: u8,
    body: Vec<u8>,
    /// The previous chunk ended on an unpaired IAC
    pending_iac: bool,
    started: Instant,
}

/// Scan for the IAC SE terminator from `start`, unescaping IAC IAC into
/// `body`. Returns the index just past IAC SE, or None when the block is
/// still open. `pending_iac` carries an unpaired trailing IAC across
/// chunk boundaries.
fn find_sb_end(
    stream: &[u8],
    start: usize,
    body: &mut Vec<u8>,
    pending_iac: &mut bool,
) -> Option<usize> {
    let mut j = start;
    if *pending_iac && j < stream.len() {
        *pending_iac = false;
        match stream[j] {
            SE => return Some(j + 1),
            IAC => {
                body.push(IAC);
                j += 1;
            }
            other => {
                // Lenient: a stray IAC inside the block is kept literally
                body.push(IAC);
                body.push(other);
                j += 1;
            }
        }
    }
    while j < stream.len() {
        if stream[j] == IAC {
            match stream.get(j + 1) {
                Some(&SE) => return Some(j + 2),
                Some(&IAC) => {
                    body.push(IAC);
                    j += 2;
                }
                Some(_) => {
                    body.push(stream[j]);
                    j += 1;
                }
                None => {
                    *pending_iac = true;
                    return None;
                }
            }
        } else {
            body.push(stream[j]);
            j += 1;
        }
    }
    None
}
