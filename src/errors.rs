//! Error types for the TN3270 protocol engine
//!
//! Structured error kinds with explicit Display implementations and From
//! conversions, so callers can match on the failure class: connection,
//! negotiation, parse, protocol, TLS, timeout, or wrong-state.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for TN3270 operations
#[derive(Debug)]
pub enum Tn3270Error {
    /// DNS, TCP, TLS transport or mid-session EOF failures
    Connection(ConnectionError),
    /// Telnet / TN3270E negotiation failures
    Negotiation(NegotiationError),
    /// 3270 data stream parse failures (critical cases only)
    Parse(ParseError),
    /// Violations of record framing or TN3270E header rules
    Protocol(ProtocolError),
    /// TLS context construction or handshake failures
    Ssl(SslError),
    /// An operation deadline elapsed; the stream remains intact
    Timeout { operation: String, timeout_ms: u64 },
    /// Operation issued in a state that does not permit it
    NotConnected { operation: String, state: String },
}

/// Network connection related errors
#[derive(Debug)]
pub enum ConnectionError {
    Refused { host: String, port: u16 },
    DnsResolution { host: String },
    ConnectionLost { reason: String },
    Eof,
    Io(io::Error),
}

/// Telnet option negotiation errors
#[derive(Debug)]
pub enum NegotiationError {
    /// No resolution after the retry/time budget
    Timeout { option: u8, timeout_ms: u64 },
    /// Every device type in the fallback list was rejected
    DeviceTypeRejected { attempts: u32 },
    /// The peer refused an option this mode requires
    RequiredOptionRefused { option: u8 },
    /// Subnegotiation block never terminated with SE
    UnterminatedSubnegotiation { option: u8 },
}

/// 3270 data stream parse errors
///
/// Only the critical class reaches callers; recoverable and benign cases
/// are handled inside the parser (WARN + skip). A critical error always
/// means the enclosing write was rolled back.
#[derive(Debug)]
pub enum ParseError {
    /// An order promised more bytes than the record contains
    Incomplete { what: &'static str, offset: usize },
    /// A structured field length contradicts the record
    BadStructuredField { sfid: u8, reason: String },
}

impl ParseError {
    /// Whether this error triggers write rollback
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Incomplete { .. })
    }
}

/// TN3270E framing and header errors
#[derive(Debug)]
pub enum ProtocolError {
    /// Record shorter than the 5-byte TN3270E header
    ShortHeader { length: usize },
    /// RESPONSE correlation was requested and the sequence number mismatched
    SequenceMismatch { expected: u16, received: u16 },
    /// A record arrived in a mode that cannot interpret it
    UnexpectedRecord { reason: String },
}

/// TLS wrapper errors
#[derive(Debug)]
pub enum SslError {
    ContextCreation { reason: String },
    CertificateLoad { path: String, reason: String },
    Handshake { reason: String },
}

impl fmt::Display for Tn3270Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tn3270Error::Connection(err) => write!(f, "connection error: {err}"),
            Tn3270Error::Negotiation(err) => write!(f, "negotiation error: {err}"),
            Tn3270Error::Parse(err) => write!(f, "parse error: {err}"),
            Tn3270Error::Protocol(err) => write!(f, "protocol error: {err}"),
            Tn3270Error::Ssl(err) => write!(f, "TLS error: {err}"),
            Tn3270Error::Timeout { operation, timeout_ms } => {
                write!(f, "{operation} timed out after {timeout_ms}ms")
            }
            Tn3270Error::NotConnected { operation, state } => {
                write!(f, "{operation} not permitted in state {state}")
            }
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Refused { host, port } => {
                write!(f, "connection refused to {host}:{port}")
            }
            ConnectionError::DnsResolution { host } => {
                write!(f, "DNS resolution failed for {host}")
            }
            ConnectionError::ConnectionLost { reason } => write!(f, "connection lost: {reason}"),
            ConnectionError::Eof => write!(f, "connection closed by peer"),
            ConnectionError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::Timeout { option, timeout_ms } => {
                write!(f, "negotiation of option {option} timed out after {timeout_ms}ms")
            }
            NegotiationError::DeviceTypeRejected { attempts } => {
                write!(f, "device type rejected after {attempts} attempts")
            }
            NegotiationError::RequiredOptionRefused { option } => {
                write!(f, "peer refused required option {option}")
            }
            NegotiationError::UnterminatedSubnegotiation { option } => {
                write!(f, "subnegotiation for option {option} never terminated")
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Incomplete { what, offset } => {
                write!(f, "incomplete {what} at offset {offset}; write rolled back")
            }
            ParseError::BadStructuredField { sfid, reason } => {
                write!(f, "bad structured field 0x{sfid:02X}: {reason}")
            }
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::ShortHeader { length } => {
                write!(f, "TN3270E record of {length} bytes is shorter than its header")
            }
            ProtocolError::SequenceMismatch { expected, received } => {
                write!(f, "sequence mismatch: expected {expected}, received {received}")
            }
            ProtocolError::UnexpectedRecord { reason } => write!(f, "unexpected record: {reason}"),
        }
    }
}

impl fmt::Display for SslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslError::ContextCreation { reason } => {
                write!(f, "TLS context creation failed: {reason}")
            }
            SslError::CertificateLoad { path, reason } => {
                write!(f, "failed to load certificates from '{path}': {reason}")
            }
            SslError::Handshake { reason } => write!(f, "TLS handshake failed: {reason}"),
        }
    }
}

impl StdError for Tn3270Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Tn3270Error::Connection(err) => Some(err),
            Tn3270Error::Negotiation(err) => Some(err),
            Tn3270Error::Parse(err) => Some(err),
            Tn3270Error::Protocol(err) => Some(err),
            Tn3270Error::Ssl(err) => Some(err),
            _ => None,
        }
    }
}

impl StdError for ConnectionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConnectionError::Io(err) => Some(err),
            _ => None,
        }
    }
}
impl StdError for NegotiationError {}
impl StdError for ParseError {}
impl StdError for ProtocolError {}
impl StdError for SslError {}

impl From<ConnectionError> for Tn3270Error {
    fn from(err: ConnectionError) -> Self {
        Tn3270Error::Connection(err)
    }
}

impl From<NegotiationError> for Tn3270Error {
    fn from(err: NegotiationError) -> Self {
        Tn3270Error::Negotiation(err)
    }
}

impl From<ParseError> for Tn3270Error {
    fn from(err: ParseError) -> Self {
        Tn3270Error::Parse(err)
    }
}

impl From<ProtocolError> for Tn3270Error {
    fn from(err: ProtocolError) -> Self {
        Tn3270Error::Protocol(err)
    }
}

impl From<SslError> for Tn3270Error {
    fn from(err: SslError) -> Self {
        Tn3270Error::Ssl(err)
    }
}

impl From<io::Error> for Tn3270Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Tn3270Error::Connection(ConnectionError::Refused {
                host: "unknown".to_string(),
                port: 0,
            }),
            io::ErrorKind::UnexpectedEof => Tn3270Error::Connection(ConnectionError::Eof),
            io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset => {
                Tn3270Error::Connection(ConnectionError::ConnectionLost {
                    reason: err.to_string(),
                })
            }
            _ => Tn3270Error::Connection(ConnectionError::Io(err)),
        }
    }
}

/// Result type alias for TN3270 operations
pub type Tn3270Result<T> = Result<T, Tn3270Error>;

/// Specialized result types for individual components
pub type ParseResult<T> = Result<T, ParseError>;
pub type NegotiationResult<T> = Result<T, NegotiationError>;
pub type SslResult<T> = Result<T, SslError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_classification() {
        let err = ParseError::Incomplete { what: "SBA address", offset: 4 };
        assert!(err.is_incomplete());
        let err = ParseError::BadStructuredField { sfid: 0x99, reason: "short".into() };
        assert!(!err.is_incomplete());
    }

    #[test]
    fn test_io_error_mapping() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: Tn3270Error = io_err.into();
        assert!(matches!(err, Tn3270Error::Connection(ConnectionError::Eof)));
    }

    #[test]
    fn test_display_includes_context() {
        let err = Tn3270Error::Timeout { operation: "receive".into(), timeout_ms: 5000 };
        assert_eq!(err.to_string(), "receive timed out after 5000ms");
    }
}
