//! # tn3270r
//!
//! A pure-Rust TN3270/TN3270E protocol engine: Telnet option negotiation,
//! 3270 data stream parsing into an in-memory screen buffer, inbound
//! stream construction, SCS printer framing, TLS policy, and trace
//! record/replay. The [`Session`] façade exposes scripted interaction
//! with mainframe applications on top of the async [`handler`].

/// EBCDIC TRANSCODING: CP037-family code pages, shared immutable tables
pub mod ebcdic;

/// PROTOCOL CODES: 3270 commands, orders, AID keys, WCC bits, SFIDs,
/// TN3270E header vocabulary
pub mod codes;

/// FIELD CHAIN: field attributes and the cyclic field set of a screen
pub mod field;

/// SCREEN BUFFER: cell planes, cursor, addressing, write snapshots
pub mod screen;

/// DATA STREAM PARSER: outbound 3270 records into buffer mutations
pub mod parser;

/// DATA STREAM BUILDER: AID submissions, read-modified, query replies
pub mod builder;

/// TELNET NEGOTIATOR: Q-method options and TN3270E subnegotiation
pub mod telnet;

/// SESSION STATE MACHINE: lifecycle states, history, counters, observers
pub mod state;

/// CONNECTION HANDLER: transport, framing, TN3270E headers, dispatch
pub mod handler;

/// PRINTER SINK: SCS line assembly for printer sessions
pub mod printer;

/// TLS POLICY: rustls client configuration and trust overrides
pub mod tls;

/// TRACE: structured event recorder and s3270-format replayer
pub mod trace;

/// SESSION FAÇADE: scripted interaction API
pub mod session;

/// ERROR KINDS: connection, negotiation, parse, protocol, TLS, timeout
pub mod errors;

/// LOGGING: env_logger setup with optional JSON events
pub mod logging;

pub use builder::DataStreamSender;
pub use codes::{AidKey, CommandCode, DataType, OrderCode};
pub use ebcdic::{CodePage, EbcdicCodec};
pub use errors::{Tn3270Error, Tn3270Result};
pub use handler::{SessionCore, TN3270Handler, Tn3270eHeader};
pub use parser::{BindImage, DataStreamParser, SnaResponse, StreamEvent};
pub use printer::PrinterBuffer;
pub use screen::{ScreenBuffer, ScreenSize};
pub use session::{Session, SessionConfig};
pub use state::{SessionState, StateMachine};
pub use telnet::TelnetNegotiator;
pub use tls::TlsWrapper;
pub use trace::{Replayer, TraceRecorder};
