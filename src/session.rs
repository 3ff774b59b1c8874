//! Session façade for scripted mainframe interaction
//!
//! A thin asynchronous client over the handler: connect, exchange bytes,
//! press attention keys, and edit input fields. Client edits funnel
//! through the same screen mutators the parser uses, so host writes and
//! user edits observe a single order.

use std::time::Duration;

use crate::codes::AidKey;
use crate::ebcdic::{CodePage, EbcdicCodec};
use crate::errors::{ProtocolError, Tn3270Error, Tn3270Result};
use crate::handler::TN3270Handler;
use crate::screen::ScreenBuffer;
use crate::state::SessionState;
use crate::telnet::TelnetNegotiator;
use crate::tls::TlsWrapper;

/// Construction options for a [`Session`]
#[derive(Debug, Default)]
pub struct SessionConfig {
    /// TLS policy; `None` connects in plaintext
    pub tls: Option<TlsWrapper>,
    /// Preferred TN3270E device type (e.g. "IBM-3278-2")
    pub terminal_type: Option<String>,
    /// EBCDIC code page for text conversion
    pub code_page: CodePage,
}

/// Asynchronous TN3270 session
pub struct Session {
    handler: TN3270Handler,
    codec: EbcdicCodec,
}

impl Session {
    /// Session with default options (plaintext, IBM-3279-4-E, CP037)
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_config(host, port, SessionConfig::default())
    }

    pub fn with_config(host: &str, port: u16, config: SessionConfig) -> Self {
        let handler = match config.tls {
            Some(tls) => TN3270Handler::with_tls(host, port, tls),
            None => TN3270Handler::new(host, port),
        };
        if let Some(terminal_type) = &config.terminal_type {
            // No contention exists before connect
            if let Ok(mut core) = handler.core().try_lock() {
                core.negotiator = TelnetNegotiator::with_device_type(terminal_type);
            }
        }
        Self {
            handler,
            codec: EbcdicCodec::new(config.code_page),
        }
    }

    pub fn handler(&self) -> &TN3270Handler {
        &self.handler
    }

    pub fn state(&self) -> SessionState {
        self.handler.state()
    }

    pub fn connected(&self) -> bool {
        self.handler.state().is_operational()
    }

    // --- lifecycle --------------------------------------------------------

    pub async fn connect(&self) -> Tn3270Result<()> {
        self.handler.connect().await
    }

    pub async fn close(&self) -> Tn3270Result<()> {
        self.handler.close().await
    }

    // --- raw byte exchange ------------------------------------------------

    pub async fn send(&self, data: &[u8]) -> Tn3270Result<()> {
        self.handler.send_data(data).await
    }

    pub async fn read(&self, timeout: Option<Duration>) -> Tn3270Result<Vec<u8>> {
        self.handler.receive(timeout).await
    }

    // --- attention keys ---------------------------------------------------

    /// Press an attention key by name ("Enter", "Clear", "PF7", "PA2", ...)
    pub async fn key(&self, name: &str) -> Tn3270Result<()> {
        let aid = AidKey::from_name(name).ok_or_else(|| {
            Tn3270Error::Protocol(ProtocolError::UnexpectedRecord {
                reason: format!("unknown attention key '{name}'"),
            })
        })?;
        self.handler.submit_aid(aid).await
    }

    pub async fn enter(&self) -> Tn3270Result<()> {
        self.handler.submit_aid(AidKey::Enter).await
    }

    pub async fn clear(&self) -> Tn3270Result<()> {
        self.handler.submit_aid(AidKey::Clear).await
    }

    pub async fn pf(&self, n: u8) -> Tn3270Result<()> {
        let aid = AidKey::pf(n).ok_or_else(|| {
            Tn3270Error::Protocol(ProtocolError::UnexpectedRecord {
                reason: format!("PF{n} out of range"),
            })
        })?;
        self.handler.submit_aid(aid).await
    }

    pub async fn pa(&self, n: u8) -> Tn3270Result<()> {
        let aid = AidKey::pa(n).ok_or_else(|| {
            Tn3270Error::Protocol(ProtocolError::UnexpectedRecord {
                reason: format!("PA{n} out of range"),
            })
        })?;
        self.handler.submit_aid(aid).await
    }

    // --- screen edits -----------------------------------------------------

    fn require_operational(&self, operation: &str) -> Tn3270Result<()> {
        if self.handler.state().is_operational() {
            Ok(())
        } else {
            Err(Tn3270Error::NotConnected {
                operation: operation.into(),
                state: self.handler.state().name().into(),
            })
        }
    }

    /// Type text at the cursor; input-field MDTs are set as cells change.
    pub async fn insert_text(&self, text: &str) -> Tn3270Result<()> {
        self.require_operational("insert_text")?;
        let (bytes, _) = self.codec.encode(text);
        let mut core = self.handler.core().lock().await;
        for byte in bytes {
            core.screen.write_char(byte);
        }
        Ok(())
    }

    pub async fn move_cursor(&self, row: usize, col: usize) -> Tn3270Result<()> {
        self.require_operational("move_cursor")?;
        self.handler.core().lock().await.screen.set_position(row, col);
        Ok(())
    }

    /// Advance to the next input field
    pub async fn tab(&self) -> Tn3270Result<()> {
        self.require_operational("tab")?;
        self.handler.core().lock().await.screen.program_tab();
        Ok(())
    }

    /// Move back to the previous input field
    pub async fn backtab(&self) -> Tn3270Result<()> {
        self.require_operational("backtab")?;
        self.handler.core().lock().await.screen.backtab();
        Ok(())
    }

    /// Cursor past the last non-blank character of the current field
    pub async fn field_end(&self) -> Tn3270Result<()> {
        self.require_operational("field_end")?;
        let mut core = self.handler.core().lock().await;
        let cursor = core.screen.cursor_address();
        let Some(field) = core.screen.fields().find_field_at(cursor) else {
            return Ok(());
        };
        let start = (field.address as usize + 1) % core.screen.buffer_size();
        let length = field.length as usize;
        let size = core.screen.buffer_size();
        let mut end_offset = 0;
        for i in 0..length {
            let byte = core
                .screen
                .read_char_at(((start + i) % size) as u16)
                .unwrap_or(0);
            if byte != 0x00 && byte != crate::ebcdic::EBCDIC_SPACE {
                end_offset = i + 1;
            }
        }
        let target = ((start + end_offset.min(length.saturating_sub(1))) % size) as u16;
        core.screen.set_position_addr(target);
        Ok(())
    }

    /// NUL from the cursor to the end of the current field, setting MDT
    pub async fn erase_eof(&self) -> Tn3270Result<()> {
        self.require_operational("erase_eof")?;
        let mut core = self.handler.core().lock().await;
        let cursor = core.screen.cursor_address() as usize;
        let size = core.screen.buffer_size();
        let Some(field) = core.screen.fields().find_field_at(cursor as u16) else {
            return Ok(());
        };
        if field.is_protected() {
            return Ok(());
        }
        let start = (field.address as usize + 1) % size;
        let length = field.length as usize;
        // Offset of the cursor inside the field content, wrapping
        let offset = (cursor + size - start) % size;
        for i in offset..length {
            core.screen.write_char_at(0x00, ((start + i) % size) as u16);
        }
        Ok(())
    }

    // --- screen inspection ------------------------------------------------

    /// Run a closure against the screen buffer under the core lock.
    pub async fn with_screen<R>(&self, f: impl FnOnce(&ScreenBuffer) -> R) -> R {
        let core = self.handler.core().lock().await;
        f(&core.screen)
    }

    /// The screen decoded as text, rows separated by newlines
    pub async fn screen_text(&self) -> String {
        self.with_screen(|screen| screen.to_text(false)).await
    }

    /// Modified input fields as (address, content bytes)
    pub async fn read_modified(&self) -> Vec<(u16, Vec<u8>)> {
        self.with_screen(|screen| screen.read_modified()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operational_session() -> Session {
        let session = Session::new("localhost", 23);
        // Drive the state machine to an operational mode without a socket
        for (state, reason) in [
            (SessionState::Connecting, "test"),
            (SessionState::Negotiating, "test"),
            (SessionState::Connected, "test"),
            (SessionState::Tn3270Mode, "test"),
        ] {
            assert!(session.handler.transition(state, reason));
        }
        session
    }

    #[tokio::test]
    async fn test_edits_require_connection() {
        let session = Session::new("localhost", 23);
        let err = session.insert_text("HELLO").await.unwrap_err();
        assert!(matches!(err, Tn3270Error::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_insert_text_sets_mdt() {
        let session = operational_session();
        {
            let mut core = session.handler.core().lock().await;
            core.screen.start_field(0x00, Some(0));
            core.screen.set_position_addr(1);
        }
        session.insert_text("XY").await.unwrap();
        let modified = session.read_modified().await;
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].1[..2], [0xE7, 0xE8]);
    }

    #[tokio::test]
    async fn test_move_cursor_and_tab() {
        let session = operational_session();
        {
            let mut core = session.handler.core().lock().await;
            core.screen.start_field(crate::codes::ATTR_PROTECTED, Some(0));
            core.screen.start_field(0x00, Some(100));
        }
        session.move_cursor(0, 0).await.unwrap();
        session.tab().await.unwrap();
        let cursor = session.with_screen(|s| s.cursor_address()).await;
        assert_eq!(cursor, 101);
    }

    #[tokio::test]
    async fn test_erase_eof() {
        let session = operational_session();
        {
            let mut core = session.handler.core().lock().await;
            core.screen.start_field(0x00, Some(0));
            core.screen.start_field(crate::codes::ATTR_PROTECTED, Some(10));
            for (i, &b) in [0xC1, 0xC2, 0xC3, 0xC4].iter().enumerate() {
                core.screen.write_char_at(b, (i + 1) as u16);
            }
            core.screen.set_position_addr(3);
        }
        session.erase_eof().await.unwrap();
        let screen_bytes = session
            .with_screen(|s| (s.read_char_at(2), s.read_char_at(3), s.read_char_at(9)))
            .await;
        assert_eq!(screen_bytes, (Some(0xC2), Some(0x00), Some(0x00)));
    }

    #[tokio::test]
    async fn test_unknown_key_name() {
        let session = operational_session();
        let err = session.key("PF99").await.unwrap_err();
        assert!(matches!(err, Tn3270Error::Protocol(_)));
    }
}
