//! 3270 data stream parsing
//!
//! Decodes outbound (host to terminal) 3270 records into screen buffer
//! mutations. The handler strips framing first: the parser receives one
//! record at a time together with its TN3270E data type (3270-DATA when
//! no header was negotiated).
//!
//! Error discipline: an incomplete order inside a Write is critical and
//! rolls the whole write back to its pre-record snapshot; unknown orders
//! and commands are recoverable (WARN, skip one byte); unknown structured
//! fields are benign (skipped via their length field).

use crate::codes::*;
use crate::errors::{ParseError, ParseResult};
use crate::field::ExtendedAttributes;
use crate::printer::PrinterBuffer;
use crate::screen::{addressing, ScreenBuffer};

/// Host read requests surfaced to the handler for the builder to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCommand {
    Buffer,
    Modified,
    ModifiedAll,
}

/// An SNA response unit delivered to the negotiator
#[derive(Debug, Clone, PartialEq)]
pub struct SnaResponse {
    pub response_type: u8,
    pub flags: u8,
    pub sense_code: Option<u16>,
    pub data: Vec<u8>,
}

impl SnaResponse {
    /// Positive iff the sense code is zero and the flags carry RSP without
    /// the exception-response bit.
    pub fn is_positive(&self) -> bool {
        self.sense_code == Some(SNA_SENSE_CODE_SUCCESS)
            && (self.flags & SNA_FLAGS_RSP) != 0
            && (self.flags & SNA_FLAGS_EXCEPTION_RESPONSE) == 0
    }

    pub fn is_negative(&self) -> bool {
        (self.flags & SNA_FLAGS_EXCEPTION_RESPONSE) != 0
            || self.sense_code.map_or(false, |s| s != SNA_SENSE_CODE_SUCCESS)
    }
}

/// Decoded BIND-IMAGE structured field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindImage {
    /// Alternate screen rows from the PSC subfield
    pub rows: Option<u16>,
    /// Alternate screen columns from the PSC subfield
    pub cols: Option<u16>,
    /// Primary screen size, when the PSC subfield carries it
    pub primary_rows: Option<u16>,
    pub primary_cols: Option<u16>,
    /// Query reply types the host may request
    pub query_reply_ids: Vec<u8>,
}

impl BindImage {
    /// Parse the BIND payload as a sequence of (length, id, data) subfields.
    pub fn parse(data: &[u8]) -> Self {
        let mut image = BindImage::default();
        let mut pos = 0;
        while pos < data.len() {
            let len = data[pos] as usize;
            if len < 2 || pos + len > data.len() {
                log::warn!("truncated BIND subfield at offset {pos}, ignoring remainder");
                break;
            }
            let id = data[pos + 1];
            let body = &data[pos + 2..pos + len];
            match id {
                BIND_SUBFIELD_PSC => {
                    if body.len() >= 4 {
                        image.rows = Some(u16::from_be_bytes([body[0], body[1]]));
                        image.cols = Some(u16::from_be_bytes([body[2], body[3]]));
                    }
                    if body.len() >= 8 {
                        image.primary_rows = Some(u16::from_be_bytes([body[4], body[5]]));
                        image.primary_cols = Some(u16::from_be_bytes([body[6], body[7]]));
                    }
                }
                BIND_SUBFIELD_QUERY_REPLY_IDS => {
                    image.query_reply_ids.extend_from_slice(body);
                }
                _ => {
                    log::debug!("ignoring BIND subfield id 0x{id:02X}");
                }
            }
            pos += len;
        }
        image
    }
}

/// Side effects of a parse that concern components other than the screen
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A read command awaits a response built by the sender
    PendingRead(ReadCommand),
    /// SOH or printer-status structured field / data type carried a status byte
    PrinterStatus(u8),
    /// PRINT-EOJ record ended the current print job
    PrintEoj,
    /// SNA response unit (from its data type or SF 0x01)
    SnaResponse(SnaResponse),
    /// BIND-IMAGE arrived; the negotiator may resize the screen
    BindImage(BindImage),
    /// UNBIND ends the bound session epoch
    Unbind,
    /// NVT payload passed through untouched
    NvtData(Vec<u8>),
}

/// Result of parsing one record
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub events: Vec<StreamEvent>,
}

/// Bounds-checked reader over one record
///
/// Every accessor either advances `pos` or fails; `pos` never exceeds the
/// record length.
struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn byte(&mut self, what: &'static str) -> ParseResult<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(ParseError::Incomplete { what, offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn pair(&mut self, what: &'static str) -> ParseResult<(u8, u8)> {
        if self.remaining() < 2 {
            return Err(ParseError::Incomplete { what, offset: self.pos });
        }
        let b1 = self.data[self.pos];
        let b2 = self.data[self.pos + 1];
        self.pos += 2;
        Ok((b1, b2))
    }

    fn take(&mut self, n: usize, what: &'static str) -> ParseResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(ParseError::Incomplete { what, offset: self.pos });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }
}

/// 3270 data stream parser
///
/// One parser serves one session; the screen buffer and printer sink are
/// passed per record so the handler keeps ownership.
#[derive(Debug, Default)]
pub struct DataStreamParser {
    /// WCC of the last write processed, for diagnostics
    last_wcc: Option<u8>,
}

impl DataStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_wcc(&self) -> Option<u8> {
        self.last_wcc
    }

    /// Parse one record of the given TN3270E data type.
    ///
    /// `Tn3270Data` drives the screen; `ScsData` drives the printer sink;
    /// the remaining types produce events only.
    pub fn parse(
        &mut self,
        record: &[u8],
        data_type: DataType,
        screen: &mut ScreenBuffer,
        mut printer: Option<&mut PrinterBuffer>,
    ) -> ParseResult<ParseOutcome> {
        let mut outcome = ParseOutcome::default();
        if record.is_empty() {
            return Ok(outcome);
        }
        match data_type {
            DataType::Tn3270Data => {
                self.parse_3270_record(record, screen, &mut outcome)?;
            }
            DataType::ScsData => {
                self.parse_scs_record(record, printer.as_deref_mut(), &mut outcome);
            }
            DataType::BindImage => {
                // BIND payloads arrive as a 3270 record carrying the BIND SF
                self.parse_3270_record(record, screen, &mut outcome)?;
            }
            DataType::Unbind => {
                outcome.events.push(StreamEvent::Unbind);
            }
            DataType::NvtData => {
                log::info!("received NVT-DATA record ({} bytes)", record.len());
                outcome.events.push(StreamEvent::NvtData(record.to_vec()));
            }
            DataType::Response => {
                log::info!("received RESPONSE record ({} bytes)", record.len());
            }
            DataType::Request => {
                log::info!("received REQUEST record ({} bytes)", record.len());
            }
            DataType::SscpLuData => {
                log::info!("received SSCP-LU-DATA record ({} bytes)", record.len());
            }
            DataType::PrintEoj => {
                if let Some(p) = printer.as_deref_mut() {
                    p.end_job();
                }
                outcome.events.push(StreamEvent::PrintEoj);
            }
            DataType::SnaResponse => {
                outcome
                    .events
                    .push(StreamEvent::SnaResponse(parse_sna_response(record)));
            }
            DataType::PrinterStatus => {
                if let Some(&code) = record.first() {
                    outcome.events.push(StreamEvent::PrinterStatus(code));
                }
            }
        }
        Ok(outcome)
    }

    /// Parse with a raw data-type byte, falling back to 3270-DATA for
    /// unknown types (logged once per record).
    pub fn parse_with_raw_type(
        &mut self,
        record: &[u8],
        raw_type: u8,
        screen: &mut ScreenBuffer,
        printer: Option<&mut PrinterBuffer>,
    ) -> ParseResult<ParseOutcome> {
        let data_type = DataType::from_u8(raw_type).unwrap_or_else(|| {
            log::warn!("unhandled TN3270E data type 0x{raw_type:02x}, processing as 3270-DATA");
            DataType::Tn3270Data
        });
        self.parse(record, data_type, screen, printer)
    }

    // --- 3270-DATA --------------------------------------------------------

    fn parse_3270_record(
        &mut self,
        record: &[u8],
        screen: &mut ScreenBuffer,
        outcome: &mut ParseOutcome,
    ) -> ParseResult<()> {
        let mut reader = RecordReader::new(record);
        while !reader.at_end() {
            let cmd_byte = reader.byte("command byte")?;
            if cmd_byte == CTRL_SOH {
                // SOH introduces a one-byte device status
                let status = reader.byte("SOH status byte")?;
                outcome.events.push(StreamEvent::PrinterStatus(status));
                continue;
            }
            if cmd_byte == STRUCTURED_FIELD {
                self.process_structured_fields(&mut reader, screen, outcome)?;
                continue;
            }
            match CommandCode::from_u8(cmd_byte) {
                Some(CommandCode::Write) => {
                    self.process_write(&mut reader, screen, false, false)?;
                }
                Some(CommandCode::EraseWrite) => {
                    self.process_write(&mut reader, screen, true, false)?;
                }
                Some(CommandCode::EraseWriteAlternate) => {
                    self.process_write(&mut reader, screen, true, true)?;
                }
                Some(CommandCode::ReadBuffer) => {
                    outcome.events.push(StreamEvent::PendingRead(ReadCommand::Buffer));
                }
                Some(CommandCode::ReadModified) => {
                    outcome
                        .events
                        .push(StreamEvent::PendingRead(ReadCommand::Modified));
                }
                Some(CommandCode::ReadModifiedAll) => {
                    outcome
                        .events
                        .push(StreamEvent::PendingRead(ReadCommand::ModifiedAll));
                }
                Some(CommandCode::EraseAllUnprotected) => {
                    screen.erase_all_unprotected();
                }
                Some(CommandCode::WriteStructuredField) => {
                    self.process_structured_fields(&mut reader, screen, outcome)?;
                }
                None => {
                    log::warn!("unknown command byte 0x{cmd_byte:02X}, skipping");
                }
            }
        }
        Ok(())
    }

    /// Write / Erase-Write / Erase-Write-Alternate, transactionally.
    ///
    /// The screen is snapshotted first; an incomplete order restores the
    /// snapshot bit-for-bit before the error propagates.
    fn process_write(
        &mut self,
        reader: &mut RecordReader<'_>,
        screen: &mut ScreenBuffer,
        erase: bool,
        alternate: bool,
    ) -> ParseResult<()> {
        let snapshot = screen.snapshot();
        match self.process_write_inner(reader, screen, erase, alternate) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.is_incomplete() {
                    screen.restore(snapshot);
                }
                Err(err)
            }
        }
    }

    fn process_write_inner(
        &mut self,
        reader: &mut RecordReader<'_>,
        screen: &mut ScreenBuffer,
        erase: bool,
        alternate: bool,
    ) -> ParseResult<()> {
        let wcc = reader.byte("WCC byte")?;
        self.last_wcc = Some(wcc);

        if erase {
            if alternate && screen.buffer_size() != 3440 {
                // EWA resets to the alternate (Model 4) geometry
                screen.resize(43, 80);
            } else {
                screen.clear();
            }
        }

        self.apply_wcc(wcc, screen);

        let mut insert_cursor: Option<u16> = None;
        while let Some(byte) = reader.peek() {
            if let Some(order) = OrderCode::from_u8(byte) {
                reader.pos += 1;
                self.process_order(order, reader, screen, &mut insert_cursor)?;
            } else if byte >= 0x40
                || matches!(byte, CTRL_NUL | CTRL_SUB | CTRL_DUP | CTRL_FM)
            {
                // Graphic character, or a control byte preserved in the cell
                reader.pos += 1;
                screen.write_char_host(byte);
            } else {
                reader.pos += 1;
                log::warn!("unknown order byte 0x{byte:02X} in write, skipping");
            }
        }

        if let Some(addr) = insert_cursor {
            screen.set_position_addr(addr);
        }
        Ok(())
    }

    fn apply_wcc(&self, wcc: u8, screen: &mut ScreenBuffer) {
        if (wcc & WCC_RESET_MDT) != 0 {
            screen.fields_mut().reset_mdt();
        }
        if (wcc & WCC_RESTORE) != 0 {
            screen.set_keyboard_lock(false);
            screen.set_aid_pending(None);
        }
        if (wcc & WCC_ALARM) != 0 {
            screen.sound_alarm();
        }
        if (wcc & WCC_START_PRINTER) != 0 {
            // Ignored for display sessions
            log::debug!("WCC start-printer bit set");
        }
    }

    fn process_order(
        &mut self,
        order: OrderCode,
        reader: &mut RecordReader<'_>,
        screen: &mut ScreenBuffer,
        insert_cursor: &mut Option<u16>,
    ) -> ParseResult<()> {
        match order {
            OrderCode::SetBufferAddress => {
                let addr = self.read_address(reader, "SBA address")?;
                screen.set_position_addr(addr);
            }
            OrderCode::StartField => {
                let attr = reader.byte("SF attribute byte")?;
                screen.start_field(attr, None);
            }
            OrderCode::StartFieldExtended => {
                let count = reader.byte("SFE count byte")? as usize;
                let pairs = reader.take(count * 2, "SFE attribute pairs")?;
                let mut base_attr = 0u8;
                let mut extended = ExtendedAttributes::new();
                for chunk in pairs.chunks_exact(2) {
                    if chunk[0] == XA_3270 {
                        base_attr = chunk[1];
                    } else {
                        extended.apply(chunk[0], chunk[1]);
                    }
                }
                screen.start_field_extended(base_attr, extended, None);
            }
            OrderCode::SetAttribute => {
                let (attr_type, attr_value) = reader.pair("SA attribute pair")?;
                screen.set_character_attribute(attr_type, attr_value);
            }
            OrderCode::ModifyField => {
                let count = reader.byte("MF count byte")? as usize;
                let pairs = reader.take(count * 2, "MF attribute pairs")?;
                self.modify_current_field(pairs, screen);
            }
            OrderCode::InsertCursor => {
                *insert_cursor = Some(screen.cursor_address());
            }
            OrderCode::ProgramTab => {
                screen.program_tab();
            }
            OrderCode::RepeatToAddress => {
                let addr = self.read_address(reader, "RA address")?;
                let ch = reader.byte("RA character")?;
                screen.repeat_to_address(ch, addr);
            }
            OrderCode::EraseUnprotectedToAddress => {
                let addr = self.read_address(reader, "EUA address")?;
                screen.erase_unprotected_to_address(addr);
            }
            OrderCode::GraphicEscape => {
                // The next byte comes from the graphic character set and is
                // written literally, whatever its value.
                let ch = reader.byte("GE character")?;
                screen.write_char_host(ch);
            }
        }
        Ok(())
    }

    /// MF applies attribute pairs to the field containing the cursor.
    /// On an unformatted buffer the pairs are consumed and nothing changes.
    fn modify_current_field(&self, pairs: &[u8], screen: &mut ScreenBuffer) {
        let cursor = screen.cursor_address();
        if screen.fields().find_field_at(cursor).is_none() {
            log::warn!("MF order on unformatted buffer, ignoring");
            return;
        }
        let mut base_attr = None;
        let mut extended_pairs = Vec::new();
        for chunk in pairs.chunks_exact(2) {
            if chunk[0] == XA_3270 {
                base_attr = Some(chunk[1]);
            } else {
                extended_pairs.push((chunk[0], chunk[1]));
            }
        }
        if let Some(field) = screen.fields_mut().find_field_at_mut(cursor) {
            if let Some(attr) = base_attr {
                field.base_attr = attr;
            }
            for (t, v) in extended_pairs {
                field.extended_attrs.apply(t, v);
            }
        }
    }

    fn read_address(
        &self,
        reader: &mut RecordReader<'_>,
        what: &'static str,
    ) -> ParseResult<u16> {
        let (b1, b2) = reader.pair(what)?;
        Ok(addressing::decode_address(b1, b2))
    }

    // --- structured fields ------------------------------------------------

    fn process_structured_fields(
        &mut self,
        reader: &mut RecordReader<'_>,
        screen: &mut ScreenBuffer,
        outcome: &mut ParseOutcome,
    ) -> ParseResult<()> {
        while !reader.at_end() {
            let (len_hi, len_lo) = reader.pair("structured field length")?;
            let length = u16::from_be_bytes([len_hi, len_lo]) as usize;
            let sfid = reader.byte("structured field id")?;
            let data = if length == 0 {
                // Length zero means "read to end of record"
                reader.rest()
            } else {
                if length < 3 {
                    return Err(ParseError::BadStructuredField {
                        sfid,
                        reason: format!("length {length} shorter than its own header"),
                    });
                }
                reader.take(length - 3, "structured field data")?
            };
            self.process_structured_field(sfid, data, screen, outcome);
        }
        Ok(())
    }

    fn process_structured_field(
        &mut self,
        sfid: u8,
        data: &[u8],
        screen: &mut ScreenBuffer,
        outcome: &mut ParseOutcome,
    ) {
        match sfid {
            SF_SNA_RESPONSE => {
                outcome
                    .events
                    .push(StreamEvent::SnaResponse(parse_sna_response(data)));
            }
            SF_BIND_IMAGE => {
                outcome
                    .events
                    .push(StreamEvent::BindImage(BindImage::parse(data)));
            }
            SF_UNBIND => {
                outcome.events.push(StreamEvent::Unbind);
            }
            SF_ERASE_RESET => {
                screen.clear();
            }
            SF_QUERY_REPLY => {
                self.log_query_reply(data);
            }
            SF_PRINTER_STATUS => {
                if let Some(&code) = data.first() {
                    outcome.events.push(StreamEvent::PrinterStatus(code));
                }
            }
            _ => {
                log::debug!(
                    "skipping unknown structured field 0x{sfid:02X} ({} bytes)",
                    data.len()
                );
            }
        }
    }

    /// Query replies describe device capabilities; they are logged so traces
    /// show what the host believes about the terminal.
    fn log_query_reply(&self, data: &[u8]) {
        let mut pos = 0;
        while pos + 2 <= data.len() {
            let query_type = data[pos];
            let length = data[pos + 1] as usize;
            pos += 2;
            if pos + length > data.len() {
                break;
            }
            log::debug!("query reply type 0x{query_type:02X} ({length} bytes)");
            pos += length;
        }
    }

    // --- SCS --------------------------------------------------------------

    /// Route an SCS-DATA record to the printer sink.
    ///
    /// The honored control subset is CR LF FF HT BS VT NL SO SI; SOH
    /// introduces a status byte; ENQ, ACK and BEL are accepted and logged;
    /// anything else below 0x40 is logged and skipped.
    fn parse_scs_record(
        &mut self,
        record: &[u8],
        mut printer: Option<&mut PrinterBuffer>,
        outcome: &mut ParseOutcome,
    ) {
        let mut pos = 0;
        while pos < record.len() {
            let byte = record[pos];
            pos += 1;
            match byte {
                CTRL_SOH => {
                    if pos < record.len() {
                        outcome.events.push(StreamEvent::PrinterStatus(record[pos]));
                        pos += 1;
                    } else {
                        log::warn!("SOH at end of SCS record with no status byte");
                    }
                }
                SCS_CR => {
                    if let Some(p) = printer.as_deref_mut() {
                        p.carriage_return();
                    }
                }
                SCS_LF | SCS_NL => {
                    if let Some(p) = printer.as_deref_mut() {
                        p.line_feed();
                    }
                }
                SCS_FF => {
                    if let Some(p) = printer.as_deref_mut() {
                        p.form_feed();
                    }
                }
                SCS_HT => {
                    if let Some(p) = printer.as_deref_mut() {
                        p.horizontal_tab();
                    }
                }
                SCS_BS => {
                    if let Some(p) = printer.as_deref_mut() {
                        p.backspace();
                    }
                }
                SCS_VT => {
                    if let Some(p) = printer.as_deref_mut() {
                        p.vertical_tab();
                    }
                }
                SCS_SO | SCS_SI => {
                    // Shift out/in: DBCS shifts are acknowledged but not rendered
                    log::debug!("SCS shift control 0x{byte:02X}");
                }
                SCS_ENQ | SCS_ACK | SCS_BEL => {
                    log::debug!("SCS control 0x{byte:02X} accepted");
                }
                b if b >= 0x40 => {
                    if let Some(p) = printer.as_deref_mut() {
                        p.write_ebcdic(b);
                    }
                }
                other => {
                    log::warn!("unknown SCS control 0x{other:02X}, skipping");
                }
            }
        }
    }
}

/// Decode an SNA response payload, tolerating truncated units.
pub fn parse_sna_response(data: &[u8]) -> SnaResponse {
    let response_type = data.first().copied().unwrap_or(0);
    let flags = data.get(1).copied().unwrap_or(SNA_FLAGS_NONE);
    let sense_code = if data.len() >= 4 {
        Some(u16::from_be_bytes([data[2], data[3]]))
    } else {
        None
    };
    let payload = if data.len() > 4 { data[4..].to_vec() } else { Vec::new() };
    SnaResponse {
        response_type,
        flags,
        sense_code,
        data: payload,
    }
}
