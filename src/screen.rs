//! 3270 screen buffer management
//!
//! The screen buffer holds the character plane, per-cell extended
//! attributes, the cursor, and the field chain for one terminal session.
//! It performs no I/O: the data-stream parser mutates it on behalf of the
//! host, and the session edit API mutates it on behalf of the client.
//! Both funnel through the same mutators so ordering is preserved.

use crate::codes::AidKey;
use crate::ebcdic::{ebcdic_to_ascii, EBCDIC_SPACE};
use crate::field::{ExtendedAttributes, FieldAttribute, FieldManager};

use serde::{Deserialize, Serialize};

/// Standard 3270 screen sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenSize {
    /// Model 2: 24 rows x 80 columns (1920 characters)
    Model2,
    /// Model 3: 32 rows x 80 columns (2560 characters)
    Model3,
    /// Model 4: 43 rows x 80 columns (3440 characters)
    Model4,
    /// Model 5: 27 rows x 132 columns (3564 characters)
    Model5,
}

impl ScreenSize {
    pub fn rows(&self) -> usize {
        match self {
            Self::Model2 => 24,
            Self::Model3 => 32,
            Self::Model4 => 43,
            Self::Model5 => 27,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Self::Model2 | Self::Model3 | Self::Model4 => 80,
            Self::Model5 => 132,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.rows() * self.cols()
    }
}

/// One cell of the display plane
///
/// `is_field_attr` marks the attribute byte position of a field; the cell
/// itself renders as an EBCDIC space. The extended attribute bytes are
/// painted by the SA order and by SFE field creation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cell {
    /// Character data (EBCDIC)
    pub ebcdic: u8,

    /// Whether this position holds a field attribute byte
    pub is_field_attr: bool,

    /// Extended color attribute
    pub color: u8,

    /// Extended highlighting attribute
    pub highlight: u8,

    /// Extended character set attribute
    pub charset: u8,

    /// Extended validation attribute
    pub validation: u8,
}

/// Snapshot of the mutable screen state taken before a Write record.
///
/// Covers cells, cursor and the field chain (which carries the MDT bits);
/// enough to restore the pre-record state bit-for-bit on rollback.
#[derive(Debug, Clone)]
pub struct WriteSnapshot {
    cells: Vec<Cell>,
    cursor: u16,
    fields: Vec<FieldAttribute>,
}

/// 3270 screen buffer
#[derive(Debug)]
pub struct ScreenBuffer {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    cursor: u16,
    fields: FieldManager,
    keyboard_locked: bool,
    alarm_pending: bool,
    aid_pending: Option<AidKey>,
    /// Extended attributes painted onto subsequent cells by the SA order
    char_attrs: ExtendedAttributes,
}

impl ScreenBuffer {
    /// Create a buffer with explicit dimensions
    pub fn new(rows: usize, cols: usize) -> Self {
        let size = rows * cols;
        Self {
            rows,
            cols,
            cells: vec![
                Cell {
                    ebcdic: EBCDIC_SPACE,
                    ..Cell::default()
                };
                size
            ],
            cursor: 0,
            fields: FieldManager::new(),
            keyboard_locked: true,
            alarm_pending: false,
            aid_pending: None,
            char_attrs: ExtendedAttributes::new(),
        }
    }

    /// Create a buffer for a standard screen size
    pub fn with_size(size: ScreenSize) -> Self {
        Self::new(size.rows(), size.cols())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn buffer_size(&self) -> usize {
        self.cells.len()
    }

    /// Resize the buffer (BIND-IMAGE PSC override). Clears all state.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        *self = Self::new(rows, cols);
    }

    /// Fill with EBCDIC spaces, drop all fields, home the cursor.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell {
                ebcdic: EBCDIC_SPACE,
                ..Cell::default()
            };
        }
        self.cursor = 0;
        self.fields.clear();
        self.char_attrs = ExtendedAttributes::new();
    }

    // --- cursor -----------------------------------------------------------

    /// Set the cursor by coordinates; out-of-range values clamp.
    pub fn set_position(&mut self, row: usize, col: usize) {
        let row = row.min(self.rows - 1);
        let col = col.min(self.cols - 1);
        self.cursor = (row * self.cols + col) as u16;
    }

    /// Set the cursor by buffer address; out-of-range clamps to the last cell.
    pub fn set_position_addr(&mut self, addr: u16) {
        if (addr as usize) < self.cells.len() {
            self.cursor = addr;
        } else {
            log::warn!(
                "cursor address {addr} out of range for {}x{} buffer, clamping",
                self.rows,
                self.cols
            );
            self.cursor = (self.cells.len() - 1) as u16;
        }
    }

    pub fn get_position(&self) -> (usize, usize) {
        let addr = self.cursor as usize;
        (addr / self.cols, addr % self.cols)
    }

    pub fn cursor_address(&self) -> u16 {
        self.cursor
    }

    // --- writing ----------------------------------------------------------

    /// Client-side write: place a byte, advance the cursor, set MDT when the
    /// covering field is input.
    pub fn write_char(&mut self, ebcdic: u8) {
        let addr = self.cursor;
        self.write_char_at(ebcdic, addr);
        self.cursor = ((addr as usize + 1) % self.cells.len()) as u16;
    }

    /// Client-side write at an explicit address (cursor untouched).
    pub fn write_char_at(&mut self, ebcdic: u8, addr: u16) {
        let index = addr as usize;
        if index >= self.cells.len() {
            return;
        }
        self.cells[index].ebcdic = ebcdic;
        self.cells[index].is_field_attr = false;
        if let Some(field) = self.fields.find_field_at_mut(addr) {
            if field.is_input() {
                field.set_modified(true);
            }
        }
    }

    /// Host-side write: place a byte at the cursor and advance. Host data
    /// never touches MDT; only the field attribute byte carries it.
    pub fn write_char_host(&mut self, ebcdic: u8) {
        let addr = self.cursor as usize;
        let attrs = self.char_attrs.clone();
        let cell = &mut self.cells[addr];
        cell.ebcdic = ebcdic;
        cell.is_field_attr = false;
        if let Some(c) = attrs.foreground_color {
            cell.color = c;
        }
        if let Some(h) = attrs.highlighting {
            cell.highlight = h;
        }
        if let Some(cs) = attrs.charset {
            cell.charset = cs;
        }
        if let Some(v) = attrs.validation {
            cell.validation = v;
        }
        self.cursor = ((addr + 1) % self.cells.len()) as u16;
    }

    /// Read the byte at an address
    pub fn read_char_at(&self, addr: u16) -> Option<u8> {
        self.cells.get(addr as usize).map(|c| c.ebcdic)
    }

    pub fn cell_at(&self, addr: u16) -> Option<&Cell> {
        self.cells.get(addr as usize)
    }

    // --- fields -----------------------------------------------------------

    /// Create or replace a field at the given address (cursor if `None`).
    ///
    /// The attribute byte occupies the cell and renders as an EBCDIC space;
    /// the cursor moves past it.
    pub fn start_field(&mut self, base_attr: u8, addr: Option<u16>) {
        self.start_field_extended(base_attr, ExtendedAttributes::new(), addr);
    }

    /// SFE variant of [`start_field`](Self::start_field)
    pub fn start_field_extended(
        &mut self,
        base_attr: u8,
        extended: ExtendedAttributes,
        addr: Option<u16>,
    ) {
        let addr = addr.unwrap_or(self.cursor);
        let index = addr as usize;
        if index >= self.cells.len() {
            return;
        }
        self.cells[index] = Cell {
            ebcdic: EBCDIC_SPACE,
            is_field_attr: true,
            color: extended.foreground_color.unwrap_or(0),
            highlight: extended.highlighting.unwrap_or(0),
            charset: extended.charset.unwrap_or(0),
            validation: extended.validation.unwrap_or(0),
        };
        let field = FieldAttribute::new_extended(addr, base_attr, extended);
        self.fields.add_field(field, self.cells.len());
        self.cursor = ((index + 1) % self.cells.len()) as u16;
    }

    pub fn fields(&self) -> &FieldManager {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldManager {
        &mut self.fields
    }

    /// Program Tab: advance the cursor to the first cell of the next input field.
    ///
    /// Returns false (cursor unmoved) when no input field exists.
    pub fn program_tab(&mut self) -> bool {
        if let Some(field) = self.fields.next_input_field(self.cursor) {
            self.cursor = ((field.address as usize + 1) % self.cells.len()) as u16;
            true
        } else {
            false
        }
    }

    /// Move the cursor backwards to the previous input field.
    pub fn backtab(&mut self) -> bool {
        let inputs: Vec<u16> = self
            .fields
            .fields()
            .iter()
            .filter(|f| f.is_input())
            .map(|f| f.address)
            .collect();
        if inputs.is_empty() {
            return false;
        }
        let prev = inputs
            .iter()
            .rev()
            .find(|&&a| ((a as usize + 1) % self.cells.len()) < self.cursor as usize)
            .or(inputs.last());
        if let Some(&addr) = prev {
            self.cursor = ((addr as usize + 1) % self.cells.len()) as u16;
            true
        } else {
            false
        }
    }

    /// Cursor to the first input field, or home when the screen is unformatted.
    pub fn move_to_first_input(&mut self) {
        if let Some(field) = self.fields.first_input_field() {
            self.cursor = ((field.address as usize + 1) % self.cells.len()) as u16;
        } else {
            self.cursor = 0;
        }
    }

    /// Content bytes of the field covering `addr`, excluding the attribute byte.
    pub fn field_content(&self, addr: u16) -> Vec<u8> {
        let Some(field) = self.fields.find_field_at(addr) else {
            return Vec::new();
        };
        let start = (field.address as usize + 1) % self.cells.len();
        (0..field.length as usize)
            .map(|i| self.cells[(start + i) % self.cells.len()].ebcdic)
            .collect()
    }

    /// Enumerate modified input fields as (first-data-cell address, content).
    ///
    /// Content is taken in screen order, wrapping through 0; NUL bytes are
    /// stripped per the read-modified stream rules.
    pub fn read_modified(&self) -> Vec<(u16, Vec<u8>)> {
        let size = self.cells.len();
        self.fields
            .modified_fields()
            .into_iter()
            .map(|field| {
                let start = (field.address as usize + 1) % size;
                let content: Vec<u8> = (0..field.length as usize)
                    .map(|i| self.cells[(start + i) % size].ebcdic)
                    .filter(|&b| b != 0x00)
                    .collect();
                (start as u16, content)
            })
            .collect()
    }

    // --- host orders ------------------------------------------------------

    /// Repeat `ch` from the cursor up to (not including) `target`, wrapping
    /// through position 0 when `target` precedes the cursor. The cursor ends
    /// at `target`. Equal addresses fill the entire buffer.
    pub fn repeat_to_address(&mut self, ch: u8, target: u16) {
        let size = self.cells.len();
        let target = (target as usize).min(size - 1);
        let mut pos = self.cursor as usize;
        loop {
            self.cells[pos].ebcdic = ch;
            self.cells[pos].is_field_attr = false;
            pos = (pos + 1) % size;
            if pos == target {
                break;
            }
        }
        self.cursor = target as u16;
    }

    /// Erase Unprotected to Address: NUL unprotected data cells from the
    /// cursor up to (not including) `target`, wrapping as RA does.
    pub fn erase_unprotected_to_address(&mut self, target: u16) {
        let size = self.cells.len();
        let target = (target as usize).min(size - 1);
        let mut pos = self.cursor as usize;
        loop {
            let protected = self
                .fields
                .find_field_at(pos as u16)
                .map(|f| f.is_protected())
                .unwrap_or(false);
            if !protected && !self.cells[pos].is_field_attr {
                self.cells[pos].ebcdic = 0x00;
            }
            pos = (pos + 1) % size;
            if pos == target {
                break;
            }
        }
        self.cursor = target as u16;
    }

    /// Erase All Unprotected: NUL input field contents, reset their MDT,
    /// unlock the keyboard, cursor to the first input field.
    pub fn erase_all_unprotected(&mut self) {
        let size = self.cells.len();
        let spans: Vec<(usize, usize)> = self
            .fields
            .fields()
            .iter()
            .filter(|f| f.is_input())
            .map(|f| ((f.address as usize + 1) % size, f.length as usize))
            .collect();
        for (start, length) in spans {
            for i in 0..length {
                self.cells[(start + i) % size].ebcdic = 0x00;
            }
        }
        self.fields.reset_mdt();
        self.keyboard_locked = false;
        self.aid_pending = None;
        self.move_to_first_input();
    }

    /// Paint extended attributes onto subsequent host writes (SA order).
    pub fn set_character_attribute(&mut self, attr_type: u8, attr_value: u8) {
        if attr_type == crate::codes::XA_ALL && attr_value == 0 {
            self.char_attrs = ExtendedAttributes::new();
        } else {
            self.char_attrs.apply(attr_type, attr_value);
        }
    }

    // --- session state flags ---------------------------------------------

    pub fn set_keyboard_lock(&mut self, locked: bool) {
        self.keyboard_locked = locked;
    }

    pub fn is_keyboard_locked(&self) -> bool {
        self.keyboard_locked
    }

    /// Arm the alarm; the session façade consumes it via [`take_alarm`](Self::take_alarm).
    pub fn sound_alarm(&mut self) {
        self.alarm_pending = true;
    }

    pub fn take_alarm(&mut self) -> bool {
        std::mem::take(&mut self.alarm_pending)
    }

    pub fn set_aid_pending(&mut self, aid: Option<AidKey>) {
        self.aid_pending = aid;
    }

    pub fn aid_pending(&self) -> Option<AidKey> {
        self.aid_pending
    }

    /// Reset terminal state flags without touching the character plane.
    pub fn terminal_reset(&mut self) {
        self.keyboard_locked = false;
        self.alarm_pending = false;
        self.aid_pending = None;
    }

    // --- snapshots (transactional writes) --------------------------------

    pub fn snapshot(&self) -> WriteSnapshot {
        WriteSnapshot {
            cells: self.cells.clone(),
            cursor: self.cursor,
            fields: self.fields.snapshot(),
        }
    }

    pub fn restore(&mut self, snapshot: WriteSnapshot) {
        self.cells = snapshot.cells;
        self.cursor = snapshot.cursor;
        self.fields.restore(snapshot.fields);
    }

    // --- rendering --------------------------------------------------------

    /// One row as text; field attribute positions render as spaces.
    pub fn get_row(&self, row: usize) -> Option<String> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        let mut result = String::with_capacity(self.cols);
        for cell in &self.cells[start..start + self.cols] {
            if cell.is_field_attr {
                result.push(' ');
            } else {
                let ch = ebcdic_to_ascii(cell.ebcdic);
                result.push(if ch.is_ascii_graphic() || ch == ' ' {
                    ch
                } else {
                    ' '
                });
            }
        }
        Some(result)
    }

    /// Decode the whole screen, rows joined with '\n'.
    ///
    /// With `strip` set, trailing spaces are removed from each row.
    pub fn to_text(&self, strip: bool) -> String {
        (0..self.rows)
            .map(|r| {
                let row = self.get_row(r).unwrap_or_default();
                if strip {
                    row.trim_end().to_string()
                } else {
                    row
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The raw character plane
    pub fn buffer_data(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.ebcdic).collect()
    }
}

impl Default for ScreenBuffer {
    fn default() -> Self {
        Self::with_size(ScreenSize::Model2)
    }
}

impl std::fmt::Display for ScreenBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text(false))
    }
}

/// Buffer addressing for the 3270 wire encoding
///
/// Two encodings share the two-byte slot: the 12-bit form packs two 6-bit
/// values into graphic code bytes, the 14-bit form is plain binary with a
/// zero top-quarter in the first byte. Both are accepted on parse; the
/// emitting side chooses based on negotiated mode.
pub mod addressing {
    /// Decode either address form by inspecting the top two bits of byte 0.
    pub fn decode_address(byte1: u8, byte2: u8) -> u16 {
        if byte1 & 0xC0 == 0x00 {
            decode_14bit_address(byte1, byte2)
        } else {
            decode_12bit_address(byte1, byte2)
        }
    }

    /// Decode a 12-bit buffer address from two 6-bit code bytes.
    pub fn decode_12bit_address(byte1: u8, byte2: u8) -> u16 {
        (((byte1 & 0x3F) as u16) << 6) | (byte2 & 0x3F) as u16
    }

    /// Decode a 14-bit binary buffer address.
    pub fn decode_14bit_address(byte1: u8, byte2: u8) -> u16 {
        (((byte1 & 0x3F) as u16) << 8) | byte2 as u16
    }

    /// Encode a 12-bit buffer address into two graphic code bytes.
    pub fn encode_12bit_address(address: u16) -> (u8, u8) {
        (
            encode_address_byte(((address >> 6) & 0x3F) as u8),
            encode_address_byte((address & 0x3F) as u8),
        )
    }

    /// Encode a 14-bit binary buffer address.
    pub fn encode_14bit_address(address: u16) -> (u8, u8) {
        (((address >> 8) & 0x3F) as u8, (address & 0xFF) as u8)
    }

    /// Map a 6-bit value into the graphic address-byte range.
    fn encode_address_byte(value: u8) -> u8 {
        0x40 | (value & 0x3F)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{ATTR_MDT, ATTR_PROTECTED};

    #[test]
    fn test_screen_creation() {
        let screen = ScreenBuffer::default();
        assert_eq!(screen.rows(), 24);
        assert_eq!(screen.cols(), 80);
        assert_eq!(screen.cursor_address(), 0);
        assert_eq!(screen.buffer_data(), vec![EBCDIC_SPACE; 1920]);
    }

    #[test]
    fn test_screen_sizes() {
        assert_eq!(ScreenSize::Model2.buffer_size(), 1920);
        assert_eq!(ScreenSize::Model3.buffer_size(), 2560);
        assert_eq!(ScreenSize::Model4.buffer_size(), 3440);
        assert_eq!(ScreenSize::Model5.buffer_size(), 3564);
    }

    #[test]
    fn test_write_char_advances_cursor() {
        let mut screen = ScreenBuffer::default();
        screen.write_char(0xC1);
        assert_eq!(screen.cursor_address(), 1);
        assert_eq!(screen.read_char_at(0), Some(0xC1));
    }

    #[test]
    fn test_write_char_wraps() {
        let mut screen = ScreenBuffer::new(2, 5);
        screen.set_position_addr(9);
        screen.write_char(0xC1);
        assert_eq!(screen.cursor_address(), 0);
    }

    #[test]
    fn test_set_position_clamps() {
        let mut screen = ScreenBuffer::default();
        screen.set_position(99, 200);
        assert_eq!(screen.get_position(), (23, 79));

        screen.set_position_addr(5000);
        assert_eq!(screen.cursor_address(), 1919);
    }

    #[test]
    fn test_client_write_sets_mdt() {
        let mut screen = ScreenBuffer::default();
        screen.start_field(0x00, Some(10));
        screen.set_position_addr(11);
        screen.write_char(0xC1);
        assert_eq!(screen.read_modified().len(), 1);
    }

    #[test]
    fn test_host_write_does_not_set_mdt() {
        let mut screen = ScreenBuffer::default();
        screen.start_field(0x00, Some(10));
        screen.set_position_addr(11);
        screen.write_char_host(0xC1);
        assert!(screen.read_modified().is_empty());
    }

    #[test]
    fn test_start_field_renders_space() {
        let mut screen = ScreenBuffer::default();
        screen.write_char(0xC1);
        screen.start_field(ATTR_PROTECTED, Some(0));
        assert_eq!(screen.read_char_at(0), Some(EBCDIC_SPACE));
        assert!(screen.cell_at(0).unwrap().is_field_attr);
        assert_eq!(screen.cursor_address(), 1);
    }

    #[test]
    fn test_program_tab() {
        let mut screen = ScreenBuffer::default();
        screen.start_field(ATTR_PROTECTED, Some(0));
        screen.start_field(0x00, Some(100));
        screen.set_position_addr(0);
        assert!(screen.program_tab());
        assert_eq!(screen.cursor_address(), 101);
    }

    #[test]
    fn test_move_to_first_input_unformatted() {
        let mut screen = ScreenBuffer::default();
        screen.set_position_addr(500);
        screen.move_to_first_input();
        assert_eq!(screen.cursor_address(), 0);
    }

    #[test]
    fn test_read_modified_strips_nuls() {
        let mut screen = ScreenBuffer::default();
        screen.start_field(ATTR_MDT, Some(0));
        screen.start_field(ATTR_PROTECTED, Some(10));
        // Field content: A, NUL, B followed by spaces
        screen.write_char_at(0xC1, 1);
        screen.write_char_at(0x00, 2);
        screen.write_char_at(0xC2, 3);
        let modified = screen.read_modified();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].0, 1);
        assert!(!modified[0].1.contains(&0x00));
    }

    #[test]
    fn test_repeat_to_address_wraps() {
        let mut screen = ScreenBuffer::new(2, 5);
        screen.set_position_addr(8);
        screen.repeat_to_address(0xC1, 2);
        // Filled 8, 9, 0, 1; cursor left at target
        assert_eq!(screen.read_char_at(8), Some(0xC1));
        assert_eq!(screen.read_char_at(9), Some(0xC1));
        assert_eq!(screen.read_char_at(0), Some(0xC1));
        assert_eq!(screen.read_char_at(1), Some(0xC1));
        assert_eq!(screen.read_char_at(2), Some(EBCDIC_SPACE));
        assert_eq!(screen.cursor_address(), 2);
    }

    #[test]
    fn test_erase_all_unprotected() {
        let mut screen = ScreenBuffer::default();
        screen.start_field(ATTR_PROTECTED, Some(0));
        screen.write_char_at(0xC1, 1);
        screen.start_field(ATTR_MDT, Some(40));
        screen.write_char_at(0xC2, 41);

        screen.erase_all_unprotected();

        // Protected field content untouched, input field nulled, MDT reset
        assert_eq!(screen.read_char_at(1), Some(0xC1));
        assert_eq!(screen.read_char_at(41), Some(0x00));
        assert!(screen.read_modified().is_empty());
        assert!(!screen.is_keyboard_locked());
        assert_eq!(screen.cursor_address(), 41);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut screen = ScreenBuffer::default();
        screen.start_field(0x00, Some(0));
        screen.write_char(0xC1);
        let snap = screen.snapshot();
        let before = screen.buffer_data();

        screen.clear();
        screen.write_char(0xE7);
        screen.restore(snap);

        assert_eq!(screen.buffer_data(), before);
        assert_eq!(screen.fields().fields().len(), 1);
    }

    #[test]
    fn test_to_text_rows() {
        let mut screen = ScreenBuffer::new(2, 5);
        screen.write_char(0xC1);
        screen.write_char(0xC2);
        let text = screen.to_text(true);
        assert_eq!(text, "AB\n");
    }

    #[test]
    fn test_resize_on_bind() {
        let mut screen = ScreenBuffer::default();
        screen.write_char(0xC1);
        screen.resize(43, 80);
        assert_eq!(screen.rows(), 43);
        assert_eq!(screen.buffer_size(), 3440);
        assert_eq!(screen.cursor_address(), 0);
    }

    mod addressing_tests {
        use super::super::addressing::*;

        #[test]
        fn test_12bit_round_trip() {
            for addr in [0u16, 1, 100, 1919, 3439, 4095] {
                let (b1, b2) = encode_12bit_address(addr);
                assert_eq!(decode_address(b1, b2), addr, "addr {addr}");
            }
        }

        #[test]
        fn test_14bit_round_trip() {
            for addr in [0u16, 100, 1919, 3563, 16383] {
                let (b1, b2) = encode_14bit_address(addr);
                assert_eq!(decode_14bit_address(b1, b2), addr, "addr {addr}");
            }
        }

        #[test]
        fn test_14bit_detected_by_prefix() {
            // 0x00 0x50 has a zero top-quarter: 14-bit binary, address 80
            assert_eq!(decode_address(0x00, 0x50), 80);
        }
    }
}
