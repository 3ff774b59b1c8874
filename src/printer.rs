//! Printer buffer sink for SCS data streams
//!
//! Printer sessions route SCS-DATA records here instead of the screen
//! buffer. The sink assembles lines out of decoded characters and the
//! subset of SCS controls the framer honors; output formatting beyond
//! line assembly is left to the consumer.

use crate::ebcdic::EbcdicCodec;

/// Line-oriented sink for printer session output
#[derive(Debug, Default)]
pub struct PrinterBuffer {
    lines: Vec<String>,
    current: String,
    column: usize,
    codec: EbcdicCodec,
    /// Set between PRINT-EOJ records
    job_ended: bool,
}

impl PrinterBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(codec: EbcdicCodec) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    /// Append one decoded character at the current column.
    pub fn write_char(&mut self, ch: char) {
        self.current.push(ch);
        self.column += 1;
        self.job_ended = false;
    }

    /// Append one EBCDIC byte, decoding through the session codec.
    pub fn write_ebcdic(&mut self, byte: u8) {
        self.write_char(self.codec.decode_byte(byte));
    }

    /// Carriage return: back to column zero of the current line.
    pub fn carriage_return(&mut self) {
        self.column = 0;
        self.current.clear();
    }

    /// Line feed / new line: flush the current line.
    pub fn line_feed(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
        self.column = 0;
    }

    /// Form feed: flush and mark a page break.
    pub fn form_feed(&mut self) {
        self.line_feed();
        self.lines.push("\u{000C}".to_string());
    }

    /// Horizontal tab: advance to the next 8-column stop.
    pub fn horizontal_tab(&mut self) {
        let next_stop = (self.column / 8 + 1) * 8;
        while self.column < next_stop {
            self.current.push(' ');
            self.column += 1;
        }
    }

    /// Backspace: retreat one column.
    pub fn backspace(&mut self) {
        if self.current.pop().is_some() {
            self.column -= 1;
        }
    }

    /// Vertical tab: treated as a line break.
    pub fn vertical_tab(&mut self) {
        self.line_feed();
    }

    /// End the print job, flushing any partial line.
    pub fn end_job(&mut self) {
        if !self.current.is_empty() {
            self.line_feed();
        }
        self.job_ended = true;
    }

    pub fn is_job_ended(&self) -> bool {
        self.job_ended
    }

    /// Everything printed so far, lines joined with '\n'.
    pub fn get_content(&self) -> String {
        let mut out = self.lines.join("\n");
        if !self.current.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.current);
        }
        out
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.current.clear();
        self.column = 0;
        self.job_ended = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_assembly() {
        let mut printer = PrinterBuffer::new();
        for &b in &[0xC8, 0xC5, 0xD3, 0xD3, 0xD6] {
            printer.write_ebcdic(b); // "HELLO"
        }
        printer.line_feed();
        printer.write_char('X');
        assert_eq!(printer.get_content(), "HELLO\nX");
    }

    #[test]
    fn test_carriage_return_overwrites_line() {
        let mut printer = PrinterBuffer::new();
        printer.write_char('A');
        printer.carriage_return();
        printer.write_char('B');
        assert_eq!(printer.get_content(), "B");
    }

    #[test]
    fn test_tab_stops() {
        let mut printer = PrinterBuffer::new();
        printer.write_char('A');
        printer.horizontal_tab();
        printer.write_char('B');
        assert_eq!(printer.get_content(), "A       B");
    }

    #[test]
    fn test_end_job_flushes() {
        let mut printer = PrinterBuffer::new();
        printer.write_char('A');
        printer.end_job();
        assert!(printer.is_job_ended());
        assert_eq!(printer.get_content(), "A");
    }
}
