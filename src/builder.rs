//! Inbound 3270 data stream construction
//!
//! Builds the byte streams the terminal sends to the host: AID key
//! presses, read-modified submissions, and query reply structured fields.
//! Framing (TN3270E header, IAC escaping, EOR) is applied afterwards by
//! the handler.

use crate::codes::*;
use crate::screen::{addressing, ScreenBuffer};

/// Builder for terminal-to-host streams
///
/// Holds the column count for coordinate addressing and the negotiated
/// addressing width so emitted addresses match what the host expects.
#[derive(Debug, Clone)]
pub struct DataStreamSender {
    cols: usize,
    use_14bit: bool,
}

impl Default for DataStreamSender {
    fn default() -> Self {
        Self {
            cols: 80,
            use_14bit: false,
        }
    }
}

impl DataStreamSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_columns(&mut self, cols: usize) {
        self.cols = cols;
    }

    pub fn set_14bit_addressing(&mut self, enabled: bool) {
        self.use_14bit = enabled;
    }

    fn encode_address(&self, addr: u16) -> (u8, u8) {
        if self.use_14bit {
            addressing::encode_14bit_address(addr)
        } else {
            addressing::encode_12bit_address(addr)
        }
    }

    /// A bare AID key press
    pub fn build_key_press(&self, aid: AidKey) -> Vec<u8> {
        vec![aid.to_u8()]
    }

    /// Request retransmission of every field (Enter + read partition id)
    pub fn build_read_modified_all(&self) -> Vec<u8> {
        vec![AID_ENTER, RM_READ_PARTITION_ID]
    }

    /// Request retransmission of modified fields in the default partition
    pub fn build_read_modified_fields(&self) -> Vec<u8> {
        vec![AID_ENTER, CMD_READ_MODIFIED, RM_DEFAULT_PARTITION]
    }

    /// Erase/Write with an explicit payload (host-simulation and test paths)
    pub fn build_write(&self, data: &[u8], wcc: Option<u8>) -> Vec<u8> {
        let mut stream = vec![CMD_ERASE_WRITE, wcc.unwrap_or(0xC1)];
        stream.extend_from_slice(data);
        stream.push(CTRL_EOA);
        stream
    }

    /// SBA order positioning to (row, col)
    pub fn build_sba(&self, row: usize, col: usize) -> Vec<u8> {
        self.build_sba_addr((row * self.cols + col) as u16)
    }

    /// SBA order for a raw buffer address
    pub fn build_sba_addr(&self, addr: u16) -> Vec<u8> {
        let (b1, b2) = self.encode_address(addr);
        vec![ORDER_SBA, b1, b2]
    }

    /// A complete AID submission: AID, SBA(cursor), then one
    /// SBA + content block per modified input field in ascending address
    /// order. Empty fields are elided; NULs are stripped from content.
    pub fn build_submission(&self, aid: AidKey, screen: &ScreenBuffer) -> Vec<u8> {
        let mut stream = vec![aid.to_u8()];
        stream.extend_from_slice(&self.build_sba_addr(screen.cursor_address()));
        for (addr, content) in screen.read_modified() {
            if content.is_empty() {
                continue;
            }
            stream.extend_from_slice(&self.build_sba_addr(addr));
            stream.extend_from_slice(&content);
        }
        stream
    }

    /// One structured field: length(2) | sfid | data
    pub fn build_structured_field(&self, sfid: u8, data: &[u8]) -> Vec<u8> {
        let length = (3 + data.len()) as u16;
        let mut stream = length.to_be_bytes().to_vec();
        stream.push(sfid);
        stream.extend_from_slice(data);
        stream
    }

    /// Query reply structured field of the given reply type
    pub fn build_query_reply_sf(&self, reply_type: u8, data: &[u8]) -> Vec<u8> {
        let mut body = vec![reply_type];
        body.extend_from_slice(data);
        self.build_structured_field(SF_QUERY_REPLY, &body)
    }

    /// Query reply submission (AID 0x88 prefix) for the device type name
    pub fn build_device_type_query_reply(&self, device_type: &str) -> Vec<u8> {
        let mut stream = vec![AID_STRUCTURED_FIELD];
        stream.extend_from_slice(
            &self.build_query_reply_sf(QUERY_REPLY_DEVICE_TYPE, device_type.as_bytes()),
        );
        stream
    }

    /// Query reply submission describing the usable area geometry
    pub fn build_characteristics_query_reply(&self, rows: u16, cols: u16) -> Vec<u8> {
        let mut body = Vec::with_capacity(4);
        body.extend_from_slice(&cols.to_be_bytes());
        body.extend_from_slice(&rows.to_be_bytes());
        let mut stream = vec![AID_STRUCTURED_FIELD];
        stream.extend_from_slice(&self.build_query_reply_sf(QUERY_REPLY_CHARACTERISTICS, &body));
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::ATTR_PROTECTED;

    #[test]
    fn test_build_key_press() {
        let sender = DataStreamSender::new();
        assert_eq!(sender.build_key_press(AidKey::Enter), vec![0x7D]);
        assert_eq!(sender.build_key_press(AidKey::PF3), vec![0xF3]);
        assert_eq!(sender.build_key_press(AidKey::Clear), vec![0x6D]);
    }

    #[test]
    fn test_build_read_modified_all() {
        let sender = DataStreamSender::new();
        assert_eq!(sender.build_read_modified_all(), vec![0x7D, 0xF1]);
    }

    #[test]
    fn test_build_read_modified_fields() {
        let sender = DataStreamSender::new();
        assert_eq!(sender.build_read_modified_fields(), vec![0x7D, 0xF6, 0xF0]);
    }

    #[test]
    fn test_build_write_shape() {
        let sender = DataStreamSender::new();
        let stream = sender.build_write(&[0xC1, 0xC2], None);
        assert_eq!(stream[0], CMD_ERASE_WRITE);
        assert_eq!(stream[1], 0xC1);
        assert_eq!(&stream[2..4], &[0xC1, 0xC2]);
        assert_eq!(*stream.last().unwrap(), CTRL_EOA);
    }

    #[test]
    fn test_build_sba() {
        let sender = DataStreamSender::new();
        let stream = sender.build_sba(0, 20);
        assert_eq!(stream[0], ORDER_SBA);
        assert_eq!(
            addressing::decode_address(stream[1], stream[2]),
            20
        );
    }

    #[test]
    fn test_submission_without_modified_fields() {
        let sender = DataStreamSender::new();
        let mut screen = ScreenBuffer::default();
        screen.set_position(10, 5);
        let stream = sender.build_submission(AidKey::PF3, &screen);

        assert_eq!(stream[0], 0xF3);
        assert_eq!(stream[1], ORDER_SBA);
        assert_eq!(addressing::decode_address(stream[2], stream[3]), 805);
        // No field blocks follow
        assert_eq!(stream.len(), 4);
    }

    #[test]
    fn test_submission_with_modified_fields_ascending() {
        let sender = DataStreamSender::new();
        let mut screen = ScreenBuffer::default();
        screen.start_field(ATTR_PROTECTED, Some(0));
        screen.start_field(0x00, Some(100));
        screen.start_field(0x00, Some(200));
        screen.write_char_at(0xE8, 201); // 'Y' into the later field
        screen.write_char_at(0xE7, 101); // 'X' into the earlier field
        screen.set_position_addr(101);

        let stream = sender.build_submission(AidKey::Enter, &screen);
        assert_eq!(stream[0], 0x7D);

        // Collect SBA block addresses after the cursor block
        let mut addrs = Vec::new();
        let mut i = 1;
        while i + 2 < stream.len() {
            if stream[i] == ORDER_SBA {
                addrs.push(addressing::decode_address(stream[i + 1], stream[i + 2]));
                i += 3;
            } else {
                i += 1;
            }
        }
        // Cursor SBA first, then field blocks ascending
        assert_eq!(addrs[0], 101);
        assert_eq!(&addrs[1..], &[101, 201]);
    }

    #[test]
    fn test_submission_elides_empty_fields() {
        let sender = DataStreamSender::new();
        let mut screen = ScreenBuffer::default();
        screen.start_field(0x00, Some(0));
        screen.start_field(ATTR_PROTECTED, Some(10));
        // The input field's content is entirely NUL, with MDT set
        for addr in 1..10 {
            screen.write_char_at(0x00, addr);
        }
        let stream = sender.build_submission(AidKey::Enter, &screen);
        // AID + cursor SBA only: stripped-empty fields carry no block
        assert_eq!(stream.len(), 4);
    }

    #[test]
    fn test_build_query_reply_sf() {
        let sender = DataStreamSender::new();
        let sf = sender.build_query_reply_sf(QUERY_REPLY_CHARACTERISTICS, &[0x01]);
        assert_eq!(sf, vec![0x00, 0x05, SF_QUERY_REPLY, QUERY_REPLY_CHARACTERISTICS, 0x01]);
    }

    #[test]
    fn test_device_type_query_reply() {
        let sender = DataStreamSender::new();
        let stream = sender.build_device_type_query_reply("IBM-3279-4-E");
        assert_eq!(stream[0], AID_STRUCTURED_FIELD);
        assert!(stream.windows(12).any(|w| w == b"IBM-3279-4-E".as_slice()));
    }
}
