//! Property tests for the wire-level invariants
//!
//! Rollback exactness for truncated writes, addressing round-trips over
//! the full address space, EBCDIC round-trips on the printable subset,
//! and parser robustness against arbitrary byte soup.

use proptest::prelude::*;

use tn3270r::codes::DataType;
use tn3270r::ebcdic::EbcdicCodec;
use tn3270r::parser::DataStreamParser;
use tn3270r::screen::{addressing, ScreenBuffer};

/// Generate a syntactically valid write record, then truncate it.
fn write_record() -> impl Strategy<Value = Vec<u8>> {
    let order = prop_oneof![
        // SBA + address
        (0u16..1920).prop_map(|addr| {
            let (b1, b2) = addressing::encode_12bit_address(addr);
            vec![0x11, b1, b2]
        }),
        // SF + attribute
        any::<u8>().prop_map(|attr| vec![0x1D, attr]),
        // SA pair
        (any::<u8>(), any::<u8>()).prop_map(|(t, v)| vec![0x28, t, v]),
        // RA + address + char
        (0u16..1920, 0x40u8..=0xFE).prop_map(|(addr, ch)| {
            let (b1, b2) = addressing::encode_12bit_address(addr);
            vec![0x3C, b1, b2, ch]
        }),
        // Graphic characters
        proptest::collection::vec(0x40u8..=0xFE, 1..8),
    ];
    (
        prop_oneof![Just(0xF1u8), Just(0xF5u8)],
        any::<u8>(),
        proptest::collection::vec(order, 0..8),
    )
        .prop_map(|(cmd, wcc, orders)| {
            let mut record = vec![cmd, wcc];
            for chunk in orders {
                record.extend_from_slice(&chunk);
            }
            record
        })
}

proptest! {
    /// P1: any write that fails with an incomplete order leaves the screen
    /// exactly as it was.
    #[test]
    fn truncated_writes_roll_back_exactly(
        record in write_record(),
        cut in 1usize..16,
    ) {
        prop_assume!(record.len() > 2);
        let cut = cut.min(record.len() - 1);
        let truncated = &record[..record.len() - cut];

        let mut parser = DataStreamParser::new();
        let mut screen = ScreenBuffer::default();
        // Seed some prior state so rollback has something to preserve
        screen.start_field(0x00, Some(40));
        screen.write_char_at(0xC1, 41);
        screen.set_position_addr(7);

        let before_cells = screen.buffer_data();
        let before_cursor = screen.cursor_address();

        let result = parser.parse(truncated, DataType::Tn3270Data, &mut screen, None);
        if result.is_err() {
            prop_assert_eq!(screen.buffer_data(), before_cells);
            prop_assert_eq!(screen.cursor_address(), before_cursor);
        }
    }

    /// P2 (12-bit): encode then decode is the identity over [0, R*C)
    #[test]
    fn addressing_12bit_round_trip(addr in 0u16..3564) {
        let (b1, b2) = addressing::encode_12bit_address(addr);
        prop_assert_eq!(addressing::decode_address(b1, b2), addr);
        prop_assert_eq!(addressing::decode_12bit_address(b1, b2), addr);
    }

    /// P2 (14-bit): same for binary addressing
    #[test]
    fn addressing_14bit_round_trip(addr in 0u16..16384) {
        let (b1, b2) = addressing::encode_14bit_address(addr);
        prop_assert_eq!(addressing::decode_14bit_address(b1, b2), addr);
    }

    /// P3: printable ASCII survives the EBCDIC round trip
    #[test]
    fn ebcdic_round_trip_printable(s in "[ -~]{0,64}") {
        let codec = EbcdicCodec::default();
        let (bytes, consumed) = codec.encode(&s);
        prop_assert_eq!(consumed, s.chars().count());
        prop_assert_eq!(codec.decode(&bytes), s);
    }

    /// P8: the parser terminates on arbitrary input without panicking,
    /// whatever state it leaves the screen in.
    #[test]
    fn parser_survives_byte_soup(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut parser = DataStreamParser::new();
        let mut screen = ScreenBuffer::default();
        let _ = parser.parse(&data, DataType::Tn3270Data, &mut screen, None);
        // Cursor stays inside the buffer whatever happened
        prop_assert!((screen.cursor_address() as usize) < screen.buffer_size());
    }

    /// Field chains stay consistent under random field creation
    #[test]
    fn field_chain_lengths_cover_buffer(
        addrs in proptest::collection::btree_set(0u16..1920, 1..12)
    ) {
        let mut screen = ScreenBuffer::default();
        for &addr in &addrs {
            screen.start_field(0x00, Some(addr));
        }
        let fields = screen.fields().fields();
        prop_assert_eq!(fields.len(), addrs.len());
        // Each field spans exactly to its successor: attribute bytes plus
        // content cells tile the whole buffer.
        let total: usize = fields.iter().map(|f| f.length as usize + 1).sum();
        prop_assert_eq!(total, screen.buffer_size());
    }
}
