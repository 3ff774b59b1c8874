use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tn3270r::codes::DataType;
use tn3270r::parser::DataStreamParser;
use tn3270r::screen::{addressing, ScreenBuffer};

/// A representative login-screen write: fields, repeats and literal text.
fn sample_stream() -> Vec<u8> {
    let mut data = vec![
        0xF5, // Erase/Write
        0xC3, // WCC
    ];
    for row in 0..8u16 {
        let (b1, b2) = addressing::encode_12bit_address(row * 80);
        data.extend_from_slice(&[0x11, b1, b2]); // SBA
        data.extend_from_slice(&[0x1D, 0xF0]); // SF protected
        // "TN3270R " repeated across the row
        for _ in 0..9 {
            data.extend_from_slice(&[0xE3, 0xD5, 0xF3, 0xF2, 0xF7, 0xF0, 0xD9, 0x40]);
        }
        data.extend_from_slice(&[0x1D, 0x00]); // SF input
    }
    let (b1, b2) = addressing::encode_12bit_address(1919);
    data.extend_from_slice(&[0x3C, b1, b2, 0x40]); // RA fill with spaces
    data
}

fn bench_parse_3270_stream(c: &mut Criterion) {
    let data = sample_stream();

    c.bench_function("parse_3270_stream", |b| {
        b.iter(|| {
            let mut parser = DataStreamParser::new();
            let mut screen = ScreenBuffer::default();
            black_box(
                parser.parse(black_box(&data), DataType::Tn3270Data, &mut screen, None),
            )
            .unwrap();
            black_box(screen.cursor_address())
        })
    });
}

fn bench_read_modified(c: &mut Criterion) {
    let mut parser = DataStreamParser::new();
    let mut screen = ScreenBuffer::default();
    parser
        .parse(&sample_stream(), DataType::Tn3270Data, &mut screen, None)
        .unwrap();
    // Touch every input field so read-modified has work to do
    for addr in (0..1920u16).step_by(80) {
        screen.write_char_at(0xC1, addr.saturating_add(75));
    }

    c.bench_function("read_modified", |b| {
        b.iter(|| black_box(screen.read_modified()))
    });
}

criterion_group!(benches, bench_parse_3270_stream, bench_read_modified);
criterion_main!(benches);
