//! Telnet and TN3270E negotiation integration tests
//!
//! Exercises the negotiator against recorded host byte sequences: the
//! full TN3270E acceptance exchange, classic fallback after refusal, and
//! the unterminated-subnegotiation timeout.

use std::time::Duration;

use tn3270r::errors::NegotiationError;
use tn3270r::telnet::*;

#[test]
fn full_tn3270e_exchange_sets_mode_and_geometry() {
    let mut negotiator = TelnetNegotiator::new();

    // IAC WILL EOR, IAC DO TN3270E
    let reply = negotiator.process_incoming_data(&[0xFF, 0xFB, 0x19]);
    assert_eq!(&reply[..3], &[0xFF, 0xFD, 0x19], "DO EOR expected");
    let reply = negotiator.process_incoming_data(&[0xFF, 0xFD, 0x28]);
    assert_eq!(&reply[..3], &[0xFF, 0xFB, 0x28], "WILL TN3270E expected");
    // The WILL is followed by our DEVICE-TYPE REQUEST
    assert!(reply.windows(12).any(|w| w == b"IBM-3279-4-E".as_slice()));

    // IAC SB TN3270E DEVICE-TYPE IS "IBM-3279-4-E" IAC SE
    let mut sb = vec![0xFF, 0xFA, 0x28, 0x02, 0x04];
    sb.extend_from_slice(b"IBM-3279-4-E");
    sb.extend_from_slice(&[0xFF, 0xF0]);
    let reply = negotiator.process_incoming_data(&sb);
    // FUNCTIONS REQUEST goes out once the device type is accepted
    assert!(reply
        .windows(2)
        .any(|w| w == [TN3270E_FUNCTIONS, TN3270E_REQUEST]));

    // IAC SB TN3270E FUNCTIONS IS 0x15 IAC SE
    negotiator.process_incoming_data(&[0xFF, 0xFA, 0x28, 0x03, 0x04, 0x15, 0xFF, 0xF0]);

    assert!(negotiator.tn3270e_negotiated());
    assert_eq!(negotiator.device_type(), "IBM-3279-4-E");
    assert_eq!(negotiator.functions(), 0x15);
    assert_eq!(negotiator.take_pending_screen_size(), Some((43, 80)));
    assert!(!negotiator.is_printer());
}

#[test]
fn tn3270e_refusal_keeps_classic_framing() {
    let mut negotiator = TelnetNegotiator::new();
    negotiator.start_negotiation();

    negotiator.process_incoming_data(&[0xFF, 0xFB, 0x19]); // WILL EOR
    negotiator.process_incoming_data(&[0xFF, 0xFB, 0x00]); // WILL BINARY
    negotiator.process_incoming_data(&[0xFF, 0xFD, 0x19]); // DO EOR
    negotiator.process_incoming_data(&[0xFF, 0xFD, 0x00]); // DO BINARY
    negotiator.process_incoming_data(&[0xFF, 0xFE, 0x28]); // DONT TN3270E

    assert!(!negotiator.tn3270e_negotiated());
    assert!(negotiator.eor_active());
    assert!(negotiator.binary_active());
    assert!(negotiator.classic_tn3270());

    // Subsequent records pass through without TN3270E interpretation
    negotiator.process_incoming_data(&[0xF1, 0x00, 0xFF, 0xEF]);
    assert_eq!(negotiator.take_data(), vec![0xF1, 0x00, 0xFF, 0xEF]);
}

#[test]
fn device_type_fallback_walks_candidate_list() {
    let mut negotiator = TelnetNegotiator::new();
    let first = negotiator.process_incoming_data(&[0xFF, 0xFD, 0x28]);
    assert!(first.windows(12).any(|w| w == b"IBM-3279-4-E".as_slice()));

    let reject = [0xFF, 0xFA, 0x28, 0x02, 0x09, 0x01, 0xFF, 0xF0];
    let second = negotiator.process_incoming_data(&reject);
    assert!(second.windows(12).any(|w| w == b"IBM-3278-4-E".as_slice()));
    assert_eq!(negotiator.last_reject_reason(), Some(0x01));

    let third = negotiator.process_incoming_data(&reject);
    assert!(third.windows(12).any(|w| w == b"IBM-3279-2-E".as_slice()));

    // Third rejection exhausts the retry budget
    negotiator.process_incoming_data(&reject);
    assert!(negotiator.negotiation_failed());
}

#[test]
fn custom_device_type_is_offered_first() {
    let mut negotiator = TelnetNegotiator::with_device_type("IBM-3278-5");
    let reply = negotiator.process_incoming_data(&[0xFF, 0xFD, 0x28]);
    assert!(reply.windows(10).any(|w| w == b"IBM-3278-5".as_slice()));
}

#[test]
fn printer_device_type_routes_scs() {
    let mut negotiator = TelnetNegotiator::new();
    let mut sb = vec![0xFF, 0xFA, 0x28, 0x02, 0x04];
    sb.extend_from_slice(b"IBM-3287-1");
    sb.extend_from_slice(&[0xFF, 0xF0]);
    negotiator.process_incoming_data(&sb);
    assert!(negotiator.is_printer());
}

#[test]
fn unterminated_subnegotiation_times_out_without_blocking() {
    let mut negotiator = TelnetNegotiator::new();
    // SB opened, SE never arrives
    negotiator.process_incoming_data(&[0xFF, 0xFA, 0x28, 0x02]);
    assert!(negotiator.take_data().is_empty());

    let err = negotiator.check_subnegotiation_timeout(Duration::ZERO);
    assert!(matches!(
        err,
        Some(NegotiationError::UnterminatedSubnegotiation { option: 40 })
    ));

    // The next record is processed normally
    negotiator.process_incoming_data(&[0xF5, 0xC3, 0xFF, 0xEF]);
    assert_eq!(negotiator.take_data(), vec![0xF5, 0xC3, 0xFF, 0xEF]);
}

#[test]
fn negotiation_survives_arbitrary_chunking() {
    // The same exchange as the full test, delivered one byte at a time
    let mut stream = vec![0xFF, 0xFB, 0x19, 0xFF, 0xFD, 0x28];
    stream.extend_from_slice(&[0xFF, 0xFA, 0x28, 0x02, 0x04]);
    stream.extend_from_slice(b"IBM-3279-4-E");
    stream.extend_from_slice(&[0xFF, 0xF0]);
    stream.extend_from_slice(&[0xFF, 0xFA, 0x28, 0x03, 0x04, 0x15, 0xFF, 0xF0]);

    let mut negotiator = TelnetNegotiator::new();
    for &byte in &stream {
        negotiator.process_incoming_data(&[byte]);
    }
    assert!(negotiator.tn3270e_negotiated());
    assert_eq!(negotiator.device_type(), "IBM-3279-4-E");
    assert_eq!(negotiator.functions(), 0x15);
}

#[test]
fn unknown_options_are_refused() {
    let mut negotiator = TelnetNegotiator::new();
    let reply = negotiator.process_incoming_data(&[0xFF, 0xFD, 0x63]); // DO 99
    assert_eq!(reply, vec![0xFF, 0xFC, 0x63]); // WONT 99
    let reply = negotiator.process_incoming_data(&[0xFF, 0xFB, 0x63]); // WILL 99
    assert_eq!(reply, vec![0xFF, 0xFE, 0x63]); // DONT 99
}
