//! Codec Tests
//!
//! Tests for frame encoding/decoding and stream I/O.

use std::io::Cursor;

use mpl::protocol::{
    decode, decode_header, encode, read_message, write_message, Message, MessageType, HEADER_SIZE,
};
use mpl::MplError;

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_all_types_and_sizes() {
    let payloads: Vec<Vec<u8>> = vec![vec![], vec![0x42], (0..65536u32).map(|i| i as u8).collect()];

    for msg_type in MessageType::ALL {
        for payload in &payloads {
            let msg = Message::new(payload.clone(), msg_type);
            let encoded = encode(&msg).unwrap();
            assert_eq!(encoded.len(), HEADER_SIZE + payload.len());

            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded, msg);
        }
    }
}

#[test]
fn test_round_trip_binary_data() {
    // Null bytes and high bytes must survive untouched
    let payload: Vec<u8> = vec![0x00, 0x01, 0xFF, 0xFE, 0x80, 0x00];
    let msg = Message::new(payload.clone(), MessageType::Binary);

    let decoded = decode(&encode(&msg).unwrap()).unwrap();
    assert_eq!(&decoded.content()[..], payload.as_slice());
}

// =============================================================================
// Wire Format Verification Tests
// =============================================================================

#[test]
fn test_header_is_big_endian() {
    let msg = Message::new(vec![b'x'; 300], MessageType::Text);
    let encoded = encode(&msg).unwrap();

    // 300 = 0x0000012C
    assert_eq!(&encoded[..HEADER_SIZE], &[0x01, 0x00, 0x00, 0x01, 0x2C]);
}

#[test]
fn test_wire_format_text() {
    let encoded = encode(&Message::text("hi", MessageType::Reply)).unwrap();

    // Expected: [0x02][0x00 0x00 0x00 0x02][h i]
    //           type  payload_len(2)       payload
    assert_eq!(&encoded[..], &[0x02, 0x00, 0x00, 0x00, 0x02, b'h', b'i']);
}

#[test]
fn test_wire_format_empty_payload() {
    let encoded = encode(&Message::empty(MessageType::Quit)).unwrap();
    assert_eq!(&encoded[..], &[0x08, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn test_decode_header() {
    let (msg_type, len) = decode_header(&[0x80, 0x00, 0x01, 0x00, 0x00]).unwrap();
    assert_eq!(msg_type, MessageType::Binary);
    assert_eq!(len, 65536);
}

#[test]
fn test_decode_header_max_length() {
    let (_, len) = decode_header(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
    assert_eq!(len, u32::MAX);
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_decode_incomplete_header() {
    let result = decode(&[0x01, 0x00, 0x00]);
    assert!(matches!(result, Err(MplError::Protocol(_))));
    assert!(result.unwrap_err().to_string().contains("Incomplete header"));
}

#[test]
fn test_decode_incomplete_payload() {
    // Header says 10 bytes payload, only 3 provided
    let result = decode(&[0x01, 0x00, 0x00, 0x00, 0x0A, b'a', b'b', b'c']);
    assert!(matches!(result, Err(MplError::Protocol(_))));
    assert!(result.unwrap_err().to_string().contains("Incomplete payload"));
}

#[test]
fn test_decode_unknown_type() {
    let result = decode_header(&[0x03, 0x00, 0x00, 0x00, 0x00]);
    assert!(matches!(result, Err(MplError::Protocol(_))));
    assert!(result.unwrap_err().to_string().contains("Unknown message type"));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_write_read() {
    let msg = Message::text("hello over a stream", MessageType::String);

    let mut buffer = Vec::new();
    write_message(&mut buffer, &msg).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_message(&mut cursor).unwrap(), msg);
}

#[test]
fn test_stream_multiple_messages_then_disconnect() {
    let messages = vec![
        Message::text("one", MessageType::Text),
        Message::empty(MessageType::End),
        Message::new(vec![1, 2, 3], MessageType::Binary),
    ];

    let mut buffer = Vec::new();
    for msg in &messages {
        write_message(&mut buffer, msg).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for expected in &messages {
        assert_eq!(&read_message(&mut cursor).unwrap(), expected);
    }

    // Clean end of stream on a frame boundary
    assert!(read_message(&mut cursor).unwrap().is_disconnect());
}

#[test]
fn test_read_empty_stream_is_disconnect() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    let msg = read_message(&mut cursor).unwrap();

    assert_eq!(msg.msg_type(), MessageType::Disconnect);
    assert!(msg.is_empty());
}

#[test]
fn test_read_partial_header_is_protocol_error() {
    let mut cursor = Cursor::new(vec![0x01, 0x00]);
    let result = read_message(&mut cursor);
    assert!(matches!(result, Err(MplError::Protocol(_))));
}

#[test]
fn test_read_truncated_payload_is_protocol_error() {
    // Declares 10 bytes, delivers 3
    let mut cursor = Cursor::new(vec![0x01, 0x00, 0x00, 0x00, 0x0A, b'a', b'b', b'c']);
    let result = read_message(&mut cursor);
    assert!(matches!(result, Err(MplError::Protocol(_))));
}

#[test]
fn test_read_huge_declared_length_is_protocol_error() {
    // Declares u32::MAX bytes, delivers 2; must fail without reserving 4 GiB
    let mut cursor = Cursor::new(vec![0x01, 0xFF, 0xFF, 0xFF, 0xFF, b'a', b'b']);
    match read_message(&mut cursor) {
        Err(MplError::Protocol(msg)) => assert!(msg.contains("got 2")),
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_read_payload_larger_than_initial_buffer() {
    let payload = vec![0x5A; 200 * 1024];
    let frame = encode(&Message::new(payload.clone(), MessageType::Binary)).unwrap();
    let mut cursor = Cursor::new(frame.to_vec());

    let msg = read_message(&mut cursor).unwrap();
    assert_eq!(msg.len(), payload.len());
    assert_eq!(&msg.content()[..], &payload[..]);
}
