//! Codec Tests
//!
//! Tests for request encoding, reply header decoding and the opcode table.

use gibson_client::protocol::{
    decode_header, decode_request, encode_reply, encode_request, write_request, Encoding, Opcode,
    ReplyCode, HEADER_SIZE,
};
use gibson_client::{GibsonError, ServerError};

// =============================================================================
// Request Encoding Tests
// =============================================================================

#[test]
fn test_wire_format_set() {
    let encoded = encode_request(Opcode::Set, &["0", "foo", "bar"]);

    // Expected: [0x0B 0x00 0x00 0x00][0x01 0x00][0 _ f o o _ b a r]
    //           total_len(2 + 9)     opcode     payload
    assert_eq!(encoded.len(), 4 + 2 + 9);
    assert_eq!(&encoded[0..4], &[0x0B, 0x00, 0x00, 0x00]);
    assert_eq!(&encoded[4..6], &[0x01, 0x00]);
    assert_eq!(&encoded[6..], b"0 foo bar");
}

#[test]
fn test_wire_format_no_args() {
    let encoded = encode_request::<&str>(Opcode::Ping, &[]);

    assert_eq!(encoded.as_ref(), &[0x02, 0x00, 0x00, 0x00, 19, 0x00]);
}

#[test]
fn test_wire_format_end_opcode() {
    let encoded = encode_request::<&str>(Opcode::End, &[]);

    assert_eq!(&encoded[4..6], &[0xFF, 0x00]);
}

#[test]
fn test_encode_owned_args() {
    let args = vec!["key".to_string(), "60".to_string()];
    let encoded = encode_request(Opcode::Ttl, &args);

    assert_eq!(&encoded[6..], b"key 60");
    assert_eq!(u32::from_le_bytes(encoded[0..4].try_into().unwrap()), 2 + 6);
}

#[test]
fn test_encode_multibyte_utf8_length() {
    // Length counts bytes, not characters
    let encoded = encode_request(Opcode::Get, &["clé"]);

    assert_eq!(u32::from_le_bytes(encoded[0..4].try_into().unwrap()), 2 + 4);
    assert_eq!(&encoded[6..], "clé".as_bytes());
}

#[test]
fn test_encode_decode_request() {
    let encoded = encode_request(Opcode::MSet, &["user:", "42"]);
    let (opcode, args) = decode_request(&encoded).unwrap();

    assert_eq!(opcode, Opcode::MSet);
    assert_eq!(args, vec!["user:", "42"]);
}

#[test]
fn test_decode_request_no_args() {
    let encoded = encode_request::<&str>(Opcode::Stats, &[]);
    let (opcode, args) = decode_request(&encoded).unwrap();

    assert_eq!(opcode, Opcode::Stats);
    assert!(args.is_empty());
}

#[test]
fn test_argument_with_space_is_split() {
    // The payload is space separated, so a space inside a value makes
    // it indistinguishable from two arguments.
    let encoded = encode_request(Opcode::Set, &["0", "greeting", "hello world"]);
    let (_, args) = decode_request(&encoded).unwrap();

    assert_eq!(args, vec!["0", "greeting", "hello", "world"]);
}

#[test]
fn test_decode_request_incomplete() {
    let encoded = encode_request(Opcode::Get, &["foo"]);
    let result = decode_request(&encoded[..encoded.len() - 1]);

    assert!(result.unwrap_err().to_string().contains("Incomplete request payload"));
}

#[test]
fn test_decode_request_unknown_opcode() {
    let bytes = [0x02, 0x00, 0x00, 0x00, 0x63, 0x00];
    let result = decode_request(&bytes);

    assert!(result.unwrap_err().to_string().contains("Unknown opcode"));
}

#[test]
fn test_write_request_to_stream() {
    let mut buffer = Vec::new();
    write_request(&mut buffer, Opcode::Get, &["foo"]).unwrap();
    write_request::<_, &str>(&mut buffer, Opcode::Ping, &[]).unwrap();

    let mut expected = encode_request(Opcode::Get, &["foo"]).to_vec();
    expected.extend_from_slice(&encode_request::<&str>(Opcode::Ping, &[]));
    assert_eq!(buffer, expected);
}

// =============================================================================
// Reply Header Tests
// =============================================================================

#[test]
fn test_decode_header_fields() {
    let bytes = [0x06, 0x00, 0x02, 0x08, 0x00, 0x00, 0x00];
    let header = decode_header(&bytes).unwrap();

    assert_eq!(header.code, 6);
    assert_eq!(header.encoding, 2);
    assert_eq!(header.data_length, 8);
    assert_eq!(header.frame_size(), HEADER_SIZE + 8);
}

#[test]
fn test_decode_header_little_endian() {
    let bytes = [0x07, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04];
    let header = decode_header(&bytes).unwrap();

    assert_eq!(header.data_length, 0x0403_0201);
}

#[test]
fn test_decode_header_ignores_trailing_bytes() {
    let reply = encode_reply(ReplyCode::Val, Encoding::Plain, b"hello");
    let header = decode_header(&reply).unwrap();

    assert_eq!(header.code, ReplyCode::Val as u16);
    assert_eq!(header.data_length, 5);
}

#[test]
fn test_decode_header_incomplete() {
    let result = decode_header(&[0x05, 0x00, 0x00]);

    match result {
        Err(GibsonError::Protocol(msg)) => assert!(msg.contains("Incomplete reply header")),
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_wire_format_reply() {
    let encoded = encode_reply(ReplyCode::Val, Encoding::Plain, b"hi");

    // Expected: [0x06 0x00][0x00][0x02 0x00 0x00 0x00][h i]
    assert_eq!(&encoded[0..2], &[0x06, 0x00]);
    assert_eq!(encoded[2], 0x00);
    assert_eq!(&encoded[3..7], &[0x02, 0x00, 0x00, 0x00]);
    assert_eq!(&encoded[7..], b"hi");
}

// =============================================================================
// Opcode / Reply Code Tests
// =============================================================================

#[test]
fn test_opcode_values() {
    assert_eq!(Opcode::Set.code(), 1);
    assert_eq!(Opcode::MSet.code(), 9);
    assert_eq!(Opcode::MUnlock.code(), 16);
    assert_eq!(Opcode::Keys.code(), 21);
    assert_eq!(Opcode::End.code(), 255);
}

#[test]
fn test_opcode_table_round_trip() {
    for op in Opcode::ALL {
        assert_eq!(Opcode::from_u16(op.code()), Some(op));
        assert_eq!(op.name().parse::<Opcode>().unwrap(), op);
    }
    assert_eq!(Opcode::from_u16(0), None);
    assert_eq!(Opcode::from_u16(22), None);
}

#[test]
fn test_opcode_parse_case_insensitive() {
    assert_eq!("get".parse::<Opcode>().unwrap(), Opcode::Get);
    assert_eq!("GET".parse::<Opcode>().unwrap(), Opcode::Get);
    assert_eq!("mUnLock".parse::<Opcode>().unwrap(), Opcode::MUnlock);
}

#[test]
fn test_opcode_parse_unknown() {
    match "flush".parse::<Opcode>() {
        Err(GibsonError::UnknownCommand(name)) => assert_eq!(name, "flush"),
        other => panic!("Expected unknown command, got {:?}", other),
    }
}

#[test]
fn test_reply_code_error_range() {
    for code in 0..=4u16 {
        let reply = ReplyCode::from_u16(code).unwrap();
        assert!(reply.is_error());
        assert_eq!(reply.server_error().map(ServerError::code), Some(code));
    }
    for code in 5..=7u16 {
        let reply = ReplyCode::from_u16(code).unwrap();
        assert!(!reply.is_error());
        assert_eq!(reply.server_error(), None);
    }
    assert_eq!(ReplyCode::from_u16(8), None);
}

#[test]
fn test_server_error_messages() {
    assert_eq!(ServerError::Generic.to_string(), "Generic error.");
    assert_eq!(ServerError::NotFound.to_string(), "Key/prefix not found.");
    assert_eq!(ServerError::NotANumber.to_string(), "Invalid data ( Not a Number ).");
    assert_eq!(ServerError::OutOfMemory.to_string(), "Server is out of memory.");
    assert_eq!(ServerError::Locked.to_string(), "The object is locked.");
}

#[test]
fn test_encoding_tags() {
    assert_eq!(Encoding::from_u8(0), Some(Encoding::Plain));
    assert_eq!(Encoding::from_u8(1), Some(Encoding::Lzf));
    assert_eq!(Encoding::from_u8(2), Some(Encoding::Number));
    assert_eq!(Encoding::from_u8(3), None);
}
