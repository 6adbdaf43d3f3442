//! Wire compatibility tests
//!
//! OpCode values and header layout are shared with workers that may be
//! built separately; these MUST remain stable.

use vidmesh_protocol::*;

#[test]
fn test_all_opcodes_compatibility() {
    let opcodes = [
        (OpCode::Unknown, 0u8),
        (OpCode::TranscribeVideo, 1),
        (OpCode::AnalyzeVideo, 2),
        (OpCode::GenerateReport, 3),
        (OpCode::ClarifyQuery, 4),
        (OpCode::Reply, 5),
        (OpCode::Err, 6),
    ];

    for (opcode, expected_value) in opcodes {
        assert_eq!(opcode.as_u8(), expected_value);
        assert_eq!(OpCode::from_u8(expected_value).unwrap(), opcode);
    }

    assert!(OpCode::from_u8(42).is_err());
}

/// Header layout: [VER:1][OP:1][RES:2][REQUEST_ID:8][LEN:4], big endian.
#[test]
fn test_header_byte_layout() {
    let header = Header::new(OpCode::AnalyzeVideo, RequestId::new(0x0102_0304_0506_0708), 0x0A0B_0C0D);
    let packed = header.pack().unwrap();

    assert_eq!(packed.len(), HEADER_SIZE);
    assert_eq!(packed[0], PROTOCOL_VERSION);
    assert_eq!(packed[1], 2);
    assert_eq!(&packed[2..4], &[0, 0]);
    assert_eq!(&packed[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(&packed[12..16], &[0x0A, 0x0B, 0x0C, 0x0D]);
}

#[test]
fn test_error_payload_json_shape() {
    let payload = ErrorPayload::new(ErrorKind::NotFound, "File not found");
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["kind"], "not_found");
    assert_eq!(json["message"], "File not found");
}

#[test]
fn test_clarify_request_session_is_optional() {
    let without: ClarifyRequest = serde_json::from_str(r#"{"query":"hi"}"#).unwrap();
    assert_eq!(without.session_id, None);

    let json = serde_json::to_string(&ClarifyRequest {
        query: "hi".to_string(),
        session_id: None,
    })
    .unwrap();
    assert!(!json.contains("session_id"));
}
