//! Worker Protocol v1
//!
//! Wire format for Gateway <-> Worker communication. Every request is one
//! message; every worker answers it with exactly one `Reply` or `Err`.
//!
//! # Protocol Specification
//!
//! Header Format: !BBHQI (16 bytes, Network Byte Order / Big Endian)
//! ```text
//! [VER:1][OP:1][RES:2][REQUEST_ID:8][LEN:4]
//! ```
//!
//! - VER (u8): Protocol version (0x01)
//! - OP (u8): OpCode
//! - RES (u16): Reserved for future use
//! - REQUEST_ID (u64): Correlates a reply with its request
//! - LEN (u32): Payload length in bytes
//!
//! The payload is JSON.

pub mod artifacts;
pub mod config;
pub mod defaults;
pub mod error;
pub mod naming;
pub mod paths;
pub mod types;

pub use artifacts::ArtifactStore;
pub use config::SystemConfig;
pub use types::{
    vision_summary_text, AnalysisReply, ArtifactKind, ClarifyReply, ClarifyRequest, ErrorKind,
    ErrorPayload, FileRef, ReportFormat, ReportReply, ReportRequest, RequestId, TranscriptReply,
    VideoRequest,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use error::{ProtocolError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Cursor;

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Worker Protocol OpCodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Unknown = 0,

    // Gateway -> Worker (Requests)
    TranscribeVideo = 1, // "Produce a transcript for this file."
    AnalyzeVideo = 2,    // "List the objects visible in this file."
    GenerateReport = 3,  // "Render a report for this file in this format."
    ClarifyQuery = 4,    // "What does this query ask for?"

    // Worker -> Gateway
    Reply = 5, // "Done. Here is the result."
    Err = 6,   // "Something went wrong."
}

impl OpCode {
    /// Convert u8 to OpCode
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(OpCode::Unknown),
            1 => Ok(OpCode::TranscribeVideo),
            2 => Ok(OpCode::AnalyzeVideo),
            3 => Ok(OpCode::GenerateReport),
            4 => Ok(OpCode::ClarifyQuery),
            5 => Ok(OpCode::Reply),
            6 => Ok(OpCode::Err),
            _ => Err(ProtocolError::InvalidOpCode(value)),
        }
    }

    /// Convert OpCode to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for opcodes a worker accepts as a request.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            OpCode::TranscribeVideo
                | OpCode::AnalyzeVideo
                | OpCode::GenerateReport
                | OpCode::ClarifyQuery
        )
    }
}

/// Protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub opcode: OpCode,
    pub reserved: u16,
    pub request_id: RequestId,
    pub payload_len: u32,
}

impl Header {
    /// Create a new header
    pub fn new(opcode: OpCode, request_id: RequestId, payload_len: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            opcode,
            reserved: 0,
            request_id,
            payload_len,
        }
    }

    /// Pack header into 16-byte buffer
    pub fn pack(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut buf = [0u8; HEADER_SIZE];
        let mut cursor = Cursor::new(&mut buf[..]);

        cursor.write_u8(self.version)?;
        cursor.write_u8(self.opcode.as_u8())?;
        cursor.write_u16::<BigEndian>(self.reserved)?;
        cursor.write_u64::<BigEndian>(self.request_id.as_u64())?;
        cursor.write_u32::<BigEndian>(self.payload_len)?;

        Ok(buf)
    }

    /// Unpack header from 16-byte buffer
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::HeaderTooShort {
                expected: HEADER_SIZE,
                got: data.len(),
            });
        }

        let mut cursor = Cursor::new(&data[..HEADER_SIZE]);

        let version = cursor.read_u8()?;
        let op_raw = cursor.read_u8()?;
        let reserved = cursor.read_u16::<BigEndian>()?;
        let request_id = RequestId::new(cursor.read_u64::<BigEndian>()?);
        let payload_len = cursor.read_u32::<BigEndian>()?;

        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }

        let opcode = OpCode::from_u8(op_raw)?;

        Ok(Self {
            version,
            opcode,
            reserved,
            request_id,
            payload_len,
        })
    }
}

/// Protocol message (header + payload)
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Maximum payload size (the max value of u32)
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

impl Message {
    /// Create a new message
    pub fn new(opcode: OpCode, request_id: RequestId, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let header = Header::new(opcode, request_id, payload.len() as u32);
        Ok(Self { header, payload })
    }

    /// Serialize `payload` as JSON and wrap it in a message.
    pub fn encode<T: Serialize>(opcode: OpCode, request_id: RequestId, payload: &T) -> Result<Self> {
        Self::new(opcode, request_id, serde_json::to_vec(payload)?)
    }

    /// Deserialize the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    pub fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    pub fn request_id(&self) -> RequestId {
        self.header.request_id
    }

    /// Pack message into frames (header, payload)
    pub fn pack(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let header_bytes = self.header.pack()?.to_vec();
        Ok((header_bytes, self.payload.clone()))
    }

    /// Unpack message from frames
    pub fn unpack(frames: &[Vec<u8>]) -> Result<Self> {
        if frames.len() < 2 {
            return Err(ProtocolError::InvalidFrameCount {
                expected: 2,
                got: frames.len(),
            });
        }

        let header = Header::unpack(&frames[0])?;
        let payload = frames[1].clone();

        if payload.len() != header.payload_len as usize {
            return Err(ProtocolError::PayloadLengthMismatch {
                expected: header.payload_len as usize,
                got: payload.len(),
            });
        }

        Ok(Self { header, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_pack_unpack() {
        let header = Header::new(OpCode::GenerateReport, RequestId::new(12345), 1024);
        let packed = header.pack().unwrap();

        assert_eq!(packed.len(), HEADER_SIZE);

        let unpacked = Header::unpack(&packed).unwrap();
        assert_eq!(unpacked.version, PROTOCOL_VERSION);
        assert_eq!(unpacked.opcode, OpCode::GenerateReport);
        assert_eq!(unpacked.request_id, RequestId::new(12345));
        assert_eq!(unpacked.payload_len, 1024);
    }

    #[test]
    fn test_version_mismatch() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = 0xFF;

        let result = Header::unpack(&buf);
        assert!(matches!(result, Err(ProtocolError::VersionMismatch { .. })));
    }

    #[test]
    fn test_header_too_short() {
        let buf = [0u8; 8];
        let result = Header::unpack(&buf);
        assert!(matches!(result, Err(ProtocolError::HeaderTooShort { .. })));
    }

    #[test]
    fn test_payload_length_mismatch() {
        let msg = Message::new(OpCode::Reply, RequestId::new(1), b"abc".to_vec()).unwrap();
        let (header, _) = msg.pack().unwrap();
        let result = Message::unpack(&[header, b"abcdef".to_vec()]);
        assert!(matches!(
            result,
            Err(ProtocolError::PayloadLengthMismatch { expected: 3, got: 6 })
        ));
    }

    #[test]
    fn test_encode_decode_payload() {
        let request = ReportRequest {
            file_path: "/tmp/uploads/abc_clip.mp4".to_string(),
            report_type: "pptx".to_string(),
        };
        let msg = Message::encode(OpCode::GenerateReport, RequestId::new(7), &request).unwrap();
        let (header, body) = msg.pack().unwrap();

        let unpacked = Message::unpack(&[header, body]).unwrap();
        assert_eq!(unpacked.opcode(), OpCode::GenerateReport);
        assert_eq!(unpacked.request_id(), RequestId::new(7));
        let decoded: ReportRequest = unpacked.decode().unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_request_opcodes() {
        assert!(OpCode::ClarifyQuery.is_request());
        assert!(!OpCode::Reply.is_request());
        assert!(!OpCode::Err.is_request());
    }
}
