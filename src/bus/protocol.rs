//! Socket bus message protocol
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Largest frame body accepted from a peer
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from key-event producers to the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// A key combination was pressed
    Press { key: String },

    /// List the currently bound key combinations
    Status,
}

/// Responses from the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// The press reached this many bindings
    Delivered { bindings: usize },

    /// Normalized descriptors of the live bindings
    Status { bindings: Vec<String> },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Send a length-prefixed JSON message
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let body = serde_json::to_vec(msg)?;
    let len = u32::try_from(body.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&body)?;
    writer.flush()
}

/// Read a length-prefixed JSON message
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    let msg = serde_json::from_slice(&body)?;
    Ok(Some(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_request_serialization() {
        let req = Request::Press {
            key: "Control-F1".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"press","key":"Control-F1"}"#);
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"type":"delivered","bindings":2}"#;
        let resp: Response = serde_json::from_str(json).unwrap();
        assert_eq!(resp, Response::Delivered { bindings: 2 });
    }

    #[test]
    fn test_frames_back_to_back() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Request::Ping).unwrap();
        write_frame(&mut buf, &Request::Status).unwrap();
        assert_eq!(&buf[..4], &15u32.to_le_bytes());

        let mut cursor = Cursor::new(buf);
        let first: Option<Request> = read_frame(&mut cursor).unwrap();
        let second: Option<Request> = read_frame(&mut cursor).unwrap();
        let end: Option<Request> = read_frame(&mut cursor).unwrap();
        assert_eq!(first, Some(Request::Ping));
        assert_eq!(second, Some(Request::Status));
        assert_eq!(end, None);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut buf = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(b"{}");
        let err = read_frame::<_, Request>(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
