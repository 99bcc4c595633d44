//! Message payloads and the full-frame codec.
//!
//! A [`Payload`] is the decoded content of one frame. [`encode_message`]
//! produces the complete wire image (pre-header + header + payload) for
//! one outbound payload; [`decode_payload`] interprets received payload
//! bytes according to the header that preceded them.

use bytes::Bytes;
use serde_json::Value;

use super::wire::{encode_pre_header, ContentType, Header};
use crate::error::{Error, Result};

/// Decoded frame content, one variant per supported content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `text/plain` content.
    Text(String),
    /// `application/json` content.
    Json(Value),
    /// `application/octet-stream` content (zero-copy via `bytes::Bytes`).
    Binary(Bytes),
}

impl Payload {
    /// Content type declared in the header for this payload.
    #[inline]
    pub fn content_type(&self) -> ContentType {
        match self {
            Payload::Text(_) => ContentType::Text,
            Payload::Json(_) => ContentType::Json,
            Payload::Binary(_) => ContentType::Binary,
        }
    }

    /// Serialize just the payload bytes (no header).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
            Payload::Json(value) => Ok(serde_json::to_vec(value)?),
            Payload::Binary(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// Extract the JSON value, or fail with a protocol error.
    ///
    /// The session layer expects every kernel reply to be a JSON frame.
    pub fn into_json(self) -> Result<Value> {
        match self {
            Payload::Json(value) => Ok(value),
            other => Err(Error::Protocol(format!(
                "Expected application/json reply, got {}",
                other.content_type().as_mime()
            ))),
        }
    }
}

/// Encode one payload into its complete wire image.
///
/// # Errors
///
/// Fails if the payload cannot be serialized or the header does not fit
/// the 2-byte pre-header length field.
pub fn encode_message(payload: &Payload) -> Result<Vec<u8>> {
    let content = payload.to_bytes()?;
    let header = Header::new(payload.content_type(), content.len());
    let header_bytes = header.encode()?;
    let pre_header = encode_pre_header(header_bytes.len())?;

    let mut message =
        Vec::with_capacity(pre_header.len() + header_bytes.len() + content.len());
    message.extend_from_slice(&pre_header);
    message.extend_from_slice(&header_bytes);
    message.extend_from_slice(&content);
    Ok(message)
}

/// Decode received payload bytes according to their header.
pub fn decode_payload(header: &Header, data: Bytes) -> Result<Payload> {
    match header.content_type()? {
        ContentType::Text => {
            let text = std::str::from_utf8(&data)
                .map_err(|e| Error::Protocol(format!("Invalid UTF-8 payload: {e}")))?;
            Ok(Payload::Text(text.to_string()))
        }
        ContentType::Json => {
            let value: Value = serde_json::from_slice(&data)
                .map_err(|e| Error::Protocol(format!("Invalid JSON payload: {e}")))?;
            Ok(Payload::Json(value))
        }
        ContentType::Binary => Ok(Payload::Binary(data)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::wire::{decode_pre_header, PRE_HEADER_SIZE};
    use serde_json::json;

    /// Decode a full wire image back to a payload (test-side inverse of
    /// `encode_message`).
    fn decode_message(bytes: &[u8]) -> Payload {
        let header_len = decode_pre_header(bytes).unwrap();
        let header_end = PRE_HEADER_SIZE + header_len;
        let header = Header::decode(&bytes[PRE_HEADER_SIZE..header_end]).unwrap();
        assert_eq!(bytes.len() - header_end, header.content_length);
        decode_payload(&header, Bytes::copy_from_slice(&bytes[header_end..])).unwrap()
    }

    #[test]
    fn test_roundtrip_text() {
        let payload = Payload::Text("hello simulator".to_string());
        let wire = encode_message(&payload).unwrap();
        assert_eq!(decode_message(&wire), payload);
    }

    #[test]
    fn test_roundtrip_json() {
        let payload = Payload::Json(json!({
            "command": "get",
            "sel": "sim_time",
        }));
        let wire = encode_message(&payload).unwrap();
        assert_eq!(decode_message(&wire), payload);
    }

    #[test]
    fn test_roundtrip_binary() {
        let payload = Payload::Binary(Bytes::from_static(&[0x00, 0xFF, 0x7F, 0x80]));
        let wire = encode_message(&payload).unwrap();
        assert_eq!(decode_message(&wire), payload);
    }

    #[test]
    fn test_pre_header_matches_header_length() {
        let wire = encode_message(&Payload::Text("x".to_string())).unwrap();
        let header_len = decode_pre_header(&wire).unwrap();
        let header = Header::decode(&wire[PRE_HEADER_SIZE..PRE_HEADER_SIZE + header_len]).unwrap();
        assert_eq!(header.content_length, 1);
    }

    #[test]
    fn test_empty_payload() {
        let wire = encode_message(&Payload::Binary(Bytes::new())).unwrap();
        assert_eq!(decode_message(&wire), Payload::Binary(Bytes::new()));
    }

    #[test]
    fn test_into_json_rejects_text() {
        let err = Payload::Text("nope".to_string()).into_json().unwrap_err();
        assert!(err.to_string().contains("Expected application/json"));
        assert!(Payload::Json(json!(1)).into_json().is_ok());
    }

    #[test]
    fn test_decode_payload_invalid_utf8() {
        let header = Header::new(ContentType::Text, 2);
        let err = decode_payload(&header, Bytes::from_static(&[0xC3, 0x28])).unwrap_err();
        assert!(err.to_string().contains("Invalid UTF-8"));
    }

    #[test]
    fn test_decode_payload_invalid_json() {
        let header = Header::new(ContentType::Json, 1);
        let err = decode_payload(&header, Bytes::from_static(b"{")).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }
}
