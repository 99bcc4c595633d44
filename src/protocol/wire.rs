//! Wire format encoding and decoding.
//!
//! Implements the Verisocks message layout:
//! ```text
//! ┌────────────┬──────────────────────┬──────────────────┐
//! │ Pre-header │ Header               │ Payload          │
//! │ 2 bytes    │ JSON object (UTF-8)  │ content-length   │
//! │ uint16 BE  │ pre-header bytes long│ bytes            │
//! └────────────┴──────────────────────┴──────────────────┘
//! ```
//!
//! The pre-header is the byte length of the JSON header, Big Endian. The
//! header declares `content-type`, `content-length` and, for non-binary
//! payloads, `content-encoding`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pre-header size in bytes (fixed, exactly 2).
pub const PRE_HEADER_SIZE: usize = 2;

/// Maximum header length representable in the 2-byte pre-header.
pub const MAX_HEADER_SIZE: usize = u16::MAX as usize;

/// MIME identifier for plain-text payloads.
pub const MIME_TEXT: &str = "text/plain";

/// MIME identifier for JSON payloads.
pub const MIME_JSON: &str = "application/json";

/// MIME identifier for raw binary payloads.
pub const MIME_BINARY: &str = "application/octet-stream";

/// The only text encoding the client produces and accepts.
pub const ENCODING_UTF8: &str = "utf-8";

/// Supported payload content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// `text/plain`, decoded with the declared content-encoding.
    Text,
    /// `application/json`, decoded as UTF-8 then parsed.
    Json,
    /// `application/octet-stream`, left raw. Omits content-encoding.
    Binary,
}

impl ContentType {
    /// MIME string written into the header.
    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::Text => MIME_TEXT,
            ContentType::Json => MIME_JSON,
            ContentType::Binary => MIME_BINARY,
        }
    }

    /// Parse a MIME string from a received header.
    ///
    /// # Errors
    ///
    /// Unrecognized content types are a hard protocol error: the frame
    /// cannot be interpreted.
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime {
            MIME_TEXT => Ok(ContentType::Text),
            MIME_JSON => Ok(ContentType::Json),
            MIME_BINARY => Ok(ContentType::Binary),
            other => Err(Error::Protocol(format!(
                "Value '{other}' for 'content-type' not recognized"
            ))),
        }
    }
}

/// Decoded message header.
///
/// `content-encoding` is absent for binary frames; for text and JSON frames
/// it is required and validated against [`ENCODING_UTF8`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    /// Payload content type (MIME string on the wire).
    #[serde(rename = "content-type")]
    pub content_type: String,
    /// Text encoding of the payload, absent for octet-stream.
    #[serde(rename = "content-encoding", skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// Payload length in bytes.
    #[serde(rename = "content-length")]
    pub content_length: usize,
}

impl Header {
    /// Create a header for an outbound frame.
    pub fn new(content_type: ContentType, content_length: usize) -> Self {
        let content_encoding = match content_type {
            ContentType::Binary => None,
            _ => Some(ENCODING_UTF8.to_string()),
        };
        Self {
            content_type: content_type.as_mime().to_string(),
            content_encoding,
            content_length,
        }
    }

    /// Serialize to the UTF-8 JSON bytes that go on the wire.
    ///
    /// # Errors
    ///
    /// Fails if the serialized header would not fit the 2-byte pre-header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > MAX_HEADER_SIZE {
            return Err(Error::Protocol(format!(
                "Header length {} exceeds pre-header maximum {}",
                bytes.len(),
                MAX_HEADER_SIZE
            )));
        }
        Ok(bytes)
    }

    /// Parse a received header and validate its required keys.
    ///
    /// `content-type` and `content-length` are always required;
    /// `content-encoding` is required unless the content type is
    /// octet-stream.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header: Header = serde_json::from_slice(bytes).map_err(|e| {
            Error::Protocol(format!("Malformed message header: {e}"))
        })?;
        let content_type = ContentType::from_mime(&header.content_type)?;
        match (&content_type, &header.content_encoding) {
            // Octet-stream payloads need no encoding, but a declared one
            // is still validated below like any other.
            (ContentType::Binary, None) => {}
            (_, Some(enc)) if enc.eq_ignore_ascii_case(ENCODING_UTF8) => {}
            (_, Some(enc)) => {
                return Err(Error::Protocol(format!(
                    "Unsupported content-encoding '{enc}'"
                )));
            }
            (_, None) => {
                return Err(Error::Protocol(
                    "Missing required header field 'content-encoding'".to_string(),
                ));
            }
        }
        Ok(header)
    }

    /// Content type as a typed value.
    ///
    /// Headers built by [`Header::decode`] always carry a recognized type.
    pub fn content_type(&self) -> Result<ContentType> {
        ContentType::from_mime(&self.content_type)
    }
}

/// Encode a header byte length into the 2-byte Big Endian pre-header.
#[inline]
pub fn encode_pre_header(header_len: usize) -> Result<[u8; PRE_HEADER_SIZE]> {
    let len = u16::try_from(header_len).map_err(|_| {
        Error::Protocol(format!(
            "Header length {header_len} exceeds pre-header maximum {MAX_HEADER_SIZE}"
        ))
    })?;
    Ok(len.to_be_bytes())
}

/// Decode the 2-byte Big Endian pre-header into the header byte length.
///
/// Returns `None` if the buffer is too short.
#[inline]
pub fn decode_pre_header(buf: &[u8]) -> Option<usize> {
    if buf.len() < PRE_HEADER_SIZE {
        return None;
    }
    Some(u16::from_be_bytes([buf[0], buf[1]]) as usize)
}
