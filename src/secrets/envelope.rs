//! Transport decoding of batch input.
//!
//! Operators may pass a batch as plain JSON, as base64, or as base64 of a gzip
//! stream, with no flag saying which. Decoding tries the most specific
//! interpretation first and falls back one step at a time:
//!
//! ```text
//! raw ──base64 ok?──► decoded ──gzip ok?──► inflated      (Base64Gzip)
//!  │                    │
//!  └─ no ─► raw (Plain) └─ no ─► decoded (Base64)
//! ```
//!
//! Plain text that also happens to be valid base64 is decoded as base64.

use std::io::{Cursor, Read};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::MultiGzDecoder;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::value::ValueStream;
use crate::errors::{Result, SyncError};

/// Shortest possible base64 encoding of a single byte. Anything shorter is plain text.
pub const MIN_BASE64_LEN: usize = 4;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Which transport layers were removed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Base64,
    Base64Gzip,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Base64 => "base64",
            Self::Base64Gzip => "base64+gzip",
        }
    }
}

/// Where the batch input comes from.
pub enum EnvelopeSource {
    /// Text given on the command line
    Inline(String),
    /// A stream such as stdin
    Stream(ValueStream),
}

impl EnvelopeSource {
    /// Read the whole source and strip its transport encoding.
    pub async fn decode(self) -> Result<Envelope> {
        let raw = match self {
            Self::Inline(text) => text.into_bytes(),
            Self::Stream(mut reader) => {
                let mut buf = Vec::with_capacity(4096);
                reader
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| SyncError::io(e, "reading batch input"))?;
                buf
            }
        };
        Ok(decode_envelope(raw))
    }
}

/// Decoded batch input, tagged with the layers that were removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    encoding: Encoding,
    bytes: Vec<u8>,
}

impl Envelope {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// A reader over the decoded bytes, for streaming JSON decoding.
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.bytes)
    }
}

/// Strip base64 and gzip layers from `raw`, falling back to the last
/// interpretation that succeeded.
pub fn decode_envelope(raw: Vec<u8>) -> Envelope {
    if raw.len() < MIN_BASE64_LEN {
        return Envelope { encoding: Encoding::Plain, bytes: raw };
    }

    let decoded = match decode_base64(&raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(error = %e, "input is not base64, using it as plain text");
            return Envelope { encoding: Encoding::Plain, bytes: raw };
        }
    };

    match gunzip(&decoded) {
        Some(inflated) => {
            debug!("input is base64 encoded gzip");
            Envelope { encoding: Encoding::Base64Gzip, bytes: inflated }
        }
        None => {
            debug!("input is base64 encoded, not gzip compressed");
            Envelope { encoding: Encoding::Base64, bytes: decoded }
        }
    }
}

// Line breaks are tolerated so that piped input ending in a newline, or
// wrapped base64 output, still decodes.
fn decode_base64(raw: &[u8]) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = raw.iter().copied().filter(|b| !matches!(b, b'\r' | b'\n')).collect();
    STANDARD.decode(compact)
}

fn gunzip(data: &[u8]) -> Option<Vec<u8>> {
    if !data.starts_with(&GZIP_MAGIC) {
        return None;
    }

    let mut inflated = Vec::with_capacity(data.len() * 4);
    match MultiGzDecoder::new(data).read_to_end(&mut inflated) {
        Ok(_) => Some(inflated),
        Err(e) => {
            debug!(error = %e, "gzip framing is invalid");
            None
        }
    }
}
