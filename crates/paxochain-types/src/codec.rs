//! Deterministic, versioned binary encoding for wire messages and log
//! records. Every encoded payload is prefixed with an explicit format
//! version so a future incompatible change can be detected rather than
//! silently misparsed.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::block::Block;
use crate::message::Envelope;

/// Current on-wire / on-disk format version.
pub const CODEC_VERSION: u8 = 1;

/// Encoding or decoding failure.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload's version byte did not match [`CODEC_VERSION`].
    #[error("unsupported codec version: {0}")]
    UnsupportedVersion(u8),
    /// The payload was shorter than the version prefix.
    #[error("payload too short to contain a version byte")]
    Truncated,
    /// The bincode layer failed to serialize or deserialize.
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

fn encode_versioned<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![CODEC_VERSION];
    buf.extend(bincode::serialize(value)?);
    Ok(buf)
}

fn decode_versioned<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (version, rest) = bytes.split_first().ok_or(CodecError::Truncated)?;
    if *version != CODEC_VERSION {
        return Err(CodecError::UnsupportedVersion(*version));
    }
    Ok(bincode::deserialize(rest)?)
}

/// Encode a message envelope for transmission over the wire.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    encode_versioned(envelope)
}

/// Decode a message envelope received over the wire.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, CodecError> {
    decode_versioned(bytes)
}

/// Encode a block as a single on-disk log record.
pub fn encode_block(block: &Block) -> Result<Vec<u8>, CodecError> {
    encode_versioned(block)
}

/// Decode a single on-disk log record.
pub fn decode_block(bytes: &[u8]) -> Result<Block, CodecError> {
    decode_versioned(bytes)
}
