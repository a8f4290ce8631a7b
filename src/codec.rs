//! Distribution-config codec with tamper checksum.
//!
//! Encoded blobs are produced by the `encode-config` CLI and shipped inside
//! module packages: JSON → ROT13 → raw deflate (level 9) → base64 → ROT13,
//! padding stripped, then eight hex chars of CRC32 over the encoded text
//! plus the distribution ID. This is obfuscation with tamper evidence, not
//! cryptography; it rejects corrupted or hand-edited configs before
//! registration and must stay byte-compatible with already-deployed blobs.

use crate::{err::Error, Result};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression, Crc};
use serde_json::{Map, Value};
use std::io::{Read, Write};
use tracing::warn;

const CHECKSUM_LEN: usize = 8;

pub fn encode(config: &Map<String, Value>, short_id: &str) -> Result<String> {
    let json = serde_json::to_string(config)
        .map_err(|_| Error::Parse("Failed encoding config to JSON".into()))?;

    let mut deflater = DeflateEncoder::new(Vec::new(), Compression::best());
    deflater.write_all(rot13(&json).as_bytes())?;
    let compressed = deflater.finish()?;

    let encoded = rot13(&STANDARD_NO_PAD.encode(compressed));
    let sum = checksum(&encoded, short_id);

    Ok(format!("{encoded}{sum}"))
}

/// Verifies the trailing checksum, then reverses the encoding pipeline.
///
/// A checksum mismatch is an integrity violation and fails hard. Once the
/// checksum matches, any later decode failure falls back to an empty config
/// map so a registration never dies on a blob that merely aged badly.
pub fn decode(blob: &str, short_id: &str) -> Result<Map<String, Value>> {
    if blob.len() <= CHECKSUM_LEN || !blob.is_ascii() {
        return Err(Error::Integrity("encoded config is malformed".into()));
    }

    let (payload, supplied) = blob.split_at(blob.len() - CHECKSUM_LEN);
    if checksum(payload, short_id) != supplied {
        return Err(Error::Integrity("checksum mismatch".into()));
    }

    Ok(unpack(payload).unwrap_or_else(|err| {
        warn!(%err, "discarding undecodable module config");
        Map::new()
    }))
}

fn unpack(payload: &str) -> Result<Map<String, Value>> {
    let compressed = STANDARD_NO_PAD
        .decode(rot13(payload).trim_end_matches('='))
        .map_err(|_| Error::Parse("invalid base64 in module config".into()))?;

    let mut inflated = Vec::new();
    DeflateDecoder::new(compressed.as_slice()).read_to_end(&mut inflated)?;

    let json = String::from_utf8(inflated)
        .map_err(|_| Error::Parse("module config is not UTF-8".into()))?;

    match serde_json::from_str(&rot13(&json)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::Parse("module config is not a JSON object".into())),
        Err(_) => Err(Error::Parse("invalid JSON in module config".into())),
    }
}

fn checksum(payload: &str, short_id: &str) -> String {
    let mut crc = Crc::new();
    crc.update(payload.as_bytes());
    crc.update(short_id.as_bytes());
    hex::encode(crc.sum().to_be_bytes())
}

fn rot13(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            _ => c,
        })
        .collect()
}
