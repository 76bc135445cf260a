//! Encode/decode the coinbase voting-data script:
//! `OP_RETURN <magic><entries>`, entry = `key:u8 | payloadLen:varint | payload:bytes`.
//!
//! Extraction is a pure function of the raw script bytes, so independent
//! nodes decode identically from the same block (spec §4.1).

use crate::types::{VotingData, VotingDataKey};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"PFED";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteCodecError {
    #[error("script too short to contain the magic prefix")]
    Truncated,
    #[error("bad magic prefix")]
    BadMagic,
    #[error("varint overflowed u32")]
    VarintOverflow,
    #[error("entry payload ran past the end of the script")]
    PayloadTruncated,
}

/// Encode a sequence of votes into a coinbase voting-data script body
/// (everything after `OP_RETURN`).
pub fn encode(entries: &[VotingData]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + entries.len() * 8);
    out.extend_from_slice(MAGIC);
    for entry in entries {
        out.push(entry.key.as_u8());
        write_varint(&mut out, entry.payload.len() as u64);
        out.extend_from_slice(&entry.payload);
    }
    out
}

/// Decode a coinbase voting-data script body into the `VotingData` entries it
/// carries. Entries with an unrecognized `key` byte are skipped (forward
/// compatibility with future vote kinds, spec §7 UnknownVote) but the rest of
/// the script is still parsed; a structurally malformed script (bad magic,
/// truncated varint/payload) is rejected wholesale, since at that point the
/// entry boundaries can no longer be trusted.
pub fn decode(script: &[u8]) -> Result<Vec<VotingData>, VoteCodecError> {
    if script.is_empty() {
        return Ok(Vec::new());
    }
    if script.len() < MAGIC.len() {
        return Err(VoteCodecError::Truncated);
    }
    if &script[..MAGIC.len()] != MAGIC {
        return Err(VoteCodecError::BadMagic);
    }

    let mut entries = Vec::new();
    let mut pos = MAGIC.len();
    while pos < script.len() {
        let key_byte = script[pos];
        pos += 1;
        let (len, consumed) = read_varint(&script[pos..])?;
        pos += consumed;
        let len = len as usize;
        if pos + len > script.len() {
            return Err(VoteCodecError::PayloadTruncated);
        }
        let payload = script[pos..pos + len].to_vec();
        pos += len;

        match VotingDataKey::try_from(key_byte) {
            Ok(key) => entries.push(VotingData { key, payload }),
            Err(unknown) => {
                log::warn!("skipping unrecognized voting-data key byte {unknown}");
            }
        }
    }
    Ok(entries)
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(bytes: &[u8]) -> Result<(u64, usize), VoteCodecError> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(VoteCodecError::VarintOverflow);
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(VoteCodecError::PayloadTruncated)
}
