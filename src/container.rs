//! Outer replay container — format anchor at offset 0.
//!
//! # On-disk layout (all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   outer magic       = 12 32 34 11
//!    4      1   json_block_count  1 or 2
//!    5      3   zero padding
//!    8      …   json blocks: count × (u32 length + ASCII JSON bytes)
//!    …      4   inner magic       = AA C6 31 00, preserved verbatim
//!    …      …   payload region    (see `payload`)
//! ```
//!
//! # Validation policy
//! Header mismatches are warnings, not errors — replays written by client
//! builds we have not seen stay readable.  A block count outside `{1, 2}` is
//! clamped into that range after a warning.  Only a stream too short to hold
//! the 8-byte header at all is fatal.
//!
//! The JSON documents are opaque: parsed to prove well-formedness and
//! re-serialized compactly, but never interpreted.  Key order is preserved
//! so an unedited document round-trips byte for byte.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

use crate::payload::{self, PayloadError};

/// Outer header magic, bytes 0–3.
pub const OUTER_MAGIC: [u8; 4] = [0x12, 0x32, 0x34, 0x11];

/// The inner magic every observed replay carries between the JSON blocks
/// and the payload region.
pub const INNER_MAGIC: [u8; 4] = [0xAA, 0xC6, 0x31, 0x00];

/// Outer header size in bytes.
pub const HEADER_SIZE: usize = 8;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("malformed header: {0}")]
    MalformedHeader(io::Error),
    #[error("metadata block {index} is not valid JSON: {source}")]
    Corrupt { index: usize, source: serde_json::Error },
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A fully unpacked replay: the three independently editable artifacts.
#[derive(Debug, Clone)]
pub struct Replay {
    /// One or two metadata documents, in container order.
    pub json_blocks: Vec<Value>,
    /// Four opaque bytes between the JSON blocks and the payload; carried
    /// through verbatim so an unedited replay reassembles byte for byte.
    pub inner_magic: [u8; 4],
    /// The decoded packet stream.
    pub packets:     Vec<u8>,
}

impl Replay {
    /// Read a complete replay container.
    ///
    /// Consumes the reader to EOF; the payload region is always the final
    /// segment.
    pub fn read<R: Read>(mut r: R) -> Result<Self, ContainerError> {
        let mut header = [0u8; HEADER_SIZE];
        r.read_exact(&mut header).map_err(ContainerError::MalformedHeader)?;

        if header[0..4] != OUTER_MAGIC {
            warn!(
                "outer magic mismatch: expected {:02x?}, got {:02x?}",
                OUTER_MAGIC,
                &header[0..4]
            );
        }
        if header[5..8] != [0, 0, 0] {
            warn!("outer header padding is non-zero: {:02x?}", &header[5..8]);
        }

        let declared = header[4];
        let count = match declared {
            1 | 2 => declared as usize,
            other => {
                let clamped = (other as usize).clamp(1, 2);
                warn!("json block count {other} out of range, reading {clamped} block(s)");
                clamped
            }
        };

        let mut json_blocks = Vec::with_capacity(count);
        for index in 0..count {
            let len = r.read_u32::<LittleEndian>()? as usize;
            let mut raw = vec![0u8; len];
            r.read_exact(&mut raw)?;
            debug!("json block {index}: {len} bytes");
            let doc = serde_json::from_slice(&raw)
                .map_err(|source| ContainerError::Corrupt { index, source })?;
            json_blocks.push(doc);
        }

        let mut inner_magic = [0u8; 4];
        r.read_exact(&mut inner_magic)?;
        if inner_magic != INNER_MAGIC {
            warn!(
                "inner magic mismatch: expected {:02x?}, got {:02x?}",
                INNER_MAGIC, inner_magic
            );
        }

        let packets = payload::decode(r)?;
        Ok(Self { json_blocks, inner_magic, packets })
    }

    /// Write a complete replay container.
    ///
    /// The block count written to header byte 4 is `json_blocks.len()`.
    pub fn write<W: Write>(&self, mut w: W) -> Result<(), ContainerError> {
        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&OUTER_MAGIC);
        header[4] = self.json_blocks.len() as u8;
        w.write_all(&header)?;

        for doc in &self.json_blocks {
            let text = json_to_ascii(doc);
            w.write_u32::<LittleEndian>(text.len() as u32)?;
            w.write_all(text.as_bytes())?;
        }

        w.write_all(&self.inner_magic)?;
        payload::encode(w, &self.packets)?;
        Ok(())
    }
}

/// Serialize a JSON document compactly with every non-ASCII character
/// `\u`-escaped, matching how the client writes the metadata blocks.
/// No trailing newline.
pub fn json_to_ascii(doc: &Value) -> String {
    let compact = doc.to_string();
    if compact.is_ascii() {
        return compact;
    }
    let mut out = String::with_capacity(compact.len());
    for ch in compact.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_replay(blocks: Vec<Value>, packets: &[u8]) -> Vec<u8> {
        let replay = Replay {
            json_blocks: blocks,
            inner_magic: INNER_MAGIC,
            packets:     packets.to_vec(),
        };
        let mut out = Vec::new();
        replay.write(&mut out).unwrap();
        out
    }

    #[test]
    fn roundtrip_single_block() {
        let wire = build_replay(vec![json!({"map": "karelia"})], b"fake packets");
        assert_eq!(&wire[0..8], &[0x12, 0x32, 0x34, 0x11, 0x01, 0x00, 0x00, 0x00]);

        let replay = Replay::read(wire.as_slice()).unwrap();
        assert_eq!(replay.json_blocks, vec![json!({"map": "karelia"})]);
        assert_eq!(replay.inner_magic, INNER_MAGIC);
        assert_eq!(replay.packets, b"fake packets");
    }

    #[test]
    fn roundtrip_two_blocks_byte_exact() {
        let wire = build_replay(
            vec![json!({"a": 1, "z": 2, "m": 3}), json!([1, 2, 3])],
            b"payload bytes",
        );
        let replay = Replay::read(wire.as_slice()).unwrap();
        let mut rewritten = Vec::new();
        replay.write(&mut rewritten).unwrap();
        assert_eq!(rewritten, wire);
    }

    #[test]
    fn bad_magic_is_only_a_warning() {
        let mut wire = build_replay(vec![json!([])], b"");
        wire[0] = 0xFF;
        wire[6] = 0x01;
        let replay = Replay::read(wire.as_slice()).unwrap();
        assert_eq!(replay.json_blocks, vec![json!([])]);
    }

    #[test]
    fn block_count_out_of_range_is_clamped() {
        // Byte 4 = 3 still reads two blocks.
        let mut wire = build_replay(vec![json!(1), json!(2)], b"");
        wire[4] = 3;
        let replay = Replay::read(wire.as_slice()).unwrap();
        assert_eq!(replay.json_blocks, vec![json!(1), json!(2)]);

        // Byte 4 = 0 still reads one.
        let mut wire = build_replay(vec![json!(1)], b"");
        wire[4] = 0;
        let replay = Replay::read(wire.as_slice()).unwrap();
        assert_eq!(replay.json_blocks, vec![json!(1)]);
    }

    #[test]
    fn truncated_header_is_fatal() {
        assert!(matches!(
            Replay::read([0x12u8, 0x32].as_slice()),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn invalid_json_block_is_corrupt() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&[0x12, 0x32, 0x34, 0x11, 0x01, 0x00, 0x00, 0x00]);
        wire.extend_from_slice(&3u32.to_le_bytes());
        wire.extend_from_slice(b"{{{");
        assert!(matches!(
            Replay::read(wire.as_slice()),
            Err(ContainerError::Corrupt { index: 0, .. })
        ));
    }

    #[test]
    fn foreign_inner_magic_roundtrips() {
        let replay = Replay {
            json_blocks: vec![json!([])],
            inner_magic: [1, 2, 3, 4],
            packets:     Vec::new(),
        };
        let mut wire = Vec::new();
        replay.write(&mut wire).unwrap();
        assert_eq!(Replay::read(wire.as_slice()).unwrap().inner_magic, [1, 2, 3, 4]);
    }

    #[test]
    fn non_ascii_json_is_escaped() {
        assert_eq!(
            json_to_ascii(&json!({"name": "Вася"})),
            "{\"name\":\"\\u0412\\u0430\\u0441\\u044f\"}"
        );
        // Astral characters escape as a surrogate pair.
        assert_eq!(json_to_ascii(&json!("🦀")), "\"\\ud83e\\udd80\"");
        assert_eq!(json_to_ascii(&json!({"plain": true})), r#"{"plain":true}"#);
    }
}
