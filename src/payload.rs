//! Payload-region codec — the encrypted, compressed tail of a replay.
//!
//! # On-disk layout (all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   declared_length  zlib stream byte count (LE i32)
//!    4    8×N   ciphertext       Blowfish chained-XOR blocks, to EOF
//! ```
//!
//! The ciphertext always covers a whole number of 8-byte blocks; the bytes
//! of the last block beyond `declared_length` are zero padding.  Decoding
//! decrypts everything, truncates to `declared_length`, then inflates the
//! zlib stream.  Encoding mirrors each step in reverse.
//!
//! # Failure modes
//! A ciphertext tail shorter than one block is `MalformedPayload`; a
//! `declared_length` that is negative or exceeds the decrypted byte count is
//! `LengthMismatch`; a zlib stream that fails to inflate is `Corrupt`.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use thiserror::Error;

use crate::crypto::{decrypt_chained, encrypt_chained, BLOCK_SIZE};

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("declared zlib length {declared} does not fit the {available} decrypted bytes")]
    LengthMismatch { declared: i64, available: usize },
    #[error("corrupt zlib stream: {0}")]
    Corrupt(io::Error),
    #[error("compressed payload of {0} bytes exceeds the 31-bit length field")]
    Oversize(usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Decode the payload region: length prefix, decrypt, truncate, inflate.
///
/// Consumes the reader to EOF — the region is always the final segment of a
/// replay file.
pub fn decode<R: Read>(mut r: R) -> Result<Vec<u8>, PayloadError> {
    let declared = r.read_i32::<LittleEndian>().map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            PayloadError::MalformedPayload("EOF before the length prefix".into())
        } else {
            PayloadError::Io(e)
        }
    })?;

    let mut ciphertext = Vec::new();
    r.read_to_end(&mut ciphertext)?;
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(PayloadError::MalformedPayload(format!(
            "{} ciphertext bytes is not a whole number of {BLOCK_SIZE}-byte blocks",
            ciphertext.len()
        )));
    }
    debug!(
        "decrypting {} ciphertext bytes ({} declared)",
        ciphertext.len(),
        declared
    );

    let mut compressed = decrypt_chained(&ciphertext);
    if declared < 0 || declared as usize > compressed.len() {
        return Err(PayloadError::LengthMismatch {
            declared:  declared as i64,
            available: compressed.len(),
        });
    }
    compressed.truncate(declared as usize);

    let mut out = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut out)
        .map_err(PayloadError::Corrupt)?;
    debug!("decompressed payload: {} bytes", out.len());
    Ok(out)
}

/// Encode the payload region: deflate, length prefix, pad, encrypt.
pub fn encode<W: Write>(mut w: W, data: &[u8]) -> Result<(), PayloadError> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)?;
    let mut compressed = enc.finish()?;

    let declared =
        i32::try_from(compressed.len()).map_err(|_| PayloadError::Oversize(compressed.len()))?;
    w.write_i32::<LittleEndian>(declared)?;

    // Zero-pad the zlib stream to a whole number of cipher blocks; the
    // length prefix marks where the padding starts.
    if compressed.len() % BLOCK_SIZE != 0 {
        let padded = compressed.len() + BLOCK_SIZE - compressed.len() % BLOCK_SIZE;
        compressed.resize(padded, 0);
    }
    debug!("compressed payload: {declared} bytes in {} blocks", compressed.len() / BLOCK_SIZE);

    w.write_all(&encrypt_chained(&compressed))?;
    Ok(())
}
