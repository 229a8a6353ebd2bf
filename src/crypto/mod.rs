//! Blowfish chained-XOR block transform for the replay payload region.
//!
//! Cipher:   standard (big-endian) Blowfish, one 8-byte block at a time
//! Key:      fixed 16 bytes, identical in every client build
//! Chaining: each plaintext block is XORed with the *previous plaintext*
//!           block — not the previous ciphertext, so this is not CBC
//!
//! The decoder's chain value is the post-XOR plaintext it just produced; the
//! encoder's chain value is the pre-XOR plaintext it was handed.  The two are
//! the same bytes seen from opposite directions, which is what makes the
//! round trip work.  An implementation that chains on ciphertext decrypts the
//! first block correctly and garbles every block after it.
//!
//! Length prefixes and padding are handled by the caller (`payload`); this
//! module only transforms whole numbers of 8-byte blocks.

use blowfish::cipher::generic_array::GenericArray;
use blowfish::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use blowfish::Blowfish;

/// Fixed Blowfish key shared by every Blitz client build.
pub const CIPHER_KEY: [u8; 16] = [
    0xDE, 0x72, 0xBE, 0xA0, 0xDE, 0x04, 0xBE, 0xB1,
    0xDE, 0xFE, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF,
];

/// Blowfish block size in bytes.
pub const BLOCK_SIZE: usize = 8;

fn cipher() -> Blowfish {
    // 16 bytes is within Blowfish's 4..=56 byte key range.
    Blowfish::new_from_slice(&CIPHER_KEY).expect("fixed key has a valid length")
}

/// Decrypt a whole number of 8-byte blocks, un-chaining each against the
/// previous plaintext block.
///
/// Input length must be a multiple of [`BLOCK_SIZE`]; the caller validates
/// this before calling (a partial tail block is a format error, not a
/// cipher concern).
pub fn decrypt_chained(ciphertext: &[u8]) -> Vec<u8> {
    debug_assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);

    let bf = cipher();
    let mut out  = Vec::with_capacity(ciphertext.len());
    let mut prev = [0u8; BLOCK_SIZE];

    for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        bf.decrypt_block(&mut block);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev.copy_from_slice(&block);
        out.extend_from_slice(&block);
    }
    out
}

/// Encrypt a whole number of 8-byte blocks.
///
/// The chain value carried to the next block is the *pre-XOR* plaintext,
/// mirroring the decoder's post-XOR output.  Input length must be a multiple
/// of [`BLOCK_SIZE`]; the caller pads beforehand.
pub fn encrypt_chained(plaintext: &[u8]) -> Vec<u8> {
    debug_assert_eq!(plaintext.len() % BLOCK_SIZE, 0);

    let bf = cipher();
    let mut out  = Vec::with_capacity(plaintext.len());
    let mut prev = [0u8; BLOCK_SIZE];

    for chunk in plaintext.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        bf.encrypt_block(&mut block);
        prev.copy_from_slice(chunk);
        out.extend_from_slice(&block);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_multi_block() {
        let data: Vec<u8> = (0u8..=255).cycle().take(64).collect();
        let encrypted = encrypt_chained(&data);
        assert_eq!(encrypted.len(), data.len());
        assert_ne!(encrypted, data);
        assert_eq!(decrypt_chained(&encrypted), data);
    }

    #[test]
    fn roundtrip_empty() {
        assert_eq!(encrypt_chained(&[]), Vec::<u8>::new());
        assert_eq!(decrypt_chained(&[]), Vec::<u8>::new());
    }

    #[test]
    fn chain_operand_is_plaintext_not_ciphertext() {
        // Two-block message: block 1 must be E(u1), block 2 must be
        // E(u2 XOR u1).  CBC would produce E(u2 XOR E(u1)) instead.
        let u1 = [0x11u8; 8];
        let u2 = [0x22u8; 8];
        let mut data = Vec::new();
        data.extend_from_slice(&u1);
        data.extend_from_slice(&u2);

        let bf = cipher();
        let mut expect_first = GenericArray::clone_from_slice(&u1);
        bf.encrypt_block(&mut expect_first);
        let mut expect_second = GenericArray::clone_from_slice(&[0x33u8; 8]); // u2 ^ u1
        bf.encrypt_block(&mut expect_second);

        let encrypted = encrypt_chained(&data);
        assert_eq!(&encrypted[0..8], expect_first.as_slice());
        assert_eq!(&encrypted[8..16], expect_second.as_slice());
    }

    #[test]
    fn decoder_chains_on_post_xor_plaintext() {
        // Three identical plaintext blocks exercise the prev update on both
        // sides: if either direction tracked the wrong chain value, the
        // third block would not survive the round trip.
        let data = [0xABu8; 24];
        assert_eq!(decrypt_chained(&encrypt_chained(&data)), data);
    }
}
