//! LoRaWAN cryptographic operations
//!
//! This module provides the LoRaWAN 1.0.x security primitives:
//! - Message Integrity Code (MIC) computation (AES-CMAC)
//! - Payload encryption/decryption (AES-128 counter blocks)
//! - Join accept decryption
//! - Session key derivation
//!
//! Everything works in place on caller buffers; nothing allocates.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};

use crate::config::device::{AESKey, DevAddr};

/// MIC size in bytes
pub const MIC_SIZE: usize = 4;

/// Block size for AES-128
pub const BLOCK_SIZE: usize = 16;

/// Direction identifiers for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    /// Uplink (device to network)
    Up = 0,
    /// Downlink (network to device)
    Down = 1,
}

fn cipher(key: &AESKey) -> Aes128 {
    <Aes128 as KeyInit>::new(GenericArray::from_slice(key))
}

fn cmac_mic(key: &AESKey, parts: &[&[u8]]) -> [u8; MIC_SIZE] {
    let mut mac = <Cmac<Aes128> as KeyInit>::new(GenericArray::from_slice(key));
    for part in parts {
        mac.update(part);
    }
    let tag = mac.finalize().into_bytes();

    let mut mic = [0u8; MIC_SIZE];
    mic.copy_from_slice(&tag[..MIC_SIZE]);
    mic
}

/// Compute the MIC of a data frame (MHDR through FRMPayload)
///
/// # Arguments
/// * `key` - Network session key
/// * `data` - Frame bytes covered by the MIC
/// * `dev_addr` - Device address
/// * `fcnt` - Full 32-bit frame counter
/// * `dir` - Message direction
pub fn compute_mic(
    key: &AESKey,
    data: &[u8],
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
) -> [u8; MIC_SIZE] {
    let mut b0 = [0u8; BLOCK_SIZE];
    b0[0] = 0x49;
    b0[5] = dir as u8;
    b0[6..10].copy_from_slice(&dev_addr);
    b0[10..14].copy_from_slice(&fcnt.to_le_bytes());
    b0[15] = data.len() as u8;

    cmac_mic(key, &[&b0, data])
}

/// Compute the MIC of a join request or join accept
///
/// # Arguments
/// * `key` - Application key
/// * `data` - Frame bytes covered by the MIC
pub fn compute_join_mic(key: &AESKey, data: &[u8]) -> [u8; MIC_SIZE] {
    cmac_mic(key, &[data])
}

/// Encrypt or decrypt FRMPayload in place
///
/// The operation is its own inverse.
pub fn crypt_payload(key: &AESKey, dev_addr: DevAddr, fcnt: u32, dir: Direction, payload: &mut [u8]) {
    let cipher = cipher(key);

    for (i, chunk) in payload.chunks_mut(BLOCK_SIZE).enumerate() {
        let mut s = [0u8; BLOCK_SIZE];
        s[0] = 0x01;
        s[5] = dir as u8;
        s[6..10].copy_from_slice(&dev_addr);
        s[10..14].copy_from_slice(&fcnt.to_le_bytes());
        // block counter starts at 1
        s[15] = (i + 1) as u8;

        cipher.encrypt_block(GenericArray::from_mut_slice(&mut s));
        for (b, k) in chunk.iter_mut().zip(s.iter()) {
            *b ^= k;
        }
    }
}

/// Decrypt a join accept body in place (device side)
///
/// The network encrypts with AES decrypt, so the device decrypts with AES
/// encrypt. `data` must be a whole number of blocks; a trailing partial block
/// is left untouched.
pub fn decrypt_join_accept(key: &AESKey, data: &mut [u8]) {
    let cipher = cipher(key);
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// Encrypt a join accept body in place (network side)
///
/// Inverse of [`decrypt_join_accept`], for gateway bridges and tests.
pub fn encrypt_join_accept(key: &AESKey, data: &mut [u8]) {
    let cipher = cipher(key);
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// Derive network and application session keys from join accept
///
/// # Arguments
/// * `app_key` - Application key
/// * `app_nonce` - Application nonce from join accept
/// * `net_id` - Network ID from join accept
/// * `dev_nonce` - Device nonce from join request
pub fn derive_session_keys(
    app_key: &AESKey,
    app_nonce: &[u8; 3],
    net_id: &[u8; 3],
    dev_nonce: u16,
) -> (AESKey, AESKey) {
    let cipher = cipher(app_key);

    let derive = |prefix: u8| {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = prefix;
        block[1..4].copy_from_slice(app_nonce);
        block[4..7].copy_from_slice(net_id);
        block[7..9].copy_from_slice(&dev_nonce.to_le_bytes());
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut block));
        block
    };

    (derive(0x01), derive(0x02))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4493 key and first message block
    const CMAC_KEY: AESKey = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];
    const CMAC_MSG: [u8; 16] = [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
        0x2a,
    ];

    #[test]
    fn test_join_mic_matches_rfc4493() {
        assert_eq!(compute_join_mic(&CMAC_KEY, &[]), [0xbb, 0x1d, 0x69, 0x29]);
        assert_eq!(compute_join_mic(&CMAC_KEY, &CMAC_MSG), [0x07, 0x0a, 0x16, 0xb4]);
    }

    #[test]
    fn test_join_accept_decrypt_is_aes_encrypt() {
        // FIPS-197 appendix C.1
        let key: AESKey = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let mut block = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        decrypt_join_accept(&key, &mut block);
        assert_eq!(
            block,
            [
                0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
                0xc5, 0x5a
            ]
        );

        encrypt_join_accept(&key, &mut block);
        assert_eq!(block[0], 0x00);
        assert_eq!(block[15], 0xff);
    }

    #[test]
    fn test_payload_crypt_is_symmetric_and_counter_bound() {
        let key = [0x11; 16];
        let dev_addr = [0x01, 0x02, 0x03, 0x04];
        let plain = *b"hello, lorawan!!-";

        let mut a = plain;
        crypt_payload(&key, dev_addr, 7, Direction::Up, &mut a);
        assert_ne!(a, plain);

        let mut b = plain;
        crypt_payload(&key, dev_addr, 8, Direction::Up, &mut b);
        assert_ne!(a, b);

        crypt_payload(&key, dev_addr, 7, Direction::Up, &mut a);
        assert_eq!(a, plain);
    }

    #[test]
    fn test_mic_depends_on_direction_and_counter() {
        let key = [0x22; 16];
        let dev_addr = [0xaa; 4];
        let data = [0x40, 1, 2, 3];
        let up = compute_mic(&key, &data, dev_addr, 1, Direction::Up);
        assert_ne!(up, compute_mic(&key, &data, dev_addr, 1, Direction::Down));
        assert_ne!(up, compute_mic(&key, &data, dev_addr, 2, Direction::Up));
    }

    #[test]
    fn test_session_keys_differ() {
        let (nwk, app) = derive_session_keys(&[0x33; 16], &[1, 2, 3], &[0, 0, 0x13], 0x0102);
        assert_ne!(nwk, app);
    }
}
