//! Low-level key derivation shared by the AES-256 coder (`coder::aes`).
//!
//! This module intentionally stops at key derivation: the AES-GCM cipher
//! itself, the salt/nonce it needs, and the coder-properties encoding all
//! live in `coder::aes`, which is the `Coder` trait implementation that
//! actually drives this.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

pub const KEY_SIZE: usize = 32; // 256 bits for AES-256
pub const SALT_SIZE: usize = 16;
pub const NONCE_SIZE: usize = 12; // 96 bits, as AES-GCM requires

/// Derives a 256-bit key from already-encoded password bytes (the core
/// hands this module UTF-16LE bytes, per §6's `set_password` contract) and a
/// salt, iterated `2^num_cycles_power` times — mirroring 7z's own
/// cycles-power knob for PBKDF2 rounds rather than a fixed round count.
pub fn derive_key(password_bytes: &[u8], salt: &[u8], num_cycles_power: u8) -> [u8; KEY_SIZE] {
    let rounds = 1u32 << num_cycles_power.min(24);
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password_bytes, salt, rounds, &mut key);
    key
}

pub fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encodes a password the way §6's `set_password` contract requires: UTF-16LE
/// code units, no BOM, no trailing NUL.
pub fn password_to_utf16le(password: &str) -> Vec<u8> {
    password
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic_for_same_inputs() {
        let salt = [7u8; SALT_SIZE];
        let a = derive_key(b"\x70\x00\x77\x00", &salt, 4);
        let b = derive_key(b"\x70\x00\x77\x00", &salt, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn derive_key_differs_across_salts() {
        let a = derive_key(b"secret", &[1u8; SALT_SIZE], 4);
        let b = derive_key(b"secret", &[2u8; SALT_SIZE], 4);
        assert_ne!(a, b);
    }
}
