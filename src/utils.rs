// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared byte-level helpers: the bit-stream base-32 codec used for CIDs
//! and password challenges, and cryptographically-random challenge
//! generation for the CHAP-like handshake (§4.3).

use rand::Rng;
use sha2::{Digest, Sha256};

const ALPHABET: &[u8; 32] = b"ABCDEFGHJKMNPQRTUVWXYZ2345670189";

/// Encodes `data` as base-32 using the ADC alphabet, RFC4648-style
/// (5-bit groups, no padding).
pub fn encode_base32(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let idx = (buffer >> bits) & 0x1F;
            out.push(ALPHABET[idx as usize] as char);
        }
    }
    if bits > 0 {
        let idx = (buffer << (5 - bits)) & 0x1F;
        out.push(ALPHABET[idx as usize] as char);
    }
    out
}

/// Reverses `encode_base32`. Returns `None` on any character outside the
/// alphabet.
pub fn decode_base32(encoded: &str) -> Option<Vec<u8>> {
    let mut reverse = [-1i8; 128];
    for (value, &byte) in ALPHABET.iter().enumerate() {
        reverse[byte as usize] = value as i8;
    }

    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for byte in encoded.bytes() {
        let value = reverse.get(byte as usize).copied().unwrap_or(-1);
        if value < 0 {
            return None;
        }
        buffer = (buffer << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xFF) as u8);
        }
    }
    Some(out)
}

/// 24 bytes of cryptographically-random data for the `IGPA` challenge.
pub fn generate_challenge() -> [u8; 24] {
    let mut challenge = [0u8; 24];
    rand::rng().fill(&mut challenge);
    challenge
}

/// Computes `SHA256(password || challenge)`, the expected `HPAS` response.
pub fn expected_password_response(password: &[u8], challenge: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(challenge);
    hasher.finalize().into()
}

/// Constant-time comparison of two equal-length byte slices, vetted for
/// the password-response check (§9 Design Notes).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32_round_trips_arbitrary_bytes() {
        for data in [vec![], vec![0u8], vec![1, 2, 3, 4, 5], vec![255; 24]] {
            let encoded = encode_base32(&data);
            assert_eq!(decode_base32(&encoded).unwrap(), data);
        }
    }

    #[test]
    fn decode_rejects_characters_outside_alphabet() {
        assert!(decode_base32("AAAI").is_none());
    }

    #[test]
    fn challenge_is_24_bytes_of_nonzero_entropy() {
        let a = generate_challenge();
        let b = generate_challenge();
        assert_eq!(a.len(), 24);
        assert_ne!(a, b, "two random challenges collided — suspicious");
    }

    #[test]
    fn password_response_matches_manual_sha256() {
        let challenge = [7u8; 24];
        let response = expected_password_response(b"hunter2", &challenge);
        let mut hasher = Sha256::new();
        hasher.update(b"hunter2");
        hasher.update(challenge);
        let expected: [u8; 32] = hasher.finalize().into();
        assert!(constant_time_eq(&response, &expected));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_lengths() {
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
