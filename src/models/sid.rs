// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session identifiers (SID) and the allocator that hands them out (C2).
//!
//! A SID is four characters drawn from the ADC base-32 alphabet (digits
//! 2-7 and A-Z, excluding `I`, `L`, `O`, `S`, plus `0` and `1`). It is
//! unique among connected users for the lifetime of their connection.

use std::{collections::VecDeque, fmt};

use thiserror::Error;

/// The 32-symbol alphabet ADC SIDs and CIDs are drawn from: A-Z with I, L,
/// O, S removed (22 letters), plus the ten digits (10 digits) = 32.
const ALPHABET: &[u8; 32] = b"ABCDEFGHJKMNPQRTUVWXYZ2345670189";

const REVERSE_LEN: usize = 128;

fn reverse_table() -> &'static [i8; REVERSE_LEN] {
    static TABLE: std::sync::OnceLock<[i8; REVERSE_LEN]> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [-1i8; REVERSE_LEN];
        for (value, &byte) in ALPHABET.iter().enumerate() {
            table[byte as usize] = value as i8;
        }
        table
    })
}

#[inline]
fn is_base32_char(b: u8) -> bool {
    (b as usize) < REVERSE_LEN && reverse_table()[b as usize] >= 0
}

/// A four-character session identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sid(pub [u8; 4]);

/// The hub's own pseudo-SID, reserved and never handed to a client.
pub const HUB_SID: Sid = Sid(*b"AAAB");
/// Sentinel SID that is never a valid user, reserved alongside `HUB_SID`.
pub const SENTINEL_SID: Sid = Sid(*b"AAAA");

#[derive(Debug, Error)]
#[error("not a valid 4-character base-32 SID")]
pub struct InvalidSid;

impl Sid {
    pub fn parse(bytes: &[u8]) -> Result<Self, InvalidSid> {
        if bytes.len() != 4 || !bytes.iter().all(|&b| is_base32_char(b)) {
            return Err(InvalidSid);
        }
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(Sid(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // valid by construction: only ever built from ALPHABET bytes.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Index of this SID in allocation order, used by the allocator to
    /// enumerate the free pool.
    fn index(self) -> u32 {
        let mut acc: u32 = 0;
        for &b in &self.0 {
            acc = acc * 32 + reverse_table()[b as usize].max(0) as u32;
        }
        acc
    }

    fn from_index(mut idx: u32) -> Self {
        let mut out = [0u8; 4];
        for slot in out.iter_mut().rev() {
            *slot = ALPHABET[(idx % 32) as usize];
            idx /= 32;
        }
        Sid(out)
    }
}

impl fmt::Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sid({})", self.as_str())
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allocates and frees four-character SIDs. `acquire`/`release` are O(1):
/// the free pool is a deque seeded up-front, and a release simply pushes
/// the freed SID back onto it. Reuse-on-release is intentional; there is
/// no grace period (ordering against in-flight commands referencing the
/// prior holder is the event queue's job, see `events`).
#[derive(Debug)]
pub struct SidAllocator {
    free: VecDeque<Sid>,
    capacity: usize,
}

#[derive(Debug, Error)]
#[error("hub full: no free session identifiers")]
pub struct HubFull;

impl SidAllocator {
    /// Builds an allocator with `capacity` usable SIDs, skipping the
    /// reserved `HUB_SID` and `SENTINEL_SID` slots.
    pub fn new(capacity: usize) -> Self {
        let mut free = VecDeque::with_capacity(capacity);
        let mut idx = SENTINEL_SID.index() + 1;
        while free.len() < capacity {
            let sid = Sid::from_index(idx);
            if sid != HUB_SID {
                free.push_back(sid);
            }
            idx += 1;
        }
        Self { free, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn acquire(&mut self) -> Result<Sid, HubFull> {
        self.free.pop_front().ok_or(HubFull)
    }

    pub fn release(&mut self, sid: Sid) {
        debug_assert!(sid != HUB_SID && sid != SENTINEL_SID);
        self.free.push_back(sid);
    }
}
