// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection user state (§3).

use std::collections::VecDeque;

use bitflags::bitflags;
use tokio::time::Instant;

use crate::{
    cfg::enums::Credentials,
    models::{command::Command, sid::Sid},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UserFlags: u32 {
        /// Client identifies itself as a monitoring probe via SUP.
        const FEATURE_PING = 1 << 0;
        /// Client's `IINF` decoration should include live counts (set
        /// whenever `FEATURE_PING` is set, per §4.3).
        const WANTS_LIVE_COUNTS = 1 << 1;
    }
}

/// Where a connection currently sits in the login protocol (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Protocol,
    Identify,
    Verify,
    Normal,
    Cleanup,
}

/// Per-connected-client state (§3). Owned exclusively by the
/// [`crate::registry::UserRegistry`] from insertion until its destroy
/// event fires; inbound commands borrow it non-exclusively during
/// dispatch.
#[derive(Debug, Clone)]
pub struct User {
    pub sid: Sid,
    pub cid: Option<[u8; 39]>,
    pub nick: Option<String>,
    pub credentials: Credentials,
    pub state: SessionState,
    pub supported_features: Vec<[u8; 4]>,
    pub flags: UserFlags,
    pub shared_size: u64,
    pub shared_files: u32,
    pub slots: u32,
    pub hub_counts: HubCounts,
    pub send_queue: VecDeque<Command>,
    /// Armed from accept until `state` reaches `Normal`; `None` once
    /// disarmed (§8 invariant).
    pub handshake_deadline: Option<Instant>,
    /// Random challenge issued for `IGPA`, present only in `Verify`.
    pub pending_challenge: Option<[u8; 24]>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HubCounts {
    pub normal: u32,
    pub registered: u32,
    pub op: u32,
}

impl HubCounts {
    pub fn total(&self) -> u32 {
        self.normal + self.registered + self.op
    }
}

impl User {
    pub fn new(sid: Sid, handshake_deadline: Instant) -> Self {
        Self {
            sid,
            cid: None,
            nick: None,
            credentials: Credentials::Guest,
            state: SessionState::Protocol,
            supported_features: Vec::new(),
            flags: UserFlags::empty(),
            shared_size: 0,
            shared_files: 0,
            slots: 0,
            hub_counts: HubCounts::default(),
            send_queue: VecDeque::new(),
            handshake_deadline: Some(handshake_deadline),
            pending_challenge: None,
        }
    }

    pub fn supports(&self, feature: &[u8; 4]) -> bool {
        self.supported_features.iter().any(|f| f == feature)
    }

    pub fn enter_normal(&mut self) {
        self.state = SessionState::Normal;
        self.handshake_deadline = None;
        self.pending_challenge = None;
    }
}
