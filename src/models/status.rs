// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Status codes sent to clients via `ISTA` (C8, §6). Each code is a fixed
//! three-digit number: a severity digit followed by a two-digit table
//! entry, optionally decorated with a diagnostic flag (`FB`/`FM`/`TL`).

use core::fmt;

use crate::{
    cfg::config::Config,
    models::{command::Addressing, opcode::Name},
};

/// First digit of the wire status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success = 1,
    Recoverable = 2,
    Fatal = 3,
}

/// A status table entry (§6). Message text is configurable at the call
/// site; this only fixes the numeric code and its severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// `ISTA 000` greeting banner sent once after SID assignment.
    Banner,
    HubFull,
    HubDisabled,
    AuthUserNotFound,
    NickInvalid,
    NickTaken,
    AuthInvalidPassword,
    CidTaken,
    RegisteredUsersOnly,
    PidInvalid,
    NoMemory,
    BanPermanent,
    BanTemporary,
    CidInvalid,
    CidMissing,
    PidMissing,
    NickMissing,
    ShareSizeLow,
    ShareSizeHigh,
    SlotsLow,
    SlotsHigh,
    HubLimitLow,
    HubLimitHigh,
}

impl StatusCode {
    pub const fn severity(self) -> Severity {
        use StatusCode::*;
        match self {
            Banner => Severity::Success,
            HubFull | HubDisabled | AuthUserNotFound => Severity::Recoverable,
            NickInvalid | NickTaken | AuthInvalidPassword | CidTaken | RegisteredUsersOnly
            | PidInvalid | NoMemory | BanPermanent | BanTemporary => Severity::Fatal,
            CidInvalid | CidMissing | PidMissing | NickMissing | ShareSizeLow
            | ShareSizeHigh | SlotsLow | SlotsHigh | HubLimitLow | HubLimitHigh => {
                Severity::Fatal
            },
        }
    }

    /// The two-digit table entry (§6's `11`..`43`).
    pub const fn entry(self) -> u8 {
        use StatusCode::*;
        match self {
            Banner => 0,
            HubFull => 11,
            HubDisabled => 12,
            AuthUserNotFound => 20,
            NickInvalid => 21,
            NickTaken => 22,
            AuthInvalidPassword => 23,
            CidTaken => 24,
            RegisteredUsersOnly => 26,
            PidInvalid => 27,
            NoMemory => 30,
            BanPermanent => 31,
            BanTemporary => 32,
            CidInvalid | CidMissing | PidMissing | NickMissing | ShareSizeLow
            | ShareSizeHigh | SlotsLow | SlotsHigh | HubLimitLow | HubLimitHigh => 43,
        }
    }

    /// The full three-digit wire code, e.g. `322` for a fatal nick-taken.
    pub fn wire_code(self) -> u16 {
        self.severity() as u16 * 100 + self.entry() as u16
    }

    pub const fn default_message(self) -> &'static str {
        use StatusCode::*;
        match self {
            Banner => "Powered by adc-hub",
            HubFull => "Hub is full",
            HubDisabled => "Hub is disabled",
            AuthUserNotFound => "No such user",
            NickInvalid => "Invalid nick",
            NickTaken => "nick taken",
            AuthInvalidPassword => "Invalid password",
            CidTaken => "CID taken",
            RegisteredUsersOnly => "Registered users only",
            PidInvalid => "Invalid PID",
            NoMemory => "Out of memory",
            BanPermanent => "You are banned",
            BanTemporary => "You are temporarily banned",
            CidInvalid => "Invalid CID",
            CidMissing => "Missing CID",
            PidMissing => "Missing PID",
            NickMissing => "Missing or duplicate nick",
            ShareSizeLow => "Shared size too low",
            ShareSizeHigh => "Shared size too high",
            SlotsLow => "Too few slots",
            SlotsHigh => "Too many slots",
            HubLimitLow => "Too few hubs",
            HubLimitHigh => "Too many hubs",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_code())
    }
}

/// A diagnostic flag decorating a status (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticFlag {
    /// `FB<field>` — the named field's value was rejected.
    BadField([u8; 2]),
    /// `FM<field>` — a required field was missing.
    MissingField([u8; 2]),
    /// `TL<secs>` — time remaining on a temporary measure (e.g. a ban).
    TimeLimit(u64),
}

impl DiagnosticFlag {
    fn key(&self) -> [u8; 2] {
        match self {
            DiagnosticFlag::BadField(_) => *b"FB",
            DiagnosticFlag::MissingField(_) => *b"FM",
            DiagnosticFlag::TimeLimit(_) => *b"TL",
        }
    }

    fn value(&self) -> String {
        match self {
            DiagnosticFlag::BadField(field) | DiagnosticFlag::MissingField(field) => {
                String::from_utf8_lossy(field).into_owned()
            },
            DiagnosticFlag::TimeLimit(secs) => secs.to_string(),
        }
    }
}

/// A complete status, ready to be sent to a client as `ISTA`.
#[derive(Debug, Clone)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    pub flags: Vec<DiagnosticFlag>,
}

impl Status {
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            flags: Vec::new(),
        }
    }

    /// Builds a status using the operator's `StatusMessages` override for
    /// `code` when one is configured, falling back to the built-in table.
    pub fn from_config(code: StatusCode, config: &Config) -> Self {
        Self {
            code,
            message: config.status_message(code).to_string(),
            flags: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_flag(mut self, flag: DiagnosticFlag) -> Self {
        self.flags.push(flag);
        self
    }

    /// Builds the `ISTA` command carrying this status.
    pub fn to_command(&self) -> super::command::Command {
        let mut cmd = super::command::Command::new(Name::STA, Addressing::HubToClient);
        cmd.push_positional(self.code.to_string());
        cmd.push_positional(self.message.clone());
        for flag in &self.flags {
            cmd.set_named(flag.key(), flag.value());
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_taken_is_322() {
        assert_eq!(StatusCode::NickTaken.wire_code(), 322);
    }

    #[test]
    fn hub_full_is_recoverable_211() {
        assert_eq!(StatusCode::HubFull.wire_code(), 211);
        assert_eq!(StatusCode::HubFull.severity(), Severity::Recoverable);
    }

    #[test]
    fn status_command_serializes_with_diagnostic_flag() {
        let status = Status::new(StatusCode::ShareSizeLow)
            .with_message("share too low")
            .with_flag(DiagnosticFlag::BadField(*b"SS"));
        let bytes = status.to_command().to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("ISTA 343 share\\stoo\\slow FBSS"));
    }

    #[test]
    fn from_config_uses_operator_override_message() {
        use std::collections::HashMap;

        use crate::cfg::config::{
            Auth, HubCountBounds, Identity, Limits, Motd, Network, ShareBounds, SlotBounds,
        };

        let mut config = Config {
            network: Network {
                bind_addr: "0.0.0.0:1511".parse().unwrap(),
                udp_bind_addr: None,
                backlog: 128,
                max_line_length: 65536,
            },
            identity: Identity {
                hub_name: "TestHub".to_string(),
                description: String::new(),
                max_users: 16,
                max_nick_length: 32,
            },
            limits: Limits {
                guest_share: ShareBounds { min_mib: 0, max_mib: 0 },
                registered_share: ShareBounds { min_mib: 0, max_mib: 0 },
                guest_slots: SlotBounds { min: 0, max: 1000 },
                registered_slots: SlotBounds { min: 0, max: 1000 },
                guest_hubs: HubCountBounds { min: 0, max: 10 },
                registered_hubs: HubCountBounds { min: 0, max: 10 },
            },
            auth: Auth { allow_guests: true, handshake_timeout: std::time::Duration::from_secs(30) },
            motd: Motd::default(),
            chat_only: false,
            show_banner: false,
            status_messages: HashMap::new(),
        };
        assert_eq!(Status::from_config(StatusCode::NickTaken, &config).message, "nick taken");

        config.status_messages.insert("322".to_string(), "pick another nick".to_string());
        assert_eq!(Status::from_config(StatusCode::NickTaken, &config).message, "pick another nick");
    }

    #[test]
    fn temporary_ban_carries_time_limit_flag() {
        let status = Status::new(StatusCode::BanTemporary).with_flag(
            DiagnosticFlag::TimeLimit(3600),
        );
        let bytes = status.to_command().to_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("TL3600"));
    }
}
