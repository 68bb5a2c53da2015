// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, fs, net::SocketAddr, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::models::status::StatusCode;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Listen addresses and wire-level limits.
    pub network: Network,
    /// Hub name and descriptive text advertised in `IINF`.
    pub identity: Identity,
    /// Share/slot/hub-count bounds per credential class.
    pub limits: Limits,
    /// Guest access and handshake timing.
    pub auth: Auth,
    /// Message of the day, sent after a successful login.
    pub motd: Motd,
    /// Restricts search/connect traffic to operators and above.
    #[serde(default)]
    pub chat_only: bool,
    /// Whether `set_variables` pre-builds and sends the startup banner.
    #[serde(default = "default_true")]
    pub show_banner: bool,
    /// Operator-supplied overrides of the `ISTA` message table (§6),
    /// keyed by the three-digit wire code (e.g. `"322"`). A code absent
    /// from this map falls back to `StatusCode::default_message`.
    #[serde(rename = "StatusMessages", default)]
    pub status_messages: HashMap<String, String>,
}

impl Config {
    /// Resolves the message text for `code`, preferring an operator
    /// override from `StatusMessages` over the built-in default.
    pub fn status_message(&self, code: StatusCode) -> &str {
        self.status_messages
            .get(&code.wire_code().to_string())
            .map(String::as_str)
            .unwrap_or_else(|| code.default_message())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Network {
    #[serde(rename = "BindAddr")]
    pub bind_addr: SocketAddr,
    #[serde(rename = "UdpBindAddr", default)]
    pub udp_bind_addr: Option<SocketAddr>,
    #[serde(rename = "Backlog", default = "default_backlog")]
    pub backlog: u32,
    #[serde(rename = "MaxLineLength", default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_backlog() -> u32 {
    128
}

fn default_max_line_length() -> usize {
    65 * 1024
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Identity {
    #[serde(rename = "HubName")]
    pub hub_name: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "MaxUsers")]
    pub max_users: usize,
    #[serde(rename = "MaxNickLength", default = "default_max_nick_length")]
    pub max_nick_length: usize,
}

fn default_max_nick_length() -> usize {
    64
}

/// Share/slot/hub-count bounds, independent per credential class per
/// §4.8 (`min_hubs ≤ HN + HR + HO ≤ max_hubs`).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Limits {
    #[serde(rename = "GuestShare")]
    pub guest_share: ShareBounds,
    #[serde(rename = "RegisteredShare")]
    pub registered_share: ShareBounds,
    #[serde(rename = "GuestSlots")]
    pub guest_slots: SlotBounds,
    #[serde(rename = "RegisteredSlots")]
    pub registered_slots: SlotBounds,
    #[serde(rename = "GuestHubs")]
    pub guest_hubs: HubCountBounds,
    #[serde(rename = "RegisteredHubs")]
    pub registered_hubs: HubCountBounds,
}

/// Bounds expressed in configuration as MiB; wire form (`SS`) is bytes.
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct ShareBounds {
    #[serde(rename = "MinMiB")]
    pub min_mib: u64,
    #[serde(rename = "MaxMiB")]
    pub max_mib: u64,
}

impl ShareBounds {
    pub fn min_bytes(&self) -> u64 {
        self.min_mib * 1024 * 1024
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_mib * 1024 * 1024
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct SlotBounds {
    #[serde(rename = "Min")]
    pub min: u32,
    #[serde(rename = "Max")]
    pub max: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct HubCountBounds {
    #[serde(rename = "Min")]
    pub min: u32,
    #[serde(rename = "Max")]
    pub max: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Auth {
    #[serde(rename = "AllowGuests", default = "default_true")]
    pub allow_guests: bool,
    #[serde(rename = "HandshakeTimeout", with = "serde_secs", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Motd {
    #[serde(rename = "Path", default)]
    pub path: Option<String>,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.identity.hub_name.is_empty(), "HubName must not be empty");
        ensure!(self.identity.max_users >= 1, "MaxUsers must be >= 1");
        ensure!(
            self.identity.max_users <= 32usize.pow(4) - 2,
            "MaxUsers exceeds the SID address space"
        );
        ensure!(
            self.network.max_line_length >= 64,
            "MaxLineLength is unreasonably small"
        );

        for bounds in [&self.limits.guest_share, &self.limits.registered_share] {
            ensure!(bounds.min_mib <= bounds.max_mib, "share MinMiB must be <= MaxMiB");
        }
        for bounds in [&self.limits.guest_slots, &self.limits.registered_slots] {
            ensure!(bounds.min <= bounds.max, "slot Min must be <= Max");
        }
        for bounds in [&self.limits.guest_hubs, &self.limits.registered_hubs] {
            ensure!(bounds.min <= bounds.max, "hub-count Min must be <= Max");
        }

        if !self.auth.allow_guests {
            ensure!(
                self.limits.registered_share.max_mib > 0,
                "guests disallowed but registered share bounds are empty"
            );
        }

        Ok(())
    }
}

mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
