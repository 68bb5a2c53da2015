// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal ACL file format (§1's "external collaborators with minimal
//! interface definitions"): registered accounts, restricted nicknames,
//! and bans. Consulted by the session state machine during `identify`
//! (§4.3) and never mutated by the hub core.

use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cfg::enums::Credentials;

#[derive(Debug, Deserialize, Clone)]
pub struct Account {
    pub nick: String,
    /// Plaintext in the YAML file; the hub never stores a client's raw
    /// password, only this configured account secret used to compute
    /// the expected CHAP-like response (§4.3).
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_credentials")]
    pub credentials: Credentials,
}

fn default_credentials() -> Credentials {
    Credentials::User
}

#[derive(Debug, Deserialize, Clone)]
pub struct Ban {
    pub nick_or_cid: String,
    /// `None` is a permanent ban; `Some(secs)` is temporary, with `secs`
    /// remaining at the time the ACL file was (re)loaded.
    #[serde(default)]
    pub expires_in_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct AclFile {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    restricted_nicks: Vec<String>,
    #[serde(default)]
    bans: Vec<Ban>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanStatus {
    Permanent,
    Temporary { secs_remaining: u64 },
}

#[derive(Debug, Default)]
pub struct Acl {
    accounts: Vec<Account>,
    restricted_nicks: HashSet<String>,
    bans: Vec<Ban>,
}

impl Acl {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path).context("failed to read ACL file")?;
        let file: AclFile =
            serde_yaml::from_str(&text).context("failed to parse ACL YAML")?;
        Ok(Self {
            accounts: file.accounts,
            restricted_nicks: file.restricted_nicks.into_iter().collect(),
            bans: file.bans,
        })
    }

    pub fn account_for_nick(&self, nick: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.nick == nick)
    }

    pub fn is_nick_restricted(&self, nick: &str) -> bool {
        self.restricted_nicks.contains(nick)
    }

    pub fn ban_status(&self, nick_or_cid: &str) -> Option<BanStatus> {
        self.bans.iter().find(|b| b.nick_or_cid == nick_or_cid).map(|b| {
            match b.expires_in_secs {
                Some(secs) => BanStatus::Temporary { secs_remaining: secs },
                None => BanStatus::Permanent,
            }
        })
    }
}
