// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use adc_hub::{
    acl::Acl,
    cfg::config::{
        Auth, Config, HubCountBounds, Identity, Limits, Motd, Network, ShareBounds, SlotBounds,
    },
    hub::HubController,
};

/// A permissive hub configuration: guests allowed, generous bounds,
/// no MOTD/banner, used as the baseline for every scenario test.
pub fn test_config() -> Config {
    Config {
        network: Network {
            bind_addr: "127.0.0.1:1511".parse().unwrap(),
            udp_bind_addr: None,
            backlog: 128,
            max_line_length: 65536,
        },
        identity: Identity {
            hub_name: "ScenarioHub".to_string(),
            description: "integration test hub".to_string(),
            max_users: 64,
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
        auth: Auth { allow_guests: true, handshake_timeout: Duration::from_secs(30) },
        motd: Motd::default(),
        chat_only: false,
        show_banner: false,
        status_messages: std::collections::HashMap::new(),
    }
}

pub fn test_hub() -> HubController {
    HubController::new(test_config(), Acl::default())
}

/// A 39-character placeholder CID, distinct per `seed` byte.
pub fn cid(seed: u8) -> String {
    char::from(b'2' + (seed % 6)).to_string().repeat(39)
}
