// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use adc_hub::{acl::Acl, hub::HubController};

use crate::integration_tests::common::{cid, test_config};

fn login(hub: &mut HubController, nick: &str, seed: u8) -> adc_hub::models::sid::Sid {
    let sid = hub.accept().unwrap();
    hub.handle_line(sid, b"HSUP ADBASE");
    let binf = format!("BINF {} ID{} NI{} SS0 SL0", sid.as_str(), cid(seed), nick);
    let result = hub.handle_line(sid, binf.as_bytes());
    assert!(result.disconnect.is_none());
    sid
}

#[test]
fn chat_only_mode_drops_search_and_returns_no_status() {
    let mut config = test_config();
    config.chat_only = true;
    let mut hub = HubController::new(config, Acl::default());

    let searcher = login(&mut hub, "guest1", 1);
    let other = login(&mut hub, "guest2", 2);

    let sch = format!("BSCH {} ANfoo", searcher.as_str());
    let result = hub.handle_line(searcher, sch.as_bytes());
    assert!(result.outbound.is_empty(), "sender gets no status for a dropped search");
    assert!(result.disconnect.is_none());

    assert!(hub.drain_outbound(other).is_empty(), "other user never receives the search");
}
