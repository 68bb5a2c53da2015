// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use adc_hub::models::sid::Sid;

use crate::integration_tests::common::{cid, test_hub};

fn login(hub: &mut adc_hub::hub::HubController, nick: &str, seed: u8, sup: &str) -> Sid {
    let sid = hub.accept().unwrap();
    hub.handle_line(sid, sup.as_bytes());
    let binf = format!("BINF {} ID{} NI{} SS0 SL0", sid.as_str(), cid(seed), nick);
    let result = hub.handle_line(sid, binf.as_bytes());
    assert!(result.disconnect.is_none());
    sid
}

#[test]
fn direct_message_reaches_only_its_target() {
    let mut hub = test_hub();
    let alice = login(&mut hub, "alice", 1, "HSUP ADBASE");
    let bob = login(&mut hub, "bob", 2, "HSUP ADBASE");
    let carol = login(&mut hub, "carol", 3, "HSUP ADBASE");

    let dmsg = format!("DMSG {} {} Hello", alice.as_str(), bob.as_str());
    let result = hub.handle_line(alice, dmsg.as_bytes());
    assert!(result.disconnect.is_none());

    let bob_inbox = hub.drain_outbound(bob);
    assert_eq!(bob_inbox.len(), 1);
    assert!(String::from_utf8(bob_inbox[0].to_bytes()).unwrap().contains("Hello"));

    assert!(hub.drain_outbound(carol).is_empty(), "non-target never sees a direct message");
    assert!(hub.drain_outbound(alice).is_empty(), "direct message is not echoed to the sender");
}

#[test]
fn feature_filtered_message_reaches_only_supporting_clients() {
    let mut hub = test_hub();
    let alice = login(&mut hub, "alice", 1, "HSUP ADBASE ADPING");
    let bob = login(&mut hub, "bob", 2, "HSUP ADBASE ADPING");
    let carol = login(&mut hub, "carol", 3, "HSUP ADBASE");

    let fmsg = format!("FMSG {} +PING Hi", alice.as_str());
    let result = hub.handle_line(alice, fmsg.as_bytes());
    assert!(result.disconnect.is_none());

    assert_eq!(hub.drain_outbound(bob).len(), 1, "PING-supporting peer receives it");
    assert_eq!(hub.drain_outbound(alice).len(), 1, "broadcast-style feature filter includes the sender itself");
    assert!(hub.drain_outbound(carol).is_empty(), "non-supporting peer is filtered out");
}
