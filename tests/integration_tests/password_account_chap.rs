// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use adc_hub::{acl::Acl, hub::HubController, utils};

use crate::integration_tests::common::{cid, test_config};

fn acl_with_alice() -> Acl {
    let yaml = "accounts:\n  - nick: alice\n    password: hunter2\n    credentials: user\n";
    let path = std::env::temp_dir().join(format!("adc-hub-test-acl-{}.yaml", std::process::id()));
    std::fs::write(&path, yaml).unwrap();
    let acl = Acl::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    acl
}

#[test]
fn password_account_chap_round_trip() {
    let mut hub = HubController::new(test_config(), acl_with_alice());
    let sid = hub.accept().unwrap();
    hub.handle_line(sid, b"HSUP ADBASE");

    let binf = format!("BINF {} ID{} NIalice SS0 SL0", sid.as_str(), cid(1));
    let result = hub.handle_line(sid, binf.as_bytes());
    assert!(result.disconnect.is_none());
    assert_eq!(result.outbound.len(), 1, "IGPA challenge");
    let igpa = String::from_utf8(result.outbound[0].to_bytes()).unwrap();
    let challenge_b32 = igpa.trim_start_matches("IGPA ");
    let challenge = utils::decode_base32(challenge_b32).unwrap();

    let response = utils::encode_base32(&utils::expected_password_response(b"hunter2", &challenge));
    let hpas = format!("HPAS {response}");
    let result = hub.handle_line(sid, hpas.as_bytes());
    assert!(result.disconnect.is_none(), "correct password must complete login");
    assert_eq!(hub.user_count(), 1);
}

#[test]
fn password_account_chap_mismatch_closes_connection() {
    let mut hub = HubController::new(test_config(), acl_with_alice());
    let sid = hub.accept().unwrap();
    hub.handle_line(sid, b"HSUP ADBASE");
    let binf = format!("BINF {} ID{} NIalice SS0 SL0", sid.as_str(), cid(1));
    hub.handle_line(sid, binf.as_bytes());

    let result = hub.handle_line(sid, b"HPAS AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    assert!(result.disconnect.is_some());
    let status_line = String::from_utf8(result.outbound[0].to_bytes()).unwrap();
    assert!(status_line.starts_with("ISTA 323 "), "{status_line}");
    assert_eq!(hub.user_count(), 0);
}
