// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::integration_tests::common::{cid, test_hub};

#[test]
fn duplicate_nick_rejected() {
    let mut hub = test_hub();

    let first = hub.accept().unwrap();
    hub.handle_line(first, b"HSUP ADBASE");
    let binf = format!("BINF {} ID{} NIalice SS0 SL0", first.as_str(), cid(1));
    let result = hub.handle_line(first, binf.as_bytes());
    assert!(result.disconnect.is_none());
    assert_eq!(hub.user_count(), 1);

    let second = hub.accept().unwrap();
    hub.handle_line(second, b"HSUP ADBASE");
    let binf2 = format!("BINF {} ID{} NIalice SS0 SL0", second.as_str(), cid(2));
    let result = hub.handle_line(second, binf2.as_bytes());

    assert!(result.disconnect.is_some(), "duplicate nick must close the connection");
    let status_line = String::from_utf8(result.outbound[0].to_bytes()).unwrap();
    assert!(status_line.starts_with("ISTA 322 "), "{status_line}");
    assert_eq!(hub.user_count(), 1, "registry stays at size 1");
}
