// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::integration_tests::common::{cid, test_hub};

#[test]
fn successful_guest_login() {
    let mut hub = test_hub();
    let sid = hub.accept().unwrap();

    let sup = hub.handle_line(sid, b"HSUP ADBASE");
    assert!(sup.disconnect.is_none());
    assert_eq!(sup.outbound.len(), 3, "ISUP, ISID, IINF");

    assert_eq!(hub.user_count(), 0);
    assert_eq!(hub.shared_size(), 0);

    let binf = format!(
        "BINF {} ID{} NInick SS1000000 SL2",
        sid.as_str(),
        cid(1)
    );
    let result = hub.handle_line(sid, binf.as_bytes());
    assert!(result.disconnect.is_none(), "guest login should not be rejected");

    assert_eq!(hub.user_count(), 1);
    assert_eq!(hub.shared_size(), 1_000_000);
}
