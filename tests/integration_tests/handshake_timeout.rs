// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use adc_hub::{acl::Acl, error::DisconnectReason, hub::HubController};

use crate::integration_tests::common::test_config;

#[test]
fn handshake_timeout_closes_connection_without_registering() {
    let mut config = test_config();
    config.auth.handshake_timeout = Duration::from_millis(1);
    let mut hub = HubController::new(config, Acl::default());

    let sid = hub.accept().unwrap();
    assert!(hub.expired_handshakes().is_empty(), "deadline has not elapsed yet");

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(hub.expired_handshakes(), vec![sid]);

    hub.disconnect(sid, DisconnectReason::HandshakeTimeout);
    assert!(hub.expired_handshakes().is_empty(), "the timed-out connection is gone");
    assert_eq!(hub.user_count(), 0, "a connection that never finished the handshake never registers");
}
