// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The router (C5, §4.5): selects recipients for a post-login command
//! per its addressing kind, applies chat-only filtering, and enqueues
//! the (possibly rewritten) command onto each recipient's send queue.

use crate::{
    cfg::enums::Credentials,
    models::{
        command::{Addressing, Command},
        opcode::Name,
        sid::Sid,
    },
    registry::UserRegistry,
};

/// Chat-only mode (§4.5) discards these command names when the sender's
/// credentials are below `operator`.
const CHAT_ONLY_RESTRICTED: &[Name] = &[Name::SCH, Name::RES, Name::RCM, Name::CTM];

/// True if `command` must be silently discarded before routing because
/// the hub is in chat-only mode and the sender lacks operator
/// credentials. Not an error: the sender receives no status.
pub fn chat_only_drops(
    command: &Command,
    sender_credentials: Credentials,
    chat_only: bool,
) -> bool {
    chat_only
        && !sender_credentials.is_operator_or_above()
        && CHAT_ONLY_RESTRICTED.contains(&command.name)
}

/// Selects the SIDs that should receive `command`, per the addressing
/// table in §4.5. The sender's own SID is included for `Broadcast` and
/// `Echo`.
pub fn recipients(addressing: &Addressing, registry: &UserRegistry) -> Vec<Sid> {
    match addressing {
        Addressing::Broadcast { .. } => registry.iter().map(|u| u.sid).collect(),
        Addressing::Feature { features, .. } => registry
            .iter()
            .filter(|u| {
                features.iter().all(|f| {
                    if f.include { u.supports(&f.tag) } else { !u.supports(&f.tag) }
                })
            })
            .map(|u| u.sid)
            .collect(),
        Addressing::Direct { target, .. } => registry
            .lookup_by_sid(*target)
            .map(|u| vec![u.sid])
            .unwrap_or_default(),
        Addressing::Echo { source, target } => {
            let mut sids = registry
                .lookup_by_sid(*target)
                .map(|u| vec![u.sid])
                .unwrap_or_default();
            sids.push(*source);
            sids
        },
        Addressing::ClientToHub | Addressing::HubToClient => Vec::new(),
    }
}

/// Enqueues `command` onto each recipient's send queue. Commands with
/// `priority < 0` are dropped on a per-recipient queue that has reached
/// `capacity`; `priority >= 0` is never dropped, even over capacity.
pub fn enqueue(
    registry: &mut UserRegistry,
    recipient_sids: &[Sid],
    command: Command,
    capacity: usize,
) {
    for &sid in recipient_sids {
        let Some(user) = registry.lookup_by_sid_mut(sid) else {
            continue;
        };
        if command.priority < 0 && user.send_queue.len() >= capacity {
            continue;
        }
        user.send_queue.push_back(command.clone());
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::registry::user::User;

    fn user(sid: &[u8; 4]) -> User {
        User::new(Sid::parse(sid).unwrap(), Instant::now())
    }

    #[test]
    fn broadcast_reaches_every_logged_in_user() {
        let mut reg = UserRegistry::new();
        reg.insert(user(b"AAAC")).unwrap();
        reg.insert(user(b"AAAD")).unwrap();
        let addressing = Addressing::Broadcast { source: Sid::parse(b"AAAC").unwrap() };
        let mut sids = recipients(&addressing, &reg);
        sids.sort();
        assert_eq!(sids.len(), 2);
    }

    #[test]
    fn direct_reaches_only_the_target() {
        let mut reg = UserRegistry::new();
        reg.insert(user(b"AAAC")).unwrap();
        reg.insert(user(b"AAAD")).unwrap();
        let addressing = Addressing::Direct {
            source: Sid::parse(b"AAAC").unwrap(),
            target: Sid::parse(b"AAAD").unwrap(),
        };
        assert_eq!(recipients(&addressing, &reg), vec![Sid::parse(b"AAAD").unwrap()]);
    }

    #[test]
    fn echo_reaches_target_and_sender() {
        let mut reg = UserRegistry::new();
        reg.insert(user(b"AAAC")).unwrap();
        reg.insert(user(b"AAAD")).unwrap();
        let addressing = Addressing::Echo {
            source: Sid::parse(b"AAAC").unwrap(),
            target: Sid::parse(b"AAAD").unwrap(),
        };
        let sids = recipients(&addressing, &reg);
        assert_eq!(sids.len(), 2);
        assert!(sids.contains(&Sid::parse(b"AAAC").unwrap()));
    }

    #[test]
    fn feature_filter_requires_all_plus_tags_and_no_minus_tags() {
        let mut reg = UserRegistry::new();
        let mut pinger = user(b"AAAC");
        pinger.supported_features.push(*b"PING");
        reg.insert(pinger).unwrap();
        reg.insert(user(b"AAAD")).unwrap();

        let addressing = Addressing::Feature {
            source: Sid::parse(b"AAAC").unwrap(),
            features: vec![crate::models::command::FeatureSpec {
                include: true,
                tag: *b"PING",
            }],
        };
        assert_eq!(recipients(&addressing, &reg), vec![Sid::parse(b"AAAC").unwrap()]);
    }

    #[test]
    fn chat_only_mode_drops_search_for_non_operators() {
        let cmd = Command::new(Name::SCH, Addressing::Broadcast {
            source: Sid::parse(b"AAAC").unwrap(),
        });
        assert!(chat_only_drops(&cmd, Credentials::Guest, true));
        assert!(!chat_only_drops(&cmd, Credentials::Operator, true));
        assert!(!chat_only_drops(&cmd, Credentials::Guest, false));
    }

    #[test]
    fn negative_priority_drops_on_full_queue_positive_never_does() {
        let mut reg = UserRegistry::new();
        reg.insert(user(b"AAAC")).unwrap();
        let sid = Sid::parse(b"AAAC").unwrap();
        reg.lookup_by_sid_mut(sid).unwrap().send_queue.extend(
            std::iter::repeat_with(|| Command::new(Name::STA, Addressing::HubToClient))
                .take(2),
        );

        let mut low_priority = Command::new(Name::SCH, Addressing::Broadcast { source: sid });
        low_priority.priority = -1;
        enqueue(&mut reg, &[sid], low_priority, 2);
        assert_eq!(reg.lookup_by_sid(sid).unwrap().send_queue.len(), 2);

        let important = Command::new(Name::MSG, Addressing::Broadcast { source: sid });
        enqueue(&mut reg, &[sid], important, 2);
        assert_eq!(reg.lookup_by_sid(sid).unwrap().send_queue.len(), 3);
    }
}
