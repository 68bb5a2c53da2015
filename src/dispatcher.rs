// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The in-band operator command interpreter (§4.5, an external
//! collaborator per §1). Chat messages beginning with `!` or `+` are
//! handed to it before routing; it decides whether the message should
//! still be relayed to its recipients.

use crate::models::sid::Sid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    /// The command was fully handled; do not route the original chat
    /// message.
    Consume,
    /// Not a command this dispatcher recognizes; route normally.
    Relay,
}

pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, sender: Sid, text: &str) -> Relay;
}

/// Default dispatcher: no in-band commands are implemented, so every
/// `!`/`+`-prefixed chat message is still relayed. A hub embedding real
/// operator commands (`!kick`, `!ban`, ...) provides its own
/// [`CommandDispatcher`].
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl CommandDispatcher for NullDispatcher {
    fn dispatch(&self, _sender: Sid, _text: &str) -> Relay {
        Relay::Relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_dispatcher_always_relays() {
        let dispatcher = NullDispatcher;
        let sid = Sid::parse(b"AAAC").unwrap();
        assert_eq!(dispatcher.dispatch(sid, "!kick alice"), Relay::Relay);
    }
}
