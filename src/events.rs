// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The event queue (C7): a single-threaded deferred-work queue for
//! user-lifecycle transitions. I/O callbacks that would otherwise free a
//! user they still hold a reference to instead enqueue an event here and
//! return; the hub controller drains the queue at each quiescent point,
//! after every callback on the current stack has returned.
//!
//! `UserQuit` is always enqueued strictly before the matching
//! `UserDestroy` for the same SID — the queue is a plain FIFO, so the
//! producer is responsible for enqueueing in that order, and drains
//! preserve it.

use std::collections::VecDeque;

use crate::models::sid::Sid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    Disconnect,
    ProtocolError,
    Kicked,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Emitted after a `BINF` passes validation. `needs_password` routes
    /// the handler into the `verify` state instead of straight to
    /// `normal`.
    UserJoin { sid: Sid, needs_password: bool },
    /// Emitted on logout, kick, protocol error, or handshake timeout.
    UserQuit { sid: Sid, reason: QuitReason },
    /// Emitted strictly after the matching `UserQuit` for the same SID.
    UserDestroy { sid: Sid },
}

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn push_join(&mut self, sid: Sid, needs_password: bool) {
        self.push(Event::UserJoin { sid, needs_password });
    }

    /// Enqueues the quit/destroy pair for `sid` in the order the
    /// ordering invariant requires.
    pub fn push_quit_then_destroy(&mut self, sid: Sid, reason: QuitReason) {
        self.push(Event::UserQuit { sid, reason });
        self.push(Event::UserDestroy { sid });
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
