// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy (§7). Protocol errors during handshake and policy
//! denials both end the connection; protocol errors after login are
//! logged and the offending command is dropped, the connection stays up.

use thiserror::Error;

use crate::{
    models::{parse::ParseError, sid::HubFull},
    registry::RegistryError,
};

/// What a handler decided should happen to the connection after
/// processing one inbound line. Mirrors the signed-result convention in
/// the source: the connection is torn down or it isn't, and the error
/// never unwinds past the call site that raised it.
#[derive(Debug)]
pub enum Outcome {
    Continue,
    Disconnect(DisconnectReason),
}

#[derive(Debug, Error)]
pub enum DisconnectReason {
    #[error("malformed line during handshake: {0}")]
    HandshakeProtocolError(#[from] ParseError),
    #[error("policy denial: {0}")]
    PolicyDenial(#[from] PolicyDenial),
    #[error("hub is full")]
    HubFull(#[from] HubFull),
    #[error("handshake did not complete within the configured timeout")]
    HandshakeTimeout,
    #[error("client closed the connection")]
    ClientClosed,
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),
}

/// Policy denials carry enough detail to build the `ISTA` sent before
/// disconnecting (§7).
#[derive(Debug, Error)]
pub enum PolicyDenial {
    #[error("nick already in use")]
    NickTaken,
    #[error("cid already in use")]
    CidTaken,
    #[error("nick failed validation: {0}")]
    InvalidNick(&'static str),
    #[error("cid is not 39 base-32 characters")]
    InvalidCid,
    #[error("pid does not hash to the declared cid")]
    InvalidPid,
    #[error("share size outside the configured bounds")]
    ShareSizeOutOfBounds,
    #[error("slot count outside the configured bounds")]
    SlotsOutOfBounds,
    #[error("hub count outside the configured bounds")]
    HubCountOutOfBounds,
    #[error("registered users only")]
    RegisteredUsersOnly,
    #[error("incorrect password response")]
    InvalidPassword,
}

impl From<RegistryError> for PolicyDenial {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NickTaken => PolicyDenial::NickTaken,
            RegistryError::CidTaken => PolicyDenial::CidTaken,
        }
    }
}
