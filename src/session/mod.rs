// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The session state machine (C4, §4.3): the per-connection login
//! protocol, `protocol → identify → verify → normal`. Everything after
//! `normal` is the router's job (C5); this module only walks a
//! connection through the handshake and rejects it at the first
//! violation.
//!
//! A structural value (`Transition`) describes what `step` decided,
//! mirroring the source's finite-state dispatch without threading a
//! process-wide hub pointer through every call (§9 Design Notes) — the
//! caller passes a [`SessionCtx`] borrow explicitly instead.

use std::collections::HashSet;

use sha2::{Digest as _, Sha256};

use crate::{
    acl::{Acl, BanStatus},
    cfg::{config::Config, enums::Credentials},
    error::{DisconnectReason, PolicyDenial},
    models::{
        command::{Addressing, Command},
        opcode::{Kind, Name},
        status::{DiagnosticFlag, Status, StatusCode},
    },
    registry::{UserRegistry, user::SessionState},
    utils,
};

/// What `step` produced: zero or more commands to send back to the
/// connection, plus whatever the caller must additionally do once the
/// state machine has run (§4.7's event-queue handoff).
pub enum Transition {
    /// Stay in the same or a later handshake state; `user.state` already
    /// reflects the new state. Send `outbound` to the connection.
    Continue { outbound: Vec<Command> },
    /// `user.state` is now `Normal`. The caller must insert the user
    /// into the registry, broadcast its `BINF`, and enqueue
    /// `Event::UserJoin`.
    LoginComplete { outbound: Vec<Command> },
    /// Validation failed; `outbound` (typically one `ISTA`) must be sent
    /// before the connection is closed.
    Reject { outbound: Vec<Command>, reason: DisconnectReason },
}

/// Borrowed hub state needed to validate a handshake step. Read-only —
/// `step` never mutates the registry; insertion happens in the caller
/// once `Transition::LoginComplete` is observed.
pub struct SessionCtx<'a> {
    pub config: &'a Config,
    pub acl: &'a Acl,
    pub registry: &'a UserRegistry,
}

/// Runs one inbound command through the handshake state machine for
/// `user`, which must not yet be in `Normal` state.
pub fn step(
    user: &mut crate::registry::user::User,
    ctx: &SessionCtx<'_>,
    command: Command,
) -> Transition {
    match user.state {
        SessionState::Protocol => handle_protocol(user, ctx, command),
        SessionState::Identify => handle_identify(user, ctx, command),
        SessionState::Verify => {
            unreachable!("hub.rs intercepts Verify-state users before calling step()")
        },
        SessionState::Normal | SessionState::Cleanup => {
            unreachable!("step() is only called for handshake states")
        },
    }
}

fn reject(reason: DisconnectReason, status: Status) -> Transition {
    Transition::Reject { outbound: vec![status.to_command()], reason }
}

fn handle_protocol(
    user: &mut crate::registry::user::User,
    ctx: &SessionCtx<'_>,
    command: Command,
) -> Transition {
    if command.addressing.kind() != Kind::ClientToHub || command.name != Name::SUP {
        return reject(
            DisconnectReason::PolicyDenial(PolicyDenial::InvalidNick(
                "expected HSUP before any other command",
            )),
            Status::from_config(StatusCode::AuthUserNotFound, ctx.config),
        );
    }

    let mut features: HashSet<[u8; 4]> = HashSet::new();
    for token in command.positionals() {
        let bytes = token.as_bytes();
        if bytes.len() != 6 {
            return reject(
                DisconnectReason::PolicyDenial(PolicyDenial::InvalidNick(
                    "malformed HSUP feature token",
                )),
                Status::from_config(StatusCode::AuthUserNotFound, ctx.config),
            );
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&bytes[2..6]);
        match &bytes[0..2] {
            b"AD" => {
                features.insert(tag);
            },
            b"RM" => {
                features.remove(&tag);
            },
            _ => {
                return reject(
                    DisconnectReason::PolicyDenial(PolicyDenial::InvalidNick(
                        "HSUP token is neither AD nor RM",
                    )),
                    Status::from_config(StatusCode::AuthUserNotFound, ctx.config),
                );
            },
        }
    }

    if features.is_empty() || !features.contains(b"BASE") {
        return reject(
            DisconnectReason::PolicyDenial(PolicyDenial::InvalidNick(
                "HSUP must assert at least BASE",
            )),
            Status::from_config(StatusCode::AuthUserNotFound, ctx.config),
        );
    }

    user.supported_features = features.iter().copied().collect();
    if user.supports(b"PING") {
        user.flags.insert(crate::registry::user::UserFlags::FEATURE_PING);
    }
    user.state = SessionState::Identify;

    let mut outbound = Vec::with_capacity(3);

    let mut isup = Command::new(Name::SUP, Addressing::HubToClient);
    for tag in &user.supported_features {
        isup.push_positional(format!("AD{}", String::from_utf8_lossy(tag)));
    }
    outbound.push(isup);

    let mut isid = Command::new(Name::SID, Addressing::HubToClient);
    isid.push_positional(user.sid.as_str());
    outbound.push(isid);

    outbound.push(Command::new(Name::INF, Addressing::HubToClient));

    Transition::Continue { outbound }
}

fn handle_identify(
    user: &mut crate::registry::user::User,
    ctx: &SessionCtx<'_>,
    command: Command,
) -> Transition {
    if command.addressing.kind() != Kind::Broadcast || command.name != Name::INF {
        return reject(
            DisconnectReason::PolicyDenial(PolicyDenial::InvalidNick(
                "expected BINF during identify",
            )),
            Status::from_config(StatusCode::AuthUserNotFound, ctx.config),
        );
    }
    if command.addressing.source() != Some(user.sid) {
        return reject(
            DisconnectReason::PolicyDenial(PolicyDenial::InvalidNick(
                "BINF source SID does not match this connection",
            )),
            Status::from_config(StatusCode::AuthUserNotFound, ctx.config),
        );
    }

    if let Err((reason, status)) = validate_identify_fields(user, ctx, &command) {
        return reject(DisconnectReason::PolicyDenial(reason), status);
    }

    let nick = command.named(*b"NI").expect("validated above").to_string();
    let cid_text = command.named(*b"ID").expect("validated above");
    let mut cid = [0u8; 39];
    cid.copy_from_slice(cid_text.as_bytes());

    user.nick = Some(nick.clone());
    user.cid = Some(cid);
    user.shared_size = command.named(*b"SS").and_then(|v| v.parse().ok()).unwrap_or(0);
    user.slots = command.named(*b"SL").and_then(|v| v.parse().ok()).unwrap_or(0);

    match ctx.acl.account_for_nick(&nick) {
        Some(account) if account.password.is_some() => {
            user.state = SessionState::Verify;
            user.pending_challenge = Some(utils::generate_challenge());
            user.credentials = account.credentials;
            let mut igpa = Command::new(Name::GPA, Addressing::HubToClient);
            igpa.push_positional(utils::encode_base32(
                &user.pending_challenge.expect("just set"),
            ));
            Transition::Continue { outbound: vec![igpa] }
        },
        Some(account) => {
            user.credentials = account.credentials;
            user.enter_normal();
            Transition::LoginComplete { outbound: Vec::new() }
        },
        None if ctx.config.auth.allow_guests => {
            user.credentials = Credentials::Guest;
            user.enter_normal();
            Transition::LoginComplete { outbound: Vec::new() }
        },
        None => reject(
            DisconnectReason::PolicyDenial(PolicyDenial::RegisteredUsersOnly),
            Status::from_config(StatusCode::RegisteredUsersOnly, ctx.config),
        ),
    }
}

fn validate_identify_fields(
    user: &crate::registry::user::User,
    ctx: &SessionCtx<'_>,
    command: &Command,
) -> Result<(), (PolicyDenial, Status)> {
    let nick = command.named(*b"NI").ok_or_else(|| {
        (
            PolicyDenial::InvalidNick("missing NI"),
            Status::from_config(StatusCode::NickMissing, ctx.config),
        )
    })?;
    if nick.is_empty()
        || nick.len() > ctx.config.identity.max_nick_length
        || nick.contains(' ')
        || nick.chars().any(|c| c.is_control())
    {
        return Err((
            PolicyDenial::InvalidNick("nick fails basic validation"),
            Status::from_config(StatusCode::NickInvalid, ctx.config)
                .with_flag(DiagnosticFlag::BadField(*b"NI")),
        ));
    }
    if ctx.acl.is_nick_restricted(nick) {
        return Err((
            PolicyDenial::InvalidNick("nick is restricted"),
            Status::from_config(StatusCode::NickInvalid, ctx.config)
                .with_flag(DiagnosticFlag::BadField(*b"NI")),
        ));
    }
    if let Some(ban) = ctx.acl.ban_status(nick) {
        let status = match ban {
            BanStatus::Permanent => Status::from_config(StatusCode::BanPermanent, ctx.config),
            BanStatus::Temporary { secs_remaining } => {
                Status::from_config(StatusCode::BanTemporary, ctx.config)
                    .with_flag(DiagnosticFlag::TimeLimit(secs_remaining))
            },
        };
        return Err((PolicyDenial::InvalidNick("nick is banned"), status));
    }
    if ctx.registry.lookup_by_nick(nick).is_some() {
        return Err((
            PolicyDenial::NickTaken,
            Status::from_config(StatusCode::NickTaken, ctx.config),
        ));
    }

    let cid = command.named(*b"ID").ok_or_else(|| {
        (
            PolicyDenial::InvalidCid,
            Status::from_config(StatusCode::CidMissing, ctx.config),
        )
    })?;
    if cid.len() != 39 {
        return Err((
            PolicyDenial::InvalidCid,
            Status::from_config(StatusCode::CidInvalid, ctx.config)
                .with_flag(DiagnosticFlag::BadField(*b"ID")),
        ));
    }
    let mut cid_bytes = [0u8; 39];
    cid_bytes.copy_from_slice(cid.as_bytes());
    if ctx.registry.lookup_by_cid(&cid_bytes).is_some() {
        return Err((
            PolicyDenial::CidTaken,
            Status::from_config(StatusCode::CidTaken, ctx.config),
        ));
    }

    if let Some(pid) = command.named(*b"PD") {
        let pid_bytes = utils::decode_base32(pid).ok_or_else(|| {
            (
                PolicyDenial::InvalidPid,
                Status::from_config(StatusCode::PidInvalid, ctx.config)
                    .with_flag(DiagnosticFlag::BadField(*b"PD")),
            )
        })?;
        if cid_from_pid(&pid_bytes) != *cid {
            return Err((
                PolicyDenial::InvalidPid,
                Status::from_config(StatusCode::PidInvalid, ctx.config)
                    .with_flag(DiagnosticFlag::BadField(*b"PD")),
            ));
        }
    }

    let class = if ctx.acl.account_for_nick(nick).is_some() {
        &ctx.config.limits.registered_share
    } else {
        &ctx.config.limits.guest_share
    };
    let share_size: u64 = command
        .named(*b"SS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if share_size < class.min_bytes() || (class.max_bytes() > 0 && share_size > class.max_bytes())
    {
        return Err((
            PolicyDenial::ShareSizeOutOfBounds,
            Status::from_config(StatusCode::ShareSizeLow, ctx.config)
                .with_flag(DiagnosticFlag::BadField(*b"SS")),
        ));
    }

    let slot_bounds = if ctx.acl.account_for_nick(nick).is_some() {
        &ctx.config.limits.registered_slots
    } else {
        &ctx.config.limits.guest_slots
    };
    let slots: u32 = command.named(*b"SL").and_then(|v| v.parse().ok()).unwrap_or(0);
    if slots < slot_bounds.min || slots > slot_bounds.max {
        return Err((
            PolicyDenial::SlotsOutOfBounds,
            Status::from_config(StatusCode::SlotsLow, ctx.config)
                .with_flag(DiagnosticFlag::BadField(*b"SL")),
        ));
    }

    let hub_bounds = if ctx.acl.account_for_nick(nick).is_some() {
        &ctx.config.limits.registered_hubs
    } else {
        &ctx.config.limits.guest_hubs
    };
    let hn: u32 = command.named(*b"HN").and_then(|v| v.parse().ok()).unwrap_or(0);
    let hr: u32 = command.named(*b"HR").and_then(|v| v.parse().ok()).unwrap_or(0);
    let ho: u32 = command.named(*b"HO").and_then(|v| v.parse().ok()).unwrap_or(0);
    let total = hn + hr + ho;
    if total < hub_bounds.min || total > hub_bounds.max {
        return Err((
            PolicyDenial::HubCountOutOfBounds,
            Status::from_config(StatusCode::HubLimitLow, ctx.config),
        ));
    }

    let _ = user;
    Ok(())
}

/// Verifies an `HPAS` response against the account secret. `hub.rs` owns
/// the whole Verify-state handshake step directly (it needs the ACL
/// account lookup and `pending_challenge`, neither of which `step`'s
/// per-command dispatch is set up to carry), so this is called straight
/// from `HubController::handle_verify_command` rather than through `step`.
pub fn verify_password(challenge: &[u8; 24], password: &[u8], response_b32: &str) -> bool {
    let Some(response) = utils::decode_base32(response_b32) else {
        return false;
    };
    let expected = utils::expected_password_response(password, challenge);
    utils::constant_time_eq(&response, &expected)
}

fn cid_from_pid(pid: &[u8]) -> [u8; 39] {
    let mut hasher = Sha256::new();
    hasher.update(pid);
    let digest = hasher.finalize();
    let encoded = utils::encode_base32(&digest[..24]);
    let mut out = [b'A'; 39];
    let bytes = encoded.as_bytes();
    out[..bytes.len().min(39)].copy_from_slice(&bytes[..bytes.len().min(39)]);
    out
}
