// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The hub controller (C6, §4.6): the single owner of every piece of
//! shared state (registry, allocator, event queue, ACL, config). All
//! mutation happens here, on whichever thread drives the event loop;
//! connection tasks only ever call in and get outbound commands back.

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    acl::Acl,
    cfg::config::Config,
    dispatcher::{CommandDispatcher, NullDispatcher, Relay},
    error::{DisconnectReason, PolicyDenial},
    events::{Event, EventQueue, QuitReason},
    models::{
        command::{Addressing, Command},
        opcode::{Kind, Name},
        parse::parse_line,
        sid::{HubFull, Sid, SidAllocator},
        status::{Status, StatusCode},
    },
    registry::{
        UserRegistry,
        user::{SessionState, User},
    },
    router,
    session::{self, SessionCtx, Transition},
};

/// Per-recipient send-queue cap before negative-priority commands start
/// dropping (§4.8).
const SEND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubStatus {
    Running,
    Disabled,
    Stopped,
}

/// What processing one inbound line produced: commands to write back to
/// the originating connection, and whether the connection must close.
#[derive(Debug, Default)]
pub struct HandleResult {
    pub outbound: Vec<Command>,
    pub disconnect: Option<DisconnectReason>,
}

impl HandleResult {
    fn ok(outbound: Vec<Command>) -> Self {
        Self { outbound, disconnect: None }
    }

    fn close(outbound: Vec<Command>, reason: DisconnectReason) -> Self {
        Self { outbound, disconnect: Some(reason) }
    }
}

pub struct HubController {
    config: Config,
    acl: Acl,
    sids: SidAllocator,
    /// Connections still in `protocol`/`identify`/`verify` — not yet
    /// visible to the router or the registry (§4.4: the registry holds
    /// only logged-in users).
    pending: HashMap<Sid, User>,
    registry: UserRegistry,
    events: EventQueue,
    status: HubStatus,
    dispatcher: Box<dyn CommandDispatcher>,
}

impl HubController {
    pub fn new(config: Config, acl: Acl) -> Self {
        let sids = SidAllocator::new(config.identity.max_users);
        Self {
            config,
            acl,
            sids,
            pending: HashMap::new(),
            registry: UserRegistry::new(),
            events: EventQueue::new(),
            status: HubStatus::Running,
            dispatcher: Box::new(NullDispatcher),
        }
    }

    pub fn set_dispatcher(&mut self, dispatcher: Box<dyn CommandDispatcher>) {
        self.dispatcher = dispatcher;
    }

    pub fn status(&self) -> HubStatus {
        self.status
    }

    pub fn disable(&mut self) {
        self.status = HubStatus::Disabled;
    }

    pub fn enable(&mut self) {
        self.status = HubStatus::Running;
    }

    pub fn shutdown(&mut self) {
        self.status = HubStatus::Stopped;
    }

    pub fn user_count(&self) -> usize {
        self.registry.len()
    }

    pub fn shared_size(&self) -> u64 {
        self.registry.shared_size()
    }

    pub fn shared_files(&self) -> u64 {
        self.registry.shared_files()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reserves a SID and creates handshake-stage state for a freshly
    /// accepted connection. Returns the SID the connection must tag its
    /// outbound frames with once assigned via `ISID`.
    pub fn accept(&mut self) -> Result<Sid, HubFull> {
        let sid = self.sids.acquire()?;
        let deadline = Instant::now() + self.config.auth.handshake_timeout;
        self.pending.insert(sid, User::new(sid, deadline));
        debug!(sid = %sid, "accepted connection");
        Ok(sid)
    }

    /// Drains commands queued for a logged-in user by routing decisions
    /// made while processing other connections' traffic.
    pub fn drain_outbound(&mut self, sid: Sid) -> Vec<Command> {
        self.registry
            .lookup_by_sid_mut(sid)
            .map(|u| u.send_queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Scans handshake-stage connections for an expired deadline. The
    /// caller is responsible for actually closing the returned
    /// connections via `disconnect`.
    pub fn expired_handshakes(&self) -> Vec<Sid> {
        let now = Instant::now();
        self.pending
            .iter()
            .filter(|(_, u)| u.handshake_deadline.is_some_and(|d| now >= d))
            .map(|(sid, _)| *sid)
            .collect()
    }

    /// Removes `sid` from whichever state it is in, releases its SID,
    /// and enqueues the `UserQuit`/`UserDestroy` pair. If the user had
    /// completed login, broadcasts a `QUI` so other clients drop it from
    /// their local state.
    pub fn disconnect(&mut self, sid: Sid, reason: DisconnectReason) {
        let quit_reason = match &reason {
            DisconnectReason::HandshakeTimeout => QuitReason::Timeout,
            DisconnectReason::ClientClosed => QuitReason::Disconnect,
            DisconnectReason::PolicyDenial(_) | DisconnectReason::HandshakeProtocolError(_) => {
                QuitReason::ProtocolError
            },
            DisconnectReason::HubFull(_) | DisconnectReason::Io(_) => QuitReason::Disconnect,
        };

        if self.pending.remove(&sid).is_some() {
            self.sids.release(sid);
            self.events.push_quit_then_destroy(sid, quit_reason);
            return;
        }

        if self.registry.remove(sid).is_some() {
            let mut qui = Command::new(Name::QUI, Addressing::HubToClient);
            qui.push_positional(sid.as_str());
            let recipients = router::recipients(
                &Addressing::Broadcast { source: sid },
                &self.registry,
            );
            router::enqueue(&mut self.registry, &recipients, qui, SEND_QUEUE_CAPACITY);
            self.sids.release(sid);
            self.events.push_quit_then_destroy(sid, quit_reason);
            info!(sid = %sid, "user disconnected");
        }
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain().collect()
    }

    /// Processes one inbound protocol line from `sid`.
    pub fn handle_line(&mut self, sid: Sid, line: &[u8]) -> HandleResult {
        let known_sender = if self.registry.lookup_by_sid(sid).is_some() || self.pending.contains_key(&sid) {
            Some(sid)
        } else {
            None
        };
        let Some(sid) = known_sender else {
            return HandleResult::close(Vec::new(), DisconnectReason::ClientClosed);
        };

        let command = match parse_line(line, self.config.network.max_line_length, Some(sid)) {
            Ok(command) => command,
            Err(err) => {
                if self.registry.lookup_by_sid(sid).is_some() {
                    warn!(sid = %sid, error = %err, "dropping malformed command from logged-in user");
                    return HandleResult::ok(Vec::new());
                }
                return HandleResult::close(
                    vec![Status::from_config(StatusCode::AuthUserNotFound, &self.config).to_command()],
                    DisconnectReason::HandshakeProtocolError(err),
                );
            },
        };

        if self.registry.lookup_by_sid(sid).is_some() {
            return self.handle_logged_in_command(sid, command);
        }

        self.handle_handshake_command(sid, command)
    }

    fn handle_handshake_command(&mut self, sid: Sid, command: Command) -> HandleResult {
        let Some(mut user) = self.pending.remove(&sid) else {
            return HandleResult::close(Vec::new(), DisconnectReason::ClientClosed);
        };

        if self.status == HubStatus::Disabled && user.state == SessionState::Protocol {
            self.events.push_quit_then_destroy(sid, QuitReason::Disconnect);
            self.sids.release(sid);
            return HandleResult::close(
                vec![Status::from_config(StatusCode::HubDisabled, &self.config).to_command()],
                DisconnectReason::PolicyDenial(PolicyDenial::RegisteredUsersOnly),
            );
        }

        if user.state == SessionState::Verify {
            return self.handle_verify_command(sid, user, command);
        }

        let ctx = SessionCtx { config: &self.config, acl: &self.acl, registry: &self.registry };
        let was_protocol = user.state == SessionState::Protocol;
        match session::step(&mut user, &ctx, command) {
            Transition::Continue { mut outbound } => {
                if was_protocol && user.state == SessionState::Identify {
                    self.decorate_hub_info(&mut outbound);
                }
                self.pending.insert(sid, user);
                HandleResult::ok(outbound)
            },
            Transition::LoginComplete { outbound } => self.complete_login(sid, user, outbound),
            Transition::Reject { outbound, reason } => {
                self.sids.release(sid);
                self.events.push_quit_then_destroy(sid, QuitReason::ProtocolError);
                HandleResult::close(outbound, reason)
            },
        }
    }

    /// Fills in the hub-identity fields of the `IINF` the session state
    /// machine sent back as a blank template, the way the source splits
    /// the static `IINF` template from its per-connection decoration.
    fn decorate_hub_info(&self, outbound: &mut [Command]) {
        let Some(iinf) = outbound.last_mut() else { return };
        iinf.set_named(*b"NI", self.config.identity.hub_name.clone());
        iinf.set_named(*b"DE", self.config.identity.description.clone());
        iinf.set_named(*b"UC", self.registry.len().to_string());
    }

    fn handle_verify_command(&mut self, sid: Sid, mut user: User, command: Command) -> HandleResult {
        if command.addressing.kind() != Kind::ClientToHub || command.name != Name::PAS {
            self.pending.insert(sid, user);
            return HandleResult::ok(vec![
                Status::from_config(StatusCode::AuthInvalidPassword, &self.config).to_command(),
            ]);
        }
        let Some(response) = command.positionals().next() else {
            self.pending.insert(sid, user);
            return HandleResult::ok(vec![
                Status::from_config(StatusCode::AuthInvalidPassword, &self.config).to_command(),
            ]);
        };

        let nick = user.nick.clone().unwrap_or_default();
        let account = self.acl.account_for_nick(&nick).cloned();
        let verified = match (&account, user.pending_challenge) {
            (Some(account), Some(challenge)) => account
                .password
                .as_deref()
                .is_some_and(|password| session::verify_password(&challenge, password.as_bytes(), response)),
            _ => false,
        };

        if !verified {
            self.sids.release(sid);
            self.events.push_quit_then_destroy(sid, QuitReason::ProtocolError);
            return HandleResult::close(
                vec![Status::from_config(StatusCode::AuthInvalidPassword, &self.config).to_command()],
                DisconnectReason::PolicyDenial(PolicyDenial::InvalidPassword),
            );
        }

        user.enter_normal();
        self.complete_login(sid, user, Vec::new())
    }

    fn complete_login(&mut self, sid: Sid, user: User, mut outbound: Vec<Command>) -> HandleResult {
        if self.config.show_banner {
            outbound.push(self.banner());
        }

        let binf = Self::build_binf(&user);
        match self.registry.insert(user) {
            Ok(()) => {
                self.events.push_join(sid, false);
                let recipients = router::recipients(&binf.addressing, &self.registry);
                router::enqueue(&mut self.registry, &recipients, binf, SEND_QUEUE_CAPACITY);
                info!(sid = %sid, "login complete");
                HandleResult::ok(outbound)
            },
            Err((_user, err)) => {
                self.sids.release(sid);
                self.events.push_quit_then_destroy(sid, QuitReason::ProtocolError);
                HandleResult::close(
                    vec![
                        Status::from_config(Self::status_for_registry_error(&err), &self.config)
                            .to_command(),
                    ],
                    DisconnectReason::PolicyDenial(err.into()),
                )
            },
        }
    }

    fn status_for_registry_error(err: &crate::registry::RegistryError) -> StatusCode {
        match err {
            crate::registry::RegistryError::NickTaken => StatusCode::NickTaken,
            crate::registry::RegistryError::CidTaken => StatusCode::CidTaken,
        }
    }

    fn build_binf(user: &User) -> Command {
        let mut binf = Command::new(Name::INF, Addressing::Broadcast { source: user.sid });
        if let Some(nick) = &user.nick {
            binf.set_named(*b"NI", nick.clone());
        }
        binf.set_named(*b"SS", user.shared_size.to_string());
        binf.set_named(*b"SL", user.slots.to_string());
        binf
    }

    fn banner(&self) -> Command {
        let message = self
            .config
            .status_messages
            .get("100")
            .cloned()
            .unwrap_or_else(|| format!("Powered by {} (adc-hub)", self.config.identity.hub_name));
        Status::new(StatusCode::Banner).with_message(message).to_command()
    }

    fn handle_logged_in_command(&mut self, sid: Sid, command: Command) -> HandleResult {
        let Some(user) = self.registry.lookup_by_sid(sid) else {
            return HandleResult::close(Vec::new(), DisconnectReason::ClientClosed);
        };
        let credentials = user.credentials;

        if command.name == Name::QUI && command.addressing.kind() == Kind::ClientToHub {
            return HandleResult::close(Vec::new(), DisconnectReason::ClientClosed);
        }

        if command.name == Name::INF && command.addressing.kind() == Kind::Broadcast {
            if let Err(err) = self.validate_info_update(sid, &command) {
                return HandleResult::ok(vec![Status::from_config(err, &self.config).to_command()]);
            }
            self.apply_info_update(sid, &command);
        }

        if router::chat_only_drops(&command, credentials, self.config.chat_only) {
            return HandleResult::ok(Vec::new());
        }

        if command.name == Name::MSG
            && let Some(text) = command.positionals().next()
            && (text.starts_with('!') || text.starts_with('+'))
            && self.dispatcher.dispatch(sid, text) == Relay::Consume
        {
            return HandleResult::ok(Vec::new());
        }

        let recipients = router::recipients(&command.addressing, &self.registry);
        router::enqueue(&mut self.registry, &recipients, command, SEND_QUEUE_CAPACITY);
        HandleResult::ok(Vec::new())
    }

    /// Re-validates a `BINF` sent while already `Normal` (§4.3): `ID`/`PD`
    /// are immutable post-login, and a nick change must still pass the
    /// uniqueness check.
    fn validate_info_update(&self, sid: Sid, command: &Command) -> Result<(), StatusCode> {
        if command.named(*b"ID").is_some() || command.named(*b"PD").is_some() {
            return Err(StatusCode::CidInvalid);
        }
        if let Some(new_nick) = command.named(*b"NI")
            && let Some(existing) = self.registry.lookup_by_nick(new_nick)
            && existing.sid != sid
        {
            return Err(StatusCode::NickTaken);
        }
        Ok(())
    }

    fn apply_info_update(&mut self, sid: Sid, command: &Command) {
        let Some(user) = self.registry.lookup_by_sid_mut(sid) else { return };
        if let Some(ss) = command.named(*b"SS").and_then(|v| v.parse().ok()) {
            user.shared_size = ss;
        }
        if let Some(sl) = command.named(*b"SL").and_then(|v| v.parse().ok()) {
            user.slots = sl;
        }
    }

    /// `Router::kick` per the uhub reference's `on_kick`: stays
    /// unimplemented, logged and reported rather than silently ignored.
    pub fn kick(&mut self, _operator: Sid, _target_nick: &str) -> Result<(), &'static str> {
        warn!("kick requested but not implemented");
        Err("kick is not implemented")
    }

    /// `HCHK` active-check path: the uhub reference's `hub_send_autocheck`
    /// is an empty function body; this keeps the same no-op, logging the
    /// parsed port/token without ever emitting a UDP reply.
    pub fn handle_hchk(&self, sid: Sid, port: u16, token: &str) {
        debug!(sid = %sid, port, token, "HCHK received, active-check path is a no-op");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 39-character placeholder CID, distinct per `seed` byte.
    fn cid(seed: u8) -> String {
        char::from(b'2' + (seed % 6)).to_string().repeat(39)
    }

    fn config() -> Config {
        use crate::cfg::config::{
            Auth, HubCountBounds, Identity, Limits, Motd, Network, ShareBounds, SlotBounds,
        };
        Config {
            network: Network {
                bind_addr: "0.0.0.0:1511".parse().unwrap(),
                udp_bind_addr: None,
                backlog: 128,
                max_line_length: 65536,
            },
            identity: Identity {
                hub_name: "TestHub".to_string(),
                description: "a test hub".to_string(),
                max_users: 16,
                max_nick_length: 32,
            },
            limits: Limits {
                guest_share: ShareBounds { min_mib: 0, max_mib: 0 },
                registered_share: ShareBounds { min_mib: 0, max_mib: 0 },
                guest_slots: SlotBounds { min: 0, max: 1000 },
                registered_slots: SlotBounds { min: 0, max: 1000 },
                guest_hubs: HubCountBounds { min: 0, max: 10 },
                registered_hubs: HubCountBounds { min: 0, max: 10 },
            },
            auth: Auth { allow_guests: true, handshake_timeout: std::time::Duration::from_secs(30) },
            motd: Motd::default(),
            chat_only: false,
            show_banner: false,
            status_messages: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn full_handshake_completes_guest_login() {
        let mut hub = HubController::new(config(), Acl::default());
        let sid = hub.accept().unwrap();

        let result = hub.handle_line(sid, b"HSUP ADBASE");
        assert!(result.disconnect.is_none());
        assert_eq!(result.outbound.len(), 3);

        let binf = format!("BINF {} ID{} NIguest1 SS0 SL0", sid.as_str(), cid(1));
        let result = hub.handle_line(sid, binf.as_bytes());
        assert!(result.disconnect.is_none());
        assert_eq!(hub.user_count(), 1);
    }

    #[test]
    fn duplicate_nick_is_rejected_during_identify() {
        let mut hub = HubController::new(config(), Acl::default());
        let first = hub.accept().unwrap();
        hub.handle_line(first, b"HSUP ADBASE");
        let binf = format!("BINF {} ID{} NIalice SS0 SL0", first.as_str(), cid(1));
        hub.handle_line(first, binf.as_bytes());

        let second = hub.accept().unwrap();
        hub.handle_line(second, b"HSUP ADBASE");
        let binf2 = format!("BINF {} ID{} NIalice SS0 SL0", second.as_str(), cid(2));
        let result = hub.handle_line(second, binf2.as_bytes());
        assert!(result.disconnect.is_some());
        assert_eq!(hub.user_count(), 1);
    }

    #[test]
    fn hub_disabled_rejects_new_handshakes() {
        let mut hub = HubController::new(config(), Acl::default());
        hub.disable();
        let sid = hub.accept().unwrap();
        let result = hub.handle_line(sid, b"HSUP ADBASE");
        assert!(result.disconnect.is_some());
    }
}
