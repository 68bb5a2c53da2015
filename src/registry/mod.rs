// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The user registry (C3, §4.4): three synchronized indexes over the set
//! of connected users, plus the `shared_size`/`shared_files` aggregates.
//!
//! All mutation happens on the event-loop thread (§5), so the indexes
//! are plain `HashMap`s rather than a concurrent map — there is exactly
//! one writer and it never yields mid-mutation.

pub mod user;

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    models::sid::Sid,
    registry::user::User,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("nick already in use")]
    NickTaken,
    #[error("cid already in use")]
    CidTaken,
}

#[derive(Debug, Default)]
pub struct UserRegistry {
    by_sid: HashMap<Sid, User>,
    /// Insertion order, used by `iter()` (§4.4).
    order: Vec<Sid>,
    by_nick: HashMap<String, Sid>,
    by_cid: HashMap<[u8; 39], Sid>,
    shared_size: u64,
    shared_files: u64,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_sid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sid.is_empty()
    }

    pub fn shared_size(&self) -> u64 {
        self.shared_size
    }

    pub fn shared_files(&self) -> u64 {
        self.shared_files
    }

    /// Validates `user` against all three uniqueness indexes before
    /// inserting. On conflict, `user` is returned unchanged alongside the
    /// error so the caller can still build a rejection status from it.
    pub fn insert(&mut self, user: User) -> Result<(), (User, RegistryError)> {
        if let Some(nick) = &user.nick
            && self.by_nick.contains_key(nick)
        {
            return Err((user, RegistryError::NickTaken));
        }
        if let Some(cid) = &user.cid
            && self.by_cid.contains_key(cid)
        {
            return Err((user, RegistryError::CidTaken));
        }

        if let Some(nick) = &user.nick {
            self.by_nick.insert(nick.clone(), user.sid);
        }
        if let Some(cid) = &user.cid {
            self.by_cid.insert(*cid, user.sid);
        }
        self.shared_size += user.shared_size;
        self.shared_files += user.shared_files as u64;
        self.order.push(user.sid);
        self.by_sid.insert(user.sid, user);
        Ok(())
    }

    /// Removes the user with `sid` from all indexes and updates the
    /// aggregates. Does not return the SID to the allocator — that is
    /// the caller's responsibility once it has finished with the
    /// removed `User` (see `events::Event::UserDestroy`).
    pub fn remove(&mut self, sid: Sid) -> Option<User> {
        let user = self.by_sid.remove(&sid)?;
        if let Some(nick) = &user.nick {
            self.by_nick.remove(nick);
        }
        if let Some(cid) = &user.cid {
            self.by_cid.remove(cid);
        }
        self.shared_size -= user.shared_size;
        self.shared_files -= user.shared_files as u64;
        self.order.retain(|s| *s != sid);
        Some(user)
    }

    pub fn lookup_by_sid(&self, sid: Sid) -> Option<&User> {
        self.by_sid.get(&sid)
    }

    pub fn lookup_by_sid_mut(&mut self, sid: Sid) -> Option<&mut User> {
        self.by_sid.get_mut(&sid)
    }

    pub fn lookup_by_nick(&self, nick: &str) -> Option<&User> {
        self.by_nick.get(nick).and_then(|sid| self.by_sid.get(sid))
    }

    pub fn lookup_by_cid(&self, cid: &[u8; 39]) -> Option<&User> {
        self.by_cid.get(cid).and_then(|sid| self.by_sid.get(sid))
    }

    /// Traverses users in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.order.iter().filter_map(|sid| self.by_sid.get(sid))
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    fn user(sid: &[u8; 4], nick: &str, cid: [u8; 39]) -> User {
        let mut u = User::new(Sid::parse(sid).unwrap(), Instant::now());
        u.nick = Some(nick.to_string());
        u.cid = Some(cid);
        u
    }

    #[test]
    fn rejects_duplicate_nick() {
        let mut reg = UserRegistry::new();
        reg.insert(user(b"AAAC", "alice", [1u8; 39])).unwrap();
        let err = reg.insert(user(b"AAAD", "alice", [2u8; 39])).unwrap_err().1;
        assert_eq!(err, RegistryError::NickTaken);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn rejects_duplicate_cid() {
        let mut reg = UserRegistry::new();
        reg.insert(user(b"AAAC", "alice", [1u8; 39])).unwrap();
        let err = reg.insert(user(b"AAAD", "bob", [1u8; 39])).unwrap_err().1;
        assert_eq!(err, RegistryError::CidTaken);
    }

    #[test]
    fn remove_updates_aggregates_and_all_indexes() {
        let mut reg = UserRegistry::new();
        let mut u = user(b"AAAC", "alice", [1u8; 39]);
        u.shared_size = 1000;
        u.shared_files = 5;
        reg.insert(u).unwrap();
        assert_eq!(reg.shared_size(), 1000);

        let removed = reg.remove(Sid::parse(b"AAAC").unwrap()).unwrap();
        assert_eq!(removed.nick.as_deref(), Some("alice"));
        assert_eq!(reg.shared_size(), 0);
        assert!(reg.lookup_by_nick("alice").is_none());
        assert!(reg.lookup_by_cid(&[1u8; 39]).is_none());
    }

    #[test]
    fn iter_preserves_insertion_order() {
        let mut reg = UserRegistry::new();
        reg.insert(user(b"AAAD", "bob", [2u8; 39])).unwrap();
        reg.insert(user(b"AAAC", "alice", [1u8; 39])).unwrap();
        let nicks: Vec<_> =
            reg.iter().map(|u| u.nick.clone().unwrap()).collect();
        assert_eq!(nicks, vec!["bob", "alice"]);
    }
}
