// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The in-memory command model (C1). A [`Command`] is the decoded form of
//! one protocol line: a name (`SUP`, `INF`, `MSG`, ...), the addressing
//! data that determines who receives it, and an ordered argument list.
//!
//! Addressing is modeled as a tagged union rather than a single struct
//! with optional `source`/`target`/`features` fields — a broadcast simply
//! has no target to be `None`, it never had one.

use std::cell::RefCell;

use crate::models::{
    escape::{escape, unescape},
    opcode::{Code, Kind, Name},
    sid::Sid,
};

/// A single `+`/`-` prefixed feature tag used by `F`-addressed commands
/// (`FSCH`) to narrow the broadcast to supporting (or explicitly
/// non-supporting) clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub include: bool,
    pub tag: [u8; 4],
}

impl FeatureSpec {
    pub fn parse(arg: &str) -> Option<Self> {
        let bytes = arg.as_bytes();
        if bytes.len() != 5 {
            return None;
        }
        let include = match bytes[0] {
            b'+' => true,
            b'-' => false,
            _ => return None,
        };
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&bytes[1..5]);
        Some(Self { include, tag })
    }

    pub fn to_arg(self) -> String {
        let sign = if self.include { '+' } else { '-' };
        format!("{sign}{}", std::str::from_utf8(&self.tag).unwrap_or("????"))
    }
}

/// Who a command is addressed to, carrying exactly the fields that
/// addressing kind needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// `B..` — every logged-in user, including the sender.
    Broadcast { source: Sid },
    /// `D..` — a single target SID.
    Direct { source: Sid, target: Sid },
    /// `E..` — a single target SID, plus an echo back to the sender.
    Echo { source: Sid, target: Sid },
    /// `F..` — every user matching the feature filter list.
    Feature {
        source: Sid,
        features: Vec<FeatureSpec>,
    },
    /// `H..` — client-to-hub, no addressing arguments.
    ClientToHub,
    /// `I..` — hub-to-client, no addressing arguments.
    HubToClient,
}

impl Addressing {
    pub fn kind(&self) -> Kind {
        match self {
            Addressing::Broadcast { .. } => Kind::Broadcast,
            Addressing::Direct { .. } => Kind::Direct,
            Addressing::Echo { .. } => Kind::Echo,
            Addressing::Feature { .. } => Kind::Feature,
            Addressing::ClientToHub => Kind::ClientToHub,
            Addressing::HubToClient => Kind::HubToClient,
        }
    }

    pub fn source(&self) -> Option<Sid> {
        match self {
            Addressing::Broadcast { source }
            | Addressing::Direct { source, .. }
            | Addressing::Echo { source, .. }
            | Addressing::Feature { source, .. } => Some(*source),
            Addressing::ClientToHub | Addressing::HubToClient => None,
        }
    }

    pub fn target(&self) -> Option<Sid> {
        match self {
            Addressing::Direct { target, .. } | Addressing::Echo { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// A decoded command: name, addressing, and an ordered argument list.
///
/// Positional and named arguments are kept in a single ordered list
/// rather than split into two collections — ADC interleaves them on the
/// wire, and a named argument found twice is a rewrite of the first
/// (§4.1), which an ordered Vec makes easy to implement correctly.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: Name,
    pub addressing: Addressing,
    args: Vec<Arg>,
    /// Higher drops last under send-queue backpressure (C5/C8).
    pub priority: i32,
    serialized: RefCell<Option<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Positional(String),
    Named([u8; 2], String),
}

impl Command {
    pub fn new(name: Name, addressing: Addressing) -> Self {
        Self {
            name,
            addressing,
            args: Vec::new(),
            priority: 0,
            serialized: RefCell::new(None),
        }
    }

    fn touch(&mut self) {
        self.serialized.get_mut().take();
    }

    pub fn push_positional(&mut self, value: impl Into<String>) -> &mut Self {
        self.args.push(Arg::Positional(value.into()));
        self.touch();
        self
    }

    pub fn positionals(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|a| match a {
            Arg::Positional(v) => Some(v.as_str()),
            Arg::Named(..) => None,
        })
    }

    /// Sets a named argument, rewriting the existing occurrence in place
    /// (per §4.1, a repeated key overwrites rather than appends) or
    /// appending if the key is new.
    pub fn set_named(&mut self, key: [u8; 2], value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if let Some(Arg::Named(_, existing)) =
            self.args.iter_mut().find(|a| matches!(a, Arg::Named(k, _) if *k == key))
        {
            *existing = value;
        } else {
            self.args.push(Arg::Named(key, value));
        }
        self.touch();
        self
    }

    pub fn named(&self, key: [u8; 2]) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            Arg::Named(k, v) if *k == key => Some(v.as_str()),
            _ => None,
        })
    }

    /// Serializes to wire bytes (without the trailing `\n`), caching the
    /// result until the next mutating call.
    pub fn to_bytes(&self) -> Vec<u8> {
        if let Some(cached) = self.serialized.borrow().as_ref() {
            return cached.clone();
        }
        let code = Code::new(self.addressing.kind(), self.name);
        let mut out = code.to_string().into_bytes();
        if let Some(source) = self.addressing.source() {
            out.push(b' ');
            out.extend_from_slice(source.as_bytes());
        }
        if let Addressing::Direct { target, .. } | Addressing::Echo { target, .. } =
            &self.addressing
        {
            out.push(b' ');
            out.extend_from_slice(target.as_bytes());
        }
        if let Addressing::Feature { features, .. } = &self.addressing {
            for f in features {
                out.push(b' ');
                out.extend_from_slice(f.to_arg().as_bytes());
            }
        }
        for arg in &self.args {
            out.push(b' ');
            match arg {
                Arg::Positional(v) => out.extend_from_slice(escape(v).as_bytes()),
                Arg::Named(key, v) => {
                    out.extend_from_slice(key);
                    out.extend_from_slice(escape(v).as_bytes());
                },
            }
        }
        *self.serialized.borrow_mut() = Some(out.clone());
        out
    }
}

/// Splits a decoded argument token into a named-argument key/value pair
/// if it matches the `XXvalue` shape (two lowercase letters followed by
/// an escaped value), unescaping the value.
pub fn split_named(token: &str) -> Option<([u8; 2], String)> {
    let bytes = token.as_bytes();
    if bytes.len() < 2 || !bytes[0].is_ascii_alphabetic() || !bytes[1].is_ascii_alphabetic() {
        return None;
    }
    let key = [bytes[0], bytes[1]];
    Some((key, unescape(&token[2..])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_argument_rewrite_overwrites_not_appends() {
        let mut cmd = Command::new(Name::INF, Addressing::Broadcast {
            source: Sid::parse(b"AAAC").unwrap(),
        });
        cmd.set_named(*b"nu", "tester");
        cmd.set_named(*b"nu", "renamed");
        assert_eq!(cmd.named(*b"nu"), Some("renamed"));
        assert_eq!(cmd.to_bytes().windows(2).filter(|w| w == b"nu").count(), 1);
    }

    #[test]
    fn serialization_round_trips_direct_message() {
        let source = Sid::parse(b"AAAC").unwrap();
        let target = Sid::parse(b"AAAD").unwrap();
        let mut cmd = Command::new(Name::MSG, Addressing::Echo { source, target });
        cmd.push_positional("hello world");
        let bytes = cmd.to_bytes();
        assert_eq!(bytes, b"EMSG AAAC AAAD hello\\sworld".to_vec());
    }

    #[test]
    fn feature_spec_parses_sign_and_tag() {
        let spec = FeatureSpec::parse("+TCP4").unwrap();
        assert!(spec.include);
        assert_eq!(&spec.tag, b"TCP4");
        assert_eq!(spec.to_arg(), "+TCP4");
    }

    #[test]
    fn split_named_unescapes_value() {
        let (key, value) = split_named(r"nuJohn\sDoe").unwrap();
        assert_eq!(&key, b"nu");
        assert_eq!(value, "John Doe");
    }

    #[test]
    fn cache_invalidates_on_mutation() {
        let mut cmd = Command::new(Name::STA, Addressing::HubToClient);
        cmd.push_positional("000");
        let first = cmd.to_bytes();
        cmd.push_positional("extra");
        let second = cmd.to_bytes();
        assert_ne!(first, second);
    }
}
