// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Decodes a single wire line (without its trailing `\n`) into a
//! [`Command`] (§4.1). The codec is total over hostile input: anything
//! that doesn't fit the grammar is rejected with a [`ParseError`], never
//! a panic.

use thiserror::Error;

use crate::models::{
    command::{Addressing, Command, FeatureSpec, split_named},
    escape::unescape,
    opcode::{Code, CodeParseError, Kind},
    sid::{InvalidSid, Sid},
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line exceeds the configured maximum length")]
    TooLong,
    #[error("empty line")]
    Empty,
    #[error("malformed command code: {0}")]
    Code(#[from] CodeParseError),
    #[error("missing addressing argument for a {0} command")]
    MissingAddressingArg(Kind),
    #[error("invalid SID in addressing argument: {0}")]
    Sid(#[from] InvalidSid),
    #[error("source SID does not match the sending connection")]
    SourceMismatch,
    #[error("{0} commands may not be sent by a client")]
    ClientToClientAtHub(Kind),
}

/// Parses one protocol line.
///
/// `max_len` bounds the raw line length before any splitting happens.
/// `sender` is the SID of the connection the line arrived on, if it has
/// one yet (a connection still in the `protocol`/`identify` stages has
/// none) — when present, a command whose addressing carries a source SID
/// must name that same SID, per §4.1's spoofing-prevention rule.
pub fn parse_line(
    line: &[u8],
    max_len: usize,
    sender: Option<Sid>,
) -> Result<Command, ParseError> {
    if line.len() > max_len {
        return Err(ParseError::TooLong);
    }
    let mut tokens = line.split(|&b| b == b' ').filter(|t| !t.is_empty());
    let code_token = tokens.next().ok_or(ParseError::Empty)?;
    let code = Code::parse(code_token)?;

    if matches!(code.kind, Kind::ClientToClient) {
        return Err(ParseError::ClientToClientAtHub(code.kind));
    }

    let addressing = match code.kind {
        Kind::Broadcast => {
            let source = next_sid(&mut tokens, code.kind)?;
            check_source(source, sender)?;
            Addressing::Broadcast { source }
        },
        Kind::Direct | Kind::Echo => {
            let source = next_sid(&mut tokens, code.kind)?;
            check_source(source, sender)?;
            let target = next_sid(&mut tokens, code.kind)?;
            if code.kind == Kind::Direct {
                Addressing::Direct { source, target }
            } else {
                Addressing::Echo { source, target }
            }
        },
        Kind::Feature => {
            let source = next_sid(&mut tokens, code.kind)?;
            check_source(source, sender)?;
            Addressing::Feature {
                source,
                features: Vec::new(),
            }
        },
        Kind::ClientToHub => Addressing::ClientToHub,
        Kind::HubToClient => Addressing::HubToClient,
        Kind::ClientToClient => unreachable!("rejected above"),
    };

    let mut command = Command::new(code.name, addressing);
    let mut tokens = tokens.peekable();

    if let Addressing::Feature { .. } = &command.addressing {
        let mut features = Vec::new();
        while let Some(&token) = tokens.peek() {
            let Ok(s) = std::str::from_utf8(token) else {
                break;
            };
            match FeatureSpec::parse(s) {
                Some(spec) => {
                    features.push(spec);
                    tokens.next();
                },
                None => break,
            }
        }
        command.addressing = match std::mem::replace(
            &mut command.addressing,
            Addressing::ClientToHub,
        ) {
            Addressing::Feature { source, .. } => Addressing::Feature { source, features },
            other => other,
        };
    }

    for token in tokens {
        let text = String::from_utf8_lossy(token);
        match split_named(&text) {
            Some((key, value)) => {
                command.set_named(key, value);
            },
            None => {
                command.push_positional(unescape(&text));
            },
        }
    }

    Ok(command)
}

fn next_sid<'a>(
    tokens: &mut impl Iterator<Item = &'a [u8]>,
    kind: Kind,
) -> Result<Sid, ParseError> {
    let token = tokens.next().ok_or(ParseError::MissingAddressingArg(kind))?;
    Ok(Sid::parse(token)?)
}

fn check_source(source: Sid, sender: Option<Sid>) -> Result<(), ParseError> {
    match sender {
        Some(expected) if expected != source => Err(ParseError::SourceMismatch),
        _ => Ok(()),
    }
}
