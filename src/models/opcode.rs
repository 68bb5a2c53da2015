// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Helpers for encoding / decoding the four-byte command code that leads
//! every ADC protocol line.
//!
//! ```text
//! B I N F   s i d   a r g ...
//! ^
//! first byte selects the addressing *kind*; the remaining three bytes
//! name the command itself (SUP, SID, INF, MSG, ...).
//! ```

use core::fmt;
use std::convert::TryFrom;

use thiserror::Error;

/// Addressing kind carried by the first byte of a command code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `B` — broadcast to every logged-in user.
    Broadcast,
    /// `D` — direct, to a single target SID.
    Direct,
    /// `E` — echoed direct: target plus a copy back to the sender.
    Echo,
    /// `F` — feature-filtered broadcast.
    Feature,
    /// `H` — client-to-hub.
    ClientToHub,
    /// `I` — hub-to-client.
    HubToClient,
    /// `C` — client-to-client in a peer context; never accepted at hub
    /// ingress.
    ClientToClient,
}

impl Kind {
    #[inline]
    pub const fn letter(self) -> u8 {
        match self {
            Kind::Broadcast => b'B',
            Kind::Direct => b'D',
            Kind::Echo => b'E',
            Kind::Feature => b'F',
            Kind::ClientToHub => b'H',
            Kind::HubToClient => b'I',
            Kind::ClientToClient => b'C',
        }
    }

    /// Number of fixed addressing arguments that precede the free-form
    /// argument list for this kind (source SID, target SID, feature list).
    #[inline]
    pub const fn fixed_arg_count(self) -> usize {
        match self {
            Kind::Broadcast => 1,
            Kind::Direct | Kind::Echo => 2,
            Kind::Feature => 2,
            Kind::ClientToHub | Kind::HubToClient | Kind::ClientToClient => 0,
        }
    }
}

/// Returned when the first byte of a command code is not a known
/// addressing-kind letter.
#[derive(Debug, Error)]
#[error("invalid command kind letter: {0:?}")]
pub struct UnknownKind(pub u8);

impl TryFrom<u8> for Kind {
    type Error = UnknownKind;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            b'B' => Kind::Broadcast,
            b'D' => Kind::Direct,
            b'E' => Kind::Echo,
            b'F' => Kind::Feature,
            b'H' => Kind::ClientToHub,
            b'I' => Kind::HubToClient,
            b'C' => Kind::ClientToClient,
            other => return Err(UnknownKind(other)),
        })
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Broadcast => "broadcast",
            Kind::Direct => "direct",
            Kind::Echo => "echo",
            Kind::Feature => "feature",
            Kind::ClientToHub => "client-to-hub",
            Kind::HubToClient => "hub-to-client",
            Kind::ClientToClient => "client-to-client",
        })
    }
}

/// The three-letter command name following the kind byte (`SUP`, `INF`,
/// `MSG`, ...). Kept as raw bytes rather than a closed enum: ADC lets
/// implementations define extension commands, and the codec must stay
/// total over well-formed input it doesn't recognize.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Name(pub [u8; 3]);

macro_rules! known_names {
    ($($konst:ident => $bytes:expr),* $(,)?) => {
        impl Name {
            $(pub const $konst: Name = Name(*$bytes);)*
        }
    };
}

known_names! {
    SUP => b"SUP",
    SID => b"SID",
    INF => b"INF",
    MSG => b"MSG",
    SCH => b"SCH",
    RES => b"RES",
    RCM => b"RCM",
    CTM => b"CTM",
    PAS => b"PAS",
    GPA => b"GPA",
    STA => b"STA",
    QUI => b"QUI",
    CHK => b"CHK",
}

impl Name {
    pub fn as_str(&self) -> &str {
        // ADC command names are always ASCII letters; this cannot fail for
        // anything that made it through `parse_line`.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full four-byte command code: kind letter plus three-letter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code {
    pub kind: Kind,
    pub name: Name,
}

impl Code {
    pub fn new(kind: Kind, name: Name) -> Self {
        Self { kind, name }
    }

    /// Parses the four-byte code at the start of a line.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodeParseError> {
        if bytes.len() < 4 {
            return Err(CodeParseError::TooShort);
        }
        let kind = Kind::try_from(bytes[0]).map_err(CodeParseError::UnknownKind)?;
        let mut name = [0u8; 3];
        name.copy_from_slice(&bytes[1..4]);
        if !name.iter().all(u8::is_ascii_uppercase) {
            return Err(CodeParseError::NonAlphaName);
        }
        Ok(Code::new(kind, Name(name)))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out[0] = self.kind.letter();
        out[1..].copy_from_slice(&self.name.0);
        out
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.letter() as char, self.name)
    }
}

#[derive(Debug, Error)]
pub enum CodeParseError {
    #[error("command code shorter than 4 bytes")]
    TooShort,
    #[error("unknown command kind: {0}")]
    UnknownKind(#[from] UnknownKind),
    #[error("command name is not three uppercase ASCII letters")]
    NonAlphaName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_binf() {
        let code = Code::parse(b"BINF rest").unwrap();
        assert_eq!(code.kind, Kind::Broadcast);
        assert_eq!(code.name, Name::INF);
        assert_eq!(&code.to_bytes(), b"BINF");
        assert_eq!(code.to_string(), "BINF");
    }

    #[test]
    fn rejects_unknown_kind_letter() {
        let err = Code::parse(b"XINF").unwrap_err();
        assert!(matches!(err, CodeParseError::UnknownKind(_)));
    }

    #[test]
    fn fixed_arg_counts_match_spec() {
        assert_eq!(Kind::Broadcast.fixed_arg_count(), 1);
        assert_eq!(Kind::Direct.fixed_arg_count(), 2);
        assert_eq!(Kind::Echo.fixed_arg_count(), 2);
        assert_eq!(Kind::Feature.fixed_arg_count(), 2);
        assert_eq!(Kind::ClientToHub.fixed_arg_count(), 0);
        assert_eq!(Kind::HubToClient.fixed_arg_count(), 0);
    }
}
