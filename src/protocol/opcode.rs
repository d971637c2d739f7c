//! Opcode definitions
//!
//! The command table understood by the server.

use std::fmt;
use std::str::FromStr;

use crate::error::GibsonError;

/// Request opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Set = 1,
    Ttl = 2,
    Get = 3,
    Del = 4,
    Inc = 5,
    Dec = 6,
    Lock = 7,
    Unlock = 8,
    MSet = 9,
    MTtl = 10,
    MGet = 11,
    MDel = 12,
    MInc = 13,
    MDec = 14,
    MLock = 15,
    MUnlock = 16,
    Count = 17,
    Stats = 18,
    Ping = 19,
    Meta = 20,
    Keys = 21,
    End = 0xFF,
}

impl Opcode {
    /// Every opcode, in wire value order
    pub const ALL: [Opcode; 22] = [
        Opcode::Set,
        Opcode::Ttl,
        Opcode::Get,
        Opcode::Del,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Lock,
        Opcode::Unlock,
        Opcode::MSet,
        Opcode::MTtl,
        Opcode::MGet,
        Opcode::MDel,
        Opcode::MInc,
        Opcode::MDec,
        Opcode::MLock,
        Opcode::MUnlock,
        Opcode::Count,
        Opcode::Stats,
        Opcode::Ping,
        Opcode::Meta,
        Opcode::Keys,
        Opcode::End,
    ];

    /// Wire value
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }

    /// Upper-case command name
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Set => "SET",
            Opcode::Ttl => "TTL",
            Opcode::Get => "GET",
            Opcode::Del => "DEL",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Lock => "LOCK",
            Opcode::Unlock => "UNLOCK",
            Opcode::MSet => "MSET",
            Opcode::MTtl => "MTTL",
            Opcode::MGet => "MGET",
            Opcode::MDel => "MDEL",
            Opcode::MInc => "MINC",
            Opcode::MDec => "MDEC",
            Opcode::MLock => "MLOCK",
            Opcode::MUnlock => "MUNLOCK",
            Opcode::Count => "COUNT",
            Opcode::Stats => "STATS",
            Opcode::Ping => "PING",
            Opcode::Meta => "META",
            Opcode::Keys => "KEYS",
            Opcode::End => "END",
        }
    }
}

impl FromStr for Opcode {
    type Err = GibsonError;

    /// Case-insensitive lookup by command name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| GibsonError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
