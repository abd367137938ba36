// src/a2s/mod.rs
//! Valve A2S server queries: wire codec, error taxonomy and the UDP
//! request/response exchange.

pub mod codec;
pub mod error;
pub mod session;

use std::fmt;

pub use error::QueryError;

pub const PACKET_PREFIX: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
pub const SPLIT_PACKET_PREFIX: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];

pub const A2S_INFO: u8 = 0x54;
pub const A2S_PLAYER: u8 = 0x55;
pub const A2S_RULES: u8 = 0x56;

pub const S2A_INFO: u8 = 0x49;
pub const S2A_PLAYER: u8 = 0x44;
pub const S2A_RULES: u8 = 0x45;
pub const S2C_CHALLENGE: u8 = 0x41;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Info,
    Players,
    Rules,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "A2S_INFO"),
            Self::Players => write!(f, "A2S_PLAYER"),
            Self::Rules => write!(f, "A2S_RULES"),
        }
    }
}
