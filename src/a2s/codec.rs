// src/a2s/codec.rs
//! Request encoding and response decoding for A2S_INFO, A2S_PLAYER and
//! A2S_RULES. Pure byte transformations, no I/O.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{BufRead, Cursor};
use std::ops::RangeInclusive;

use crate::a2s::{
    QueryError, A2S_INFO, PACKET_PREFIX, S2A_INFO, S2A_PLAYER, S2A_RULES, S2C_CHALLENGE,
    SPLIT_PACKET_PREFIX,
};
use crate::models::server::{
    environment_name, server_type_name, ExtraData, PlayerRecord, RuleSet, ServerInfo,
};

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SOURCE_TV: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

/// App ids whose INFO replies use an incompatible layout and are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleFilter {
    ranges: Vec<RangeInclusive<u16>>,
}

impl Default for TitleFilter {
    /// The Ship and its variants.
    fn default() -> Self {
        Self {
            ranges: vec![2400..=2412],
        }
    }
}

impl TitleFilter {
    /// Parses `"2400-2412,2420"` style lists. Invalid parts are skipped.
    pub fn parse(list: &str) -> Self {
        let ranges = list
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                match part.split_once('-') {
                    Some((lo, hi)) => {
                        let lo = lo.trim().parse().ok()?;
                        let hi = hi.trim().parse().ok()?;
                        Some(lo..=hi)
                    }
                    None => part.parse().ok().map(|id| id..=id),
                }
            })
            .collect();
        Self { ranges }
    }

    pub fn is_unsupported(&self, id: u16) -> bool {
        self.ranges.iter().any(|r| r.contains(&id))
    }
}

pub fn encode_info_request() -> Vec<u8> {
    let mut packet = Vec::with_capacity(PACKET_PREFIX.len() + 1 + INFO_PAYLOAD.len());
    packet.extend_from_slice(&PACKET_PREFIX);
    packet.push(A2S_INFO);
    packet.extend_from_slice(INFO_PAYLOAD);
    packet
}

/// INFO request re-sent with the challenge a server handed back.
pub fn encode_info_request_with_challenge(challenge: [u8; 4]) -> Vec<u8> {
    let mut packet = encode_info_request();
    packet.extend_from_slice(&challenge);
    packet
}

pub fn encode_challenge_request(query_byte: u8) -> [u8; 9] {
    encode_data_request(query_byte, [0xFF; 4])
}

pub fn encode_data_request(query_byte: u8, challenge: [u8; 4]) -> [u8; 9] {
    let mut packet = [0u8; 9];
    packet[..4].copy_from_slice(&PACKET_PREFIX);
    packet[4] = query_byte;
    packet[5..].copy_from_slice(&challenge);
    packet
}

/// Returns the payload following a `FF FF FF FF <response_byte>` header.
fn strip_header(data: &[u8], response_byte: u8) -> Result<&[u8], QueryError> {
    if data.starts_with(&SPLIT_PACKET_PREFIX) {
        return Err(QueryError::SplitResponse);
    }
    if data.len() < 5 || data[..4] != PACKET_PREFIX || data[4] != response_byte {
        return Err(QueryError::BadHeader);
    }
    Ok(&data[5..])
}

pub fn is_challenge(data: &[u8]) -> bool {
    data.len() >= 9 && data[..4] == PACKET_PREFIX && data[4] == S2C_CHALLENGE
}

pub fn decode_challenge_number(data: &[u8], expected_header: u8) -> Result<[u8; 4], QueryError> {
    if data.len() < 9 || data[..4] != PACKET_PREFIX || data[4] != expected_header {
        return Err(QueryError::BadChallengeResponse);
    }
    let mut challenge = [0u8; 4];
    challenge.copy_from_slice(&data[5..9]);
    Ok(challenge)
}

fn read_string(cur: &mut Cursor<&[u8]>) -> Result<String, QueryError> {
    let mut buf = Vec::new();
    cur.read_until(0, &mut buf).map_err(|_| QueryError::Truncated)?;
    if buf.pop() != Some(0) {
        return Err(QueryError::Truncated);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn remaining(cur: &Cursor<&[u8]>) -> usize {
    cur.get_ref().len().saturating_sub(cur.position() as usize)
}

pub fn decode_info(data: &[u8]) -> Result<ServerInfo, QueryError> {
    decode_info_filtered(data, &TitleFilter::default())
}

pub fn decode_info_filtered(data: &[u8], filter: &TitleFilter) -> Result<ServerInfo, QueryError> {
    let payload = strip_header(data, S2A_INFO)?;
    if payload.is_empty() {
        return Err(QueryError::NoInfo);
    }

    let mut cur = Cursor::new(payload);
    let truncated = |_: std::io::Error| QueryError::Truncated;
    let mut info = ServerInfo {
        protocol: cur.read_u8().map_err(truncated)?,
        name: read_string(&mut cur)?,
        map: read_string(&mut cur)?,
        folder: read_string(&mut cur)?,
        game: read_string(&mut cur)?,
        id: cur.read_u16::<LittleEndian>().map_err(truncated)?,
        ..ServerInfo::default()
    };
    if filter.is_unsupported(info.id) {
        return Err(QueryError::UnsupportedTitle(info.id));
    }

    info.players = cur.read_u8().map_err(truncated)?;
    info.max_players = cur.read_u8().map_err(truncated)?;
    info.bots = cur.read_u8().map_err(truncated)?;
    info.server_type = server_type_name(cur.read_u8().map_err(truncated)?).to_string();
    info.environment = environment_name(cur.read_u8().map_err(truncated)?).to_string();
    info.visibility = cur.read_u8().map_err(truncated)? != 0;
    info.vac = cur.read_u8().map_err(truncated)? != 0;
    info.version = read_string(&mut cur)?;

    // Older servers stop after the version string.
    if remaining(&cur) == 0 {
        return Ok(info);
    }

    let edf = cur.read_u8().map_err(truncated)?;
    info.extra_data_flags = edf;
    let mut extra = ExtraData::default();
    if edf & EDF_PORT != 0 {
        extra.port = cur.read_u16::<LittleEndian>().map_err(truncated)?;
    }
    if edf & EDF_STEAM_ID != 0 {
        extra.steam_id = cur.read_u64::<LittleEndian>().map_err(truncated)?;
    }
    if edf & EDF_SOURCE_TV != 0 {
        extra.source_tv_port = cur.read_u16::<LittleEndian>().map_err(truncated)?;
        extra.source_tv_name = read_string(&mut cur)?;
    }
    if edf & EDF_KEYWORDS != 0 {
        extra.keywords = read_string(&mut cur)?;
    }
    if edf & EDF_GAME_ID != 0 {
        extra.game_id = cur.read_u64::<LittleEndian>().map_err(truncated)?;
    }
    info.extra_data = extra;

    Ok(info)
}

pub fn decode_players(data: &[u8]) -> Result<Vec<PlayerRecord>, QueryError> {
    let payload = strip_header(data, S2A_PLAYER)?;
    let (&count, entries) = payload.split_first().ok_or(QueryError::Truncated)?;
    if count == 0 {
        return Err(QueryError::NoPlayers);
    }

    let mut cur = Cursor::new(entries);
    let truncated = |_: std::io::Error| QueryError::Truncated;
    let mut players = Vec::with_capacity(count as usize);
    for _ in 0..count {
        // Servers with long player lists may announce more than fit in one packet.
        if remaining(&cur) == 0 {
            break;
        }
        let _index = cur.read_u8().map_err(truncated)?;
        let name = read_string(&mut cur)?;
        let score = cur.read_i32::<LittleEndian>().map_err(truncated)?;
        let duration = cur.read_f32::<LittleEndian>().map_err(truncated)?;
        players.push(PlayerRecord::new(name, score, duration));
    }
    Ok(players)
}

/// Single-packet rules only; split replies surface as `SplitResponse`.
pub fn decode_rules(data: &[u8]) -> Result<RuleSet, QueryError> {
    let payload = strip_header(data, S2A_RULES)?;
    if payload.len() < 2 {
        return Err(QueryError::Truncated);
    }
    let count = u16::from_le_bytes([payload[0], payload[1]]);
    if count == 0 {
        return Err(QueryError::NoRules);
    }

    let tokens: Vec<&[u8]> = payload[2..].split(|&b| b == 0).collect();
    let mut rules = RuleSet::with_capacity(count as usize);
    for pair in tokens.chunks_exact(2) {
        rules.insert(
            String::from_utf8_lossy(pair[0]).into_owned(),
            String::from_utf8_lossy(pair[1]).into_owned(),
        );
    }
    Ok(rules)
}
