// src/a2s/session.rs
//! One UDP exchange per call: a fresh socket is bound, used for a single
//! query and dropped on return.

use log::debug;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

use crate::a2s::codec::{self, TitleFilter};
use crate::a2s::{QueryError, A2S_PLAYER, A2S_RULES, S2C_CHALLENGE};
use crate::models::host::HostAddress;
use crate::models::server::{PlayerRecord, RuleSet, ServerInfo};

const RECV_BUFFER_SIZE: usize = 4096;
const MIN_CHALLENGE_DEADLINE: Duration = Duration::from_secs(1);

async fn open(host: &HostAddress) -> Result<UdpSocket, QueryError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(QueryError::HostConnection)?;
    socket
        .connect(host.socket_addr())
        .await
        .map_err(QueryError::HostConnection)?;
    Ok(socket)
}

async fn round_trip(
    socket: &UdpSocket,
    packet: &[u8],
    deadline: Instant,
) -> Result<Vec<u8>, QueryError> {
    socket.send(packet).await.map_err(QueryError::DataTransmit)?;

    let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
    let len = match timeout_at(deadline, socket.recv(&mut buffer)).await {
        Ok(Ok(len)) => len,
        Ok(Err(e)) => return Err(QueryError::DataTransmit(e)),
        Err(_) => return Err(QueryError::timed_out()),
    };
    buffer.truncate(len);
    Ok(buffer)
}

/// Two-step exchanges finish a second early, but never get less than
/// `MIN_CHALLENGE_DEADLINE` and never more than `timeout` itself.
fn challenge_budget(timeout: Duration) -> Duration {
    timeout
        .saturating_sub(Duration::from_secs(1))
        .max(MIN_CHALLENGE_DEADLINE)
        .min(timeout)
}

pub async fn query_info(
    host: &HostAddress,
    timeout: Duration,
    filter: &TitleFilter,
) -> Result<ServerInfo, QueryError> {
    let deadline = Instant::now() + timeout;
    let socket = open(host).await?;

    let mut reply = round_trip(&socket, &codec::encode_info_request(), deadline).await?;
    if codec::is_challenge(&reply) {
        let challenge = codec::decode_challenge_number(&reply, S2C_CHALLENGE)?;
        debug!("{} requires a challenge for A2S_INFO", host);
        reply = round_trip(
            &socket,
            &codec::encode_info_request_with_challenge(challenge),
            deadline,
        )
        .await?;
    }

    codec::decode_info_filtered(&reply, filter)
}

async fn query_with_challenge(
    host: &HostAddress,
    timeout: Duration,
    query_byte: u8,
) -> Result<Vec<u8>, QueryError> {
    let deadline = Instant::now() + challenge_budget(timeout);
    let socket = open(host).await?;

    let reply = round_trip(&socket, &codec::encode_challenge_request(query_byte), deadline).await?;
    let challenge = codec::decode_challenge_number(&reply, S2C_CHALLENGE)?;

    round_trip(&socket, &codec::encode_data_request(query_byte, challenge), deadline).await
}

pub async fn query_players(
    host: &HostAddress,
    timeout: Duration,
) -> Result<Vec<PlayerRecord>, QueryError> {
    let reply = query_with_challenge(host, timeout, A2S_PLAYER).await?;
    codec::decode_players(&reply)
}

pub async fn query_rules(host: &HostAddress, timeout: Duration) -> Result<RuleSet, QueryError> {
    let reply = query_with_challenge(host, timeout, A2S_RULES).await?;
    codec::decode_rules(&reply)
}
