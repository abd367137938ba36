// src/testing.rs
//! In-process stand-ins for game servers, shared by unit tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::a2s::{QueryError, QueryType};
use crate::batch::{A2sClient, QueryPayload};
use crate::models::host::HostAddress;

pub fn host(n: u8) -> HostAddress {
    HostAddress::new(Ipv4Addr::new(10, 0, 0, n), 27960)
}

/// A master server reply listing `hosts`, optionally closed by the sentinel.
pub fn master_page(hosts: &[HostAddress], done: bool) -> Vec<u8> {
    let mut buf = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x66, 0x0A];
    for host in hosts {
        buf.extend_from_slice(&host.ip.octets());
        buf.extend_from_slice(&host.port.to_be_bytes());
    }
    if done {
        buf.extend_from_slice(&[0; 6]);
    }
    buf
}

/// Replies to successive requests with `pages`, then goes away. Returns the
/// bound address and the requests received.
pub async fn spawn_fake_master(pages: Vec<Vec<u8>>) -> (String, Arc<Mutex<Vec<Vec<u8>>>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        for reply in pages {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            seen.lock().push(buf[..len].to_vec());
            let _ = socket.send_to(&reply, peer).await;
        }
    });
    (addr.to_string(), requests)
}

#[derive(Debug, Clone)]
pub enum Reply {
    Ok(QueryPayload),
    /// NoPlayers / NoRules depending on the query type.
    Empty,
}

struct Script {
    failures: usize,
    reply: Reply,
}

type Key = (HostAddress, QueryType);

/// Fails each scripted host `failures` times, then answers with its reply.
/// Unscripted hosts always time out.
pub struct FakeClient {
    scripts: Mutex<HashMap<Key, Script>>,
    attempts: Arc<Mutex<HashMap<Key, usize>>>,
    in_flight: AtomicUsize,
    peak: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            attempts: Arc::new(Mutex::new(HashMap::new())),
            in_flight: AtomicUsize::new(0),
            peak: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(&self, host: HostAddress, query_type: QueryType, failures: usize, reply: Reply) {
        self.scripts
            .lock()
            .insert((host, query_type), Script { failures, reply });
    }

    pub fn attempts(&self) -> Arc<Mutex<HashMap<Key, usize>>> {
        self.attempts.clone()
    }

    pub fn peak_in_flight(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }

    fn answer(&self, key: Key) -> Result<QueryPayload, QueryError> {
        *self.attempts.lock().entry(key).or_insert(0) += 1;

        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(&key) else {
            return Err(QueryError::DataTransmit(io::Error::new(
                io::ErrorKind::TimedOut,
                "no reply",
            )));
        };
        if script.failures > 0 {
            script.failures -= 1;
            return Err(QueryError::DataTransmit(io::Error::new(
                io::ErrorKind::TimedOut,
                "dropped",
            )));
        }
        match &script.reply {
            Reply::Ok(payload) => Ok(payload.clone()),
            Reply::Empty if key.1 == QueryType::Rules => Err(QueryError::NoRules),
            Reply::Empty => Err(QueryError::NoPlayers),
        }
    }
}

impl A2sClient for FakeClient {
    async fn query(
        &self,
        host: HostAddress,
        query_type: QueryType,
    ) -> Result<QueryPayload, QueryError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.answer((host, query_type));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
