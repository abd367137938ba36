// src/master/udp.rs
use log::{debug, info};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::master::DiscoveryError;
use crate::models::host::HostAddress;

const QUERY_BYTE: u8 = 0x31;
const REPLY_HEADER: [u8; 6] = [0xFF, 0xFF, 0xFF, 0xFF, 0x66, 0x0A];
const HOST_LEN: usize = 6;
const RECV_BUFFER_SIZE: usize = 2048;

/// One page of a master server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPage {
    pub hosts: Vec<HostAddress>,
    /// The end-of-list sentinel was seen.
    pub done: bool,
}

pub fn encode_request(region: u8, seed: &HostAddress, filter: &str) -> Vec<u8> {
    let seed = seed.to_string();
    let mut packet = Vec::with_capacity(4 + seed.len() + filter.len());
    packet.push(QUERY_BYTE);
    packet.push(region);
    packet.extend_from_slice(seed.as_bytes());
    packet.push(0x00);
    packet.extend_from_slice(filter.as_bytes());
    packet.push(0x00);
    packet
}

/// Four address octets followed by a big-endian port.
pub fn parse_ip(group: &[u8; HOST_LEN]) -> HostAddress {
    HostAddress::new(
        Ipv4Addr::new(group[0], group[1], group[2], group[3]),
        u16::from_be_bytes([group[4], group[5]]),
    )
}

pub fn extract_hosts(data: &[u8]) -> Result<MasterPage, DiscoveryError> {
    let body = data
        .strip_prefix(&REPLY_HEADER[..])
        .ok_or(DiscoveryError::BadHeader)?;

    let mut hosts = Vec::with_capacity(body.len() / HOST_LEN);
    for chunk in body.chunks_exact(HOST_LEN) {
        let mut group = [0u8; HOST_LEN];
        group.copy_from_slice(chunk);
        let host = parse_ip(&group);
        if host.is_sentinel() {
            return Ok(MasterPage { hosts, done: true });
        }
        hosts.push(host);
    }
    Ok(MasterPage { hosts, done: false })
}

pub struct UdpMaster {
    server: String,
    region: u8,
    timeout: Duration,
    max_hosts: usize,
}

impl UdpMaster {
    pub fn new(server: String, region: u8, timeout: Duration, max_hosts: usize) -> Self {
        Self {
            server,
            region,
            timeout,
            max_hosts,
        }
    }

    async fn fetch_page(
        &self,
        socket: &UdpSocket,
        seed: &HostAddress,
        filter: &str,
    ) -> Result<MasterPage, DiscoveryError> {
        socket
            .send(&encode_request(self.region, seed, filter))
            .await
            .map_err(DiscoveryError::Transmit)?;

        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let len = match tokio::time::timeout(self.timeout, socket.recv(&mut buffer)).await {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => return Err(DiscoveryError::Transmit(e)),
            Err(_) => return Err(DiscoveryError::Timeout),
        };
        extract_hosts(&buffer[..len])
    }

    pub async fn discover(&self, filter: &str) -> Result<Vec<HostAddress>, DiscoveryError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(DiscoveryError::Connection)?;
        socket
            .connect(self.server.as_str())
            .await
            .map_err(DiscoveryError::Connection)?;

        let mut hosts = Vec::new();
        let mut seen = HashSet::new();
        let mut seed = HostAddress::SENTINEL;

        loop {
            let page = self.fetch_page(&socket, &seed, filter).await?;
            debug!(
                "Master page from seed {}: {} hosts, done: {}",
                seed,
                page.hosts.len(),
                page.done
            );

            let last = page.hosts.last().copied();
            for host in page.hosts {
                if hosts.len() >= self.max_hosts {
                    break;
                }
                if seen.insert(host) {
                    hosts.push(host);
                }
            }

            if hosts.len() >= self.max_hosts {
                info!("Reached host cap of {}, stopping discovery", self.max_hosts);
                break;
            }
            if page.done {
                break;
            }
            match last {
                Some(next) if next != seed => seed = next,
                // An empty or repeated page cannot advance the seed.
                _ => break,
            }
        }

        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_fake_master;

    fn page(groups: &[[u8; 6]]) -> Vec<u8> {
        let mut buf = REPLY_HEADER.to_vec();
        for group in groups {
            buf.extend_from_slice(group);
        }
        buf
    }

    const SENTINEL: [u8; 6] = [0, 0, 0, 0, 0, 0];

    #[test]
    fn parses_big_endian_port() {
        let host = parse_ip(&[0x59, 0xC5, 0x30, 0xB6, 0x64, 0xC5]);
        assert_eq!(host.to_string(), "89.197.48.182:25797");
    }

    #[test]
    fn encodes_request() {
        let packet = encode_request(0xFF, &HostAddress::SENTINEL, "\\appid\\282440");
        let mut expected = vec![0x31, 0xFF];
        expected.extend_from_slice(b"0.0.0.0:0\0\\appid\\282440\0");
        assert_eq!(packet, expected);
    }

    #[test]
    fn sentinel_terminates_extraction() {
        let data = page(&[
            [1, 2, 3, 4, 0x69, 0x87],
            [5, 6, 7, 8, 0x6D, 0x38],
            SENTINEL,
            [9, 9, 9, 9, 0, 1],
        ]);
        let result = extract_hosts(&data).unwrap();
        assert!(result.done);
        assert_eq!(result.hosts.len(), 2);
        assert_eq!(result.hosts[0].to_string(), "1.2.3.4:27015");
        assert_eq!(result.hosts[1].to_string(), "5.6.7.8:27960");
    }

    #[test]
    fn missing_sentinel_continues() {
        let data = page(&[[1, 2, 3, 4, 0x69, 0x87], [5, 6, 7, 8, 0x6D, 0x38]]);
        let result = extract_hosts(&data).unwrap();
        assert!(!result.done);
        assert_eq!(result.hosts.last().unwrap().to_string(), "5.6.7.8:27960");
    }

    #[test]
    fn rejects_bad_header() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0x66, 0x0B, 1, 2, 3, 4, 5, 6];
        assert!(matches!(extract_hosts(&data), Err(DiscoveryError::BadHeader)));
    }

    #[tokio::test]
    async fn paginates_until_sentinel() {
        let (addr, requests) = spawn_fake_master(vec![
            page(&[[1, 1, 1, 1, 0, 10], [2, 2, 2, 2, 0, 20]]),
            page(&[[3, 3, 3, 3, 0, 30], SENTINEL]),
        ])
        .await;

        let master = UdpMaster::new(addr, 0xFF, Duration::from_secs(2), 100);
        let hosts = master.discover("\\appid\\1").await.unwrap();
        let hosts: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
        assert_eq!(hosts, vec!["1.1.1.1:10", "2.2.2.2:20", "3.3.3.3:30"]);

        let requests = requests.lock();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with(b"\x31\xFF0.0.0.0:0\0"));
        assert!(requests[1].starts_with(b"\x31\xFF2.2.2.2:20\0"));
    }

    #[tokio::test]
    async fn stops_at_host_cap() {
        let (addr, requests) = spawn_fake_master(vec![
            page(&[[1, 1, 1, 1, 0, 10], [2, 2, 2, 2, 0, 20], [3, 3, 3, 3, 0, 30]]),
            page(&[SENTINEL]),
        ])
        .await;

        let master = UdpMaster::new(addr, 0xFF, Duration::from_secs(2), 2);
        let hosts = master.discover("").await.unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn silent_master_is_an_error() {
        let (addr, _requests) = spawn_fake_master(vec![]).await;
        let master = UdpMaster::new(addr, 0xFF, Duration::from_millis(200), 10);
        assert!(master.discover("").await.is_err());
    }
}
