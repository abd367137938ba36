// src/batch.rs
//! Applies one query type to many hosts at once and retries the hosts that
//! failed, in sequential passes.

use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::a2s::codec::TitleFilter;
use crate::a2s::{session, QueryError, QueryType};
use crate::models::host::HostAddress;
use crate::models::server::{PlayerRecord, RuleSet, ServerInfo};

pub const DEFAULT_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    Info(ServerInfo),
    Players(Vec<PlayerRecord>),
    Rules(RuleSet),
}

#[derive(Debug)]
pub enum QueryOutcome {
    Success(QueryPayload),
    /// The server answered with zero players or zero rules.
    ExpectedEmpty,
    Failed(QueryError),
}

impl From<Result<QueryPayload, QueryError>> for QueryOutcome {
    fn from(result: Result<QueryPayload, QueryError>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(e) if e.is_expected_empty() => Self::ExpectedEmpty,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Anything able to run a single A2S query against a single host.
pub trait A2sClient: Send + Sync + 'static {
    fn query(
        &self,
        host: HostAddress,
        query_type: QueryType,
    ) -> impl Future<Output = Result<QueryPayload, QueryError>> + Send;
}

/// Real UDP client built on the challenge session functions.
#[derive(Debug, Clone)]
pub struct UdpA2sClient {
    timeout: Duration,
    filter: TitleFilter,
}

impl UdpA2sClient {
    pub fn new(timeout: Duration, filter: TitleFilter) -> Self {
        Self { timeout, filter }
    }
}

impl A2sClient for UdpA2sClient {
    async fn query(
        &self,
        host: HostAddress,
        query_type: QueryType,
    ) -> Result<QueryPayload, QueryError> {
        match query_type {
            QueryType::Info => session::query_info(&host, self.timeout, &self.filter)
                .await
                .map(QueryPayload::Info),
            QueryType::Players => session::query_players(&host, self.timeout)
                .await
                .map(QueryPayload::Players),
            QueryType::Rules => session::query_rules(&host, self.timeout)
                .await
                .map(QueryPayload::Rules),
        }
    }
}

/// Outcome table for one query type. Only successes and expected-empty
/// answers are kept in `outcomes`; hosts that never succeeded are in `failed`.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: HashMap<HostAddress, QueryOutcome>,
    pub failed: Vec<HostAddress>,
    /// Retry passes run after the first one.
    pub retry_passes: usize,
}

impl BatchReport {
    pub fn contains(&self, host: &HostAddress) -> bool {
        self.outcomes.contains_key(host)
    }

    pub fn take(&mut self, host: &HostAddress) -> Option<QueryOutcome> {
        self.outcomes.remove(host)
    }
}

pub struct BatchQuerier<C> {
    client: Arc<C>,
    retries: usize,
    permits: Arc<Semaphore>,
}

impl<C: A2sClient> BatchQuerier<C> {
    pub fn new(client: C, retries: usize, max_concurrent: usize) -> Self {
        Self {
            client: Arc::new(client),
            retries,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// One parallel sweep. Every worker hands its outcome back through its
    /// task handle; at most `max_concurrent` queries are in flight.
    async fn run_pass(
        &self,
        hosts: &[HostAddress],
        query_type: QueryType,
    ) -> Vec<(HostAddress, QueryOutcome)> {
        let mut workers = JoinSet::new();
        for &host in hosts {
            let client = self.client.clone();
            let permits = self.permits.clone();
            workers.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let outcome = QueryOutcome::from(client.query(host, query_type).await);
                (host, outcome)
            });
        }

        let mut results = Vec::with_capacity(hosts.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("{} worker did not finish: {}", query_type, e),
            }
        }
        results
    }

    pub async fn batch_query(&self, hosts: &[HostAddress], query_type: QueryType) -> BatchReport {
        let mut report = BatchReport::default();
        let mut seen = HashSet::with_capacity(hosts.len());
        let mut pending: Vec<HostAddress> =
            hosts.iter().copied().filter(|h| seen.insert(*h)).collect();

        for pass in 0..=self.retries {
            if pending.is_empty() {
                break;
            }
            if pass > 0 {
                report.retry_passes = pass;
                info!("{} retry pass {}: {} hosts", query_type, pass, pending.len());
            }

            for (host, outcome) in self.run_pass(&pending, query_type).await {
                match outcome {
                    QueryOutcome::Failed(e) => debug!("{} failed for {}: {}", query_type, host, e),
                    done => {
                        report.outcomes.insert(host, done);
                    }
                }
            }
            pending = pending
                .into_iter()
                .filter(|host| !report.outcomes.contains_key(host))
                .collect();
        }

        info!(
            "{}: {} answered, {} failed",
            query_type,
            report.outcomes.len(),
            pending.len()
        );
        report.failed = pending;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{host, FakeClient, Reply};

    fn info(name: &str) -> Reply {
        Reply::Ok(QueryPayload::Info(ServerInfo {
            name: name.to_string(),
            ..ServerInfo::default()
        }))
    }

    #[tokio::test]
    async fn transient_failures_converge_on_first_retry() {
        let hosts: Vec<HostAddress> = (1..=5).map(host).collect();
        let client = FakeClient::new();
        for (i, h) in hosts.iter().enumerate() {
            let failures = if i < 2 { 1 } else { 0 };
            client.script(*h, QueryType::Info, failures, info("ok"));
        }
        let attempts = client.attempts();

        let querier = BatchQuerier::new(client, DEFAULT_RETRIES, 16);
        let report = querier.batch_query(&hosts, QueryType::Info).await;

        assert_eq!(report.outcomes.len(), 5);
        assert!(report.failed.is_empty());
        assert_eq!(report.retry_passes, 1);
        for (i, h) in hosts.iter().enumerate() {
            assert!(matches!(report.outcomes[h], QueryOutcome::Success(QueryPayload::Info(_))));
            let expected = if i < 2 { 2 } else { 1 };
            assert_eq!(attempts.lock()[&(*h, QueryType::Info)], expected);
        }
    }

    #[tokio::test]
    async fn expected_empty_is_final() {
        let h = host(1);
        let client = FakeClient::new();
        client.script(h, QueryType::Players, 0, Reply::Empty);
        let attempts = client.attempts();

        let report = BatchQuerier::new(client, DEFAULT_RETRIES, 4)
            .batch_query(&[h], QueryType::Players)
            .await;

        assert!(matches!(report.outcomes[&h], QueryOutcome::ExpectedEmpty));
        assert!(report.failed.is_empty());
        assert_eq!(attempts.lock()[&(h, QueryType::Players)], 1);
    }

    #[tokio::test]
    async fn persistent_failures_exhaust_retries() {
        let (good, bad) = (host(1), host(2));
        let client = FakeClient::new();
        client.script(good, QueryType::Rules, 0, Reply::Ok(QueryPayload::Rules(RuleSet::new())));
        let attempts = client.attempts();

        let report = BatchQuerier::new(client, 2, 4)
            .batch_query(&[good, bad], QueryType::Rules)
            .await;

        assert!(report.contains(&good));
        assert!(!report.contains(&bad));
        assert_eq!(report.failed, vec![bad]);
        assert_eq!(report.retry_passes, 2);
        assert_eq!(attempts.lock()[&(bad, QueryType::Rules)], 3);
    }

    #[tokio::test]
    async fn duplicate_hosts_are_queried_once() {
        let h = host(7);
        let client = FakeClient::new();
        client.script(h, QueryType::Info, 0, info("dup"));
        let attempts = client.attempts();

        let report = BatchQuerier::new(client, 0, 4)
            .batch_query(&[h, h, h], QueryType::Info)
            .await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(attempts.lock()[&(h, QueryType::Info)], 1);
    }

    #[tokio::test]
    async fn concurrency_is_capped() {
        let hosts: Vec<HostAddress> = (1..=20).map(host).collect();
        let client = FakeClient::new().with_delay(Duration::from_millis(20));
        for h in &hosts {
            client.script(*h, QueryType::Info, 0, info("slow"));
        }
        let peak = client.peak_in_flight();

        let report = BatchQuerier::new(client, 0, 3)
            .batch_query(&hosts, QueryType::Info)
            .await;

        assert_eq!(report.outcomes.len(), 20);
        let peak = peak.load(std::sync::atomic::Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {}", peak);
        assert!(peak >= 1);
    }
}
