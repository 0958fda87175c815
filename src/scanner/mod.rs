//! Scanner module - runs a TCP connect scan over many targets at once.
//!
//! Every (target, port) pair becomes its own task on a shared multi-threaded
//! tokio runtime. Tasks are spawned lazily: at most
//! [`ScanConfig::max_pending`] exist at once, and the next one is spawned
//! when an earlier one finishes. A task takes a slot from the [`Throttle`],
//! races a connect against the timeout, and either records the classified
//! state or, on resource exhaustion, backs off and tries again. The scan is
//! complete once every task has dropped its keep-alive token.

pub mod probe;
pub mod retry;
pub mod stats;
pub mod throttle;

pub use probe::{classify, Connector, Outcome, TcpConnector};
pub use retry::{RetryDecision, RetryPolicy, ScanJob, MAX_RETRIES};
pub use stats::{ScanStats, ScanSummary};
pub use throttle::{Throttle, ThrottlePermit};

use crate::config::TimingProfile;
use crate::error::{ScanError, ScanResult};
use crate::results::{PortState, ResultStore, ScanResults};
use crate::services::{ServiceLookup, WellKnownServices};
use crate::types::{resolve_targets, PortRange, Target};
use chrono::Utc;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// Extra wait on top of the timeout before a throttled job is resubmitted.
pub const THROTTLE_GRACE: Duration = Duration::from_secs(1);

/// Live job tasks allowed per connection slot.
pub const PENDING_PER_CONNECTION: usize = 2;

/// Number of runtime worker threads: half the available parallelism, at
/// least one.
pub fn worker_count() -> usize {
    let hint = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    (hint.max(2) / 2).max(1)
}

/// Configuration for a scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Ports to scan on every target.
    pub ports: PortRange,
    /// Concurrency bound and per-attempt timeout.
    pub timing: TimingProfile,
    /// Record ports that refused the connection.
    pub show_closed: bool,
    /// Backoff for resource exhaustion.
    pub retry: RetryPolicy,
    /// Added to the timeout when deferring a throttled job.
    pub throttle_grace: Duration,
    /// Runtime worker threads used by [`Scanner::scan_blocking`].
    pub workers: usize,
    /// Most job tasks alive at once, whether connecting, deferred or
    /// backing off. Further jobs are not spawned until one finishes.
    pub max_pending: usize,
}

impl ScanConfig {
    /// Create a configuration with default retry and worker settings.
    pub fn new(ports: PortRange, timing: TimingProfile) -> Self {
        Self {
            ports,
            timing,
            show_closed: false,
            retry: RetryPolicy::default(),
            throttle_grace: THROTTLE_GRACE,
            workers: worker_count(),
            max_pending: timing
                .max_connections
                .saturating_mul(PENDING_PER_CONNECTION)
                .clamp(1, Semaphore::MAX_PERMITS),
        }
    }

    /// Include closed ports in the results.
    pub fn with_closed(mut self) -> Self {
        self.show_closed = true;
        self
    }

    /// Override the retry backoff.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the throttle grace period.
    pub fn with_throttle_grace(mut self, grace: Duration) -> Self {
        self.throttle_grace = grace;
        self
    }

    /// Override the number of runtime workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Override the bound on live job tasks.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    /// How long a throttled job waits before it is tried again.
    pub fn defer_delay(&self) -> Duration {
        self.timing.timeout + self.throttle_grace
    }
}

/// State shared by every job task of one scan.
struct Shared {
    store: ResultStore,
    throttle: Arc<Throttle>,
    stats: ScanStats,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    timeout: Duration,
    defer_delay: Duration,
    show_closed: bool,
    progress: Option<ProgressBar>,
}

impl Shared {
    fn record(&self, job: &ScanJob, outcome: &Outcome) {
        self.stats.resolved(job, outcome);

        let Some(state) = outcome.port_state() else {
            return;
        };
        if state == PortState::Closed && !self.show_closed {
            return;
        }

        if self.store.update(job.target.name(), job.port, state) && state == PortState::Open {
            info!(host = %job.target, port = job.port, "Discovered open port");
            if let Some(pb) = &self.progress {
                pb.set_message(format!("open: {}:{}", job.target.name(), job.port));
            }
        }
    }
}

/// TCP connect scanner.
///
/// Holds the scan configuration and the collaborators the engine needs: the
/// connect primitive and the service table used when freezing results.
pub struct Scanner {
    config: ScanConfig,
    connector: Arc<dyn Connector>,
    services: Arc<dyn ServiceLookup>,
    progress: Option<ProgressBar>,
}

impl Scanner {
    /// Create a scanner using the OS TCP stack and the built-in service
    /// table.
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            connector: Arc::new(TcpConnector),
            services: Arc::new(WellKnownServices),
            progress: None,
        }
    }

    /// Use a different connect primitive.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Use a different service table.
    pub fn with_services(mut self, services: Arc<dyn ServiceLookup>) -> Self {
        self.services = services;
        self
    }

    /// Report job completion on a progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Resolve `hosts` and scan them on a dedicated runtime sized by
    /// [`ScanConfig::workers`].
    pub fn scan_blocking(&self, hosts: &str) -> ScanResult<ScanResults> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.workers)
            .thread_name("bps-worker")
            .enable_all()
            .build()
            .map_err(ScanError::Runtime)?;

        debug!(workers = self.config.workers, "Started scan runtime");
        runtime.block_on(self.scan(hosts))
    }

    /// Resolve a comma-separated host list and scan every target that
    /// resolved. Tokens that fail to resolve are listed in the results.
    pub async fn scan(&self, hosts: &str) -> ScanResult<ScanResults> {
        let resolution = resolve_targets(hosts).await;
        if resolution.targets.is_empty() {
            return Err(ScanError::NoTargets);
        }

        let mut results = self.run(resolution.targets).await;
        results.resolution_errors = resolution.errors.iter().map(ToString::to_string).collect();
        Ok(results)
    }

    /// Scan already resolved targets on the current runtime.
    ///
    /// Targets sharing a display name are scanned once.
    pub async fn run(&self, targets: Vec<Target>) -> ScanResults {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut seen = HashSet::new();
        let targets: Vec<Arc<Target>> = targets
            .into_iter()
            .filter(|t| seen.insert(t.name().to_string()))
            .map(Arc::new)
            .collect();
        let shared = Arc::new(Shared {
            store: ResultStore::new(&targets),
            throttle: Throttle::new(self.config.timing.max_connections),
            stats: ScanStats::new(),
            connector: Arc::clone(&self.connector),
            retry: self.config.retry,
            timeout: self.config.timing.timeout,
            defer_delay: self.config.defer_delay(),
            show_closed: self.config.show_closed,
            progress: self.progress.clone(),
        });

        if let Some(pb) = &shared.progress {
            pb.set_length((targets.len() * self.config.ports.len()) as u64);
        }

        info!(
            targets = targets.len(),
            ports = %self.config.ports,
            timing = %self.config.timing,
            "Starting scan"
        );

        let pending = Arc::new(Semaphore::new(self.config.max_pending));
        let (keep_alive, mut drained) = mpsc::channel::<()>(1);
        'submit: for target in &targets {
            for port in self.config.ports.iter() {
                let Ok(slot) = Arc::clone(&pending).acquire_owned().await else {
                    break 'submit;
                };
                shared.stats.job_submitted();
                let job = ScanJob::new(Arc::clone(target), port);
                tokio::spawn(run_job(Arc::clone(&shared), job, slot, keep_alive.clone()));
            }
        }
        drop(keep_alive);

        // Every job holds a sender; the channel closes when the last one
        // finishes, retries included.
        let _ = drained.recv().await;

        if let Some(pb) = &shared.progress {
            pb.finish_and_clear();
        }

        let mut summary = shared.stats.summary();
        summary.peak_in_flight = shared.throttle.peak() as u64;

        info!(
            open = summary.open,
            dropped = summary.dropped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Scan complete"
        );

        ScanResults {
            started_at,
            completed_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            timing: self.config.timing,
            ports: self.config.ports,
            show_closed: self.config.show_closed,
            summary,
            targets: shared.store.freeze(self.services.as_ref()),
            resolution_errors: Vec::new(),
        }
    }
}

/// Drive one job to a final state.
///
/// Throttle deferrals and resource-exhaustion retries both happen inside
/// this task, after the previous attempt's socket and timer are gone. The
/// pending slot is returned when the task ends.
async fn run_job(
    shared: Arc<Shared>,
    mut job: ScanJob,
    _slot: OwnedSemaphorePermit,
    _keep_alive: mpsc::Sender<()>,
) {
    loop {
        let Some(permit) = shared.throttle.try_acquire() else {
            shared.stats.deferred(&job);
            tokio::time::sleep(shared.defer_delay).await;
            continue;
        };

        let addr = job.target.socket_addr(job.port);
        match probe::probe(shared.connector.as_ref(), addr, shared.timeout, permit).await {
            Outcome::Exhausted(err) => match shared.retry.next(&job) {
                RetryDecision::Retry { delay, job: next } => {
                    shared.stats.retrying(&next, &err);
                    tokio::time::sleep(delay).await;
                    job = next;
                }
                RetryDecision::Exhausted => {
                    shared.stats.dropped(&job);
                    break;
                }
            },
            outcome => {
                shared.record(&job, &outcome);
                break;
            }
        }
    }

    if let Some(pb) = &shared.progress {
        pb.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::PortInfo;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::io;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// A host with a fixed set of listening ports that refuses everything
    /// else.
    struct FakeHost {
        open: HashSet<u16>,
    }

    #[async_trait]
    impl Connector for FakeHost {
        async fn handshake(&self, addr: SocketAddr) -> io::Result<()> {
            if self.open.contains(&addr.port()) {
                Ok(())
            } else {
                Err(io::ErrorKind::ConnectionRefused.into())
            }
        }
    }

    /// Fails every attempt with the given error.
    struct AlwaysFails(fn() -> io::Error);

    #[async_trait]
    impl Connector for AlwaysFails {
        async fn handshake(&self, _addr: SocketAddr) -> io::Result<()> {
            Err((self.0)())
        }
    }

    struct NeverConnects;

    #[async_trait]
    impl Connector for NeverConnects {
        async fn handshake(&self, _addr: SocketAddr) -> io::Result<()> {
            std::future::pending::<io::Result<()>>().await
        }
    }

    /// Records how many handshakes overlap.
    #[derive(Default)]
    struct Overlap {
        current: AtomicUsize,
        max_seen: AtomicUsize,
    }

    #[async_trait]
    impl Connector for Overlap {
        async fn handshake(&self, _addr: SocketAddr) -> io::Result<()> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Err(io::ErrorKind::ConnectionRefused.into())
        }
    }

    fn localhost() -> Target {
        Target::literal(Ipv4Addr::LOCALHOST)
    }

    fn config(start: u16, end: u16) -> ScanConfig {
        ScanConfig::new(
            PortRange::new(start, end).unwrap(),
            TimingProfile::custom(100, Duration::from_secs(1)),
        )
    }

    fn ports_of(results: &ScanResults, name: &str) -> Vec<PortInfo> {
        results
            .target(name)
            .expect("target missing from results")
            .ports
            .iter()
            .map(|p| PortInfo::new(p.port, p.state))
            .collect()
    }

    #[test]
    fn test_worker_count_at_least_one() {
        assert!(worker_count() >= 1);
    }

    #[test]
    fn test_defer_delay_is_timeout_plus_grace() {
        let config = ScanConfig::new(PortRange::single(80), TimingProfile::from_level(0).unwrap());
        assert_eq!(config.defer_delay(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_listener_reported_open() {
        let host = FakeHost {
            open: HashSet::from([8080]),
        };
        let scanner = Scanner::new(config(8000, 8100)).with_connector(Arc::new(host));

        let results = scanner.run(vec![localhost()]).await;

        assert_eq!(
            ports_of(&results, "127.0.0.1"),
            [PortInfo::new(8080, PortState::Open)]
        );
        assert_eq!(results.summary.jobs, 101);
        assert_eq!(results.summary.closed, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_ports_hidden_by_default() {
        let host = Arc::new(FakeHost {
            open: HashSet::new(),
        });

        let hidden = Scanner::new(config(9999, 9999)).with_connector(host.clone());
        let results = hidden.run(vec![localhost()]).await;
        assert!(ports_of(&results, "127.0.0.1").is_empty());

        let shown = Scanner::new(config(9999, 9999).with_closed()).with_connector(host);
        let results = shown.run(vec![localhost()]).await;
        assert_eq!(
            ports_of(&results, "127.0.0.1"),
            [PortInfo::new(9999, PortState::Closed)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_filtered() {
        let scanner = Scanner::new(config(22, 23)).with_connector(Arc::new(NeverConnects));

        let results = scanner.run(vec![localhost()]).await;

        assert_eq!(
            ports_of(&results, "127.0.0.1"),
            [
                PortInfo::new(22, PortState::Filtered),
                PortInfo::new(23, PortState::Filtered)
            ]
        );
        assert_eq!(results.summary.timed_out, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_reported_filtered() {
        let scanner = Scanner::new(config(25, 25))
            .with_connector(Arc::new(AlwaysFails(|| io::ErrorKind::PermissionDenied.into())));

        let results = scanner.run(vec![localhost()]).await;

        assert_eq!(
            ports_of(&results, "127.0.0.1"),
            [PortInfo::new(25, PortState::Filtered)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_errors_not_recorded() {
        let scanner = Scanner::new(config(1, 10))
            .with_connector(Arc::new(AlwaysFails(|| io::ErrorKind::ConnectionReset.into())));

        let results = scanner.run(vec![localhost()]).await;

        assert!(ports_of(&results, "127.0.0.1").is_empty());
        assert_eq!(results.summary.unknown, 10);
    }

    #[cfg(unix)]
    #[tokio::test(start_paused = true)]
    async fn test_exhausted_jobs_dropped_without_blocking() {
        let scanner = Scanner::new(config(1, 20))
            .with_connector(Arc::new(AlwaysFails(|| io::Error::from_raw_os_error(libc::EMFILE))));

        let results = scanner.run(vec![localhost()]).await;

        assert!(ports_of(&results, "127.0.0.1").is_empty());
        assert_eq!(results.summary.dropped, 20);
        assert_eq!(results.summary.retries, 20 * u64::from(MAX_RETRIES));
        assert_eq!(results.summary.finished(), results.summary.jobs);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_never_exceeds_bound() {
        let overlap = Arc::new(Overlap::default());
        let config = ScanConfig::new(
            PortRange::new(1, 200).unwrap(),
            TimingProfile::custom(4, Duration::from_secs(1)),
        )
        .with_closed();
        let scanner = Scanner::new(config).with_connector(overlap.clone());

        let results = scanner.run(vec![localhost()]).await;

        assert!(overlap.max_seen.load(Ordering::SeqCst) <= 4);
        assert!(results.summary.peak_in_flight <= 4);
        assert!(results.summary.deferrals > 0);
        assert_eq!(ports_of(&results, "127.0.0.1").len(), 200);
    }

    /// Records the most tasks alive on the runtime during any handshake.
    #[derive(Default)]
    struct TaskCounter {
        max_alive: AtomicUsize,
    }

    #[async_trait]
    impl Connector for TaskCounter {
        async fn handshake(&self, _addr: SocketAddr) -> io::Result<()> {
            let alive = tokio::runtime::Handle::current().metrics().num_alive_tasks();
            self.max_alive.fetch_max(alive, Ordering::SeqCst);
            Err(io::ErrorKind::ConnectionRefused.into())
        }
    }

    #[test]
    fn test_default_pending_bound_follows_timing() {
        let config = ScanConfig::new(PortRange::single(80), TimingProfile::from_level(3).unwrap());
        assert_eq!(config.max_pending, 2500 * PENDING_PER_CONNECTION);
        assert_eq!(config.clone().with_max_pending(0).max_pending, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_tasks_bounded_for_large_matrix() {
        let counter = Arc::new(TaskCounter::default());
        let config = ScanConfig::new(
            PortRange::new(1, 500).unwrap(),
            TimingProfile::custom(10, Duration::from_secs(1)),
        )
        .with_max_pending(32);
        let scanner = Scanner::new(config).with_connector(counter.clone());
        let targets: Vec<Target> = (1..=16)
            .map(|i| Target::literal(Ipv4Addr::new(10, 0, 0, i)))
            .collect();

        let results = scanner.run(targets).await;

        // A task that has just given its slot back may still be counted.
        assert!(counter.max_alive.load(Ordering::SeqCst) <= 2 * 32);
        assert_eq!(results.summary.jobs, 16 * 500);
        assert_eq!(results.summary.closed, 16 * 500);
        assert_eq!(results.targets.len(), 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_targets_scanned_once() {
        let scanner = Scanner::new(config(1, 10).with_closed()).with_connector(Arc::new(FakeHost {
            open: HashSet::from([5]),
        }));

        let results = scanner.run(vec![localhost(), localhost()]).await;

        assert_eq!(results.targets.len(), 1);
        assert_eq!(results.summary.jobs, 10);
        assert_eq!(results.summary.closed, 9);
        assert_eq!(ports_of(&results, "127.0.0.1").len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_target_reported() {
        let host = FakeHost {
            open: HashSet::from([443]),
        };
        let scanner = Scanner::new(config(440, 445)).with_connector(Arc::new(host));
        let targets = vec![
            localhost(),
            Target::new("gateway", Ipv4Addr::new(10, 0, 0, 1)),
        ];

        let results = scanner.run(targets).await;

        assert_eq!(results.targets.len(), 2);
        for name in ["127.0.0.1", "gateway"] {
            assert_eq!(
                ports_of(&results, name),
                [PortInfo::new(443, PortState::Open)]
            );
        }
        assert_eq!(results.target("gateway").unwrap().ports[0].service, "https");
    }

    #[tokio::test]
    async fn test_scan_real_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let start = port.saturating_sub(5);
        let end = port.saturating_add(5);

        let scanner = Scanner::new(config(start, end));
        let results = scanner.run(vec![localhost()]).await;

        let ports = ports_of(&results, "127.0.0.1");
        assert!(ports.contains(&PortInfo::new(port, PortState::Open)));
        assert!(ports.iter().all(|p| p.state != PortState::Closed));
    }

    #[tokio::test]
    async fn test_scan_real_refused_port_hidden() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let scanner = Scanner::new(config(port, port));
        let results = scanner.run(vec![localhost()]).await;

        assert!(ports_of(&results, "127.0.0.1").is_empty());
        assert_eq!(results.summary.closed, 1);
    }

    #[tokio::test]
    async fn test_scan_skips_unresolvable_tokens() {
        let scanner = Scanner::new(config(1, 1)).with_connector(Arc::new(FakeHost {
            open: HashSet::new(),
        }));

        let results = scanner.scan("bad host!,127.0.0.1").await.unwrap();

        assert_eq!(results.targets.len(), 1);
        assert!(results.target("bad host!").is_none());
        assert_eq!(results.resolution_errors.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_with_no_usable_targets() {
        let scanner = Scanner::new(config(1, 1));
        assert!(matches!(
            scanner.scan("bad host!, ::1").await,
            Err(ScanError::NoTargets)
        ));
    }

    #[test]
    fn test_scan_blocking_runs_own_runtime() {
        let scanner = Scanner::new(config(7, 7).with_workers(1)).with_connector(Arc::new(FakeHost {
            open: HashSet::from([7]),
        }));

        let results = scanner.scan_blocking("127.0.0.1").unwrap();

        assert_eq!(results.target("127.0.0.1").unwrap().ports[0].service, "echo");
    }
}
