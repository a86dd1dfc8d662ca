//! The scan engine.
//!
//! A run moves through `Idle → Discovering → Scanning → Aggregating → Done`.
//! Discovery probes a small port set per host to find live hosts; scanning
//! probes the full port domain on live hosts only. Both phases share one
//! semaphore whose permit count is the concurrency ceiling, so the number of
//! in-flight probes never exceeds it regardless of how many hosts are in play.

use crate::error::{ScanError, ScanResult};
use crate::report::ScanReport;
use crate::scanner::rate_limiter::RateLimiter;
use crate::scanner::sink::OutcomeSink;
use crate::scanner::traits::{ProbeOptions, ProbeOutcome, Prober};
use crate::types::{Port, PortDomain, RunId, TargetDomain};
use chrono::Utc;
use futures::stream::{self, FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Ports probed during discovery unless configured otherwise.
pub const DEFAULT_DISCOVERY_PORTS: &[u16] = &[80, 443, 22];

/// Lifecycle of a single run. Transitions only ever go one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Discovering,
    Scanning,
    Aggregating,
    Done,
}

impl Phase {
    /// The only phase this one may move to.
    pub const fn next(self) -> Option<Phase> {
        match self {
            Self::Idle => Some(Self::Discovering),
            Self::Discovering => Some(Self::Scanning),
            Self::Scanning => Some(Self::Aggregating),
            Self::Aggregating => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Discovering => write!(f, "discovering"),
            Self::Scanning => write!(f, "scanning"),
            Self::Aggregating => write!(f, "aggregating"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Engine-level configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Maximum simultaneously in-flight probes across the whole run.
    pub concurrency: usize,
    /// Connect timeout for scanning-phase probes.
    pub timeout: Duration,
    /// Read a banner from open ports during scanning.
    pub grab_banners: bool,
    /// How long to wait for a banner after connecting.
    pub banner_timeout: Duration,
    /// Ports probed to decide liveness.
    pub discovery_ports: Vec<Port>,
    /// Connect timeout for discovery probes.
    pub discovery_timeout: Duration,
    /// Stop probing a host's discovery ports once one is open.
    pub discovery_early_exit: bool,
    /// Probes per second across the run, 0 for unlimited.
    pub rate_limit: u32,
    /// Treat every target as alive instead of probing discovery ports.
    pub assume_alive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            timeout: Duration::from_secs(1),
            grab_banners: false,
            banner_timeout: Duration::from_millis(500),
            discovery_ports: DEFAULT_DISCOVERY_PORTS
                .iter()
                .filter_map(|&p| Port::new(p))
                .collect(),
            discovery_timeout: Duration::from_millis(500),
            discovery_early_exit: true,
            rate_limit: 0,
            assume_alive: false,
        }
    }
}

impl ScanConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_banners(mut self, banner_timeout: Duration) -> Self {
        self.grab_banners = true;
        self.banner_timeout = banner_timeout;
        self
    }

    pub fn with_discovery_ports(mut self, ports: Vec<Port>) -> Self {
        self.discovery_ports = ports;
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_early_exit(mut self, early_exit: bool) -> Self {
        self.discovery_early_exit = early_exit;
        self
    }

    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limit = rate;
        self
    }

    pub fn with_assume_alive(mut self, assume_alive: bool) -> Self {
        self.assume_alive = assume_alive;
        self
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> ScanResult<()> {
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(ScanError::InvalidConfig(format!(
                "concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.timeout.is_zero() || self.discovery_timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.grab_banners && self.banner_timeout.is_zero() {
            return Err(ScanError::InvalidConfig(
                "banner timeout must be greater than zero".to_string(),
            ));
        }
        if self.discovery_ports.is_empty() && !self.assume_alive {
            return Err(ScanError::InvalidConfig(
                "at least one discovery port is required".to_string(),
            ));
        }
        Ok(())
    }

    fn discovery_options(&self) -> ProbeOptions {
        ProbeOptions::connect(self.discovery_timeout)
    }

    fn scan_options(&self) -> ProbeOptions {
        let options = ProbeOptions::connect(self.timeout);
        if self.grab_banners {
            options.with_banner(self.banner_timeout)
        } else {
            options
        }
    }
}

/// Maps a port to a display service name.
pub type ServiceLookup = Arc<dyn Fn(Port) -> Option<String> + Send + Sync>;

/// Everything a probe task needs, cheap to clone into each task.
#[derive(Clone)]
struct Dispatch {
    prober: Arc<dyn Prober>,
    permits: Arc<Semaphore>,
    limiter: Option<RateLimiter>,
    cancel: CancellationToken,
}

impl Dispatch {
    /// Run one probe under a permit. Returns `None` if the run was cancelled
    /// before the probe could start.
    async fn probe(&self, host: Ipv4Addr, port: Port, options: ProbeOptions) -> Option<ProbeOutcome> {
        if let Some(limiter) = &self.limiter {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = limiter.wait() => {}
            }
        }

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            permit = self.permits.acquire() => permit.ok()?,
        };

        Some(self.prober.probe(host, port, &options).await)
    }

    /// Probe a host's discovery ports; alive once any of them is open.
    async fn is_alive(&self, host: Ipv4Addr, ports: &[Port], options: ProbeOptions, early_exit: bool) -> HostCheck {
        let mut pending: FuturesUnordered<_> = ports
            .iter()
            .map(|&port| self.probe(host, port, options))
            .collect();

        let mut alive = false;
        let mut completed = 0;
        while let Some(outcome) = pending.next().await {
            let Some(outcome) = outcome else { continue };
            completed += 1;
            if outcome.is_open() {
                alive = true;
                if early_exit {
                    // Remaining probes are dropped here.
                    break;
                }
            }
        }

        HostCheck {
            alive,
            probes: completed,
            // Liveness is settled once a port answered or every port was tried.
            finished: alive || completed == ports.len(),
        }
    }
}

/// Discovery verdict for one host.
#[derive(Debug, Clone, Copy)]
struct HostCheck {
    alive: bool,
    probes: usize,
    finished: bool,
}

/// Orchestrates one scan run. Create a fresh engine per invocation.
pub struct ScanEngine {
    prober: Arc<dyn Prober>,
    phase: Phase,
    transitions: Vec<Phase>,
    cancel: CancellationToken,
    services: ServiceLookup,
    progress: Option<ProgressBar>,
}

impl ScanEngine {
    pub fn new(prober: impl Prober + 'static) -> Self {
        Self::from_arc(Arc::new(prober))
    }

    pub fn from_arc(prober: Arc<dyn Prober>) -> Self {
        Self {
            prober,
            phase: Phase::Idle,
            transitions: vec![Phase::Idle],
            cancel: CancellationToken::new(),
            services: Arc::new(|port: Port| crate::services::service_name(port.as_u16()).map(str::to_string)),
            progress: None,
        }
    }

    /// Stop submitting new probes once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replace the port → service name lookup used in the report.
    pub fn with_service_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(Port) -> Option<String> + Send + Sync + 'static,
    {
        self.services = Arc::new(lookup);
        self
    }

    /// Tick `progress` as work completes.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase this engine has been in, in order.
    pub fn transitions(&self) -> &[Phase] {
        &self.transitions
    }

    fn advance(&mut self, to: Phase) -> ScanResult<()> {
        if self.phase.next() != Some(to) {
            return Err(ScanError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        debug!(from = %self.phase, %to, "phase transition");
        self.phase = to;
        self.transitions.push(to);
        if let Some(pb) = &self.progress {
            pb.set_message(to.to_string());
        }
        Ok(())
    }

    /// Execute the run.
    ///
    /// Fails before any probing on an empty domain or invalid configuration.
    /// Cancellation is not an error: the report comes back marked partial.
    pub async fn run(
        &mut self,
        targets: &TargetDomain,
        ports: &PortDomain,
        config: &ScanConfig,
    ) -> ScanResult<ScanReport> {
        if self.phase != Phase::Idle {
            return Err(ScanError::AlreadyRun);
        }
        if targets.is_empty() {
            return Err(ScanError::EmptyTargetDomain);
        }
        if ports.is_empty() {
            return Err(ScanError::EmptyPortDomain);
        }
        config.validate()?;

        let run_id = RunId::new();
        let span = info_span!("scan", run = %run_id.short());
        self.execute(run_id, targets, ports, config)
            .instrument(span)
            .await
    }

    async fn execute(
        &mut self,
        run_id: RunId,
        targets: &TargetDomain,
        ports: &PortDomain,
        config: &ScanConfig,
    ) -> ScanResult<ScanReport> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let dispatch = Dispatch {
            prober: Arc::clone(&self.prober),
            permits: Arc::new(Semaphore::new(config.concurrency)),
            limiter: RateLimiter::new(config.rate_limit),
            cancel: self.cancel.clone(),
        };

        self.advance(Phase::Discovering)?;
        info!(
            hosts = targets.len(),
            discovery_ports = config.discovery_ports.len(),
            concurrency = config.concurrency,
            "discovering live hosts"
        );
        let discovery = self.discover(&dispatch, targets, config).await;
        info!(alive = discovery.alive.len(), "discovery finished");

        self.advance(Phase::Scanning)?;
        info!(
            hosts = discovery.alive.len(),
            ports = ports.len(),
            "scanning live hosts"
        );
        let mut sink = OutcomeSink::new(&discovery.alive);
        self.scan(&dispatch, &discovery.alive, ports, config, &mut sink)
            .await;

        self.advance(Phase::Aggregating)?;
        let partial = self.cancel.is_cancelled();
        if partial {
            warn!("scan cancelled, report is partial");
        }
        let services = Arc::clone(&self.services);
        let (hosts, mut summary) = sink.finish(move |port| (*services)(port));
        summary.hosts_scanned = discovery.hosts_completed;
        summary.hosts_alive = hosts.len();
        summary.discovery_probes = discovery.probes;
        summary.elapsed_ms = clock.elapsed().as_millis() as u64;

        let report = ScanReport {
            run_id,
            started_at,
            completed_at: Utc::now(),
            partial,
            hosts,
            summary,
        };
        info!(summary = %report.summary_line(), "scan complete");

        self.advance(Phase::Done)?;
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        Ok(report)
    }

    async fn discover(&self, dispatch: &Dispatch, targets: &TargetDomain, config: &ScanConfig) -> Discovery {
        let options = config.discovery_options();
        let early_exit = config.discovery_early_exit;
        let ports: Arc<[Port]> = config.discovery_ports.clone().into();

        if let Some(pb) = &self.progress {
            pb.set_length(targets.len() as u64);
            pb.set_position(0);
        }

        if config.assume_alive {
            return self.assume_all_alive(targets);
        }

        let results = stream::iter(targets.iter().enumerate())
            .take_until(self.cancel.cancelled())
            .map(|(index, host)| {
                let dispatch = dispatch.clone();
                let ports = Arc::clone(&ports);
                async move {
                    let check = dispatch.is_alive(host, &ports, options, early_exit).await;
                    (index, host, check)
                }
            })
            .buffer_unordered(config.concurrency);
        tokio::pin!(results);

        let mut alive = vec![None; targets.len()];
        let mut discovery = Discovery::default();
        while let Some((index, host, check)) = results.next().await {
            discovery.probes += check.probes;
            // A host cut short by cancellation has no verdict.
            if check.finished {
                discovery.hosts_completed += 1;
            }
            if check.alive {
                debug!(%host, "host is alive");
                alive[index] = Some(host);
            }
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        discovery.alive = alive.into_iter().flatten().collect();
        discovery
    }

    /// Discovery without probes: every target is live unless the run was
    /// already cancelled.
    fn assume_all_alive(&self, targets: &TargetDomain) -> Discovery {
        if self.cancel.is_cancelled() {
            return Discovery::default();
        }

        debug!(hosts = targets.len(), "liveness probing disabled, assuming all hosts alive");
        if let Some(pb) = &self.progress {
            pb.inc(targets.len() as u64);
        }
        Discovery {
            alive: targets.iter().collect(),
            hosts_completed: targets.len(),
            probes: 0,
        }
    }

    async fn scan(
        &self,
        dispatch: &Dispatch,
        live_hosts: &[Ipv4Addr],
        ports: &PortDomain,
        config: &ScanConfig,
        sink: &mut OutcomeSink,
    ) {
        let options = config.scan_options();

        if let Some(pb) = &self.progress {
            pb.set_length((live_hosts.len() * ports.len()) as u64);
            pb.set_position(0);
        }

        let work = live_hosts
            .iter()
            .enumerate()
            .flat_map(|(index, &host)| ports.iter().map(move |port| (index, host, port)));

        let outcomes = stream::iter(work)
            .take_until(self.cancel.cancelled())
            .map(|(index, host, port)| {
                let dispatch = dispatch.clone();
                async move {
                    dispatch
                        .probe(host, port, options)
                        .await
                        .map(|outcome| (index, outcome))
                }
            })
            .buffer_unordered(config.concurrency);
        tokio::pin!(outcomes);

        while let Some(completed) = outcomes.next().await {
            let Some((index, outcome)) = completed else { continue };
            sink.record(index, outcome);
            if let Some(pb) = &self.progress {
                let tally = sink.tally();
                pb.inc(1);
                pb.set_message(format!("{} open, {} filtered", tally.open, tally.filtered));
            }
        }
    }
}

/// What discovery learned.
#[derive(Debug, Default)]
struct Discovery {
    /// Live hosts in target order.
    alive: Vec<Ipv4Addr>,
    hosts_completed: usize,
    probes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ScanSummary;
    use crate::scanner::traits::ProbeStatus;
    use crate::types::{PortSpec, TargetSpec};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn port(n: u16) -> Port {
        Port::new(n).unwrap()
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    /// Deterministic prober: fixed statuses per endpoint, everything else
    /// closed. Optionally sleeps to make overlap observable and records
    /// every call in order.
    #[derive(Default)]
    struct MockProber {
        table: HashMap<(Ipv4Addr, u16), ProbeStatus>,
        delay: Duration,
        calls: Mutex<Vec<(Ipv4Addr, u16, ProbeOptions)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockProber {
        fn with(mut self, host: &str, port: u16, status: ProbeStatus) -> Self {
            self.table.insert((ip(host), port), status);
            self
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Prober for MockProber {
        async fn probe(&self, host: Ipv4Addr, port: Port, options: &ProbeOptions) -> ProbeOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push((host, port.as_u16(), *options));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let elapsed = Duration::from_millis(1);
            match self.table.get(&(host, port.as_u16())) {
                Some(ProbeStatus::Open) => ProbeOutcome::open(host, port, elapsed),
                Some(ProbeStatus::Filtered) => ProbeOutcome::filtered(host, port, elapsed),
                Some(ProbeStatus::Error) => ProbeOutcome::error(host, port, elapsed, "mock failure"),
                Some(ProbeStatus::Closed) | None => ProbeOutcome::closed(host, port, elapsed),
            }
        }
    }

    /// Forwards to a shared mock so the test can inspect it after the run.
    struct Shared(Arc<MockProber>);

    #[async_trait]
    impl Prober for Shared {
        async fn probe(&self, host: Ipv4Addr, port: Port, options: &ProbeOptions) -> ProbeOutcome {
            self.0.probe(host, port, options).await
        }
    }

    async fn targets(spec: &str) -> TargetDomain {
        TargetSpec::parse(spec)
            .unwrap()
            .expand(TargetSpec::MAX_CIDR_HOSTS)
            .await
            .unwrap()
    }

    fn ports(spec: &str) -> PortDomain {
        PortSpec::resolve(Some(spec)).unwrap()
    }

    #[tokio::test]
    async fn test_single_live_host_in_slash30() {
        let prober = MockProber::default().with("10.0.0.1", 80, ProbeStatus::Open);
        let mut engine = ScanEngine::new(prober);

        let report = engine
            .run(&targets("10.0.0.0/30").await, &PortSpec::resolve(None).unwrap(), &ScanConfig::default())
            .await
            .unwrap();

        assert_eq!(report.hosts.len(), 1);
        let host = &report.hosts[0];
        assert_eq!(host.address, ip("10.0.0.1"));
        assert_eq!(host.open_ports.len(), 1);
        assert_eq!(host.open_ports[0].port, port(80));
        assert_eq!(host.open_ports[0].service.as_deref(), Some("HTTP"));
        for absent in ["10.0.0.0", "10.0.0.2", "10.0.0.3"] {
            assert!(report.host(ip(absent)).is_none());
        }
        assert_eq!(report.summary.hosts_scanned, 4);
        assert_eq!(report.summary.hosts_alive, 1);
        assert!(!report.partial);
    }

    #[tokio::test]
    async fn test_phases_run_in_order_and_engine_is_single_use() {
        let prober = MockProber::default().with("10.0.0.1", 22, ProbeStatus::Open);
        let mut engine = ScanEngine::new(prober);
        assert_eq!(engine.phase(), Phase::Idle);

        let domain = targets("10.0.0.1").await;
        engine
            .run(&domain, &ports("22"), &ScanConfig::default())
            .await
            .unwrap();

        assert_eq!(engine.phase(), Phase::Done);
        assert_eq!(
            engine.transitions(),
            &[
                Phase::Idle,
                Phase::Discovering,
                Phase::Scanning,
                Phase::Aggregating,
                Phase::Done
            ]
        );
        assert_eq!(
            engine
                .run(&domain, &ports("22"), &ScanConfig::default())
                .await
                .unwrap_err(),
            ScanError::AlreadyRun
        );
    }

    #[test]
    fn test_phase_cannot_skip() {
        assert_eq!(Phase::Idle.next(), Some(Phase::Discovering));
        assert_eq!(Phase::Done.next(), None);

        let mut engine = ScanEngine::new(MockProber::default());
        assert_eq!(
            engine.advance(Phase::Scanning),
            Err(ScanError::InvalidTransition {
                from: Phase::Idle,
                to: Phase::Scanning
            })
        );
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_discovery_completes_before_scanning() {
        let mock = Arc::new(
            MockProber::default()
                .with("10.0.0.1", 80, ProbeStatus::Open)
                .with("10.0.0.2", 443, ProbeStatus::Open)
                .delayed(Duration::from_millis(2)),
        );
        let config = ScanConfig::default()
            .with_discovery_timeout(Duration::from_millis(321))
            .with_timeout(Duration::from_millis(999))
            .with_concurrency(4);
        let mut engine = ScanEngine::new(Shared(Arc::clone(&mock)));

        engine
            .run(&targets("10.0.0.0/29").await, &ports("1-20"), &config)
            .await
            .unwrap();

        let calls = mock.calls.lock().unwrap();
        let first_scan = calls
            .iter()
            .position(|(_, _, o)| o.connect_timeout == config.timeout)
            .unwrap();
        assert!(calls[first_scan..]
            .iter()
            .all(|(_, _, o)| o.connect_timeout == config.timeout));
        // Only the two live hosts are scanned.
        assert_eq!(calls.len() - first_scan, 2 * 20);
        assert!(calls[first_scan..]
            .iter()
            .all(|(h, _, _)| *h == ip("10.0.0.1") || *h == ip("10.0.0.2")));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_never_exceeded() {
        let mut mock = MockProber::default().delayed(Duration::from_millis(5));
        for n in 0..16 {
            mock = mock.with(&format!("10.1.0.{n}"), 80, ProbeStatus::Open);
        }
        let mock = Arc::new(mock);
        let config = ScanConfig::default().with_concurrency(8).with_early_exit(false);
        let mut engine = ScanEngine::new(Shared(Arc::clone(&mock)));

        let report = engine
            .run(&targets("10.1.0.0/28").await, &ports("1-40"), &config)
            .await
            .unwrap();

        let peak = mock.peak.load(Ordering::SeqCst);
        assert!(peak <= 8, "peak concurrency {peak} exceeded ceiling");
        assert!(peak > 1, "probes never overlapped");
        assert_eq!(report.summary.hosts_alive, 16);
        assert_eq!(report.summary.probes, 16 * 40);
        assert_eq!(report.summary.discovery_probes, 16 * 3);
    }

    #[tokio::test]
    async fn test_ceiling_of_one_serialises_probes() {
        let mock = Arc::new(
            MockProber::default()
                .with("10.2.0.1", 443, ProbeStatus::Open)
                .delayed(Duration::from_millis(1)),
        );
        let config = ScanConfig::default().with_concurrency(1);
        let mut engine = ScanEngine::new(Shared(Arc::clone(&mock)));

        engine
            .run(&targets("10.2.0.0/30").await, &ports("440-450"), &config)
            .await
            .unwrap();
        assert_eq!(mock.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_runs_are_idempotent() {
        let build = || {
            MockProber::default()
                .with("10.0.0.1", 22, ProbeStatus::Open)
                .with("10.0.0.1", 80, ProbeStatus::Open)
                .with("10.0.0.1", 443, ProbeStatus::Filtered)
                .with("10.0.0.3", 80, ProbeStatus::Open)
                .with("10.0.0.3", 8080, ProbeStatus::Open)
                .with("10.0.0.3", 21, ProbeStatus::Error)
        };
        let domain = targets("10.0.0.0/30").await;
        let port_domain = PortSpec::resolve(None).unwrap();
        let config = ScanConfig::default().with_concurrency(3);

        let first = ScanEngine::new(build())
            .run(&domain, &port_domain, &config)
            .await
            .unwrap();
        let second = ScanEngine::new(build())
            .run(&domain, &port_domain, &config)
            .await
            .unwrap();

        assert_eq!(first.hosts, second.hosts);
        let counts = |r: &ScanReport| ScanSummary {
            elapsed_ms: 0,
            ..r.summary.clone()
        };
        assert_eq!(counts(&first), counts(&second));

        assert_eq!(
            first.hosts.iter().map(|h| h.address).collect::<Vec<_>>(),
            vec![ip("10.0.0.1"), ip("10.0.0.3")]
        );
        let open: Vec<u16> = first.hosts[1].open_ports.iter().map(|p| p.port.as_u16()).collect();
        assert_eq!(open, vec![80, 8080]);
        assert_eq!(first.summary.filtered_ports, 1);
        assert_eq!(first.summary.errors, 1);
    }

    #[tokio::test]
    async fn test_early_exit_modes() {
        let build = || {
            MockProber::default()
                .with("10.0.0.1", 80, ProbeStatus::Open)
                .with("10.0.0.1", 443, ProbeStatus::Open)
                .with("10.0.0.1", 22, ProbeStatus::Open)
        };
        let domain = targets("10.0.0.1").await;
        // Serial discovery makes the early exit count exact.
        let config = ScanConfig::default().with_concurrency(1);

        let eager = ScanEngine::new(build())
            .run(&domain, &ports("80"), &config)
            .await
            .unwrap();
        assert_eq!(eager.summary.discovery_probes, 1);

        let thorough = ScanEngine::new(build())
            .run(&domain, &ports("80"), &config.clone().with_early_exit(false))
            .await
            .unwrap();
        assert_eq!(thorough.summary.discovery_probes, 3);

        assert_eq!(eager.hosts, thorough.hosts);
    }

    #[tokio::test]
    async fn test_dead_hosts_never_reported() {
        // Open on a scanned port, but not on any discovery port.
        let prober = MockProber::default().with("10.0.0.2", 8080, ProbeStatus::Open);
        let report = ScanEngine::new(prober)
            .run(&targets("10.0.0.0/30").await, &ports("8080"), &ScanConfig::default())
            .await
            .unwrap();

        assert!(report.hosts.is_empty());
        assert_eq!(report.summary.hosts_alive, 0);
        assert_eq!(report.summary.probes, 0);
    }

    #[tokio::test]
    async fn test_live_host_without_open_scan_ports_is_listed() {
        let prober = MockProber::default().with("10.0.0.1", 22, ProbeStatus::Open);
        let report = ScanEngine::new(prober)
            .run(&targets("10.0.0.1").await, &ports("1000-1010"), &ScanConfig::default())
            .await
            .unwrap();

        assert_eq!(report.hosts.len(), 1);
        assert!(report.hosts[0].open_ports.is_empty());
        assert_eq!(report.summary.closed_ports, 11);
    }

    #[tokio::test]
    async fn test_empty_domains_are_fatal() {
        let mut engine = ScanEngine::new(MockProber::default());
        let err = engine
            .run(&TargetDomain::default(), &ports("80"), &ScanConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::EmptyTargetDomain);
        assert_eq!(engine.phase(), Phase::Idle);

        let err = ScanEngine::new(MockProber::default())
            .run(&targets("10.0.0.1").await, &PortDomain::default(), &ScanConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::EmptyPortDomain);
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal_before_probing() {
        let mock = Arc::new(MockProber::default());
        let config = ScanConfig::default().with_concurrency(0);
        let err = ScanEngine::new(Shared(Arc::clone(&mock)))
            .run(&targets("10.0.0.1").await, &ports("80"), &config)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::InvalidConfig(_)));
        assert!(mock.calls.lock().unwrap().is_empty());

        let config = ScanConfig::default().with_discovery_ports(Vec::new());
        assert!(config.validate().is_err());
        assert!(config.with_assume_alive(true).validate().is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_beyond_permit_limit_is_rejected() {
        let config = ScanConfig::default().with_concurrency(usize::MAX);
        assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));

        let mut engine = ScanEngine::new(MockProber::default());
        let err = engine
            .run(&targets("10.0.0.1").await, &ports("80"), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
        assert_eq!(engine.phase(), Phase::Idle);

        let largest = ScanConfig::default().with_concurrency(Semaphore::MAX_PERMITS);
        assert!(largest.validate().is_ok());
    }

    #[tokio::test]
    async fn test_assume_alive_scans_every_target() {
        // Nothing answers on a discovery port; 10.0.0.2 only runs RDP.
        let mock = Arc::new(MockProber::default().with("10.0.0.2", 3389, ProbeStatus::Open));
        let config = ScanConfig::default().with_assume_alive(true);
        let mut engine = ScanEngine::new(Shared(Arc::clone(&mock)));

        let report = engine
            .run(&targets("10.0.0.0/30").await, &ports("3389,5432"), &config)
            .await
            .unwrap();

        assert_eq!(
            engine.transitions(),
            &[
                Phase::Idle,
                Phase::Discovering,
                Phase::Scanning,
                Phase::Aggregating,
                Phase::Done
            ]
        );
        assert_eq!(report.hosts.len(), 4);
        assert_eq!(report.summary.hosts_scanned, 4);
        assert_eq!(report.summary.discovery_probes, 0);
        assert_eq!(report.summary.probes, 8);
        assert!(report.host(ip("10.0.0.2")).unwrap().port(3389).is_some());
        assert!(mock
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|(_, _, o)| o.connect_timeout == config.timeout));
    }

    #[tokio::test]
    async fn test_assume_alive_respects_early_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let report = ScanEngine::new(MockProber::default())
            .with_cancellation(token)
            .run(
                &targets("10.0.0.0/30").await,
                &ports("80"),
                &ScanConfig::default().with_assume_alive(true),
            )
            .await
            .unwrap();

        assert!(report.partial);
        assert!(report.hosts.is_empty());
        assert_eq!(report.summary.hosts_scanned, 0);
    }

    #[tokio::test]
    async fn test_banner_options_reach_scan_probes_only() {
        let mock = Arc::new(MockProber::default().with("10.0.0.1", 80, ProbeStatus::Open));
        let config = ScanConfig::default().with_banners(Duration::from_millis(250));
        ScanEngine::new(Shared(Arc::clone(&mock)))
            .run(&targets("10.0.0.1").await, &ports("80"), &config)
            .await
            .unwrap();

        let calls = mock.calls.lock().unwrap();
        let (discovery, scanning): (Vec<_>, Vec<_>) = calls
            .iter()
            .partition(|(_, _, o)| o.connect_timeout == config.discovery_timeout);
        assert!(discovery.iter().all(|(_, _, o)| !o.wants_banner()));
        assert_eq!(scanning.len(), 1);
        assert_eq!(scanning[0].2.banner_timeout, Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_custom_service_lookup() {
        let prober = MockProber::default()
            .with("10.0.0.1", 80, ProbeStatus::Open)
            .with("10.0.0.1", 9999, ProbeStatus::Open);
        let report = ScanEngine::new(prober)
            .with_service_lookup(|p| Some(format!("svc-{p}")))
            .run(&targets("10.0.0.1").await, &ports("80,9999"), &ScanConfig::default())
            .await
            .unwrap();

        let names: Vec<_> = report.hosts[0]
            .open_ports
            .iter()
            .map(|p| p.service.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["svc-80", "svc-9999"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_yields_empty_partial_report() {
        let mock = Arc::new(MockProber::default().with("10.0.0.1", 80, ProbeStatus::Open));
        let token = CancellationToken::new();
        token.cancel();

        let mut engine = ScanEngine::new(Shared(Arc::clone(&mock))).with_cancellation(token);
        let report = engine
            .run(&targets("10.0.0.0/30").await, &ports("80"), &ScanConfig::default())
            .await
            .unwrap();

        assert!(report.partial);
        assert!(report.hosts.is_empty());
        assert!(mock.calls.lock().unwrap().is_empty());
        assert_eq!(engine.phase(), Phase::Done);
    }

    /// Cancels the run after a fixed number of probes made with one
    /// particular connect timeout, which tells the phases apart.
    struct CancelAfter {
        inner: MockProber,
        counted_timeout: Duration,
        after: usize,
        seen: AtomicUsize,
        token: CancellationToken,
    }

    #[async_trait]
    impl Prober for CancelAfter {
        async fn probe(&self, host: Ipv4Addr, port: Port, options: &ProbeOptions) -> ProbeOutcome {
            if options.connect_timeout == self.counted_timeout
                && self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after
            {
                self.token.cancel();
            }
            self.inner.probe(host, port, options).await
        }
    }

    #[tokio::test]
    async fn test_cancellation_mid_scan_keeps_completed_work() {
        let token = CancellationToken::new();
        let config = ScanConfig::default()
            .with_concurrency(1)
            .with_timeout(Duration::from_millis(777));
        let prober = CancelAfter {
            inner: MockProber::default()
                .with("10.0.0.1", 80, ProbeStatus::Open)
                .with("10.0.0.1", 5, ProbeStatus::Open),
            counted_timeout: config.timeout,
            after: 10,
            seen: AtomicUsize::new(0),
            token: token.clone(),
        };

        let report = ScanEngine::new(prober)
            .with_cancellation(token)
            .run(&targets("10.0.0.1").await, &ports("1-100"), &config)
            .await
            .unwrap();

        assert!(report.partial);
        assert!(report.summary.probes >= 10 && report.summary.probes < 100);
        assert_eq!(report.hosts.len(), 1);
        assert!(report.hosts[0].port(5).is_some());
    }

    #[tokio::test]
    async fn test_host_interrupted_during_discovery_is_not_counted() {
        let token = CancellationToken::new();
        let config = ScanConfig::default().with_concurrency(1);
        // First host answers all three discovery ports closed, the second
        // is cut off after its first one.
        let prober = CancelAfter {
            inner: MockProber::default(),
            counted_timeout: config.discovery_timeout,
            after: 4,
            seen: AtomicUsize::new(0),
            token: token.clone(),
        };

        let report = ScanEngine::new(prober)
            .with_cancellation(token)
            .run(&targets("10.0.0.0/29").await, &ports("80"), &config)
            .await
            .unwrap();

        assert!(report.partial);
        assert_eq!(report.summary.discovery_probes, 4);
        assert_eq!(report.summary.hosts_scanned, 1);
        assert_eq!(report.summary.hosts_alive, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_paces_probes() {
        let prober = MockProber::default().with("10.0.0.1", 80, ProbeStatus::Open);
        let config = ScanConfig::default().with_rate_limit(50).with_early_exit(false);
        let start = Instant::now();

        // 3 discovery + 3 scan probes at 50/s: at least 100ms of spacing.
        ScanEngine::new(prober)
            .run(&targets("10.0.0.1").await, &ports("1-3"), &config)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
