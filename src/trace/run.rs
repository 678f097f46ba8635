use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Result, TraceError};
use crate::probe::{IcmpTransport, ProbeOutcome, ProbeTransport};
use crate::state::{Hop, Target};
use crate::trace::discover::discover_route;
use crate::trace::resolve::{AddressResolver, SystemResolver};
use crate::trace::scheduler::ProbeScheduler;
use crate::trace::sink::ReportSink;

/// Granularity of the interruptible inter-round pause
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Everything the discovery and probing phases share for one run
pub struct RunContext<'a> {
    pub config: &'a Config,
    pub target: IpAddr,
    pub sink: &'a dyn ReportSink,
    transport: &'a mut dyn ProbeTransport,
    cancel: &'a CancellationToken,
    probes_sent: u64,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a Config,
        target: IpAddr,
        transport: &'a mut dyn ProbeTransport,
        sink: &'a dyn ReportSink,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            target,
            sink,
            transport,
            cancel,
            probes_sent: 0,
        }
    }

    /// Send one probe toward the target with the given hop limit
    pub fn probe(&mut self, ttl: u8) -> ProbeOutcome {
        self.probes_sent += 1;
        self.transport.probe(self.target, ttl, self.config.timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn probes_sent(&self) -> u64 {
        self.probes_sent
    }

    /// Sleep for `duration`, waking early on cancellation
    ///
    /// Returns false if the run was cancelled before the pause elapsed.
    pub fn pause(&self, duration: Duration) -> bool {
        // Unrepresentable deadline: wait for cancellation only
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    deadline - now
                }
                None => PAUSE_SLICE,
            };
            std::thread::sleep(remaining.min(PAUSE_SLICE));
        }
    }
}

/// What a finished run leaves behind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub target: Target,
    pub route: Vec<Hop>,
    /// Probing rounds that ran to completion
    pub rounds: u64,
    pub cancelled: bool,
    pub probes_sent: u64,
}

/// Run resolution, discovery and continuous probing on the calling thread
///
/// Blocks until `cancel` fires (or, before probing starts, until resolution
/// fails). Every user-facing message goes through `sink`.
pub fn execute(
    host: &str,
    config: &Config,
    resolver: &dyn AddressResolver,
    transport: &mut dyn ProbeTransport,
    sink: &dyn ReportSink,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    let host = host.trim();
    let resolved = match resolver.resolve(host) {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!("Resolution of {} failed: {}", host, e);
            sink.on_status(&format!("Error: Cannot resolve hostname '{}'", host));
            return Err(e);
        }
    };

    let target = Target::new(host.to_string(), resolved);
    sink.on_target_resolved(&target);
    sink.on_status(&format!("Tracing route to {} [{}]...", host, resolved));

    let mut ctx = RunContext::new(config, resolved, transport, sink, cancel);

    let discovery = discover_route(&mut ctx);
    tracing::info!(
        "Discovery finished: {} hops, reached={}, cancelled={}",
        discovery.route.len(),
        discovery.reached,
        discovery.cancelled
    );

    let mut rounds = 0;
    if !discovery.cancelled {
        sink.on_status("Traceroute complete. Starting continuous ping...");
        let mut scheduler = ProbeScheduler::new(&discovery.route);
        rounds = scheduler.run(&mut ctx);
    }

    sink.on_status("Stopped.");

    Ok(RunSummary {
        target,
        route: discovery.route,
        rounds,
        cancelled: ctx.is_cancelled(),
        probes_sent: ctx.probes_sent(),
    })
}

/// A run executing on its own worker thread
pub struct RunHandle {
    cancel: CancellationToken,
    handle: JoinHandle<Result<RunSummary>>,
}

impl RunHandle {
    /// Ask the worker to stop; it finishes the probe in flight first
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to exit
    pub fn join(self) -> Result<RunSummary> {
        match self.handle.join() {
            Ok(result) => result,
            Err(payload) => Err(TraceError::WorkerPanicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Spawn a run over the real ICMP transport and the system resolver
///
/// The socket is opened on the worker thread; if that fails the error is
/// reported through `sink` and returned from `join()`.
pub fn spawn_run<S>(host: String, config: Config, sink: S) -> Result<RunHandle>
where
    S: ReportSink + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = std::thread::Builder::new()
        .name("pathmon-probe".into())
        .spawn(move || {
            guarded(|| {
                let mut transport = match IcmpTransport::new() {
                    Ok(t) => t,
                    Err(e) => {
                        sink.on_status(&format!("Error: {}", e));
                        return Err(e);
                    }
                };
                execute(&host, &config, &SystemResolver, &mut transport, &sink, &token)
            })
        })?;

    Ok(RunHandle { cancel, handle })
}

/// Spawn a run with caller-supplied resolver and transport
pub fn spawn_run_with<R, T, S>(
    host: String,
    config: Config,
    resolver: R,
    mut transport: T,
    sink: S,
) -> Result<RunHandle>
where
    R: AddressResolver + Send + 'static,
    T: ProbeTransport + Send + 'static,
    S: ReportSink + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = std::thread::Builder::new()
        .name("pathmon-probe".into())
        .spawn(move || {
            guarded(|| execute(&host, &config, &resolver, &mut transport, &sink, &token))
        })?;

    Ok(RunHandle { cancel, handle })
}

/// Convert a worker panic into an error instead of tearing down the consumer
fn guarded<F>(f: F) -> Result<RunSummary>
where
    F: FnOnce() -> Result<RunSummary>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            tracing::error!("Probe worker panicked: {}", msg);
            Err(TraceError::WorkerPanicked(msg))
        }
    }
}
