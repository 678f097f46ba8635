pub mod discover;
pub mod resolve;
pub mod run;
pub mod scheduler;
pub mod sink;

pub use discover::*;
pub use resolve::*;
pub use run::*;
pub use scheduler::*;
pub use sink::*;

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::error::{Result, TraceError};
    use crate::probe::{ProbeOutcome, ProbeTransport};
    use crate::state::{Hop, Snapshot, Target};
    use crate::trace::resolve::AddressResolver;
    use crate::trace::sink::{ReportSink, RunEvent};

    pub struct FixedResolver(Option<IpAddr>);

    impl FixedResolver {
        pub fn ok(ip: IpAddr) -> Self {
            Self(Some(ip))
        }

        pub fn failing() -> Self {
            Self(None)
        }
    }

    impl AddressResolver for FixedResolver {
        fn resolve(&self, host: &str) -> Result<IpAddr> {
            self.0.ok_or_else(|| TraceError::Resolution { host: host.to_string() })
        }
    }

    enum Script {
        /// Outcome per TTL, NoReply past the end
        PerTtl(Vec<ProbeOutcome>),
        Always(ProbeOutcome),
    }

    /// In-memory transport answering from a fixed script
    #[derive(Clone)]
    pub struct ScriptedTransport {
        script: Arc<Script>,
        calls: Arc<Mutex<Vec<(IpAddr, u8)>>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl ScriptedTransport {
        fn with(script: Script) -> Self {
            Self {
                script: Arc::new(script),
                calls: Arc::default(),
                cancel_after: None,
            }
        }

        pub fn new(per_ttl: Vec<ProbeOutcome>) -> Self {
            Self::with(Script::PerTtl(per_ttl))
        }

        pub fn unreachable() -> Self {
            Self::with(Script::Always(ProbeOutcome::NoReply))
        }

        pub fn answering(ip: IpAddr) -> Self {
            Self::with(Script::Always(ProbeOutcome::DestinationReached(ip)))
        }

        /// Fire `token` once `probes` probes have been answered
        pub fn cancel_after(mut self, probes: usize, token: CancellationToken) -> Self {
            self.cancel_after = Some((probes, token));
            self
        }

        pub fn calls(&self) -> Vec<(IpAddr, u8)> {
            self.calls.lock().clone()
        }
    }

    impl ProbeTransport for ScriptedTransport {
        fn probe(&mut self, destination: IpAddr, ttl: u8, _timeout: Duration) -> ProbeOutcome {
            let count = {
                let mut calls = self.calls.lock();
                calls.push((destination, ttl));
                calls.len()
            };
            if let Some((limit, token)) = &self.cancel_after {
                if count >= *limit {
                    token.cancel();
                }
            }
            match &*self.script {
                Script::PerTtl(outcomes) => outcomes
                    .get(usize::from(ttl).saturating_sub(1))
                    .copied()
                    .unwrap_or(ProbeOutcome::NoReply),
                Script::Always(outcome) => *outcome,
            }
        }
    }

    /// Sink that keeps every event for later inspection
    #[derive(Clone, Default)]
    pub struct Recorder {
        events: Arc<Mutex<Vec<RunEvent>>>,
        cancel_after_rounds: Option<(u64, CancellationToken)>,
    }

    impl Recorder {
        pub fn cancel_after_rounds(mut self, rounds: u64, token: CancellationToken) -> Self {
            self.cancel_after_rounds = Some((rounds, token));
            self
        }

        pub fn events(&self) -> Vec<RunEvent> {
            self.events.lock().clone()
        }

        pub fn statuses(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    RunEvent::Status(s) => Some(s),
                    _ => None,
                })
                .collect()
        }

        pub fn routes(&self) -> Vec<Vec<Hop>> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    RunEvent::RouteUpdate(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        pub fn snapshots(&self) -> Vec<Snapshot> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    RunEvent::StatsSnapshot(s) => Some(s),
                    _ => None,
                })
                .collect()
        }

        pub fn final_latencies(&self) -> Vec<f64> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    RunEvent::FinalLatency(ms) => Some(ms),
                    _ => None,
                })
                .collect()
        }

        fn push(&self, event: RunEvent) {
            self.events.lock().push(event);
        }
    }

    impl ReportSink for Recorder {
        fn on_status(&self, message: &str) {
            self.push(RunEvent::Status(message.to_string()));
        }

        fn on_route_update(&self, route: &[Hop]) {
            self.push(RunEvent::RouteUpdate(route.to_vec()));
        }

        fn on_stats_snapshot(&self, snapshot: &Snapshot) {
            self.push(RunEvent::StatsSnapshot(snapshot.clone()));
            if let Some((rounds, token)) = &self.cancel_after_rounds {
                if snapshot.round >= *rounds {
                    token.cancel();
                }
            }
        }

        fn on_final_latency(&self, latency_ms: f64) {
            self.push(RunEvent::FinalLatency(latency_ms));
        }

        fn on_target_resolved(&self, target: &Target) {
            self.push(RunEvent::TargetResolved(target.clone()));
        }
    }
}
