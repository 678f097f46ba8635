use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Instant;

use crate::state::{Hop, HopStats, Snapshot};
use crate::trace::run::RunContext;

/// Probes every answering hop once per round and keeps its running stats
///
/// `*` hops are dropped up front. An address that showed up at several TTLs
/// keeps a single stats entry which each of those hops feeds once per round.
#[derive(Debug)]
pub struct ProbeScheduler {
    hops: Vec<(u8, IpAddr)>,
    stats: BTreeMap<IpAddr, HopStats>,
    round: u64,
}

impl ProbeScheduler {
    pub fn new(route: &[Hop]) -> Self {
        let hops: Vec<(u8, IpAddr)> = route
            .iter()
            .filter_map(|hop| hop.address.map(|ip| (hop.ttl, ip)))
            .collect();

        let stats = hops
            .iter()
            .map(|&(_, ip)| (ip, HopStats::new(ip)))
            .collect();

        Self {
            hops,
            stats,
            round: 0,
        }
    }

    /// Completed rounds
    pub fn rounds(&self) -> u64 {
        self.round
    }

    pub fn stats(&self) -> &BTreeMap<IpAddr, HopStats> {
        &self.stats
    }

    /// Probe each hop once, in route order, then publish a snapshot
    ///
    /// Returns false if cancellation cut the round short; a partial round
    /// publishes nothing.
    pub fn run_round(&mut self, ctx: &mut RunContext<'_>) -> bool {
        for &(ttl, ip) in &self.hops {
            if ctx.is_cancelled() {
                return false;
            }

            let start = Instant::now();
            let outcome = ctx.probe(ttl);
            let rtt = start.elapsed();

            let Some(stats) = self.stats.get_mut(&ip) else {
                continue;
            };
            if outcome.is_reply() {
                stats.record_reply(rtt);
                if ip == ctx.target {
                    ctx.sink.on_final_latency(rtt.as_secs_f64() * 1000.0);
                }
            } else {
                stats.record_timeout();
            }
        }

        self.round += 1;
        ctx.sink
            .on_stats_snapshot(&Snapshot::new(self.round, self.stats.clone()));
        true
    }

    /// Run rounds until cancelled, pausing `interval` between them
    pub fn run(&mut self, ctx: &mut RunContext<'_>) -> u64 {
        tracing::debug!("Continuous probing of {} hops", self.hops.len());
        while self.run_round(ctx) {
            if !ctx.pause(ctx.config.interval) {
                break;
            }
        }
        tracing::debug!("Probing stopped after {} rounds", self.round);
        self.round
    }
}
