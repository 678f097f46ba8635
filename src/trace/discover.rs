use crate::probe::ProbeOutcome;
use crate::state::{Hop, HopOutcome};
use crate::trace::run::RunContext;

/// Route found by the TTL walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub route: Vec<Hop>,
    /// Last hop is the target
    pub reached: bool,
    /// Stopped by the cancellation token before finishing
    pub cancelled: bool,
}

impl From<(u8, ProbeOutcome)> for Hop {
    fn from((ttl, outcome): (u8, ProbeOutcome)) -> Self {
        match outcome {
            ProbeOutcome::NoReply => Hop::timed_out(ttl),
            ProbeOutcome::HopResponded(ip) => Hop::new(ttl, Some(ip), HopOutcome::Responding),
            ProbeOutcome::DestinationReached(ip) => {
                Hop::new(ttl, Some(ip), HopOutcome::DestinationReached)
            }
            ProbeOutcome::OtherIcmpError(ip) => Hop::new(ttl, Some(ip), HopOutcome::IcmpError),
        }
    }
}

/// Probe TTL 1..=max_ttl until the target answers
///
/// The full route so far is reported after every hop. Hitting `max_ttl`
/// without an echo reply is not an error; the route is just incomplete.
pub fn discover_route(ctx: &mut RunContext<'_>) -> Discovery {
    let mut route: Vec<Hop> = Vec::new();

    for ttl in 1..=ctx.config.max_ttl {
        if ctx.is_cancelled() {
            tracing::debug!("Discovery cancelled at TTL {}", ttl);
            return Discovery {
                route,
                reached: false,
                cancelled: true,
            };
        }

        let hop = Hop::from((ttl, ctx.probe(ttl)));
        tracing::debug!("Discovered hop: {}", hop);
        let reached = hop.outcome == HopOutcome::DestinationReached;

        route.push(hop);
        ctx.sink.on_route_update(&route);

        if reached {
            return Discovery {
                route,
                reached: true,
                cancelled: false,
            };
        }
    }

    Discovery {
        route,
        reached: false,
        cancelled: false,
    }
}
