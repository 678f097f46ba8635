use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use crate::config::Config;
use crate::state::stability::Stability;
use crate::state::stats::HopStats;

/// How a hop answered its discovery probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopOutcome {
    /// Router answered with Time Exceeded
    Responding,
    /// Nothing came back before the timeout
    TimedOut,
    /// The target itself answered
    DestinationReached,
    /// Some other ICMP error quoting our probe
    IcmpError,
}

/// A single hop in the discovered route
///
/// `address` is `None` for hops that never answered; those display as `*`
/// and are never probed again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub ttl: u8,
    pub address: Option<IpAddr>,
    pub outcome: HopOutcome,
}

impl Hop {
    pub fn new(ttl: u8, address: Option<IpAddr>, outcome: HopOutcome) -> Self {
        Self { ttl, address, outcome }
    }

    pub fn timed_out(ttl: u8) -> Self {
        Self::new(ttl, None, HopOutcome::TimedOut)
    }

    /// Address to show in tables (`*` when unknown)
    pub fn host(&self) -> String {
        self.address
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "*".to_string())
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            HopOutcome::TimedOut => write!(f, "{:>2}  *  Request timed out.", self.ttl),
            HopOutcome::IcmpError => write!(f, "{:>2}  {}  ICMP Error", self.ttl, self.host()),
            HopOutcome::Responding | HopOutcome::DestinationReached => {
                write!(f, "{:>2}  {}", self.ttl, self.host())
            }
        }
    }
}

/// Target being traced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub original: String,
    pub resolved: IpAddr,
}

impl Target {
    pub fn new(original: String, resolved: IpAddr) -> Self {
        Self { original, resolved }
    }
}

/// Point-in-time copy of every hop's stats, taken at the end of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 1-based round number
    pub round: u64,
    pub taken_at: DateTime<Utc>,
    pub stats: BTreeMap<IpAddr, HopStats>,
}

impl Snapshot {
    pub fn new(round: u64, stats: BTreeMap<IpAddr, HopStats>) -> Self {
        Self {
            round,
            taken_at: Utc::now(),
            stats,
        }
    }

    pub fn get(&self, ip: &IpAddr) -> Option<&HopStats> {
        self.stats.get(ip)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

/// Consumer-side view of a run, assembled from the events the worker emits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Host as the user typed it
    pub host: String,
    pub target: Option<Target>,
    pub started_at: DateTime<Utc>,
    pub config: Config,
    pub route: Vec<Hop>,
    pub snapshot: Option<Snapshot>,
    /// Latest latency of the destination hop
    pub final_latency_ms: Option<f64>,
    /// Most recent status line
    pub status: Option<String>,
}

impl Session {
    pub fn new(host: String, config: Config) -> Self {
        Self {
            host,
            target: None,
            started_at: Utc::now(),
            config,
            route: Vec::new(),
            snapshot: None,
            final_latency_ms: None,
            status: None,
        }
    }

    /// Number of completed probing rounds seen so far
    pub fn rounds(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |s| s.round)
    }

    /// Did discovery reach the target?
    pub fn complete(&self) -> bool {
        self.route
            .last()
            .is_some_and(|h| h.outcome == HopOutcome::DestinationReached)
    }

    /// Latest stats for a hop (None for `*` hops or before the first round)
    pub fn hop_stats(&self, hop: &Hop) -> Option<&HopStats> {
        let ip = hop.address?;
        self.snapshot.as_ref()?.get(&ip)
    }

    /// Stability label for a hop, `Testing` until stats exist
    pub fn hop_stability(&self, hop: &Hop) -> Option<Stability> {
        hop.address?;
        Some(
            self.hop_stats(hop)
                .map(Stability::classify)
                .unwrap_or(Stability::Testing),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_hop_host_and_display() {
        let hop = Hop::timed_out(3);
        assert_eq!(hop.host(), "*");
        assert_eq!(hop.to_string(), " 3  *  Request timed out.");

        let hop = Hop::new(4, Some(ip(4)), HopOutcome::IcmpError);
        assert_eq!(hop.to_string(), " 4  10.0.0.4  ICMP Error");

        let hop = Hop::new(12, Some(ip(9)), HopOutcome::Responding);
        assert_eq!(hop.to_string(), "12  10.0.0.9");
    }

    #[test]
    fn test_session_lookups() {
        let mut session = Session::new("example.net".into(), Config::default());
        session.route = vec![
            Hop::timed_out(1),
            Hop::new(2, Some(ip(2)), HopOutcome::DestinationReached),
        ];
        assert!(session.complete());
        assert_eq!(session.rounds(), 0);

        // Before any round: address hops are Testing, `*` hops have no label
        assert_eq!(session.hop_stability(&session.route[0]), None);
        assert_eq!(session.hop_stability(&session.route[1]), Some(Stability::Testing));

        let mut stats = HopStats::new(ip(2));
        stats.record_reply(Duration::from_millis(4));
        let mut map = BTreeMap::new();
        map.insert(ip(2), stats);
        session.snapshot = Some(Snapshot::new(1, map));

        assert_eq!(session.rounds(), 1);
        assert_eq!(session.hop_stats(&session.route[1]).unwrap().received, 1);
        assert!(session.hop_stats(&session.route[0]).is_none());
    }

    #[test]
    fn test_session_serialization_roundtrip() {
        let mut session = Session::new("test.com".into(), Config::default());
        session.target = Some(Target::new("test.com".into(), ip(1)));
        session.route.push(Hop::new(1, Some(ip(1)), HopOutcome::DestinationReached));

        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.host, "test.com");
        assert_eq!(restored.route, session.route);
        assert_eq!(restored.target, session.target);
    }
}
