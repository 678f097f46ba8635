//! Event hand-off from the probe worker to whoever displays the results.
//!
//! The worker only ever passes owned copies across this boundary, so a
//! consumer can hold on to a route or snapshot without racing the next round.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::state::{Hop, Session, Snapshot, Target};

/// Receives everything a run reports
///
/// Called from the probe worker thread, hence `Send`.
pub trait ReportSink: Send {
    /// Human-readable progress or error text
    fn on_status(&self, message: &str);

    /// Full route so far, after every newly discovered hop
    fn on_route_update(&self, route: &[Hop]);

    /// Stats for every probed hop, once per round
    fn on_stats_snapshot(&self, snapshot: &Snapshot);

    /// Latency of the destination hop, when it answered this round
    fn on_final_latency(&self, latency_ms: f64);

    /// Target resolved; sent once before discovery starts
    fn on_target_resolved(&self, _target: &Target) {}
}

impl<S: ReportSink + Sync + ?Sized> ReportSink for &S {
    fn on_status(&self, message: &str) {
        (**self).on_status(message)
    }
    fn on_route_update(&self, route: &[Hop]) {
        (**self).on_route_update(route)
    }
    fn on_stats_snapshot(&self, snapshot: &Snapshot) {
        (**self).on_stats_snapshot(snapshot)
    }
    fn on_final_latency(&self, latency_ms: f64) {
        (**self).on_final_latency(latency_ms)
    }
    fn on_target_resolved(&self, target: &Target) {
        (**self).on_target_resolved(target)
    }
}

/// One reported event, as an owned value
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Status(String),
    TargetResolved(Target),
    RouteUpdate(Vec<Hop>),
    StatsSnapshot(Snapshot),
    FinalLatency(f64),
}

impl RunEvent {
    /// Fold this event into a session
    pub fn apply(self, session: &mut Session) {
        match self {
            Self::Status(message) => session.status = Some(message),
            Self::TargetResolved(target) => session.target = Some(target),
            Self::RouteUpdate(route) => session.route = route,
            Self::StatsSnapshot(snapshot) => session.snapshot = Some(snapshot),
            Self::FinalLatency(ms) => session.final_latency_ms = Some(ms),
        }
    }
}

/// Sink that forwards events over an unbounded channel
///
/// The channel closes when the worker drops its sink, which marks the end of
/// the run for the receiving side.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<RunEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<RunEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, UnboundedReceiver<RunEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: RunEvent) {
        // Receiver gone means nobody is listening any more; the run ends on stop()
        if self.tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

impl ReportSink for ChannelSink {
    fn on_status(&self, message: &str) {
        self.send(RunEvent::Status(message.to_string()));
    }

    fn on_route_update(&self, route: &[Hop]) {
        self.send(RunEvent::RouteUpdate(route.to_vec()));
    }

    fn on_stats_snapshot(&self, snapshot: &Snapshot) {
        self.send(RunEvent::StatsSnapshot(snapshot.clone()));
    }

    fn on_final_latency(&self, latency_ms: f64) {
        self.send(RunEvent::FinalLatency(latency_ms));
    }

    fn on_target_resolved(&self, target: &Target) {
        self.send(RunEvent::TargetResolved(target.clone()));
    }
}

/// Sink that writes straight into a shared session, for consumers that poll
#[derive(Debug, Clone)]
pub struct SessionSink {
    session: Arc<RwLock<Session>>,
}

impl SessionSink {
    pub fn new(session: Arc<RwLock<Session>>) -> Self {
        Self { session }
    }

    fn apply(&self, event: RunEvent) {
        event.apply(&mut self.session.write());
    }
}

impl ReportSink for SessionSink {
    fn on_status(&self, message: &str) {
        self.apply(RunEvent::Status(message.to_string()));
    }

    fn on_route_update(&self, route: &[Hop]) {
        self.apply(RunEvent::RouteUpdate(route.to_vec()));
    }

    fn on_stats_snapshot(&self, snapshot: &Snapshot) {
        self.apply(RunEvent::StatsSnapshot(snapshot.clone()));
    }

    fn on_final_latency(&self, latency_ms: f64) {
        self.apply(RunEvent::FinalLatency(latency_ms));
    }

    fn on_target_resolved(&self, target: &Target) {
        self.apply(RunEvent::TargetResolved(target.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::HopOutcome;
    use std::collections::BTreeMap;
    use std::net::{IpAddr, Ipv4Addr};

    fn hop() -> Hop {
        Hop::new(1, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))), HopOutcome::Responding)
    }

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.on_status("hello");
        sink.on_route_update(&[hop()]);
        sink.on_final_latency(12.5);
        drop(sink);

        assert_eq!(rx.try_recv().unwrap(), RunEvent::Status("hello".into()));
        assert_eq!(rx.try_recv().unwrap(), RunEvent::RouteUpdate(vec![hop()]));
        assert_eq!(rx.try_recv().unwrap(), RunEvent::FinalLatency(12.5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.on_status("nobody listening");
    }

    #[test]
    fn test_session_sink_applies_events() {
        let session = Arc::new(RwLock::new(Session::new("h".into(), Config::default())));
        let sink = SessionSink::new(session.clone());

        sink.on_route_update(&[hop()]);
        sink.on_stats_snapshot(&Snapshot::new(3, BTreeMap::new()));
        sink.on_final_latency(4.0);
        sink.on_status("Stopped.");

        let session = session.read();
        assert_eq!(session.route.len(), 1);
        assert_eq!(session.rounds(), 3);
        assert_eq!(session.final_latency_ms, Some(4.0));
        assert_eq!(session.status.as_deref(), Some("Stopped."));
    }
}
