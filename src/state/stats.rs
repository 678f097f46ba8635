use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Running statistics for one responding hop address
///
/// Average and jitter are maintained incrementally, so memory stays constant
/// no matter how long a run lasts:
/// - average: running mean of every observed latency
/// - jitter: running mean of |x[i] - x[i-1]| over consecutive replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopStats {
    pub ip: IpAddr,

    // Counters
    pub sent: u64,
    pub received: u64,

    // Latency (milliseconds)
    pub last_ms: f64,
    #[serde(with = "best_serde")]
    pub best_ms: f64,
    pub worst_ms: f64,
    pub avg_ms: f64,
    pub jitter_ms: f64,

    pub loss_pct: f64,
}

impl HopStats {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            sent: 0,
            received: 0,
            last_ms: 0.0,
            best_ms: f64::INFINITY,
            worst_ms: 0.0,
            avg_ms: 0.0,
            jitter_ms: 0.0,
            loss_pct: 0.0,
        }
    }

    /// Record a probe that got a reply after `rtt`
    pub fn record_reply(&mut self, rtt: Duration) {
        self.sent += 1;
        self.received += 1;

        let latency = rtt.as_secs_f64() * 1000.0;

        if self.received > 1 {
            let diffs = (self.received - 1) as f64;
            let diff = (latency - self.last_ms).abs();
            self.jitter_ms += (diff - self.jitter_ms) / diffs;
        }

        self.avg_ms += (latency - self.avg_ms) / self.received as f64;
        self.best_ms = self.best_ms.min(latency);
        self.worst_ms = self.worst_ms.max(latency);
        self.last_ms = latency;

        self.update_loss();
    }

    /// Record a probe that timed out
    pub fn record_timeout(&mut self) {
        self.sent += 1;
        self.update_loss();
    }

    fn update_loss(&mut self) {
        self.loss_pct = if self.sent == 0 {
            0.0
        } else {
            (self.sent - self.received) as f64 / self.sent as f64 * 100.0
        };
    }

    /// Best latency, or 0 before the first reply
    pub fn best_or_zero(&self) -> f64 {
        if self.best_ms.is_finite() {
            self.best_ms
        } else {
            0.0
        }
    }
}

/// `best_ms` is +infinity until the first reply; JSON has no infinity, so it
/// travels as null
mod best_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(best: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let value = if best.is_finite() { Some(*best) } else { None };
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
