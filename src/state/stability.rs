use serde::{Deserialize, Serialize};
use std::fmt;

use super::stats::HopStats;

/// Probes needed before a hop is classified at all
pub const MIN_SAMPLES: u64 = 10;

const POOR_LOSS_PCT: f64 = 10.0;
const FAIR_LOSS_PCT: f64 = 1.0;
const EXCELLENT_JITTER_MS: f64 = 5.0;
const EXCELLENT_AVG_MS: f64 = 100.0;
const GOOD_JITTER_MS: f64 = 15.0;
const GOOD_AVG_MS: f64 = 200.0;

/// Qualitative stability of a hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Testing,
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Stability {
    /// Classify a hop. Loss is checked before latency and jitter.
    pub fn classify(stats: &HopStats) -> Self {
        if stats.sent <= MIN_SAMPLES {
            return Self::Testing;
        }
        if stats.loss_pct > POOR_LOSS_PCT {
            return Self::Poor;
        }
        if stats.loss_pct > FAIR_LOSS_PCT {
            return Self::Fair;
        }
        if stats.jitter_ms < EXCELLENT_JITTER_MS && stats.avg_ms < EXCELLENT_AVG_MS {
            Self::Excellent
        } else if stats.jitter_ms < GOOD_JITTER_MS && stats.avg_ms < GOOD_AVG_MS {
            Self::Good
        } else {
            Self::Fair
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Testing => "Testing...",
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
