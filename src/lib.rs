//! Route discovery plus continuous per-hop loss, latency and jitter tracking.
//!
//! A run resolves the target, walks TTLs until the target answers, then probes
//! every responding hop once per round until stopped. Results are delivered
//! through a [`trace::ReportSink`].

pub mod config;
pub mod error;
pub mod export;
pub mod probe;
pub mod state;
pub mod trace;
