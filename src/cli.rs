use clap::Parser;
use std::path::PathBuf;

use pathmon::config::{Config, MAX_INTERVAL, MAX_SAFE_TTL, MAX_TIMEOUT, secs_to_duration};

/// MTR-style path diagnostics: discover the route, then watch every hop
#[derive(Parser, Debug, Clone)]
#[command(name = "pathmon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host (IPv4 address or hostname)
    pub target: String,

    /// Stop after this many probing rounds (runs until Ctrl+C if unset)
    #[arg(short = 'c', long = "count")]
    pub count: Option<u64>,

    /// Pause between rounds in seconds [default: 1]
    #[arg(short = 'i', long = "interval")]
    pub interval: Option<f64>,

    /// Maximum TTL (hops) [default: 40]
    #[arg(short = 'm', long = "max-ttl")]
    pub max_ttl: Option<u8>,

    /// Probe timeout in seconds [default: 2]
    #[arg(long = "timeout")]
    pub timeout: Option<f64>,

    /// Config file (TOML)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Report mode (batch, requires -c)
    #[arg(long = "report")]
    pub report: bool,

    /// Output JSON (batch mode, requires -c)
    #[arg(long = "json")]
    pub json: bool,

    /// Debug logging on stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// Check if running in batch mode (non-interactive)
    pub fn is_batch_mode(&self) -> bool {
        self.json || self.report
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.is_batch_mode() && self.count.is_none() {
            return Err("Batch output modes (--json, --report) require -c to be set".into());
        }

        if self.json && self.report {
            return Err("Cannot specify both --json and --report".into());
        }

        if self.count == Some(0) {
            return Err("Count must be at least 1".into());
        }

        if let Some(interval) = self.interval {
            if interval <= 0.0 {
                return Err("Interval must be positive".into());
            }
            if interval > MAX_INTERVAL.as_secs_f64() {
                return Err(format!("Interval cannot exceed {}s", MAX_INTERVAL.as_secs()));
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout <= 0.0 {
                return Err("Timeout must be positive".into());
            }
            if timeout > MAX_TIMEOUT.as_secs_f64() {
                return Err(format!("Timeout cannot exceed {}s", MAX_TIMEOUT.as_secs()));
            }
        }

        if let Some(max_ttl) = self.max_ttl {
            if max_ttl == 0 {
                return Err("Max TTL must be at least 1".into());
            }
            if max_ttl > MAX_SAFE_TTL {
                return Err(format!("Max TTL cannot exceed {}", MAX_SAFE_TTL));
            }
        }

        Ok(())
    }

    /// Overlay flags that were given on the command line
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(max_ttl) = self.max_ttl {
            config.max_ttl = max_ttl;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = secs_to_duration(timeout);
        }
        if let Some(interval) = self.interval {
            config.interval = secs_to_duration(interval);
        }
        if self.count.is_some() {
            config.count = self.count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pathmon").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["example.com"]);
        assert_eq!(args.target, "example.com");
        assert!(args.count.is_none());
        assert!(!args.is_batch_mode());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_target_is_required() {
        assert!(Args::try_parse_from(["pathmon"]).is_err());
    }

    #[test]
    fn test_batch_modes_need_count() {
        assert!(parse(&["--report", "h"]).validate().is_err());
        assert!(parse(&["--json", "h"]).validate().is_err());
        assert!(parse(&["--json", "-c", "5", "h"]).validate().is_ok());
        assert!(parse(&["--json", "--report", "-c", "5", "h"]).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse(&["-i", "0", "h"]).validate().is_err());
        assert!(parse(&["--timeout", "0", "h"]).validate().is_err());
        assert!(parse(&["-m", "0", "h"]).validate().is_err());
        assert!(parse(&["-m", "65", "h"]).validate().is_err());
        assert!(parse(&["-m", "64", "h"]).validate().is_ok());
        assert!(parse(&["-c", "0", "h"]).validate().is_err());
        assert!(parse(&["-i", "1e19", "h"]).validate().is_err());
        assert!(parse(&["--timeout", "1e19", "h"]).validate().is_err());
        assert!(parse(&["-i", "3600", "--timeout", "60", "h"]).validate().is_ok());
    }

    #[test]
    fn test_apply_overrides_only_given_flags() {
        let mut config = Config {
            max_ttl: 20,
            ..Config::default()
        };
        parse(&["-i", "0.5", "-c", "3", "h"]).apply_to(&mut config);

        assert_eq!(config.max_ttl, 20);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.count, Some(3));
    }
}
