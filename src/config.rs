use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hop limit used for route discovery when nothing else is configured
pub const DEFAULT_MAX_TTL: u8 = 40;
/// Upper bound on the hop limit (probes per round grow with it)
pub const MAX_SAFE_TTL: u8 = 64;
/// Longest a single probe may wait for its reply
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest pause between probing rounds
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Runtime configuration for a diagnostic run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Highest TTL tried during route discovery
    pub max_ttl: u8,
    /// How long a single probe waits for a reply
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Pause between probing rounds
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// Number of rounds before the consumer stops the run (None = until stopped)
    pub count: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_ttl: DEFAULT_MAX_TTL,
            timeout: Duration::from_secs(2),
            interval: Duration::from_secs(1),
            count: None,
        }
    }
}

impl Config {
    /// Build a config from built-in defaults overlaid with a config file
    pub fn from_file(file: &ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(max_ttl) = file.max_ttl {
            config.max_ttl = max_ttl;
        }
        if let Some(secs) = file.timeout {
            config.timeout = secs_to_duration(secs);
        }
        if let Some(secs) = file.interval {
            config.interval = secs_to_duration(secs);
        }
        if file.count.is_some() {
            config.count = file.count;
        }
        config
    }

    /// Validate value ranges after all sources have been merged
    pub fn validate(&self) -> Result<(), String> {
        if self.max_ttl == 0 {
            return Err("Max TTL must be at least 1".into());
        }
        if self.max_ttl > MAX_SAFE_TTL {
            return Err(format!("Max TTL cannot exceed {}", MAX_SAFE_TTL));
        }
        if self.timeout.is_zero() {
            return Err("Timeout must be positive".into());
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(format!("Timeout cannot exceed {}s", MAX_TIMEOUT.as_secs()));
        }
        if self.interval.is_zero() {
            return Err("Interval must be positive".into());
        }
        if self.interval > MAX_INTERVAL {
            return Err(format!("Interval cannot exceed {}s", MAX_INTERVAL.as_secs()));
        }
        if self.count == Some(0) {
            return Err("Count must be at least 1 (omit it to run until stopped)".into());
        }
        Ok(())
    }
}

/// Negative, non-finite or out-of-range seconds collapse to zero and are rejected by `validate`
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// On-disk defaults: ~/.config/pathmon/config.toml
///
/// Every field is optional; CLI flags override whatever is set here.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub max_ttl: Option<u8>,
    /// Probe timeout in seconds
    pub timeout: Option<f64>,
    /// Round interval in seconds
    pub interval: Option<f64>,
    pub count: Option<u64>,
}

impl ConfigFile {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pathmon").join("config.toml"))
    }

    /// Load and parse a config file, failing on unreadable or malformed files
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the default config file; a missing file yields defaults
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(super::secs_to_duration(secs))
    }
}
