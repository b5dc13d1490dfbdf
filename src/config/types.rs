use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POS_FILE: &str = "rds-pgsql-log-pos.dat";
pub const DEFAULT_TAG: &str = "rds-pgsql.log";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

/// Where the log files come from. Empty strings are reported by validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub db_instance_identifier: String,
    /// Base URL of the log API gateway.
    #[serde(default)]
    pub endpoint: String,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            region: String::new(),
            db_instance_identifier: String::new(),
            endpoint: String::new(),
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between cycles when nothing more is pending.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Delay before the next cycle when the remote side has more data queued.
    #[serde(with = "humantime_serde", default = "default_drain_delay")]
    pub drain_delay: Duration,
    #[serde(default = "default_pos_file")]
    pub pos_file: PathBuf,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            drain_delay: default_drain_delay(),
            pos_file: default_pos_file(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_drain_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_pos_file() -> PathBuf {
    PathBuf::from(DEFAULT_POS_FILE)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    #[default]
    Stdout,
    File { path: PathBuf },
}
