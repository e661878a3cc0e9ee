use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime settings, read from a TOML file.
///
/// Every key has a default so the plugin modes also work on a host that
/// never shipped a config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host serving the BaseStation feed
    pub feed_host: String,
    /// Feed port, 30003 on a stock dump1090
    pub feed_port: u16,
    /// Wall-clock window length in seconds
    pub period_secs: u64,
    /// Fix age in seconds beyond which no samples are taken
    pub stale_after_secs: i64,
    /// Where each window's report is published
    pub snapshot_path: PathBuf,
    /// Log file used in daemon mode
    pub log_path: PathBuf,
    /// PID file used in daemon mode
    pub pid_path: PathBuf,
    /// Unprivileged account the daemon drops to, root stays root when unset
    pub daemon_user: Option<String>,
    pub daemon_group: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_host: "127.0.0.1".to_string(),
            feed_port: 30003,
            period_secs: 300,
            stale_after_secs: 600,
            snapshot_path: PathBuf::from("/tmp/sbsmon/snapshot"),
            log_path: PathBuf::from("/tmp/sbsmon/sbsmon.log"),
            pid_path: PathBuf::from("/tmp/sbsmon/sbsmon.pid"),
            daemon_user: None,
            daemon_group: None,
        }
    }
}

impl Config {
    /// Loads `path`, falling back to the defaults when no file exists.
    /// A file that exists but does not parse is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.period_secs > 0, "period_secs must be positive");
        ensure!(self.stale_after_secs > 0, "stale_after_secs must be positive");
        Ok(())
    }
}
