use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bridge endpoint the dashboard talks to unless configured otherwise.
pub const DEFAULT_ENDPOINT: &str = "https://functions.poehali.dev/45932f98-ca2f-4788-97f1-698148a33b67";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub poll_interval_ms: u64,
    pub roster_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval_ms: 2_000,
            roster_interval_ms: 5_000,
            request_timeout_secs: Some(15),
            log_file: PathBuf::from("tgcrm.log"),
        }
    }
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn roster_interval(&self) -> Duration {
        Duration::from_millis(self.roster_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Reject values that would make the timers spin or the client useless.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(anyhow!("endpoint must not be empty"));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(anyhow!("endpoint must be an http(s) URL: {}", self.endpoint));
        }
        if self.poll_interval_ms == 0 || self.roster_interval_ms == 0 {
            return Err(anyhow!("poll intervals must be greater than zero"));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(anyhow!("request_timeout_secs must be greater than zero (or null for none)"));
        }
        Ok(())
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("Could not determine config directory"))?
        .join("tgcrm");
    Ok(config_dir)
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

/// Read the config file at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let config: Config = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    info!("Loaded config from {}", path.display());

    Ok(config)
}
