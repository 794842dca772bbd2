use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::meeting_vote::{Roster, VoteSettings};

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Unknown IANA time zone name.
    InvalidTimezone { name: String, reason: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidTimezone { name, reason } => {
                write!(f, "invalid timezone '{}': {}", name, reason)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidTimezone { .. } | Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    discord_token: String,
    /// Only handle events from this server when set.
    guild_id: Option<u64>,
    /// Channel whose messages become proposals.
    meeting_vote_channel_id: u64,
    /// User IDs allowed to vote, in display order.
    electors: Vec<u64>,
    /// Channel that receives a copy of the bot's logs.
    log_channel_id: Option<u64>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
    /// IANA zone used for dates in announcements.
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default = "default_sweep_interval_minutes")]
    sweep_interval_minutes: u64,
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_sweep_interval_minutes() -> u64 {
    30
}

pub struct Config {
    pub discord_token: String,
    pub guild_id: Option<u64>,
    pub meeting_vote_channel_id: u64,
    pub electors: Vec<u64>,
    pub log_channel_id: Option<u64>,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
    pub timezone: Tz,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.discord_token.trim().is_empty() {
            return Err(ConfigError::Validation("discord_token is required".into()));
        }
        if file.meeting_vote_channel_id == 0 {
            return Err(ConfigError::Validation("meeting_vote_channel_id must be a channel ID".into()));
        }
        if file.electors.is_empty() {
            return Err(ConfigError::Validation("electors must contain at least one user ID".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = file.electors.iter().find(|id| !seen.insert(**id)) {
            return Err(ConfigError::Validation(format!("elector {} is listed twice", dup)));
        }
        if file.sweep_interval_minutes == 0 {
            return Err(ConfigError::Validation("sweep_interval_minutes must be positive".into()));
        }

        let timezone = file
            .timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidTimezone { name: file.timezone.clone(), reason: e.to_string() })?;

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            discord_token: file.discord_token,
            guild_id: file.guild_id,
            meeting_vote_channel_id: file.meeting_vote_channel_id,
            electors: file.electors,
            log_channel_id: file.log_channel_id,
            data_dir,
            timezone,
            sweep_interval: Duration::from_secs(file.sweep_interval_minutes * 60),
        })
    }

    pub fn vote_settings(&self) -> VoteSettings {
        VoteSettings::new(
            self.meeting_vote_channel_id,
            Roster::new(self.electors.clone()),
            self.timezone,
        )
    }
}
