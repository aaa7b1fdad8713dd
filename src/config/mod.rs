//! Application configuration

pub mod rules;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{ResponseResolver, RuleError};

pub use rules::{builtin, ReplyOverrides, RuleFile};

/// Delay before the assistant reply is appended
pub const DEFAULT_REPLY_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub reply_delay_ms: u64,
    pub assistant_name: String,
    pub rules_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// Build from any key lookup, e.g. a map in place of the process env
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let reply_delay_ms = match get("CAMPUS_GENIE_REPLY_DELAY_MS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "CAMPUS_GENIE_REPLY_DELAY_MS must be a whole number of milliseconds, got {:?}",
                    raw
                ))
            })?,
            None => DEFAULT_REPLY_DELAY_MS,
        };

        Ok(Self {
            reply_delay_ms,
            assistant_name: get("CAMPUS_GENIE_ASSISTANT_NAME")
                .unwrap_or_else(|| builtin::ASSISTANT_NAME.into()),
            rules_path: get("CAMPUS_GENIE_RULES").map(PathBuf::from),
        })
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Resolver from the configured rule file, or the campus table
    pub fn load_resolver(&self) -> Result<ResponseResolver, ConfigError> {
        match &self.rules_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading rule table");
                RuleFile::from_file(path)?.into_resolver()
            }
            None => Ok(ResponseResolver::default()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reply_delay_ms: DEFAULT_REPLY_DELAY_MS,
            assistant_name: builtin::ASSISTANT_NAME.to_string(),
            rules_path: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid rule table: {0}")]
    Rules(#[from] RuleError),

    #[error("Validation error: {0}")]
    Validation(String),
}
