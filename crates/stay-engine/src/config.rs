//! Engine configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration:
//!
//! ```toml
//! fetch_timeout_secs = 30
//! timezone = "Asia/Manila"
//! blocked_phrases = ["not available", "blocked", "owner stay"]
//!
//! [export]
//! product_id = "-//Cozy Condo//Availability//EN"
//! uid_domain = "cozycondo.example"
//! include_extensions = true
//! cache_max_age_secs = 3600
//! ```

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StayError};
use crate::feed::classify::{PhraseClassifier, DEFAULT_BLOCKED_PHRASES};
use crate::feed::export::FeedMetadata;
use crate::feed::parser::ImportOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on one feed download, connect to last byte.
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// IANA zone of the property's local calendar.
    pub timezone: String,
    /// Expand `RRULE` events in imported feeds into one event per occurrence.
    pub expand_recurrences: bool,
    pub max_occurrences: u16,
    /// Case-insensitive summary phrases that mark an imported event as an owner block.
    pub blocked_phrases: Vec<String>,
    pub export: FeedMetadata,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            user_agent: concat!("stay-engine/", env!("CARGO_PKG_VERSION")).to_string(),
            timezone: "UTC".to_string(),
            expand_recurrences: true,
            max_occurrences: 366,
            blocked_phrases: DEFAULT_BLOCKED_PHRASES.iter().map(|p| p.to_string()).collect(),
            export: FeedMetadata::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| StayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.fetch_timeout_secs == 0 {
            return Err(StayError::Config("fetch_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// The property timezone resolved through `chrono-tz`.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| StayError::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Parser options derived from this configuration.
    pub fn import_options(&self) -> Result<ImportOptions> {
        Ok(ImportOptions::default()
            .with_timezone(self.tz()?)
            .with_classifier(PhraseClassifier::new(&self.blocked_phrases))
            .with_recurrence(self.expand_recurrences, self.max_occurrences))
    }
}
