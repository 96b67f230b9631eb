//! Scheduler configuration file and environment variable handling.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;

use super::error::{ErrorContext, PersistenceError, PersistenceResult};

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// `[scheduler]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds a preempted task keeps its active window.
    #[serde(default = "default_preempt_grace_time")]
    pub preempt_grace_time: u64,
    /// Snapshot file. Persistence is disabled when unset.
    #[serde(default)]
    pub schedule_state_file: Option<PathBuf>,
    /// Longest gap, in seconds, between two engine refreshes.
    #[serde(default = "default_schedule_publish_interval")]
    pub schedule_publish_interval: u64,
}

fn default_preempt_grace_time() -> u64 {
    60
}

fn default_schedule_publish_interval() -> u64 {
    60
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            preempt_grace_time: default_preempt_grace_time(),
            schedule_state_file: None,
            schedule_publish_interval: default_schedule_publish_interval(),
        }
    }
}

impl SchedulerSettings {
    pub fn grace_time(&self) -> TimeDelta {
        seconds(self.preempt_grace_time)
    }

    pub fn publish_interval(&self) -> TimeDelta {
        seconds(self.schedule_publish_interval)
    }
}

// Capped so that `now + delta` stays well inside chrono's range.
fn seconds(value: u64) -> TimeDelta {
    TimeDelta::seconds(i64::from(u32::try_from(value).unwrap_or(u32::MAX)))
}

impl SchedulerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(SchedulerConfig)` if successful
    /// * `Err(PersistenceError)` if file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let path = path.as_ref();
        let context = || ErrorContext::new("load_config").with_path(path);

        let content = fs::read_to_string(path).map_err(|e| {
            PersistenceError::configuration_with_context(
                format!("Failed to read config file: {}", e),
                context(),
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            PersistenceError::configuration_with_context(
                format!("Failed to parse config file: {}", e),
                context(),
            )
        })
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `actuator.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> PersistenceResult<Self> {
        let search_paths = [
            PathBuf::from("actuator.toml"),
            PathBuf::from("backend/actuator.toml"),
            PathBuf::from("../actuator.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Err(PersistenceError::configuration(
            "No actuator.toml found in standard locations",
        ))
    }

    /// Override settings from environment variables.
    ///
    /// # Environment Variables
    /// - `ACTUATOR_PREEMPT_GRACE_TIME`: grace period in seconds
    /// - `ACTUATOR_STATE_FILE`: snapshot path (empty string disables persistence)
    /// - `ACTUATOR_PUBLISH_INTERVAL`: refresh interval in seconds
    ///
    /// # Errors
    /// Returns an error if a numeric variable does not parse.
    pub fn apply_env_overrides(mut self) -> PersistenceResult<Self> {
        if let Ok(value) = env::var("ACTUATOR_PREEMPT_GRACE_TIME") {
            self.scheduler.preempt_grace_time = parse_seconds("ACTUATOR_PREEMPT_GRACE_TIME", &value)?;
        }
        if let Ok(value) = env::var("ACTUATOR_STATE_FILE") {
            self.scheduler.schedule_state_file = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        if let Ok(value) = env::var("ACTUATOR_PUBLISH_INTERVAL") {
            self.scheduler.schedule_publish_interval =
                parse_seconds("ACTUATOR_PUBLISH_INTERVAL", &value)?;
        }
        Ok(self)
    }
}

fn parse_seconds(name: &str, value: &str) -> PersistenceResult<u64> {
    value.trim().parse().map_err(|_| {
        PersistenceError::configuration_with_context(
            format!("{} must be a whole number of seconds", name),
            ErrorContext::new("apply_env_overrides").with_details(value.to_string()),
        )
    })
}
