//! Scheduler state inspection binary.
//!
//! Loads the scheduler configuration and its snapshot, then prints who holds
//! which device right now and when the engine next needs attention.
//!
//! # Usage
//!
//! ```bash
//! # Use ./actuator.toml (or backend/actuator.toml, ../actuator.toml)
//! cargo run --bin actuator-inspect
//!
//! # Explicit configuration file
//! cargo run --bin actuator-inspect -- /etc/actuator/actuator.toml
//! ```
//!
//! # Environment Variables
//!
//! - `ACTUATOR_PREEMPT_GRACE_TIME`, `ACTUATOR_STATE_FILE`,
//!   `ACTUATOR_PUBLISH_INTERVAL`: override the configuration file
//! - `RUST_LOG`: Log level (default: info)

use std::env;

use chrono::Utc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use actuator_scheduler::db::SchedulerConfig;
use actuator_scheduler::ScheduleManager;

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match env::args().nth(1) {
        Some(path) => SchedulerConfig::from_file(&path)?,
        None => SchedulerConfig::from_default_location().unwrap_or_else(|e| {
            warn!("{}; using defaults", e);
            SchedulerConfig::default()
        }),
    }
    .apply_env_overrides()?;

    match &config.scheduler.schedule_state_file {
        Some(path) => info!("Reading scheduler state from {}", path.display()),
        None => warn!("No schedule_state_file configured, nothing to inspect"),
    }

    let now = Utc::now();
    let mut manager = ScheduleManager::from_config(&config, now);

    let report = serde_json::json!({
        "now": now,
        "tasks": manager.len(),
        "schedule_state": manager.get_schedule_state(now),
        "next_event_time": manager.get_next_event_time(now),
        "next_update_time": manager.next_update_time(now, config.scheduler.publish_interval()),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
