/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scenario loading for the `action-sim` driver.
//!
//! A scenario names the timers to arm and how the driver loop should run.
//! The expected YAML structure is:
//! ```yaml
//! tick_ms: 10
//! duration_ms: 1000
//! timers:
//!   blink:
//!     delay_ms: 100
//!     reload_ms: 250
//!   once:
//!     delay_ms: 300
//!     chain_ms: 50
//! ```
//!
//! * `reload_ms` makes a timer periodic.
//! * `chain_ms` makes the timer schedule a one-shot follow-up that many
//!   milliseconds after each time it fires.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::action::Millis;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Driver tick when the scenario does not set `tick_ms`.
pub const DEFAULT_TICK_MS: Millis = 10;

/// Run length when the scenario does not set `duration_ms`.
pub const DEFAULT_DURATION_MS: u64 = 1_000;

fn default_tick_ms() -> Millis {
    DEFAULT_TICK_MS
}

fn default_duration_ms() -> u64 {
    DEFAULT_DURATION_MS
}

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default = "default_tick_ms")]
    tick_ms: Millis,
    #[serde(default = "default_duration_ms")]
    duration_ms: u64,
    #[serde(default)]
    timers: HashMap<String, TimerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimerEntry {
    delay_ms: Millis,
    reload_ms: Option<Millis>,
    chain_ms: Option<Millis>,
}

// ── Public data structures ────────────────────────────────────────────────────

/// One timer to arm at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub name: String,
    /// Delay before the first firing.
    pub delay_ms: Millis,
    /// Reload interval; `None` for a one-shot timer.
    pub reload_ms: Option<Millis>,
    /// Delay of a follow-up action scheduled from inside the callback.
    pub chain_ms: Option<Millis>,
}

impl TimerConfig {
    /// Timer armed when the scenario lists none.
    pub fn default_config(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay_ms: 100,
            reload_ms: Some(100),
            chain_ms: None,
        }
    }

    /// `true` if the timer re-arms itself after firing.
    pub fn is_periodic(&self) -> bool {
        self.reload_ms.is_some()
    }
}

/// Driver loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Longest step the driver takes between two `advance` calls.
    pub tick_ms: Millis,
    /// Total simulated (or wall-clock) run time.
    pub duration_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

// ── ScenarioManager ───────────────────────────────────────────────────────────

/// Loads and holds a scenario from a YAML file.
#[derive(Debug, Default)]
pub struct ScenarioManager {
    /// Timers keyed by name; sorted so they are armed in a stable order.
    timers: BTreeMap<String, TimerConfig>,

    driver: DriverConfig,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl ScenarioManager {
    /// Creates a new, empty `ScenarioManager`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and replaces the current scenario.
    ///
    /// * If the file lists no timers a single periodic `"heartbeat"` timer is
    ///   inserted.
    /// * Calling this method a second time replaces everything previously
    ///   loaded.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is malformed, or
    /// a value is out of range (`tick_ms` or a `reload_ms` of zero).
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading scenario from: {}", path.display());

        self.timers.clear();
        self.driver = DriverConfig::default();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open scenario file: {}", path.display()))?;

        let file: ScenarioFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        if file.tick_ms == 0 {
            bail!("tick_ms must be non-zero in {}", path.display());
        }

        let mut timers = BTreeMap::new();
        for (name, entry) in file.timers {
            if entry.reload_ms == Some(0) {
                bail!("timer '{}' has reload_ms: 0 (omit it for a one-shot timer)", name);
            }
            let timer = TimerConfig {
                name: name.clone(),
                delay_ms: entry.delay_ms,
                reload_ms: entry.reload_ms,
                chain_ms: entry.chain_ms,
            };
            debug!(
                "  Timer: {} | delay: {}ms | reload: {:?} | chain: {:?}",
                timer.name, timer.delay_ms, timer.reload_ms, timer.chain_ms,
            );
            timers.insert(name, timer);
        }

        if timers.is_empty() {
            warn!("No timers found in scenario file, using default heartbeat timer");
            timers.insert(
                "heartbeat".to_string(),
                TimerConfig::default_config("heartbeat"),
            );
        }

        self.timers = timers;
        self.driver = DriverConfig {
            tick_ms: file.tick_ms,
            duration_ms: file.duration_ms,
        };
        self.loaded = true;

        info!(
            timers = self.timers.len(),
            tick_ms = self.driver.tick_ms,
            duration_ms = self.driver.duration_ms,
            "Scenario loaded"
        );
        Ok(())
    }

    /// Timer named `name`, if loaded.
    pub fn get_timer(&self, name: &str) -> Option<&TimerConfig> {
        self.timers.get(name)
    }

    /// All timers, sorted by name.
    pub fn timers(&self) -> impl Iterator<Item = &TimerConfig> {
        self.timers.values()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Driver settings; defaults until a file is loaded.
    pub fn driver(&self) -> DriverConfig {
        self.driver
    }

    /// Returns `true` after a successful call to [`load_from_file`](Self::load_from_file).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
