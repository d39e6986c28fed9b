/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use clap::Parser;
use tokio::time::Instant;
use tracing::{error, info, warn};

use action_scheduler::config::{DriverConfig, ScenarioManager, TimerConfig};
use action_scheduler::{ActionReturn, ActionScheduler, Millis, DEFAULT_CAPACITY};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Reference driver loop for the action scheduler.
///
/// Example:
///   action-sim --scenario scenarios/blink.yaml --realtime
#[derive(Debug, Parser)]
#[command(
    name = "action-sim",
    about = "Drives an ActionScheduler from a YAML scenario",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scenario file.
    #[arg(short = 'c', long = "scenario")]
    scenario: Option<PathBuf>,

    /// Sleep for real between ticks instead of jumping straight to the next
    /// deadline.
    #[arg(short = 'r', long = "realtime", default_value_t = false)]
    realtime: bool,

    /// Override the scenario's tick (longest step between two advances).
    #[arg(short = 't', long = "tick-ms")]
    tick_ms: Option<Millis>,

    /// Override the scenario's run length.
    #[arg(short = 'd', long = "duration-ms")]
    duration_ms: Option<u64>,
}

// ── Scheduled actions ─────────────────────────────────────────────────────────

type SimScheduler = ActionScheduler<&'static TimerConfig, DEFAULT_CAPACITY>;

/// Callbacks run so far, across all timers.
static FIRED: AtomicU64 = AtomicU64::new(0);

fn on_timer(sched: &SimScheduler, timer: &'static TimerConfig) -> ActionReturn {
    FIRED.fetch_add(1, Ordering::Relaxed);
    info!(timer = %timer.name, at_ms = sched.proceeding_time(), "timer fired");

    if let Some(chain_ms) = timer.chain_ms {
        if let Err(e) = sched.schedule(chain_ms, on_chained, timer) {
            warn!(timer = %timer.name, "could not chain follow-up: {}", e);
        }
    }

    if timer.is_periodic() {
        ActionReturn::Reload
    } else {
        ActionReturn::OneShot
    }
}

fn on_chained(sched: &SimScheduler, timer: &'static TimerConfig) -> ActionReturn {
    FIRED.fetch_add(1, Ordering::Relaxed);
    info!(timer = %timer.name, at_ms = sched.proceeding_time(), "follow-up fired");
    ActionReturn::OneShot
}

// ── Driver loop ───────────────────────────────────────────────────────────────

/// Length of the next step: up to the next deadline, but never more than one
/// tick or the time left in the run.
fn next_step(next_delay: Option<Millis>, tick_ms: Millis, left_ms: u64) -> Millis {
    let cap = tick_ms.min(Millis::try_from(left_ms).unwrap_or(Millis::MAX));
    next_delay.map_or(cap, |d| d.min(cap))
}

/// Advance on simulated time, jumping from deadline to deadline.
///
/// Returns the simulated time covered.
fn run_simulated(sched: &SimScheduler, driver: DriverConfig) -> u64 {
    let mut now: u64 = 0;
    while now < driver.duration_ms {
        let step = next_step(sched.next_delay(), driver.tick_ms, driver.duration_ms - now);
        sched.advance(step);
        now += u64::from(step);
    }
    now
}

/// Advance on wall-clock time, sleeping until the next deadline or tick.
///
/// Sub-millisecond remainders are carried to the next round so the measured
/// time never drifts.
async fn run_realtime(sched: &SimScheduler, driver: DriverConfig) -> u64 {
    let run = Duration::from_millis(driver.duration_ms);
    let start = Instant::now();
    let mut last = start;

    while start.elapsed() < run {
        let left = run.saturating_sub(start.elapsed()).as_millis();
        let left_ms = u64::try_from(left).unwrap_or(u64::MAX);
        let step = next_step(sched.next_delay(), driver.tick_ms, left_ms);
        tokio::time::sleep(Duration::from_millis(u64::from(step))).await;

        let elapsed = Instant::now().duration_since(last).as_millis();
        let elapsed_ms = Millis::try_from(elapsed).unwrap_or(Millis::MAX);
        sched.advance(elapsed_ms);
        last += Duration::from_millis(u64::from(elapsed_ms));
    }

    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=trace).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        scenario = ?cli.scenario,
        realtime = cli.realtime,
        tick_ms  = ?cli.tick_ms,
        duration_ms = ?cli.duration_ms,
        "Configuration"
    );

    // ── Load scenario ─────────────────────────────────────────────────────────
    let mut scenario = ScenarioManager::new();
    match &cli.scenario {
        Some(path) => {
            if let Err(e) = scenario.load_from_file(path) {
                error!("Failed to load scenario: {:#}", e);
                process::exit(1);
            }
        }
        None => warn!("No scenario file provided, using default heartbeat timer"),
    }

    let mut driver = scenario.driver();
    if let Some(tick_ms) = cli.tick_ms {
        driver.tick_ms = tick_ms;
    }
    if let Some(duration_ms) = cli.duration_ms {
        driver.duration_ms = duration_ms;
    }
    if driver.tick_ms == 0 {
        error!("--tick-ms must be non-zero");
        process::exit(1);
    }

    let timers: Vec<TimerConfig> = if scenario.is_loaded() {
        scenario.timers().cloned().collect()
    } else {
        vec![TimerConfig::default_config("heartbeat")]
    };
    // Callbacks carry `&'static TimerConfig`; the set lives for the whole run.
    let timers: &'static [TimerConfig] = Box::leak(timers.into_boxed_slice());

    // ── Arm timers ────────────────────────────────────────────────────────────
    let sched = SimScheduler::new();
    for timer in timers {
        let armed = match timer.reload_ms {
            Some(reload_ms) => sched.schedule_reload(timer.delay_ms, reload_ms, on_timer, timer),
            None => sched.schedule(timer.delay_ms, on_timer, timer),
        };
        match armed {
            Ok(id) => info!(timer = %timer.name, %id, delay_ms = timer.delay_ms, "armed"),
            Err(e) => warn!(timer = %timer.name, "not armed: {}", e),
        }
    }

    // ── Run ───────────────────────────────────────────────────────────────────
    let covered_ms = if cli.realtime {
        run_realtime(&sched, driver).await
    } else {
        run_simulated(&sched, driver)
    };

    info!(
        covered_ms,
        fired = FIRED.load(Ordering::Relaxed),
        proceeding_ms = sched.proceeding_time(),
        still_armed = sched.active_count(),
        high_water = sched.high_water_mark(),
        capacity = sched.capacity(),
        "Run complete"
    );
}
