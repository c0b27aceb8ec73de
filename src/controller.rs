//! Reconciliation supervisor and its public handle.
//!
//! The supervisor wakes every [`TICK_PERIOD`], derives the desired power
//! state from config and clock, and converges the actual state toward it:
//! constructing the driver lazily, applying brightness, starting, restarting
//! or stopping the program task, and powering the hardware off exactly once
//! per OFF transition. Control surfaces never touch the hardware; they write
//! config through [`TreeController::update_config`] and the next tick picks
//! it up.

use crate::clock::Clock;
use crate::config::{AppConfig, ConfigError, ConfigPatch, ConfigStore, Mode};
use crate::program;
use crate::runner::ProgramRunner;
use crate::schedule;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xmastree_apa102::{percent_to_bits, BrightnessChannel, TreeDriver, TreeError};

/// Reconcile cadence. A config write is visible within one period.
pub const TICK_PERIOD: Duration = Duration::from_millis(250);

/// Bound on waiting for the supervisor task during shutdown. Covers the
/// runner's own stop bound plus the final power-off.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the driver on first need, so the daemon can start and serve its
/// API before the device file exists.
pub type DriverFactory = Box<dyn Fn() -> Result<Arc<dyn TreeDriver>, TreeError> + Send>;

/// What the supervisor is currently doing, published every tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeState {
    pub running: bool,
    pub program_id: Option<String>,
    pub program_speed: Option<f64>,
}

/// Pure power policy: manual modes win outright, Auto follows the schedule
/// with the countdown as a forced-on override until its timestamp passes.
pub fn desired_on(now: NaiveDateTime, config: &AppConfig) -> bool {
    match config.mode {
        Mode::ManualOn => true,
        Mode::ManualOff => false,
        Mode::Auto => {
            schedule::is_within_schedule(now, &config.schedule_blocks)
                || config.countdown_until.map_or(false, |until| until > now)
        }
    }
}

struct Supervisor {
    store: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    factory: DriverFactory,
    tree: Option<Arc<dyn TreeDriver>>,
    runner: ProgramRunner,
    /// Set while the hardware may be lit; cleared only after a successful
    /// power-off so failures retry next tick.
    powered: bool,
    driver_warned: bool,
    state_tx: watch::Sender<RuntimeState>,
}

impl Supervisor {
    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("supervisor started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        self.runner.stop().await;
        if let Some(tree) = self.tree.take() {
            if self.powered {
                if let Err(e) = tree.power_off() {
                    warn!("power off during shutdown failed: {e}");
                }
            }
            if let Err(e) = tree.close() {
                warn!("driver close failed: {e}");
            }
        }
        self.publish();
        info!("supervisor stopped");
    }

    async fn tick(&mut self) {
        let config = self.store.snapshot();
        let now = self.clock.now();
        if desired_on(now, &config) {
            self.reconcile_on(&config).await;
        } else {
            self.reconcile_off().await;
        }
        self.publish();
    }

    async fn reconcile_off(&mut self) {
        if self.runner.running().is_some() {
            self.runner.stop().await;
        }
        if !self.powered {
            return;
        }
        let Some(tree) = &self.tree else {
            self.powered = false;
            return;
        };
        match tree.power_off() {
            Ok(()) => {
                info!("tree powered off");
                self.powered = false;
            }
            // powered stays set, so the power-off retries next tick.
            Err(e) => warn!("power off failed: {e}"),
        }
    }

    async fn reconcile_on(&mut self, config: &AppConfig) {
        let Some(tree) = self.ensure_tree() else {
            return;
        };
        self.powered = true;
        self.apply_brightness(&tree, config);

        let target = program::resolve(&config.program_id);
        let speed = config.program_speed;
        // Compare resolved ids, so an unknown configured id settles on the
        // fallback instead of restarting it every tick.
        let restart = match self.runner.running() {
            None => true,
            Some(run) if !run.is_alive() => {
                debug!(program = run.program_id(), "program is gone, restarting");
                true
            }
            Some(run) if run.program_id() != target.id() => true,
            Some(run) if run.speed() != speed => true,
            Some(_) => false,
        };
        if restart {
            self.runner.stop().await;
            self.runner.start(target, tree, speed);
        }
    }

    fn ensure_tree(&mut self) -> Option<Arc<dyn TreeDriver>> {
        if let Some(tree) = &self.tree {
            return Some(tree.clone());
        }
        match (self.factory)() {
            Ok(tree) => {
                info!("tree driver ready");
                self.driver_warned = false;
                self.tree = Some(tree.clone());
                Some(tree)
            }
            Err(e) => {
                if self.driver_warned {
                    debug!("tree driver still unavailable: {e}");
                } else {
                    warn!("tree driver unavailable, will keep retrying: {e}");
                    self.driver_warned = true;
                }
                None
            }
        }
    }

    /// Brightness is re-applied from config on every ON tick; the driver
    /// skips unchanged values, so a config change shows up immediately
    /// without restarting the program.
    fn apply_brightness(&self, tree: &Arc<dyn TreeDriver>, config: &AppConfig) {
        let body = percent_to_bits(config.body_brightness_pct);
        let star = percent_to_bits(config.star_brightness_pct);
        if let Err(e) = tree.set_brightness(BrightnessChannel::Body, body) {
            warn!("setting body brightness failed: {e}");
        }
        if let Err(e) = tree.set_brightness(BrightnessChannel::Star, star) {
            warn!("setting star brightness failed: {e}");
        }
    }

    fn publish(&self) {
        let state = match self.runner.running() {
            Some(run) if run.is_alive() => RuntimeState {
                running: true,
                program_id: Some(run.program_id().to_string()),
                program_speed: Some(run.speed()),
            },
            _ => RuntimeState::default(),
        };
        self.state_tx.send_replace(state);
    }
}

/// Handle to a running supervisor.
pub struct TreeController {
    store: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    state_rx: watch::Receiver<RuntimeState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TreeController {
    /// Start the supervisor on the current tokio runtime.
    pub fn spawn(
        store: Arc<ConfigStore>,
        clock: Arc<dyn Clock>,
        factory: DriverFactory,
    ) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(RuntimeState::default());
        let cancel = CancellationToken::new();
        let supervisor = Supervisor {
            store: store.clone(),
            clock: clock.clone(),
            factory,
            tree: None,
            runner: ProgramRunner::default(),
            powered: false,
            driver_warned: false,
            state_tx,
        };
        let task = tokio::spawn(supervisor.run(cancel.clone()));
        Arc::new(Self {
            store,
            clock,
            cancel,
            state_rx,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn config_snapshot(&self) -> AppConfig {
        self.store.snapshot()
    }

    pub fn update_config(&self, patch: ConfigPatch) -> Result<AppConfig, ConfigError> {
        self.store.update(patch)
    }

    pub fn runtime_state(&self) -> RuntimeState {
        self.state_rx.borrow().clone()
    }

    /// The supervisor's notion of now; control surfaces use it so countdown
    /// math and status reporting share one time source.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Stop the supervisor, which stops the program and powers off the
    /// hardware on its way out. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("supervisor task panicked: {e}"),
                Err(_) => warn!("supervisor did not stop within {SHUTDOWN_TIMEOUT:?}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleBlock;
    use chrono::{NaiveDate, NaiveTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        // A Monday.
        NaiveDate::from_ymd_opt(2026, 8, 24)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn config_with_window(start: (u32, u32), end: (u32, u32)) -> AppConfig {
        AppConfig {
            schedule_blocks: vec![ScheduleBlock {
                start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
                end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
                days: None,
                enabled: true,
            }],
            ..AppConfig::default()
        }
    }

    #[test]
    fn manual_modes_ignore_the_schedule() {
        let mut config = config_with_window((0, 0), (0, 0));
        config.mode = Mode::ManualOn;
        assert!(desired_on(at(12, 0), &config));
        config.mode = Mode::ManualOff;
        config.schedule_blocks[0].end = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
        assert!(!desired_on(at(12, 0), &config));
    }

    #[test]
    fn auto_follows_the_window() {
        let config = config_with_window((7, 30), (23, 0));
        assert!(desired_on(at(8, 0), &config));
        assert!(!desired_on(at(23, 30), &config));
    }

    #[test]
    fn countdown_forces_on_until_it_passes() {
        let mut config = config_with_window((7, 30), (8, 0));
        config.countdown_until = Some(at(13, 0));
        assert!(desired_on(at(12, 59), &config));
        // The deadline itself is already off.
        assert!(!desired_on(at(13, 0), &config));
        assert!(!desired_on(at(14, 0), &config));
        // Manual off beats the countdown.
        config.mode = Mode::ManualOff;
        assert!(!desired_on(at(12, 0), &config));
    }
}
