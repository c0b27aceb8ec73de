//! Integration tests for the supervision cycle.
//!
//! These drive the full loop through its public surface: a config store on
//! disk, a manual clock, and a recording driver behind the factory. Time is
//! tokio's paused clock, so a "tick" is deterministic and free.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xmastree::clock::Clock;
use xmastree::config::{ConfigPatch, ConfigStore};
use xmastree::controller::{DriverFactory, TreeController};
use xmastree_apa102::{percent_to_bits, BrightnessChannel, Rgb, TreeDriver, TreeError};

// ── Test doubles ──

#[derive(Default, Clone)]
struct Counters {
    power_off: usize,
    close: usize,
    show: usize,
    body_bits: Vec<u8>,
    star_bits: Vec<u8>,
}

struct FakeTree {
    counters: Arc<Mutex<Counters>>,
}

impl TreeDriver for FakeTree {
    fn set_pixel(&self, _: usize, _: Rgb) -> Result<(), TreeError> {
        Ok(())
    }
    fn set_all(&self, _: &[Rgb]) -> Result<(), TreeError> {
        Ok(())
    }
    fn set_brightness(&self, channel: BrightnessChannel, bits: u8) -> Result<(), TreeError> {
        let mut counters = self.counters.lock().unwrap();
        match channel {
            BrightnessChannel::Body => counters.body_bits.push(bits),
            BrightnessChannel::Star => counters.star_bits.push(bits),
        }
        Ok(())
    }
    fn show(&self) -> Result<(), TreeError> {
        self.counters.lock().unwrap().show += 1;
        Ok(())
    }
    fn power_off(&self) -> Result<(), TreeError> {
        self.counters.lock().unwrap().power_off += 1;
        Ok(())
    }
    fn close(&self) -> Result<(), TreeError> {
        self.counters.lock().unwrap().close += 1;
        Ok(())
    }
}

struct TestClock(Mutex<NaiveDateTime>);

impl TestClock {
    fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

/// A Monday; the default schedule block (07:30-23:00, every day) applies.
fn monday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 8, 24)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

struct Rig {
    store: Arc<ConfigStore>,
    clock: Arc<TestClock>,
    counters: Arc<Mutex<Counters>>,
    builds: Arc<Mutex<usize>>,
    path: PathBuf,
}

impl Rig {
    fn new(tag: &str, start: NaiveDateTime) -> Self {
        let path = std::env::temp_dir().join(format!(
            "xmastree-cycle-{}-{tag}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Self {
            store: Arc::new(ConfigStore::open(&path)),
            clock: Arc::new(TestClock(Mutex::new(start))),
            counters: Arc::new(Mutex::new(Counters::default())),
            builds: Arc::new(Mutex::new(0)),
            path,
        }
    }

    fn spawn(&self) -> Arc<TreeController> {
        let counters = Arc::clone(&self.counters);
        let builds = Arc::clone(&self.builds);
        let factory: DriverFactory = Box::new(move || {
            *builds.lock().unwrap() += 1;
            Ok(Arc::new(FakeTree {
                counters: Arc::clone(&counters),
            }) as Arc<dyn TreeDriver>)
        });
        TreeController::spawn(
            Arc::clone(&self.store),
            Arc::clone(&self.clock) as Arc<dyn Clock>,
            factory,
        )
    }

    fn counts(&self) -> Counters {
        self.counters.lock().unwrap().clone()
    }

    fn builds(&self) -> usize {
        *self.builds.lock().unwrap()
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn settle() {
    // Longer than one reconcile period.
    tokio::time::sleep(Duration::from_millis(300)).await;
}

// ── Power cycle ──

#[tokio::test(start_paused = true)]
async fn stays_dark_outside_the_window() {
    let rig = Rig::new("dark", monday(23, 30));
    let controller = rig.spawn();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(rig.builds(), 0, "driver must not be constructed while off");
    assert!(!controller.runtime_state().running);

    controller.shutdown().await;
    let counts = rig.counts();
    assert_eq!(counts.power_off, 0);
    assert_eq!(counts.close, 0);
}

#[tokio::test(start_paused = true)]
async fn window_transition_powers_off_exactly_once() {
    let rig = Rig::new("transition", monday(12, 0));
    let controller = rig.spawn();

    settle().await;
    assert_eq!(rig.builds(), 1);
    let state = controller.runtime_state();
    assert!(state.running);
    assert_eq!(state.program_id.as_deref(), Some("rgb_cycle"));
    assert_eq!(state.program_speed, Some(1.0));
    assert!(rig.counts().show >= 1, "program should have drawn a frame");

    // Leave the window: one power-off, then quiet.
    rig.clock.set(monday(23, 30));
    settle().await;
    assert!(!controller.runtime_state().running);
    assert_eq!(rig.counts().power_off, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(rig.counts().power_off, 1, "power-off must not repeat");
    assert_eq!(rig.builds(), 1, "driver is kept across off periods");

    controller.shutdown().await;
    let counts = rig.counts();
    assert_eq!(counts.power_off, 1, "already off at shutdown");
    assert_eq!(counts.close, 1);
}

#[tokio::test(start_paused = true)]
async fn countdown_overrides_the_schedule_window() {
    let rig = Rig::new("countdown", monday(23, 30));
    let controller = rig.spawn();

    settle().await;
    assert!(!controller.runtime_state().running);

    controller
        .update_config(ConfigPatch::SetCountdown(monday(23, 45)))
        .unwrap();
    settle().await;
    assert!(controller.runtime_state().running);
    assert_eq!(rig.builds(), 1);

    rig.clock.set(monday(23, 50));
    settle().await;
    assert!(!controller.runtime_state().running);
    assert_eq!(rig.counts().power_off, 1);

    controller.shutdown().await;
}

// ── Program reconciliation ──

#[tokio::test(start_paused = true)]
async fn unknown_program_falls_back_without_restarting() {
    let rig = Rig::new("fallback", monday(12, 0));
    rig.store
        .update(ConfigPatch::SetProgram {
            id: "candles".into(),
            speed: Some(0.25),
        })
        .unwrap();
    let controller = rig.spawn();

    settle().await;
    let state = controller.runtime_state();
    assert_eq!(state.program_id.as_deref(), Some("candles"));

    // A config id nothing answers to resolves to the first registry entry.
    controller
        .update_config(ConfigPatch::SetProgram {
            id: "does_not_exist".into(),
            speed: Some(0.25),
        })
        .unwrap();
    settle().await;
    let state = controller.runtime_state();
    assert!(state.running);
    assert_eq!(state.program_id.as_deref(), Some("rgb_cycle"));

    // At 0.25x the cycle draws every 4s. A restart every tick would draw
    // its first frame over and over; a settled run draws nothing in 1s.
    let before = rig.counts().show;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let after = rig.counts().show;
    assert!(
        after - before <= 1,
        "fallback program kept restarting ({} frames in 1s)",
        after - before
    );

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn program_switch_follows_config() {
    let rig = Rig::new("switch", monday(12, 0));
    let controller = rig.spawn();

    settle().await;
    assert_eq!(
        controller.runtime_state().program_id.as_deref(),
        Some("rgb_cycle")
    );

    controller
        .update_config(ConfigPatch::SetProgram {
            id: "candles".into(),
            speed: Some(2.0),
        })
        .unwrap();
    settle().await;
    let state = controller.runtime_state();
    assert!(state.running);
    assert_eq!(state.program_id.as_deref(), Some("candles"));
    assert_eq!(state.program_speed, Some(2.0));
    assert_eq!(rig.builds(), 1, "a switch reuses the driver");
    assert_eq!(rig.counts().close, 0);

    // A speed change alone also lands, through a restart of the same program.
    controller.update_config(ConfigPatch::SetSpeed(3.0)).unwrap();
    settle().await;
    let state = controller.runtime_state();
    assert_eq!(state.program_id.as_deref(), Some("candles"));
    assert_eq!(state.program_speed, Some(3.0));

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn brightness_change_applies_without_restart() {
    let rig = Rig::new("brightness", monday(12, 0));
    let controller = rig.spawn();

    settle().await;
    let counts = rig.counts();
    assert_eq!(counts.body_bits.last(), Some(&percent_to_bits(50)));
    assert_eq!(counts.star_bits.last(), Some(&percent_to_bits(50)));
    let speed_before = controller.runtime_state().program_speed;

    controller
        .update_config(ConfigPatch::SetBrightness {
            body_pct: Some(80),
            star_pct: None,
        })
        .unwrap();
    settle().await;
    let counts = rig.counts();
    assert_eq!(counts.body_bits.last(), Some(&percent_to_bits(80)));
    assert_eq!(counts.star_bits.last(), Some(&percent_to_bits(50)));

    let state = controller.runtime_state();
    assert!(state.running);
    assert_eq!(state.program_speed, speed_before);

    controller.shutdown().await;
}
