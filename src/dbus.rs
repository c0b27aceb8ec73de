//! D-Bus control surface for the daemon.
//!
//! Bus name: `org.xmastree.Tree`
//! Object path: `/org/xmastree/Tree1`, interface `org.xmastree.Tree1`
//!
//! Mutation methods validate their arguments, build a [`ConfigPatch`] and
//! return the updated config as JSON so the CLI can echo the result without
//! a second round-trip. The supervisor picks the new config up on its next
//! tick; nothing here touches the hardware.

use crate::config::{
    AppConfig, ConfigPatch, Mode, ScheduleBlock, COUNTDOWN_MAX_MINUTES, COUNTDOWN_MIN_MINUTES,
    MAX_SCHEDULE_BLOCKS,
};
use crate::controller::{self, TreeController};
use crate::program;
use crate::schedule;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use zbus::interface;

pub const BUS_NAME: &str = "org.xmastree.Tree";
pub const OBJECT_PATH: &str = "/org/xmastree/Tree1";
pub const INTERFACE: &str = "org.xmastree.Tree1";

/// Everything a control client needs in one round-trip.
#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    pub now: NaiveDateTime,
    pub config: AppConfig,
    pub in_schedule_window: bool,
    pub desired_on: bool,
    pub running: bool,
    pub active_program: Option<String>,
    pub active_speed: Option<f64>,
    pub programs: Vec<ProgramInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub id: String,
    pub name: String,
}

/// D-Bus interface implementation.
pub struct TreeInterface {
    controller: Arc<TreeController>,
    quit: CancellationToken,
}

impl TreeInterface {
    /// `quit` is cancelled by the `Shutdown` method; the daemon main loop
    /// waits on it alongside the usual signals.
    pub fn new(controller: Arc<TreeController>, quit: CancellationToken) -> Self {
        Self { controller, quit }
    }

    fn apply(&self, patch: ConfigPatch) -> zbus::fdo::Result<String> {
        let config = self
            .controller
            .update_config(patch)
            .map_err(|e| zbus::fdo::Error::Failed(format!("config update failed: {e}")))?;
        encode(&config)
    }
}

fn encode(config: &AppConfig) -> zbus::fdo::Result<String> {
    serde_json::to_string(config)
        .map_err(|e| zbus::fdo::Error::Failed(format!("encode config: {e}")))
}

fn finite(value: f64, what: &str) -> zbus::fdo::Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(zbus::fdo::Error::InvalidArgs(format!(
            "{what} must be a finite number"
        )))
    }
}

#[interface(name = "org.xmastree.Tree1")]
impl TreeInterface {
    /// Full status as one JSON document (see [`Status`]).
    async fn status(&self) -> zbus::fdo::Result<String> {
        let config = self.controller.config_snapshot();
        let now = self.controller.now();
        let runtime = self.controller.runtime_state();
        let status = Status {
            now,
            in_schedule_window: schedule::is_within_schedule(now, &config.schedule_blocks),
            desired_on: controller::desired_on(now, &config),
            running: runtime.running,
            active_program: runtime.program_id,
            active_speed: runtime.program_speed,
            programs: program::PROGRAMS
                .iter()
                .map(|p| ProgramInfo {
                    id: p.id().to_string(),
                    name: p.name().to_string(),
                })
                .collect(),
            config,
        };
        serde_json::to_string(&status)
            .map_err(|e| zbus::fdo::Error::Failed(format!("encode status: {e}")))
    }

    /// Set the power mode: `manual_on`, `manual_off` or `auto`.
    async fn set_mode(&self, mode: &str) -> zbus::fdo::Result<String> {
        let mode = Mode::from_tag(mode).ok_or_else(|| {
            zbus::fdo::Error::InvalidArgs(format!(
                "unknown mode {mode:?} (expected manual_on, manual_off or auto)"
            ))
        })?;
        self.apply(ConfigPatch::SetMode(mode))
    }

    /// Select a program. `speed <= 0` keeps the current speed.
    async fn set_program(&self, id: &str, speed: f64) -> zbus::fdo::Result<String> {
        // Unknown ids are rejected here; the registry fallback is for
        // config drift, not for the API.
        let program = program::find(id).ok_or_else(|| {
            zbus::fdo::Error::InvalidArgs(format!("unknown program: {id}"))
        })?;
        let speed = finite(speed, "speed")?;
        self.apply(ConfigPatch::SetProgram {
            id: program.id().to_string(),
            speed: (speed > 0.0).then_some(speed),
        })
    }

    /// Set the program speed. Out-of-range values clamp.
    async fn set_speed(&self, speed: f64) -> zbus::fdo::Result<String> {
        let speed = finite(speed, "speed")?;
        self.apply(ConfigPatch::SetSpeed(speed))
    }

    /// Nudge the program speed by a delta, clamped at the bounds.
    async fn adjust_speed(&self, delta: f64) -> zbus::fdo::Result<String> {
        let delta = finite(delta, "delta")?;
        self.apply(ConfigPatch::AdjustSpeed { delta })
    }

    /// Set brightness percent on `body`, `star` or `both`.
    async fn set_brightness(&self, channel: &str, pct: u8) -> zbus::fdo::Result<String> {
        if pct > 100 {
            return Err(zbus::fdo::Error::InvalidArgs(format!(
                "brightness {pct} out of range (0-100)"
            )));
        }
        let (body, star) = match channel {
            "body" => (Some(pct), None),
            "star" => (None, Some(pct)),
            "both" => (Some(pct), Some(pct)),
            other => {
                return Err(zbus::fdo::Error::InvalidArgs(format!(
                    "unknown channel {other:?} (expected body, star or both)"
                )))
            }
        };
        self.apply(ConfigPatch::SetBrightness {
            body_pct: body,
            star_pct: star,
        })
    }

    /// Replace the whole schedule. `blocks_json` is a JSON array in the
    /// config file format.
    async fn set_schedule(&self, blocks_json: &str) -> zbus::fdo::Result<String> {
        let blocks: Vec<ScheduleBlock> = serde_json::from_str(blocks_json)
            .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad schedule: {e}")))?;
        if blocks.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs(
                "at least one schedule block is required".into(),
            ));
        }
        if blocks.len() > MAX_SCHEDULE_BLOCKS {
            return Err(zbus::fdo::Error::InvalidArgs(format!(
                "too many schedule blocks ({}, maximum {MAX_SCHEDULE_BLOCKS})",
                blocks.len()
            )));
        }
        self.apply(ConfigPatch::ReplaceSchedule(blocks))
    }

    /// Force the tree on for `minutes` (clamped to 1..=1440) from the
    /// daemon's clock. Returns the updated config with the computed
    /// timestamp.
    async fn set_countdown(&self, minutes: u32) -> zbus::fdo::Result<String> {
        let minutes = minutes.clamp(COUNTDOWN_MIN_MINUTES, COUNTDOWN_MAX_MINUTES);
        let now = self.controller.now();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let until = now + chrono::Duration::minutes(minutes as i64);
        self.apply(ConfigPatch::SetCountdown(until))
    }

    /// Drop the countdown override.
    async fn clear_countdown(&self) -> zbus::fdo::Result<String> {
        self.apply(ConfigPatch::ClearCountdown)
    }

    /// Stop the daemon cleanly.
    async fn shutdown(&self) -> zbus::fdo::Result<()> {
        info!("shutdown requested over D-Bus");
        self.quit.cancel();
        Ok(())
    }
}

/// Serve the interface on the session bus. The returned connection holds
/// the bus name for as long as it lives.
pub async fn serve(
    controller: Arc<TreeController>,
    quit: CancellationToken,
) -> zbus::Result<zbus::Connection> {
    zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, TreeInterface::new(controller, quit))?
        .build()
        .await
}
