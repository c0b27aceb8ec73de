//! Animation programs and their registry.
//!
//! A program is a frame loop against the [`TreeDriver`] capability surface.
//! It owns no hardware and no schedule knowledge; the supervisor decides
//! when one runs and restarts it to change speed. Every frame delay goes
//! through [`sleep_unless_cancelled`], so a stop request is honored within
//! one frame.

mod candles;
mod hue_cycle;
mod one_by_one;
mod police_lights;
mod rgb_cycle;
mod snowfall;
mod sparkles;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{TreeDriver, TreeError};

/// Program that unknown configured ids fall back to.
pub const DEFAULT_PROGRAM_ID: &str = "rgb_cycle";

/// One animation.
#[async_trait]
pub trait Program: Send + Sync {
    /// Stable id used in config, on the bus and on the CLI.
    fn id(&self) -> &'static str;

    /// Human-readable label.
    fn name(&self) -> &'static str;

    /// Loop frames until `cancel` fires. `speed` is fixed for the life of
    /// the run. A returned error means the driver is gone; the supervisor
    /// logs it and reconciles.
    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError>;
}

/// All compiled-in programs. The first entry is the fallback.
pub static PROGRAMS: &[&'static dyn Program] = &[
    &rgb_cycle::RgbCycle,
    &hue_cycle::HueCycle,
    &one_by_one::OneByOne,
    &sparkles::RandomSparkles,
    &candles::Candles,
    &snowfall::Snowfall,
    &police_lights::PoliceLights,
];

pub fn find(id: &str) -> Option<&'static dyn Program> {
    PROGRAMS.iter().copied().find(|program| program.id() == id)
}

/// Look up `id`, falling back to the default program for unknown ids. The
/// fallback is deterministic so a stale config cannot take the tree down.
pub fn resolve(id: &str) -> &'static dyn Program {
    find(id).unwrap_or(PROGRAMS[0])
}

/// Sleep for `delay` unless cancelled first. Returns false on cancellation.
pub async fn sleep_unless_cancelled(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
