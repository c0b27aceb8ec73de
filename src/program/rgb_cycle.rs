//! Whole-tree red, green, blue rotation.

use super::{sleep_unless_cancelled, Program};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{Rgb, TreeDriver, TreeError, PIXEL_COUNT};

pub struct RgbCycle;

#[async_trait]
impl Program for RgbCycle {
    fn id(&self) -> &'static str {
        "rgb_cycle"
    }

    fn name(&self) -> &'static str {
        "RGB Cycle"
    }

    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError> {
        let delay = Duration::from_secs_f64((1.0 / speed.max(0.01)).max(0.01));
        let colors = [Rgb::RED, Rgb::GREEN, Rgb::BLUE];
        let mut step = 0;
        loop {
            tree.set_all(&[colors[step]; PIXEL_COUNT])?;
            tree.show()?;
            step = (step + 1) % colors.len();
            if !sleep_unless_cancelled(&cancel, delay).await {
                return Ok(());
            }
        }
    }
}
