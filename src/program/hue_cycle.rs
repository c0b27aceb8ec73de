//! Whole-tree walk around the hue wheel.

use super::{sleep_unless_cancelled, Program};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{Rgb, TreeDriver, TreeError, PIXEL_COUNT};

pub struct HueCycle;

#[async_trait]
impl Program for HueCycle {
    fn id(&self) -> &'static str {
        "hue_cycle"
    }

    fn name(&self) -> &'static str {
        "Hue Cycle"
    }

    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError> {
        let delay = Duration::from_secs_f64((0.02 / speed.max(0.01)).max(0.005));
        // Faster settings take bigger hue steps as well as shorter frames.
        let step = ((3.0 * speed.max(0.01)) as i32).max(1) as f32;
        let mut hue = 0.0_f32;
        loop {
            let color = Rgb::from_hsv(hue, 1.0, 1.0);
            tree.set_all(&[color; PIXEL_COUNT])?;
            tree.show()?;
            hue = (hue + step) % 360.0;
            if !sleep_unless_cancelled(&cancel, delay).await {
                return Ok(());
            }
        }
    }
}
