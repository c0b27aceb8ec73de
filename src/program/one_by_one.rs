//! Red, green, blue painted pixel-by-pixel in strip order.

use super::{sleep_unless_cancelled, Program};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{Rgb, TreeDriver, TreeError, PIXEL_COUNT};

pub struct OneByOne;

#[async_trait]
impl Program for OneByOne {
    fn id(&self) -> &'static str {
        "one_by_one"
    }

    fn name(&self) -> &'static str {
        "One by One"
    }

    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError> {
        let delay = Duration::from_secs_f64((0.02 / speed.max(0.01)).max(0.001));
        loop {
            for color in [Rgb::RED, Rgb::GREEN, Rgb::BLUE] {
                for index in 0..PIXEL_COUNT {
                    tree.set_pixel(index, color)?;
                    tree.show()?;
                    if !sleep_unless_cancelled(&cancel, delay).await {
                        return Ok(());
                    }
                }
            }
        }
    }
}
