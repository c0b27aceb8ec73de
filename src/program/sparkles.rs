//! One random pixel gets a random color each frame.

use super::{sleep_unless_cancelled, Program};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{Rgb, TreeDriver, TreeError, PIXEL_COUNT};

pub struct RandomSparkles;

#[async_trait]
impl Program for RandomSparkles {
    fn id(&self) -> &'static str {
        "random_sparkles"
    }

    fn name(&self) -> &'static str {
        "Random Sparkles"
    }

    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError> {
        let delay = Duration::from_secs_f64((0.03 / speed.max(0.01)).max(0.001));
        let mut rng = StdRng::from_entropy();
        loop {
            let index = rng.gen_range(0..PIXEL_COUNT);
            let color = Rgb::new(rng.gen(), rng.gen(), rng.gen());
            tree.set_pixel(index, color)?;
            tree.show()?;
            if !sleep_unless_cancelled(&cancel, delay).await {
                return Ok(());
            }
        }
    }
}
