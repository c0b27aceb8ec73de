//! Snow drifting down the branch levels under a twinkling star.
//!
//! The program keeps its own level/branch buffer and shifts it one level
//! per frame: flakes spawn at the top, fall unchanged through the middle,
//! and dim as they land. Pixels reach the driver through the layout map.

use super::{sleep_unless_cancelled, Program};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{Rgb, TreeDriver, TreeError, BRANCHES, INDEX_MAP, LEVELS, STAR_INDEX};

pub struct Snowfall;

#[async_trait]
impl Program for Snowfall {
    fn id(&self) -> &'static str {
        "snowfall"
    }

    fn name(&self) -> &'static str {
        "Snowfall"
    }

    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError> {
        let delay = Duration::from_secs_f64((0.3 / speed.max(0.001)).max(0.05));
        let mut rng = StdRng::from_entropy();

        // Flakes are white, so one intensity per (level, branch) is enough.
        let mut flakes = [[0.0_f32; BRANCHES]; LEVELS];
        let mut star = (0.0_f32, 0.0_f32, 0.0_f32);

        loop {
            star = if rng.gen::<f32>() < 0.1 {
                (1.0, 1.0, 1.0)
            } else if rng.gen::<f32>() < 0.05 {
                // Blue-ish tint.
                (0.5, 0.5, 1.0)
            } else {
                // Fade instead of hard off.
                (
                    (star.0 - 0.1).max(0.0),
                    (star.1 - 0.1).max(0.0),
                    (star.2 - 0.1).max(0.0),
                )
            };
            tree.set_pixel(STAR_INDEX, Rgb::from_unit(star.0, star.1, star.2))?;

            for branch in 0..BRANCHES {
                // Landing flakes dim; falling flakes keep their intensity.
                flakes[0][branch] = flakes[1][branch] * 0.7;
                flakes[1][branch] = flakes[2][branch];
                flakes[2][branch] = if rng.gen::<f32>() < 0.15 {
                    rng.gen_range(0.8..1.0)
                } else {
                    0.0
                };
            }
            for (level, row) in INDEX_MAP.iter().enumerate() {
                for (branch, &index) in row.iter().enumerate() {
                    let intensity = flakes[level][branch];
                    tree.set_pixel(index, Rgb::from_unit(intensity, intensity, intensity))?;
                }
            }

            tree.show()?;
            if !sleep_unless_cancelled(&cancel, delay).await {
                return Ok(());
            }
        }
    }
}
