//! Rotating red and blue beacon.
//!
//! A red pair of adjacent branches and a blue pair on the opposite side
//! rotate one branch per frame; the star follows whichever side faces it.

use super::{sleep_unless_cancelled, Program};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{Rgb, TreeDriver, TreeError, BRANCHES, INDEX_MAP, LEVELS, PIXEL_COUNT, STAR_INDEX};

pub struct PoliceLights;

#[async_trait]
impl Program for PoliceLights {
    fn id(&self) -> &'static str {
        "police_lights"
    }

    fn name(&self) -> &'static str {
        "Police Lights"
    }

    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError> {
        // Has to be fairly quick to read as a siren.
        let delay = Duration::from_secs_f64((0.1 / speed.max(0.001)).max(0.01));
        let mut offset = 0_usize;
        loop {
            let mut colors = [Rgb::BLACK; PIXEL_COUNT];
            for branch in [offset % BRANCHES, (offset + 1) % BRANCHES] {
                for level in 0..LEVELS {
                    colors[INDEX_MAP[level][branch]] = Rgb::RED;
                }
            }
            for branch in [(offset + 4) % BRANCHES, (offset + 5) % BRANCHES] {
                for level in 0..LEVELS {
                    colors[INDEX_MAP[level][branch]] = Rgb::BLUE;
                }
            }
            colors[STAR_INDEX] = if offset % BRANCHES < 4 {
                Rgb::RED
            } else {
                Rgb::BLUE
            };
            tree.set_all(&colors)?;
            tree.show()?;
            offset = (offset + 1) % BRANCHES;
            if !sleep_unless_cancelled(&cancel, delay).await {
                return Ok(());
            }
        }
    }
}
