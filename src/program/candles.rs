//! Candle-like warm flicker.
//!
//! Every body pixel random-walks its own brightness toward a drifting
//! target and maps it through a piecewise ember-to-amber palette; a weak
//! global modulation keeps the flames loosely in sympathy without moving
//! in lockstep. The star flickers independently with a slight white bias.

use super::{sleep_unless_cancelled, Program};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use xmastree_apa102::{body_indices, Rgb, TreeDriver, TreeError, STAR_INDEX};

/// How strongly the global modulation bends per-pixel brightness.
const GLOBAL_STRENGTH: f32 = 0.05;

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Map a 0..1 brightness to a candle color. Green is deliberately kept low
/// and compressed; typical RGB LEDs skew green in the yellow region, and
/// taming it makes the hot end read as amber instead of lime.
fn candle_rgb(brightness: f32, white_bias: f32) -> (f32, f32, f32) {
    let b = brightness.clamp(0.0, 1.0);
    let t = ((b - 0.10) / 0.90).clamp(0.0, 1.0).powf(1.35);

    // Ember, then orange, then amber.
    let (mut r, mut g, mut blue) = if t < 0.45 {
        let tt = t / 0.45;
        (1.0, lerp(0.02, 0.22, tt), lerp(0.00, 0.01, tt))
    } else if t < 0.80 {
        let tt = (t - 0.45) / 0.35;
        (1.0, lerp(0.22, 0.55, tt), lerp(0.01, 0.05, tt))
    } else {
        let tt = (t - 0.80) / 0.20;
        (1.0, lerp(0.55, 0.72, tt), lerp(0.05, 0.12, tt))
    };

    let wb = white_bias.clamp(0.0, 1.0);
    if wb > 0.0 {
        r = lerp(r, 1.0, wb);
        g = lerp(g, 0.90, wb);
        blue = lerp(blue, 0.20, wb);
    }

    g = (g * 0.82).powf(1.10);
    (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), blue.clamp(0.0, 1.0))
}

struct Flame {
    intensity: f32,
    target: f32,
    rate: f32,
}

pub struct Candles;

#[async_trait]
impl Program for Candles {
    fn id(&self) -> &'static str {
        "candles"
    }

    fn name(&self) -> &'static str {
        "Candles"
    }

    async fn run(
        &self,
        tree: Arc<dyn TreeDriver>,
        cancel: CancellationToken,
        speed: f64,
    ) -> Result<(), TreeError> {
        let s = speed.max(0.001) as f32;
        let delay = Duration::from_secs_f64((1.0 / speed.max(0.001)).max(0.001));
        let mut rng = StdRng::from_entropy();

        let mut body: Vec<Flame> = body_indices()
            .map(|_| {
                let intensity = rng.gen_range(0.35..0.8);
                Flame {
                    intensity,
                    target: intensity,
                    rate: rng.gen_range(0.7..1.4),
                }
            })
            .collect();
        let mut star = {
            let intensity = rng.gen_range(0.55..0.90);
            Flame {
                intensity,
                target: intensity,
                rate: rng.gen_range(0.8..1.2),
            }
        };
        let mut global_intensity = 0.5_f32;
        let mut global_target = 0.5_f32;

        loop {
            // The global swell drifts slowly; its pace scales with speed.
            let global_alpha = (0.02 * (s / 10.0)).clamp(0.0, 1.0);
            if rng.gen::<f32>() < global_alpha {
                global_target = rng.gen_range(0.35..0.75);
            }
            global_intensity = lerp(global_intensity, global_target, global_alpha);
            let global_factor = 1.0 + GLOBAL_STRENGTH * ((global_intensity - 0.5) * 2.0);

            let star_alpha = (0.04 * (s / 10.0) * star.rate).clamp(0.0, 1.0);
            if rng.gen::<f32>() < star_alpha {
                star.target = 0.35 + rng.gen::<f32>().powf(0.65) * 0.65;
            }
            star.intensity = lerp(star.intensity, star.target, star_alpha);
            let star_brightness =
                (star.intensity * (1.0 + 0.02 * ((global_intensity - 0.5) * 2.0))).clamp(0.0, 1.0);
            let (sr, sg, sb) = candle_rgb(star_brightness, 0.18);
            let star_jitter = 1.0 + rng.gen_range(-0.04..0.04) * (0.25 + 0.75 * star_brightness);
            tree.set_pixel(
                STAR_INDEX,
                Rgb::from_unit(sr * star_jitter, sg * star_jitter, sb * star_jitter),
            )?;

            for (flame, index) in body.iter_mut().zip(body_indices()) {
                let alpha = (0.05 * (s / 10.0) * flame.rate).clamp(0.0, 1.0);
                if rng.gen::<f32>() < alpha {
                    // Bias toward mid values for gentler motion.
                    flame.target = 0.15 + rng.gen::<f32>().powf(0.7) * 0.85;
                }
                flame.intensity = lerp(flame.intensity, flame.target, alpha);
                let brightness = (flame.intensity * global_factor).clamp(0.0, 1.0);
                let (r, g, b) = candle_rgb(brightness, 0.0);
                let jitter = 1.0 + rng.gen_range(-0.06..0.06) * (0.3 + 0.7 * brightness);
                tree.set_pixel(
                    index,
                    Rgb::from_unit(
                        r * brightness * jitter,
                        g * brightness * jitter,
                        b * brightness * jitter,
                    ),
                )?;
            }

            tree.show()?;
            if !sleep_unless_cancelled(&cancel, delay).await {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_warm_across_the_range() {
        for step in 0..=20 {
            let (r, g, b) = candle_rgb(step as f32 / 20.0, 0.0);
            assert!(r >= g && g >= b, "palette must stay red-dominant");
            assert!((0.0..=1.0).contains(&r));
            assert!((0.0..=1.0).contains(&g));
            assert!((0.0..=1.0).contains(&b));
        }
    }

    #[test]
    fn white_bias_lifts_green_and_blue() {
        let (_, g0, b0) = candle_rgb(0.9, 0.0);
        let (_, g1, b1) = candle_rgb(0.9, 0.18);
        assert!(g1 > g0);
        assert!(b1 > b0);
    }
}
