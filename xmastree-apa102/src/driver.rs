//! The driver capability surface.
//!
//! Animation programs and the supervisor depend on [`TreeDriver`] only, so
//! the same code runs against SPI hardware, the terminal preview, or a test
//! fake. Staging calls (`set_pixel`, `set_all`) are cheap buffer writes;
//! nothing reaches the device until `show`.

use crate::color::Rgb;
use thiserror::Error;

/// Largest value of the APA102 5-bit global brightness field.
pub const MAX_BRIGHTNESS_BITS: u8 = 31;

/// Errors from tree driver operations
#[derive(Error, Debug)]
pub enum TreeError {
    /// Bus transfer failed
    #[error("bus error: {0}")]
    Bus(#[from] std::io::Error),

    /// Pixel index beyond the strip
    #[error("pixel index {index} out of range (strip has {count})")]
    PixelOutOfRange { index: usize, count: usize },

    /// Full-strip write with the wrong pixel count
    #[error("frame has {got} pixels, expected {expected}")]
    WrongFrameLen { expected: usize, got: usize },

    /// Brightness outside the 5-bit range
    #[error("brightness {0} exceeds the 5-bit range")]
    BrightnessOutOfRange(u8),

    /// Driver was closed
    #[error("driver is closed")]
    Closed,
}

/// The two independently dimmable pixel groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrightnessChannel {
    Body,
    Star,
}

/// Capability set of a tree backend.
///
/// Methods take `&self`; implementations keep their state behind a lock so
/// a driver can be shared as `Arc<dyn TreeDriver>` between the supervisor
/// and the running program. After `close` every operation fails with
/// [`TreeError::Closed`].
pub trait TreeDriver: Send + Sync {
    /// Stage one pixel color.
    fn set_pixel(&self, index: usize, color: Rgb) -> Result<(), TreeError>;

    /// Stage a full strip of colors. The slice length must match the strip.
    fn set_all(&self, colors: &[Rgb]) -> Result<(), TreeError>;

    /// Set a channel's global brightness (`0..=31`). Takes effect
    /// immediately on the currently shown frame.
    fn set_brightness(&self, channel: BrightnessChannel, bits: u8) -> Result<(), TreeError>;

    /// Push the staged frame to the device.
    fn show(&self) -> Result<(), TreeError>;

    /// All pixels dark, pushed immediately.
    fn power_off(&self) -> Result<(), TreeError>;

    /// Power off best-effort and release the backend.
    fn close(&self) -> Result<(), TreeError>;
}

/// Map a user-facing percentage to brightness bits. Monotone, with the
/// endpoints pinned: 0 maps to 0 and 100 to [`MAX_BRIGHTNESS_BITS`].
pub fn percent_to_bits(pct: u8) -> u8 {
    let pct = pct.min(100) as f32;
    (pct / 100.0 * MAX_BRIGHTNESS_BITS as f32).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_endpoints() {
        assert_eq!(percent_to_bits(0), 0);
        assert_eq!(percent_to_bits(100), MAX_BRIGHTNESS_BITS);
        assert_eq!(percent_to_bits(200), MAX_BRIGHTNESS_BITS);
    }

    #[test]
    fn percent_is_monotone() {
        let mut last = 0;
        for pct in 0..=100 {
            let bits = percent_to_bits(pct);
            assert!(bits >= last, "{pct}% mapped below {last}");
            assert!(bits <= MAX_BRIGHTNESS_BITS);
            last = bits;
        }
    }
}
