//! APA102 driver for the Pi Hut 3D Xmas tree
//!
//! This crate provides the hardware-facing half of the tree controller:
//!
//! - the [`TreeDriver`] capability trait animation code is written against
//! - the APA102 frame codec and the tree's physical pixel layout
//! - an SPI backend for the real ornament (`/dev/spidev`)
//! - a terminal backend that previews frames as colored cells

pub mod color;
pub mod driver;
pub mod frame;
pub mod layout;
pub mod spidev;
pub mod term;

pub use color::Rgb;
pub use driver::{percent_to_bits, BrightnessChannel, TreeDriver, TreeError, MAX_BRIGHTNESS_BITS};
pub use frame::Apa102Frame;
pub use layout::{body_indices, BRANCHES, INDEX_MAP, LEVELS, PIXEL_COUNT, STAR_INDEX};
pub use spidev::{Apa102Tree, SpiBus, SpidevBus, DEFAULT_SPIDEV};
pub use term::TermTree;
