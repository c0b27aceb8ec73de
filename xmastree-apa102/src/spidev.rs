//! SPI hardware backend.
//!
//! APA102 is clock-driven with no timing floor, so plain writes to the
//! spidev character device are enough; the bus clock stays at the kernel
//! default. [`Apa102Tree`] layers the frame codec over any [`SpiBus`], which
//! keeps the device file out of unit tests.

use crate::color::Rgb;
use crate::driver::{BrightnessChannel, TreeDriver, TreeError};
use crate::frame::Apa102Frame;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Default spidev node on a Raspberry Pi with hardware SPI enabled.
pub const DEFAULT_SPIDEV: &str = "/dev/spidev0.0";

/// Byte sink the frame codec writes to.
pub trait SpiBus: Send {
    fn transfer(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// `/dev/spidevB.D` character device.
pub struct SpidevBus {
    dev: File,
}

impl SpidevBus {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let dev = OpenOptions::new().write(true).open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened spidev");
        Ok(Self { dev })
    }
}

impl SpiBus for SpidevBus {
    fn transfer(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.dev.write_all(bytes)
    }
}

struct Inner {
    frame: Apa102Frame,
    bus: Option<Box<dyn SpiBus>>,
}

/// APA102 strip behind an SPI bus.
pub struct Apa102Tree {
    inner: Mutex<Inner>,
}

impl Apa102Tree {
    /// Wrap a bus. The strip starts dark at half brightness on both
    /// channels; the caller is expected to set brightness from its own
    /// configuration before showing anything.
    pub fn new(bus: Box<dyn SpiBus>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frame: Apa102Frame::new(15, 15),
                bus: Some(bus),
            }),
        }
    }

    /// Open the spidev node at `path` and wrap it.
    pub fn open_spidev(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let bus = SpidevBus::open(path)?;
        Ok(Self::new(Box::new(bus)))
    }

    fn flush(inner: &mut Inner) -> Result<(), TreeError> {
        let Inner { frame, bus } = inner;
        let bus = bus.as_mut().ok_or(TreeError::Closed)?;
        bus.transfer(frame.as_bytes())?;
        Ok(())
    }
}

impl TreeDriver for Apa102Tree {
    fn set_pixel(&self, index: usize, color: Rgb) -> Result<(), TreeError> {
        let mut inner = self.inner.lock();
        if inner.bus.is_none() {
            return Err(TreeError::Closed);
        }
        inner.frame.set_pixel(index, color)
    }

    fn set_all(&self, colors: &[Rgb]) -> Result<(), TreeError> {
        let mut inner = self.inner.lock();
        if inner.bus.is_none() {
            return Err(TreeError::Closed);
        }
        inner.frame.set_all(colors)
    }

    fn set_brightness(&self, channel: BrightnessChannel, bits: u8) -> Result<(), TreeError> {
        let mut inner = self.inner.lock();
        if inner.bus.is_none() {
            return Err(TreeError::Closed);
        }
        if inner.frame.channel_bits(channel) == bits {
            return Ok(());
        }
        inner.frame.set_channel_bits(channel, bits)?;
        // Brightness acts on whatever is currently showing.
        Self::flush(&mut inner)
    }

    fn show(&self) -> Result<(), TreeError> {
        Self::flush(&mut self.inner.lock())
    }

    fn power_off(&self) -> Result<(), TreeError> {
        let mut inner = self.inner.lock();
        if inner.bus.is_none() {
            return Err(TreeError::Closed);
        }
        inner.frame.off();
        Self::flush(&mut inner)
    }

    fn close(&self) -> Result<(), TreeError> {
        let mut inner = self.inner.lock();
        if inner.bus.is_none() {
            return Ok(());
        }
        inner.frame.off();
        if let Err(e) = Self::flush(&mut inner) {
            warn!("final power-off failed: {e}");
        }
        inner.bus = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MAX_BRIGHTNESS_BITS;
    use crate::layout::PIXEL_COUNT;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingBus {
        transfers: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl SpiBus for RecordingBus {
        fn transfer(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.transfers.lock().push(bytes.to_vec());
            Ok(())
        }
    }

    fn tree_with_log() -> (Apa102Tree, Arc<Mutex<Vec<Vec<u8>>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = RecordingBus {
            transfers: log.clone(),
        };
        (Apa102Tree::new(Box::new(bus)), log)
    }

    #[test]
    fn staging_does_not_transfer_until_show() {
        let (tree, log) = tree_with_log();
        tree.set_all(&[Rgb::RED; PIXEL_COUNT]).unwrap();
        assert!(log.lock().is_empty());
        tree.show().unwrap();
        let transfers = log.lock();
        assert_eq!(transfers.len(), 1);
        // First LED frame: header then blue, green, red.
        assert_eq!(&transfers[0][4..8], &[0b1110_1111, 0, 0, 255]);
    }

    #[test]
    fn brightness_change_shows_immediately() {
        let (tree, log) = tree_with_log();
        tree.set_brightness(BrightnessChannel::Body, MAX_BRIGHTNESS_BITS)
            .unwrap();
        assert_eq!(log.lock().len(), 1);
        // Unchanged value stages nothing and transfers nothing.
        tree.set_brightness(BrightnessChannel::Body, MAX_BRIGHTNESS_BITS)
            .unwrap();
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn close_powers_off_then_rejects() {
        let (tree, log) = tree_with_log();
        tree.close().unwrap();
        {
            let transfers = log.lock();
            assert_eq!(transfers.len(), 1);
            let last = transfers.last().unwrap();
            for index in 0..PIXEL_COUNT {
                assert_eq!(&last[4 + index * 4 + 1..4 + index * 4 + 4], &[0, 0, 0]);
            }
        }
        assert!(matches!(tree.show(), Err(TreeError::Closed)));
        assert!(matches!(
            tree.set_pixel(0, Rgb::WHITE),
            Err(TreeError::Closed)
        ));
        // Second close is a no-op.
        tree.close().unwrap();
        assert_eq!(log.lock().len(), 1);
    }
}
