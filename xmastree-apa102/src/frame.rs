//! APA102 wire frame staging.
//!
//! An update is one contiguous byte transfer: a 4-byte zero start frame,
//! one 4-byte LED frame per pixel (`0b1110_0000 | brightness`, blue, green,
//! red), and a zero end frame long enough to clock the last pixel through
//! the chain. Brightness is the 5-bit global current control in the LED
//! frame header, tracked per channel (body vs star) so the two can be dimmed
//! independently.

use crate::color::Rgb;
use crate::driver::{BrightnessChannel, TreeError, MAX_BRIGHTNESS_BITS};
use crate::layout::{PIXEL_COUNT, STAR_INDEX};

const START_FRAME_LEN: usize = 4;
const LED_FRAME_LEN: usize = 4;
// One extra clock edge per two pixels; 5 zero bytes cover 25 pixels with margin.
const END_FRAME_LEN: usize = 5;
const FRAME_LEN: usize = START_FRAME_LEN + PIXEL_COUNT * LED_FRAME_LEN + END_FRAME_LEN;

/// Staged frame buffer for the whole strip.
#[derive(Debug, Clone)]
pub struct Apa102Frame {
    buf: [u8; FRAME_LEN],
    body_bits: u8,
    star_bits: u8,
}

impl Apa102Frame {
    /// All pixels black at the given per-channel brightness.
    pub fn new(body_bits: u8, star_bits: u8) -> Self {
        let mut frame = Self {
            buf: [0; FRAME_LEN],
            body_bits: body_bits & MAX_BRIGHTNESS_BITS,
            star_bits: star_bits & MAX_BRIGHTNESS_BITS,
        };
        for index in 0..PIXEL_COUNT {
            frame.write_header(index);
        }
        frame
    }

    fn pixel_offset(index: usize) -> usize {
        START_FRAME_LEN + index * LED_FRAME_LEN
    }

    fn write_header(&mut self, index: usize) {
        let bits = if index == STAR_INDEX {
            self.star_bits
        } else {
            self.body_bits
        };
        self.buf[Self::pixel_offset(index)] = 0b1110_0000 | bits;
    }

    /// Stage one pixel color.
    pub fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<(), TreeError> {
        if index >= PIXEL_COUNT {
            return Err(TreeError::PixelOutOfRange {
                index,
                count: PIXEL_COUNT,
            });
        }
        let offset = Self::pixel_offset(index);
        self.buf[offset + 1] = color.b;
        self.buf[offset + 2] = color.g;
        self.buf[offset + 3] = color.r;
        Ok(())
    }

    /// Stage a full strip of colors.
    pub fn set_all(&mut self, colors: &[Rgb]) -> Result<(), TreeError> {
        if colors.len() != PIXEL_COUNT {
            return Err(TreeError::WrongFrameLen {
                expected: PIXEL_COUNT,
                got: colors.len(),
            });
        }
        for (index, color) in colors.iter().enumerate() {
            self.set_pixel(index, *color)?;
        }
        Ok(())
    }

    /// Set one channel's 5-bit brightness, rewriting the header byte of
    /// every pixel on that channel.
    pub fn set_channel_bits(&mut self, channel: BrightnessChannel, bits: u8) -> Result<(), TreeError> {
        if bits > MAX_BRIGHTNESS_BITS {
            return Err(TreeError::BrightnessOutOfRange(bits));
        }
        match channel {
            BrightnessChannel::Body => self.body_bits = bits,
            BrightnessChannel::Star => self.star_bits = bits,
        }
        for index in 0..PIXEL_COUNT {
            self.write_header(index);
        }
        Ok(())
    }

    pub fn channel_bits(&self, channel: BrightnessChannel) -> u8 {
        match channel {
            BrightnessChannel::Body => self.body_bits,
            BrightnessChannel::Star => self.star_bits,
        }
    }

    /// Stage every pixel black. Brightness headers stay as configured.
    pub fn off(&mut self) {
        for index in 0..PIXEL_COUNT {
            let offset = Self::pixel_offset(index);
            self.buf[offset + 1] = 0;
            self.buf[offset + 2] = 0;
            self.buf[offset + 3] = 0;
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_header_pixels_tail() {
        let mut frame = Apa102Frame::new(31, 31);
        frame.set_pixel(0, Rgb::new(1, 2, 3)).unwrap();
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), 4 + 25 * 4 + 5);
        assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
        // LED frame is header, blue, green, red.
        assert_eq!(&bytes[4..8], &[0b1111_1111, 3, 2, 1]);
        assert_eq!(&bytes[bytes.len() - 5..], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn brightness_rewrites_channel_headers_only() {
        let mut frame = Apa102Frame::new(31, 31);
        frame.set_channel_bits(BrightnessChannel::Star, 4).unwrap();
        let bytes = frame.as_bytes();
        for index in 0..PIXEL_COUNT {
            let header = bytes[4 + index * 4];
            if index == STAR_INDEX {
                assert_eq!(header, 0b1110_0000 | 4);
            } else {
                assert_eq!(header, 0b1111_1111);
            }
        }
        assert_eq!(frame.channel_bits(BrightnessChannel::Star), 4);
        assert_eq!(frame.channel_bits(BrightnessChannel::Body), 31);
    }

    #[test]
    fn brightness_beyond_five_bits_is_rejected() {
        let mut frame = Apa102Frame::new(0, 0);
        assert!(matches!(
            frame.set_channel_bits(BrightnessChannel::Body, 32),
            Err(TreeError::BrightnessOutOfRange(32))
        ));
    }

    #[test]
    fn off_clears_colors_not_headers() {
        let mut frame = Apa102Frame::new(10, 20);
        frame.set_all(&[Rgb::WHITE; PIXEL_COUNT]).unwrap();
        frame.off();
        let bytes = frame.as_bytes();
        for index in 0..PIXEL_COUNT {
            let offset = 4 + index * 4;
            assert_eq!(&bytes[offset + 1..offset + 4], &[0, 0, 0]);
            assert_ne!(bytes[offset] & 0b1110_0000, 0);
        }
    }

    #[test]
    fn bad_indices_and_lengths_are_rejected() {
        let mut frame = Apa102Frame::new(31, 31);
        assert!(matches!(
            frame.set_pixel(PIXEL_COUNT, Rgb::BLACK),
            Err(TreeError::PixelOutOfRange { index: 25, .. })
        ));
        assert!(matches!(
            frame.set_all(&[Rgb::BLACK; 3]),
            Err(TreeError::WrongFrameLen { expected: 25, got: 3 })
        ));
    }
}
