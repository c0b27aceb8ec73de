//! Terminal preview backend.
//!
//! Renders the tree as colored cells on stdout with true-color: one star
//! line and the three branch levels top-down, redrawn in place after every
//! `show`. Brightness scales the cell colors so dimming behaves like the
//! hardware. Useful on a desk without the ornament attached.

use crate::color::Rgb;
use crate::driver::{BrightnessChannel, TreeDriver, TreeError, MAX_BRIGHTNESS_BITS};
use crate::layout::{BRANCHES, INDEX_MAP, LEVELS, PIXEL_COUNT, STAR_INDEX};
use crossterm::{
    cursor,
    style::{self, Color, Stylize},
    QueueableCommand,
};
use parking_lot::Mutex;
use std::io::{self, Write};

/// Lines drawn per frame: the star plus one row per level.
const DRAWN_LINES: u16 = (LEVELS + 1) as u16;

struct TermState {
    pixels: [Rgb; PIXEL_COUNT],
    body_bits: u8,
    star_bits: u8,
    drawn: bool,
    closed: bool,
}

/// Tree backend that draws on the terminal.
pub struct TermTree {
    state: Mutex<TermState>,
}

impl Default for TermTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TermTree {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TermState {
                pixels: [Rgb::BLACK; PIXEL_COUNT],
                body_bits: 15,
                star_bits: 15,
                drawn: false,
                closed: false,
            }),
        }
    }

    fn scaled(state: &TermState, index: usize) -> Color {
        let bits = if index == STAR_INDEX {
            state.star_bits
        } else {
            state.body_bits
        };
        let c = state.pixels[index].scale(bits as f32 / MAX_BRIGHTNESS_BITS as f32);
        Color::Rgb {
            r: c.r,
            g: c.g,
            b: c.b,
        }
    }

    fn render(state: &mut TermState) -> io::Result<()> {
        let mut out = io::stdout();
        if state.drawn {
            out.queue(cursor::MoveToPreviousLine(DRAWN_LINES))?;
        }
        // Star, centered over the branch row.
        let star_col = (BRANCHES * 3) / 2 - 1;
        out.queue(style::Print(" ".repeat(star_col)))?;
        out.queue(style::PrintStyledContent(
            "★".with(Self::scaled(state, STAR_INDEX)),
        ))?;
        out.queue(style::Print("\r\n"))?;
        // Levels top-down.
        for level in (0..LEVELS).rev() {
            for &index in &INDEX_MAP[level] {
                out.queue(style::PrintStyledContent(
                    "██ ".with(Self::scaled(state, index)),
                ))?;
            }
            out.queue(style::Print("\r\n"))?;
        }
        out.flush()?;
        state.drawn = true;
        Ok(())
    }
}

impl TreeDriver for TermTree {
    fn set_pixel(&self, index: usize, color: Rgb) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TreeError::Closed);
        }
        if index >= PIXEL_COUNT {
            return Err(TreeError::PixelOutOfRange {
                index,
                count: PIXEL_COUNT,
            });
        }
        state.pixels[index] = color;
        Ok(())
    }

    fn set_all(&self, colors: &[Rgb]) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TreeError::Closed);
        }
        if colors.len() != PIXEL_COUNT {
            return Err(TreeError::WrongFrameLen {
                expected: PIXEL_COUNT,
                got: colors.len(),
            });
        }
        state.pixels.copy_from_slice(colors);
        Ok(())
    }

    fn set_brightness(&self, channel: BrightnessChannel, bits: u8) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TreeError::Closed);
        }
        if bits > MAX_BRIGHTNESS_BITS {
            return Err(TreeError::BrightnessOutOfRange(bits));
        }
        let slot = match channel {
            BrightnessChannel::Body => &mut state.body_bits,
            BrightnessChannel::Star => &mut state.star_bits,
        };
        if *slot == bits {
            return Ok(());
        }
        *slot = bits;
        if state.drawn {
            Self::render(&mut state)?;
        }
        Ok(())
    }

    fn show(&self) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TreeError::Closed);
        }
        Self::render(&mut state)?;
        Ok(())
    }

    fn power_off(&self) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TreeError::Closed);
        }
        state.pixels = [Rgb::BLACK; PIXEL_COUNT];
        Self::render(&mut state)?;
        Ok(())
    }

    fn close(&self) -> Result<(), TreeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.pixels = [Rgb::BLACK; PIXEL_COUNT];
        if state.drawn {
            // Leave the dark tree in the scrollback and park the cursor
            // below it.
            let _ = Self::render(&mut state);
        }
        state.closed = true;
        Ok(())
    }
}
