//! RGB color type shared by the frame codec, the drivers, and the
//! animation programs.

/// RGB color tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255 };
    pub const RED: Self = Self { r: 255, g: 0, b: 0 };
    pub const GREEN: Self = Self { r: 0, g: 255, b: 0 };
    pub const BLUE: Self = Self { r: 0, g: 0, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create from HSV (h: 0-360, s: 0-1, v: 0-1).
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        let h = h.rem_euclid(360.0);
        let s = s.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match (h / 60.0) as i32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Self {
            r: ((r + m) * 255.0) as u8,
            g: ((g + m) * 255.0) as u8,
            b: ((b + m) * 255.0) as u8,
        }
    }

    /// Create from unit-interval channels; values outside [0, 1] clamp.
    pub fn from_unit(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: (r.clamp(0.0, 1.0) * 255.0) as u8,
            g: (g.clamp(0.0, 1.0) * 255.0) as u8,
            b: (b.clamp(0.0, 1.0) * 255.0) as u8,
        }
    }

    /// Scale brightness by a factor in [0, 1].
    pub fn scale(self, factor: f32) -> Self {
        let f = factor.clamp(0.0, 1.0);
        Self {
            r: (self.r as f32 * f) as u8,
            g: (self.g as f32 * f) as u8,
            b: (self.b as f32 * f) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primary_angles() {
        assert_eq!(Rgb::from_hsv(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hsv(120.0, 1.0, 1.0), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::from_hsv(240.0, 1.0, 1.0), Rgb::new(0, 0, 255));
    }

    #[test]
    fn hsv_wraps_and_desaturates() {
        assert_eq!(Rgb::from_hsv(360.0, 1.0, 1.0), Rgb::from_hsv(0.0, 1.0, 1.0));
        assert_eq!(Rgb::from_hsv(-120.0, 1.0, 1.0), Rgb::from_hsv(240.0, 1.0, 1.0));
        let gray = Rgb::from_hsv(200.0, 0.0, 0.5);
        assert_eq!(gray.r, gray.g);
        assert_eq!(gray.g, gray.b);
    }

    #[test]
    fn unit_channels_clamp() {
        assert_eq!(Rgb::from_unit(1.0, 0.0, 0.5), Rgb::new(255, 0, 127));
        assert_eq!(Rgb::from_unit(1.7, -0.3, 0.0), Rgb::new(255, 0, 0));
    }

    #[test]
    fn scale_clamps_factor() {
        assert_eq!(Rgb::WHITE.scale(0.0), Rgb::BLACK);
        assert_eq!(Rgb::WHITE.scale(2.0), Rgb::WHITE);
        assert_eq!(Rgb::new(100, 200, 50).scale(0.5), Rgb::new(50, 100, 25));
    }
}
