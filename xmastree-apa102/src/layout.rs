//! Physical geometry of the Pi Hut 3D Xmas tree.
//!
//! The ornament carries 25 APA102 pixels: a star on top and 24 body pixels
//! arranged as 3 levels of 8 branches. The strip order on the wire is
//! scrambled by the PCB routing; [`INDEX_MAP`] translates (level, branch)
//! coordinates to strip indices for geometry-aware animations.

/// Total pixels on the strip, star included.
pub const PIXEL_COUNT: usize = 25;

/// Strip index of the star pixel on top.
pub const STAR_INDEX: usize = 3;

/// Body levels, bottom to top.
pub const LEVELS: usize = 3;

/// Branches per level.
pub const BRANCHES: usize = 8;

/// Strip index by `[level][branch]`, level 0 at the bottom. Branch columns
/// are in circular order around the tree.
pub const INDEX_MAP: [[usize; BRANCHES]; LEVELS] = [
    [24, 19, 7, 0, 16, 15, 6, 12],
    [23, 20, 8, 1, 17, 14, 5, 11],
    [22, 21, 9, 2, 18, 13, 4, 10],
];

/// Strip indices of all body pixels, in map order.
pub fn body_indices() -> impl Iterator<Item = usize> {
    INDEX_MAP.iter().flatten().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_covers_every_body_pixel_once() {
        let mut seen = [false; PIXEL_COUNT];
        for index in body_indices() {
            assert!(index < PIXEL_COUNT);
            assert!(!seen[index], "index {index} mapped twice");
            seen[index] = true;
        }
        assert!(!seen[STAR_INDEX], "star must not appear in the body map");
        let body = seen.iter().filter(|s| **s).count();
        assert_eq!(body, PIXEL_COUNT - 1);
    }
}
