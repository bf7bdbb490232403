// src/color.rs

//! Defines the `Rgb` color type used throughout the pixel pipeline.
//!
//! The pipeline only ever carries concrete colors: drivers receive exactly
//! the bytes that will reach the panel, and out-of-range reads resolve to
//! black rather than to a sentinel that needs later resolution.

use serde::{Deserialize, Serialize};

/// A 24-bit RGB color, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(205, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 205, 0);
    pub const YELLOW: Rgb = Rgb::new(205, 205, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 238);
    pub const CYAN: Rgb = Rgb::new(0, 205, 205);
    pub const GREY: Rgb = Rgb::new(127, 127, 127);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Returns this color scaled by `level / 255`, channel-wise.
    /// Used for dimmed panel backgrounds and hints.
    pub fn dimmed(&self, level: u8) -> Rgb {
        let scale = |c: u8| ((c as u16 * level as u16) / 255) as u8;
        Rgb::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Rgb::new(r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimmed_scales_channels() {
        assert_eq!(Rgb::WHITE.dimmed(255), Rgb::WHITE);
        assert_eq!(Rgb::WHITE.dimmed(0), Rgb::BLACK);
        assert_eq!(Rgb::new(200, 100, 50).dimmed(127), Rgb::new(99, 49, 24));
    }
}
