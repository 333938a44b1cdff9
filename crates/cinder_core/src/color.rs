//! Color types and utilities

use bytemuck::{Pod, Zeroable};

/// RGBA color with f32 components (0.0 to 1.0), not premultiplied
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create from u8 components (0-255)
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Create from hex value (0xRRGGBB), fully opaque
    pub fn from_hex(hex: u32) -> Self {
        Self::from_rgba8(
            ((hex >> 16) & 0xFF) as u8,
            ((hex >> 8) & 0xFF) as u8,
            (hex & 0xFF) as u8,
            255,
        )
    }

    /// Create from hex value with alpha (0xRRGGBBAA)
    pub fn from_hex_rgba(hex: u32) -> Self {
        let [r, g, b, a] = hex.to_be_bytes();
        Self::from_rgba8(r, g, b, a)
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        Self::rgba(values[0], values[1], values[2], values[3])
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self { a: alpha, ..self }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Convert to u8 array [r, g, b, a], rounding to the nearest step
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Linear interpolation between two colors
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        Color::rgba(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex(0xFF0000).to_rgba8(), [255, 0, 0, 255]);
        assert_eq!(Color::from_hex(0x0000FF).to_rgba8(), [0, 0, 255, 255]);
    }

    #[test]
    fn test_from_hex_rgba() {
        assert_eq!(Color::from_hex_rgba(0x00FF0080).to_rgba8(), [0, 255, 0, 128]);
        assert_eq!(Color::from_hex_rgba(0xFF000000).to_rgba8(), [255, 0, 0, 0]);
        assert_eq!(Color::from_hex_rgba(0x000000FF).to_rgba8(), [0, 0, 0, 255]);
    }

    #[test]
    fn test_to_rgba8_rounds() {
        let c = Color::rgba(0.5, 1.5, -0.2, 1.0);
        assert_eq!(c.to_rgba8(), [128, 255, 0, 255]);
    }

    #[test]
    fn test_lerp() {
        let mid = Color::BLACK.lerp(&Color::WHITE, 0.5);
        assert_eq!(mid, Color::rgb(0.5, 0.5, 0.5));
    }
}
