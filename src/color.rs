//! RGBA color values with saturating arithmetic and a named palette.
//!
//! [`Color`] is the CPU-side color type used for clear colors, image pixels
//! and lighting parameters. It converts to and from a packed `u32`
//! (`0xRRGGBBAA`) and a hex string of the same layout, and into the
//! normalized float forms the GPU side expects.

use std::num::ParseIntError;
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};
use std::str::FromStr;

/// An 8-bit-per-channel RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from the three color channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Opaque gray of the given lightness.
    pub const fn gray(lightness: u8) -> Self {
        Self::rgb(lightness, lightness, lightness)
    }

    /// Unpack from `0xRRGGBBAA`.
    pub const fn from_u32(color: u32) -> Self {
        Self::new(
            ((color & 0xff00_0000) >> 24) as u8,
            ((color & 0x00ff_0000) >> 16) as u8,
            ((color & 0x0000_ff00) >> 8) as u8,
            (color & 0x0000_00ff) as u8,
        )
    }

    /// Pack as `0xRRGGBBAA`.
    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | self.a as u32
    }

    /// Lowercase hex form of [`to_u32`](Self::to_u32), without padding.
    pub fn to_hex(self) -> String {
        format!("{:x}", self.to_u32())
    }

    /// Build from normalized `[r, g, b, a]` floats in `[0, 1]`.
    pub fn from_normalized(c: [f32; 4]) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
        Self::new(q(c[0]), q(c[1]), q(c[2]), q(c[3]))
    }

    /// Build an opaque color from normalized `[r, g, b]` floats.
    pub fn from_normalized_rgb(c: [f32; 3]) -> Self {
        Self::from_normalized([c[0], c[1], c[2], 1.0])
    }

    /// Normalized `[r, g, b, a]` floats in `[0, 1]`.
    pub fn to_normalized(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    pub const fn is_opaque(self) -> bool {
        self.a == 255
    }

    // Basic colors
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);
    pub const CYAN: Color = Color::rgb(0, 255, 255);
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    // Standard
    pub const BROWN: Color = Color::rgb(128, 80, 32);
    pub const ORANGE: Color = Color::rgb(255, 128, 0);
    pub const PINK: Color = Color::rgb(255, 128, 192);
    pub const BABY_PINK: Color = Color::rgb(255, 192, 224);
    pub const HOT_PINK: Color = Color::rgb(255, 0, 192);
    pub const SALMON: Color = Color::rgb(255, 128, 128);
    pub const VIOLET: Color = Color::rgb(128, 0, 255);
    pub const PURPLE: Color = Color::rgb(64, 0, 128);
    pub const PEACH: Color = Color::rgb(255, 128, 96);
    pub const LIME: Color = Color::rgb(128, 255, 0);
    pub const MINT: Color = Color::rgb(64, 255, 192);
    pub const GRAY: Color = Color::rgb(128, 128, 128);

    // Lights
    pub const LIGHT_BLACK: Color = Color::rgb(64, 64, 64);
    pub const LIGHT_BLUE: Color = Color::rgb(128, 128, 255);
    pub const LIGHT_RED: Color = Color::rgb(255, 128, 128);
    pub const LIGHT_MAGENTA: Color = Color::rgb(255, 128, 255);
    pub const LIGHT_GREEN: Color = Color::rgb(128, 255, 128);
    pub const LIGHT_CYAN: Color = Color::rgb(128, 255, 255);
    pub const LIGHT_YELLOW: Color = Color::rgb(255, 255, 128);
    pub const LIGHT_BROWN: Color = Color::rgb(192, 128, 64);
    pub const LIGHT_ORANGE: Color = Color::rgb(255, 160, 64);
    pub const LIGHT_PINK: Color = Color::rgb(255, 160, 224);
    pub const LIGHT_BABY_PINK: Color = Color::rgb(255, 208, 232);
    pub const LIGHT_HOT_PINK: Color = Color::rgb(255, 96, 224);
    pub const LIGHT_SALMON: Color = Color::rgb(255, 160, 160);
    pub const LIGHT_VIOLET: Color = Color::rgb(160, 96, 255);
    pub const LIGHT_PURPLE: Color = Color::rgb(128, 64, 192);
    pub const LIGHT_PEACH: Color = Color::rgb(255, 160, 128);
    pub const LIGHT_LIME: Color = Color::rgb(192, 255, 128);
    pub const LIGHT_MINT: Color = Color::rgb(128, 255, 224);
    pub const LIGHT_GRAY: Color = Color::rgb(192, 192, 192);

    // Darks
    pub const DARK_BLUE: Color = Color::rgb(0, 0, 128);
    pub const DARK_RED: Color = Color::rgb(128, 0, 0);
    pub const DARK_MAGENTA: Color = Color::rgb(128, 0, 128);
    pub const DARK_GREEN: Color = Color::rgb(0, 128, 0);
    pub const DARK_CYAN: Color = Color::rgb(0, 128, 128);
    pub const DARK_YELLOW: Color = Color::rgb(128, 128, 0);
    pub const DARK_WHITE: Color = Color::rgb(128, 128, 128);
    pub const DARK_BROWN: Color = Color::rgb(64, 32, 0);
    pub const DARK_ORANGE: Color = Color::rgb(128, 64, 0);
    pub const DARK_PINK: Color = Color::rgb(128, 64, 96);
    pub const DARK_BABY_PINK: Color = Color::rgb(160, 96, 128);
    pub const DARK_HOT_PINK: Color = Color::rgb(128, 0, 96);
    pub const DARK_SALMON: Color = Color::rgb(128, 64, 64);
    pub const DARK_VIOLET: Color = Color::rgb(64, 0, 128);
    pub const DARK_PURPLE: Color = Color::rgb(32, 0, 64);
    pub const DARK_PEACH: Color = Color::rgb(128, 64, 48);
    pub const DARK_LIME: Color = Color::rgb(64, 128, 0);
    pub const DARK_MINT: Color = Color::rgb(32, 128, 96);
    pub const DARK_GRAY: Color = Color::rgb(64, 64, 64);
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(0, 0, 0)
    }
}

impl FromStr for Color {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u32::from_str_radix(s, 16).map(Self::from_u32)
    }
}

impl Add for Color {
    type Output = Color;

    fn add(self, rhs: Color) -> Color {
        Color::new(
            self.r.saturating_add(rhs.r),
            self.g.saturating_add(rhs.g),
            self.b.saturating_add(rhs.b),
            self.a.saturating_add(rhs.a),
        )
    }
}

impl Sub for Color {
    type Output = Color;

    fn sub(self, rhs: Color) -> Color {
        Color::new(
            self.r.saturating_sub(rhs.r),
            self.g.saturating_sub(rhs.g),
            self.b.saturating_sub(rhs.b),
            self.a.saturating_sub(rhs.a),
        )
    }
}

impl Mul for Color {
    type Output = Color;

    /// Channel-wise modulation: `c1 * c2 / 255`.
    fn mul(self, rhs: Color) -> Color {
        let m = |a: u8, b: u8| (a as u16 * b as u16 / 255) as u8;
        Color::new(
            m(self.r, rhs.r),
            m(self.g, rhs.g),
            m(self.b, rhs.b),
            m(self.a, rhs.a),
        )
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, rhs: Color) {
        *self = *self + rhs;
    }
}

impl SubAssign for Color {
    fn sub_assign(&mut self, rhs: Color) {
        *self = *self - rhs;
    }
}

impl MulAssign for Color {
    fn mul_assign(&mut self, rhs: Color) {
        *self = *self * rhs;
    }
}

impl From<Color> for wgpu::Color {
    fn from(c: Color) -> wgpu::Color {
        wgpu::Color {
            r: c.r as f64 / 255.0,
            g: c.g as f64 / 255.0,
            b: c.b as f64 / 255.0,
            a: c.a as f64 / 255.0,
        }
    }
}
