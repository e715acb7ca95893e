//! CPU-side pixel buffers.
//!
//! [`Image`] holds a flat RGBA8 buffer and handles decoding/encoding through
//! the `image` crate. It is the staging format for texture uploads and the
//! result format of GPU readbacks.

use std::path::Path;

use anyhow::{Context, Result, bail};
// `::image` disambiguates the codec crate from this module.
use ::image::{ExtendedColorType, ImageFormat, ImageReader, save_buffer_with_format};

use crate::color::Color;

/// A width × height RGBA8 pixel buffer.
///
/// The buffer length is always `4 * width * height`; an image that was never
/// created (or was created with a zero dimension) is the empty state with
/// size `(0, 0)` and no pixels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Image {
    size: (u32, u32),
    pixels: Vec<u8>,
}

impl Image {
    /// The empty zero-size image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a `width` × `height` image filled with `color`.
    ///
    /// A zero dimension resets the image to the empty state.
    pub fn create(&mut self, width: u32, height: u32, color: Color) {
        if width == 0 || height == 0 {
            *self = Self::default();
            return;
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            pixels.extend_from_slice(&[color.r, color.g, color.b, color.a]);
        }
        self.size = (width, height);
        self.pixels = pixels;
    }

    /// Build an image from raw RGBA8 bytes.
    ///
    /// Returns the empty image when a dimension is zero or `pixels` is too
    /// short for the requested size.
    pub fn from_pixels(width: u32, height: u32, pixels: &[u8]) -> Self {
        let len = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() < len {
            return Self::default();
        }
        Self {
            size: (width, height),
            pixels: pixels[..len].to_vec(),
        }
    }

    /// Decode an image file (PNG, JPEG, BMP, TGA, ...) into RGBA8.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = ImageReader::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?
            .decode()
            .with_context(|| format!("failed to decode image {}", path.display()))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self {
            size: (width, height),
            pixels: decoded.into_raw(),
        })
    }

    /// Encode to a file; the format is picked from the extension
    /// (png, jpg/jpeg, bmp or tga).
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.pixels.is_empty() {
            bail!("cannot save an empty image to {}", path.display());
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let format = match extension.as_str() {
            "png" => ImageFormat::Png,
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "bmp" => ImageFormat::Bmp,
            "tga" => ImageFormat::Tga,
            other => bail!("unsupported image extension \"{other}\""),
        };
        // The JPEG encoder has no alpha channel, so it gets RGB bytes.
        if format == ImageFormat::Jpeg {
            let rgb = self
                .pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect::<Vec<_>>();
            return save_buffer_with_format(
                path,
                &rgb,
                self.size.0,
                self.size.1,
                ExtendedColorType::Rgb8,
                format,
            )
            .with_context(|| format!("failed to save image {}", path.display()));
        }
        save_buffer_with_format(
            path,
            &self.pixels,
            self.size.0,
            self.size.1,
            ExtendedColorType::Rgba8,
            format,
        )
        .with_context(|| format!("failed to save image {}", path.display()))
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Read the pixel at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        assert!(x < self.size.0 && y < self.size.1, "pixel out of bounds");
        let i = ((x + y * self.size.0) * 4) as usize;
        Color::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        )
    }

    /// Write the pixel at `(x, y)`. Panics when out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        assert!(x < self.size.0 && y < self.size.1, "pixel out of bounds");
        let i = ((x + y * self.size.0) * 4) as usize;
        self.pixels[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    /// Set the alpha of every pixel matching `key` to `alpha`.
    pub fn mask_from_color(&mut self, key: Color, alpha: u8) {
        for px in self.pixels.chunks_exact_mut(4) {
            if px[0] == key.r && px[1] == key.g && px[2] == key.b && px[3] == key.a {
                px[3] = alpha;
            }
        }
    }

    /// Mirror every row in place.
    pub fn flip_horizontally(&mut self) {
        let width = self.size.0 as usize;
        for row in self.pixels.chunks_exact_mut(width * 4) {
            let mut left = 0;
            let mut right = width.saturating_sub(1);
            while left < right {
                for c in 0..4 {
                    row.swap(left * 4 + c, right * 4 + c);
                }
                left += 1;
                right -= 1;
            }
        }
    }

    /// Mirror the rows top to bottom in place.
    pub fn flip_vertically(&mut self) {
        let row_size = self.size.0 as usize * 4;
        if row_size == 0 {
            return;
        }
        let height = self.size.1 as usize;
        for y in 0..height / 2 {
            let top = y * row_size;
            let bottom = (height - 1 - y) * row_size;
            for i in 0..row_size {
                self.pixels.swap(top + i, bottom + i);
            }
        }
    }
}
