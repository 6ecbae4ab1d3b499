//! Color histogram extraction.
//!
//! Every pixel is reduced to its top `D` bits per channel and the three
//! quantized channels are packed into one bucket index:
//!
//! ```text
//! index = (r >> (B - D)) << 2D | (g >> (B - D)) << D | (b >> (B - D))
//! ```
//!
//! where `B` is the sample width of the decoded raster. The counts are then
//! divided by the pixel total so that the buckets form a probability
//! distribution.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use histoseek_core::histogram::{Histogram, QuantizationDepth};
//!
//! let depth = QuantizationDepth::default();
//! let histogram = Histogram::from_path(Path::new("query.jpg"), depth).unwrap();
//! assert_eq!(histogram.len(), 512);
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ExtractError};

/// Bits per channel kept when none is configured (512 buckets).
pub const DEFAULT_DEPTH: u8 = 3;

/// Upper bound on the depth: a quantized channel cannot keep more bits
/// than the narrowest sample width the extractor reads.
pub const MAX_DEPTH: u8 = 8;

/// Number of most-significant bits retained per color channel.
///
/// Only constructible through [`QuantizationDepth::new`], so every depth in
/// circulation is in `1..=MAX_DEPTH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QuantizationDepth(u8);

impl QuantizationDepth {
    pub fn new(bits: u8) -> Result<Self, ConfigError> {
        if (1..=MAX_DEPTH).contains(&bits) {
            Ok(Self(bits))
        } else {
            Err(ConfigError::InvalidDepth {
                got: bits,
                max: MAX_DEPTH,
            })
        }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Histogram length for this depth: `2^(3 * bits)`.
    pub const fn bucket_count(self) -> usize {
        1 << (3 * self.0 as usize)
    }

    fn bucket_index(self, rgb: [u32; 3], width: SampleWidth) -> usize {
        let depth = u32::from(self.0);
        let shift = width.bits() - depth;
        let mask = (1u32 << depth) - 1;
        let [r, g, b] = rgb.map(|c| (c >> shift) & mask);
        ((r << (2 * depth)) + (g << depth) + b) as usize
    }
}

impl Default for QuantizationDepth {
    fn default() -> Self {
        Self(DEFAULT_DEPTH)
    }
}

impl TryFrom<u8> for QuantizationDepth {
    type Error = ConfigError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<QuantizationDepth> for u8 {
    fn from(depth: QuantizationDepth) -> Self {
        depth.0
    }
}

impl std::fmt::Display for QuantizationDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bits/channel", self.0)
    }
}

/// Bit width of the channel samples handed to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// 8 bits per channel (JPEG, most PNGs)
    Eight,
    /// 16 bits per channel (16-bit PNG, float sources rescaled)
    Sixteen,
}

impl SampleWidth {
    pub const fn bits(self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }
}

/// Normalized color histogram of one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    name: String,
    depth: QuantizationDepth,
    buckets: Vec<f64>,
}

impl Histogram {
    /// Open, decode and histogram an image file.
    ///
    /// The format is sniffed from the file contents, so a mislabelled
    /// extension still decodes. The histogram is named after the base file
    /// name of `path`.
    pub fn from_path(path: &Path, depth: QuantizationDepth) -> Result<Self, ExtractError> {
        let file = File::open(path).map_err(ExtractError::Open)?;
        let image = ImageReader::new(BufReader::new(file))
            .with_guessed_format()
            .map_err(ExtractError::Open)?
            .decode()?;

        Self::from_image(base_name(path), &image, depth)
    }

    /// Histogram an already decoded image.
    ///
    /// 16-bit and floating point sources are sampled at 16 bits, everything
    /// else at 8 bits. Alpha is ignored.
    pub fn from_image(
        name: impl Into<String>,
        image: &DynamicImage,
        depth: QuantizationDepth,
    ) -> Result<Self, ExtractError> {
        match image {
            DynamicImage::ImageRgb8(rgb) => Self::from_rgb_samples(
                name,
                rgb.pixels().map(|p| p.0.map(u32::from)),
                SampleWidth::Eight,
                depth,
            ),
            DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb32F(_)
            | DynamicImage::ImageRgba32F(_) => {
                let rgb = image.to_rgb16();
                Self::from_rgb_samples(
                    name,
                    rgb.pixels().map(|p| p.0.map(u32::from)),
                    SampleWidth::Sixteen,
                    depth,
                )
            }
            _ => {
                let rgb = image.to_rgb8();
                Self::from_rgb_samples(
                    name,
                    rgb.pixels().map(|p| p.0.map(u32::from)),
                    SampleWidth::Eight,
                    depth,
                )
            }
        }
    }

    /// Build a histogram from raw RGB samples of the given width.
    ///
    /// Returns [`ExtractError::EmptyImage`] when `samples` yields nothing.
    pub fn from_rgb_samples<I>(
        name: impl Into<String>,
        samples: I,
        width: SampleWidth,
        depth: QuantizationDepth,
    ) -> Result<Self, ExtractError>
    where
        I: IntoIterator<Item = [u32; 3]>,
    {
        let mut counts = vec![0u64; depth.bucket_count()];
        let mut total: u64 = 0;

        for rgb in samples {
            counts[depth.bucket_index(rgb, width)] += 1;
            total += 1;
        }

        if total == 0 {
            return Err(ExtractError::EmptyImage);
        }

        let total = total as f64;
        let buckets = counts.into_iter().map(|c| c as f64 / total).collect();

        Ok(Self {
            name: name.into(),
            depth,
            buckets,
        })
    }

    /// Base file name of the source image.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> QuantizationDepth {
        self.depth
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of all buckets; 1.0 up to rounding.
    pub fn total_mass(&self) -> f64 {
        self.buckets.iter().sum()
    }
}

/// File name component of `path`, falling back to the whole path.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    fn depth(bits: u8) -> QuantizationDepth {
        QuantizationDepth::new(bits).unwrap()
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) % 256) as u8,
            ])
        })
    }

    #[test]
    fn test_depth_default_is_three_bits() {
        let d = QuantizationDepth::default();
        assert_eq!(d.bits(), 3);
        assert_eq!(d.bucket_count(), 512);
    }

    #[test]
    fn test_depth_bounds() {
        assert!(QuantizationDepth::new(1).is_ok());
        assert!(QuantizationDepth::new(8).is_ok());
        assert_eq!(
            QuantizationDepth::new(0),
            Err(ConfigError::InvalidDepth { got: 0, max: 8 })
        );
        assert!(QuantizationDepth::new(9).is_err());
    }

    #[test]
    fn test_bucket_index_packs_channels() {
        let d = depth(3);
        // 0b111_00000 -> 7, 0b010_00000 -> 2, 0b001_11111 -> 1
        let idx = d.bucket_index([0xE0, 0x40, 0x3F], SampleWidth::Eight);
        assert_eq!(idx, (7 << 6) + (2 << 3) + 1);

        // Same triple at 16 bits per channel lands in the same bucket
        let idx16 = d.bucket_index([0xE000, 0x4000, 0x3FFF], SampleWidth::Sixteen);
        assert_eq!(idx16, idx);
    }

    #[test]
    fn test_single_color_fills_one_bucket() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 4, Rgb([255, 0, 0])));
        let h = Histogram::from_image("red.jpg", &img, depth(3)).unwrap();

        assert_eq!(h.name(), "red.jpg");
        assert_eq!(h.len(), 512);
        assert_eq!(h.buckets()[7 << 6], 1.0);
        assert_eq!(h.buckets().iter().filter(|&&b| b > 0.0).count(), 1);
    }

    #[test]
    fn test_buckets_sum_to_one_for_every_depth() {
        let img = DynamicImage::ImageRgb8(gradient(37, 23));
        for bits in 1..=MAX_DEPTH {
            let h = Histogram::from_image("g.png", &img, depth(bits)).unwrap();
            assert_eq!(h.len(), 1 << (3 * bits as usize));
            assert!(
                (h.total_mass() - 1.0).abs() < 1e-9,
                "depth {} mass {}",
                bits,
                h.total_mass()
            );
            assert!(h.buckets().iter().all(|&b| b >= 0.0));
        }
    }

    #[test]
    fn test_sixteen_bit_source_matches_eight_bit() {
        let rgb8 = gradient(16, 16);
        let img8 = DynamicImage::ImageRgb8(rgb8.clone());
        let img16 = DynamicImage::ImageRgb8(rgb8).to_rgb16();
        let img16 = DynamicImage::ImageRgb16(img16);

        let h8 = Histogram::from_image("a", &img8, depth(3)).unwrap();
        let h16 = Histogram::from_image("a", &img16, depth(3)).unwrap();
        assert_eq!(h8.buckets(), h16.buckets());
    }

    #[test]
    fn test_alpha_is_ignored() {
        let rgba = ImageBuffer::from_fn(8, 8, |x, _| image::Rgba([200, 10, 90, (x * 30) as u8]));
        let rgb = ImageBuffer::from_pixel(8, 8, Rgb([200, 10, 90]));

        let a = Histogram::from_image("a", &DynamicImage::ImageRgba8(rgba), depth(3)).unwrap();
        let b = Histogram::from_image("b", &DynamicImage::ImageRgb8(rgb), depth(3)).unwrap();
        assert_eq!(a.buckets(), b.buckets());
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let err = Histogram::from_image("empty.png", &img, depth(3)).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyImage));

        let err = Histogram::from_rgb_samples(
            "none",
            std::iter::empty::<[u32; 3]>(),
            SampleWidth::Eight,
            depth(3),
        );
        assert!(matches!(err, Err(ExtractError::EmptyImage)));
    }

    #[test]
    fn test_from_path_names_after_base_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sunset.png");
        gradient(10, 10).save(&path).unwrap();

        let h = Histogram::from_path(&path, depth(3)).unwrap();
        assert_eq!(h.name(), "sunset.png");
        assert!((h.total_mass() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Histogram::from_path(Path::new("/definitely/not/here.jpg"), depth(3));
        assert!(matches!(err, Err(ExtractError::Open(_))));
    }

    #[test]
    fn test_from_path_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"this is not an image").unwrap();

        let err = Histogram::from_path(&path, depth(3));
        assert!(matches!(err, Err(ExtractError::Decode(_))));
    }

    #[test]
    fn test_depth_serde_rejects_out_of_range() {
        let d: QuantizationDepth = serde_json::from_str("4").unwrap();
        assert_eq!(d.bits(), 4);
        assert!(serde_json::from_str::<QuantizationDepth>("0").is_err());
    }
}
