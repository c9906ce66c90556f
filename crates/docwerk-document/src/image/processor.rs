// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — the pixel side of PDF recompression. Wraps an in-memory
// `image::DynamicImage` and re-encodes it with `jpeg-encoder`, which exposes
// the progressive and optimized-Huffman switches the `image` crate lacks.

use docwerk_core::error::{DocwerkError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use jpeg_encoder::{ColorType, Encoder};
use tracing::{debug, instrument};

/// Knobs for one JPEG encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegOptions {
    /// 1..=100.
    pub quality: u8,
    pub progressive: bool,
    pub optimize_huffman: bool,
}

/// A JPEG produced by [`ImageProcessor::to_jpeg`].
#[derive(Debug, Clone)]
pub struct EncodedJpeg {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Single-channel output (`/DeviceGray`), otherwise `/DeviceRGB`.
    pub grayscale: bool,
}

/// Image pipeline operating on a single in-memory image.
///
/// Transformations consume `self` and return a new processor, so calls chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_dynamic(img)
///     .flatten_on_white()
///     .fit_within(1600)
///     .to_jpeg(JpegOptions { quality: 75, progressive: true, optimize_huffman: true })?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode an encoded image (JPEG, PNG, ...) from memory.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| DocwerkError::ImageError(format!("failed to decode image: {err}")))?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    /// Build from raw 8-bit samples: 1 channel gray, 3 channel RGB, or
    /// 4 channel CMYK (converted to RGB).
    pub fn from_samples(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() < expected {
            return Err(DocwerkError::ImageError(format!(
                "sample buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                samples.len()
            )));
        }
        let mut samples = samples;
        samples.truncate(expected);

        let image = match channels {
            1 => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
            4 => RgbImage::from_raw(width, height, cmyk_to_rgb(&samples))
                .map(DynamicImage::ImageRgb8),
            other => {
                return Err(DocwerkError::ImageError(format!(
                    "unsupported channel count {other}"
                )));
            }
        };
        image
            .map(Self::from_dynamic)
            .ok_or_else(|| DocwerkError::ImageError("sample buffer does not fit dimensions".into()))
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn is_grayscale(&self) -> bool {
        !self.image.color().has_color()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Attach a soft mask as the alpha channel. The mask must match the image
    /// dimensions.
    pub fn with_alpha(self, mask: &GrayImage) -> Result<Self> {
        if mask.dimensions() != (self.width(), self.height()) {
            return Err(DocwerkError::ImageError(format!(
                "mask is {}x{}, image is {}x{}",
                mask.width(),
                mask.height(),
                self.width(),
                self.height()
            )));
        }
        let mut rgba: RgbaImage = self.image.to_rgba8();
        for (pixel, alpha) in rgba.pixels_mut().zip(mask.pixels()) {
            pixel.0[3] = alpha.0[0];
        }
        Ok(Self {
            image: DynamicImage::ImageRgba8(rgba),
        })
    }

    /// Composite onto a white background, dropping the alpha channel.
    pub fn flatten_on_white(self) -> Self {
        if !self.has_alpha() {
            return self;
        }
        let rgba = self.image.to_rgba8();
        let flattened = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let blend = |c: u8| -> u8 {
                let alpha = a as u32;
                ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
            };
            image::Rgb([blend(r), blend(g), blend(b)])
        });
        Self {
            image: DynamicImage::ImageRgb8(flattened),
        }
    }

    /// Resize the image to fit within `max_width` x `max_height`, preserving
    /// aspect ratio. Uses Lanczos3 filtering for high-quality downscaling.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn resize(self, max_width: u32, max_height: u32) -> Self {
        let resized = self.image.resize(max_width, max_height, FilterType::Lanczos3);
        debug!(
            new_w = resized.width(),
            new_h = resized.height(),
            "Resize complete"
        );
        Self { image: resized }
    }

    /// Downsample so neither side exceeds `max_side`. Smaller images pass
    /// through untouched.
    pub fn fit_within(self, max_side: u32) -> Self {
        if self.width() <= max_side && self.height() <= max_side {
            return self;
        }
        self.resize(max_side, max_side)
    }

    // -- Output ---------------------------------------------------------------

    /// Encode as baseline or progressive JPEG. Any alpha channel is dropped;
    /// call [`flatten_on_white`](Self::flatten_on_white) first to keep the look.
    pub fn to_jpeg(&self, options: JpegOptions) -> Result<EncodedJpeg> {
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(DocwerkError::ImageError(format!(
                "{width}x{height} cannot be encoded as JPEG"
            )));
        }

        let grayscale = self.is_grayscale();
        let (samples, color) = if grayscale {
            (self.image.to_luma8().into_raw(), ColorType::Luma)
        } else {
            (self.image.to_rgb8().into_raw(), ColorType::Rgb)
        };

        let mut data = Vec::new();
        let mut encoder = Encoder::new(&mut data, options.quality.clamp(1, 100));
        encoder.set_progressive(options.progressive);
        encoder.set_optimized_huffman_tables(options.optimize_huffman);
        encoder
            .encode(&samples, width as u16, height as u16, color)
            .map_err(|err| DocwerkError::ImageError(format!("JPEG encoding failed: {err}")))?;

        Ok(EncodedJpeg {
            data,
            width,
            height,
            grayscale,
        })
    }
}

/// Naive CMYK to RGB, no colour management.
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u32;
            let channel = |c: u8| ((255 - c as u32) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    const OPTS: JpegOptions = JpegOptions {
        quality: 80,
        progressive: true,
        optimize_huffman: true,
    };

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        let processor = ImageProcessor::from_dynamic(gradient(3000, 1500)).fit_within(1000);
        assert_eq!(processor.width(), 1000);
        assert_eq!(processor.height(), 500);
    }

    #[test]
    fn fit_within_leaves_small_images() {
        let processor = ImageProcessor::from_dynamic(gradient(640, 480)).fit_within(1000);
        assert_eq!((processor.width(), processor.height()), (640, 480));
    }

    #[test]
    fn flatten_turns_transparent_white() {
        let rgba = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 0]));
        let flat = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(rgba)).flatten_on_white();
        assert!(!flat.has_alpha());
        let rgb = flat.into_dynamic().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn jpeg_output_decodes_back() {
        let jpeg = ImageProcessor::from_dynamic(gradient(64, 32))
            .to_jpeg(OPTS)
            .expect("encode");
        assert!(!jpeg.grayscale);
        let decoded = image::load_from_memory(&jpeg.data).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[test]
    fn gray_samples_stay_gray() {
        let processor =
            ImageProcessor::from_samples(4, 4, 1, vec![128; 16]).expect("samples");
        let jpeg = processor.to_jpeg(OPTS).expect("encode");
        assert!(jpeg.grayscale);
    }

    #[test]
    fn cmyk_samples_become_rgb() {
        // Pure cyan in CMYK.
        let processor =
            ImageProcessor::from_samples(1, 1, 4, vec![255, 0, 0, 0]).expect("samples");
        let rgb = processor.into_dynamic().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 255, 255]);
    }

    #[test]
    fn short_sample_buffer_is_rejected() {
        assert!(ImageProcessor::from_samples(10, 10, 3, vec![0; 12]).is_err());
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let mask = GrayImage::new(3, 3);
        let result = ImageProcessor::from_dynamic(gradient(4, 4)).with_alpha(&mask);
        assert!(result.is_err());
    }
}
