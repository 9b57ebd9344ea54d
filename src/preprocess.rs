use std::fs;
use std::path::Path;

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use serde::Deserialize;
use tracing::warn;

use crate::error::{ClassifierError, Result};

const CHANNELS: usize = 3;

/// Target size as written by the various image-processor config versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ImageSize {
    Exact { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

impl ImageSize {
    /// (height, width) of the model input.
    pub fn dims(&self) -> (u32, u32) {
        match *self {
            ImageSize::Exact { height, width } => (height, width),
            ImageSize::ShortestEdge { shortest_edge } => (shortest_edge, shortest_edge),
            ImageSize::Square(side) => (side, side),
        }
    }
}

/// Resampling filter, numbered the way PIL numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resample {
    Nearest,
    Lanczos,
    Bilinear,
    Bicubic,
    Box,
    Hamming,
}

impl Resample {
    pub fn from_pil(code: u8) -> Option<Self> {
        match code {
            0 => Some(Resample::Nearest),
            1 => Some(Resample::Lanczos),
            2 => Some(Resample::Bilinear),
            3 => Some(Resample::Bicubic),
            4 => Some(Resample::Box),
            5 => Some(Resample::Hamming),
            _ => None,
        }
    }

    fn resize_alg(self) -> ResizeAlg {
        match self {
            Resample::Nearest => ResizeAlg::Nearest,
            Resample::Lanczos => ResizeAlg::Convolution(FilterType::Lanczos3),
            Resample::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            Resample::Bicubic => ResizeAlg::Convolution(FilterType::CatmullRom),
            Resample::Box => ResizeAlg::Convolution(FilterType::Box),
            Resample::Hamming => ResizeAlg::Convolution(FilterType::Hamming),
        }
    }
}

/// Mirrors `preprocessor_config.json`; absent keys take the ViT image-processor defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub do_resize: bool,
    pub size: ImageSize,
    pub resample: u8,
    pub do_rescale: bool,
    pub rescale_factor: f32,
    pub do_normalize: bool,
    #[serde(rename = "image_mean")]
    pub mean: [f32; 3],
    #[serde(rename = "image_std")]
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: ImageSize::Exact { height: 224, width: 224 },
            resample: 2,
            do_rescale: true,
            rescale_factor: 1.0 / 255.0,
            do_normalize: true,
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

impl PreprocessConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ClassifierError::model_load(path, e))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ClassifierError::model_load(path, e))?;
        config
            .validate()
            .map_err(|reason| ClassifierError::model_load(path, reason))?;
        if let ImageSize::ShortestEdge { shortest_edge } = config.size {
            warn!(shortest_edge, "shortest_edge sizing, resizing to a square input");
        }
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let (height, width) = self.size.dims();
        if self.do_resize && (height == 0 || width == 0) {
            return Err(format!("invalid input size {height}x{width}"));
        }
        if Resample::from_pil(self.resample).is_none() {
            return Err(format!("unsupported resample filter {}", self.resample));
        }
        if self.do_normalize && self.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(format!("image_std must be finite and non-zero, got {:?}", self.std));
        }
        Ok(())
    }

    fn resample_filter(&self) -> Resample {
        Resample::from_pil(self.resample).unwrap_or(Resample::Bilinear)
    }
}

/// Turns decoded images into the `[1, 3, H, W]` tensor the model takes.
#[derive(Debug, Clone)]
pub struct Processor {
    pub config: PreprocessConfig,
}

impl Processor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// (height, width) every processed image ends up with, if fixed.
    pub fn input_size(&self) -> Option<(u32, u32)> {
        self.config.do_resize.then(|| self.config.size.dims())
    }

    /// Converts to RGB, resizes, rescales and normalizes into NCHW layout.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Array4<f32>> {
        let rgb = image.to_rgb8();
        let rgb = match self.input_size() {
            Some((height, width)) if (width, height) != rgb.dimensions() => {
                self.resize(rgb, width, height)?
            }
            _ => rgb,
        };

        let (width, height) = rgb.dimensions();
        let mut pixel_values =
            Array4::<f32>::zeros((1, CHANNELS, height as usize, width as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..CHANNELS {
                pixel_values[[0, c, y as usize, x as usize]] = self.normalize(c, pixel[c]);
            }
        }
        Ok(pixel_values)
    }

    fn resize(&self, rgb: RgbImage, width: u32, height: u32) -> Result<RgbImage> {
        let src = DynamicImage::ImageRgb8(rgb);
        let mut dst = Image::new(width, height, PixelType::U8x3);
        let options = ResizeOptions::new().resize_alg(self.config.resample_filter().resize_alg());
        Resizer::new()
            .resize(&src, &mut dst, Some(&options))
            .map_err(|e| ClassifierError::inference(format!("resize failed: {e}")))?;
        RgbImage::from_raw(width, height, dst.buffer().to_vec())
            .ok_or_else(|| ClassifierError::inference("resized buffer has the wrong length"))
    }

    #[inline]
    fn normalize(&self, channel: usize, value: u8) -> f32 {
        let mut v = value as f32;
        if self.config.do_rescale {
            v *= self.config.rescale_factor;
        }
        if self.config.do_normalize {
            v = (v - self.config.mean[channel]) / self.config.std[channel];
        }
        v
    }
}
