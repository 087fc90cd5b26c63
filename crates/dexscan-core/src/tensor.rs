//! Image → model input tensor.
//!
//! Pixels are read row-major (y outer, x inner) and each pixel contributes
//! R, G, B divided by 255.0, so a `w` x `h` image yields `3 * w * h` floats in
//! `[0.0, 1.0]`.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::error::{Result, ScanError};

pub const CHANNELS: usize = 3;

/// The two ways an image reaches the classifier.
#[derive(Debug, Clone, Copy)]
pub enum ImageInput<'a> {
    /// Encoded image bytes, as produced by the extractor.
    Encoded(&'a [u8]),
    /// An image that is already decoded.
    Decoded(&'a DynamicImage),
}

/// Flattened, normalised RGB values for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    values: Vec<f32>,
}

impl InputTensor {
    /// Build a tensor of `width` x `height` pixels from either input form.
    pub fn from_input(input: ImageInput<'_>, width: u32, height: u32) -> Result<Self> {
        match input {
            ImageInput::Encoded(bytes) => {
                let image = image::load_from_memory(bytes)?;
                Ok(Self::from_image(&image, width, height))
            }
            ImageInput::Decoded(image) => Ok(Self::from_image(image, width, height)),
        }
    }

    /// Resize `image` to `width` x `height` if needed and flatten it.
    pub fn from_image(image: &DynamicImage, width: u32, height: u32) -> Self {
        if image.width() == width && image.height() == height {
            return Self::from_rgb(&image.to_rgb8());
        }
        let resized = image.resize_exact(width, height, FilterType::Triangle);
        Self::from_rgb(&resized.to_rgb8())
    }

    pub fn from_rgb(image: &RgbImage) -> Self {
        let mut values = Vec::with_capacity(image.as_raw().len());
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            values.push(r as f32 / 255.0);
            values.push(g as f32 / 255.0);
            values.push(b as f32 / 255.0);
        }
        Self { values }
    }

    /// Wrap raw values, checking they describe a `width` x `height` image.
    pub fn from_values(values: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        let expected = tensor_len(width, height);
        if values.len() != expected {
            return Err(ScanError::TensorShape {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Number of floats in the tensor for a `width` x `height` image.
pub fn tensor_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}
