//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three pixel operations every
//! transform is built from: decode, resize and JPEG encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) on top of the `image`
//! crate. Tests use the recording `MockBackend` in [`tests`] so encoder
//! convergence can be exercised with predictable encoded sizes.

use super::params::Quality;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("JPEG encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn of(img: &DynamicImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
        }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: one backend value is shared by every
/// worker of the pool.
pub trait ImageBackend: Sync {
    /// Decode an image file into pixels.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Resize to exactly `width` x `height` with a high-quality filter.
    fn resize(&self, img: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Encode as baseline JPEG into memory.
    fn encode_jpeg(&self, img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError>;
}
