//! Budget-targeted JPEG encoding.
//!
//! [`SizeConvergenceEncoder`] finds the largest fitted size whose JPEG
//! encoding stays within a [`ByteBudget`]:
//!
//! 1. Probe at half the longer side `L`. If even the probe is over budget,
//!    shrinking starts from `L/2`, otherwise from `L`.
//! 2. Round `n` fits the image inside `floor(start * 0.9^n)` on both axes,
//!    encodes at the fixed quality and measures. The first candidate within
//!    budget is accepted.
//!
//! Quality never changes between rounds. When an EXIF container is supplied
//! it is embedded into every candidate before measuring, so the accepted
//! bytes are exactly what lands on disk.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{fit_within, longer_side, shrink_side};
use super::params::{ByteBudget, Quality};
use crate::exif::{ExifError, jpeg};
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

/// Upper bound on shrink rounds for a single image.
pub const MAX_SHRINK_ROUNDS: u32 = 200;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Failed to embed EXIF: {0}")]
    Exif(#[from] ExifError),
    #[error(
        "no encoding fits within {budget} after {rounds} rounds (smallest was {smallest} bytes)"
    )]
    BudgetUnreachable {
        budget: ByteBudget,
        rounds: u32,
        smallest: u64,
    },
}

/// An accepted candidate.
#[derive(Debug, Clone)]
pub struct ConvergedEncoding {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Shrink rounds run before acceptance (the probe is not counted).
    pub rounds: u32,
    /// Longer side the geometric series started from.
    pub start_side: u32,
}

pub struct SizeConvergenceEncoder<'a, B: ImageBackend> {
    backend: &'a B,
    quality: Quality,
    budget: ByteBudget,
    exif: Option<&'a [u8]>,
}

impl<'a, B: ImageBackend> SizeConvergenceEncoder<'a, B> {
    pub fn new(backend: &'a B, quality: Quality, budget: ByteBudget) -> Self {
        Self {
            backend,
            quality,
            budget,
            exif: None,
        }
    }

    /// Embed this TIFF-structured EXIF container in every candidate.
    pub fn with_exif(mut self, tiff: Option<&'a [u8]>) -> Self {
        self.exif = tiff;
        self
    }

    fn encode_fitted(
        &self,
        img: &DynamicImage,
        side: u32,
    ) -> Result<(Vec<u8>, (u32, u32)), EncodeError> {
        let (width, height) = fit_within(Dimensions::of(img).as_tuple(), (side, side));
        let resized = self.backend.resize(img, width, height);
        let mut bytes = self.backend.encode_jpeg(&resized, self.quality)?;
        if let Some(tiff) = self.exif {
            bytes = jpeg::embed_exif(&bytes, tiff)?;
        }
        Ok((bytes, (width, height)))
    }

    pub fn converge(&self, img: &DynamicImage) -> Result<ConvergedEncoding, EncodeError> {
        let longer = longer_side(Dimensions::of(img).as_tuple());
        let half = longer / 2;

        let mut start_side = longer;
        if half > 0 {
            let (probe, (w, h)) = self.encode_fitted(img, half)?;
            debug!(width = w, height = h, size = probe.len(), "probe encode");
            if !self.budget.fits(probe.len()) {
                start_side = half;
            }
        }

        let mut smallest = u64::MAX;
        let mut rounds = 0;
        for round in 1..=MAX_SHRINK_ROUNDS {
            let side = shrink_side(start_side, round);
            if side == 0 {
                break;
            }
            rounds = round;

            let (bytes, (width, height)) = self.encode_fitted(img, side)?;
            debug!(round, side, size = bytes.len(), budget = %self.budget, "shrink round");
            if self.budget.fits(bytes.len()) {
                return Ok(ConvergedEncoding {
                    bytes,
                    width,
                    height,
                    rounds: round,
                    start_side,
                });
            }
            smallest = smallest.min(bytes.len() as u64);
        }

        Err(EncodeError::BudgetUnreachable {
            budget: self.budget,
            rounds,
            smallest,
        })
    }
}
