//! Parameter types for image encoding.
//!
//! - [`Quality`]: lossy JPEG quality (1–100, default 90). Clamped on construction.
//! - [`ByteBudget`]: maximum encoded size of an output file, built from megabytes.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Quality as the `u8` the JPEG encoder expects. Out-of-range raw values
    /// (possible through the public field) are clamped here as well.
    pub fn as_u8(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Maximum allowed encoded size, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteBudget(u64);

impl ByteBudget {
    pub fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// `megabytes * 1024 * 1024`, truncated. Negative or NaN input gives a zero budget.
    pub fn from_megabytes(megabytes: f64) -> Self {
        let bytes = megabytes * BYTES_PER_MEGABYTE;
        if bytes.is_finite() && bytes > 0.0 {
            Self(bytes as u64)
        } else {
            Self(0)
        }
    }

    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn fits(self, len: usize) -> bool {
        len as u64 <= self.0
    }

    pub fn exceeded_by(self, len: u64) -> bool {
        len > self.0
    }
}

impl std::fmt::Display for ByteBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} MB", self.0 as f64 / BYTES_PER_MEGABYTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn raw_quality_is_clamped_for_encoder() {
        assert_eq!(Quality(250).as_u8(), 100);
        assert_eq!(Quality(0).as_u8(), 1);
    }

    #[test]
    fn budget_from_megabytes() {
        assert_eq!(ByteBudget::from_megabytes(1.0).bytes(), 1_048_576);
        assert_eq!(ByteBudget::from_megabytes(1.5).bytes(), 1_572_864);
        assert_eq!(ByteBudget::from_megabytes(-2.0).bytes(), 0);
        assert_eq!(ByteBudget::from_megabytes(f64::NAN).bytes(), 0);
    }

    #[test]
    fn budget_fits_is_inclusive() {
        let budget = ByteBudget::from_bytes(100);
        assert!(budget.fits(100));
        assert!(!budget.fits(101));
        assert!(budget.exceeded_by(101));
        assert!(!budget.exceeded_by(100));
    }

    #[test]
    fn budget_display_in_megabytes() {
        assert_eq!(ByteBudget::from_megabytes(1.5).to_string(), "1.50 MB");
    }
}
