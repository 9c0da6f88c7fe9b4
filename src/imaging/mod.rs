//! Image processing on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` with content sniffing |
//! | **Resize** | Lanczos3 `resize_exact` |
//! | **Encode → JPEG** | `JpegEncoder` into memory, optionally under a byte budget |
//! | **Crop bounds** | luma scan of a `GrayImage` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: [`Quality`] and [`ByteBudget`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Encoder**: [`SizeConvergenceEncoder`], the budget search built on a backend

pub mod backend;
mod calculations;
pub mod encoder;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    CropBox, SHRINK_FACTOR, content_bounds, distort_dimensions, fit_within, longer_side,
    shrink_side,
};
pub use encoder::{ConvergedEncoding, EncodeError, MAX_SHRINK_ROUNDS, SizeConvergenceEncoder};
pub use params::{ByteBudget, Quality};
pub use rust_backend::{RustBackend, apply_orientation, to_jpeg_color};
