//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or encoding.

use image::GrayImage;

/// Per-round shrink factor applied to the longer side during size convergence.
pub const SHRINK_FACTOR: f64 = 0.9;

/// Calculate the dimensions of `source` fitted inside a `bounds` box.
///
/// Aspect ratio is preserved and the image is never enlarged: a source that
/// already fits is returned unchanged. Neither side drops below 1px.
///
/// # Examples
/// ```
/// # use imgmirror::imaging::fit_within;
/// assert_eq!(fit_within((2000, 1000), (1000, 1000)), (1000, 500));
/// assert_eq!(fit_within((300, 200), (1000, 1000)), (300, 200));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w <= max_w && src_h <= max_h {
        return source;
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}

/// The longer of width and height.
pub fn longer_side(dims: (u32, u32)) -> u32 {
    dims.0.max(dims.1)
}

/// Target longer side for a shrink round: `floor(start * 0.9^round)`.
///
/// Returns 0 once the geometric series has fallen below one pixel.
pub fn shrink_side(start: u32, round: u32) -> u32 {
    let exponent = i32::try_from(round).unwrap_or(i32::MAX);
    (start as f64 * SHRINK_FACTOR.powi(exponent)).floor() as u32
}

/// Calculate output dimensions that distort `source` to a
/// `width_ratio:height_ratio` aspect without upsampling.
///
/// The width is kept and the height derived from the ratio. When that height
/// would exceed the source height, the height is kept and the width derived
/// instead, so neither output side is larger than its input side.
///
/// A 100x100 source with ratio 2:1 becomes 100x50.
pub fn distort_dimensions(source: (u32, u32), width_ratio: f64, height_ratio: f64) -> (u32, u32) {
    let (src_w, src_h) = source;

    let derived_h = (src_w as f64 / width_ratio * height_ratio).floor();
    if derived_h <= src_h as f64 {
        return (src_w, (derived_h as u32).max(1));
    }

    let derived_w = (src_h as f64 / height_ratio * width_ratio).floor();
    ((derived_w as u32).clamp(1, src_w), src_h)
}

/// Axis-aligned crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Bounding box of every pixel whose luma is above `threshold`.
///
/// Returns `None` when no pixel qualifies (a fully black frame).
pub fn content_bounds(luma: &GrayImage, threshold: u8) -> Option<CropBox> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in luma.enumerate_pixels() {
        if pixel.0[0] > threshold {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| CropBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}
