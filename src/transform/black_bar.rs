//! Crop away black borders.

use super::{JobOutcome, TransformError, TransformJob, encoded, write_output};
use crate::config::BlackBarConfig;
use crate::exif::read_source_exif;
use crate::imaging::{ImageBackend, apply_orientation, content_bounds};
use image::DynamicImage;
use tracing::{debug, warn};

/// EXIF orientation of the source, or 1 when absent or unreadable.
fn source_orientation(job: &TransformJob) -> u16 {
    let Ok(bytes) = std::fs::read(&job.source_path) else {
        return 1;
    };
    match read_source_exif(&bytes) {
        Ok(container) => container.and_then(|c| c.orientation()).unwrap_or(1),
        Err(e) => {
            warn!(path = %job.source_path.display(), error = %e, "ignoring unreadable orientation");
            1
        }
    }
}

/// Crop `img` to the bounding box of pixels brighter than `threshold`.
/// An image with no such pixel is returned whole.
fn crop_to_content(img: DynamicImage, threshold: u8) -> DynamicImage {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    match content_bounds(&rgb.to_luma8(), threshold) {
        Some(b) => rgb.crop_imm(b.x, b.y, b.width, b.height),
        None => rgb,
    }
}

pub(super) fn apply<B: ImageBackend>(
    backend: &B,
    opts: &BlackBarConfig,
    job: &TransformJob,
) -> Result<JobOutcome, TransformError> {
    let decoded = backend.decode(&job.source_path)?;
    let upright = apply_orientation(decoded, source_orientation(job));
    let cropped = crop_to_content(upright, opts.threshold);
    debug!(
        path = %job.source_path.display(),
        width = cropped.width(),
        height = cropped.height(),
        "cropped"
    );

    let bytes = backend.encode_jpeg(&cropped, opts.quality)?;
    let output = job.jpeg_output();
    write_output(&output, &bytes)?;
    Ok(encoded(output, &bytes, cropped.width(), cropped.height(), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::imaging::{Quality, RustBackend};
    use crate::test_helpers::*;
    use crate::transform::TransformKind;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn job_for(src: &Path, out: &Path) -> TransformJob {
        TransformJob::new(
            src.to_path_buf(),
            out.to_path_buf(),
            TransformKind::RemoveBlackBar,
        )
    }

    fn opts() -> BlackBarConfig {
        BlackBarConfig {
            quality: Quality::new(90),
            threshold: 0,
        }
    }

    /// A `w`x`h` black frame with a white rectangle at `(x, y, cw, ch)`.
    fn letterboxed(w: u32, h: u32, content: (u32, u32, u32, u32)) -> DynamicImage {
        let (cx, cy, cw, ch) = content;
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            if x >= cx && x < cx + cw && y >= cy && y < cy + ch {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn crops_letterbox() {
        let img = letterboxed(100, 80, (0, 10, 100, 60));
        assert_eq!(crop_to_content(img, 0).dimensions(), (100, 60));
    }

    #[test]
    fn crops_pillarbox_and_letterbox() {
        let img = letterboxed(100, 80, (20, 5, 50, 30));
        assert_eq!(crop_to_content(img, 0).dimensions(), (50, 30));
    }

    #[test]
    fn all_black_is_kept_whole() {
        let img = DynamicImage::new_rgb8(40, 30);
        assert_eq!(crop_to_content(img, 0).dimensions(), (40, 30));
    }

    #[test]
    fn threshold_treats_dark_grey_as_bar() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(50, 50, |x, _| {
            if x < 10 { Rgb([12, 12, 12]) } else { Rgb([200, 200, 200]) }
        }));
        assert_eq!(crop_to_content(img.clone(), 0).dimensions(), (50, 50));
        assert_eq!(crop_to_content(img, 20).dimensions(), (40, 50));
    }

    #[test]
    fn alpha_images_are_flattened_to_rgb() {
        let img = DynamicImage::new_rgba8(10, 10);
        assert!(matches!(crop_to_content(img, 0), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn encodes_cropped_frame_with_mock() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("film.png");
        fs::write(&src, b"x").unwrap();
        let backend = MockBackend::with_images(vec![letterboxed(160, 90, (0, 15, 160, 60))]);

        let outcome = apply(&backend, &opts(), &job_for(&src, tmp.path())).unwrap();

        assert_eq!(backend.encoded_sizes(), vec![(160, 60)]);
        assert_eq!(outcome.output(), tmp.path().join("film.jpg"));
    }

    #[test]
    fn orientation_is_applied_before_cropping() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("rotated.jpg");
        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();
        write_jpeg_with_exif(&src, 60, 40, &[("Orientation", "6")]);

        let outcome = apply(&RustBackend::new(), &opts(), &job_for(&src, &out)).unwrap();

        match outcome {
            JobOutcome::Encoded { width, height, .. } => assert_eq!((width, height), (40, 60)),
            other => panic!("expected Encoded, got {other:?}"),
        }
        // Orientation is baked into the pixels, so no EXIF is carried.
        let bytes = fs::read(out.join("rotated.jpg")).unwrap();
        assert_eq!(crate::exif::jpeg::find_exif(&bytes).unwrap(), None);
    }
}
