//! Non-uniform resize to a fixed aspect ratio.

use super::{JobOutcome, TransformError, TransformJob, encoded, write_output};
use crate::config::DistortConfig;
use crate::imaging::{Dimensions, ImageBackend, distort_dimensions};

pub(super) fn apply<B: ImageBackend>(
    backend: &B,
    opts: &DistortConfig,
    job: &TransformJob,
) -> Result<JobOutcome, TransformError> {
    let img = backend.decode(&job.source_path)?;
    let (width, height) = distort_dimensions(
        Dimensions::of(&img).as_tuple(),
        opts.width_aspect_ratio,
        opts.height_aspect_ratio,
    );

    let distorted = backend.resize(&img, width, height);
    let bytes = backend.encode_jpeg(&distorted, opts.quality)?;

    let output = job.jpeg_output();
    write_output(&output, &bytes)?;
    Ok(encoded(output, &bytes, width, height, None))
}
