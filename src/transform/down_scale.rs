//! Dimension cap with a plain re-encode.

use super::{
    JobOutcome, TransformError, TransformJob, carried_metadata, copy_through, encoded,
    source_len, write_output,
};
use crate::config::DownScaleConfig;
use crate::exif::jpeg;
use crate::imaging::{ByteBudget, Dimensions, ImageBackend, fit_within, longer_side};

/// Longer-side cap for a source of `dims`. `0` keeps the source size.
fn target_side(opts: &DownScaleConfig, dims: (u32, u32)) -> u32 {
    match opts.max_dimension {
        0 => longer_side(dims),
        cap => cap,
    }
}

/// Files below `skip_under_mb` are copied instead of re-encoded.
fn skips(opts: &DownScaleConfig, len: u64) -> bool {
    opts.skip_under_mb > 0.0 && len < ByteBudget::from_megabytes(opts.skip_under_mb).bytes()
}

pub(super) fn apply<B: ImageBackend>(
    backend: &B,
    opts: &DownScaleConfig,
    job: &TransformJob,
) -> Result<JobOutcome, TransformError> {
    if skips(opts, source_len(job)?) {
        return copy_through(job);
    }

    let img = backend.decode(&job.source_path)?;
    let dims = Dimensions::of(&img).as_tuple();
    let side = target_side(opts, dims);
    let (width, height) = fit_within(dims, (side, side));

    let resized = backend.resize(&img, width, height);
    let mut bytes = backend.encode_jpeg(&resized, opts.quality)?;
    if let Some(exif) = carried_metadata(job, &opts.tags) {
        bytes = jpeg::embed_exif(&bytes, &exif)?;
    }

    let output = job.jpeg_output();
    write_output(&output, &bytes)?;
    Ok(encoded(output, &bytes, width, height, None))
}
