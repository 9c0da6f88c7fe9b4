//! Budget-targeted compression.

use super::{
    JobOutcome, TransformError, TransformJob, carried_metadata, copy_through, encoded,
    source_len, write_output,
};
use crate::config::DownSizeConfig;
use crate::imaging::{ByteBudget, ImageBackend, SizeConvergenceEncoder};
use tracing::debug;

/// Passthrough unless the source exceeds the budget, or it is not a JPEG
/// and `force_jpg` is set.
fn needs_encode(opts: &DownSizeConfig, budget: ByteBudget, len: u64, is_jpeg: bool) -> bool {
    budget.exceeded_by(len) || (!is_jpeg && opts.force_jpg)
}

pub(super) fn apply<B: ImageBackend>(
    backend: &B,
    opts: &DownSizeConfig,
    job: &TransformJob,
) -> Result<JobOutcome, TransformError> {
    let budget = ByteBudget::from_megabytes(opts.max_size_mb);
    let len = source_len(job)?;

    if !needs_encode(opts, budget, len, job.is_jpeg_source()) {
        return copy_through(job);
    }

    let img = backend.decode(&job.source_path)?;
    let exif = carried_metadata(job, &opts.tags);
    let encoding = SizeConvergenceEncoder::new(backend, opts.quality, budget)
        .with_exif(exif.as_deref())
        .converge(&img)?;
    debug!(
        path = %job.source_path.display(),
        rounds = encoding.rounds,
        start_side = encoding.start_side,
        "converged"
    );

    let output = job.jpeg_output();
    write_output(&output, &encoding.bytes)?;
    Ok(encoded(
        output,
        &encoding.bytes,
        encoding.width,
        encoding.height,
        Some(encoding.rounds),
    ))
}
