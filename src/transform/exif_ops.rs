//! Metadata-only transforms. The image data is never decoded.

use super::{JobOutcome, TransformError, TransformJob};
use crate::config::{SetExifConfig, StripExifConfig};
use crate::sanitizer::{self, SanitizeError, StripOutcome};
use std::io;

/// Sanitizer IO failures on the output path become `OutputExists`.
fn sanitize_error(output: &std::path::Path, err: SanitizeError) -> TransformError {
    match err {
        SanitizeError::Io(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            TransformError::OutputExists(output.to_path_buf())
        }
        other => TransformError::Sanitize(other),
    }
}

pub(super) fn strip(opts: &StripExifConfig, job: &TransformJob) -> Result<JobOutcome, TransformError> {
    let output = job.same_suffix_output();
    let removed = match sanitizer::strip_without_recompress(&job.source_path, &output, &opts.tags)
        .map_err(|e| sanitize_error(&output, e))?
    {
        StripOutcome::Verbatim => 0,
        StripOutcome::Rewritten { removed } => removed,
    };
    Ok(JobOutcome::Stripped { output, removed })
}

pub(super) fn set(opts: &SetExifConfig, job: &TransformJob) -> Result<JobOutcome, TransformError> {
    let output = job.same_suffix_output();
    let attempts = sanitizer::set(&job.source_path, &output, &opts.pairs(), opts.max_attempts)
        .map_err(|e| sanitize_error(&output, e))?;
    Ok(JobOutcome::Tagged { output, attempts })
}
