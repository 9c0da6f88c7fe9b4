//! Per-file transforms and the name registry.
//!
//! A run uses exactly one [`Transform`], built once from the merged
//! configuration and shared read-only by every worker. Names are resolved to
//! a [`TransformKind`] only at the edges (the `apply` subcommand and the
//! scan plan); inside the pipeline everything is a closed enum.
//!
//! | Kind | Output | Re-encodes |
//! |---|---|---|
//! | `down_size` | `stem.jpg`, or a passthrough copy | when over budget or forced |
//! | `down_scale` | `stem.jpg`, or a copy when under `skip_under_mb` | yes |
//! | `distort` | `stem.jpg` | yes |
//! | `remove_black_bar` | `stem.jpg` | yes |
//! | `strip_exif` | same suffix | no |
//! | `set_exif` | same suffix | no |

mod black_bar;
mod distort;
mod down_scale;
mod down_size;
mod exif_ops;

use crate::config::{
    BlackBarConfig, DistortConfig, DownScaleConfig, DownSizeConfig, MirrorConfig,
    SetExifConfig, StripExifConfig,
};
use crate::exif::ExifError;
use crate::fsutil::{copy_new, write_new};
use crate::imaging::{BackendError, EncodeError, ImageBackend};
use crate::sanitizer::{self, SanitizeError};
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    DownSize,
    DownScale,
    Distort,
    RemoveBlackBar,
    StripExif,
    SetExif,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown transform '{name}' (expected one of: {})", TransformKind::names().join(", "))]
pub struct UnknownTransform {
    pub name: String,
}

impl TransformKind {
    pub const ALL: [TransformKind; 6] = [
        Self::DownSize,
        Self::DownScale,
        Self::Distort,
        Self::RemoveBlackBar,
        Self::StripExif,
        Self::SetExif,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DownSize => "down_size",
            Self::DownScale => "down_scale",
            Self::Distort => "distort",
            Self::RemoveBlackBar => "remove_black_bar",
            Self::StripExif => "strip_exif",
            Self::SetExif => "set_exif",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.name()).collect()
    }

    /// Resolve a transform name. Case-insensitive; `-` and `_` are
    /// interchangeable. `distort_images` is accepted for `distort`.
    pub fn lookup(name: &str) -> Result<Self, UnknownTransform> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        if normalized == "distort_images" {
            return Ok(Self::Distort);
        }
        Self::ALL
            .into_iter()
            .find(|k| k.name() == normalized)
            .ok_or_else(|| UnknownTransform {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The configured transform for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    DownSize(DownSizeConfig),
    DownScale(DownScaleConfig),
    Distort(DistortConfig),
    RemoveBlackBar(BlackBarConfig),
    StripExif(StripExifConfig),
    SetExif(SetExifConfig),
}

impl Transform {
    /// Take the options for `kind` from the merged configuration.
    pub fn from_config(kind: TransformKind, config: &MirrorConfig) -> Self {
        match kind {
            TransformKind::DownSize => Self::DownSize(config.down_size.clone()),
            TransformKind::DownScale => Self::DownScale(config.down_scale.clone()),
            TransformKind::Distort => Self::Distort(config.distort.clone()),
            TransformKind::RemoveBlackBar => {
                Self::RemoveBlackBar(config.remove_black_bar.clone())
            }
            TransformKind::StripExif => Self::StripExif(config.strip_exif.clone()),
            TransformKind::SetExif => Self::SetExif(config.set_exif.clone()),
        }
    }

    pub fn kind(&self) -> TransformKind {
        match self {
            Self::DownSize(_) => TransformKind::DownSize,
            Self::DownScale(_) => TransformKind::DownScale,
            Self::Distort(_) => TransformKind::Distort,
            Self::RemoveBlackBar(_) => TransformKind::RemoveBlackBar,
            Self::StripExif(_) => TransformKind::StripExif,
            Self::SetExif(_) => TransformKind::SetExif,
        }
    }

    /// Run the transform for one job.
    pub fn apply<B: ImageBackend>(
        &self,
        backend: &B,
        job: &TransformJob,
    ) -> Result<JobOutcome, TransformError> {
        match self {
            Self::DownSize(opts) => down_size::apply(backend, opts, job),
            Self::DownScale(opts) => down_scale::apply(backend, opts, job),
            Self::Distort(opts) => distort::apply(backend, opts, job),
            Self::RemoveBlackBar(opts) => black_bar::apply(backend, opts, job),
            Self::StripExif(opts) => exif_ops::strip(opts, job),
            Self::SetExif(opts) => exif_ops::set(opts, job),
        }
    }
}

/// One queued file: where it comes from and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformJob {
    pub source_path: PathBuf,
    /// Source file name without its suffix.
    pub output_stem: OsString,
    pub output_dir: PathBuf,
    pub transform: TransformKind,
}

impl TransformJob {
    pub fn new(source_path: PathBuf, output_dir: PathBuf, transform: TransformKind) -> Self {
        let output_stem = source_path
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        Self {
            source_path,
            output_stem,
            output_dir,
            transform,
        }
    }

    /// `output_dir/stem.jpg`, used by every re-encoding transform.
    pub fn jpeg_output(&self) -> PathBuf {
        let mut name = self.output_stem.clone();
        name.push(".jpg");
        self.output_dir.join(name)
    }

    /// `output_dir/stem.<original suffix>`, used by copies and metadata rewrites.
    pub fn same_suffix_output(&self) -> PathBuf {
        let mut name = self.output_stem.clone();
        if let Some(ext) = self.source_path.extension() {
            name.push(".");
            name.push(ext);
        }
        self.output_dir.join(name)
    }

    /// Every path this job may write. Budget and size-cap transforms may
    /// either re-encode or pass the source through, so they claim both.
    pub fn possible_outputs(&self) -> Vec<PathBuf> {
        let mut outputs = match self.transform {
            TransformKind::DownSize | TransformKind::DownScale => {
                vec![self.jpeg_output(), self.same_suffix_output()]
            }
            TransformKind::Distort | TransformKind::RemoveBlackBar => vec![self.jpeg_output()],
            TransformKind::StripExif | TransformKind::SetExif => vec![self.same_suffix_output()],
        };
        outputs.dedup();
        outputs
    }

    pub fn is_jpeg_source(&self) -> bool {
        self.source_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
    }
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Source copied byte-for-byte under its own suffix.
    Copied { output: PathBuf, bytes: u64 },
    /// Re-encoded to JPEG. `rounds` is set for budget-driven encodes.
    Encoded {
        output: PathBuf,
        width: u32,
        height: u32,
        bytes: u64,
        rounds: Option<u32>,
    },
    /// EXIF tags removed without re-encoding.
    Stripped { output: PathBuf, removed: usize },
    /// EXIF tags written without re-encoding.
    Tagged { output: PathBuf, attempts: u32 },
}

impl JobOutcome {
    pub fn output(&self) -> &Path {
        match self {
            Self::Copied { output, .. }
            | Self::Encoded { output, .. }
            | Self::Stripped { output, .. }
            | Self::Tagged { output, .. } => output,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Output already exists: {0}")]
    OutputExists(PathBuf),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Exif(#[from] ExifError),
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
}

impl TransformError {
    /// Fatal errors stop the whole run; everything else fails only its job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Sanitize(SanitizeError::Exhausted { .. }))
    }

    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::AlreadyExists {
            Self::OutputExists(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), TransformError> {
    write_new(path, bytes).map_err(|e| TransformError::io(path, e))
}

/// Copy the source verbatim under its own suffix.
fn copy_through(job: &TransformJob) -> Result<JobOutcome, TransformError> {
    let output = job.same_suffix_output();
    let bytes = copy_new(&job.source_path, &output).map_err(|e| TransformError::io(&output, e))?;
    Ok(JobOutcome::Copied { output, bytes })
}

fn source_len(job: &TransformJob) -> Result<u64, TransformError> {
    crate::fsutil::file_size(&job.source_path).map_err(|e| TransformError::io(&job.source_path, e))
}

/// EXIF to embed in the re-encoded output, with `tags` stripped. JPEG, PNG
/// and WebP sources are read.
///
/// An unreadable source container is dropped with a warning rather than
/// failing the job.
fn carried_metadata(job: &TransformJob, tags: &[String]) -> Option<Vec<u8>> {
    let source = match std::fs::read(&job.source_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %job.source_path.display(), error = %e, "cannot re-read source for EXIF");
            return None;
        }
    };
    match sanitizer::carried_exif(&source, tags) {
        Ok(exif) => exif,
        Err(e) => {
            warn!(path = %job.source_path.display(), error = %e, "dropping unreadable EXIF");
            None
        }
    }
}

fn encoded(output: PathBuf, bytes: &[u8], width: u32, height: u32, rounds: Option<u32>) -> JobOutcome {
    JobOutcome::Encoded {
        output,
        width,
        height,
        bytes: bytes.len() as u64,
        rounds,
    }
}
