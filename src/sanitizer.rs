//! EXIF tag stripping and self-healing tag updates.
//!
//! Stripping works on the raw APP1 segment: the scan data of the JPEG is
//! never decoded, so a strip is lossless.
//!
//! Setting tags runs a bounded state machine:
//!
//! ```text
//! Attempting(1) --apply ok--> Healed
//!      |
//!   apply failed: reset metadata, retry
//!      v
//! Attempting(2) ... Attempting(max) --apply failed--> Exhausted
//! ```
//!
//! A reset throws the whole metadata block away and reopens an empty
//! container. It only touches the in-memory copy of the source, never the
//! file on disk.

use crate::exif::{
    ExifContainer, ExifError, jpeg, read_jpeg_exif, read_source_exif, resolve_tag_name,
};
use crate::fsutil::write_new;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Exif(#[from] ExifError),
    #[error("gave up setting EXIF tags after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: ExifError },
}

/// Remove every resolvable tag in `tags` from `container`.
///
/// Names are resolved case-insensitively with underscores ignored; names not
/// in the tag table are skipped. Returns the number of entries removed.
pub fn strip(tags: &[String], container: &mut ExifContainer) -> usize {
    tags.iter()
        .filter_map(|name| resolve_tag_name(name))
        .map(|def| container.remove(def))
        .sum()
}

/// What [`strip_without_recompress`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripOutcome {
    /// Source bytes copied unchanged (not a JPEG, no EXIF, or nothing to remove).
    Verbatim,
    Rewritten { removed: usize },
}

/// Strip `tags` from a JPEG held in memory.
///
/// Returns `None` when the bytes should be kept as they are.
pub fn strip_jpeg_bytes(data: &[u8], tags: &[String]) -> Result<Option<(Vec<u8>, usize)>, ExifError> {
    if !jpeg::is_jpeg(data) {
        return Ok(None);
    }
    let Some(mut container) = read_jpeg_exif(data)? else {
        return Ok(None);
    };
    let removed = strip(tags, &mut container);
    if removed == 0 {
        return Ok(None);
    }
    let payload = (!container.is_empty()).then(|| container.to_bytes());
    let bytes = jpeg::replace_exif(data, payload.as_deref())?;
    Ok(Some((bytes, removed)))
}

pub fn strip_without_recompress(
    src: &Path,
    dst: &Path,
    tags: &[String],
) -> Result<StripOutcome, SanitizeError> {
    let data = fs::read(src)?;
    match strip_jpeg_bytes(&data, tags)? {
        Some((bytes, removed)) => {
            write_new(dst, &bytes)?;
            Ok(StripOutcome::Rewritten { removed })
        }
        None => {
            write_new(dst, &data)?;
            Ok(StripOutcome::Verbatim)
        }
    }
}

/// The container a re-encoded output should carry: the source's EXIF with
/// `tags` removed, serialized. `None` when the source has no EXIF that
/// [`read_source_exif`] can find, or nothing is left after stripping.
pub fn carried_exif(source: &[u8], tags: &[String]) -> Result<Option<Vec<u8>>, ExifError> {
    let Some(mut container) = read_source_exif(source)? else {
        return Ok(None);
    };
    strip(tags, &mut container);
    Ok((!container.is_empty()).then(|| container.to_bytes()))
}

/// Something whose metadata can be updated and, when that fails, reset.
pub trait MetadataTarget {
    /// Apply every `(tag, value)` pair, all or nothing.
    fn apply(&mut self, values: &[(String, String)]) -> Result<(), ExifError>;

    /// Drop the whole metadata block and continue from an empty one.
    fn reset(&mut self) -> Result<(), ExifError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealState {
    Attempting(u32),
    Healed { attempts: u32 },
    Exhausted { attempts: u32, last_error: ExifError },
}

impl HealState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Attempting(_))
    }

    /// Advance one transition. Terminal states are returned unchanged.
    pub fn step<T: MetadataTarget>(
        self,
        target: &mut T,
        values: &[(String, String)],
        max_attempts: u32,
    ) -> HealState {
        let Self::Attempting(attempt) = self else {
            return self;
        };

        match target.apply(values) {
            Ok(()) => Self::Healed { attempts: attempt },
            Err(last_error) if attempt >= max_attempts => Self::Exhausted {
                attempts: attempt,
                last_error,
            },
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "EXIF update failed, resetting metadata");
                match target.reset() {
                    Ok(()) => Self::Attempting(attempt + 1),
                    Err(last_error) => Self::Exhausted {
                        attempts: attempt,
                        last_error,
                    },
                }
            }
        }
    }
}

/// Run the heal state machine to completion. Returns the attempt count on
/// success.
pub fn heal_and_apply<T: MetadataTarget>(
    target: &mut T,
    values: &[(String, String)],
    max_attempts: u32,
) -> Result<u32, SanitizeError> {
    let max_attempts = max_attempts.max(1);
    let mut state = HealState::Attempting(1);
    loop {
        state = match state.step(target, values, max_attempts) {
            HealState::Healed { attempts } => {
                debug!(attempts, "EXIF update applied");
                return Ok(attempts);
            }
            HealState::Exhausted {
                attempts,
                last_error,
            } => {
                return Err(SanitizeError::Exhausted {
                    attempts,
                    last_error,
                });
            }
            next => next,
        };
    }
}

/// A JPEG held in memory together with its parsed EXIF container.
pub struct JpegMetadataTarget {
    image: Vec<u8>,
    container: ExifContainer,
}

impl JpegMetadataTarget {
    /// Open a JPEG. A container that fails to parse is reset once up front.
    pub fn open(image: Vec<u8>) -> Result<Self, ExifError> {
        if !jpeg::is_jpeg(&image) {
            return Err(ExifError::NotJpeg);
        }
        let mut target = Self {
            image,
            container: ExifContainer::new(),
        };
        match read_jpeg_exif(&target.image) {
            Ok(Some(container)) => target.container = container,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "unreadable EXIF container, resetting");
                target.reset()?;
            }
        }
        Ok(target)
    }

    pub fn container(&self) -> &ExifContainer {
        &self.container
    }

    /// The image with the current container embedded.
    pub fn into_bytes(self) -> Result<Vec<u8>, ExifError> {
        jpeg::embed_exif(&self.image, &self.container.to_bytes())
    }
}

impl MetadataTarget for JpegMetadataTarget {
    fn apply(&mut self, values: &[(String, String)]) -> Result<(), ExifError> {
        let mut working = self.container.clone();
        for (name, value) in values {
            let def = resolve_tag_name(name).ok_or_else(|| ExifError::UnknownTag(name.clone()))?;
            working.set(def, value)?;
        }
        let payload_len = jpeg::EXIF_HEADER.len() + working.to_bytes().len();
        if payload_len > jpeg::MAX_SEGMENT_PAYLOAD {
            return Err(ExifError::TooLarge(payload_len));
        }
        self.container = working;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ExifError> {
        self.image = jpeg::replace_exif(&self.image, None)?;
        self.container = ExifContainer::new();
        Ok(())
    }
}

/// Set tags on a JPEG held in memory. Returns the new bytes and the number
/// of attempts it took.
pub fn set_bytes(
    image: Vec<u8>,
    values: &[(String, String)],
    max_attempts: u32,
) -> Result<(Vec<u8>, u32), SanitizeError> {
    let mut target = JpegMetadataTarget::open(image)?;
    let attempts = heal_and_apply(&mut target, values, max_attempts)?;
    Ok((target.into_bytes()?, attempts))
}

pub fn set(
    src: &Path,
    dst: &Path,
    values: &[(String, String)],
    max_attempts: u32,
) -> Result<u32, SanitizeError> {
    let (bytes, attempts) = set_bytes(fs::read(src)?, values, max_attempts)?;
    write_new(dst, &bytes)?;
    Ok(attempts)
}
