//! EXIF metadata inside JPEG files.
//!
//! | Piece | Role |
//! |---|---|
//! | [`tags`] | fixed tag-name table and case-insensitive reverse lookup |
//! | [`container`] | parse, edit and serialize the TIFF-structured IFDs |
//! | [`jpeg`] | find, strip and insert the APP1 `Exif` segment without touching scan data |
//! | [`embedded`] | read the container from PNG `eXIf` and WebP `EXIF` chunks |

pub mod container;
pub mod embedded;
pub mod jpeg;
pub mod tags;

pub use container::{ByteOrder, Entry, ExifContainer};
pub use tags::{Ifd, TagDef, TagKind, resolve_tag_name};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExifError {
    #[error("not a JPEG stream")]
    NotJpeg,
    #[error("corrupted EXIF container: {0}")]
    Corrupt(String),
    #[error("EXIF payload of {0} bytes does not fit in a JPEG APP1 segment")]
    TooLarge(usize),
    #[error("invalid value {value:?} for EXIF tag {tag}: {reason}")]
    InvalidValue {
        tag: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown EXIF tag name: {0}")]
    UnknownTag(String),
}

/// Read and parse the EXIF container of a JPEG, if it has one.
pub fn read_jpeg_exif(data: &[u8]) -> Result<Option<ExifContainer>, ExifError> {
    jpeg::find_exif(data)?
        .map(ExifContainer::parse)
        .transpose()
}

/// Read the EXIF container of a JPEG, PNG or WebP source, if it has one.
///
/// Any other format has none. TIFF sources are not read: their IFDs describe
/// the image layout and do not carry over to a re-encoded JPEG.
pub fn read_source_exif(data: &[u8]) -> Result<Option<ExifContainer>, ExifError> {
    let tiff = if jpeg::is_jpeg(data) {
        jpeg::find_exif(data)?
    } else if embedded::is_png(data) {
        embedded::find_png_exif(data)?
    } else if embedded::is_webp(data) {
        embedded::find_webp_exif(data)?
    } else {
        None
    };
    tiff.map(ExifContainer::parse).transpose()
}
