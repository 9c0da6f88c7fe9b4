//! Shared test utilities for the imgmirror test suite.
//!
//! Synthetic images, files carrying EXIF, and tree listings for mirror
//! assertions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_jpeg_with_exif(&tmp.path().join("a.jpg"), 64, 48, &[("Artist", "me")]);
//! assert_eq!(tree_listing(tmp.path()), vec!["a.jpg"]);
//! ```

use image::{DynamicImage, ImageEncoder, RgbImage};
use std::path::Path;
use walkdir::WalkDir;

use crate::exif::{ExifContainer, jpeg, resolve_tag_name};

// =========================================================================
// Synthetic images
// =========================================================================

/// An RGB gradient, so encoders produce non-trivial output sizes.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

/// Encode a gradient as JPEG (quality 90) into memory.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_image(width, height).to_rgb8();
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, jpeg_bytes(width, height)).unwrap();
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    gradient_image(width, height)
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

// =========================================================================
// EXIF fixtures
// =========================================================================

/// Build an EXIF container from `(tag name, value)` pairs.
pub fn exif_container(tags: &[(&str, &str)]) -> ExifContainer {
    let mut container = ExifContainer::new();
    for (name, value) in tags {
        let def = resolve_tag_name(name).unwrap_or_else(|| panic!("unknown tag '{name}'"));
        container.set(def, value).unwrap();
    }
    container
}

pub fn write_jpeg_with_exif(path: &Path, width: u32, height: u32, tags: &[(&str, &str)]) {
    let tiff = exif_container(tags).to_bytes();
    let bytes = jpeg::embed_exif(&jpeg_bytes(width, height), &tiff).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// A PNG with an `eXIf` chunk right after `IHDR`.
pub fn write_png_with_exif(path: &Path, width: u32, height: u32, tags: &[(&str, &str)]) {
    let mut plain = Vec::new();
    gradient_image(width, height)
        .write_to(&mut std::io::Cursor::new(&mut plain), image::ImageFormat::Png)
        .unwrap();
    let tiff = exif_container(tags).to_bytes();

    let mut chunk = (tiff.len() as u32).to_be_bytes().to_vec();
    chunk.extend_from_slice(b"eXIf");
    chunk.extend_from_slice(&tiff);
    chunk.extend_from_slice(&crc32(&chunk[4..]).to_be_bytes());

    // signature (8) + IHDR chunk (4 + 4 + 13 + 4)
    let ihdr_end = 33;
    let mut bytes = plain[..ihdr_end].to_vec();
    bytes.extend_from_slice(&chunk);
    bytes.extend_from_slice(&plain[ihdr_end..]);
    std::fs::write(path, bytes).unwrap();
}

/// PNG chunk CRC (IEEE, reflected).
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}

/// A JPEG whose APP1 `Exif` segment holds garbage that fails to parse.
pub fn write_jpeg_with_corrupt_exif(path: &Path, width: u32, height: u32) {
    let bytes = jpeg::embed_exif(&jpeg_bytes(width, height), b"II*\0\xff\xff\xff\x7f").unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Parse the EXIF container of a JPEG on disk. Panics if there is none.
pub fn read_exif(path: &Path) -> ExifContainer {
    let bytes = std::fs::read(path).unwrap();
    crate::exif::read_jpeg_exif(&bytes)
        .unwrap()
        .unwrap_or_else(|| panic!("no EXIF in {}", path.display()))
}

/// ASCII value of a tag, if present.
pub fn ascii_tag(container: &ExifContainer, name: &str) -> Option<String> {
    container
        .get(resolve_tag_name(name).unwrap())
        .and_then(|e| e.as_ascii())
}

// =========================================================================
// Tree listings
// =========================================================================

/// Every entry under `root` as a `/`-separated relative path, sorted.
/// Directories get a trailing `/`.
pub fn tree_listing(root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|e| {
            let e = e.unwrap();
            let rel = e.path().strip_prefix(root).unwrap();
            let mut s = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if e.file_type().is_dir() {
                s.push('/');
            }
            s
        })
        .collect();
    paths.sort();
    paths
}
