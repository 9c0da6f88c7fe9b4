//! EXIF containers embedded in non-JPEG files.
//!
//! PNG keeps the TIFF container in an `eXIf` chunk, WebP in a RIFF `EXIF`
//! chunk. Some writers prefix either one with the JPEG `Exif\0\0` header; that
//! prefix is dropped so callers always get a bare TIFF container.

use super::ExifError;
use super::jpeg::EXIF_HEADER;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(PNG_SIGNATURE)
}

pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

fn corrupt(msg: &str) -> ExifError {
    ExifError::Corrupt(msg.to_string())
}

fn bare_tiff(payload: &[u8]) -> &[u8] {
    payload.strip_prefix(EXIF_HEADER.as_slice()).unwrap_or(payload)
}

/// The TIFF container of a PNG's `eXIf` chunk, if any.
///
/// Chunk CRCs are not checked. The walk stops at `IDAT`: the format requires
/// `eXIf` to come before the image data.
pub fn find_png_exif(data: &[u8]) -> Result<Option<&[u8]>, ExifError> {
    if !is_png(data) {
        return Ok(None);
    }
    let mut pos = PNG_SIGNATURE.len();
    while pos < data.len() {
        let header = data
            .get(pos..pos + 8)
            .ok_or_else(|| corrupt("truncated PNG chunk header"))?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = &header[4..8];
        let start = pos + 8;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| corrupt("PNG chunk runs past end of file"))?;
        match kind {
            b"eXIf" => return Ok(Some(bare_tiff(&data[start..end]))),
            b"IDAT" | b"IEND" => return Ok(None),
            _ => {}
        }
        // data + 4-byte CRC
        pos = end + 4;
    }
    Ok(None)
}

/// The TIFF container of a WebP's RIFF `EXIF` chunk, if any.
pub fn find_webp_exif(data: &[u8]) -> Result<Option<&[u8]>, ExifError> {
    if !is_webp(data) {
        return Ok(None);
    }
    let mut pos = 12;
    while pos < data.len() {
        let header = data
            .get(pos..pos + 8)
            .ok_or_else(|| corrupt("truncated RIFF chunk header"))?;
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let start = pos + 8;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| corrupt("RIFF chunk runs past end of file"))?;
        if &header[..4] == b"EXIF" {
            return Ok(Some(bare_tiff(&data[start..end])));
        }
        // chunks are padded to an even length
        pos = end + (len & 1);
    }
    Ok(None)
}
