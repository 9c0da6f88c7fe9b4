//! Locate, remove and insert the APP1 `Exif` segment of a JPEG stream.
//!
//! Only the header segments before SOS are walked; the entropy-coded scan
//! data is copied through untouched, so none of these operations re-encode
//! pixels.

use super::ExifError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

pub const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Largest payload a segment can carry: the 16-bit length includes itself.
pub const MAX_SEGMENT_PAYLOAD: usize = 0xFFFF - 2;

/// A header segment: `start..end` spans marker (with fill bytes), length and
/// payload.
struct Segment {
    marker: u8,
    start: usize,
    payload_start: usize,
    end: usize,
}

/// The header segments of a JPEG plus the offset where SOS (or whatever
/// follows the last parseable segment) begins.
struct Layout {
    segments: Vec<Segment>,
    body_start: usize,
}

pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&SOI)
}

fn layout(data: &[u8]) -> Result<Layout, ExifError> {
    if !is_jpeg(data) {
        return Err(ExifError::NotJpeg);
    }

    let mut segments = Vec::new();
    let mut pos = SOI.len();
    while pos < data.len() && data[pos] == 0xFF {
        let start = pos;
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            return Err(ExifError::Corrupt("JPEG ends inside a marker".to_string()));
        };
        pos += 1;

        match marker {
            SOS | EOI => {
                pos = start;
                break;
            }
            // Standalone markers carry no length field.
            0x01 | 0xD0..=0xD7 => segments.push(Segment {
                marker,
                start,
                payload_start: pos,
                end: pos,
            }),
            _ => {
                let len_bytes = data
                    .get(pos..pos + 2)
                    .ok_or_else(|| ExifError::Corrupt("truncated segment length".to_string()))?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                let end = pos + len;
                if len < 2 || end > data.len() {
                    return Err(ExifError::Corrupt(format!(
                        "segment {marker:#04x} at offset {start} overruns the file"
                    )));
                }
                segments.push(Segment {
                    marker,
                    start,
                    payload_start: pos + 2,
                    end,
                });
                pos = end;
            }
        }
    }

    Ok(Layout {
        segments,
        body_start: pos,
    })
}

fn is_exif_segment(data: &[u8], seg: &Segment) -> bool {
    seg.marker == APP1 && data[seg.payload_start..seg.end].starts_with(EXIF_HEADER)
}

/// The TIFF container of the first APP1 `Exif` segment, if any.
pub fn find_exif(data: &[u8]) -> Result<Option<&[u8]>, ExifError> {
    let layout = layout(data)?;
    Ok(layout
        .segments
        .iter()
        .find(|seg| is_exif_segment(data, seg))
        .map(|seg| &data[seg.payload_start + EXIF_HEADER.len()..seg.end]))
}

/// Rebuild `data` with every `Exif` APP1 segment removed and, when `tiff` is
/// given, a single new one inserted after SOI and any leading APP0 (JFIF)
/// segments.
pub fn replace_exif(data: &[u8], tiff: Option<&[u8]>) -> Result<Vec<u8>, ExifError> {
    let layout = layout(data)?;

    let new_segment = match tiff {
        Some(tiff) => {
            let payload_len = EXIF_HEADER.len() + tiff.len();
            if payload_len > MAX_SEGMENT_PAYLOAD {
                return Err(ExifError::TooLarge(payload_len));
            }
            let mut seg = Vec::with_capacity(payload_len + 4);
            seg.extend_from_slice(&[0xFF, APP1]);
            seg.extend_from_slice(&((payload_len + 2) as u16).to_be_bytes());
            seg.extend_from_slice(EXIF_HEADER);
            seg.extend_from_slice(tiff);
            Some(seg)
        }
        None => None,
    };

    let insert_at = layout
        .segments
        .iter()
        .take_while(|seg| seg.marker == APP0)
        .count();

    let mut out = Vec::with_capacity(data.len() + new_segment.as_ref().map_or(0, Vec::len));
    out.extend_from_slice(&SOI);
    for (i, seg) in layout.segments.iter().enumerate() {
        if i == insert_at {
            if let Some(new_segment) = &new_segment {
                out.extend_from_slice(new_segment);
            }
        }
        if !is_exif_segment(data, seg) {
            out.extend_from_slice(&data[seg.start..seg.end]);
        }
    }
    if insert_at == layout.segments.len() {
        if let Some(new_segment) = &new_segment {
            out.extend_from_slice(new_segment);
        }
    }
    out.extend_from_slice(&data[layout.body_start..]);
    Ok(out)
}

/// Insert (or replace) the EXIF container of an encoded JPEG.
pub fn embed_exif(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>, ExifError> {
    replace_exif(jpeg, Some(tiff))
}
