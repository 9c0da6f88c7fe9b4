//! TIFF-structured EXIF container.
//!
//! Parses the IFD chain carried inside a JPEG APP1 `Exif` segment into four
//! flat entry lists (IFD0, Exif, GPS, Interop) plus an optional JPEG
//! thumbnail from IFD1. Sub-IFD pointers and thumbnail offsets are not kept
//! as entries; [`ExifContainer::to_bytes`] regenerates them when laying the
//! container out again.
//!
//! Layout written by `to_bytes`:
//!
//! ```text
//! header (8) | IFD0 | Exif IFD | GPS IFD | Interop IFD | IFD1 | thumbnail
//! ```
//!
//! Each IFD block is its entry table followed by the out-of-line values of
//! that table, so block sizes are known before any offset is written.

use super::ExifError;
use super::tags::{Ifd, TagDef, TagKind};
use std::collections::HashSet;
use std::str::FromStr;

const EXIF_POINTER: u16 = 0x8769;
const GPS_POINTER: u16 = 0x8825;
const INTEROP_POINTER: u16 = 0xA005;
const THUMBNAIL_OFFSET: u16 = 0x0201;
const THUMBNAIL_LENGTH: u16 = 0x0202;
const STRIP_OFFSETS: u16 = 0x0111;
const ORIENTATION: u16 = 0x0112;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_SRATIONAL: u16 = 10;

const ASCII_COMMENT_HEADER: &[u8; 8] = b"ASCII\0\0\0";
const RATIONAL_DENOMINATOR: f64 = 10_000.0;

fn type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

fn corrupt(message: impl Into<String>) -> ExifError {
    ExifError::Corrupt(message.into())
}

fn read_slice(data: &[u8], start: usize, len: usize) -> Result<&[u8], ExifError> {
    start
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .map(|end| &data[start..end])
        .ok_or_else(|| {
            corrupt(format!(
                "{len} bytes at offset {start} run past the end of a {}-byte container",
                data.len()
            ))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    fn read_u16(self, b: &[u8]) -> u16 {
        let raw = [b[0], b[1]];
        match self {
            Self::LittleEndian => u16::from_le_bytes(raw),
            Self::BigEndian => u16::from_be_bytes(raw),
        }
    }

    fn read_u32(self, b: &[u8]) -> u32 {
        let raw = [b[0], b[1], b[2], b[3]];
        match self {
            Self::LittleEndian => u32::from_le_bytes(raw),
            Self::BigEndian => u32::from_be_bytes(raw),
        }
    }

    fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            Self::LittleEndian => v.to_le_bytes(),
            Self::BigEndian => v.to_be_bytes(),
        }
    }

    fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            Self::LittleEndian => v.to_le_bytes(),
            Self::BigEndian => v.to_be_bytes(),
        }
    }

    fn mark(self) -> &'static [u8; 2] {
        match self {
            Self::LittleEndian => b"II",
            Self::BigEndian => b"MM",
        }
    }
}

/// One IFD entry. `data` holds the raw value bytes in the container's byte
/// order, whether the value was stored inline or out of line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    pub data: Vec<u8>,
}

impl Entry {
    fn long(tag: u16, value: u32, order: ByteOrder) -> Self {
        Self {
            tag,
            field_type: TYPE_LONG,
            count: 1,
            data: order.u32_bytes(value).to_vec(),
        }
    }

    /// The value as text, for ASCII entries.
    pub fn as_ascii(&self) -> Option<String> {
        (self.field_type == TYPE_ASCII).then(|| {
            String::from_utf8_lossy(&self.data)
                .trim_end_matches('\0')
                .to_string()
        })
    }

    fn first_unsigned(&self, order: ByteOrder) -> Option<u32> {
        match self.field_type {
            TYPE_SHORT if self.data.len() >= 2 => Some(order.read_u16(&self.data) as u32),
            TYPE_LONG if self.data.len() >= 4 => Some(order.read_u32(&self.data)),
            _ => None,
        }
    }

    fn out_of_line_len(&self) -> usize {
        if self.data.len() > 4 {
            self.data.len() + self.data.len() % 2
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Thumbnail {
    entries: Vec<Entry>,
    data: Vec<u8>,
}

/// An editable EXIF container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifContainer {
    order: ByteOrder,
    primary: Vec<Entry>,
    exif: Vec<Entry>,
    gps: Vec<Entry>,
    interop: Vec<Entry>,
    thumbnail: Option<Thumbnail>,
}

impl Default for ExifContainer {
    fn default() -> Self {
        Self::new()
    }
}

struct IfdReader<'a> {
    data: &'a [u8],
    order: ByteOrder,
    visited: HashSet<u32>,
}

impl IfdReader<'_> {
    /// Read one IFD, returning its entries and the offset of the next IFD.
    fn read(&mut self, offset: u32) -> Result<(Vec<Entry>, u32), ExifError> {
        if !self.visited.insert(offset) {
            return Err(corrupt(format!("IFD at offset {offset} is referenced twice")));
        }
        let start = offset as usize;
        let count = self.order.read_u16(read_slice(self.data, start, 2)?) as usize;
        let table = read_slice(self.data, start + 2, count * 12)?;

        let mut entries = Vec::with_capacity(count);
        for raw in table.chunks_exact(12) {
            let tag = self.order.read_u16(&raw[0..2]);
            let field_type = self.order.read_u16(&raw[2..4]);
            let count = self.order.read_u32(&raw[4..8]);
            let size = type_size(field_type).ok_or_else(|| {
                corrupt(format!("tag {tag:#06x} has unknown field type {field_type}"))
            })?;
            let len = (count as usize)
                .checked_mul(size)
                .ok_or_else(|| corrupt(format!("tag {tag:#06x} has an impossible count")))?;
            let data = if len <= 4 {
                raw[8..8 + len].to_vec()
            } else {
                let value_offset = self.order.read_u32(&raw[8..12]) as usize;
                read_slice(self.data, value_offset, len)?.to_vec()
            };
            entries.push(Entry {
                tag,
                field_type,
                count,
                data,
            });
        }

        // Some writers omit the trailing next-IFD pointer on the last IFD.
        let next = read_slice(self.data, start + 2 + count * 12, 4)
            .map(|b| self.order.read_u32(b))
            .unwrap_or(0);
        Ok((entries, next))
    }

    fn read_sub_ifd(&mut self, pointer: Option<u32>) -> Result<Vec<Entry>, ExifError> {
        match pointer {
            Some(offset) => Ok(self.read(offset)?.0),
            None => Ok(Vec::new()),
        }
    }

    fn read_thumbnail(&mut self, offset: u32) -> Result<Option<Thumbnail>, ExifError> {
        let (mut entries, _) = self.read(offset)?;
        if entries.iter().any(|e| e.tag == STRIP_OFFSETS) {
            return Ok(None);
        }
        let start = take_pointer(&mut entries, THUMBNAIL_OFFSET, self.order)?;
        let len = take_pointer(&mut entries, THUMBNAIL_LENGTH, self.order)?;
        let (Some(start), Some(len)) = (start, len) else {
            return Ok(None);
        };
        let data = read_slice(self.data, start as usize, len as usize)?.to_vec();
        Ok(Some(Thumbnail { entries, data }))
    }
}

/// Remove a pointer entry from `entries` and return the offset it holds.
fn take_pointer(
    entries: &mut Vec<Entry>,
    tag: u16,
    order: ByteOrder,
) -> Result<Option<u32>, ExifError> {
    let Some(pos) = entries.iter().position(|e| e.tag == tag) else {
        return Ok(None);
    };
    let entry = entries.remove(pos);
    entry
        .first_unsigned(order)
        .map(Some)
        .ok_or_else(|| corrupt(format!("pointer tag {tag:#06x} is not an offset")))
}

/// Bytes an IFD block occupies: count, table, next pointer, then values.
fn block_len(entries: &[Entry], extra_pointers: usize) -> usize {
    2 + 12 * (entries.len() + extra_pointers)
        + 4
        + entries.iter().map(Entry::out_of_line_len).sum::<usize>()
}

fn write_ifd(out: &mut Vec<u8>, mut entries: Vec<Entry>, next: u32, order: ByteOrder) {
    entries.sort_by_key(|e| e.tag);
    let base = out.len();
    let mut value_cursor = base + 2 + 12 * entries.len() + 4;

    out.extend_from_slice(&order.u16_bytes(entries.len() as u16));
    for entry in &entries {
        out.extend_from_slice(&order.u16_bytes(entry.tag));
        out.extend_from_slice(&order.u16_bytes(entry.field_type));
        out.extend_from_slice(&order.u32_bytes(entry.count));
        if entry.data.len() <= 4 {
            let mut field = [0u8; 4];
            field[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&field);
        } else {
            out.extend_from_slice(&order.u32_bytes(value_cursor as u32));
            value_cursor += entry.out_of_line_len();
        }
    }
    out.extend_from_slice(&order.u32_bytes(next));

    for entry in entries.iter().filter(|e| e.data.len() > 4) {
        out.extend_from_slice(&entry.data);
        if entry.data.len() % 2 == 1 {
            out.push(0);
        }
    }
    debug_assert_eq!(out.len(), value_cursor);
}

impl ExifContainer {
    /// An empty little-endian container.
    pub fn new() -> Self {
        Self {
            order: ByteOrder::LittleEndian,
            primary: Vec::new(),
            exif: Vec::new(),
            gps: Vec::new(),
            interop: Vec::new(),
            thumbnail: None,
        }
    }

    /// Parse a TIFF-structured container (the APP1 payload after `Exif\0\0`).
    ///
    /// Out-of-range offsets, unknown field types and IFD cycles in the
    /// primary, Exif, GPS or Interop directories are reported as
    /// [`ExifError::Corrupt`]. A damaged IFD1 only loses the thumbnail.
    pub fn parse(tiff: &[u8]) -> Result<Self, ExifError> {
        let header = read_slice(tiff, 0, 8)?;
        let order = match &header[..2] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            _ => return Err(corrupt("unknown byte-order mark")),
        };
        if order.read_u16(&header[2..4]) != 42 {
            return Err(corrupt("bad TIFF magic number"));
        }

        let mut reader = IfdReader {
            data: tiff,
            order,
            visited: HashSet::new(),
        };
        let (mut primary, next) = reader.read(order.read_u32(&header[4..8]))?;
        let exif_ptr = take_pointer(&mut primary, EXIF_POINTER, order)?;
        let gps_ptr = take_pointer(&mut primary, GPS_POINTER, order)?;

        let mut exif = reader.read_sub_ifd(exif_ptr)?;
        let interop_ptr = take_pointer(&mut exif, INTEROP_POINTER, order)?;
        let gps = reader.read_sub_ifd(gps_ptr)?;
        let interop = reader.read_sub_ifd(interop_ptr)?;

        let thumbnail = match next {
            0 => None,
            offset => reader.read_thumbnail(offset).ok().flatten(),
        };

        Ok(Self {
            order,
            primary,
            exif,
            gps,
            interop,
            thumbnail,
        })
    }

    /// Serialize back to a TIFF-structured container.
    pub fn to_bytes(&self) -> Vec<u8> {
        let order = self.order;
        let has_interop = !self.interop.is_empty();
        let has_exif = !self.exif.is_empty() || has_interop;
        let has_gps = !self.gps.is_empty();

        let ifd0_off = 8;
        let exif_off = ifd0_off + block_len(&self.primary, has_exif as usize + has_gps as usize);
        let gps_off = exif_off
            + if has_exif {
                block_len(&self.exif, has_interop as usize)
            } else {
                0
            };
        let interop_off = gps_off + if has_gps { block_len(&self.gps, 0) } else { 0 };
        let ifd1_off = interop_off
            + if has_interop {
                block_len(&self.interop, 0)
            } else {
                0
            };

        let mut primary = self.primary.clone();
        if has_exif {
            primary.push(Entry::long(EXIF_POINTER, exif_off as u32, order));
        }
        if has_gps {
            primary.push(Entry::long(GPS_POINTER, gps_off as u32, order));
        }
        let mut exif = self.exif.clone();
        if has_interop {
            exif.push(Entry::long(INTEROP_POINTER, interop_off as u32, order));
        }

        let mut out = Vec::with_capacity(ifd1_off);
        out.extend_from_slice(order.mark());
        out.extend_from_slice(&order.u16_bytes(42));
        out.extend_from_slice(&order.u32_bytes(ifd0_off as u32));

        let ifd1_pointer = if self.thumbnail.is_some() {
            ifd1_off as u32
        } else {
            0
        };
        write_ifd(&mut out, primary, ifd1_pointer, order);
        if has_exif {
            write_ifd(&mut out, exif, 0, order);
        }
        if has_gps {
            write_ifd(&mut out, self.gps.clone(), 0, order);
        }
        if has_interop {
            write_ifd(&mut out, self.interop.clone(), 0, order);
        }

        if let Some(thumb) = &self.thumbnail {
            let data_off = ifd1_off + block_len(&thumb.entries, 2);
            let mut entries = thumb.entries.clone();
            entries.push(Entry::long(THUMBNAIL_OFFSET, data_off as u32, order));
            entries.push(Entry::long(THUMBNAIL_LENGTH, thumb.data.len() as u32, order));
            write_ifd(&mut out, entries, 0, order);
            out.extend_from_slice(&thumb.data);
        }
        out
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn entries(&self, ifd: Ifd) -> &[Entry] {
        match ifd {
            Ifd::Primary => &self.primary,
            Ifd::Exif => &self.exif,
            Ifd::Gps => &self.gps,
            Ifd::Interop => &self.interop,
        }
    }

    fn entries_mut(&mut self, ifd: Ifd) -> &mut Vec<Entry> {
        match ifd {
            Ifd::Primary => &mut self.primary,
            Ifd::Exif => &mut self.exif,
            Ifd::Gps => &mut self.gps,
            Ifd::Interop => &mut self.interop,
        }
    }

    /// Number of entries across IFD0 and the sub-IFDs (thumbnail excluded).
    pub fn len(&self) -> usize {
        self.primary.len() + self.exif.len() + self.gps.len() + self.interop.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.thumbnail.is_none()
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }

    pub fn get(&self, def: &TagDef) -> Option<&Entry> {
        self.entries(def.ifd).iter().find(|e| e.tag == def.id)
    }

    /// Remove every entry for `def`; returns how many were removed.
    pub fn remove(&mut self, def: &TagDef) -> usize {
        let entries = self.entries_mut(def.ifd);
        let before = entries.len();
        entries.retain(|e| e.tag != def.id);
        before - entries.len()
    }

    /// Encode `value` according to the tag's kind and store it, replacing
    /// any existing entry for the same tag.
    pub fn set(&mut self, def: &TagDef, value: &str) -> Result<(), ExifError> {
        let entry = encode_value(def, value, self.order)?;
        self.remove(def);
        self.entries_mut(def.ifd).push(entry);
        Ok(())
    }

    /// The `Orientation` tag of IFD0, if present and numeric.
    pub fn orientation(&self) -> Option<u16> {
        self.primary
            .iter()
            .find(|e| e.tag == ORIENTATION)
            .and_then(|e| e.first_unsigned(self.order))
            .and_then(|v| u16::try_from(v).ok())
    }
}

fn parse_list<T: FromStr>(value: &str) -> Option<Vec<T>> {
    let items: Option<Vec<T>> = value
        .split(',')
        .map(|item| item.trim().parse().ok())
        .collect();
    items.filter(|v| !v.is_empty())
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Parse `n/d` or a decimal into a reduced fraction.
fn parse_fraction(item: &str) -> Option<(i64, i64)> {
    let item = item.trim();
    let (num, den) = match item.split_once('/') {
        Some((n, d)) => (n.trim().parse::<i64>().ok()?, d.trim().parse::<i64>().ok()?),
        None => {
            let x: f64 = item.parse().ok()?;
            if !x.is_finite() {
                return None;
            }
            if x.fract() == 0.0 {
                (x as i64, 1)
            } else {
                ((x * RATIONAL_DENOMINATOR).round() as i64, RATIONAL_DENOMINATOR as i64)
            }
        }
    };
    if den == 0 {
        return None;
    }
    let divisor = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i64;
    Some((num / divisor, den / divisor))
}

fn encode_value(def: &TagDef, value: &str, order: ByteOrder) -> Result<Entry, ExifError> {
    let invalid = |reason: &str| ExifError::InvalidValue {
        tag: def.name,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let entry = |field_type: u16, count: usize, data: Vec<u8>| Entry {
        tag: def.id,
        field_type,
        count: count as u32,
        data,
    };

    match def.kind {
        TagKind::Ascii => {
            if value.contains('\0') {
                return Err(invalid("text contains a NUL byte"));
            }
            let mut data = value.as_bytes().to_vec();
            data.push(0);
            Ok(entry(TYPE_ASCII, data.len(), data))
        }
        TagKind::Ucs2 => {
            let mut data: Vec<u8> = value.encode_utf16().flat_map(u16::to_le_bytes).collect();
            data.extend_from_slice(&[0, 0]);
            Ok(entry(TYPE_BYTE, data.len(), data))
        }
        TagKind::Comment => {
            let mut data = ASCII_COMMENT_HEADER.to_vec();
            data.extend_from_slice(value.as_bytes());
            Ok(entry(TYPE_UNDEFINED, data.len(), data))
        }
        TagKind::Undefined => {
            let data = value.as_bytes().to_vec();
            Ok(entry(TYPE_UNDEFINED, data.len(), data))
        }
        TagKind::Byte => {
            let data = parse_list::<u8>(value).ok_or_else(|| invalid("expected bytes 0-255"))?;
            Ok(entry(TYPE_BYTE, data.len(), data))
        }
        TagKind::Short => {
            let values = parse_list::<u16>(value)
                .ok_or_else(|| invalid("expected integers 0-65535"))?;
            let data = values.iter().flat_map(|v| order.u16_bytes(*v)).collect();
            Ok(entry(TYPE_SHORT, values.len(), data))
        }
        TagKind::Long => {
            let values =
                parse_list::<u32>(value).ok_or_else(|| invalid("expected unsigned integers"))?;
            let data = values.iter().flat_map(|v| order.u32_bytes(*v)).collect();
            Ok(entry(TYPE_LONG, values.len(), data))
        }
        TagKind::Rational => {
            let fractions = value
                .split(',')
                .map(|item| {
                    let (n, d) = parse_fraction(item)?;
                    Some((u32::try_from(n).ok()?, u32::try_from(d).ok()?))
                })
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("expected non-negative fractions like 72/1 or 2.8"))?;
            let data = fractions
                .iter()
                .flat_map(|(n, d)| order.u32_bytes(*n).into_iter().chain(order.u32_bytes(*d)))
                .collect();
            Ok(entry(TYPE_RATIONAL, fractions.len(), data))
        }
        TagKind::SRational => {
            let fractions = value
                .split(',')
                .map(|item| {
                    let (n, d) = parse_fraction(item)?;
                    Some((i32::try_from(n).ok()?, i32::try_from(d).ok()?))
                })
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("expected fractions like -1/3 or 0.5"))?;
            let data = fractions
                .iter()
                .flat_map(|(n, d)| {
                    order
                        .u32_bytes(*n as u32)
                        .into_iter()
                        .chain(order.u32_bytes(*d as u32))
                })
                .collect();
            Ok(entry(TYPE_SRATIONAL, fractions.len(), data))
        }
    }
}
