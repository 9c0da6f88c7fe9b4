//! Fixed EXIF tag-name table.
//!
//! Names follow the CamelCase spelling used by the EXIF 2.3 standard
//! (`Artist`, `DateTimeOriginal`, `GPSLatitude`). Lookups by name go through
//! [`normalize_tag_name`], so `date_time_original`, `DateTimeOriginal` and
//! `datetimeoriginal` all resolve to the same entry.

/// The IFD a tag lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ifd {
    /// IFD0, the primary image directory.
    Primary,
    /// The Exif sub-IFD (pointer tag 0x8769).
    Exif,
    /// The GPS sub-IFD (pointer tag 0x8825).
    Gps,
    /// The interoperability sub-IFD (pointer tag 0xA005 inside the Exif IFD).
    Interop,
}

/// How a textual value is encoded for a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SRational,
    Undefined,
    /// `UserComment`: UNDEFINED with an 8-byte character-code header.
    Comment,
    /// Windows `XP*` tags: UTF-16LE stored as BYTE.
    Ucs2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDef {
    pub id: u16,
    pub name: &'static str,
    pub ifd: Ifd,
    pub kind: TagKind,
}

const fn tag(id: u16, name: &'static str, ifd: Ifd, kind: TagKind) -> TagDef {
    TagDef { id, name, ifd, kind }
}

use Ifd::{Exif, Gps, Primary};
use TagKind::*;

pub const TAGS: &[TagDef] = &[
    // IFD0
    tag(0x010E, "ImageDescription", Primary, Ascii),
    tag(0x010F, "Make", Primary, Ascii),
    tag(0x0110, "Model", Primary, Ascii),
    tag(0x0112, "Orientation", Primary, Short),
    tag(0x011A, "XResolution", Primary, Rational),
    tag(0x011B, "YResolution", Primary, Rational),
    tag(0x0128, "ResolutionUnit", Primary, Short),
    tag(0x0131, "Software", Primary, Ascii),
    tag(0x0132, "DateTime", Primary, Ascii),
    tag(0x013B, "Artist", Primary, Ascii),
    tag(0x013E, "WhitePoint", Primary, Rational),
    tag(0x013F, "PrimaryChromaticities", Primary, Rational),
    tag(0x0211, "YCbCrCoefficients", Primary, Rational),
    tag(0x0213, "YCbCrPositioning", Primary, Short),
    tag(0x0214, "ReferenceBlackWhite", Primary, Rational),
    tag(0x4746, "Rating", Primary, Short),
    tag(0x4749, "RatingPercent", Primary, Short),
    tag(0x8298, "Copyright", Primary, Ascii),
    tag(0x9C9B, "XPTitle", Primary, Ucs2),
    tag(0x9C9C, "XPComment", Primary, Ucs2),
    tag(0x9C9D, "XPAuthor", Primary, Ucs2),
    tag(0x9C9E, "XPKeywords", Primary, Ucs2),
    tag(0x9C9F, "XPSubject", Primary, Ucs2),
    // Exif sub-IFD
    tag(0x829A, "ExposureTime", Exif, Rational),
    tag(0x829D, "FNumber", Exif, Rational),
    tag(0x8822, "ExposureProgram", Exif, Short),
    tag(0x8824, "SpectralSensitivity", Exif, Ascii),
    tag(0x8827, "ISOSpeedRatings", Exif, Short),
    tag(0x8830, "SensitivityType", Exif, Short),
    tag(0x9000, "ExifVersion", Exif, Undefined),
    tag(0x9003, "DateTimeOriginal", Exif, Ascii),
    tag(0x9004, "DateTimeDigitized", Exif, Ascii),
    tag(0x9010, "OffsetTime", Exif, Ascii),
    tag(0x9011, "OffsetTimeOriginal", Exif, Ascii),
    tag(0x9012, "OffsetTimeDigitized", Exif, Ascii),
    tag(0x9101, "ComponentsConfiguration", Exif, Undefined),
    tag(0x9102, "CompressedBitsPerPixel", Exif, Rational),
    tag(0x9201, "ShutterSpeedValue", Exif, SRational),
    tag(0x9202, "ApertureValue", Exif, Rational),
    tag(0x9203, "BrightnessValue", Exif, SRational),
    tag(0x9204, "ExposureBiasValue", Exif, SRational),
    tag(0x9205, "MaxApertureValue", Exif, Rational),
    tag(0x9206, "SubjectDistance", Exif, Rational),
    tag(0x9207, "MeteringMode", Exif, Short),
    tag(0x9208, "LightSource", Exif, Short),
    tag(0x9209, "Flash", Exif, Short),
    tag(0x920A, "FocalLength", Exif, Rational),
    tag(0x927C, "MakerNote", Exif, Undefined),
    tag(0x9286, "UserComment", Exif, Comment),
    tag(0x9290, "SubsecTime", Exif, Ascii),
    tag(0x9291, "SubsecTimeOriginal", Exif, Ascii),
    tag(0x9292, "SubsecTimeDigitized", Exif, Ascii),
    tag(0xA000, "FlashPixVersion", Exif, Undefined),
    tag(0xA001, "ColorSpace", Exif, Short),
    tag(0xA002, "ExifImageWidth", Exif, Long),
    tag(0xA003, "ExifImageHeight", Exif, Long),
    tag(0xA004, "RelatedSoundFile", Exif, Ascii),
    tag(0xA20E, "FocalPlaneXResolution", Exif, Rational),
    tag(0xA20F, "FocalPlaneYResolution", Exif, Rational),
    tag(0xA210, "FocalPlaneResolutionUnit", Exif, Short),
    tag(0xA215, "ExposureIndex", Exif, Rational),
    tag(0xA217, "SensingMethod", Exif, Short),
    tag(0xA300, "FileSource", Exif, Undefined),
    tag(0xA301, "SceneType", Exif, Undefined),
    tag(0xA401, "CustomRendered", Exif, Short),
    tag(0xA402, "ExposureMode", Exif, Short),
    tag(0xA403, "WhiteBalance", Exif, Short),
    tag(0xA404, "DigitalZoomRatio", Exif, Rational),
    tag(0xA405, "FocalLengthIn35mmFilm", Exif, Short),
    tag(0xA406, "SceneCaptureType", Exif, Short),
    tag(0xA407, "GainControl", Exif, Short),
    tag(0xA408, "Contrast", Exif, Short),
    tag(0xA409, "Saturation", Exif, Short),
    tag(0xA40A, "Sharpness", Exif, Short),
    tag(0xA40C, "SubjectDistanceRange", Exif, Short),
    tag(0xA420, "ImageUniqueID", Exif, Ascii),
    tag(0xA430, "CameraOwnerName", Exif, Ascii),
    tag(0xA431, "BodySerialNumber", Exif, Ascii),
    tag(0xA432, "LensSpecification", Exif, Rational),
    tag(0xA433, "LensMake", Exif, Ascii),
    tag(0xA434, "LensModel", Exif, Ascii),
    tag(0xA435, "LensSerialNumber", Exif, Ascii),
    // GPS sub-IFD
    tag(0x0000, "GPSVersionID", Gps, Byte),
    tag(0x0001, "GPSLatitudeRef", Gps, Ascii),
    tag(0x0002, "GPSLatitude", Gps, Rational),
    tag(0x0003, "GPSLongitudeRef", Gps, Ascii),
    tag(0x0004, "GPSLongitude", Gps, Rational),
    tag(0x0005, "GPSAltitudeRef", Gps, Byte),
    tag(0x0006, "GPSAltitude", Gps, Rational),
    tag(0x0007, "GPSTimeStamp", Gps, Rational),
    tag(0x0008, "GPSSatellites", Gps, Ascii),
    tag(0x0009, "GPSStatus", Gps, Ascii),
    tag(0x000A, "GPSMeasureMode", Gps, Ascii),
    tag(0x000B, "GPSDOP", Gps, Rational),
    tag(0x000C, "GPSSpeedRef", Gps, Ascii),
    tag(0x000D, "GPSSpeed", Gps, Rational),
    tag(0x0010, "GPSImgDirectionRef", Gps, Ascii),
    tag(0x0011, "GPSImgDirection", Gps, Rational),
    tag(0x0012, "GPSMapDatum", Gps, Ascii),
    tag(0x001B, "GPSProcessingMethod", Gps, Undefined),
    tag(0x001D, "GPSDateStamp", Gps, Ascii),
];

/// Lowercase and drop underscores: `Date_Time` and `datetime` normalize alike.
pub fn normalize_tag_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Reverse lookup of a human-readable tag name.
pub fn resolve_tag_name(name: &str) -> Option<&'static TagDef> {
    let wanted = normalize_tag_name(name);
    TAGS.iter()
        .find(|def| def.name.to_ascii_lowercase() == wanted)
}

/// Look a tag up by id within one IFD (ids are only unique per IFD).
pub fn tag_by_id(ifd: Ifd, id: u16) -> Option<&'static TagDef> {
    TAGS.iter().find(|def| def.ifd == ifd && def.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolve_is_case_and_underscore_insensitive() {
        for name in ["Artist", "artist", "ARTIST", "ar_tist"] {
            assert_eq!(resolve_tag_name(name).unwrap().id, 0x013B, "{name}");
        }
        assert_eq!(
            resolve_tag_name("date_time_original").unwrap().name,
            "DateTimeOriginal"
        );
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        assert!(resolve_tag_name("NotARealTag").is_none());
        assert!(resolve_tag_name("").is_none());
    }

    #[test]
    fn gps_ids_are_scoped_to_their_ifd() {
        let lat_ref = tag_by_id(Ifd::Gps, 0x0001).unwrap();
        assert_eq!(lat_ref.name, "GPSLatitudeRef");
        assert!(tag_by_id(Ifd::Primary, 0x0001).is_none());
    }

    #[test]
    fn names_are_unique_after_normalization() {
        let mut seen = HashSet::new();
        for def in TAGS {
            assert!(seen.insert(normalize_tag_name(def.name)), "{}", def.name);
        }
    }

    #[test]
    fn ids_are_unique_per_ifd() {
        let mut seen = HashSet::new();
        for def in TAGS {
            assert!(seen.insert((def.ifd, def.id)), "{}", def.name);
        }
    }
}
