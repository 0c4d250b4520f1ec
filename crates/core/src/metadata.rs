use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{Context, Field, In, Value};

use crate::attributes::RawValue;
use crate::error::Result;

/// Key under which GPS-IFD tags are nested.
pub const GPS_INFO_KEY: &str = "GPSInfo";

// Blobs such as MakerNote are summarized instead of stored.
const MAX_BLOB_LEN: usize = 1024;

// Containers kamadak-exif knows how to read.
const EXIF_CONTAINERS: &[&str] = &[
    "image/jpeg",
    "image/tiff",
    "image/png",
    "image/webp",
    "image/heif",
    "image/avif",
    "image/x-canon-cr2",
];

/// Source of per-file image attributes.
pub trait AttributeExtractor {
    /// Returns the file's tags. A file without metadata yields an empty map.
    fn extract(&self, path: &Path) -> Result<BTreeMap<String, RawValue>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

impl AttributeExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Result<BTreeMap<String, RawValue>> {
        let container = infer::get_from_path(path)?;
        if !container.is_some_and(|t| EXIF_CONTAINERS.contains(&t.mime_type())) {
            return Ok(BTreeMap::new());
        }

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        Ok(tags_from_fields(exif.fields()))
    }
}

/// Maps primary-image fields to named raw values, nesting GPS tags.
pub fn tags_from_fields<'a>(fields: impl IntoIterator<Item = &'a Field>) -> BTreeMap<String, RawValue> {
    let mut tags = BTreeMap::new();
    let mut gps = Vec::new();

    for field in fields {
        if field.ifd_num != In::PRIMARY {
            continue;
        }
        let name = field.tag.to_string();
        let value = raw_from_exif(&field.value);
        if field.tag.context() == Context::Gps {
            gps.push((name, value));
        } else {
            tags.insert(name, value);
        }
    }

    if !gps.is_empty() {
        tags.insert(GPS_INFO_KEY.to_string(), RawValue::Mapping(gps));
    }
    tags
}

fn raw_from_exif(value: &Value) -> RawValue {
    match value {
        Value::Byte(v) => collapse(v.iter().map(|b| RawValue::Integer(i64::from(*b)))),
        Value::SByte(v) => collapse(v.iter().map(|b| RawValue::Integer(i64::from(*b)))),
        Value::Short(v) => collapse(v.iter().map(|n| RawValue::Integer(i64::from(*n)))),
        Value::SShort(v) => collapse(v.iter().map(|n| RawValue::Integer(i64::from(*n)))),
        Value::Long(v) => collapse(v.iter().map(|n| RawValue::Integer(i64::from(*n)))),
        Value::SLong(v) => collapse(v.iter().map(|n| RawValue::Integer(i64::from(*n)))),
        Value::Rational(v) => collapse(v.iter().map(|r| RawValue::Rational {
            num: i64::from(r.num),
            den: i64::from(r.denom),
        })),
        Value::SRational(v) => collapse(v.iter().map(|r| RawValue::Rational {
            num: i64::from(r.num),
            den: i64::from(r.denom),
        })),
        Value::Float(v) => collapse(v.iter().map(|f| RawValue::Float(f64::from(*f)))),
        Value::Double(v) => collapse(v.iter().map(|f| RawValue::Float(*f))),
        Value::Ascii(lines) => collapse(lines.iter().map(|line| RawValue::Bytes(line.clone()))),
        Value::Undefined(bytes, _) if bytes.len() > MAX_BLOB_LEN => {
            RawValue::Other(format!("<{} bytes>", bytes.len()))
        }
        Value::Undefined(bytes, _) => RawValue::Bytes(bytes.clone()),
        other => RawValue::Other(format!("{other:?}")),
    }
}

fn collapse(values: impl Iterator<Item = RawValue>) -> RawValue {
    let mut values: Vec<RawValue> = values.collect();
    if values.len() == 1 {
        values.remove(0)
    } else {
        RawValue::Sequence(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::{Rational, Tag};
    use std::fs;
    use tempfile::TempDir;

    fn field(tag: Tag, ifd_num: In, value: Value) -> Field {
        Field { tag, ifd_num, value }
    }

    #[test]
    fn primary_fields_are_named_and_gps_is_nested() {
        let fields = vec![
            field(Tag::Model, In::PRIMARY, Value::Ascii(vec![b"EOS R6".to_vec()])),
            field(
                Tag::FNumber,
                In::PRIMARY,
                Value::Rational(vec![Rational { num: 28, denom: 10 }]),
            ),
            field(Tag::GPSLatitudeRef, In::PRIMARY, Value::Ascii(vec![b"N".to_vec()])),
            field(Tag::ImageWidth, In::THUMBNAIL, Value::Long(vec![160])),
        ];

        let tags = tags_from_fields(&fields);

        assert_eq!(tags["Model"], RawValue::Bytes(b"EOS R6".to_vec()));
        assert_eq!(tags["FNumber"], RawValue::Rational { num: 28, den: 10 });
        assert_eq!(
            tags[GPS_INFO_KEY],
            RawValue::Mapping(vec![("GPSLatitudeRef".to_string(), RawValue::Bytes(b"N".to_vec()))])
        );
        assert!(!tags.contains_key("ImageWidth"));
    }

    #[test]
    fn multi_valued_fields_stay_sequences() {
        let raw = raw_from_exif(&Value::Byte(vec![2, 3, 0, 0]));
        assert_eq!(
            raw,
            RawValue::Sequence(vec![
                RawValue::Integer(2),
                RawValue::Integer(3),
                RawValue::Integer(0),
                RawValue::Integer(0),
            ])
        );
    }

    #[test]
    fn large_undefined_blobs_are_summarized() {
        let raw = raw_from_exif(&Value::Undefined(vec![7; 4096], 0));
        assert_eq!(raw, RawValue::Other("<4096 bytes>".to_string()));
    }

    #[test]
    fn jpeg_without_exif_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.jpg");
        fs::write(&path, [0xff, 0xd8, 0xff, 0xd9]).unwrap();

        let tags = ExifExtractor.extract(&path).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn unrecognized_content_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.jpg");
        fs::write(&path, b"not really a picture").unwrap();

        assert!(ExifExtractor.extract(&path).unwrap().is_empty());
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(ExifExtractor.extract(&dir.path().join("gone.jpg")).is_err());
    }
}
