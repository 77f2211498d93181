//! Cape file format.
//!
//! A cape is a property-list dictionary. `MinimumVersion` is the oldest
//! reader that may open the file, `Version` is the writer's format. XML and
//! binary plists are both accepted on read; XML is written.

use plist::{Dictionary, Value};
use std::fs;
use std::io::Cursor as IoCursor;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{CapeError, DecodeError};
use crate::model::cape::default_author;
use crate::model::{Bitmap, Cape, CapeMetadata, Cursor, Point, Scale, Size};

/// Format written by this build.
pub const CREATOR_VERSION: f64 = 2.0;
/// Newest format this build can read.
pub const PARSER_VERSION: f64 = 2.0;

pub const EXTENSION: &str = "cape";

pub(crate) mod keys {
    pub const MINIMUM_VERSION: &str = "MinimumVersion";
    pub const VERSION: &str = "Version";
    pub const CAPE_NAME: &str = "CapeName";
    pub const CAPE_VERSION: &str = "CapeVersion";
    pub const CLOUD: &str = "Cloud";
    pub const AUTHOR: &str = "Author";
    pub const HIDPI: &str = "HiDPI";
    pub const IDENTIFIER: &str = "Identifier";
    pub const CURSORS: &str = "Cursors";

    pub const FRAME_COUNT: &str = "FrameCount";
    pub const FRAME_DURATION: &str = "FrameDuration";
    pub const HOT_SPOT_X: &str = "HotSpotX";
    pub const HOT_SPOT_Y: &str = "HotSpotY";
    pub const POINTS_WIDE: &str = "PointsWide";
    pub const POINTS_HIGH: &str = "PointsHigh";
    pub const REPRESENTATIONS: &str = "Representations";
}

pub fn decode(bytes: &[u8]) -> Result<Cape, DecodeError> {
    let value = Value::from_reader(IoCursor::new(bytes))
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    decode_value(&value)
}

pub fn decode_value(value: &Value) -> Result<Cape, DecodeError> {
    let dict = value
        .as_dictionary()
        .ok_or_else(|| DecodeError::Malformed("top level is not a dictionary".to_string()))?;

    let identifier = dict
        .get(keys::IDENTIFIER)
        .and_then(Value::as_string)
        .ok_or(DecodeError::MissingIdentifier)?;

    let minimum = number(dict.get(keys::MINIMUM_VERSION)).unwrap_or(0.0);
    if minimum > PARSER_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            minimum,
            supported: PARSER_VERSION,
        });
    }
    let format_version = number(dict.get(keys::VERSION)).unwrap_or(0.0);

    let meta = CapeMetadata {
        name: string(dict.get(keys::CAPE_NAME)).unwrap_or_else(|| "Unnamed".to_string()),
        author: string(dict.get(keys::AUTHOR)).unwrap_or_else(default_author),
        identifier: identifier.to_string(),
        version: number(dict.get(keys::CAPE_VERSION)).unwrap_or(1.0),
        hidpi: flag(dict.get(keys::HIDPI)),
        in_cloud: flag(dict.get(keys::CLOUD)),
    };

    let mut cursors = Vec::new();
    if let Some(entries) = dict.get(keys::CURSORS).and_then(Value::as_dictionary) {
        for (key, entry) in entries {
            match entry
                .as_dictionary()
                .and_then(|d| decode_cursor(key, d, format_version))
            {
                Some(cursor) => cursors.push(cursor),
                None => warn!("Skipping malformed cursor {} in {}", key, identifier),
            }
        }
    }

    debug!("Decoded cape {} with {} cursors", identifier, cursors.len());
    Ok(Cape::from_parts(meta, cursors))
}

fn decode_cursor(identifier: &str, dict: &Dictionary, format_version: f64) -> Option<Cursor> {
    if format_version < 2.0 {
        return None;
    }

    let frame_count = number(dict.get(keys::FRAME_COUNT))?;
    let frame_duration = number(dict.get(keys::FRAME_DURATION))?;
    let hot_x = number(dict.get(keys::HOT_SPOT_X))?;
    let hot_y = number(dict.get(keys::HOT_SPOT_Y))?;
    let points_wide = number(dict.get(keys::POINTS_WIDE))?;
    let points_high = number(dict.get(keys::POINTS_HIGH))?;
    let blobs = dict.get(keys::REPRESENTATIONS)?.as_array()?;

    let mut cursor = Cursor::with_identifier(identifier);
    cursor.set_frame_count(frame_count.max(0.0) as u32);
    cursor.set_frame_duration(frame_duration);
    cursor.set_hot_spot(Point::new(hot_x, hot_y));

    for blob in blobs {
        let Some(data) = blob.as_data() else {
            continue;
        };
        let bitmap = match Bitmap::from_bytes(data) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                debug!("Dropping undecodable representation of {}: {}", identifier, e);
                continue;
            }
        };
        let ratio = if points_wide > 0.0 {
            bitmap.width() as f64 / points_wide
        } else {
            1.0
        };
        cursor.set_representation(Scale::from_factor(ratio), Some(bitmap));
    }

    // stored geometry wins over whatever the first sheet implied
    cursor.set_size(Size::new(points_wide, points_high));
    Some(cursor)
}

/// Builds the property list for `cape`. Fails if any representation cannot
/// be encoded as PNG.
pub fn to_value(cape: &Cape) -> image::ImageResult<Value> {
    let mut dict = Dictionary::new();
    dict.insert(keys::MINIMUM_VERSION.into(), Value::Real(PARSER_VERSION));
    dict.insert(keys::VERSION.into(), Value::Real(CREATOR_VERSION));
    dict.insert(keys::CAPE_NAME.into(), Value::String(cape.name().to_string()));
    dict.insert(keys::CAPE_VERSION.into(), Value::Real(cape.version()));
    dict.insert(keys::CLOUD.into(), Value::Boolean(cape.is_in_cloud()));
    dict.insert(keys::AUTHOR.into(), Value::String(cape.author().to_string()));
    dict.insert(keys::HIDPI.into(), Value::Boolean(cape.is_hidpi()));
    dict.insert(keys::IDENTIFIER.into(), Value::String(cape.identifier().to_string()));

    let mut cursors = Dictionary::new();
    for cursor in cape.cursors() {
        cursors.insert(cursor.identifier().to_string(), Value::Dictionary(encode_cursor(cursor)?));
    }
    dict.insert(keys::CURSORS.into(), Value::Dictionary(cursors));

    Ok(Value::Dictionary(dict))
}

fn encode_cursor(cursor: &Cursor) -> image::ImageResult<Dictionary> {
    let mut dict = Dictionary::new();
    dict.insert(keys::FRAME_COUNT.into(), Value::Integer(u64::from(cursor.frame_count()).into()));
    dict.insert(keys::FRAME_DURATION.into(), Value::Real(cursor.frame_duration()));
    dict.insert(keys::HOT_SPOT_X.into(), Value::Real(cursor.hot_spot().x));
    dict.insert(keys::HOT_SPOT_Y.into(), Value::Real(cursor.hot_spot().y));
    dict.insert(keys::POINTS_WIDE.into(), Value::Real(cursor.size().width));
    dict.insert(keys::POINTS_HIGH.into(), Value::Real(cursor.size().height));

    let mut blobs = Vec::new();
    for (scale, bitmap) in cursor.representations() {
        let png = bitmap.to_png().inspect_err(|e| {
            warn!(
                "Could not encode {}x representation of {}: {}",
                scale.factor(),
                cursor.identifier(),
                e
            )
        })?;
        blobs.push(Value::Data(png));
    }
    dict.insert(keys::REPRESENTATIONS.into(), Value::Array(blobs));
    Ok(dict)
}

/// Serializes `cape` as an XML property list.
pub fn encode(cape: &Cape) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    to_value(cape)
        .map_err(std::io::Error::other)?
        .to_writer_xml(&mut buf)
        .map_err(std::io::Error::other)?;
    Ok(buf)
}

/// Reads and decodes a cape file, remembering where it came from.
pub fn read_cape(path: &Path) -> Result<Cape, DecodeError> {
    let bytes = fs::read(path)?;
    let mut cape = decode(&bytes)?;
    cape.set_file_path(Some(path.to_path_buf()));
    Ok(cape)
}

pub fn check_unique_identifiers(cape: &Cape) -> Result<(), CapeError> {
    let names = cape.duplicate_identifiers();
    if names.is_empty() {
        Ok(())
    } else {
        Err(CapeError::DuplicateIdentifiers { names })
    }
}

/// Writes `cape` to `path`. Nothing is written when two cursors share an
/// identifier, since only one of them could survive in the file.
pub fn write_cape(cape: &Cape, path: &Path) -> Result<(), CapeError> {
    check_unique_identifiers(cape)?;

    let write_failure = |source| CapeError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };
    let bytes = encode(cape).map_err(write_failure)?;
    fs::write(path, bytes).map_err(write_failure)?;
    debug!("Wrote cape {} to {}", cape.identifier(), path.display());
    Ok(())
}

pub(crate) fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Real(r) => Some(*r),
        Value::Integer(i) => i
            .as_signed()
            .map(|v| v as f64)
            .or_else(|| i.as_unsigned().map(|v| v as f64)),
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_string).map(str::to_string)
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Boolean(b)) => *b,
        other => number(other).is_some_and(|n| n != 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sheet(points: u32, frames: u32, scale: Scale, seed: u8) -> Bitmap {
        let factor = scale.factor() as u32;
        let width = points * factor;
        let height = points * factor * frames;
        Bitmap::new(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([seed, (x % 256) as u8, (y % 256) as u8, 255])
        }))
    }

    fn sample_cape(cursor_count: usize) -> Cape {
        let mut cursors = Vec::new();
        for i in 0..cursor_count {
            let frames = (i % 4) as u32 + 1;
            let mut cursor = Cursor::with_identifier(format!("com.apple.cursor.{}", i));
            cursor.set_frame_count(frames);
            cursor.set_frame_duration(0.05 * (i + 1) as f64);
            cursor.set_hot_spot(Point::new((i % 7) as f64, 2.5));
            let scale_count = i % 4 + 1;
            for scale in Scale::SUPPORTED.iter().take(scale_count) {
                cursor.set_representation(*scale, Some(sheet(4, frames, *scale, i as u8)));
            }
            cursors.push(cursor);
        }
        let mut meta = CapeMetadata::new("Round Trip", "tester", "local.tester.RoundTrip");
        meta.version = 1.5;
        meta.hidpi = true;
        Cape::from_parts(meta, cursors)
    }

    #[test]
    fn test_round_trip_preserves_cape() {
        for count in [1, 7, 50] {
            let cape = sample_cape(count);
            let bytes = encode(&cape).unwrap();
            let decoded = decode(&bytes).unwrap();
            assert_eq!(decoded, cape, "cape with {} cursors", count);

            for original in cape.cursors() {
                let (_, copy) = decoded
                    .cursors_with_identifier(original.identifier())
                    .next()
                    .unwrap();
                assert_eq!(copy.representation_count(), original.representation_count());
                for (scale, bitmap) in original.representations() {
                    assert_eq!(copy.representation(scale), Some(bitmap));
                }
            }
        }
    }

    #[test]
    fn test_rejects_newer_minimum_version() {
        let mut dict = to_value(&sample_cape(2)).unwrap().into_dictionary().unwrap();
        dict.insert(keys::MINIMUM_VERSION.into(), Value::Real(3.0));
        let mut bytes = Vec::new();
        Value::Dictionary(dict).to_writer_xml(&mut bytes).unwrap();

        match decode(&bytes) {
            Err(DecodeError::UnsupportedVersion { minimum, supported }) => {
                assert_eq!(minimum, 3.0);
                assert_eq!(supported, PARSER_VERSION);
            }
            other => panic!("expected version error, got {:?}", other.map(|c| c.cursor_count())),
        }
    }

    #[test]
    fn test_missing_identifier() {
        let mut dict = to_value(&sample_cape(1)).unwrap().into_dictionary().unwrap();
        dict.remove(keys::IDENTIFIER);
        let mut bytes = Vec::new();
        Value::Dictionary(dict).to_writer_xml(&mut bytes).unwrap();
        assert!(matches!(decode(&bytes), Err(DecodeError::MissingIdentifier)));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(decode(b"not a plist"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_malformed_cursor_is_skipped() {
        let mut dict = to_value(&sample_cape(3)).unwrap().into_dictionary().unwrap();
        let cursors = dict
            .get_mut(keys::CURSORS)
            .and_then(Value::as_dictionary_mut)
            .unwrap();
        cursors
            .get_mut("com.apple.cursor.1")
            .and_then(Value::as_dictionary_mut)
            .unwrap()
            .remove(keys::FRAME_COUNT);
        let mut bytes = Vec::new();
        Value::Dictionary(dict).to_writer_xml(&mut bytes).unwrap();

        let cape = decode(&bytes).unwrap();
        assert_eq!(cape.cursor_count(), 2);
        assert!(cape.cursors_with_identifier("com.apple.cursor.1").next().is_none());
    }

    #[test]
    fn test_old_cursor_format_is_skipped() {
        let mut dict = to_value(&sample_cape(2)).unwrap().into_dictionary().unwrap();
        dict.insert(keys::VERSION.into(), Value::Real(1.0));
        let mut bytes = Vec::new();
        Value::Dictionary(dict).to_writer_xml(&mut bytes).unwrap();

        let cape = decode(&bytes).unwrap();
        assert_eq!(cape.cursor_count(), 0);
        assert_eq!(cape.identifier(), "local.tester.RoundTrip");
    }

    #[test]
    fn test_unrecognised_scale_is_dropped() {
        let mut cursor = Cursor::with_identifier(crate::model::names::ARROW);
        cursor.set_representation(Scale::X1, Some(sheet(4, 1, Scale::X1, 0)));
        let cape = Cape::from_parts(CapeMetadata::new("S", "a", "local.a.S"), vec![cursor]);

        let mut dict = to_value(&cape).unwrap().into_dictionary().unwrap();
        let entry = dict
            .get_mut(keys::CURSORS)
            .and_then(Value::as_dictionary_mut)
            .and_then(|c| c.get_mut(crate::model::names::ARROW))
            .and_then(Value::as_dictionary_mut)
            .unwrap();
        let odd = Bitmap::new(RgbaImage::new(12, 12)).to_png().unwrap();
        entry
            .get_mut(keys::REPRESENTATIONS)
            .and_then(Value::as_array_mut)
            .unwrap()
            .push(Value::Data(odd));
        let mut bytes = Vec::new();
        Value::Dictionary(dict).to_writer_xml(&mut bytes).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.cursors()[0].representation_count(), 1);
    }

    #[test]
    fn test_binary_plist_is_accepted() {
        let cape = sample_cape(2);
        let mut bytes = Vec::new();
        to_value(&cape).unwrap().to_writer_binary(&mut bytes).unwrap();
        assert_eq!(decode(&bytes).unwrap(), cape);
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.tester.RoundTrip.cape");
        let cape = sample_cape(3);
        write_cape(&cape, &path).unwrap();

        let loaded = read_cape(&path).unwrap();
        assert_eq!(loaded, cape);
        assert_eq!(loaded.file_path(), Some(path.as_path()));
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.cape");
        let err = write_cape(&sample_cape(1), &path).unwrap_err();
        assert!(matches!(err, CapeError::WriteFailure { .. }));
        assert_eq!(err.title(), "Save failed");
    }

    #[test]
    fn test_duplicate_identifiers_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dupes.cape");
        let mut cape = sample_cape(2);
        let mut twin = Cursor::with_identifier("com.apple.cursor.0");
        twin.set_representation(Scale::X1, Some(sheet(4, 1, Scale::X1, 9)));
        cape.add_cursor(twin);

        let err = write_cape(&cape, &path).unwrap_err();
        match err {
            CapeError::DuplicateIdentifiers { names } => assert_eq!(names, vec!["com.apple.cursor.0"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_unencodable_representation_fails_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.cape");
        let mut cursor = Cursor::with_identifier("com.apple.cursor.0");
        cursor.set_representation(Scale::X1, Some(Bitmap::new(RgbaImage::new(0, 0))));
        let cape = Cape::from_parts(CapeMetadata::new("Empty", "a", "local.a.Empty"), vec![cursor]);

        assert!(to_value(&cape).is_err());
        let err = write_cape(&cape, &path).unwrap_err();
        assert!(matches!(err, CapeError::WriteFailure { .. }));
        assert!(!path.exists());
    }
}
