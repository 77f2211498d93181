// Legacy MightyMouse cursor files.
//
// Layout: Cursors.Global.Identifiers maps a cursor identifier to a
// "Custom Key", and Cursors."Cursor Data" maps that key to a raw bitmap
// (32-bit, alpha first, big endian, premultiplied) plus its geometry.

use byteorder::{BigEndian, ReadBytesExt};
use image::RgbaImage;
use plist::{Dictionary, Value};
use std::io::Cursor as IoCursor;
use tracing::{debug, warn};

use crate::codec::number;
use crate::error::{CapeError, Result};
use crate::model::cursor::unpremultiply;
use crate::model::{Bitmap, Cape, CapeMetadata, Cursor, Point, Scale, Size};

struct RawCursor<'a> {
    bits_per_pixel: u32,
    bits_per_sample: u32,
    bytes_per_row: usize,
    samples_per_pixel: u32,
    data: &'a [u8],
    frame_count: u32,
    frame_duration: f64,
    hot_spot: Point,
    pixels_wide: u32,
    pixels_high: u32,
}

impl<'a> RawCursor<'a> {
    fn parse(dict: &'a Dictionary) -> Option<Self> {
        let int = |key: &str| number(dict.get(key)).map(|n| n.max(0.0) as u32);
        Some(Self {
            bits_per_pixel: int("BitsPerPixel")?,
            bits_per_sample: int("BitsPerSample")?,
            bytes_per_row: int("BytesPerRow")? as usize,
            data: dict.get("CursorData")?.as_data()?,
            samples_per_pixel: int("SamplesPerPixel")?,
            frame_count: int("FrameCount")?,
            frame_duration: number(dict.get("FrameDuration"))?,
            hot_spot: Point::new(number(dict.get("HotspotX"))?, number(dict.get("HotspotY"))?),
            pixels_wide: int("PixelsWide")?,
            pixels_high: int("PixelsHigh")?,
        })
    }

    /// Decodes the ARGB rows into an RGBA sheet of every frame.
    fn to_sheet(&self) -> Option<Bitmap> {
        if self.bits_per_pixel != 32 || self.bits_per_sample != 8 || self.samples_per_pixel != 4 {
            return None;
        }
        let height = self.pixels_high.checked_mul(self.frame_count.max(1))?;
        let row_len = self.pixels_wide as usize * 4;
        if self.bytes_per_row < row_len || self.data.len() < self.bytes_per_row * height as usize {
            return None;
        }

        let mut sheet = RgbaImage::new(self.pixels_wide, height);
        for y in 0..height {
            let start = y as usize * self.bytes_per_row;
            let mut row = IoCursor::new(&self.data[start..start + row_len]);
            for x in 0..self.pixels_wide {
                let argb = row.read_u32::<BigEndian>().ok()?;
                let [a, r, g, b] = argb.to_be_bytes();
                sheet.put_pixel(x, y, unpremultiply(r, g, b, a));
            }
        }
        Some(Bitmap::new(sheet))
    }

    fn into_cursor(self, identifier: &str) -> Option<Cursor> {
        let sheet = self.to_sheet()?;
        let mut cursor = Cursor::with_identifier(identifier);
        cursor.set_frame_count(self.frame_count);
        cursor.set_frame_duration(self.frame_duration);
        cursor.set_hot_spot(self.hot_spot);
        cursor.set_representation(Scale::X1, Some(sheet));
        cursor.set_size(Size::new(self.pixels_wide as f64, self.pixels_high as f64));
        Some(cursor)
    }
}

/// Converts a MightyMouse property list into a cape described by `meta`.
/// Entries missing any required field are skipped.
pub fn cape_from_mighty_mouse(bytes: &[u8], meta: CapeMetadata) -> Result<Cape> {
    let unrecognized =
        || CapeError::InvalidCape("Mighty Mouse format either invalid or unrecognized.".to_string());

    let root = Value::from_reader(IoCursor::new(bytes)).map_err(|_| unrecognized())?;
    let cursors = root
        .as_dictionary()
        .and_then(|d| d.get("Cursors"))
        .and_then(Value::as_dictionary)
        .ok_or_else(unrecognized)?;
    let identifiers = cursors
        .get("Global")
        .and_then(Value::as_dictionary)
        .and_then(|g| g.get("Identifiers"))
        .and_then(Value::as_dictionary)
        .ok_or_else(unrecognized)?;
    let cursor_data = cursors
        .get("Cursor Data")
        .and_then(Value::as_dictionary)
        .ok_or_else(unrecognized)?;

    let mut converted = Vec::new();
    for (identifier, info) in identifiers {
        debug!("Converting cursor: {}", identifier);
        let Some(data) = info
            .as_dictionary()
            .and_then(|i| i.get("Custom Key"))
            .and_then(Value::as_string)
            .and_then(|key| cursor_data.get(key))
            .and_then(Value::as_dictionary)
        else {
            warn!("No cursor data for {}", identifier);
            continue;
        };

        match RawCursor::parse(data).and_then(|raw| raw.into_cursor(identifier)) {
            Some(cursor) => converted.push(cursor),
            None => warn!("Skipping unreadable cursor {}", identifier),
        }
    }

    if converted.is_empty() {
        return Err(CapeError::InvalidCape("No cursors to convert in file.".to_string()));
    }
    Ok(Cape::from_parts(meta, converted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn entry(wide: u32, high: u32, frames: u32) -> Value {
        let mut data = Vec::new();
        for _ in 0..(wide * high * frames) {
            // opaque red, ARGB big endian
            data.extend_from_slice(&[255, 255, 0, 0]);
        }
        let mut dict = Dictionary::new();
        dict.insert("BitsPerPixel".into(), Value::Integer(32u64.into()));
        dict.insert("BitsPerSample".into(), Value::Integer(8u64.into()));
        dict.insert("BytesPerRow".into(), Value::Integer(u64::from(wide * 4).into()));
        dict.insert("SamplesPerPixel".into(), Value::Integer(4u64.into()));
        dict.insert("CursorData".into(), Value::Data(data));
        dict.insert("FrameCount".into(), Value::Integer(u64::from(frames).into()));
        dict.insert("FrameDuration".into(), Value::Real(0.2));
        dict.insert("HotspotX".into(), Value::Real(1.0));
        dict.insert("HotspotY".into(), Value::Real(2.0));
        dict.insert("PixelsWide".into(), Value::Integer(u64::from(wide).into()));
        dict.insert("PixelsHigh".into(), Value::Integer(u64::from(high).into()));
        Value::Dictionary(dict)
    }

    fn mighty_mouse(entries: Vec<(&str, &str, Value)>) -> Vec<u8> {
        let mut identifiers = Dictionary::new();
        let mut data = Dictionary::new();
        for (identifier, key, value) in entries {
            let mut info = Dictionary::new();
            info.insert("Custom Key".into(), Value::String(key.to_string()));
            identifiers.insert(identifier.to_string(), Value::Dictionary(info));
            data.insert(key.to_string(), value);
        }
        let mut global = Dictionary::new();
        global.insert("Identifiers".into(), Value::Dictionary(identifiers));
        let mut cursors = Dictionary::new();
        cursors.insert("Global".into(), Value::Dictionary(global));
        cursors.insert("Cursor Data".into(), Value::Dictionary(data));
        let mut root = Dictionary::new();
        root.insert("Cursors".into(), Value::Dictionary(cursors));

        let mut bytes = Vec::new();
        Value::Dictionary(root).to_writer_xml(&mut bytes).unwrap();
        bytes
    }

    fn meta() -> CapeMetadata {
        CapeMetadata::new("Mouse", "Unknown", "local.import.Mouse.1")
    }

    #[test]
    fn test_converts_raw_bitmap() {
        let bytes = mighty_mouse(vec![("com.apple.coregraphics.Arrow", "k1", entry(4, 4, 2))]);
        let cape = cape_from_mighty_mouse(&bytes, meta()).unwrap();

        assert_eq!(cape.identifier(), "local.import.Mouse.1");
        let cursor = &cape.cursors()[0];
        assert_eq!(cursor.frame_count(), 2);
        assert_eq!(cursor.size(), Size::new(4.0, 4.0));
        assert_eq!(cursor.hot_spot(), Point::new(1.0, 2.0));
        let sheet = cursor.representation(Scale::X1).unwrap();
        assert_eq!((sheet.width(), sheet.height()), (4, 8));
        assert_eq!(sheet.image().get_pixel(3, 7), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_incomplete_entries_are_skipped() {
        let mut broken = entry(4, 4, 1).into_dictionary().unwrap();
        broken.remove("PixelsHigh");
        let bytes = mighty_mouse(vec![
            ("com.apple.coregraphics.Arrow", "k1", entry(4, 4, 1)),
            ("com.apple.coregraphics.IBeam", "k2", Value::Dictionary(broken)),
        ]);
        let cape = cape_from_mighty_mouse(&bytes, meta()).unwrap();
        assert_eq!(cape.cursor_count(), 1);
    }

    #[test]
    fn test_nothing_to_convert() {
        let bytes = mighty_mouse(vec![]);
        let err = cape_from_mighty_mouse(&bytes, meta()).unwrap_err();
        assert_eq!(err.to_string(), "No cursors to convert in file.");

        let err = cape_from_mighty_mouse(b"junk", meta()).unwrap_err();
        assert_eq!(err.title(), "Failed to create cape file");
    }
}
