use byteorder::{LittleEndian, WriteBytesExt};
use image::RgbaImage;
use std::io::Write;

use crate::model::cursor::premultiply;

const MAGIC: &[u8] = b"Xcur";
const VERSION: u32 = 0x0001_0000;
const CHUNK_IMAGE: u32 = 0xFFFD_0002;
const FILE_HEADER_SIZE: u32 = 16;
const IMAGE_HEADER_SIZE: u32 = 36;

/// One image chunk of an Xcursor file.
pub struct XcursorImage {
    pub image: RgbaImage,
    pub nominal: u32,
    pub hotspot: (u32, u32),
    /// Milliseconds this frame stays on screen.
    pub delay: u32,
}

pub fn to_x11(images: &[XcursorImage]) -> std::io::Result<Vec<u8>> {
    let mut output = Vec::new();

    output.write_all(MAGIC)?;
    output.write_u32::<LittleEndian>(FILE_HEADER_SIZE)?;
    output.write_u32::<LittleEndian>(VERSION)?;
    output.write_u32::<LittleEndian>(images.len() as u32)?;

    // table of contents: type, subtype (nominal size), absolute offset
    let mut offset = FILE_HEADER_SIZE as usize + images.len() * 12;
    for image in images {
        output.write_u32::<LittleEndian>(CHUNK_IMAGE)?;
        output.write_u32::<LittleEndian>(image.nominal)?;
        output.write_u32::<LittleEndian>(offset as u32)?;
        offset += IMAGE_HEADER_SIZE as usize + image.image.as_raw().len();
    }

    for image in images {
        let (width, height) = image.image.dimensions();
        output.write_u32::<LittleEndian>(IMAGE_HEADER_SIZE)?;
        output.write_u32::<LittleEndian>(CHUNK_IMAGE)?;
        output.write_u32::<LittleEndian>(image.nominal)?;
        output.write_u32::<LittleEndian>(1)?;
        output.write_u32::<LittleEndian>(width)?;
        output.write_u32::<LittleEndian>(height)?;
        output.write_u32::<LittleEndian>(image.hotspot.0.min(width.saturating_sub(1)))?;
        output.write_u32::<LittleEndian>(image.hotspot.1.min(height.saturating_sub(1)))?;
        output.write_u32::<LittleEndian>(image.delay)?;
        output.write_all(&premultiplied_bgra(&image.image))?;
    }

    Ok(output)
}

fn premultiplied_bgra(image: &RgbaImage) -> Vec<u8> {
    let mut result = Vec::with_capacity(image.as_raw().len());
    for pixel in image.pixels() {
        let [r, g, b, a] = premultiply(*pixel);
        result.extend_from_slice(&[b, g, r, a]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_premultiplied_bgra() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 128]));
        img.put_pixel(1, 0, Rgba([255, 0, 0, 255]));

        let result = premultiplied_bgra(&img);

        assert!(result[0] >= 127 && result[0] <= 128);
        assert_eq!(result[3], 128);
        assert_eq!(&result[4..8], &[0, 0, 255, 255]);
    }

    #[test]
    fn test_parses_back_with_xcursor() {
        let frames: Vec<XcursorImage> = (0..3)
            .map(|i| XcursorImage {
                image: RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255])),
                nominal: 8,
                hotspot: (2, 20),
                delay: 50 + i,
            })
            .collect();

        let bytes = to_x11(&frames).unwrap();
        assert_eq!(&bytes[0..4], b"Xcur");

        let parsed = xcursor::parser::parse_xcursor(&bytes).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].xhot, 2);
        // hot spot is clamped into the image
        assert_eq!(parsed[0].yhot, 7);
        assert_eq!(parsed[2].delay, 52);
    }
}
