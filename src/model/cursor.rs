use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::io::Cursor as IoCursor;

use super::names;

/// Display scale a representation was drawn for.
///
/// `None` is the sentinel for ratios that match no supported scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scale {
    None,
    X1,
    X2,
    X5,
    X10,
}

impl Scale {
    pub const SUPPORTED: [Scale; 4] = [Scale::X1, Scale::X2, Scale::X5, Scale::X10];

    /// Scale in hundredths, as used by the legacy representation keys.
    pub fn raw(self) -> u32 {
        match self {
            Scale::None => 0,
            Scale::X1 => 100,
            Scale::X2 => 200,
            Scale::X5 => 500,
            Scale::X10 => 1000,
        }
    }

    pub fn factor(self) -> f64 {
        self.raw() as f64 / 100.0
    }

    /// Rounds `factor` to the nearest whole scale and maps it to a supported
    /// scale; anything else is `Scale::None`.
    pub fn from_factor(factor: f64) -> Scale {
        if !factor.is_finite() || factor <= 0.0 {
            return Scale::None;
        }
        match factor.round() as u32 {
            1 => Scale::X1,
            2 => Scale::X2,
            5 => Scale::X5,
            10 => Scale::X10,
            _ => Scale::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }
}

/// One sprite sheet: every frame of a cursor at a single scale, stacked
/// vertically with frame 0 on top.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decodes any image format the `image` crate understands (PNG, TIFF, ...).
    pub fn from_bytes(data: &[u8]) -> image::ImageResult<Self> {
        Ok(Self::new(image::load_from_memory(data)?.to_rgba8()))
    }

    pub fn to_png(&self) -> image::ImageResult<Vec<u8>> {
        let mut buf = IoCursor::new(Vec::new());
        self.image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn flipped_horizontally(&self) -> Bitmap {
        Bitmap::new(image::imageops::flip_horizontal(&self.image))
    }

    /// Splits the sheet into `frame_count` equally tall frames.
    pub fn split_frames(&self, frame_count: u32) -> Vec<RgbaImage> {
        let frame_count = frame_count.max(1);
        let frame_height = self.height() / frame_count;
        if frame_height == 0 {
            return vec![self.image.clone()];
        }
        (0..frame_count)
            .map(|i| {
                image::imageops::crop_imm(&self.image, 0, i * frame_height, self.width(), frame_height)
                    .to_image()
            })
            .collect()
    }

    /// Stacks frames vertically. All frames must share a width.
    pub fn compose(frames: &[Bitmap]) -> Option<Bitmap> {
        let first = frames.first()?;
        let width = first.width();
        if frames.iter().any(|f| f.width() != width) {
            tracing::warn!("Can't create representation from images of different widths");
            return None;
        }

        let total_height = frames.iter().map(Bitmap::height).sum();
        let mut sheet = RgbaImage::new(width, total_height);
        let mut y = 0;
        for frame in frames {
            image::imageops::replace(&mut sheet, &frame.image, 0, y as i64);
            y += frame.height();
        }
        Some(Bitmap::new(sheet))
    }
}

pub(crate) fn premultiply(pixel: Rgba<u8>) -> [u8; 4] {
    let a = pixel[3] as f64;
    let factor = a / 255.0;
    [
        (pixel[0] as f64 * factor) as u8,
        (pixel[1] as f64 * factor) as u8,
        (pixel[2] as f64 * factor) as u8,
        a as u8,
    ]
}

pub(crate) fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> Rgba<u8> {
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let factor = 255.0 / a as f64;
    Rgba([
        (r as f64 * factor).min(255.0) as u8,
        (g as f64 * factor).min(255.0) as u8,
        (b as f64 * factor).min(255.0) as u8,
        a,
    ])
}

/// One animated cursor with a sprite sheet per display scale.
#[derive(Debug, Clone)]
pub struct Cursor {
    identifier: String,
    frame_count: u32,
    frame_duration: f64,
    hot_spot: Point,
    size: Size,
    representations: BTreeMap<Scale, Bitmap>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            identifier: names::generate_identifier(),
            frame_count: 1,
            frame_duration: 1.0,
            hot_spot: Point::default(),
            size: Size::default(),
            representations: BTreeMap::new(),
        }
    }

    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::new()
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &'static str {
        names::name_for_identifier(&self.identifier)
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    pub fn hot_spot(&self) -> Point {
        self.hot_spot
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = identifier.into();
    }

    pub fn set_frame_count(&mut self, frame_count: u32) {
        self.frame_count = frame_count;
    }

    pub fn set_frame_duration(&mut self, frame_duration: f64) {
        self.frame_duration = frame_duration;
    }

    pub fn set_hot_spot(&mut self, hot_spot: Point) {
        self.hot_spot = hot_spot;
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    pub fn representation(&self, scale: Scale) -> Option<&Bitmap> {
        self.representations.get(&scale)
    }

    /// Representations in ascending scale order.
    pub fn representations(&self) -> impl Iterator<Item = (Scale, &Bitmap)> {
        self.representations.iter().map(|(s, b)| (*s, b))
    }

    pub fn representation_count(&self) -> usize {
        self.representations.len()
    }

    /// Stores (or with `None`, removes) the sheet for `scale` and returns the
    /// one it replaced.
    ///
    /// The first sheet stored on an empty cursor sets the logical size.
    pub fn set_representation(&mut self, scale: Scale, bitmap: Option<Bitmap>) -> Option<Bitmap> {
        let Some(bitmap) = bitmap else {
            return self.representations.remove(&scale);
        };
        if scale == Scale::None {
            tracing::debug!(
                "Dropping representation of {} with no recognised scale",
                self.identifier
            );
            return None;
        }

        if self.representations.is_empty() {
            let factor = scale.factor();
            let size = Size::new(
                bitmap.width() as f64 / factor,
                bitmap.height() as f64 / self.frame_count.max(1) as f64 / factor,
            );
            if !size.is_zero() {
                self.size = size;
            }
        }
        self.representations.insert(scale, bitmap)
    }

    pub fn remove_representation(&mut self, scale: Scale) -> Option<Bitmap> {
        self.set_representation(scale, None)
    }

    /// Appends `frame` below the existing sheet for `scale`, growing the frame
    /// count when the sheet now holds more frames.
    pub fn add_frame(&mut self, scale: Scale, frame: Bitmap) -> bool {
        let sheet = match self.representation(scale) {
            Some(existing) => match Bitmap::compose(&[existing.clone(), frame]) {
                Some(sheet) => sheet,
                None => return false,
            },
            None => frame,
        };

        let frame_height = self.size.height * scale.factor();
        let total_frames = if frame_height > 0.0 {
            (sheet.height() as f64 / frame_height).round() as u32
        } else {
            1
        };
        if self.frame_count < total_frames {
            self.frame_count = total_frames;
        }
        self.set_representation(scale, Some(sheet));
        true
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.frame_count == other.frame_count
            && self.frame_duration == other.frame_duration
            && self.size == other.size
            && self.hot_spot == other.hot_spot
            && self.identifier == other.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(width: u32, height: u32, shade: u8) -> Bitmap {
        Bitmap::new(RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255])))
    }

    #[test]
    fn test_scale_from_factor() {
        assert_eq!(Scale::from_factor(1.0), Scale::X1);
        assert_eq!(Scale::from_factor(2.04), Scale::X2);
        assert_eq!(Scale::from_factor(5.0), Scale::X5);
        assert_eq!(Scale::from_factor(10.0), Scale::X10);
        assert_eq!(Scale::from_factor(3.0), Scale::None);
        assert_eq!(Scale::from_factor(0.0), Scale::None);
        assert_eq!(Scale::from_factor(f64::NAN), Scale::None);
    }

    #[test]
    fn test_first_representation_sets_size() {
        let mut cursor = Cursor::new();
        cursor.set_frame_count(2);
        cursor.set_representation(Scale::X2, Some(sheet(64, 128, 10)));
        assert_eq!(cursor.size(), Size::new(32.0, 32.0));

        // later sheets leave the size alone
        cursor.set_representation(Scale::X1, Some(sheet(10, 10, 10)));
        assert_eq!(cursor.size(), Size::new(32.0, 32.0));
        assert_eq!(cursor.representation_count(), 2);
    }

    #[test]
    fn test_one_representation_per_scale() {
        let mut cursor = Cursor::new();
        assert!(cursor.set_representation(Scale::X1, Some(sheet(16, 16, 1))).is_none());
        let previous = cursor.set_representation(Scale::X1, Some(sheet(16, 16, 2)));
        assert_eq!(previous, Some(sheet(16, 16, 1)));
        assert_eq!(cursor.representation_count(), 1);
    }

    #[test]
    fn test_none_scale_is_not_stored() {
        let mut cursor = Cursor::new();
        cursor.set_representation(Scale::None, Some(sheet(16, 16, 1)));
        assert_eq!(cursor.representation_count(), 0);
    }

    #[test]
    fn test_add_frame_grows_frame_count() {
        let mut cursor = Cursor::new();
        cursor.set_representation(Scale::X1, Some(sheet(16, 16, 1)));
        assert!(cursor.add_frame(Scale::X1, sheet(16, 16, 2)));
        assert_eq!(cursor.frame_count(), 2);
        assert_eq!(cursor.representation(Scale::X1).unwrap().height(), 32);

        assert!(!cursor.add_frame(Scale::X1, sheet(8, 16, 3)));
    }

    #[test]
    fn test_split_and_flip() {
        let mut img = RgbaImage::new(2, 4);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(0, 2, Rgba([0, 255, 0, 255]));
        let bitmap = Bitmap::new(img);

        let frames = bitmap.split_frames(2);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].get_pixel(0, 0), &Rgba([0, 255, 0, 255]));

        let flipped = bitmap.flipped_horizontally();
        assert_eq!(flipped.image().get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(flipped.image().get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_equality_ignores_representations() {
        let mut a = Cursor::with_identifier("com.apple.coregraphics.Arrow");
        let b = a.clone();
        a.set_representation(Scale::X1, Some(sheet(4, 4, 0)));
        assert_eq!(a.size(), Size::new(4.0, 4.0));

        let mut b = b;
        b.set_size(Size::new(4.0, 4.0));
        assert_eq!(a, b);

        b.set_hot_spot(Point::new(1.0, 1.0));
        assert_ne!(a, b);
    }
}
