//! Cursor registration providers.
//!
//! The engine never talks to the OS directly; it drives a [`CursorProvider`],
//! which owns the live, process-wide table of registered cursors.

pub mod memory;
pub mod xcursor_theme;
mod xcursor_writer;

pub use crate::error::ProviderError;
pub use memory::{MemoryProvider, ProviderCall};
pub use xcursor_theme::XcursorThemeProvider;

use crate::model::{Bitmap, Cursor, Point, Scale, Size};

/// Everything a provider needs to display one cursor: a sprite sheet per
/// scale plus the shared geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub frames: Vec<Bitmap>,
    pub frame_count: u32,
    pub frame_duration: f64,
    pub size: Size,
    pub hot_spot: Point,
}

impl Registration {
    pub fn from_cursor(cursor: &Cursor) -> Self {
        Self {
            frames: cursor.representations().map(|(_, b)| b.clone()).collect(),
            frame_count: cursor.frame_count(),
            frame_duration: cursor.frame_duration(),
            size: cursor.size(),
            hot_spot: cursor.hot_spot(),
        }
    }

    /// Left-handed variant: hot spot reflected across the cursor width and
    /// every sheet flipped.
    pub fn mirrored(&self) -> Self {
        Self {
            frames: self.frames.iter().map(Bitmap::flipped_horizontally).collect(),
            hot_spot: Point::new(self.size.width - self.hot_spot.x - 1.0, self.hot_spot.y),
            ..self.clone()
        }
    }

    /// Rebuilds a cursor from a snapshot, guessing each sheet's scale from
    /// its width.
    pub fn into_cursor(self, identifier: &str) -> Cursor {
        let mut cursor = Cursor::with_identifier(identifier);
        cursor.set_frame_count(self.frame_count);
        cursor.set_frame_duration(self.frame_duration);
        cursor.set_hot_spot(self.hot_spot);
        for bitmap in self.frames {
            let ratio = if self.size.width > 0.0 {
                bitmap.width() as f64 / self.size.width
            } else {
                1.0
            };
            cursor.set_representation(Scale::from_factor(ratio), Some(bitmap));
        }
        cursor.set_size(self.size);
        cursor
    }
}

pub trait CursorProvider {
    fn is_registered(&self, name: &str) -> bool;

    fn register(&mut self, name: &str, registration: &Registration) -> Result<(), ProviderError>;

    fn unregister(&mut self, name: &str);

    fn scale(&self) -> f32;

    fn set_scale(&mut self, scale: f32) -> Result<(), ProviderError>;

    /// Reads back whatever is currently registered under `name`.
    fn snapshot(&self, name: &str) -> Option<Registration>;

    /// Drops every registration in the core cursor namespace.
    fn unregister_all_core(&mut self) -> Result<(), ProviderError>;

    /// Reinstates the system's own image for core cursor `index`.
    fn activate_core_cursor(&mut self, index: u32) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_mirrored_hot_spot() {
        let mut img = RgbaImage::new(10, 10);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let registration = Registration {
            frames: vec![Bitmap::new(img)],
            frame_count: 1,
            frame_duration: 1.0,
            size: Size::new(10.0, 10.0),
            hot_spot: Point::new(2.0, 3.0),
        };

        let mirrored = registration.mirrored();
        assert_eq!(mirrored.hot_spot, Point::new(7.0, 3.0));
        assert_eq!(mirrored.frames[0].image().get_pixel(9, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(mirrored.size, registration.size);
    }

    #[test]
    fn test_into_cursor_infers_scales() {
        let registration = Registration {
            frames: vec![
                Bitmap::new(RgbaImage::new(16, 32)),
                Bitmap::new(RgbaImage::new(32, 64)),
            ],
            frame_count: 2,
            frame_duration: 0.1,
            size: Size::new(16.0, 16.0),
            hot_spot: Point::new(1.0, 1.0),
        };
        let cursor = registration.into_cursor("com.apple.cursor.4");
        assert_eq!(cursor.representation_count(), 2);
        assert!(cursor.representation(Scale::X2).is_some());
        assert_eq!(cursor.size(), Size::new(16.0, 16.0));
    }
}
