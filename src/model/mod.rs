pub mod cape;
pub mod cursor;
pub mod edit;
pub mod names;

pub use cape::{Cape, CapeMetadata};
pub use cursor::{Bitmap, Cursor, Point, Scale, Size};
pub use edit::{CapeEdit, CursorEdit};
