//! Reversible edits.
//!
//! Applying an edit returns the edit that undoes it, so undo and redo are the
//! same operation run on opposite stacks.

use super::cursor::{Bitmap, Cursor, Point, Scale, Size};

#[derive(Debug, Clone)]
pub enum CursorEdit {
    Identifier(String),
    FrameCount(u32),
    FrameDuration(f64),
    Size(Size),
    HotSpot(Point),
    Representation(Scale, Option<Bitmap>),
    Batch(Vec<CursorEdit>),
}

impl CursorEdit {
    pub(crate) fn apply(self, cursor: &mut Cursor) -> CursorEdit {
        match self {
            CursorEdit::Identifier(identifier) => {
                let old = cursor.identifier().to_string();
                cursor.set_identifier(identifier);
                CursorEdit::Identifier(old)
            }
            CursorEdit::FrameCount(count) => {
                let old = cursor.frame_count();
                cursor.set_frame_count(count);
                CursorEdit::FrameCount(old)
            }
            CursorEdit::FrameDuration(duration) => {
                let old = cursor.frame_duration();
                cursor.set_frame_duration(duration);
                CursorEdit::FrameDuration(old)
            }
            CursorEdit::Size(size) => {
                let old = cursor.size();
                cursor.set_size(size);
                CursorEdit::Size(old)
            }
            CursorEdit::HotSpot(point) => {
                let old = cursor.hot_spot();
                cursor.set_hot_spot(point);
                CursorEdit::HotSpot(old)
            }
            CursorEdit::Representation(scale, bitmap) => {
                // the first sheet may also resize the cursor
                let old_size = cursor.size();
                let old = cursor.set_representation(scale, bitmap);
                if cursor.size() != old_size {
                    CursorEdit::Batch(vec![
                        CursorEdit::Size(old_size),
                        CursorEdit::Representation(scale, old),
                    ])
                } else {
                    CursorEdit::Representation(scale, old)
                }
            }
            CursorEdit::Batch(edits) => {
                let mut inverse: Vec<CursorEdit> =
                    edits.into_iter().map(|e| e.apply(cursor)).collect();
                inverse.reverse();
                CursorEdit::Batch(inverse)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum CapeEdit {
    Name(String),
    Author(String),
    Identifier(String),
    Version(f64),
    HiDpi(bool),
    InsertCursor { index: usize, cursor: Cursor },
    RemoveCursor { index: usize },
    Cursor { index: usize, edit: CursorEdit },
}
