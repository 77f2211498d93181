use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::cursor::Cursor;
use super::edit::{CapeEdit, CursorEdit};
use super::names;

/// Descriptive fields of a cape, kept apart so importers can pass defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CapeMetadata {
    pub name: String,
    pub author: String,
    pub identifier: String,
    pub version: f64,
    pub hidpi: bool,
    pub in_cloud: bool,
}

impl CapeMetadata {
    pub fn new(name: impl Into<String>, author: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: author.into(),
            identifier: identifier.into(),
            version: 1.0,
            hidpi: false,
            in_cloud: false,
        }
    }
}

pub fn default_author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Unknown".to_string())
}

pub fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A named, versioned collection of cursors plus its edit history.
#[derive(Debug, Clone)]
pub struct Cape {
    meta: CapeMetadata,
    file_path: Option<PathBuf>,
    cursors: Vec<Cursor>,
    change_count: u64,
    last_change_count: u64,
    undo_stack: Vec<CapeEdit>,
    redo_stack: Vec<CapeEdit>,
}

impl Cape {
    /// A fresh, empty cape named "Unnamed" by `author`.
    pub fn new(author: impl Into<String>) -> Self {
        let author = author.into();
        let identifier = format!("local.{}.Unnamed.{}", author, timestamp());
        Self::from_parts(CapeMetadata::new("Unnamed", author, identifier), Vec::new())
    }

    /// Builds a clean (unmodified) cape without recording any edits.
    pub fn from_parts(meta: CapeMetadata, cursors: Vec<Cursor>) -> Self {
        Self {
            meta,
            file_path: None,
            cursors,
            change_count: 0,
            last_change_count: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    /// Copy with a timestamped identifier and no file or history.
    pub fn duplicate(&self) -> Cape {
        let mut meta = self.meta.clone();
        meta.identifier = format!("{}.{}", meta.identifier, timestamp());
        Self::from_parts(meta, self.cursors.clone())
    }

    pub fn metadata(&self) -> &CapeMetadata {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn author(&self) -> &str {
        &self.meta.author
    }

    pub fn identifier(&self) -> &str {
        &self.meta.identifier
    }

    pub fn version(&self) -> f64 {
        self.meta.version
    }

    pub fn is_hidpi(&self) -> bool {
        self.meta.hidpi
    }

    pub fn is_in_cloud(&self) -> bool {
        self.meta.in_cloud
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn set_file_path(&mut self, path: Option<PathBuf>) {
        self.file_path = path;
    }

    /// Changes the identifier without recording an edit; used when the
    /// library has to disambiguate an incoming cape.
    pub(crate) fn reassign_identifier(&mut self, identifier: String) {
        self.meta.identifier = identifier;
    }

    pub fn set_in_cloud(&mut self, in_cloud: bool) {
        self.meta.in_cloud = in_cloud;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.perform(CapeEdit::Name(name.into()));
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.perform(CapeEdit::Author(author.into()));
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.perform(CapeEdit::Identifier(identifier.into()));
    }

    pub fn set_version(&mut self, version: f64) {
        self.perform(CapeEdit::Version(version));
    }

    pub fn set_hidpi(&mut self, hidpi: bool) {
        self.perform(CapeEdit::HiDpi(hidpi));
    }

    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    pub fn cursor(&self, index: usize) -> Option<&Cursor> {
        self.cursors.get(index)
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn cursors_with_identifier<'a>(
        &'a self,
        identifier: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Cursor)> + 'a {
        self.cursors
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.identifier() == identifier)
    }

    /// Appends `cursor` and returns its index.
    pub fn add_cursor(&mut self, cursor: Cursor) -> usize {
        let index = self.cursors.len();
        self.perform(CapeEdit::InsertCursor { index, cursor });
        index
    }

    pub fn remove_cursor(&mut self, index: usize) -> Option<Cursor> {
        let cursor = self.cursors.get(index)?.clone();
        self.perform(CapeEdit::RemoveCursor { index });
        Some(cursor)
    }

    /// Removes every cursor stored under `identifier`, returning how many went.
    pub fn remove_cursors_with_identifier(&mut self, identifier: &str) -> usize {
        let mut removed = 0;
        while let Some(index) = self.cursors.iter().position(|c| c.identifier() == identifier) {
            self.perform(CapeEdit::RemoveCursor { index });
            removed += 1;
        }
        removed
    }

    pub fn edit_cursor(&mut self, index: usize, edit: CursorEdit) -> bool {
        if index >= self.cursors.len() {
            return false;
        }
        self.perform(CapeEdit::Cursor { index, edit });
        true
    }

    /// Display names of identifiers held by more than one cursor.
    pub fn duplicate_identifiers(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for cursor in &self.cursors {
            *counts.entry(cursor.identifier()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| match names::name_for_identifier(id) {
                "Unknown" => id.to_string(),
                name => name.to_string(),
            })
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.change_count != self.last_change_count
    }

    pub fn change_count(&self) -> u64 {
        self.change_count
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(edit) = self.undo_stack.pop() else {
            return false;
        };
        let inverse = self.apply_edit(edit);
        self.redo_stack.push(inverse);
        self.change_count = self.change_count.saturating_sub(1);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(edit) = self.redo_stack.pop() else {
            return false;
        };
        let inverse = self.apply_edit(edit);
        self.undo_stack.push(inverse);
        self.change_count += 1;
        true
    }

    /// Marks the current state as the saved one.
    pub fn mark_saved(&mut self) {
        self.last_change_count = self.change_count;
    }

    /// Walks the history back (or forward) to the last saved state.
    pub fn revert_to_saved(&mut self) {
        loop {
            let moved = if self.change_count > self.last_change_count {
                self.undo()
            } else if self.change_count < self.last_change_count {
                self.redo()
            } else {
                break;
            };
            if !moved {
                break;
            }
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.change_count = 0;
        self.last_change_count = 0;
    }

    fn perform(&mut self, edit: CapeEdit) {
        let inverse = self.apply_edit(edit);
        self.undo_stack.push(inverse);
        self.redo_stack.clear();
        self.change_count += 1;
    }

    fn apply_edit(&mut self, edit: CapeEdit) -> CapeEdit {
        match edit {
            CapeEdit::Name(name) => CapeEdit::Name(std::mem::replace(&mut self.meta.name, name)),
            CapeEdit::Author(author) => {
                CapeEdit::Author(std::mem::replace(&mut self.meta.author, author))
            }
            CapeEdit::Identifier(identifier) => {
                CapeEdit::Identifier(std::mem::replace(&mut self.meta.identifier, identifier))
            }
            CapeEdit::Version(version) => {
                CapeEdit::Version(std::mem::replace(&mut self.meta.version, version))
            }
            CapeEdit::HiDpi(hidpi) => CapeEdit::HiDpi(std::mem::replace(&mut self.meta.hidpi, hidpi)),
            CapeEdit::InsertCursor { index, cursor } => {
                let index = index.min(self.cursors.len());
                self.cursors.insert(index, cursor);
                CapeEdit::RemoveCursor { index }
            }
            CapeEdit::RemoveCursor { index } => {
                let cursor = self.cursors.remove(index);
                CapeEdit::InsertCursor { index, cursor }
            }
            CapeEdit::Cursor { index, edit } => {
                let edit = edit.apply(&mut self.cursors[index]);
                CapeEdit::Cursor { index, edit }
            }
        }
    }
}

/// Metadata equal and the same cursors, in any order.
impl PartialEq for Cape {
    fn eq(&self, other: &Self) -> bool {
        if self.meta != other.meta || self.cursors.len() != other.cursors.len() {
            return false;
        }
        let mut unmatched: Vec<&Cursor> = other.cursors.iter().collect();
        self.cursors.iter().all(|cursor| {
            match unmatched.iter().position(|c| *c == cursor) {
                Some(i) => {
                    unmatched.swap_remove(i);
                    true
                }
                None => false,
            }
        })
    }
}
