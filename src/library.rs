//! The cape library: one `.cape` file per cape in a fixed directory, plus the
//! record of which cape is applied.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::codec;
use crate::engine::Engine;
use crate::error::{CapeError, Result};
use crate::model::{Cape, CapeMetadata, cape};
use crate::pipeline::{convert, fs_ops};
use crate::provider::CursorProvider;

/// Change notifications for front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    CapeAdded(String),
    CapeRemoved(String),
    AppliedCapeChanged(Option<String>),
}

pub struct Library<P> {
    directory: PathBuf,
    trash_directory: PathBuf,
    capes: BTreeMap<String, Cape>,
    applied: Option<String>,
    engine: Engine<P>,
    subscribers: Vec<Sender<LibraryEvent>>,
}

impl<P: CursorProvider> Library<P> {
    /// Loads every readable cape in `directory`, creating it if needed.
    /// Files that fail to decode are logged and skipped.
    pub fn load(
        directory: impl Into<PathBuf>,
        trash_directory: impl Into<PathBuf>,
        engine: Engine<P>,
    ) -> Result<Self> {
        let directory = directory.into();
        fs_ops::ensure_dir(&directory)?;

        let mut library = Self {
            directory,
            trash_directory: trash_directory.into(),
            capes: BTreeMap::new(),
            applied: None,
            engine,
            subscribers: Vec::new(),
        };

        let mut paths: Vec<PathBuf> = fs::read_dir(&library.directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == codec::EXTENSION))
            .collect();
        paths.sort();

        for path in paths {
            match codec::read_cape(&path) {
                Ok(cape) => {
                    if library.capes.contains_key(cape.identifier()) {
                        warn!(
                            "Skipping {}: identifier {} is already loaded",
                            path.display(),
                            cape.identifier()
                        );
                        continue;
                    }
                    debug!("Loaded {}", path.display());
                    library.capes.insert(cape.identifier().to_string(), cape);
                }
                Err(e) => warn!("Skipping unreadable cape {}: {}", path.display(), e),
            }
        }

        library.applied = library
            .engine
            .state()
            .applied_cape()
            .filter(|id| library.capes.contains_key(*id))
            .map(str::to_string);

        info!("Loaded {} capes from {}", library.capes.len(), library.directory.display());
        Ok(library)
    }

    pub fn subscribe(&mut self) -> Receiver<LibraryEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: LibraryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the cape with `identifier` is stored. The identifier itself is
    /// only kept inside the file; the file name is a sanitized copy that
    /// always stays inside the library directory.
    pub fn url_for_cape(&self, identifier: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", file_stem_for(identifier), codec::EXTENSION))
    }

    /// All capes, by name then author, ignoring case.
    pub fn capes(&self) -> Vec<&Cape> {
        let mut capes: Vec<&Cape> = self.capes.values().collect();
        capes.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.author().to_lowercase().cmp(&b.author().to_lowercase()))
        });
        capes
    }

    pub fn capes_with_identifier(&self, identifier: &str) -> Vec<&Cape> {
        self.capes.get(identifier).into_iter().collect()
    }

    pub fn get(&self, identifier: &str) -> Option<&Cape> {
        self.capes.get(identifier)
    }

    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut Cape> {
        self.capes.get_mut(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.capes.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.capes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capes.is_empty()
    }

    pub fn applied(&self) -> Option<&Cape> {
        self.applied.as_deref().and_then(|id| self.capes.get(id))
    }

    pub fn applied_identifier(&self) -> Option<&str> {
        self.applied.as_deref()
    }

    pub fn engine(&self) -> &Engine<P> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<P> {
        &mut self.engine
    }

    /// Writes `cape` into the library and adds it.
    ///
    /// A colliding identifier gets a unique suffix. Nothing is added when the
    /// file cannot be written.
    pub fn import(&mut self, mut cape: Cape) -> Result<String> {
        // two identifiers may sanitize to the same file name
        if self.capes.contains_key(cape.identifier()) || self.url_for_cape(cape.identifier()).exists()
        {
            let unique = format!("{}.{}", cape.identifier(), uuid::Uuid::new_v4());
            info!("Identifier {} is taken, importing as {}", cape.identifier(), unique);
            cape.reassign_identifier(unique);
        }

        let identifier = cape.identifier().to_string();
        let path = self.url_for_cape(&identifier);
        codec::write_cape(&cape, &path)?;

        cape.set_file_path(Some(path));
        cape.mark_saved();
        self.capes.insert(identifier.clone(), cape);
        self.emit(LibraryEvent::CapeAdded(identifier.clone()));
        Ok(identifier)
    }

    pub fn import_path(&mut self, path: &Path) -> Result<String> {
        let cape = codec::read_cape(path)?;
        self.import(cape)
    }

    /// Converts a MightyMouse cursor file and imports the result.
    pub fn create_from_mighty_mouse(&mut self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Imported")
            .to_string();
        let identifier = format!("local.import.{}.{}", name, cape::timestamp());
        let meta = CapeMetadata::new(name, "Unknown", identifier);

        let cape = convert::cape_from_mighty_mouse(&bytes, meta)?;
        self.import(cape)
    }

    /// Removes a cape, restoring the system cursors first when it is applied.
    /// Returns where the file went in the trash.
    pub fn remove(&mut self, identifier: &str) -> Result<Option<PathBuf>> {
        let path = match self.capes.get(identifier) {
            Some(cape) => cape.file_path().map(Path::to_path_buf),
            None => return Err(CapeError::UnknownCape(identifier.to_string())),
        };

        if self.applied.as_deref() == Some(identifier) {
            self.restore();
        }

        let trashed = match path {
            Some(path) if path.exists() => {
                Some(fs_ops::move_to_trash(&path, &self.trash_directory)?)
            }
            _ => None,
        };

        self.capes.remove(identifier);
        info!("Removed cape {}", identifier);
        self.emit(LibraryEvent::CapeRemoved(identifier.to_string()));
        Ok(trashed)
    }

    pub fn apply(&mut self, identifier: &str) -> Result<()> {
        let cape = self
            .capes
            .get(identifier)
            .ok_or_else(|| CapeError::UnknownCape(identifier.to_string()))?;
        self.engine.apply_cape(cape)?;

        self.applied = Some(identifier.to_string());
        self.emit(LibraryEvent::AppliedCapeChanged(self.applied.clone()));
        Ok(())
    }

    pub fn restore(&mut self) {
        self.engine.restore();
        self.applied = None;
        self.emit(LibraryEvent::AppliedCapeChanged(None));
    }

    /// Writes a cape back to disk.
    ///
    /// Refuses, without writing, when two cursors share an identifier. A cape
    /// whose identifier changed is moved to its new path.
    pub fn save(&mut self, key: &str) -> Result<()> {
        let cape = self
            .capes
            .get(key)
            .ok_or_else(|| CapeError::UnknownCape(key.to_string()))?;

        let duplicates = cape.duplicate_identifiers();
        if !duplicates.is_empty() {
            return Err(CapeError::DuplicateIdentifiers { names: duplicates });
        }

        let identifier = cape.identifier().to_string();
        if identifier != key && self.capes.contains_key(&identifier) {
            return Err(CapeError::IdentifierInUse(identifier));
        }

        let path = self.url_for_cape(&identifier);
        let path_owner = self
            .capes
            .iter()
            .find(|(id, other)| id.as_str() != key && other.file_path() == Some(path.as_path()));
        if path_owner.is_some() {
            return Err(CapeError::IdentifierInUse(identifier));
        }
        codec::write_cape(cape, &path)?;

        let Some(mut cape) = self.capes.remove(key) else {
            return Err(CapeError::UnknownCape(key.to_string()));
        };
        if let Some(old) = cape.file_path().filter(|old| *old != path) {
            if let Err(e) = fs_ops::remove_if_exists(old) {
                warn!("Could not remove old file {}: {}", old.display(), e);
            }
        }
        cape.set_file_path(Some(path));
        cape.mark_saved();
        self.capes.insert(identifier.clone(), cape);

        if identifier != key {
            info!("Cape {} is now {}", key, identifier);
            self.emit(LibraryEvent::CapeRemoved(key.to_string()));
            self.emit(LibraryEvent::CapeAdded(identifier.clone()));
            if self.applied.as_deref() == Some(key) {
                self.applied = Some(identifier.clone());
                self.engine.state_mut().set_applied_cape(Some(&identifier));
                self.emit(LibraryEvent::AppliedCapeChanged(Some(identifier)));
            }
        }
        Ok(())
    }

    /// Dumps the live cursors into a new library cape.
    pub fn dump<F>(&mut self, progress: F) -> Result<Option<String>>
    where
        F: FnMut(usize, usize) -> bool,
    {
        let Some(cape) = self.engine.dump(progress)? else {
            return Ok(None);
        };

        let scratch = tempfile::Builder::new()
            .suffix(&format!(".{}", codec::EXTENSION))
            .tempfile()?;
        codec::write_cape(&cape, scratch.path())?;
        self.import_path(scratch.path()).map(Some)
    }
}

/// Turns an identifier into a single, non-hidden path component.
fn file_stem_for(identifier: &str) -> String {
    let stem: String = identifier
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.starts_with('.') {
        format!("_{}", stem)
    } else {
        stem
    }
}
