use tracing::{debug, info, warn};

use super::Engine;
use crate::model::names;
use crate::provider::CursorProvider;

impl<P: CursorProvider> Engine<P> {
    /// Copies each default cursor to its backup name, once.
    ///
    /// Returns how many backups were made. An existing Arrow backup means a
    /// previous run already did this, so nothing is touched.
    pub fn backup_all_cursors(&mut self) -> usize {
        if self.provider.is_registered(&names::backup_name(names::ARROW)) {
            info!("Skipping backup, backup already exists");
            return 0;
        }

        names::DEFAULT_CURSORS
            .iter()
            .filter(|id| self.backup_cursor(id))
            .count()
    }

    fn backup_cursor(&mut self, identifier: &str) -> bool {
        let backup = names::backup_name(identifier);
        if !self.provider.is_registered(identifier) || self.provider.is_registered(&backup) {
            return false;
        }

        let Some(snapshot) = self.provider.snapshot(identifier) else {
            warn!("Could not read {} for backup", identifier);
            return false;
        };
        match self.register_checked(&backup, &snapshot) {
            Ok(()) => {
                debug!("Backed up {}", identifier);
                true
            }
            Err(e) => {
                warn!("Failed to back up {}: {}", identifier, e);
                false
            }
        }
    }
}
