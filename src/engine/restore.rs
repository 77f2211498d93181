use tracing::{debug, info, warn};

use super::Engine;
use crate::model::names;
use crate::provider::CursorProvider;

impl<P: CursorProvider> Engine<P> {
    /// Puts the system cursors back and forgets the applied cape.
    pub fn restore(&mut self) {
        self.reset_all_cursors();
        self.state.set_applied_cape(None);
    }

    /// Moves every backup back under its real name, then resets the core
    /// cursors. Failures are logged and skipped.
    pub fn reset_all_cursors(&mut self) {
        info!("Restoring cursors...");
        for identifier in names::DEFAULT_CURSORS {
            self.restore_cursor(identifier);
        }

        info!("Restoring core cursors...");
        match self.provider.unregister_all_core() {
            Ok(()) => {
                for index in 0..names::CORE_CURSOR_COUNT {
                    if let Err(e) = self.provider.activate_core_cursor(index) {
                        warn!("Could not reactivate core cursor {}: {}", index, e);
                    }
                }
                info!("Successfully restored all cursors.");
            }
            Err(e) => warn!("Received an error while restoring core cursors: {}", e),
        }
    }

    fn restore_cursor(&mut self, identifier: &str) {
        let backup = names::backup_name(identifier);
        if !self.provider.is_registered(&backup) {
            return;
        }

        match self.provider.snapshot(&backup) {
            Some(snapshot) => match self.register_checked(identifier, &snapshot) {
                Ok(()) => debug!("Restored {}", identifier),
                Err(e) => warn!("Failed to restore {}: {}", identifier, e),
            },
            None => warn!("Backup of {} could not be read", identifier),
        }
        self.provider.unregister(&backup);
    }
}
