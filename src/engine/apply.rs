use std::path::Path;
use tracing::{debug, error, info};

use super::Engine;
use crate::codec;
use crate::error::{CapeError, Result};
use crate::model::{Cape, names};
use crate::provider::{CursorProvider, Registration};
use crate::state::Handedness;

/// Longest animation a provider accepts.
pub const MAX_FRAME_COUNT: u32 = 24;

impl<P: CursorProvider> Engine<P> {
    /// Resets, backs up, then registers every cursor of `cape`.
    ///
    /// Stops at the first failure. Cursors registered before it stay
    /// registered, and the applied-cape preference is left alone.
    pub fn apply_cape(&mut self, cape: &Cape) -> Result<()> {
        self.reset_all_cursors();
        self.backup_all_cursors();

        info!("Applying cape: {} {:.2}", cape.name(), cape.version());
        let lefty = self.state.handedness() == Handedness::Left;

        for cursor in cape.cursors() {
            debug!("Hooking for {}", cursor.identifier());
            let registration = Registration::from_cursor(cursor);
            let registration = if lefty && names::is_pointer(cursor.identifier()) {
                debug!("Mirroring {} for left hand", cursor.identifier());
                registration.mirrored()
            } else {
                registration
            };

            if let Err(e) = self.register_checked(cursor.identifier(), &registration) {
                error!("Failed to apply cursor {}: {}", cursor.identifier(), e);
                return Err(e);
            }
        }

        self.state.set_applied_cape(Some(cape.identifier()));
        info!("Applied {} successfully!", cape.name());
        Ok(())
    }

    /// Decodes the cape at `path` and applies it.
    pub fn apply_path(&mut self, path: &Path) -> Result<Cape> {
        let cape = codec::read_cape(path)?;
        self.apply_cape(&cape)?;
        Ok(cape)
    }

    /// Registers after checking the frame count is one the provider accepts.
    pub(super) fn register_checked(&mut self, name: &str, registration: &Registration) -> Result<()> {
        if !(1..=MAX_FRAME_COUNT).contains(&registration.frame_count) {
            return Err(CapeError::InvalidFrameCount {
                identifier: name.to_string(),
                frame_count: registration.frame_count,
            });
        }
        self.provider.register(name, registration)?;
        Ok(())
    }
}
