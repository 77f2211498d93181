use tracing::{info, warn};

use super::Engine;
use crate::error::{CapeError, Result};
use crate::provider::CursorProvider;

/// Providers misbehave above this.
pub const MAX_SCALE: f32 = 32.0;

impl<P: CursorProvider> Engine<P> {
    pub fn scale(&self) -> f32 {
        self.provider.scale()
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<()> {
        if !(scale > 0.0 && scale <= MAX_SCALE) {
            warn!("Not setting cursor scale to {} because it is out of range", scale);
            return Err(CapeError::ScaleOutOfRange(scale));
        }
        self.provider.set_scale(scale)?;
        info!("Set cursor scale to {}", scale);
        Ok(())
    }

    /// Applies the scale stored in preferences.
    pub fn apply_default_scale(&mut self) -> Result<()> {
        let scale = self.state.default_cursor_scale();
        self.set_scale(scale)
    }
}
