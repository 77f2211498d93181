//! Drives a [`CursorProvider`] to apply, back up and restore capes.
//!
//! None of this is internally synchronized. The provider's table is global
//! state, so callers must not run two engine operations at once.

mod apply;
mod backup;
mod dump;
mod restore;
mod scale;

pub use apply::MAX_FRAME_COUNT;
pub use dump::{DUMP_IDENTIFIER, dump_cursors};
pub use scale::MAX_SCALE;

use crate::provider::CursorProvider;
use crate::state::SystemState;

pub struct Engine<P> {
    provider: P,
    state: SystemState,
}

impl<P: CursorProvider> Engine<P> {
    pub fn new(provider: P, state: SystemState) -> Self {
        Self { provider, state }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SystemState {
        &mut self.state
    }
}
