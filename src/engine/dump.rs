use tracing::{info, warn};

use super::Engine;
use crate::error::Result;
use crate::model::{Cape, CapeMetadata, names};
use crate::provider::CursorProvider;

pub const DUMP_IDENTIFIER: &str = "local.capectl.dump";

/// Scale the provider is switched to while dumping, so snapshots come back
/// at their largest.
const DUMP_SCALE: f32 = 16.0;

impl<P: CursorProvider> Engine<P> {
    pub fn dump<F>(&mut self, progress: F) -> Result<Option<Cape>>
    where
        F: FnMut(usize, usize) -> bool,
    {
        dump_cursors(&mut self.provider, progress)
    }
}

/// Snapshots the default and core cursors into a new cape.
///
/// `progress(current, total)` is called before each cursor and once more with
/// `(total, total)` at the end. Returning `false` stops the dump and yields
/// `Ok(None)`. The provider's scale is restored either way.
pub fn dump_cursors<P, F>(provider: &mut P, mut progress: F) -> Result<Option<Cape>>
where
    P: CursorProvider,
    F: FnMut(usize, usize) -> bool,
{
    let original_scale = provider.scale();
    if let Err(e) = provider.set_scale(DUMP_SCALE) {
        warn!("Could not raise cursor scale for dump: {}", e);
    }

    let result = collect(provider, &mut progress);

    if let Err(e) = provider.set_scale(original_scale) {
        warn!("Could not restore cursor scale after dump: {}", e);
    }
    result
}

fn collect<P, F>(provider: &mut P, progress: &mut F) -> Result<Option<Cape>>
where
    P: CursorProvider,
    F: FnMut(usize, usize) -> bool,
{
    let defaults = names::DEFAULT_CURSORS.len();
    let total = defaults + names::CORE_CURSOR_COUNT as usize;
    let mut cursors = Vec::new();

    for (current, identifier) in names::DEFAULT_CURSORS.iter().enumerate() {
        if !progress(current, total) {
            info!("Dump cancelled");
            return Ok(None);
        }
        if let Some(snapshot) = provider.snapshot(identifier) {
            cursors.push(snapshot.into_cursor(identifier));
        }
    }

    for index in 0..names::CORE_CURSOR_COUNT {
        if !progress(defaults + index as usize, total) {
            info!("Dump cancelled");
            return Ok(None);
        }
        if let Err(e) = provider.activate_core_cursor(index) {
            warn!("Could not activate core cursor {}: {}", index, e);
            continue;
        }
        let identifier = names::core_cursor_identifier(index);
        if let Some(snapshot) = provider.snapshot(&identifier) {
            cursors.push(snapshot.into_cursor(&identifier));
        }
    }
    progress(total, total);

    let mut meta = CapeMetadata::new("Cursor Dump", "Apple, Inc.", DUMP_IDENTIFIER);
    meta.hidpi = true;
    info!("Dumped {} cursors", cursors.len());
    Ok(Some(Cape::from_parts(meta, cursors)))
}
