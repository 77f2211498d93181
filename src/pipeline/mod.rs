// File-level operations built on the model and codec: building capes from
// directories or legacy files, and exporting their images.

pub mod convert;
pub mod create;
pub mod export;
pub mod fs_ops;

use std::path::Path;

use crate::codec;
use crate::error::{CapeError, Result};
use crate::model::Cape;

/// Writes `cape` to `path`, creating the parent directory first.
pub fn write_cape_file(cape: &Cape, path: &Path) -> Result<()> {
    codec::check_unique_identifiers(cape)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_ops::ensure_dir(parent).map_err(|source| CapeError::WriteFailure {
            path: path.to_path_buf(),
            source,
        })?;
    }
    codec::write_cape(cape, path)
}

#[cfg(test)]
mod pipeline_test;
