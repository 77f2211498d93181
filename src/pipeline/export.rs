use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

use super::fs_ops::ensure_dir;
use crate::model::Cape;

pub fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Writes every representation of every cursor as `<identifier>_<index>.png`.
pub fn export_cape<F>(cape: &Cape, dest: &Path, mut log_fn: F) -> Result<Vec<PathBuf>>
where
    F: FnMut(String),
{
    ensure_dir(dest).with_context(|| format!("Cannot create {}", dest.display()))?;

    let mut written = Vec::new();
    for cursor in cape.cursors() {
        for (index, (_, bitmap)) in cursor.representations().enumerate() {
            let path = dest.join(format!("{}_{}.png", cursor.identifier(), index));
            write_png(bitmap.image(), &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
        log_fn(format!("Exported {}", cursor.name()));
    }
    Ok(written)
}
