use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn ensure_dir<P: AsRef<Path>>(p: P) -> io::Result<()> {
    if !p.as_ref().exists() {
        fs::create_dir_all(&p)?;
    }
    Ok(())
}

/// Moves `path` into `trash_dir`, replacing any stale entry of the same name.
pub fn move_to_trash(path: &Path, trash_dir: &Path) -> io::Result<PathBuf> {
    ensure_dir(trash_dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let destination = trash_dir.join(file_name);

    match fs::remove_file(&destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    if fs::rename(path, &destination).is_err() {
        // rename cannot cross filesystems
        fs::copy(path, &destination)?;
        fs::remove_file(path)?;
    }
    Ok(destination)
}

/// Removes a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
