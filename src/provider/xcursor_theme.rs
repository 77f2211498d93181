// Provider backed by an Xcursor theme directory.
//
// Each registration becomes an animated Xcursor file under `cursors/`, with a
// small TOML sidecar holding the point-space geometry that Xcursor cannot
// express. Known identifiers are also linked under their X11 names so
// loaders find them. The scale lives in a plain text file next to the theme.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::xcursor_writer::{XcursorImage, to_x11};
use super::{CursorProvider, ProviderError, Registration};
use crate::model::cursor::unpremultiply;
use crate::model::{Bitmap, Point, Size, names};

const META_DIR: &str = ".capectl";
const SCALE_FILE: &str = "scale";
const DEFAULT_THEME_MARKER: &str = "X-Capectl-Managed=true";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Geometry {
    frame_count: u32,
    frame_duration: f64,
    width: f64,
    height: f64,
    hot_x: f64,
    hot_y: f64,
}

#[derive(Debug, Clone)]
pub struct XcursorThemeProvider {
    theme_dir: PathBuf,
    theme_name: String,
    inherits: String,
    fallback_dir: Option<PathBuf>,
    default_theme_dir: Option<PathBuf>,
}

impl XcursorThemeProvider {
    pub fn new(theme_dir: impl Into<PathBuf>) -> Self {
        let theme_dir = theme_dir.into();
        let theme_name = theme_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("capectl")
            .to_string();
        Self {
            theme_dir,
            theme_name,
            inherits: "hicolor".to_string(),
            fallback_dir: None,
            default_theme_dir: None,
        }
    }

    /// Inherits from the installed theme `name` and snapshots its cursors
    /// when nothing of ours is registered under an identifier.
    pub fn with_system_theme(mut self, name: &str) -> Self {
        self.inherits = name.to_string();
        self.fallback_dir = system_cursor_dir(name);
        if self.fallback_dir.is_none() {
            warn!("Cursor theme {} is not installed", name);
        }
        self
    }

    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    /// Points the `default` theme at `dir` (usually `~/.icons/default`) at
    /// ours. An existing `index.theme` there is left alone unless we wrote it.
    pub fn with_default_theme_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_theme_dir = Some(dir.into());
        self
    }

    pub fn theme_dir(&self) -> &Path {
        &self.theme_dir
    }

    fn cursors_dir(&self) -> PathBuf {
        self.theme_dir.join("cursors")
    }

    fn cursor_path(&self, name: &str) -> PathBuf {
        self.cursors_dir().join(name)
    }

    fn geometry_path(&self, name: &str) -> PathBuf {
        self.theme_dir.join(META_DIR).join(format!("{}.toml", name))
    }

    fn ensure_theme(&self) -> io::Result<()> {
        fs::create_dir_all(self.cursors_dir())?;
        fs::create_dir_all(self.theme_dir.join(META_DIR))?;

        let index = self.theme_dir.join("index.theme");
        if !index.exists() {
            let content = format!(
                "[Icon Theme]\n\
                 Name={}\n\
                 Comment={} cursor theme\n\
                 Inherits={}\n\
                 \n\
                 Directories=cursors\n\
                 \n\
                 [cursors]\n\
                 Context=Cursors\n\
                 Type=Fixed\n",
                self.theme_name, self.theme_name, self.inherits
            );
            fs::write(index, content)?;
        }
        self.activate_theme()
    }

    fn activate_theme(&self) -> io::Result<()> {
        let Some(dir) = &self.default_theme_dir else {
            return Ok(());
        };
        let index = dir.join("index.theme");
        if let Ok(existing) = fs::read_to_string(&index) {
            if !existing.contains(DEFAULT_THEME_MARKER) {
                debug!("Leaving {} alone", index.display());
                return Ok(());
            }
        }

        fs::create_dir_all(dir)?;
        let content = format!(
            "[Icon Theme]\n\
             Name=Default\n\
             Comment=Default Cursor Theme\n\
             Inherits={}\n\
             {}\n",
            self.theme_name, DEFAULT_THEME_MARKER
        );
        fs::write(index, content)
    }

    /// Links every X11 name of `name` to its file, relative to `cursors/`.
    /// Real files already using an X11 name are kept.
    fn link_x11_names(&self, name: &str) -> io::Result<()> {
        let cursors_dir = self.cursors_dir();
        for x11_name in names::x11_names(name) {
            let link = cursors_dir.join(x11_name);
            match fs::read_link(&link) {
                Ok(target) if target == Path::new(name) => continue,
                Ok(_) => fs::remove_file(&link)?,
                Err(_) if link.symlink_metadata().is_ok() => {
                    debug!("Not replacing {}", link.display());
                    continue;
                }
                Err(_) => {}
            }
            unix_fs::symlink(name, &link)?;
        }
        Ok(())
    }

    fn unlink_x11_names(&self, name: &str) {
        let cursors_dir = self.cursors_dir();
        for x11_name in names::x11_names(name) {
            let link = cursors_dir.join(x11_name);
            let ours = fs::read_link(&link).is_ok_and(|target| target == Path::new(name));
            if ours {
                if let Err(e) = fs::remove_file(&link) {
                    warn!("Could not remove {}: {}", link.display(), e);
                }
            }
        }
    }

    /// Reads the inherited theme's file for `name`, if it has one.
    fn fallback_images(&self, name: &str) -> Option<Vec<xcursor::parser::Image>> {
        let dir = self.fallback_dir.as_ref()?;
        names::x11_names(name).iter().find_map(|x11_name| {
            let data = fs::read(dir.join(x11_name)).ok()?;
            xcursor::parser::parse_xcursor(&data)
        })
    }

    fn encode(registration: &Registration) -> io::Result<Vec<u8>> {
        let delay = (registration.frame_duration * 1000.0).round().max(1.0) as u32;
        let mut images = Vec::new();

        for sheet in &registration.frames {
            let factor = if registration.size.width > 0.0 {
                sheet.width() as f64 / registration.size.width
            } else {
                1.0
            };
            let hotspot = (
                (registration.hot_spot.x * factor).max(0.0).round() as u32,
                (registration.hot_spot.y * factor).max(0.0).round() as u32,
            );
            for frame in sheet.split_frames(registration.frame_count) {
                images.push(XcursorImage {
                    nominal: frame.height(),
                    image: frame,
                    hotspot,
                    delay,
                });
            }
        }

        to_x11(&images)
    }

    fn read_geometry(&self, name: &str) -> Option<Geometry> {
        let text = fs::read_to_string(self.geometry_path(name)).ok()?;
        match toml::from_str(&text) {
            Ok(geometry) => Some(geometry),
            Err(e) => {
                warn!("Ignoring unreadable geometry for {}: {}", name, e);
                None
            }
        }
    }
}

impl CursorProvider for XcursorThemeProvider {
    fn is_registered(&self, name: &str) -> bool {
        self.cursor_path(name).is_file()
    }

    fn register(&mut self, name: &str, registration: &Registration) -> Result<(), ProviderError> {
        self.ensure_theme()?;
        let bytes = Self::encode(registration)?;
        fs::write(self.cursor_path(name), bytes)?;

        let geometry = Geometry {
            frame_count: registration.frame_count,
            frame_duration: registration.frame_duration,
            width: registration.size.width,
            height: registration.size.height,
            hot_x: registration.hot_spot.x,
            hot_y: registration.hot_spot.y,
        };
        let text = toml::to_string(&geometry).map_err(|e| ProviderError::Rejected {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        fs::write(self.geometry_path(name), text)?;
        self.link_x11_names(name)?;

        debug!("Wrote {} to {}", name, self.cursor_path(name).display());
        Ok(())
    }

    fn unregister(&mut self, name: &str) {
        self.unlink_x11_names(name);
        for path in [self.cursor_path(name), self.geometry_path(name)] {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Could not remove {}: {}", path.display(), e);
                }
            }
        }
    }

    fn scale(&self) -> f32 {
        fs::read_to_string(self.theme_dir.join(META_DIR).join(SCALE_FILE))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1.0)
    }

    fn set_scale(&mut self, scale: f32) -> Result<(), ProviderError> {
        self.ensure_theme()?;
        fs::write(self.theme_dir.join(META_DIR).join(SCALE_FILE), scale.to_string())?;
        Ok(())
    }

    fn snapshot(&self, name: &str) -> Option<Registration> {
        let images = match fs::read(self.cursor_path(name)) {
            Ok(data) => xcursor::parser::parse_xcursor(&data)?,
            Err(_) => self.fallback_images(name)?,
        };
        if images.is_empty() {
            return None;
        }

        // one sheet per nominal size, smallest first
        let mut groups: BTreeMap<u32, Vec<RgbaFrame>> = BTreeMap::new();
        for image in &images {
            let pixels: Vec<u8> = image
                .pixels_rgba
                .chunks_exact(4)
                .flat_map(|p| unpremultiply(p[2], p[1], p[0], p[3]).0)
                .collect();
            let Some(frame) = image::RgbaImage::from_raw(image.width, image.height, pixels) else {
                continue;
            };
            groups.entry(image.size).or_default().push(RgbaFrame {
                frame: Bitmap::new(frame),
                hotspot: (image.xhot, image.yhot),
                delay: image.delay,
            });
        }

        let smallest = groups.values().next()?;
        let first = smallest.first()?;
        let geometry = self.read_geometry(name).unwrap_or_else(|| Geometry {
            frame_count: smallest.len() as u32,
            frame_duration: first.delay as f64 / 1000.0,
            width: first.frame.width() as f64,
            height: first.frame.height() as f64,
            hot_x: first.hotspot.0 as f64,
            hot_y: first.hotspot.1 as f64,
        });

        let frames = groups
            .values()
            .filter_map(|group| {
                let frames: Vec<Bitmap> = group.iter().map(|f| f.frame.clone()).collect();
                Bitmap::compose(&frames)
            })
            .collect();

        Some(Registration {
            frames,
            frame_count: geometry.frame_count,
            frame_duration: geometry.frame_duration,
            size: Size::new(geometry.width, geometry.height),
            hot_spot: Point::new(geometry.hot_x, geometry.hot_y),
        })
    }

    fn unregister_all_core(&mut self) -> Result<(), ProviderError> {
        let dir = self.cursors_dir();
        if !dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if names::is_core_cursor(&name) {
                self.unregister(&name);
            }
        }
        Ok(())
    }

    fn activate_core_cursor(&mut self, _index: u32) -> Result<(), ProviderError> {
        // the desktop falls back to the inherited theme once our file is gone
        Ok(())
    }
}

/// Directory holding the cursors of the installed theme `name`.
pub fn system_cursor_dir(name: &str) -> Option<PathBuf> {
    let theme = xcursor::CursorTheme::load(name);
    ["left_ptr", "default"]
        .iter()
        .find_map(|icon| theme.load_icon(icon))
        .and_then(|path| path.parent().map(Path::to_path_buf))
}

struct RgbaFrame {
    frame: Bitmap,
    hotspot: (u32, u32),
    delay: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn registration() -> Registration {
        let mut sheet = RgbaImage::new(8, 16);
        for y in 0..16 {
            for x in 0..8 {
                let shade = if y < 8 { 200 } else { 40 };
                sheet.put_pixel(x, y, Rgba([shade, 0, 0, 255]));
            }
        }
        let big = image::imageops::resize(&sheet, 16, 32, image::imageops::FilterType::Nearest);
        Registration {
            frames: vec![Bitmap::new(sheet), Bitmap::new(big)],
            frame_count: 2,
            frame_duration: 0.25,
            size: Size::new(8.0, 8.0),
            hot_spot: Point::new(1.0, 2.0),
        }
    }

    #[test]
    fn test_register_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = XcursorThemeProvider::new(dir.path().join("capectl"));

        assert!(!provider.is_registered(names::ARROW));
        provider.register(names::ARROW, &registration()).unwrap();
        assert!(provider.is_registered(names::ARROW));
        assert!(dir.path().join("capectl").join("index.theme").exists());

        let snapshot = provider.snapshot(names::ARROW).unwrap();
        assert_eq!(snapshot, registration());

        provider.unregister(names::ARROW);
        assert!(!provider.is_registered(names::ARROW));
        assert!(provider.snapshot(names::ARROW).is_none());
    }

    #[test]
    fn test_scale_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = XcursorThemeProvider::new(dir.path());
        assert_eq!(provider.scale(), 1.0);
        provider.set_scale(2.5).unwrap();
        assert_eq!(XcursorThemeProvider::new(dir.path()).scale(), 2.5);
    }

    #[test]
    fn test_unregister_all_core_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = XcursorThemeProvider::new(dir.path());
        let core = names::core_cursor_identifier(7);
        provider.register(&core, &registration()).unwrap();
        provider.register(names::ARROW, &registration()).unwrap();

        provider.unregister_all_core().unwrap();
        assert!(!provider.is_registered(&core));
        assert!(provider.is_registered(names::ARROW));
    }

    #[test]
    fn test_register_links_x11_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = XcursorThemeProvider::new(dir.path().join("capectl"));
        provider.register(names::ARROW, &registration()).unwrap();

        let cursors = dir.path().join("capectl").join("cursors");
        for x11_name in ["left_ptr", "default", "arrow"] {
            let link = cursors.join(x11_name);
            assert_eq!(fs::read_link(&link).unwrap(), Path::new(names::ARROW));
            let images = xcursor::parser::parse_xcursor(&fs::read(&link).unwrap()).unwrap();
            assert_eq!(images.len(), 4);
        }

        provider.unregister(names::ARROW);
        assert!(cursors.join("left_ptr").symlink_metadata().is_err());
        assert!(cursors.join("default").symlink_metadata().is_err());
    }

    #[test]
    fn test_existing_x11_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let cursors = dir.path().join("cursors");
        fs::create_dir_all(&cursors).unwrap();
        fs::write(cursors.join("pointer"), b"not ours").unwrap();

        let mut provider = XcursorThemeProvider::new(dir.path());
        provider.register("com.apple.cursor.13", &registration()).unwrap();
        assert_eq!(fs::read(cursors.join("pointer")).unwrap(), b"not ours");
        assert!(fs::read_link(cursors.join("hand2")).is_ok());

        provider.unregister("com.apple.cursor.13");
        assert!(cursors.join("pointer").exists());
    }

    #[test]
    fn test_snapshot_falls_back_to_system_theme() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system");
        fs::create_dir_all(&system).unwrap();
        let bytes = XcursorThemeProvider::encode(&registration()).unwrap();
        fs::write(system.join("left_ptr"), bytes).unwrap();

        let provider =
            XcursorThemeProvider::new(dir.path().join("capectl")).with_fallback_dir(&system);
        assert!(!provider.is_registered(names::ARROW));

        let snapshot = provider.snapshot(names::ARROW).unwrap();
        assert_eq!(snapshot.frame_count, 2);
        assert_eq!(snapshot.frames.len(), 2);
        assert_eq!(snapshot.frames[0].image().get_pixel(0, 0), &Rgba([200, 0, 0, 255]));
        assert!(provider.snapshot("com.apple.cursor.13").is_none());
    }

    #[test]
    fn test_default_theme_points_at_ours() {
        let dir = tempfile::tempdir().unwrap();
        let default_dir = dir.path().join("default");
        let mut provider = XcursorThemeProvider::new(dir.path().join("capectl"))
            .with_default_theme_dir(&default_dir);
        provider.register(names::ARROW, &registration()).unwrap();

        let index = fs::read_to_string(default_dir.join("index.theme")).unwrap();
        assert!(index.contains("Inherits=capectl"));

        let foreign = dir.path().join("foreign");
        fs::create_dir_all(&foreign).unwrap();
        fs::write(foreign.join("index.theme"), "[Icon Theme]\nInherits=Adwaita\n").unwrap();
        let mut provider =
            XcursorThemeProvider::new(dir.path().join("capectl")).with_default_theme_dir(&foreign);
        provider.register(names::ARROW, &registration()).unwrap();
        let index = fs::read_to_string(foreign.join("index.theme")).unwrap();
        assert!(index.contains("Inherits=Adwaita"));
    }
}
