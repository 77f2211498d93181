// Build a cape from a directory tree: one subdirectory per cursor, each
// holding its images and an optional cursor.toml with the geometry.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::model::{Bitmap, Cape, CapeMetadata, Cursor, Point, Scale, Size, names};

pub const GEOMETRY_FILE: &str = "cursor.toml";

#[derive(Debug, Clone, PartialEq)]
struct CursorGeometry {
    hot_spot: Point,
    points_wide: Option<f64>,
    points_high: Option<f64>,
    frame_count: u32,
    frame_duration: f64,
}

impl Default for CursorGeometry {
    fn default() -> Self {
        Self {
            hot_spot: Point::default(),
            points_wide: None,
            points_high: None,
            frame_count: 1,
            frame_duration: 1.0,
        }
    }
}

fn parse_geometry(path: &Path) -> Result<CursorGeometry> {
    if !path.exists() {
        return Ok(CursorGeometry::default());
    }
    let content = fs::read_to_string(path)?;
    let table = content
        .parse::<toml::Table>()
        .with_context(|| format!("Invalid {}", path.display()))?;

    let float = |key: &str| {
        table.get(key).and_then(|v| {
            v.as_float()
                .or_else(|| v.as_integer().map(|i| i as f64))
        })
    };

    Ok(CursorGeometry {
        hot_spot: Point::new(
            float("hotspot_x").unwrap_or(0.0),
            float("hotspot_y").unwrap_or(0.0),
        ),
        points_wide: float("points_wide"),
        points_high: float("points_high"),
        frame_count: table
            .get("frame_count")
            .and_then(|v| v.as_integer())
            .unwrap_or(1)
            .max(0) as u32,
        frame_duration: float("frame_duration").unwrap_or(1.0),
    })
}

/// Directory names may be identifiers or display names.
fn identifier_for_directory(name: &str) -> String {
    if names::name_for_identifier(name) != "Unknown" {
        return name.to_string();
    }
    names::lookup_identifier(name)
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}

fn load_images<F>(dir: &Path, log_fn: &mut F) -> Result<Vec<Bitmap>>
where
    F: FnMut(String),
{
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        if !path.is_file() || file_name.starts_with('.') || file_name == GEOMETRY_FILE {
            continue;
        }

        let data = fs::read(path)?;
        match Bitmap::from_bytes(&data) {
            Ok(bitmap) => images.push(bitmap),
            Err(e) => log_fn(format!("Skipping {}: {}", path.display(), e)),
        }
    }
    Ok(images)
}

fn build_cursor<F>(identifier: &str, dir: &Path, log_fn: &mut F) -> Result<Option<Cursor>>
where
    F: FnMut(String),
{
    let geometry = parse_geometry(&dir.join(GEOMETRY_FILE))?;
    let images = load_images(dir, log_fn)?;
    let Some(narrowest) = images.iter().min_by_key(|b| b.width()) else {
        log_fn(format!("No images for {}, skipping", identifier));
        return Ok(None);
    };

    let frame_count = geometry.frame_count.max(1);
    let points_wide = geometry.points_wide.unwrap_or(narrowest.width() as f64);
    let points_high = geometry
        .points_high
        .unwrap_or(narrowest.height() as f64 / frame_count as f64);

    let mut cursor = Cursor::with_identifier(identifier);
    cursor.set_frame_count(geometry.frame_count);
    cursor.set_frame_duration(geometry.frame_duration);
    cursor.set_hot_spot(geometry.hot_spot);
    cursor.set_size(Size::new(points_wide, points_high));

    for image in images {
        let scale = Scale::from_factor(image.width() as f64 / points_wide);
        if scale == Scale::None {
            log_fn(format!(
                "Dropping {}px wide image of {}: no matching scale",
                image.width(),
                identifier
            ));
            continue;
        }
        // several images at one scale are frames of the same animation
        if cursor.representation(scale).is_some() {
            cursor.add_frame(scale, image);
        } else {
            cursor.set_representation(scale, Some(image));
        }
    }
    cursor.set_size(Size::new(points_wide, points_high));

    if cursor.representation_count() == 0 {
        return Ok(None);
    }
    Ok(Some(cursor))
}

pub fn cape_from_directory<F>(dir: &Path, meta: CapeMetadata, mut log_fn: F) -> Result<Cape>
where
    F: FnMut(String),
{
    if !dir.is_dir() {
        return Err(anyhow!("{} is not a directory", dir.display()));
    }

    let mut cursors = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().to_string();
        let identifier = identifier_for_directory(&dir_name);

        log_fn(format!("Reading {}", identifier));
        if let Some(cursor) = build_cursor(&identifier, entry.path(), &mut log_fn)? {
            cursors.push(cursor);
        }
    }

    if cursors.is_empty() {
        return Err(anyhow!("Unable to create a cape from the directory specified."));
    }

    log_fn(format!("Created {} with {} cursors", meta.name, cursors.len()));
    Ok(Cape::from_parts(meta, cursors))
}
