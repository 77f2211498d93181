// Fixed cursor identifier table.
//
// Identifiers are the OS-level registration names; capes key their cursors by
// these strings so they must never change.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

/// Cursors that are backed up before a cape is applied and restored afterwards.
pub const DEFAULT_CURSORS: [&str; 9] = [
    "com.apple.coregraphics.Arrow",
    "com.apple.coregraphics.IBeam",
    "com.apple.coregraphics.IBeamXOR",
    "com.apple.coregraphics.Alias",
    "com.apple.coregraphics.Copy",
    "com.apple.coregraphics.Move",
    "com.apple.coregraphics.ArrowCtx",
    "com.apple.coregraphics.Wait",
    "com.apple.coregraphics.Empty",
];

pub const ARROW: &str = "com.apple.coregraphics.Arrow";

/// Number of built-in core cursors (`com.apple.cursor.0` ..).
pub const CORE_CURSOR_COUNT: u32 = 45;

pub const CORE_CURSOR_PREFIX: &str = "com.apple.cursor.";

/// Prefix of the registrations that hold pre-cape copies of the defaults.
pub const BACKUP_PREFIX: &str = "capectl.backup";

pub fn core_cursor_identifier(index: u32) -> String {
    format!("{}{}", CORE_CURSOR_PREFIX, index)
}

pub fn is_core_cursor(identifier: &str) -> bool {
    identifier
        .strip_prefix(CORE_CURSOR_PREFIX)
        .is_some_and(|n| n.parse::<u32>().is_ok())
}

pub fn backup_name(identifier: &str) -> String {
    format!("{}.{}", BACKUP_PREFIX, identifier)
}

/// Inverse of [`backup_name`]; `None` when `name` is not a backup registration.
pub fn restore_name(name: &str) -> Option<&str> {
    name.strip_prefix(BACKUP_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
}

static NAME_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();

    map.insert("com.apple.coregraphics.Arrow", "Arrow");
    map.insert("com.apple.coregraphics.IBeam", "IBeam");
    map.insert("com.apple.coregraphics.IBeamXOR", "IBeamXOR");
    map.insert("com.apple.coregraphics.Alias", "Alias");
    map.insert("com.apple.coregraphics.Copy", "Copy");
    map.insert("com.apple.coregraphics.Move", "Move");
    map.insert("com.apple.coregraphics.ArrowCtx", "Ctx Arrow");
    map.insert("com.apple.coregraphics.Wait", "Wait");
    map.insert("com.apple.coregraphics.Empty", "Empty");

    map.insert("com.apple.cursor.2", "Link");
    map.insert("com.apple.cursor.3", "Forbidden");
    map.insert("com.apple.cursor.4", "Busy");
    map.insert("com.apple.cursor.5", "Copy Drag");
    map.insert("com.apple.cursor.7", "Crosshair");
    map.insert("com.apple.cursor.8", "Crosshair 2");
    map.insert("com.apple.cursor.9", "Camera 2");
    map.insert("com.apple.cursor.10", "Camera");
    map.insert("com.apple.cursor.11", "Closed");
    map.insert("com.apple.cursor.12", "Open");
    map.insert("com.apple.cursor.13", "Pointing");
    map.insert("com.apple.cursor.14", "Counting Up");
    map.insert("com.apple.cursor.15", "Counting Down");
    map.insert("com.apple.cursor.16", "Counting Up/Down");
    map.insert("com.apple.cursor.17", "Resize W");
    map.insert("com.apple.cursor.18", "Resize E");
    map.insert("com.apple.cursor.19", "Resize W-E");
    map.insert("com.apple.cursor.20", "Cell XOR");
    map.insert("com.apple.cursor.21", "Resize N");
    map.insert("com.apple.cursor.22", "Resize S");
    map.insert("com.apple.cursor.23", "Resize N-S");
    map.insert("com.apple.cursor.24", "Ctx Menu");
    map.insert("com.apple.cursor.25", "Poof");
    map.insert("com.apple.cursor.26", "IBeam H.");
    map.insert("com.apple.cursor.27", "Window E");
    map.insert("com.apple.cursor.28", "Window E-W");
    map.insert("com.apple.cursor.29", "Window NE");
    map.insert("com.apple.cursor.30", "Window NE-SW");
    map.insert("com.apple.cursor.31", "Window N");
    map.insert("com.apple.cursor.32", "Window N-S");
    map.insert("com.apple.cursor.33", "Window NW");
    map.insert("com.apple.cursor.34", "Window NW-SE");
    map.insert("com.apple.cursor.35", "Window SE");
    map.insert("com.apple.cursor.36", "Window S");
    map.insert("com.apple.cursor.37", "Window SW");
    map.insert("com.apple.cursor.38", "Window W");
    map.insert("com.apple.cursor.39", "Resize Square");
    map.insert("com.apple.cursor.40", "Help");
    map.insert("com.apple.cursor.41", "Cell");
    map.insert("com.apple.cursor.42", "Zoom In");
    map.insert("com.apple.cursor.43", "Zoom Out");

    map
});

// X11 cursor names each identifier is exported under. The first name is the
// one Xcursor loaders ask for first; the rest are the aliases toolkits use.
static X11_NAMES: LazyLock<BTreeMap<&'static str, &'static [&'static str]>> =
    LazyLock::new(|| {
        let mut map: BTreeMap<&'static str, &'static [&'static str]> = BTreeMap::new();

        map.insert("com.apple.coregraphics.Arrow", &["left_ptr", "default", "arrow", "top_left_arrow"]);
        map.insert("com.apple.coregraphics.IBeam", &["xterm", "text", "ibeam"]);
        map.insert("com.apple.coregraphics.Alias", &["alias", "dnd-link"]);
        map.insert("com.apple.coregraphics.Copy", &["copy"]);
        map.insert("com.apple.coregraphics.Move", &["fleur", "move", "all-scroll", "size_all", "dnd-move"]);
        map.insert("com.apple.coregraphics.Wait", &["wait", "watch"]);

        map.insert("com.apple.cursor.2", &["link"]);
        map.insert(
            "com.apple.cursor.3",
            &["not-allowed", "crossed_circle", "forbidden", "no-drop", "dnd-no-drop"],
        );
        map.insert("com.apple.cursor.4", &["progress", "left_ptr_watch", "half-busy"]);
        map.insert("com.apple.cursor.5", &["dnd-copy"]);
        map.insert("com.apple.cursor.7", &["crosshair", "cross", "tcross"]);
        map.insert("com.apple.cursor.11", &["grabbing", "closedhand", "dnd-none"]);
        map.insert("com.apple.cursor.12", &["grab", "openhand"]);
        map.insert("com.apple.cursor.13", &["pointer", "hand2", "hand1", "pointing_hand"]);
        map.insert("com.apple.cursor.17", &["w-resize", "left_side"]);
        map.insert("com.apple.cursor.18", &["e-resize", "right_side"]);
        map.insert(
            "com.apple.cursor.19",
            &["sb_h_double_arrow", "ew-resize", "col-resize", "h_double_arrow", "size_hor"],
        );
        map.insert("com.apple.cursor.21", &["n-resize", "top_side"]);
        map.insert("com.apple.cursor.22", &["s-resize", "bottom_side"]);
        map.insert(
            "com.apple.cursor.23",
            &["sb_v_double_arrow", "ns-resize", "row-resize", "v_double_arrow", "size_ver"],
        );
        map.insert("com.apple.cursor.24", &["context-menu"]);
        map.insert("com.apple.cursor.26", &["vertical-text"]);
        map.insert("com.apple.cursor.29", &["ne-resize", "top_right_corner"]);
        map.insert("com.apple.cursor.30", &["nesw-resize", "fd_double_arrow", "size_bdiag"]);
        map.insert("com.apple.cursor.33", &["nw-resize", "top_left_corner"]);
        map.insert("com.apple.cursor.34", &["nwse-resize", "bd_double_arrow", "size_fdiag"]);
        map.insert("com.apple.cursor.35", &["se-resize", "bottom_right_corner"]);
        map.insert("com.apple.cursor.37", &["sw-resize", "bottom_left_corner"]);
        map.insert("com.apple.cursor.40", &["question_arrow", "help", "whats_this", "left_ptr_help"]);
        map.insert("com.apple.cursor.41", &["cell", "plus"]);
        map.insert("com.apple.cursor.42", &["zoom-in"]);
        map.insert("com.apple.cursor.43", &["zoom-out"]);

        map
    });

// Cursors whose image points somewhere, so mirroring them for left-handed
// use makes sense. Resize/window/text cursors stay as they are.
static POINTERS: LazyLock<BTreeSet<&'static str>> = LazyLock::new(|| {
    [
        "Alias",
        "Arrow",
        "Busy",
        "Closed",
        "Copy Drag",
        "Counting Down",
        "Counting Up",
        "Counting Up/Down",
        "Ctx Menu",
        "Forbidden",
        "Link",
        "Move",
        "Open",
        "Pointing",
        "Poof",
        "Wait",
        "Zoom In",
        "Zoom Out",
    ]
    .iter()
    .filter_map(|name| lookup_identifier(name))
    .collect()
});

/// Identifier of a known display name.
pub fn lookup_identifier(name: &str) -> Option<&'static str> {
    NAME_MAP
        .iter()
        .find(|(_, v)| **v == name)
        .map(|(k, _)| *k)
}

pub fn name_for_identifier(identifier: &str) -> &'static str {
    NAME_MAP.get(identifier).copied().unwrap_or("Unknown")
}

/// Identifier for a display name; unknown names get a fresh identifier.
pub fn identifier_for_name(name: &str) -> String {
    lookup_identifier(name)
        .map(str::to_string)
        .unwrap_or_else(generate_identifier)
}

pub fn generate_identifier() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}

pub fn is_pointer(identifier: &str) -> bool {
    POINTERS.contains(identifier)
}

/// X11 names `identifier` is exported under; empty when X11 has no
/// counterpart.
pub fn x11_names(identifier: &str) -> &'static [&'static str] {
    X11_NAMES.get(identifier).copied().unwrap_or(&[])
}

/// All known identifiers, sorted.
pub fn known_identifiers() -> impl Iterator<Item = &'static str> {
    NAME_MAP.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup() {
        assert_eq!(name_for_identifier(ARROW), "Arrow");
        assert_eq!(name_for_identifier("com.apple.cursor.13"), "Pointing");
        assert_eq!(name_for_identifier("bogus"), "Unknown");
        assert_eq!(identifier_for_name("Copy Drag"), "com.apple.cursor.5");
        assert_eq!(identifier_for_name("No Such Cursor").len(), 32);
    }

    #[test]
    fn test_pointer_classification() {
        assert!(is_pointer(ARROW));
        assert!(is_pointer("com.apple.cursor.2"));
        assert!(!is_pointer("com.apple.coregraphics.IBeam"));
        assert!(!is_pointer("com.apple.cursor.19"));
    }

    #[test]
    fn test_backup_names() {
        let backup = backup_name(ARROW);
        assert_eq!(backup, "capectl.backup.com.apple.coregraphics.Arrow");
        assert_eq!(restore_name(&backup), Some(ARROW));
        assert_eq!(restore_name(ARROW), None);
    }

    #[test]
    fn test_core_cursor_detection() {
        assert!(is_core_cursor(&core_cursor_identifier(0)));
        assert!(is_core_cursor("com.apple.cursor.44"));
        assert!(!is_core_cursor(ARROW));
        assert!(!is_core_cursor("com.apple.cursor.x"));
    }

    #[test]
    fn test_x11_names_are_unique() {
        assert_eq!(x11_names(ARROW)[0], "left_ptr");
        assert!(x11_names("com.apple.cursor.13").contains(&"hand2"));
        assert!(x11_names("com.apple.coregraphics.Empty").is_empty());
        assert!(x11_names(&backup_name(ARROW)).is_empty());

        let mut seen = BTreeSet::new();
        for identifier in known_identifiers() {
            for name in x11_names(identifier) {
                assert!(seen.insert(*name), "{} is exported twice", name);
            }
        }
    }
}
