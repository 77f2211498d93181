// Directory -> cape -> library -> export, end to end

#[cfg(test)]
mod tests {
    use crate::codec;
    use crate::engine::Engine;
    use crate::error::CapeError;
    use crate::library::Library;
    use crate::model::{CapeMetadata, Scale, names};
    use crate::pipeline::{create, export, write_cape_file};
    use crate::provider::{CursorProvider, MemoryProvider};
    use crate::state::SystemState;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_create_save_import_export() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("source");
        for (dir, width) in [(names::ARROW, 16), ("Pointing", 16)] {
            let cursor_dir = source.join(dir);
            fs::create_dir_all(&cursor_dir).unwrap();
            RgbaImage::from_pixel(width, width, Rgba([0, 0, 0, 255]))
                .save(cursor_dir.join("1x.png"))
                .unwrap();
            RgbaImage::from_pixel(width * 2, width * 2, Rgba([0, 0, 0, 255]))
                .save(cursor_dir.join("2x.png"))
                .unwrap();
        }

        let meta = CapeMetadata::new("Pipeline", "tester", "local.tester.Pipeline");
        let cape = create::cape_from_directory(&source, meta, |msg| eprintln!("{}", msg)).unwrap();
        assert_eq!(cape.cursor_count(), 2);

        let cape_path = temp_dir.path().join("nested").join("pipeline.cape");
        write_cape_file(&cape, &cape_path).unwrap();
        assert_eq!(codec::read_cape(&cape_path).unwrap(), cape);

        let engine = Engine::new(MemoryProvider::new(), SystemState::in_memory());
        let mut library =
            Library::load(temp_dir.path().join("capes"), temp_dir.path().join("trash"), engine)
                .unwrap();
        let id = library.import_path(&cape_path).unwrap();
        library.apply(&id).unwrap();
        assert!(library.engine().provider().is_registered("com.apple.cursor.13"));

        let imported = library.get(&id).unwrap();
        assert!(imported.cursors().iter().all(|c| c.representation(Scale::X2).is_some()));

        let files = export::export_cape(imported, &temp_dir.path().join("png"), |_| {}).unwrap();
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn test_two_directories_for_one_cursor_are_not_saved() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("source");
        for dir in ["Pointing", "com.apple.cursor.13"] {
            let cursor_dir = source.join(dir);
            fs::create_dir_all(&cursor_dir).unwrap();
            RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]))
                .save(cursor_dir.join("1x.png"))
                .unwrap();
        }

        let meta = CapeMetadata::new("Twins", "tester", "local.tester.Twins");
        let cape = create::cape_from_directory(&source, meta, |_| {}).unwrap();
        assert_eq!(cape.cursor_count(), 2);

        let cape_path = temp_dir.path().join("out").join("twins.cape");
        let err = write_cape_file(&cape, &cape_path).unwrap_err();
        match err {
            CapeError::DuplicateIdentifiers { names } => assert_eq!(names, vec!["Pointing"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!cape_path.exists());
        assert!(!cape_path.parent().unwrap().exists());
    }
}
