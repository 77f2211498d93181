// Dump worker: snapshots the live cursors on a separate thread

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::engine::dump_cursors;
use crate::event::AppMsg;
use crate::pipeline::write_cape_file;
use crate::provider::CursorProvider;

pub struct DumpWorker {
    tx: Sender<AppMsg>,
}

impl DumpWorker {
    pub fn new(tx: Sender<AppMsg>) -> Self {
        Self { tx }
    }

    /// Dumps through `provider` and writes the cape to `output`. Setting
    /// `cancel` stops the dump before the next cursor.
    pub fn start_dump<P>(&self, provider: P, output: PathBuf, cancel: Arc<AtomicBool>) -> JoinHandle<()>
    where
        P: CursorProvider + Send + 'static,
    {
        let tx = self.tx.clone();

        thread::spawn(move || {
            let _ = tx.send(AppMsg::DumpStarted);
            match Self::run_dump(provider, &output, &cancel, &tx) {
                Ok(true) => {
                    let _ = tx.send(AppMsg::DumpCompleted(output));
                }
                Ok(false) => {
                    let _ = tx.send(AppMsg::DumpCancelled);
                }
                Err(e) => {
                    let _ = tx.send(AppMsg::DumpFailed(format!("{:#}", e)));
                }
            }
        })
    }

    fn run_dump<P: CursorProvider>(
        mut provider: P,
        output: &Path,
        cancel: &AtomicBool,
        tx: &Sender<AppMsg>,
    ) -> Result<bool> {
        let dumped = dump_cursors(&mut provider, |current, total| {
            let _ = tx.send(AppMsg::DumpProgress(current, total));
            !cancel.load(Ordering::Relaxed)
        })
        .context("Dump failed")?;

        let Some(cape) = dumped else {
            return Ok(false);
        };

        let _ = tx.send(AppMsg::LogMessage(format!(
            "Dumped {} cursors",
            cape.cursor_count()
        )));
        write_cape_file(&cape, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::engine::DUMP_IDENTIFIER;
    use crate::model::{Bitmap, Point, Size, names};
    use crate::provider::{MemoryProvider, Registration};
    use crossbeam_channel::unbounded;
    use image::RgbaImage;

    fn provider() -> MemoryProvider {
        let registration = Registration {
            frames: vec![Bitmap::new(RgbaImage::new(8, 8))],
            frame_count: 1,
            frame_duration: 1.0,
            size: Size::new(8.0, 8.0),
            hot_spot: Point::new(1.0, 1.0),
        };
        MemoryProvider::with_system_cursors([(names::ARROW.to_string(), registration)])
    }

    #[test]
    fn test_dump_writes_cape() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dump.cape");
        let (tx, rx) = unbounded();

        DumpWorker::new(tx)
            .start_dump(provider(), output.clone(), Arc::new(AtomicBool::new(false)))
            .join()
            .unwrap();

        let messages: Vec<AppMsg> = rx.try_iter().collect();
        assert!(matches!(messages.first(), Some(AppMsg::DumpStarted)));
        assert!(matches!(messages.last(), Some(AppMsg::DumpCompleted(p)) if *p == output));
        assert!(messages.iter().any(|m| matches!(m, AppMsg::DumpProgress(..))));

        let cape = codec::read_cape(&output).unwrap();
        assert_eq!(cape.identifier(), DUMP_IDENTIFIER);
        assert_eq!(cape.cursor_count(), 1);
    }

    #[test]
    fn test_cancelled_dump_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dump.cape");
        let (tx, rx) = unbounded();

        DumpWorker::new(tx)
            .start_dump(provider(), output.clone(), Arc::new(AtomicBool::new(true)))
            .join()
            .unwrap();

        let messages: Vec<AppMsg> = rx.try_iter().collect();
        assert!(matches!(messages.last(), Some(AppMsg::DumpCancelled)));
        assert!(!output.exists());
    }
}
