use crossbeam_channel::Sender;
use crossterm::event::KeyEvent;
use std::io;
use std::path::PathBuf;

use crate::library::LibraryEvent;

#[derive(Clone, Debug)]
pub enum AppMsg {
    Tick,
    Key(KeyEvent),
    Quit,

    // Library
    LibraryChanged(LibraryEvent),
    ApplyRequested(String),
    EditRequested(String),
    RestoreRequested,
    RemoveRequested(String),

    // Dump
    DumpRequested,
    DumpStarted,
    DumpProgress(usize, usize),
    DumpCompleted(PathBuf),
    DumpCancelled,
    DumpFailed(String),

    // General
    ErrorOccurred(String),
    LogMessage(String),
}

/// `io::Write` sink that turns formatted log output into `LogMessage`s, one
/// per line, so tracing output lands in the logs pane instead of the screen.
#[derive(Clone)]
pub struct LogForwarder {
    tx: Sender<AppMsg>,
}

impl LogForwarder {
    pub fn new(tx: Sender<AppMsg>) -> Self {
        Self { tx }
    }
}

impl io::Write for LogForwarder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let _ = self.tx.send(AppMsg::LogMessage(line.trim_end().to_string()));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
