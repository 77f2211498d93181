use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{io, time::Duration};
use tracing::{info, warn};

use crate::components::Component;
use crate::components::library::{CapeRow, LibraryState};
use crate::components::logs::LogsState;
use crate::components::status::StatusState;
use crate::event::AppMsg;
use crate::library::{Library, LibraryEvent};
use crate::model::names;
use crate::pipeline::fs_ops;
use crate::provider::CursorProvider;
use crate::worker::DumpWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Library,
    Logs,
}

pub struct App<P> {
    library: Library<P>,
    library_events: Receiver<LibraryEvent>,
    tx: Sender<AppMsg>,
    rx: Receiver<AppMsg>,
    library_view: LibraryState,
    logs: LogsState,
    status: StatusState,
    focus: Focus,
    dump_cancel: Option<Arc<AtomicBool>>,
    should_quit: bool,
}

impl<P: CursorProvider + Clone + Send + 'static> App<P> {
    /// `tx`/`rx` is the message channel; log output is expected to be
    /// forwarded into `tx` already.
    pub fn new(mut library: Library<P>, tx: Sender<AppMsg>, rx: Receiver<AppMsg>) -> Self {
        let library_events = library.subscribe();
        let mut app = Self {
            library,
            library_events,
            tx,
            rx,
            library_view: LibraryState::default(),
            logs: LogsState::default(),
            status: StatusState::default(),
            focus: Focus::Library,
            dump_cancel: None,
            should_quit: false,
        };
        app.refresh();
        app
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;

        let res = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        res
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        let tick_rate = Duration::from_millis(200);

        while !self.should_quit {
            terminal.draw(|f| {
                let area = f.area();
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Min(5),
                        Constraint::Length(10),
                        Constraint::Length(5),
                    ])
                    .split(area);

                let buf = f.buffer_mut();
                self.library_view
                    .render(chunks[0], buf, self.focus == Focus::Library);
                self.logs.render(chunks[1], buf, self.focus == Focus::Logs);
                self.status.render(chunks[2], buf, false);
            })?;

            if event::poll(tick_rate)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            } else {
                self.handle(AppMsg::Tick);
            }

            self.drain();
        }
        Ok(())
    }

    /// Handles everything queued by workers, log forwarding and the library.
    fn drain(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg);
        }
        while let Ok(event) = self.library_events.try_recv() {
            self.handle(AppMsg::LibraryChanged(event));
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.handle(AppMsg::Quit)
            }
            (KeyCode::Tab, _) => {
                self.focus = match self.focus {
                    Focus::Library => Focus::Logs,
                    Focus::Logs => Focus::Library,
                };
            }
            (KeyCode::Esc, _) => {
                if let Some(cancel) = &self.dump_cancel {
                    info!("Cancelling dump");
                    cancel.store(true, Ordering::Relaxed);
                }
            }
            _ => {
                let msg = AppMsg::Key(key);
                let follow_up = match self.focus {
                    Focus::Library => self.library_view.update(&msg),
                    Focus::Logs => self.logs.update(&msg),
                };
                if let Some(follow_up) = follow_up {
                    self.handle(follow_up);
                }
            }
        }
    }

    fn handle(&mut self, msg: AppMsg) {
        match &msg {
            AppMsg::Quit => {
                if let Some(cancel) = &self.dump_cancel {
                    cancel.store(true, Ordering::Relaxed);
                }
                self.should_quit = true;
            }
            AppMsg::ApplyRequested(identifier) => {
                if let Err(e) = self.library.apply(identifier) {
                    self.report(format!("{}: {}", e.title(), e));
                }
            }
            AppMsg::EditRequested(identifier) => self.describe(identifier),
            AppMsg::RestoreRequested => self.library.restore(),
            AppMsg::RemoveRequested(identifier) => match self.library.remove(identifier) {
                Ok(Some(trashed)) => info!("Moved to {}", trashed.display()),
                Ok(None) => {}
                Err(e) => self.report(format!("{}: {}", e.title(), e)),
            },
            AppMsg::DumpRequested => self.start_dump(),
            AppMsg::DumpCompleted(path) => {
                self.dump_cancel = None;
                self.import_dump(path);
            }
            AppMsg::DumpCancelled | AppMsg::DumpFailed(_) => self.dump_cancel = None,
            AppMsg::LibraryChanged(_) => self.refresh(),
            _ => {}
        }

        self.status.update(&msg);
        self.logs.update(&msg);
    }

    fn report(&mut self, error: String) {
        warn!("{}", error);
        self.logs.update(&AppMsg::ErrorOccurred(error));
    }

    /// Lists what a cape holds in the logs pane.
    fn describe(&mut self, identifier: &str) {
        let Some(cape) = self.library.get(identifier) else {
            self.report(format!("Unknown cape: {}", identifier));
            return;
        };

        let mut lines = vec![format!(
            "{} by {} ({})",
            cape.name(),
            cape.author(),
            cape.file_path().map_or_else(|| "unsaved".to_string(), |p| p.display().to_string())
        )];
        for cursor in cape.cursors() {
            let scales: Vec<String> = cursor
                .representations()
                .map(|(scale, _)| format!("{}x", scale.factor()))
                .collect();
            lines.push(format!(
                "  {}: {} frames, {}",
                names::name_for_identifier(cursor.identifier()),
                cursor.frame_count(),
                scales.join(" ")
            ));
        }
        for line in lines {
            self.logs.update(&AppMsg::LogMessage(line));
        }
    }

    fn start_dump(&mut self) {
        if self.dump_cancel.is_some() {
            self.report("A dump is already running".to_string());
            return;
        }

        let output = std::env::temp_dir().join(format!("capectl-dump-{}.cape", uuid::Uuid::new_v4()));
        let cancel = Arc::new(AtomicBool::new(false));
        self.dump_cancel = Some(Arc::clone(&cancel));

        let provider = self.library.engine().provider().clone();
        DumpWorker::new(self.tx.clone()).start_dump(provider, output, cancel);
    }

    fn import_dump(&mut self, path: &Path) {
        match self.library.import_path(path) {
            Ok(identifier) => info!("Imported dump as {}", identifier),
            Err(e) => self.report(format!("{}: {}", e.title(), e)),
        }
        if let Err(e) = fs_ops::remove_if_exists(path) {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }

    fn refresh(&mut self) {
        let rows = self.library.capes().into_iter().map(CapeRow::from_cape).collect();
        self.library_view.set_rows(rows);
        self.library_view
            .set_applied(self.library.applied_identifier().map(str::to_string));
        self.library_view.double_action = self.library.engine().state().double_action();
        self.status.applied_name = self.library.applied().map(|c| c.name().to_string());
        self.status.scale = self.library.engine().scale();
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> anyhow::Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().ok();
    // LeaveAlternateScreen must be executed on the same stdout the backend uses
    let mut out = io::stdout();
    execute!(out, LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::status::DumpStatus;
    use crate::engine::Engine;
    use crate::model::{Bitmap, Cape, CapeMetadata, Cursor, Point, Scale, Size};
    use crate::state::DoubleAction;
    use crate::provider::{MemoryProvider, Registration};
    use crate::state::SystemState;
    use crossbeam_channel::unbounded;
    use image::RgbaImage;

    fn app(dir: &Path) -> App<MemoryProvider> {
        let registration = Registration {
            frames: vec![Bitmap::new(RgbaImage::new(4, 4))],
            frame_count: 1,
            frame_duration: 1.0,
            size: Size::new(4.0, 4.0),
            hot_spot: Point::new(0.0, 0.0),
        };
        let provider =
            MemoryProvider::with_system_cursors([(names::ARROW.to_string(), registration)]);
        let engine = Engine::new(provider, SystemState::in_memory());
        let mut library = Library::load(dir.join("capes"), dir.join("trash"), engine).unwrap();

        let mut cursor = Cursor::with_identifier(names::ARROW);
        cursor.set_representation(Scale::X1, Some(Bitmap::new(RgbaImage::new(4, 4))));
        library
            .import(Cape::from_parts(CapeMetadata::new("Tiny", "a", "local.a.Tiny"), vec![cursor]))
            .unwrap();

        let (tx, rx) = unbounded();
        App::new(library, tx, rx)
    }

    #[test]
    fn test_apply_and_remove_update_views() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert_eq!(app.library_view.rows.len(), 1);

        app.handle(AppMsg::ApplyRequested("local.a.Tiny".to_string()));
        app.drain();
        assert_eq!(app.status.applied_name.as_deref(), Some("Tiny"));
        assert_eq!(app.library_view.applied.as_deref(), Some("local.a.Tiny"));

        app.handle(AppMsg::RemoveRequested("local.a.Tiny".to_string()));
        app.drain();
        assert!(app.library_view.rows.is_empty());
        assert!(app.status.applied_name.is_none());
    }

    #[test]
    fn test_enter_uses_double_action_preference() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.library
            .engine_mut()
            .state_mut()
            .set_double_action(DoubleAction::Edit);
        app.refresh();

        app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert!(app.status.applied_name.is_none());
        assert!(app.logs.logs.iter().any(|l| l.contains("Tiny by a")));
        assert!(app.logs.logs.iter().any(|l| l.contains("Arrow: 1 frames, 1x")));
    }

    #[test]
    fn test_unknown_cape_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.handle(AppMsg::ApplyRequested("nope".to_string()));
        assert!(app.logs.logs.iter().any(|l| l.starts_with("ERROR: Unknown cape")));
    }

    #[test]
    fn test_dump_is_imported() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.handle(AppMsg::DumpRequested);

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while app.dump_cancel.is_some() && std::time::Instant::now() < deadline {
            if let Ok(msg) = app.rx.recv_timeout(Duration::from_millis(50)) {
                app.handle(msg);
            }
        }
        app.drain();

        assert!(matches!(app.status.status, DumpStatus::Completed(_)));
        assert_eq!(app.library_view.rows.len(), 2);
    }
}
