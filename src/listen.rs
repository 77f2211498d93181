//! Keeps the applied cape in place across user switches and display changes.

use crossbeam_channel::{Receiver, Sender, select};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::library::Library;
use crate::provider::CursorProvider;

/// Accounts that own the console while the login screen is up.
const LOGIN_USERS: [&str; 4] = ["loginwindow", "gdm", "lightdm", "sddm"];

/// Scale bump used to make the cursor subsystem redraw.
const SCALE_NUDGE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    UserChanged(String),
    DisplayReconfigured,
}

/// Blocks, re-applying the persisted cape on every session event, until
/// `stop` fires or the event channel closes.
pub fn listen<P: CursorProvider>(
    library: &mut Library<P>,
    events: &Receiver<SessionEvent>,
    stop: &Receiver<()>,
) {
    reapply(library);
    apply_default_scale(library);
    info!("Listening for user and display changes");

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(SessionEvent::UserChanged(user)) => {
                    if LOGIN_USERS.contains(&user.as_str()) {
                        debug!("Ignoring login screen user {}", user);
                        continue;
                    }
                    info!("User changed to {}", user);
                    reapply(library);
                    apply_default_scale(library);
                }
                Ok(SessionEvent::DisplayReconfigured) => {
                    info!("Display configuration changed");
                    reapply(library);
                    nudge_scale(library);
                }
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
    info!("Stopped listening");
}

fn reapply<P: CursorProvider>(library: &mut Library<P>) {
    library.engine_mut().state_mut().reload();
    let Some(identifier) = library.engine().state().applied_cape().map(str::to_string) else {
        debug!("No cape to re-apply");
        return;
    };

    let result = if library.contains(&identifier) {
        library.apply(&identifier)
    } else {
        let path = library.url_for_cape(&identifier);
        library.engine_mut().apply_path(&path).map(|_| ())
    };
    if let Err(e) = result {
        warn!("{}: {}", e.title(), e);
    }
}

fn apply_default_scale<P: CursorProvider>(library: &mut Library<P>) {
    if let Err(e) = library.engine_mut().apply_default_scale() {
        warn!("Could not set cursor scale: {}", e);
    }
}

fn nudge_scale<P: CursorProvider>(library: &mut Library<P>) {
    let engine = library.engine_mut();
    let scale = engine.scale();
    for value in [scale + SCALE_NUDGE, scale] {
        if let Err(e) = engine.set_scale(value) {
            warn!("Could not set cursor scale: {}", e);
        }
    }
}

/// Source of the facts the watcher compares between polls.
pub trait SessionProbe: Send {
    fn console_user(&self) -> Option<String>;

    fn display_signature(&self) -> Option<String>;
}

/// Reads the console owner and the set of display server sockets.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    display_dirs: Vec<PathBuf>,
}

impl Default for SystemProbe {
    fn default() -> Self {
        let mut display_dirs = vec![PathBuf::from("/tmp/.X11-unix")];
        if let Some(runtime) = dirs::runtime_dir() {
            display_dirs.push(runtime);
        }
        Self { display_dirs }
    }
}

impl SessionProbe for SystemProbe {
    #[cfg(unix)]
    fn console_user(&self) -> Option<String> {
        use std::os::unix::fs::MetadataExt;
        let uid = std::fs::metadata("/dev/console").ok()?.uid();
        if uid == 0 {
            return std::env::var("USER").ok();
        }
        Some(format!("uid:{}", uid))
    }

    #[cfg(not(unix))]
    fn console_user(&self) -> Option<String> {
        std::env::var("USERNAME").ok()
    }

    fn display_signature(&self) -> Option<String> {
        let mut sockets: Vec<String> = self
            .display_dirs
            .iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flatten()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with('X') || name.starts_with("wayland-"))
            .collect();
        sockets.sort();
        Some(sockets.join(","))
    }
}

/// Polls a probe on a background thread and reports changes as events.
pub struct SessionWatcher {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl SessionWatcher {
    pub fn spawn<S: SessionProbe + 'static>(
        probe: S,
        interval: Duration,
        tx: Sender<SessionEvent>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut user = probe.console_user();
            let mut display = probe.display_signature();

            while flag.load(Ordering::Relaxed) {
                thread::sleep(interval);

                let current_user = probe.console_user();
                if current_user != user {
                    user = current_user;
                    if let Some(name) = &user {
                        if tx.send(SessionEvent::UserChanged(name.clone())).is_err() {
                            break;
                        }
                    }
                }

                let current_display = probe.display_signature();
                if current_display != display {
                    display = current_display;
                    if tx.send(SessionEvent::DisplayReconfigured).is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            handle: Some(handle),
            running,
        }
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
