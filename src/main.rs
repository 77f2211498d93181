use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use capectl::app::App;
use capectl::codec;
use capectl::config::Config;
use capectl::engine::Engine;
use capectl::error::CapeError;
use capectl::event::{AppMsg, LogForwarder};
use capectl::library::Library;
use capectl::listen::{self, SessionWatcher, SystemProbe};
use capectl::model::CapeMetadata;
use capectl::model::cape::{default_author, timestamp};
use capectl::pipeline::{convert, create, export, write_cape_file};
use capectl::provider::{CursorProvider, MemoryProvider, XcursorThemeProvider};
use capectl::state::{MemoryPreferences, PreferenceStore, SystemState, TomlPreferences};

#[derive(Parser, Debug)]
#[command(name = "capectl", version, about = "Manage and apply cursor capes")]
struct Cli {
    /// Use an in-memory provider and leave preferences untouched
    #[arg(long, global = true)]
    dry_run: bool,

    /// Config file (defaults to <config_dir>/capectl/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a cape file
    Apply { path: PathBuf },
    /// Restore the system cursors
    Reset,
    /// Build a cape from a directory of cursor images or a MightyMouse file
    Create {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        identifier: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        version: f64,
        #[arg(long)]
        hidpi: bool,
    },
    /// Convert a MightyMouse file to a cape
    Convert {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Snapshot the live cursors into a cape
    Dump { output: PathBuf },
    /// Write every image of a cape as PNG
    Export {
        cape: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the cursor scale, or set it
    Scale { value: Option<f32> },
    /// Keep the applied cape in place across user and display changes
    Listen,
    /// List the library
    List,
    /// Browse the library in the terminal
    Tui,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run_cli(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Command::Tui);

    let (tx, rx) = unbounded();
    let tui = matches!(command, Command::Tui);
    init_tracing(tui.then(|| tx.clone()));

    let preferences = TomlPreferences::new(&config.preferences_path);
    if cli.dry_run {
        info!("Dry run: nothing is registered or persisted");
        let state = SystemState::new(MemoryPreferences::new(preferences.load()));
        run(MemoryProvider::new(), state, &config, command, tx, rx)
    } else {
        let mut provider =
            XcursorThemeProvider::new(&config.theme_dir).with_system_theme(&config.system_theme);
        if let Some(icons) = config.theme_dir.parent() {
            provider = provider.with_default_theme_dir(icons.join("default"));
        }
        run(provider, SystemState::new(preferences), &config, command, tx, rx)
    }
}

fn init_tracing(forward: Option<Sender<AppMsg>>) {
    let filter =
        EnvFilter::try_from_env("CAPECTL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match forward {
        Some(tx) => builder
            .with_ansi(false)
            .without_time()
            .with_writer(move || LogForwarder::new(tx.clone()))
            .init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn user_error(e: CapeError) -> anyhow::Error {
    anyhow!("{}: {}", e.title(), e)
}

fn run<P>(
    provider: P,
    state: SystemState,
    config: &Config,
    command: Command,
    tx: Sender<AppMsg>,
    rx: Receiver<AppMsg>,
) -> Result<()>
where
    P: CursorProvider + Clone + Send + 'static,
{
    let mut engine = Engine::new(provider, state);

    match command {
        Command::Apply { path } => {
            let cape = engine.apply_path(&path).map_err(user_error)?;
            println!("Applied {} ({})", cape.name(), cape.identifier());
        }
        Command::Reset => {
            engine.restore();
            println!("Restored system cursors");
        }
        Command::Create {
            input,
            output,
            name,
            author,
            identifier,
            version,
            hidpi,
        } => {
            let name = name.unwrap_or_else(|| file_stem(&input));
            let author = author.unwrap_or_else(default_author);
            let identifier = identifier
                .unwrap_or_else(|| format!("local.{}.{}.{}", author, name, timestamp()));
            let mut meta = CapeMetadata::new(name, author, identifier);
            meta.version = version;
            meta.hidpi = hidpi;

            let cape = if input.is_dir() {
                create::cape_from_directory(&input, meta, |msg| info!("{}", msg))?
            } else {
                let bytes = fs::read(&input)
                    .with_context(|| format!("Failed to read {}", input.display()))?;
                convert::cape_from_mighty_mouse(&bytes, meta).map_err(user_error)?
            };
            write_cape_file(&cape, &output).map_err(user_error)?;
            println!("Wrote {} cursors to {}", cape.cursor_count(), output.display());
        }
        Command::Convert { input, output } => {
            let name = file_stem(&input);
            let identifier = format!("local.import.{}.{}", name, timestamp());
            let meta = CapeMetadata::new(name, "Unknown", identifier);

            let bytes =
                fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            let cape = convert::cape_from_mighty_mouse(&bytes, meta).map_err(user_error)?;
            write_cape_file(&cape, &output).map_err(user_error)?;
            println!("Converted {} cursors to {}", cape.cursor_count(), output.display());
        }
        Command::Dump { output } => {
            let dumped = engine
                .dump(|current, total| {
                    info!("Dumping cursor {}/{}", current, total);
                    true
                })
                .map_err(user_error)?;
            let cape = dumped.ok_or_else(|| anyhow!("Dump was cancelled"))?;
            write_cape_file(&cape, &output).map_err(user_error)?;
            println!("Dumped {} cursors to {}", cape.cursor_count(), output.display());
        }
        Command::Export { cape, output } => {
            let cape = codec::read_cape(&cape)
                .with_context(|| format!("Failed to read {}", cape.display()))?;
            let files = export::export_cape(&cape, &output, |msg| info!("{}", msg))?;
            println!("Exported {} images to {}", files.len(), output.display());
        }
        Command::Scale { value: None } => println!("{}", engine.scale()),
        Command::Scale { value: Some(value) } => {
            engine.set_scale(value).map_err(user_error)?;
            engine.state_mut().set_default_cursor_scale(value);
        }
        Command::Listen => {
            let mut library = load_library(engine, config)?;
            let (events_tx, events_rx) = unbounded();
            let interval = Duration::from_millis(config.listen_interval_ms.max(100));
            let watcher = SessionWatcher::spawn(SystemProbe::default(), interval, events_tx);
            listen::listen(&mut library, &events_rx, &crossbeam_channel::never());
            watcher.stop();
        }
        Command::List => {
            let library = load_library(engine, config)?;
            for cape in library.capes() {
                let marker = if library.applied_identifier() == Some(cape.identifier()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {} by {} ({}, {} cursors)",
                    marker,
                    cape.name(),
                    cape.author(),
                    cape.identifier(),
                    cape.cursor_count()
                );
            }
        }
        Command::Tui => {
            let library = load_library(engine, config)?;
            App::new(library, tx, rx).run()?;
        }
    }
    Ok(())
}

fn load_library<P: CursorProvider>(engine: Engine<P>, config: &Config) -> Result<Library<P>> {
    Library::load(config.library_dir.clone(), config.trash_dir.clone(), engine)
        .with_context(|| format!("Failed to load library {}", config.library_dir.display()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unnamed")
        .to_string()
}
