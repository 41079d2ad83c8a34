//! Sayboard - voice input for on-screen keyboards
//!
//! Terminal front end for the model manager. Recognized text is printed to
//! stdout; single-letter commands on stdin drive the manager.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sayboard::config::{config_path, Config};
use sayboard::providers;
use sayboard::view::{ViewEvent, ViewHandle, ViewState};
use sayboard::{i18n, ModelManager, UserAction};
use std::io::BufRead;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONTROL_POLL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Audio input device index
    #[arg(short, long, global = true)]
    device: Option<usize>,

    /// Additional Wyoming server (tcp://host:port); enables the server provider
    #[arg(long, global = true)]
    server: Vec<String>,

    /// Directory scanned for local models, instead of the configured one
    #[arg(long, global = true)]
    models_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available recognizer sources
    List,
    /// Listen and print recognized text
    Listen {
        /// Start listening as soon as the recognizer is ready
        #[arg(short, long)]
        immediate: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    if !config_path().exists() {
        // First run: leave an editable file behind
        config.save()?;
    }
    if let Some(device) = args.device {
        config.audio_device = Some(device);
    }
    if let Some(dir) = &args.models_dir {
        config.models_dir = dir.clone();
    }
    if !args.server.is_empty() {
        config.server_enabled = true;
        config.servers.extend(args.server.iter().cloned());
    }

    // RUST_LOG wins over the configured level
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    i18n::init(Some(&config.ui_language));

    match args.command.unwrap_or(Command::Listen { immediate: false }) {
        Command::List => list(&config),
        Command::Listen { immediate } => {
            if immediate {
                config.listen_immediately = true;
            }
            listen(config)
        }
    }
}

fn list(config: &Config) -> Result<()> {
    let sources = providers::load_all(&providers::from_config(config));
    if sources.is_empty() {
        println!("{}", i18n::tr("mic_error_no_recognizers"));
    }
    for (i, source) in sources.iter().enumerate() {
        println!("[{}] {}  ({})", i, source.name(), source.id());
    }
    Ok(())
}

fn listen(config: Config) -> Result<()> {
    info!("🐧 Sayboard v{} starting...", env!("CARGO_PKG_VERSION"));

    let (view, events) = ViewHandle::channel();
    let printer = thread::Builder::new()
        .name("sayboard-view".to_string())
        .spawn(move || print_events(events))?;

    let mut manager = ModelManager::new(config, view)?;

    let control = manager.control_handle();
    thread::Builder::new()
        .name("sayboard-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.parse::<UserAction>() {
                    Ok(action) => {
                        if !control.send(action) {
                            break;
                        }
                    }
                    Err(()) => warn!("Unknown command '{}' (r/s/p/n/l/q)", line.trim()),
                }
            }
            // EOF behaves like quit
            control.send(UserAction::Shutdown);
        })?;

    info!("✅ Ready - r: start, p: pause, s: stop, n: next, l: reload, q: quit");

    while !manager.is_destroyed() {
        manager.process_next(CONTROL_POLL);
    }

    // Dropping the manager closes the view channel and ends the printer
    drop(manager);
    if printer.join().is_err() {
        warn!("View printer panicked");
    }
    Ok(())
}

fn print_events(events: Receiver<ViewEvent>) {
    for event in events {
        match event {
            ViewEvent::Name(name) => println!("🎙️ {}", name),
            ViewEvent::State(state) => println!("[{}]", i18n::tr(state_key(state))),
            ViewEvent::Error(message) => eprintln!("⚠️ {}", i18n::tr(message.key())),
            ViewEvent::Partial(partial) => eprintln!("… {}", partial),
            ViewEvent::Text(text) => println!("{}", text),
        }
    }
}

fn state_key(state: ViewState) -> &'static str {
    match state {
        ViewState::Initial => "state_initial",
        ViewState::Loading => "state_loading",
        ViewState::Ready => "state_ready",
        ViewState::Listening => "state_listening",
        ViewState::Paused => "state_paused",
        ViewState::Error => "state_error",
    }
}
