//! Pico Mod host build
//!
//! Runs the footswitch engine on a desktop: the store lives in sled, MIDI goes
//! through system ports and the host protocol is served over TCP or stdio.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use picomod::cli;
use picomod::config::AppConfig;
use picomod::device::{input_queue, Device};
use picomod::hardware::midi_port::{self, MidirOut};
use picomod::protocol::link::{self, HostRequest, HostSessions};
use picomod::protocol::FirmwareInfo;
use picomod::store::layout::{
    ACTION_RECORD_LEN, GLOBAL_RECORD_LEN, PRESET_HEADER_LEN, PRESET_RECORD_LEN, STORE_CAPACITY,
};
use picomod::store::{ConfigStore, SledStore};
use picomod::{paths::AppPaths, Hardware, MAX_ACTIONS, NUM_PRESETS};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pico Mod - MIDI footswitch engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the application data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Print the store layout
    #[arg(long)]
    print_system: bool,

    /// Erase the store to factory defaults and exit
    #[arg(long)]
    factory_reset: bool,

    /// Serve the host protocol on stdin/stdout instead of TCP
    #[arg(long, conflicts_with = "console")]
    stdio: bool,

    /// Interactive footswitch console
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        midi_port::list_ports_formatted()?;
        return Ok(());
    }

    if args.print_system {
        print_system();
        return Ok(());
    }

    let paths = AppPaths::detect();
    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    info!("Starting Pico Mod v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());

    let config = AppConfig::load_or_default(&config_path).await?;
    let store = open_store(&config, &paths)?;

    if args.factory_reset {
        let mut store = store;
        store.factory_reset().context("Factory reset failed")?;
        println!("{}", "Store reset to factory defaults".green().bold());
        return Ok(());
    }

    run_app(args, config, store).await?;

    info!("Pico Mod shutdown complete");
    Ok(())
}

fn open_store(config: &AppConfig, paths: &AppPaths) -> Result<ConfigStore<SledStore>> {
    let store_path = match &config.storage.path {
        Some(path) => path.clone(),
        None => {
            paths.ensure_directories()?;
            paths.store_path()
        }
    };

    let backend = SledStore::open(&store_path, STORE_CAPACITY)
        .with_context(|| format!("Failed to open store at {}", store_path.display()))?;
    ConfigStore::new(backend).context("Store too small for the record layout")
}

async fn run_app(args: Args, config: AppConfig, store: ConfigStore<SledStore>) -> Result<()> {
    let (input_tx, mut input_rx) = input_queue(config.input.queue_capacity);
    let (host_tx, mut host_rx) = mpsc::channel::<HostRequest>(16);

    let mut hardware = Hardware::logged(config.device.led_count);
    if let Some(pattern) = &config.midi.output_port {
        match MidirOut::connect(pattern) {
            Ok(out) => hardware = hardware.with_midi(Box::new(out)),
            Err(e) => warn!("MIDI output unavailable, logging instead: {:#}", e),
        }
    }

    // Input stays connected while the handle lives
    let _midi_in = match &config.midi.input_port {
        Some(pattern) => match midi_port::connect_input(pattern, input_tx.clone()) {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("MIDI input unavailable: {:#}", e);
                None
            }
        },
        None => None,
    };

    let mut device = Device::start(store, hardware).context("Boot failed")?;
    let mut sessions = HostSessions::new(FirmwareInfo::new(config.device.hw_version.clone()));
    let announcement = sessions.announcement(&device)?;

    let mut host_task: JoinHandle<Result<()>> = if args.stdio {
        info!("Serving host protocol on stdio");
        tokio::spawn(link::handle_client(
            0,
            tokio::io::stdin(),
            tokio::io::stdout(),
            host_tx,
            Some(announcement),
        ))
    } else {
        // No host is connected yet at boot
        info!("Boot announcement: {}", announcement);
        let addr = config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;
        tokio::spawn(link::serve_tcp(listener, host_tx))
    };

    let mut console = args.console.then(|| {
        let events = input_tx.clone();
        tokio::task::spawn_blocking(move || cli::run_console(events))
    });

    info!("Ready to process input events!");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = input_rx.recv() => {
                if let Err(e) = device.handle_input(event) {
                    warn!("Input {:?} failed: {}", event, e);
                }
            }

            Some(request) = host_rx.recv() => {
                sessions.handle(&mut device, request);
            }

            result = &mut host_task => {
                match result.context("Host task panicked")? {
                    Ok(()) => info!("Host link closed"),
                    Err(e) => warn!("Host link failed: {:#}", e),
                }
                break;
            }

            result = console_finished(&mut console) => {
                if let Err(e) = result {
                    warn!("Console stopped: {:#}", e);
                }
                info!("Console closed");
                break;
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    host_task.abort();
    let handled = device.drain(&mut input_rx);
    if handled > 0 {
        info!("Handled {} queued input events before exit", handled);
    }
    Ok(())
}

/// Resolves when the console thread exits; never, when there is none
async fn console_finished(console: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    match console {
        Some(handle) => handle.await.context("Console thread panicked")?,
        None => std::future::pending().await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // stdout may carry the host protocol
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_system() {
    println!("\n{}", "=== Pico Mod System ===".bold().cyan());
    println!("  Version:        {}", env!("CARGO_PKG_VERSION").green());
    println!("  Presets:        {}", NUM_PRESETS.to_string().green());
    println!("  Actions/preset: {}", MAX_ACTIONS.to_string().green());

    println!("\n{}", "Record sizes:".bold());
    println!("  Global config:  {} bytes", GLOBAL_RECORD_LEN.to_string().yellow());
    println!("  Action:         {} bytes", ACTION_RECORD_LEN.to_string().yellow());
    println!(
        "  Preset:         {} bytes ({} header + {} x {})",
        PRESET_RECORD_LEN.to_string().yellow(),
        PRESET_HEADER_LEN,
        MAX_ACTIONS,
        ACTION_RECORD_LEN
    );

    println!("\n{}", "Layout:".bold());
    println!("  Global config:  offset {}", "0".yellow());
    println!(
        "  Preset i:       offset {} + i x {}",
        GLOBAL_RECORD_LEN.to_string().yellow(),
        PRESET_RECORD_LEN
    );
    println!("  Store capacity: {} bytes", STORE_CAPACITY.to_string().green().bold());
    println!();
}
