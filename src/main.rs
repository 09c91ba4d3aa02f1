mod api;
mod config;
mod error;
mod monitor;
mod notify;
mod store;
mod ui;

use api::binance::ws::FeedConnection;
use clap::Parser;
use config::Args;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use monitor::{Controller, ControllerHandle, MonitorEvent};
use notify::{DynError, TerminalSink};
use std::fs::{self, File};
use std::io::Write;
use store::{JsonFileStore, KeyValueStore, MemoryStore};
use tokio::sync::{broadcast, mpsc, watch};
use ui::dashboard::Dashboard;

fn init_logger(args: &Args) -> Result<(), DynError> {
    let crate_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .filter_module("pricewatch", crate_level)
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        });

    match args.log_path() {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let file = File::create(&path)?;
            builder
                .target(env_logger::Target::Pipe(Box::new(file)))
                .write_style(env_logger::WriteStyle::Never);
        }
        None => {
            builder
                .target(env_logger::Target::Stderr)
                .write_style(env_logger::WriteStyle::Auto);
        }
    }

    builder.init();
    Ok(())
}

fn open_store(args: &Args) -> Box<dyn KeyValueStore> {
    match JsonFileStore::open(&args.data_dir) {
        Ok(store) => {
            info!("Using data directory {}", args.data_dir.display());
            Box::new(store)
        }
        Err(e) => {
            error!(
                "Cannot open {} ({}), running without persistence",
                args.data_dir.display(),
                e
            );
            Box::new(MemoryStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), DynError> {
    let args = Args::parse();
    init_logger(&args)?;

    info!("Starting pricewatch...");

    // Create channels
    let (event_tx, _) = broadcast::channel::<MonitorEvent>(256);
    let (feed_tx, feed_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, commands) = ControllerHandle::channel(32);

    let mut controller = Controller::new(
        open_store(&args),
        Box::new(TerminalSink::new(!args.no_bell)),
        event_tx,
    );
    for arg in &args.watches {
        if let Err(e) = controller.add_watch(&arg.symbol, arg.lower, arg.upper) {
            warn!("Ignoring --watch {}: {}", arg.symbol, e);
        }
    }
    let dashboard_events = controller.subscribe();

    let controller_handle = tokio::spawn(controller.run(feed_rx, commands));

    let feed = FeedConnection::new(
        args.feed_url.clone(),
        args.reconnect_delay(),
        feed_tx,
        shutdown_rx,
    );
    let feed_handle = tokio::spawn(async move {
        if let Err(e) = feed.run().await {
            error!("Price feed failed: {}", e);
        }
    });

    if args.headless {
        drop(dashboard_events);
        tokio::signal::ctrl_c().await?;
        info!("Interrupted");
    } else if let Err(e) = Dashboard::new(handle.clone(), dashboard_events).run().await {
        error!("Dashboard error: {}", e);
    }

    // Stop reconnecting first so the feed is not left waiting on a dead controller.
    let _ = shutdown_tx.send(true);
    if let Err(e) = feed_handle.await {
        error!("Feed task panicked: {}", e);
    }
    handle.shutdown().await;
    if let Err(e) = controller_handle.await {
        error!("Controller task panicked: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
