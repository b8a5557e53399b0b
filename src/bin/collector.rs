use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use winservice_monitoring::{
    ServicePlugin,
    actors::{scheduler::Scheduler, sink::ConfiguredSink},
    config::read_config_file,
    query::winrm::WinRmClient,
    util::{get_config_path, get_log_level},
};

/// Capacity of the event batch channel
const BATCH_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults to $WINSVC_CONFIG)
    #[arg(short)]
    file: Option<String>,

    /// Accept self-signed certificates on https targets
    #[arg(long)]
    insecure: bool,
}

fn init() {
    let level = get_log_level();
    let filter = filter::Targets::new().with_targets(vec![
        ("winservice_monitoring", level),
        ("winservice_collector", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let path = args.file.clone().unwrap_or_else(get_config_path);
    let config = read_config_file(&path)?;

    let client = if args.insecure {
        WinRmClient::insecure()?
    } else {
        WinRmClient::new()?
    };
    let plugin = Arc::new(ServicePlugin::new(Arc::new(client)));

    let (batch_tx, _) = broadcast::channel(BATCH_CHANNEL_CAPACITY);
    let mut sink = ConfiguredSink::spawn(config.sink.clone(), &batch_tx)?;

    let mut scheduler = Scheduler::new(plugin, batch_tx.clone());
    scheduler.sync(&config.targets).await;

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("reloading {path}");
                match read_config_file(&path) {
                    Ok(config) => {
                        if let Err(e) = sink.reconfigure(config.sink, &batch_tx).await {
                            error!("keeping previous event sink: {e:#}");
                        }
                        scheduler.sync(&config.targets).await;
                    }
                    Err(e) => error!("keeping previous configuration: {e:#}"),
                }
            }

            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                info!("shutting down");
                break;
            }
        }
    }

    scheduler.shutdown().await;

    match sink.handle().stats().await {
        Ok(stats) => debug!(
            "delivered {} batches, {} failed, {} lagged",
            stats.delivered, stats.failed, stats.lagged
        ),
        Err(e) => error!("{e:#}"),
    }
    sink.handle().shutdown().await?;

    Ok(())
}
