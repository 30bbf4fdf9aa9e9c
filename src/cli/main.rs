use bgp_listener::{
    webhook_url_from_env, Counters, Dispatcher, ListenerConfig, ListenerError, RisLiveConnector,
    StatsReporter, StreamClient, Watchlist, WebhookSink,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file (JSON); settings can be overridden with BGP_LISTENER_* env variables
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// disable logging
    #[clap(long, global = true)]
    no_log: bool,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen to RIS Live and send notifications for matching updates (default)
    Run {},

    /// Validate the configuration and print a summary
    Check {},
}

fn enable_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bgp_listener=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_level(true)
        .with_target(false)
        .init();
}

fn get_tokio_runtime() -> Runtime {
    // the stream pipeline is a single sequential flow, one thread is enough
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start async runtime: {}", e);
            exit(1);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> ListenerConfig {
    match ListenerConfig::load(path.map(|p| p.as_path())) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            exit(1);
        }
    }
}

async fn run_listener(
    config: ListenerConfig,
    watchlist: Watchlist,
    sink: WebhookSink,
) -> Result<(), ListenerError> {
    let counters = Arc::new(Counters::new(&config.ris_collectors));
    let dispatcher = Dispatcher::new(sink, config.retry_policy(), counters.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt signal, shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut client = StreamClient::new(
        RisLiveConnector,
        dispatcher,
        Arc::new(watchlist),
        counters.clone(),
    )
    .endpoint(&config.stream_url)
    .collectors(&config.ris_collectors)
    .reconnect_policy(config.reconnect_policy())
    .shutdown_signal(shutdown_rx);

    let reporter = StatsReporter::start(counters, config.stats_interval());
    let res = client.run().await;
    reporter.stop().await;
    res
}

fn main() {
    let cli = Cli::parse();

    if !cli.no_log {
        enable_logging();
    }

    let config = load_config(cli.config.as_ref());
    let watchlist = config.watchlist();

    match cli.command.unwrap_or(Commands::Run {}) {
        Commands::Check {} => {
            for line in config.display_summary(&watchlist) {
                println!("{}", line);
            }
        }
        Commands::Run {} => {
            let sink = match webhook_url_from_env().and_then(WebhookSink::new) {
                Ok(sink) => sink,
                Err(e) => {
                    error!("{}", e);
                    eprintln!("Error: {}", e);
                    exit(1);
                }
            };

            for line in config.display_summary(&watchlist) {
                info!("{}", line);
            }

            let rt = get_tokio_runtime();
            if let Err(e) = rt.block_on(run_listener(config, watchlist, sink)) {
                error!("listener stopped: {}", e);
                exit(1);
            }
        }
    }
}
