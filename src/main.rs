//! tallysync main entry point

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::watch;

use tallysync_api::start_server;
use tallysync_config::Config;
use tallysync_core::{scheduler, Extractor, Store};

#[derive(Parser, Debug)]
#[command(name = "tallysync")]
#[command(version = "0.1.0")]
#[command(about = "Pulls debtor/creditor balances from a Tally server and serves a dashboard API", long_about = None)]
struct Args {
    /// Override the API listen port (defaults to $PORT or 5000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Run a single extraction cycle and exit
    #[arg(long)]
    once: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let rt = Runtime::new()?;

    rt.block_on(async move {
        let mut config = Config::from_env()?;
        if let Some(port) = args.port {
            config.server.port = port;
        }

        if config.uses_default_api_key() {
            log::warn!("running with the built-in API key; set API_SECRET_KEY in production");
        }
        log::info!(
            "upstream={} db={} backups={} port={} interval={}s",
            config.upstream.url,
            config.storage.db_path.display(),
            config.storage.backup_dir.display(),
            config.server.port,
            config.upstream.interval_secs
        );

        let store = Arc::new(Store::new(&config));
        store.ensure_schema()?;

        let extractor = Arc::new(Extractor::new(&config)?);

        if args.once {
            let summary = extractor.run_cycle(&store).await;
            if !summary.persisted {
                log::warn!("single extraction cycle finished without persisting");
            }
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(scheduler::run(
            extractor,
            store.clone(),
            Duration::from_secs(config.upstream.interval_secs),
            shutdown_rx.clone(),
        ));

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });

        start_server(config, store, shutdown_rx).await?;

        log::info!("system stopped");
        Ok(())
    })
}
