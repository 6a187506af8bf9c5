//! Periodic extraction loop
//!
//! One cycle at startup, then a fixed cadence. The run guard exists because
//! replace-all persistence is not safe under concurrent writers: if a cycle
//! is somehow still in flight when the next tick fires, the tick is skipped
//! rather than queued.

use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::extract::Extractor;
use crate::store::Store;

/// Drive extraction cycles until shutdown is signalled.
///
/// The first tick fires immediately (the startup extraction), subsequent
/// ticks follow the configured interval. An in-flight cycle is allowed to
/// finish during shutdown; the transactional replace bounds any damage if
/// the process is killed outright.
pub async fn run(
    extractor: Arc<Extractor>,
    store: Arc<Store>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let guard = Mutex::new(());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_guarded(&guard, &extractor, &store).await;
            }
            _ = shutdown.changed() => {
                info!("scheduler stopping");
                break;
            }
        }
    }
}

async fn run_guarded(guard: &Mutex<()>, extractor: &Extractor, store: &Store) {
    match guard.try_lock() {
        Ok(_running) => {
            extractor.run_cycle(store).await;
        }
        Err(_) => {
            warn!("extraction cycle already in progress; skipping this tick");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let mut config = tallysync_config::Config::default();
        let dir = tempfile::tempdir().unwrap();
        config.upstream.url = "http://127.0.0.1:1".to_string();
        config.storage.db_path = dir.path().join("tally_data.db");
        config.storage.backup_dir = dir.path().join("backups");
        config.storage.dump_dir = dir.path().to_path_buf();

        let extractor = Arc::new(Extractor::new(&config).unwrap());
        let store = Arc::new(Store::new(&config));
        store.ensure_schema().unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(extractor, store, Duration::from_secs(3600), rx));

        // let the startup cycle run, then signal shutdown
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop after shutdown signal")
            .unwrap();
    }
}
