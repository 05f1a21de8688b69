use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use tablebook::config::Config;
use tablebook::console;
use tablebook::engine::Engine;
use tablebook::store::{ReservationStore, WalStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    tablebook::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(WalStore::open(&config.journal_path())?);
    tokio::spawn(tablebook::compactor::run_compactor(
        store.clone(),
        config.compact_threshold,
        config.compact_interval,
    ));

    if store.fetch_restaurant(config.restaurant_id).await?.is_none() {
        tracing::warn!(
            restaurant_id = config.restaurant_id,
            "restaurant not registered yet; INSERT INTO restaurants before adding tables"
        );
    }

    let engine = Engine::new(store, config.restaurant_id);
    info!("tablebook console ready");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  restaurant: {}", config.restaurant_id);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("input closed");
                    break;
                };
                let output = console::run_line(&engine, &line).await;
                if !output.is_empty() {
                    stdout.write_all(output.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("tablebook stopped");
    Ok(())
}
