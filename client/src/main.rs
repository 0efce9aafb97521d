//! stockroom-watch - follow one table live from the terminal.
//!
//! Usage: `stockroom-watch [target] [page]`, e.g. `stockroom-watch docs_sales 2`.
//! Connection settings come from the environment (see [`Config`]).

use stockroom_client::{Config, Gateway, LiveTable, RealtimeChannel, TableOptions};
use stockroom_engine::EntityKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockroom_client=debug,stockroom_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let mut args = std::env::args().skip(1);
    let kind: EntityKind = match args.next() {
        Some(target) => target.parse()?,
        None => EntityKind::DocsWarehouse,
    };
    let page: u32 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 1,
    };

    tracing::info!(entity = %kind, page = page, "Starting stockroom-watch");

    let channel = RealtimeChannel::connect(&config.ws_url).await?;
    let mut table = LiveTable::new(
        Gateway::from_config(&config),
        TableOptions::from_config(kind, &config),
    );
    table.attach(channel.subscribe(kind));
    table.set_page(page).await?;

    tracing::info!(
        rows = table.records().len(),
        count = table.count(),
        "Watching for changes"
    );

    loop {
        tokio::select! {
            change = table.next_change() => match change {
                Some(summary) if !summary.is_noop() => {
                    tracing::info!(
                        rows = table.records().len(),
                        count = table.count(),
                        inserted = summary.inserted,
                        merged = summary.merged,
                        removed = summary.removed,
                        "Table changed"
                    );
                }
                Some(_) => {}
                None => {
                    tracing::warn!("Realtime channel closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    channel.close().await;
    Ok(())
}
