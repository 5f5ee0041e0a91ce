use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use integrations::store::{KvStore, MemoryStore, RedisStore};
use integrations::{api, config, jobs, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port, memory_store }) => {
            run_server(cfg, port, memory_store).await
        }
        Some(cli::Commands::Authorize { user_id, org_id }) => {
            let store = RedisStore::connect(&cfg.redis_url).await?;
            let state = AppState::new(&cfg, Arc::new(store))?;
            let url = state.hubspot.authorize(&user_id, &org_id).await?;
            println!("{}", url);
            Ok(())
        }
        Some(cli::Commands::Items { credentials }) => {
            // no OAuth state is touched when fetching
            let state = AppState::new(&cfg, Arc::new(MemoryStore::new()))?;
            let items = state.hubspot.get_items(&credentials).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
        None => run_server(cfg, None, false).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "integrations=debug,tower_http=debug".into()),
    );
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(cfg: config::Config, port: Option<u16>, memory_store: bool) -> anyhow::Result<()> {
    let store: Arc<dyn KvStore> = if memory_store {
        tracing::warn!("Using in-memory store; OAuth state will not survive restarts");
        let store = MemoryStore::new();
        jobs::cleanup::spawn(store.clone());
        Arc::new(store)
    } else {
        tracing::info!("Connecting to Redis...");
        Arc::new(RedisStore::connect(&cfg.redis_url).await?)
    };

    let state = Arc::new(AppState::new(&cfg, store)?);
    let app = api::app(state, &cfg.dashboard_origin);

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(cfg.port)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        redirect_uri = %cfg.hubspot.redirect_uri,
        "integrations server listening on {}",
        addr
    );
    axum::serve(listener, app).await?;

    Ok(())
}
