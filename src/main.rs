use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forge_relay::bus::{NatsBus, Publisher, RetryConfig};
use forge_relay::config::Config;
use forge_relay::directory::StaticDirectory;
use forge_relay::ingest::Ingestor;
use forge_relay::resolver::{AgentResolver, CachedResolver, HttpResolver, NullResolver};
use forge_relay::server::{build_router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("configuration error");

    let directory = StaticDirectory::from_toml_file(&config.registry_path)
        .expect("failed to load service registry");
    tracing::info!(
        services = directory.len(),
        registry = %config.registry_path.display(),
        "service registry loaded"
    );

    let bus = NatsBus::connect(&config.nats_url)
        .await
        .expect("failed to connect to message bus");
    tracing::info!(url = %config.nats_url, "connected to message bus");

    let resolver: Arc<dyn AgentResolver> = match &config.resolver_url {
        Some(url) => Arc::new(CachedResolver::new(
            HttpResolver::new(url.clone(), config.resolver_timeout),
            config.resolver_cache_ttl,
        )),
        None => {
            tracing::warn!("no identity resolver configured; agents will not be resolved");
            Arc::new(NullResolver)
        }
    };

    let publisher = Publisher::new(Arc::new(bus), RetryConfig::DEFAULT);
    let ingestor = Ingestor::new(Arc::new(directory), resolver, publisher);
    let app = build_router(AppState::new(ingestor));

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
