use payments_broker::api::{router, AppState};
use payments_broker::cache::{InMemoryStatusStore, StatusOverrideStore};
use payments_broker::config::Config;
use payments_broker::payments::providers::{MercadoPagoProvider, StripeProvider};
use payments_broker::payments::PaymentService;
use payments_broker::webhooks::{WebhookReceiver, WebhookSecrets};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting payments broker");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Stripe API: {}", config.stripe.api_base);
    tracing::info!("Mercado Pago API: {}", config.mercado_pago.api_base);

    let stripe = Arc::new(StripeProvider::new(config.stripe.clone())?);
    let mercado_pago = Arc::new(MercadoPagoProvider::new(config.mercado_pago.clone())?);
    let public_key = mercado_pago.public_key().to_string();

    let store = build_override_store(&config).await?;
    tracing::info!("Status override store: {}", store.backend());

    let state = AppState {
        payments: PaymentService::new(stripe, mercado_pago, store.clone()),
        webhooks: WebhookReceiver::new(store, WebhookSecrets::from_config(&config)),
        public_key,
        environment: config.server.environment.clone(),
    };

    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(feature = "cache")]
async fn build_override_store(config: &Config) -> anyhow::Result<Arc<dyn StatusOverrideStore>> {
    use payments_broker::cache::redis::{init_pool, RedisPoolConfig};
    use payments_broker::cache::RedisStatusStore;

    let Some(url) = config.redis.url.clone() else {
        return Ok(Arc::new(InMemoryStatusStore::new()));
    };

    let pool = init_pool(RedisPoolConfig {
        redis_url: url,
        ..Default::default()
    })
    .await?;
    Ok(Arc::new(RedisStatusStore::new(pool)))
}

#[cfg(not(feature = "cache"))]
async fn build_override_store(config: &Config) -> anyhow::Result<Arc<dyn StatusOverrideStore>> {
    if config.redis.url.is_some() {
        tracing::warn!("REDIS_URL is set but the cache feature is disabled, using memory store");
    }
    Ok(Arc::new(InMemoryStatusStore::new()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
