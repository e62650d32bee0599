use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tenantix_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    payment::{PaymentState, StripeGateway},
    store::{MemoryDocumentStore, PostgresDocumentStore, StoreState},
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the document store and the payment gateway,
/// then serves the API until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tenantix_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Document store: one handle for the whole process lifetime.
    let store: StoreState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            let store = PostgresDocumentStore::new(pool);
            store
                .ensure_schema()
                .await
                .expect("FATAL: Failed to create the documents table.");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory document store");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    // 4. Payment provider
    let payments: PaymentState = Arc::new(StripeGateway::new(
        &config.payment_api_base,
        &config.payment_secret,
    ));

    // 5. Router and server
    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState::new(store, payments, config));

    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Tenantix server is running on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
