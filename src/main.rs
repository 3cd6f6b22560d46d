use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flexhunt_checkout::{
    api,
    auth::JwtVerifier,
    config::Settings,
    payments::{PayPalClient, PaymentGateway, UnconfiguredGateway},
    service::{ServiceContext, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flexhunt_checkout=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting checkout server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Initialize the payment gateway if configured
    let gateway: Arc<dyn PaymentGateway> = match PayPalClient::from_config(&settings.gateway)? {
        Some(client) => {
            tracing::info!("PayPal gateway enabled at {}", settings.gateway.base_url);
            Arc::new(client)
        }
        None => {
            tracing::warn!("PayPal credentials missing; checkout calls will fail until FLEXHUNT__GATEWAY__CLIENT_ID and FLEXHUNT__GATEWAY__CLIENT_SECRET are set");
            Arc::new(UnconfiguredGateway)
        }
    };

    let identity_verifier = Arc::new(JwtVerifier::new(&settings.auth));
    if settings.auth.jwt_secret == "change-me-in-production" {
        tracing::warn!("Using the default JWT secret; set FLEXHUNT__AUTH__JWT_SECRET");
    }

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        db_pool,
        gateway,
        identity_verifier,
        Arc::new(SystemClock),
        settings.escrow.hold_days,
    ));

    tracing::info!(
        "Escrow hold {} days; allowed origins: {:?}",
        settings.escrow.hold_days,
        settings.cors.allowed_origins
    );

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
