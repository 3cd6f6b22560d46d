//! Releases escrow for every captured payment whose hold period has passed.
//! Meant to be run periodically (cron, systemd timer).

use std::sync::Arc;

use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flexhunt_checkout::{
    auth::JwtVerifier,
    config::Settings,
    payments::UnconfiguredGateway,
    service::{ServiceContext, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "release-matured", about = "Release matured escrow holds")]
struct Args {
    /// Database URL (defaults to the configured one)
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of payments to release in this run
    #[arg(long, default_value_t = 500)]
    limit: i64,

    /// List matured payments without releasing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flexhunt_checkout=info,release_matured=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    let database_url = args.database_url.unwrap_or_else(|| settings.database.url.clone());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Releasing escrow never talks to the gateway.
    let context = ServiceContext::new(
        db_pool,
        Arc::new(UnconfiguredGateway),
        Arc::new(JwtVerifier::new(&settings.auth)),
        Arc::new(SystemClock),
        settings.escrow.hold_days,
    );

    if args.dry_run {
        let matured = context.checkout_service.matured_payments(args.limit).await?;
        for payment in &matured {
            println!(
                "{}\t{}\t{} cents\tmatured {}{}",
                payment.id,
                payment.seller_id,
                payment.amount_cents,
                payment
                    .escrow_release_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
                if payment.is_disputed { "\tDISPUTED" } else { "" },
            );
        }
        println!("{} payment(s) ready for release", matured.len());
        return Ok(());
    }

    let released = context.checkout_service.release_matured(args.limit).await?;
    for id in &released {
        println!("released {}", id);
    }
    tracing::info!("Released {} payment(s)", released.len());

    Ok(())
}
