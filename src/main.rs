use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slotguard::authority::AuthorityClient;
use slotguard::config::Config;
use slotguard::db::{AppState, DbPool, create_pool, init_db, queries};
use slotguard::handlers;
use slotguard::handshake::OwnershipVerifier;
use slotguard::ledger::PurchaseLedger;
use slotguard::slots::SlotManager;
use slotguard::status::StatusEvaluator;

#[derive(Parser, Debug)]
#[command(name = "slotguard")]
#[command(about = "Purchase-code verification and slot accounting for licensed deployments")]
struct Cli {
    /// Re-fetch one purchase code from the purchase authority, print the result and exit
    #[arg(long, value_name = "CODE")]
    refresh_code: Option<String>,
}

/// Force a ledger refresh for one purchase code.
async fn refresh_code(pool: &DbPool, ledger: &PurchaseLedger, code: &str) -> Result<(), String> {
    let record = ledger
        .resolve(pool, code, true)
        .await
        .map_err(|e| format!("Lookup failed: {}", e))?
        .ok_or_else(|| format!("Purchase code {} is not known to the authority", code))?;

    println!("OK");
    println!("  buyer: {}", record.buyer);
    println!("  product: {} ({})", record.product_name, record.product_id);
    println!("  license: {}", record.license_tier);
    if let Some(ref supported_until) = record.supported_until {
        println!("  supported until: {}", supported_until);
    }

    let conn = pool
        .get()
        .map_err(|e| format!("Failed to get database connection: {}", e))?;
    let registrations = queries::list_registrations(&conn, code)
        .map_err(|e| format!("Failed to list registrations: {}", e))?;
    for registration in registrations {
        println!(
            "  [{}] {} ({}) from {}",
            if registration.revoked { "revoked" } else { "active" },
            registration.domain,
            registration.environment.as_ref(),
            registration.server_address
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotguard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.authority.token.is_empty() {
        tracing::warn!("AUTHORITY_TOKEN is not set: purchase lookups will be rejected");
    }
    if config.policy.allowed_product_ids.is_empty() {
        tracing::warn!("ALLOWED_PRODUCT_IDS is empty: every activation will be refused");
    }
    if !config.handshake.enabled {
        tracing::warn!("Ownership handshake DISABLED: domains are taken at their word");
    }

    // Create database connection pool and schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let authority =
        AuthorityClient::new(&config.authority).expect("Failed to build purchase authority client");
    let ledger = PurchaseLedger::new(authority, config.authority.cache_ttl_days);

    // Handle single-code refresh (don't start server)
    if let Some(ref code) = cli.refresh_code {
        if let Err(e) = refresh_code(&db_pool, &ledger, code.trim()).await {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let verifier =
        OwnershipVerifier::new(&config.handshake).expect("Failed to build handshake client");
    let policy = Arc::new(config.policy.clone());

    let state = AppState {
        db: db_pool.clone(),
        slots: SlotManager::new(db_pool.clone(), ledger, verifier, policy.clone()),
        status: StatusEvaluator::new(db_pool, policy),
        trust_proxy_headers: config.trust_proxy_headers,
        maintenance_mode: config.maintenance_mode,
    };

    if state.maintenance_mode {
        tracing::warn!("MAINTENANCE MODE: activations will be refused");
    }

    let app = Router::new()
        .merge(handlers::public::router(config.rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("slotguard listening on {}", addr);

    // Peer addresses feed both rate limiting and registration records
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
