//! PressOne Server
//!
//! Press-1 IVR call lifecycle and billing reconciliation engine: dials
//! campaigns through Asterisk, reconciles DTMF/hangup/payment callbacks into
//! the prepaid ledger and serves the management API.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use pressone_ami::AmiClient;
use pressone_api::{
    configure_accounts, configure_calls, configure_campaigns, configure_credit_packages,
    configure_payments, configure_stats, configure_webhooks, json_config, ws_handler, Dispatcher,
    Gateway,
};
use pressone_auth::JwtService;
use pressone_core::models::CreditPackage;
use pressone_core::traits::{
    AccountRepository, CallRepository, CampaignRepository, CreditPackageRepository,
    SwitchClient, TrunkRepository,
};
use pressone_core::{AppConfig, BillingCalculator};
use pressone_db::{
    create_pool_from_config, run_migrations, PgAccountRepository, PgCallRepository,
    PgCampaignRepository, PgCreditPackageRepository, PgLedgerStore, PgTrunkRepository,
};
use pressone_services::constants::NOTIFY_CAPACITY;
use pressone_services::{
    EventIngestion, EventIngestor, KeyedLocks, Notifier, Reconciler, StaleCallSweeper,
};
use sqlx::PgPool;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "pressone",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Switch and payment processor callbacks
        .configure(configure_webhooks)
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(health_check))
                .configure(configure_campaigns)
                .configure(configure_accounts)
                .configure(configure_calls)
                .configure(configure_payments)
                .configure(configure_credit_packages)
                // Admin only
                .configure(configure_stats),
        );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pressone={},pressone_api={},pressone_services={},pressone_ami={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    let json = env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json().with_current_span(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Insert the built-in credit packages when the catalog is empty
async fn seed_credit_packages(pool: &PgPool) -> anyhow::Result<()> {
    let repo = PgCreditPackageRepository::new(pool.clone());
    if !repo.list(true).await?.is_empty() {
        return Ok(());
    }

    for package in CreditPackage::defaults() {
        repo.upsert(&package).await?;
    }
    info!("Seeded default credit packages");
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting PressOne v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("failed to load configuration")?;

    info!("Connecting to database...");
    let pool = create_pool_from_config(&config.database).await?;
    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }
    seed_credit_packages(&pool).await?;

    // Auth
    let jwt_service = Arc::new(JwtService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_secs,
    ));

    // Repositories
    let calls: Arc<dyn CallRepository> = Arc::new(PgCallRepository::new(pool.clone()));
    let campaigns: Arc<dyn CampaignRepository> = Arc::new(PgCampaignRepository::new(pool.clone()));
    let accounts: Arc<dyn AccountRepository> = Arc::new(PgAccountRepository::new(pool.clone()));
    let trunks: Arc<dyn TrunkRepository> = Arc::new(PgTrunkRepository::new(pool.clone()));
    let ledger = Arc::new(PgLedgerStore::new(pool.clone()));

    // Switch
    let ami = Arc::new(AmiClient::new(config.ami.clone(), &config.dialer));
    match tokio::time::timeout(
        Duration::from_secs(config.ami.connect_timeout_secs.max(1) * 2),
        ami.ping(),
    )
    .await
    {
        Ok(Ok(())) => info!("Asterisk manager reachable at {}:{}", config.ami.host, config.ami.port),
        Ok(Err(e)) => warn!("Asterisk manager not reachable yet: {}", e),
        Err(_) => warn!("Asterisk manager ping timed out"),
    }
    let switch: Arc<dyn SwitchClient> = ami.clone();

    // Services
    let notifier = Notifier::new(NOTIFY_CAPACITY);
    let reconciler = Arc::new(Reconciler::new(
        ledger,
        BillingCalculator::from_config(&config.billing),
        KeyedLocks::new(config.dialer.lock_shards),
        notifier.clone(),
    ));
    info!(
        "Billing: {} per minute, minimum {}s, increment {}s, pre-call check {}",
        config.billing.rate_per_minute,
        config.billing.min_billable_seconds,
        config.billing.billing_increment_seconds,
        config.billing.precall_check
    );

    let ingestion: Arc<dyn EventIngestion> = Arc::new(EventIngestor::new(reconciler.clone()));
    let gateway: Arc<Gateway> = Arc::new(Gateway::new(
        switch,
        calls.clone(),
        trunks.clone(),
        accounts,
        reconciler.clone(),
        config.billing.clone(),
        config.dialer.default_caller_id.clone(),
    ));
    let dispatcher: Arc<Dispatcher> = Arc::new(Dispatcher::new(
        gateway.clone(),
        campaigns,
        calls.clone(),
        trunks,
        notifier.clone(),
        config.dialer.clone(),
    ));

    let background = CancellationToken::new();
    if config.dialer.enabled {
        dispatcher.resume_running().await?;

        let sweeper = StaleCallSweeper::new(calls, reconciler, &config.dialer);
        tokio::spawn(sweeper.run(background.child_token()));
    } else {
        warn!("Dialer disabled: campaigns will not dial and stale calls are not swept");
    }

    let bind_addr = config.server_addr();
    let workers = config.server.workers.max(1);
    info!("Starting HTTP server on {} with {} workers", bind_addr, workers);

    let cors_origins = config.server.cors_origins.clone();
    let request_timeout = Duration::from_secs(config.server.timeout_secs);

    let app_dispatcher = dispatcher.clone();
    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(ingestion.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(app_dispatcher.clone()))
            .app_data(web::Data::new(notifier.clone()))
            .app_data(json_config())
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message,
                        "status": 400
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(configure_routes)
            // Ledger notifications
            .route("/ws", web::get().to(ws_handler))
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .client_request_timeout(request_timeout)
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("HTTP server stopped, shutting down background tasks");
    background.cancel();
    dispatcher.shutdown();
    ami.shutdown().await;

    Ok(())
}
