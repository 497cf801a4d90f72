//! RelayBill server
//!
//! Billing administration backend: customer management, usage cost
//! breakdowns and the USD to CAD rate they are reported with.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use relaybill_api::{configure_costs, configure_customers, configure_exchange, configure_health};
use relaybill_auth::JwtService;
use relaybill_core::traits::{ConversationUsageSource, TelephonyUsageSource};
use relaybill_core::AppConfig;
use relaybill_db::{create_pool, run_migrations, PgCustomerRepository};
use relaybill_services::{
    spawn_refresh_task, CostAggregator, CurrencyConverter, HttpExchangeRateSource, RetellClient,
    SmsSegmentCalculator, TwilioClient, VoiceCostCalculator,
};
use std::env;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(configure_health)
            // Calculators
            .configure(configure_costs)
            // Exchange rate status and manual refresh
            .configure(configure_exchange)
            // Customers and their cost breakdowns
            .configure(configure_customers),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "relaybill={lvl},relaybill_api={lvl},relaybill_services={lvl},relaybill_db={lvl},relaybill_auth={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

fn to_io_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

/// Exchange-rate converter with its periodic refresh running
fn build_converter(config: &AppConfig) -> CurrencyConverter {
    let ttl = Duration::from_secs(config.exchange.cache_ttl_secs);

    match HttpExchangeRateSource::from_config(&config.exchange) {
        Ok(source) => {
            let converter =
                CurrencyConverter::new(Arc::new(source), config.exchange.fallback_rate, ttl);
            spawn_refresh_task(converter.clone(), ttl);
            info!(
                url = %config.exchange.url,
                ttl_secs = config.exchange.cache_ttl_secs,
                "Exchange rate refresh scheduled"
            );
            converter
        }
        Err(e) => {
            warn!(error = %e, "Exchange rate source unavailable, using fixed fallback rate");
            CurrencyConverter::offline(config.exchange.fallback_rate)
        }
    }
}

fn build_telephony(config: &AppConfig) -> Option<Arc<dyn TelephonyUsageSource>> {
    match TwilioClient::from_config(&config.twilio) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Twilio not configured, SMS and voice costs will be reported unavailable");
            None
        }
    }
}

fn build_conversations(config: &AppConfig) -> Option<Arc<dyn ConversationUsageSource>> {
    match RetellClient::from_config(&config.retell) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Retell not configured, conversation costs will be reported unavailable");
            None
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting RelayBill v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(|e| to_io_error("Invalid configuration", e))?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database.url, Some(config.database.max_connections))
        .await
        .map_err(|e| to_io_error("Failed to create database pool", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| to_io_error("Failed to run migrations", e))?;

    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    let jwt_service = Arc::new(
        JwtService::new(&config.auth.jwt_secret, config.auth.jwt_expiration_secs)
            .with_require_mfa(config.auth.require_mfa),
    );
    if !config.auth.require_mfa {
        warn!("Admin MFA requirement is disabled");
    }

    let converter = build_converter(&config);
    let sms_calculator = SmsSegmentCalculator::new(config.billing.sms_rate_per_segment_usd);
    let voice_calculator = VoiceCostCalculator::new(config.billing.voice_rate_per_minute_usd);

    let aggregator = Arc::new(CostAggregator::new(
        Arc::new(PgCustomerRepository::new(pool.clone())),
        build_telephony(&config),
        build_conversations(&config),
        converter.clone(),
        &config.billing,
    ));

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    let cors_origins = config.server.cors_origins.clone();

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|origin| cors_origins_inner.split(',').any(|o| o.trim() == origin))
                    .unwrap_or(false)
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
            .app_data(web::Data::new(converter.clone()))
            .app_data(web::Data::new(sms_calculator.clone()))
            .app_data(web::Data::new(voice_calculator.clone()))
            .app_data(web::Data::new(aggregator.clone()))
            .app_data(web::JsonConfig::default().limit(256 * 1024))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message,
                        "status": 400,
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
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
    .bind(&bind_addr)?
    .run()
    .await
}
