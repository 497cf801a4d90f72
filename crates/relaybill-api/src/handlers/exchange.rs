//! Exchange rate handlers

use crate::dto::costs::ExchangeRateResponse;
use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use relaybill_auth::{AdminUser, AuthenticatedUser};
use relaybill_core::AppError;
use relaybill_services::CurrencyConverter;
use tracing::{info, instrument, warn};

fn status(converter: &CurrencyConverter) -> ExchangeRateResponse {
    ExchangeRateResponse::new(
        converter.snapshot(),
        converter.has_source(),
        converter.is_refreshing(),
    )
}

/// Current USD to CAD rate
///
/// GET /api/v1/exchange-rate
#[instrument(skip(converter, _user))]
pub async fn get_exchange_rate(
    converter: web::Data<CurrencyConverter>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    converter.refresh_if_stale();
    Ok(HttpResponse::Ok().json(ApiResponse::success(status(converter.get_ref()))))
}

/// Fetch a fresh rate now
///
/// POST /api/v1/exchange-rate/refresh
#[instrument(skip(converter, admin))]
pub async fn refresh_exchange_rate(
    converter: web::Data<CurrencyConverter>,
    admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let snapshot = converter.refresh().await.map_err(|e| {
        warn!(admin = %admin.user_id, error = %e, "Manual exchange rate refresh failed");
        e
    })?;

    info!(admin = %admin.user_id, rate = %snapshot.rate, "Exchange rate refreshed");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        status(converter.get_ref()),
        "Exchange rate refreshed",
    )))
}

/// Configure exchange rate routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/exchange-rate")
            .route("", web::get().to(get_exchange_rate))
            .route("/refresh", web::post().to(refresh_exchange_rate)),
    );
}
