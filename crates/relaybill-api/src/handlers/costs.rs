//! Cost handlers
//!
//! Calculator endpoints for single messages and calls, plus the per-customer
//! cost breakdown.

use crate::dto::costs::{
    CostQuery, SmsSegmentsRequest, SmsSegmentsResponse, VoiceCostQuery, VoiceCostResponse,
};
use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use relaybill_auth::{AdminUser, AuthenticatedUser};
use relaybill_core::AppError;
use relaybill_services::voice::billed_minutes;
use relaybill_services::{CostAggregator, CurrencyConverter, SmsSegmentCalculator, VoiceCostCalculator};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Count segments of a message body and price them
///
/// POST /api/v1/sms/segments
#[instrument(skip(calculator, converter, _user, req))]
pub async fn sms_segments(
    calculator: web::Data<SmsSegmentCalculator>,
    converter: web::Data<CurrencyConverter>,
    _user: AuthenticatedUser,
    req: web::Json<SmsSegmentsRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("SMS segment request validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let analysis = calculator.analyze(&req.text);
    let cost_usd = calculator.cost_usd(analysis.segments);
    let cost_cad = converter.convert_usd_to_cad(cost_usd);

    let response = SmsSegmentsResponse::new(analysis, cost_usd, cost_cad);
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Price a call duration
///
/// GET /api/v1/voice/cost?duration_seconds=185
#[instrument(skip(calculator, converter, _user))]
pub async fn voice_cost(
    calculator: web::Data<VoiceCostCalculator>,
    converter: web::Data<CurrencyConverter>,
    query: web::Query<VoiceCostQuery>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let duration_seconds = query.duration_seconds;

    let response = VoiceCostResponse {
        duration_seconds,
        billed_minutes: billed_minutes(duration_seconds),
        cost_usd: calculator.cost_usd(duration_seconds),
        cost_cad: calculator.cost_cad(duration_seconds, converter.get_ref()),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Aggregated cost breakdown for one customer
///
/// GET /api/v1/customers/{id}/costs?start=..&end=..
#[instrument(skip(aggregator, admin))]
pub async fn customer_costs(
    aggregator: web::Data<Arc<CostAggregator>>,
    path: web::Path<i32>,
    query: web::Query<CostQuery>,
    admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    let period = query.to_period(Utc::now())?;

    debug!(
        customer_id,
        start = %period.start,
        end = %period.end,
        admin = %admin.user_id,
        "Aggregating customer costs"
    );

    let breakdown = aggregator.aggregate(customer_id, &period).await?;

    info!(
        customer_id,
        total = %breakdown.total,
        warnings = breakdown.warnings.len(),
        "Cost breakdown ready"
    );

    let response = if breakdown.is_partial() {
        ApiResponse::with_message(breakdown, "Some usage sources were unavailable")
    } else {
        ApiResponse::success(breakdown)
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Configure calculator routes
///
/// The customer breakdown is routed from the customer scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/sms/segments", web::post().to(sms_segments))
        .route("/voice/cost", web::get().to(voice_cost));
}
