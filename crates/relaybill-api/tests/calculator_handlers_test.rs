//! Integration tests for the calculator and exchange-rate handlers
//!
//! Customer endpoints need PostgreSQL and are covered by the ignored
//! repository tests in relaybill-db.

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use relaybill_api::{configure_costs, configure_exchange, configure_health};
use relaybill_auth::{JwtService, UserRole};
use relaybill_core::{traits::ExchangeRateSource, AppResult};
use relaybill_services::{CurrencyConverter, SmsSegmentCalculator, VoiceCostCalculator};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "test-secret-key";

struct FixedRate(Decimal);

#[async_trait]
impl ExchangeRateSource for FixedRate {
    async fn fetch_usd_to_cad(&self) -> AppResult<Decimal> {
        Ok(self.0)
    }
}

fn jwt() -> Arc<JwtService> {
    Arc::new(JwtService::new(SECRET, 3600))
}

fn token(role: UserRole, mfa: bool) -> String {
    jwt().create_token_for_user("user-1", role, mfa).unwrap()
}

fn bearer(role: UserRole, mfa: bool) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token(role, mfa)))
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

macro_rules! app {
    ($converter:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(jwt()))
                .app_data(web::Data::new($converter))
                .app_data(web::Data::new(SmsSegmentCalculator::default()))
                .app_data(web::Data::new(VoiceCostCalculator::default()))
                .service(
                    web::scope("/api/v1")
                        .configure(configure_health)
                        .configure(configure_costs)
                        .configure(configure_exchange),
                ),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health_is_public() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "relaybill");
}

#[actix_web::test]
async fn test_sms_segments_requires_session() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::post()
        .uri("/api/v1/sms/segments")
        .set_json(serde_json::json!({ "text": "Hello there!" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_sms_segments_gsm7() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::post()
        .uri("/api/v1/sms/segments")
        .insert_header(bearer(UserRole::Viewer, false))
        .set_json(serde_json::json!({ "text": "Hello there!" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let data = &body["data"];
    assert_eq!(data["encoding"], "gsm7");
    assert_eq!(data["length"], 12);
    assert_eq!(data["segments"], 1);
    assert_eq!(decimal(&data["cost_usd"]), dec!(0.0083));
    assert_eq!(decimal(&data["cost_cad"]), dec!(0.011205));
}

#[actix_web::test]
async fn test_sms_segments_ucs2_multipart() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    // 71 UCS-2 units: one over the single-segment limit
    let text = format!("{}ç", "a".repeat(70));
    let req = test::TestRequest::post()
        .uri("/api/v1/sms/segments")
        .insert_header(bearer(UserRole::Viewer, false))
        .set_json(serde_json::json!({ "text": text }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["encoding"], "ucs2");
    assert_eq!(body["data"]["segments"], 2);
}

#[actix_web::test]
async fn test_voice_cost_rounds_up_minutes() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::get()
        .uri("/api/v1/voice/cost?duration_seconds=185")
        .insert_header(bearer(UserRole::Viewer, false))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let data = &body["data"];
    assert_eq!(data["billed_minutes"], 4);
    assert_eq!(decimal(&data["cost_usd"]), dec!(0.088));
    assert_eq!(decimal(&data["cost_cad"]), dec!(0.1188));
}

#[actix_web::test]
async fn test_voice_cost_negative_duration_is_free() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::get()
        .uri("/api/v1/voice/cost?duration_seconds=-30")
        .insert_header(bearer(UserRole::Viewer, false))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["billed_minutes"], 0);
    assert_eq!(decimal(&body["data"]["cost_cad"]), Decimal::ZERO);
}

#[actix_web::test]
async fn test_voice_cost_longest_duration() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/voice/cost?duration_seconds={}", i64::MAX))
        .insert_header(bearer(UserRole::Viewer, false))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let data = &body["data"];
    assert_eq!(data["billed_minutes"], 153_722_867_280_912_931_i64);
    assert_eq!(decimal(&data["cost_usd"]), dec!(3381903080180084.482));
    assert!(decimal(&data["cost_cad"]) > Decimal::ZERO);
}

#[actix_web::test]
async fn test_exchange_rate_reports_fallback() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::get()
        .uri("/api/v1/exchange-rate")
        .insert_header(bearer(UserRole::Viewer, false))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let data = &body["data"];
    assert_eq!(data["base"], "USD");
    assert_eq!(data["target"], "CAD");
    assert_eq!(data["source"], "fallback");
    assert_eq!(data["live_source"], false);
    assert_eq!(decimal(&data["rate"]), dec!(1.35));
}

#[actix_web::test]
async fn test_refresh_requires_admin_with_mfa() {
    let converter = CurrencyConverter::new(
        Arc::new(FixedRate(dec!(1.40))),
        dec!(1.35),
        Duration::from_secs(3600),
    );
    let app = app!(converter);

    let req = test::TestRequest::post()
        .uri("/api/v1/exchange-rate/refresh")
        .insert_header(bearer(UserRole::Viewer, true))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/v1/exchange-rate/refresh")
        .insert_header(bearer(UserRole::Admin, false))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "mfa_required");
}

#[actix_web::test]
async fn test_refresh_fetches_live_rate() {
    let converter = CurrencyConverter::new(
        Arc::new(FixedRate(dec!(1.40))),
        dec!(1.35),
        Duration::from_secs(3600),
    );
    let app = app!(converter);

    let req = test::TestRequest::post()
        .uri("/api/v1/exchange-rate/refresh")
        .insert_header(bearer(UserRole::Admin, true))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["source"], "remote");
    assert_eq!(body["data"]["live_source"], true);
    assert_eq!(decimal(&body["data"]["rate"]), dec!(1.40));
    assert_eq!(body["message"], "Exchange rate refreshed");
}

#[actix_web::test]
async fn test_refresh_without_source_is_config_error() {
    let app = app!(CurrencyConverter::offline(dec!(1.35)));

    let req = test::TestRequest::post()
        .uri("/api/v1/exchange-rate/refresh")
        .insert_header(bearer(UserRole::Admin, true))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "config_error");
}
