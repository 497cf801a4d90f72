//! Health check handler

use actix_web::{web, HttpResponse};

/// GET /api/v1/health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "relaybill",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure health route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
