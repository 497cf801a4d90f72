//! Authentication and authorization for RelayBill
//!
//! Admin sessions are issued by an external identity provider as HS256 JWTs.
//! This crate validates those tokens and exposes Actix-web extractors that
//! gate customer and cost administration on the admin role and a
//! second-factor (AAL2) session.
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use relaybill_auth::middleware::AdminUser;
//!
//! async fn admin_route(admin: AdminUser) -> HttpResponse {
//!     HttpResponse::Ok().json(serde_json::json!({ "user_id": admin.user_id }))
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::{AssuranceLevel, Claims, UserRole};
pub use jwt::JwtService;
pub use middleware::{AdminUser, AuthenticatedUser};
