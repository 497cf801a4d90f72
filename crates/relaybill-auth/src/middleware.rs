//! Actix-web request extractors for authenticated sessions
//!
//! `AuthenticatedUser` accepts any valid session token. `AdminUser` further
//! requires the admin role and, unless disabled in the `JwtService`, an AAL2
//! session.

use crate::claims::{Claims, UserRole};
use crate::jwt::JwtService;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use relaybill_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cookie set by the dashboard for the provider session
const SESSION_COOKIE: &str = "sb-access-token";

/// Extract JWT token from request
///
/// Checks for token in the following order:
/// 1. Authorization header (Bearer token)
/// 2. Session cookie, then a plain `token` cookie
fn extract_token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    req.cookie(SESSION_COOKIE)
        .or_else(|| req.cookie("token"))
        .map(|cookie| cookie.value().to_string())
}

/// Authenticated user extractor
///
/// # Examples
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use relaybill_auth::middleware::AuthenticatedUser;
///
/// async fn protected_handler(user: AuthenticatedUser) -> HttpResponse {
///     HttpResponse::Ok().json(serde_json::json!({ "user_id": user.user_id }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Subject of the token
    pub user_id: String,

    pub email: Option<String>,

    /// Full claims from the JWT token
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn user_role(&self) -> UserRole {
        self.claims.role()
    }

    pub fn is_admin(&self) -> bool {
        self.claims.is_admin()
    }

    pub fn has_mfa(&self) -> bool {
        self.claims.has_mfa()
    }
}

fn jwt_service_from(req: &HttpRequest) -> Option<Arc<JwtService>> {
    req.app_data::<web::Data<Arc<JwtService>>>()
        .map(|service| service.get_ref().clone())
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(jwt_service) = jwt_service_from(req) else {
            warn!("JwtService not found in app data");
            return ready(Err(AppError::Unauthorized(
                "Authentication service not configured".to_string(),
            )
            .into()));
        };

        let Some(token) = extract_token_from_request(req) else {
            debug!("No authentication token found in request");
            return ready(Err(AppError::Unauthorized(
                "No authentication token provided".to_string(),
            )
            .into()));
        };

        match jwt_service.validate_token(&token) {
            Ok(claims) => {
                debug!(
                    user_id = %claims.sub,
                    role = %claims.role(),
                    "User authenticated successfully"
                );

                ready(Ok(AuthenticatedUser {
                    user_id: claims.sub.clone(),
                    email: claims.email.clone(),
                    claims,
                }))
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                ready(Err(e.into()))
            }
        }
    }
}

/// Admin user extractor
///
/// Rejects with `Forbidden` when the role is not admin and with
/// `MfaRequired` when the session has not reached AAL2.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AdminUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let auth_user = match AuthenticatedUser::from_request(req, payload).into_inner() {
            Ok(user) => user,
            Err(e) => return ready(Err(e)),
        };

        if !auth_user.is_admin() {
            warn!(
                user_id = %auth_user.user_id,
                role = %auth_user.user_role(),
                "User attempted admin access without privileges"
            );
            return ready(Err(AppError::Forbidden.into()));
        }

        let require_mfa = jwt_service_from(req)
            .map(|service| service.require_mfa())
            .unwrap_or(true);

        if require_mfa && !auth_user.has_mfa() {
            warn!(user_id = %auth_user.user_id, "Admin session without second factor");
            return ready(Err(AppError::MfaRequired.into()));
        }

        debug!(user_id = %auth_user.user_id, "Admin access granted");

        ready(Ok(AdminUser(auth_user)))
    }
}
