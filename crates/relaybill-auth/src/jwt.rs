//! JWT token creation and validation service
//!
//! Validates HS256 session tokens signed with the identity provider's JWT
//! secret. Token creation is used by tests and operator tooling.

use crate::claims::{Claims, UserRole, AUTHENTICATED_AUDIENCE};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use relaybill_core::error::AppError;
use tracing::{debug, error, warn};

/// JWT Service for token creation and validation
#[derive(Clone)]
pub struct JwtService {
    /// Default token expiration time in seconds
    expiration_secs: i64,

    /// Whether admin access demands an AAL2 session
    require_mfa: bool,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    ///
    /// # Examples
    ///
    /// ```
    /// use relaybill_auth::JwtService;
    ///
    /// let jwt_service = JwtService::new("my-secret-key", 3600);
    /// assert!(jwt_service.require_mfa());
    /// ```
    pub fn new(secret: &str, expiration_secs: i64) -> Self {
        Self {
            expiration_secs,
            require_mfa: true,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Toggle the AAL2 requirement for admin extractors
    pub fn with_require_mfa(mut self, require_mfa: bool) -> Self {
        self.require_mfa = require_mfa;
        self
    }

    /// Create a JWT token from claims
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidToken` if token creation fails
    pub fn create_token(&self, claims: &Claims) -> Result<String, AppError> {
        let mut token_claims = claims.clone();

        if token_claims.exp == 0 {
            let exp = Utc::now() + Duration::seconds(self.expiration_secs);
            token_claims.exp = exp.timestamp();
        }

        debug!(
            subject = %token_claims.sub,
            role = %token_claims.role(),
            aal = ?token_claims.aal,
            "Creating JWT token"
        );

        encode(&Header::new(Algorithm::HS256), &token_claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to create JWT token");
            AppError::InvalidToken(format!("Token creation failed: {}", e))
        })
    }

    /// Create a token for a subject with the given role, optionally MFA-verified
    pub fn create_token_for_user(
        &self,
        subject: &str,
        role: UserRole,
        mfa: bool,
    ) -> Result<String, AppError> {
        let claims = Claims::new(subject, role);
        let claims = if mfa { claims.with_mfa() } else { claims };
        self.create_token(&claims)
    }

    /// Validate a JWT token and extract claims
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `AppError::TokenExpired` if the token has expired
    /// - `AppError::InvalidToken` if the signature, algorithm or audience is wrong
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                    warn!("Token expired");
                    return AppError::TokenExpired;
                }

                warn!(error = %e, "Invalid token");
                AppError::InvalidToken(format!("Token validation failed: {}", e))
            })?;

        let claims = token_data.claims;

        // Validation allows 60s of leeway
        if claims.is_expired() {
            warn!(subject = %claims.sub, "Token expired (manual check)");
            return Err(AppError::TokenExpired);
        }

        debug!(
            subject = %claims.sub,
            role = %claims.role(),
            "Token validated successfully"
        );

        Ok(claims)
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    pub fn require_mfa(&self) -> bool {
        self.require_mfa
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .field("require_mfa", &self.require_mfa)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-12345";

    #[test]
    fn test_create_and_validate_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let claims = Claims::new("user-1", UserRole::Admin).with_mfa();

        let token = jwt_service.create_token(&claims).unwrap();
        assert!(!token.is_empty());

        let decoded = jwt_service.validate_token(&token).unwrap();
        assert_eq!(decoded.sub, "user-1");
        assert!(decoded.is_admin());
        assert!(decoded.has_mfa());
    }

    #[test]
    fn test_expired_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 1);

        let claims = Claims::with_expiration("user", UserRole::Viewer, -10);
        let token = jwt_service.create_token(&claims).unwrap();

        let result = jwt_service.validate_token(&token);
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_invalid_token() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);

        let result = jwt_service.validate_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_token_with_different_secret() {
        let issuer = JwtService::new("secret1", 3600);
        let verifier = JwtService::new("secret2", 3600);

        let token = issuer
            .create_token_for_user("user", UserRole::Admin, true)
            .unwrap();

        let result = verifier.validate_token(&token);
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let mut claims = Claims::with_expiration("svc", UserRole::Admin, 3600);
        claims.aud = "service_role".to_string();

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        let result = jwt_service.validate_token(&token);
        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[test]
    fn test_token_expiration_setting() {
        let jwt_service = JwtService::new(TEST_SECRET, 7200);

        let token = jwt_service
            .create_token_for_user("user", UserRole::Viewer, false)
            .unwrap();
        let decoded = jwt_service.validate_token(&token).unwrap();

        let now = Utc::now().timestamp();
        assert!(decoded.exp > now);
        assert!(decoded.exp <= now + 7200);
    }

    #[test]
    fn test_require_mfa_toggle() {
        let jwt_service = JwtService::new(TEST_SECRET, 1800).with_require_mfa(false);
        assert!(!jwt_service.require_mfa());
        assert_eq!(jwt_service.expiration_secs(), 1800);
    }

    #[test]
    fn test_debug_impl_hides_secret() {
        let jwt_service = JwtService::new(TEST_SECRET, 3600);
        let debug_str = format!("{:?}", jwt_service);

        assert!(debug_str.contains("JwtService"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(TEST_SECRET));
    }
}
