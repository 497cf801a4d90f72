//! JWT Claims structure
//!
//! Mirrors the access tokens issued by the identity provider for admin
//! sessions: audience `authenticated`, the assurance level reached by the
//! session, and the application role stored in `app_metadata`.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audience carried by every signed-in session token
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Application role granted to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access to customer and cost administration
    Admin,
    /// Signed in, no billing administration rights
    #[default]
    #[serde(other)]
    Viewer,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Viewer => write!(f, "viewer"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

/// Authenticator assurance level reached by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssuranceLevel {
    /// Password or magic link only
    #[default]
    Aal1,
    /// Second factor verified
    Aal2,
}

/// Provider-managed metadata the user cannot edit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: UserRole,
}

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Audience
    #[serde(default = "default_audience")]
    pub aud: String,

    #[serde(default)]
    pub aal: AssuranceLevel,

    #[serde(default)]
    pub app_metadata: AppMetadata,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

fn default_audience() -> String {
    AUTHENTICATED_AUDIENCE.to_string()
}

impl Claims {
    /// Create new claims for a single-factor session
    ///
    /// # Examples
    ///
    /// ```
    /// use relaybill_auth::claims::{Claims, UserRole};
    ///
    /// let claims = Claims::new("user-1", UserRole::Admin);
    /// assert_eq!(claims.sub, "user-1");
    /// assert!(claims.is_admin());
    /// assert!(!claims.has_mfa());
    /// ```
    pub fn new(subject: &str, role: UserRole) -> Self {
        Self {
            sub: subject.to_string(),
            email: None,
            aud: default_audience(),
            aal: AssuranceLevel::Aal1,
            app_metadata: AppMetadata { role },
            iat: Utc::now().timestamp(),
            exp: 0, // Will be set by JwtService
        }
    }

    /// Create new claims with custom expiration duration
    pub fn with_expiration(subject: &str, role: UserRole, expires_in_secs: i64) -> Self {
        let mut claims = Self::new(subject, role);
        claims.exp = (Utc::now() + Duration::seconds(expires_in_secs)).timestamp();
        claims
    }

    /// Mark the session as having completed a second factor
    pub fn with_mfa(mut self) -> Self {
        self.aal = AssuranceLevel::Aal2;
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    pub fn role(&self) -> UserRole {
        self.app_metadata.role
    }

    pub fn is_admin(&self) -> bool {
        self.app_metadata.role.is_admin()
    }

    /// Whether the session reached AAL2
    pub fn has_mfa(&self) -> bool {
        self.aal == AssuranceLevel::Aal2
    }
}
