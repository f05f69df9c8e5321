//! Actix-web authentication extractors
//!
//! Tokens are read from the `Authorization: Bearer` header or a `token`
//! cookie and validated against the `JwtService` in app data.

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use pressone_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Extract JWT token from request
///
/// Checks the Authorization header first, then a cookie named "token".
fn extract_token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    req.cookie("token").map(|cookie| cookie.value().to_string())
}

/// Authenticated caller extractor
///
/// # Examples
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use pressone_auth::middleware::AuthenticatedUser;
///
/// async fn protected_handler(user: AuthenticatedUser) -> HttpResponse {
///     HttpResponse::Ok().json(serde_json::json!({
///         "subject": user.subject,
///         "role": user.claims.role
///     }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: String,

    /// Full claims from the JWT token
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.claims.is_admin()
    }

    /// Account an operator is bound to; `None` for admins
    pub fn account_id(&self) -> Option<i64> {
        self.claims.account_id
    }

    /// Fail with `Forbidden` unless the caller may act on `account_id`
    pub fn require_account(&self, account_id: i64) -> Result<(), AppError> {
        if self.claims.can_access_account(account_id) {
            Ok(())
        } else {
            warn!(
                subject = %self.subject,
                account_id,
                "Access to foreign account denied"
            );
            Err(AppError::Forbidden)
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let jwt_service = match req.app_data::<web::Data<Arc<JwtService>>>() {
            Some(service) => service.get_ref().clone(),
            None => {
                warn!("JwtService not found in app data");
                return ready(Err(AppError::Unauthorized(
                    "Authentication service not configured".to_string(),
                )
                .into()));
            }
        };

        let token = match extract_token_from_request(req) {
            Some(t) => t,
            None => {
                debug!("No authentication token found in request");
                return ready(Err(AppError::Unauthorized(
                    "No authentication token provided".to_string(),
                )
                .into()));
            }
        };

        match jwt_service.validate_token(&token) {
            Ok(claims) => {
                debug!(
                    subject = %claims.sub,
                    role = %claims.role,
                    "Caller authenticated"
                );

                ready(Ok(AuthenticatedUser {
                    subject: claims.sub.clone(),
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

/// Admin caller extractor; non-admin tokens get `403 Forbidden`
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
                subject = %auth_user.subject,
                role = %auth_user.claims.role,
                "Caller attempted admin access without privileges"
            );
            return ready(Err(AppError::Forbidden.into()));
        }

        ready(Ok(AdminUser(auth_user)))
    }
}
