//! HTTP request handlers

pub mod account;
pub mod call;
pub mod campaign;
pub mod credit_package;
pub mod payment;
pub mod stats;
pub mod webhook;
pub mod ws;

pub use account::configure as configure_accounts;
pub use call::configure as configure_calls;
pub use campaign::configure as configure_campaigns;
pub use credit_package::configure as configure_credit_packages;
pub use payment::configure as configure_payments;
pub use stats::configure as configure_stats;
pub use webhook::configure as configure_webhooks;
pub use ws::ws_handler;

use actix_web::{web, HttpResponse};
use pressone_auth::AuthenticatedUser;
use pressone_core::AppError;
use tracing::warn;

/// JSON extractor config answering malformed bodies with the API error shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(256 * 1024)
        .error_handler(|err, _req| {
            let message = err.to_string();
            warn!("Rejected malformed JSON body: {}", message);
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "invalid_payload",
                    "message": message,
                    "status": 400
                })),
            )
            .into()
        })
}

/// Account a request acts on.
///
/// Operators are pinned to their own account; admins must name one.
pub(crate) fn resolve_account(
    user: &AuthenticatedUser,
    requested: Option<i64>,
) -> Result<i64, AppError> {
    match (requested, user.account_id()) {
        (Some(id), _) => {
            user.require_account(id)?;
            Ok(id)
        }
        (None, Some(own)) => Ok(own),
        (None, None) => Err(AppError::Validation("account_id is required".to_string())),
    }
}
