//! Single call origination

use crate::dto::{ApiResponse, OriginateCallRequest};
use crate::handlers::resolve_account;
use crate::Gateway;
use actix_web::{web, HttpResponse};
use pressone_auth::AuthenticatedUser;
use pressone_core::models::validate_caller_id;
use pressone_core::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Place one call through the account's trunk
///
/// POST /api/v1/calls/originate
///
/// Returns 202 when the switch accepted the request. A refusal is still a
/// settled call and comes back as 200 with `accepted: false`.
#[instrument(skip(gateway, user, req))]
pub async fn originate_call(
    gateway: web::Data<Arc<Gateway>>,
    user: AuthenticatedUser,
    req: web::Json<OriginateCallRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Originate validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let req = req.into_inner();
    let account_id = resolve_account(&user, req.account_id)?;
    let caller_id = req
        .caller_id
        .as_deref()
        .map(validate_caller_id)
        .transpose()
        .map_err(AppError::InvalidCallerId)?;

    let result = gateway.originate(req.into_request(account_id, caller_id)).await?;

    info!(
        call_id = %result.call_id,
        account_id,
        accepted = result.accepted,
        "Single origination requested"
    );

    if result.accepted {
        Ok(HttpResponse::Accepted().json(ApiResponse::success(result)))
    } else {
        Ok(HttpResponse::Ok().json(ApiResponse::with_message(result, "Origination refused")))
    }
}

/// Configure call routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/calls").route("/originate", web::post().to(originate_call)));
}
