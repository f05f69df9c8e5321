//! Webhook handlers
//!
//! Unauthenticated callbacks from the Asterisk dialplan and the payment
//! processor. Known-but-unusable events are acknowledged with 200 so the
//! sender does not retry them; only persistence failures answer 5xx.

use crate::dto::{DtmfWebhookPayload, HangupWebhookPayload, OxapayWebhookPayload, WebhookAck};
use actix_web::{web, HttpResponse};
use pressone_core::AppError;
use pressone_services::EventIngestion;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use validator::Validate;

/// DTMF digit (and optionally the final hangup) of a call
///
/// POST /webhooks/dtmf
#[instrument(skip(ingestion, payload), fields(call_id = %payload.call_id))]
pub async fn dtmf_webhook(
    ingestion: web::Data<Arc<dyn EventIngestion>>,
    payload: web::Json<DtmfWebhookPayload>,
) -> Result<HttpResponse, AppError> {
    payload.validate().map_err(|e| {
        warn!("DTMF webhook validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let event = payload.into_inner().into_event()?;
    debug!(digit = %event.digit, combined = event.hangup_cause.is_some(), "DTMF webhook");

    let outcome = ingestion.ingest_dtmf(event).await?;
    Ok(HttpResponse::Ok().json(WebhookAck::from(outcome)))
}

/// Final event of a call
///
/// POST /webhooks/hangup
#[instrument(skip(ingestion, payload), fields(call_id = %payload.call_id))]
pub async fn hangup_webhook(
    ingestion: web::Data<Arc<dyn EventIngestion>>,
    payload: web::Json<HangupWebhookPayload>,
) -> Result<HttpResponse, AppError> {
    payload.validate().map_err(|e| {
        warn!("Hangup webhook validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let outcome = ingestion.ingest_hangup(payload.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(WebhookAck::from(outcome)))
}

/// Oxapay payment status callback
///
/// POST /webhooks/oxapay
#[instrument(skip(ingestion, payload))]
pub async fn oxapay_webhook(
    ingestion: web::Data<Arc<dyn EventIngestion>>,
    payload: web::Json<OxapayWebhookPayload>,
) -> Result<HttpResponse, AppError> {
    let event = payload.into_inner().into_event().map_err(|e| {
        warn!("Oxapay webhook without tracking id");
        e
    })?;
    debug!(track_id = %event.track_id, status = %event.status, "Oxapay webhook");

    let outcome = ingestion.ingest_payment(event).await?;
    Ok(HttpResponse::Ok().json(WebhookAck::from(outcome)))
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhooks")
            .route("/dtmf", web::post().to(dtmf_webhook))
            .route("/hangup", web::post().to(hangup_webhook))
            .route("/oxapay", web::post().to(oxapay_webhook)),
    );
}
