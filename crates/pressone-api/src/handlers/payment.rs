//! Payment handlers
//!
//! Registers pending top-ups. Credits are applied only when the processor
//! confirms the payment through the Oxapay webhook.

use crate::dto::{
    ApiResponse, PaginationParams, PaymentCreateRequest, PaymentFilterParams, PaymentResponse,
};
use crate::handlers::resolve_account;
use actix_web::{web, HttpResponse};
use pressone_auth::AuthenticatedUser;
use pressone_core::models::NewPayment;
use pressone_core::traits::{CreditPackageRepository, PaymentRepository};
use pressone_core::AppError;
use pressone_db::{PgCreditPackageRepository, PgPaymentRepository};
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Register a pending payment for a credit package
///
/// POST /api/v1/payments
#[instrument(skip(pool, user, req))]
pub async fn create_payment(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<PaymentCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Payment validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let account_id = resolve_account(&user, req.account_id)?;

    let packages = PgCreditPackageRepository::new(pool.get_ref().clone());
    let package = packages
        .find(req.package_code.trim())
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::PackageNotFound(req.package_code.clone()))?;

    let track_id = req
        .track_id
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let repo = PgPaymentRepository::new(pool.get_ref().clone());
    let payment = repo
        .create_pending(&NewPayment {
            account_id,
            track_id,
            amount: package.price,
            currency: package.currency.clone(),
            credits_requested: package.credits,
        })
        .await?;

    info!(
        account_id,
        track_id = %payment.track_id,
        package = %package.code,
        amount = %payment.amount,
        "Pending payment registered"
    );

    Ok(HttpResponse::Created().json(ApiResponse::success(PaymentResponse::from(payment))))
}

/// Payments of an account, newest first
///
/// GET /api/v1/payments
#[instrument(skip(pool, user))]
pub async fn list_payments(
    pool: web::Data<PgPool>,
    query: web::Query<PaginationParams>,
    filters: web::Query<PaymentFilterParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let account_id = resolve_account(&user, filters.account_id)?;

    let repo = PgPaymentRepository::new(pool.get_ref().clone());
    let (payments, total) = repo
        .list_by_account(account_id, query.limit(), query.offset())
        .await?;

    let data: Vec<PaymentResponse> = payments.into_iter().map(PaymentResponse::from).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Look up one payment by tracking id
///
/// GET /api/v1/payments/{track_id}
#[instrument(skip(pool, user))]
pub async fn get_payment(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let track_id = path.into_inner();
    let repo = PgPaymentRepository::new(pool.get_ref().clone());
    let payment = repo
        .find_by_track_id(&track_id)
        .await?
        .ok_or_else(|| AppError::PaymentNotFound(track_id.clone()))?;
    user.require_account(payment.account_id)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(PaymentResponse::from(payment))))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("", web::post().to(create_payment))
            .route("", web::get().to(list_payments))
            .route("/{track_id}", web::get().to(get_payment)),
    );
}
