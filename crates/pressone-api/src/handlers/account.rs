//! Account handlers
//!
//! Balance and campaign listing for one account.

use crate::dto::{ApiResponse, BalanceResponse, CampaignResponse, PaginationParams};
use actix_web::{web, HttpResponse};
use pressone_auth::AuthenticatedUser;
use pressone_core::traits::{AccountRepository, CampaignRepository};
use pressone_core::AppError;
use pressone_db::{PgAccountRepository, PgCampaignRepository};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use validator::Validate;

/// Current balance and lifetime counters
///
/// GET /api/v1/accounts/{id}/balance
#[instrument(skip(pool, user))]
pub async fn get_balance(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();
    user.require_account(account_id)?;

    let repo = PgAccountRepository::new(pool.get_ref().clone());
    let account = repo
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

    debug!(account_id, balance = %account.credit_balance, "Balance fetched");

    Ok(HttpResponse::Ok().json(ApiResponse::success(BalanceResponse::from(account))))
}

/// Campaigns of an account, newest first
///
/// GET /api/v1/accounts/{id}/campaigns
#[instrument(skip(pool, user))]
pub async fn list_account_campaigns(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    query: web::Query<PaginationParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let account_id = path.into_inner();
    user.require_account(account_id)?;

    let repo = PgCampaignRepository::new(pool.get_ref().clone());
    let (campaigns, total) = repo
        .list_by_account(account_id, query.limit(), query.offset())
        .await?;

    let data: Vec<CampaignResponse> = campaigns.into_iter().map(CampaignResponse::from).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Configure account routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/accounts")
            .route("/{id}/balance", web::get().to(get_balance))
            .route("/{id}/campaigns", web::get().to(list_account_campaigns)),
    );
}
