//! Campaign handlers
//!
//! Campaign creation, live aggregates, call history and dispatcher control.

use crate::dto::{
    AddNumbersRequest, AddNumbersResponse, ApiResponse, CallResponse, CampaignCreateRequest,
    CampaignResponse, PaginationParams,
};
use crate::handlers::resolve_account;
use crate::Dispatcher;
use actix_web::{web, HttpResponse};
use pressone_auth::AuthenticatedUser;
use pressone_core::models::{
    is_valid_destination, normalize_number, validate_caller_id, Campaign, CampaignStatus,
};
use pressone_core::traits::{CallRepository, CampaignRepository, TrunkRepository};
use pressone_core::AppError;
use pressone_db::{PgCallRepository, PgCampaignRepository, PgTrunkRepository};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Load a campaign the caller may see
async fn load_campaign(
    repo: &PgCampaignRepository,
    id: i64,
    user: &AuthenticatedUser,
) -> Result<Campaign, AppError> {
    let campaign = repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::CampaignNotFound(id.to_string()))?;
    user.require_account(campaign.account_id)?;
    Ok(campaign)
}

/// Split raw numbers into dialable digits and a count of rejected entries
fn dialable_numbers(raw: &[String]) -> (Vec<String>, usize) {
    let numbers: Vec<String> = raw
        .iter()
        .filter(|n| is_valid_destination(n))
        .map(|n| normalize_number(n))
        .collect();
    let rejected = raw.len() - numbers.len();
    (numbers, rejected)
}

/// Create a draft campaign
///
/// POST /api/v1/campaigns
#[instrument(skip(pool, user, req))]
pub async fn create_campaign(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<CampaignCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Campaign creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let account_id = resolve_account(&user, req.account_id)?;

    let trunk_repo = PgTrunkRepository::new(pool.get_ref().clone());
    let trunk = trunk_repo
        .find_by_id(req.trunk_id)
        .await?
        .filter(|t| t.account_id == account_id)
        .ok_or_else(|| AppError::TrunkNotFound(req.trunk_id.to_string()))?;

    let caller_id = req
        .caller_id
        .as_deref()
        .map(validate_caller_id)
        .transpose()
        .map_err(AppError::InvalidCallerId)?;

    let repo = PgCampaignRepository::new(pool.get_ref().clone());
    let campaign = repo
        .create(&req.to_new_campaign(account_id, caller_id))
        .await?;

    let (numbers, rejected) = dialable_numbers(&req.numbers);
    if !numbers.is_empty() {
        repo.add_items(campaign.id, &numbers).await?;
    }

    info!(
        campaign_id = campaign.id,
        account_id,
        trunk = %trunk.name,
        numbers = numbers.len(),
        rejected,
        "Campaign created"
    );

    let campaign = load_campaign(&repo, campaign.id, &user).await?;
    let message = format!("{} numbers queued, {} rejected", numbers.len(), rejected);
    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        CampaignResponse::from(campaign),
        message,
    )))
}

/// Campaign with its live aggregate
///
/// GET /api/v1/campaigns/{id}
#[instrument(skip(pool, user))]
pub async fn get_campaign(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let repo = PgCampaignRepository::new(pool.get_ref().clone());
    let campaign = load_campaign(&repo, path.into_inner(), &user).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(CampaignResponse::from(campaign))))
}

/// Append numbers to a campaign that has not completed
///
/// POST /api/v1/campaigns/{id}/numbers
#[instrument(skip(pool, user, req))]
pub async fn add_numbers(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
    req: web::Json<AddNumbersRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Add numbers validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let repo = PgCampaignRepository::new(pool.get_ref().clone());
    let campaign = load_campaign(&repo, path.into_inner(), &user).await?;
    if campaign.status == CampaignStatus::Completed {
        return Err(AppError::InvalidStateTransition(format!(
            "campaign {} is completed",
            campaign.id
        )));
    }

    let (numbers, rejected) = dialable_numbers(&req.numbers);
    let added = if numbers.is_empty() {
        0
    } else {
        repo.add_items(campaign.id, &numbers).await?
    };

    debug!(campaign_id = campaign.id, added, rejected, "Numbers appended");

    Ok(HttpResponse::Ok().json(ApiResponse::success(AddNumbersResponse { added, rejected })))
}

/// Recent calls of a campaign, newest first
///
/// GET /api/v1/campaigns/{id}/calls
#[instrument(skip(pool, user))]
pub async fn list_campaign_calls(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
    query: web::Query<PaginationParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let repo = PgCampaignRepository::new(pool.get_ref().clone());
    let campaign = load_campaign(&repo, path.into_inner(), &user).await?;

    let call_repo = PgCallRepository::new(pool.get_ref().clone());
    let (calls, total) = call_repo
        .list_by_campaign(campaign.id, query.limit(), query.offset())
        .await?;

    let data: Vec<CallResponse> = calls.into_iter().map(CallResponse::from).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// Start or resume dialing
///
/// POST /api/v1/campaigns/{id}/start
#[instrument(skip(pool, dispatcher, user))]
pub async fn start_campaign(
    pool: web::Data<PgPool>,
    dispatcher: web::Data<Arc<Dispatcher>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let repo = PgCampaignRepository::new(pool.get_ref().clone());
    let campaign = load_campaign(&repo, path.into_inner(), &user).await?;

    let campaign = dispatcher.get_ref().start(campaign.id).await?;
    info!(campaign_id = campaign.id, subject = %user.subject, "Campaign started");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        CampaignResponse::from(campaign),
        "Campaign started",
    )))
}

/// Stop new originations; in-flight calls still settle
///
/// POST /api/v1/campaigns/{id}/pause
#[instrument(skip(pool, dispatcher, user))]
pub async fn pause_campaign(
    pool: web::Data<PgPool>,
    dispatcher: web::Data<Arc<Dispatcher>>,
    path: web::Path<i64>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let repo = PgCampaignRepository::new(pool.get_ref().clone());
    let campaign = load_campaign(&repo, path.into_inner(), &user).await?;

    let campaign = dispatcher.pause(campaign.id).await?;
    info!(campaign_id = campaign.id, subject = %user.subject, "Campaign paused");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        CampaignResponse::from(campaign),
        "Campaign paused",
    )))
}

/// Configure campaign routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/campaigns")
            .route("", web::post().to(create_campaign))
            .route("/{id}", web::get().to(get_campaign))
            .route("/{id}/numbers", web::post().to(add_numbers))
            .route("/{id}/calls", web::get().to(list_campaign_calls))
            .route("/{id}/start", web::post().to(start_campaign))
            .route("/{id}/pause", web::post().to(pause_campaign)),
    );
}
