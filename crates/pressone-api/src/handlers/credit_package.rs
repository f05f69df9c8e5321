//! Credit package catalog handlers

use crate::dto::{
    ApiResponse, CreditPackageFilterParams, CreditPackageRequest, CreditPackageResponse,
};
use actix_web::{web, HttpResponse};
use pressone_auth::{AdminUser, AuthenticatedUser};
use pressone_core::traits::CreditPackageRepository;
use pressone_core::AppError;
use pressone_db::PgCreditPackageRepository;
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use validator::Validate;

/// List purchasable packages
///
/// GET /api/v1/credit-packages
#[instrument(skip(pool, user))]
pub async fn list_packages(
    pool: web::Data<PgPool>,
    query: web::Query<CreditPackageFilterParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let include_inactive = query.include_inactive && user.is_admin();

    let repo = PgCreditPackageRepository::new(pool.get_ref().clone());
    let packages = repo.list(include_inactive).await?;

    let data: Vec<CreditPackageResponse> = packages
        .into_iter()
        .map(CreditPackageResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
}

/// Create or replace a package
///
/// PUT /api/v1/credit-packages/{code}
#[instrument(skip(pool, admin, req))]
pub async fn upsert_package(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
    admin: AdminUser,
    req: web::Json<CreditPackageRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Credit package validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let code = path.into_inner();
    if code.trim().is_empty() || code.len() > 32 {
        return Err(AppError::Validation("invalid package code".to_string()));
    }

    let repo = PgCreditPackageRepository::new(pool.get_ref().clone());
    let package = repo.upsert(&req.into_inner().into_package(&code)).await?;

    info!(
        code = %package.code,
        credits = %package.credits,
        price = %package.price,
        subject = %admin.subject,
        "Credit package saved"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(CreditPackageResponse::from(package))))
}

/// Hide a package from purchase
///
/// DELETE /api/v1/credit-packages/{code}
#[instrument(skip(pool, admin))]
pub async fn deactivate_package(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
    admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let code = path.into_inner();
    let repo = PgCreditPackageRepository::new(pool.get_ref().clone());

    if !repo.deactivate(&code).await? {
        return Err(AppError::PackageNotFound(code));
    }

    info!(code = %code, subject = %admin.subject, "Credit package deactivated");
    Ok(HttpResponse::NoContent().finish())
}

/// Configure credit package routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/credit-packages")
            .route("", web::get().to(list_packages))
            .route("/{code}", web::put().to(upsert_package))
            .route("/{code}", web::delete().to(deactivate_package)),
    );
}
