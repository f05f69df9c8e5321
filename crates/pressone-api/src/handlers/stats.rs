//! Statistics handlers

use crate::dto::{ApiResponse, StatsResponse};
use actix_web::{web, HttpResponse};
use pressone_auth::AdminUser;
use pressone_core::AppError;
use pressone_db::PgStatsRepository;
use sqlx::PgPool;
use tracing::{debug, instrument};

/// Platform-wide counters
///
/// GET /api/v1/stats
#[instrument(skip(pool, _admin))]
pub async fn get_global_stats(
    pool: web::Data<PgPool>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    debug!("Fetching global statistics");

    let repo = PgStatsRepository::new(pool.get_ref().clone());
    let stats = repo.global().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(StatsResponse::from(stats))))
}

/// Configure statistics routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/stats", web::get().to(get_global_stats));
}
