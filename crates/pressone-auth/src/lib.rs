//! Authentication and authorization for PressOne
//!
//! Bearer-token (JWT) authentication for the management API. Tokens carry a
//! role and, for operators, the account they may act on.
//!
//! # Examples
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use pressone_auth::middleware::{AdminUser, AuthenticatedUser};
//!
//! async fn balance(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().json(serde_json::json!({ "account": user.account_id() }))
//! }
//!
//! async fn stats(_admin: AdminUser) -> HttpResponse {
//!     HttpResponse::Ok().finish()
//! }
//! ```

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::{Claims, Role};
pub use jwt::JwtService;
pub use middleware::{AdminUser, AuthenticatedUser};
