//! Data Transfer Objects for API requests and responses

pub mod account;
pub mod call;
pub mod campaign;
pub mod common;
pub mod payment;
pub mod stats;
pub mod webhook;

pub use account::BalanceResponse;
pub use call::OriginateCallRequest;
pub use campaign::{
    AddNumbersRequest, AddNumbersResponse, CallResponse, CampaignCreateRequest, CampaignResponse,
};
pub use common::{ApiResponse, PaginationParams};
pub use payment::{
    CreditPackageFilterParams, CreditPackageRequest, CreditPackageResponse, PaymentCreateRequest,
    PaymentFilterParams, PaymentResponse,
};
pub use stats::StatsResponse;
pub use webhook::{DtmfWebhookPayload, HangupWebhookPayload, OxapayWebhookPayload, WebhookAck};
