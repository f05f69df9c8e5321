//! Campaign DTOs
//!
//! Request and response types for campaign and call endpoints.

use chrono::{DateTime, Utc};
use pressone_core::models::{Call, Campaign, CampaignStatus, NewCampaign};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Campaign creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CampaignCreateRequest {
    /// Owning account; operators may omit it
    pub account_id: Option<i64>,

    #[validate(length(min = 1, max = 120, message = "Campaign name is required"))]
    pub name: String,

    pub trunk_id: i64,

    /// Overrides the account caller id
    pub caller_id: Option<String>,

    /// Originations per second
    #[serde(default = "default_cps")]
    #[validate(range(min = 1, max = 100))]
    pub cps: i32,

    /// Simultaneous calls ceiling
    #[serde(default = "default_max_concurrent")]
    #[validate(range(min = 1, max = 500))]
    pub max_concurrent: i32,

    /// Destination numbers; malformed entries are skipped
    #[serde(default)]
    #[validate(length(max = 100000))]
    pub numbers: Vec<String>,
}

fn default_cps() -> i32 {
    5
}

fn default_max_concurrent() -> i32 {
    10
}

impl CampaignCreateRequest {
    pub fn to_new_campaign(&self, account_id: i64, caller_id: Option<String>) -> NewCampaign {
        NewCampaign {
            account_id,
            name: self.name.trim().to_string(),
            trunk_id: Some(self.trunk_id),
            caller_id,
            cps: self.cps,
            max_concurrent: self.max_concurrent,
        }
    }
}

/// Numbers appended to an existing campaign
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddNumbersRequest {
    #[validate(length(min = 1, max = 100000, message = "At least one number is required"))]
    pub numbers: Vec<String>,
}

/// How many numbers were queued and how many were skipped
#[derive(Debug, Clone, Serialize)]
pub struct AddNumbersResponse {
    pub added: u64,
    pub rejected: usize,
}

/// Campaign with its live aggregate
#[derive(Debug, Clone, Serialize)]
pub struct CampaignResponse {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub status: CampaignStatus,
    pub trunk_id: Option<i64>,
    pub caller_id: Option<String>,
    pub cps: i32,
    pub max_concurrent: i32,
    pub total_numbers: i64,
    pub completed: i64,
    pub remaining: i64,
    pub answered: i64,
    pub pressed_one: i64,
    pub failed: i64,
    pub actual_cost: Decimal,
    /// Share of answered calls that pressed one, in percent
    pub conversion_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        let remaining = c.stats.remaining();
        let conversion_rate = c.stats.conversion_rate();
        Self {
            id: c.id,
            account_id: c.account_id,
            name: c.name,
            status: c.status,
            trunk_id: c.trunk_id,
            caller_id: c.caller_id,
            cps: c.cps,
            max_concurrent: c.max_concurrent,
            total_numbers: c.stats.total_numbers,
            completed: c.stats.completed,
            remaining,
            answered: c.stats.answered,
            pressed_one: c.stats.pressed_one,
            failed: c.stats.failed,
            actual_cost: c.stats.actual_cost,
            conversion_rate,
            created_at: c.created_at,
            started_at: c.started_at,
        }
    }
}

/// One call of a campaign
#[derive(Debug, Clone, Serialize)]
pub struct CallResponse {
    pub call_id: String,
    pub campaign_id: Option<i64>,
    pub destination: String,
    pub caller_id: Option<String>,
    pub state: String,
    pub duration_seconds: i32,
    pub billed_cost: Option<Decimal>,
    pub hangup_cause: Option<String>,
    pub settled: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<Call> for CallResponse {
    fn from(call: Call) -> Self {
        let settled = call.is_settled();
        Self {
            call_id: call.call_id,
            campaign_id: call.campaign_id,
            destination: call.destination,
            caller_id: call.caller_id,
            state: call.state.as_str().to_string(),
            duration_seconds: call.duration_seconds,
            billed_cost: call.billed_cost,
            hangup_cause: call.hangup_cause,
            settled,
            created_at: call.created_at,
            ended_at: call.ended_at,
        }
    }
}
