//! Campaign model
//!
//! A campaign dials a list of destination numbers through one trunk and
//! keeps aggregate counters that the reconciler updates as calls settle.

use crate::models::call::CallState;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Campaign status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    /// Created, never started
    #[default]
    Draft,
    /// Dispatcher is originating calls
    Running,
    /// No new originations; in-flight calls still settle
    Paused,
    /// Every item dialed and settled
    Completed,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Running => write!(f, "running"),
            CampaignStatus::Paused => write!(f, "paused"),
            CampaignStatus::Completed => write!(f, "completed"),
        }
    }
}

impl CampaignStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(CampaignStatus::Draft),
            "running" => Some(CampaignStatus::Running),
            "paused" => Some(CampaignStatus::Paused),
            "completed" => Some(CampaignStatus::Completed),
            _ => None,
        }
    }

    pub fn can_start(&self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Paused)
    }

    pub fn can_pause(&self) -> bool {
        matches!(self, CampaignStatus::Running)
    }
}

/// Aggregate counters scoped to one campaign
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total_numbers: i64,
    pub completed: i64,
    pub answered: i64,
    pub pressed_one: i64,
    pub failed: i64,
    pub actual_cost: Decimal,
}

impl CampaignStats {
    /// Add one settled call's delta
    pub fn apply(&mut self, delta: &CampaignDelta) {
        self.completed += delta.completed;
        self.answered += delta.answered;
        self.failed += delta.failed;
        self.pressed_one += delta.pressed_one;
        self.actual_cost += delta.cost;
    }

    /// Calls still outstanding
    pub fn remaining(&self) -> i64 {
        (self.total_numbers - self.completed).max(0)
    }

    /// Share of answered calls that pressed 1, in percent
    pub fn conversion_rate(&self) -> Decimal {
        if self.answered == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.pressed_one) * Decimal::ONE_HUNDRED / Decimal::from(self.answered))
            .round_dp(2)
    }
}

/// Change to the campaign aggregate produced by settling one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignDelta {
    pub completed: i64,
    pub answered: i64,
    pub failed: i64,
    pub pressed_one: i64,
    pub cost: Decimal,
}

impl CampaignDelta {
    /// Delta for a call settling in `final_state` with `cost`
    pub fn for_settlement(final_state: CallState, cost: Decimal) -> Self {
        let answered = final_state.is_answered();
        Self {
            completed: 1,
            answered: i64::from(answered),
            failed: i64::from(!answered),
            pressed_one: i64::from(final_state == CallState::DtmfPressed),
            cost,
        }
    }

    /// Spend of a call whose item was already released; no counter moves
    pub fn cost_only(cost: Decimal) -> Self {
        Self {
            cost,
            ..Default::default()
        }
    }
}

/// Campaign entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub trunk_id: Option<i64>,
    pub caller_id: Option<String>,
    /// Desired originations per second
    pub cps: i32,
    /// Desired simultaneous calls
    pub max_concurrent: i32,
    pub status: CampaignStatus,
    #[serde(flatten)]
    pub stats: CampaignStats,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for Campaign {
    fn default() -> Self {
        Self {
            id: 0,
            account_id: 0,
            name: String::new(),
            trunk_id: None,
            caller_id: None,
            cps: 5,
            max_concurrent: 10,
            status: CampaignStatus::Draft,
            stats: CampaignStats::default(),
            created_at: Utc::now(),
            started_at: None,
        }
    }
}

/// Status of one destination number inside a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CampaignItemStatus {
    #[default]
    Pending,
    Dialing,
    Completed,
}

impl fmt::Display for CampaignItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampaignItemStatus::Pending => write!(f, "pending"),
            CampaignItemStatus::Dialing => write!(f, "dialing"),
            CampaignItemStatus::Completed => write!(f, "completed"),
        }
    }
}

impl CampaignItemStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(CampaignItemStatus::Pending),
            "dialing" => Some(CampaignItemStatus::Dialing),
            "completed" => Some(CampaignItemStatus::Completed),
            _ => None,
        }
    }
}

/// One destination number of a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignItem {
    pub id: i64,
    pub campaign_id: i64,
    pub phone_number: String,
    pub status: CampaignItemStatus,
    pub call_id: Option<String>,
}

/// Data needed to create a campaign
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub account_id: i64,
    pub name: String,
    pub trunk_id: Option<i64>,
    pub caller_id: Option<String>,
    pub cps: i32,
    pub max_concurrent: i32,
}
