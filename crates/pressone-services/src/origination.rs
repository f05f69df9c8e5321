//! Call origination gateway
//!
//! Validates a dial request against the account's trunk and balance policy,
//! records the call and hands it to the switch. Fire-and-forget: the result
//! only says whether the switch took the request; the outcome arrives later
//! as DTMF and hangup events.

use pressone_core::{
    config::{BillingConfig, PrecallCheck},
    models::{is_valid_destination, normalize_number, validate_channel_variable, NewCall},
    traits::{
        AccountRepository, CallRepository, LedgerStore, OriginateCommand, OriginateOutcome,
        SwitchClient, TrunkRepository,
    },
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::{CAUSE_INVALID_DESTINATION, VAR_CALL_ID, VAR_CAMPAIGN_ID, VAR_ITEM_ID};
use crate::reconciler::Reconciler;

/// One outbound call to place
#[derive(Debug, Clone, Default)]
pub struct OriginateRequest {
    pub account_id: i64,
    pub campaign_id: Option<i64>,
    pub campaign_item_id: Option<i64>,
    pub trunk_id: i64,
    pub destination: String,
    pub caller_id: Option<String>,
    /// Extra channel variables passed to the IVR
    pub variables: BTreeMap<String, String>,
}

/// Whether the switch accepted the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginateResult {
    pub call_id: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Call origination gateway
pub struct OriginationGateway<L: LedgerStore> {
    switch: Arc<dyn SwitchClient>,
    calls: Arc<dyn CallRepository>,
    trunks: Arc<dyn TrunkRepository>,
    accounts: Arc<dyn AccountRepository>,
    reconciler: Arc<Reconciler<L>>,
    billing: BillingConfig,
    default_caller_id: Option<String>,
}

impl<L: LedgerStore> OriginationGateway<L> {
    pub fn new(
        switch: Arc<dyn SwitchClient>,
        calls: Arc<dyn CallRepository>,
        trunks: Arc<dyn TrunkRepository>,
        accounts: Arc<dyn AccountRepository>,
        reconciler: Arc<Reconciler<L>>,
        billing: BillingConfig,
        default_caller_id: Option<String>,
    ) -> Self {
        Self {
            switch,
            calls,
            trunks,
            accounts,
            reconciler,
            billing,
            default_caller_id,
        }
    }

    /// Place one call
    ///
    /// # Errors
    ///
    /// - `TrunkNotFound` if the trunk does not exist or belongs to another account
    /// - `TrunkUnavailable` if the trunk is disabled
    /// - `InsufficientBalance` if the pre-call policy refuses the account
    /// - `InvalidInput` if a channel variable could forge switch headers
    /// - `SwitchUnavailable` if the switch could not be reached; the call row
    ///   stays ORIGINATING until the stale-call sweeper fails it
    ///
    /// A switch rejection or a malformed destination is not an error: the
    /// call is settled FAILED at zero cost and `accepted` is false.
    #[instrument(skip(self, request), fields(account_id = request.account_id, trunk_id = request.trunk_id))]
    pub async fn originate(&self, request: OriginateRequest) -> AppResult<OriginateResult> {
        for (name, value) in &request.variables {
            validate_channel_variable(name, value).map_err(|reason| {
                warn!("Refusing origination: {}", reason);
                AppError::InvalidInput(reason)
            })?;
        }

        let trunk = self
            .trunks
            .find_by_id(request.trunk_id)
            .await?
            .filter(|t| t.account_id == request.account_id)
            .ok_or_else(|| AppError::TrunkNotFound(request.trunk_id.to_string()))?;

        if !trunk.is_usable() {
            warn!("Trunk {} ({}) is not usable", trunk.id, trunk.status);
            return Err(AppError::TrunkUnavailable(trunk.name));
        }

        let account = self
            .accounts
            .find_by_id(request.account_id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(request.account_id.to_string()))?;

        let policy = self.billing.precall_check;
        if !account.passes_precall(policy, self.billing.min_call_balance) {
            warn!(
                "Account {} refused by pre-call check {}: balance {}",
                account.id, policy, account.credit_balance
            );
            let required = match policy {
                PrecallCheck::Minimum => self.billing.min_call_balance,
                _ => Decimal::ZERO,
            };
            return Err(AppError::InsufficientBalance {
                required: required.to_string(),
                available: account.credit_balance.to_string(),
            });
        }

        let caller_id = request
            .caller_id
            .clone()
            .or_else(|| account.caller_id.clone())
            .or_else(|| self.default_caller_id.clone());

        let dialable = is_valid_destination(&request.destination);
        let destination = if dialable {
            normalize_number(&request.destination)
        } else {
            request.destination.trim().to_string()
        };

        let call_id = Uuid::new_v4().to_string();
        let call = self
            .calls
            .create_queued(&NewCall {
                call_id: call_id.clone(),
                campaign_id: request.campaign_id,
                campaign_item_id: request.campaign_item_id,
                account_id: account.id,
                trunk_id: trunk.id,
                destination: destination.clone(),
                caller_id: caller_id.clone(),
            })
            .await?;
        self.calls.mark_originating(&call.call_id).await?;

        if !dialable {
            warn!("Destination {:?} is not dialable", request.destination);
            return self.refuse(call_id, CAUSE_INVALID_DESTINATION).await;
        }

        let mut variables = request.variables;
        variables.insert(VAR_CALL_ID.to_string(), call_id.clone());
        if let Some(campaign_id) = request.campaign_id {
            variables.insert(VAR_CAMPAIGN_ID.to_string(), campaign_id.to_string());
        }
        if let Some(item_id) = request.campaign_item_id {
            variables.insert(VAR_ITEM_ID.to_string(), item_id.to_string());
        }

        let command = OriginateCommand {
            call_id: call_id.clone(),
            destination,
            endpoint: trunk.endpoint,
            caller_id,
            variables,
        };

        match self.switch.originate(&command).await {
            Ok(OriginateOutcome::Accepted) => {
                info!("Call {} to {} handed to switch", call_id, command.destination);
                Ok(OriginateResult {
                    call_id,
                    accepted: true,
                    reason: None,
                })
            }
            Ok(OriginateOutcome::Rejected { reason }) => self.refuse(call_id, &reason).await,
            Err(e) => {
                error!("Origination of call {} failed: {}", call_id, e);
                Err(e)
            }
        }
    }

    async fn refuse(&self, call_id: String, reason: &str) -> AppResult<OriginateResult> {
        self.reconciler.fail_call(&call_id, reason).await?;
        Ok(OriginateResult {
            call_id,
            accepted: false,
            reason: Some(reason.to_string()),
        })
    }
}
