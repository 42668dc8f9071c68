//! Transaction types and status enums for cross-domain action tracking
//!
//! Status progresses: preparing → wallet_confirm → saga_pending → axelar_processing
//!                    → arbitrum_pending → completed
//! Any non-terminal status may drop to failed; failed may be retried back to
//! the status it failed from.

use serde::{Deserialize, Serialize};

/// Player actions tracked by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    PlantSeed,
    HarvestSeed,
    ClaimYield,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::PlantSeed => "plant_seed",
            TransactionType::HarvestSeed => "harvest_seed",
            TransactionType::ClaimYield => "claim_yield",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plant_seed" => Ok(TransactionType::PlantSeed),
            "harvest_seed" => Ok(TransactionType::HarvestSeed),
            "claim_yield" => Ok(TransactionType::ClaimYield),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// Transaction status values, one per observed stage across Saga, Axelar and Arbitrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Client is assembling the action
    Preparing,
    /// Waiting for the player to sign in their wallet
    WalletConfirm,
    /// Submitted to the Saga chainlet, awaiting inclusion
    SagaPending,
    /// Relay has picked up the Saga transaction
    AxelarProcessing,
    /// Relayed call awaiting execution on Arbitrum
    ArbitrumPending,
    /// Effect finalized on Arbitrum
    Completed,
    /// Failed at some stage
    Failed,
}

/// Outcome of checking a status move against the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// One step forward along the pipeline
    Advance,
    /// Same status reported again
    Refresh,
    /// Non-terminal status dropping to failed
    Fail,
    /// Failed moving back to the status it failed from
    Retry,
}

impl TransactionStatus {
    /// Forward pipeline in order
    pub const PIPELINE: [TransactionStatus; 6] = [
        TransactionStatus::Preparing,
        TransactionStatus::WalletConfirm,
        TransactionStatus::SagaPending,
        TransactionStatus::AxelarProcessing,
        TransactionStatus::ArbitrumPending,
        TransactionStatus::Completed,
    ];

    pub const ALL: [TransactionStatus; 7] = [
        TransactionStatus::Preparing,
        TransactionStatus::WalletConfirm,
        TransactionStatus::SagaPending,
        TransactionStatus::AxelarProcessing,
        TransactionStatus::ArbitrumPending,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Preparing => "preparing",
            TransactionStatus::WalletConfirm => "wallet_confirm",
            TransactionStatus::SagaPending => "saga_pending",
            TransactionStatus::AxelarProcessing => "axelar_processing",
            TransactionStatus::ArbitrumPending => "arbitrum_pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    /// Next stage of the forward pipeline, if any
    pub fn next(&self) -> Option<TransactionStatus> {
        match self {
            TransactionStatus::Preparing => Some(TransactionStatus::WalletConfirm),
            TransactionStatus::WalletConfirm => Some(TransactionStatus::SagaPending),
            TransactionStatus::SagaPending => Some(TransactionStatus::AxelarProcessing),
            TransactionStatus::AxelarProcessing => Some(TransactionStatus::ArbitrumPending),
            TransactionStatus::ArbitrumPending => Some(TransactionStatus::Completed),
            TransactionStatus::Completed | TransactionStatus::Failed => None,
        }
    }

    /// Classify a move from `self` to `to`.
    ///
    /// `failed_from` is the status that was active before the record failed;
    /// it is only consulted when `self` is `Failed`. Retry budget is not
    /// checked here.
    pub fn transition_to(
        &self,
        to: TransactionStatus,
        failed_from: Option<TransactionStatus>,
    ) -> Option<TransitionKind> {
        match (*self, to) {
            (TransactionStatus::Failed, target) => {
                (failed_from == Some(target) && !target.is_terminal()).then_some(TransitionKind::Retry)
            }
            (TransactionStatus::Completed, _) => None,
            (from, target) if from == target => Some(TransitionKind::Refresh),
            (_, TransactionStatus::Failed) => Some(TransitionKind::Fail),
            (from, target) if from.next() == Some(target) => Some(TransitionKind::Advance),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown transaction status: {}", s))
    }
}
