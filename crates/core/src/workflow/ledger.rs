//! Ledger gateway seam.
//!
//! Approved withdrawals and transfers are posted by an external double-entry
//! ledger. The engine only builds the instruction and records the receipt.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vaultline_shared::types::{Money, WorkflowInstanceId};

use crate::workflow::types::MutationRequest;

/// A posting the ledger is asked to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingInstruction {
    /// Idempotency key; one posting per approval instance.
    pub instance_id: WorkflowInstanceId,
    /// `withdrawal` or `transfer`.
    pub kind: String,
    /// Account debited.
    pub debit_account: String,
    /// Account credited; `None` for cash withdrawals.
    pub credit_account: Option<String>,
    /// Amount posted.
    pub amount: Money,
    /// Caller reference.
    pub reference: Option<String>,
}

impl PostingInstruction {
    /// Builds the instruction for a monetary request. `None` for
    /// configuration mutations.
    #[must_use]
    pub fn from_request(instance_id: WorkflowInstanceId, request: &MutationRequest) -> Option<Self> {
        match request {
            MutationRequest::Withdrawal {
                account,
                amount,
                reference,
            } => Some(Self {
                instance_id,
                kind: "withdrawal".into(),
                debit_account: account.clone(),
                credit_account: None,
                amount: *amount,
                reference: reference.clone(),
            }),
            MutationRequest::Transfer {
                from_account,
                to_account,
                amount,
                reference,
            } => Some(Self {
                instance_id,
                kind: "transfer".into(),
                debit_account: from_account.clone(),
                credit_account: Some(to_account.clone()),
                amount: *amount,
                reference: reference.clone(),
            }),
            MutationRequest::Activate { .. }
            | MutationRequest::Update { .. }
            | MutationRequest::Archive { .. } => None,
        }
    }
}

/// Ledger confirmation of a posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingReceipt {
    /// Ledger-side posting id.
    pub posting_id: String,
    /// When the ledger accepted the posting.
    pub posted_at: DateTime<Utc>,
}

/// Ledger gateway failures.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// No gateway is configured in this deployment.
    #[error("No ledger gateway configured")]
    Unconfigured,

    /// The ledger refused the posting.
    #[error("Ledger rejected posting: {0}")]
    Rejected(String),

    /// The ledger could not be reached.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Posts approved monetary requests.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Posts `instruction`. Must be idempotent on `instance_id`.
    async fn post(&self, instruction: &PostingInstruction) -> Result<PostingReceipt, LedgerError>;
}

/// Gateway for deployments without a ledger; every posting fails.
pub struct UnconfiguredLedger;

#[async_trait]
impl LedgerGateway for UnconfiguredLedger {
    async fn post(&self, _instruction: &PostingInstruction) -> Result<PostingReceipt, LedgerError> {
        Err(LedgerError::Unconfigured)
    }
}

/// In-process gateway that accepts every posting and remembers it.
#[derive(Default)]
pub struct RecordingLedger {
    postings: Mutex<Vec<PostingInstruction>>,
}

impl RecordingLedger {
    /// Postings accepted so far, in order.
    #[must_use]
    pub fn postings(&self) -> Vec<PostingInstruction> {
        self.postings
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerGateway for RecordingLedger {
    async fn post(&self, instruction: &PostingInstruction) -> Result<PostingReceipt, LedgerError> {
        let mut postings = self
            .postings
            .lock()
            .map_err(|_| LedgerError::Unavailable("recording ledger poisoned".into()))?;

        if !postings.iter().any(|p| p.instance_id == instruction.instance_id) {
            postings.push(instruction.clone());
        }

        Ok(PostingReceipt {
            posting_id: format!("mem-{}", instruction.instance_id),
            posted_at: Utc::now(),
        })
    }
}
