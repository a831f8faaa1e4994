//! Approval decision records.
//!
//! One [`Approval`] exists per approver decision at a level of a
//! calculation's sign-off chain. Records start `Pending` and move to exactly
//! one terminal status; they are never reopened or deleted. Sequencing across
//! levels is the job of [`crate::workflow::ApprovalChain`], not of the record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Status of a single approval record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for the approver.
    Pending,
    /// The approver signed off.
    Approved,
    /// The approver rejected the calculation.
    Rejected,
    /// The approval overran its SLA and moved up the chain.
    Escalated,
    /// The approver handed the decision to someone else.
    Delegated,
    /// The approval was withdrawn (chain rejected, calculation voided).
    Cancelled,
    /// The approval passed its expiry time without a decision.
    Expired,
}

impl ApprovalStatus {
    /// Returns the string representation of the status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Escalated => "escalated",
            Self::Delegated => "delegated",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Every status except `Pending` is terminal.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single approver decision within a calculation's sign-off chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    id: Uuid,
    calculation_id: Uuid,
    approver_id: String,
    approval_level: u32,
    round: u32,
    status: ApprovalStatus,
    created_at: DateTime<Utc>,
    action_date: Option<DateTime<Utc>>,
    comments: Option<String>,
    delegated_to_id: Option<String>,
    delegated_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl Approval {
    /// Creates a pending approval.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `level` is zero or the approver id is blank.
    pub fn new(
        calculation_id: Uuid,
        approver_id: impl Into<String>,
        level: u32,
        round: u32,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> EngineResult<Self> {
        let approver_id = approver_id.into();
        if level == 0 {
            return Err(EngineError::validation(
                "approval_level",
                "must be at least 1",
            ));
        }
        if approver_id.trim().is_empty() {
            return Err(EngineError::validation("approver_id", "must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            calculation_id,
            approver_id,
            approval_level: level,
            round,
            status: ApprovalStatus::Pending,
            created_at: now,
            action_date: None,
            comments: None,
            delegated_to_id: None,
            delegated_at: None,
            expires_at,
        })
    }

    /// Unique identifier for the approval.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The calculation this approval belongs to.
    pub fn calculation_id(&self) -> Uuid {
        self.calculation_id
    }

    /// The approver the decision is assigned to.
    pub fn approver_id(&self) -> &str {
        &self.approver_id
    }

    /// The level in the chain (1-based).
    pub fn level(&self) -> u32 {
        self.approval_level
    }

    /// The submission round the approval was opened in.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Current status.
    pub fn status(&self) -> ApprovalStatus {
        self.status
    }

    /// When the approval was opened.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the approval left `Pending`.
    pub fn action_date(&self) -> Option<DateTime<Utc>> {
        self.action_date
    }

    /// Comments or reason recorded with the decision.
    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    /// The delegate, if the approval was delegated.
    pub fn delegated_to_id(&self) -> Option<&str> {
        self.delegated_to_id.as_deref()
    }

    /// When the approval was delegated.
    pub fn delegated_at(&self) -> Option<DateTime<Utc>> {
        self.delegated_at
    }

    /// When the approval stops being actionable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true while the approval awaits a decision.
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    fn ensure_pending(&self, operation: &str) -> EngineResult<()> {
        if !self.is_pending() {
            return Err(EngineError::InvalidTransition {
                entity: "approval".to_string(),
                id: self.id,
                status: self.status.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn finish(&mut self, status: ApprovalStatus, comments: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.action_date = Some(now);
        if comments.is_some() {
            self.comments = comments;
        }
    }

    /// Signs off on the calculation at this level.
    pub fn approve(&mut self, comments: Option<String>, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_pending("approve")?;
        self.finish(ApprovalStatus::Approved, comments, now);
        Ok(())
    }

    /// Rejects the calculation; a reason is mandatory.
    pub fn reject(&mut self, reason: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_pending("reject")?;
        let reason = required_reason(reason)?;
        self.finish(ApprovalStatus::Rejected, Some(reason), now);
        Ok(())
    }

    /// Moves the decision up the chain.
    pub fn escalate(&mut self, reason: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_pending("escalate")?;
        let reason = required_reason(reason)?;
        self.finish(ApprovalStatus::Escalated, Some(reason), now);
        Ok(())
    }

    /// Hands the decision to `delegate_to_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SelfDelegation`] if the delegate is the current approver.
    pub fn delegate(&mut self, delegate_to_id: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_pending("delegate")?;
        if delegate_to_id.trim().is_empty() {
            return Err(EngineError::validation("delegate_to_id", "must not be empty"));
        }
        if delegate_to_id == self.approver_id {
            return Err(EngineError::SelfDelegation {
                approver_id: self.approver_id.clone(),
            });
        }
        self.finish(ApprovalStatus::Delegated, None, now);
        self.delegated_to_id = Some(delegate_to_id.to_string());
        self.delegated_at = Some(now);
        Ok(())
    }

    /// Withdraws the approval. Only pending approvals can be cancelled, so
    /// decided (approved or rejected) records stay untouched.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_pending("cancel")?;
        let reason = required_reason(reason)?;
        self.finish(ApprovalStatus::Cancelled, Some(reason), now);
        Ok(())
    }

    /// Returns true if the approval is pending and past its expiry time.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.expires_at.is_some_and(|expires| now > expires)
    }

    /// Marks a pending approval as expired; legal only once `now` is past `expires_at`.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_pending("expire")?;
        if !self.is_expired_at(now) {
            return Err(EngineError::InvalidTransition {
                entity: "approval".to_string(),
                id: self.id,
                status: format!("{} (not yet expired)", self.status),
                operation: "expire".to_string(),
            });
        }
        self.finish(ApprovalStatus::Expired, None, now);
        Ok(())
    }
}

pub(crate) fn required_reason(reason: &str) -> EngineResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::validation("reason", "must not be empty"));
    }
    Ok(reason.to_string())
}
