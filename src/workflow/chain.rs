//! Sequential multi-level approval chain.
//!
//! The chain opens one level at a time. Level N must be approved before
//! level N+1 is opened, and the calculation itself is approved exactly once,
//! when its last level signs off. A rejection at any level ends the round.
//!
//! Every operation checks its whole precondition (assignee, approval state,
//! next approver) before mutating the calculation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Approval, ApprovalConfig, ApprovalStatus, Calculation, CalculationStatus, required_reason,
};

use super::ExpiryPolicy;

/// Where a calculation stands in its current approval round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "level", rename_all = "snake_case")]
pub enum ChainState {
    /// Never submitted.
    NotStarted,
    /// Waiting on the given level.
    AwaitingLevel(u32),
    /// Every required level approved.
    AllApproved,
    /// A level rejected the calculation, or an expiry rejected it.
    Rejected,
    /// The calculation was voided.
    Cancelled,
}

/// What an expiry led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpiryOutcome {
    /// The calculation was rejected.
    Rejected,
    /// The decision moved to another approver.
    Escalated {
        /// The level now pending.
        level: u32,
        /// Who it is pending with.
        approver_id: String,
    },
    /// The same approver was given a fresh deadline.
    Renotified,
}

/// Coordinates the approvals of a calculation under one plan's approval config.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalChain<'a> {
    config: &'a ApprovalConfig,
    system_actor: &'a str,
}

impl<'a> ApprovalChain<'a> {
    /// Creates a chain for `config`; automatic decisions are made as `system_actor`.
    pub fn new(config: &'a ApprovalConfig, system_actor: &'a str) -> Self {
        Self {
            config,
            system_actor,
        }
    }

    /// Derives the chain state from the approvals of the current round.
    pub fn state(&self, calc: &Calculation) -> ChainState {
        if calc.status() == CalculationStatus::Voided {
            return ChainState::Cancelled;
        }
        if calc.approval_round() == 0 {
            return ChainState::NotStarted;
        }
        let round: Vec<&Approval> = calc.current_round_approvals().collect();
        if calc.status() == CalculationStatus::Rejected
            || round.iter().any(|a| a.status() == ApprovalStatus::Rejected)
        {
            return ChainState::Rejected;
        }
        if let Some(level) = round.iter().filter(|a| a.is_pending()).map(|a| a.level()).min() {
            return ChainState::AwaitingLevel(level);
        }
        let approved_top = round
            .iter()
            .filter(|a| a.status() == ApprovalStatus::Approved)
            .map(|a| a.level())
            .max()
            .unwrap_or(0);
        if approved_top >= self.config.required_levels() {
            ChainState::AllApproved
        } else {
            ChainState::AwaitingLevel(approved_top + 1)
        }
    }

    fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.config.expiry_hours.map(|hours| now + Duration::hours(hours))
    }

    fn approver_for(&self, level: u32) -> EngineResult<&'a str> {
        self.config.approver_for(level).ok_or_else(|| {
            EngineError::validation("approvers", format!("no approver configured for level {}", level))
        })
    }

    /// Finds a pending approval of the current round assigned to `actor`.
    fn assigned_pending<'c>(
        &self,
        calc: &'c Calculation,
        approval_id: Uuid,
        actor: &str,
        operation: &str,
    ) -> EngineResult<&'c Approval> {
        let approval = calc.approval(approval_id)?;
        if !approval.is_pending() || approval.round() != calc.approval_round() {
            return Err(EngineError::InvalidTransition {
                entity: "approval".to_string(),
                id: approval_id,
                status: approval.status().to_string(),
                operation: operation.to_string(),
            });
        }
        if calc.status() != CalculationStatus::PendingApproval {
            return Err(EngineError::InvalidTransition {
                entity: "calculation".to_string(),
                id: calc.id(),
                status: calc.status().to_string(),
                operation: operation.to_string(),
            });
        }
        if approval.approver_id() != actor {
            return Err(EngineError::ApproverMismatch {
                approval_id,
                assigned: approval.approver_id().to_string(),
                actor: actor.to_string(),
            });
        }
        Ok(approval)
    }

    /// Where an escalation from `approval` goes: the next level's approver,
    /// or the plan's escalation approver at the last level.
    fn escalation_target(&self, approval: &Approval) -> EngineResult<(u32, &'a str)> {
        let level = approval.level();
        let (level, target) = if level < self.config.required_levels() {
            (level + 1, self.approver_for(level + 1)?)
        } else {
            let target = self.config.escalation_approver_id.as_deref().ok_or_else(|| {
                EngineError::validation(
                    "escalation_approver_id",
                    format!("level {} is the last level and the plan has no escalation approver", level),
                )
            })?;
            (level, target)
        };
        if target == approval.approver_id() {
            return Err(EngineError::validation(
                "escalation",
                format!("{} is already the approver at level {}", target, approval.level()),
            ));
        }
        Ok((level, target))
    }

    /// Submits the calculation and opens level 1.
    ///
    /// Plans that do not require approval are approved straight away as the
    /// system actor.
    pub fn start(&self, calc: &mut Calculation, submitted_by: &str, now: DateTime<Utc>) -> EngineResult<ChainState> {
        if self.config.required_levels() == 0 {
            calc.submit_for_approval(submitted_by, now)?;
            calc.approve(self.system_actor, Some("approval not required by plan"), now)?;
            return Ok(ChainState::AllApproved);
        }
        let first = self.approver_for(1)?;
        calc.submit_for_approval(submitted_by, now)?;
        calc.open_approval(first, 1, self.expires_at(now), now)?;
        Ok(ChainState::AwaitingLevel(1))
    }

    /// Records `actor`'s approval. Opens the next level, or approves the
    /// calculation when the last level signs off.
    pub fn approve(
        &self,
        calc: &mut Calculation,
        approval_id: Uuid,
        actor: &str,
        comments: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<ChainState> {
        let level = self.assigned_pending(calc, approval_id, actor, "approve")?.level();
        let next = if level < self.config.required_levels() {
            Some(self.approver_for(level + 1)?)
        } else {
            None
        };

        calc.approval_mut(approval_id)?
            .approve(comments.map(str::to_string), now)?;
        match next {
            Some(next_approver) => {
                calc.open_approval(next_approver, level + 1, self.expires_at(now), now)?;
            }
            None => calc.approve(actor, comments, now)?,
        }
        Ok(self.state(calc))
    }

    /// Records `actor`'s rejection, cancels the rest of the round and rejects
    /// the calculation.
    pub fn reject(
        &self,
        calc: &mut Calculation,
        approval_id: Uuid,
        actor: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ChainState> {
        let level = self.assigned_pending(calc, approval_id, actor, "reject")?.level();
        let reason = required_reason(reason)?;

        calc.approval_mut(approval_id)?.reject(&reason, now)?;
        calc.cancel_pending_approvals(&format!("rejected at level {}", level), now)?;
        calc.reject(actor, &reason, now)?;
        Ok(ChainState::Rejected)
    }

    /// Hands `actor`'s pending decision to `delegate_to` at the same level.
    /// Returns the id of the new pending approval.
    pub fn delegate(
        &self,
        calc: &mut Calculation,
        approval_id: Uuid,
        actor: &str,
        delegate_to: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Uuid> {
        let approval = self.assigned_pending(calc, approval_id, actor, "delegate")?;
        let level = approval.level();
        let expires_at = approval.expires_at();

        calc.approval_mut(approval_id)?.delegate(delegate_to, now)?;
        calc.open_approval(delegate_to, level, expires_at, now)
    }

    /// Moves a pending decision up the chain. Returns the id of the new
    /// pending approval.
    ///
    /// Only the assignee or the system actor may escalate.
    pub fn escalate(
        &self,
        calc: &mut Calculation,
        approval_id: Uuid,
        actor: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Uuid> {
        let approval = if actor == self.system_actor {
            let assignee = calc.approval(approval_id)?.approver_id().to_string();
            self.assigned_pending(calc, approval_id, &assignee, "escalate")?
        } else {
            self.assigned_pending(calc, approval_id, actor, "escalate")?
        };
        let (level, target) = self.escalation_target(approval)?;
        let reason = required_reason(reason)?;

        calc.approval_mut(approval_id)?.escalate(&reason, now)?;
        calc.open_approval(target, level, self.expires_at(now), now)
    }

    /// Expires a pending approval whose deadline has passed and applies `policy`.
    ///
    /// An `Escalate` policy with nowhere to escalate to falls back to rejection.
    pub fn expire(
        &self,
        calc: &mut Calculation,
        approval_id: Uuid,
        policy: ExpiryPolicy,
        now: DateTime<Utc>,
    ) -> EngineResult<ExpiryOutcome> {
        let approval = calc.approval(approval_id)?;
        let assignee = approval.approver_id().to_string();
        self.assigned_pending(calc, approval_id, &assignee, "expire")?;
        if !approval.is_expired_at(now) {
            return Err(EngineError::InvalidTransition {
                entity: "approval".to_string(),
                id: approval_id,
                status: format!("{} (not yet expired)", approval.status()),
                operation: "expire".to_string(),
            });
        }
        let level = approval.level();
        let escalation = match policy {
            ExpiryPolicy::Escalate => self.escalation_target(approval).ok(),
            _ => None,
        };

        calc.approval_mut(approval_id)?.mark_expired(now)?;
        match (policy, escalation) {
            (ExpiryPolicy::Renotify, _) => {
                calc.open_approval(&assignee, level, self.expires_at(now), now)?;
                Ok(ExpiryOutcome::Renotified)
            }
            (ExpiryPolicy::Escalate, Some((level, target))) => {
                calc.open_approval(target, level, self.expires_at(now), now)?;
                Ok(ExpiryOutcome::Escalated {
                    level,
                    approver_id: target.to_string(),
                })
            }
            _ => {
                let reason = format!("approval at level {} expired", level);
                calc.cancel_pending_approvals(&reason, now)?;
                calc.reject(self.system_actor, &reason, now)?;
                Ok(ExpiryOutcome::Rejected)
            }
        }
    }
}
