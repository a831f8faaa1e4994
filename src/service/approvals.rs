//! Approval workflow operations and time-driven sweeps.

use chrono::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Calculation, CalculationStatus};
use crate::store::CalculationFilter;
use crate::workflow::{ApprovalChain, ChainState, ExpiryOutcome, sweep};

use super::batch::log_batch;
use super::{BatchOutcome, IncentiveService};

impl IncentiveService {
    /// Runs `op` with the approval chain of the calculation's plan.
    fn with_chain<F>(&self, calc: &mut Calculation, op: F) -> EngineResult<()>
    where
        F: FnOnce(&ApprovalChain<'_>, &mut Calculation) -> EngineResult<()>,
    {
        let plan = self.plans.plan(calc.plan_id())?;
        let chain = ApprovalChain::new(&plan.approval, &self.settings.system_actor);
        op(&chain, calc)
    }

    /// Derives where the calculation stands in its approval round.
    pub fn chain_state(&self, calculation_id: Uuid) -> EngineResult<ChainState> {
        let calc = self.store.get(calculation_id)?;
        let plan = self.plans.plan(calc.plan_id())?;
        Ok(ApprovalChain::new(&plan.approval, &self.settings.system_actor).state(&calc))
    }

    /// Submits a calculation and opens the first approval level.
    pub fn submit_for_approval(&self, calculation_id: Uuid, by: &str) -> EngineResult<Calculation> {
        let now = self.clock.now();
        self.mutate_calculation(calculation_id, "submit_for_approval", |calc| {
            self.with_chain(calc, |chain, calc| chain.start(calc, by, now).map(|_| ()))
        })
    }

    /// Approves a pending approval as its assignee.
    pub fn approve(
        &self,
        approval_id: Uuid,
        actor: &str,
        comments: Option<&str>,
    ) -> EngineResult<Calculation> {
        let now = self.clock.now();
        let calc = self.mutate_by_approval(approval_id, "approve", |calc| {
            self.with_chain(calc, |chain, calc| {
                chain.approve(calc, approval_id, actor, comments, now).map(|_| ())
            })
        })?;
        info!(approval_id = %approval_id, calculation_id = %calc.id(), approver_id = actor, "Approval granted");
        Ok(calc)
    }

    /// Rejects a pending approval as its assignee; the calculation is rejected.
    pub fn reject(&self, approval_id: Uuid, actor: &str, reason: &str) -> EngineResult<Calculation> {
        let now = self.clock.now();
        let calc = self.mutate_by_approval(approval_id, "reject", |calc| {
            self.with_chain(calc, |chain, calc| {
                chain.reject(calc, approval_id, actor, reason, now).map(|_| ())
            })
        })?;
        info!(approval_id = %approval_id, calculation_id = %calc.id(), approver_id = actor, "Approval rejected");
        Ok(calc)
    }

    /// Hands a pending decision to another approver at the same level.
    pub fn delegate(
        &self,
        approval_id: Uuid,
        actor: &str,
        delegate_to: &str,
    ) -> EngineResult<Calculation> {
        let now = self.clock.now();
        let calc = self.mutate_by_approval(approval_id, "delegate", |calc| {
            self.with_chain(calc, |chain, calc| {
                chain.delegate(calc, approval_id, actor, delegate_to, now).map(|_| ())
            })
        })?;
        info!(
            approval_id = %approval_id,
            calculation_id = %calc.id(),
            approver_id = actor,
            delegate_to = delegate_to,
            "Approval delegated"
        );
        Ok(calc)
    }

    /// Moves a pending decision up the chain.
    pub fn escalate(&self, approval_id: Uuid, by: &str, reason: &str) -> EngineResult<Calculation> {
        let now = self.clock.now();
        let calc = self.mutate_by_approval(approval_id, "escalate", |calc| {
            self.with_chain(calc, |chain, calc| {
                chain.escalate(calc, approval_id, by, reason, now).map(|_| ())
            })
        })?;
        info!(approval_id = %approval_id, calculation_id = %calc.id(), escalated_by = by, "Approval escalated");
        Ok(calc)
    }

    fn awaiting_approval(&self) -> EngineResult<Vec<Calculation>> {
        self.store.find(&CalculationFilter {
            status: Some(CalculationStatus::PendingApproval),
            ..CalculationFilter::default()
        })
    }

    /// Escalates every pending approval open longer than the escalation SLA.
    pub fn escalate_overdue(&self) -> EngineResult<Vec<BatchOutcome<Calculation>>> {
        let now = self.clock.now();
        let sla = Duration::hours(self.settings.escalation_sla_hours);
        let reason = format!("open longer than {} hours", self.settings.escalation_sla_hours);

        let mut outcomes = Vec::new();
        for calc in self.awaiting_approval()? {
            for approval_id in sweep::overdue_for_escalation(&calc, now, sla) {
                outcomes.push(BatchOutcome {
                    item: approval_id.to_string(),
                    result: self.escalate(approval_id, &self.settings.system_actor, &reason),
                });
            }
        }
        log_batch("escalate_overdue", &outcomes);
        Ok(outcomes)
    }

    /// Expires every pending approval past its deadline and applies the
    /// configured expiry policy.
    pub fn expire_overdue(&self) -> EngineResult<Vec<BatchOutcome<ExpiryOutcome>>> {
        let now = self.clock.now();
        let policy = self.settings.expiry_policy;

        let mut outcomes = Vec::new();
        for calc in self.awaiting_approval()? {
            for approval_id in sweep::expired(&calc, now) {
                let mut outcome = None;
                let expired = self.mutate_by_approval(approval_id, "expire", |calc| {
                    self.with_chain(calc, |chain, calc| {
                        outcome = Some(chain.expire(calc, approval_id, policy, now)?);
                        Ok(())
                    })
                });
                let result = expired
                    .and_then(|_| outcome.ok_or_else(|| EngineError::not_found("approval", approval_id)));
                outcomes.push(BatchOutcome {
                    item: approval_id.to_string(),
                    result,
                });
            }
        }
        log_batch("expire_overdue", &outcomes);
        Ok(outcomes)
    }
}
