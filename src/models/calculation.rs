//! The incentive calculation aggregate and its lifecycle state machine.
//!
//! A [`Calculation`] is created once per employee, plan and period and then
//! only moves forward through [`CalculationStatus`] transitions. Each
//! transition checks its whole precondition before touching any field, so a
//! failed call leaves the aggregate exactly as it was. Successful transitions
//! buffer a [`DomainEvent`]; the service takes the buffer before persisting
//! and publishes it after the write commits.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::events::{DomainEvent, DomainEventKind};

use super::approval::required_reason;
use super::{Approval, AuditStep, Currency, DateRange, Money, Percentage};

/// Lifecycle status of a calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    /// Created, nothing computed yet.
    Pending,
    /// Gross payout computed.
    Calculated,
    /// Net payout scaled by an eligibility factor.
    Prorated,
    /// Net payout limited by a plan cap.
    Capped,
    /// Waiting on the approval chain.
    PendingApproval,
    /// Every level signed off.
    Approved,
    /// The approval chain rejected the payout.
    Rejected,
    /// Handed to payroll.
    Paid,
    /// Achievement did not reach the plan threshold.
    BelowThreshold,
    /// The employee was not eligible during the period.
    Ineligible,
    /// The payout was corrected.
    Adjusted,
    /// Cancelled; never changes again.
    Voided,
}

impl CalculationStatus {
    /// Returns the string representation of the status.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Calculated => "calculated",
            Self::Prorated => "prorated",
            Self::Capped => "capped",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
            Self::BelowThreshold => "below_threshold",
            Self::Ineligible => "ineligible",
            Self::Adjusted => "adjusted",
            Self::Voided => "voided",
        }
    }

    /// Returns true if no further transition is possible.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Voided)
    }
}

impl fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use CalculationStatus::*;

const SUBMITTABLE: &[CalculationStatus] = &[Calculated, Prorated, Capped, Adjusted];
const CAPPABLE: &[CalculationStatus] = &[Calculated, Prorated, Adjusted];
const ADJUSTABLE_IN_PLACE: &[CalculationStatus] = &[Calculated, Prorated, Capped];
const RECALCULABLE: &[CalculationStatus] =
    &[Calculated, Prorated, Capped, Adjusted, BelowThreshold, Rejected];
const VERSIONABLE: &[CalculationStatus] = &[
    Calculated,
    Prorated,
    Capped,
    Adjusted,
    Approved,
    Rejected,
    Paid,
    BelowThreshold,
];

/// A recomputed payout used to open a new version of a calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisedPayout {
    /// The corrected actual value.
    pub actual_value: Decimal,
    /// Achievement for the corrected actual value.
    pub achievement: Percentage,
    /// Gross incentive before proration and caps.
    pub gross_incentive: Money,
    /// Net incentive after proration and caps.
    pub net_incentive: Money,
    /// Proration factor applied, if any.
    pub prorata_factor: Option<Percentage>,
    /// The slab that priced the payout, if any.
    pub applied_slab_id: Option<Uuid>,
    /// Rule trace of the recomputation.
    pub audit_trace: Vec<AuditStep>,
}

/// The incentive computation for one employee, plan and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    id: Uuid,
    employee_id: String,
    plan_id: String,
    period: DateRange,
    target_value: Decimal,
    actual_value: Decimal,
    achievement: Percentage,
    gross_incentive: Money,
    net_incentive: Money,
    prorata_factor: Option<Percentage>,
    applied_slab_id: Option<Uuid>,
    status: CalculationStatus,
    version: u32,
    previous_version_id: Option<Uuid>,
    superseded_by: Option<Uuid>,
    notes: Vec<String>,
    rejection_reason: Option<String>,
    void_reason: Option<String>,
    is_active: bool,
    revision: u64,
    approval_round: u32,
    approvals: Vec<Approval>,
    audit_trace: Vec<AuditStep>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    submitted_by: Option<String>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    paid_by: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    voided_by: Option<String>,
    voided_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pending_events: Vec<DomainEvent>,
}

impl Calculation {
    /// Creates a pending calculation.
    ///
    /// The achievement percentage is derived here so it always equals
    /// `actual / target × 100`; the incentive currency is fixed for the
    /// aggregate's lifetime.
    ///
    /// # Example
    ///
    /// ```
    /// use incentive_engine::models::{Calculation, CalculationStatus, Currency, DateRange};
    /// use chrono::{NaiveDate, Utc};
    /// use rust_decimal::Decimal;
    ///
    /// let january = DateRange::new(
    ///     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    ///     NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
    /// ).unwrap();
    ///
    /// let calc = Calculation::new(
    ///     "emp_001", "plan_sales", january,
    ///     Decimal::from(100000), Decimal::from(120000),
    ///     Currency::new("INR").unwrap(), Utc::now(),
    /// ).unwrap();
    ///
    /// assert_eq!(calc.status(), CalculationStatus::Pending);
    /// assert_eq!(calc.achievement().value(), Decimal::from(120));
    /// assert_eq!(calc.version(), 1);
    /// ```
    pub fn new(
        employee_id: impl Into<String>,
        plan_id: impl Into<String>,
        period: DateRange,
        target_value: Decimal,
        actual_value: Decimal,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> EngineResult<Self> {
        period.validate()?;
        let achievement = Percentage::achievement(actual_value, target_value)?;
        Ok(Self {
            id: Uuid::new_v4(),
            employee_id: employee_id.into(),
            plan_id: plan_id.into(),
            period,
            target_value,
            actual_value,
            achievement,
            gross_incentive: Money::zero(currency.clone()),
            net_incentive: Money::zero(currency),
            prorata_factor: None,
            applied_slab_id: None,
            status: Pending,
            version: 1,
            previous_version_id: None,
            superseded_by: None,
            notes: Vec::new(),
            rejection_reason: None,
            void_reason: None,
            is_active: true,
            revision: 0,
            approval_round: 0,
            approvals: Vec::new(),
            audit_trace: Vec::new(),
            created_at: now,
            updated_at: now,
            submitted_by: None,
            approved_by: None,
            approved_at: None,
            paid_by: None,
            paid_at: None,
            voided_by: None,
            voided_at: None,
            pending_events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Unique identifier for the calculation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The employee the calculation is for.
    pub fn employee_id(&self) -> &str {
        &self.employee_id
    }

    /// The plan the calculation is priced under.
    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    /// The incentive period.
    pub fn period(&self) -> DateRange {
        self.period
    }

    /// The target the actual value was measured against.
    pub fn target_value(&self) -> Decimal {
        self.target_value
    }

    /// The actual value achieved.
    pub fn actual_value(&self) -> Decimal {
        self.actual_value
    }

    /// Achievement percentage (`actual / target × 100`).
    pub fn achievement(&self) -> Percentage {
        self.achievement
    }

    /// Gross incentive before proration and caps.
    pub fn gross_incentive(&self) -> &Money {
        &self.gross_incentive
    }

    /// Net incentive payable.
    pub fn net_incentive(&self) -> &Money {
        &self.net_incentive
    }

    /// The currency every amount of this calculation is in.
    pub fn currency(&self) -> &Currency {
        &self.gross_incentive.currency
    }

    /// Proration factor, if proration was applied.
    pub fn prorata_factor(&self) -> Option<Percentage> {
        self.prorata_factor
    }

    /// The slab that priced the payout.
    pub fn applied_slab_id(&self) -> Option<Uuid> {
        self.applied_slab_id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> CalculationStatus {
        self.status
    }

    /// Business version; starts at 1 and only grows.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The calculation this version corrects.
    pub fn previous_version_id(&self) -> Option<Uuid> {
        self.previous_version_id
    }

    /// The calculation that corrects this one.
    pub fn superseded_by(&self) -> Option<Uuid> {
        self.superseded_by
    }

    /// Free-form notes recorded along the lifecycle.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Why the approval chain rejected the calculation.
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Why the calculation was voided.
    pub fn void_reason(&self) -> Option<&str> {
        self.void_reason.as_deref()
    }

    /// False once voided.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns true if this calculation is the live version of its chain.
    pub fn is_head(&self) -> bool {
        self.is_active && self.superseded_by.is_none()
    }

    /// Optimistic-concurrency token maintained by the store.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Sets the concurrency token. Only persistence backends call this.
    pub fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Number of times the calculation has been submitted for approval.
    pub fn approval_round(&self) -> u32 {
        self.approval_round
    }

    /// Every approval ever opened for this calculation.
    pub fn approvals(&self) -> &[Approval] {
        &self.approvals
    }

    /// Approvals opened in the current submission round.
    pub fn current_round_approvals(&self) -> impl Iterator<Item = &Approval> {
        let round = self.approval_round;
        self.approvals.iter().filter(move |a| a.round() == round)
    }

    /// Looks up an approval by id.
    pub fn approval(&self, approval_id: Uuid) -> EngineResult<&Approval> {
        self.approvals
            .iter()
            .find(|a| a.id() == approval_id)
            .ok_or_else(|| EngineError::not_found("approval", approval_id))
    }

    pub(crate) fn approval_mut(&mut self, approval_id: Uuid) -> EngineResult<&mut Approval> {
        self.approvals
            .iter_mut()
            .find(|a| a.id() == approval_id)
            .ok_or_else(|| EngineError::not_found("approval", approval_id))
    }

    /// Rule trace of the latest computation.
    pub fn audit_trace(&self) -> &[AuditStep] {
        &self.audit_trace
    }

    /// Replaces the rule trace with the steps of a new computation.
    pub fn record_trace(&mut self, steps: Vec<AuditStep>) {
        self.audit_trace = steps;
    }

    /// When the calculation was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the calculation last changed.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Who submitted the calculation for approval most recently.
    pub fn submitted_by(&self) -> Option<&str> {
        self.submitted_by.as_deref()
    }

    /// Who gave the final approval.
    pub fn approved_by(&self) -> Option<&str> {
        self.approved_by.as_deref()
    }

    /// Who marked the calculation paid.
    pub fn paid_by(&self) -> Option<&str> {
        self.paid_by.as_deref()
    }

    /// Who voided the calculation.
    pub fn voided_by(&self) -> Option<&str> {
        self.voided_by.as_deref()
    }

    /// Events raised since the last [`Calculation::take_events`].
    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.pending_events
    }

    /// Drains the buffered events.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    /// Superseded versions are kept for the audit history only.
    fn ensure_head(&self, operation: &str) -> EngineResult<()> {
        if self.superseded_by.is_some() {
            return Err(self.invalid_transition(&format!("{} superseded version", operation)));
        }
        Ok(())
    }

    fn ensure_status(&self, allowed: &[CalculationStatus], operation: &str) -> EngineResult<()> {
        self.ensure_head(operation)?;
        if !allowed.contains(&self.status) {
            return Err(self.invalid_transition(operation));
        }
        Ok(())
    }

    fn invalid_transition(&self, operation: &str) -> EngineError {
        EngineError::InvalidTransition {
            entity: "calculation".to_string(),
            id: self.id,
            status: self.status.to_string(),
            operation: operation.to_string(),
        }
    }

    fn ensure_amount(&self, field: &str, amount: &Money) -> EngineResult<()> {
        if amount.currency != *self.currency() {
            return Err(EngineError::CurrencyMismatch {
                expected: self.currency().to_string(),
                found: amount.currency.to_string(),
            });
        }
        if amount.is_negative() {
            return Err(EngineError::validation(
                field,
                format!("{} must not be negative", amount),
            ));
        }
        Ok(())
    }

    fn ensure_actor(field: &str, actor: &str) -> EngineResult<()> {
        if actor.trim().is_empty() {
            return Err(EngineError::validation(field, "must not be empty"));
        }
        Ok(())
    }

    fn raise(&mut self, kind: DomainEventKind, now: DateTime<Utc>) {
        self.updated_at = now;
        self.pending_events
            .push(DomainEvent::new(self.id, self.employee_id.clone(), now, kind));
    }

    fn zero_amounts(&mut self) {
        let currency = self.currency().clone();
        self.gross_incentive = Money::zero(currency.clone());
        self.net_incentive = Money::zero(currency);
        self.prorata_factor = None;
        self.applied_slab_id = None;
    }

    // ------------------------------------------------------------------
    // Computation transitions
    // ------------------------------------------------------------------

    /// Records the computed gross payout: `Pending → Calculated`, net = gross.
    pub fn calculate(
        &mut self,
        gross: Money,
        slab_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.ensure_status(&[Pending], "calculate")?;
        self.ensure_amount("gross_incentive", &gross)?;

        self.gross_incentive = gross.clone();
        self.net_incentive = gross.clone();
        self.applied_slab_id = slab_id;
        self.status = Calculated;
        self.raise(
            DomainEventKind::CalculationCompleted {
                gross_incentive: gross,
                applied_slab_id: slab_id,
            },
            now,
        );
        Ok(())
    }

    /// Scales the payout by an eligibility factor: `Calculated → Prorated`,
    /// net = gross × factor / 100. The factor must lie in `(0, 100]`.
    pub fn apply_prorata(&mut self, factor: Percentage, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_status(&[Calculated], "prorate")?;
        if factor.is_zero() || factor > Percentage::HUNDRED {
            return Err(EngineError::validation(
                "prorata_factor",
                format!("{} is outside (0, 100]", factor),
            ));
        }

        self.net_incentive = self.gross_incentive.percent_of(factor)?;
        self.prorata_factor = Some(factor);
        self.status = Prorated;
        self.updated_at = now;
        Ok(())
    }

    /// Limits the net payout to `max`. Returns true if the cap bit, in which
    /// case the status becomes `Capped`.
    pub fn apply_cap(&mut self, max: &Money, now: DateTime<Utc>) -> EngineResult<bool> {
        self.ensure_status(CAPPABLE, "cap")?;
        self.ensure_amount("max_payout", max)?;

        if !self.net_incentive.exceeds(max)? {
            return Ok(false);
        }
        self.notes.push(format!(
            "net incentive {} capped at {}",
            self.net_incentive, max
        ));
        self.net_incentive = max.clone();
        self.status = Capped;
        self.updated_at = now;
        Ok(true)
    }

    /// Achievement fell short of the plan threshold; nothing is payable.
    pub fn mark_below_threshold(&mut self, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_status(&[Pending, Calculated], "mark below threshold")?;
        self.zero_amounts();
        self.notes.push(format!(
            "achievement {} is below the plan threshold",
            self.achievement
        ));
        self.status = BelowThreshold;
        self.updated_at = now;
        Ok(())
    }

    /// The employee was not eligible in the period; nothing is payable.
    pub fn mark_ineligible(&mut self, reason: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_status(&[Pending], "mark ineligible")?;
        let reason = required_reason(reason)?;
        self.zero_amounts();
        self.notes.push(reason);
        self.status = Ineligible;
        self.updated_at = now;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Approval transitions
    // ------------------------------------------------------------------

    /// Enters the approval chain and starts a new approval round.
    pub fn submit_for_approval(&mut self, by: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_status(SUBMITTABLE, "submit")?;
        Self::ensure_actor("submitted_by", by)?;

        self.approval_round += 1;
        self.submitted_by = Some(by.to_string());
        self.rejection_reason = None;
        self.status = PendingApproval;
        self.raise(
            DomainEventKind::CalculationSubmittedForApproval {
                submitted_by: by.to_string(),
                round: self.approval_round,
            },
            now,
        );
        Ok(())
    }

    /// Final sign-off: `PendingApproval → Approved`.
    pub fn approve(
        &mut self,
        by: &str,
        comments: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.ensure_status(&[PendingApproval], "approve")?;
        Self::ensure_actor("approved_by", by)?;

        if let Some(comments) = comments.map(str::trim).filter(|c| !c.is_empty()) {
            self.notes.push(comments.to_string());
        }
        self.approved_by = Some(by.to_string());
        self.approved_at = Some(now);
        self.status = Approved;
        self.raise(
            DomainEventKind::CalculationApproved {
                approved_by: by.to_string(),
                net_incentive: self.net_incentive.clone(),
            },
            now,
        );
        Ok(())
    }

    /// Rejection by the approval chain: `PendingApproval → Rejected`.
    pub fn reject(&mut self, by: &str, reason: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_status(&[PendingApproval], "reject")?;
        Self::ensure_actor("rejected_by", by)?;
        let reason = required_reason(reason)?;

        self.rejection_reason = Some(reason.clone());
        self.status = Rejected;
        self.raise(
            DomainEventKind::CalculationRejected {
                rejected_by: by.to_string(),
                reason,
            },
            now,
        );
        Ok(())
    }

    /// Hands the approved payout to payroll: `Approved → Paid`.
    pub fn mark_paid(&mut self, by: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_status(&[Approved], "mark paid")?;
        Self::ensure_actor("paid_by", by)?;

        self.paid_by = Some(by.to_string());
        self.paid_at = Some(now);
        self.status = Paid;
        self.raise(
            DomainEventKind::CalculationPaid {
                paid_by: by.to_string(),
                net_incentive: self.net_incentive.clone(),
            },
            now,
        );
        Ok(())
    }

    /// Cancels the calculation from any state except `Paid`. Pending
    /// approvals are cancelled with it and the calculation stays inactive.
    pub fn void(&mut self, reason: &str, by: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.ensure_head("void")?;
        if self.status.is_terminal() {
            return Err(self.invalid_transition("void"));
        }
        Self::ensure_actor("voided_by", by)?;
        let reason = required_reason(reason)?;

        self.cancel_pending_approvals(&format!("calculation voided: {}", reason), now)?;
        self.void_reason = Some(reason.clone());
        self.voided_by = Some(by.to_string());
        self.voided_at = Some(now);
        self.is_active = false;
        self.status = Voided;
        self.raise(
            DomainEventKind::CalculationVoided {
                voided_by: by.to_string(),
                reason,
            },
            now,
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Corrections
    // ------------------------------------------------------------------

    /// Overrides the net payout in place before it has been submitted.
    ///
    /// Approved amounts are never changed in place; they are corrected with
    /// [`Calculation::create_adjustment`].
    pub fn adjust(
        &mut self,
        new_amount: Money,
        reason: &str,
        by: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.ensure_status(ADJUSTABLE_IN_PLACE, "adjust")?;
        self.ensure_amount("new_amount", &new_amount)?;
        Self::ensure_actor("adjusted_by", by)?;
        let reason = required_reason(reason)?;

        let previous_amount = std::mem::replace(&mut self.net_incentive, new_amount.clone());
        self.version += 1;
        self.notes.push(reason.clone());
        self.status = Adjusted;
        self.raise(
            DomainEventKind::CalculationAdjusted {
                adjusted_by: by.to_string(),
                reason,
                previous_amount,
                new_amount,
                version: self.version,
                previous_version_id: None,
            },
            now,
        );
        Ok(())
    }

    /// Recomputes the payout from a new actual value: `→ Calculated`,
    /// version + 1, proration cleared.
    #[allow(clippy::too_many_arguments)]
    pub fn recalculate(
        &mut self,
        new_actual: Decimal,
        gross: Money,
        net: Money,
        achievement: Percentage,
        slab_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        self.ensure_status(RECALCULABLE, "recalculate")?;
        self.ensure_amount("gross_incentive", &gross)?;
        self.ensure_amount("net_incentive", &net)?;
        let expected = Percentage::achievement(new_actual, self.target_value)?;
        if expected != achievement {
            return Err(EngineError::validation(
                "achievement",
                format!(
                    "{} does not match {} against target {}",
                    achievement, new_actual, self.target_value
                ),
            ));
        }

        self.actual_value = new_actual;
        self.achievement = achievement;
        self.gross_incentive = gross;
        self.net_incentive = net.clone();
        self.applied_slab_id = slab_id;
        self.prorata_factor = None;
        self.rejection_reason = None;
        self.version += 1;
        self.status = Calculated;
        self.raise(
            DomainEventKind::CalculationRecalculated {
                version: self.version,
                net_incentive: net,
            },
            now,
        );
        Ok(())
    }

    /// Opens a corrected version of this calculation.
    ///
    /// The returned calculation carries `version + 1`, links back through
    /// `previous_version_id` and starts in `Adjusted`; this one is marked as
    /// superseded and keeps its own status for the audit history.
    pub fn create_adjustment(
        &mut self,
        revised: RevisedPayout,
        reason: &str,
        by: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Calculation> {
        self.ensure_status(VERSIONABLE, "create adjustment")?;
        self.ensure_amount("gross_incentive", &revised.gross_incentive)?;
        self.ensure_amount("net_incentive", &revised.net_incentive)?;
        Self::ensure_actor("adjusted_by", by)?;
        let reason = required_reason(reason)?;
        let achievement = Percentage::achievement(revised.actual_value, self.target_value)?;
        if achievement != revised.achievement {
            return Err(EngineError::validation(
                "achievement",
                format!(
                    "{} does not match {} against target {}",
                    revised.achievement, revised.actual_value, self.target_value
                ),
            ));
        }

        let mut successor = Calculation::new(
            self.employee_id.clone(),
            self.plan_id.clone(),
            self.period,
            self.target_value,
            revised.actual_value,
            self.currency().clone(),
            now,
        )?;
        successor.gross_incentive = revised.gross_incentive;
        successor.net_incentive = revised.net_incentive.clone();
        successor.prorata_factor = revised.prorata_factor;
        successor.applied_slab_id = revised.applied_slab_id;
        successor.audit_trace = revised.audit_trace;
        successor.version = self.version + 1;
        successor.previous_version_id = Some(self.id);
        successor.notes.push(reason.clone());
        successor.status = Adjusted;
        successor.raise(
            DomainEventKind::CalculationAdjusted {
                adjusted_by: by.to_string(),
                reason,
                previous_amount: self.net_incentive.clone(),
                new_amount: revised.net_incentive,
                version: successor.version,
                previous_version_id: Some(self.id),
            },
            now,
        );

        self.superseded_by = Some(successor.id);
        self.updated_at = now;
        Ok(successor)
    }

    // ------------------------------------------------------------------
    // Approval records
    // ------------------------------------------------------------------

    /// Opens a pending approval at `level` in the current round.
    ///
    /// # Errors
    ///
    /// Fails unless the calculation is awaiting approval, and if a pending
    /// approval already exists at the same level.
    pub fn open_approval(
        &mut self,
        approver_id: &str,
        level: u32,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> EngineResult<Uuid> {
        self.ensure_status(&[PendingApproval], "open approval for")?;
        if self
            .approvals
            .iter()
            .any(|a| a.is_pending() && a.level() == level)
        {
            return Err(EngineError::PendingApprovalExists {
                calculation_id: self.id,
                level,
            });
        }
        let approval = Approval::new(
            self.id,
            approver_id,
            level,
            self.approval_round,
            expires_at,
            now,
        )?;
        let id = approval.id();
        self.approvals.push(approval);
        self.updated_at = now;
        Ok(id)
    }

    /// Cancels every pending approval, returning how many were cancelled.
    pub(crate) fn cancel_pending_approvals(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<usize> {
        let mut cancelled = 0;
        for approval in self.approvals.iter_mut().filter(|a| a.is_pending()) {
            approval.cancel(reason, now)?;
            cancelled += 1;
        }
        Ok(cancelled)
    }

    /// Checks that no level has more than one pending approval.
    pub fn ensure_unique_pending_levels(&self) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for approval in self.approvals.iter().filter(|a| a.is_pending()) {
            if !seen.insert(approval.level()) {
                return Err(EngineError::PendingApprovalExists {
                    calculation_id: self.id,
                    level: approval.level(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApprovalStatus;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap()
    }

    fn inr(amount: &str) -> Money {
        Money::new(dec(amount), Currency::new("INR").unwrap())
    }

    fn pct(s: &str) -> Percentage {
        Percentage::new(dec(s)).unwrap()
    }

    fn january() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        )
        .unwrap()
    }

    fn pending_calc() -> Calculation {
        Calculation::new(
            "emp_001",
            "plan_sales",
            january(),
            dec("100000"),
            dec("120000"),
            Currency::new("INR").unwrap(),
            now(),
        )
        .unwrap()
    }

    fn calculated(gross: &str) -> Calculation {
        let mut calc = pending_calc();
        calc.calculate(inr(gross), None, now()).unwrap();
        calc
    }

    fn event_names(calc: &Calculation) -> Vec<&'static str> {
        calc.pending_events().iter().map(|e| e.name()).collect()
    }

    fn assert_invalid_transition<T: fmt::Debug>(result: EngineResult<T>) {
        assert!(
            matches!(result, Err(EngineError::InvalidTransition { .. })),
            "Expected InvalidTransition, got {:?}",
            result
        );
    }

    // ==========================================================================
    // Creation and computation
    // ==========================================================================

    #[test]
    fn test_new_calculation_is_pending_version_1() {
        let calc = pending_calc();
        assert_eq!(calc.status(), Pending);
        assert_eq!(calc.version(), 1);
        assert!(calc.is_active());
        assert_eq!(calc.achievement(), pct("120"));
        assert!(calc.net_incentive().is_zero());
    }

    #[test]
    fn test_new_calculation_rejects_zero_target() {
        let result = Calculation::new(
            "emp_001",
            "plan_sales",
            january(),
            Decimal::ZERO,
            dec("10"),
            Currency::new("INR").unwrap(),
            now(),
        );
        assert!(matches!(result, Err(EngineError::Validation { .. })));
    }

    #[test]
    fn test_calculate_sets_net_equal_gross_and_emits_completed() {
        let calc = calculated("5000");
        assert_eq!(calc.status(), Calculated);
        assert_eq!(calc.gross_incentive(), &inr("5000"));
        assert_eq!(calc.net_incentive(), &inr("5000"));
        assert_eq!(event_names(&calc), vec!["CalculationCompleted"]);
    }

    #[test]
    fn test_calculate_rejects_other_currency_without_mutation() {
        let mut calc = pending_calc();
        let before = calc.clone();
        let usd = Money::new(dec("10"), Currency::new("USD").unwrap());
        assert!(matches!(
            calc.calculate(usd, None, now()),
            Err(EngineError::CurrencyMismatch { .. })
        ));
        assert_eq!(calc, before);
    }

    #[test]
    fn test_calculate_twice_fails() {
        let mut calc = calculated("5000");
        assert_invalid_transition(calc.calculate(inr("10"), None, now()));
        assert_eq!(calc.gross_incentive(), &inr("5000"));
    }

    #[test]
    fn test_apply_prorata_scales_net() {
        let mut calc = calculated("5000");
        calc.apply_prorata(pct("50"), now()).unwrap();
        assert_eq!(calc.status(), Prorated);
        assert_eq!(calc.net_incentive().amount, dec("2500"));
        assert_eq!(calc.gross_incentive().amount, dec("5000"));
        assert_eq!(calc.prorata_factor(), Some(pct("50")));
    }

    #[test]
    fn test_apply_prorata_rejects_out_of_range_factor() {
        let mut calc = calculated("5000");
        assert!(calc.apply_prorata(Percentage::ZERO, now()).is_err());
        assert!(calc.apply_prorata(pct("100.01"), now()).is_err());
        assert_eq!(calc.status(), Calculated);
        assert!(calc.prorata_factor().is_none());
    }

    #[test]
    fn test_apply_prorata_only_from_calculated() {
        let mut calc = pending_calc();
        assert_invalid_transition(calc.apply_prorata(pct("50"), now()));
    }

    #[test]
    fn test_apply_cap_limits_net() {
        let mut calc = calculated("5000");
        assert!(calc.apply_cap(&inr("4000"), now()).unwrap());
        assert_eq!(calc.status(), Capped);
        assert_eq!(calc.net_incentive(), &inr("4000"));
    }

    #[test]
    fn test_apply_cap_noop_under_limit() {
        let mut calc = calculated("5000");
        assert!(!calc.apply_cap(&inr("6000"), now()).unwrap());
        assert_eq!(calc.status(), Calculated);
    }

    #[test]
    fn test_apply_cap_currency_mismatch() {
        let mut calc = calculated("5000");
        let usd = Money::new(dec("10"), Currency::new("USD").unwrap());
        assert!(matches!(
            calc.apply_cap(&usd, now()),
            Err(EngineError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_mark_below_threshold_zeroes_amounts() {
        let mut calc = pending_calc();
        calc.mark_below_threshold(now()).unwrap();
        assert_eq!(calc.status(), BelowThreshold);
        assert!(calc.net_incentive().is_zero());
        assert_invalid_transition(calc.submit_for_approval("analyst", now()));
    }

    #[test]
    fn test_mark_ineligible_requires_reason() {
        let mut calc = pending_calc();
        assert!(calc.mark_ineligible("", now()).is_err());
        calc.mark_ineligible("on leave for the full period", now()).unwrap();
        assert_eq!(calc.status(), Ineligible);
    }

    // ==========================================================================
    // Approval path
    // ==========================================================================

    #[test]
    fn test_happy_path_ends_paid_and_active() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        calc.approve("mgr_1", Some("ok"), now()).unwrap();
        calc.mark_paid("payroll", now()).unwrap();

        assert_eq!(calc.status(), Paid);
        assert!(calc.is_active());
        assert_eq!(
            event_names(&calc),
            vec![
                "CalculationCompleted",
                "CalculationSubmittedForApproval",
                "CalculationApproved",
                "CalculationPaid"
            ]
        );
    }

    #[test]
    fn test_submit_increments_round() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        assert_eq!(calc.approval_round(), 1);
        assert_eq!(calc.status(), PendingApproval);
    }

    #[test]
    fn test_approve_requires_pending_approval() {
        let mut calc = calculated("5000");
        assert_invalid_transition(calc.approve("mgr_1", None, now()));
    }

    #[test]
    fn test_reject_stores_reason() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        calc.reject("mgr_1", "actuals not reconciled", now()).unwrap();
        assert_eq!(calc.status(), Rejected);
        assert_eq!(calc.rejection_reason(), Some("actuals not reconciled"));
    }

    #[test]
    fn test_mark_paid_requires_approved() {
        let mut calc = calculated("5000");
        assert_invalid_transition(calc.mark_paid("payroll", now()));
    }

    // ==========================================================================
    // Void
    // ==========================================================================

    #[test]
    fn test_void_from_pending_approval_cancels_approvals() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        let approval_id = calc.open_approval("mgr_1", 1, None, now()).unwrap();
        calc.void("duplicate run", "admin", now()).unwrap();

        assert_eq!(calc.status(), Voided);
        assert!(!calc.is_active());
        assert_eq!(
            calc.approval(approval_id).unwrap().status(),
            ApprovalStatus::Cancelled
        );
    }

    #[test]
    fn test_void_paid_fails() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        calc.approve("mgr_1", None, now()).unwrap();
        calc.mark_paid("payroll", now()).unwrap();
        assert_invalid_transition(calc.void("too late", "admin", now()));
        assert!(calc.is_active());
    }

    #[test]
    fn test_void_twice_fails() {
        let mut calc = pending_calc();
        calc.void("created by mistake", "admin", now()).unwrap();
        assert_invalid_transition(calc.void("again", "admin", now()));
    }

    #[test]
    fn test_void_requires_reason() {
        let mut calc = pending_calc();
        assert!(calc.void(" ", "admin", now()).is_err());
        assert_eq!(calc.status(), Pending);
        assert!(calc.is_active());
    }

    // ==========================================================================
    // Corrections
    // ==========================================================================

    #[test]
    fn test_adjust_in_place_bumps_version() {
        let mut calc = calculated("5000");
        calc.adjust(inr("4500"), "manual correction", "analyst", now())
            .unwrap();
        assert_eq!(calc.status(), Adjusted);
        assert_eq!(calc.version(), 2);
        assert_eq!(calc.net_incentive(), &inr("4500"));
        assert!(calc.submit_for_approval("analyst", now()).is_ok());
    }

    #[test]
    fn test_adjust_after_approval_rejected() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        calc.approve("mgr_1", None, now()).unwrap();
        assert_invalid_transition(calc.adjust(inr("1"), "fix", "analyst", now()));
        assert_eq!(calc.net_incentive(), &inr("5000"));
        assert_eq!(calc.version(), 1);
    }

    #[test]
    fn test_recalculate_bumps_version_and_clears_prorata() {
        let mut calc = calculated("5000");
        calc.apply_prorata(pct("50"), now()).unwrap();
        calc.recalculate(
            dec("130000"),
            inr("6500"),
            inr("6500"),
            pct("130"),
            None,
            now(),
        )
        .unwrap();
        assert_eq!(calc.status(), Calculated);
        assert_eq!(calc.version(), 2);
        assert!(calc.prorata_factor().is_none());
        assert_eq!(calc.actual_value(), dec("130000"));
        assert_eq!(
            event_names(&calc).last().copied(),
            Some("CalculationRecalculated")
        );
    }

    #[test]
    fn test_recalculate_rejects_inconsistent_achievement() {
        let mut calc = calculated("5000");
        let result = calc.recalculate(
            dec("130000"),
            inr("6500"),
            inr("6500"),
            pct("120"),
            None,
            now(),
        );
        assert!(matches!(result, Err(EngineError::Validation { .. })));
        assert_eq!(calc.version(), 1);
    }

    #[test]
    fn test_recalculate_from_paid_fails() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        calc.approve("mgr_1", None, now()).unwrap();
        calc.mark_paid("payroll", now()).unwrap();
        assert_invalid_transition(calc.recalculate(
            dec("1"),
            inr("0"),
            inr("0"),
            pct("0"),
            None,
            now(),
        ));
    }

    fn revised(actual: &str, amount: &str) -> RevisedPayout {
        RevisedPayout {
            actual_value: dec(actual),
            achievement: Percentage::achievement(dec(actual), dec("100000")).unwrap(),
            gross_incentive: inr(amount),
            net_incentive: inr(amount),
            prorata_factor: None,
            applied_slab_id: None,
            audit_trace: vec![],
        }
    }

    #[test]
    fn test_create_adjustment_links_versions() {
        let mut prior = calculated("5000");
        prior.submit_for_approval("analyst", now()).unwrap();
        prior.approve("mgr_1", None, now()).unwrap();

        let successor = prior
            .create_adjustment(revised("110000", "5500"), "late booking", "analyst", now())
            .unwrap();

        assert_eq!(successor.version(), 2);
        assert_eq!(successor.previous_version_id(), Some(prior.id()));
        assert_eq!(successor.status(), Adjusted);
        assert_eq!(successor.net_incentive(), &inr("5500"));
        assert_eq!(prior.superseded_by(), Some(successor.id()));
        assert_eq!(prior.status(), Approved);
        assert!(!prior.is_head());
        assert_eq!(
            successor.pending_events()[0].name(),
            "CalculationAdjusted"
        );
    }

    #[test]
    fn test_create_adjustment_of_superseded_fails() {
        let mut prior = calculated("5000");
        prior
            .create_adjustment(revised("110000", "5500"), "late booking", "analyst", now())
            .unwrap();
        assert_invalid_transition(prior.create_adjustment(
            revised("111000", "5550"),
            "again",
            "analyst",
            now(),
        ));
    }

    #[test]
    fn test_superseded_version_rejects_every_transition() {
        let mut prior = calculated("5000");
        prior.submit_for_approval("analyst", now()).unwrap();
        prior.approve("mgr", None, now()).unwrap();
        prior
            .create_adjustment(revised("110000", "5500"), "late booking", "analyst", now())
            .unwrap();

        assert_invalid_transition(prior.mark_paid("payroll", now()));
        assert_invalid_transition(prior.void("duplicate", "admin", now()));
        assert_invalid_transition(prior.submit_for_approval("analyst", now()));
        assert_invalid_transition(prior.adjust(
            inr("4000"),
            "manual",
            "analyst",
            now(),
        ));
        assert_invalid_transition(prior.recalculate(
            dec("110000"),
            inr("5500"),
            inr("5500"),
            pct("110"),
            None,
            now(),
        ));
        assert_eq!(prior.status(), Approved);
        assert!(prior.paid_by().is_none());
    }

    #[test]
    fn test_create_adjustment_of_voided_fails() {
        let mut prior = calculated("5000");
        prior.void("wrong plan", "admin", now()).unwrap();
        assert_invalid_transition(prior.create_adjustment(
            revised("110000", "5500"),
            "fix",
            "analyst",
            now(),
        ));
    }

    // ==========================================================================
    // Approval records
    // ==========================================================================

    #[test]
    fn test_open_approval_requires_pending_approval_status() {
        let mut calc = calculated("5000");
        assert_invalid_transition(calc.open_approval("mgr_1", 1, None, now()));
    }

    #[test]
    fn test_only_one_pending_approval_per_level() {
        let mut calc = calculated("5000");
        calc.submit_for_approval("analyst", now()).unwrap();
        calc.open_approval("mgr_1", 1, None, now()).unwrap();
        assert!(matches!(
            calc.open_approval("mgr_2", 1, None, now()),
            Err(EngineError::PendingApprovalExists { level: 1, .. })
        ));
        assert!(calc.ensure_unique_pending_levels().is_ok());
    }

    #[test]
    fn test_take_events_drains_buffer() {
        let mut calc = calculated("5000");
        assert_eq!(calc.take_events().len(), 1);
        assert!(calc.pending_events().is_empty());
    }

    #[test]
    fn test_events_not_serialized() {
        let calc = calculated("5000");
        let json = serde_json::to_value(&calc).unwrap();
        assert!(json.get("pending_events").is_none());
        let restored: Calculation = serde_json::from_value(json).unwrap();
        assert!(restored.pending_events().is_empty());
        assert_eq!(restored.net_incentive(), calc.net_incentive());
    }

    proptest! {
        #[test]
        fn prop_prorata_is_exact(gross_cents in 0i64..100_000_000, factor_bp in 1u32..=10_000) {
            let gross = Money::new(Decimal::new(gross_cents, 2), Currency::new("INR").unwrap());
            let factor = Percentage::new(Decimal::new(factor_bp as i64, 2)).unwrap();
            let mut calc = pending_calc();
            calc.calculate(gross.clone(), None, now()).unwrap();
            calc.apply_prorata(factor, now()).unwrap();

            let expected = gross.amount * factor.value() / Decimal::ONE_HUNDRED;
            prop_assert_eq!(calc.net_incentive().amount, expected);
        }

        #[test]
        fn prop_recalculate_increments_version_by_one(actual in 0u32..1_000_000, prior_adjusts in 0usize..3) {
            let mut calc = calculated("5000");
            if prior_adjusts > 0 {
                calc.apply_prorata(pct("80"), now()).unwrap();
            }
            let before = calc.version();
            let actual = Decimal::from(actual);
            let achievement = Percentage::achievement(actual, dec("100000")).unwrap();
            calc.recalculate(actual, inr("1"), inr("1"), achievement, None, now()).unwrap();
            prop_assert_eq!(calc.version(), before + 1);
            prop_assert!(calc.prorata_factor().is_none());
        }
    }
}
