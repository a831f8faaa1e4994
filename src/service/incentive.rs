//! Calculation runs and corrections.

use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::calculation::compute_payout;
use crate::error::EngineResult;
use crate::models::{Calculation, Money};

use super::{CalculationRequest, IncentiveService};

impl IncentiveService {
    /// Computes and stores a new calculation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EngineError::DuplicateCalculation`] if an active
    /// calculation already exists for the employee, plan and period; use
    /// [`IncentiveService::recalculate`] or
    /// [`IncentiveService::create_adjustment`] to change it.
    pub fn run_calculation(&self, request: &CalculationRequest) -> EngineResult<Calculation> {
        let plan = self.plans.plan(&request.plan_id)?;
        let employee = self.employees.employee(&request.employee_id)?;
        let now = self.clock.now();

        let computation = compute_payout(&plan, &employee, &request.period, request.actual_value)?;
        let mut calc = Calculation::new(
            employee.id.clone(),
            plan.id.clone(),
            request.period,
            plan.target.value,
            request.actual_value,
            employee.base_salary.currency.clone(),
            now,
        )?;
        computation.record_on(&mut calc, now)?;

        let events = calc.take_events();
        let revision = self.store.insert(&calc)?;
        calc.set_revision(revision);
        info!(
            calculation_id = %calc.id(),
            employee_id = %calc.employee_id(),
            plan_id = %calc.plan_id(),
            period = %calc.period().label(),
            status = %calc.status(),
            net_incentive = %calc.net_incentive(),
            "Calculation created"
        );
        self.publish(events);
        Ok(calc)
    }

    /// Overrides the net payout of a calculation that has not been submitted.
    pub fn adjust(
        &self,
        calculation_id: Uuid,
        new_amount: Money,
        reason: &str,
        by: &str,
    ) -> EngineResult<Calculation> {
        let now = self.clock.now();
        self.mutate_calculation(calculation_id, "adjust", |calc| {
            calc.adjust(new_amount.clone(), reason, by, now)
        })
    }

    /// Recomputes a calculation from a new actual value.
    pub fn recalculate(&self, calculation_id: Uuid, new_actual: Decimal) -> EngineResult<Calculation> {
        let now = self.clock.now();
        self.mutate_calculation(calculation_id, "recalculate", |calc| {
            let plan = self.plans.plan(calc.plan_id())?;
            let employee = self.employees.employee(calc.employee_id())?;
            compute_payout(&plan, &employee, &calc.period(), new_actual)?
                .record_recalculation_on(calc, now)
        })
    }

    /// Opens a corrected version of a calculation from a new actual value and
    /// returns it. The prior version is kept and marked as superseded.
    pub fn create_adjustment(
        &self,
        calculation_id: Uuid,
        new_actual: Decimal,
        reason: &str,
        by: &str,
    ) -> EngineResult<Calculation> {
        let now = self.clock.now();
        let mut attempt = 0;
        loop {
            let mut prior = self.store.get(calculation_id)?;
            let plan = self.plans.plan(prior.plan_id())?;
            let employee = self.employees.employee(prior.employee_id())?;
            let revised = compute_payout(&plan, &employee, &prior.period(), new_actual)?.into_revised()?;

            let mut successor = prior.create_adjustment(revised, reason, by, now)?;
            let mut events = prior.take_events();
            events.extend(successor.take_events());

            match self.store.supersede(&prior, &successor) {
                Ok((_, revision)) => {
                    successor.set_revision(revision);
                    info!(
                        calculation_id = %successor.id(),
                        previous_version_id = %prior.id(),
                        version = successor.version(),
                        net_incentive = %successor.net_incentive(),
                        adjusted_by = by,
                        "Adjustment version created"
                    );
                    self.publish(events);
                    return Ok(successor);
                }
                Err(e) if e.is_retryable() && attempt < self.settings.max_conflict_retries => {
                    attempt += 1;
                    debug!(
                        calculation_id = %calculation_id,
                        operation = "create_adjustment",
                        attempt = attempt,
                        "Concurrency conflict, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancels a calculation that has not been paid.
    pub fn void(&self, calculation_id: Uuid, reason: &str, by: &str) -> EngineResult<Calculation> {
        let now = self.clock.now();
        self.mutate_calculation(calculation_id, "void", |calc| calc.void(reason, by, now))
    }

    /// Marks an approved calculation as paid.
    pub fn mark_paid(&self, calculation_id: Uuid, by: &str) -> EngineResult<Calculation> {
        let now = self.clock.now();
        self.mutate_calculation(calculation_id, "mark_paid", |calc| calc.mark_paid(by, now))
    }
}
