//! Application service.
//!
//! [`IncentiveService`] is the single entry point for every operation on
//! calculations. Each mutation follows the same cycle:
//!
//! 1. load the calculation (and its plan) from the store
//! 2. run the transition on the loaded copy
//! 3. take the buffered events and write with the revision that was read
//! 4. on success, queue the events in the outbox and drain it to the sinks
//!
//! A concurrency conflict in step 3 restarts the cycle from a fresh load, up
//! to `max_conflict_retries` times. The retried transition sees the winner's
//! state, so it either applies on top of it or fails its precondition.

mod approvals;
mod batch;
mod incentive;

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{EmployeeProvider, EngineSettings, PlanProvider};
use crate::error::EngineResult;
use crate::events::{DomainEvent, EventOutbox};
use crate::models::Calculation;
use crate::store::{CalculationFilter, CalculationStore};

pub use batch::{BatchOutcome, CalculationRequest};

/// Orchestrates calculations, approvals and corrections over the collaborator seams.
pub struct IncentiveService {
    plans: Arc<dyn PlanProvider>,
    employees: Arc<dyn EmployeeProvider>,
    store: Arc<dyn CalculationStore>,
    outbox: Arc<EventOutbox>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl IncentiveService {
    /// Creates a service over the given collaborators.
    pub fn new(
        plans: Arc<dyn PlanProvider>,
        employees: Arc<dyn EmployeeProvider>,
        store: Arc<dyn CalculationStore>,
        outbox: Arc<EventOutbox>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            plans,
            employees,
            store,
            outbox,
            clock,
            settings,
        }
    }

    /// The engine settings in effect.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The outbound event queue.
    pub fn outbox(&self) -> &EventOutbox {
        &self.outbox
    }

    /// Reads a calculation.
    pub fn get(&self, calculation_id: Uuid) -> EngineResult<Calculation> {
        self.store.get(calculation_id)
    }

    /// Lists calculations matching `filter`.
    pub fn find(&self, filter: &CalculationFilter) -> EngineResult<Vec<Calculation>> {
        self.store.find(filter)
    }

    /// Returns every version of the calculation's chain, oldest first.
    pub fn history(&self, calculation_id: Uuid) -> EngineResult<Vec<Calculation>> {
        let current = self.store.get(calculation_id)?;

        let mut older = Vec::new();
        let mut previous = current.previous_version_id();
        while let Some(id) = previous {
            let calc = self.store.get(id)?;
            previous = calc.previous_version_id();
            older.push(calc);
        }
        older.reverse();

        let mut newer = Vec::new();
        let mut next = current.superseded_by();
        while let Some(id) = next {
            let calc = self.store.get(id)?;
            next = calc.superseded_by();
            newer.push(calc);
        }

        older.push(current);
        older.extend(newer);
        Ok(older)
    }

    fn publish(&self, events: Vec<DomainEvent>) {
        self.outbox.enqueue(events);
        self.outbox.drain();
    }

    /// Runs `op` on a freshly loaded calculation and writes it back,
    /// retrying from a new load when the write loses a revision race.
    fn mutate<L, F>(&self, operation: &str, load: L, mut op: F) -> EngineResult<Calculation>
    where
        L: Fn() -> EngineResult<Calculation>,
        F: FnMut(&mut Calculation) -> EngineResult<()>,
    {
        let mut attempt = 0;
        loop {
            let mut calc = load()?;
            op(&mut calc)?;
            let events = calc.take_events();

            match self.store.update(&calc) {
                Ok(revision) => {
                    calc.set_revision(revision);
                    info!(
                        calculation_id = %calc.id(),
                        employee_id = %calc.employee_id(),
                        operation = operation,
                        status = %calc.status(),
                        version = calc.version(),
                        revision = revision,
                        "Calculation updated"
                    );
                    self.publish(events);
                    return Ok(calc);
                }
                Err(e) if e.is_retryable() && attempt < self.settings.max_conflict_retries => {
                    attempt += 1;
                    debug!(
                        calculation_id = %calc.id(),
                        operation = operation,
                        attempt = attempt,
                        "Concurrency conflict, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn mutate_calculation<F>(&self, calculation_id: Uuid, operation: &str, op: F) -> EngineResult<Calculation>
    where
        F: FnMut(&mut Calculation) -> EngineResult<()>,
    {
        self.mutate(operation, || self.store.get(calculation_id), op)
    }

    fn mutate_by_approval<F>(&self, approval_id: Uuid, operation: &str, op: F) -> EngineResult<Calculation>
    where
        F: FnMut(&mut Calculation) -> EngineResult<()>,
    {
        self.mutate(operation, || self.store.find_by_approval(approval_id), op)
    }
}

impl std::fmt::Debug for IncentiveService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncentiveService")
            .field("settings", &self.settings)
            .field("outbox", &self.outbox)
            .finish_non_exhaustive()
    }
}
