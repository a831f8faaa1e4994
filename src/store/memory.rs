//! In-memory calculation store.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::Calculation;

use super::{CalculationFilter, CalculationStore};

/// A [`CalculationStore`] backed by a `HashMap` behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    calculations: RwLock<HashMap<Uuid, Calculation>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Calculation>> {
        self.calculations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Calculation>> {
        self.calculations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ensure_unique_head(
    map: &HashMap<Uuid, Calculation>,
    calc: &Calculation,
    ignoring: Option<Uuid>,
) -> EngineResult<()> {
    if !calc.is_head() {
        return Ok(());
    }
    let clash = map.values().any(|other| {
        other.id() != calc.id()
            && Some(other.id()) != ignoring
            && other.is_head()
            && other.employee_id() == calc.employee_id()
            && other.plan_id() == calc.plan_id()
            && other.period() == calc.period()
    });
    if clash {
        return Err(EngineError::DuplicateCalculation {
            employee_id: calc.employee_id().to_string(),
            plan_id: calc.plan_id().to_string(),
            period: calc.period().label(),
        });
    }
    Ok(())
}

fn check_revision(map: &HashMap<Uuid, Calculation>, calc: &Calculation) -> EngineResult<u64> {
    let stored = map
        .get(&calc.id())
        .ok_or_else(|| EngineError::not_found("calculation", calc.id()))?;
    if stored.revision() != calc.revision() {
        return Err(EngineError::ConcurrencyConflict {
            entity: "calculation".to_string(),
            id: calc.id(),
            expected_revision: calc.revision(),
        });
    }
    Ok(stored.revision() + 1)
}

fn stored_copy(calc: &Calculation, revision: u64) -> Calculation {
    let mut copy = calc.clone();
    copy.take_events();
    copy.set_revision(revision);
    copy
}

impl CalculationStore for InMemoryStore {
    fn insert(&self, calc: &Calculation) -> EngineResult<u64> {
        calc.ensure_unique_pending_levels()?;
        let mut map = self.write();
        if map.contains_key(&calc.id()) {
            return Err(EngineError::validation(
                "id",
                format!("calculation {} already stored", calc.id()),
            ));
        }
        ensure_unique_head(&map, calc, None)?;
        map.insert(calc.id(), stored_copy(calc, 1));
        Ok(1)
    }

    fn get(&self, id: Uuid) -> EngineResult<Calculation> {
        self.read()
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("calculation", id))
    }

    fn update(&self, calc: &Calculation) -> EngineResult<u64> {
        calc.ensure_unique_pending_levels()?;
        let mut map = self.write();
        let revision = check_revision(&map, calc)?;
        ensure_unique_head(&map, calc, None)?;
        map.insert(calc.id(), stored_copy(calc, revision));
        Ok(revision)
    }

    fn supersede(&self, prior: &Calculation, successor: &Calculation) -> EngineResult<(u64, u64)> {
        prior.ensure_unique_pending_levels()?;
        successor.ensure_unique_pending_levels()?;
        if prior.superseded_by() != Some(successor.id())
            || successor.previous_version_id() != Some(prior.id())
        {
            return Err(EngineError::validation(
                "previous_version_id",
                format!("{} does not supersede {}", successor.id(), prior.id()),
            ));
        }
        let mut map = self.write();
        let prior_revision = check_revision(&map, prior)?;
        if map.contains_key(&successor.id()) {
            return Err(EngineError::validation(
                "id",
                format!("calculation {} already stored", successor.id()),
            ));
        }
        ensure_unique_head(&map, successor, Some(prior.id()))?;
        map.insert(prior.id(), stored_copy(prior, prior_revision));
        map.insert(successor.id(), stored_copy(successor, 1));
        Ok((prior_revision, 1))
    }

    fn find_by_approval(&self, approval_id: Uuid) -> EngineResult<Calculation> {
        self.read()
            .values()
            .find(|calc| calc.approvals().iter().any(|a| a.id() == approval_id))
            .cloned()
            .ok_or_else(|| EngineError::not_found("approval", approval_id))
    }

    fn find(&self, filter: &CalculationFilter) -> EngineResult<Vec<Calculation>> {
        let mut found: Vec<Calculation> = self
            .read()
            .values()
            .filter(|calc| filter.matches(calc))
            .cloned()
            .collect();
        found.sort_by_key(|calc| (calc.created_at(), calc.id()));
        Ok(found)
    }
}
