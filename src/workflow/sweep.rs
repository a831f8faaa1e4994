//! Selectors for time-driven approval maintenance.
//!
//! Sweeps never mutate anything; the service runs them over pending
//! calculations and feeds the selected approvals back through the chain.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::Calculation;

/// Pending approvals of the current round that have been open longer than `sla`
/// and have not yet expired.
pub fn overdue_for_escalation(calc: &Calculation, now: DateTime<Utc>, sla: Duration) -> Vec<Uuid> {
    calc.current_round_approvals()
        .filter(|a| a.is_pending() && !a.is_expired_at(now))
        .filter(|a| now - a.created_at() > sla)
        .map(|a| a.id())
        .collect()
}

/// Pending approvals of the current round whose deadline has passed.
pub fn expired(calc: &Calculation, now: DateTime<Utc>) -> Vec<Uuid> {
    calc.current_round_approvals()
        .filter(|a| a.is_expired_at(now))
        .map(|a| a.id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, DateRange, Money};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap()
    }

    fn awaiting(expires_in: Option<Duration>) -> Calculation {
        let inr = Currency::new("INR").unwrap();
        let mut calc = Calculation::new(
            "emp_001",
            "plan_sales",
            DateRange::new(
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            )
            .unwrap(),
            Decimal::from(100000),
            Decimal::from(120000),
            inr.clone(),
            now(),
        )
        .unwrap();
        calc.calculate(Money::new(Decimal::from(5000), inr), None, now())
            .unwrap();
        calc.submit_for_approval("analyst", now()).unwrap();
        calc.open_approval("mgr_1", 1, expires_in.map(|d| now() + d), now())
            .unwrap();
        calc
    }

    #[test]
    fn test_overdue_after_sla() {
        let calc = awaiting(None);
        let sla = Duration::hours(24);
        assert!(overdue_for_escalation(&calc, now() + Duration::hours(23), sla).is_empty());
        assert_eq!(overdue_for_escalation(&calc, now() + Duration::hours(25), sla).len(), 1);
    }

    #[test]
    fn test_expired_is_not_overdue() {
        let calc = awaiting(Some(Duration::hours(48)));
        let later = now() + Duration::hours(49);
        assert_eq!(expired(&calc, later).len(), 1);
        assert!(overdue_for_escalation(&calc, later, Duration::hours(24)).is_empty());
    }

    #[test]
    fn test_nothing_expires_without_deadline() {
        let calc = awaiting(None);
        assert!(expired(&calc, now() + Duration::days(365)).is_empty());
    }
}
