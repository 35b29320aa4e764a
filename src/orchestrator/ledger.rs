//! Cost accounting for one generation request.
//!
//! Cost is only known after a collaborator answers, so the budget check is
//! a projection before each attempt plus hard accounting afterwards. The
//! budget caps attempt spend; spec generation is reported in the total but
//! never counted against it.

use serde::{Deserialize, Serialize};

use crate::error::{FactoryError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    pub budget: f64,
    /// Spec generation cost, billed to the request but not to any attempt
    pub spec_cost: f64,
    /// Cost of each recorded attempt, in order
    pub attempt_costs: Vec<f64>,
}

impl CostLedger {
    pub fn new(budget: f64) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn record_spec(&mut self, cost: f64) {
        self.spec_cost += cost.max(0.0);
    }

    pub fn record_attempt(&mut self, cost: f64) {
        self.attempt_costs.push(cost.max(0.0));
    }

    /// Everything billed to the request, spec generation included
    pub fn spent(&self) -> f64 {
        self.spec_cost + self.attempts_spent()
    }

    /// Spend the budget is enforced against
    pub fn attempts_spent(&self) -> f64 {
        self.attempt_costs.iter().sum()
    }

    pub fn last_attempt_cost(&self) -> Option<f64> {
        self.attempt_costs.last().copied()
    }

    /// Per-attempt estimate: the configured value when positive, otherwise
    /// the last observed attempt cost
    pub fn estimate(&self, configured: f64) -> Option<f64> {
        if configured > 0.0 {
            Some(configured)
        } else {
            self.last_attempt_cost()
        }
    }

    /// Check before starting an attempt. Fails when the projected total
    /// would exceed the budget.
    pub fn check_projection(&self, configured_estimate: f64) -> Result<()> {
        let spent = self.attempts_spent();
        if spent >= self.budget {
            return Err(FactoryError::budget_exceeded(spent, self.budget));
        }
        match self.estimate(configured_estimate) {
            Some(estimate) if spent + estimate > self.budget => {
                Err(FactoryError::budget_exceeded(spent + estimate, self.budget))
            }
            _ => Ok(()),
        }
    }

    /// Hard check after an attempt has been paid for
    pub fn is_exhausted(&self) -> bool {
        self.attempts_spent() >= self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_projection_stops_third_attempt() {
        let mut ledger = CostLedger::new(5.0);
        assert!(ledger.check_projection(2.10).is_ok());
        ledger.record_attempt(2.10);
        assert!(ledger.check_projection(2.10).is_ok());
        ledger.record_attempt(2.10);

        let err = ledger.check_projection(2.10).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BUDGET_EXCEEDED);
        assert!(!ledger.is_exhausted());
    }

    #[test]
    fn test_unknown_estimate_uses_last_attempt() {
        let mut ledger = CostLedger::new(5.0);
        // nothing observed yet, so attempt 1 always starts
        assert!(ledger.check_projection(0.0).is_ok());
        ledger.record_attempt(3.0);
        assert!(ledger.check_projection(0.0).is_err());
    }

    #[test]
    fn test_spec_cost_is_reported_but_not_enforced() {
        let mut ledger = CostLedger::new(5.0);
        ledger.record_spec(1.5);
        assert!(ledger.check_projection(2.10).is_ok());
        ledger.record_attempt(2.10);
        assert!(ledger.check_projection(2.10).is_ok());
        ledger.record_attempt(2.10);
        assert!(ledger.check_projection(2.10).is_err());

        assert!(!ledger.is_exhausted());
        assert!((ledger.attempts_spent() - 4.20).abs() < 1e-9);
        assert!((ledger.spent() - 5.70).abs() < 1e-9);
    }

    #[test]
    fn test_attempt_spend_exhausts_budget() {
        let mut ledger = CostLedger::new(1.0);
        ledger.record_spec(0.6);
        ledger.record_attempt(0.4);
        assert!(!ledger.is_exhausted());
        ledger.record_attempt(0.6);
        assert!(ledger.is_exhausted());
        assert!(ledger.check_projection(0.0).is_err());
    }
}
