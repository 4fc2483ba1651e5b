//! Commission model: proportional plus fixed per order.
//!
//! Commission is symmetric: buys and sells pay the same schedule. A zero
//! notional order pays nothing (it never reaches the accountant anyway).

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionModel {
    /// Fraction of traded notional (0.001 = 10 bps).
    pub rate: f64,
    /// Flat amount charged per executed order.
    pub fixed: f64,
}

impl CommissionModel {
    pub fn new(rate: f64, fixed: f64) -> Self {
        Self { rate, fixed }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Proportional-only schedule.
    pub fn rate_only(rate: f64) -> Self {
        Self::new(rate, 0.0)
    }

    pub fn commission(&self, notional: f64) -> f64 {
        if notional <= 0.0 {
            return 0.0;
        }
        notional * self.rate + self.fixed
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(SetupError::InvalidConfig(format!(
                "commission rate must be a non-negative number, got {}",
                self.rate
            )));
        }
        if !self.fixed.is_finite() || self.fixed < 0.0 {
            return Err(SetupError::InvalidConfig(format!(
                "fixed commission must be a non-negative number, got {}",
                self.fixed
            )));
        }
        Ok(())
    }
}

impl Default for CommissionModel {
    fn default() -> Self {
        Self::zero()
    }
}
