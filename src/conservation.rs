// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Conservation Audit

//! Conservation law for the fund-flow network.
//!
//! Inside a tick funds only move between wallets, except for two sinks:
//!
//! ```text
//! closing_total = opening_total - leaked - burned
//! ```
//!
//! Every tick is checked against this invariant with `Decimal` arithmetic. A
//! circuit breaker halts ticking once the cumulative error of violating ticks
//! exceeds the configured threshold.

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Per-tick tolerance for float rounding and pruned wallet dust.
const TICK_TOLERANCE: Decimal = dec!(0.0001);

/// Convert f64 to Decimal (lossy but sufficient for auditing).
pub fn to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

/// Convert Decimal to f64.
pub fn from_decimal(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConservationError {
    #[error("circuit breaker tripped, ticking halted (cumulative error: {0})")]
    CircuitBreakerTripped(Decimal),
}

// ---------------------------------------------------------------------------
// Conservation result
// ---------------------------------------------------------------------------

/// Outcome of a single tick check.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConservationResult {
    pub balanced: bool,
    pub error: f64,
    pub circuit_breaker_tripped: bool,
}

// ---------------------------------------------------------------------------
// Conservation law
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConservationLaw {
    cumulative_error: Decimal,
    circuit_breaker_threshold: Decimal,
    circuit_breaker_tripped: bool,
    consecutive_violations: u32,
}

impl ConservationLaw {
    pub fn new(threshold: f64) -> Self {
        Self {
            cumulative_error: Decimal::ZERO,
            circuit_breaker_threshold: to_decimal(threshold),
            circuit_breaker_tripped: false,
            consecutive_violations: 0,
        }
    }

    /// Verify `closing == opening - leaked - burned` for one tick.
    ///
    /// Violations beyond the per-tick tolerance accumulate; the breaker trips
    /// when the cumulative error exceeds the threshold and every later check
    /// fails until [`reset_circuit_breaker`](Self::reset_circuit_breaker).
    pub fn verify_tick(
        &mut self,
        opening: f64,
        closing: f64,
        leaked: f64,
        burned: f64,
    ) -> Result<ConservationResult, ConservationError> {
        if self.circuit_breaker_tripped {
            return Err(ConservationError::CircuitBreakerTripped(self.cumulative_error));
        }

        let expected = to_decimal(opening) - to_decimal(leaked) - to_decimal(burned);
        let error = (expected - to_decimal(closing)).abs();
        let balanced = error <= TICK_TOLERANCE;

        if balanced {
            self.consecutive_violations = 0;
        } else {
            self.cumulative_error += error;
            self.consecutive_violations += 1;
        }

        if self.cumulative_error > self.circuit_breaker_threshold {
            self.circuit_breaker_tripped = true;
            return Err(ConservationError::CircuitBreakerTripped(self.cumulative_error));
        }

        Ok(ConservationResult {
            balanced,
            error: from_decimal(error),
            circuit_breaker_tripped: false,
        })
    }

    pub fn is_tripped(&self) -> bool {
        self.circuit_breaker_tripped
    }

    pub fn cumulative_error(&self) -> f64 {
        from_decimal(self.cumulative_error)
    }

    pub fn consecutive_violations(&self) -> u32 {
        self.consecutive_violations
    }

    /// Admin reset after investigation clears the breaker and error.
    pub fn reset_circuit_breaker(&mut self) {
        self.cumulative_error = Decimal::ZERO;
        self.circuit_breaker_tripped = false;
        self.consecutive_violations = 0;
    }
}

impl Default for ConservationLaw {
    fn default() -> Self {
        Self::new(0.01)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
