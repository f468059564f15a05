//! Session summary: iteration stats and the liquidation-target check.
//!
//! The target comparison is informational only: it tells the operator
//! how far the latest recorded portfolio value sits from the configured
//! liquidation threshold.

use rust_decimal::Decimal;
use std::fmt;
use tracing::{info, warn};

use crate::types::{format_usd, round_cents, SessionResult, SessionStatus};

// ---------------------------------------------------------------------------
// Liquidation check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPosition {
    Above,
    Below,
}

/// Final total compared against the liquidation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationCheck {
    /// Latest total portfolio value, rounded to cents.
    pub final_total: Decimal,
    pub target: Decimal,
    /// `final_total - target`; negative means short of the target.
    pub gap: Decimal,
}

impl LiquidationCheck {
    pub fn new(final_total: Decimal, target: Decimal) -> Self {
        let final_total = round_cents(final_total);
        Self { final_total, target, gap: final_total - target }
    }

    /// Meeting the target exactly counts as above.
    pub fn position(&self) -> TargetPosition {
        if self.gap >= Decimal::ZERO {
            TargetPosition::Above
        } else {
            TargetPosition::Below
        }
    }

    /// Unsigned distance from the target.
    pub fn distance(&self) -> Decimal {
        self.gap.abs()
    }
}

impl fmt::Display for LiquidationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position() {
            TargetPosition::Above => write!(
                f,
                "You are ABOVE the target by {}. You could plan liquidation now.",
                format_usd(self.distance())
            ),
            TargetPosition::Below => write!(
                f,
                "You are BELOW the target by {}. You may need additional assets or price movement.",
                format_usd(self.distance())
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Session summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub iterations: u64,
    pub recorded: usize,
    pub skipped: u64,
    pub elapsed: chrono::Duration,
    pub status: SessionStatus,
    /// `None` when nothing was recorded or the last sample had no prices.
    pub liquidation: Option<LiquidationCheck>,
}

impl SessionSummary {
    pub fn from_result(result: &SessionResult, target: Decimal) -> Self {
        let liquidation = result
            .latest()
            .and_then(|s| s.total_value_usd())
            .map(|total| LiquidationCheck::new(total, target));

        Self {
            iterations: result.iterations,
            recorded: result.snapshots.len(),
            skipped: result.skipped(),
            elapsed: result.elapsed(),
            status: result.status,
            liquidation,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.num_milliseconds() as f64 / 1000.0
    }

    /// Emit the end-of-session summary.
    pub fn log(&self) {
        let secs = self.elapsed_secs();
        info!(
            status = %self.status,
            iterations = self.iterations,
            recorded = self.recorded,
            skipped = self.skipped,
            total_time = %format!("{secs:.1}s ({:.2} minutes)", secs / 60.0),
            "Portfolio session done"
        );

        match &self.liquidation {
            Some(check) => {
                info!(
                    final_total = %format_usd(check.final_total),
                    target = %format_usd(check.target),
                    gap = %format_usd(check.gap),
                    "{check}"
                );
            }
            None if self.recorded == 0 => {
                warn!("No successful balance samples recorded; no CSV created.");
            }
            None => {
                warn!("Latest sample has no USD valuation; target comparison skipped.");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
