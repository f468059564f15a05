//! Runner: session loop -> summary -> CSV report -> exit status.

use anyhow::Result;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::engine::clock::Clock;
use crate::engine::session::Session;
use crate::engine::summary::SessionSummary;
use crate::explorer::BalanceSource;
use crate::pricing::PriceSource;
use crate::storage;
use crate::types::{FetchError, SessionError, SessionStatus};

/// Process exit status for a normal, completed session.
pub const EXIT_OK: u8 = 0;
/// Process exit status for every failure class.
pub const EXIT_FAILURE: u8 = 1;

/// How a monitoring run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The session reached its bound. `report` is `None` when no
    /// snapshot was recorded.
    Completed {
        summary: SessionSummary,
        report: Option<PathBuf>,
    },
    /// Stopped by the shutdown signal; any collected rows were discarded.
    Interrupted { summary: SessionSummary },
    /// No price reference, so the loop never started.
    PricingUnavailable(FetchError),
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed { .. } => EXIT_OK,
            RunOutcome::Interrupted { .. } | RunOutcome::PricingUnavailable(_) => EXIT_FAILURE,
        }
    }

    pub fn report(&self) -> Option<&Path> {
        match self {
            RunOutcome::Completed { report, .. } => report.as_deref(),
            _ => None,
        }
    }
}

/// The collaborators a run needs, borrowed for its duration.
pub struct Monitor<'a> {
    pub config: &'a SessionConfig,
    pub balances: &'a dyn BalanceSource,
    pub prices: &'a dyn PriceSource,
    pub clock: &'a dyn Clock,
    pub report_dir: &'a Path,
}

impl<'a> Monitor<'a> {
    /// Run one session and persist its report.
    ///
    /// Errors are reserved for unexpected failures (e.g. the report could
    /// not be written); every expected ending is a `RunOutcome`.
    pub async fn run<F>(&self, shutdown: F) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let mut session = Session::new(self.config, self.balances, self.prices, self.clock);

        let result = match session.run(shutdown).await {
            Ok(result) => result,
            Err(SessionError::PricingUnavailable(e)) => {
                error!(error = %e, "Session aborted: no USD pricing reference");
                return Ok(RunOutcome::PricingUnavailable(e));
            }
            Err(e) => return Err(e.into()),
        };

        let summary = SessionSummary::from_result(&result, self.config.liquidation_target_usd);
        summary.log();

        if result.status == SessionStatus::Interrupted {
            if !result.snapshots.is_empty() {
                warn!(
                    discarded = result.snapshots.len(),
                    "Interrupted; partial samples discarded, no CSV written"
                );
            }
            return Ok(RunOutcome::Interrupted { summary });
        }

        let report = if result.snapshots.is_empty() {
            None
        } else {
            Some(storage::write_report(self.report_dir, &result.snapshots, self.clock.now())?)
        };

        info!("Status: All portfolio monitoring operations completed.");
        Ok(RunOutcome::Completed { summary, report })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
