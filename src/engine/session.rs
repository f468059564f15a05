//! Session loop: price once, then sample balances on a fixed cadence.
//!
//! `NotStarted -> Running -> Done`. Iterations are independent: a failed
//! balance fetch skips that iteration's snapshot and the loop carries on.
//! A pricing failure ends the session before the first iteration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::engine::clock::Clock;
use crate::explorer::BalanceSource;
use crate::pricing::PriceSource;
use crate::types::{
    format_token_count, format_usd, short_address, FetchError, SessionError, SessionResult,
    SessionStatus, WalletSnapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Running,
    Done,
}

pub struct Session<'a> {
    config: &'a SessionConfig,
    balances: &'a dyn BalanceSource,
    prices: &'a dyn PriceSource,
    clock: &'a dyn Clock,
    phase: SessionPhase,
}

/// Await `fut` unless `shutdown` resolves first.
async fn interruptible<T, S>(shutdown: &mut S, fut: impl Future<Output = T>) -> Option<T>
where
    S: Future<Output = ()> + Unpin,
{
    tokio::select! {
        biased;
        _ = shutdown => None,
        value = fut => Some(value),
    }
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a SessionConfig,
        balances: &'a dyn BalanceSource,
        prices: &'a dyn PriceSource,
        clock: &'a dyn Clock,
    ) -> Self {
        Self { config, balances, prices, clock, phase: SessionPhase::NotStarted }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run the session to completion or until `shutdown` resolves.
    ///
    /// An interrupted session still returns `Ok` with whatever was
    /// collected, marked `SessionStatus::Interrupted`.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<SessionResult, SessionError>
    where
        F: Future<Output = ()>,
    {
        if self.phase != SessionPhase::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        self.phase = SessionPhase::Running;
        tokio::pin!(shutdown);

        let (config, balances, price_source, clock) =
            (self.config, self.balances, self.prices, self.clock);
        let schedule = config.schedule;
        let started_at = clock.now();
        let end_at = match schedule.run_for {
            Some(run_for) => {
                let end = started_at.checked_add_signed(to_chrono(run_for));
                if end.is_none() {
                    warn!(
                        run_for_secs = run_for.as_secs(),
                        "Session deadline is past the representable date range; running without one"
                    );
                }
                end
            }
            None => None,
        };

        info!(
            wallet = %short_address(&config.wallet_address),
            schedule = %schedule,
            target = %format_usd(config.liquidation_target_usd),
            balances = balances.name(),
            prices = price_source.name(),
            "Session starting"
        );

        let prices = match interruptible(&mut shutdown, price_source.spot_prices()).await {
            None => return Ok(self.finish(started_at, 0, Vec::new(), SessionStatus::Interrupted)),
            Some(Ok(prices)) => prices,
            Some(Err(e)) => {
                self.phase = SessionPhase::Done;
                error!(error = %e, "Could not get prices. Aborting session.");
                return Err(SessionError::PricingUnavailable(e));
            }
        };
        info!(
            eth_usd = %format!("${:.4}", prices.eth_usd),
            xyo_usd = %format!("${:.8}", prices.xyo_usd),
            "Spot prices fetched"
        );

        let wallet = config.wallet_address.as_str();
        let contract = config.token_contract.as_str();
        let mut iterations: u64 = 0;
        let mut snapshots: Vec<WalletSnapshot> = Vec::new();

        let status = loop {
            let now = clock.now();
            if end_at.is_some_and(|end| now >= end)
                || schedule.max_iterations.is_some_and(|max| iterations >= max)
            {
                break SessionStatus::Completed;
            }

            iterations += 1;

            let Some(eth) = interruptible(&mut shutdown, balances.native_balance(wallet)).await
            else {
                break SessionStatus::Interrupted;
            };
            let Some(xyo) =
                interruptible(&mut shutdown, balances.token_balance(wallet, contract)).await
            else {
                break SessionStatus::Interrupted;
            };

            match (eth, xyo) {
                (Ok(eth), Ok(xyo)) => {
                    let snapshot = WalletSnapshot::new(now, wallet, eth, xyo, Some(prices));
                    self.log_progress(iterations, &snapshot, started_at, end_at);
                    snapshots.push(snapshot);
                }
                (eth, xyo) => log_skip(iterations, &eth, &xyo),
            }

            if schedule.max_iterations.is_some_and(|max| iterations >= max) {
                break SessionStatus::Completed;
            }

            let pause = match end_at {
                Some(end) => {
                    let remaining = end - clock.now();
                    if remaining <= chrono::Duration::zero() {
                        break SessionStatus::Completed;
                    }
                    remaining.to_std().map_or(schedule.interval, |r| r.min(schedule.interval))
                }
                None => schedule.interval,
            };

            if interruptible(&mut shutdown, clock.sleep(pause)).await.is_none() {
                break SessionStatus::Interrupted;
            }
        };

        if status == SessionStatus::Interrupted {
            warn!(iterations, recorded = snapshots.len(), "Session interrupted");
        }

        Ok(self.finish(started_at, iterations, snapshots, status))
    }

    fn finish(
        &mut self,
        started_at: DateTime<Utc>,
        iterations: u64,
        snapshots: Vec<WalletSnapshot>,
        status: SessionStatus,
    ) -> SessionResult {
        self.phase = SessionPhase::Done;
        SessionResult {
            snapshots,
            iterations,
            started_at,
            finished_at: self.clock.now(),
            status,
        }
    }

    fn log_progress(
        &self,
        iteration: u64,
        snapshot: &WalletSnapshot,
        started_at: DateTime<Utc>,
        end_at: Option<DateTime<Utc>>,
    ) {
        let now = self.clock.now();
        let elapsed = seconds(now - started_at);
        let remaining = end_at.map(|end| seconds(end - now).max(0.0));
        let progress = end_at.map(|end| {
            let total = seconds(end - started_at);
            if total > 0.0 { (elapsed / total * 100.0).min(100.0) } else { 100.0 }
        });

        let usd = |v: Option<Decimal>| v.map(format_usd).unwrap_or_else(|| "n/a".to_string());

        info!(
            iteration,
            eth = %format!("{:.6}", snapshot.eth_balance),
            eth_usd = %usd(snapshot.eth_value_usd()),
            xyo = %format_token_count(snapshot.xyo_balance),
            xyo_usd = %usd(snapshot.xyo_value_usd()),
            total = %usd(snapshot.total_value_usd()),
            target = %format_usd(self.config.liquidation_target_usd),
            elapsed_secs = %format!("{elapsed:.1}"),
            remaining_secs = ?remaining.map(|r| format!("{r:.1}")),
            progress = ?progress.map(|p| format!("{p:.1}%")),
            "Portfolio sample recorded"
        );
    }
}

fn log_skip(
    iteration: u64,
    eth: &Result<Decimal, FetchError>,
    xyo: &Result<Decimal, FetchError>,
) {
    fn shown(r: &Result<Decimal, FetchError>) -> Decimal {
        r.as_ref().map_or_else(FetchError::sentinel, |v| *v)
    }
    fn status(r: &Result<Decimal, FetchError>) -> &'static str {
        r.as_ref().err().map_or("ok", FetchError::kind)
    }

    warn!(
        iteration,
        eth = %shown(eth),
        eth_status = status(eth),
        xyo = %shown(xyo),
        xyo_status = status(xyo),
        "Skipping this iteration due to API error"
    );
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

fn seconds(d: chrono::Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
