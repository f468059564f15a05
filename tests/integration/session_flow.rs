//! Whole sessions through the runner: mock HTTP services, manual clock,
//! real report files.

use rust_decimal_macros::dec;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer};

use xyo_monitor::config::{EndpointConfig, Schedule, SessionConfig};
use xyo_monitor::engine::clock::{ManualClock, SystemClock};
use xyo_monitor::engine::runner::{Monitor, RunOutcome, EXIT_FAILURE, EXIT_OK};
use xyo_monitor::engine::summary::TargetPosition;
use xyo_monitor::explorer::etherscan::EtherscanClient;
use xyo_monitor::explorer::BalanceSource;
use xyo_monitor::pricing::coingecko::CoinGeckoClient;
use xyo_monitor::storage;
use xyo_monitor::types::{FetchError, SessionStatus};

use crate::support::*;

async fn run_session<F>(
    cfg: &SessionConfig,
    endpoints: &EndpointConfig,
    balances: &dyn BalanceSource,
    clock: &ManualClock,
    shutdown: F,
) -> RunOutcome
where
    F: std::future::Future<Output = ()>,
{
    let prices = CoinGeckoClient::new(endpoints).unwrap();
    let monitor = Monitor {
        config: cfg,
        balances,
        prices: &prices,
        clock,
        report_dir: &endpoints.report_dir,
    };
    monitor.run(shutdown).await.unwrap()
}

fn cleanup(dir: &Path) {
    if dir.exists() {
        std::fs::remove_dir_all(dir).unwrap();
    }
}

#[tokio::test]
async fn test_timed_session_below_target() {
    let server = MockServer::start().await;
    mount_prices(&server, prices_ok(12345.67, 0.01)).await;
    mount_balance(&server, "balance", etherscan_ok("1000000000000000000")).await;
    mount_balance(&server, "tokenbalance", etherscan_ok("0")).await;

    let dir = temp_dir();
    let endpoints = endpoints(&server, dir.clone());
    let cfg = session_config(Schedule {
        interval: Duration::from_secs(10),
        run_for: Some(Duration::from_secs(30)),
        max_iterations: None,
    });
    let balances = EtherscanClient::new(cfg.api_key.clone(), &endpoints).unwrap();
    let clock = ManualClock::new(start());

    let outcome = run_session(&cfg, &endpoints, &balances, &clock, std::future::pending()).await;

    assert_eq!(outcome.exit_code(), EXIT_OK);
    let report = outcome.report().unwrap().to_path_buf();
    assert_eq!(
        report.file_name().unwrap(),
        "portfolio_report_20260301_120030.csv"
    );

    let rows = storage::read_report(&report).unwrap();
    assert_eq!(rows.len(), 3);
    let stamps: Vec<_> = rows.iter().map(|r| r.timestamp_utc.as_str()).collect();
    assert_eq!(
        stamps,
        ["2026-03-01 12:00:00", "2026-03-01 12:00:10", "2026-03-01 12:00:20"]
    );
    assert!(rows.iter().all(|r| r.total_usd == "12345.67"));

    match outcome {
        RunOutcome::Completed { summary, .. } => {
            assert_eq!(summary.iterations, 3);
            assert_eq!(summary.skipped, 0);
            let check = summary.liquidation.unwrap();
            assert_eq!(check.position(), TargetPosition::Below);
            assert_eq!(check.gap, dec!(-2654.33));
            assert!(check.to_string().contains("BELOW the target by $2,654.33"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    // one price call for the whole session, two balance calls per iteration
    assert_eq!(hits(&server, PRICE_PATH).await, 1);
    assert_eq!(hits(&server, ETHERSCAN_PATH).await, 6);
    cleanup(&dir);
}

#[tokio::test]
async fn test_api_failure_mid_session_skips_iteration() {
    let server = MockServer::start().await;
    mount_prices(&server, prices_ok(2000.0, 0.01)).await;
    mount_balance(&server, "tokenbalance", etherscan_ok("0")).await;

    // first native call succeeds, second reports status 0, the rest succeed
    Mock::given(method("GET"))
        .and(path(ETHERSCAN_PATH))
        .and(query_param("action", "balance"))
        .respond_with(etherscan_ok("1000000000000000000"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ETHERSCAN_PATH))
        .and(query_param("action", "balance"))
        .respond_with(etherscan_notok("Max rate limit reached"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_balance(&server, "balance", etherscan_ok("3000000000000000000")).await;

    let dir = temp_dir();
    let endpoints = endpoints(&server, dir.clone());
    let cfg = session_config(capped(3));
    let balances = EtherscanClient::new(cfg.api_key.clone(), &endpoints).unwrap();
    let clock = ManualClock::new(start());

    let outcome = run_session(&cfg, &endpoints, &balances, &clock, std::future::pending()).await;

    assert_eq!(outcome.exit_code(), EXIT_OK);
    let rows = storage::read_report(outcome.report().unwrap()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].eth_balance, "1.0000000000");
    assert_eq!(rows[1].eth_balance, "3.0000000000");
    assert_eq!(rows[1].timestamp_utc, "2026-03-01 12:00:20");

    match outcome {
        RunOutcome::Completed { summary, .. } => {
            assert_eq!(summary.iterations, 3);
            assert_eq!(summary.recorded, 2);
            assert_eq!(summary.skipped, 1);
            assert_eq!(summary.liquidation.unwrap().final_total, dec!(6000.00));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    cleanup(&dir);
}

#[tokio::test]
async fn test_pricing_failure_aborts_without_report() {
    let server = MockServer::start().await;
    mount_prices(&server, wiremock::ResponseTemplate::new(503)).await;
    mount_balance(&server, "balance", etherscan_ok("1")).await;
    mount_balance(&server, "tokenbalance", etherscan_ok("1")).await;

    let dir = temp_dir();
    let endpoints = endpoints(&server, dir.clone());
    let cfg = session_config(capped(3));
    let balances = EtherscanClient::new(cfg.api_key.clone(), &endpoints).unwrap();
    let clock = ManualClock::new(start());

    let outcome = run_session(&cfg, &endpoints, &balances, &clock, std::future::pending()).await;

    assert_eq!(outcome.exit_code(), EXIT_FAILURE);
    assert!(matches!(
        outcome,
        RunOutcome::PricingUnavailable(FetchError::HttpStatus { status: 503, .. })
    ));
    assert_eq!(hits(&server, ETHERSCAN_PATH).await, 0);
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_every_iteration_failing_writes_nothing() {
    let server = MockServer::start().await;
    mount_prices(&server, prices_ok(2000.0, 0.01)).await;

    let dir = temp_dir();
    let endpoints = endpoints(&server, dir.clone());
    let cfg = session_config(capped(2));
    let balances = ScriptedBalances::new(
        vec![Err(FetchError::Network {
            service: "scripted".to_string(),
            message: "connection reset".to_string(),
        })],
        vec![Ok(dec!(10))],
    );
    let clock = ManualClock::new(start());

    let outcome = run_session(&cfg, &endpoints, &balances, &clock, std::future::pending()).await;

    assert_eq!(outcome.exit_code(), EXIT_OK);
    assert!(outcome.report().is_none());
    assert!(!dir.exists());
    match outcome {
        RunOutcome::Completed { summary, .. } => {
            assert_eq!(summary.recorded, 0);
            assert_eq!(summary.skipped, 2);
            assert!(summary.liquidation.is_none());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_balances_are_recorded() {
    let server = MockServer::start().await;
    mount_prices(&server, prices_ok(2000.0, 0.01)).await;

    let dir = temp_dir();
    let endpoints = endpoints(&server, dir.clone());
    let cfg = session_config(capped(1));
    let balances = ScriptedBalances::new(vec![Ok(dec!(0))], vec![Ok(dec!(0))]);
    let clock = ManualClock::new(start());

    let outcome = run_session(&cfg, &endpoints, &balances, &clock, std::future::pending()).await;

    let rows = storage::read_report(outcome.report().unwrap()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_usd, "0.00");
    assert!(clock.sleeps().is_empty());
    cleanup(&dir);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_discards_samples() {
    let dir = temp_dir();
    let cfg = session_config(Schedule {
        interval: Duration::from_secs(900),
        run_for: None,
        max_iterations: None,
    });
    let balances = ScriptedBalances::new(vec![Ok(dec!(1))], vec![Ok(dec!(1))]);
    let prices = FixedPrices::new(dec!(2000), dec!(0.01));
    let clock = SystemClock;
    let monitor = Monitor {
        config: &cfg,
        balances: &balances,
        prices: &prices,
        clock: &clock,
        report_dir: &dir,
    };

    // samples at t=0 and t=900s, then Ctrl+C arrives mid-sleep
    let outcome = monitor
        .run(tokio::time::sleep(Duration::from_secs(1000)))
        .await
        .unwrap();

    assert_eq!(outcome.exit_code(), EXIT_FAILURE);
    match outcome {
        RunOutcome::Interrupted { summary } => {
            assert_eq!(summary.status, SessionStatus::Interrupted);
            assert_eq!(summary.iterations, 2);
            assert_eq!(summary.recorded, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!dir.exists());
}
