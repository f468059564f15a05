//! XYO wallet monitor: entry point.
//!
//! Parses flags, resolves configuration from the environment (and an
//! optional `.env` file), initialises structured logging, then runs one
//! monitoring session with Ctrl+C wired in as the shutdown signal.

use std::process::ExitCode;
use tracing::{error, info, warn};

use xyo_monitor::cli;
use xyo_monitor::config::{EndpointConfig, SessionConfig};
use xyo_monitor::engine::clock::SystemClock;
use xyo_monitor::engine::runner::{Monitor, EXIT_FAILURE};
use xyo_monitor::explorer::etherscan::EtherscanClient;
use xyo_monitor::pricing::coingecko::CoinGeckoClient;
use xyo_monitor::types::{format_usd, short_address};

const BANNER: &str = r#"
 __  ____   _____    __  __             _ _
 \ \/ /\ \ / / _ \  |  \/  | ___  _ __ (_) |_ ___  _ __
  \  /  \ V / | | | | |\/| |/ _ \| '_ \| | __/ _ \| '__|
  /  \   | || |_| | | |  | | (_) | | | | | || (_) | |
 /_/\_\  |_| \___/  |_|  |_|\___/|_| |_|_|\__\___/|_|

  ETH + XYO portfolio monitor
"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let mut argv = std::env::args();
    let program = argv.next().unwrap_or_else(|| "xyo-monitor".to_string());
    let rest: Vec<String> = argv.collect();

    let args = match cli::parse_args(&rest) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}\n");
            eprintln!("{}", cli::usage(&program));
            return ExitCode::from(e.exit_code());
        }
    };
    if args.help {
        println!("{}", cli::usage(&program));
        return ExitCode::SUCCESS;
    }

    let endpoints = match EndpointConfig::from_cli(&args) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}", e.remediation());
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    let session_cfg = match SessionConfig::from_env(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.remediation());
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    println!("{BANNER}");
    info!(
        wallet = %short_address(&session_cfg.wallet_address),
        token_contract = %short_address(&session_cfg.token_contract),
        target = %format_usd(session_cfg.liquidation_target_usd),
        schedule = %session_cfg.schedule,
        report_dir = %endpoints.report_dir.display(),
        "XYO monitor starting up"
    );

    match run(&session_cfg, &endpoints).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = format!("{e:#}"), "Monitor failed");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Build the live clients and run one session.
async fn run(session_cfg: &SessionConfig, endpoints: &EndpointConfig) -> anyhow::Result<u8> {
    let balances = EtherscanClient::new(session_cfg.api_key.clone(), endpoints)?;
    let prices = CoinGeckoClient::new(endpoints)?;
    let clock = SystemClock;

    let monitor = Monitor {
        config: session_cfg,
        balances: &balances,
        prices: &prices,
        clock: &clock,
        report_dir: &endpoints.report_dir,
    };

    info!("Press Ctrl+C to stop.");
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received."),
            Err(e) => {
                warn!(error = %e, "Ctrl+C handler unavailable; running to completion");
                std::future::pending::<()>().await;
            }
        }
    };

    let outcome = monitor.run(shutdown).await?;
    Ok(outcome.exit_code())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("xyo_monitor=info"));

    let json_logging = std::env::var("XYO_MONITOR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}
