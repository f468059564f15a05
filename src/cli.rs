//! Command-line parsing.
//!
//! Every check here runs before configuration is resolved and before any
//! network activity, so a bad invocation never touches the APIs.

use getopts::Options;

use crate::config::MAX_RUNTIME_MINUTES;

/// Parsed command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Session length; always positive once parsed.
    pub duration_minutes: Option<u64>,
    /// Take a single sample and stop.
    pub once: bool,
    pub interval_secs: Option<u64>,
    pub max_iterations: Option<u64>,
    /// Optional TOML file with endpoint settings.
    pub config_path: Option<String>,
    pub help: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("{0}")]
    Parse(String),

    #[error("{flag} must be a positive integer, got {value:?}")]
    NotPositive { flag: &'static str, value: String },

    #[error("{flag} must be at most {max}, got {value}")]
    TooLarge { flag: &'static str, value: u64, max: u64 },

    #[error("--once cannot be combined with --max-iterations")]
    Conflict,

    #[error("--duration-minutes and --runtime-minutes are aliases; pass only one")]
    DuplicateDuration,
}

impl UsageError {
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Flag definitions shared by parsing and `--help`.
pub fn options() -> Options {
    let mut opts = Options::new();
    opts.optopt("d", "duration-minutes", "Run the session for this many minutes", "MINUTES");
    opts.optopt("", "runtime-minutes", "Alias for --duration-minutes", "MINUTES");
    opts.optflag("", "once", "Take a single sample and exit");
    opts.optopt("i", "interval", "Seconds between samples (default 10, or 900 when open-ended)", "SECONDS");
    opts.optopt("n", "max-iterations", "Stop after this many iterations", "N");
    opts.optopt("c", "config", "TOML file with endpoint settings", "PATH");
    opts.optflag("h", "help", "Show this help message");
    opts
}

/// Parse arguments (excluding the program name).
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<CliArgs, UsageError> {
    let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
    let matches = options()
        .parse(&args)
        .map_err(|f| UsageError::Parse(f.to_string()))?;

    if let Some(extra) = matches.free.first() {
        return Err(UsageError::Parse(format!("unexpected argument: {extra}")));
    }

    let duration = match (
        matches.opt_str("duration-minutes"),
        matches.opt_str("runtime-minutes"),
    ) {
        (Some(_), Some(_)) => return Err(UsageError::DuplicateDuration),
        (Some(v), None) => Some(minutes("--duration-minutes", &v)?),
        (None, Some(v)) => Some(minutes("--runtime-minutes", &v)?),
        (None, None) => None,
    };

    let interval_secs = matches
        .opt_str("interval")
        .map(|v| positive("--interval", &v))
        .transpose()?;
    let max_iterations = matches
        .opt_str("max-iterations")
        .map(|v| positive("--max-iterations", &v))
        .transpose()?;

    let once = matches.opt_present("once");
    if once && max_iterations.is_some() {
        return Err(UsageError::Conflict);
    }

    Ok(CliArgs {
        duration_minutes: duration,
        once,
        interval_secs,
        max_iterations,
        config_path: matches.opt_str("config"),
        help: matches.opt_present("help"),
    })
}

fn minutes(flag: &'static str, value: &str) -> Result<u64, UsageError> {
    let parsed = positive(flag, value)?;
    if parsed > MAX_RUNTIME_MINUTES {
        return Err(UsageError::TooLarge { flag, value: parsed, max: MAX_RUNTIME_MINUTES });
    }
    Ok(parsed)
}

/// Negative and zero values are rejected alike.
fn positive(flag: &'static str, value: &str) -> Result<u64, UsageError> {
    let not_positive = || UsageError::NotPositive { flag, value: value.to_string() };
    let parsed: i64 = value.trim().parse().map_err(|_| not_positive())?;
    if parsed <= 0 {
        return Err(not_positive());
    }
    u64::try_from(parsed).map_err(|_| not_positive())
}

pub fn usage(program: &str) -> String {
    let brief = format!("Usage: {program} [OPTIONS]");
    let mut text = options().usage(&brief);
    text.push_str(
        "\nEnvironment variables:\n  \
         ETHERSCAN_API_KEY       Etherscan API key (required)\n  \
         XYO_WALLET_ADDRESS      Wallet address to monitor (required)\n  \
         LIQUIDATION_TARGET_USD  Target liquidation amount (default: 15000)\n  \
         XYO_CONTRACT_ADDRESS    Token contract override\n  \
         POLL_INTERVAL_SECS      Seconds between samples\n  \
         RUNTIME_MINUTES         Session length in minutes\n  \
         MAX_ITERATIONS          Iteration cap\n\
         \nExample:\n  \
         xyo-monitor --duration-minutes 1\n",
    );
    text
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
