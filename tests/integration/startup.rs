//! Startup validation: flags and environment are checked before any
//! client is built.

use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::time::Duration;

use xyo_monitor::cli::{parse_args, CliArgs, UsageError};
use xyo_monitor::config::{ConfigError, EndpointConfig, SessionConfig, API_KEY_VAR, WALLET_VAR};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_non_positive_duration_rejected() {
    for bad in ["--duration-minutes=0", "--duration-minutes=-5", "--runtime-minutes=0"] {
        let err = parse_args(&[bad]).unwrap_err();
        assert!(matches!(err, UsageError::NotPositive { .. }), "{bad}: {err:?}");
        assert_eq!(err.exit_code(), 1);
    }
}

#[test]
fn test_overlong_duration_fails_cleanly() {
    let err = parse_args(&["--duration-minutes", "9223372036854775807"]).unwrap_err();
    assert!(matches!(err, UsageError::TooLarge { .. }), "{err:?}");
    assert_eq!(err.exit_code(), 1);

    let lookup = env(&[
        ("ETHERSCAN_API_KEY", "abc"),
        ("XYO_WALLET_ADDRESS", "0xabc"),
        ("RUNTIME_MINUTES", "200000000000"),
    ]);
    let err = SessionConfig::resolve(lookup, &CliArgs::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "RUNTIME_MINUTES", .. }), "{err:?}");
    assert!(err.remediation().contains("RUNTIME_MINUTES"));
}

#[test]
fn test_missing_credentials_listed_together() {
    let err = SessionConfig::resolve(env(&[]), &CliArgs::default()).unwrap_err();
    match &err {
        ConfigError::Missing(keys) => assert_eq!(keys, &vec![API_KEY_VAR, WALLET_VAR]),
        other => panic!("unexpected: {other:?}"),
    }
    let text = err.remediation();
    assert!(text.contains("ETHERSCAN_API_KEY"));
    assert!(text.contains("XYO_WALLET_ADDRESS"));
    assert!(text.contains("GitHub Actions"));
}

#[test]
fn test_blank_wallet_counts_as_missing() {
    let lookup = env(&[("ETHERSCAN_API_KEY", "abc"), ("XYO_WALLET_ADDRESS", "   ")]);
    match SessionConfig::resolve(lookup, &CliArgs::default()).unwrap_err() {
        ConfigError::Missing(keys) => assert_eq!(keys, vec![WALLET_VAR]),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_once_flag_with_env_config() {
    let args = parse_args(&["--once"]).unwrap();
    let lookup = env(&[
        ("ETHERSCAN_API_KEY", "sekrit-key"),
        ("XYO_WALLET_ADDRESS", "0xabc"),
        ("LIQUIDATION_TARGET_USD", "20,000.50"),
    ]);
    let cfg = SessionConfig::resolve(lookup, &args).unwrap();
    assert_eq!(cfg.schedule.max_iterations, Some(1));
    assert_eq!(cfg.schedule.run_for, None);
    assert_eq!(cfg.schedule.interval, Duration::from_secs(10));
    assert_eq!(cfg.liquidation_target_usd, dec!(20000.50));
    assert!(!format!("{cfg:?}").contains("sekrit"));
}

#[test]
fn test_duration_flag_beats_env() {
    let args = parse_args(&["--duration-minutes", "2"]).unwrap();
    let lookup = env(&[
        ("ETHERSCAN_API_KEY", "abc"),
        ("XYO_WALLET_ADDRESS", "0xabc"),
        ("RUNTIME_MINUTES", "60"),
    ]);
    let cfg = SessionConfig::resolve(lookup, &args).unwrap();
    assert_eq!(cfg.schedule.run_for, Some(Duration::from_secs(120)));
}

#[test]
fn test_endpoint_file_overrides_defaults() {
    let dir = crate::support::temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("endpoints.toml");
    std::fs::write(
        &file,
        "explorer_base_url = \"http://localhost:9999/api\"\nreport_dir = \"out\"\n",
    )
    .unwrap();

    let args = parse_args(&["--config", file.to_str().unwrap()]).unwrap();
    let endpoints = EndpointConfig::from_cli(&args).unwrap();
    assert_eq!(endpoints.explorer_base_url, "http://localhost:9999/api");
    assert_eq!(endpoints.report_dir, std::path::PathBuf::from("out"));
    assert_eq!(endpoints.price_url, EndpointConfig::default().price_url);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_endpoint_file() {
    let args = parse_args(&["--config", "/nonexistent/xyo-monitor.toml"]).unwrap();
    assert!(matches!(
        EndpointConfig::from_cli(&args),
        Err(ConfigError::EndpointFile { .. })
    ));
}
