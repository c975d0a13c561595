//! Unit tests for operator configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use verrazzano_fleet_operator::OperatorConfig;
use verrazzano_fleet_operator::config::parse_duration;

fn load(vars: &[(&str, &str)]) -> verrazzano_fleet_operator::Result<OperatorConfig> {
    let vars: HashMap<&str, &str> = vars.iter().copied().collect();
    OperatorConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
}

#[test]
fn test_overrides() {
    let config = load(&[
        ("UNINSTALL_TIMEOUT", "45m"),
        ("WAIT_MIN_SECONDS", "5"),
        ("WAIT_MAX_SECONDS", "8"),
        ("CHART_PATH", "/charts/vpo"),
        ("HELM_BINARY", "/usr/local/bin/helm"),
        ("WATCH_NAMESPACE", "fleet"),
        ("API_QPS", "20"),
        ("API_BURST", "40"),
    ])
    .unwrap();

    assert_eq!(config.uninstall_timeout, Duration::from_secs(45 * 60));
    assert_eq!(config.chart_path, PathBuf::from("/charts/vpo"));
    assert_eq!(config.helm_binary, "/usr/local/bin/helm");
    assert_eq!(config.watch_namespace.as_deref(), Some("fleet"));
    assert_eq!(config.api_burst, 40);

    let wait = config.deletion_wait();
    assert_eq!(wait.timeout, Duration::from_secs(45 * 60));
    assert_eq!(wait.min_wait, Duration::from_secs(5));
    assert_eq!(wait.max_wait, Duration::from_secs(8));
}

#[test]
fn test_blank_values_fall_back_to_defaults() {
    let config = load(&[("UNINSTALL_TIMEOUT", " "), ("WATCH_NAMESPACE", "")]).unwrap();
    assert_eq!(config, OperatorConfig::default());
}

#[test]
fn test_malformed_values_are_rejected() {
    assert!(load(&[("UNINSTALL_TIMEOUT", "soon")]).is_err());
    assert!(load(&[("WAIT_MIN_SECONDS", "-1")]).is_err());
    assert!(load(&[("API_BURST", "lots")]).is_err());
}

#[test]
fn test_compound_durations() {
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
}
