//! Operator configuration loaded from the environment

use std::path::PathBuf;
use std::time::Duration;

use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};

use crate::controller::deletion::DeletionWaitPolicy;
use crate::controller::{Error, Result};

pub const DEFAULT_UNINSTALL_TIMEOUT: &str = "30m";
pub const DEFAULT_RECONCILE_TIMEOUT: &str = "10m";
pub const DEFAULT_WAIT_MIN_SECONDS: u64 = 10;
pub const DEFAULT_WAIT_MAX_SECONDS: u64 = 25;
pub const DEFAULT_CHART_PATH: &str = "/tmp/charts/verrazzano-platform-operator/";
pub const DEFAULT_HELM_BINARY: &str = "helm";
pub const DEFAULT_API_QPS: f32 = 100.0;
pub const DEFAULT_API_BURST: u32 = 150;

/// Runtime configuration for both controllers
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Budget for the workload cluster to remove Verrazzano
    pub uninstall_timeout: Duration,
    /// Deadline for a single reconcile pass of either controller
    pub reconcile_timeout: Duration,
    pub wait_min: Duration,
    pub wait_max: Duration,
    /// Directory the platform operator chart is materialised under
    pub chart_path: PathBuf,
    pub helm_binary: String,
    /// Overrides the kube context used on workload clusters
    pub dev_cluster_context: Option<String>,
    /// Restricts both controllers to one namespace
    pub watch_namespace: Option<String>,
    /// Hub kubeconfig; in-cluster configuration when unset
    pub kubeconfig: Option<PathBuf>,
    pub api_qps: f32,
    pub api_burst: u32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            uninstall_timeout: Duration::from_secs(30 * 60),
            reconcile_timeout: Duration::from_secs(10 * 60),
            wait_min: Duration::from_secs(DEFAULT_WAIT_MIN_SECONDS),
            wait_max: Duration::from_secs(DEFAULT_WAIT_MAX_SECONDS),
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
            helm_binary: DEFAULT_HELM_BINARY.to_string(),
            dev_cluster_context: None,
            watch_namespace: None,
            kubeconfig: None,
            api_qps: DEFAULT_API_QPS,
            api_burst: DEFAULT_API_BURST,
        }
    }
}

impl OperatorConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to read variables. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let uninstall_timeout = parse_duration(
            &get("UNINSTALL_TIMEOUT").unwrap_or_else(|| DEFAULT_UNINSTALL_TIMEOUT.to_string()),
        )?;
        let reconcile_timeout = parse_duration(
            &get("RECONCILE_TIMEOUT").unwrap_or_else(|| DEFAULT_RECONCILE_TIMEOUT.to_string()),
        )?;
        if reconcile_timeout.is_zero() {
            return Err(Error::InvalidConfig("RECONCILE_TIMEOUT must be positive".to_string()));
        }
        let wait_min = get("WAIT_MIN_SECONDS")
            .map(|v| parse_number::<u64>("WAIT_MIN_SECONDS", &v))
            .transpose()?
            .map_or(defaults.wait_min, Duration::from_secs);
        let wait_max = get("WAIT_MAX_SECONDS")
            .map(|v| parse_number::<u64>("WAIT_MAX_SECONDS", &v))
            .transpose()?
            .map_or(defaults.wait_max, Duration::from_secs);
        if wait_min > wait_max {
            return Err(Error::InvalidConfig(format!(
                "WAIT_MIN_SECONDS ({}) is greater than WAIT_MAX_SECONDS ({})",
                wait_min.as_secs(),
                wait_max.as_secs()
            )));
        }

        let api_qps = get("API_QPS")
            .map(|v| parse_number::<f32>("API_QPS", &v))
            .transpose()?
            .unwrap_or(defaults.api_qps);
        let api_burst = get("API_BURST")
            .map(|v| parse_number::<u32>("API_BURST", &v))
            .transpose()?
            .unwrap_or(defaults.api_burst);

        Ok(Self {
            uninstall_timeout,
            reconcile_timeout,
            wait_min,
            wait_max,
            chart_path: get("CHART_PATH").map_or(defaults.chart_path, PathBuf::from),
            helm_binary: get("HELM_BINARY").unwrap_or(defaults.helm_binary),
            dev_cluster_context: get("DEV_CLUSTER_CONTEXT"),
            watch_namespace: get("WATCH_NAMESPACE"),
            kubeconfig: get("TEST_KUBECONFIG").or_else(|| get("KUBECONFIG")).map(PathBuf::from),
            api_qps,
            api_burst,
        })
    }

    /// Deletion wait bounds for the binding controller
    pub fn deletion_wait(&self) -> DeletionWaitPolicy {
        DeletionWaitPolicy {
            timeout: self.uninstall_timeout,
            min_wait: self.wait_min,
            max_wait: self.wait_max,
        }
    }

    /// Build the hub cluster client
    pub async fn client(&self) -> Result<Client> {
        let Some(path) = &self.kubeconfig else {
            return Ok(Client::try_default().await?);
        };
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            Error::InvalidConfig(format!("failed to read kubeconfig {}: {e}", path.display()))
        })?;
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                Error::InvalidConfig(format!("invalid kubeconfig {}: {e}", path.display()))
            })?;
        Ok(Client::try_from(config)?)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("{key}={raw}: {e}")))
}

/// Parse a duration such as `30m`, `1h30m` or `45s`.
///
/// Units are `h`, `m`, `s` and `ms`; every number needs a unit.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let invalid = || Error::InvalidConfig(format!("invalid duration: {raw:?}"));
    let mut rest = raw.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(digits);
        let value: u64 = number.parse().map_err(|_| invalid())?;
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let step = match unit {
            "h" => Duration::from_secs(value.checked_mul(3600).ok_or_else(invalid)?),
            "m" => Duration::from_secs(value.checked_mul(60).ok_or_else(invalid)?),
            "s" => Duration::from_secs(value),
            "ms" => Duration::from_millis(value),
            _ => return Err(invalid()),
        };
        total = total.checked_add(step).ok_or_else(invalid)?;
        rest = tail;
    }
    Ok(total)
}
