use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kube::Client;

use super::error::{BackoffConfig, Error, ErrorContext};
use super::registry::{KubeRegistry, Registry};
use super::state_machine::BindingStateMachine;
use crate::config::OperatorConfig;
use crate::health::HealthState;
use crate::release::{
    ChartProvider, ConfigMapChartProvider, HelmCli, Installer, ReleaseAction, ReleaseEngine,
};
use crate::remote::{
    AdminVersionReader, CredentialProvider, KubeAdminVersionReader, KubeRemoteConnector,
    RemoteConnector, SecretCredentialProvider,
};

/// Shared context for the fleet and binding controllers
///
/// Every collaborator that reaches outside the process is injected here so
/// the reconcilers can be driven by fakes.
#[derive(Clone)]
pub struct Context {
    pub registry: Arc<dyn Registry>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub remote: Arc<dyn RemoteConnector>,
    pub charts: Arc<dyn ChartProvider>,
    pub releases: ReleaseEngine,
    pub config: OperatorConfig,
    pub backoff: BackoffConfig,
    pub state_machine: Arc<BindingStateMachine>,
    pub health: Option<Arc<HealthState>>,
    errors: Arc<Mutex<HashMap<String, ErrorContext>>>,
}

impl Context {
    pub fn builder(client: Client, config: OperatorConfig) -> ContextBuilder {
        ContextBuilder {
            client,
            config,
            registry: None,
            credentials: None,
            remote: None,
            charts: None,
            installer: None,
            admin: None,
            health: None,
        }
    }

    /// Record a failed pass for `key` and return the number of consecutive failures
    pub fn record_error(&self, key: &str, error: &Error) -> u32 {
        let Ok(mut errors) = self.errors.lock() else {
            return 0;
        };
        let entry = errors.entry(key.to_string()).or_default();
        entry.record_error(error);
        entry.consecutive_errors
    }

    /// Forget earlier failures for `key`
    pub fn reset_errors(&self, key: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.remove(key);
        }
    }

    pub fn record_reconcile(&self, kind: &str, namespace: &str, name: &str, duration_secs: f64) {
        if let Some(health) = &self.health {
            health
                .metrics
                .record_reconcile(kind, namespace, name, duration_secs);
        }
    }

    pub fn record_failure(&self, kind: &str, namespace: &str, name: &str) {
        if let Some(health) = &self.health {
            health.metrics.record_error(kind, namespace, name);
        }
    }

    pub fn record_release(&self, action: ReleaseAction) {
        if let Some(health) = &self.health {
            health.metrics.record_release(action.as_str());
        }
    }

    /// Context wired entirely from the given collaborators
    #[cfg(test)]
    #[allow(clippy::too_many_arguments)]
    pub fn for_testing(
        registry: Arc<dyn Registry>,
        credentials: Arc<dyn CredentialProvider>,
        remote: Arc<dyn RemoteConnector>,
        charts: Arc<dyn ChartProvider>,
        installer: Arc<dyn Installer>,
        admin: Arc<dyn AdminVersionReader>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            registry,
            credentials,
            remote,
            charts,
            releases: ReleaseEngine::new(installer, admin),
            config,
            backoff: BackoffConfig::default(),
            state_machine: Arc::new(BindingStateMachine::new()),
            health: None,
            errors: Arc::default(),
        }
    }
}

/// Builds a [`Context`], defaulting every collaborator to its hub-backed implementation
pub struct ContextBuilder {
    client: Client,
    config: OperatorConfig,
    registry: Option<Arc<dyn Registry>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    remote: Option<Arc<dyn RemoteConnector>>,
    charts: Option<Arc<dyn ChartProvider>>,
    installer: Option<Arc<dyn Installer>>,
    admin: Option<Arc<dyn AdminVersionReader>>,
    health: Option<Arc<HealthState>>,
}

impl ContextBuilder {
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteConnector>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn charts(mut self, charts: Arc<dyn ChartProvider>) -> Self {
        self.charts = Some(charts);
        self
    }

    pub fn installer(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn admin(mut self, admin: Arc<dyn AdminVersionReader>) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn health(mut self, health: Option<Arc<HealthState>>) -> Self {
        self.health = health;
        self
    }

    pub fn build(self) -> Context {
        let client = self.client;
        let config = self.config;
        let installer = self
            .installer
            .unwrap_or_else(|| Arc::new(HelmCli::new(config.helm_binary.clone())));
        let admin = self
            .admin
            .unwrap_or_else(|| Arc::new(KubeAdminVersionReader::new(client.clone())));

        Context {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(KubeRegistry::new(client.clone()))),
            credentials: self.credentials.unwrap_or_else(|| {
                Arc::new(SecretCredentialProvider::new(
                    client.clone(),
                    config.dev_cluster_context.clone(),
                ))
            }),
            remote: self.remote.unwrap_or_else(|| Arc::new(KubeRemoteConnector)),
            charts: self.charts.unwrap_or_else(|| {
                Arc::new(ConfigMapChartProvider::new(
                    client.clone(),
                    config.chart_path.clone(),
                ))
            }),
            releases: ReleaseEngine::new(installer, admin),
            config,
            backoff: BackoffConfig::default(),
            state_machine: Arc::new(BindingStateMachine::new()),
            health: self.health,
            errors: Arc::default(),
        }
    }
}
