use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use verrazzano_fleet_operator::health::{HealthState, run_health_server};
use verrazzano_fleet_operator::{Context, OperatorConfig};
use verrazzano_fleet_operator::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, run_webhook_server};
use verrazzano_fleet_operator::{run_binding_controller, run_fleet_controller};

const LEASE_NAME: &str = "verrazzano-fleet-operator-leader";
const LEASE_TTL: Duration = Duration::from_secs(15);
const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(5);

/// Time given to in-flight passes after a shutdown signal
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A second install attempt fails; only an absent provider is fatal
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("verrazzano_fleet_operator=info".parse()?)
                .add_directive("kube=info".parse()?)
                .add_directive("kube_leader_election=info".parse()?),
        )
        .init();

    info!("Starting verrazzano-fleet-operator");

    let config = OperatorConfig::from_env()?;
    info!(
        uninstall_timeout = ?config.uninstall_timeout,
        wait_min = ?config.wait_min,
        wait_max = ?config.wait_max,
        chart_path = %config.chart_path.display(),
        watch_namespace = ?config.watch_namespace,
        api_qps = config.api_qps,
        api_burst = config.api_burst,
        "Loaded operator configuration"
    );

    let client = config.client().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());

    // Probes and admission are served whether or not this replica leads
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };
    let webhook_handle = spawn_webhook_server(&client);

    let lease = LeaseIdentity::from_env();
    info!(
        holder_id = %lease.holder_id,
        namespace = %lease.namespace,
        lease_name = LEASE_NAME,
        "Initializing leader election"
    );
    acquire_leadership(&lease.lock(&client)).await;
    let lease_renewal_handle = spawn_lease_renewal(lease.lock(&client));

    let ctx = Arc::new(
        Context::builder(client.clone(), config)
            .health(Some(health_state.clone()))
            .build(),
    );
    health_state.set_ready(true).await;

    let fleet_controller_handle = tokio::spawn(run_fleet_controller(client.clone(), ctx.clone()));
    let binding_controller_handle = tokio::spawn(run_binding_controller(client, ctx));

    let webhook_future = async {
        match webhook_handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!("Webhook server task panicked: {}", e);
                }
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = fleet_controller_handle => {
            if let Err(e) = result {
                error!("Fleet controller task panicked: {}", e);
            }
        }
        result = binding_controller_handle => {
            if let Err(e) = result {
                error!("Binding controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = webhook_future => {}
        // Renewal only returns by panicking; losing the lease exits the process
        Err(e) = lease_renewal_handle => {
            error!("Lease renewal task panicked: {}", e);
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");
            health_state.set_ready(false).await;
            info!(
                "Waiting {}s for in-flight reconciliations to complete...",
                SHUTDOWN_GRACE_PERIOD.as_secs()
            );
            tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Who holds the lease and where it lives
struct LeaseIdentity {
    holder_id: String,
    namespace: String,
}

impl LeaseIdentity {
    fn from_env() -> Self {
        let holder_id = std::env::var("POD_NAME").unwrap_or_else(|_| {
            warn!("POD_NAME not set, using hostname");
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        });
        let namespace = std::env::var("POD_NAMESPACE").unwrap_or_else(|_| {
            warn!("POD_NAMESPACE not set, using 'default'");
            "default".to_string()
        });
        Self {
            holder_id,
            namespace,
        }
    }

    fn lock(&self, client: &Client) -> LeaseLock {
        LeaseLock::new(
            client.clone(),
            &self.namespace,
            LeaseLockParams {
                holder_id: self.holder_id.clone(),
                lease_name: LEASE_NAME.to_string(),
                lease_ttl: LEASE_TTL,
            },
        )
    }
}

/// Block until this replica holds the lease
async fn acquire_leadership(lock: &LeaseLock) {
    info!("Waiting to acquire leadership...");
    loop {
        match lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {
                info!("Acquired leadership");
                return;
            }
            Ok(_) => info!("Another instance is leader, waiting..."),
            Err(e) => warn!("Failed to acquire lease: {}, retrying...", e),
        }
        tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
    }
}

/// Keep the lease renewed; exit on loss so the pod restarts into the election
fn spawn_lease_renewal(lock: LeaseLock) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
            match lock.try_acquire_or_renew().await {
                Ok(result) if result.acquired_lease => {}
                Ok(_) => {
                    error!("Lost leadership! Shutting down...");
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Failed to renew lease: {}. Shutting down...", e);
                    std::process::exit(1);
                }
            }
        }
    })
}

/// Start the admission server when its serving certificate is mounted
fn spawn_webhook_server(client: &Client) -> Option<JoinHandle<()>> {
    if !(Path::new(WEBHOOK_CERT_PATH).exists() && Path::new(WEBHOOK_KEY_PATH).exists()) {
        info!(
            "TLS certificates not found at {} and {}, webhook server disabled",
            WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH
        );
        return None;
    }

    info!("TLS certificates found, starting webhook server");
    let client = client.clone();
    Some(tokio::spawn(async move {
        if let Err(e) = run_webhook_server(client, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH).await {
            error!("Webhook server error: {}", e);
        }
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
