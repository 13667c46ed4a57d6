use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};

use paradedb_operator::health::{HealthState, run_health_server};
use paradedb_operator::{OperatorConfig, run_controller};

/// Grace period for in-flight reconciliations to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    init_tracing()?;

    info!("Starting paradedb-operator");

    let mut config = OperatorConfig::from_env()?;
    if config.reporter_instance.is_none() {
        warn!("POD_NAME not set, using hostname");
        config.reporter_instance = Some(
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
        );
    }
    info!(
        namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        cluster_domain = %config.cluster_domain,
        reconcile_timeout = ?config.reconcile_timeout,
        "Loaded configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());

    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    info!("Watching ParadeDB resources (apiVersion: database.paradedb.io/v1alpha1)");

    let controller_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            run_controller(client, config, Some(health_state)).await;
        })
    };

    tokio::select! {
        result = controller_handle => {
            if let Err(e) = result {
                error!("Controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new work
            health_state.set_ready(false).await;

            info!(
                "Waiting {}s for in-flight reconciliations to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Initialise the global subscriber; `LOG_FORMAT=json` selects JSON lines
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("paradedb_operator=info".parse()?)
        .add_directive("kube=info".parse()?);

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
