pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod postgres;
pub mod resources;

pub use config::{ConfigError, OperatorConfig};
pub use controller::{Context, Error, FINALIZER, Result, error_policy, reconcile};
pub use crd::{ParadeDB, ParadeDBPhase, ParadeDBSpec, ParadeDBStatus};
pub use health::{HealthState, Metrics};

use std::sync::Arc;

use controller::KubeResourceClient;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Secret, Service};
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Run the ParadeDB controller.
///
/// Watches ParadeDB resources, cluster-wide or in `config.watch_namespace`,
/// together with the built-in kinds the reconciler creates, so that changes to
/// owned objects trigger a reconciliation of their owner. Certificates and
/// ServiceMonitors are not watched, so their CRDs are optional; the periodic
/// requeue converges them.
///
/// If health_state is provided, metrics will be recorded for reconciliations.
pub async fn run_controller(client: Client, config: OperatorConfig, health_state: Option<Arc<HealthState>>) {
    let namespace = config.watch_namespace.clone();
    let namespace = namespace.as_deref();
    tracing::info!(
        "Starting controller for ParadeDB resources (scope: {})",
        namespace.unwrap_or("cluster-wide")
    );

    // Mark as ready once we start the controller
    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(Context::new(client.clone(), config, health_state));

    let instances: Api<ParadeDB> = scoped_api(client.clone(), namespace);
    let statefulsets: Api<StatefulSet> = scoped_api(client.clone(), namespace);
    let services: Api<Service> = scoped_api(client.clone(), namespace);
    let configmaps: Api<ConfigMap> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client.clone(), namespace);
    let deployments: Api<Deployment> = scoped_api(client.clone(), namespace);
    let cronjobs: Api<CronJob> = scoped_api(client.clone(), namespace);
    let volumes: Api<PersistentVolumeClaim> = scoped_api(client.clone(), namespace);

    // Use any_semantic() for more reliable resource discovery
    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(instances, watcher_config.clone())
        .owns(statefulsets, watcher_config.clone())
        .owns(services, watcher_config.clone())
        .owns(configmaps, watcher_config.clone())
        .owns(secrets, watcher_config.clone())
        .owns(deployments, watcher_config.clone())
        .owns(cronjobs, watcher_config.clone())
        .owns(volumes, watcher_config)
        .run(
            reconcile::<KubeResourceClient>,
            error_policy::<KubeResourceClient>,
            ctx,
        )
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // Expected after deletion when related watch events arrive
                    let is_not_found = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) if err.is_not_found()
                    );
                    if is_not_found {
                        tracing::debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        tracing::warn!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    // This should never complete in normal operation
    tracing::error!("Controller stream ended unexpectedly");
}
