//! Health server for Kubernetes probes and Prometheus metrics
//!
//! Provides HTTP endpoints for:
//! - `/healthz` - Liveness probe (is the process alive?)
//! - `/readyz` - Readiness probe (is the operator ready to serve?)
//! - `/metrics` - Prometheus metrics

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::crd::ParadeDBPhase;

/// Labels for metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReconcileLabels {
    pub namespace: String,
    pub name: String,
}

impl prometheus_client::encoding::EncodeLabelSet for ReconcileLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-instance metrics that also carry a value such as a phase
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct InstanceLabels {
    pub namespace: String,
    pub name: String,
    pub value: String,
}

impl prometheus_client::encoding::EncodeLabelSet for InstanceLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        ("value", self.value.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics state
pub struct Metrics {
    /// Total reconciliations counter
    pub reconciliations_total: Family<ReconcileLabels, Counter>,
    /// Failed reconciliations counter, labelled by error kind
    pub reconciliation_errors_total: Family<InstanceLabels, Counter>,
    /// Reconciliation duration histogram
    pub reconcile_duration_seconds: Family<ReconcileLabels, Histogram>,

    /// 1 for the current phase of each instance, 0 for the others
    pub instance_phase: Family<InstanceLabels, Gauge>,
    /// Desired replicas per instance
    pub replicas_desired: Family<ReconcileLabels, Gauge>,
    /// Ready replicas per instance
    pub replicas_ready: Family<ReconcileLabels, Gauge>,

    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn labels(namespace: &str, name: &str) -> ReconcileLabels {
    ReconcileLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn instance_labels(namespace: &str, name: &str, value: &str) -> InstanceLabels {
    InstanceLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
        value: value.to_string(),
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reconciliations_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "paradedb_operator_reconciliations",
            "Total number of reconciliations",
            reconciliations_total.clone(),
        );

        let reconciliation_errors_total = Family::<InstanceLabels, Counter>::default();
        registry.register(
            "paradedb_operator_reconciliation_errors",
            "Total number of reconciliation errors by error kind",
            reconciliation_errors_total.clone(),
        );

        let reconcile_duration_seconds =
            Family::<ReconcileLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "paradedb_operator_reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
            reconcile_duration_seconds.clone(),
        );

        let instance_phase = Family::<InstanceLabels, Gauge>::default();
        registry.register(
            "paradedb_operator_instance_phase",
            "Current lifecycle phase of each ParadeDB instance",
            instance_phase.clone(),
        );

        let replicas_desired = Family::<ReconcileLabels, Gauge>::default();
        registry.register(
            "paradedb_operator_replicas_desired",
            "Desired number of replicas for each instance",
            replicas_desired.clone(),
        );

        let replicas_ready = Family::<ReconcileLabels, Gauge>::default();
        registry.register(
            "paradedb_operator_replicas_ready",
            "Number of ready replicas for each instance",
            replicas_ready.clone(),
        );

        Self {
            reconciliations_total,
            reconciliation_errors_total,
            reconcile_duration_seconds,
            instance_phase,
            replicas_desired,
            replicas_ready,
            registry,
        }
    }

    /// Record a successful reconciliation
    pub fn record_reconcile(&self, namespace: &str, name: &str, duration_secs: f64) {
        let labels = labels(namespace, name);
        self.reconciliations_total.get_or_create(&labels).inc();
        self.reconcile_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a failed reconciliation
    pub fn record_error(&self, namespace: &str, name: &str, kind: &str) {
        self.reconciliation_errors_total
            .get_or_create(&instance_labels(namespace, name, kind))
            .inc();
    }

    /// Mark `phase` as the current phase of an instance
    pub fn set_phase(&self, namespace: &str, name: &str, phase: ParadeDBPhase) {
        for candidate in ParadeDBPhase::ALL {
            let value = i64::from(candidate == phase);
            self.instance_phase
                .get_or_create(&instance_labels(namespace, name, &candidate.to_string()))
                .set(value);
        }
    }

    /// Update replica metrics of an instance
    pub fn set_replicas(&self, namespace: &str, name: &str, desired: i64, ready: i64) {
        let labels = labels(namespace, name);
        self.replicas_desired.get_or_create(&labels).set(desired);
        self.replicas_ready.get_or_create(&labels).set(ready);
    }

    /// Encode metrics to Prometheus text format
    ///
    /// Returns an empty string if encoding fails (should never happen with valid metrics).
    fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the operator is ready (connected to K8s API)
    pub ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the operator as ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the operator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
/// This is a simple check - if we can respond, we're alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK if the operator is ready to serve.
/// Returns 503 Service Unavailable if not ready.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
///
/// Returns Prometheus-formatted metrics.
async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0:`port` and serves health/metrics endpoints.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on {}", addr);

    axum::serve(listener, app).await
}
