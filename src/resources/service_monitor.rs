//! Prometheus Operator ServiceMonitor generation

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::crd::ParadeDB;
use crate::resources::common::object_meta;
use crate::resources::service::metrics_labels;

/// Subset of the monitoring.coreos.com ServiceMonitor spec
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "monitoring.coreos.com",
    version = "v1",
    kind = "ServiceMonitor",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    pub selector: LabelSelector,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Generate the `<name>-metrics` ServiceMonitor selecting the metrics Service
///
/// Returns None unless monitoring and its ServiceMonitor are both enabled.
pub fn generate_service_monitor(db: &ParadeDB) -> Option<ServiceMonitor> {
    if !db.is_service_monitor_enabled() {
        return None;
    }
    let settings = db.spec.monitoring.as_ref()?.service_monitor.as_ref()?;

    let mut labels = metrics_labels(db);
    labels.extend(settings.labels.clone());

    let selector_labels: BTreeMap<String, String> = metrics_labels(db)
        .into_iter()
        .filter(|(k, _)| k != "app.kubernetes.io/version")
        .collect();

    let spec = ServiceMonitorSpec {
        selector: LabelSelector {
            match_labels: Some(selector_labels),
            ..Default::default()
        },
        endpoints: vec![Endpoint {
            port: "metrics".to_string(),
            interval: Some(settings.interval.clone()),
            path: Some("/metrics".to_string()),
        }],
    };

    let mut monitor = ServiceMonitor::new(&db.metrics_service_name(), spec);
    monitor.metadata = object_meta(db, db.metrics_service_name(), labels);
    Some(monitor)
}
