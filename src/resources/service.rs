//! Service generation for ParadeDB instances
//!
//! Three Services front the database pods:
//! - `<name>`: the client endpoint, typed by `spec.serviceType`
//! - `<name>-headless`: the StatefulSet governing service
//! - `<name>-metrics`: the exporter endpoint scraped by Prometheus

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::ParadeDB;
use crate::resources::common::{POSTGRES_PORT, object_meta, selector_labels, standard_labels};

fn postgres_port() -> ServicePort {
    ServicePort {
        name: Some("postgres".to_string()),
        port: POSTGRES_PORT,
        target_port: Some(IntOrString::Int(POSTGRES_PORT)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

/// Generate the primary Service `<name>`
pub fn generate_service(db: &ParadeDB) -> Service {
    Service {
        metadata: object_meta(db, db.service_name(), standard_labels(db)),
        spec: Some(ServiceSpec {
            type_: Some(db.spec.service_type.to_string()),
            selector: Some(selector_labels(db)),
            ports: Some(vec![postgres_port()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the headless Service `<name>-headless`
///
/// Publishes not-ready addresses so that pods can resolve each other while
/// they are still starting.
pub fn generate_headless_service(db: &ParadeDB) -> Service {
    Service {
        metadata: object_meta(db, db.headless_service_name(), standard_labels(db)),
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(selector_labels(db)),
            ports: Some(vec![postgres_port()]),
            publish_not_ready_addresses: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Labels of the metrics Service, matched by the ServiceMonitor
pub fn metrics_labels(db: &ParadeDB) -> BTreeMap<String, String> {
    let mut labels = standard_labels(db);
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "metrics".to_string(),
    );
    labels
}

/// Generate the metrics Service `<name>-metrics`
pub fn generate_metrics_service(db: &ParadeDB) -> Service {
    let port = db.metrics_port();
    let mut metadata = object_meta(db, db.metrics_service_name(), metrics_labels(db));
    metadata.annotations = Some(BTreeMap::from([
        ("prometheus.io/scrape".to_string(), "true".to_string()),
        ("prometheus.io/port".to_string(), port.to_string()),
    ]));

    Service {
        metadata,
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(db)),
            ports: Some(vec![ServicePort {
                name: Some("metrics".to_string()),
                port,
                target_port: Some(IntOrString::String("metrics".to_string())),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
