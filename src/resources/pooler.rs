//! PgBouncer connection pooler resources
//!
//! When `spec.connectionPooling.enabled` is set, a single-replica PgBouncer
//! Deployment sits in front of the primary Service. It is exposed through
//! `<name>-pooler` and configured from `<name>-pooler-config`.
//!
//! Reference: https://www.pgbouncer.org/

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec, Probe,
    Service, ServicePort, ServiceSpec, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::crd::ParadeDB;
use crate::postgres::config::{PGBOUNCER_INI, build_pgbouncer_ini};
use crate::resources::common::{
    CONFIG_HASH_ANNOTATION, FIELD_MANAGER, POSTGRES_PORT, SPEC_HASH_ANNOTATION,
    container_resources, env, object_meta, secret_env, spec_hash,
};
use crate::resources::secret::{PASSWORD_KEY, USERNAME_KEY};

/// Default PgBouncer image
pub const DEFAULT_PGBOUNCER_IMAGE: &str = "bitnami/pgbouncer:latest";

/// Directory the Bitnami image reads a custom pgbouncer.ini from
const PGBOUNCER_CONF_DIR: &str = "/bitnami/pgbouncer/conf";

/// Labels for all pooler resources
pub fn pooler_labels(db: &ParadeDB) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "pgbouncer".to_string()),
        ("app.kubernetes.io/instance".to_string(), db.name_any()),
        ("app.kubernetes.io/component".to_string(), "pooler".to_string()),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
    ])
}

/// Labels used to select the pooler pods
pub fn pooler_selector_labels(db: &ParadeDB) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "pgbouncer".to_string()),
        ("app.kubernetes.io/instance".to_string(), db.name_any()),
    ])
}

/// Generate the `<name>-pooler-config` ConfigMap holding pgbouncer.ini
pub fn generate_pooler_config_map(db: &ParadeDB) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(db, db.pooler_config_map_name(), pooler_labels(db)),
        data: Some(BTreeMap::from([(
            PGBOUNCER_INI.to_string(),
            build_pgbouncer_ini(db),
        )])),
        ..Default::default()
    }
}

fn tcp_probe(initial_delay: i32, period: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(POSTGRES_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        ..Default::default()
    }
}

/// Generate the `<name>-pooler` Deployment
pub fn generate_pooler_deployment(db: &ParadeDB) -> Deployment {
    let pooling = db.spec.connection_pooling.clone().unwrap_or_default();
    let credentials = db.superuser_secret_name();
    let image = if pooling.image.is_empty() {
        DEFAULT_PGBOUNCER_IMAGE.to_string()
    } else {
        pooling.image.clone()
    };

    let container = Container {
        name: "pgbouncer".to_string(),
        image: Some(image),
        ports: Some(vec![ContainerPort {
            container_port: POSTGRES_PORT,
            name: Some("pgbouncer".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(vec![
            env("PGBOUNCER_DATABASE", db.spec.auth.database.clone()),
            env("PGBOUNCER_PORT", POSTGRES_PORT.to_string()),
            env("POSTGRESQL_HOST", db.service_name()),
            secret_env("POSTGRESQL_USERNAME", &credentials, USERNAME_KEY),
            secret_env("POSTGRESQL_PASSWORD", &credentials, PASSWORD_KEY),
            env("PGBOUNCER_POOL_MODE", pooling.pool_mode.to_string()),
            env(
                "PGBOUNCER_MAX_CLIENT_CONN",
                pooling.max_client_connections.to_string(),
            ),
            env(
                "PGBOUNCER_DEFAULT_POOL_SIZE",
                pooling.default_pool_size.to_string(),
            ),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: "config".to_string(),
            mount_path: PGBOUNCER_CONF_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        resources: container_resources(pooling.resources.as_ref()),
        liveness_probe: Some(tcp_probe(10, 10)),
        readiness_probe: Some(tcp_probe(5, 5)),
        ..Default::default()
    };

    let config_hash = spec_hash(&build_pgbouncer_ini(db));
    let template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(pooler_labels(db)),
            annotations: Some(BTreeMap::from([(
                CONFIG_HASH_ANNOTATION.to_string(),
                config_hash,
            )])),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![Volume {
                name: "config".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: db.pooler_config_map_name(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            node_selector: if db.spec.node_selector.is_empty() {
                None
            } else {
                Some(db.spec.node_selector.clone())
            },
            tolerations: db.spec.tolerations.clone(),
            ..Default::default()
        }),
    };

    let mut metadata = object_meta(db, db.pooler_name(), pooler_labels(db));
    metadata.annotations = Some(BTreeMap::from([(
        SPEC_HASH_ANNOTATION.to_string(),
        spec_hash(&template),
    )]));

    Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(pooler_selector_labels(db)),
                ..Default::default()
            },
            template,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the `<name>-pooler` Service
pub fn generate_pooler_service(db: &ParadeDB) -> Service {
    Service {
        metadata: object_meta(db, db.pooler_name(), pooler_labels(db)),
        spec: Some(ServiceSpec {
            selector: Some(pooler_selector_labels(db)),
            ports: Some(vec![ServicePort {
                name: Some("pgbouncer".to_string()),
                port: POSTGRES_PORT,
                target_port: Some(IntOrString::Int(POSTGRES_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
