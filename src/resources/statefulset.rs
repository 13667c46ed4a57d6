//! StatefulSet generation for ParadeDB instances
//!
//! One StatefulSet runs every ParadeDB pod. Each pod carries the database
//! container and, when monitoring is enabled, a postgres_exporter sidecar.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, ExecAction, KeyToPath,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSecurityContext, PodSpec,
    PodTemplateSpec, Probe, SecretVolumeSource, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::core::ObjectMeta;

use crate::controller::error::Result;
use crate::crd::ParadeDB;
use crate::postgres::config::{
    CONFIG_DIR, DATA_DIR, EXPORTER_DIR, INIT_SQL, INITDB_DIR, INITDB_WALDIR, PG_HBA_CONF, PGDATA,
    POSTGRESQL_CONF, QUERIES_YAML, TLS_DIR, WAL_DIR, user_password_env,
};
use crate::resources::common::{
    CONFIG_HASH_ANNOTATION, POSTGRES_PORT, SPEC_HASH_ANNOTATION, container_resources, env,
    object_meta, secret_env, selector_labels, spec_hash, standard_labels, storage_request,
};
use crate::resources::config_map::{config_data, config_hash};
use crate::resources::secret::{PASSWORD_KEY, USERNAME_KEY};

/// Default postgres_exporter image
pub const DEFAULT_EXPORTER_IMAGE: &str = "quay.io/prometheuscommunity/postgres-exporter:latest";

/// Name of the database container
pub const DATABASE_CONTAINER: &str = "paradedb";

/// Name of the exporter sidecar
pub const EXPORTER_CONTAINER: &str = "postgres-exporter";

/// Group id of the postgres user in the ParadeDB image
const POSTGRES_GID: i64 = 999;

fn pg_isready_probe(initial_delay: i32, period: i32, timeout: i32, failure_threshold: i32) -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(vec![
                "pg_isready".to_string(),
                "-U".to_string(),
                "postgres".to_string(),
                "-h".to_string(),
                "127.0.0.1".to_string(),
            ]),
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        timeout_seconds: Some(timeout),
        failure_threshold: Some(failure_threshold),
        ..Default::default()
    }
}

fn database_env(db: &ParadeDB) -> Vec<EnvVar> {
    let credentials = db.superuser_secret_name();
    let mut env_vars = vec![
        secret_env("POSTGRES_USER", &credentials, USERNAME_KEY),
        secret_env("POSTGRES_PASSWORD", &credentials, PASSWORD_KEY),
        env("POSTGRES_DB", db.spec.auth.database.clone()),
        env("PGDATA", PGDATA),
    ];
    if db.spec.storage.wal_storage.is_some() {
        env_vars.push(env("POSTGRES_INITDB_WALDIR", INITDB_WALDIR));
    }
    for (index, user) in db.spec.auth.users.iter().enumerate() {
        env_vars.push(secret_env(
            &user_password_env(index),
            &user.secret_ref.name,
            PASSWORD_KEY,
        ));
    }
    env_vars
}

fn database_container(db: &ParadeDB) -> Container {
    let mut volume_mounts = vec![
        VolumeMount {
            name: "data".to_string(),
            mount_path: DATA_DIR.to_string(),
            ..Default::default()
        },
        VolumeMount {
            name: "config".to_string(),
            mount_path: CONFIG_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        },
        VolumeMount {
            name: "initdb".to_string(),
            mount_path: INITDB_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        },
    ];
    if db.spec.storage.wal_storage.is_some() {
        volume_mounts.push(VolumeMount {
            name: "wal".to_string(),
            mount_path: WAL_DIR.to_string(),
            ..Default::default()
        });
    }
    if db.tls_secret_name().is_some() {
        volume_mounts.push(VolumeMount {
            name: "tls".to_string(),
            mount_path: TLS_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    Container {
        name: DATABASE_CONTAINER.to_string(),
        image: Some(db.spec.image.clone()),
        args: Some(vec![
            "postgres".to_string(),
            "-c".to_string(),
            format!("config_file={}/{}", CONFIG_DIR, POSTGRESQL_CONF),
            "-c".to_string(),
            format!("hba_file={}/{}", CONFIG_DIR, PG_HBA_CONF),
        ]),
        ports: Some(vec![ContainerPort {
            container_port: POSTGRES_PORT,
            name: Some("postgres".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(database_env(db)),
        volume_mounts: Some(volume_mounts),
        resources: container_resources(db.spec.resources.as_ref()),
        liveness_probe: Some(pg_isready_probe(30, 10, 5, 6)),
        readiness_probe: Some(pg_isready_probe(5, 5, 3, 3)),
        security_context: db.spec.container_security_context.clone(),
        ..Default::default()
    }
}

fn exporter_container(db: &ParadeDB, has_custom_queries: bool) -> Container {
    let monitoring = db.spec.monitoring.as_ref();
    let credentials = db.superuser_secret_name();
    let port = db.metrics_port();

    let mut env_vars = vec![
        env(
            "DATA_SOURCE_URI",
            format!("localhost:5432/{}?sslmode=disable", db.spec.auth.database),
        ),
        secret_env("DATA_SOURCE_USER", &credentials, USERNAME_KEY),
        secret_env("DATA_SOURCE_PASS", &credentials, PASSWORD_KEY),
        env("PG_EXPORTER_WEB_LISTEN_ADDRESS", format!(":{}", port)),
    ];
    let mut volume_mounts = Vec::new();
    if has_custom_queries {
        env_vars.push(env(
            "PG_EXPORTER_EXTEND_QUERY_PATH",
            format!("{}/{}", EXPORTER_DIR, QUERIES_YAML),
        ));
        volume_mounts.push(VolumeMount {
            name: "exporter-queries".to_string(),
            mount_path: EXPORTER_DIR.to_string(),
            read_only: Some(true),
            ..Default::default()
        });
    }

    Container {
        name: EXPORTER_CONTAINER.to_string(),
        image: Some(
            monitoring
                .map(|m| m.image.clone())
                .filter(|i| !i.is_empty())
                .unwrap_or_else(|| DEFAULT_EXPORTER_IMAGE.to_string()),
        ),
        ports: Some(vec![ContainerPort {
            container_port: port,
            name: Some("metrics".to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(env_vars),
        volume_mounts: if volume_mounts.is_empty() {
            None
        } else {
            Some(volume_mounts)
        },
        resources: container_resources(monitoring.and_then(|m| m.resources.as_ref())),
        ..Default::default()
    }
}

fn config_volume(name: &str, config_map: &str, keys: &[&str]) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map.to_string(),
            items: Some(
                keys.iter()
                    .map(|key| KeyToPath {
                        key: key.to_string(),
                        path: key.to_string(),
                        mode: None,
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn volume_claim(name: &str, db: &ParadeDB, size: &str, storage_class: Option<String>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(standard_labels(db)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(db.spec.storage.access_modes.clone()),
            storage_class_name: storage_class,
            resources: Some(VolumeResourceRequirements {
                requests: Some(storage_request(size)),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Generate the ParadeDB pod template
pub fn generate_pod_template(db: &ParadeDB) -> Result<PodTemplateSpec> {
    let config_map = db.config_map_name();
    let has_custom_queries = config_data(db)?.contains_key(QUERIES_YAML);

    let mut containers = vec![database_container(db)];
    let mut annotations = BTreeMap::from([(CONFIG_HASH_ANNOTATION.to_string(), config_hash(db)?)]);
    if db.is_monitoring_enabled() {
        containers.push(exporter_container(db, has_custom_queries));
        annotations.insert("prometheus.io/scrape".to_string(), "true".to_string());
        annotations.insert("prometheus.io/port".to_string(), db.metrics_port().to_string());
    }

    let mut volumes = vec![
        config_volume("config", &config_map, &[POSTGRESQL_CONF, PG_HBA_CONF]),
        config_volume("initdb", &config_map, &[INIT_SQL]),
    ];
    if has_custom_queries && db.is_monitoring_enabled() {
        volumes.push(config_volume("exporter-queries", &config_map, &[QUERIES_YAML]));
    }
    if let Some(tls_secret) = db.tls_secret_name() {
        volumes.push(Volume {
            name: "tls".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(tls_secret),
                default_mode: Some(0o640),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    let security_context = db
        .spec
        .pod_security_context
        .clone()
        .unwrap_or_else(|| PodSecurityContext {
            fs_group: Some(POSTGRES_GID),
            ..Default::default()
        });

    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(standard_labels(db)),
            annotations: Some(annotations),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers,
            volumes: Some(volumes),
            node_selector: if db.spec.node_selector.is_empty() {
                None
            } else {
                Some(db.spec.node_selector.clone())
            },
            tolerations: db.spec.tolerations.clone(),
            affinity: db.spec.affinity.clone(),
            security_context: Some(security_context),
            termination_grace_period_seconds: Some(30),
            ..Default::default()
        }),
    })
}

/// Generate the `<name>` StatefulSet
///
/// The StatefulSet metadata carries a hash of the pod template so the syncer
/// can detect template drift without comparing server-defaulted fields.
pub fn generate_statefulset(db: &ParadeDB) -> Result<StatefulSet> {
    let template = generate_pod_template(db)?;

    let mut volume_claim_templates = vec![volume_claim(
        "data",
        db,
        &db.spec.storage.size,
        db.spec.storage.storage_class_name.clone(),
    )];
    if let Some(wal) = &db.spec.storage.wal_storage {
        volume_claim_templates.push(volume_claim(
            "wal",
            db,
            &wal.size,
            wal.storage_class_name
                .clone()
                .or_else(|| db.spec.storage.storage_class_name.clone()),
        ));
    }

    let mut metadata = object_meta(db, db.statefulset_name(), standard_labels(db));
    metadata.annotations = Some(BTreeMap::from([(
        SPEC_HASH_ANNOTATION.to_string(),
        spec_hash(&template),
    )]));

    Ok(StatefulSet {
        metadata,
        spec: Some(StatefulSetSpec {
            service_name: Some(db.headless_service_name()),
            replicas: Some(db.replicas()),
            selector: LabelSelector {
                match_labels: Some(selector_labels(db)),
                ..Default::default()
            },
            template,
            volume_claim_templates: Some(volume_claim_templates),
            ..Default::default()
        }),
        ..Default::default()
    })
}
