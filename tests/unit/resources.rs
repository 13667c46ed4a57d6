//! Unit tests for resource generators
//!
//! These check how the generated objects fit together: selectors that must
//! match pod labels, names that must line up between objects, and the
//! settings that flow from the ParadeDB spec into each object.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{CustomResourceExt, ResourceExt};

use paradedb_operator::crd::ParadeDB;
use paradedb_operator::resources::backup::{generate_backup_cronjob, generate_backup_pvc};
use paradedb_operator::resources::certificate::generate_certificate;
use paradedb_operator::resources::config_map::generate_config_map;
use paradedb_operator::resources::pooler::{
    generate_pooler_config_map, generate_pooler_deployment, generate_pooler_service,
};
use paradedb_operator::resources::secret::generate_credentials_secret;
use paradedb_operator::resources::service::{
    generate_headless_service, generate_metrics_service, generate_service,
};
use paradedb_operator::resources::service_monitor::generate_service_monitor;
use paradedb_operator::resources::statefulset::{DATABASE_CONTAINER, generate_statefulset};

use crate::common::*;

fn statefulset(db: &ParadeDB) -> StatefulSet {
    generate_statefulset(db).unwrap()
}

fn pod_labels(sts: &StatefulSet) -> BTreeMap<String, String> {
    sts.spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.labels.clone())
        .unwrap()
}

fn selects(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

mod naming_tests {
    use super::*;

    #[test]
    fn test_object_names_follow_instance_name() {
        let db = ParadeDBBuilder::new("search", TEST_NAMESPACE)
            .with_connection_pooling()
            .with_service_monitor()
            .with_pvc_backup()
            .with_cert_manager("letsencrypt")
            .build();

        assert_eq!(generate_service(&db).name_any(), "search");
        assert_eq!(generate_headless_service(&db).name_any(), "search-headless");
        assert_eq!(generate_metrics_service(&db).name_any(), "search-metrics");
        assert_eq!(generate_config_map(&db).unwrap().name_any(), "search-config");
        assert_eq!(generate_credentials_secret(&db).name_any(), "search-credentials");
        assert_eq!(statefulset(&db).name_any(), "search");
        assert_eq!(generate_pooler_deployment(&db).name_any(), "search-pooler");
        assert_eq!(generate_pooler_service(&db).name_any(), "search-pooler");
        assert_eq!(
            generate_pooler_config_map(&db).name_any(),
            "search-pooler-config"
        );
        assert_eq!(
            generate_service_monitor(&db).unwrap().name_any(),
            "search-metrics"
        );
        assert_eq!(generate_backup_cronjob(&db).unwrap().name_any(), "search-backup");
        assert_eq!(generate_backup_pvc(&db).unwrap().name_any(), "search-backup");
        assert_eq!(
            generate_certificate(&db, "svc.cluster.local")
                .unwrap()
                .name_any(),
            "search-tls"
        );
    }

    #[test]
    fn test_generated_objects_live_in_instance_namespace() {
        let db = create_test_instance(TEST_NAME, "analytics", 1);

        assert_eq!(generate_service(&db).namespace().as_deref(), Some("analytics"));
        assert_eq!(statefulset(&db).namespace().as_deref(), Some("analytics"));
        assert_eq!(
            generate_config_map(&db).unwrap().namespace().as_deref(),
            Some("analytics")
        );
    }

    #[test]
    fn test_owner_references_are_left_to_the_syncer() {
        let db = create_test_instance(TEST_NAME, TEST_NAMESPACE, 1);
        assert!(generate_service(&db).owner_references().is_empty());
        assert!(statefulset(&db).owner_references().is_empty());
    }
}

mod wiring_tests {
    use super::*;

    #[test]
    fn test_services_select_database_pods() {
        let db = create_test_instance(TEST_NAME, TEST_NAMESPACE, 3);
        let labels = pod_labels(&statefulset(&db));

        for svc in [
            generate_service(&db),
            generate_headless_service(&db),
            generate_metrics_service(&db),
        ] {
            let selector = svc.spec.unwrap().selector.unwrap();
            assert!(selects(&selector, &labels), "{:?} vs {:?}", selector, labels);
        }
    }

    #[test]
    fn test_statefulset_is_governed_by_headless_service() {
        let db = create_test_instance(TEST_NAME, TEST_NAMESPACE, 3);
        let sts = statefulset(&db);
        let spec = sts.spec.unwrap();

        assert_eq!(spec.service_name.as_deref(), Some("my-db-headless"));
        assert_eq!(spec.replicas, Some(3));
        let selector = spec.selector.match_labels.unwrap();
        assert!(selects(&selector, &spec.template.metadata.unwrap().labels.unwrap()));
    }

    #[test]
    fn test_pooler_service_selects_only_pooler_pods() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_connection_pooling()
            .build();
        let deployment = generate_pooler_deployment(&db);
        let pooler_pods = deployment
            .spec
            .unwrap()
            .template
            .metadata
            .unwrap()
            .labels
            .unwrap();
        let selector = generate_pooler_service(&db).spec.unwrap().selector.unwrap();

        assert!(selects(&selector, &pooler_pods));
        assert!(!selects(&selector, &pod_labels(&statefulset(&db))));
    }

    #[test]
    fn test_pooler_targets_primary_service() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_connection_pooling()
            .build();
        let deployment = generate_pooler_deployment(&db);
        let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
        let host = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .find(|e| e.name == "POSTGRESQL_HOST")
            .and_then(|e| e.value.clone());

        assert_eq!(host.as_deref(), Some("my-db"));
    }

    #[test]
    fn test_service_monitor_selects_metrics_service() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_service_monitor()
            .build();
        let monitor = generate_service_monitor(&db).unwrap();
        let metrics = generate_metrics_service(&db);

        let selector = monitor.spec.selector.match_labels.clone().unwrap();
        assert!(selects(&selector, metrics.labels()));
        assert_eq!(monitor.labels().get("release").map(String::as_str), Some("prometheus"));
        assert_eq!(monitor.spec.endpoints[0].port, "metrics");
    }

    #[test]
    fn test_certificate_covers_status_endpoint_host() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_cert_manager("letsencrypt")
            .with_connection_pooling()
            .build();
        let cert = generate_certificate(&db, "svc.cluster.local").unwrap();

        for host in [
            "my-db.prod.svc.cluster.local",
            "my-db-pooler.prod.svc.cluster.local",
            "*.my-db-headless.prod.svc.cluster.local",
        ] {
            assert!(cert.spec.dns_names.iter().any(|n| n == host), "missing {}", host);
        }
    }

    #[test]
    fn test_tls_secret_reference_is_mounted() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_tls_secret("db-tls")
            .build();
        let sts = statefulset(&db);
        let volumes = sts.spec.unwrap().template.spec.unwrap().volumes.unwrap();
        let tls = volumes.iter().find(|v| v.name == "tls").unwrap();

        assert_eq!(
            tls.secret.as_ref().and_then(|s| s.secret_name.as_deref()),
            Some("db-tls")
        );
        assert!(generate_certificate(&db, "svc.cluster.local").is_none());
    }
}

mod spec_tests {
    use super::*;

    #[test]
    fn test_service_type_follows_spec() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_service_type("NodePort")
            .build();
        let spec = generate_service(&db).spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));

        let headless = generate_headless_service(&db).spec.unwrap();
        assert_eq!(headless.cluster_ip.as_deref(), Some("None"));
        assert_eq!(headless.type_, None);
    }

    #[test]
    fn test_database_container_uses_spec_image() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_image("paradedb/paradedb:0.20.0")
            .build();
        let sts = statefulset(&db);
        let containers = sts.spec.unwrap().template.spec.unwrap().containers;
        let database = containers
            .iter()
            .find(|c| c.name == DATABASE_CONTAINER)
            .unwrap();

        assert_eq!(database.image.as_deref(), Some("paradedb/paradedb:0.20.0"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_connection_pooling()
            .with_pvc_backup()
            .build();

        assert_eq!(statefulset(&db), statefulset(&db));
        assert_eq!(generate_config_map(&db).unwrap(), generate_config_map(&db).unwrap());
        assert_eq!(generate_pooler_deployment(&db), generate_pooler_deployment(&db));
        assert_eq!(generate_backup_cronjob(&db), generate_backup_cronjob(&db));
    }

    #[test]
    fn test_disabled_tiers_generate_nothing() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .without_monitoring()
            .build();

        assert!(generate_service_monitor(&db).is_none());
        assert!(generate_backup_cronjob(&db).is_none());
        assert!(generate_backup_pvc(&db).is_none());
        assert!(generate_certificate(&db, "svc.cluster.local").is_none());
    }
}

mod crd_tests {
    use super::*;

    #[test]
    fn test_crd_identity() {
        let crd = ParadeDB::crd();

        assert_eq!(crd.name_any(), "paradedbs.database.paradedb.io");
        assert_eq!(crd.spec.group, "database.paradedb.io");
        assert_eq!(crd.spec.names.kind, "ParadeDB");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.short_names, Some(vec!["pdb".to_string()]));
    }

    #[test]
    fn test_crd_has_status_subresource() {
        let crd = ParadeDB::crd();
        let version = &crd.spec.versions[0];

        assert_eq!(version.name, "v1alpha1");
        assert!(version
            .subresources
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_some());
    }
}
