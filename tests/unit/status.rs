//! Unit tests for status management

use paradedb_operator::controller::status::{
    ConditionBuilder, Observed, aggregate, condition_status, condition_types, failed,
    find_condition, with_phase,
};
use paradedb_operator::crd::{ParadeDB, ParadeDBPhase, ParadeDBStatus};

use crate::common::*;

const DOMAIN: &str = "svc.cluster.local";

fn instance_with_status(replicas: i32, status: Option<ParadeDBStatus>) -> ParadeDB {
    let mut db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
        .with_replicas(replicas)
        .with_generation(3)
        .build();
    db.status = status;
    db
}

fn ready(n: i32) -> Observed {
    Observed {
        ready_replicas: Some(n),
        ..Default::default()
    }
}

mod condition_builder_tests {
    use super::*;

    #[test]
    fn test_conditions_keep_insertion_order() {
        let conditions = ConditionBuilder::new(Some(1))
            .ready(false, "ReplicasNotReady", "0/1")
            .progressing(true, "Creating", "0/1")
            .degraded(false, "ReconciliationSucceeded", "ok")
            .build();

        let types: Vec<&str> = conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(
            types,
            vec![
                condition_types::READY,
                condition_types::PROGRESSING,
                condition_types::DEGRADED
            ]
        );
    }

    #[test]
    fn test_setting_twice_updates_in_place() {
        let conditions = ConditionBuilder::new(Some(1))
            .ready(false, "ReplicasNotReady", "0/1")
            .ready(true, "AllReplicasReady", "1/1")
            .build();

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, condition_status::TRUE);
        assert_eq!(conditions[0].reason, "AllReplicasReady");
    }

    #[test]
    fn test_generation_is_refreshed_on_existing_conditions() {
        let existing = ConditionBuilder::new(Some(1))
            .ready(true, "AllReplicasReady", "1/1")
            .build();

        let conditions = ConditionBuilder::from_existing(existing, Some(4))
            .ready(true, "AllReplicasReady", "1/1")
            .build();

        assert_eq!(conditions[0].observed_generation, Some(4));
    }

    #[test]
    fn test_unknown_status_is_accepted() {
        let conditions = ConditionBuilder::new(None)
            .set_condition(
                condition_types::READY,
                condition_status::UNKNOWN,
                "Probing",
                "waiting for first probe",
            )
            .build();

        assert_eq!(conditions[0].status, "Unknown");
        assert_eq!(conditions[0].observed_generation, None);
    }
}

mod phase_tests {
    use super::*;

    #[test]
    fn test_with_phase_keeps_other_fields() {
        let previous = ParadeDBStatus {
            phase: Some(ParadeDBPhase::Running),
            ready_replicas: 2,
            endpoint: Some("my-db.prod.svc.cluster.local:5432".to_string()),
            last_backup: Some("2026-10-01T02:00:00Z".to_string()),
            ..Default::default()
        };
        let db = instance_with_status(2, Some(previous.clone()));

        let status = with_phase(&db, ParadeDBPhase::Deleting);

        assert_eq!(status.phase, Some(ParadeDBPhase::Deleting));
        assert_eq!(status.ready_replicas, 2);
        assert_eq!(status.endpoint, previous.endpoint);
        assert_eq!(status.last_backup, previous.last_backup);
    }

    #[test]
    fn test_with_phase_on_fresh_instance() {
        let db = instance_with_status(1, None);
        let status = with_phase(&db, ParadeDBPhase::Pending);

        assert_eq!(status.phase, Some(ParadeDBPhase::Pending));
        assert!(status.conditions.is_empty());
        assert_eq!(status.endpoint, None);
    }
}

mod failure_tests {
    use super::*;

    #[test]
    fn test_failed_preserves_observations() {
        let running = aggregate(&instance_with_status(2, None), ready(2), DOMAIN);
        let db = instance_with_status(2, Some(running.clone()));

        let status = failed(&db, "secret \"custom-creds\" not found");

        assert_eq!(status.phase, Some(ParadeDBPhase::Failed));
        assert_eq!(status.ready_replicas, 2);
        assert_eq!(status.endpoint, running.endpoint);
        assert_eq!(status.observed_generation, Some(3));
        // Ready is left as last observed
        let ready = find_condition(&status, condition_types::READY).unwrap();
        assert_eq!(ready.status, condition_status::TRUE);
        let degraded = find_condition(&status, condition_types::DEGRADED).unwrap();
        assert_eq!(degraded.status, condition_status::TRUE);
        assert_eq!(degraded.reason, "ReconciliationFailed");
    }

    #[test]
    fn test_repeated_failure_is_stable() {
        let db = instance_with_status(1, None);
        let first = failed(&db, "boom");
        let db = instance_with_status(1, Some(first.clone()));

        let second = failed(&db, "boom");

        assert_eq!(first, second);
    }

    #[test]
    fn test_success_after_failure_clears_degraded() {
        let db = instance_with_status(1, None);
        let db = instance_with_status(1, Some(failed(&db, "boom")));

        let status = aggregate(&db, ready(1), DOMAIN);

        assert_eq!(status.phase, Some(ParadeDBPhase::Running));
        assert_eq!(status.message.as_deref(), Some("All 1 replicas ready"));
        let degraded = find_condition(&status, condition_types::DEGRADED).unwrap();
        assert_eq!(degraded.status, condition_status::FALSE);
        assert_eq!(degraded.reason, "ReconciliationSucceeded");
    }
}

mod aggregate_tests {
    use super::*;

    #[test]
    fn test_no_statefulset_status_means_creating() {
        let status = aggregate(&instance_with_status(3, None), Observed::default(), DOMAIN);

        assert_eq!(status.phase, Some(ParadeDBPhase::Creating));
        assert_eq!(status.ready_replicas, 0);
        assert_eq!(
            status.message.as_deref(),
            Some("Waiting for replicas: 0/3 ready")
        );
        let progressing = find_condition(&status, condition_types::PROGRESSING).unwrap();
        assert_eq!(progressing.status, condition_status::TRUE);
    }

    #[test]
    fn test_pooler_endpoint_only_with_pooling() {
        let db = ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
            .with_connection_pooling()
            .build();

        let status = aggregate(&db, ready(1), "cluster.example");

        assert_eq!(
            status.endpoint.as_deref(),
            Some("my-db.prod.cluster.example:5432")
        );
        assert_eq!(
            status.pooler_endpoint.as_deref(),
            Some("my-db-pooler.prod.cluster.example:5432")
        );
    }

    #[test]
    fn test_last_backup_falls_back_to_previous_value() {
        let previous = ParadeDBStatus {
            last_backup: Some("2026-09-30T02:00:00Z".to_string()),
            last_backup_size: Some("1.2Gi".to_string()),
            ..Default::default()
        };
        let db = instance_with_status(1, Some(previous));

        let kept = aggregate(&db, ready(1), DOMAIN);
        assert_eq!(kept.last_backup.as_deref(), Some("2026-09-30T02:00:00Z"));
        assert_eq!(kept.last_backup_size.as_deref(), Some("1.2Gi"));

        let observed = Observed {
            ready_replicas: Some(1),
            last_backup: Some("2026-10-01T02:00:00Z".to_string()),
            ..Default::default()
        };
        let newer = aggregate(&db, observed, DOMAIN);
        assert_eq!(newer.last_backup.as_deref(), Some("2026-10-01T02:00:00Z"));
    }

    #[test]
    fn test_retained_resources_are_reported_as_observed() {
        let observed = Observed {
            ready_replicas: Some(1),
            retained_resources: vec!["Deployment/my-db-pooler".to_string()],
            ..Default::default()
        };

        let status = aggregate(&instance_with_status(1, None), observed, DOMAIN);
        assert_eq!(status.retained_resources, vec!["Deployment/my-db-pooler"]);

        let db = instance_with_status(1, Some(status));
        let cleared = aggregate(&db, ready(1), DOMAIN);
        assert!(cleared.retained_resources.is_empty());
    }

    #[test]
    fn test_transition_time_survives_repeated_aggregation() {
        let first = aggregate(&instance_with_status(2, None), ready(1), DOMAIN);
        let db = instance_with_status(2, Some(first.clone()));

        let second = aggregate(&db, ready(1), DOMAIN);

        for condition in &first.conditions {
            let again = second
                .conditions
                .iter()
                .find(|c| c.type_ == condition.type_)
                .unwrap();
            assert_eq!(again.last_transition_time, condition.last_transition_time);
        }
        assert_eq!(first, second);
    }
}
