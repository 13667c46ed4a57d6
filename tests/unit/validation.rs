//! Unit tests for validation logic

use serde_json::json;

use paradedb_operator::Error;
use paradedb_operator::controller::{MAX_REPLICAS, MIN_REPLICAS, validate_spec};

use crate::common::*;

fn builder() -> ParadeDBBuilder {
    ParadeDBBuilder::new(TEST_NAME, TEST_NAMESPACE)
}

fn assert_rejected(builder: ParadeDBBuilder, needle: &str) {
    match validate_spec(&builder.build()) {
        Err(Error::ValidationError(msg)) => {
            assert!(msg.contains(needle), "{:?} does not mention {:?}", msg, needle)
        }
        other => panic!("expected a validation error mentioning {:?}, got {:?}", needle, other),
    }
}

mod replica_tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(validate_spec(&builder().with_replicas(MIN_REPLICAS).build()).is_ok());
        assert!(validate_spec(&builder().with_replicas(MAX_REPLICAS).build()).is_ok());
    }

    #[test]
    fn test_out_of_range_replicas() {
        assert_rejected(builder().with_replicas(MIN_REPLICAS - 1), "below minimum");
        assert_rejected(builder().with_replicas(MAX_REPLICAS + 1), "exceeds maximum");
    }
}

mod version_tests {
    use super::*;

    #[test]
    fn test_supported_versions() {
        for version in ["14", "15", "16", "17", "16.4"] {
            let db = builder()
                .with_spec(|s| s["postgresVersion"] = json!(version))
                .build();
            assert!(validate_spec(&db).is_ok(), "{} should be accepted", version);
        }
    }

    #[test]
    fn test_unsupported_versions() {
        for version in ["12", "sixteen", "16.4.1", ""] {
            assert_rejected(
                builder().with_spec(|s| s["postgresVersion"] = json!(version)),
                "postgresVersion",
            );
        }
    }
}

mod auth_tests {
    use super::*;

    #[test]
    fn test_user_with_known_privileges_is_valid() {
        let db = builder().with_user("analyst", "analyst-creds").build();
        assert!(validate_spec(&db).is_ok());
    }

    #[test]
    fn test_user_name_must_be_identifier() {
        assert_rejected(
            builder().with_user("drop table;", "creds"),
            "invalid user name",
        );
    }

    #[test]
    fn test_unknown_privilege_rejected() {
        assert_rejected(
            builder()
                .with_user("analyst", "creds")
                .with_spec(|s| s["auth"]["users"][0]["privileges"] = json!(["SUPERUSER"])),
            "unsupported privilege",
        );
    }

    #[test]
    fn test_multiline_hba_rule_rejected() {
        assert_rejected(
            builder().with_spec(|s| {
                s["auth"]["pgHBA"] = json!(["host all all 0.0.0.0/0 trust\nlocal all all trust"])
            }),
            "single lines",
        );
    }
}

mod tier_tests {
    use super::*;

    #[test]
    fn test_tls_needs_exactly_one_source() {
        assert_rejected(
            builder().with_spec(|s| s["tls"] = json!({ "enabled": true })),
            "requires",
        );
        assert_rejected(
            builder().with_spec(|s| {
                s["tls"] = json!({
                    "enabled": true,
                    "secretRef": { "name": "db-tls" },
                    "certManager": { "enabled": true, "issuerRef": { "name": "ca" } }
                })
            }),
            "mutually exclusive",
        );
        assert!(validate_spec(&builder().with_tls_secret("db-tls").build()).is_ok());
        assert!(validate_spec(&builder().with_cert_manager("ca").build()).is_ok());
    }

    #[test]
    fn test_disabled_tls_is_not_checked() {
        let db = builder()
            .with_spec(|s| s["tls"] = json!({ "enabled": false }))
            .build();
        assert!(validate_spec(&db).is_ok());
    }

    #[test]
    fn test_backup_schedule_must_be_cron() {
        assert_rejected(
            builder()
                .with_pvc_backup()
                .with_spec(|s| s["backup"]["schedule"] = json!("daily")),
            "cron",
        );
        let db = builder()
            .with_pvc_backup()
            .with_spec(|s| s["backup"]["schedule"] = json!("@daily"))
            .build();
        assert!(validate_spec(&db).is_ok());
    }

    #[test]
    fn test_s3_fields_cannot_escape_the_script() {
        assert_rejected(
            builder()
                .with_s3_backup("s3-creds")
                .with_spec(|s| s["backup"]["s3"]["bucket"] = json!("backups$(rm -rf /)")),
            "must not contain",
        );
    }
}
