//! Scheduled logical backups
//!
//! Backups run as a CronJob `<name>-backup` that dumps the application
//! database with `pg_dump` and prunes old dumps according to the retention
//! policy. Dumps either land on a dedicated volume (`<name>-backup`) or are
//! uploaded to an S3-compatible bucket.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use kube::core::ObjectMeta;

use crate::crd::{ParadeDB, PvcBackupSpec, S3BackupSpec};
use crate::postgres::config::{
    BACKUP_DIR, build_dump_script, build_pvc_backup_script, build_s3_upload_script,
};
use crate::resources::common::{
    POSTGRES_PORT, SPEC_HASH_ANNOTATION, env, object_meta, secret_env, spec_hash, standard_labels,
    storage_request,
};
use crate::resources::secret::{PASSWORD_KEY, USERNAME_KEY};

/// Image running the S3 upload step
pub const AWS_CLI_IMAGE: &str = "amazon/aws-cli:latest";

/// Where backups are written
#[derive(Clone, Debug)]
pub enum BackupTarget<'a> {
    S3(&'a S3BackupSpec),
    Volume(PvcBackupSpec),
}

/// Resolve the backup target; S3 wins when both are configured
pub fn backup_target(db: &ParadeDB) -> Option<BackupTarget<'_>> {
    let backup = db.spec.backup.as_ref().filter(|b| b.enabled)?;
    Some(match &backup.s3 {
        Some(s3) => BackupTarget::S3(s3),
        None => BackupTarget::Volume(backup.pvc.clone().unwrap_or_default()),
    })
}

fn backup_labels(db: &ParadeDB) -> BTreeMap<String, String> {
    let mut labels = standard_labels(db);
    labels.insert(
        "app.kubernetes.io/component".to_string(),
        "backup".to_string(),
    );
    labels
}

/// Generate the `<name>-backup` volume used by the volume target
pub fn generate_backup_pvc(db: &ParadeDB) -> Option<PersistentVolumeClaim> {
    let Some(BackupTarget::Volume(pvc)) = backup_target(db) else {
        return None;
    };

    Some(PersistentVolumeClaim {
        metadata: object_meta(db, db.backup_name(), backup_labels(db)),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: pvc.storage_class_name.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(storage_request(&pvc.size)),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// libpq environment for `pg_dump`
fn pg_env(db: &ParadeDB) -> Vec<EnvVar> {
    let credentials = db.superuser_secret_name();
    vec![
        env("PGHOST", db.service_name()),
        env("PGPORT", POSTGRES_PORT.to_string()),
        secret_env("PGUSER", &credentials, USERNAME_KEY),
        secret_env("PGPASSWORD", &credentials, PASSWORD_KEY),
        env("PGDATABASE", db.spec.auth.database.clone()),
    ]
}

fn backup_mount() -> VolumeMount {
    VolumeMount {
        name: "backups".to_string(),
        mount_path: BACKUP_DIR.to_string(),
        ..Default::default()
    }
}

fn shell(script: String) -> Option<Vec<String>> {
    Some(vec!["/bin/sh".to_string(), "-c".to_string(), script])
}

fn backup_pod_spec(db: &ParadeDB, target: &BackupTarget<'_>) -> PodSpec {
    match target {
        BackupTarget::Volume(_) => PodSpec {
            containers: vec![Container {
                name: "backup".to_string(),
                image: Some(db.spec.image.clone()),
                command: shell(build_pvc_backup_script(db)),
                env: Some(pg_env(db)),
                volume_mounts: Some(vec![backup_mount()]),
                ..Default::default()
            }],
            volumes: Some(vec![Volume {
                name: "backups".to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: db.backup_name(),
                    read_only: None,
                }),
                ..Default::default()
            }]),
            restart_policy: Some("OnFailure".to_string()),
            ..Default::default()
        },
        BackupTarget::S3(s3) => {
            let mut upload_env = vec![
                secret_env("AWS_ACCESS_KEY_ID", &s3.secret_ref.name, "AWS_ACCESS_KEY_ID"),
                secret_env(
                    "AWS_SECRET_ACCESS_KEY",
                    &s3.secret_ref.name,
                    "AWS_SECRET_ACCESS_KEY",
                ),
            ];
            if let Some(region) = &s3.region {
                upload_env.push(env("AWS_DEFAULT_REGION", region.clone()));
            }

            PodSpec {
                init_containers: Some(vec![Container {
                    name: "dump".to_string(),
                    image: Some(db.spec.image.clone()),
                    command: shell(build_dump_script(BACKUP_DIR)),
                    env: Some(pg_env(db)),
                    volume_mounts: Some(vec![backup_mount()]),
                    ..Default::default()
                }]),
                containers: vec![Container {
                    name: "upload".to_string(),
                    image: Some(AWS_CLI_IMAGE.to_string()),
                    command: shell(build_s3_upload_script(db, s3)),
                    env: Some(upload_env),
                    volume_mounts: Some(vec![backup_mount()]),
                    ..Default::default()
                }],
                volumes: Some(vec![Volume {
                    name: "backups".to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                }]),
                restart_policy: Some("OnFailure".to_string()),
                ..Default::default()
            }
        }
    }
}

/// Generate the `<name>-backup` CronJob
///
/// Returns None when backups are disabled.
pub fn generate_backup_cronjob(db: &ParadeDB) -> Option<CronJob> {
    let backup = db.spec.backup.as_ref().filter(|b| b.enabled)?;
    let target = backup_target(db)?;

    let job_template = JobTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(backup_labels(db)),
            ..Default::default()
        }),
        spec: Some(JobSpec {
            backoff_limit: Some(2),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(backup_labels(db)),
                    ..Default::default()
                }),
                spec: Some(backup_pod_spec(db, &target)),
            },
            ..Default::default()
        }),
    };

    let mut metadata = object_meta(db, db.backup_name(), backup_labels(db));
    metadata.annotations = Some(BTreeMap::from([(
        SPEC_HASH_ANNOTATION.to_string(),
        spec_hash(&job_template),
    )]));

    Some(CronJob {
        metadata,
        spec: Some(CronJobSpec {
            schedule: backup.schedule.clone(),
            concurrency_policy: Some("Forbid".to_string()),
            successful_jobs_history_limit: Some(3),
            failed_jobs_history_limit: Some(1),
            job_template,
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Time of the last successful backup recorded on the CronJob
pub fn last_successful_backup(cronjob: &CronJob) -> Option<String> {
    cronjob
        .status
        .as_ref()
        .and_then(|s| s.last_successful_time.as_ref())
        .map(|t| t.0.to_string())
}
