//! Validation logic for ParadeDB specs
//!
//! The CRD schema covers types and ranges; these checks cover the rules a
//! structural schema cannot express, plus values that end up inside
//! generated SQL or shell scripts.

use crate::controller::error::{Error, Result};
use crate::crd::ParadeDB;
use crate::postgres::config::validate_version;

/// Minimum number of replicas
pub const MIN_REPLICAS: i32 = 1;

/// Maximum number of replicas
pub const MAX_REPLICAS: i32 = 10;

/// Privileges accepted in `auth.users[].privileges`
const DATABASE_PRIVILEGES: &[&str] = &["ALL", "ALL PRIVILEGES", "CONNECT", "CREATE", "TEMPORARY", "TEMP"];

/// Validate the ParadeDB spec
pub fn validate_spec(db: &ParadeDB) -> Result<()> {
    validate_replicas(db)?;
    if !validate_version(&db.spec.postgres_version) {
        return Err(Error::ValidationError(format!(
            "unsupported postgresVersion {:?}",
            db.spec.postgres_version
        )));
    }
    validate_storage_size("storage.size", &db.spec.storage.size)?;
    if let Some(wal) = &db.spec.storage.wal_storage {
        validate_storage_size("storage.walStorage.size", &wal.size)?;
    }
    validate_auth(db)?;
    validate_extensions(db)?;
    validate_tls(db)?;
    validate_backup(db)?;
    Ok(())
}

/// Validate replica count
fn validate_replicas(db: &ParadeDB) -> Result<()> {
    let replicas = db.spec.replicas;

    if replicas < MIN_REPLICAS {
        return Err(Error::ValidationError(format!(
            "replica count {} is below minimum {}",
            replicas, MIN_REPLICAS
        )));
    }

    if replicas > MAX_REPLICAS {
        return Err(Error::ValidationError(format!(
            "replica count {} exceeds maximum {}",
            replicas, MAX_REPLICAS
        )));
    }

    Ok(())
}

/// Validate a storage quantity such as "10Gi"
fn validate_storage_size(field: &str, size: &str) -> Result<()> {
    if !size.ends_with("Gi") && !size.ends_with("Mi") && !size.ends_with("Ti") {
        return Err(Error::ValidationError(format!(
            "{} must end with Gi, Mi, or Ti: {}",
            field, size
        )));
    }

    let num_str = size.trim_end_matches(char::is_alphabetic);
    match num_str.parse::<u64>() {
        Ok(n) if n > 0 => Ok(()),
        _ => Err(Error::ValidationError(format!(
            "invalid {} number: {}",
            field, size
        ))),
    }
}

/// Names that are safe to embed in generated SQL and environment variable names
fn is_simple_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name.len() <= 63
}

fn validate_auth(db: &ParadeDB) -> Result<()> {
    let auth = &db.spec.auth;
    if !is_simple_identifier(&auth.database) {
        return Err(Error::ValidationError(format!(
            "invalid database name {:?}",
            auth.database
        )));
    }

    for user in &auth.users {
        if !is_simple_identifier(&user.name) {
            return Err(Error::ValidationError(format!(
                "invalid user name {:?}",
                user.name
            )));
        }
        for database in &user.databases {
            if !is_simple_identifier(database) {
                return Err(Error::ValidationError(format!(
                    "invalid database {:?} for user {}",
                    database, user.name
                )));
            }
        }
        for privilege in &user.privileges {
            let normalized = privilege.trim().to_ascii_uppercase();
            if !DATABASE_PRIVILEGES.contains(&normalized.as_str()) {
                return Err(Error::ValidationError(format!(
                    "unsupported privilege {:?} for user {}",
                    privilege, user.name
                )));
            }
        }
    }

    for rule in &auth.pg_hba {
        if rule.contains('\n') {
            return Err(Error::ValidationError(
                "pgHBA rules must be single lines".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_extensions(db: &ParadeDB) -> Result<()> {
    for ext in &db.spec.extensions.additional {
        if !is_simple_identifier(ext) {
            return Err(Error::ValidationError(format!(
                "invalid extension name {:?}",
                ext
            )));
        }
    }
    Ok(())
}

fn validate_tls(db: &ParadeDB) -> Result<()> {
    let Some(tls) = db.spec.tls.as_ref().filter(|t| t.enabled) else {
        return Ok(());
    };

    let cert_manager = tls.cert_manager.as_ref().filter(|c| c.enabled);
    match (&tls.secret_ref, cert_manager) {
        (Some(_), Some(_)) => Err(Error::ValidationError(
            "tls.secretRef and tls.certManager are mutually exclusive".to_string(),
        )),
        (None, None) => Err(Error::ValidationError(
            "tls.enabled requires tls.secretRef or tls.certManager".to_string(),
        )),
        (None, Some(cm)) => match &cm.issuer_ref {
            Some(issuer) if issuer.kind == "Issuer" || issuer.kind == "ClusterIssuer" => Ok(()),
            Some(issuer) => Err(Error::ValidationError(format!(
                "tls.certManager.issuerRef.kind must be Issuer or ClusterIssuer, got {:?}",
                issuer.kind
            ))),
            None => Err(Error::ValidationError(
                "tls.certManager.issuerRef is required".to_string(),
            )),
        },
        (Some(_), None) => Ok(()),
    }
}

fn validate_backup(db: &ParadeDB) -> Result<()> {
    let Some(backup) = db.spec.backup.as_ref().filter(|b| b.enabled) else {
        return Ok(());
    };

    if backup.schedule.split_whitespace().count() != 5 && !backup.schedule.starts_with('@') {
        return Err(Error::ValidationError(format!(
            "backup.schedule must be a five-field cron expression: {:?}",
            backup.schedule
        )));
    }

    if let Some(s3) = &backup.s3 {
        if s3.bucket.trim().is_empty() || s3.endpoint.trim().is_empty() {
            return Err(Error::ValidationError(
                "backup.s3 requires endpoint and bucket".to_string(),
            ));
        }
        let unsafe_char = |c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '$' | '`' | '\\');
        let fields = [
            s3.bucket.as_str(),
            s3.endpoint.as_str(),
            s3.path.as_deref().unwrap_or_default(),
            s3.region.as_deref().unwrap_or_default(),
        ];
        if fields.iter().any(|f| f.contains(unsafe_char)) {
            return Err(Error::ValidationError(
                "backup.s3 fields must not contain whitespace, quotes, '$', '`' or '\\'".to_string(),
            ));
        }
    } else if let Some(pvc) = &backup.pvc {
        validate_storage_size("backup.pvc.size", &pvc.size)?;
    }

    Ok(())
}
