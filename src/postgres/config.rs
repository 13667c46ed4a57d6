//! PostgreSQL configuration utilities
//!
//! This module renders the configuration files and scripts mounted into
//! ParadeDB pods: postgresql.conf, pg_hba.conf, the initialization SQL,
//! pgbouncer.ini, exporter queries and the backup job scripts.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::crd::{ParadeDB, RetentionPolicy, S3BackupSpec};

/// Default PostgreSQL configuration parameters
pub const DEFAULT_MAX_CONNECTIONS: i32 = 100;
pub const DEFAULT_SHARED_BUFFERS: &str = "128MB";

/// Keys of the rendered files inside the configuration ConfigMaps
pub const POSTGRESQL_CONF: &str = "postgresql.conf";
pub const PG_HBA_CONF: &str = "pg_hba.conf";
pub const INIT_SQL: &str = "init.sql";
pub const QUERIES_YAML: &str = "queries.yaml";
pub const PGBOUNCER_INI: &str = "pgbouncer.ini";

/// Mount points inside the database pod
pub const CONFIG_DIR: &str = "/etc/postgresql";
pub const TLS_DIR: &str = "/etc/postgresql/tls";
pub const INITDB_DIR: &str = "/docker-entrypoint-initdb.d";
pub const DATA_DIR: &str = "/var/lib/postgresql/data";
pub const PGDATA: &str = "/var/lib/postgresql/data/pgdata";
pub const WAL_DIR: &str = "/var/lib/postgresql/wal";
pub const INITDB_WALDIR: &str = "/var/lib/postgresql/wal/pg_wal";
pub const EXPORTER_DIR: &str = "/etc/postgres-exporter";
pub const BACKUP_DIR: &str = "/backups";

/// Extensions that must be listed in shared_preload_libraries
const PRELOAD_EXTENSIONS: &[&str] = &[
    "pg_search",
    "pg_analytics",
    "pg_cron",
    "pg_stat_statements",
    "timescaledb",
];

/// Validate a PostgreSQL version string
pub fn validate_version(version: &str) -> bool {
    // Accept major versions like "15", "16" or full versions like "15.4", "16.1"
    let parts: Vec<&str> = version.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }

    match parts[0].parse::<i32>() {
        Ok(major) if (14..=18).contains(&major) => {}
        _ => return false,
    }

    if parts.len() == 2 && parts[1].parse::<i32>().is_err() {
        return false;
    }

    true
}

/// Environment variable holding the password of the additional user at `index`
pub fn user_password_env(index: usize) -> String {
    format!("PARADEDB_USER_{}_PASSWORD", index)
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a postgresql.conf value, quoting anything that is not a plain
/// number or boolean
fn format_conf_value(value: &str) -> String {
    let trimmed = value.trim();
    let is_plain = !trimmed.is_empty()
        && (trimmed.parse::<f64>().is_ok()
            || matches!(
                trimmed.to_ascii_lowercase().as_str(),
                "on" | "off" | "true" | "false"
            ));
    if is_plain || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() > 1) {
        trimmed.to_string()
    } else {
        quote_literal(trimmed)
    }
}

/// Build postgresql.conf
///
/// Operator defaults are applied first; `spec.postgresConfig` entries
/// override them key by key.
pub fn build_postgres_config(db: &ParadeDB) -> String {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    params.insert("listen_addresses".to_string(), "'*'".to_string());
    params.insert("port".to_string(), "5432".to_string());
    params.insert(
        "max_connections".to_string(),
        DEFAULT_MAX_CONNECTIONS.to_string(),
    );
    params.insert(
        "shared_buffers".to_string(),
        quote_literal(DEFAULT_SHARED_BUFFERS),
    );
    params.insert("password_encryption".to_string(), "'scram-sha-256'".to_string());
    params.insert("log_destination".to_string(), "'stderr'".to_string());

    let preload: Vec<String> = db
        .spec
        .extensions
        .enabled()
        .into_iter()
        .filter(|ext| PRELOAD_EXTENSIONS.contains(&ext.as_str()))
        .collect();
    if !preload.is_empty() {
        params.insert(
            "shared_preload_libraries".to_string(),
            quote_literal(&preload.join(",")),
        );
    }

    if db.tls_secret_name().is_some() {
        params.insert("ssl".to_string(), "on".to_string());
        params.insert(
            "ssl_cert_file".to_string(),
            quote_literal(&format!("{}/tls.crt", TLS_DIR)),
        );
        params.insert(
            "ssl_key_file".to_string(),
            quote_literal(&format!("{}/tls.key", TLS_DIR)),
        );
    }

    for (key, value) in &db.spec.postgres_config {
        params.insert(key.trim().to_string(), format_conf_value(value));
    }

    let mut conf = String::from("# Managed by paradedb-operator; set spec.postgresConfig to override\n");
    for (key, value) in &params {
        conf.push_str(&format!("{} = {}\n", key, value));
    }
    conf
}

/// Build pg_hba.conf
///
/// User rules from `spec.auth.pgHBA` are evaluated before the defaults.
/// With TLS enabled remote connections must use SSL.
pub fn build_pg_hba_config(db: &ParadeDB) -> String {
    let mut lines = vec![
        "# TYPE  DATABASE  USER  ADDRESS  METHOD".to_string(),
        "local all all trust".to_string(),
        "host all all 127.0.0.1/32 scram-sha-256".to_string(),
        "host all all ::1/128 scram-sha-256".to_string(),
    ];

    for rule in &db.spec.auth.pg_hba {
        let rule = rule.trim();
        if !rule.is_empty() {
            lines.push(rule.to_string());
        }
    }

    let remote = if db.tls_secret_name().is_some() {
        "hostssl"
    } else {
        "host"
    };
    lines.push(format!("{} all all 0.0.0.0/0 scram-sha-256", remote));
    lines.push(format!("{} all all ::/0 scram-sha-256", remote));

    let mut conf = lines.join("\n");
    conf.push('\n');
    conf
}

/// Build the initialization script run once by the image entrypoint.
///
/// Creates the enabled extensions, the additional databases and users, and
/// grants. User passwords are read with `\getenv` from the environment so
/// they never appear in the ConfigMap.
pub fn build_init_script(db: &ParadeDB) -> String {
    let mut sql = String::from("-- Managed by paradedb-operator\n");

    let extensions = db.spec.extensions.enabled();
    if !extensions.is_empty() {
        sql.push_str("\n-- Extensions\n");
        for ext in &extensions {
            sql.push_str(&format!(
                "CREATE EXTENSION IF NOT EXISTS {};\n",
                quote_ident(ext)
            ));
        }
    }

    let main_db = &db.spec.auth.database;
    let mut extra_databases: Vec<&str> = Vec::new();
    for user in &db.spec.auth.users {
        for database in &user.databases {
            if database != main_db && !extra_databases.contains(&database.as_str()) {
                extra_databases.push(database);
            }
        }
    }
    if !extra_databases.is_empty() {
        sql.push_str("\n-- Databases\n");
        for database in extra_databases {
            sql.push_str(&format!(
                "SELECT 'CREATE DATABASE {}' WHERE NOT EXISTS (SELECT FROM pg_database WHERE datname = {})\\gexec\n",
                quote_ident(database).replace('\'', "''"),
                quote_literal(database)
            ));
        }
    }

    if !db.spec.auth.users.is_empty() {
        sql.push_str("\n-- Users\n");
        for (index, user) in db.spec.auth.users.iter().enumerate() {
            let role = quote_ident(&user.name);
            sql.push_str(&format!("\\getenv user_password {}\n", user_password_env(index)));
            sql.push_str(&format!(
                "CREATE ROLE {} WITH LOGIN PASSWORD :'user_password';\n",
                role
            ));

            let databases: Vec<&String> = if user.databases.is_empty() {
                vec![main_db]
            } else {
                user.databases.iter().collect()
            };
            let privileges = if user.privileges.is_empty() {
                "CONNECT".to_string()
            } else {
                user.privileges
                    .iter()
                    .map(|p| p.trim().to_ascii_uppercase())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            for database in databases {
                sql.push_str(&format!(
                    "GRANT {} ON DATABASE {} TO {};\n",
                    privileges,
                    quote_ident(database),
                    role
                ));
            }
        }
    }

    sql
}

/// Build pgbouncer.ini for the pooling tier
pub fn build_pgbouncer_ini(db: &ParadeDB) -> String {
    let pooling = db.spec.connection_pooling.clone().unwrap_or_default();
    let database = &db.spec.auth.database;
    let host = db.service_name();

    format!(
        r#"[databases]
{database} = host={host} port=5432 dbname={database}
* = host={host} port=5432

[pgbouncer]
listen_addr = 0.0.0.0
listen_port = 5432
auth_type = scram-sha-256
auth_file = /opt/bitnami/pgbouncer/conf/userlist.txt
pool_mode = {pool_mode}
max_client_conn = {max_client_conn}
default_pool_size = {default_pool_size}
min_pool_size = {min_pool_size}
reserve_pool_size = {reserve_pool_size}
admin_users = postgres
stats_users = postgres
ignore_startup_parameters = extra_float_digits
"#,
        database = database,
        host = host,
        pool_mode = pooling.pool_mode,
        max_client_conn = pooling.max_client_connections,
        default_pool_size = pooling.default_pool_size,
        min_pool_size = pooling.min_pool_size,
        reserve_pool_size = pooling.reserve_pool_size,
    )
}

/// Build the postgres_exporter queries file from `spec.monitoring.customQueries`.
///
/// Each entry maps a metric namespace to its YAML definition (query and
/// metrics). Returns `None` when no custom queries are configured.
pub fn build_custom_queries(db: &ParadeDB) -> Result<Option<String>, serde_yaml::Error> {
    let Some(queries) = db
        .spec
        .monitoring
        .as_ref()
        .map(|m| &m.custom_queries)
        .filter(|q| !q.is_empty())
    else {
        return Ok(None);
    };

    let mut document = serde_yaml::Mapping::new();
    for (namespace, definition) in queries {
        let value: serde_yaml::Value = serde_yaml::from_str(definition)?;
        document.insert(serde_yaml::Value::String(namespace.clone()), value);
    }
    serde_yaml::to_string(&document).map(Some)
}

/// Shell snippet that writes a timestamped custom-format dump into `dir`.
///
/// File names are `<UTC timestamp>_<ISO week>.dump` so retention can be
/// computed from names alone.
pub fn build_dump_script(dir: &str) -> String {
    format!(
        r#"set -eu
TS=$(date -u +%Y%m%dT%H%M%SZ)
WEEK=$(date -u +%G-W%V)
FILE="{dir}/${{TS}}_${{WEEK}}.dump"
pg_dump --format=custom --file="$FILE.partial"
mv "$FILE.partial" "$FILE"
echo "backup written to $FILE"
"#,
        dir = dir
    )
}

/// awk filter reading backup names newest first and printing the ones to delete.
///
/// Kept: the `keepLast` newest, the newest of each of the `keepDaily` most
/// recent days and the newest of each of the `keepWeekly` most recent weeks.
/// The newest dump is kept under any policy, including an all-zero one.
pub fn build_retention_filter(policy: &RetentionPolicy) -> String {
    format!(
        r#"awk -v keep_last={last} -v keep_daily={daily} -v keep_weekly={weekly} '
{{
  n++
  split($0, parts, "_")
  day = substr(parts[1], 1, 8)
  week = parts[2]
  sub(/\.dump$/, "", week)
  keep = (n <= keep_last)
  if (!(day in days) && nd < keep_daily) {{ days[day] = 1; nd++; keep = 1 }}
  if (!(week in weeks) && nw < keep_weekly) {{ weeks[week] = 1; nw++; keep = 1 }}
  if (!keep) print $0
}}'"#,
        last = policy.keep_last.max(1),
        daily = policy.keep_daily.max(0),
        weekly = policy.keep_weekly.max(0),
    )
}

fn retention_policy(db: &ParadeDB) -> RetentionPolicy {
    db.spec
        .backup
        .as_ref()
        .and_then(|b| b.retention_policy.clone())
        .unwrap_or_default()
}

/// Backup script for the volume target: dump, then prune old dumps in place
pub fn build_pvc_backup_script(db: &ParadeDB) -> String {
    format!(
        r#"{dump}
ls -1 {dir} | grep '\.dump$' | sort -r | {filter} | while read -r old; do
  echo "pruning $old"
  rm -f "{dir}/$old"
done
"#,
        dump = build_dump_script(BACKUP_DIR),
        dir = BACKUP_DIR,
        filter = build_retention_filter(&retention_policy(db)),
    )
}

/// S3 key prefix for a ParadeDB's backups
pub fn s3_prefix(db: &ParadeDB, s3: &S3BackupSpec) -> String {
    s3.path
        .as_deref()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| db.name_any())
}

/// Upload script for the S3 target: copy the fresh dump, then prune the bucket
pub fn build_s3_upload_script(db: &ParadeDB, s3: &S3BackupSpec) -> String {
    format!(
        r#"set -eu
DEST="s3://{bucket}/{prefix}"
AWS="aws --endpoint-url {endpoint}"
for f in {dir}/*.dump; do
  $AWS s3 cp "$f" "$DEST/$(basename "$f")"
done
$AWS s3 ls "$DEST/" | awk '{{print $4}}' | grep '\.dump$' | sort -r | {filter} | while read -r old; do
  echo "pruning $old"
  $AWS s3 rm "$DEST/$old"
done
"#,
        bucket = s3.bucket,
        prefix = s3_prefix(db, s3),
        endpoint = s3.endpoint,
        dir = BACKUP_DIR,
        filter = build_retention_filter(&retention_policy(db)),
    )
}
