use k8s_openapi::api::core::v1::{Affinity, PodSecurityContext, SecurityContext, Toleration};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ParadeDB is the Schema for the paradedbs API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "database.paradedb.io",
    version = "v1alpha1",
    kind = "ParadeDB",
    plural = "paradedbs",
    shortname = "pdb",
    namespaced,
    status = "ParadeDBStatus",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.postgresVersion"}"#,
    printcolumn = r#"{"name":"Endpoint", "type":"string", "jsonPath":".status.endpoint"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ParadeDBSpec {
    /// Container image for ParadeDB
    #[serde(default = "default_image")]
    pub image: String,

    /// Number of ParadeDB instances
    #[serde(default = "default_replicas")]
    #[schemars(range(min = 1, max = 10))]
    pub replicas: i32,

    /// PostgreSQL major version
    #[serde(default = "default_postgres_version")]
    pub postgres_version: String,

    /// Storage configuration for the data directory
    pub storage: StorageSpec,

    /// Resource requirements for the database container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthSpec,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,

    /// PgBouncer connection pooling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_pooling: Option<ConnectionPoolingSpec>,

    /// Scheduled logical backups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupSpec>,

    /// Prometheus exporter configuration. Monitoring is on when this block is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringSpec>,

    /// Extensions installed into the application database
    #[serde(default)]
    pub extensions: ExtensionsSpec,

    /// Extra postgresql.conf parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub postgres_config: BTreeMap<String, String>,

    /// Service type for the primary endpoint
    #[serde(default)]
    pub service_type: ServiceType,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "object_list_schema")]
    pub tolerations: Option<Vec<Toleration>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "object_schema")]
    pub affinity: Option<Affinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "object_schema")]
    pub pod_security_context: Option<PodSecurityContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "object_schema")]
    pub container_security_context: Option<SecurityContext>,
}

fn default_image() -> String {
    "paradedb/paradedb:latest".to_string()
}

fn default_replicas() -> i32 {
    1
}

fn default_postgres_version() -> String {
    "16".to_string()
}

fn object_schema(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

fn object_list_schema(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "array",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}

/// Storage configuration for ParadeDB data volumes
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Size of the data volume (e.g., "10Gi")
    #[serde(default = "default_storage_size")]
    pub size: String,

    /// Storage class name (uses the cluster default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    #[serde(default = "default_access_modes")]
    pub access_modes: Vec<String>,

    /// Separate volume for the write-ahead log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wal_storage: Option<WalStorageSpec>,
}

fn default_storage_size() -> String {
    "10Gi".to_string()
}

fn default_access_modes() -> Vec<String> {
    vec!["ReadWriteOnce".to_string()]
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalStorageSpec {
    #[serde(default = "default_wal_size")]
    pub size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

fn default_wal_size() -> String {
    "5Gi".to_string()
}

/// Resource requirements for a container
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceList>,
}

/// Resource quantities for CPU and memory
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
pub struct ResourceList {
    /// CPU quantity (e.g., "500m", "2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g., "512Mi", "2Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Reference to a Secret in the same namespace
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct SecretRef {
    pub name: String,
}

/// Authentication configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    /// Existing Secret with `username` and `password` keys. When omitted the
    /// operator generates `<name>-credentials`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superuser_secret_ref: Option<SecretRef>,

    /// Application database created at initialization
    #[serde(default = "default_database")]
    pub database: String,

    /// Additional database users
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<DatabaseUser>,

    /// Extra pg_hba.conf rules, inserted before the defaults
    #[serde(default, rename = "pgHBA", skip_serializing_if = "Vec::is_empty")]
    pub pg_hba: Vec<String>,
}

impl Default for AuthSpec {
    fn default() -> Self {
        Self {
            superuser_secret_ref: None,
            database: default_database(),
            users: Vec::new(),
            pg_hba: Vec::new(),
        }
    }
}

fn default_database() -> String {
    "paradedb".to_string()
}

/// An additional database user
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUser {
    pub name: String,

    /// Secret holding the user's password under the `password` key
    pub secret_ref: SecretRef,

    /// Databases the user is granted access to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<String>,

    /// Privileges granted on each database (e.g., CONNECT, CREATE, ALL)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub privileges: Vec<String>,
}

/// TLS configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Existing Secret with `tls.crt`, `tls.key` and optionally `ca.crt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretRef>,

    /// Issue the certificate through cert-manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_manager: Option<CertManagerSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct CertManagerSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<IssuerRef>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct IssuerRef {
    pub name: String,

    /// Issuer or ClusterIssuer
    #[serde(default = "default_issuer_kind")]
    pub kind: String,
}

fn default_issuer_kind() -> String {
    "Issuer".to_string()
}

/// PgBouncer connection pooling configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPoolingSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_pooler_image")]
    pub image: String,

    #[serde(default)]
    pub pool_mode: PoolMode,

    #[serde(default = "default_max_client_connections")]
    pub max_client_connections: i32,

    #[serde(default = "default_pool_size")]
    pub default_pool_size: i32,

    #[serde(default)]
    pub min_pool_size: i32,

    #[serde(default = "default_reserve_pool_size")]
    pub reserve_pool_size: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

impl Default for ConnectionPoolingSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            image: default_pooler_image(),
            pool_mode: PoolMode::default(),
            max_client_connections: default_max_client_connections(),
            default_pool_size: default_pool_size(),
            min_pool_size: 0,
            reserve_pool_size: default_reserve_pool_size(),
            resources: None,
        }
    }
}

fn default_pooler_image() -> String {
    "bitnami/pgbouncer:latest".to_string()
}

fn default_max_client_connections() -> i32 {
    100
}

fn default_pool_size() -> i32 {
    20
}

fn default_reserve_pool_size() -> i32 {
    5
}

/// PgBouncer pool mode
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    Session,
    #[default]
    Transaction,
    Statement,
}

impl std::fmt::Display for PoolMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolMode::Session => write!(f, "session"),
            PoolMode::Transaction => write!(f, "transaction"),
            PoolMode::Statement => write!(f, "statement"),
        }
    }
}

/// Backup configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Cron schedule for backups
    #[serde(default = "default_backup_schedule")]
    pub schedule: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_policy: Option<RetentionPolicy>,

    /// Upload dumps to an S3-compatible object store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3BackupSpec>,

    /// Keep dumps on a dedicated volume. Used when no S3 target is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<PvcBackupSpec>,
}

fn default_backup_schedule() -> String {
    "0 2 * * *".to_string()
}

/// How many backups to keep
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    #[serde(default = "default_keep_last")]
    pub keep_last: i32,

    #[serde(default = "default_keep_daily")]
    pub keep_daily: i32,

    #[serde(default = "default_keep_weekly")]
    pub keep_weekly: i32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_last: default_keep_last(),
            keep_daily: default_keep_daily(),
            keep_weekly: default_keep_weekly(),
        }
    }
}

fn default_keep_last() -> i32 {
    7
}

fn default_keep_daily() -> i32 {
    7
}

fn default_keep_weekly() -> i32 {
    4
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3BackupSpec {
    pub endpoint: String,

    pub bucket: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Secret with `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`
    pub secret_ref: SecretRef,

    /// Key prefix inside the bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PvcBackupSpec {
    #[serde(default = "default_backup_size")]
    pub size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

impl Default for PvcBackupSpec {
    fn default() -> Self {
        Self {
            size: default_backup_size(),
            storage_class_name: None,
        }
    }
}

fn default_backup_size() -> String {
    "20Gi".to_string()
}

/// Monitoring configuration
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_exporter_image")]
    pub image: String,

    #[serde(default = "default_metrics_port")]
    pub port: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_monitor: Option<ServiceMonitorSpec>,

    /// postgres_exporter custom queries, keyed by metric namespace
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_queries: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_exporter_image() -> String {
    "quay.io/prometheuscommunity/postgres-exporter:latest".to_string()
}

pub(crate) fn default_metrics_port() -> i32 {
    9187
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    #[serde(default)]
    pub enabled: bool,

    /// Extra labels so the Prometheus instance selects the monitor
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default = "default_scrape_interval")]
    pub interval: String,
}

fn default_scrape_interval() -> String {
    "30s".to_string()
}

/// Extensions to install
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionsSpec {
    /// pg_search (BM25 full text search)
    #[serde(default = "default_true")]
    pub pg_search: bool,

    /// pg_analytics (columnar analytics)
    #[serde(default = "default_true")]
    pub pg_analytics: bool,

    /// pgvector (vector similarity search)
    #[serde(default)]
    pub pg_vector: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional: Vec<String>,
}

impl Default for ExtensionsSpec {
    fn default() -> Self {
        Self {
            pg_search: true,
            pg_analytics: true,
            pg_vector: false,
            additional: Vec::new(),
        }
    }
}

impl ExtensionsSpec {
    /// Extensions to create, in creation order
    pub fn enabled(&self) -> Vec<String> {
        let mut extensions = Vec::new();
        if self.pg_search {
            extensions.push("pg_search".to_string());
        }
        if self.pg_analytics {
            extensions.push("pg_analytics".to_string());
        }
        if self.pg_vector {
            extensions.push("vector".to_string());
        }
        for ext in &self.additional {
            if !extensions.contains(ext) {
                extensions.push(ext.clone());
            }
        }
        extensions
    }
}

/// Kubernetes Service type for the primary endpoint
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, Default, PartialEq, Eq)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::ClusterIP => write!(f, "ClusterIP"),
            ServiceType::NodePort => write!(f, "NodePort"),
            ServiceType::LoadBalancer => write!(f, "LoadBalancer"),
        }
    }
}

/// Status of the ParadeDB instance.
///
/// Every field is always serialized (absent values as `null`) so that a merge
/// patch of the whole status also clears fields that are no longer set.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParadeDBStatus {
    /// Current lifecycle phase
    #[serde(default)]
    pub phase: Option<ParadeDBPhase>,

    /// Ready pods reported by the StatefulSet
    #[serde(default)]
    pub ready_replicas: i32,

    /// Image currently rolled out
    #[serde(default)]
    pub current_version: Option<String>,

    /// In-cluster connection endpoint (host:port)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// In-cluster PgBouncer endpoint (host:port)
    #[serde(default)]
    pub pooler_endpoint: Option<String>,

    /// Time of the last successful backup job
    #[serde(default)]
    pub last_backup: Option<String>,

    #[serde(default)]
    pub last_backup_size: Option<String>,

    /// Kubernetes-style conditions
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Human-readable summary of the current state
    #[serde(default)]
    pub message: Option<String>,

    /// Owned objects of disabled optional tiers that are still present
    #[serde(default)]
    pub retained_resources: Vec<String>,
}

/// ParadeDB lifecycle phase
#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, Default, PartialEq, Eq, Hash)]
pub enum ParadeDBPhase {
    /// Accepted, nothing created yet
    #[default]
    Pending,
    /// Managed objects are being created
    Creating,
    /// All replicas are ready
    Running,
    /// Some but not all replicas are ready
    Updating,
    /// The last reconciliation failed
    Failed,
    /// Deletion is in progress
    Deleting,
}

impl ParadeDBPhase {
    pub const ALL: [ParadeDBPhase; 6] = [
        ParadeDBPhase::Pending,
        ParadeDBPhase::Creating,
        ParadeDBPhase::Running,
        ParadeDBPhase::Updating,
        ParadeDBPhase::Failed,
        ParadeDBPhase::Deleting,
    ];
}

impl std::fmt::Display for ParadeDBPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParadeDBPhase::Pending => write!(f, "Pending"),
            ParadeDBPhase::Creating => write!(f, "Creating"),
            ParadeDBPhase::Running => write!(f, "Running"),
            ParadeDBPhase::Updating => write!(f, "Updating"),
            ParadeDBPhase::Failed => write!(f, "Failed"),
            ParadeDBPhase::Deleting => write!(f, "Deleting"),
        }
    }
}

/// Kubernetes-style condition
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Reason for the condition's last transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,

    /// Generation observed when condition was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ParadeDB {
    pub fn phase(&self) -> Option<ParadeDBPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    pub fn replicas(&self) -> i32 {
        self.spec.replicas
    }

    pub fn is_connection_pooling_enabled(&self) -> bool {
        self.spec
            .connection_pooling
            .as_ref()
            .is_some_and(|p| p.enabled)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.spec.tls.as_ref().is_some_and(|t| t.enabled)
    }

    pub fn is_cert_manager_enabled(&self) -> bool {
        self.spec
            .tls
            .as_ref()
            .filter(|t| t.enabled)
            .and_then(|t| t.cert_manager.as_ref())
            .is_some_and(|c| c.enabled)
    }

    pub fn is_backup_enabled(&self) -> bool {
        self.spec.backup.as_ref().is_some_and(|b| b.enabled)
    }

    /// Monitoring defaults to on; only an explicit `enabled: false` turns it off
    pub fn is_monitoring_enabled(&self) -> bool {
        self.spec.monitoring.as_ref().is_none_or(|m| m.enabled)
    }

    pub fn is_service_monitor_enabled(&self) -> bool {
        self.is_monitoring_enabled()
            && self
                .spec
                .monitoring
                .as_ref()
                .and_then(|m| m.service_monitor.as_ref())
                .is_some_and(|sm| sm.enabled)
    }

    pub fn metrics_port(&self) -> i32 {
        self.spec
            .monitoring
            .as_ref()
            .map(|m| m.port)
            .filter(|p| *p > 0)
            .unwrap_or_else(default_metrics_port)
    }

    /// Name of the primary Service
    pub fn service_name(&self) -> String {
        self.name_any()
    }

    pub fn statefulset_name(&self) -> String {
        self.name_any()
    }

    pub fn headless_service_name(&self) -> String {
        format!("{}-headless", self.name_any())
    }

    pub fn credentials_secret_name(&self) -> String {
        format!("{}-credentials", self.name_any())
    }

    /// Secret the database reads its superuser credentials from
    pub fn superuser_secret_name(&self) -> String {
        match &self.spec.auth.superuser_secret_ref {
            Some(secret_ref) => secret_ref.name.clone(),
            None => self.credentials_secret_name(),
        }
    }

    pub fn config_map_name(&self) -> String {
        format!("{}-config", self.name_any())
    }

    /// Name of the PgBouncer Deployment and Service
    pub fn pooler_name(&self) -> String {
        format!("{}-pooler", self.name_any())
    }

    pub fn pooler_config_map_name(&self) -> String {
        format!("{}-pooler-config", self.name_any())
    }

    /// Name of the metrics Service and ServiceMonitor
    pub fn metrics_service_name(&self) -> String {
        format!("{}-metrics", self.name_any())
    }

    /// Name of the backup CronJob and backup volume
    pub fn backup_name(&self) -> String {
        format!("{}-backup", self.name_any())
    }

    /// Name of the cert-manager Certificate and the Secret it issues
    pub fn tls_certificate_name(&self) -> String {
        format!("{}-tls", self.name_any())
    }

    /// Secret mounted as the server certificate when TLS is enabled
    pub fn tls_secret_name(&self) -> Option<String> {
        let tls = self.spec.tls.as_ref().filter(|t| t.enabled)?;
        if let Some(secret_ref) = &tls.secret_ref {
            return Some(secret_ref.name.clone());
        }
        if self.is_cert_manager_enabled() {
            return Some(self.tls_certificate_name());
        }
        None
    }
}
