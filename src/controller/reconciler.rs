//! Reconciliation logic for ParadeDB resources
//!
//! One pass walks the phase machine, converges every owned object in
//! dependency order and finally recomputes the status. Each step is
//! idempotent, so a pass that is interrupted resumes cleanly on the next
//! notification.

use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Secret, Service};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::controller::client::{ManagedResource, ResourceClient};
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::finalizer::{self, add_finalizer, has_finalizer};
use crate::controller::status::{self, Observed};
use crate::controller::sync::{SyncOutcome, UpdatePolicy, ensure};
use crate::controller::validation::validate_spec;
use crate::crd::{ParadeDB, ParadeDBPhase};
use crate::resources::backup::{
    BackupTarget, backup_target, generate_backup_cronjob, generate_backup_pvc,
    last_successful_backup,
};
use crate::resources::certificate::{Certificate, generate_certificate};
use crate::resources::common::is_owned_by;
use crate::resources::config_map::generate_config_map;
use crate::resources::pooler::{
    generate_pooler_config_map, generate_pooler_deployment, generate_pooler_service,
};
use crate::resources::secret::{PASSWORD_KEY, USERNAME_KEY, generate_credentials_secret, has_key};
use crate::resources::service::{
    generate_headless_service, generate_metrics_service, generate_service,
};
use crate::resources::service_monitor::{ServiceMonitor, generate_service_monitor};
use crate::resources::statefulset::generate_statefulset;

/// Requeue delay after a failed pass
pub const REQUEUE_AFTER_ERROR: Duration = Duration::from_secs(30);

/// Requeue delay after a successful pass
pub const REQUEUE_AFTER_SUCCESS: Duration = Duration::from_secs(60);

/// Requeue delay after initialising the finalizer or the phase
pub const REQUEUE_IMMEDIATELY: Duration = Duration::from_secs(1);

/// Main reconciliation function
#[instrument(skip(db, ctx), fields(name = %db.name_any(), namespace = db.namespace().unwrap_or_default()))]
pub async fn reconcile<C: ResourceClient>(db: Arc<ParadeDB>, ctx: Arc<Context<C>>) -> Result<Action> {
    let start = Instant::now();
    let ns = db.namespace().unwrap_or_default();
    let name = db.name_any();
    let deadline = ctx.config.reconcile_timeout;

    debug!("Reconciling ParadeDB");

    let result = match tokio::time::timeout(deadline, reconcile_pass(&ns, &name, &ctx)).await {
        Ok(result) => result,
        Err(_) => {
            let error = Error::Timeout(deadline);
            record_timeout(&ns, &name, &ctx, &error).await;
            Err(error)
        }
    };

    if let Some(health) = &ctx.health_state {
        match &result {
            Ok(_) => health
                .metrics
                .record_reconcile(&ns, &name, start.elapsed().as_secs_f64()),
            Err(e) => health.metrics.record_error(&ns, &name, e.metric_label()),
        }
    }

    result
}

/// Error policy for the controller
///
/// Every failure is retried wholesale after a fixed delay.
pub fn error_policy<C: ResourceClient>(db: Arc<ParadeDB>, error: &Error, _ctx: Arc<Context<C>>) -> Action {
    let name = db.name_any();
    if error.is_retryable() {
        warn!(
            "Retryable error for {}: {}, requeuing in {:?}",
            name, error, REQUEUE_AFTER_ERROR
        );
    } else {
        error!(
            "Error for {} needs attention: {}, requeuing in {:?}",
            name, error, REQUEUE_AFTER_ERROR
        );
    }
    Action::requeue(REQUEUE_AFTER_ERROR)
}

async fn reconcile_pass<C: ResourceClient>(ns: &str, name: &str, ctx: &Context<C>) -> Result<Action> {
    let client = ctx.client.as_ref();

    let Some(db) = client.get::<ParadeDB>(ns, name).await? else {
        debug!("ParadeDB no longer exists");
        return Ok(Action::await_change());
    };

    if db.metadata.deletion_timestamp.is_some() {
        return finalizer::finalize(&db, ctx).await;
    }

    if !has_finalizer(&db) {
        add_finalizer(client, &db).await?;
        return Ok(Action::requeue(REQUEUE_IMMEDIATELY));
    }

    let db = match db.phase() {
        None => {
            client
                .update_status(&db, &status::with_phase(&db, ParadeDBPhase::Pending))
                .await?;
            info!("Initialised phase to Pending");
            return Ok(Action::requeue(REQUEUE_IMMEDIATELY));
        }
        // Failed is left in place until a pass succeeds and the aggregator
        // picks the phase from readiness
        Some(ParadeDBPhase::Pending) => {
            let db = client
                .update_status(&db, &status::with_phase(&db, ParadeDBPhase::Creating))
                .await?;
            ctx.events
                .publish(
                    &db,
                    EventType::Normal,
                    "Creating",
                    format!("Creating ParadeDB {}", name),
                )
                .await;
            db
        }
        Some(_) => db,
    };

    match sync_all(&db, ctx).await {
        Ok(observed) => {
            record_success(&db, ctx, observed).await?;
            info!("Reconciliation completed successfully");
            Ok(Action::requeue(REQUEUE_AFTER_SUCCESS))
        }
        Err(e) => {
            record_failure(&db, ctx, &e).await;
            Err(e)
        }
    }
}

fn namespace(db: &ParadeDB) -> Result<String> {
    db.namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))
}

/// Converge every owned object in dependency order, stopping at the first failure
async fn sync_all<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>) -> Result<Observed> {
    let client = ctx.client.as_ref();
    let ns = namespace(db)?;

    validate_spec(db)?;

    sync_credentials(db, ctx).await?;
    sync_tls(db, ctx).await?;

    ensure(client, db, generate_config_map(db)?, UpdatePolicy::Converge).await?;
    ensure(
        client,
        db,
        generate_headless_service(db),
        UpdatePolicy::CreateOnly,
    )
    .await?;

    if ensure(client, db, generate_service(db), UpdatePolicy::Converge).await? == SyncOutcome::Created {
        publish_created(db, ctx, "ServiceCreated", "Service", &db.service_name()).await;
    }

    if ensure(client, db, generate_statefulset(db)?, UpdatePolicy::Converge).await?
        == SyncOutcome::Created
    {
        publish_created(
            db,
            ctx,
            "StatefulSetCreated",
            "StatefulSet",
            &db.statefulset_name(),
        )
        .await;
    }

    if db.is_connection_pooling_enabled() {
        ensure(client, db, generate_pooler_config_map(db), UpdatePolicy::Converge).await?;
        if ensure(client, db, generate_pooler_deployment(db), UpdatePolicy::Converge).await?
            == SyncOutcome::Created
        {
            publish_created(db, ctx, "PoolerCreated", "Deployment", &db.pooler_name()).await;
        }
        ensure(client, db, generate_pooler_service(db), UpdatePolicy::Converge).await?;
    }

    if db.is_monitoring_enabled() {
        ensure(client, db, generate_metrics_service(db), UpdatePolicy::Converge).await?;
        if let Some(monitor) = generate_service_monitor(db) {
            ensure(client, db, monitor, UpdatePolicy::Converge).await?;
        }
    }

    sync_backup(db, ctx).await?;

    let ready_replicas = client
        .get::<StatefulSet>(&ns, &db.statefulset_name())
        .await?
        .and_then(|sts| sts.status)
        .and_then(|s| s.ready_replicas);

    let last_backup = if db.is_backup_enabled() {
        client
            .get::<CronJob>(&ns, &db.backup_name())
            .await?
            .as_ref()
            .and_then(last_successful_backup)
    } else {
        None
    };

    Ok(Observed {
        ready_replicas,
        last_backup,
        retained_resources: retained_resources(db, client).await?,
    })
}

async fn publish_created<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>, reason: &str, kind: &str, name: &str) {
    ctx.events
        .publish(db, EventType::Normal, reason, format!("Created {} {}", kind, name))
        .await;
}

/// Fetch a Secret the user referenced and check it carries `keys`
async fn require_secret<C: ResourceClient>(client: &C, ns: &str, name: &str, keys: &[&str]) -> Result<Secret> {
    let secret = client
        .get::<Secret>(ns, name)
        .await?
        .ok_or_else(|| Error::MissingDependency(format!("secret {:?} not found", name)))?;
    for key in keys {
        if !has_key(&secret, key) {
            return Err(Error::MissingDependency(format!(
                "secret {:?} has no {:?} key",
                name, key
            )));
        }
    }
    Ok(secret)
}

async fn sync_credentials<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>) -> Result<()> {
    let client = ctx.client.as_ref();
    let ns = namespace(db)?;

    match &db.spec.auth.superuser_secret_ref {
        Some(secret_ref) => {
            require_secret(client, &ns, &secret_ref.name, &[USERNAME_KEY, PASSWORD_KEY]).await?;
        }
        None => {
            let outcome = ensure(
                client,
                db,
                generate_credentials_secret(db),
                UpdatePolicy::CreateOnly,
            )
            .await?;
            if outcome == SyncOutcome::Created {
                publish_created(
                    db,
                    ctx,
                    "SecretCreated",
                    "Secret",
                    &db.credentials_secret_name(),
                )
                .await;
            }
        }
    }

    for user in &db.spec.auth.users {
        require_secret(client, &ns, &user.secret_ref.name, &[PASSWORD_KEY]).await?;
    }
    Ok(())
}

async fn sync_tls<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>) -> Result<()> {
    let Some(tls) = db.spec.tls.as_ref().filter(|t| t.enabled) else {
        return Ok(());
    };

    if let Some(secret_ref) = &tls.secret_ref {
        let ns = namespace(db)?;
        require_secret(ctx.client.as_ref(), &ns, &secret_ref.name, &["tls.crt", "tls.key"]).await?;
    } else if let Some(certificate) = generate_certificate(db, &ctx.config.cluster_domain) {
        ensure(ctx.client.as_ref(), db, certificate, UpdatePolicy::Converge).await?;
    }
    Ok(())
}

async fn sync_backup<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>) -> Result<()> {
    let client = ctx.client.as_ref();
    let Some(target) = backup_target(db) else {
        return Ok(());
    };

    if let BackupTarget::S3(s3) = &target {
        let ns = namespace(db)?;
        require_secret(
            client,
            &ns,
            &s3.secret_ref.name,
            &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"],
        )
        .await?;
    }

    if let Some(pvc) = generate_backup_pvc(db) {
        ensure(client, db, pvc, UpdatePolicy::CreateOnly).await?;
    }

    if let Some(cronjob) = generate_backup_cronjob(db) {
        if ensure(client, db, cronjob, UpdatePolicy::Converge).await? == SyncOutcome::Created {
            let schedule = db
                .spec
                .backup
                .as_ref()
                .map(|b| b.schedule.clone())
                .unwrap_or_default();
            ctx.events
                .publish(
                    db,
                    EventType::Normal,
                    "BackupScheduled",
                    format!("Scheduled backups of {} at {:?}", db.name_any(), schedule),
                )
                .await;
        }
    }
    Ok(())
}

/// Record `<Kind>/<name>` when the object exists and is controlled by `db`
async fn push_if_owned<K, C>(client: &C, db: &ParadeDB, ns: &str, name: &str, out: &mut Vec<String>) -> Result<()>
where
    K: ManagedResource,
    C: ResourceClient,
{
    if let Some(obj) = client.get::<K>(ns, name).await? {
        if is_owned_by(obj.meta(), db) {
            out.push(format!("{}/{}", K::kind(&()), name));
        }
    }
    Ok(())
}

/// Owned objects of disabled optional tiers that were left in place
async fn retained_resources<C: ResourceClient>(db: &ParadeDB, client: &C) -> Result<Vec<String>> {
    let ns = namespace(db)?;
    let mut retained = Vec::new();

    if !db.is_connection_pooling_enabled() {
        push_if_owned::<Deployment, _>(client, db, &ns, &db.pooler_name(), &mut retained).await?;
        push_if_owned::<Service, _>(client, db, &ns, &db.pooler_name(), &mut retained).await?;
        push_if_owned::<ConfigMap, _>(client, db, &ns, &db.pooler_config_map_name(), &mut retained)
            .await?;
    }
    if !db.is_monitoring_enabled() {
        push_if_owned::<Service, _>(client, db, &ns, &db.metrics_service_name(), &mut retained)
            .await?;
    }
    if !db.is_service_monitor_enabled() {
        push_if_owned::<ServiceMonitor, _>(client, db, &ns, &db.metrics_service_name(), &mut retained)
            .await?;
    }
    match backup_target(db) {
        None => {
            push_if_owned::<CronJob, _>(client, db, &ns, &db.backup_name(), &mut retained).await?;
            push_if_owned::<PersistentVolumeClaim, _>(client, db, &ns, &db.backup_name(), &mut retained)
                .await?;
        }
        Some(BackupTarget::S3(_)) => {
            push_if_owned::<PersistentVolumeClaim, _>(client, db, &ns, &db.backup_name(), &mut retained)
                .await?;
        }
        Some(BackupTarget::Volume(_)) => {}
    }
    if !db.is_cert_manager_enabled() {
        push_if_owned::<Certificate, _>(client, db, &ns, &db.tls_certificate_name(), &mut retained)
            .await?;
    }

    Ok(retained)
}

async fn record_success<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>, observed: Observed) -> Result<()> {
    let previous = db
        .status
        .as_ref()
        .map(|s| s.retained_resources.clone())
        .unwrap_or_default();
    if observed.retained_resources != previous && !observed.retained_resources.is_empty() {
        ctx.events
            .publish(
                db,
                EventType::Warning,
                "ResourcesRetained",
                format!(
                    "Disabled features left these objects in place: {}",
                    observed.retained_resources.join(", ")
                ),
            )
            .await;
    }

    let status = status::aggregate(db, observed, &ctx.config.cluster_domain);
    if let Some(health) = &ctx.health_state {
        let ns = db.namespace().unwrap_or_default();
        let name = db.name_any();
        if let Some(phase) = status.phase {
            health.metrics.set_phase(&ns, &name, phase);
        }
        health.metrics.set_replicas(
            &ns,
            &name,
            i64::from(db.replicas()),
            i64::from(status.ready_replicas),
        );
    }

    if db.status.as_ref() == Some(&status) {
        debug!("Status unchanged");
        return Ok(());
    }
    ctx.client.update_status(db, &status).await?;
    Ok(())
}

/// Record a pass that ran out of time. The pass future was dropped mid-way,
/// so the descriptor is read again before the failure is written.
async fn record_timeout<C: ResourceClient>(ns: &str, name: &str, ctx: &Context<C>, error: &Error) {
    match ctx.client.get::<ParadeDB>(ns, name).await {
        Ok(Some(db)) if db.metadata.deletion_timestamp.is_none() => {
            record_failure(&db, ctx, error).await;
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to read ParadeDB after timeout: {}", e),
    }
}

/// Record a failed pass on the status and as an event. Write failures are
/// logged; the original error is what gets retried.
async fn record_failure<C: ResourceClient>(db: &ParadeDB, ctx: &Context<C>, error: &Error) {
    let message = error.to_string();
    error!("Reconciliation failed: {}", message);

    let status = status::failed(db, &message);
    if db.status.as_ref() != Some(&status) {
        if let Err(e) = ctx.client.update_status(db, &status).await {
            warn!("Failed to record failure status: {}", e);
        }
    }
    if let Some(health) = &ctx.health_state {
        health
            .metrics
            .set_phase(&db.namespace().unwrap_or_default(), &db.name_any(), ParadeDBPhase::Failed);
    }

    ctx.events
        .publish(db, EventType::Warning, "ReconciliationFailed", message)
        .await;
}
