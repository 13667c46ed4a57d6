//! Status and conditions management for ParadeDB resources
//!
//! Every pass builds the desired status as a plain value with the functions
//! in this module; the reconciler writes it once and skips the write when it
//! equals the stored status.

use chrono::Utc;
use kube::ResourceExt;

use crate::crd::{Condition, ParadeDB, ParadeDBPhase, ParadeDBStatus};
use crate::resources::common::POSTGRES_PORT;

/// Standard condition types following Kubernetes conventions
pub mod condition_types {
    /// All database replicas accept connections
    pub const READY: &str = "Ready";
    /// Managed objects or replicas are still converging
    pub const PROGRESSING: &str = "Progressing";
    /// The last reconciliation failed
    pub const DEGRADED: &str = "Degraded";
}

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
    pub const UNKNOWN: &str = "Unknown";
}

/// Builder for creating and updating status conditions
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
    generation: Option<i64>,
}

impl ConditionBuilder {
    /// Create a new condition builder
    pub fn new(generation: Option<i64>) -> Self {
        Self {
            conditions: Vec::new(),
            generation,
        }
    }

    /// Create from existing conditions
    pub fn from_existing(existing: Vec<Condition>, generation: Option<i64>) -> Self {
        Self {
            conditions: existing,
            generation,
        }
    }

    /// Set a condition, updating if it exists or adding if it doesn't.
    ///
    /// The transition time only moves when the status value changes.
    pub fn set_condition(mut self, type_: &str, status: &str, reason: &str, message: &str) -> Self {
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = Utc::now().to_rfc3339();
            }
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.observed_generation = self.generation;
        } else {
            self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: Utc::now().to_rfc3339(),
                observed_generation: self.generation,
            });
        }
        self
    }

    fn flag(value: bool) -> &'static str {
        if value {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        }
    }

    /// Set the Ready condition
    pub fn ready(self, is_ready: bool, reason: &str, message: &str) -> Self {
        self.set_condition(condition_types::READY, Self::flag(is_ready), reason, message)
    }

    /// Set the Progressing condition
    pub fn progressing(self, is_progressing: bool, reason: &str, message: &str) -> Self {
        self.set_condition(
            condition_types::PROGRESSING,
            Self::flag(is_progressing),
            reason,
            message,
        )
    }

    /// Set the Degraded condition
    pub fn degraded(self, is_degraded: bool, reason: &str, message: &str) -> Self {
        self.set_condition(
            condition_types::DEGRADED,
            Self::flag(is_degraded),
            reason,
            message,
        )
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

/// Find a condition by type
pub fn find_condition<'a>(status: &'a ParadeDBStatus, type_: &str) -> Option<&'a Condition> {
    status.conditions.iter().find(|c| c.type_ == type_)
}

/// Observations gathered from owned objects at the end of a successful pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observed {
    /// `status.readyReplicas` of the StatefulSet, if it reports one
    pub ready_replicas: Option<i32>,
    /// `status.lastSuccessfulTime` of the backup CronJob
    pub last_backup: Option<String>,
    /// Owned objects of disabled tiers that still exist
    pub retained_resources: Vec<String>,
}

/// Phase reached with `ready` of `desired` replicas ready
pub fn phase_for(ready: i32, desired: i32) -> ParadeDBPhase {
    let ready = ready.clamp(0, desired.max(0));
    if ready == 0 {
        ParadeDBPhase::Creating
    } else if ready == desired {
        ParadeDBPhase::Running
    } else {
        ParadeDBPhase::Updating
    }
}

/// `<service>.<namespace>.<cluster domain>:5432`
pub fn endpoint(service: &str, namespace: &str, cluster_domain: &str) -> String {
    format!("{}.{}.{}:{}", service, namespace, cluster_domain, POSTGRES_PORT)
}

fn current_status(db: &ParadeDB) -> ParadeDBStatus {
    db.status.clone().unwrap_or_default()
}

/// Status with only the phase changed
pub fn with_phase(db: &ParadeDB, phase: ParadeDBPhase) -> ParadeDBStatus {
    ParadeDBStatus {
        phase: Some(phase),
        ..current_status(db)
    }
}

/// Status recorded when a pass fails
pub fn failed(db: &ParadeDB, message: &str) -> ParadeDBStatus {
    let current = current_status(db);
    let generation = db.metadata.generation;
    let conditions = ConditionBuilder::from_existing(current.conditions.clone(), generation)
        .degraded(true, "ReconciliationFailed", message)
        .build();

    ParadeDBStatus {
        phase: Some(ParadeDBPhase::Failed),
        conditions,
        message: Some(message.to_string()),
        observed_generation: generation,
        ..current
    }
}

/// Status computed at the end of a successful pass
pub fn aggregate(db: &ParadeDB, observed: Observed, cluster_domain: &str) -> ParadeDBStatus {
    let current = current_status(db);
    let generation = db.metadata.generation;
    let namespace = db.namespace().unwrap_or_default();
    let desired = db.replicas();
    let ready = observed.ready_replicas.unwrap_or(0).clamp(0, desired.max(0));
    let phase = phase_for(ready, desired);

    let builder = ConditionBuilder::from_existing(current.conditions.clone(), generation);
    let (builder, message) = match phase {
        ParadeDBPhase::Running => {
            let message = format!("All {} replicas ready", desired);
            let builder = builder
                .ready(true, "AllReplicasReady", &message)
                .progressing(false, "Stable", "All managed resources are in sync");
            (builder, message)
        }
        ParadeDBPhase::Updating => {
            let message = format!("Scaling: {}/{} replicas ready", ready, desired);
            let builder = builder
                .ready(false, "ReplicasNotReady", &message)
                .progressing(true, "Scaling", &message);
            (builder, message)
        }
        _ => {
            let message = format!("Waiting for replicas: 0/{} ready", desired);
            let builder = builder
                .ready(false, "ReplicasNotReady", &message)
                .progressing(true, "Creating", &message);
            (builder, message)
        }
    };
    let conditions = builder
        .degraded(false, "ReconciliationSucceeded", "Last reconciliation succeeded")
        .build();

    let pooler_endpoint = db
        .is_connection_pooling_enabled()
        .then(|| endpoint(&db.pooler_name(), &namespace, cluster_domain));

    ParadeDBStatus {
        phase: Some(phase),
        ready_replicas: ready,
        current_version: Some(db.spec.image.clone()),
        endpoint: Some(endpoint(&db.service_name(), &namespace, cluster_domain)),
        pooler_endpoint,
        last_backup: observed.last_backup.or(current.last_backup),
        last_backup_size: current.last_backup_size,
        conditions,
        observed_generation: generation,
        message: Some(message),
        retained_resources: observed.retained_resources,
    }
}
