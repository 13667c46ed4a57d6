//! Common utilities for Kubernetes resource generation
//!
//! This module provides shared functions and constants used across
//! all resource generators to ensure consistency and reduce duplication.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ResourceRequirements as K8sResources, SecretKeySelector};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use kube::core::ObjectMeta;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::crd::{ParadeDB, ResourceList, ResourceRequirements};

/// API version for the ParadeDB CRD
pub const API_VERSION: &str = "database.paradedb.io/v1alpha1";

/// Kind for the ParadeDB CRD
pub const KIND: &str = "ParadeDB";

/// Operator field manager name
pub const FIELD_MANAGER: &str = "paradedb-operator";

/// Annotation carrying the hash of the desired spec of workload objects.
/// The API server defaults many template fields, so drift is detected against
/// this hash instead of a structural comparison.
pub const SPEC_HASH_ANNOTATION: &str = "database.paradedb.io/spec-hash";

/// Pod annotation carrying the hash of the rendered configuration files
pub const CONFIG_HASH_ANNOTATION: &str = "database.paradedb.io/config-hash";

/// PostgreSQL port exposed by the database and the pooler
pub const POSTGRES_PORT: i32 = 5432;

/// Generate an owner reference for a ParadeDB
///
/// This ensures that all child resources are properly owned by the instance
/// and will be garbage collected when it is deleted.
pub fn owner_reference(db: &ParadeDB) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: db.name_any(),
        uid: db.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Check whether an object is controlled by the given ParadeDB
pub fn is_owned_by(meta: &ObjectMeta, db: &ParadeDB) -> bool {
    let uid = db.metadata.uid.as_deref().unwrap_or_default();
    meta.owner_references.as_ref().is_some_and(|refs| {
        refs.iter()
            .any(|r| r.kind == KIND && r.name == db.name_any() && (uid.is_empty() || r.uid == uid))
    })
}

/// Standard labels for all database resources belonging to a ParadeDB
pub fn standard_labels(db: &ParadeDB) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "paradedb".to_string()),
        ("app.kubernetes.io/instance".to_string(), db.name_any()),
        (
            "app.kubernetes.io/version".to_string(),
            db.spec.postgres_version.clone(),
        ),
        (
            "app.kubernetes.io/component".to_string(),
            "database".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
    ])
}

/// Labels used to select the database pods
pub fn selector_labels(db: &ParadeDB) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "paradedb".to_string()),
        ("app.kubernetes.io/instance".to_string(), db.name_any()),
    ])
}

/// Metadata for an object named `name` in the ParadeDB's namespace.
///
/// The owner reference is stamped by the syncer when the object is created.
pub fn object_meta(db: &ParadeDB, name: String, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: db.namespace(),
        labels: Some(labels),
        ..Default::default()
    }
}

/// Hex-encoded SHA-256 of the JSON form of `value`
pub fn spec_hash<T: Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("{:x}", digest)[..16].to_string()
}

/// Environment variable sourced from a Secret key
pub fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Plain environment variable
pub fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn quantities(list: &ResourceList) -> Option<BTreeMap<String, Quantity>> {
    let mut map = BTreeMap::new();
    if let Some(cpu) = &list.cpu {
        map.insert("cpu".to_string(), Quantity(cpu.clone()));
    }
    if let Some(memory) = &list.memory {
        map.insert("memory".to_string(), Quantity(memory.clone()));
    }
    if map.is_empty() { None } else { Some(map) }
}

/// Convert CRD resource requirements into the container form
pub fn container_resources(resources: Option<&ResourceRequirements>) -> Option<K8sResources> {
    let resources = resources?;
    Some(K8sResources {
        limits: resources.limits.as_ref().and_then(quantities),
        requests: resources.requests.as_ref().and_then(quantities),
        ..Default::default()
    })
}

/// Storage request for a PVC
pub fn storage_request(size: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([("storage".to_string(), Quantity(size.to_string()))])
}
