//! Kubernetes API access used by the reconciler
//!
//! The reconciler talks to the cluster only through [`ResourceClient`] and
//! [`EventPublisher`], which lets the unit tests drive whole reconciliation
//! passes against an in-memory fake.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event as KubeEvent, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::controller::error::{Error, Result};
use crate::crd::{ParadeDB, ParadeDBStatus};
use crate::resources::common::FIELD_MANAGER;

/// Any namespaced object the operator reads or writes
pub trait ManagedResource:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedResource for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Object storage operations
#[async_trait]
pub trait ResourceClient: Send + Sync + 'static {
    /// Fetch an object; `None` when it does not exist
    async fn get<K: ManagedResource>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    async fn create<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Replace an object. The object's resourceVersion guards the write.
    async fn replace<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K>;

    /// Overwrite the finalizer list of a ParadeDB, guarded by its resourceVersion
    async fn set_finalizers(&self, db: &ParadeDB, finalizers: Vec<String>) -> Result<ParadeDB>;

    /// Overwrite the status of a ParadeDB, guarded by its resourceVersion
    async fn update_status(&self, db: &ParadeDB, status: &ParadeDBStatus) -> Result<ParadeDB>;
}

/// Emits Kubernetes events attached to a ParadeDB
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, db: &ParadeDB, type_: EventType, reason: &str, note: String);
}

fn object_name<K: Resource>(obj: &K) -> Result<String> {
    obj.meta()
        .name
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.name"))
}

/// [`ResourceClient`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get<K: ManagedResource>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.create(&params, obj).await?)
    }

    async fn replace<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.replace(&object_name(obj)?, &params, obj).await?)
    }

    async fn set_finalizers(&self, db: &ParadeDB, finalizers: Vec<String>) -> Result<ParadeDB> {
        let namespace = db.namespace().ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let api: Api<ParadeDB> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": db.resource_version(),
            }
        });
        Ok(api
            .patch(
                &object_name(db)?,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?)
    }

    async fn update_status(&self, db: &ParadeDB, status: &ParadeDBStatus) -> Result<ParadeDB> {
        let namespace = db.namespace().ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let api: Api<ParadeDB> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": db.resource_version(),
            },
            "status": status
        });
        Ok(api
            .patch_status(
                &object_name(db)?,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await?)
    }
}

/// Build an ObjectReference from any kube Resource
pub fn object_ref<K: Resource<DynamicType = ()>>(obj: &K) -> ObjectReference {
    ObjectReference {
        api_version: Some(K::api_version(&()).to_string()),
        kind: Some(K::kind(&()).to_string()),
        name: Some(obj.name_any()),
        namespace: obj.namespace(),
        uid: obj.meta().uid.clone(),
        resource_version: obj.meta().resource_version.clone(),
        ..Default::default()
    }
}

/// [`EventPublisher`] writing events through a kube-runtime [`Recorder`]
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    /// Errors are logged but never block reconciliation.
    async fn publish(&self, db: &ParadeDB, type_: EventType, reason: &str, note: String) {
        let event = KubeEvent {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, &object_ref(db)).await {
            warn!(%e, reason, "failed to publish event");
        }
    }
}
