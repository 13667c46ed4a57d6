//! In-memory stand-ins for the Kubernetes API
//!
//! [`FakeClient`] keeps objects as JSON keyed by kind, namespace and name and
//! enforces resourceVersion checks on writes the way the API server does.
//! [`FakeEvents`] records every published event.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use paradedb_operator::controller::{EventPublisher, ManagedResource, ResourceClient};
use paradedb_operator::crd::{ParadeDB, ParadeDBStatus};
use paradedb_operator::{Error, Result};

type Key = (String, String, String);

fn key<K: ManagedResource>(namespace: &str, name: &str) -> Key {
    (
        K::kind(&()).to_string(),
        namespace.to_string(),
        name.to_string(),
    )
}

/// API error with the given HTTP status code
pub fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::KubeError(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

/// Object store implementing [`ResourceClient`]
#[derive(Default)]
pub struct FakeClient {
    objects: Mutex<BTreeMap<Key, serde_json::Value>>,
    versions: AtomicU64,
    writes: AtomicUsize,
    failing_kinds: Mutex<Vec<String>>,
    stalled_kinds: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.versions.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn check_failure(&self, kind: &str) -> Result<()> {
        if self.failing_kinds.lock().unwrap().iter().any(|k| k == kind) {
            return Err(api_error(500, "InternalError", &format!("{} writes are failing", kind)));
        }
        Ok(())
    }

    fn load<K: ManagedResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(&key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    fn store<K: ManagedResource>(&self, namespace: &str, mut obj: K) -> K {
        let name = obj.name_any();
        obj.meta_mut().namespace = Some(namespace.to_string());
        obj.meta_mut().resource_version = Some(self.next_version());
        let value = serde_json::to_value(&obj).unwrap();
        self.objects
            .lock()
            .unwrap()
            .insert(key::<K>(namespace, &name), value);
        obj
    }

    fn check_version<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K> {
        let name = obj.name_any();
        let live = self
            .load::<K>(namespace, &name)
            .ok_or_else(|| api_error(404, "NotFound", &format!("{} not found", name)))?;
        if obj.resource_version().is_some() && obj.resource_version() != live.resource_version() {
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        Ok(live)
    }

    /// Seed an object without counting it as a write
    pub fn insert<K: ManagedResource>(&self, obj: K) -> K {
        let namespace = obj.namespace().unwrap_or_default();
        self.store(&namespace, obj)
    }

    /// Read an object back
    pub fn fetch<K: ManagedResource>(&self, namespace: &str, name: &str) -> Option<K> {
        self.load(namespace, name)
    }

    pub fn contains<K: ManagedResource>(&self, namespace: &str, name: &str) -> bool {
        self.load::<K>(namespace, name).is_some()
    }

    /// Change a stored object in place, as another actor would
    pub fn modify<K: ManagedResource>(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
        let mut obj = self
            .load::<K>(namespace, name)
            .unwrap_or_else(|| panic!("{} {} not stored", K::kind(&()), name));
        f(&mut obj);
        self.store(namespace, obj);
    }

    /// Names of every stored object of kind `K`
    pub fn names<K: ManagedResource>(&self, namespace: &str) -> Vec<String> {
        let kind = K::kind(&()).to_string();
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    /// Number of writes issued through [`ResourceClient`]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_writes(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Make every create or replace of `kind` fail with a server error
    pub fn fail_writes_of(&self, kind: &str) {
        self.failing_kinds.lock().unwrap().push(kind.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_kinds.lock().unwrap().clear();
    }

    /// Make every read of `kind` hang, as an unresponsive API server would
    pub fn stall_reads_of(&self, kind: &str) {
        self.stalled_kinds.lock().unwrap().push(kind.to_string());
    }
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn get<K: ManagedResource>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let stalled = self
            .stalled_kinds
            .lock()
            .unwrap()
            .iter()
            .any(|k| k == K::kind(&()).as_ref());
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(self.load(namespace, name))
    }

    async fn create<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K> {
        let kind = K::kind(&()).to_string();
        self.check_failure(&kind)?;
        let name = obj.name_any();
        if self.load::<K>(namespace, &name).is_some() {
            return Err(api_error(409, "AlreadyExists", &format!("{} already exists", name)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut obj = obj.clone();
        if obj.meta().uid.is_none() {
            obj.meta_mut().uid = Some(format!("uid-{}", name));
        }
        Ok(self.store(namespace, obj))
    }

    async fn replace<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K> {
        let kind = K::kind(&()).to_string();
        self.check_failure(&kind)?;
        self.check_version(namespace, obj)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.store(namespace, obj.clone()))
    }

    async fn set_finalizers(&self, db: &ParadeDB, finalizers: Vec<String>) -> Result<ParadeDB> {
        let namespace = db.namespace().unwrap_or_default();
        let mut live = self.check_version(&namespace, db)?;
        self.writes.fetch_add(1, Ordering::SeqCst);

        // A deleting object goes away once its last finalizer is released
        if live.metadata.deletion_timestamp.is_some() && finalizers.is_empty() {
            self.objects
                .lock()
                .unwrap()
                .remove(&key::<ParadeDB>(&namespace, &live.name_any()));
            live.metadata.finalizers = None;
            return Ok(live);
        }

        live.metadata.finalizers = Some(finalizers);
        Ok(self.store(&namespace, live))
    }

    async fn update_status(&self, db: &ParadeDB, status: &ParadeDBStatus) -> Result<ParadeDB> {
        let namespace = db.namespace().unwrap_or_default();
        let mut live = self.check_version(&namespace, db)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        live.status = Some(status.clone());
        Ok(self.store(&namespace, live))
    }
}

/// An event captured by [`FakeEvents`]
#[derive(Clone, Debug)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub note: String,
}

/// Event sink that remembers what was published
#[derive(Default)]
pub struct FakeEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl FakeEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.all().into_iter().map(|e| e.reason).collect()
    }

    pub fn count(&self, reason: &str) -> usize {
        self.all().iter().filter(|e| e.reason == reason).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventPublisher for FakeEvents {
    async fn publish(&self, _db: &ParadeDB, type_: EventType, reason: &str, note: String) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}
