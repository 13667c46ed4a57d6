//! Idempotent get-or-create-or-update of owned objects
//!
//! [`ensure`] reads the live object, creates it when missing and otherwise
//! copies the operator-owned fields of the desired object onto it, writing
//! only when something actually changed. Fields assigned by the API server
//! (clusterIP, resourceVersion, status, defaulted template fields) are never
//! touched.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, PersistentVolumeClaim, PodSpec, PodTemplateSpec, Secret, Service, ServicePort,
};
use kube::core::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::client::{ManagedResource, ResourceClient};
use crate::controller::error::{Error, Result};
use crate::crd::ParadeDB;
use crate::resources::certificate::Certificate;
use crate::resources::common::{SPEC_HASH_ANNOTATION, owner_reference};
use crate::resources::service_monitor::ServiceMonitor;

/// How an existing object is treated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Overwrite drifted operator-owned fields
    Converge,
    /// Leave an existing object alone
    CreateOnly,
}

/// What [`ensure`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Objects whose operator-owned fields can be merged onto a live copy
pub trait Reconcilable: ManagedResource {
    /// Copy the operator-owned fields of `desired` onto `self`.
    /// Returns true when `self` changed.
    fn merge_from(&mut self, desired: &Self) -> bool;
}

fn assign<T: PartialEq + Clone>(target: &mut T, value: &T) -> bool {
    if target == value {
        false
    } else {
        *target = value.clone();
        true
    }
}

/// Insert every desired entry into `live`, keeping foreign keys
fn merge_map(live: &mut Option<BTreeMap<String, String>>, desired: &Option<BTreeMap<String, String>>) -> bool {
    let Some(desired) = desired else {
        return false;
    };
    let live = live.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in desired {
        if live.get(key) != Some(value) {
            live.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

fn merge_meta(live: &mut ObjectMeta, desired: &ObjectMeta) -> bool {
    let labels = merge_map(&mut live.labels, &desired.labels);
    let annotations = merge_map(&mut live.annotations, &desired.annotations);
    labels || annotations
}

fn spec_hash(meta: &ObjectMeta) -> Option<&String> {
    meta.annotations.as_ref()?.get(SPEC_HASH_ANNOTATION)
}

/// Every desired entry is present in `live`
fn contains_map(live: &Option<BTreeMap<String, String>>, desired: &Option<BTreeMap<String, String>>) -> bool {
    let Some(desired) = desired else {
        return true;
    };
    desired
        .iter()
        .all(|(key, value)| live.as_ref().and_then(|l| l.get(key)) == Some(value))
}

fn container_ports(container: &Container) -> Vec<(Option<&str>, i32)> {
    container
        .ports
        .iter()
        .flatten()
        .map(|p| (p.name.as_deref(), p.container_port))
        .collect()
}

fn container_mounts(container: &Container) -> Vec<(&str, &str)> {
    container
        .volume_mounts
        .iter()
        .flatten()
        .map(|m| (m.name.as_str(), m.mount_path.as_str()))
        .collect()
}

fn container_drifted(live: &Container, want: &Container) -> bool {
    live.name != want.name
        || live.image != want.image
        || live.command != want.command
        || live.args != want.args
        || live.env != want.env
        || container_ports(live) != container_ports(want)
        || container_mounts(live) != container_mounts(want)
}

fn containers_drifted(live: Option<&Vec<Container>>, want: Option<&Vec<Container>>) -> bool {
    let live = live.map(Vec::as_slice).unwrap_or_default();
    let want = want.map(Vec::as_slice).unwrap_or_default();
    live.len() != want.len() || live.iter().zip(want).any(|(l, w)| container_drifted(l, w))
}

fn volume_names(spec: &PodSpec) -> Vec<&str> {
    spec.volumes.iter().flatten().map(|v| v.name.as_str()).collect()
}

/// Drift in the operator-owned parts of a pod template
///
/// Only fields the operator sets are compared, so values the API server
/// defaults (pull policy, termination message path, volume modes) never count
/// as drift. Extra labels and annotations on the live template are allowed.
fn template_drifted(live: &PodTemplateSpec, want: &PodTemplateSpec) -> bool {
    let meta = match (&live.metadata, &want.metadata) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(l), Some(w)) => {
            !contains_map(&l.labels, &w.labels) || !contains_map(&l.annotations, &w.annotations)
        }
    };
    let Some(want_spec) = want.spec.as_ref() else {
        return meta;
    };
    let Some(live_spec) = live.spec.as_ref() else {
        return true;
    };
    meta || containers_drifted(Some(&live_spec.containers), Some(&want_spec.containers))
        || containers_drifted(
            live_spec.init_containers.as_ref(),
            want_spec.init_containers.as_ref(),
        )
        || volume_names(live_spec) != volume_names(want_spec)
}

impl Reconcilable for ConfigMap {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let meta = merge_meta(&mut self.metadata, &desired.metadata);
        let data = assign(&mut self.data, &desired.data);
        meta || data
    }
}

impl Reconcilable for Secret {
    fn merge_from(&mut self, desired: &Self) -> bool {
        merge_meta(&mut self.metadata, &desired.metadata)
    }
}

impl Reconcilable for PersistentVolumeClaim {
    fn merge_from(&mut self, desired: &Self) -> bool {
        merge_meta(&mut self.metadata, &desired.metadata)
    }
}

impl Reconcilable for StatefulSet {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let (Some(live), Some(want)) = (self.spec.as_mut(), desired.spec.as_ref()) else {
            return assign(&mut self.spec, &desired.spec);
        };
        let replicas = assign(&mut live.replicas, &want.replicas);
        let template = spec_hash(&self.metadata) != spec_hash(&desired.metadata)
            || template_drifted(&live.template, &want.template);
        if template {
            live.template = want.template.clone();
        }
        let meta = merge_meta(&mut self.metadata, &desired.metadata);
        replicas || template || meta
    }
}

impl Reconcilable for Deployment {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let (Some(live), Some(want)) = (self.spec.as_mut(), desired.spec.as_ref()) else {
            return assign(&mut self.spec, &desired.spec);
        };
        let replicas = assign(&mut live.replicas, &want.replicas);
        let template = spec_hash(&self.metadata) != spec_hash(&desired.metadata)
            || template_drifted(&live.template, &want.template);
        if template {
            live.template = want.template.clone();
        }
        let meta = merge_meta(&mut self.metadata, &desired.metadata);
        replicas || template || meta
    }
}

impl Reconcilable for CronJob {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let (Some(live), Some(want)) = (self.spec.as_mut(), desired.spec.as_ref()) else {
            return assign(&mut self.spec, &desired.spec);
        };
        let schedule = assign(&mut live.schedule, &want.schedule);
        let concurrency = assign(&mut live.concurrency_policy, &want.concurrency_policy);
        let job_drifted = match (live.job_template.spec.as_ref(), want.job_template.spec.as_ref()) {
            (Some(l), Some(w)) => template_drifted(&l.template, &w.template),
            (l, w) => l.is_some() != w.is_some(),
        };
        let template = spec_hash(&self.metadata) != spec_hash(&desired.metadata) || job_drifted;
        if template {
            live.job_template = want.job_template.clone();
        }
        let meta = merge_meta(&mut self.metadata, &desired.metadata);
        schedule || concurrency || template || meta
    }
}

/// Desired ports with node ports carried over from the live Service
fn ports_keeping_node_ports(live: Option<&Vec<ServicePort>>, desired: &[ServicePort], keep: bool) -> Vec<ServicePort> {
    desired
        .iter()
        .map(|port| {
            let mut port = port.clone();
            if keep && port.node_port.is_none() {
                port.node_port = live
                    .and_then(|ports| ports.iter().find(|p| p.name == port.name))
                    .and_then(|p| p.node_port);
            }
            port
        })
        .collect()
}

impl Reconcilable for Service {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let (Some(live), Some(want)) = (self.spec.as_mut(), desired.spec.as_ref()) else {
            return assign(&mut self.spec, &desired.spec);
        };
        let want_type = want.type_.clone().unwrap_or_else(|| "ClusterIP".to_string());
        let live_type = live.type_.clone().unwrap_or_else(|| "ClusterIP".to_string());
        let type_changed = want_type != live_type;
        if type_changed {
            live.type_ = Some(want_type.clone());
        }

        let keep_node_ports = want_type != "ClusterIP";
        let ports = ports_keeping_node_ports(
            live.ports.as_ref(),
            want.ports.as_deref().unwrap_or_default(),
            keep_node_ports,
        );
        let ports = assign(&mut live.ports, &Some(ports));
        let selector = assign(&mut live.selector, &want.selector);
        let meta = merge_meta(&mut self.metadata, &desired.metadata);
        type_changed || ports || selector || meta
    }
}

impl Reconcilable for Certificate {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let meta = merge_meta(&mut self.metadata, &desired.metadata);
        let spec = assign(&mut self.spec, &desired.spec);
        meta || spec
    }
}

impl Reconcilable for ServiceMonitor {
    fn merge_from(&mut self, desired: &Self) -> bool {
        let meta = merge_meta(&mut self.metadata, &desired.metadata);
        let spec = assign(&mut self.spec, &desired.spec);
        meta || spec
    }
}

/// Make the live object named like `desired` match it
///
/// A missing object is created with a controller owner reference to `db`.
/// An existing one is updated only under [`UpdatePolicy::Converge`] and only
/// when its operator-owned fields drifted.
pub async fn ensure<C, K>(client: &C, db: &ParadeDB, mut desired: K, policy: UpdatePolicy) -> Result<SyncOutcome>
where
    C: ResourceClient,
    K: Reconcilable,
{
    let namespace = db
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = desired
        .meta()
        .name
        .clone()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let kind = K::kind(&());

    match client.get::<K>(&namespace, &name).await? {
        None => {
            let meta = desired.meta_mut();
            meta.namespace = Some(namespace.clone());
            meta.owner_references = Some(vec![owner_reference(db)]);
            client.create(&namespace, &desired).await?;
            info!(%kind, %name, "created");
            Ok(SyncOutcome::Created)
        }
        Some(_) if policy == UpdatePolicy::CreateOnly => Ok(SyncOutcome::Unchanged),
        Some(mut live) => {
            if !live.merge_from(&desired) {
                debug!(%kind, %name, "up to date");
                return Ok(SyncOutcome::Unchanged);
            }
            client.replace(&namespace, &live).await?;
            info!(%kind, %name, "updated");
            Ok(SyncOutcome::Updated)
        }
    }
}
