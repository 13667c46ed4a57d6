//! cert-manager Certificate resource generation
//!
//! When `spec.tls.certManager.enabled` is set, the operator asks cert-manager
//! for a server certificate. cert-manager stores the issued key pair in the
//! Secret `<name>-tls`, which the database pods mount.
//!
//! Reference: https://cert-manager.io/docs/concepts/certificate/

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

use crate::crd::ParadeDB;
use crate::resources::common::{object_meta, standard_labels};

/// Subset of cert-manager's Certificate spec the operator sets
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "cert-manager.io",
    version = "v1",
    kind = "Certificate",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Name of the Secret to store the certificate
    pub secret_name: String,

    /// Reference to the issuer (Issuer or ClusterIssuer)
    pub issuer_ref: CertIssuerRef,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<String>,

    /// Labels for the issued Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_template: Option<SecretTemplate>,
}

/// Reference to a cert-manager issuer
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertIssuerRef {
    pub name: String,
    pub kind: String,
    pub group: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// DNS names covered by the server certificate
pub fn dns_names(db: &ParadeDB, cluster_domain: &str) -> Vec<String> {
    let namespace = db.namespace().unwrap_or_default();
    let mut names = Vec::new();
    let mut hosts = vec![db.service_name(), db.headless_service_name()];
    if db.is_connection_pooling_enabled() {
        hosts.push(db.pooler_name());
    }
    for host in hosts {
        names.push(host.clone());
        names.push(format!("{}.{}", host, namespace));
        names.push(format!("{}.{}.{}", host, namespace, cluster_domain));
    }
    // Individual StatefulSet pods
    names.push(format!(
        "*.{}.{}.{}",
        db.headless_service_name(),
        namespace,
        cluster_domain
    ));
    names
}

/// Generate the `<name>-tls` Certificate
///
/// Returns None unless TLS is enabled through cert-manager with an issuer.
pub fn generate_certificate(db: &ParadeDB, cluster_domain: &str) -> Option<Certificate> {
    if !db.is_cert_manager_enabled() {
        return None;
    }
    let issuer_ref = db
        .spec
        .tls
        .as_ref()
        .and_then(|t| t.cert_manager.as_ref())
        .and_then(|c| c.issuer_ref.as_ref())?;

    let mut labels = standard_labels(db);
    labels.insert("app.kubernetes.io/component".to_string(), "tls".to_string());

    let spec = CertificateSpec {
        secret_name: db.tls_certificate_name(),
        issuer_ref: CertIssuerRef {
            name: issuer_ref.name.clone(),
            kind: issuer_ref.kind.clone(),
            group: "cert-manager.io".to_string(),
        },
        dns_names: dns_names(db, cluster_domain),
        usages: vec![
            "server auth".to_string(),
            "digital signature".to_string(),
            "key encipherment".to_string(),
        ],
        secret_template: Some(SecretTemplate {
            labels: labels.clone(),
        }),
    };

    let mut certificate = Certificate::new(&db.tls_certificate_name(), spec);
    certificate.metadata = object_meta(db, db.tls_certificate_name(), labels);
    Some(certificate)
}
