// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Admission plugin that only lets gardenlets create or change objects of
//! their own seed.

use super::SeedIdentity;
use crate::constants::{seed_identity, GARDENLET_LEADER_ELECTION_LEASE};
use crate::error::Result;
use crate::types::{
    backup::{BackupBucket, BackupEntry},
    bastion::Bastion,
    managedseed::ManagedSeed,
    shoot::Shoot,
};
use futures::future::{BoxFuture, FutureExt};
use k8s_openapi::ByteString;
use kube::{
    core::{
        admission::{AdmissionRequest, AdmissionResponse, Operation},
        DynamicObject,
    },
    Api, Client,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument};
use x509_parser::prelude::{FromDer, GeneralName, ParsedExtension, X509CertificationRequest};

const CORE_GROUP: &str = "core.gardener.cloud";
const OPERATIONS_GROUP: &str = "operations.gardener.cloud";
const COORDINATION_GROUP: &str = "coordination.k8s.io";
const CERTIFICATES_GROUP: &str = "certificates.k8s.io";

const CSR_PEM_TAG: &str = "CERTIFICATE REQUEST";
const SEED_CLIENT_USAGES: [&str; 3] = ["key encipherment", "digital signature", "client auth"];

/// Lookups needed to relate an object to a seed
pub trait ObjectReader: Send + Sync {
    fn shoot<'a>(&'a self, namespace: &'a str, name: &'a str) -> BoxFuture<'a, Result<Shoot>>;
    fn backup_bucket<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<BackupBucket>>;
    /// `None` when the ManagedSeed does not exist
    fn managed_seed<'a>(&'a self, namespace: &'a str, name: &'a str) -> BoxFuture<'a, Result<Option<ManagedSeed>>>;
}

impl ObjectReader for Client {
    fn shoot<'a>(&'a self, namespace: &'a str, name: &'a str) -> BoxFuture<'a, Result<Shoot>> {
        async move { Ok(Api::<Shoot>::namespaced(self.clone(), namespace).get(name).await?) }.boxed()
    }

    fn backup_bucket<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<BackupBucket>> {
        async move { Ok(Api::<BackupBucket>::all(self.clone()).get(name).await?) }.boxed()
    }

    fn managed_seed<'a>(&'a self, namespace: &'a str, name: &'a str) -> BoxFuture<'a, Result<Option<ManagedSeed>>> {
        async move {
            Ok(Api::<ManagedSeed>::namespaced(self.clone(), namespace)
                .get_opt(name)
                .await?)
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied { code: u16, message: String },
}

impl Verdict {
    fn forbidden(identity: &SeedIdentity) -> Self {
        Self::Denied {
            code: 403,
            message: format!("object does not belong to seed {:?}", identity.name),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::Denied {
            code: 400,
            message: message.into(),
        }
    }

    fn internal_error(err: impl std::fmt::Display) -> Self {
        Self::Denied {
            code: 500,
            message: err.to_string(),
        }
    }

    fn owned_by(identity: &SeedIdentity, seed_name: Option<&str>) -> Self {
        if identity.owns(seed_name) {
            Self::Allowed
        } else {
            Self::forbidden(identity)
        }
    }
}

fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

fn unexpected_operation(operation: &Operation) -> Verdict {
    Verdict::bad_request(format!("unexpected operation: {:?}", operation_name(operation)))
}

fn decode<K: DeserializeOwned>(request: &AdmissionRequest<DynamicObject>) -> std::result::Result<K, String> {
    let object = request.object.as_ref().ok_or("request does not contain an object")?;
    let value = serde_json::to_value(object).map_err(|e| e.to_string())?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}

pub struct SeedRestriction<R> {
    reader: R,
    garden_namespace: String,
}

impl<R: ObjectReader> SeedRestriction<R> {
    pub fn new(reader: R, garden_namespace: impl Into<String>) -> Self {
        Self {
            reader,
            garden_namespace: garden_namespace.into(),
        }
    }

    /// Build the admission response for a request
    pub async fn handle(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let response = AdmissionResponse::from(request);
        match self.admit(request).await {
            Verdict::Allowed => {
                let mut response = response;
                response.result.code = 200;
                response
            }
            Verdict::Denied { code, message } => {
                let mut response = response.deny(message);
                response.result.code = code;
                response
            }
        }
    }

    #[instrument(skip(self, request), fields(resource = %request.resource.resource, name = %request.name))]
    pub async fn admit(&self, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        let user = &request.user_info;
        let groups = user.groups.as_deref().unwrap_or_default();
        let Some(identity) = SeedIdentity::from_user(user.username.as_deref().unwrap_or_default(), groups) else {
            return Verdict::Allowed;
        };

        let resource = &request.resource;
        let verdict = match (resource.group.as_str(), resource.resource.as_str()) {
            (CORE_GROUP, "shootstates") | (CORE_GROUP, "shootextensionstatuses") => {
                self.admit_shoot_owned(&identity, request).await
            }
            (CORE_GROUP, "backupbuckets") => self.admit_backup_bucket(&identity, request),
            (CORE_GROUP, "backupentries") => self.admit_backup_entry(&identity, request).await,
            (OPERATIONS_GROUP, "bastions") => self.admit_bastion(&identity, request),
            (COORDINATION_GROUP, "leases") => admit_lease(&identity, request),
            (CORE_GROUP, "seeds") => self.admit_seed(&identity, request).await,
            (CERTIFICATES_GROUP, "certificatesigningrequests") => admit_csr(&identity, request),
            _ => Verdict::Allowed,
        };
        debug!("Seed restriction verdict for seed {}: {:?}", identity.name, verdict);
        verdict
    }

    async fn admit_shoot_owned(&self, identity: &SeedIdentity, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        if request.operation != Operation::Create {
            return unexpected_operation(&request.operation);
        }
        let namespace = request.namespace.as_deref().unwrap_or_default();
        match self.reader.shoot(namespace, &request.name).await {
            Ok(shoot) => Verdict::owned_by(identity, shoot.spec.seed_name.as_deref()),
            Err(e) => Verdict::internal_error(e),
        }
    }

    fn admit_backup_bucket(&self, identity: &SeedIdentity, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        if request.operation != Operation::Create {
            return unexpected_operation(&request.operation);
        }
        match decode::<BackupBucket>(request) {
            Ok(bucket) => Verdict::owned_by(identity, bucket.spec.seed_name.as_deref()),
            Err(e) => Verdict::bad_request(e),
        }
    }

    async fn admit_backup_entry(&self, identity: &SeedIdentity, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        if request.operation != Operation::Create {
            return unexpected_operation(&request.operation);
        }
        let entry = match decode::<BackupEntry>(request) {
            Ok(entry) => entry,
            Err(e) => return Verdict::bad_request(e),
        };
        if !identity.owns(entry.spec.seed_name.as_deref()) {
            return Verdict::forbidden(identity);
        }
        match self.reader.backup_bucket(&entry.spec.bucket_name).await {
            Ok(bucket) => Verdict::owned_by(identity, bucket.spec.seed_name.as_deref()),
            Err(e) => Verdict::internal_error(e),
        }
    }

    fn admit_bastion(&self, identity: &SeedIdentity, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        if request.operation != Operation::Create {
            return unexpected_operation(&request.operation);
        }
        match decode::<Bastion>(request) {
            Ok(bastion) => Verdict::owned_by(identity, bastion.spec.seed_name.as_deref()),
            Err(e) => Verdict::bad_request(e),
        }
    }

    async fn admit_seed(&self, identity: &SeedIdentity, request: &AdmissionRequest<DynamicObject>) -> Verdict {
        if request.operation == Operation::Connect {
            return unexpected_operation(&request.operation);
        }
        if identity.owns(Some(&request.name)) {
            return Verdict::Allowed;
        }

        // A gardenlet may manage the seeds it hosts as managed seeds
        let managed_seed = match self.reader.managed_seed(&self.garden_namespace, &request.name).await {
            Ok(Some(managed_seed)) => managed_seed,
            Ok(None) => return Verdict::forbidden(identity),
            Err(e) => return Verdict::internal_error(e),
        };
        if request.operation == Operation::Delete {
            if managed_seed.metadata.deletion_timestamp.is_none() {
                return Verdict::Denied {
                    code: 403,
                    message: "object can only be deleted if corresponding ManagedSeed has a deletion timestamp"
                        .to_string(),
                };
            }
        } else if managed_seed.spec.seed_template.is_none() {
            return Verdict::forbidden(identity);
        }

        let Some(shoot_ref) = &managed_seed.spec.shoot else {
            return Verdict::forbidden(identity);
        };
        let namespace = managed_seed
            .metadata
            .namespace
            .as_deref()
            .unwrap_or(&self.garden_namespace);
        match self.reader.shoot(namespace, &shoot_ref.name).await {
            Ok(shoot) => Verdict::owned_by(identity, shoot.spec.seed_name.as_deref()),
            Err(e) => Verdict::internal_error(e),
        }
    }
}

fn admit_lease(identity: &SeedIdentity, request: &AdmissionRequest<DynamicObject>) -> Verdict {
    if request.operation != Operation::Create {
        return unexpected_operation(&request.operation);
    }
    if request.name == GARDENLET_LEADER_ELECTION_LEASE {
        return Verdict::Allowed;
    }
    Verdict::owned_by(identity, Some(&request.name))
}

#[derive(Deserialize)]
struct CertificateSigningRequest {
    spec: CertificateSigningRequestSpec,
}

#[derive(Deserialize)]
struct CertificateSigningRequestSpec {
    request: ByteString,
    #[serde(default)]
    usages: Vec<String>,
}

fn admit_csr(identity: &SeedIdentity, request: &AdmissionRequest<DynamicObject>) -> Verdict {
    if request.operation != Operation::Create {
        return unexpected_operation(&request.operation);
    }
    let csr = match decode::<CertificateSigningRequest>(request) {
        Ok(csr) => csr,
        Err(e) => return Verdict::bad_request(e),
    };
    match seed_client_csr(&csr.spec.request.0, &csr.spec.usages) {
        Ok(Some(seed_name)) => Verdict::owned_by(identity, Some(&seed_name)),
        Ok(None) => Verdict::Denied {
            code: 403,
            message: "can only create CSRs for seed clusters".to_string(),
        },
        Err(e) => Verdict::bad_request(e),
    }
}

/// Parses a PEM encoded certificate request and returns the seed name when it
/// asks for a gardenlet client certificate.
fn seed_client_csr(pem_request: &[u8], usages: &[String]) -> std::result::Result<Option<String>, String> {
    let block = pem::parse(pem_request).map_err(|e| e.to_string())?;
    if block.tag() != CSR_PEM_TAG {
        return Err(format!("PEM block type must be {:?}, got {:?}", CSR_PEM_TAG, block.tag()));
    }
    let (_, csr) = X509CertificationRequest::from_der(block.contents()).map_err(|e| e.to_string())?;
    let subject = &csr.certification_request_info.subject;

    let organizations: Vec<&str> = subject.iter_organization().filter_map(|o| o.as_str().ok()).collect();
    if organizations != [seed_identity::GROUP] {
        debug!("CSR organization is not {}", seed_identity::GROUP);
        return Ok(None);
    }

    let has_alt_names = csr.requested_extensions().into_iter().flatten().any(|extension| {
        matches!(extension, ParsedExtension::SubjectAlternativeName(san) if san.general_names.iter().any(|name| {
            matches!(name, GeneralName::DNSName(_) | GeneralName::RFC822Name(_) | GeneralName::IPAddress(_))
        }))
    });
    if has_alt_names {
        debug!("CSR requests DNS names, email or IP addresses");
        return Ok(None);
    }

    let requested: BTreeSet<&str> = usages.iter().map(String::as_str).collect();
    if usages.len() != SEED_CLIENT_USAGES.len() || requested != BTreeSet::from(SEED_CLIENT_USAGES) {
        debug!("CSR usages {:?} do not match a client certificate", usages);
        return Ok(None);
    }

    let common_name = subject.iter_common_name().next().and_then(|cn| cn.as_str().ok());
    Ok(common_name
        .and_then(|cn| cn.strip_prefix(seed_identity::USER_NAME_PREFIX))
        .map(str::to_string))
}
