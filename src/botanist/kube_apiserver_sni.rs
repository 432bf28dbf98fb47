// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! SNI passthrough of a shoot's kube-apiserver through the seed's istio ingress gateway.

use crate::constants::{DEFAULT_DOMAIN, OPERATOR_NAME};
use crate::error::Result;
use futures::future::BoxFuture;
use kube::{
    api::{ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams},
    Api, Client,
};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

pub const VIRTUAL_SERVICE_NAME: &str = "kube-apiserver";
const GATEWAY_NAME: &str = "kube-apiserver";
const HTTPS_PORT: u16 = 443;

/// A component of a shoot control plane that can be deployed and torn down
pub trait DeployWaiter: Send + Sync {
    fn deploy(&self) -> BoxFuture<'_, Result<()>>;
    fn destroy(&self) -> BoxFuture<'_, Result<()>>;
    fn wait(&self) -> BoxFuture<'_, Result<()>>;
    fn wait_cleanup(&self) -> BoxFuture<'_, Result<()>>;
}

/// Rollout phase of SNI for the seed's kube-apiservers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniPhase {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

impl SniPhase {
    pub fn is_enabled(self) -> bool {
        self == SniPhase::Enabled
    }
}

fn virtual_service_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk("networking.istio.io", "v1beta1", "VirtualService");
    ApiResource::from_gvk_with_plural(&gvk, "virtualservices")
}

/// The istio VirtualService routing TLS traffic for `hosts` to the kube-apiserver in `namespace`
pub struct Sni {
    client: Client,
    namespace: String,
    hosts: Vec<String>,
}

impl Sni {
    pub fn new(client: Client, namespace: &str, hosts: Vec<String>) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
            hosts,
        }
    }

    fn api(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &virtual_service_resource())
    }

    fn virtual_service(&self) -> DynamicObject {
        let resource = virtual_service_resource();
        let mut vs = DynamicObject::new(VIRTUAL_SERVICE_NAME, &resource).within(&self.namespace);
        vs.metadata.labels = Some(BTreeMap::from([
            ("app".to_string(), "kubernetes".to_string()),
            ("role".to_string(), "apiserver".to_string()),
        ]));
        let destination = format!("kube-apiserver.{}.svc.{}", self.namespace, DEFAULT_DOMAIN);
        vs.data = json!({
            "spec": {
                "exportTo": ["*"],
                "hosts": self.hosts,
                "gateways": [GATEWAY_NAME],
                "tls": [{
                    "match": [{"port": HTTPS_PORT, "sniHosts": self.hosts}],
                    "route": [{"destination": {"host": destination, "port": {"number": HTTPS_PORT}}}]
                }]
            }
        });
        vs
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn apply(&self) -> Result<()> {
        let pp = PatchParams::apply(OPERATOR_NAME).force();
        self.api()
            .patch(VIRTUAL_SERVICE_NAME, &pp, &Patch::Apply(&self.virtual_service()))
            .await?;
        info!("Applied VirtualService for hosts {:?}", self.hosts);
        Ok(())
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn delete(&self) -> Result<()> {
        match self.api().delete(VIRTUAL_SERVICE_NAME, &DeleteParams::default()).await {
            Ok(_) => info!("Deleted VirtualService"),
            Err(kube::Error::Api(e)) if e.code == 404 => debug!("VirtualService already gone"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

impl DeployWaiter for Sni {
    fn deploy(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.apply())
    }

    fn destroy(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.delete())
    }

    fn wait(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn wait_cleanup(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Whether any shoot on the seed is exposed through SNI
pub async fn any_deployed_sni(client: &Client) -> Result<bool> {
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &virtual_service_resource());
    let lp = ListParams::default()
        .fields(&format!("metadata.name={}", VIRTUAL_SERVICE_NAME))
        .limit(1);
    match api.list_metadata(&lp).await {
        Ok(list) => Ok(!list.items.is_empty()),
        // istio is not installed
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Annotations of the kube-apiserver service. Exposure class annotations are
/// only added while the service is still exposed through its own load balancer.
pub fn kube_apiserver_service_annotations(
    seed_annotations: &BTreeMap<String, String>,
    exposure_class_annotations: Option<&BTreeMap<String, String>>,
    sni_phase: SniPhase,
) -> BTreeMap<String, String> {
    let mut annotations = seed_annotations.clone();
    if let Some(extra) = exposure_class_annotations {
        if !sni_phase.is_enabled() {
            annotations.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    annotations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{requests_with_method, to_json, MockService, RecordedRequest};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    const VS_PATH: &str = "/apis/networking.istio.io/v1beta1/namespaces/shoot--dev--a/virtualservices/kube-apiserver";

    fn sni(mock: MockService) -> (Sni, Arc<Mutex<Vec<RecordedRequest>>>) {
        let (client, log) = mock.into_client_with_log();
        (
            Sni::new(client, "shoot--dev--a", vec!["api.a.dev.example.com".to_string()]),
            log,
        )
    }

    #[tokio::test]
    async fn test_deploy_applies_virtual_service() {
        let (sni, log) = sni(MockService::new().on_patch(VS_PATH, 200, "{}"));
        sni.deploy().await.unwrap();
        sni.wait().await.unwrap();

        let patches = requests_with_method(&log, "PATCH");
        assert_eq!(patches.len(), 1);
        let body: Value = serde_json::from_str(&patches[0].body).unwrap();
        assert_eq!(body["kind"], "VirtualService");
        assert_eq!(body["metadata"]["labels"]["role"], "apiserver");
        assert_eq!(body["spec"]["gateways"][0], "kube-apiserver");
        assert_eq!(body["spec"]["tls"][0]["match"][0]["sniHosts"][0], "api.a.dev.example.com");
        assert_eq!(
            body["spec"]["tls"][0]["route"][0]["destination"]["host"],
            "kube-apiserver.shoot--dev--a.svc.cluster.local"
        );
    }

    #[tokio::test]
    async fn test_destroy_ignores_missing() {
        let (sni, log) = sni(MockService::new());
        sni.destroy().await.unwrap();
        sni.wait_cleanup().await.unwrap();
        assert_eq!(requests_with_method(&log, "DELETE").len(), 1);
    }

    #[tokio::test]
    async fn test_any_deployed_sni() {
        let list = json!({
            "apiVersion": "meta.k8s.io/v1",
            "kind": "PartialObjectMetadataList",
            "metadata": {},
            "items": [{"apiVersion": "meta.k8s.io/v1", "kind": "PartialObjectMetadata", "metadata": {"name": "kube-apiserver", "namespace": "shoot--dev--a"}}]
        });
        let client = MockService::new()
            .on_get("/apis/networking.istio.io/v1beta1/virtualservices", 200, &to_json(&list))
            .into_client();
        assert!(any_deployed_sni(&client).await.unwrap());

        assert!(!any_deployed_sni(&MockService::new().into_client()).await.unwrap());
    }

    #[test]
    fn test_service_annotations() {
        let seed = BTreeMap::from([("a".to_string(), "seed".to_string())]);
        let exposure = BTreeMap::from([
            ("a".to_string(), "class".to_string()),
            ("b".to_string(), "class".to_string()),
        ]);

        let merged = kube_apiserver_service_annotations(&seed, Some(&exposure), SniPhase::Disabled);
        assert_eq!(merged, exposure);

        let sni = kube_apiserver_service_annotations(&seed, Some(&exposure), SniPhase::Enabled);
        assert_eq!(sni, seed);

        assert_eq!(kube_apiserver_service_annotations(&seed, None, SniPhase::Enabling), seed);
    }
}
