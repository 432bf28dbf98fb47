// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Authorization webhook for gardenlets: a seed may access an object only when
//! the dependency graph connects the object to the seed.

use super::graph::{Graph, Vertex, VertexType};
use super::SeedIdentity;
use k8s_openapi::api::authorization::v1::{ResourceAttributes, SubjectAccessReview, SubjectAccessReviewStatus};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    NoOpinion(String),
}

pub struct SeedAuthorizer {
    graph: Arc<Graph>,
}

impl SeedAuthorizer {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }

    pub fn authorize(&self, username: &str, groups: &[String], attributes: Option<&ResourceAttributes>) -> Decision {
        let Some(identity) = SeedIdentity::from_user(username, groups) else {
            return Decision::NoOpinion(String::new());
        };
        if identity.ambiguous {
            return Decision::Allow;
        }
        let Some(attributes) = attributes else {
            return Decision::NoOpinion("only resource requests are handled".to_string());
        };

        let group = attributes.group.as_deref().unwrap_or_default();
        let resource = attributes.resource.as_deref().unwrap_or_default();
        let Some(vertex_type) = VertexType::from_resource(group, resource) else {
            return Decision::NoOpinion(String::new());
        };
        let name = attributes.name.as_deref().unwrap_or_default();
        if name.is_empty() {
            return Decision::NoOpinion("no resource name given".to_string());
        }

        let namespace = match vertex_type {
            VertexType::BackupBucket
            | VertexType::CloudProfile
            | VertexType::Namespace
            | VertexType::Project
            | VertexType::Seed => "",
            _ => attributes.namespace.as_deref().unwrap_or_default(),
        };
        let requested = Vertex::new(vertex_type, namespace, name);
        let seed = Vertex::cluster_scoped(VertexType::Seed, &identity.name);
        if requested == seed || self.graph.has_path_from(&requested, &seed) {
            return Decision::Allow;
        }

        debug!("No path from {} to {}", requested, seed);
        Decision::NoOpinion(format!(
            "no relationship found between seed '{}' and this object",
            identity.name
        ))
    }

    /// Answer a SubjectAccessReview, filling in its status
    pub fn review(&self, mut review: SubjectAccessReview) -> SubjectAccessReview {
        let spec = &review.spec;
        let decision = self.authorize(
            spec.user.as_deref().unwrap_or_default(),
            spec.groups.as_deref().unwrap_or_default(),
            spec.resource_attributes.as_ref(),
        );
        review.status = Some(match decision {
            Decision::Allow => SubjectAccessReviewStatus {
                allowed: true,
                ..Default::default()
            },
            Decision::NoOpinion(reason) => SubjectAccessReviewStatus {
                allowed: false,
                reason: (!reason.is_empty()).then_some(reason),
                ..Default::default()
            },
        });
        review
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::common::SecretReference;
    use crate::types::seed::{Seed, SeedSpec};
    use serde_json::json;

    const SEED_USER: &str = "gardener.cloud:system:seed:seed1";

    fn groups() -> Vec<String> {
        vec!["gardener.cloud:system:seeds".to_string()]
    }

    fn secret_attributes(namespace: &str, name: &str) -> ResourceAttributes {
        ResourceAttributes {
            group: Some(String::new()),
            resource: Some("secrets".to_string()),
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            verb: Some("get".to_string()),
            ..Default::default()
        }
    }

    fn authorizer() -> SeedAuthorizer {
        let graph = Arc::new(Graph::new());
        graph.upsert(&Seed::new(
            "seed1",
            SeedSpec {
                secret_ref: Some(SecretReference {
                    namespace: "garden".to_string(),
                    name: "seed1-kubeconfig".to_string(),
                }),
                ..Default::default()
            },
        ));
        SeedAuthorizer::new(graph)
    }

    #[test]
    fn test_allows_reachable_secret() {
        let attrs = secret_attributes("garden", "seed1-kubeconfig");
        assert_eq!(authorizer().authorize(SEED_USER, &groups(), Some(&attrs)), Decision::Allow);
    }

    #[test]
    fn test_no_opinion_for_foreign_secret() {
        let attrs = secret_attributes("garden", "seed2-kubeconfig");
        let decision = authorizer().authorize(SEED_USER, &groups(), Some(&attrs));
        assert_eq!(
            decision,
            Decision::NoOpinion("no relationship found between seed 'seed1' and this object".to_string())
        );
    }

    #[test]
    fn test_own_seed_and_ambiguous_identity() {
        let attrs = ResourceAttributes {
            group: Some("core.gardener.cloud".to_string()),
            resource: Some("seeds".to_string()),
            name: Some("seed1".to_string()),
            ..Default::default()
        };
        assert_eq!(authorizer().authorize(SEED_USER, &groups(), Some(&attrs)), Decision::Allow);

        let attrs = secret_attributes("garden", "anything");
        let decision = authorizer().authorize("gardener.cloud:system:seed:<ambiguous>", &groups(), Some(&attrs));
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn test_untracked_resources_and_users() {
        let attrs = ResourceAttributes {
            group: Some("apps".to_string()),
            resource: Some("deployments".to_string()),
            name: Some("x".to_string()),
            ..Default::default()
        };
        assert_eq!(
            authorizer().authorize(SEED_USER, &groups(), Some(&attrs)),
            Decision::NoOpinion(String::new())
        );
        let attrs = secret_attributes("garden", "seed1-kubeconfig");
        assert_eq!(
            authorizer().authorize("alice", &[], Some(&attrs)),
            Decision::NoOpinion(String::new())
        );
    }

    #[test]
    fn test_review_fills_status() {
        let review: SubjectAccessReview = serde_json::from_value(json!({
            "apiVersion": "authorization.k8s.io/v1",
            "kind": "SubjectAccessReview",
            "spec": {
                "user": SEED_USER,
                "groups": groups(),
                "resourceAttributes": {
                    "group": "", "resource": "secrets", "verb": "get",
                    "namespace": "garden", "name": "seed1-kubeconfig"
                }
            }
        }))
        .unwrap();

        let status = authorizer().review(review).status.unwrap();
        assert!(status.allowed);
        assert_eq!(status.reason, None);
    }
}
