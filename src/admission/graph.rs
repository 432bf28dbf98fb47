// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Dependency graph between Gardener objects and the resources they reference.
//!
//! Every watched object owns the edges derived from its spec. Replacing an
//! object replaces exactly the edges it owns, and a vertex only exists while at
//! least one edge touches it. Seeds use the graph to decide whether a resource
//! is reachable from them.

use crate::types::{
    backup::{BackupBucket, BackupEntry},
    project::Project,
    secretbinding::SecretBinding,
    seed::Seed,
    shoot::Shoot,
};
use futures::StreamExt;
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VertexType {
    BackupBucket,
    BackupEntry,
    CloudProfile,
    ConfigMap,
    Namespace,
    Project,
    Secret,
    SecretBinding,
    Seed,
    Shoot,
}

impl VertexType {
    /// Map an API resource name to the vertex type tracking it
    pub fn from_resource(group: &str, resource: &str) -> Option<Self> {
        match (group, resource) {
            ("", "secrets") => Some(Self::Secret),
            ("", "configmaps") => Some(Self::ConfigMap),
            ("", "namespaces") => Some(Self::Namespace),
            ("core.gardener.cloud", "backupbuckets") => Some(Self::BackupBucket),
            ("core.gardener.cloud", "backupentries") => Some(Self::BackupEntry),
            ("core.gardener.cloud", "cloudprofiles") => Some(Self::CloudProfile),
            ("core.gardener.cloud", "projects") => Some(Self::Project),
            ("core.gardener.cloud", "secretbindings") => Some(Self::SecretBinding),
            ("core.gardener.cloud", "seeds") => Some(Self::Seed),
            ("core.gardener.cloud", "shoots") => Some(Self::Shoot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vertex {
    pub vertex_type: VertexType,
    pub namespace: String,
    pub name: String,
}

impl Vertex {
    pub fn new(vertex_type: VertexType, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vertex_type,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(vertex_type: VertexType, name: impl Into<String>) -> Self {
        Self::new(vertex_type, "", name)
    }
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{:?}/{}", self.vertex_type, self.name)
        } else {
            write!(f, "{:?}/{}/{}", self.vertex_type, self.namespace, self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub from: Vertex,
    pub to: Vertex,
}

impl Edge {
    pub fn new(from: Vertex, to: Vertex) -> Self {
        Self { from, to }
    }
}

/// A watched object that contributes edges to the graph
pub trait GraphSource: Resource + Sized {
    const VERTEX_TYPE: VertexType;

    fn vertex(&self) -> Vertex {
        Vertex::new(Self::VERTEX_TYPE, self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Edges this object owns, derived from its current state
    fn edges(&self) -> Vec<Edge>;
}

impl GraphSource for Seed {
    const VERTEX_TYPE: VertexType = VertexType::Seed;

    fn edges(&self) -> Vec<Edge> {
        let seed = self.vertex();
        let secrets = self
            .spec
            .secret_ref
            .iter()
            .chain(self.spec.backup.as_ref().map(|b| &b.secret_ref));
        secrets
            .map(|r| Edge::new(Vertex::new(VertexType::Secret, &r.namespace, &r.name), seed.clone()))
            .collect()
    }
}

impl GraphSource for Shoot {
    const VERTEX_TYPE: VertexType = VertexType::Shoot;

    fn edges(&self) -> Vec<Edge> {
        let shoot = self.vertex();
        let namespace = shoot.namespace.clone();
        let spec = &self.spec;
        let mut sources = vec![
            Vertex::cluster_scoped(VertexType::Namespace, &namespace),
            Vertex::cluster_scoped(VertexType::CloudProfile, &spec.cloud_profile_name),
        ];
        if !spec.secret_binding_name.is_empty() {
            sources.push(Vertex::new(VertexType::SecretBinding, &namespace, &spec.secret_binding_name));
        }

        let audit_policy = spec
            .kubernetes
            .kube_api_server
            .as_ref()
            .and_then(|k| k.audit_config.as_ref())
            .and_then(|a| a.audit_policy.as_ref())
            .and_then(|p| p.config_map_ref.as_ref());
        if let Some(config_map) = audit_policy {
            sources.push(Vertex::new(VertexType::ConfigMap, &namespace, &config_map.name));
        }

        let dns_secrets = spec
            .dns
            .iter()
            .flat_map(|dns| dns.providers.iter())
            .filter_map(|p| p.secret_name.as_ref());
        sources.extend(dns_secrets.map(|name| Vertex::new(VertexType::Secret, &namespace, name)));

        let resource_secrets = spec
            .resources
            .iter()
            .map(|r| &r.resource_ref)
            .filter(|r| r.api_version == "v1" && r.kind == "Secret");
        sources.extend(resource_secrets.map(|r| Vertex::new(VertexType::Secret, &namespace, &r.name)));

        let mut edges: Vec<Edge> = sources.into_iter().map(|v| Edge::new(v, shoot.clone())).collect();

        let status_seed = self.status.as_ref().and_then(|s| s.seed_name.as_ref());
        for seed_name in spec.seed_name.iter().chain(status_seed) {
            edges.push(Edge::new(
                shoot.clone(),
                Vertex::cluster_scoped(VertexType::Seed, seed_name),
            ));
        }
        edges
    }
}

impl GraphSource for Project {
    const VERTEX_TYPE: VertexType = VertexType::Project;

    fn edges(&self) -> Vec<Edge> {
        self.spec
            .namespace
            .iter()
            .map(|ns| Edge::new(self.vertex(), Vertex::cluster_scoped(VertexType::Namespace, ns)))
            .collect()
    }
}

impl GraphSource for BackupBucket {
    const VERTEX_TYPE: VertexType = VertexType::BackupBucket;

    fn edges(&self) -> Vec<Edge> {
        let bucket = self.vertex();
        let secret = &self.spec.secret_ref;
        let mut edges = vec![Edge::new(
            Vertex::new(VertexType::Secret, &secret.namespace, &secret.name),
            bucket.clone(),
        )];
        if let Some(seed) = &self.spec.seed_name {
            edges.push(Edge::new(bucket, Vertex::cluster_scoped(VertexType::Seed, seed)));
        }
        edges
    }
}

impl GraphSource for BackupEntry {
    const VERTEX_TYPE: VertexType = VertexType::BackupEntry;

    fn edges(&self) -> Vec<Edge> {
        let entry = self.vertex();
        let mut edges = vec![Edge::new(
            entry.clone(),
            Vertex::cluster_scoped(VertexType::BackupBucket, &self.spec.bucket_name),
        )];
        if let Some(seed) = &self.spec.seed_name {
            edges.push(Edge::new(entry, Vertex::cluster_scoped(VertexType::Seed, seed)));
        }
        edges
    }
}

impl GraphSource for SecretBinding {
    const VERTEX_TYPE: VertexType = VertexType::SecretBinding;

    fn edges(&self) -> Vec<Edge> {
        let secret = Vertex::new(VertexType::Secret, self.secret_namespace(), &self.secret_ref.name);
        vec![Edge::new(secret, self.vertex())]
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Edges per owning object
    owned: BTreeMap<Vertex, BTreeSet<Edge>>,
    /// Adjacency with a reference count per edge
    adjacency: BTreeMap<Vertex, BTreeMap<Vertex, usize>>,
}

impl Inner {
    fn add_edge(&mut self, edge: &Edge) {
        *self
            .adjacency
            .entry(edge.from.clone())
            .or_default()
            .entry(edge.to.clone())
            .or_insert(0) += 1;
    }

    fn remove_edge(&mut self, edge: &Edge) {
        let Some(targets) = self.adjacency.get_mut(&edge.from) else {
            return;
        };
        if let Some(count) = targets.get_mut(&edge.to) {
            *count -= 1;
            if *count == 0 {
                targets.remove(&edge.to);
            }
        }
        if targets.is_empty() {
            self.adjacency.remove(&edge.from);
        }
    }

    fn remove_owner(&mut self, owner: &Vertex) {
        if let Some(edges) = self.owned.remove(owner) {
            for edge in &edges {
                self.remove_edge(edge);
            }
        }
    }
}

/// Thread-safe dependency graph shared between the feeders and the authorizer
#[derive(Debug, Default)]
pub struct Graph {
    inner: RwLock<Inner>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace all edges owned by `owner`
    pub fn set_edges(&self, owner: Vertex, edges: impl IntoIterator<Item = Edge>) {
        let edges: BTreeSet<Edge> = edges.into_iter().collect();
        let mut inner = self.write();
        inner.remove_owner(&owner);
        if edges.is_empty() {
            return;
        }
        for edge in &edges {
            inner.add_edge(edge);
        }
        inner.owned.insert(owner, edges);
    }

    pub fn upsert<K: GraphSource>(&self, obj: &K) {
        let owner = obj.vertex();
        debug!("Updating graph edges of {}", owner);
        self.set_edges(owner, obj.edges());
    }

    pub fn remove(&self, owner: &Vertex) {
        debug!("Removing graph edges of {}", owner);
        self.write().remove_owner(owner);
    }

    /// Owners of the given type that currently contribute edges
    pub fn owners(&self, vertex_type: VertexType) -> Vec<Vertex> {
        self.read()
            .owned
            .keys()
            .filter(|v| v.vertex_type == vertex_type)
            .cloned()
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        let inner = self.read();
        let mut vertices: BTreeSet<&Vertex> = BTreeSet::new();
        for (from, targets) in &inner.adjacency {
            vertices.insert(from);
            vertices.extend(targets.keys());
        }
        vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.read().adjacency.values().map(BTreeMap::len).sum()
    }

    /// Breadth-first search for a path from `from` to `to`
    pub fn has_path_from(&self, from: &Vertex, to: &Vertex) -> bool {
        let inner = self.read();
        if !inner.adjacency.contains_key(from) {
            return false;
        }
        let mut visited: BTreeSet<&Vertex> = BTreeSet::from([from]);
        let mut queue: VecDeque<&Vertex> = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            let Some(targets) = inner.adjacency.get(current) else {
                continue;
            };
            for next in targets.keys() {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }
}

/// Applies watch events of one kind to the graph
pub struct GraphFeeder<K> {
    graph: Arc<Graph>,
    relisted: Option<BTreeSet<Vertex>>,
    _kind: std::marker::PhantomData<K>,
}

impl<K: GraphSource> GraphFeeder<K> {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self {
            graph,
            relisted: None,
            _kind: std::marker::PhantomData,
        }
    }

    pub fn apply(&mut self, event: watcher::Event<K>) {
        match event {
            watcher::Event::Apply(obj) => self.graph.upsert(&obj),
            watcher::Event::Delete(obj) => self.graph.remove(&obj.vertex()),
            watcher::Event::Init => self.relisted = Some(BTreeSet::new()),
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(obj.vertex());
                }
                self.graph.upsert(&obj);
            }
            watcher::Event::InitDone => {
                // Objects deleted while the watch was down never produce a Delete event
                let seen = self.relisted.take().unwrap_or_default();
                for owner in self.graph.owners(K::VERTEX_TYPE) {
                    if !seen.contains(&owner) {
                        self.graph.remove(&owner);
                    }
                }
            }
        }
    }
}

/// Keep the graph in sync with all objects of kind `K`
pub async fn feed<K>(graph: Arc<Graph>, api: Api<K>) -> anyhow::Result<()>
where
    K: GraphSource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    info!("Starting graph feeder for {:?}", K::VERTEX_TYPE);
    let mut feeder = GraphFeeder::<K>::new(graph);
    let mut events = watcher(api, watcher::Config::default()).default_backoff().boxed();
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => feeder.apply(event),
            Err(e) => warn!("Graph watch error for {:?}: {}", K::VERTEX_TYPE, e),
        }
    }
    Ok(())
}

/// Run the feeders of all graph-tracked kinds
pub async fn feed_all(graph: Arc<Graph>, client: kube::Client) -> anyhow::Result<()> {
    tokio::try_join!(
        feed::<Seed>(graph.clone(), Api::all(client.clone())),
        feed::<Shoot>(graph.clone(), Api::all(client.clone())),
        feed::<Project>(graph.clone(), Api::all(client.clone())),
        feed::<BackupBucket>(graph.clone(), Api::all(client.clone())),
        feed::<BackupEntry>(graph.clone(), Api::all(client.clone())),
        feed::<SecretBinding>(graph, Api::all(client)),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::backup::{BackupBucketSpec, BackupEntrySpec};
    use crate::types::common::{LocalObjectReference, SecretReference};
    use crate::types::project::ProjectSpec;
    use crate::types::seed::{SeedBackup, SeedSpec};
    use crate::types::shoot::{
        AuditConfig, AuditPolicy, CrossVersionObjectReference, Dns, DnsProvider, KubeApiServerConfig,
        NamedResourceReference, ShootSpec, ShootStatus,
    };

    fn secret_ref(namespace: &str, name: &str) -> SecretReference {
        SecretReference {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    fn seed_vertex(name: &str) -> Vertex {
        Vertex::cluster_scoped(VertexType::Seed, name)
    }

    fn make_seed() -> Seed {
        Seed::new(
            "seed1",
            SeedSpec {
                secret_ref: Some(secret_ref("foo", "bar")),
                backup: Some(SeedBackup {
                    secret_ref: secret_ref("bar", "baz"),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
    }

    fn make_shoot() -> Shoot {
        let mut spec = ShootSpec {
            cloud_profile_name: "cloudprofile1".to_string(),
            secret_binding_name: "secretbinding1".to_string(),
            seed_name: Some("seed1".to_string()),
            dns: Some(Dns {
                providers: vec![
                    DnsProvider {
                        secret_name: Some("dnssecret1".to_string()),
                        ..Default::default()
                    },
                    DnsProvider {
                        secret_name: Some("dnssecret2".to_string()),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            resources: vec![
                NamedResourceReference {
                    name: "r1".to_string(),
                    resource_ref: CrossVersionObjectReference {
                        api_version: "foo".to_string(),
                        kind: "bar".to_string(),
                        name: "resource1".to_string(),
                    },
                },
                NamedResourceReference {
                    name: "r2".to_string(),
                    resource_ref: CrossVersionObjectReference {
                        api_version: "v1".to_string(),
                        kind: "Secret".to_string(),
                        name: "resource2".to_string(),
                    },
                },
            ],
            ..Default::default()
        };
        spec.kubernetes.kube_api_server = Some(KubeApiServerConfig {
            audit_config: Some(AuditConfig {
                audit_policy: Some(AuditPolicy {
                    config_map_ref: Some(LocalObjectReference {
                        name: "auditpolicy1".to_string(),
                    }),
                }),
            }),
        });
        let mut shoot = Shoot::new("shoot1", spec);
        shoot.metadata.namespace = Some("namespace1".to_string());
        shoot
    }

    #[test]
    fn test_seed_edges() {
        let graph = Graph::new();
        let mut seed = make_seed();
        let secret = Vertex::new(VertexType::Secret, "foo", "bar");
        let backup_secret = Vertex::new(VertexType::Secret, "bar", "baz");

        graph.upsert(&seed);
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.has_path_from(&secret, &seed_vertex("seed1")));
        assert!(graph.has_path_from(&backup_secret, &seed_vertex("seed1")));

        seed.spec.secret_ref = None;
        graph.upsert(&seed);
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.has_path_from(&secret, &seed_vertex("seed1")));
        assert!(graph.has_path_from(&backup_secret, &seed_vertex("seed1")));

        seed.spec.backup = None;
        graph.upsert(&seed);
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);

        let seed = make_seed();
        graph.upsert(&seed);
        graph.remove(&seed.vertex());
        assert_eq!(graph.vertex_count(), 0);
        assert!(!graph.has_path_from(&secret, &seed_vertex("seed1")));
    }

    #[test]
    fn test_shoot_edges() {
        let graph = Graph::new();
        let mut shoot = make_shoot();
        let vertex = shoot.vertex();

        graph.upsert(&shoot);
        assert_eq!(graph.vertex_count(), 9);
        assert_eq!(graph.edge_count(), 8);
        for source in [
            Vertex::cluster_scoped(VertexType::Namespace, "namespace1"),
            Vertex::cluster_scoped(VertexType::CloudProfile, "cloudprofile1"),
            Vertex::new(VertexType::SecretBinding, "namespace1", "secretbinding1"),
            Vertex::new(VertexType::ConfigMap, "namespace1", "auditpolicy1"),
            Vertex::new(VertexType::Secret, "namespace1", "dnssecret1"),
            Vertex::new(VertexType::Secret, "namespace1", "resource2"),
        ] {
            assert!(graph.has_path_from(&source, &vertex), "{}", source);
            assert!(graph.has_path_from(&source, &seed_vertex("seed1")), "{}", source);
        }
        assert!(!graph.has_path_from(
            &Vertex::new(VertexType::Secret, "namespace1", "resource1"),
            &vertex
        ));

        shoot.spec.cloud_profile_name = "foo".to_string();
        graph.upsert(&shoot);
        assert_eq!(graph.vertex_count(), 9);
        assert!(!graph.has_path_from(
            &Vertex::cluster_scoped(VertexType::CloudProfile, "cloudprofile1"),
            &vertex
        ));

        shoot.spec.kubernetes.kube_api_server = None;
        shoot.spec.dns = None;
        shoot.spec.resources.clear();
        graph.upsert(&shoot);
        assert_eq!(graph.vertex_count(), 5);
        assert_eq!(graph.edge_count(), 4);

        shoot.spec.seed_name = None;
        graph.upsert(&shoot);
        assert_eq!(graph.vertex_count(), 4);
        assert!(!graph.has_path_from(&vertex, &seed_vertex("seed1")));

        shoot.spec.seed_name = Some("newseed".to_string());
        shoot.status = Some(ShootStatus {
            seed_name: Some("seed-in-status".to_string()),
            ..Default::default()
        });
        graph.upsert(&shoot);
        assert_eq!(graph.vertex_count(), 6);
        assert_eq!(graph.edge_count(), 5);
        assert!(graph.has_path_from(&vertex, &seed_vertex("newseed")));
        assert!(graph.has_path_from(&vertex, &seed_vertex("seed-in-status")));

        graph.remove(&vertex);
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_backup_edges() {
        let graph = Graph::new();
        let bucket = BackupBucket::new(
            "backupbucket1",
            BackupBucketSpec {
                secret_ref: secret_ref("baz", "foo"),
                seed_name: Some("seed1".to_string()),
                ..Default::default()
            },
        );
        let mut entry = BackupEntry::new(
            "backupentry1",
            BackupEntrySpec {
                bucket_name: "backupbucket1".to_string(),
                seed_name: Some("seed1".to_string()),
            },
        );
        entry.metadata.namespace = Some("entryns".to_string());

        graph.upsert(&bucket);
        graph.upsert(&entry);
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.has_path_from(
            &Vertex::new(VertexType::Secret, "baz", "foo"),
            &seed_vertex("seed1")
        ));
        assert!(graph.has_path_from(&entry.vertex(), &bucket.vertex()));

        graph.remove(&bucket.vertex());
        assert_eq!(graph.vertex_count(), 3);
        assert!(graph.has_path_from(&entry.vertex(), &seed_vertex("seed1")));
    }

    #[test]
    fn test_project_and_secret_binding_edges() {
        let graph = Graph::new();
        let mut project = Project::new(
            "project1",
            ProjectSpec {
                namespace: Some("garden-project1".to_string()),
                ..Default::default()
            },
        );
        graph.upsert(&project);
        let namespace = Vertex::cluster_scoped(VertexType::Namespace, "garden-project1");
        assert!(graph.has_path_from(&project.vertex(), &namespace));

        project.spec.namespace = Some("other".to_string());
        graph.upsert(&project);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.has_path_from(&project.vertex(), &namespace));

        let binding = SecretBinding {
            metadata: kube::api::ObjectMeta {
                name: Some("sb1".to_string()),
                namespace: Some("sbns".to_string()),
                ..Default::default()
            },
            secret_ref: secret_ref("", "credentials"),
            quotas: vec![],
        };
        graph.upsert(&binding);
        assert!(graph.has_path_from(
            &Vertex::new(VertexType::Secret, "sbns", "credentials"),
            &binding.vertex()
        ));
    }

    #[test]
    fn test_path_through_shoot_and_binding() {
        let graph = Graph::new();
        graph.upsert(&make_shoot());
        let binding = SecretBinding {
            metadata: kube::api::ObjectMeta {
                name: Some("secretbinding1".to_string()),
                namespace: Some("namespace1".to_string()),
                ..Default::default()
            },
            secret_ref: secret_ref("namespace1", "cloud"),
            quotas: vec![],
        };
        graph.upsert(&binding);

        let cloud_secret = Vertex::new(VertexType::Secret, "namespace1", "cloud");
        assert!(graph.has_path_from(&cloud_secret, &seed_vertex("seed1")));
        assert!(!graph.has_path_from(&cloud_secret, &seed_vertex("seed2")));
        assert!(!graph.has_path_from(&seed_vertex("seed1"), &cloud_secret));
    }

    #[test]
    fn test_feeder_relist_drops_vanished_objects() {
        let graph = Arc::new(Graph::new());
        let mut feeder = GraphFeeder::<Seed>::new(graph.clone());
        let mut other = make_seed();
        other.metadata.name = Some("seed2".to_string());

        feeder.apply(watcher::Event::Apply(make_seed()));
        feeder.apply(watcher::Event::Apply(other));
        assert_eq!(graph.owners(VertexType::Seed).len(), 2);

        feeder.apply(watcher::Event::Init);
        feeder.apply(watcher::Event::InitApply(make_seed()));
        feeder.apply(watcher::Event::InitDone);
        assert_eq!(graph.owners(VertexType::Seed), vec![seed_vertex("seed1")]);

        feeder.apply(watcher::Event::Delete(make_seed()));
        assert_eq!(graph.vertex_count(), 0);
    }
}
