//! getReplicationGroupSecurityGroups - collect the VPC security groups of a
//! replication group's member clusters.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Handler, Outputs, put, put_list};
use crate::criteria::Properties;
use crate::error::{HandlerError, ProviderError, Result};
use crate::fetch::fan_out;
use crate::invocation::InvocationContext;
use crate::matching::{AVAILABLE_STATES, Candidate, ScoreCard, require_status, select};
use crate::provider::ElastiCache;
use crate::provider::elasticache::{CacheCluster, ReplicationGroup};

const NOUN: &str = "Replication Group";

impl Candidate for ReplicationGroup {
    fn id(&self) -> &str {
        &self.replication_group_id
    }

    fn lifecycle(&self) -> Option<&str> {
        Some(&self.status)
    }
}

pub struct ReplicationGroupHandler {
    elasticache: Arc<dyn ElastiCache>,
}

impl ReplicationGroupHandler {
    pub fn new(elasticache: Arc<dyn ElastiCache>) -> Self {
        Self { elasticache }
    }

    pub async fn find(&self, description: &str) -> Result<ReplicationGroup> {
        let groups = self.elasticache.describe_replication_groups().await?;
        info!(count = groups.len(), "Described replication groups");

        let group = select(groups, |g| {
            ScoreCard::gate(g.description == description).score()
        })
        .into_unique(NOUN)?;

        require_status(&group, &AVAILABLE_STATES, || {
            format!("Matching {NOUN} is not available.")
        })?;
        Ok(group)
    }

    /// Describe every member cluster concurrently.
    async fn members(&self, group: &ReplicationGroup) -> Result<Vec<CacheCluster>> {
        if group.member_clusters.is_empty() {
            return Err(HandlerError::NotFound(
                "No Replication Group member clusters could be found.".to_string(),
            ));
        }

        let elasticache = self.elasticache.as_ref();
        let described = fan_out(&group.member_clusters, move |id| {
            let id = id.clone();
            async move {
                let mut clusters = elasticache.describe_cache_clusters(Some(&id), true).await?;
                clusters.retain(|c| c.cache_cluster_id == id);
                clusters.pop().ok_or_else(|| {
                    ProviderError::new("CacheClusterNotFound", format!("CacheCluster not found: {id}"))
                })
            }
        })
        .await?;
        info!(count = described.len(), "Described member clusters");
        Ok(described)
    }
}

/// Active security group ids, first-seen order, without duplicates.
fn security_group_ids(clusters: &[CacheCluster]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in clusters.iter().flat_map(|c| c.active_security_group_ids()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[async_trait]
impl Handler for ReplicationGroupHandler {
    fn name(&self) -> &'static str {
        "getReplicationGroupSecurityGroups"
    }

    fn primary_property(&self) -> &'static str {
        "Description"
    }

    async fn apply(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let description = properties.required_str("Description")?;
        let group = self.find(&description).await?;
        info!(group = %group.replication_group_id, members = group.member_clusters.len(), "Matched replication group");

        let members = self.members(&group).await?;
        for cluster in &members {
            require_status(cluster, &AVAILABLE_STATES, || {
                "Underlying Cache Cluster is not available.".to_string()
            })?;
        }

        let ids = security_group_ids(&members);
        let mut outputs = Outputs::new();
        put(&mut outputs, "SecurityGroupsIds", ids.join(","));
        put_list(&mut outputs, "SecurityGroups", ids);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use serde_json::json;

    fn cluster(id: &str, status: &str, groups: &[&str]) -> serde_json::Value {
        json!({
            "CacheClusterId": id,
            "CacheClusterStatus": status,
            "SecurityGroups": groups
                .iter()
                .map(|g| json!({"SecurityGroupId": g, "Status": "active"}))
                .collect::<Vec<_>>()
        })
    }

    fn provider(members: &[&str], clusters: Vec<serde_json::Value>) -> Arc<MemoryProvider> {
        Arc::new(
            MemoryProvider::from_json(
                &json!({
                    "ReplicationGroups": [{
                        "ReplicationGroupId": "rg-1",
                        "Description": "sessions",
                        "Status": "available",
                        "MemberClusters": members
                    }],
                    "CacheClusters": clusters
                })
                .to_string(),
            )
            .unwrap(),
        )
    }

    fn props() -> Properties {
        Properties::from_value(json!({"Description": "sessions"})).unwrap()
    }

    #[tokio::test]
    async fn test_security_groups_are_deduplicated_in_order() {
        let p = provider(
            &["rg-1-001", "rg-1-002"],
            vec![
                cluster("rg-1-001", "available", &["sg-b", "sg-a"]),
                cluster("rg-1-002", "available", &["sg-a", "sg-c"]),
            ],
        );
        let out = ReplicationGroupHandler::new(p.clone())
            .apply(&props(), &InvocationContext::default())
            .await
            .unwrap();

        assert_eq!(out["SecurityGroups"], json!(["sg-b", "sg-a", "sg-c"]));
        assert_eq!(out["SecurityGroupsIds"], "sg-b,sg-a,sg-c");

        let described = p
            .calls()
            .await
            .into_iter()
            .filter(|c| c == "DescribeCacheClusters")
            .count();
        assert_eq!(described, 2);
    }

    #[tokio::test]
    async fn test_unavailable_member_fails() {
        let p = provider(
            &["rg-1-001", "rg-1-002"],
            vec![
                cluster("rg-1-001", "available", &["sg-a"]),
                cluster("rg-1-002", "snapshotting", &["sg-a"]),
            ],
        );
        let err = ReplicationGroupHandler::new(p)
            .apply(&props(), &InvocationContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Underlying Cache Cluster is not available.");
    }

    #[tokio::test]
    async fn test_no_members() {
        let p = provider(&[], vec![]);
        let err = ReplicationGroupHandler::new(p)
            .apply(&props(), &InvocationContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No Replication Group member clusters could be found.");
    }

    #[tokio::test]
    async fn test_member_lookup_failure_aborts() {
        let p = provider(
            &["rg-1-001", "rg-1-404"],
            vec![cluster("rg-1-001", "available", &["sg-a"])],
        );
        let err = ReplicationGroupHandler::new(p)
            .apply(&props(), &InvocationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Provider(e) if e.is("CacheClusterNotFound")));
    }
}
