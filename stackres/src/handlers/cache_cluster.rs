//! getElastiCacheClusterByName - look up a cache cluster by id.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Handler, Outputs, put, put_list};
use crate::criteria::Properties;
use crate::error::Result;
use crate::invocation::InvocationContext;
use crate::matching::{AVAILABLE_STATES, Candidate, ScoreCard, require_status, select};
use crate::provider::ElastiCache;
use crate::provider::elasticache::CacheCluster;

const NOUN: &str = "ElastiCache cluster";

impl Candidate for CacheCluster {
    fn id(&self) -> &str {
        &self.cache_cluster_id
    }

    fn lifecycle(&self) -> Option<&str> {
        Some(&self.cache_cluster_status)
    }
}

pub struct CacheClusterHandler {
    elasticache: Arc<dyn ElastiCache>,
}

impl CacheClusterHandler {
    pub fn new(elasticache: Arc<dyn ElastiCache>) -> Self {
        Self { elasticache }
    }

    pub async fn find(&self, cache_cluster_id: &str) -> Result<CacheCluster> {
        let clusters = match self
            .elasticache
            .describe_cache_clusters(Some(cache_cluster_id), false)
            .await
        {
            Ok(clusters) => clusters,
            Err(e) if e.is("CacheClusterNotFound") => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(count = clusters.len(), "Described cache clusters");

        let cluster = select(clusters, |c| {
            ScoreCard::gate(c.cache_cluster_id == cache_cluster_id).score()
        })
        .into_unique(NOUN)?;

        require_status(&cluster, &AVAILABLE_STATES, || {
            format!("Matching {NOUN} is not available.")
        })?;
        Ok(cluster)
    }
}

fn outputs(cluster: &CacheCluster) -> Outputs {
    let mut outputs = Outputs::new();
    put(&mut outputs, "CacheClusterId", cluster.cache_cluster_id.as_str());
    if let Some(endpoint) = &cluster.configuration_endpoint {
        put(
            &mut outputs,
            "ConfigurationEndpoint",
            format!("{}:{}", endpoint.address, endpoint.port),
        );
    }
    put(&mut outputs, "CacheNodeType", cluster.cache_node_type.as_str());
    put(&mut outputs, "Engine", cluster.engine.as_str());
    put(&mut outputs, "EngineVersion", cluster.engine_version.as_str());
    put_list(
        &mut outputs,
        "CacheSecurityGroups",
        cluster.active_cache_security_groups(),
    );
    if let Some(name) = &cluster.cache_subnet_group_name {
        put(&mut outputs, "CacheSubnetGroupName", name.as_str());
    }
    put_list(
        &mut outputs,
        "SecurityGroups",
        cluster.active_security_group_ids(),
    );
    outputs
}

#[async_trait]
impl Handler for CacheClusterHandler {
    fn name(&self) -> &'static str {
        "getElastiCacheClusterByName"
    }

    fn primary_property(&self) -> &'static str {
        "CacheClusterId"
    }

    async fn apply(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let id = properties.required_str("CacheClusterId")?;
        let cluster = self.find(&id).await?;
        info!(cluster = %cluster.cache_cluster_id, status = %cluster.cache_cluster_status, "Matched cache cluster");
        Ok(outputs(&cluster))
    }
}
