//! ElastiCache clusters and replication groups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Security group membership status counted as attached.
pub const ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheSecurityGroupMembership {
    pub cache_security_group_name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupMembership {
    pub security_group_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CacheCluster {
    pub cache_cluster_id: String,
    pub cache_cluster_status: String,
    #[serde(default)]
    pub cache_node_type: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub engine_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_subnet_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_endpoint: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_group_id: Option<String>,
    #[serde(default)]
    pub cache_security_groups: Vec<CacheSecurityGroupMembership>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupMembership>,
}

impl CacheCluster {
    /// Ids of security groups whose membership is active.
    pub fn active_security_group_ids(&self) -> impl Iterator<Item = &str> {
        self.security_groups
            .iter()
            .filter(|sg| sg.status == ACTIVE)
            .map(|sg| sg.security_group_id.as_str())
    }

    /// Names of cache security groups whose membership is active.
    pub fn active_cache_security_groups(&self) -> impl Iterator<Item = &str> {
        self.cache_security_groups
            .iter()
            .filter(|sg| sg.status == ACTIVE)
            .map(|sg| sg.cache_security_group_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicationGroup {
    pub replication_group_id: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub member_clusters: Vec<String>,
}

#[async_trait]
pub trait ElastiCache: Send + Sync {
    /// Describe one cluster by id, or every cluster when `cache_cluster_id` is `None`.
    async fn describe_cache_clusters(
        &self,
        cache_cluster_id: Option<&str>,
        show_cache_node_info: bool,
    ) -> Result<Vec<CacheCluster>, ProviderError>;

    async fn describe_replication_groups(&self) -> Result<Vec<ReplicationGroup>, ProviderError>;
}
