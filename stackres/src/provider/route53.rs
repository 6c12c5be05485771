//! Route 53 hosted zones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Resource type used when listing hosted zone tags.
pub const HOSTED_ZONE_RESOURCE: &str = "hostedzone";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZoneConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub private_zone: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostedZone {
    /// Full zone id, e.g. `/hostedzone/Z1D633PJN98FT9`.
    pub id: String,
    /// Zone name, usually with a trailing dot.
    pub name: String,
    #[serde(default)]
    pub config: HostedZoneConfig,
}

impl HostedZone {
    /// Zone id without the `/hostedzone/` prefix.
    pub fn short_id(&self) -> &str {
        normalize_zone_id(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vpc {
    #[serde(rename = "VPCId")]
    pub vpc_id: String,
    #[serde(rename = "VPCRegion", default, skip_serializing_if = "Option::is_none")]
    pub vpc_region: Option<String>,
}

/// `GetHostedZone` response: the zone plus its VPC associations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedZoneDetail {
    #[serde(rename = "HostedZone")]
    pub hosted_zone: HostedZone,
    #[serde(rename = "VPCs", default)]
    pub vpcs: Vec<Vpc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceTagSet {
    /// Zone id without prefix.
    pub resource_id: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeStatus {
    Pending,
    Insync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeInfo {
    pub id: String,
    pub status: ChangeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Route 53 API surface used by the zone handlers.
#[async_trait]
pub trait Route53: Send + Sync {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZone>, ProviderError>;

    async fn get_hosted_zone(&self, id: &str) -> Result<HostedZoneDetail, ProviderError>;

    async fn list_tags_for_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<ResourceTagSet, ProviderError>;

    async fn associate_vpc_with_hosted_zone(
        &self,
        hosted_zone_id: &str,
        vpc: &Vpc,
        comment: Option<&str>,
    ) -> Result<ChangeInfo, ProviderError>;

    async fn disassociate_vpc_from_hosted_zone(
        &self,
        hosted_zone_id: &str,
        vpc: &Vpc,
    ) -> Result<ChangeInfo, ProviderError>;

    async fn get_change(&self, id: &str) -> Result<ChangeInfo, ProviderError>;
}

/// Strip the `/hostedzone/` (or `/change/`) prefix from a Route 53 id.
pub fn normalize_zone_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Strip a single trailing dot from a zone name.
pub fn normalize_zone_name(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
