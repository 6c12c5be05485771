//! In-memory provider.
//!
//! Implements every provider family over a [`ProviderState`] snapshot. Used as
//! the test double and as the fixture backend of the CLI. Mutating calls change
//! the snapshot, so a subsequent read observes them the way a real provider
//! eventually would.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::cloudformation::{CloudFormation, Stack};
use super::ec2::{self, Ec2, Filter, Image, Subnet, tag_value};
use super::elasticache::{CacheCluster, ElastiCache, ReplicationGroup};
use super::kms::{Alias, Kms};
use super::route53::{
    ChangeInfo, ChangeStatus, HOSTED_ZONE_RESOURCE, HostedZone, HostedZoneDetail, ResourceTagSet,
    Route53, Vpc, normalize_zone_id,
};
use crate::error::ProviderError;

/// Provider calls that change state.
pub const MUTATING_CALLS: [&str; 5] = [
    "AssociateVPCWithHostedZone",
    "DisassociateVPCFromHostedZone",
    "CreateAlias",
    "UpdateAlias",
    "DeleteAlias",
];

/// Snapshot of provider-side resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProviderState {
    pub account_id: String,
    pub region: String,
    pub hosted_zones: Vec<HostedZoneDetail>,
    pub hosted_zone_tags: Vec<ResourceTagSet>,
    /// Number of `GetChange` polls that still report `PENDING`.
    pub change_sync_polls: u32,
    pub aliases: Vec<Alias>,
    pub cache_clusters: Vec<CacheCluster>,
    pub replication_groups: Vec<ReplicationGroup>,
    pub vpcs: Vec<ec2::Vpc>,
    pub subnets: Vec<Subnet>,
    pub images: Vec<Image>,
    pub stacks: Vec<Stack>,
}

struct PendingChange {
    info: ChangeInfo,
    polls_left: u32,
}

struct Inner {
    state: ProviderState,
    changes: HashMap<String, PendingChange>,
    failures: HashMap<String, ProviderError>,
    calls: Vec<String>,
    next_change: u32,
}

/// Provider double backed by a [`ProviderState`].
pub struct MemoryProvider {
    inner: Mutex<Inner>,
}

impl MemoryProvider {
    pub fn new(state: ProviderState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                changes: HashMap::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
                next_change: 1,
            }),
        }
    }

    /// Parse a fixture document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Make every subsequent call to `operation` fail with `error`.
    pub async fn fail(&self, operation: &str, error: ProviderError) {
        self.inner
            .lock()
            .await
            .failures
            .insert(operation.to_string(), error);
    }

    /// Every call made so far, by provider operation name.
    pub async fn calls(&self) -> Vec<String> {
        self.inner.lock().await.calls.clone()
    }

    /// Mutating calls made so far.
    pub async fn mutations(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| MUTATING_CALLS.contains(&c.as_str()))
            .collect()
    }

    pub async fn snapshot(&self) -> ProviderState {
        self.inner.lock().await.state.clone()
    }
}

impl Inner {
    /// Record the call, then fail it if a failure was injected.
    fn enter(&mut self, operation: &str) -> Result<(), ProviderError> {
        debug!(operation, "Memory provider call");
        self.calls.push(operation.to_string());
        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn zone_mut(&mut self, id: &str) -> Result<&mut HostedZoneDetail, ProviderError> {
        let wanted = normalize_zone_id(id);
        self.state
            .hosted_zones
            .iter_mut()
            .find(|z| z.hosted_zone.short_id() == wanted)
            .ok_or_else(|| no_such_zone(id))
    }

    fn new_change(&mut self, comment: Option<&str>) -> ChangeInfo {
        let id = format!("/change/C{:012}", self.next_change);
        self.next_change += 1;
        let info = ChangeInfo {
            id: id.clone(),
            status: ChangeStatus::Pending,
            comment: comment.map(str::to_string),
        };
        self.changes.insert(
            id,
            PendingChange {
                info: info.clone(),
                polls_left: self.state.change_sync_polls,
            },
        );
        info
    }

    fn alias_arn(&self, alias_name: &str) -> String {
        format!(
            "arn:aws:kms:{}:{}:{}",
            self.state.region, self.state.account_id, alias_name
        )
    }
}

fn no_such_zone(id: &str) -> ProviderError {
    ProviderError::new(
        "NoSuchHostedZone",
        format!("No hosted zone found with ID: {}", normalize_zone_id(id)),
    )
}

#[async_trait]
impl Route53 for MemoryProvider {
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZone>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("ListHostedZones")?;
        Ok(inner
            .state
            .hosted_zones
            .iter()
            .map(|z| z.hosted_zone.clone())
            .collect())
    }

    async fn get_hosted_zone(&self, id: &str) -> Result<HostedZoneDetail, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("GetHostedZone")?;
        inner.zone_mut(id).map(|z| z.clone())
    }

    async fn list_tags_for_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<ResourceTagSet, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("ListTagsForResource")?;
        if resource_type != HOSTED_ZONE_RESOURCE {
            return Err(ProviderError::new(
                "InvalidInput",
                format!("Unsupported resource type: {resource_type}"),
            ));
        }
        let id = inner.zone_mut(resource_id)?.hosted_zone.short_id().to_string();
        Ok(inner
            .state
            .hosted_zone_tags
            .iter()
            .find(|t| normalize_zone_id(&t.resource_id) == id)
            .cloned()
            .unwrap_or(ResourceTagSet {
                resource_id: id,
                tags: Vec::new(),
            }))
    }

    async fn associate_vpc_with_hosted_zone(
        &self,
        hosted_zone_id: &str,
        vpc: &Vpc,
        comment: Option<&str>,
    ) -> Result<ChangeInfo, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("AssociateVPCWithHostedZone")?;
        let zone = inner.zone_mut(hosted_zone_id)?;
        if zone.vpcs.iter().any(|v| v.vpc_id == vpc.vpc_id) {
            return Err(ProviderError::new(
                "ConflictingDomainExists",
                format!("The VPC {} is already associated with the hosted zone", vpc.vpc_id),
            ));
        }
        zone.vpcs.push(vpc.clone());
        zone.hosted_zone.config.private_zone = true;
        Ok(inner.new_change(comment))
    }

    async fn disassociate_vpc_from_hosted_zone(
        &self,
        hosted_zone_id: &str,
        vpc: &Vpc,
    ) -> Result<ChangeInfo, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DisassociateVPCFromHostedZone")?;
        let zone = inner.zone_mut(hosted_zone_id)?;
        let Some(pos) = zone.vpcs.iter().position(|v| v.vpc_id == vpc.vpc_id) else {
            return Err(ProviderError::new(
                "VPCAssociationNotFound",
                format!("The VPC {} is not associated with the hosted zone", vpc.vpc_id),
            ));
        };
        if zone.vpcs.len() == 1 {
            return Err(ProviderError::new(
                "LastVPCAssociation",
                "A private hosted zone must have at least one associated VPC",
            ));
        }
        zone.vpcs.remove(pos);
        Ok(inner.new_change(None))
    }

    async fn get_change(&self, id: &str) -> Result<ChangeInfo, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("GetChange")?;
        let change = inner
            .changes
            .get_mut(id)
            .ok_or_else(|| ProviderError::new("NoSuchChange", format!("No change found: {id}")))?;
        if change.polls_left == 0 {
            change.info.status = ChangeStatus::Insync;
        } else {
            change.polls_left -= 1;
        }
        Ok(change.info.clone())
    }
}

#[async_trait]
impl Kms for MemoryProvider {
    async fn list_aliases(&self) -> Result<Vec<Alias>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("ListAliases")?;
        Ok(inner.state.aliases.clone())
    }

    async fn create_alias(
        &self,
        alias_name: &str,
        target_key_id: &str,
    ) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("CreateAlias")?;
        if !alias_name.starts_with("alias/") {
            return Err(ProviderError::new(
                "ValidationException",
                "Alias must start with the prefix \"alias/\"",
            ));
        }
        if inner.state.aliases.iter().any(|a| a.alias_name == alias_name) {
            return Err(ProviderError::new(
                "AlreadyExistsException",
                format!("An alias with the name {alias_name} already exists"),
            ));
        }
        let alias_arn = inner.alias_arn(alias_name);
        inner.state.aliases.push(Alias {
            alias_name: alias_name.to_string(),
            alias_arn,
            target_key_id: Some(target_key_id.to_string()),
        });
        Ok(())
    }

    async fn update_alias(
        &self,
        alias_name: &str,
        target_key_id: &str,
    ) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("UpdateAlias")?;
        let alias = inner
            .state
            .aliases
            .iter_mut()
            .find(|a| a.alias_name == alias_name)
            .ok_or_else(|| alias_not_found(alias_name))?;
        alias.target_key_id = Some(target_key_id.to_string());
        Ok(())
    }

    async fn delete_alias(&self, alias_name: &str) -> Result<(), ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DeleteAlias")?;
        let before = inner.state.aliases.len();
        inner.state.aliases.retain(|a| a.alias_name != alias_name);
        if inner.state.aliases.len() == before {
            return Err(alias_not_found(alias_name));
        }
        Ok(())
    }
}

fn alias_not_found(alias_name: &str) -> ProviderError {
    ProviderError::new("NotFoundException", format!("Alias {alias_name} is not found."))
}

#[async_trait]
impl ElastiCache for MemoryProvider {
    async fn describe_cache_clusters(
        &self,
        cache_cluster_id: Option<&str>,
        _show_cache_node_info: bool,
    ) -> Result<Vec<CacheCluster>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DescribeCacheClusters")?;
        let clusters = &inner.state.cache_clusters;
        match cache_cluster_id {
            None => Ok(clusters.clone()),
            Some(id) => {
                let found: Vec<_> = clusters
                    .iter()
                    .filter(|c| c.cache_cluster_id == id)
                    .cloned()
                    .collect();
                if found.is_empty() {
                    Err(ProviderError::new(
                        "CacheClusterNotFound",
                        format!("CacheCluster not found: {id}"),
                    ))
                } else {
                    Ok(found)
                }
            }
        }
    }

    async fn describe_replication_groups(&self) -> Result<Vec<ReplicationGroup>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DescribeReplicationGroups")?;
        Ok(inner.state.replication_groups.clone())
    }
}

#[async_trait]
impl Ec2 for MemoryProvider {
    async fn describe_vpcs(&self, filters: &[Filter]) -> Result<Vec<ec2::Vpc>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DescribeVpcs")?;
        let mut out = Vec::new();
        for vpc in &inner.state.vpcs {
            if matches_filters(filters, |name| vpc_attribute(vpc, name))? {
                out.push(vpc.clone());
            }
        }
        Ok(out)
    }

    async fn describe_subnets(&self, filters: &[Filter]) -> Result<Vec<Subnet>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DescribeSubnets")?;
        let mut out = Vec::new();
        for subnet in &inner.state.subnets {
            if matches_filters(filters, |name| subnet_attribute(subnet, name))? {
                out.push(subnet.clone());
            }
        }
        Ok(out)
    }

    async fn describe_images(
        &self,
        owners: &[String],
        executable_users: &[String],
        filters: &[Filter],
    ) -> Result<Vec<Image>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DescribeImages")?;
        let account = inner.state.account_id.as_str();
        let mut out = Vec::new();
        for image in &inner.state.images {
            if !owned_by(image, owners, account) || !executable_by(image, executable_users, account)
            {
                continue;
            }
            if matches_filters(filters, |name| image_attribute(image, name))? {
                out.push(image.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl CloudFormation for MemoryProvider {
    async fn describe_stacks(&self, stack_name: &str) -> Result<Vec<Stack>, ProviderError> {
        let mut inner = self.inner.lock().await;
        inner.enter("DescribeStacks")?;
        let found: Vec<_> = inner
            .state
            .stacks
            .iter()
            .filter(|s| s.stack_name == stack_name || s.stack_id == stack_name)
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(ProviderError::new(
                "ValidationError",
                format!("Stack with id {stack_name} does not exist"),
            ));
        }
        Ok(found)
    }
}

fn owned_by(image: &Image, owners: &[String], account: &str) -> bool {
    owners.is_empty()
        || owners.iter().any(|owner| match owner.as_str() {
            "self" => image.owner_id == account,
            alias => image.owner_id == alias || image.image_owner_alias.as_deref() == Some(alias),
        })
}

fn executable_by(image: &Image, users: &[String], account: &str) -> bool {
    users.is_empty()
        || users.iter().any(|user| match user.as_str() {
            "all" => image.public,
            "self" => image.public || image.owner_id == account,
            _ => true,
        })
}

fn tag_attribute(tags: &[ec2::Tag], name: &str) -> Option<Vec<String>> {
    let key = name.strip_prefix("tag:")?;
    Some(tag_value(tags, key).map(str::to_string).into_iter().collect())
}

fn vpc_attribute(vpc: &ec2::Vpc, name: &str) -> Option<Vec<String>> {
    match name {
        "state" => Some(vec![vpc.state.clone()]),
        "vpc-id" => Some(vec![vpc.vpc_id.clone()]),
        "cidr" | "cidr-block" => Some(vec![vpc.cidr_block.clone()]),
        "is-default" => Some(vec![vpc.is_default.to_string()]),
        _ => tag_attribute(&vpc.tags, name),
    }
}

fn subnet_attribute(subnet: &Subnet, name: &str) -> Option<Vec<String>> {
    match name {
        "state" => Some(vec![subnet.state.clone()]),
        "vpc-id" => Some(vec![subnet.vpc_id.clone()]),
        "subnet-id" => Some(vec![subnet.subnet_id.clone()]),
        "default-for-az" => Some(vec![subnet.default_for_az.to_string()]),
        "availability-zone" => Some(subnet.availability_zone.clone().into_iter().collect()),
        _ => tag_attribute(&subnet.tags, name),
    }
}

fn image_attribute(image: &Image, name: &str) -> Option<Vec<String>> {
    match name {
        "state" => Some(vec![image.state.clone()]),
        "name" => Some(image.name.clone().into_iter().collect()),
        "image-id" => Some(vec![image.image_id.clone()]),
        "owner-id" => Some(vec![image.owner_id.clone()]),
        "architecture" => Some(image.architecture.clone().into_iter().collect()),
        "is-public" => Some(vec![image.public.to_string()]),
        _ => tag_attribute(&image.tags, name),
    }
}

/// Filters are ANDed; values within one filter are ORed and may use `*`/`?`.
fn matches_filters(
    filters: &[Filter],
    attribute: impl Fn(&str) -> Option<Vec<String>>,
) -> Result<bool, ProviderError> {
    for filter in filters {
        let Some(actual) = attribute(&filter.name) else {
            return Err(ProviderError::new(
                "InvalidParameterValue",
                format!("The filter '{}' is invalid", filter.name),
            ));
        };
        let hit = filter
            .values
            .iter()
            .any(|pattern| actual.iter().any(|value| glob_match(pattern, value)));
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Shell-style wildcard match supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(state: serde_json::Value) -> MemoryProvider {
        MemoryProvider::new(serde_json::from_value(state).unwrap())
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("ubuntu-*", "ubuntu-22.04"));
        assert!(glob_match("base-202?-*", "base-2024-01"));
        assert!(glob_match("*", ""));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("ubuntu-*", "debian-12"));
        assert!(!glob_match("a?c", "ac"));
    }

    #[tokio::test]
    async fn test_disassociate_last_vpc_is_refused() {
        let p = provider(json!({
            "HostedZones": [{
                "HostedZone": {"Id": "/hostedzone/Z1", "Name": "internal.", "Config": {"PrivateZone": true}},
                "VPCs": [{"VPCId": "vpc-1", "VPCRegion": "eu-west-1"}]
            }]
        }));
        let vpc = Vpc {
            vpc_id: "vpc-1".into(),
            vpc_region: Some("eu-west-1".into()),
        };

        let err = p.disassociate_vpc_from_hosted_zone("Z1", &vpc).await.unwrap_err();
        assert!(err.is("LastVPCAssociation"));

        let other = Vpc {
            vpc_id: "vpc-2".into(),
            vpc_region: None,
        };
        let err = p.disassociate_vpc_from_hosted_zone("Z1", &other).await.unwrap_err();
        assert!(err.is("VPCAssociationNotFound"));

        let err = p.get_hosted_zone("Z404").await.unwrap_err();
        assert!(err.is("NoSuchHostedZone"));
    }

    #[tokio::test]
    async fn test_change_becomes_insync_after_configured_polls() {
        let p = provider(json!({
            "ChangeSyncPolls": 2,
            "HostedZones": [{
                "HostedZone": {"Id": "/hostedzone/Z1", "Name": "internal."},
                "VPCs": []
            }]
        }));
        let vpc = Vpc {
            vpc_id: "vpc-1".into(),
            vpc_region: None,
        };
        let change = p.associate_vpc_with_hosted_zone("Z1", &vpc, None).await.unwrap();
        assert_eq!(change.status, ChangeStatus::Pending);

        assert_eq!(p.get_change(&change.id).await.unwrap().status, ChangeStatus::Pending);
        assert_eq!(p.get_change(&change.id).await.unwrap().status, ChangeStatus::Pending);
        assert_eq!(p.get_change(&change.id).await.unwrap().status, ChangeStatus::Insync);
    }

    #[tokio::test]
    async fn test_image_filters_and_owners() {
        let p = provider(json!({
            "AccountId": "111111111111",
            "Images": [
                {"ImageId": "ami-1", "Name": "base-1", "OwnerId": "111111111111", "State": "available", "Public": true},
                {"ImageId": "ami-2", "Name": "base-2", "OwnerId": "222222222222", "State": "available", "Public": true},
                {"ImageId": "ami-3", "Name": "base-3", "OwnerId": "111111111111", "State": "pending", "Public": true}
            ]
        }));

        let images = p
            .describe_images(
                &["self".to_string()],
                &["all".to_string()],
                &[Filter::new("state", ["available"]), Filter::new("name", ["base-*"])],
            )
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].image_id, "ami-1");

        let err = p
            .describe_images(&[], &[], &[Filter::new("bogus", ["x"])])
            .await
            .unwrap_err();
        assert!(err.is("InvalidParameterValue"));
    }

    #[tokio::test]
    async fn test_injected_failure_and_call_log() {
        let p = provider(json!({"Region": "eu-west-1", "AccountId": "1"}));
        p.create_alias("alias/app", "key-a").await.unwrap();
        p.fail("ListAliases", ProviderError::new("AccessDenied", "nope")).await;

        let err = p.list_aliases().await.unwrap_err();
        assert!(err.is("AccessDenied"));
        assert_eq!(p.calls().await, vec!["CreateAlias", "ListAliases"]);
        assert_eq!(p.mutations().await, vec!["CreateAlias"]);
        assert_eq!(
            p.snapshot().await.aliases[0].alias_arn,
            "arn:aws:kms:eu-west-1:1:alias/app"
        );
    }
}
