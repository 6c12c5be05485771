//! getVpcByName - look up a VPC by its `Name` tag and list its subnets.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Handler, Outputs, put, put_list};
use crate::criteria::Properties;
use crate::error::{Result, ValidationError};
use crate::invocation::InvocationContext;
use crate::matching::{Candidate, ScoreCard, select};
use crate::provider::Ec2;
use crate::provider::ec2::{Filter, Subnet, Vpc, tag_value};

/// Name that selects the account's default VPC.
pub const DEFAULT_VPC: &str = "default";

impl Candidate for Vpc {
    fn id(&self) -> &str {
        &self.vpc_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VpcQuery {
    pub vpc_name: String,
    pub only_default_subnets: bool,
    pub only_public_subnets: bool,
    pub only_private_subnets: bool,
}

impl VpcQuery {
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let query = Self {
            vpc_name: properties.required_str("VpcName")?,
            only_default_subnets: properties.optional_bool("OnlyDefaultSubnets")?.unwrap_or(false),
            only_public_subnets: properties.optional_bool("OnlyPublicSubnets")?.unwrap_or(false),
            only_private_subnets: properties.optional_bool("OnlyPrivateSubnets")?.unwrap_or(false),
        };
        if query.only_public_subnets && query.only_private_subnets {
            return Err(ValidationError::Conflicting(
                "OnlyPublicSubnets".to_string(),
                "OnlyPrivateSubnets".to_string(),
            )
            .into());
        }
        Ok(query)
    }

    fn matches(&self, vpc: &Vpc) -> bool {
        if self.vpc_name == DEFAULT_VPC {
            vpc.is_default
        } else {
            tag_value(&vpc.tags, "Name") == Some(self.vpc_name.as_str())
        }
    }

    fn subnet_filters(&self, vpc_id: &str) -> Vec<Filter> {
        let mut filters = vec![
            Filter::new("state", ["available"]),
            Filter::new("vpc-id", [vpc_id]),
        ];
        if self.only_default_subnets {
            filters.push(Filter::new("default-for-az", ["true"]));
        }
        if self.only_public_subnets {
            filters.push(Filter::new("tag:Type", ["Public"]));
        }
        if self.only_private_subnets {
            filters.push(Filter::new("tag:Type", ["Private"]));
        }
        filters
    }
}

pub struct VpcHandler {
    ec2: Arc<dyn Ec2>,
}

impl VpcHandler {
    pub fn new(ec2: Arc<dyn Ec2>) -> Self {
        Self { ec2 }
    }

    pub async fn find(&self, query: &VpcQuery) -> Result<Vpc> {
        let vpcs = self
            .ec2
            .describe_vpcs(&[Filter::new("state", ["available"])])
            .await?;
        info!(count = vpcs.len(), "Described VPCs");

        select(vpcs, |v| ScoreCard::gate(query.matches(v)).score()).into_unique("VPC")
    }

    pub async fn subnets(&self, query: &VpcQuery, vpc_id: &str) -> Result<Vec<Subnet>> {
        let subnets = self.ec2.describe_subnets(&query.subnet_filters(vpc_id)).await?;
        info!(vpc = %vpc_id, count = subnets.len(), "Described subnets");
        Ok(subnets)
    }
}

#[async_trait]
impl Handler for VpcHandler {
    fn name(&self) -> &'static str {
        "getVpcByName"
    }

    fn primary_property(&self) -> &'static str {
        "VpcName"
    }

    async fn apply(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let query = VpcQuery::from_properties(properties)?;
        let vpc = self.find(&query).await?;
        let subnets = self.subnets(&query, &vpc.vpc_id).await?;

        let mut outputs = Outputs::new();
        put(&mut outputs, "VpcId", vpc.vpc_id.as_str());
        put(&mut outputs, "CidrBlock", vpc.cidr_block.as_str());
        if let Some(id) = &vpc.dhcp_options_id {
            put(&mut outputs, "DhcpOptionsId", id.as_str());
        }
        if let Some(owner) = &vpc.owner_id {
            put(&mut outputs, "OwnerId", owner.as_str());
        }

        let ids: Vec<&str> = subnets.iter().map(|s| s.subnet_id.as_str()).collect();
        put(&mut outputs, "SubnetIds", ids.join(","));
        put_list(&mut outputs, "Subnets", ids);
        put_list(
            &mut outputs,
            "CidrBlocks",
            subnets.iter().map(|s| s.cidr_block.as_str()),
        );
        Ok(outputs)
    }
}
