//! createRoute53ZoneAssociation - associate a VPC with a private hosted zone.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Handler, Outputs, put};
use crate::criteria::Properties;
use crate::error::{HandlerError, ProviderError, Result, ValidationError};
use crate::invocation::InvocationContext;
use crate::provider::Route53;
use crate::provider::route53::{ChangeStatus, HostedZone, Vpc};
use crate::reconcile::{Mutation, Operation, Reconciler, reconcile};
use crate::wait::Waiter;

/// Provider conditions that leave nothing to disassociate.
const BENIGN_DELETE_CODES: [&str; 3] = [
    "NoSuchHostedZone",
    "VPCAssociationNotFound",
    "LastVPCAssociation",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub hosted_zone_id: String,
    pub vpc_id: String,
    pub region: String,
    pub comment: Option<String>,
    /// Block until the change is in sync.
    pub wait: bool,
}

impl Association {
    pub fn from_properties(properties: &Properties, ctx: &InvocationContext) -> Result<Self> {
        let hosted_zone_id = properties.required_str("HostedZoneId")?;
        let vpc_id = properties.required_str("VpcId")?;
        let region = match properties.optional_str("Region")? {
            Some(region) => region,
            None => ctx
                .region
                .clone()
                .ok_or_else(|| ValidationError::Missing("Region".to_string()))?,
        };
        info!(region = %region, "Region set");

        Ok(Self {
            hosted_zone_id,
            vpc_id,
            region,
            comment: properties.optional_str("Comment")?,
            wait: properties.optional_bool("Wait")?.unwrap_or(false),
        })
    }

    fn vpc(&self) -> Vpc {
        Vpc {
            vpc_id: self.vpc_id.clone(),
            vpc_region: Some(self.region.clone()),
        }
    }

    fn outputs(&self) -> Outputs {
        let mut outputs = Outputs::new();
        put(&mut outputs, "Region", self.region.as_str());
        put(&mut outputs, "HostedZoneId", self.hosted_zone_id.as_str());
        put(&mut outputs, "VpcId", self.vpc_id.as_str());
        outputs
    }
}

pub struct ZoneAssociationHandler {
    route53: Arc<dyn Route53>,
    waiter: Waiter,
}

impl ZoneAssociationHandler {
    pub fn new(route53: Arc<dyn Route53>, waiter: Waiter) -> Self {
        Self { route53, waiter }
    }

    async fn run(&self, association: &Association, operation: Operation) -> Result<Outputs> {
        let waiter = association.wait.then_some(&self.waiter);
        let outcome = reconcile(self, association, operation, waiter).await?;
        Ok(match outcome.resource() {
            Some(_) => association.outputs(),
            None => Outputs::new(),
        })
    }
}

#[async_trait]
impl Reconciler for ZoneAssociationHandler {
    type Desired = Association;
    /// The zone, present only while it carries the VPC.
    type Current = HostedZone;

    fn describe(&self, desired: &Association) -> String {
        format!(
            "VPC \"{}\" association to the Hosted Zone \"{}\"",
            desired.vpc_id, desired.hosted_zone_id
        )
    }

    async fn resolve(&self, desired: &Association) -> Result<Option<HostedZone>> {
        let detail = match self.route53.get_hosted_zone(&desired.hosted_zone_id).await {
            Ok(detail) => detail,
            Err(e) if e.is("NoSuchHostedZone") => {
                info!(zone = %desired.hosted_zone_id, "Hosted zone does not exist");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let associated = detail.vpcs.iter().any(|v| v.vpc_id == desired.vpc_id);
        Ok(associated.then_some(detail.hosted_zone))
    }

    fn in_desired_state(&self, _desired: &Association, _current: &HostedZone) -> bool {
        true
    }

    async fn create(&self, desired: &Association) -> std::result::Result<Mutation, ProviderError> {
        let change = self
            .route53
            .associate_vpc_with_hosted_zone(
                &desired.hosted_zone_id,
                &desired.vpc(),
                desired.comment.as_deref(),
            )
            .await?;
        info!(change = %change.id, status = ?change.status, "Associated VPC with hosted zone");
        Ok(Mutation::pending(change.id))
    }

    async fn update(
        &self,
        desired: &Association,
        _current: &HostedZone,
    ) -> std::result::Result<Mutation, ProviderError> {
        self.create(desired).await
    }

    async fn delete(
        &self,
        desired: &Association,
        _current: &HostedZone,
    ) -> std::result::Result<Mutation, ProviderError> {
        let change = self
            .route53
            .disassociate_vpc_from_hosted_zone(&desired.hosted_zone_id, &desired.vpc())
            .await?;
        info!(change = %change.id, "Disassociated VPC from hosted zone");
        Ok(Mutation::pending(change.id))
    }

    fn is_benign_delete_error(&self, error: &ProviderError) -> bool {
        BENIGN_DELETE_CODES.iter().any(|code| error.is(code))
    }

    async fn is_converged(&self, change_id: &str) -> Result<bool> {
        let change = self.route53.get_change(change_id).await?;
        Ok(change.status == ChangeStatus::Insync)
    }
}

#[async_trait]
impl Handler for ZoneAssociationHandler {
    fn name(&self) -> &'static str {
        "createRoute53ZoneAssociation"
    }

    fn primary_property(&self) -> &'static str {
        "HostedZoneId"
    }

    async fn apply(&self, properties: &Properties, ctx: &InvocationContext) -> Result<Outputs> {
        let association = Association::from_properties(properties, ctx)?;
        self.run(&association, Operation::Apply).await
    }

    async fn remove(&self, properties: &Properties, ctx: &InvocationContext) -> Result<Outputs> {
        let association = Association::from_properties(properties, ctx)?;
        self.run(&association, Operation::Remove).await
    }
}
