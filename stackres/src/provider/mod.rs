//! Provider API interfaces.
//!
//! One trait per resource family. Handlers receive these as injected
//! capabilities:
//! - route53: hosted zones, VPC associations, change status
//! - kms: key aliases
//! - elasticache: cache clusters, replication groups
//! - ec2: VPCs, subnets, machine images
//! - cloudformation: stacks and their outputs
//!
//! Model types serialize with the provider's PascalCase field names so that
//! fixture files read like real API responses.

pub mod cloudformation;
pub mod ec2;
pub mod elasticache;
pub mod kms;
pub mod memory;
pub mod route53;

use std::sync::Arc;

pub use cloudformation::CloudFormation;
pub use ec2::Ec2;
pub use elasticache::ElastiCache;
pub use kms::Kms;
pub use memory::MemoryProvider;
pub use route53::Route53;

/// Provider clients for a single invocation.
#[derive(Clone)]
pub struct Providers {
    pub route53: Arc<dyn Route53>,
    pub kms: Arc<dyn Kms>,
    pub elasticache: Arc<dyn ElastiCache>,
    pub ec2: Arc<dyn Ec2>,
    pub cloudformation: Arc<dyn CloudFormation>,
}

impl Providers {
    /// Serve every family from one in-memory provider.
    pub fn from_memory(provider: Arc<MemoryProvider>) -> Self {
        Self {
            route53: provider.clone(),
            kms: provider.clone(),
            elasticache: provider.clone(),
            ec2: provider.clone(),
            cloudformation: provider,
        }
    }
}
