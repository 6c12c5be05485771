//! Custom-resource handlers.
//!
//! Each handler validates its properties, queries the provider, selects a
//! single match and optionally reconciles it. Lookup handlers have nothing
//! to delete, so their `remove` is a no-op.

pub mod cache_cluster;
pub mod kms_alias;
pub mod machine_image;
pub mod replication_group;
pub mod stack_outputs;
pub mod vpc;
pub mod zone;
pub mod zone_association;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::HandlerConfig;
use crate::criteria::Properties;
use crate::error::Result;
use crate::invocation::InvocationContext;
use crate::provider::Providers;

pub use cache_cluster::CacheClusterHandler;
pub use kms_alias::KmsAliasHandler;
pub use machine_image::MachineImageHandler;
pub use replication_group::ReplicationGroupHandler;
pub use stack_outputs::StackOutputsHandler;
pub use vpc::VpcHandler;
pub use zone::ZoneHandler;
pub use zone_association::ZoneAssociationHandler;

/// Output attributes returned to the orchestrator as `Data`.
pub type Outputs = Map<String, Value>;

/// A single custom-resource handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Registry name, also the prefix of the physical resource id.
    fn name(&self) -> &'static str;

    /// Property whose value completes the physical resource id.
    fn primary_property(&self) -> &'static str;

    /// Handle `Create` and `Update`.
    async fn apply(&self, properties: &Properties, ctx: &InvocationContext) -> Result<Outputs>;

    /// Handle `Delete`.
    async fn remove(&self, _properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        Ok(Outputs::new())
    }

    /// Stable physical resource id: `<name>-<primary property>`.
    fn physical_resource_id(&self, properties: &Properties) -> String {
        match properties.display(self.primary_property()) {
            Some(value) => format!("{}-{}", self.name(), value),
            None => self.name().to_string(),
        }
    }
}

/// All handlers, by name.
pub struct Registry {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Registry {
    pub fn new(providers: &Providers, config: &HandlerConfig) -> Self {
        let handlers: Vec<Arc<dyn Handler>> = vec![
            Arc::new(ZoneHandler::new(providers.route53.clone())),
            Arc::new(ZoneAssociationHandler::new(
                providers.route53.clone(),
                config.waiter(),
            )),
            Arc::new(KmsAliasHandler::new(providers.kms.clone())),
            Arc::new(CacheClusterHandler::new(providers.elasticache.clone())),
            Arc::new(ReplicationGroupHandler::new(providers.elasticache.clone())),
            Arc::new(VpcHandler::new(providers.ec2.clone())),
            Arc::new(MachineImageHandler::new(providers.ec2.clone())),
            Arc::new(StackOutputsHandler::new(providers.cloudformation.clone())),
        ];
        Self { handlers }
    }

    /// Look up a handler by name, case-insensitively. A `Custom::` resource
    /// type prefix is ignored.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        let name = name.strip_prefix("Custom::").unwrap_or(name);
        self.handlers
            .iter()
            .find(|h| h.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|h| h.name())
    }
}

/// Insert a string output.
pub(crate) fn put(outputs: &mut Outputs, key: &str, value: impl Into<String>) {
    outputs.insert(key.to_string(), Value::String(value.into()));
}

/// Insert a list output.
pub(crate) fn put_list<I, S>(outputs: &mut Outputs, key: &str, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    outputs.insert(
        key.to_string(),
        Value::Array(values.into_iter().map(|v| Value::String(v.into())).collect()),
    );
}
