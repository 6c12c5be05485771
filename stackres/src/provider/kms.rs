//! KMS key aliases.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Alias {
    /// Alias name including the `alias/` prefix.
    pub alias_name: String,
    pub alias_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_key_id: Option<String>,
}

#[async_trait]
pub trait Kms: Send + Sync {
    async fn list_aliases(&self) -> Result<Vec<Alias>, ProviderError>;

    async fn create_alias(&self, alias_name: &str, target_key_id: &str)
    -> Result<(), ProviderError>;

    async fn update_alias(&self, alias_name: &str, target_key_id: &str)
    -> Result<(), ProviderError>;

    async fn delete_alias(&self, alias_name: &str) -> Result<(), ProviderError>;
}
