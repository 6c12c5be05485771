//! CloudFormation stacks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub output_key: String,
    #[serde(default)]
    pub output_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    pub stack_name: String,
    #[serde(default)]
    pub stack_id: String,
    pub stack_status: String,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

#[async_trait]
pub trait CloudFormation: Send + Sync {
    /// Describe a stack by name or id.
    async fn describe_stacks(&self, stack_name: &str) -> Result<Vec<Stack>, ProviderError>;
}
