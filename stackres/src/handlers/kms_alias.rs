//! createKmsKeyAlias - point a KMS alias at a key.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Handler, Outputs, put};
use crate::criteria::Properties;
use crate::error::{ProviderError, Result, ValidationError};
use crate::invocation::InvocationContext;
use crate::provider::Kms;
use crate::provider::kms::Alias;
use crate::reconcile::{Mutation, Operation, Outcome, Reconciler, reconcile};

/// Desired alias. `target_key_id` is only needed to create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSpec {
    pub alias_name: String,
    pub target_key_id: Option<String>,
}

impl AliasSpec {
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        Ok(Self {
            alias_name: properties.required_str("AliasName")?,
            target_key_id: properties.optional_str("TargetKeyId")?,
        })
    }

    fn target_key_id(&self) -> std::result::Result<&str, ProviderError> {
        // Checked in apply before any provider call
        self.target_key_id.as_deref().ok_or_else(|| {
            ProviderError::new(
                "ValidationException",
                ValidationError::Missing("TargetKeyId".to_string()).to_string(),
            )
        })
    }
}

pub struct KmsAliasHandler {
    kms: Arc<dyn Kms>,
}

impl KmsAliasHandler {
    pub fn new(kms: Arc<dyn Kms>) -> Self {
        Self { kms }
    }
}

fn outputs(alias: &Alias) -> Outputs {
    let mut outputs = Outputs::new();
    put(&mut outputs, "AliasName", alias.alias_name.as_str());
    put(&mut outputs, "AliasArn", alias.alias_arn.as_str());
    if let Some(key) = &alias.target_key_id {
        put(&mut outputs, "TargetKeyId", key.as_str());
    }
    outputs
}

#[async_trait]
impl Reconciler for KmsAliasHandler {
    type Desired = AliasSpec;
    type Current = Alias;

    fn describe(&self, desired: &AliasSpec) -> String {
        format!("alias \"{}\"", desired.alias_name)
    }

    async fn resolve(&self, desired: &AliasSpec) -> Result<Option<Alias>> {
        let aliases = self.kms.list_aliases().await?;
        info!(count = aliases.len(), "Listed aliases");
        Ok(aliases
            .into_iter()
            .find(|a| a.alias_name == desired.alias_name))
    }

    fn in_desired_state(&self, desired: &AliasSpec, current: &Alias) -> bool {
        current.alias_name == desired.alias_name && current.target_key_id == desired.target_key_id
    }

    async fn create(&self, desired: &AliasSpec) -> std::result::Result<Mutation, ProviderError> {
        let key = desired.target_key_id()?;
        self.kms.create_alias(&desired.alias_name, key).await?;
        info!(alias = %desired.alias_name, key, "Created alias");
        Ok(Mutation::applied())
    }

    async fn update(
        &self,
        desired: &AliasSpec,
        current: &Alias,
    ) -> std::result::Result<Mutation, ProviderError> {
        let key = desired.target_key_id()?;
        self.kms.update_alias(&desired.alias_name, key).await?;
        info!(
            alias = %desired.alias_name,
            from = current.target_key_id.as_deref().unwrap_or_default(),
            to = key,
            "Updated alias"
        );
        Ok(Mutation::applied())
    }

    async fn delete(
        &self,
        desired: &AliasSpec,
        _current: &Alias,
    ) -> std::result::Result<Mutation, ProviderError> {
        self.kms.delete_alias(&desired.alias_name).await?;
        info!(alias = %desired.alias_name, "Deleted alias");
        Ok(Mutation::applied())
    }

    fn is_benign_delete_error(&self, error: &ProviderError) -> bool {
        error.is("NotFoundException")
    }
}

#[async_trait]
impl Handler for KmsAliasHandler {
    fn name(&self) -> &'static str {
        "createKmsKeyAlias"
    }

    fn primary_property(&self) -> &'static str {
        "AliasName"
    }

    async fn apply(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let spec = AliasSpec::from_properties(properties)?;
        if spec.target_key_id.is_none() {
            return Err(ValidationError::Missing("TargetKeyId".to_string()).into());
        }

        let outcome = reconcile(self, &spec, Operation::Apply, None).await?;
        Ok(outcome.resource().map(outputs).unwrap_or_default())
    }

    async fn remove(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let spec = AliasSpec::from_properties(properties)?;
        match reconcile(self, &spec, Operation::Remove, None).await? {
            Outcome::Removed(alias) => Ok(outputs(&alias)),
            _ => Ok(Outputs::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::provider::MemoryProvider;
    use serde_json::json;

    fn provider(aliases: serde_json::Value) -> Arc<MemoryProvider> {
        Arc::new(
            MemoryProvider::from_json(
                &json!({"Region": "eu-west-1", "AccountId": "123456789012", "Aliases": aliases})
                    .to_string(),
            )
            .unwrap(),
        )
    }

    fn props(value: serde_json::Value) -> Properties {
        Properties::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_alias() {
        let p = provider(json!([]));
        let handler = KmsAliasHandler::new(p.clone());

        let out = handler
            .apply(
                &props(json!({"AliasName": "alias/app", "TargetKeyId": "key-a"})),
                &InvocationContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(out["AliasName"], "alias/app");
        assert_eq!(out["AliasArn"], "arn:aws:kms:eu-west-1:123456789012:alias/app");
        assert_eq!(out["TargetKeyId"], "key-a");
        assert_eq!(p.mutations().await, vec!["CreateAlias"]);
    }

    #[tokio::test]
    async fn test_apply_requires_target_key() {
        let p = provider(json!([]));
        let handler = KmsAliasHandler::new(p.clone());

        let err = handler
            .apply(&props(json!({"AliasName": "alias/app"})), &InvocationContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The TargetKeyId property was not specified.");
        assert!(p.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_returns_deleted_alias() {
        let p = provider(json!([
            {"AliasName": "alias/app", "AliasArn": "arn:aws:kms:eu-west-1:1:alias/app", "TargetKeyId": "key-a"}
        ]));
        let handler = KmsAliasHandler::new(p.clone());

        let out = handler
            .remove(&props(json!({"AliasName": "alias/app"})), &InvocationContext::default())
            .await
            .unwrap();
        assert_eq!(out["TargetKeyId"], "key-a");
        assert!(p.snapshot().await.aliases.is_empty());

        // Already gone
        let out = handler
            .remove(&props(json!({"AliasName": "alias/app"})), &InvocationContext::default())
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(p.mutations().await, vec!["DeleteAlias"]);
    }

    #[tokio::test]
    async fn test_create_error_propagates() {
        let p = provider(json!([]));
        let handler = KmsAliasHandler::new(p);

        let err = handler
            .apply(
                &props(json!({"AliasName": "app", "TargetKeyId": "key-a"})),
                &InvocationContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Provider(e) if e.is("ValidationException")));
    }
}
