//! getStackOutputs - read the outputs of another stack.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Handler, Outputs, put};
use crate::criteria::Properties;
use crate::error::{HandlerError, Result};
use crate::invocation::InvocationContext;
use crate::matching::{Candidate, ScoreCard, require_status, select};
use crate::provider::CloudFormation;
use crate::provider::cloudformation::Stack;

/// Stack states whose outputs are readable.
pub const COMPLETE_STATES: [&str; 3] = [
    "CREATE_COMPLETE",
    "UPDATE_COMPLETE",
    "UPDATE_ROLLBACK_COMPLETE",
];

impl Candidate for Stack {
    fn id(&self) -> &str {
        if self.stack_id.is_empty() {
            &self.stack_name
        } else {
            &self.stack_id
        }
    }

    fn lifecycle(&self) -> Option<&str> {
        Some(&self.stack_status)
    }
}

pub struct StackOutputsHandler {
    cloudformation: Arc<dyn CloudFormation>,
}

impl StackOutputsHandler {
    pub fn new(cloudformation: Arc<dyn CloudFormation>) -> Self {
        Self { cloudformation }
    }

    pub async fn find(&self, stack_name: &str) -> Result<Stack> {
        let stacks = self.cloudformation.describe_stacks(stack_name).await?;
        info!(count = stacks.len(), "Described stacks");

        let stack = select(stacks, |s| {
            ScoreCard::gate(s.stack_name == stack_name || s.stack_id == stack_name).score()
        })
        .into_unique("stack")?;

        require_status(&stack, &COMPLETE_STATES, || {
            format!(
                "Unable to get outputs for a stack \"{}\" in state \"{}\", aborting.",
                stack_name, stack.stack_status
            )
        })?;
        Ok(stack)
    }
}

/// Outputs as a key/value mapping, restricted to `filter` when non-empty.
fn collect(stack: &Stack, filter: &[String]) -> Result<Outputs> {
    let mut outputs = Outputs::new();
    for output in &stack.outputs {
        if filter.is_empty() || filter.contains(&output.output_key) {
            put(&mut outputs, &output.output_key, output.output_value.as_str());
        }
    }

    if outputs.is_empty() {
        let message = if filter.is_empty() {
            "Stack has no outputs."
        } else {
            "No matching outputs were found."
        };
        return Err(HandlerError::NotFound(message.to_string()));
    }
    Ok(outputs)
}

#[async_trait]
impl Handler for StackOutputsHandler {
    fn name(&self) -> &'static str {
        "getStackOutputs"
    }

    fn primary_property(&self) -> &'static str {
        "StackName"
    }

    async fn apply(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let stack_name = properties.required_str("StackName")?;
        let filter = properties.optional_string_list("Filter")?.unwrap_or_default();
        if filter.is_empty() {
            info!(stack = %stack_name, "No output filter was specified, returning all outputs");
        }

        let stack = self.find(&stack_name).await?;
        collect(&stack, &filter)
    }
}
