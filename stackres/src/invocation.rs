//! Invocation plumbing: event decoding, handler dispatch and the callback.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::criteria::Properties;
use crate::error::{HandlerError, Result, ValidationError};
use crate::handlers::{Handler, Outputs, Registry};
use crate::response::{Responder, ResponseBody, ResponseError, Status, reason};

/// Custom-resource request as delivered by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    pub request_type: String,
    #[serde(rename = "ResponseURL", default)]
    pub response_url: String,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub logical_resource_id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl FromStr for RequestType {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Create" => Ok(RequestType::Create),
            "Update" => Ok(RequestType::Update),
            "Delete" => Ok(RequestType::Delete),
            other => Err(ValidationError::UnknownRequestType(other.to_string())),
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
        };
        f.write_str(s)
    }
}

/// Runtime facts about the invoked function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub log_stream_name: String,
    pub invoked_function_arn: Option<String>,
    /// Function region, used as the default `Region` property.
    pub region: Option<String>,
}

impl InvocationContext {
    /// The region comes from the function ARN when it names one, otherwise
    /// from `fallback_region`.
    pub fn new(
        log_stream_name: impl Into<String>,
        invoked_function_arn: Option<String>,
        fallback_region: Option<String>,
    ) -> Self {
        let region = invoked_function_arn
            .as_deref()
            .and_then(region_from_arn)
            .map(str::to_string)
            .or(fallback_region);
        Self {
            log_stream_name: log_stream_name.into(),
            invoked_function_arn,
            region,
        }
    }
}

/// Region field of `arn:<partition>:<service>:<region>:...`.
pub fn region_from_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.split(':');
    if parts.next() != Some("arn") {
        return None;
    }
    parts.nth(2).filter(|r| !r.is_empty())
}

/// Routes events to handlers and reports the outcome.
pub struct Dispatcher {
    registry: Registry,
    responder: Arc<dyn Responder>,
}

impl Dispatcher {
    pub fn new(registry: Registry, responder: Arc<dyn Responder>) -> Self {
        Self { registry, responder }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn handler(&self, name: &str) -> Result<Arc<dyn Handler>> {
        self.registry
            .get(name)
            .ok_or_else(|| ValidationError::UnknownHandler(name.to_string()).into())
    }

    /// Run one request against the handler registered as `handler_name`.
    pub async fn execute(
        &self,
        handler_name: &str,
        request_type: &str,
        properties: &Properties,
        ctx: &InvocationContext,
    ) -> Result<Outputs> {
        let handler = self.handler(handler_name)?;
        run(handler.as_ref(), request_type, properties, ctx).await
    }

    /// Handle a full event, then deliver the callback.
    ///
    /// `handler_name` overrides the `ResourceType` of the event. Handler
    /// failures become a `FAILED` callback; only a failed delivery is an error.
    pub async fn handle(
        &self,
        event: &Event,
        handler_name: Option<&str>,
        ctx: &InvocationContext,
    ) -> std::result::Result<ResponseBody, ResponseError> {
        let name = handler_name.unwrap_or(event.resource_type.as_str());
        info!(
            handler = %name,
            request_type = %event.request_type,
            request_id = %event.request_id,
            logical_resource_id = %event.logical_resource_id,
            "Handling event"
        );

        let properties = Properties::from_value(event.resource_properties.clone());
        let (physical_resource_id, result) = match (self.handler(name), properties) {
            (Ok(handler), Ok(properties)) => (
                handler.physical_resource_id(&properties),
                run(handler.as_ref(), &event.request_type, &properties, ctx).await,
            ),
            (Ok(handler), Err(e)) => (handler.name().to_string(), Err(e.into())),
            (Err(e), _) => (
                event
                    .physical_resource_id
                    .clone()
                    .unwrap_or_else(|| name.to_string()),
                Err(e),
            ),
        };

        if let Err(e) = &result {
            error!(handler = %name, error = %e, "Request failed");
        }
        let body = response_body(event, physical_resource_id, result, ctx);

        self.responder.respond(&event.response_url, &body).await?;
        Ok(body)
    }
}

async fn run(
    handler: &dyn Handler,
    request_type: &str,
    properties: &Properties,
    ctx: &InvocationContext,
) -> Result<Outputs> {
    let request_type = request_type.parse::<RequestType>()?;
    info!(handler = handler.name(), request_type = %request_type, "Running handler");
    match request_type {
        RequestType::Create | RequestType::Update => handler.apply(properties, ctx).await,
        RequestType::Delete => handler.remove(properties, ctx).await,
    }
}

fn response_body(
    event: &Event,
    physical_resource_id: String,
    result: std::result::Result<Outputs, HandlerError>,
    ctx: &InvocationContext,
) -> ResponseBody {
    let (status, text, data) = match result {
        Ok(outputs) => (Status::Success, reason(None, &ctx.log_stream_name), Some(outputs)),
        Err(e) => (
            Status::Failed,
            reason(Some(&e.to_string()), &ctx.log_stream_name),
            None,
        ),
    };
    ResponseBody {
        stack_id: event.stack_id.clone(),
        request_id: event.request_id.clone(),
        logical_resource_id: event.logical_resource_id.clone(),
        physical_resource_id,
        status,
        reason: text,
        data,
    }
}
