//! getAmazonMachineImage - look up a machine image by name or pattern.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use super::{Handler, Outputs};
use crate::criteria::Properties;
use crate::error::{HandlerError, Result, ValidationError};
use crate::invocation::InvocationContext;
use crate::matching::{Candidate, MatchResult, ScoreCard, select};
use crate::provider::Ec2;
use crate::provider::ec2::{Filter, Image};

/// Attributes stripped from the returned image record.
const EXCLUDED_OUTPUTS: [&str; 9] = [
    "Name",
    "Description",
    "State",
    "StateReason",
    "BlockDeviceMappings",
    "ImageLocation",
    "CreationDate",
    "ProductCodes",
    "Tags",
];

impl Candidate for Image {
    fn id(&self) -> &str {
        &self.image_id
    }
}

impl Image {
    fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.creation_date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
    }
}

#[derive(Debug, Clone)]
pub struct ImageQuery {
    pub name: Option<String>,
    pub regex: Option<Regex>,
    pub owners: Vec<String>,
    pub executable_users: Vec<String>,
    pub filters: Vec<Filter>,
    /// Pick the newest image instead of failing on multiple matches.
    pub latest: bool,
}

impl ImageQuery {
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let name = properties.non_empty_str("Name")?;
        let regex = properties.optional_regex("Regex")?;
        let owners = properties
            .optional_string_list("Owners")?
            .unwrap_or_else(|| vec!["self".to_string()]);
        let executable_users = properties
            .optional_string_list("ExecutableUsers")?
            .unwrap_or_else(|| vec!["all".to_string()]);
        properties.require_identity(&["Name", "Regex"])?;

        let mut filters = vec![Filter::new("state", ["available"])];
        if let Some(name) = &name {
            filters.push(Filter::new("name", [name.as_str()]));
        }
        for object in properties.optional_object_list("Filters")?.unwrap_or_default() {
            let filter: Filter = serde_json::from_value(Value::Object(object.clone()))
                .map_err(|_| ValidationError::NotKeyValue("Filters".to_string()))?;
            filters.push(filter);
        }

        Ok(Self {
            name,
            regex,
            owners,
            executable_users,
            filters,
            latest: properties.optional_bool("Latest")?.unwrap_or(false),
        })
    }

    fn matches(&self, image: &Image) -> bool {
        let Some(regex) = &self.regex else {
            return true;
        };
        match image.name.as_deref() {
            Some(name) if !name.is_empty() => regex.is_match(name),
            _ => {
                debug!(image = %image.image_id, owner = %image.owner_id, "Image has no name to match against, skipping");
                false
            }
        }
    }
}

pub struct MachineImageHandler {
    ec2: Arc<dyn Ec2>,
}

impl MachineImageHandler {
    pub fn new(ec2: Arc<dyn Ec2>) -> Self {
        Self { ec2 }
    }

    pub async fn find(&self, query: &ImageQuery) -> Result<Image> {
        let images = self
            .ec2
            .describe_images(&query.owners, &query.executable_users, &query.filters)
            .await?;
        info!(count = images.len(), "Described images");

        let mut result = select(images, |i| ScoreCard::gate(query.matches(i)).score());
        if query.latest {
            result = result.prefer(|a, b| a.created_at().cmp(&b.created_at()));
        }

        match result {
            MatchResult::Unique(image) => Ok(image),
            MatchResult::NoMatch => Err(HandlerError::NotFound("No images could be found.".to_string())),
            MatchResult::Ambiguous(tied) => {
                info!(count = tied.len(), "More than one image found and Latest is not set");
                Err(HandlerError::Ambiguous("More than one image was found.".to_string()))
            }
        }
    }
}

fn outputs(image: &Image) -> Outputs {
    let mut outputs = match serde_json::to_value(image) {
        Ok(Value::Object(map)) => map,
        _ => Outputs::new(),
    };
    for key in EXCLUDED_OUTPUTS {
        outputs.remove(key);
    }
    outputs
}

#[async_trait]
impl Handler for MachineImageHandler {
    fn name(&self) -> &'static str {
        "getAmazonMachineImage"
    }

    fn primary_property(&self) -> &'static str {
        "Name"
    }

    async fn apply(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let query = ImageQuery::from_properties(properties)?;
        let image = self.find(&query).await?;
        info!(image = %image.image_id, created = image.creation_date.as_deref().unwrap_or_default(), "Matched image");
        Ok(outputs(&image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use serde_json::json;

    fn handler() -> MachineImageHandler {
        let state = json!({
            "AccountId": "111111111111",
            "Images": [
                {"ImageId": "ami-old", "Name": "base-2024.01", "OwnerId": "111111111111", "State": "available",
                 "CreationDate": "2024-01-10T08:00:00.000Z", "Architecture": "x86_64", "Public": true,
                 "Description": "base image", "VirtualizationType": "hvm"},
                {"ImageId": "ami-new", "Name": "base-2024.06", "OwnerId": "111111111111", "State": "available",
                 "CreationDate": "2024-06-02T08:00:00.000Z", "Architecture": "x86_64", "Public": true,
                 "VirtualizationType": "hvm"},
                {"ImageId": "ami-arm", "Name": "base-2024.07", "OwnerId": "111111111111", "State": "available",
                 "CreationDate": "2024-07-02T08:00:00.000Z", "Architecture": "arm64", "Public": true},
                {"ImageId": "ami-anon", "OwnerId": "111111111111", "State": "available", "Public": true}
            ]
        });
        MachineImageHandler::new(Arc::new(MemoryProvider::from_json(&state.to_string()).unwrap()))
    }

    fn props(value: serde_json::Value) -> Properties {
        Properties::from_value(value).unwrap()
    }

    #[test]
    fn test_name_or_regex_required() {
        let err = ImageQuery::from_properties(&props(json!({"Owners": ["self"]}))).unwrap_err();
        assert_eq!(err.to_string(), "Either Name or Regex property has to be set.");

        let err = ImageQuery::from_properties(&props(json!({"Name": "  "}))).unwrap_err();
        assert_eq!(err.to_string(), "The Name property cannot be empty.");
    }

    #[test]
    fn test_invalid_inputs() {
        let err = ImageQuery::from_properties(&props(json!({"Regex": "("}))).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("The Regex property contains an invalid regular expression:")
        );

        let err = ImageQuery::from_properties(&props(json!({"Name": "x", "Owners": "self"}))).unwrap_err();
        assert_eq!(err.to_string(), "The Owners property must be an array.");

        let err = ImageQuery::from_properties(&props(json!({"Name": "x", "Filters": ["arch"]}))).unwrap_err();
        assert_eq!(err.to_string(), "The Filters property must include key-value pairs only.");
    }

    #[tokio::test]
    async fn test_latest_picks_newest() {
        let out = handler()
            .apply(
                &props(json!({
                    "Regex": "^base-",
                    "Latest": "true",
                    "Filters": [{"Name": "architecture", "Values": ["x86_64"]}]
                })),
                &InvocationContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(out["ImageId"], "ami-new");
        assert_eq!(out["VirtualizationType"], "hvm");
        assert!(!out.contains_key("Name"));
        assert!(!out.contains_key("CreationDate"));
        assert!(!out.contains_key("State"));
    }

    #[tokio::test]
    async fn test_multiple_without_latest_fails() {
        let err = handler()
            .apply(&props(json!({"Regex": "^base-"})), &InvocationContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "More than one image was found.");
    }

    #[tokio::test]
    async fn test_exact_name_and_description_removed() {
        let out = handler()
            .apply(&props(json!({"Name": "base-2024.01"})), &InvocationContext::default())
            .await
            .unwrap();
        assert_eq!(out["ImageId"], "ami-old");
        assert!(!out.contains_key("Description"));
    }

    #[tokio::test]
    async fn test_no_images() {
        let err = handler()
            .apply(&props(json!({"Regex": "^debian-"})), &InvocationContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No images could be found.");
    }
}
