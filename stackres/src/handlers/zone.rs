//! getRoute53ZoneByName - resolve a hosted zone by domain name.
//!
//! The name is mandatory. Comment, tags, VPC association and the private-zone
//! flag each add a point when supplied and satisfied.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Handler, Outputs, put};
use crate::criteria::{self, Properties, TagSet};
use crate::error::Result;
use crate::fetch::enrich;
use crate::invocation::InvocationContext;
use crate::matching::{Candidate, MatchResult, Score, ScoreCard, select};
use crate::provider::Route53;
use crate::provider::route53::{HOSTED_ZONE_RESOURCE, HostedZone, Vpc, normalize_zone_name};

/// Normalized zone criteria.
#[derive(Debug, Clone, Default)]
pub struct ZoneCriteria {
    /// Domain name without trailing dot.
    pub domain_name: String,
    pub vpc_id: Option<String>,
    pub comment: Option<String>,
    pub tags: Option<TagSet>,
    pub private_zone: Option<bool>,
}

impl ZoneCriteria {
    pub fn from_properties(properties: &Properties) -> criteria::Result<Self> {
        let domain_name = properties.required_str("DomainName")?;
        Ok(Self {
            domain_name: normalize_zone_name(&domain_name).to_string(),
            vpc_id: properties.optional_str("VpcId")?,
            comment: properties.optional_str("Comment")?,
            tags: properties.optional_tags("Tags")?.filter(|t| !t.is_empty()),
            private_zone: properties.optional_bool("PrivateZone")?,
        })
    }

    fn score(&self, candidate: &ZoneCandidate) -> Score {
        let zone = &candidate.zone;
        ScoreCard::gate(normalize_zone_name(&zone.name) == self.domain_name)
            .optional(self.comment.as_deref(), |c| {
                zone.config.comment.as_deref() == Some(c)
            })
            .optional(self.tags.as_ref(), |t| candidate.tags.as_ref() == Some(t))
            .optional(self.vpc_id.as_deref(), |id| {
                candidate.vpcs.iter().any(|v| v.vpc_id == id)
            })
            .optional(self.private_zone, |p| zone.config.private_zone == p)
            .score()
    }
}

/// Hosted zone with the attributes the list call omits.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneCandidate {
    pub zone: HostedZone,
    /// Filled only when matching by VPC.
    pub vpcs: Vec<Vpc>,
    /// Filled only when matching by tags.
    pub tags: Option<TagSet>,
}

impl Candidate for ZoneCandidate {
    fn id(&self) -> &str {
        self.zone.short_id()
    }
}

pub struct ZoneHandler {
    route53: Arc<dyn Route53>,
}

impl ZoneHandler {
    pub fn new(route53: Arc<dyn Route53>) -> Self {
        Self { route53 }
    }

    /// List zones and enrich them with whatever the criteria need.
    pub async fn candidates(&self, criteria: &ZoneCriteria) -> Result<Vec<ZoneCandidate>> {
        let route53 = self.route53.as_ref();

        let mut candidates: Vec<ZoneCandidate> = route53
            .list_hosted_zones()
            .await?
            .into_iter()
            .map(|zone| ZoneCandidate {
                zone,
                vpcs: Vec::new(),
                tags: None,
            })
            .collect();
        info!(count = candidates.len(), "Listed hosted zones");

        if criteria.vpc_id.is_some() {
            candidates = enrich(
                candidates,
                move |c| {
                    let id = c.zone.id.clone();
                    async move {
                        let detail = route53.get_hosted_zone(&id).await?;
                        Ok((detail.hosted_zone.short_id().to_string(), detail.vpcs))
                    }
                },
                |c, vpcs| c.vpcs = vpcs,
            )
            .await?;
        }

        if criteria.tags.is_some() {
            candidates = enrich(
                candidates,
                move |c| {
                    let id = c.id().to_string();
                    async move {
                        let set = route53
                            .list_tags_for_resource(HOSTED_ZONE_RESOURCE, &id)
                            .await?;
                        let tags: TagSet = set.tags.into_iter().map(|t| (t.key, t.value)).collect();
                        Ok((set.resource_id, tags))
                    }
                },
                |c, tags| c.tags = Some(tags),
            )
            .await?;
        }

        Ok(candidates)
    }

    pub async fn find(&self, criteria: &ZoneCriteria) -> Result<MatchResult<ZoneCandidate>> {
        let candidates = self.candidates(criteria).await?;
        Ok(select(candidates, |c| criteria.score(c)))
    }
}

#[async_trait]
impl Handler for ZoneHandler {
    fn name(&self) -> &'static str {
        "getRoute53ZoneByName"
    }

    fn primary_property(&self) -> &'static str {
        "DomainName"
    }

    async fn apply(&self, properties: &Properties, _ctx: &InvocationContext) -> Result<Outputs> {
        let criteria = ZoneCriteria::from_properties(properties)?;
        info!(domain = %criteria.domain_name, "Resolving hosted zone");

        let matched = self.find(&criteria).await?.into_unique("Hosted Zone")?;
        info!(zone = %matched.id(), "Matched hosted zone");

        let mut outputs = Outputs::new();
        put(&mut outputs, "Id", matched.id());
        put(&mut outputs, "Name", normalize_zone_name(&matched.zone.name));
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::route53::HostedZoneConfig;
    use serde_json::json;

    fn candidate(id: &str, name: &str, comment: Option<&str>, private: bool) -> ZoneCandidate {
        ZoneCandidate {
            zone: HostedZone {
                id: format!("/hostedzone/{id}"),
                name: name.to_string(),
                config: HostedZoneConfig {
                    comment: comment.map(str::to_string),
                    private_zone: private,
                },
            },
            vpcs: Vec::new(),
            tags: None,
        }
    }

    fn criteria(value: serde_json::Value) -> ZoneCriteria {
        ZoneCriteria::from_properties(&Properties::from_value(value).unwrap()).unwrap()
    }

    #[test]
    fn test_criteria_require_domain_name() {
        let props = Properties::from_value(json!({"Comment": "x"})).unwrap();
        let err = ZoneCriteria::from_properties(&props).unwrap_err();
        assert_eq!(err.to_string(), "The DomainName property was not specified.");
    }

    #[test]
    fn test_criteria_strip_trailing_dot() {
        assert_eq!(criteria(json!({"DomainName": "example.com."})).domain_name, "example.com");
    }

    #[test]
    fn test_name_is_mandatory() {
        let c = criteria(json!({"DomainName": "example.com", "Comment": "main"}));
        assert!(c.score(&candidate("Z1", "other.com.", Some("main"), false)).is_excluded());
        assert_eq!(c.score(&candidate("Z2", "example.com.", Some("main"), false)).value(), 2);
    }

    #[test]
    fn test_private_zone_absent_contributes_nothing() {
        let unset = criteria(json!({"DomainName": "example.com"}));
        let public = candidate("Z1", "example.com.", None, false);
        let private = candidate("Z2", "example.com.", None, true);
        assert_eq!(unset.score(&public), unset.score(&private));

        // An explicit false is a real criterion
        let explicit = criteria(json!({"DomainName": "example.com", "PrivateZone": "false"}));
        assert_eq!(explicit.score(&public).value(), 2);
        assert_eq!(explicit.score(&private).value(), 1);
    }

    #[test]
    fn test_tags_and_vpc_points() {
        let c = criteria(json!({
            "DomainName": "example.com",
            "VpcId": "vpc-1",
            "Tags": [{"Key": "env", "Value": "prod"}]
        }));
        let mut zone = candidate("Z1", "example.com.", None, true);
        assert_eq!(c.score(&zone).value(), 1);

        zone.vpcs.push(Vpc {
            vpc_id: "vpc-1".into(),
            vpc_region: None,
        });
        zone.tags = Some([("env", "prod")].into_iter().collect());
        assert_eq!(c.score(&zone).value(), 3);
    }

    #[test]
    fn test_empty_tags_are_not_a_criterion() {
        let c = criteria(json!({"DomainName": "example.com", "Tags": []}));
        assert!(c.tags.is_none());
    }
}
