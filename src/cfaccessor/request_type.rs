//! Request classification
//!
//! Every discovery call is tagged with a [`RequestType`] so that logs and
//! metrics can be correlated per call site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of control-plane resource a call retrieves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Single organization looked up by name
    Org,
    /// Every organization visible to the caller
    AllOrgs,
    /// Single space looked up by organization and name
    Space,
    /// Every space of one organization
    SpaceInOrg,
    /// Every application of one space
    AllAppsInSpace,
    /// Summary (routes, instances) of one space
    SpaceSummary,
    /// Anything else
    Other,
}

impl RequestType {
    /// All request types, in declaration order
    pub const ALL: [RequestType; 7] = [
        RequestType::Org,
        RequestType::AllOrgs,
        RequestType::Space,
        RequestType::SpaceInOrg,
        RequestType::AllAppsInSpace,
        RequestType::SpaceSummary,
        RequestType::Other,
    ];

    /// Stable label used for metrics
    pub fn metric_name(&self) -> &'static str {
        match self {
            RequestType::Org => "org",
            RequestType::AllOrgs => "all_orgs",
            RequestType::Space => "space",
            RequestType::SpaceInOrg => "space_in_org",
            RequestType::AllAppsInSpace => "all_apps_in_space",
            RequestType::SpaceSummary => "space_summary",
            RequestType::Other => "other",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_name())
    }
}
