//! Control Plane Data Model
//!
//! Request values handed to the transport and the v2 response envelopes it
//! returns. Paged listings share [`PagedResponse`]; the retrieval engine only
//! sees them through the [`Page`] trait.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction requested from the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List organizations, optionally filtered by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOrganizationsRequest {
    pub name: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub results_per_page: Option<u32>,
    pub page: Option<u32>,
}

impl ListOrganizationsRequest {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn paged(order_direction: OrderDirection, results_per_page: u32, page: u32) -> Self {
        Self {
            name: None,
            order_direction: Some(order_direction),
            results_per_page: Some(results_per_page),
            page: Some(page),
        }
    }
}

/// List spaces, optionally filtered by organization and name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSpacesRequest {
    pub organization_id: Option<String>,
    pub name: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub results_per_page: Option<u32>,
    pub page: Option<u32>,
}

/// List applications of a space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListApplicationsRequest {
    pub organization_id: Option<String>,
    pub space_id: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub results_per_page: Option<u32>,
    pub page: Option<u32>,
}

/// Fetch the summary of one space (not paginated)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetSpaceSummaryRequest {
    pub space_id: String,
}

/// Resource metadata common to every v2 resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub guid: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// v2 resource envelope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource<E> {
    pub metadata: Metadata,
    pub entity: E,
}

impl<E> Resource<E> {
    pub fn guid(&self) -> &str {
        &self.metadata.guid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationEntity {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceEntity {
    pub name: String,
    #[serde(default)]
    pub organization_guid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEntity {
    pub name: String,
    #[serde(default)]
    pub space_guid: String,
    #[serde(default)]
    pub state: Option<String>,
}

pub type OrganizationResource = Resource<OrganizationEntity>;
pub type SpaceResource = Resource<SpaceEntity>;
pub type ApplicationResource = Resource<ApplicationEntity>;

/// One page of a v2 listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedResponse<R> {
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub prev_url: Option<String>,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default = "Vec::new")]
    pub resources: Vec<R>,
}

impl<R> Default for PagedResponse<R> {
    fn default() -> Self {
        Self {
            total_results: 0,
            total_pages: 0,
            prev_url: None,
            next_url: None,
            resources: Vec::new(),
        }
    }
}

impl<R> PagedResponse<R> {
    /// Build an aggregated listing.
    ///
    /// `total_results` is recomputed from the resources actually collected and
    /// never taken from a server-declared figure.
    pub fn aggregated(resources: Vec<R>, total_pages: u32) -> Self {
        Self {
            total_results: resources.len() as u32,
            total_pages,
            prev_url: None,
            next_url: None,
            resources,
        }
    }
}

pub type ListOrganizationsResponse = PagedResponse<OrganizationResource>;
pub type ListSpacesResponse = PagedResponse<SpaceResource>;
pub type ListApplicationsResponse = PagedResponse<ApplicationResource>;

/// A single page as seen by the paged retrieval loop
pub trait Page {
    type Resource;

    /// Server-declared number of pages
    fn total_pages(&self) -> u32;

    /// Server-declared number of results across all pages
    fn total_results(&self) -> u32;

    fn into_resources(self) -> Vec<Self::Resource>;
}

impl<R> Page for PagedResponse<R> {
    type Resource = R;

    fn total_pages(&self) -> u32 {
        self.total_pages
    }

    fn total_results(&self) -> u32 {
        self.total_results
    }

    fn into_resources(self) -> Vec<R> {
        self.resources
    }
}

/// Application entry of a space summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceApplicationSummary {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub instances: u32,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSpaceSummaryResponse {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub apps: Vec<SpaceApplicationSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v2_organizations_page() {
        let json = r#"{
            "total_results": 3,
            "total_pages": 2,
            "prev_url": null,
            "next_url": "/v2/organizations?order-direction=asc&page=2&results-per-page=2",
            "resources": [
                {"metadata": {"guid": "o-1", "url": "/v2/organizations/o-1", "created_at": "2016-06-08T16:41:33Z"},
                 "entity": {"name": "alpha", "status": "active"}},
                {"metadata": {"guid": "o-2", "url": "/v2/organizations/o-2"},
                 "entity": {"name": "beta"}}
            ]
        }"#;

        let page: ListOrganizationsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_pages(), 2);
        assert_eq!(page.total_results(), 3);
        assert_eq!(page.resources[1].guid(), "o-2");
        assert_eq!(page.resources[0].entity.name, "alpha");
    }

    #[test]
    fn test_parse_space_summary() {
        let json = r#"{
            "guid": "s-1",
            "name": "dev",
            "apps": [
                {"guid": "a-1", "name": "web", "urls": ["web.example.com"], "instances": 2,
                 "running_instances": 2, "state": "STARTED"}
            ],
            "services": []
        }"#;

        let summary: GetSpaceSummaryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(summary.apps.len(), 1);
        assert_eq!(summary.apps[0].urls, vec!["web.example.com".to_string()]);
        assert_eq!(summary.apps[0].state.as_deref(), Some("STARTED"));
    }

    #[test]
    fn test_aggregated_recomputes_total_results() {
        let response = ListOrganizationsResponse::aggregated(
            vec![OrganizationResource::default(), OrganizationResource::default()],
            5,
        );
        assert_eq!(response.total_pages, 5);
        assert_eq!(response.total_results, 2);
    }

    #[test]
    fn test_missing_resources_default_to_empty() {
        let page: ListSpacesResponse = serde_json::from_str(r#"{"total_pages": 0}"#).unwrap();
        assert!(page.into_resources().is_empty());
    }

    #[test]
    fn test_order_direction_wire_format() {
        assert_eq!(OrderDirection::Asc.to_string(), "asc");
        assert_eq!(OrderDirection::Desc.as_str(), "desc");
        assert_eq!(OrderDirection::default(), OrderDirection::Asc);
    }
}
