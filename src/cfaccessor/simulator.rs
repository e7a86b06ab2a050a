//! Simulated Control Plane
//!
//! An in-memory control plane with a fixed landscape of organizations,
//! spaces and applications. It paginates like the real API, answers after a
//! random delay and can be told to fail for selected resources.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

use super::client::ControlPlane;
use super::error::ControlPlaneError;
use super::model::{
    ApplicationEntity, ApplicationResource, GetSpaceSummaryRequest, GetSpaceSummaryResponse,
    ListApplicationsRequest, ListApplicationsResponse, ListOrganizationsRequest,
    ListOrganizationsResponse, ListSpacesRequest, ListSpacesResponse, Metadata,
    OrganizationEntity, OrganizationResource, PagedResponse, SpaceApplicationSummary, SpaceEntity,
    SpaceResource,
};

/// Page size used when a request does not ask for one
pub const DEFAULT_RESULTS_PER_PAGE: u32 = 50;

/// Largest page size the control plane accepts
pub const MAX_RESULTS_PER_PAGE: u32 = 100;

/// Shape of the simulated landscape
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub orgs: usize,
    pub spaces_per_org: usize,
    pub apps_per_space: usize,

    /// Upper bound of the random per-request latency
    pub max_latency: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            orgs: 2,
            spaces_per_org: 3,
            apps_per_space: 5,
            max_latency: Duration::from_millis(20),
        }
    }
}

/// In-memory control plane
#[derive(Debug)]
pub struct SimulatedControlPlane {
    orgs: Vec<OrganizationResource>,
    spaces: Vec<SpaceResource>,
    apps: Vec<ApplicationResource>,
    max_latency: Duration,

    /// Guids for which every request fails
    failing: HashSet<String>,

    requests: AtomicU64,
}

fn metadata(collection: &str) -> Metadata {
    let guid = Uuid::new_v4().to_string();
    Metadata {
        url: Some(format!("/v2/{}/{}", collection, guid)),
        guid,
    }
}

impl SimulatedControlPlane {
    pub fn new(config: SimulationConfig) -> Self {
        let mut orgs = Vec::with_capacity(config.orgs);
        let mut spaces = Vec::new();
        let mut apps = Vec::new();

        for o in 0..config.orgs {
            let org = OrganizationResource {
                metadata: metadata("organizations"),
                entity: OrganizationEntity {
                    name: format!("org-{}", o),
                },
            };

            for s in 0..config.spaces_per_org {
                let space = SpaceResource {
                    metadata: metadata("spaces"),
                    entity: SpaceEntity {
                        name: format!("space-{}", s),
                        organization_guid: org.metadata.guid.clone(),
                    },
                };

                for a in 0..config.apps_per_space {
                    // Every fifth application is stopped
                    let state = if a % 5 == 4 { "STOPPED" } else { "STARTED" };
                    apps.push(ApplicationResource {
                        metadata: metadata("apps"),
                        entity: ApplicationEntity {
                            name: format!("app-{}", a),
                            space_guid: space.metadata.guid.clone(),
                            state: Some(state.to_string()),
                        },
                    });
                }

                spaces.push(space);
            }

            orgs.push(org);
        }

        Self {
            orgs,
            spaces,
            apps,
            max_latency: config.max_latency,
            failing: HashSet::new(),
            requests: AtomicU64::new(0),
        }
    }

    /// Make every request touching `guid` fail with a server error
    pub fn fail_on(mut self, guid: impl Into<String>) -> Self {
        self.failing.insert(guid.into());
        self
    }

    pub fn organizations(&self) -> &[OrganizationResource] {
        &self.orgs
    }

    pub fn spaces(&self) -> &[SpaceResource] {
        &self.spaces
    }

    pub fn applications(&self) -> &[ApplicationResource] {
        &self.apps
    }

    /// Number of requests answered so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    async fn respond(&self, touched: &[Option<&String>]) -> Result<(), ControlPlaneError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let max_ms = self.max_latency.as_millis() as u64;
        if max_ms > 0 {
            tokio::time::sleep(Duration::from_millis(fastrand::u64(..=max_ms))).await;
        }

        if let Some(guid) = touched.iter().flatten().find(|g| self.failing.contains(**g)) {
            return Err(ControlPlaneError::Status {
                status: 500,
                body: format!("simulated failure for {}", guid),
            });
        }

        Ok(())
    }

    fn space(&self, guid: &str) -> Option<&SpaceResource> {
        self.spaces.iter().find(|s| s.metadata.guid == guid)
    }
}

/// Cut one page out of `items` the way the v2 API does
fn paginate<R: Clone>(
    items: &[R],
    results_per_page: Option<u32>,
    page: Option<u32>,
) -> Result<PagedResponse<R>, ControlPlaneError> {
    let per_page = results_per_page.unwrap_or(DEFAULT_RESULTS_PER_PAGE);
    if per_page == 0 || per_page > MAX_RESULTS_PER_PAGE {
        return Err(ControlPlaneError::InvalidRequest(format!(
            "results-per-page must be between 1 and {}",
            MAX_RESULTS_PER_PAGE
        )));
    }

    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(ControlPlaneError::InvalidRequest(
            "page must be at least 1".to_string(),
        ));
    }

    let total_results = items.len() as u32;
    let total_pages = total_results.div_ceil(per_page);
    let start = (page as usize - 1).saturating_mul(per_page as usize);
    let resources = items
        .iter()
        .skip(start)
        .take(per_page as usize)
        .cloned()
        .collect();

    Ok(PagedResponse {
        total_results,
        total_pages,
        prev_url: None,
        next_url: None,
        resources,
    })
}

#[async_trait]
impl ControlPlane for SimulatedControlPlane {
    async fn list_organizations(
        &self,
        request: ListOrganizationsRequest,
    ) -> Result<ListOrganizationsResponse, ControlPlaneError> {
        self.respond(&[]).await?;

        let matching: Vec<_> = self
            .orgs
            .iter()
            .filter(|o| request.name.as_ref().map_or(true, |n| &o.entity.name == n))
            .cloned()
            .collect();

        if let Some(org) = matching.iter().find(|o| self.failing.contains(&o.metadata.guid)) {
            return Err(ControlPlaneError::Status {
                status: 500,
                body: format!("simulated failure for {}", org.metadata.guid),
            });
        }

        paginate(&matching, request.results_per_page, request.page)
    }

    async fn list_spaces(
        &self,
        request: ListSpacesRequest,
    ) -> Result<ListSpacesResponse, ControlPlaneError> {
        self.respond(&[request.organization_id.as_ref()]).await?;

        let matching: Vec<_> = self
            .spaces
            .iter()
            .filter(|s| {
                request
                    .organization_id
                    .as_ref()
                    .map_or(true, |o| &s.entity.organization_guid == o)
            })
            .filter(|s| request.name.as_ref().map_or(true, |n| &s.entity.name == n))
            .cloned()
            .collect();

        paginate(&matching, request.results_per_page, request.page)
    }

    async fn list_applications(
        &self,
        request: ListApplicationsRequest,
    ) -> Result<ListApplicationsResponse, ControlPlaneError> {
        self.respond(&[request.organization_id.as_ref(), request.space_id.as_ref()])
            .await?;

        let matching: Vec<_> = self
            .apps
            .iter()
            .filter(|a| {
                request
                    .space_id
                    .as_ref()
                    .map_or(true, |s| &a.entity.space_guid == s)
            })
            .filter(|a| {
                request.organization_id.as_ref().map_or(true, |o| {
                    self.space(&a.entity.space_guid)
                        .is_some_and(|s| &s.entity.organization_guid == o)
                })
            })
            .cloned()
            .collect();

        paginate(&matching, request.results_per_page, request.page)
    }

    async fn get_space_summary(
        &self,
        request: GetSpaceSummaryRequest,
    ) -> Result<GetSpaceSummaryResponse, ControlPlaneError> {
        self.respond(&[Some(&request.space_id)]).await?;

        let space = self
            .space(&request.space_id)
            .ok_or_else(|| ControlPlaneError::Unknown {
                kind: "space",
                id: request.space_id.clone(),
            })?;

        let apps = self
            .apps
            .iter()
            .filter(|a| a.entity.space_guid == request.space_id)
            .enumerate()
            .map(|(i, a)| SpaceApplicationSummary {
                guid: a.metadata.guid.clone(),
                name: a.entity.name.clone(),
                urls: vec![format!(
                    "{}.{}.apps.example.com",
                    a.entity.name, space.entity.name
                )],
                instances: 1 + (i as u32 % 3),
                state: a.entity.state.clone(),
            })
            .collect();

        Ok(GetSpaceSummaryResponse {
            guid: space.metadata.guid.clone(),
            name: space.entity.name.clone(),
            apps,
        })
    }

    async fn api_version(&self) -> Result<Option<String>, ControlPlaneError> {
        self.respond(&[]).await?;
        Ok(Some("2.150.0".to_string()))
    }
}
