//! Control Plane Accessor
//!
//! The discovery call sites. Each method builds the concrete request (or
//! request generator) for one kind of lookup and hands it to the shared
//! [`PaginatedRequestFetcher`]. Failures are returned as they are; falling
//! back to an empty response is the caller's decision.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::client::ControlPlane;
use super::error::AccessorResult;
use super::fetcher::PaginatedRequestFetcher;
use super::model::{
    GetSpaceSummaryRequest, GetSpaceSummaryResponse, ListApplicationsRequest,
    ListApplicationsResponse, ListOrganizationsRequest, ListOrganizationsResponse,
    ListSpacesRequest, ListSpacesResponse,
};
use super::request_type::RequestType;

/// Correlation key used when a listing has no natural target
const EMPTY_KEY: &str = "(empty)";

/// Timeout bound per kind of lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub org: Duration,
    pub space: Duration,
    pub app_in_space: Duration,
    pub app_summary: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            org: Duration::from_millis(2500),
            space: Duration::from_millis(2500),
            app_in_space: Duration::from_millis(2500),
            app_summary: Duration::from_millis(4000),
        }
    }
}

/// Discovery lookups against the control plane
#[async_trait]
pub trait CfAccessor: Send + Sync {
    /// Look up an organization by name (zero or one result)
    async fn retrieve_org_id(&self, org_name: &str) -> AccessorResult<ListOrganizationsResponse>;

    /// List every organization
    async fn retrieve_all_org_ids(&self) -> AccessorResult<ListOrganizationsResponse>;

    /// Look up a space of an organization by name (zero or one result)
    async fn retrieve_space_id(
        &self,
        org_id: &str,
        space_name: &str,
    ) -> AccessorResult<ListSpacesResponse>;

    /// List every space of an organization
    async fn retrieve_space_ids_in_org(&self, org_id: &str) -> AccessorResult<ListSpacesResponse>;

    /// List every application of a space
    async fn retrieve_all_application_ids_in_space(
        &self,
        org_id: &str,
        space_id: &str,
    ) -> AccessorResult<ListApplicationsResponse>;

    /// Fetch the summary (routes, instances) of a space
    async fn retrieve_space_summary(
        &self,
        space_id: &str,
    ) -> AccessorResult<GetSpaceSummaryResponse>;

    /// API version reported by the platform
    async fn api_version(&self) -> AccessorResult<Option<String>>;
}

/// [`CfAccessor`] backed by a [`ControlPlane`] transport
pub struct ReactiveCfAccessor<C> {
    client: Arc<C>,
    fetcher: PaginatedRequestFetcher,
    timeouts: RequestTimeouts,
}

impl<C: ControlPlane> ReactiveCfAccessor<C> {
    pub fn new(client: Arc<C>, fetcher: PaginatedRequestFetcher, timeouts: RequestTimeouts) -> Self {
        Self {
            client,
            fetcher,
            timeouts,
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn timeouts(&self) -> RequestTimeouts {
        self.timeouts
    }

    /// Ask the platform for its API version and log it.
    ///
    /// A platform that answers without a version only produces a warning;
    /// an unreachable platform is an error.
    pub async fn precheck_api_version(&self) -> anyhow::Result<()> {
        match self.api_version().await {
            Ok(Some(version)) => {
                tracing::info!("Target platform is running on API version {}", version);
                Ok(())
            }
            Ok(None) => {
                tracing::warn!("Target platform did not provide a proper API version");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("Unable to reach the platform info endpoint: {}", e)),
        }
    }
}

#[async_trait]
impl<C: ControlPlane> CfAccessor for ReactiveCfAccessor<C> {
    async fn retrieve_org_id(&self, org_name: &str) -> AccessorResult<ListOrganizationsResponse> {
        // A name lookup yields at most one organization, no paging needed
        let client = Arc::clone(&self.client);

        self.fetcher
            .perform_generic_retrieval(
                RequestType::Org,
                org_name,
                ListOrganizationsRequest::by_name(org_name),
                move |request| async move { client.list_organizations(request).await },
                self.timeouts.org,
            )
            .await
    }

    async fn retrieve_all_org_ids(&self) -> AccessorResult<ListOrganizationsResponse> {
        let client = Arc::clone(&self.client);

        self.fetcher
            .perform_generic_paged_retrieval(
                RequestType::AllOrgs,
                EMPTY_KEY,
                ListOrganizationsRequest::paged,
                move |request| {
                    let client = Arc::clone(&client);
                    async move { client.list_organizations(request).await }
                },
                self.timeouts.org,
                ListOrganizationsResponse::aggregated,
            )
            .await
    }

    async fn retrieve_space_id(
        &self,
        org_id: &str,
        space_name: &str,
    ) -> AccessorResult<ListSpacesResponse> {
        let key = format!("{}|{}", org_id, space_name);
        let client = Arc::clone(&self.client);
        let request = ListSpacesRequest {
            organization_id: Some(org_id.to_string()),
            name: Some(space_name.to_string()),
            ..Default::default()
        };

        self.fetcher
            .perform_generic_retrieval(
                RequestType::Space,
                &key,
                request,
                move |request| async move { client.list_spaces(request).await },
                self.timeouts.space,
            )
            .await
    }

    async fn retrieve_space_ids_in_org(&self, org_id: &str) -> AccessorResult<ListSpacesResponse> {
        let client = Arc::clone(&self.client);
        let organization_id = org_id.to_string();

        self.fetcher
            .perform_generic_paged_retrieval(
                RequestType::SpaceInOrg,
                org_id,
                move |order_direction, results_per_page, page| ListSpacesRequest {
                    organization_id: Some(organization_id.clone()),
                    name: None,
                    order_direction: Some(order_direction),
                    results_per_page: Some(results_per_page),
                    page: Some(page),
                },
                move |request| {
                    let client = Arc::clone(&client);
                    async move { client.list_spaces(request).await }
                },
                self.timeouts.space,
                ListSpacesResponse::aggregated,
            )
            .await
    }

    async fn retrieve_all_application_ids_in_space(
        &self,
        org_id: &str,
        space_id: &str,
    ) -> AccessorResult<ListApplicationsResponse> {
        let key = format!("{}|{}", org_id, space_id);
        let client = Arc::clone(&self.client);
        let organization_id = org_id.to_string();
        let space_id = space_id.to_string();

        self.fetcher
            .perform_generic_paged_retrieval(
                RequestType::AllAppsInSpace,
                &key,
                move |order_direction, results_per_page, page| ListApplicationsRequest {
                    organization_id: Some(organization_id.clone()),
                    space_id: Some(space_id.clone()),
                    order_direction: Some(order_direction),
                    results_per_page: Some(results_per_page),
                    page: Some(page),
                },
                move |request| {
                    let client = Arc::clone(&client);
                    async move { client.list_applications(request).await }
                },
                self.timeouts.app_in_space,
                ListApplicationsResponse::aggregated,
            )
            .await
    }

    async fn retrieve_space_summary(
        &self,
        space_id: &str,
    ) -> AccessorResult<GetSpaceSummaryResponse> {
        // Space summaries are not paginated
        let client = Arc::clone(&self.client);
        let request = GetSpaceSummaryRequest {
            space_id: space_id.to_string(),
        };

        self.fetcher
            .perform_generic_retrieval(
                RequestType::SpaceSummary,
                space_id,
                request,
                move |request| async move { client.get_space_summary(request).await },
                self.timeouts.app_summary,
            )
            .await
    }

    async fn api_version(&self) -> AccessorResult<Option<String>> {
        let client = Arc::clone(&self.client);

        self.fetcher
            .perform_generic_retrieval(
                RequestType::Other,
                "info",
                (),
                move |_| async move { client.api_version().await },
                self.timeouts.org,
            )
            .await
    }
}
