//! Control Plane Transport
//!
//! The [`ControlPlane`] trait is the outbound seam of the retrieval engine:
//! one request value in, one page (or summary) out. [`HttpControlPlane`]
//! speaks the v2 REST API; tests and the `simulate` command use the
//! in-memory [`SimulatedControlPlane`](super::simulator::SimulatedControlPlane).

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::RwLock;
use std::time::Duration;

use super::error::ControlPlaneError;
use super::model::{
    GetSpaceSummaryRequest, GetSpaceSummaryResponse, ListApplicationsRequest,
    ListApplicationsResponse, ListOrganizationsRequest, ListOrganizationsResponse,
    ListSpacesRequest, ListSpacesResponse, OrderDirection,
};

/// Transport used by the accessor to reach the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    async fn list_organizations(
        &self,
        request: ListOrganizationsRequest,
    ) -> Result<ListOrganizationsResponse, ControlPlaneError>;

    async fn list_spaces(
        &self,
        request: ListSpacesRequest,
    ) -> Result<ListSpacesResponse, ControlPlaneError>;

    async fn list_applications(
        &self,
        request: ListApplicationsRequest,
    ) -> Result<ListApplicationsResponse, ControlPlaneError>;

    async fn get_space_summary(
        &self,
        request: GetSpaceSummaryRequest,
    ) -> Result<GetSpaceSummaryResponse, ControlPlaneError>;

    /// API version reported by the platform, if any
    async fn api_version(&self) -> Result<Option<String>, ControlPlaneError>;

    /// Drop pooled connections and cached credentials
    fn reset(&self) {}
}

#[derive(serde::Deserialize)]
struct InfoResponse {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    token_endpoint: Option<String>,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// How requests authenticate against the control plane
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    Anonymous,
    /// Static bearer token
    Token(String),
    /// OAuth password grant against the platform's token endpoint
    Password { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Token(_) => f.write_str("Token(***)"),
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Outbound HTTP proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Hostname or IP address, without scheme
    pub host: String,
    pub port: u16,
}

impl ProxySettings {
    /// Proxy URL with the host resolved to an IP address
    pub fn resolve(&self) -> Result<Url, ControlPlaneError> {
        let addr = match self.host.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.port),
            Err(_) => (self.host.as_str(), self.port)
                .to_socket_addrs()
                .ok()
                .and_then(|mut addrs| addrs.next())
                .ok_or_else(|| {
                    ControlPlaneError::Configuration(format!(
                        "The proxy host '{}' cannot be resolved to an IP address; is there a typo in your configuration?",
                        self.host
                    ))
                })?,
        };

        Url::parse(&format!("http://{}", addr)).map_err(|e| {
            ControlPlaneError::Configuration(format!("invalid proxy '{}': {}", addr, e))
        })
    }
}

/// Everything needed to build an [`HttpControlPlane`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    /// API hostname, without scheme
    pub api_host: String,
    pub skip_ssl_validation: bool,
    pub proxy: Option<ProxySettings>,
    /// Idle connections kept per host
    pub connection_pool_size: Option<usize>,
    pub credentials: Credentials,
}

impl ConnectionSettings {
    pub fn new(api_host: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
            ..Self::default()
        }
    }

    fn build_client(&self) -> Result<reqwest::Client, ControlPlaneError> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.skip_ssl_validation)
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy) = &self.proxy {
            let url = proxy.resolve()?;
            tracing::info!("Using proxy {} for control plane requests", url);
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        } else {
            builder = builder.no_proxy();
        }
        if let Some(size) = self.connection_pool_size {
            builder = builder.pool_max_idle_per_host(size);
        }

        Ok(builder.build()?)
    }
}

/// Join `path` below `base`, keeping any path prefix of `base`
fn join_below(base: &Url, path: &str) -> Result<Url, ControlPlaneError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    base.join(path.trim_start_matches('/'))
        .map_err(|e| ControlPlaneError::InvalidRequest(format!("invalid path '{}': {}", path, e)))
}

/// HTTP transport for the v2 control plane API
#[derive(Debug)]
pub struct HttpControlPlane {
    settings: ConnectionSettings,

    /// Reqwest HTTP client, replaced by [`ControlPlane::reset`]
    client: RwLock<reqwest::Client>,

    /// API root, e.g. `https://api.example.com`
    base_url: Url,

    /// Access token obtained through the password grant
    access_token: tokio::sync::Mutex<Option<String>>,
}

impl HttpControlPlane {
    /// Create a transport for `settings.api_host` (hostname only, no scheme)
    pub fn new(settings: ConnectionSettings) -> Result<Self, ControlPlaneError> {
        let base_url = Url::parse(&format!("https://{}", settings.api_host)).map_err(|e| {
            ControlPlaneError::InvalidRequest(format!(
                "invalid api host '{}': {}",
                settings.api_host, e
            ))
        })?;
        let client = settings.build_client()?;

        Ok(Self {
            settings,
            client: RwLock::new(client),
            base_url,
            access_token: tokio::sync::Mutex::new(None),
        })
    }

    /// Point the transport at a different API root (plain HTTP allowed)
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn client(&self) -> reqwest::Client {
        match self.client.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ControlPlaneError> {
        let mut url = join_below(&self.base_url, path)?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ControlPlaneError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ControlPlaneError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Bearer token for the next request, running the password grant once
    async fn bearer_token(&self) -> Result<Option<String>, ControlPlaneError> {
        let (username, password) = match &self.settings.credentials {
            Credentials::Anonymous => return Ok(None),
            Credentials::Token(token) => return Ok(Some(token.clone())),
            Credentials::Password { username, password } => (username, password),
        };

        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(Some(token.clone()));
        }

        let info: InfoResponse = self.send_get(self.url("v2/info", &[])?, None).await?;
        let endpoint = info.token_endpoint.ok_or_else(|| {
            ControlPlaneError::Configuration("platform info carries no token_endpoint".to_string())
        })?;
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            ControlPlaneError::Configuration(format!("invalid token endpoint '{}': {}", endpoint, e))
        })?;

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "password")
            .append_pair("username", username)
            .append_pair("password", password)
            .finish();

        tracing::debug!("Requesting access token for '{}'", username);
        let response = self
            .client()
            .post(join_below(&endpoint, "oauth/token")?)
            .basic_auth("cf", Some(""))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(form)
            .send()
            .await?;
        let token: TokenResponse = Self::read_json(response).await?;

        *cached = Some(token.access_token.clone());
        Ok(Some(token.access_token))
    }

    async fn send_get<T: DeserializeOwned>(
        &self,
        url: Url,
        token: Option<&str>,
    ) -> Result<T, ControlPlaneError> {
        tracing::debug!("GET {}", url);

        let mut request = self.client().get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        Self::read_json(request.send().await?).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ControlPlaneError> {
        let token = self.bearer_token().await?;
        let result = self.send_get(url, token.as_deref()).await;

        if let Err(ControlPlaneError::Status { status: 401, .. }) = &result {
            // Expired grant: fetch a fresh token on the next request
            self.access_token.lock().await.take();
        }

        result
    }
}

/// Query parameters shared by every paged v2 listing
fn paging_query(
    query: &mut Vec<(&'static str, String)>,
    order_direction: Option<OrderDirection>,
    results_per_page: Option<u32>,
    page: Option<u32>,
) {
    if let Some(direction) = order_direction {
        query.push(("order-direction", direction.to_string()));
    }
    if let Some(per_page) = results_per_page {
        query.push(("results-per-page", per_page.to_string()));
    }
    if let Some(page) = page {
        query.push(("page", page.to_string()));
    }
}

fn organizations_query(request: &ListOrganizationsRequest) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(name) = &request.name {
        query.push(("q", format!("name:{}", name)));
    }
    paging_query(
        &mut query,
        request.order_direction,
        request.results_per_page,
        request.page,
    );
    query
}

fn spaces_query(request: &ListSpacesRequest) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(org) = &request.organization_id {
        query.push(("q", format!("organization_guid:{}", org)));
    }
    if let Some(name) = &request.name {
        query.push(("q", format!("name:{}", name)));
    }
    paging_query(
        &mut query,
        request.order_direction,
        request.results_per_page,
        request.page,
    );
    query
}

fn applications_query(request: &ListApplicationsRequest) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(org) = &request.organization_id {
        query.push(("q", format!("organization_guid:{}", org)));
    }
    if let Some(space) = &request.space_id {
        query.push(("q", format!("space_guid:{}", space)));
    }
    paging_query(
        &mut query,
        request.order_direction,
        request.results_per_page,
        request.page,
    );
    query
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn list_organizations(
        &self,
        request: ListOrganizationsRequest,
    ) -> Result<ListOrganizationsResponse, ControlPlaneError> {
        let url = self.url("v2/organizations", &organizations_query(&request))?;
        self.get(url).await
    }

    async fn list_spaces(
        &self,
        request: ListSpacesRequest,
    ) -> Result<ListSpacesResponse, ControlPlaneError> {
        let url = self.url("v2/spaces", &spaces_query(&request))?;
        self.get(url).await
    }

    async fn list_applications(
        &self,
        request: ListApplicationsRequest,
    ) -> Result<ListApplicationsResponse, ControlPlaneError> {
        let url = self.url("v2/apps", &applications_query(&request))?;
        self.get(url).await
    }

    async fn get_space_summary(
        &self,
        request: GetSpaceSummaryRequest,
    ) -> Result<GetSpaceSummaryResponse, ControlPlaneError> {
        let url = self.url(&format!("v2/spaces/{}/summary", request.space_id), &[])?;
        self.get(url).await
    }

    async fn api_version(&self) -> Result<Option<String>, ControlPlaneError> {
        let url = self.url("v2/info", &[])?;
        let info: InfoResponse = self.get(url).await?;
        Ok(info.api_version)
    }

    fn reset(&self) {
        match self.settings.build_client() {
            Ok(client) => {
                match self.client.write() {
                    Ok(mut guard) => *guard = client,
                    Err(poisoned) => *poisoned.into_inner() = client,
                }
                if let Ok(mut token) = self.access_token.try_lock() {
                    token.take();
                }
                tracing::info!("Control plane client has been reset");
            }
            Err(e) => tracing::warn!("Failed to rebuild control plane client: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const ORGS_PAGE: &str = r#"{
        "total_results": 1,
        "total_pages": 1,
        "prev_url": null,
        "next_url": null,
        "resources": [
            {"metadata": {"guid": "g-1", "url": "/v2/organizations/g-1"}, "entity": {"name": "acme"}}
        ]
    }"#;

    fn control_plane(credentials: Credentials) -> HttpControlPlane {
        HttpControlPlane::new(ConnectionSettings {
            credentials,
            ..ConnectionSettings::new("api.example.com")
        })
        .unwrap()
    }

    fn against(server: &mockito::ServerGuard, credentials: Credentials) -> HttpControlPlane {
        control_plane(credentials).with_base_url(Url::parse(&server.url()).unwrap())
    }

    #[test]
    fn test_http_control_plane_creation() {
        let cp = control_plane(Credentials::Anonymous);
        assert_eq!(cp.base_url().as_str(), "https://api.example.com/");
    }

    #[test]
    fn test_organizations_url() {
        let cp = control_plane(Credentials::Anonymous);
        let request = ListOrganizationsRequest::paged(OrderDirection::Asc, 100, 2);

        let url = cp
            .url("v2/organizations", &organizations_query(&request))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v2/organizations?order-direction=asc&results-per-page=100&page=2"
        );
    }

    #[test]
    fn test_spaces_url_filters() {
        let cp = control_plane(Credentials::Anonymous);
        let request = ListSpacesRequest {
            organization_id: Some("org-1".to_string()),
            name: Some("dev".to_string()),
            ..Default::default()
        };

        let url = cp.url("v2/spaces", &spaces_query(&request)).unwrap();
        assert_eq!(
            url.query(),
            Some("q=organization_guid%3Aorg-1&q=name%3Adev")
        );
    }

    #[test]
    fn test_applications_query() {
        let request = ListApplicationsRequest {
            organization_id: Some("o".to_string()),
            space_id: Some("s".to_string()),
            order_direction: Some(OrderDirection::Asc),
            results_per_page: Some(100),
            page: Some(1),
        };

        let query = applications_query(&request);
        assert_eq!(query.len(), 5);
        assert_eq!(query[1], ("q", "space_guid:s".to_string()));
    }

    #[test]
    fn test_space_summary_url() {
        let cp = control_plane(Credentials::Anonymous);
        let url = cp.url("v2/spaces/s-1/summary", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/spaces/s-1/summary");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_base_url_path_prefix_is_kept() {
        let cp = control_plane(Credentials::Anonymous)
            .with_base_url(Url::parse("https://gateway.example.com/cf").unwrap());

        let url = cp.url("v2/info", &[]).unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.com/cf/v2/info");

        let url = cp.url("/v2/apps", &[]).unwrap();
        assert_eq!(url.as_str(), "https://gateway.example.com/cf/v2/apps");
    }

    #[test]
    fn test_invalid_api_host() {
        assert!(HttpControlPlane::new(ConnectionSettings::new("bad host with spaces")).is_err());
    }

    #[test]
    fn test_proxy_with_ip_address() {
        let proxy = ProxySettings {
            host: "10.0.0.1".to_string(),
            port: 3128,
        };
        assert_eq!(proxy.resolve().unwrap().as_str(), "http://10.0.0.1:3128/");

        let proxy = ProxySettings {
            host: "::1".to_string(),
            port: 8080,
        };
        assert_eq!(proxy.resolve().unwrap().as_str(), "http://[::1]:8080/");
    }

    #[test]
    fn test_proxy_hostname_is_resolved() {
        let proxy = ProxySettings {
            host: "localhost".to_string(),
            port: 3128,
        };
        let url = proxy.resolve().unwrap();
        let host = url.host_str().unwrap().trim_matches(|c| c == '[' || c == ']');
        assert!(host.parse::<IpAddr>().is_ok(), "unresolved host {}", host);
    }

    #[test]
    fn test_unresolvable_proxy_is_rejected() {
        let settings = ConnectionSettings {
            proxy: Some(ProxySettings {
                host: "no-such-proxy.invalid".to_string(),
                port: 3128,
            }),
            ..ConnectionSettings::new("api.example.com")
        };

        match HttpControlPlane::new(settings) {
            Err(ControlPlaneError::Configuration(msg)) => {
                assert!(msg.contains("cannot be resolved"))
            }
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_proxy_and_pool_size_build() {
        let settings = ConnectionSettings {
            proxy: Some(ProxySettings {
                host: "127.0.0.1".to_string(),
                port: 3128,
            }),
            connection_pool_size: Some(4),
            ..ConnectionSettings::new("api.example.com")
        };

        let cp = HttpControlPlane::new(settings).unwrap();
        assert_eq!(cp.settings().connection_pool_size, Some(4));
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let token = format!("{:?}", Credentials::Token("s3cr3t".to_string()));
        let password = format!(
            "{:?}",
            Credentials::Password {
                username: "admin".to_string(),
                password: "s3cr3t".to_string(),
            }
        );

        assert!(!token.contains("s3cr3t"));
        assert!(!password.contains("s3cr3t"));
        assert!(password.contains("admin"));
    }

    #[test]
    fn test_transport_trait_bounds() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpControlPlane>();
    }

    #[tokio::test]
    async fn test_listing_sends_bearer_token_and_decodes_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/organizations")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "name:acme".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .match_header("authorization", "Bearer s3cr3t")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ORGS_PAGE)
            .create_async()
            .await;

        let cp = against(&server, Credentials::Token("s3cr3t".to_string()));
        let request = ListOrganizationsRequest {
            page: Some(1),
            ..ListOrganizationsRequest::by_name("acme")
        };

        let page = cp.list_organizations(request).await.unwrap();
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.resources[0].guid(), "g-1");
        assert_eq!(page.resources[0].entity.name, "acme");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_anonymous_requests_carry_no_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/info")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"api_version": "2.150.0"}"#)
            .create_async()
            .await;

        let cp = against(&server, Credentials::Anonymous);

        assert_eq!(cp.api_version().await.unwrap().as_deref(), Some("2.150.0"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_becomes_status_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/spaces/s-1/summary")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let cp = against(&server, Credentials::Anonymous);
        let result = cp
            .get_space_summary(GetSpaceSummaryRequest {
                space_id: "s-1".to_string(),
            })
            .await;

        match result {
            Err(ControlPlaneError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected status error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_becomes_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/apps")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{\"resources\": 42}")
            .create_async()
            .await;

        let cp = against(&server, Credentials::Anonymous);
        let result = cp.list_applications(ListApplicationsRequest::default()).await;

        assert!(matches!(result, Err(ControlPlaneError::Decode(_))));
    }

    #[tokio::test]
    async fn test_base_url_prefix_reaches_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/cf/v2/info")
            .with_status(200)
            .with_body(r#"{"api_version": "2.151.0"}"#)
            .create_async()
            .await;

        let cp = control_plane(Credentials::Anonymous)
            .with_base_url(Url::parse(&format!("{}/cf", server.url())).unwrap());

        assert_eq!(cp.api_version().await.unwrap().as_deref(), Some("2.151.0"));
        mock.assert_async().await;
    }

    async fn password_grant_server(
        token_requests: usize,
    ) -> (mockito::ServerGuard, mockito::Mock, mockito::Mock) {
        let mut server = mockito::Server::new_async().await;
        let info_body = format!(
            r#"{{"api_version": "2.150.0", "token_endpoint": "{}"}}"#,
            server.url()
        );
        server
            .mock("GET", "/v2/info")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(info_body)
            .create_async()
            .await;
        let token = server
            .mock("POST", "/oauth/token")
            .match_header("authorization", "Basic Y2Y6")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "password".into()),
                Matcher::UrlEncoded("username".into(), "admin".into()),
                Matcher::UrlEncoded("password".into(), "s3cr3t".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token": "granted", "token_type": "bearer"}"#)
            .expect(token_requests)
            .create_async()
            .await;
        let orgs = server
            .mock("GET", "/v2/organizations")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer granted")
            .with_status(200)
            .with_body(ORGS_PAGE)
            .create_async()
            .await;

        (server, token, orgs)
    }

    fn password() -> Credentials {
        Credentials::Password {
            username: "admin".to_string(),
            password: "s3cr3t".to_string(),
        }
    }

    #[tokio::test]
    async fn test_password_grant_token_is_reused() {
        let (server, token, orgs) = password_grant_server(1).await;
        let cp = against(&server, password());

        for _ in 0..3 {
            cp.list_organizations(ListOrganizationsRequest::default())
                .await
                .unwrap();
        }

        token.assert_async().await;
        orgs.assert_async().await;
    }

    #[tokio::test]
    async fn test_reset_fetches_a_new_token() {
        let (server, token, _orgs) = password_grant_server(2).await;
        let cp = against(&server, password());

        cp.list_organizations(ListOrganizationsRequest::default())
            .await
            .unwrap();
        cp.reset();
        cp.list_organizations(ListOrganizationsRequest::default())
            .await
            .unwrap();

        token.assert_async().await;
    }
}
