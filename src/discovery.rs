//! Application Instance Discovery
//!
//! Resolves configured scrape targets (organization, optional space, optional
//! application) into the running application instances to scrape.
//!
//! A failed lookup never aborts a scan: it is logged, counted, and replaced by
//! an empty response so that the remaining targets are still resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cfaccessor::{AccessorResult, CfAccessor};
use crate::metrics;

/// Application state of instances worth scraping
const STARTED: &str = "STARTED";

/// A configured scrape target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub org_name: String,

    /// All spaces of the organization when absent
    #[serde(default)]
    pub space_name: Option<String>,

    /// All applications of the space when absent
    #[serde(default)]
    pub application_name: Option<String>,
}

impl Target {
    pub fn org(org_name: impl Into<String>) -> Self {
        Self {
            org_name: org_name.into(),
            space_name: None,
            application_name: None,
        }
    }

    pub fn space(mut self, space_name: impl Into<String>) -> Self {
        self.space_name = Some(space_name.into());
        self
    }

    pub fn application(mut self, application_name: impl Into<String>) -> Self {
        self.application_name = Some(application_name.into());
        self
    }
}

/// A running application found by a scan
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscoveredInstance {
    pub org_name: String,
    pub space_name: String,
    pub application_name: String,
    pub application_id: String,
    pub urls: Vec<String>,
    pub instances: u32,
}

/// Outcome of one scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub instances: Vec<DiscoveredInstance>,
}

/// Replace a failed lookup with an empty response
fn or_empty<T: Default>(result: AccessorResult<T>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("{} failed, continuing with an empty response: {}", what, e);
            metrics::DISCOVERY_FALLBACKS_TOTAL.inc();
            T::default()
        }
    }
}

/// Walks targets through a [`CfAccessor`]
#[derive(Clone)]
pub struct DiscoveryScanner {
    accessor: Arc<dyn CfAccessor>,
}

impl DiscoveryScanner {
    pub fn new(accessor: Arc<dyn CfAccessor>) -> Self {
        Self { accessor }
    }

    /// Resolve every target concurrently
    pub async fn scan(&self, targets: &[Target]) -> ScanReport {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut tasks = JoinSet::new();
        for target in targets.iter().cloned() {
            let accessor = Arc::clone(&self.accessor);
            tasks.spawn(async move { resolve_target(accessor.as_ref(), &target).await });
        }

        let mut instances = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(found) => instances.extend(found),
                Err(e) => warn!("Discovery task failed: {}", e),
            }
        }

        instances.sort();
        instances.dedup();

        metrics::DISCOVERY_SCANS_TOTAL.inc();
        metrics::DISCOVERED_INSTANCES.set(instances.len() as i64);
        info!(
            "Discovered {} application instances for {} targets",
            instances.len(),
            targets.len()
        );

        ScanReport {
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            instances,
        }
    }
}

async fn resolve_target(accessor: &dyn CfAccessor, target: &Target) -> Vec<DiscoveredInstance> {
    let orgs = or_empty(
        accessor.retrieve_org_id(&target.org_name).await,
        &format!("Organization lookup for '{}'", target.org_name),
    );
    let org_id = match orgs.resources.first() {
        Some(org) => org.metadata.guid.clone(),
        None => {
            warn!("Organization '{}' not found", target.org_name);
            return Vec::new();
        }
    };

    let spaces = match &target.space_name {
        Some(space_name) => or_empty(
            accessor.retrieve_space_id(&org_id, space_name).await,
            &format!("Space lookup for '{}/{}'", target.org_name, space_name),
        ),
        None => or_empty(
            accessor.retrieve_space_ids_in_org(&org_id).await,
            &format!("Space listing for '{}'", target.org_name),
        ),
    };

    let mut found = Vec::new();
    for space in &spaces.resources {
        let space_id = space.guid();
        let space_name = &space.entity.name;

        let apps = or_empty(
            accessor
                .retrieve_all_application_ids_in_space(&org_id, space_id)
                .await,
            &format!("Application listing for '{}/{}'", target.org_name, space_name),
        );

        let wanted: Vec<_> = apps
            .resources
            .iter()
            .filter(|app| app.entity.state.as_deref() == Some(STARTED))
            .filter(|app| {
                target
                    .application_name
                    .as_ref()
                    .map_or(true, |name| &app.entity.name == name)
            })
            .collect();

        if wanted.is_empty() {
            debug!("No started applications in '{}/{}'", target.org_name, space_name);
            continue;
        }

        let summary = or_empty(
            accessor.retrieve_space_summary(space_id).await,
            &format!("Space summary for '{}/{}'", target.org_name, space_name),
        );
        let by_guid: HashMap<_, _> = summary
            .apps
            .iter()
            .map(|app| (app.guid.as_str(), app))
            .collect();

        for app in wanted {
            let summary = by_guid.get(app.guid());
            found.push(DiscoveredInstance {
                org_name: target.org_name.clone(),
                space_name: space_name.clone(),
                application_name: app.entity.name.clone(),
                application_id: app.guid().to_string(),
                urls: summary.map(|s| s.urls.clone()).unwrap_or_default(),
                instances: summary.map(|s| s.instances).unwrap_or(0),
            });
        }
    }

    found
}
