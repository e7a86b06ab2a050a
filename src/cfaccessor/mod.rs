//! Control Plane Access
//!
//! Discovery of organizations, spaces and applications through the paginated
//! v2 control plane API.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  Accessor (call sites)                     │
//! │   org / all orgs / space / spaces in org / apps / summary  │
//! ├───────────────────────────────────────────────────────────┤
//! │                Paginated Request Fetcher                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  Rate Gate   │  │   Timeout    │  │ Metrics Recorder│  │
//! │  └──────────────┘  └──────────────┘  └─────────────────┘  │
//! ├───────────────────────────────────────────────────────────┤
//! │        Control Plane transport (HTTP or simulated)         │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The fetcher is generic over request, page and response types; it never
//! caches, retries or swallows errors.

pub mod accessor;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod rate_gate;
pub mod recorder;
pub mod request_type;
pub mod simulator;

pub use accessor::{CfAccessor, ReactiveCfAccessor, RequestTimeouts};
pub use client::{ConnectionSettings, ControlPlane, Credentials, HttpControlPlane, ProxySettings};
pub use error::{AccessorResult, ControlPlaneError, FetchError};
pub use fetcher::{PaginatedRequestFetcher, ORDER_DIRECTION, RESULTS_PER_PAGE};
pub use model::{OrderDirection, Page, PagedResponse};
pub use rate_gate::{Admission, RateGate};
pub use recorder::{MetricsRecorder, NoopRecorder, PrometheusRecorder, RequestOutcome};
pub use request_type::RequestType;
pub use simulator::{SimulatedControlPlane, SimulationConfig};
