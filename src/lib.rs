//! Scrapegate Library
//!
//! This library provides the discovery layer of the Scrapegate telemetry
//! proxy: rate-limited, paginated retrieval of organizations, spaces and
//! applications from the platform control plane, plus the configuration
//! and metrics plumbing around it.

pub mod cfaccessor;
pub mod config;
pub mod discovery;
pub mod metrics;
pub mod metrics_server;
