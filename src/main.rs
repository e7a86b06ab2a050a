// Scrapegate - Main Entry Point
//
// This is the Rust proxy front end that manages:
// - CLI interface
// - Configuration loading
// - Control plane discovery (live or simulated)
// - Internal metrics endpoint

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scrapegate::cfaccessor::{
    CfAccessor, ControlPlane, HttpControlPlane, PaginatedRequestFetcher, PrometheusRecorder,
    ReactiveCfAccessor, SimulatedControlPlane, SimulationConfig,
};
use scrapegate::config::Config;
use scrapegate::discovery::{DiscoveryScanner, ScanReport, Target};
use scrapegate::{metrics, metrics_server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Scrapegate: telemetry aggregation proxy
#[derive(Parser, Debug)]
#[command(name = "scrapegate")]
#[command(author = "Scrapegate Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Rate-limited control plane discovery for metrics scraping", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover running application instances on the configured platform
    Discover,
    /// Run discovery against an in-memory control plane
    Simulate {
        /// Number of organizations
        #[arg(long, default_value_t = 2)]
        orgs: usize,

        /// Spaces per organization
        #[arg(long, default_value_t = 3)]
        spaces: usize,

        /// Applications per space
        #[arg(long, default_value_t = 5)]
        apps: usize,

        /// Requests per second (0 = unlimited)
        #[arg(long, default_value_t = 0.0)]
        rate_limit: f64,
    },
    /// Print the API version reported by the configured platform
    VersionCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    init_tracing(&config, args.verbose)?;

    info!("Scrapegate v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = metrics::init() {
        warn!("Failed to register metrics: {}", e);
    }

    // Match commands
    match args.command {
        Some(Commands::Discover) => {
            discover(&config).await?;
        }
        Some(Commands::Simulate {
            orgs,
            spaces,
            apps,
            rate_limit,
        }) => {
            let simulation = SimulationConfig {
                orgs,
                spaces_per_org: spaces,
                apps_per_space: apps,
                ..SimulationConfig::default()
            };
            simulate(&config, simulation, rate_limit).await?;
        }
        Some(Commands::VersionCheck) => {
            version_check(&config).await?;
        }
        None => {
            info!("No command specified. Use \"scrapegate --help\" for usage.");
        }
    }

    Ok(())
}

/// Initialize tracing from the logging configuration
///
/// Logs go to stderr so stdout only carries command output.
fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }

    Ok(())
}

fn build_fetcher(config: &Config, rate_limit: f64) -> PaginatedRequestFetcher {
    PaginatedRequestFetcher::new(
        Arc::new(PrometheusRecorder),
        rate_limit,
        config.cf.request.backoff(),
    )
}

fn build_http_accessor(config: &Config) -> Result<ReactiveCfAccessor<HttpControlPlane>> {
    config.require_api_host()?;
    let client = HttpControlPlane::new(config.cf.connection_settings())
        .context("Failed to create control plane client")?;

    Ok(ReactiveCfAccessor::new(
        Arc::new(client),
        build_fetcher(config, config.cf.request.rate_limit),
        config.cf.request.timeout.request_timeouts(),
    ))
}

/// One target per organization when nothing is configured
async fn all_org_targets(accessor: &dyn CfAccessor) -> Result<Vec<Target>> {
    let orgs = accessor
        .retrieve_all_org_ids()
        .await
        .context("Failed to list organizations")?;

    Ok(orgs
        .resources
        .iter()
        .map(|org| Target::org(org.entity.name.clone()))
        .collect())
}

async fn run_scan<C: ControlPlane>(
    accessor: ReactiveCfAccessor<C>,
    configured: &[Target],
) -> Result<ScanReport> {
    let accessor: Arc<dyn CfAccessor> = Arc::new(accessor);

    let targets = if configured.is_empty() {
        info!("No targets configured, scanning every organization");
        all_org_targets(accessor.as_ref()).await?
    } else {
        configured.to_vec()
    };

    let scanner = DiscoveryScanner::new(accessor);
    Ok(scanner.scan(&targets).await)
}

fn print_report(report: &ScanReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize scan report")?;
    println!("{}", json);
    Ok(())
}

/// Discover instances on the configured platform
async fn discover(config: &Config) -> Result<()> {
    let accessor = build_http_accessor(config)?;

    if config.precheck_api_version {
        accessor.precheck_api_version().await?;
    }

    let server = if config.metrics.enabled {
        let port = config.metrics.port;
        Some(tokio::spawn(async move {
            if let Err(e) = metrics_server::start_metrics_server(port).await {
                error!("Metrics server stopped: {}", e);
            }
        }))
    } else {
        None
    };

    let report = run_scan(accessor, &config.targets).await?;
    print_report(&report)?;

    if let Some(server) = server {
        info!(
            "Serving metrics on port {} until interrupted",
            config.metrics.port
        );
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        server.abort();
    }

    Ok(())
}

/// Run the full discovery against a simulated control plane
async fn simulate(config: &Config, simulation: SimulationConfig, rate_limit: f64) -> Result<()> {
    info!(
        "Simulating {} orgs x {} spaces x {} apps",
        simulation.orgs, simulation.spaces_per_org, simulation.apps_per_space
    );

    let client = Arc::new(SimulatedControlPlane::new(simulation));
    let accessor = ReactiveCfAccessor::new(
        Arc::clone(&client),
        build_fetcher(config, rate_limit),
        config.cf.request.timeout.request_timeouts(),
    );

    let report = run_scan(accessor, &[]).await?;
    info!(
        "Simulation finished in {}ms with {} control plane requests",
        report.duration_ms,
        client.request_count()
    );
    print_report(&report)
}

/// Print the platform API version
async fn version_check(config: &Config) -> Result<()> {
    let accessor = build_http_accessor(config)?;
    let version = accessor
        .api_version()
        .await
        .context("Failed to query platform info")?;

    match version {
        Some(version) => println!("{}", version),
        None => println!("unknown"),
    }

    Ok(())
}
