//! CLI entry point for the transit usage dashboard.
//!
//! Normalizes a PRESTO usage export, computes the chart aggregates, and
//! geocodes the stops it mentions.

mod infra;

use crate::infra::keys::{EnvKeyStore, SsmKeyStore, load_api_key};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_usage::{
    cache::{MemoryCache, ResponseCache, SqliteCache},
    config::DashboardConfig,
    fetch::{BasicClient, CachingClient, HttpClient, auth::{ApiKey, UrlParam}},
    geocode::{LocationResolver, ProviderAuth},
    normalizer::{Normalizer, distinct_stop_names},
    output::{print_json, write_json, write_json_to_s3, write_locations},
    records::{CanonicalRecord, ResolvedStop},
    summary::{DEFAULT_TOP_STOPS, DashboardSummary},
};

#[derive(Parser)]
#[command(name = "transit_usage")]
#[command(about = "Summarize and map a transit usage export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GeocodeArgs {
    /// JSON config file (columns, aliases, provider, policy, cache)
    #[arg(short, long)]
    config: Option<String>,

    /// Read the geocoder key from this SSM parameter instead of the environment
    #[arg(long)]
    key_ref: Option<String>,

    /// Keep provider responses in memory only for this run
    #[arg(long, default_value_t = false)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute stop, spending and tap aggregates
    Summarize {
        /// Usage export CSV
        #[arg(value_name = "CSV")]
        source: String,

        /// JSON file to write the summary to
        #[arg(short, long, default_value = "summary.json")]
        output: String,

        /// Number of stops in the frequent-stops ranking
        #[arg(long, default_value_t = DEFAULT_TOP_STOPS)]
        top: usize,

        /// JSON config file
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Geocode every distinct stop in the export
    Resolve {
        /// Usage export CSV
        #[arg(value_name = "CSV")]
        source: String,

        /// CSV file to write stop coordinates to
        #[arg(short, long, default_value = "stops.csv")]
        output: String,

        #[command(flatten)]
        geocode: GeocodeArgs,
    },
    /// Summaries plus stop coordinates in one JSON document
    Dashboard {
        /// Usage export CSV
        #[arg(value_name = "CSV")]
        source: String,

        /// JSON file to write the dashboard data to
        #[arg(short, long, default_value = "dashboard.json")]
        output: String,

        /// Also write stop coordinates as CSV
        #[arg(long)]
        locations: Option<String>,

        /// Number of stops in the frequent-stops ranking
        #[arg(long, default_value_t = DEFAULT_TOP_STOPS)]
        top: usize,

        #[command(flatten)]
        geocode: GeocodeArgs,

        /// Optional: S3 bucket to upload the dashboard JSON to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Object key for the S3 upload
        #[arg(long, default_value = "dashboard/latest.json")]
        s3_key: String,
    },
    /// Delete cached provider responses older than the TTL
    EvictCache {
        /// JSON config file
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_usage.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_usage.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Summarize {
            source,
            output,
            top,
            config,
        } => summarize(&source, &output, top, config.as_deref()),
        Commands::Resolve {
            source,
            output,
            geocode,
        } => resolve(&source, &output, &geocode).await,
        Commands::Dashboard {
            source,
            output,
            locations,
            top,
            geocode,
            s3_bucket,
            s3_key,
        } => {
            dashboard(
                &source,
                &output,
                locations.as_deref(),
                top,
                &geocode,
                s3_bucket.as_deref(),
                &s3_key,
            )
            .await
        }
        Commands::EvictCache { config } => evict_cache(config.as_deref()),
    };

    // Returning the error prints it once, with its context chain.
    result
}

/// Reads and normalizes the export. Any malformed row aborts the run.
fn load_records(
    normalizer: &Normalizer,
    source: &str,
) -> Result<std::sync::Arc<Vec<CanonicalRecord>>> {
    let bytes = std::fs::read(source).with_context(|| format!("cannot read '{source}'"))?;
    let records = normalizer
        .normalize_bytes(&bytes)
        .with_context(|| format!("cannot normalize '{source}'"))?;
    info!(
        records = records.len(),
        aliases = normalizer.aliases().len(),
        "Export normalized"
    );
    Ok(records)
}

#[tracing::instrument(skip(config_path))]
fn summarize(source: &str, output: &str, top: usize, config_path: Option<&str>) -> Result<()> {
    let config = DashboardConfig::load_or_default(config_path)?;
    let normalizer = Normalizer::new(config.columns, config.aliases);
    let records = load_records(&normalizer, source)?;

    let summary = DashboardSummary::build(&records, top);
    print_json(&summary.top_stops)?;
    write_json(output, &summary)?;
    info!(output, "Summary written");
    Ok(())
}

/// Config, credential and client stack for a geocoding run. Built before the
/// export is read so configuration problems surface first.
struct GeocodeSetup {
    config: DashboardConfig,
    resolver: LocationResolver<Box<dyn HttpClient>, Box<dyn ResponseCache>>,
}

impl GeocodeSetup {
    async fn build(args: &GeocodeArgs) -> Result<Self> {
        let config = DashboardConfig::load_or_default(args.config.as_deref())?;
        let ttl = config.cache.ttl().context("cache.ttl_days out of range")?;

        let base = BasicClient::new()?;
        let client: Box<dyn HttpClient> = if config.provider.auth.requires_credential() {
            let key = match &args.key_ref {
                Some(reference) => {
                    let aws = aws_config::load_from_env().await;
                    load_api_key(&SsmKeyStore::new(&aws), reference).await?
                }
                None => load_api_key(&EnvKeyStore, &config.provider.api_key_env).await?,
            };

            match &config.provider.auth {
                ProviderAuth::UrlParam { param_name } => Box::new(UrlParam {
                    inner: base,
                    param_name: param_name.clone(),
                    key,
                }),
                ProviderAuth::Header { header_name } => {
                    Box::new(ApiKey::new(base, header_name, &key)?)
                }
                ProviderAuth::Bearer => Box::new(ApiKey::bearer(base, &key)?),
                ProviderAuth::None => Box::new(base),
            }
        } else {
            Box::new(base)
        };

        let cache: Box<dyn ResponseCache> = if args.no_cache {
            Box::new(MemoryCache::new())
        } else {
            let cache = SqliteCache::open(&config.cache.path)?;
            let cutoff = config
                .cache
                .expiry_cutoff(Utc::now())
                .context("cache.ttl_days out of range")?;
            let evicted = cache.evict_older_than(cutoff)?;
            info!(path = %config.cache.path, evicted, "Response cache ready");
            Box::new(cache)
        };

        let resolver = LocationResolver::new(
            CachingClient::new(client, cache, ttl),
            config.provider.clone(),
            config.policy.clone(),
        );

        Ok(Self { config, resolver })
    }

    fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.config.columns.clone(), self.config.aliases.clone())
    }

    async fn resolve(&self, records: &[CanonicalRecord]) -> Vec<ResolvedStop> {
        let names = distinct_stop_names(records);
        info!(distinct = names.len(), "Resolving stop names");
        self.resolver.resolve(&names).await
    }
}

#[tracing::instrument(skip(args))]
async fn resolve(source: &str, output: &str, args: &GeocodeArgs) -> Result<()> {
    let setup = GeocodeSetup::build(args).await?;
    let records = load_records(&setup.normalizer(), source)?;

    let stops = setup.resolve(&records).await;
    write_locations(output, &stops)?;
    info!(output, stops = stops.len(), "Stop locations written");
    Ok(())
}

#[tracing::instrument(skip(args))]
async fn dashboard(
    source: &str,
    output: &str,
    locations: Option<&str>,
    top: usize,
    args: &GeocodeArgs,
    s3_bucket: Option<&str>,
    s3_key: &str,
) -> Result<()> {
    let setup = GeocodeSetup::build(args).await?;
    let records = load_records(&setup.normalizer(), source)?;

    let stops = setup.resolve(&records).await;
    if let Some(path) = locations {
        write_locations(path, &stops)?;
    }

    let summary = DashboardSummary::build(&records, top).with_locations(stops);
    write_json(output, &summary)?;

    if let Some(bucket) = s3_bucket {
        let aws = aws_config::load_from_env().await;
        let s3 = aws_sdk_s3::Client::new(&aws);
        write_json_to_s3(&s3, bucket, s3_key, &summary).await?;
    }

    info!(output, "Dashboard written");
    Ok(())
}

#[tracing::instrument(skip(config_path))]
fn evict_cache(config_path: Option<&str>) -> Result<()> {
    let config = DashboardConfig::load_or_default(config_path)?;
    let cutoff = config
        .cache
        .expiry_cutoff(Utc::now())
        .context("cache.ttl_days out of range")?;
    let cache = SqliteCache::open(&config.cache.path)?;
    let evicted = cache.evict_older_than(cutoff)?;
    info!(path = %config.cache.path, evicted, "Expired responses evicted");
    Ok(())
}
