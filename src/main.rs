use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

use event_ingest::apis::{create_adapter, IngestContext};
use event_ingest::catalog::SourceCatalog;
use event_ingest::config::{AppConfig, DEFAULT_CONFIG_PATH};
use event_ingest::constants;
use event_ingest::infra::http_client::ReqwestHttp;
use event_ingest::logging;
use event_ingest::pipeline::Pipeline;
use event_ingest::storage::FileCache;
use event_ingest::tags::collect_tag_catalog;
use event_ingest::types::SourceResultBundle;

#[derive(Parser)]
#[command(name = "event_ingest")]
#[command(about = "Community calendar event ingestion and normalization")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and normalize events from every configured source
    Run {
        /// Specific adapters to run (comma-separated). Defaults to all of them
        #[arg(long)]
        adapters: Option<String>,
        /// Path to the TOML config file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Output directory, overrides the config file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the tag catalog as JSON
    Tags {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// List the available adapters
    Adapters,
}

fn write_bundles(output_dir: &Path, adapter: &str, bundles: &[SourceResultBundle]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;
    let path = output_dir.join(format!("{adapter}.json"));
    std::fs::write(&path, serde_json::to_string_pretty(bundles)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

async fn run_adapters(
    adapter_names: &[String],
    config: &AppConfig,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let catalog = SourceCatalog::load(&config.catalog_path)?;
    let http = ReqwestHttp::new(
        &config.user_agent,
        Duration::from_secs(config.request_timeout_seconds),
    )?;
    let today = chrono::Local::now().date_naive();
    let ctx = IngestContext::from_config(config, Arc::new(http), today)?;
    let pipeline = Pipeline::new(Arc::new(FileCache::new(&config.cache_dir)));

    for name in adapter_names {
        let Some(adapter) = create_adapter(name, &ctx) else {
            warn!("Unknown adapter specified");
            println!("⚠️  Unknown adapter: {}", name);
            continue;
        };

        info!(adapter = %name, "Starting adapter");
        let bundles = pipeline
            .run_family(adapter, &catalog)
            .instrument(tracing::info_span!("adapter", adapter = %name))
            .await;
        println!("\n📊 Results for {}:", name);
        for bundle in &bundles {
            println!("   {} ({}): {} events", bundle.name, bundle.city, bundle.events.len());
        }

        match write_bundles(output_dir, name, &bundles) {
            Ok(path) => println!("💾 Saved to {}", path.display()),
            Err(e) => {
                error!("Failed to write output: {:#}", e);
                println!("❌ Failed to write output for {}: {:#}", name, e);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            adapters,
            config,
            output,
        } => {
            let config = AppConfig::load(&config)?;
            let _guard = logging::init_logging(&config.log_dir);

            let adapter_names: Vec<String> = match adapters {
                Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
                None => constants::get_supported_apis()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            let output_dir = output.unwrap_or_else(|| config.output_dir.clone());

            println!("🔄 Running {} adapters...", adapter_names.len());
            run_adapters(&adapter_names, &config, &output_dir).await?;
            println!("✅ Run complete");
        }
        Commands::Tags { config } => {
            let config = AppConfig::load(&config)?;
            let catalog = SourceCatalog::load(&config.catalog_path)?;
            println!("{}", serde_json::to_string_pretty(&collect_tag_catalog(&catalog))?);
        }
        Commands::Adapters => {
            for name in constants::get_supported_apis() {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
