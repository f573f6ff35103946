//! Gym studio crawler CLI
//!
//! Crawls the configured gym sites, merges what it finds per gym and writes
//! the result to Postgres (or prints it with `--dry-run`).

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gym_crawler::ai::{OpenAIModel, RateLimitedAI};
use gym_crawler::browser::ChromiumBrowser;
use gym_crawler::stores::{MemorySink, PostgresSink};
use gym_crawler::{
    prune, GymPipeline, GymRunReport, GymSink, GymTarget, MergeStrategy, SitemapResolver, AI,
};
use openai_client::OpenAIClient;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "gym-crawl")]
#[command(about = "Crawl gym studio sites into a merged, searchable dataset")]
struct Cli {
    /// Emit JSON log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl, merge and store the configured gyms
    Run {
        /// Only these gyms (by name); default is all
        #[arg(long = "gym")]
        gyms: Vec<String>,

        /// Print merged datasets instead of writing to the database
        #[arg(long)]
        dry_run: bool,

        /// Override MERGE_STRATEGY
        #[arg(long)]
        merge_strategy: Option<MergeStrategy>,
    },

    /// Print the filtered sitemap entries of a site
    Sitemap { url: String },

    /// Print the pruned form of a saved HTML file
    Prune {
        file: PathBuf,

        /// Relevance keyword used to locate the content region
        #[arg(long = "keyword")]
        keywords: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json);

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            gyms,
            dry_run,
            merge_strategy,
        } => run(config, &gyms, dry_run, merge_strategy).await,
        Commands::Sitemap { url } => {
            let resolver = SitemapResolver::new(config.pipeline_config().resolver)?;
            let entries = resolver.resolve(&url).await;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
        Commands::Prune { file, keywords } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let keywords: Vec<&str> = keywords.iter().map(String::as_str).collect();
            let pruned = prune(&html, &keywords);
            println!("{}", pruned.html);
            if !pruned.tables.is_empty() {
                println!("\nTABLES:\n{}", pruned.tables_text());
            }
            Ok(())
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,gym_crawler=debug,sqlx=warn,chromiumoxide=warn".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run(
    config: AppConfig,
    selected: &[String],
    dry_run: bool,
    merge_strategy: Option<MergeStrategy>,
) -> Result<()> {
    let gyms = select_gyms(&config.gyms, selected)?;

    let mut pipeline_config = config.pipeline_config();
    if let Some(strategy) = merge_strategy {
        pipeline_config = pipeline_config.with_merge_strategy(strategy);
    }

    let api_key = config
        .openai_api_key
        .clone()
        .context("OPENAI_API_KEY must be set")?;
    let mut client = OpenAIClient::new(api_key);
    if let Some(base_url) = &config.openai_base_url {
        client = client.with_base_url(base_url.clone());
    }
    let ai = RateLimitedAI::per_minute(
        OpenAIModel::new(client).with_models(config.models.clone()),
        config.llm_requests_per_minute,
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current URL");
            ctrl_c.cancel();
        }
    });

    tracing::info!("Launching headless browser");
    let browser = ChromiumBrowser::launch(config.chrome_path.clone())
        .await
        .context("Failed to launch browser")?;

    let outcome = if dry_run {
        let pipeline = GymPipeline::new(ai, MemorySink::new(), pipeline_config)?;
        let reports = pipeline.run(&browser, &gyms, &cancel).await;
        if reports.is_ok() {
            println!("{}", serde_json::to_string_pretty(&pipeline.sink().datasets())?);
        }
        reports
    } else {
        let database_url = config
            .database_url
            .clone()
            .context("DATABASE_URL must be set (or use --dry-run)")?;
        tracing::info!("Connecting to database...");
        let sink = PostgresSink::new(&database_url)
            .await
            .context("Failed to connect to database")?;
        run_with(ai, sink, pipeline_config, &browser, &gyms, &cancel).await
    };

    if let Err(e) = browser.shutdown().await {
        tracing::warn!(error = %e, "Browser did not shut down cleanly");
    }

    let reports = outcome.context("Run aborted")?;
    print_summary(&reports);
    Ok(())
}

async fn run_with<A: AI, S: GymSink>(
    ai: A,
    sink: S,
    config: gym_crawler::PipelineConfig,
    browser: &ChromiumBrowser,
    gyms: &[GymTarget],
    cancel: &CancellationToken,
) -> gym_crawler::Result<Vec<GymRunReport>> {
    GymPipeline::new(ai, sink, config)?
        .run(browser, gyms, cancel)
        .await
}

fn select_gyms(all: &[GymTarget], selected: &[String]) -> Result<Vec<GymTarget>> {
    if all.is_empty() {
        bail!("No gyms configured (set GYMS_FILE or GYM_TARGETS)");
    }
    if selected.is_empty() {
        return Ok(all.to_vec());
    }

    selected
        .iter()
        .map(|name| {
            all.iter()
                .find(|g| g.name.eq_ignore_ascii_case(name))
                .cloned()
                .with_context(|| format!("Unknown gym '{name}'"))
        })
        .collect()
}

fn print_summary(reports: &[GymRunReport]) {
    for report in reports {
        match serde_json::to_string(report) {
            Ok(line) => eprintln!("{line}"),
            Err(e) => tracing::warn!(gym = %report.gym, error = %e, "Failed to serialize report"),
        }
    }
}
