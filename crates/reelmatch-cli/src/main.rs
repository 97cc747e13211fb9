mod input;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use reelmatch_core::AppConfig;
use reelmatch_scraper::{
    ApifyPostSource, FetchOutcome, FixturePostSource, MatchPipeline, PipelineError,
    PipelineOptions, PostSource, Report,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const EXIT_INVALID_INPUT: u8 = 1;
const EXIT_FETCH_FAILED: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "reelmatch-cli")]
#[command(about = "Match Instagram post links against each account's recent posts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch recent posts for every account in the input and match the links.
    Match(MatchArgs),
}

#[derive(Debug, Args)]
struct MatchArgs {
    /// Bulk request JSON, or an array of `{username, post_link}` rows.
    #[arg(long, short)]
    input: PathBuf,
    #[arg(long, short, default_value = "matched_posts.json")]
    output: PathBuf,
    /// Posts fetched per account when the input does not say.
    #[arg(long)]
    max_posts: Option<NonZeroUsize>,
    #[arg(long)]
    workers: Option<NonZeroUsize>,
    #[arg(long)]
    max_retries: Option<u32>,
    /// Read posts from a fixture file instead of calling Apify.
    #[arg(long)]
    fixture: Option<PathBuf>,
}

impl MatchArgs {
    /// Pipeline options from configuration, overridden by any flags given.
    fn pipeline_options(&self, config: &AppConfig) -> PipelineOptions {
        let mut options = PipelineOptions::from_config(config);
        if let Some(max_posts) = self.max_posts {
            options.default_max_posts = max_posts.get();
        }
        if let Some(workers) = self.workers {
            options.worker_budget = workers.get();
        }
        if let Some(max_retries) = self.max_retries {
            options.retry.max_retries = max_retries;
        }
        options
    }

    fn post_source(&self, config: &AppConfig) -> anyhow::Result<Arc<dyn PostSource>> {
        match &self.fixture {
            Some(path) => Ok(Arc::new(FixturePostSource::from_json_path(path)?)),
            None => Ok(Arc::new(ApifyPostSource::from_config(config)?)),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Match(args) => run_match(&args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "match run failed");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FETCH_FAILED)
        }
    }
}

async fn run_match(args: &MatchArgs) -> anyhow::Result<ExitCode> {
    let request = match input::load_request(&args.input) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("invalid input: {e:#}");
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
    };

    let config = reelmatch_core::load_app_config()?;
    let options = args.pipeline_options(&config);
    if let Err(e) = request.validate(options.default_max_posts) {
        eprintln!("invalid input: {e}");
        return Ok(ExitCode::from(EXIT_INVALID_INPUT));
    }

    let pipeline = MatchPipeline::new(args.post_source(&config)?, options);
    tracing::info!(
        accounts = request.accounts.len(),
        post_source = pipeline.source_name(),
        "starting match run"
    );

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling remaining fetches");
                cancel.cancel();
            }
        })
    };

    let outcome = pipeline.run(&request, &cancel).await;
    ctrl_c.abort();

    let report = match outcome {
        Ok(report) => report,
        Err(PipelineError::Validation(e)) => {
            eprintln!("invalid input: {e}");
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
    };

    write_report(&report, &args.output)?;
    print_summary(&report, &args.output);

    if report.summary.accounts_failed > 0 {
        Ok(ExitCode::from(EXIT_FETCH_FAILED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn write_report(report: &Report, path: &std::path::Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))
}

fn print_summary(report: &Report, output: &std::path::Path) {
    for account in &report.accounts {
        let status = match &account.fetch_outcome {
            FetchOutcome::Ok => "ok".to_owned(),
            FetchOutcome::Empty => "no posts".to_owned(),
            FetchOutcome::Failed(reason) => format!("failed ({reason})"),
        };
        println!(
            "{}: {}/{} matched, {} posts scraped, {}",
            account.username,
            account.matched_posts_count,
            account.total_target_links,
            account.total_reels_scraped,
            status
        );
    }

    let summary = &report.summary;
    println!(
        "{} accounts, {} posts matched, {} failed, {} not found; report written to {}",
        summary.accounts_processed,
        summary.total_matched,
        summary.accounts_failed,
        summary.accounts_not_found,
        output.display()
    );
}
