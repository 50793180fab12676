use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::Parser;
use repo_scout::cli::Cli;
use repo_scout::config::load_config;
use repo_scout::llm_adapter::create_backend;
use repo_scout::sinks::{DiscordSink, RejectionLog};
use repo_scout::{load_profile, FetchConfig, GitHubSource, PipelineBuilder, RunReport, SearchQuery, SeenStore};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            info!(
                "Done! Processed {}, matched {} ({} backend failures, {} delivery failures)",
                report.processed(),
                report.accepted,
                report.backend_failures,
                report.delivery_failures
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunReport> {
    let config = load_config(&cli.config, cli.dry_run).context("failed to load configuration")?;
    let profile = load_profile(&cli.prompt).context("failed to load interest profile")?;

    let now = Utc::now();
    let since = cli.since(now).map_err(|e| anyhow!("invalid --since: {}", e))?;
    let settings = &config.settings;

    let query = SearchQuery {
        since,
        keywords: config.github.keywords.clone(),
        max_results: settings.max_repos,
        min_stars: cli.min_stars.unwrap_or(settings.min_stars),
    };

    let token = Some(config.github.token.as_str()).filter(|t| !t.is_empty());
    let github = Arc::new(
        GitHubSource::new(FetchConfig::default(), token, &config.github.api_url)
            .context("failed to set up GitHub client")?,
    );
    let backend = create_backend(&config.llm).context("failed to set up judgment backend")?;

    let mut builder = PipelineBuilder::new()
        .source(github.clone())
        .excerpt_source(github)
        .backend(backend)
        .rejection_log(RejectionLog::new(&cli.rejected_log))
        .profile(profile)
        .query(query)
        .readme_max_chars(settings.readme_max_chars)
        .max_concurrency(settings.max_concurrency)
        .batch_size(settings.batch_size)
        .evaluation_retries(settings.evaluation_retries)
        .embeds_per_message(settings.embeds_per_message)
        .dry_run(cli.dry_run);

    if !cli.dry_run {
        let sink = DiscordSink::new(&config.discord.webhook_url).context("failed to set up Discord sink")?;
        builder = builder.sink(Arc::new(sink));
    }

    let pipeline = builder.build()?;

    let opened = if cli.dry_run {
        SeenStore::open_read_only(&cli.cache, settings.cache_days).await
    } else {
        SeenStore::open(&cli.cache, settings.cache_days).await
    };
    let mut store = opened.with_context(|| format!("failed to open seen-store {}", cli.cache.display()))?;

    let result = pipeline.run(&mut store, now).await;
    store.close().await;
    Ok(result?)
}
