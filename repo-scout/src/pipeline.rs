use crate::enricher::{Enricher, DEFAULT_MAX_CONCURRENCY};
use crate::evaluator::{BatchEvaluator, DEFAULT_EVALUATION_RETRIES};
use crate::filter::{retain_keyword_matches, select_candidates};
use crate::llm_adapter::JudgmentBackend;
use crate::routing::RoutingPolicy;
use crate::seen_store::SeenStore;
use crate::sinks::RejectionLog;
use crate::traits::{CandidateSource, ExcerptSource, NotificationSink};
use crate::types::{InterestProfile, Result, RunReport, ScoutError, SearchQuery};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// Stages of a single run, in order. `Failed` is terminal like `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Fetch,
    Dedup,
    Enrich,
    Evaluate,
    Route,
    Persist,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::Fetch => "fetch",
            RunState::Dedup => "dedup",
            RunState::Enrich => "enrich",
            RunState::Evaluate => "evaluate",
            RunState::Route => "route",
            RunState::Persist => "persist",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Discovery pipeline: fetch, dedup, enrich, evaluate, route, persist.
///
/// The seen-store is passed in per run rather than owned, so callers control
/// its lifetime and tests can inspect it between runs.
pub struct DiscoveryPipeline {
    source: Arc<dyn CandidateSource>,
    enricher: Enricher,
    evaluator: BatchEvaluator,
    router: RoutingPolicy,
    profile: InterestProfile,
    query: SearchQuery,
    dry_run: bool,
}

impl DiscoveryPipeline {
    /// Execute one run at time `now`.
    ///
    /// Errors are fatal: the search index could not be queried or the
    /// seen-store could not be written. Nothing is persisted on error, and
    /// nothing is persisted in dry-run mode either.
    pub async fn run(&self, store: &mut SeenStore, now: DateTime<Utc>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);

        let result = self.run_stages(store, now, run_id).instrument(span.clone()).await;
        if let Err(e) = &result {
            span.in_scope(|| error!("Run {} entered {}: {}", run_id, RunState::Failed, e));
        }
        result
    }

    async fn run_stages(&self, store: &mut SeenStore, now: DateTime<Utc>, run_id: Uuid) -> Result<RunReport> {
        let mut report = RunReport {
            run_id: run_id.to_string(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        let mut state = RunState::Init;
        let pruned = store.prune(now);
        debug!("State {}: pruned {} expired records", state, pruned);

        advance(&mut state, RunState::Fetch);
        info!(
            "Fetching repos created since {} from {}",
            self.query.since.format("%Y-%m-%d %H:%M:%S"),
            self.source.source_name()
        );
        let hits = self.source.search(&self.query).await?;
        let keywords_applied = hits.keywords_applied;
        let candidates = select_candidates(hits.items, &self.query);
        report.fetched = candidates.len();
        if self.query.keywords.is_empty() || !keywords_applied {
            info!("Found {} repositories (forks excluded)", report.fetched);
        } else {
            info!(
                "Found {} repositories matching keywords: {}",
                report.fetched,
                self.query.keywords.join(", ")
            );
        }

        advance(&mut state, RunState::Dedup);
        let (fresh, seen): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|c| !store.is_seen_at(&c.full_name, now));
        report.already_seen = seen.len();
        info!("{} new, {} already seen", fresh.len(), report.already_seen);

        if fresh.is_empty() {
            advance(&mut state, RunState::Done);
            info!("Nothing new to evaluate");
            return Ok(report);
        }

        advance(&mut state, RunState::Enrich);
        let enriched = self.enricher.enrich(fresh).await;
        report.enriched = enriched.len();
        report.missing_excerpt = enriched.iter().filter(|e| e.excerpt.is_none()).count();

        let enriched = if keywords_applied {
            enriched
        } else {
            let kept = retain_keyword_matches(enriched, &self.query.keywords);
            report.keyword_mismatches = report.enriched - kept.len();
            kept
        };
        if enriched.is_empty() {
            advance(&mut state, RunState::Done);
            info!("No repositories matched keywords: {}", self.query.keywords.join(", "));
            return Ok(report);
        }

        advance(&mut state, RunState::Evaluate);
        let evaluations = self.evaluator.evaluate(enriched, &self.profile).await;
        report.evaluated = evaluations.iter().filter(|e| e.outcome.is_ok()).count();
        report.backend_failures = evaluations.len() - report.evaluated;

        advance(&mut state, RunState::Route);
        let routed = self.router.route(evaluations, store, report.processed(), now).await;
        report.accepted = routed.accepted;
        report.rejected = routed.rejected;
        report.delivery_failures = routed.delivery_failures;
        report.rejection_log_failures = routed.rejection_log_failures;
        info!("Matched {} repos out of {}", report.accepted, report.processed());

        advance(&mut state, RunState::Persist);
        if self.dry_run {
            info!("Dry run - seen-store left unchanged ({} would be recorded)", store.pending().len());
        } else {
            report.newly_seen = store.commit().await?;
        }

        advance(&mut state, RunState::Done);
        Ok(report)
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug!("State {} -> {}", state, next);
    *state = next;
}

/// Builder for [`DiscoveryPipeline`], mirroring how runs are wired in `main`.
pub struct PipelineBuilder {
    source: Option<Arc<dyn CandidateSource>>,
    excerpts: Option<Arc<dyn ExcerptSource>>,
    backend: Option<Arc<dyn JudgmentBackend>>,
    sink: Option<Arc<dyn NotificationSink>>,
    rejection_log: Option<RejectionLog>,
    profile: Option<InterestProfile>,
    query: Option<SearchQuery>,
    readme_max_chars: usize,
    max_concurrency: usize,
    batch_size: usize,
    evaluation_retries: u32,
    retry_delay: Option<Duration>,
    embeds_per_message: usize,
    dry_run: bool,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            excerpts: None,
            backend: None,
            sink: None,
            rejection_log: None,
            profile: None,
            query: None,
            readme_max_chars: 500,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            batch_size: 10,
            evaluation_retries: DEFAULT_EVALUATION_RETRIES,
            retry_delay: None,
            embeds_per_message: 10,
            dry_run: false,
        }
    }

    pub fn source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        info!("Using candidate source: {}", source.source_name());
        self.source = Some(source);
        self
    }

    pub fn excerpt_source(mut self, excerpts: Arc<dyn ExcerptSource>) -> Self {
        self.excerpts = Some(excerpts);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn JudgmentBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn rejection_log(mut self, log: RejectionLog) -> Self {
        self.rejection_log = Some(log);
        self
    }

    pub fn profile(mut self, profile: InterestProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn query(mut self, query: SearchQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn readme_max_chars(mut self, max_chars: usize) -> Self {
        self.readme_max_chars = max_chars;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn evaluation_retries(mut self, retries: u32) -> Self {
        self.evaluation_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn embeds_per_message(mut self, embeds: usize) -> Self {
        self.embeds_per_message = embeds;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Result<DiscoveryPipeline> {
        let missing = |what: &str| ScoutError::Config(format!("pipeline is missing a {}", what));

        let source = self.source.ok_or_else(|| missing("candidate source"))?;
        let excerpts = self.excerpts.ok_or_else(|| missing("excerpt source"))?;
        let backend = self.backend.ok_or_else(|| missing("judgment backend"))?;
        let profile = self.profile.ok_or_else(|| missing("interest profile"))?;
        let query = self.query.ok_or_else(|| missing("search query"))?;

        if self.sink.is_none() && !self.dry_run {
            return Err(missing("notification sink"));
        }

        let mut evaluator = BatchEvaluator::new(backend, self.batch_size, self.evaluation_retries);
        if let Some(delay) = self.retry_delay {
            evaluator = evaluator.with_retry_delay(delay);
        }

        Ok(DiscoveryPipeline {
            source,
            enricher: Enricher::new(excerpts, self.readme_max_chars, self.max_concurrency),
            evaluator,
            router: RoutingPolicy::new(self.sink, self.rejection_log, self.embeds_per_message, self.dry_run),
            profile,
            query,
            dry_run: self.dry_run,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
