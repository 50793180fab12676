pub mod backends;
pub mod cli;
pub mod config;
pub mod enricher;
pub mod evaluator;
pub mod fetcher;
pub mod filter;
pub mod llm_adapter;
pub mod pipeline;
pub mod routing;
pub mod seen_store;
pub mod sinks;
pub mod sources;
pub mod traits;
pub mod types;
pub mod utils;

pub use types::*;
pub use config::{load_config, load_profile, Config};
pub use enricher::Enricher;
pub use evaluator::{BatchEvaluator, Evaluation};
pub use fetcher::Fetcher;
pub use filter::{retain_keyword_matches, select_candidates, KeywordFilter};
pub use llm_adapter::{create_backend, BackendError, BackendKind, JudgmentBackend};
pub use pipeline::{DiscoveryPipeline, PipelineBuilder, RunState};
pub use routing::{RoutingOutcome, RoutingPolicy};
pub use seen_store::SeenStore;
pub use sources::GitHubSource;
pub use traits::{CandidateSource, ExcerptSource, NotificationSink};
