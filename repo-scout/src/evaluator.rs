use crate::llm_adapter::{BackendError, JudgmentBackend};
use crate::types::{EnrichedCandidate, InterestProfile, Verdict};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_EVALUATION_RETRIES: u32 = 1;

/// One candidate and what the backend made of it.
#[derive(Debug)]
pub struct Evaluation {
    pub candidate: EnrichedCandidate,
    pub outcome: Result<Verdict, BackendError>,
}

impl Evaluation {
    pub fn verdict(&self) -> Option<&Verdict> {
        self.outcome.as_ref().ok()
    }
}

/// Drives enriched candidates through a judgment backend in fixed-size batches.
///
/// Candidates are judged one at a time and independently: a failure is
/// recorded against that candidate and the rest of the batch carries on.
/// Transient failures get `retries` further attempts with exponential backoff.
pub struct BatchEvaluator {
    backend: Arc<dyn JudgmentBackend>,
    batch_size: usize,
    retries: u32,
    retry_delay: Duration,
}

impl BatchEvaluator {
    pub fn new(backend: Arc<dyn JudgmentBackend>, batch_size: usize, retries: u32) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
            retries,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        ExponentialBackoff {
            current_interval: self.retry_delay,
            initial_interval: self.retry_delay,
            max_interval: self.retry_delay * 8,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Judge every candidate; the output has one entry per input, in input order.
    pub async fn evaluate(
        &self,
        candidates: Vec<EnrichedCandidate>,
        profile: &InterestProfile,
    ) -> Vec<Evaluation> {
        let total = candidates.len();
        let batches = total.div_ceil(self.batch_size);
        let mut results = Vec::with_capacity(total);

        let mut remaining = candidates.into_iter().peekable();
        let mut batch_index = 0;
        while remaining.peek().is_some() {
            batch_index += 1;
            let batch: Vec<EnrichedCandidate> = remaining.by_ref().take(self.batch_size).collect();
            info!("Evaluating batch {}/{} ({} repos)", batch_index, batches, batch.len());

            for candidate in batch {
                let outcome = self.evaluate_one(&candidate, profile).await;
                match &outcome {
                    Ok(verdict) => debug!(
                        "{}: {} ({})",
                        candidate.full_name(),
                        if verdict.interested { "accepted" } else { "rejected" },
                        verdict.reason
                    ),
                    Err(e) => warn!("Skipping {} this run: {}", candidate.full_name(), e),
                }
                results.push(Evaluation { candidate, outcome });
            }
        }

        let failures = results.iter().filter(|r| r.outcome.is_err()).count();
        info!("Evaluated {} repos with {} backend failures", total, failures);
        results
    }

    async fn evaluate_one(
        &self,
        candidate: &EnrichedCandidate,
        profile: &InterestProfile,
    ) -> Result<Verdict, BackendError> {
        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            match self.backend.evaluate(candidate, profile).await {
                Ok(verdict) => return Ok(verdict),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let delay = backoff.next_backoff().unwrap_or(self.retry_delay);
                    warn!(
                        "{} failed for {} (attempt {}), retrying in {:?}: {}",
                        self.backend.backend_name(),
                        candidate.full_name(),
                        attempt,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candidate;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replies from a script keyed by repo name; unknown names are accepted.
    struct ScriptedBackend {
        script: Mutex<HashMap<String, Vec<Result<Verdict, BackendError>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<(&str, Vec<Result<Verdict, BackendError>>)>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JudgmentBackend for ScriptedBackend {
        fn backend_name(&self) -> String {
            "scripted".to_string()
        }

        async fn evaluate(
            &self,
            candidate: &EnrichedCandidate,
            _profile: &InterestProfile,
        ) -> Result<Verdict, BackendError> {
            let name = candidate.full_name().to_string();
            self.calls.lock().unwrap().push(name.clone());
            let mut script = self.script.lock().unwrap();
            match script.get_mut(&name) {
                Some(replies) if !replies.is_empty() => replies.remove(0),
                _ => Ok(Verdict::accept("default")),
            }
        }
    }

    fn enriched(name: &str) -> EnrichedCandidate {
        EnrichedCandidate::new(
            Candidate {
                full_name: name.to_string(),
                url: format!("https://github.com/{}", name),
                description: String::new(),
                stars: 1,
                language: String::new(),
                topics: vec![],
                is_fork: false,
                created_at: Utc::now(),
            },
            None,
        )
    }

    fn profile() -> InterestProfile {
        InterestProfile {
            uri: "prompt.md".to_string(),
            text: "anything".to_string(),
        }
    }

    fn unavailable() -> BackendError {
        BackendError::Unavailable {
            backend: "scripted".to_string(),
            message: "connection reset".to_string(),
        }
    }

    fn malformed() -> BackendError {
        BackendError::Malformed {
            backend: "scripted".to_string(),
            message: "not json".to_string(),
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("o/b", vec![Err(malformed())]),
            ("o/c", vec![Ok(Verdict::reject("not relevant"))]),
        ]));
        let evaluator = BatchEvaluator::new(backend.clone(), 2, 1).with_retry_delay(Duration::ZERO);

        let input: Vec<_> = ["o/a", "o/b", "o/c", "o/d", "o/e"].iter().map(|n| enriched(n)).collect();
        let results = evaluator.evaluate(input, &profile()).await;

        let names: Vec<_> = results.iter().map(|r| r.candidate.full_name()).collect();
        assert_eq!(names, vec!["o/a", "o/b", "o/c", "o/d", "o/e"]);
        assert!(matches!(results[1].outcome, Err(BackendError::Malformed { .. })));
        assert_eq!(results[2].verdict(), Some(&Verdict::reject("not relevant")));
        assert_eq!(results.iter().filter(|r| r.outcome.is_ok()).count(), 4);
        // Malformed replies are not retried.
        assert_eq!(backend.calls().iter().filter(|n| *n == "o/b").count(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            ("o/a", vec![Err(unavailable()), Ok(Verdict::accept("second try"))]),
            ("o/b", vec![Err(unavailable()), Err(unavailable()), Ok(Verdict::accept("too late"))]),
        ]));
        let evaluator = BatchEvaluator::new(backend.clone(), 10, 1).with_retry_delay(Duration::ZERO);

        let results = evaluator.evaluate(vec![enriched("o/a"), enriched("o/b")], &profile()).await;

        assert_eq!(results[0].verdict(), Some(&Verdict::accept("second try")));
        assert!(matches!(results[1].outcome, Err(BackendError::Unavailable { .. })));
        assert_eq!(backend.calls(), vec!["o/a", "o/a", "o/b", "o/b"]);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let backend = Arc::new(ScriptedBackend::new(vec![("o/a", vec![Err(unavailable())])]));
        let evaluator = BatchEvaluator::new(backend.clone(), 0, 0);

        let results = evaluator.evaluate(vec![enriched("o/a")], &profile()).await;

        assert!(results[0].outcome.is_err());
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(evaluator.batch_size, 1);
    }
}
