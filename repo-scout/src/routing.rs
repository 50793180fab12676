use crate::evaluator::Evaluation;
use crate::seen_store::SeenStore;
use crate::sinks::RejectionLog;
use crate::traits::NotificationSink;
use crate::types::{Notification, RejectionEntry};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counts produced by one routing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingOutcome {
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub delivery_failures: usize,
    pub rejection_log_failures: usize,
}

/// Sends accepted candidates to the sink and rejected ones to the rejection log.
///
/// Every judged candidate is marked seen, whatever its verdict and whether or
/// not delivery worked. Candidates whose evaluation failed are left unmarked so
/// the next run picks them up again.
pub struct RoutingPolicy {
    sink: Option<Arc<dyn NotificationSink>>,
    rejection_log: Option<RejectionLog>,
    embeds_per_message: usize,
    dry_run: bool,
}

impl RoutingPolicy {
    pub fn new(
        sink: Option<Arc<dyn NotificationSink>>,
        rejection_log: Option<RejectionLog>,
        embeds_per_message: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            sink,
            rejection_log,
            embeds_per_message: embeds_per_message.max(1),
            dry_run,
        }
    }

    pub async fn route(
        &self,
        evaluations: Vec<Evaluation>,
        store: &mut SeenStore,
        processed: usize,
        now: DateTime<Utc>,
    ) -> RoutingOutcome {
        let mut outcome = RoutingOutcome::default();
        let mut notifications = Vec::new();

        for evaluation in evaluations {
            let verdict = match &evaluation.outcome {
                Ok(verdict) => verdict,
                Err(_) => {
                    outcome.skipped += 1;
                    continue;
                }
            };
            let name = evaluation.candidate.full_name();

            if verdict.interested {
                info!("✓ {}: {}", name, verdict.reason);
                notifications.push(Notification::new(&evaluation.candidate, verdict));
                outcome.accepted += 1;
            } else {
                debug!("✗ {}: {}", name, verdict.reason);
                outcome.rejected += 1;
                if let Some(log) = &self.rejection_log {
                    let entry = RejectionEntry::new(&evaluation.candidate, verdict, now);
                    if let Err(e) = log.append(&entry).await {
                        warn!("Could not log rejection of {} to {}: {}", name, log.path().display(), e);
                        outcome.rejection_log_failures += 1;
                    }
                }
            }

            store.mark_seen(name, now);
        }

        if outcome.rejected > 0 {
            if let Some(log) = &self.rejection_log {
                info!("Logged {} rejected repos to {}", outcome.rejected, log.path().display());
            }
        }

        outcome.delivery_failures = self.deliver(&notifications, processed).await;
        outcome
    }

    /// Returns how many notifications failed to go out.
    async fn deliver(&self, notifications: &[Notification], processed: usize) -> usize {
        if notifications.is_empty() {
            return 0;
        }

        if self.dry_run {
            info!("Dry run - not delivering {} matches", notifications.len());
            for n in notifications {
                println!("  {} ({}⭐): {}", n.full_name, n.stars, n.reason);
            }
            return 0;
        }

        let Some(sink) = &self.sink else {
            warn!("No notification sink configured; {} matches not delivered", notifications.len());
            return notifications.len();
        };

        if let Err(e) = sink.send_summary(notifications.len(), processed).await {
            warn!("{} summary failed: {}", sink.sink_name(), e);
        }

        let mut failures = 0;
        for chunk in notifications.chunks(self.embeds_per_message) {
            if let Err(e) = sink.deliver(chunk).await {
                warn!("{} failed to deliver {} repos: {}", sink.sink_name(), chunk.len(), e);
                failures += chunk.len();
            }
        }

        if failures == 0 {
            info!("Delivered {} repos via {}", notifications.len(), sink.sink_name());
        }
        failures
    }
}
