//! Queue processing: groups, candidates, versions, dispatch.

use mediaconv_common::ConversionAction;
use tracing::{debug, info, warn};

use super::candidate::{ConversionCandidate, ExpandError};
use super::context::RunContext;
use super::converter::{Converter, ItemConverter};
use super::eligibility;
use super::outcome::ItemResult;
use crate::repository::ContentRepository;

/// Drains a run's queue depth-first and dispatches every media version to
/// the converter.
///
/// Item-level problems become outcomes; `run` itself never fails. The stop
/// signal is checked before every group, candidate and version, and the
/// circuit breaker sets it once the consecutive error count reaches the
/// configured limit.
pub struct ConversionProcessor<'r, C = ItemConverter<'r>> {
    repo: &'r dyn ContentRepository,
    converter: C,
}

impl<'r> ConversionProcessor<'r, ItemConverter<'r>> {
    pub fn new(repo: &'r dyn ContentRepository) -> Self {
        Self {
            repo,
            converter: ItemConverter::new(repo),
        }
    }
}

impl<'r, C: Converter> ConversionProcessor<'r, C> {
    pub fn with_converter(repo: &'r dyn ContentRepository, converter: C) -> Self {
        Self { repo, converter }
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn run(&self, ctx: &mut RunContext) {
        info!(
            "Converting media to {} for {} reference(s) as {}",
            ctx.options.target,
            ctx.references.len(),
            ctx.user.name
        );

        for index in 0..ctx.queue.len() {
            if ctx.options.force_stop.is_set() {
                info!("Stop requested, skipping remaining reference groups");
                break;
            }
            let group = ctx.queue[index].clone();
            debug!("Processing reference {}", group.reference().uri);
            self.process_candidates(group.candidates(self.repo), ctx);
        }

        self.report(ctx);
    }

    fn process_candidates<I>(&self, candidates: I, ctx: &mut RunContext)
    where
        I: Iterator<Item = Result<ConversionCandidate, ExpandError>>,
    {
        for candidate in candidates {
            if self.should_stop(ctx) {
                break;
            }

            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!("{}", e);
                    let message = e.to_string();
                    ctx.statistics.record_failure(&e.uri, message);
                    self.publish_counts(ctx);
                    continue;
                }
            };

            self.process_versions(&candidate, ctx);

            if candidate.is_recursive() {
                self.process_candidates(candidate.children(self.repo), ctx);
            }
        }
    }

    fn process_versions(&self, candidate: &ConversionCandidate, ctx: &mut RunContext) {
        let item = match self.repo.get_item(candidate.uri()) {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!("Item {} no longer exists", candidate.uri());
                ctx.statistics
                    .record_failure(candidate.uri(), format!("Item {} not found", candidate.uri()));
                self.publish_counts(ctx);
                return;
            }
            Err(e) => {
                warn!("Failed to load item {}: {}", candidate.uri(), e);
                ctx.statistics.record_failure(
                    candidate.uri(),
                    format!("Failed to load item {}: {}", candidate.uri(), e),
                );
                self.publish_counts(ctx);
                return;
            }
        };

        let versions =
            match eligibility::versions_with_media(self.repo, &item, &ctx.settings.blob_field) {
                Ok(versions) => versions,
                Err(e) => {
                    warn!("Failed to resolve versions of {}: {}", item.uri, e);
                    ctx.statistics.record_failure(
                        &item.uri,
                        format!("Failed to resolve versions of {}: {}", item.uri, e),
                    );
                    self.publish_counts(ctx);
                    return;
                }
            };

        for version in versions {
            if self.should_stop(ctx) {
                return;
            }
            let result = self.converter.convert(&version, ctx);
            self.record(ctx, result);
        }
    }

    /// Trip the circuit breaker if needed and report whether to halt.
    fn should_stop(&self, ctx: &mut RunContext) -> bool {
        if ctx.statistics.consecutive_errors() >= ctx.settings.consecutive_error_limit {
            if !ctx.options.force_stop.is_set() {
                warn!(
                    "{} consecutive conversion errors, stopping the run",
                    ctx.statistics.consecutive_errors()
                );
                ctx.options.force_stop.set();
            }
            return true;
        }
        ctx.options.force_stop.is_set()
    }

    /// Count a converter result and queue the prior storage location it
    /// left behind. The location is queued right away, so it survives a run
    /// that stops or fails later on.
    fn record(&self, ctx: &mut RunContext, result: ItemResult) {
        let outcome = &result.outcome;
        match outcome.action {
            ConversionAction::Processed | ConversionAction::Skipped => {
                debug!("{}", outcome.message)
            }
            ConversionAction::Failed => warn!("{}", outcome.message),
        }

        ctx.statistics.record(&result.uri, outcome);
        if result.aborted {
            debug!("Stopped converting {} early", result.uri);
            ctx.statistics.record_aborted();
        }

        match result.cleanup {
            Some(cleanup) if !result.aborted && !cleanup.reference.is_empty() => {
                if let Err(e) = self.repo.enqueue_cleanup(cleanup.kind, &cleanup.reference, &result.uri) {
                    warn!("Failed to queue cleanup of {} for {}: {}", cleanup.reference, result.uri, e);
                    ctx.statistics.record_cleanup_failure();
                }
                ctx.cleanup_references.push((result.uri, cleanup));
            }
            _ => {}
        }
        self.publish_counts(ctx);
    }

    fn publish_counts(&self, ctx: &RunContext) {
        if let Some(job) = &ctx.job {
            let stats = &ctx.statistics;
            job.update_counts(stats.processed(), stats.skipped(), stats.failed());
        }
    }

    /// Failures first, then cleanup problems, then the summary lines last.
    fn report(&self, ctx: &RunContext) {
        let stats = &ctx.statistics;
        info!(
            "Media conversion finished: {} processed, {} skipped, {} failed ({} aborted)",
            stats.processed(),
            stats.skipped(),
            stats.failed(),
            stats.aborted()
        );

        if let Some(job) = &ctx.job {
            for failure in stats.failures() {
                job.add_message(format!("Failed {}: {}", failure.uri, failure.message));
            }
            if stats.cleanup_failures() > 0 {
                job.add_message(format!(
                    "Failed to queue {} cleanup reference(s)",
                    stats.cleanup_failures()
                ));
            }
            for line in stats.summary_lines() {
                job.add_message(line);
            }
        }
    }
}
