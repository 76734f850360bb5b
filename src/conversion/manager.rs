//! Entry point for starting media conversion jobs.

use mediaconv_common::{Error, Result};
use std::sync::Arc;
use tracing::info;

use super::context::{ConversionOptions, ConversionSettings, RunContext};
use super::processor::ConversionProcessor;
use super::queue::ConversionReference;
use crate::jobs::{JobHandle, JobManager};
use crate::repository::ContentRepository;

/// Name under which conversion runs are registered.
pub const JOB_NAME: &str = "MediaConversion";
pub const JOB_CATEGORY: &str = "MediaConversionTool";

/// Starts conversion runs as background jobs.
pub struct MediaConversionManager {
    repo: Arc<dyn ContentRepository>,
    jobs: Arc<JobManager>,
    settings: ConversionSettings,
}

impl MediaConversionManager {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        jobs: Arc<JobManager>,
        settings: ConversionSettings,
    ) -> Self {
        Self {
            repo,
            jobs,
            settings,
        }
    }

    /// Validate the request and start a conversion job.
    ///
    /// Fails before any job is registered when `references` is empty, a
    /// reference does not resolve to an item, or `user_name` is unknown.
    /// Must be called from within a tokio runtime.
    pub fn start_conversion(
        &self,
        references: Vec<ConversionReference>,
        options: ConversionOptions,
        user_name: &str,
    ) -> Result<JobHandle> {
        if references.is_empty() {
            return Err(Error::invalid_input("At least one conversion reference is required"));
        }

        for reference in &references {
            if self.repo.get_item(&reference.uri)?.is_none() {
                return Err(Error::not_found(format!("item {}", reference.uri)));
            }
        }

        let user = self
            .repo
            .get_user(user_name)?
            .ok_or_else(|| Error::not_found(format!("user '{}'", user_name)))?;

        let repo = Arc::clone(&self.repo);
        let settings = self.settings.clone();

        self.jobs.start(JOB_NAME, JOB_CATEGORY, move |job| {
            let mut ctx = RunContext::new(references, options, user, settings, Some(job.clone()));
            ConversionProcessor::new(repo.as_ref()).run(&mut ctx);
            let queued = ctx.cleanup_references.len() as u64 - ctx.statistics.cleanup_failures();
            if queued > 0 {
                info!("Queued {} prior storage location(s) for purge", queued);
            }
            Ok(())
        })
    }

    /// The most recent conversion job started by this manager.
    pub fn current_job(&self) -> Option<JobHandle> {
        self.jobs.get_job(JOB_NAME)
    }
}

