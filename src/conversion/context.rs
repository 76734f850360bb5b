//! Run-scoped state threaded through the conversion pipeline.

use mediaconv_common::{ConversionTarget, ItemUri};
use mediaconv_db::models::User;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::outcome::CleanupReference;
use super::queue::{build_queue, CandidateGroup, ConversionReference};
use super::statistics::ConversionStatistics;
use crate::config::{Config, QueueRoot};
use crate::jobs::JobHandle;

/// Cooperative cancellation flag.
///
/// Clones share the same flag, so a caller keeping a clone can stop a run
/// that is executing on another thread.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub target: ConversionTarget,
    pub force_stop: StopSignal,
}

impl ConversionOptions {
    pub fn new(target: ConversionTarget) -> Self {
        Self {
            target,
            force_stop: StopSignal::new(),
        }
    }
}

/// Configuration values the pipeline reads.
#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub blob_field: String,
    pub file_path_field: String,
    pub extension_field: String,
    pub data_root: PathBuf,
    pub file_folder: String,
    pub max_size_in_database: u64,
    pub consecutive_error_limit: u32,
    pub queue_root: QueueRoot,
    pub chunk_size: usize,
}

impl From<&Config> for ConversionSettings {
    fn from(config: &Config) -> Self {
        Self {
            blob_field: config.media.blob_field.clone(),
            file_path_field: config.media.file_path_field.clone(),
            extension_field: config.media.extension_field.clone(),
            data_root: config.media.data_root.clone(),
            file_folder: config.media.file_folder.clone(),
            max_size_in_database: config.media.max_size_in_database,
            consecutive_error_limit: config.conversion.consecutive_error_limit.max(1),
            queue_root: config.conversion.queue_root,
            chunk_size: config.conversion.chunk_size.max(1),
        }
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Everything one conversion run owns. Created per run and mutated in place
/// by the worker executing it.
pub struct RunContext {
    pub references: Vec<ConversionReference>,
    pub options: ConversionOptions,
    pub queue: Vec<CandidateGroup>,
    pub statistics: ConversionStatistics,
    pub user: User,
    pub settings: ConversionSettings,
    pub job: Option<JobHandle>,
    /// Prior storage locations of converted versions, in conversion order.
    /// Each one is also queued for purge when it is recorded.
    pub cleanup_references: Vec<(ItemUri, CleanupReference)>,
}

impl RunContext {
    pub fn new(
        references: Vec<ConversionReference>,
        options: ConversionOptions,
        user: User,
        settings: ConversionSettings,
        job: Option<JobHandle>,
    ) -> Self {
        let queue = build_queue(&references, settings.queue_root);
        Self {
            references,
            options,
            queue,
            statistics: ConversionStatistics::new(),
            user,
            settings,
            job,
            cleanup_references: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_set());
        signal.set();
        assert!(observer.is_set());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.conversion.consecutive_error_limit = 3;
        config.conversion.queue_root = QueueRoot::Children;

        let settings = ConversionSettings::from(&config);
        assert_eq!(settings.consecutive_error_limit, 3);
        assert_eq!(settings.queue_root, QueueRoot::Children);
        assert_eq!(settings.blob_field, "blob");
    }
}
