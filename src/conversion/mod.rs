//! Media storage conversion pipeline.
//!
//! A run moves the binary payload of media items between inline database
//! blobs and files on disk:
//!
//! - [`queue`] turns the caller's subtree references into lazy candidate groups
//! - [`processor`] walks the groups depth-first, expands each candidate into
//!   its media-bearing versions and enforces the circuit breaker
//! - [`converter`] transfers one item version
//! - [`statistics`] counts outcomes and collects failures
//! - [`manager`] validates a request and runs it as a background job

pub mod candidate;
pub mod context;
pub mod converter;
pub mod eligibility;
pub mod manager;
pub mod outcome;
pub mod processor;
pub mod queue;
pub mod statistics;

pub use candidate::ConversionCandidate;
pub use context::{ConversionOptions, ConversionSettings, RunContext, StopSignal};
pub use converter::{Converter, ItemConverter};
pub use manager::{MediaConversionManager, JOB_CATEGORY, JOB_NAME};
pub use outcome::{Abort, CleanupReference, ConversionOutcome, ItemResult};
pub use processor::ConversionProcessor;
pub use queue::{build_queue, CandidateGroup, ConversionReference};
pub use statistics::{ConversionStatistics, FailureRecord};
