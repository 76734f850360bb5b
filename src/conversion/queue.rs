//! Queue building: one lazy candidate group per conversion reference.

use mediaconv_common::ItemUri;
use serde::{Deserialize, Serialize};

use super::candidate::{Children, ConversionCandidate, ExpandError};
use crate::config::QueueRoot;
use crate::repository::ContentRepository;

/// A user-chosen subtree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReference {
    pub uri: ItemUri,
    pub recursive: bool,
}

impl ConversionReference {
    pub fn new(uri: ItemUri, recursive: bool) -> Self {
        Self { uri, recursive }
    }
}

/// The candidates derived from one reference. Nothing is fetched until the
/// group is iterated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateGroup {
    reference: ConversionReference,
    root: QueueRoot,
}

impl CandidateGroup {
    pub fn new(reference: ConversionReference, root: QueueRoot) -> Self {
        Self { reference, root }
    }

    pub fn reference(&self) -> &ConversionReference {
        &self.reference
    }

    /// Root candidates of the group, tagged with the reference's recursive flag.
    pub fn candidates<'r>(&self, repo: &'r dyn ContentRepository) -> GroupCandidates<'r> {
        let root = ConversionCandidate::new(self.reference.uri.clone(), self.reference.recursive);
        match self.root {
            QueueRoot::Reference => GroupCandidates::Single(Some(root)),
            QueueRoot::Children => GroupCandidates::Children(root.children(repo)),
        }
    }
}

pub enum GroupCandidates<'r> {
    Single(Option<ConversionCandidate>),
    Children(Children<'r>),
}

impl Iterator for GroupCandidates<'_> {
    type Item = Result<ConversionCandidate, ExpandError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Single(candidate) => candidate.take().map(Ok),
            Self::Children(children) => children.next(),
        }
    }
}

/// Build the queue for a run, preserving reference order.
pub fn build_queue(references: &[ConversionReference], root: QueueRoot) -> Vec<CandidateGroup> {
    references
        .iter()
        .cloned()
        .map(|reference| CandidateGroup::new(reference, root))
        .collect()
}
