//! Conversion candidates and lazy child expansion.

use mediaconv_common::{Error, ItemUri};

use crate::repository::ContentRepository;

/// One item (at a given version) queued for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionCandidate {
    uri: ItemUri,
    recursive: bool,
}

impl ConversionCandidate {
    pub fn new(uri: ItemUri, recursive: bool) -> Self {
        Self { uri, recursive }
    }

    pub fn uri(&self) -> &ItemUri {
        &self.uri
    }

    /// Whether the candidate's descendants are converted too.
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// The candidate's direct children, fetched from the repository on the
    /// first pull. Each call starts a fresh sequence.
    pub fn children<'r>(&self, repo: &'r dyn ContentRepository) -> Children<'r> {
        Children {
            repo,
            parent: self.uri.clone(),
            recursive: self.recursive,
            state: ChildState::Pending,
        }
    }
}

/// Failure to enumerate the children of an item.
#[derive(Debug, thiserror::Error)]
#[error("Failed to enumerate children of {uri}: {source}")]
pub struct ExpandError {
    pub uri: ItemUri,
    #[source]
    pub source: Error,
}

enum ChildState {
    Pending,
    Iterating(std::vec::IntoIter<ItemUri>),
    Done,
}

/// On-demand sequence of child candidates.
///
/// Children inherit the parent's recursive flag. An enumeration failure is
/// yielded once, after which the sequence ends.
pub struct Children<'r> {
    repo: &'r dyn ContentRepository,
    parent: ItemUri,
    recursive: bool,
    state: ChildState,
}

impl Iterator for Children<'_> {
    type Item = Result<ConversionCandidate, ExpandError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                ChildState::Pending => match self.repo.child_uris(&self.parent) {
                    Ok(uris) => self.state = ChildState::Iterating(uris.into_iter()),
                    Err(source) => {
                        self.state = ChildState::Done;
                        return Some(Err(ExpandError {
                            uri: self.parent.clone(),
                            source,
                        }));
                    }
                },
                ChildState::Iterating(uris) => {
                    return match uris.next() {
                        Some(uri) => Some(Ok(ConversionCandidate::new(uri, self.recursive))),
                        None => {
                            self.state = ChildState::Done;
                            None
                        }
                    };
                }
                ChildState::Done => return None,
            }
        }
    }
}
