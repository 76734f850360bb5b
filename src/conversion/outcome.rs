use mediaconv_common::{CleanupKind, ConversionAction, ItemUri};
use serde::Serialize;

/// Result tag and message for one attempted item version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub action: ConversionAction,
    pub message: String,
}

impl ConversionOutcome {
    pub fn processed(message: impl Into<String>) -> Self {
        Self {
            action: ConversionAction::Processed,
            message: message.into(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            action: ConversionAction::Skipped,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            action: ConversionAction::Failed,
            message: message.into(),
        }
    }
}

/// Prior storage location left behind by a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReference {
    pub kind: CleanupKind,
    /// Blob id or store-relative file path.
    pub reference: String,
}

/// What the item converter reports back for one item version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub uri: ItemUri,
    pub outcome: ConversionOutcome,
    /// The converter stopped early for this item.
    pub aborted: bool,
    pub cleanup: Option<CleanupReference>,
}

impl ItemResult {
    pub fn completed(uri: ItemUri, outcome: ConversionOutcome) -> Self {
        Self {
            uri,
            outcome,
            aborted: false,
            cleanup: None,
        }
    }

    pub fn aborted(uri: ItemUri, outcome: ConversionOutcome) -> Self {
        Self {
            uri,
            outcome,
            aborted: true,
            cleanup: None,
        }
    }

    #[must_use]
    pub fn with_cleanup(mut self, kind: CleanupKind, reference: impl Into<String>) -> Self {
        self.cleanup = Some(CleanupReference {
            kind,
            reference: reference.into(),
        });
        self
    }
}

/// Early exit from a converter stage. Ends processing of the current item
/// only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abort(pub ConversionOutcome);

impl Abort {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self(ConversionOutcome::skipped(message))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self(ConversionOutcome::failed(message))
    }
}
