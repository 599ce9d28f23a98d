use thiserror::Error;
use transport::TransportError;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("there is no current map")]
    NoMap,
    #[error("the current search has no name")]
    Unnamed,
    #[error("no document is selected")]
    NoDocumentSelected,
    #[error("no search history entry at position {0}")]
    UnknownHistoryEntry(usize),
    #[error("thumbnail atlas '{filename}': {reason}")]
    Atlas { filename: String, reason: String },
}
