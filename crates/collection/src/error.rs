use thiserror::Error;
use transport::TransportError;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no collection is open")]
    NotOpen,
    #[error("collection has no column '{0}'")]
    UnknownColumn(String),
}
