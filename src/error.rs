//! Error type for index operations.
//!
//! Parsing never fails and slot conflicts are reported through
//! [`InsertOutcome`](crate::data::model::InsertOutcome), so everything here is
//! a caller mistake or a bad persisted record.

use thiserror::Error;

use crate::data::model::ImageId;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Unknown image id: {0}")]
    UnknownImageId(ImageId),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Image {0} is already indexed")]
    DuplicateImageId(ImageId),

    #[error("Invalid group label: {0:?}")]
    InvalidGroupLabel(String),

    #[error("Unknown identifier: {0:?}")]
    UnknownIdentifier(String),

    /// A persisted record that does not describe a consistent index.
    #[error("Cannot import index state: {0}")]
    StateImport(String),

    #[error("Unsupported index state version {found} (expected {expected})")]
    UnsupportedStateVersion { found: u32, expected: u32 },

    #[error("Image ids exhausted")]
    IdsExhausted,

    #[error("Index lock poisoned")]
    LockPoisoned,
}
