//! Error types for note-hub.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using note-hub's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failures returned by the folder hierarchy manager. Every
/// precondition violation maps to exactly one variant carrying the id
/// that triggered it.
#[derive(Error, Debug)]
pub enum Error {
    /// Initialize called for a user who already has folders.
    #[error("user {0} already has a folder tree")]
    AlreadyInitialized(String),

    /// Referenced folder id does not exist.
    #[error("folder {0} not found")]
    FolderNotFound(Uuid),

    /// Parent named by a create call does not exist.
    #[error("parent folder {0} not found")]
    ParentNotFound(Uuid),

    /// Create named a parent the calling user does not own.
    #[error("folder {folder} is not owned by {user}")]
    NotOwner { folder: Uuid, user: String },

    /// Move related two folders with different owners.
    #[error("folders {folder} and {new_parent} have different owners")]
    OwnerMismatch { folder: Uuid, new_parent: Uuid },

    /// Folder moved into itself.
    #[error("cannot move folder {0} into itself")]
    SelfMove(Uuid),

    /// Destination is a descendant of the folder being moved.
    #[error("cannot move folder {folder} into its own descendant {new_parent}")]
    CycleDetected { folder: Uuid, new_parent: Uuid },

    /// Item not currently located in any folder.
    #[error("item {0} is not in any folder")]
    ItemNotFound(String),

    /// Document read/write against the backing directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A folder document exists but does not parse.
    #[error("corrupt folder document {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}
