use std::fmt::Display;

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("invalid ID")]
    InvalidId,
    #[error("undo target no longer exists")]
    ExpiredTarget,
    #[error("disconnected")]
    Disconnected,

    #[error("item collides with another item")]
    Collision,
    #[error("range is empty")]
    EmptyRange,
    #[error("position out of range")]
    OutOfRange,
    #[error("track is locked")]
    TrackLocked,
    #[error("producer is not valid")]
    InvalidProducer,
    #[error("a group needs at least two members")]
    GroupTooSmall,
    #[error("no marker at frame {frame}")]
    NoMarker { frame: i64 },
    #[error("frame {frame} already has a marker")]
    MarkerExists { frame: i64 },
    #[error("conflicting marker at frame {frame}")]
    MarkerConflict { frame: i64 },
    #[error("invalid marker type {index}")]
    InvalidMarkerType { index: i64 },
    #[error("invalid json: {message}")]
    InvalidJson { message: String },
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

impl Error {
    #[cold]
    pub fn new_internal<E: Display>(error: E) -> Error {
        Error::Internal {
            message: error.to_string(),
        }
    }

    #[cold]
    pub fn new_json<E: Display>(error: E) -> Error {
        Error::InvalidJson {
            message: error.to_string(),
        }
    }

    /// Expected failures: the request was rejected and nothing changed.
    pub fn is_validation(&self) -> bool {
        !self.is_invariant_violation()
    }

    /// Programming errors: the caller referred to something that does not
    /// exist, or the model found itself in an inconsistent state.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Error::Internal { .. } | Error::InvalidId | Error::ExpiredTarget | Error::Disconnected
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure reported by a background media load.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("resource not found: {resource}")]
    NotFound { resource: String },
    #[error("unsupported resource {resource}: {message}")]
    Unsupported { resource: String, message: String },
    #[error("load canceled")]
    Canceled,
}
