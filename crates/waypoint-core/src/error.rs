//! Error types for waypoint.

use thiserror::Error;

use crate::content::ContentLocation;

/// Result type alias using waypoint's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Which destination lookup failed to resolve a mapped container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Lookup by the container's path at the source.
    SourceLocation,
    /// Lookup by the remapped, destination-bound path.
    MappedLocation,
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKind::SourceLocation => write!(f, "source location"),
            LookupKind::MappedLocation => write!(f, "mapped location"),
        }
    }
}

/// Core error type for waypoint operations.
///
/// `Clone` so that one error set can be recorded on every entry of a bulk
/// batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Pulling the source representation failed
    #[error("Pull error: {0}")]
    Pull(String),

    /// Converting the pulled representation to its publish form failed
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A mapped container could not be found at the destination. Never retried.
    #[error("Mapping error: no destination container found by {by} '{location}'")]
    MappingResolution {
        location: ContentLocation,
        by: LookupKind,
    },

    /// A transform hook failed
    #[error("Transform error: {0}")]
    Transform(String),

    /// Releasing editing handles or staged resources failed
    #[error("Finalize error: {0}")]
    Finalize(String),

    /// Publishing to the destination failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// A cancellation signal was observed
    #[error("Operation canceled")]
    Canceled,

    /// Several failures that must be reported together
    #[error("{}", join_errors(.0))]
    Aggregate(Vec<Error>),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// True when this error only reports an observed cancellation.
    ///
    /// An aggregate counts as a cancellation only when every leaf does, so a
    /// real finalize failure alongside a cancellation is still a failure.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::Canceled => true,
            Error::Aggregate(errors) => {
                !errors.is_empty() && errors.iter().all(Error::is_cancellation)
            }
            _ => false,
        }
    }

    /// Expand nested aggregates into their leaf errors.
    pub fn flatten(self) -> Vec<Error> {
        match self {
            Error::Aggregate(errors) => errors.into_iter().flat_map(Error::flatten).collect(),
            other => vec![other],
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
