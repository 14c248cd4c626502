//! Error taxonomy for the traffic core.
//!
//! Missing resources are recoverable (log + empty structure); a missing
//! referenced entity is fatal only to the dependent entity.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("resource not found: {0}")]
    ResourceMissing(String),

    #[error("malformed document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("unknown airport id: {0}")]
    UnknownAirport(String),

    #[error("parent entity not found: {0}")]
    ParentMissing(String),

    #[error("model asset not found: {0}")]
    ModelMissing(String),
}
