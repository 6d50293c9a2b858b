// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Failures surfaced by the wallet model, the query engine and the store.
#[derive(Debug, Error)]
pub enum MwxError {
    /// An entity invariant was violated at construction or mutation.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A link points to an entity that cannot be exported or resolved.
    #[error("Reference error: {0}")]
    Reference(String),
    /// A query was malformed or one of its values could not be resolved.
    #[error("Usage error: {0}")]
    Usage(String),
    #[error("Path error: {0}")]
    Path(String),
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MwxError>;

pub(crate) fn validation(msg: impl Into<String>) -> MwxError {
    MwxError::Validation(msg.into())
}

pub(crate) fn usage(msg: impl Into<String>) -> MwxError {
    MwxError::Usage(msg.into())
}
