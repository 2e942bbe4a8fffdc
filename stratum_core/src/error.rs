// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Errors are split by how far they propagate:
//!
//! - [`LoadError`] and [`ResolveError`] are *per-item*. Synchronizers log
//!   them, skip the offending item, and continue with its siblings.
//! - [`SyncError`] is *per-pass*. It is only returned for cancellation,
//!   configuration contradictions, and global preconditions such as buffer
//!   allocation. A pass that returns `SyncError` has applied no mutation.

use crate::model::{ObjectId, TableId};

/// A failure reported by a loader, table, or data handle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The data source or table is unknown.
    #[error("not found: {0}")]
    NotFound(String),
    /// The table has no column with the requested name.
    #[error("table {table} has no column {column:?}")]
    MissingColumn {
        /// Table that was queried.
        table: TableId,
        /// Requested column name.
        column: String,
    },
    /// The underlying read failed.
    #[error("i/o error: {0}")]
    Io(String),
    /// The data was read but is malformed.
    #[error("format error: {0}")]
    Format(String),
    /// The load observed a cancellation request.
    #[error("load cancelled")]
    Cancelled,
}

/// A failure while resolving one attribute of one item.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A column value cannot be converted to the attribute's value type.
    #[error("column {column:?} row {row}: expected {expected}")]
    ColumnType {
        /// Column being resolved.
        column: String,
        /// First offending row.
        row: usize,
        /// Human-readable name of the expected type.
        expected: &'static str,
    },
    /// A column has a different length than the item it styles.
    #[error("column {column:?} has {actual} rows, item has {expected}")]
    LengthMismatch {
        /// Column being resolved.
        column: String,
        /// Item length.
        expected: usize,
        /// Column length.
        actual: usize,
    },
    /// Loading the table or column failed.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A pass-level synchronization failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The pass observed its cancellation token. Nothing was applied.
    #[error("synchronize cancelled")]
    Cancelled,
    /// The scene or configuration contradicts itself.
    #[error("configuration error for object {object:?}: {message}")]
    Config {
        /// Object whose configuration is contradictory, if any.
        object: Option<ObjectId>,
        /// Description of the contradiction.
        message: String,
    },
    /// The backend could not allocate its buffers.
    #[error("buffer allocation failed: {0}")]
    Allocation(String),
    /// The GPU context is lost; the synchronizer must be restored first.
    #[error("GPU context lost")]
    ContextLost,
}

impl SyncError {
    /// Returns `true` if this error only reports a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Shorthand for a [`SyncError::Config`] error.
    #[must_use]
    pub fn config(object: Option<ObjectId>, message: impl Into<String>) -> Self {
        Self::Config {
            object,
            message: message.into(),
        }
    }
}
