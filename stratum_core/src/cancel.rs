// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative cancellation for synchronize passes.
//!
//! One [`CancelToken`] is created per `synchronize` invocation. The caller
//! keeps a clone and calls [`cancel`](CancelToken::cancel) before starting the
//! next pass or when tearing down. The pass checks the token after every
//! await point and unwinds with [`SyncError::Cancelled`] without applying
//! any GPU or viewer mutation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{LoadError, SyncError};

/// A cloneable cancellation flag shared between a pass and its owner.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Returns `Err(SyncError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), SyncError> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Loader-side variant of [`check`](Self::check).
    pub fn check_load(&self) -> Result<(), LoadError> {
        if self.is_cancelled() {
            Err(LoadError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let held = token.clone();
        assert!(token.check().is_ok());
        held.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(SyncError::Cancelled));
        assert_eq!(token.check_load(), Err(LoadError::Cancelled));
    }
}
