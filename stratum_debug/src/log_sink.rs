// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forwarding trace events to the `log` facade.

use log::Level;
use stratum_core::trace::{
    ItemSkippedEvent, ResizeEvent, SyncBeginEvent, SyncEndEvent, SyncOutcome, SyncSink,
    UploadEvent, ViewerOpEvent,
};

use crate::lines;

/// Default log target.
pub const TARGET: &str = "stratum::trace";

/// A [`SyncSink`] that turns events into `log` records.
///
/// Skipped items and failed passes log at `warn`; pass boundaries and
/// reallocations at `debug`; uploads and viewer mutations at `trace`.
#[derive(Clone, Debug)]
pub struct LogSink {
    target: &'static str,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    /// Creates a sink logging under [`TARGET`].
    #[must_use]
    pub const fn new() -> Self {
        Self { target: TARGET }
    }

    /// Creates a sink logging under a custom target.
    #[must_use]
    pub const fn with_target(target: &'static str) -> Self {
        Self { target }
    }

    fn emit(&self, level: Level, line: impl FnOnce() -> String) {
        if log::log_enabled!(target: self.target, level) {
            log::log!(target: self.target, level, "{}", line());
        }
    }
}

impl SyncSink for LogSink {
    fn on_sync_begin(&mut self, e: &SyncBeginEvent) {
        self.emit(Level::Debug, || lines::sync_begin(e));
    }

    fn on_item_skipped(&mut self, e: &ItemSkippedEvent) {
        self.emit(Level::Warn, || format!("skipped {}", lines::item_skipped(e)));
    }

    fn on_upload(&mut self, e: &UploadEvent) {
        self.emit(Level::Trace, || format!("upload {}", lines::upload(e)));
    }

    fn on_resize(&mut self, e: &ResizeEvent) {
        self.emit(Level::Debug, || format!("resize {}", lines::resize(e)));
    }

    fn on_sync_end(&mut self, e: &SyncEndEvent) {
        let level = match e.outcome {
            SyncOutcome::Failed => Level::Warn,
            SyncOutcome::Applied | SyncOutcome::Cancelled => Level::Debug,
        };
        self.emit(level, || lines::sync_end(e));
    }

    fn on_viewer_op(&mut self, e: &ViewerOpEvent) {
        self.emit(Level::Trace, || lines::viewer_op(e));
    }
}
