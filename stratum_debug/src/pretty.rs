// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`SyncSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use stratum_core::trace::{
    ItemSkippedEvent, ResizeEvent, SyncBeginEvent, SyncEndEvent, SyncSink, UploadEvent,
    ViewerOpEvent,
};

use crate::lines;

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SyncSink for PrettyPrintSink<W> {
    fn on_sync_begin(&mut self, e: &SyncBeginEvent) {
        let _ = writeln!(self.writer, "[begin] {}", lines::sync_begin(e));
    }

    fn on_item_skipped(&mut self, e: &ItemSkippedEvent) {
        let _ = writeln!(self.writer, "[skip] {}", lines::item_skipped(e));
    }

    fn on_upload(&mut self, e: &UploadEvent) {
        let _ = writeln!(self.writer, "[upload] {}", lines::upload(e));
    }

    fn on_resize(&mut self, e: &ResizeEvent) {
        let _ = writeln!(self.writer, "[resize] {}", lines::resize(e));
    }

    fn on_sync_end(&mut self, e: &SyncEndEvent) {
        let _ = writeln!(self.writer, "[end] {}", lines::sync_end(e));
    }

    fn on_viewer_op(&mut self, e: &ViewerOpEvent) {
        let _ = writeln!(self.writer, "[viewer] {}", lines::viewer_op(e));
    }
}
