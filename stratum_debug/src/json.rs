// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON-lines trace recording.
//!
//! [`JsonLinesSink`] writes one JSON object per event, one per line, so a
//! session can be replayed with `jq` or loaded into a notebook. Every object
//! carries `"event"`, and the synchronizer events carry `"kind"` and
//! `"pass"`.

use std::io::{self, Write};

use serde_json::{Value, json};
use stratum_core::items::ItemKey;
use stratum_core::trace::{
    ItemSkippedEvent, ResizeEvent, SyncBeginEvent, SyncEndEvent, SyncSink, UploadEvent,
    ViewerOpEvent,
};

use crate::lines::{op_name, outcome_name, reason_name, target_name};

/// Writes trace events as JSON lines.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> std::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<W: Write> JsonLinesSink<W> {
    /// Creates a sink writing to `writer`.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// Returns the destination, or the first write error.
    ///
    /// Events after a failed write are dropped.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write(&mut self, value: &Value) {
        if self.error.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut self.writer, value)
            .map_err(io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(err) = result {
            self.error = Some(err);
        }
    }
}

fn key_json(key: ItemKey) -> Value {
    json!({
        "layer": key.layer.0,
        "object": key.object.0,
        "config": key.config.0,
    })
}

impl<W: Write> SyncSink for JsonLinesSink<W> {
    fn on_sync_begin(&mut self, e: &SyncBeginEvent) {
        self.write(&json!({
            "event": "sync_begin",
            "kind": e.kind.name(),
            "pass": e.pass,
            "items": e.items,
        }));
    }

    fn on_item_skipped(&mut self, e: &ItemSkippedEvent) {
        self.write(&json!({
            "event": "item_skipped",
            "kind": e.kind.name(),
            "pass": e.pass,
            "key": key_json(e.key),
            "reason": reason_name(e.reason),
        }));
    }

    fn on_upload(&mut self, e: &UploadEvent) {
        self.write(&json!({
            "event": "upload",
            "kind": e.kind.name(),
            "pass": e.pass,
            "target": target_name(e.target),
            "first": e.first,
            "count": e.count,
            "bytes": e.bytes,
        }));
    }

    fn on_resize(&mut self, e: &ResizeEvent) {
        self.write(&json!({
            "event": "resize",
            "kind": e.kind.name(),
            "pass": e.pass,
            "elements": e.elements,
            "words": e.words,
        }));
    }

    fn on_sync_end(&mut self, e: &SyncEndEvent) {
        self.write(&json!({
            "event": "sync_end",
            "kind": e.kind.name(),
            "pass": e.pass,
            "outcome": outcome_name(e.outcome),
            "summary": {
                "items": e.summary.items,
                "skipped": e.summary.skipped,
                "uploads": e.summary.uploads,
                "bytes": e.summary.bytes,
            },
        }));
    }

    fn on_viewer_op(&mut self, e: &ViewerOpEvent) {
        self.write(&json!({
            "event": "viewer_op",
            "kind": "images",
            "pass": e.pass,
            "key": key_json(e.key),
            "op": op_name(e.op),
        }));
    }
}
