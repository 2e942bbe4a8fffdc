// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-line renderings of trace events, shared by the text sinks.

use std::fmt::Write as _;

use stratum_core::trace::{
    ItemSkippedEvent, ResizeEvent, SkipReason, SyncBeginEvent, SyncEndEvent, SyncOutcome,
    SyncSummary, UploadEvent, UploadTarget, ViewerOp, ViewerOpEvent,
};

pub(crate) fn target_name(target: UploadTarget) -> &'static str {
    match target {
        UploadTarget::Point(attribute) => attribute.name(),
        UploadTarget::Transforms => "transforms",
        UploadTarget::Scanlines => "scanlines",
        UploadTarget::ShapeColors => "shape_colors",
        UploadTarget::ShapeItems => "shape_items",
    }
}

pub(crate) fn reason_name(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::Load => "load",
        SkipReason::Resolve => "resolve",
        SkipReason::Truncated => "truncated",
    }
}

pub(crate) fn outcome_name(outcome: SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Applied => "applied",
        SyncOutcome::Cancelled => "cancelled",
        SyncOutcome::Failed => "failed",
    }
}

pub(crate) fn op_name(op: ViewerOp) -> &'static str {
    match op {
        ViewerOp::Add => "add",
        ViewerOp::Remove => "remove",
        ViewerOp::DeferRemove => "defer_remove",
        ViewerOp::Reorder => "reorder",
        ViewerOp::Place => "place",
        ViewerOp::Flip => "flip",
        ViewerOp::Opacity => "opacity",
        ViewerOp::Fit => "fit",
    }
}

pub(crate) fn sync_begin(e: &SyncBeginEvent) -> String {
    format!("{} pass={} items={}", e.kind.name(), e.pass, e.items)
}

pub(crate) fn item_skipped(e: &ItemSkippedEvent) -> String {
    format!(
        "{} pass={} {} reason={}",
        e.kind.name(),
        e.pass,
        e.key,
        reason_name(e.reason)
    )
}

pub(crate) fn upload(e: &UploadEvent) -> String {
    format!(
        "{} pass={} {}[{}..{}] bytes={}",
        e.kind.name(),
        e.pass,
        target_name(e.target),
        e.first,
        e.first + e.count,
        e.bytes,
    )
}

pub(crate) fn resize(e: &ResizeEvent) -> String {
    let mut line = format!("{} pass={} elements={}", e.kind.name(), e.pass, e.elements);
    if e.words > 0 {
        let _ = write!(line, " words={}", e.words);
    }
    line
}

pub(crate) fn sync_end(e: &SyncEndEvent) -> String {
    let SyncSummary {
        items,
        skipped,
        uploads,
        bytes,
    } = e.summary;
    format!(
        "{} pass={} {} items={items} skipped={skipped} uploads={uploads} bytes={bytes}",
        e.kind.name(),
        e.pass,
        outcome_name(e.outcome),
    )
}

pub(crate) fn viewer_op(e: &ViewerOpEvent) -> String {
    format!("images pass={} {} op={}", e.pass, e.key, op_name(e.op))
}
