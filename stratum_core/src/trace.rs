// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for synchronize passes.
//!
//! This module provides a [`SyncSink`] trait with per-event methods that the
//! synchronizers and the reconciler call as a pass progresses. All method
//! bodies default to no-ops, so implementing only the events you care about
//! is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn SyncSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! Text diagnostics (warnings about missing group mappings, load failures)
//! go through the `log` facade instead and are always on.

use crate::backend::PointAttribute;
use crate::items::ItemKey;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which synchronizer emitted an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncKind {
    /// The point buffer synchronizer.
    Points,
    /// The shape buffer synchronizer.
    Shapes,
    /// The tiled-image reconciler.
    Images,
}

impl SyncKind {
    /// Lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Shapes => "shapes",
            Self::Images => "images",
        }
    }
}

/// Why an item was left out of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Its data failed to load.
    Load,
    /// One of its attributes failed to resolve.
    Resolve,
    /// The item table was full.
    Truncated,
}

/// Which buffer an upload wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UploadTarget {
    /// A per-point attribute buffer.
    Point(PointAttribute),
    /// The point transform table.
    Transforms,
    /// The shape scanline buffer.
    Scanlines,
    /// The packed shape color buffer.
    ShapeColors,
    /// The shape item table.
    ShapeItems,
}

/// How a pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncOutcome {
    /// Every change was applied.
    Applied,
    /// The pass was cancelled; nothing was applied.
    Cancelled,
    /// The pass failed; nothing was applied.
    Failed,
}

/// A mutation issued to the tiled viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewerOp {
    /// An item creation was requested.
    Add,
    /// An item was removed.
    Remove,
    /// A removal was deferred until the pending item loads.
    DeferRemove,
    /// An item was moved in the draw order.
    Reorder,
    /// An item's position, scale, or rotation was set.
    Place,
    /// An item's flip was set.
    Flip,
    /// An item's opacity was set.
    Opacity,
    /// The viewport was fitted to an item.
    Fit,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Totals of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Items applied.
    pub items: usize,
    /// Items skipped because of load or resolution failures or truncation.
    pub skipped: usize,
    /// Upload calls issued to the backend, or mutations issued to the
    /// viewer.
    pub uploads: usize,
    /// Bytes uploaded.
    pub bytes: usize,
}

/// Emitted when a pass starts.
#[derive(Clone, Copy, Debug)]
pub struct SyncBeginEvent {
    /// Emitting synchronizer.
    pub kind: SyncKind,
    /// Pass counter of that synchronizer.
    pub pass: u64,
    /// Items enumerated from the scene.
    pub items: usize,
}

/// Emitted when an item is left out of a pass.
#[derive(Clone, Copy, Debug)]
pub struct ItemSkippedEvent {
    /// Emitting synchronizer.
    pub kind: SyncKind,
    /// Pass counter.
    pub pass: u64,
    /// Skipped item.
    pub key: ItemKey,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Emitted for every backend upload.
#[derive(Clone, Copy, Debug)]
pub struct UploadEvent {
    /// Emitting synchronizer.
    pub kind: SyncKind,
    /// Pass counter.
    pub pass: u64,
    /// Written buffer.
    pub target: UploadTarget,
    /// First element written.
    pub first: usize,
    /// Elements written.
    pub count: usize,
    /// Bytes written.
    pub bytes: usize,
}

/// Emitted when backend buffers are reallocated.
#[derive(Clone, Copy, Debug)]
pub struct ResizeEvent {
    /// Emitting synchronizer.
    pub kind: SyncKind,
    /// Pass counter.
    pub pass: u64,
    /// New element count (points or shapes).
    pub elements: usize,
    /// New scanline word count; zero for points.
    pub words: usize,
}

/// Emitted when a pass ends, whatever the outcome.
#[derive(Clone, Copy, Debug)]
pub struct SyncEndEvent {
    /// Emitting synchronizer.
    pub kind: SyncKind,
    /// Pass counter.
    pub pass: u64,
    /// How the pass ended.
    pub outcome: SyncOutcome,
    /// Totals; all zero unless `outcome` is `Applied`.
    pub summary: SyncSummary,
}

/// Emitted for every mutation issued to the tiled viewer.
#[derive(Clone, Copy, Debug)]
pub struct ViewerOpEvent {
    /// Pass counter of the reconciler; zero for load callbacks.
    pub pass: u64,
    /// Affected item.
    pub key: ItemKey,
    /// The mutation.
    pub op: ViewerOp,
}

// ---------------------------------------------------------------------------
// SyncSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from synchronize passes.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait SyncSink {
    /// Called when a pass starts.
    fn on_sync_begin(&mut self, e: &SyncBeginEvent) {
        _ = e;
    }

    /// Called when an item is skipped.
    fn on_item_skipped(&mut self, e: &ItemSkippedEvent) {
        _ = e;
    }

    /// Called after every backend upload.
    fn on_upload(&mut self, e: &UploadEvent) {
        _ = e;
    }

    /// Called after backend buffers are reallocated.
    fn on_resize(&mut self, e: &ResizeEvent) {
        _ = e;
    }

    /// Called when a pass ends.
    fn on_sync_end(&mut self, e: &SyncEndEvent) {
        _ = e;
    }

    /// Called after every tiled-viewer mutation.
    fn on_viewer_op(&mut self, e: &ViewerOpEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`SyncSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl SyncSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`SyncSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn SyncSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn SyncSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn SyncSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer over a synchronizer's installed sink, if any.
    #[inline]
    #[must_use]
    pub fn installed(sink: &'a mut Option<Box<dyn SyncSink>>) -> Self {
        match sink {
            Some(sink) => Self::new(&mut **sink),
            None => Self::none(),
        }
    }

    /// Emits a [`SyncBeginEvent`].
    #[inline]
    pub fn sync_begin(&mut self, e: &SyncBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_sync_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`ItemSkippedEvent`].
    #[inline]
    pub fn item_skipped(&mut self, e: &ItemSkippedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_item_skipped(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`UploadEvent`].
    #[inline]
    pub fn upload(&mut self, e: &UploadEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_upload(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ResizeEvent`].
    #[inline]
    pub fn resize(&mut self, e: &ResizeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_resize(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SyncEndEvent`].
    #[inline]
    pub fn sync_end(&mut self, e: &SyncEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_sync_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ViewerOpEvent`].
    #[inline]
    pub fn viewer_op(&mut self, e: &ViewerOpEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_viewer_op(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

#[cfg(all(test, feature = "trace"))]
mod tests {
    use super::*;
    use crate::model::{LayerConfigId, LayerId, ObjectId};

    #[derive(Default)]
    struct Counter {
        uploads: usize,
        ends: usize,
    }

    impl SyncSink for Counter {
        fn on_upload(&mut self, _: &UploadEvent) {
            self.uploads += 1;
        }

        fn on_sync_end(&mut self, _: &SyncEndEvent) {
            self.ends += 1;
        }
    }

    #[test]
    fn tracer_dispatches_to_installed_sink() {
        let mut installed: Option<Box<dyn SyncSink>> = None;
        Tracer::installed(&mut installed).upload(&UploadEvent {
            kind: SyncKind::Points,
            pass: 0,
            target: UploadTarget::Transforms,
            first: 0,
            count: 1,
            bytes: 64,
        });

        let mut counter = Counter::default();
        let mut tracer = Tracer::new(&mut counter);
        tracer.upload(&UploadEvent {
            kind: SyncKind::Points,
            pass: 1,
            target: UploadTarget::Point(PointAttribute::Color),
            first: 0,
            count: 3,
            bytes: 12,
        });
        tracer.item_skipped(&ItemSkippedEvent {
            kind: SyncKind::Points,
            pass: 1,
            key: ItemKey {
                layer: LayerId(0),
                object: ObjectId(0),
                config: LayerConfigId(0),
            },
            reason: SkipReason::Load,
        });
        tracer.sync_end(&SyncEndEvent {
            kind: SyncKind::Points,
            pass: 1,
            outcome: SyncOutcome::Applied,
            summary: SyncSummary::default(),
        });
        assert_eq!(counter.uploads, 1);
        assert_eq!(counter.ends, 1);
    }
}
