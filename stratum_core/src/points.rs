// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The point buffer synchronizer.
//!
//! Every point-cloud item of a scene is packed into one set of shared vertex
//! buffers, one per [`PointAttribute`]. A pass runs in two phases:
//!
//! 1. **Plan** (async, `&self`). Items are enumerated, their data loaded
//!    through the [`DataStore`], and each item's slice compared against the
//!    slice it had last pass. Unchanged fields are skipped; changed fields are
//!    resolved into temporary vectors. Nothing the synchronizer or the
//!    backend owns is touched, so a cancelled plan leaves no trace.
//! 2. **Apply** (sync, `&mut self`). The plan is written into the CPU
//!    mirrors and uploaded range by range, then the slice list is swapped in.
//!
//! A slice is rewritten in full when the buffers were reallocated, when it is
//! new, or when its identity, length, offset, or data generation changed.
//! Otherwise only the fields whose [`FieldSnapshot`] changed are resolved
//! and uploaded. Item-level state (transform, opacity, layer point-size
//! multiplier) lives in the transform table and never touches per-point
//! buffers.

use core::ops::Range;

use half::f16;

use crate::attribute::{
    ColorAttribute, FieldSnapshot, MarkerAttribute, MissLog, OpacityAttribute, ResolveContext,
    SizeAttribute, VisibilityAttribute, opacity_byte, resolve_vec, size_half,
};
use crate::backend::{PointAttribute, PointBackend};
use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::data::{DataStore, Loaded};
use crate::error::{LoadError, ResolveError, SyncError};
use crate::items::{ItemKey, RenderItem, render_items};
use crate::model::{Color, Marker, ObjectKind, PointsStyle, Scene};
use crate::slice::{Slice, is_partition, pack};
use crate::table::{LoaderFactory, PointsData, Positions};
use crate::trace::{
    ItemSkippedEvent, ResizeEvent, SkipReason, SyncBeginEvent, SyncEndEvent, SyncKind, SyncOutcome,
    SyncSink, SyncSummary, Tracer, UploadEvent, UploadTarget,
};
use crate::transform::TransformEntry;
use crate::viewport::Viewport;

/// Inputs last resolved into a point slice.
#[derive(Clone, Debug, PartialEq)]
pub struct PointSnapshot {
    size: FieldSnapshot<f32>,
    color: FieldSnapshot<Color>,
    visibility: FieldSnapshot<bool>,
    opacity: FieldSnapshot<f32>,
    marker: FieldSnapshot<Marker>,
}

impl PointSnapshot {
    async fn capture<F: LoaderFactory>(
        style: &PointsStyle,
        ctx: &ResolveContext<'_, F>,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            size: FieldSnapshot::capture(&style.size, ctx).await?,
            color: FieldSnapshot::capture(&style.color, ctx).await?,
            visibility: FieldSnapshot::capture(&style.visibility, ctx).await?,
            opacity: FieldSnapshot::capture(&style.opacity, ctx).await?,
            marker: FieldSnapshot::capture(&style.marker, ctx).await?,
        })
    }
}

/// CPU copies of the vertex buffers.
///
/// `rgb`, `visible`, and `opacity` are never uploaded; they are kept so that
/// a change to one of them can repack `color` without resolving the others.
#[derive(Debug, Default)]
struct Mirror {
    x: Vec<f32>,
    y: Vec<f32>,
    size: Vec<f16>,
    rgb: Vec<Color>,
    visible: Vec<bool>,
    opacity: Vec<u8>,
    color: Vec<u32>,
    marker: Vec<u8>,
    transform_index: Vec<u8>,
}

impl Mirror {
    fn resize(&mut self, points: usize) {
        self.x.resize(points, 0.0);
        self.y.resize(points, 0.0);
        self.size.resize(points, f16::ZERO);
        self.rgb.resize(points, Color::default());
        self.visible.resize(points, false);
        self.opacity.resize(points, 0);
        self.color.resize(points, 0);
        self.marker.resize(points, 0);
        self.transform_index.resize(points, 0);
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn bytes(&self, attribute: PointAttribute) -> &[u8] {
        match attribute {
            PointAttribute::X => bytemuck::cast_slice(&self.x),
            PointAttribute::Y => bytemuck::cast_slice(&self.y),
            PointAttribute::Size => bytemuck::cast_slice(&self.size),
            PointAttribute::Color => bytemuck::cast_slice(&self.color),
            PointAttribute::Marker => &self.marker,
            PointAttribute::TransformIndex => &self.transform_index,
        }
    }
}

/// Fields of one slice that must be written this pass.
#[derive(Debug, Default)]
struct Writes {
    positions: Option<Positions>,
    size: Option<Vec<f16>>,
    rgb: Option<Vec<Color>>,
    visible: Option<Vec<bool>>,
    opacity: Option<Vec<u8>>,
    marker: Option<Vec<u8>>,
    transform_index: bool,
}

#[derive(Debug)]
struct PlannedSlice {
    slice: Slice<PointSnapshot>,
    writes: Writes,
}

/// Everything a pass will apply, computed without side effects.
#[derive(Debug)]
struct Plan {
    slices: Vec<PlannedSlice>,
    total: usize,
    transforms: Vec<TransformEntry>,
    skipped: Vec<(ItemKey, SkipReason)>,
}

struct Candidate<'s, P> {
    item: RenderItem<'s>,
    style: &'s PointsStyle,
    data: Loaded<P>,
}

/// Keeps shared point buffers in sync with the point-cloud items of a scene.
pub struct PointSynchronizer<B: PointBackend> {
    backend: B,
    config: SyncConfig,
    slices: Vec<Slice<PointSnapshot>>,
    total: usize,
    mirror: Mirror,
    transforms: Vec<TransformEntry>,
    misses: MissLog,
    sink: Option<Box<dyn SyncSink>>,
    suspended: bool,
    passes: u64,
}

impl<B: PointBackend + core::fmt::Debug> core::fmt::Debug for PointSynchronizer<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PointSynchronizer")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .field("slices", &self.slices.len())
            .field("total", &self.total)
            .field("suspended", &self.suspended)
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

impl<B: PointBackend> PointSynchronizer<B> {
    /// Creates a synchronizer drawing through `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if `config` is out of range.
    pub fn new(backend: B, config: SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            backend,
            config,
            slices: Vec::new(),
            total: 0,
            mirror: Mirror::default(),
            transforms: Vec::new(),
            misses: MissLog::new(),
            sink: None,
            suspended: false,
            passes: 0,
        })
    }

    /// Installs a trace sink, returning the previous one.
    pub fn set_sink(&mut self, sink: Option<Box<dyn SyncSink>>) -> Option<Box<dyn SyncSink>> {
        core::mem::replace(&mut self.sink, sink)
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Resident points.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Slices applied by the last successful pass, in buffer order.
    #[must_use]
    pub fn slices(&self) -> &[Slice<PointSnapshot>] {
        &self.slices
    }

    /// Is drawing suspended after a context loss?
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Brings the buffers in line with `scene`.
    ///
    /// Per-item load and resolution failures are logged and the item left
    /// out; they do not fail the pass.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Cancelled`] if `cancel` fired; nothing was applied.
    /// - [`SyncError::ContextLost`] while suspended.
    /// - [`SyncError::Allocation`] if the backend could not grow its
    ///   buffers; nothing was applied.
    pub async fn synchronize<F: LoaderFactory>(
        &mut self,
        scene: &Scene,
        store: &DataStore<F>,
        cancel: &CancelToken,
    ) -> Result<SyncSummary, SyncError> {
        if !self.suspended && self.backend.is_lost() {
            self.context_lost();
        }
        if self.suspended {
            return Err(SyncError::ContextLost);
        }
        self.passes += 1;
        let pass = self.passes;
        Tracer::installed(&mut self.sink).sync_begin(&SyncBeginEvent {
            kind: SyncKind::Points,
            pass,
            items: point_items(scene).count(),
        });

        let planned = self.plan(scene, store, cancel).await;
        let result = planned.and_then(|plan| {
            cancel.check()?;
            self.apply(plan, pass)
        });

        let (outcome, summary) = match &result {
            Ok(summary) => (SyncOutcome::Applied, *summary),
            Err(SyncError::Cancelled) => {
                log::debug!("points pass {pass} cancelled");
                (SyncOutcome::Cancelled, SyncSummary::default())
            }
            Err(err) => {
                log::debug!("points pass {pass} failed: {err}");
                (SyncOutcome::Failed, SyncSummary::default())
            }
        };
        Tracer::installed(&mut self.sink).sync_end(&SyncEndEvent {
            kind: SyncKind::Points,
            pass,
            outcome,
            summary,
        });
        result
    }

    async fn plan<'s, F: LoaderFactory>(
        &self,
        scene: &'s Scene,
        store: &DataStore<F>,
        cancel: &CancelToken,
    ) -> Result<Plan, SyncError> {
        let mut skipped = Vec::new();
        let mut items: Vec<(RenderItem<'s>, &'s PointsStyle)> = point_items(scene).collect();
        if items.len() > self.config.max_items {
            log::warn!(
                "{} point items exceed the transform table of {}; dropping the tail",
                items.len(),
                self.config.max_items
            );
            for (item, _) in items.drain(self.config.max_items..) {
                skipped.push((item.key(), SkipReason::Truncated));
            }
        }

        let mut candidates = Vec::with_capacity(items.len());
        for (item, style) in items {
            let loaded = store.points(&item.object.source, &scene.tables, cancel).await;
            cancel.check()?;
            match loaded {
                Ok(data) => candidates.push(Candidate { item, style, data }),
                Err(LoadError::Cancelled) => return Err(SyncError::Cancelled),
                Err(err) => {
                    log::error!("skipping points {}: {err}", item.key());
                    skipped.push((item.key(), SkipReason::Load));
                }
            }
        }

        let ctx = ResolveContext {
            store,
            tables: &scene.tables,
            maps: &scene.property_maps,
            misses: &self.misses,
            cancel,
        };
        loop {
            let (offsets, total) = pack(candidates.iter().map(|c| c.data.data.len()));
            let resized = total != self.total;
            let mut slices = Vec::with_capacity(candidates.len());
            let mut failed = None;
            for (index, candidate) in candidates.iter().enumerate() {
                match self
                    .plan_slice(index, offsets[index], resized, candidate, &ctx)
                    .await
                {
                    Ok(slice) => slices.push(slice),
                    Err(ResolveError::Load(LoadError::Cancelled)) => {
                        return Err(SyncError::Cancelled);
                    }
                    Err(err) => {
                        failed = Some((index, err));
                        break;
                    }
                }
                cancel.check()?;
            }
            if let Some((index, err)) = failed {
                // Offsets of every later item depend on this one; plan again
                // without it.
                let candidate = candidates.remove(index);
                log::error!("skipping points {}: {err}", candidate.item.key());
                skipped.push((candidate.item.key(), SkipReason::Resolve));
                continue;
            }
            let transforms = candidates
                .iter()
                .map(|c| {
                    TransformEntry::new(
                        c.item.object_to_world(),
                        c.item.opacity(),
                        c.item.layer.point_size,
                    )
                })
                .collect();
            return Ok(Plan {
                slices,
                total,
                transforms,
                skipped,
            });
        }
    }

    async fn plan_slice<F: LoaderFactory>(
        &self,
        index: usize,
        offset: usize,
        resized: bool,
        candidate: &Candidate<'_, F::Points>,
        ctx: &ResolveContext<'_, F>,
    ) -> Result<PlannedSlice, ResolveError> {
        let style = candidate.style;
        let len = candidate.data.data.len();
        let slice = Slice {
            key: candidate.item.key(),
            data: candidate.data.id,
            index,
            offset,
            len,
            snapshot: PointSnapshot::capture(style, ctx).await?,
        };
        let previous = self
            .slices
            .get(index)
            .filter(|previous| !resized && previous.same_place(&slice))
            .map(|previous| &previous.snapshot);
        let stale = |same: fn(&PointSnapshot, &PointSnapshot) -> bool| {
            previous.is_none_or(|previous| !same(previous, &slice.snapshot))
        };

        let mut writes = Writes::default();
        if previous.is_none() {
            let positions = candidate.data.data.load_positions(ctx.cancel).await?;
            if positions.x.len() != len || positions.y.len() != len {
                return Err(LoadError::Format(format!(
                    "{} positions for {len} points",
                    positions.x.len().min(positions.y.len())
                ))
                .into());
            }
            writes.positions = Some(positions);
            writes.transform_index = true;
        }
        if stale(|a, b| a.size == b.size) {
            writes.size = Some(
                resolve_vec::<SizeAttribute, _, _>(&style.size, len, ctx, |&s| size_half(s)).await?,
            );
        }
        if stale(|a, b| a.color == b.color) {
            writes.rgb =
                Some(resolve_vec::<ColorAttribute, _, _>(&style.color, len, ctx, |&c| c).await?);
        }
        if stale(|a, b| a.visibility == b.visibility) {
            writes.visible = Some(
                resolve_vec::<VisibilityAttribute, _, _>(&style.visibility, len, ctx, |&v| v).await?,
            );
        }
        if stale(|a, b| a.opacity == b.opacity) {
            writes.opacity = Some(
                resolve_vec::<OpacityAttribute, _, _>(&style.opacity, len, ctx, |&o| opacity_byte(o))
                    .await?,
            );
        }
        if stale(|a, b| a.marker == b.marker) {
            writes.marker = Some(
                resolve_vec::<MarkerAttribute, _, _>(&style.marker, len, ctx, |m| m.index())
                    .await?,
            );
        }
        Ok(PlannedSlice { slice, writes })
    }

    fn apply(&mut self, plan: Plan, pass: u64) -> Result<SyncSummary, SyncError> {
        let resized = plan.total != self.total;
        if resized {
            self.backend.resize(plan.total)?;
            self.mirror.resize(plan.total);
            log::debug!("point buffers reallocated for {} points", plan.total);
        }

        let Self {
            backend,
            mirror,
            sink,
            slices: applied,
            total,
            transforms,
            ..
        } = self;
        let mut tracer = Tracer::installed(sink);
        let mut summary = SyncSummary {
            items: plan.slices.len(),
            skipped: plan.skipped.len(),
            ..SyncSummary::default()
        };
        if resized {
            tracer.resize(&ResizeEvent {
                kind: SyncKind::Points,
                pass,
                elements: plan.total,
                words: 0,
            });
        }
        for &(key, reason) in &plan.skipped {
            tracer.item_skipped(&ItemSkippedEvent {
                kind: SyncKind::Points,
                pass,
                key,
                reason,
            });
        }

        let mut upload = |mirror: &Mirror, attribute: PointAttribute, range: Range<usize>| {
            if range.is_empty() {
                return;
            }
            let bytes = range.len() * attribute.element_size();
            tracer.upload(&UploadEvent {
                kind: SyncKind::Points,
                pass,
                target: UploadTarget::Point(attribute),
                first: range.start,
                count: range.len(),
                bytes,
            });
            backend.upload(attribute, range, mirror.bytes(attribute));
            summary.uploads += 1;
            summary.bytes += bytes;
        };

        let mut slices = Vec::with_capacity(plan.slices.len());
        for PlannedSlice { slice, writes } in plan.slices {
            let range = slice.range();
            if let Some(positions) = writes.positions {
                mirror.x[range.clone()].copy_from_slice(&positions.x);
                mirror.y[range.clone()].copy_from_slice(&positions.y);
                upload(mirror, PointAttribute::X, range.clone());
                upload(mirror, PointAttribute::Y, range.clone());
            }
            if let Some(size) = writes.size {
                mirror.size[range.clone()].copy_from_slice(&size);
                upload(mirror, PointAttribute::Size, range.clone());
            }
            let repack =
                writes.rgb.is_some() || writes.visible.is_some() || writes.opacity.is_some();
            if let Some(rgb) = writes.rgb {
                mirror.rgb[range.clone()].copy_from_slice(&rgb);
            }
            if let Some(visible) = writes.visible {
                mirror.visible[range.clone()].copy_from_slice(&visible);
            }
            if let Some(opacity) = writes.opacity {
                mirror.opacity[range.clone()].copy_from_slice(&opacity);
            }
            if repack {
                for i in range.clone() {
                    let alpha = if mirror.visible[i] { mirror.opacity[i] } else { 0 };
                    mirror.color[i] = mirror.rgb[i].pack(alpha);
                }
                upload(mirror, PointAttribute::Color, range.clone());
            }
            if let Some(marker) = writes.marker {
                mirror.marker[range.clone()].copy_from_slice(&marker);
                upload(mirror, PointAttribute::Marker, range.clone());
            }
            if writes.transform_index {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "slots are bounded by MAX_ITEMS, which fits in a byte"
                )]
                let slot = slice.index as u8;
                mirror.transform_index[range.clone()].fill(slot);
                upload(mirror, PointAttribute::TransformIndex, range);
            }
            slices.push(slice);
        }

        if plan.transforms != *transforms {
            let bytes = plan.transforms.len() * TransformEntry::SIZE;
            tracer.upload(&UploadEvent {
                kind: SyncKind::Points,
                pass,
                target: UploadTarget::Transforms,
                first: 0,
                count: plan.transforms.len(),
                bytes,
            });
            backend.upload_transforms(&plan.transforms);
            summary.uploads += 1;
            summary.bytes += bytes;
        }

        debug_assert!(
            is_partition(&slices, plan.total),
            "slices do not partition the buffers"
        );
        *applied = slices;
        *total = plan.total;
        *transforms = plan.transforms;
        Ok(summary)
    }

    /// Records a draw of every resident point. Does nothing while suspended,
    /// once the backend reports a lost device, or when no point is resident.
    pub fn draw(&self, target: &mut B::DrawTarget<'_>, viewport: &Viewport) {
        if self.suspended || self.backend.is_lost() || self.total == 0 {
            return;
        }
        self.backend.draw(target, viewport);
    }

    /// Suspends drawing and synchronizing after the GPU context was lost.
    pub fn context_lost(&mut self) {
        if !self.suspended {
            log::warn!("GPU context lost; point drawing suspended");
        }
        self.suspended = true;
    }

    /// Resumes with a backend built on the restored context.
    ///
    /// All bookkeeping is reset, so the next pass uploads everything.
    pub fn context_restored(&mut self, backend: B) {
        self.backend = backend;
        self.slices.clear();
        self.total = 0;
        self.mirror.clear();
        self.transforms.clear();
        self.misses.clear();
        self.suspended = false;
        log::debug!("point synchronizer rebuilt after context restore");
    }
}

fn point_items(scene: &Scene) -> impl Iterator<Item = (RenderItem<'_>, &PointsStyle)> {
    render_items(scene).filter_map(|item| match &item.object.kind {
        ObjectKind::Points(style) => Some((item, style)),
        _ => None,
    })
}
