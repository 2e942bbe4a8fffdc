// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shape buffer synchronizer.
//!
//! Shape items share two buffers: a scanline buffer holding every item's
//! [`ScanlineBuffer`] back to back (addressed in 32-bit words), and a packed
//! color buffer with one entry per shape. A per-item [`ShapeItemEntry`] table
//! tells the shader where each item's words and colors start.
//!
//! The pass follows the point synchronizer: an async, side-effect-free plan
//! followed by a synchronous apply. Geometry is only encoded when an item's
//! data is new or was reloaded; an item that merely moved within the buffer
//! is copied from the CPU mirror and re-uploaded.

use core::ops::Range;

use kurbo::Rect;

use crate::attribute::{
    ColorAttribute, FieldSnapshot, MissLog, OpacityAttribute, ResolveContext,
    VisibilityAttribute, opacity_byte, resolve_vec,
};
use crate::backend::{ShapeBackend, ShapeItemEntry};
use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::data::{DataStore, Loaded};
use crate::error::{LoadError, ResolveError, SyncError};
use crate::items::{ItemKey, RenderItem, render_items};
use crate::model::{Color, ObjectKind, Scene, ShapesStyle};
use crate::scanline::ScanlineBuffer;
use crate::slice::{Slice, is_partition, pack};
use crate::table::{LoaderFactory, ShapesData};
use crate::trace::{
    ItemSkippedEvent, ResizeEvent, SkipReason, SyncBeginEvent, SyncEndEvent, SyncKind, SyncOutcome,
    SyncSink, SyncSummary, Tracer, UploadEvent, UploadTarget,
};
use crate::transform::TransformEntry;
use crate::viewport::Viewport;

/// Inputs last resolved into a shape slice, and where its geometry lives.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeSnapshot {
    words: Range<usize>,
    color: FieldSnapshot<Color>,
    visibility: FieldSnapshot<bool>,
    opacity: FieldSnapshot<f32>,
}

impl ShapeSnapshot {
    /// Word range of the item's scanline buffer.
    #[must_use]
    pub fn words(&self) -> Range<usize> {
        self.words.clone()
    }
}

#[derive(Debug, Default)]
struct Mirror {
    words: Vec<u32>,
    rgb: Vec<Color>,
    visible: Vec<bool>,
    opacity: Vec<u8>,
    color: Vec<u32>,
}

impl Mirror {
    fn resize_shapes(&mut self, shapes: usize) {
        self.rgb.resize(shapes, Color::default());
        self.visible.resize(shapes, false);
        self.opacity.resize(shapes, 0);
        self.color.resize(shapes, 0);
    }
}

/// Where an item's encoded geometry comes from.
#[derive(Debug)]
enum Geometry {
    /// Freshly encoded words.
    Encoded(Vec<u32>),
    /// Words already in the mirror at this range.
    Resident(Range<usize>),
}

impl Geometry {
    fn len(&self) -> usize {
        match self {
            Self::Encoded(words) => words.len(),
            Self::Resident(range) => range.len(),
        }
    }
}

#[derive(Debug, Default)]
struct Writes {
    geometry: bool,
    rgb: Option<Vec<Color>>,
    visible: Option<Vec<bool>>,
    opacity: Option<Vec<u8>>,
}

#[derive(Debug)]
struct PlannedSlice {
    slice: Slice<ShapeSnapshot>,
    geometry: Geometry,
    writes: Writes,
}

#[derive(Debug)]
struct Plan {
    slices: Vec<PlannedSlice>,
    shapes: usize,
    words: usize,
    items: Vec<ShapeItemEntry>,
    skipped: Vec<(ItemKey, SkipReason)>,
}

struct Candidate<'s, S> {
    item: RenderItem<'s>,
    style: &'s ShapesStyle,
    data: Loaded<S>,
    bounds: Rect,
    geometry: Geometry,
}

/// Keeps shared shape buffers in sync with the shape items of a scene.
pub struct ShapeSynchronizer<B: ShapeBackend> {
    backend: B,
    config: SyncConfig,
    slices: Vec<Slice<ShapeSnapshot>>,
    shapes: usize,
    words: usize,
    mirror: Mirror,
    items: Vec<ShapeItemEntry>,
    misses: MissLog,
    sink: Option<Box<dyn SyncSink>>,
    suspended: bool,
    passes: u64,
}

impl<B: ShapeBackend + core::fmt::Debug> core::fmt::Debug for ShapeSynchronizer<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShapeSynchronizer")
            .field("backend", &self.backend)
            .field("config", &self.config)
            .field("slices", &self.slices.len())
            .field("shapes", &self.shapes)
            .field("words", &self.words)
            .field("suspended", &self.suspended)
            .finish_non_exhaustive()
    }
}

impl<B: ShapeBackend> ShapeSynchronizer<B> {
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
            shapes: 0,
            words: 0,
            mirror: Mirror::default(),
            items: Vec::new(),
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

    /// Resident shapes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.shapes
    }

    /// Resident scanline words.
    #[must_use]
    pub fn words(&self) -> usize {
        self.words
    }

    /// Slices applied by the last successful pass, in buffer order.
    #[must_use]
    pub fn slices(&self) -> &[Slice<ShapeSnapshot>] {
        &self.slices
    }

    /// Is drawing suspended after a context loss?
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Brings the buffers in line with `scene`.
    ///
    /// # Errors
    ///
    /// Same as [`PointSynchronizer::synchronize`](crate::points::PointSynchronizer::synchronize).
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
            kind: SyncKind::Shapes,
            pass,
            items: shape_items(scene).count(),
        });

        let planned = self.plan(scene, store, cancel).await;
        let result = planned.and_then(|plan| {
            cancel.check()?;
            self.apply(plan, pass)
        });

        let (outcome, summary) = match &result {
            Ok(summary) => (SyncOutcome::Applied, *summary),
            Err(SyncError::Cancelled) => {
                log::debug!("shapes pass {pass} cancelled");
                (SyncOutcome::Cancelled, SyncSummary::default())
            }
            Err(err) => {
                log::debug!("shapes pass {pass} failed: {err}");
                (SyncOutcome::Failed, SyncSummary::default())
            }
        };
        Tracer::installed(&mut self.sink).sync_end(&SyncEndEvent {
            kind: SyncKind::Shapes,
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
        let mut items: Vec<(RenderItem<'s>, &'s ShapesStyle)> = shape_items(scene).collect();
        if items.len() > self.config.max_items {
            log::warn!(
                "{} shape items exceed the item table of {}; dropping the tail",
                items.len(),
                self.config.max_items
            );
            for (item, _) in items.drain(self.config.max_items..) {
                skipped.push((item.key(), SkipReason::Truncated));
            }
        }

        let mut candidates = Vec::with_capacity(items.len());
        for (item, style) in items {
            let result = self.load(item, style, store, cancel).await;
            cancel.check()?;
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(LoadError::Cancelled) => return Err(SyncError::Cancelled),
                Err(err) => {
                    log::error!("skipping shapes {}: {err}", item.key());
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
            let (offsets, shapes) = pack(candidates.iter().map(|c| c.data.data.len()));
            let (word_offsets, words) = pack(candidates.iter().map(|c| c.geometry.len()));
            let resized = shapes != self.shapes || words != self.words;
            let mut slices = Vec::with_capacity(candidates.len());
            let mut failed = None;
            for (index, candidate) in candidates.iter().enumerate() {
                let place = (offsets[index], word_offsets[index]);
                match self.plan_slice(index, place, resized, candidate, &ctx).await {
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
                let candidate = candidates.remove(index);
                log::error!("skipping shapes {}: {err}", candidate.item.key());
                skipped.push((candidate.item.key(), SkipReason::Resolve));
                continue;
            }
            let items = candidates
                .iter()
                .zip(&slices)
                .map(|(c, planned)| self.item_entry(c, &planned.slice))
                .collect::<Result<Vec<_>, _>>()?;
            let slices = slices
                .into_iter()
                .zip(candidates)
                .map(|(mut planned, candidate)| {
                    planned.geometry = candidate.geometry;
                    planned
                })
                .collect();
            return Ok(Plan {
                slices,
                shapes,
                words,
                items,
                skipped,
            });
        }
    }

    /// Loads an item's data and, unless it is already resident, encodes its
    /// geometry.
    async fn load<'s, F: LoaderFactory>(
        &self,
        item: RenderItem<'s>,
        style: &'s ShapesStyle,
        store: &DataStore<F>,
        cancel: &CancelToken,
    ) -> Result<Candidate<'s, F::Shapes>, LoadError> {
        let data = store.shapes(&item.object.source, cancel).await?;
        let key = item.key();
        let bounds = data.data.bounds();
        let resident = self
            .slices
            .iter()
            .find(|slice| slice.key == key && slice.data == data.id)
            .map(|slice| slice.snapshot.words());
        let geometry = match resident {
            Some(words) => Geometry::Resident(words),
            None => {
                let polygons = data.data.load_polygons(cancel).await?;
                if polygons.len() != data.data.len() {
                    return Err(LoadError::Format(format!(
                        "{} polygons for {} shapes",
                        polygons.len(),
                        data.data.len()
                    )));
                }
                Geometry::Encoded(
                    ScanlineBuffer::encode(&polygons, bounds, self.config.num_scanlines)
                        .into_words(),
                )
            }
        };
        Ok(Candidate {
            item,
            style,
            data,
            bounds,
            geometry,
        })
    }

    async fn plan_slice<F: LoaderFactory>(
        &self,
        index: usize,
        (offset, word_offset): (usize, usize),
        resized: bool,
        candidate: &Candidate<'_, F::Shapes>,
        ctx: &ResolveContext<'_, F>,
    ) -> Result<PlannedSlice, ResolveError> {
        let style = candidate.style;
        let len = candidate.data.data.len();
        let words = word_offset..word_offset + candidate.geometry.len();
        let slice = Slice {
            key: candidate.item.key(),
            data: candidate.data.id,
            index,
            offset,
            len,
            snapshot: ShapeSnapshot {
                words: words.clone(),
                color: FieldSnapshot::capture(&style.color, ctx).await?,
                visibility: FieldSnapshot::capture(&style.visibility, ctx).await?,
                opacity: FieldSnapshot::capture(&style.opacity, ctx).await?,
            },
        };
        let previous = self
            .slices
            .get(index)
            .filter(|previous| {
                !resized && previous.same_place(&slice) && previous.snapshot.words == words
            })
            .map(|previous| &previous.snapshot);
        let stale = |same: fn(&ShapeSnapshot, &ShapeSnapshot) -> bool| {
            previous.is_none_or(|previous| !same(previous, &slice.snapshot))
        };

        let mut writes = Writes {
            geometry: previous.is_none() || matches!(candidate.geometry, Geometry::Encoded(_)),
            ..Writes::default()
        };
        if stale(|a, b| a.color == b.color) {
            writes.rgb =
                Some(resolve_vec::<ColorAttribute, _, _>(&style.color, len, ctx, |&c| c).await?);
        }
        if stale(|a, b| a.visibility == b.visibility) {
            writes.visible = Some(
                resolve_vec::<VisibilityAttribute, _, _>(&style.visibility, len, ctx, |&v| v)
                    .await?,
            );
        }
        if stale(|a, b| a.opacity == b.opacity) {
            writes.opacity = Some(
                resolve_vec::<OpacityAttribute, _, _>(&style.opacity, len, ctx, |&o| {
                    opacity_byte(o)
                })
                .await?,
            );
        }
        Ok(PlannedSlice {
            slice,
            // Filled in once the plan settles.
            geometry: Geometry::Resident(0..0),
            writes,
        })
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "bounds are single precision on the GPU"
    )]
    fn item_entry<S>(
        &self,
        candidate: &Candidate<'_, S>,
        slice: &Slice<ShapeSnapshot>,
    ) -> Result<ShapeItemEntry, SyncError> {
        let word = |n: usize| {
            u32::try_from(n)
                .map_err(|_| SyncError::Allocation(format!("offset {n} exceeds 32 bits")))
        };
        let b = candidate.bounds;
        Ok(ShapeItemEntry {
            matrix: TransformEntry::new(candidate.item.object_to_world(), 0.0, 0.0).matrix,
            bounds: [b.x0 as f32, b.y0 as f32, b.x1 as f32, b.y1 as f32],
            scanline_offset: word(slice.snapshot.words.start)?,
            shape_base: word(slice.offset)?,
            num_scanlines: self.config.num_scanlines,
            stroke_width: candidate.style.stroke_width,
            opacity: candidate.item.opacity(),
            _pad: [0.0; 3],
        })
    }

    fn apply(&mut self, plan: Plan, pass: u64) -> Result<SyncSummary, SyncError> {
        let resized = plan.shapes != self.shapes || plan.words != self.words;
        if resized {
            self.backend.resize(plan.shapes, plan.words)?;
            self.mirror.resize_shapes(plan.shapes);
            log::debug!(
                "shape buffers reallocated for {} shapes and {} words",
                plan.shapes,
                plan.words
            );
        }

        let Self {
            backend,
            mirror,
            sink,
            slices: applied,
            shapes,
            words,
            items,
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
                kind: SyncKind::Shapes,
                pass,
                elements: plan.shapes,
                words: plan.words,
            });
        }
        for &(key, reason) in &plan.skipped {
            tracer.item_skipped(&ItemSkippedEvent {
                kind: SyncKind::Shapes,
                pass,
                key,
                reason,
            });
        }

        // Geometry moves between passes, so the word mirror is rebuilt from
        // the old one whenever any slice is written.
        if plan.slices.iter().any(|planned| planned.writes.geometry) || resized {
            let mut next = vec![0_u32; plan.words];
            for planned in &plan.slices {
                let target = &mut next[planned.slice.snapshot.words.clone()];
                match &planned.geometry {
                    Geometry::Encoded(encoded) => target.copy_from_slice(encoded),
                    Geometry::Resident(range) => {
                        target.copy_from_slice(&mirror.words[range.clone()]);
                    }
                }
            }
            mirror.words = next;
        }

        let mut record = |target: UploadTarget, range: &Range<usize>, element_size: usize| {
            let bytes = range.len() * element_size;
            tracer.upload(&UploadEvent {
                kind: SyncKind::Shapes,
                pass,
                target,
                first: range.start,
                count: range.len(),
                bytes,
            });
            summary.uploads += 1;
            summary.bytes += bytes;
        };

        let mut slices = Vec::with_capacity(plan.slices.len());
        for PlannedSlice { slice, writes, .. } in plan.slices {
            let words = slice.snapshot.words();
            if writes.geometry && !words.is_empty() {
                record(UploadTarget::Scanlines, &words, 4);
                backend.upload_scanlines(words, &mirror.words);
            }
            let range = slice.range();
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
            if repack && !range.is_empty() {
                for i in range.clone() {
                    let alpha = if mirror.visible[i] { mirror.opacity[i] } else { 0 };
                    mirror.color[i] = mirror.rgb[i].pack(alpha);
                }
                record(UploadTarget::ShapeColors, &range, 4);
                backend.upload_colors(range, &mirror.color);
            }
            slices.push(slice);
        }

        if plan.items != *items {
            record(UploadTarget::ShapeItems, &(0..plan.items.len()), ShapeItemEntry::SIZE);
            backend.upload_items(&plan.items);
        }

        debug_assert!(
            is_partition(&slices, plan.shapes),
            "slices do not partition the color buffer"
        );
        *applied = slices;
        *shapes = plan.shapes;
        *words = plan.words;
        *items = plan.items;
        Ok(summary)
    }

    /// Records a draw of every resident item. Does nothing while suspended,
    /// once the backend reports a lost device, or when no item is resident.
    pub fn draw(&self, target: &mut B::DrawTarget<'_>, viewport: &Viewport) {
        if self.suspended || self.backend.is_lost() || self.items.is_empty() {
            return;
        }
        self.backend.draw(target, viewport);
    }

    /// Suspends drawing and synchronizing after the GPU context was lost.
    pub fn context_lost(&mut self) {
        if !self.suspended {
            log::warn!("GPU context lost; shape drawing suspended");
        }
        self.suspended = true;
    }

    /// Resumes with a backend built on the restored context.
    ///
    /// All bookkeeping is reset, so the next pass encodes and uploads
    /// everything.
    pub fn context_restored(&mut self, backend: B) {
        self.backend = backend;
        self.slices.clear();
        self.shapes = 0;
        self.words = 0;
        self.mirror = Mirror::default();
        self.items.clear();
        self.misses.clear();
        self.suspended = false;
        log::debug!("shape synchronizer rebuilt after context restore");
    }
}

fn shape_items(scene: &Scene) -> impl Iterator<Item = (RenderItem<'_>, &ShapesStyle)> {
    render_items(scene).filter_map(|item| match &item.object.kind {
        ObjectKind::Shapes(style) => Some((item, style)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Size, Vec2};
    use pollster::block_on;

    use super::*;
    use crate::model::{
        AttributeSpec, DataSource, Layer, LayerConfig, LayerConfigId, LayerId, MapRef, Object,
        ObjectId, PropertyMap, TableId,
    };
    use crate::scanline::Polygon;
    use crate::table::Column;
    use crate::test_support::{MemoryLoader, RecordingShapeBackend, ShapeOp};
    use crate::transform::Similarity;

    fn source(name: &str) -> DataSource {
        DataSource::new("mem", name)
    }

    fn square(x: f64, y: f64) -> Polygon {
        Polygon::new(vec![
            Point::new(x, y),
            Point::new(x + 1.0, y),
            Point::new(x + 1.0, y + 1.0),
            Point::new(x, y + 1.0),
        ])
    }

    fn shapes_object(id: u32, name: &str) -> Object {
        Object::new(
            ObjectId(id),
            source(name),
            ObjectKind::Shapes(ShapesStyle::default()),
        )
        .on_layer(LayerConfig::new(LayerConfigId(id), LayerId(0)))
    }

    fn style_mut(scene: &mut Scene, id: u32) -> &mut ShapesStyle {
        match &mut scene.object_mut(ObjectId(id)).unwrap().kind {
            ObjectKind::Shapes(style) => style,
            kind => panic!("object {id} is {kind:?}"),
        }
    }

    const SCANLINES: u32 = 8;

    struct Fixture {
        scene: Scene,
        store: DataStore<MemoryLoader>,
        sync: ShapeSynchronizer<RecordingShapeBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            let bounds = Rect::new(0.0, 0.0, 4.0, 4.0);
            let loader = MemoryLoader::new()
                .with_shapes(source("a"), vec![square(0.0, 0.0), square(2.0, 2.0)], bounds)
                .with_shapes(source("b"), vec![square(1.0, 1.0)], bounds)
                .with_table(
                    source("cells"),
                    vec![("kind", Column::Text(vec!["tumor".into(), "stroma".into()]))],
                );
            let mut scene = Scene {
                layers: vec![Layer::new(LayerId(0))],
                objects: vec![shapes_object(1, "a"), shapes_object(2, "b")],
                ..Scene::default()
            };
            scene.tables.insert(TableId(1), source("cells"));
            let config = SyncConfig {
                num_scanlines: SCANLINES,
                ..SyncConfig::DEFAULT
            };
            Self {
                scene,
                store: DataStore::new(loader),
                sync: ShapeSynchronizer::new(RecordingShapeBackend::default(), config).unwrap(),
            }
        }

        fn sync(&mut self) -> Result<SyncSummary, SyncError> {
            block_on(
                self.sync
                    .synchronize(&self.scene, &self.store, &CancelToken::new()),
            )
        }

        fn ops(&self) -> &[ShapeOp] {
            &self.sync.backend().ops
        }
    }

    fn encoded(polygons: &[Polygon]) -> Vec<u32> {
        ScanlineBuffer::encode(polygons, Rect::new(0.0, 0.0, 4.0, 4.0), SCANLINES).into_words()
    }

    #[test]
    fn items_are_packed_back_to_back() {
        let mut f = Fixture::new();
        let summary = f.sync().unwrap();
        assert_eq!(summary.items, 2);
        let a = encoded(&[square(0.0, 0.0), square(2.0, 2.0)]);
        let b = encoded(&[square(1.0, 1.0)]);
        assert_eq!(f.sync.total(), 3);
        assert_eq!(f.sync.words(), a.len() + b.len());
        let backend = f.sync.backend();
        assert_eq!(&backend.words[..a.len()], a.as_slice());
        assert_eq!(&backend.words[a.len()..], b.as_slice());
        assert_eq!(backend.items[1].scanline_offset as usize, a.len());
        assert_eq!(backend.items[1].shape_base, 2);
        assert_eq!(backend.items[0].num_scanlines, SCANLINES);
        assert_eq!(backend.items[0].bounds, [0.0, 0.0, 4.0, 4.0]);
        assert!(is_partition(f.sync.slices(), 3));
    }

    #[test]
    fn unchanged_scenes_upload_nothing() {
        let mut f = Fixture::new();
        f.sync().unwrap();
        let summary = f.sync().unwrap();
        assert_eq!(summary.uploads, 0);
        assert_eq!(f.store.factory().polygon_loads(&source("a")), 1);
    }

    #[test]
    fn group_colors_upload_only_that_range() {
        let mut f = Fixture::new();
        f.sync().unwrap();
        let before = f.ops().len();
        let tumor = Color::rgb(200, 0, 0);
        style_mut(&mut f.scene, 1).color = AttributeSpec::Groups {
            table: TableId(1),
            column: "kind".into(),
            map: Some(MapRef::Inline(PropertyMap::new().with("tumor", tumor))),
        };
        let summary = f.sync().unwrap();
        assert_eq!(summary.uploads, 1);
        assert_eq!(&f.ops()[before..], &[ShapeOp::Colors(0..2)]);
        assert_eq!(f.sync.backend().colors[0], tumor.pack(255));
    }

    #[test]
    fn stroke_and_transform_edits_only_touch_the_item_table() {
        let mut f = Fixture::new();
        f.sync().unwrap();
        let before = f.ops().len();
        style_mut(&mut f.scene, 2).stroke_width = 0.5;
        f.scene.layer_mut(LayerId(0)).unwrap().transform =
            Similarity::new(1.0, 0.0, Vec2::new(10.0, 0.0));
        let summary = f.sync().unwrap();
        assert_eq!(summary.uploads, 1);
        assert_eq!(&f.ops()[before..], &[ShapeOp::Items(2)]);
        let items = &f.sync.backend().items;
        assert_eq!(items[1].stroke_width, 0.5);
        assert_eq!(items[0].matrix[2][0], 10.0);
    }

    #[test]
    fn removing_an_item_moves_resident_geometry() {
        let mut f = Fixture::new();
        f.sync().unwrap();
        f.scene.objects.remove(0);
        f.sync().unwrap();
        let b = encoded(&[square(1.0, 1.0)]);
        assert_eq!(f.sync.backend().words, b);
        assert_eq!(f.sync.backend().items[0].scanline_offset, 0);
        // Geometry was copied, not loaded and encoded again.
        assert_eq!(f.store.factory().polygon_loads(&source("b")), 1);
    }

    #[test]
    fn hidden_shapes_pack_a_zero_alpha() {
        let mut f = Fixture::new();
        style_mut(&mut f.scene, 2).visibility = AttributeSpec::Value(false);
        f.sync().unwrap();
        assert_eq!(f.sync.backend().colors[2] >> 24, 0);
        assert_eq!(f.sync.backend().colors[0] >> 24, 255);
    }

    #[test]
    fn cancelled_passes_leave_no_trace() {
        let mut f = Fixture::new();
        f.sync().unwrap();
        let before = f.ops().len();
        let cancel = CancelToken::new();
        cancel.cancel();
        style_mut(&mut f.scene, 1).stroke_width = 2.0;
        let err = block_on(f.sync.synchronize(&f.scene, &f.store, &cancel)).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(f.ops().len(), before);
        assert_eq!(f.sync.backend().items[0].stroke_width, 0.0);
    }

    #[test]
    fn failed_loads_skip_only_that_item() {
        let mut f = Fixture::new();
        f.scene.objects.push(shapes_object(3, "missing"));
        let summary = f.sync().unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(f.sync.slices().len(), 2);
    }

    #[test]
    fn context_loss_suspends_until_restored() {
        let mut f = Fixture::new();
        f.sync().unwrap();
        f.sync.backend_mut().lost = true;
        assert_eq!(f.sync().unwrap_err(), SyncError::ContextLost);
        let viewport = Viewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), Size::new(1.0, 1.0));
        let mut target = Vec::new();
        f.sync.draw(&mut target, &viewport);
        assert!(target.is_empty());
        f.sync.context_restored(RecordingShapeBackend::default());
        f.sync().unwrap();
        f.sync.draw(&mut target, &viewport);
        assert_eq!(target, vec![2]);
        assert_eq!(f.sync.backend().words.len(), f.sync.words());
    }

    #[test]
    fn lost_devices_stop_draws_before_the_next_pass() {
        let mut f = Fixture::new();
        f.sync().unwrap();
        f.sync.backend_mut().lost = true;
        let mut target = Vec::new();
        f.sync.draw(
            &mut target,
            &Viewport::new(Rect::new(0.0, 0.0, 1.0, 1.0), Size::new(1.0, 1.0)),
        );
        assert!(target.is_empty());
        assert!(!f.sync.is_suspended());
    }
}
