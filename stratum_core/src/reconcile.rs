// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tiled-image reconciler.
//!
//! Deep-zoom images and label images are not drawn by this crate; they are
//! native items of an external tiled viewer. The reconciler keeps that
//! viewer's item list in line with the scene through the [`Viewer`]
//! contract.
//!
//! Item creation is asynchronous on the viewer side. Each item therefore
//! moves through these states:
//!
//! ```text
//!   absent ──add──▶ pending ──loaded──▶ realized
//!                      │                    │
//!                  vanished             vanished
//!                      ▼                    ▼
//!              pending delete ─loaded─▶ removed
//! ```
//!
//! While an item is pending, moves and state updates are recorded on its
//! entry and applied when the embedder reports the item with
//! [`on_item_loaded`](TiledImageReconciler::on_item_loaded). A pending item
//! that vanished from the scene is removed as soon as it loads.

use core::fmt;

use kurbo::{Affine, Point, Rect, Size};

use crate::cancel::CancelToken;
use crate::config::ViewerOptions;
use crate::data::{DataId, DataStore};
use crate::error::{LoadError, SyncError};
use crate::items::{ItemKey, RenderItem, render_items};
use crate::model::{ImageStyle, ObjectKind, Scene};
use crate::table::{LoaderFactory, TiledImageData};
use crate::trace::{
    ItemSkippedEvent, SkipReason, SyncBeginEvent, SyncEndEvent, SyncKind, SyncOutcome, SyncSink,
    SyncSummary, Tracer, ViewerOp, ViewerOpEvent,
};
use crate::transform::Placement;

/// Relative tolerance below which viewer values count as unchanged.
const EPSILON: f64 = 1e-9;

/// Identifies one [`Viewer::add_item`] request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The native API of a tiled-image viewer.
///
/// Draw order indices count realized items only. Rotation is in degrees
/// about the item's center; see [`Placement`].
pub trait Viewer {
    /// Handle of a realized native item.
    type Item: Clone + PartialEq + fmt::Debug;

    /// Realized items.
    fn item_count(&self) -> usize;

    /// Draw-order index of `item`, if it is still in the viewer.
    fn index_of(&self, item: &Self::Item) -> Option<usize>;

    /// Starts creating an item at draw-order `index`. The embedder must
    /// later report the outcome with `request` through
    /// [`TiledImageReconciler::on_item_loaded`] or
    /// [`TiledImageReconciler::on_item_failed`].
    fn add_item(&mut self, request: RequestId, index: usize, options: &ViewerOptions);

    /// Removes a realized item.
    fn remove_item(&mut self, item: &Self::Item);

    /// Moves a realized item in the draw order.
    fn set_item_index(&mut self, item: &Self::Item, index: usize);

    /// Top-left corner of the unrotated item, in world units.
    fn position(&self, item: &Self::Item) -> Point;

    /// World units per image pixel.
    fn scale(&self, item: &Self::Item) -> f64;

    /// Rotation in degrees.
    fn rotation(&self, item: &Self::Item) -> f64;

    /// Is the item mirrored horizontally?
    fn flipped(&self, item: &Self::Item) -> bool;

    /// Opacity in `[0, 1]`.
    fn opacity(&self, item: &Self::Item) -> f64;

    /// Moves an item.
    fn set_position(&mut self, item: &Self::Item, position: Point);

    /// Scales an item.
    fn set_scale(&mut self, item: &Self::Item, scale: f64);

    /// Rotates an item.
    fn set_rotation(&mut self, item: &Self::Item, degrees: f64);

    /// Mirrors an item horizontally.
    fn set_flip(&mut self, item: &Self::Item, flipped: bool);

    /// Sets an item's opacity.
    fn set_opacity(&mut self, item: &Self::Item, opacity: f64);

    /// Fits the viewport to a world rectangle.
    fn fit_bounds(&mut self, bounds: Rect);
}

/// State the viewer should show for an item.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Desired {
    bounds: Rect,
    placement: Placement,
    flip: bool,
    opacity: f64,
}

impl Desired {
    fn new(item: &RenderItem<'_>, size: Size) -> Self {
        let matrix: Affine = item.object_to_world();
        Self {
            bounds: matrix.transform_rect_bbox(size.to_rect()),
            placement: Placement::from_matrix(matrix, size),
            flip: item.config.flip_x,
            opacity: f64::from(item.opacity()),
        }
    }
}

#[derive(Debug)]
struct Entry<I> {
    key: ItemKey,
    data: DataId,
    request: RequestId,
    item: Option<I>,
    desired: Desired,
}

#[derive(Debug)]
struct PlannedImage {
    key: ItemKey,
    data: DataId,
    options: ViewerOptions,
    desired: Desired,
}

#[derive(Debug)]
struct Plan {
    images: Vec<PlannedImage>,
    skipped: Vec<(ItemKey, SkipReason)>,
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Keeps a tiled viewer's items in line with the image items of a scene.
pub struct TiledImageReconciler<V: Viewer> {
    entries: Vec<Entry<V::Item>>,
    /// Entries that vanished before they were realized.
    doomed: Vec<Entry<V::Item>>,
    next_request: u64,
    fitted: bool,
    sink: Option<Box<dyn SyncSink>>,
    passes: u64,
}

impl<V: Viewer> fmt::Debug for TiledImageReconciler<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiledImageReconciler")
            .field("entries", &self.entries)
            .field("doomed", &self.doomed)
            .field("fitted", &self.fitted)
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

impl<V: Viewer> Default for TiledImageReconciler<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Viewer> TiledImageReconciler<V> {
    /// Creates a reconciler for an empty viewer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            doomed: Vec::new(),
            next_request: 0,
            fitted: false,
            sink: None,
            passes: 0,
        }
    }

    /// Installs a trace sink, returning the previous one.
    pub fn set_sink(&mut self, sink: Option<Box<dyn SyncSink>>) -> Option<Box<dyn SyncSink>> {
        core::mem::replace(&mut self.sink, sink)
    }

    /// Items tracked for the current scene, realized or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no item is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Items whose creation is still outstanding, including doomed ones.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| e.item.is_none()).count() + self.doomed.len()
    }

    /// The realized native item of `key`, if any.
    #[must_use]
    pub fn item(&self, key: ItemKey) -> Option<&V::Item> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.item.as_ref())
    }

    /// Brings the viewer in line with `scene`.
    ///
    /// Images that fail to load are logged and left out.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Cancelled`] if `cancel` fired; the viewer was not
    ///   touched.
    /// - [`SyncError::Config`] if an item's viewer options contradict each
    ///   other; the viewer was not touched.
    pub async fn synchronize<F: LoaderFactory>(
        &mut self,
        viewer: &mut V,
        scene: &Scene,
        store: &DataStore<F>,
        cancel: &CancelToken,
    ) -> Result<SyncSummary, SyncError> {
        self.passes += 1;
        let pass = self.passes;
        Tracer::installed(&mut self.sink).sync_begin(&SyncBeginEvent {
            kind: SyncKind::Images,
            pass,
            items: image_items(scene).count(),
        });

        let planned = plan(scene, store, cancel).await;
        let result = planned.and_then(|plan| {
            cancel.check()?;
            Ok(self.apply(viewer, plan, pass))
        });

        let (outcome, summary) = match &result {
            Ok(summary) => (SyncOutcome::Applied, *summary),
            Err(SyncError::Cancelled) => {
                log::debug!("images pass {pass} cancelled");
                (SyncOutcome::Cancelled, SyncSummary::default())
            }
            Err(err) => {
                log::debug!("images pass {pass} failed: {err}");
                (SyncOutcome::Failed, SyncSummary::default())
            }
        };
        Tracer::installed(&mut self.sink).sync_end(&SyncEndEvent {
            kind: SyncKind::Images,
            pass,
            outcome,
            summary,
        });
        result
    }

    fn apply(&mut self, viewer: &mut V, plan: Plan, pass: u64) -> SyncSummary {
        let mut tracer = Tracer::installed(&mut self.sink);
        let mut summary = SyncSummary {
            items: plan.images.len(),
            skipped: plan.skipped.len(),
            ..SyncSummary::default()
        };
        for &(key, reason) in &plan.skipped {
            tracer.item_skipped(&ItemSkippedEvent {
                kind: SyncKind::Images,
                pass,
                key,
                reason,
            });
        }
        let mut op = |key: ItemKey, kind: ViewerOp| {
            tracer.viewer_op(&ViewerOpEvent {
                pass,
                key,
                op: kind,
            });
            summary.uploads += 1;
        };

        // Vanished items first, so draw-order indices below only count
        // survivors. A reloaded source is a new item.
        let mut previous = Vec::with_capacity(self.entries.len());
        for entry in core::mem::take(&mut self.entries) {
            let survives = plan
                .images
                .iter()
                .any(|image| image.key == entry.key && image.data == entry.data);
            if survives {
                previous.push(entry);
                continue;
            }
            match &entry.item {
                Some(item) => {
                    viewer.remove_item(item);
                    op(entry.key, ViewerOp::Remove);
                }
                None => {
                    op(entry.key, ViewerOp::DeferRemove);
                    self.doomed.push(entry);
                }
            }
        }

        let mut realized = 0;
        for image in plan.images {
            let found = previous
                .iter()
                .position(|entry| entry.key == image.key && entry.data == image.data);
            let Some(position) = found else {
                let request = RequestId(self.next_request);
                self.next_request += 1;
                viewer.add_item(request, realized.min(viewer.item_count()), &image.options);
                op(image.key, ViewerOp::Add);
                self.entries.push(Entry {
                    key: image.key,
                    data: image.data,
                    request,
                    item: None,
                    desired: image.desired,
                });
                continue;
            };
            let mut entry = previous.swap_remove(position);
            entry.desired = image.desired;
            // Pending entries keep the latest state until they load.
            if let Some(item) = &entry.item {
                if viewer.index_of(item) != Some(realized) {
                    viewer.set_item_index(item, realized);
                    op(entry.key, ViewerOp::Reorder);
                }
                apply_state(viewer, item, &entry.desired, |kind| op(entry.key, kind));
                realized += 1;
            }
            self.entries.push(entry);
        }
        summary
    }

    /// Reports that the item requested with `request` was realized.
    ///
    /// Applies, in order: the move to the item's current place in the draw
    /// order, its latest desired state, a viewport fit if it is the first
    /// realized item, and a removal if the item vanished in the meantime.
    /// Returns `false` if `request` is unknown, in which case the item is
    /// removed.
    pub fn on_item_loaded(&mut self, viewer: &mut V, request: RequestId, item: V::Item) -> bool {
        let mut tracer = Tracer::installed(&mut self.sink);
        let mut op = |key: ItemKey, kind: ViewerOp| {
            tracer.viewer_op(&ViewerOpEvent {
                pass: 0,
                key,
                op: kind,
            });
        };

        if let Some(position) = self.doomed.iter().position(|e| e.request == request) {
            let entry = self.doomed.swap_remove(position);
            viewer.remove_item(&item);
            op(entry.key, ViewerOp::Remove);
            return true;
        }
        let Some(position) = self.entries.iter().position(|e| e.request == request) else {
            log::debug!("item for unknown request {request} removed");
            viewer.remove_item(&item);
            return false;
        };

        let realized_before = self.entries[..position]
            .iter()
            .filter(|e| e.item.is_some())
            .count();
        let entry = &mut self.entries[position];
        let index = realized_before.min(viewer.item_count().saturating_sub(1));
        if viewer.index_of(&item) != Some(index) {
            viewer.set_item_index(&item, index);
            op(entry.key, ViewerOp::Reorder);
        }
        apply_state(viewer, &item, &entry.desired, |kind| op(entry.key, kind));
        if !self.fitted {
            viewer.fit_bounds(entry.desired.bounds);
            op(entry.key, ViewerOp::Fit);
            self.fitted = true;
        }
        entry.item = Some(item);
        true
    }

    /// Reports that the item requested with `request` could not be created.
    ///
    /// The entry is dropped; the next pass requests the item again.
    pub fn on_item_failed(&mut self, request: RequestId) {
        if let Some(position) = self.doomed.iter().position(|e| e.request == request) {
            self.doomed.swap_remove(position);
        } else if let Some(position) = self.entries.iter().position(|e| e.request == request) {
            let entry = self.entries.remove(position);
            log::error!("tiled image {} failed to load", entry.key);
        }
    }
}

/// Issues the setters whose values differ from the viewer's.
fn apply_state<V: Viewer>(
    viewer: &mut V,
    item: &V::Item,
    desired: &Desired,
    mut op: impl FnMut(ViewerOp),
) {
    let placement = desired.placement;
    let mut placed = false;
    let position = viewer.position(item);
    if !close(position.x, placement.position.x) || !close(position.y, placement.position.y) {
        viewer.set_position(item, placement.position);
        placed = true;
    }
    if !close(viewer.scale(item), placement.scale) {
        viewer.set_scale(item, placement.scale);
        placed = true;
    }
    if !close(viewer.rotation(item), placement.rotation) {
        viewer.set_rotation(item, placement.rotation);
        placed = true;
    }
    if placed {
        op(ViewerOp::Place);
    }
    if viewer.flipped(item) != desired.flip {
        viewer.set_flip(item, desired.flip);
        op(ViewerOp::Flip);
    }
    if !close(viewer.opacity(item), desired.opacity) {
        viewer.set_opacity(item, desired.opacity);
        op(ViewerOp::Opacity);
    }
}

async fn plan<F: LoaderFactory>(
    scene: &Scene,
    store: &DataStore<F>,
    cancel: &CancelToken,
) -> Result<Plan, SyncError> {
    let mut images = Vec::new();
    let mut skipped = Vec::new();
    for (item, style, labels) in image_items(scene) {
        let source = &item.object.source;
        let loaded = if labels {
            store
                .labels(source, cancel)
                .await
                .map(|l| (l.id, l.data.tile_source().to_owned(), l.data.size()))
        } else {
            store
                .image(source, cancel)
                .await
                .map(|l| (l.id, l.data.tile_source().to_owned(), l.data.size()))
        };
        cancel.check()?;
        let (data, tile_source, size) = match loaded {
            Ok(loaded) => loaded,
            Err(LoadError::Cancelled) => return Err(SyncError::Cancelled),
            Err(err) => {
                log::error!("skipping image {}: {err}", item.key());
                skipped.push((item.key(), SkipReason::Load));
                continue;
            }
        };
        let options =
            ViewerOptions::resolve(&style.viewer_options, &tile_source, Some(item.object.id))?;
        images.push(PlannedImage {
            key: item.key(),
            data,
            options,
            desired: Desired::new(&item, size),
        });
    }
    Ok(Plan { images, skipped })
}

fn image_items(scene: &Scene) -> impl Iterator<Item = (RenderItem<'_>, &ImageStyle, bool)> {
    render_items(scene).filter_map(|item| match &item.object.kind {
        ObjectKind::Image(style) => Some((item, style, false)),
        ObjectKind::Labels(style) => Some((item, style, true)),
        _ => None,
    })
}
