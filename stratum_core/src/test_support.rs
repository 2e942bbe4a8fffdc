// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory loaders, recording backends, and a mock viewer for tests.

use core::ops::Range;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use half::f16;
use kurbo::{Point, Rect, Size};

use crate::backend::{PointAttribute, PointBackend, ShapeBackend, ShapeItemEntry};
use crate::cancel::CancelToken;
use crate::config::ViewerOptions;
use crate::error::{LoadError, SyncError};
use crate::model::{DataSource, TableIndex};
use crate::reconcile::{RequestId, Viewer};
use crate::scanline::Polygon;
use crate::table::{
    Column, LoaderFactory, PointsData, Positions, ShapesData, Table, TiledImageData,
};
use crate::transform::TransformEntry;
use crate::viewport::Viewport;

// ---------------------------------------------------------------------------
// Data handles
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub(crate) struct MemoryTable {
    len: usize,
    names: Vec<String>,
    columns: HashMap<String, Column>,
}

impl Table for MemoryTable {
    fn len(&self) -> usize {
        self.len
    }

    fn columns(&self) -> &[String] {
        &self.names
    }

    async fn load_column(&self, name: &str, cancel: &CancelToken) -> Result<Column, LoadError> {
        cancel.check_load()?;
        self.columns
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_owned()))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MemoryPoints(Positions);

impl PointsData for MemoryPoints {
    fn len(&self) -> usize {
        self.0.x.len()
    }

    async fn load_positions(&self, cancel: &CancelToken) -> Result<Positions, LoadError> {
        cancel.check_load()?;
        Ok(self.0.clone())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MemoryShapes {
    polygons: Vec<Polygon>,
    bounds: Rect,
    loads: Rc<Cell<usize>>,
}

impl ShapesData for MemoryShapes {
    fn len(&self) -> usize {
        self.polygons.len()
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    async fn load_polygons(&self, cancel: &CancelToken) -> Result<Vec<Polygon>, LoadError> {
        cancel.check_load()?;
        self.loads.set(self.loads.get() + 1);
        Ok(self.polygons.clone())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MemoryImage {
    tile_source: String,
    size: Size,
}

impl TiledImageData for MemoryImage {
    fn tile_source(&self) -> &str {
        &self.tile_source
    }

    fn size(&self) -> Size {
        self.size
    }
}

// ---------------------------------------------------------------------------
// MemoryLoader
// ---------------------------------------------------------------------------

/// A loader factory over in-memory fixtures. Sources without a fixture fail
/// with [`LoadError::NotFound`].
#[derive(Debug, Default)]
pub(crate) struct MemoryLoader {
    tables: RefCell<HashMap<DataSource, MemoryTable>>,
    points: RefCell<HashMap<DataSource, MemoryPoints>>,
    shapes: RefCell<HashMap<DataSource, MemoryShapes>>,
    images: RefCell<HashMap<DataSource, MemoryImage>>,
    labels: RefCell<HashMap<DataSource, MemoryImage>>,
    loads: RefCell<HashMap<DataSource, usize>>,
    cancel_on: RefCell<Option<(DataSource, CancelToken)>>,
}

impl MemoryLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_table(self, source: DataSource, columns: Vec<(&str, Column)>) -> Self {
        let len = columns.first().map_or(0, |(_, c)| c.len());
        let table = MemoryTable {
            len,
            names: columns.iter().map(|(name, _)| (*name).to_owned()).collect(),
            columns: columns
                .into_iter()
                .map(|(name, column)| (name.to_owned(), column))
                .collect(),
        };
        self.tables.borrow_mut().insert(source, table);
        self
    }

    pub(crate) fn with_points(self, source: DataSource, points: Vec<(f32, f32)>) -> Self {
        self.set_points(source, points);
        self
    }

    /// Replaces a point fixture. Takes effect once the store reloads it.
    pub(crate) fn set_points(&self, source: DataSource, points: Vec<(f32, f32)>) {
        let (x, y) = points.into_iter().unzip();
        self.points
            .borrow_mut()
            .insert(source, MemoryPoints(Positions { x, y }));
    }

    pub(crate) fn with_shapes(
        self,
        source: DataSource,
        polygons: Vec<Polygon>,
        bounds: Rect,
    ) -> Self {
        self.shapes.borrow_mut().insert(
            source,
            MemoryShapes {
                polygons,
                bounds,
                loads: Rc::default(),
            },
        );
        self
    }

    pub(crate) fn with_image(self, source: DataSource, tile_source: &str, size: Size) -> Self {
        self.images.borrow_mut().insert(
            source,
            MemoryImage {
                tile_source: tile_source.to_owned(),
                size,
            },
        );
        self
    }

    pub(crate) fn with_labels(self, source: DataSource, tile_source: &str, size: Size) -> Self {
        self.labels.borrow_mut().insert(
            source,
            MemoryImage {
                tile_source: tile_source.to_owned(),
                size,
            },
        );
        self
    }

    /// Cancels `token` as soon as `source` starts loading.
    pub(crate) fn cancel_when_loading(&self, source: DataSource, token: CancelToken) {
        *self.cancel_on.borrow_mut() = Some((source, token));
    }

    /// How many times `source` was loaded.
    pub(crate) fn loads(&self, source: &DataSource) -> usize {
        self.loads.borrow().get(source).copied().unwrap_or(0)
    }

    /// How many times the polygons of `source` were loaded.
    pub(crate) fn polygon_loads(&self, source: &DataSource) -> usize {
        self.shapes
            .borrow()
            .get(source)
            .map_or(0, |shapes| shapes.loads.get())
    }

    fn fetch<T: Clone>(
        &self,
        fixtures: &RefCell<HashMap<DataSource, T>>,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<T, LoadError> {
        *self.loads.borrow_mut().entry(source.clone()).or_default() += 1;
        if let Some((trigger, token)) = &*self.cancel_on.borrow()
            && trigger == source
        {
            token.cancel();
        }
        cancel.check_load()?;
        fixtures
            .borrow()
            .get(source)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(source.to_string()))
    }
}

impl LoaderFactory for MemoryLoader {
    type Table = MemoryTable;
    type Image = MemoryImage;
    type Labels = MemoryImage;
    type Points = MemoryPoints;
    type Shapes = MemoryShapes;

    async fn load_table(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<MemoryTable, LoadError> {
        self.fetch(&self.tables, source, cancel)
    }

    async fn load_image(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<MemoryImage, LoadError> {
        self.fetch(&self.images, source, cancel)
    }

    async fn load_labels(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<MemoryImage, LoadError> {
        self.fetch(&self.labels, source, cancel)
    }

    async fn load_points(
        &self,
        source: &DataSource,
        _tables: &TableIndex,
        cancel: &CancelToken,
    ) -> Result<MemoryPoints, LoadError> {
        self.fetch(&self.points, source, cancel)
    }

    async fn load_shapes(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<MemoryShapes, LoadError> {
        self.fetch(&self.shapes, source, cancel)
    }
}

// ---------------------------------------------------------------------------
// Recording backends
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PointOp {
    Resize(usize),
    Upload(PointAttribute, Range<usize>),
    Transforms(usize),
}

/// A point backend that records every call and keeps resident copies of
/// the buffers. Draws push the resident point count into the target.
#[derive(Debug, Default)]
pub(crate) struct RecordingPointBackend {
    pub(crate) ops: Vec<PointOp>,
    pub(crate) transforms: Vec<TransformEntry>,
    pub(crate) lost: bool,
    pub(crate) fail_resize: bool,
    resident: HashMap<PointAttribute, Vec<u8>>,
    points: usize,
}

impl RecordingPointBackend {
    pub(crate) fn bytes(&self, attribute: PointAttribute) -> Vec<u8> {
        self.resident.get(&attribute).cloned().unwrap_or_default()
    }

    pub(crate) fn floats(&self, attribute: PointAttribute) -> Vec<f32> {
        self.bytes(attribute)
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub(crate) fn words(&self, attribute: PointAttribute) -> Vec<u32> {
        self.bytes(attribute)
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub(crate) fn halves(&self, attribute: PointAttribute) -> Vec<f16> {
        self.bytes(attribute)
            .chunks_exact(2)
            .map(|c| f16::from_ne_bytes([c[0], c[1]]))
            .collect()
    }
}

impl PointBackend for RecordingPointBackend {
    type DrawTarget<'a> = Vec<usize>;

    fn resize(&mut self, points: usize) -> Result<(), SyncError> {
        if self.fail_resize {
            return Err(SyncError::Allocation(format!("{points} points")));
        }
        self.ops.push(PointOp::Resize(points));
        self.points = points;
        for attribute in PointAttribute::ALL {
            self.resident
                .insert(attribute, vec![0; points * attribute.element_size()]);
        }
        Ok(())
    }

    fn upload(&mut self, attribute: PointAttribute, elements: Range<usize>, all: &[u8]) {
        let size = attribute.element_size();
        assert_eq!(all.len(), self.points * size, "mirror does not match the buffer");
        let bytes = elements.start * size..elements.end * size;
        self.resident.entry(attribute).or_default()[bytes.clone()].copy_from_slice(&all[bytes]);
        self.ops.push(PointOp::Upload(attribute, elements));
    }

    fn upload_transforms(&mut self, entries: &[TransformEntry]) {
        self.ops.push(PointOp::Transforms(entries.len()));
        self.transforms = entries.to_vec();
    }

    fn draw(&self, target: &mut Vec<usize>, _viewport: &Viewport) {
        target.push(self.points);
    }

    fn is_lost(&self) -> bool {
        self.lost
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ShapeOp {
    Resize { shapes: usize, words: usize },
    Scanlines(Range<usize>),
    Colors(Range<usize>),
    Items(usize),
}

/// A shape backend that records every call and keeps resident copies of
/// the buffers. Draws push the resident item count into the target.
#[derive(Debug, Default)]
pub(crate) struct RecordingShapeBackend {
    pub(crate) ops: Vec<ShapeOp>,
    pub(crate) words: Vec<u32>,
    pub(crate) colors: Vec<u32>,
    pub(crate) items: Vec<ShapeItemEntry>,
    pub(crate) lost: bool,
}

impl ShapeBackend for RecordingShapeBackend {
    type DrawTarget<'a> = Vec<usize>;

    fn resize(&mut self, shapes: usize, words: usize) -> Result<(), SyncError> {
        self.ops.push(ShapeOp::Resize { shapes, words });
        self.words = vec![0; words];
        self.colors = vec![0; shapes];
        Ok(())
    }

    fn upload_scanlines(&mut self, words: Range<usize>, all: &[u32]) {
        assert_eq!(all.len(), self.words.len(), "mirror does not match the buffer");
        self.words[words.clone()].copy_from_slice(&all[words.clone()]);
        self.ops.push(ShapeOp::Scanlines(words));
    }

    fn upload_colors(&mut self, shapes: Range<usize>, all: &[u32]) {
        assert_eq!(all.len(), self.colors.len(), "mirror does not match the buffer");
        self.colors[shapes.clone()].copy_from_slice(&all[shapes.clone()]);
        self.ops.push(ShapeOp::Colors(shapes));
    }

    fn upload_items(&mut self, items: &[ShapeItemEntry]) {
        self.ops.push(ShapeOp::Items(items.len()));
        self.items = items.to_vec();
    }

    fn draw(&self, target: &mut Vec<usize>, _viewport: &Viewport) {
        target.push(self.items.len());
    }

    fn is_lost(&self) -> bool {
        self.lost
    }
}

// ---------------------------------------------------------------------------
// MockViewer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MockState {
    pub(crate) position: Point,
    pub(crate) scale: f64,
    pub(crate) rotation: f64,
    pub(crate) flipped: bool,
    pub(crate) opacity: f64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            scale: 1.0,
            rotation: 0.0,
            flipped: false,
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ViewerCall {
    Add(RequestId, usize),
    Remove(u64),
    SetIndex(u64, usize),
    SetPosition(u64, Point),
    SetScale(u64, f64),
    SetRotation(u64, f64),
    SetFlip(u64, bool),
    SetOpacity(u64, f64),
    Fit(Rect),
}

/// A tiled viewer whose items are plain ids. Requests stay outstanding
/// until a test realizes them.
#[derive(Debug, Default)]
pub(crate) struct MockViewer {
    pub(crate) calls: Vec<ViewerCall>,
    /// Every add request, in order: request, index, options.
    pub(crate) requests: Vec<(RequestId, usize, ViewerOptions)>,
    outstanding: Vec<(RequestId, usize)>,
    items: Vec<(u64, MockState)>,
    next_id: u64,
}

impl MockViewer {
    /// Realizes the oldest outstanding request at its requested index.
    pub(crate) fn realize_next(&mut self) -> Option<(RequestId, u64)> {
        if self.outstanding.is_empty() {
            return None;
        }
        let (request, index) = self.outstanding.remove(0);
        let id = self.next_id;
        self.next_id += 1;
        let index = index.min(self.items.len());
        self.items.insert(index, (id, MockState::default()));
        Some((request, id))
    }

    pub(crate) fn order(&self) -> Vec<u64> {
        self.items.iter().map(|(id, _)| *id).collect()
    }

    pub(crate) fn state(&self, item: u64) -> MockState {
        self.items
            .iter()
            .find(|(id, _)| *id == item)
            .map(|(_, state)| *state)
            .unwrap_or_else(|| panic!("item {item} is not in the viewer"))
    }

    fn state_mut(&mut self, item: u64) -> &mut MockState {
        self.items
            .iter_mut()
            .find(|(id, _)| *id == item)
            .map(|(_, state)| state)
            .unwrap_or_else(|| panic!("item {item} is not in the viewer"))
    }
}

impl Viewer for MockViewer {
    type Item = u64;

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn index_of(&self, item: &u64) -> Option<usize> {
        self.items.iter().position(|(id, _)| id == item)
    }

    fn add_item(&mut self, request: RequestId, index: usize, options: &ViewerOptions) {
        self.calls.push(ViewerCall::Add(request, index));
        self.requests.push((request, index, options.clone()));
        self.outstanding.push((request, index));
    }

    fn remove_item(&mut self, item: &u64) {
        self.calls.push(ViewerCall::Remove(*item));
        self.items.retain(|(id, _)| id != item);
    }

    fn set_item_index(&mut self, item: &u64, index: usize) {
        self.calls.push(ViewerCall::SetIndex(*item, index));
        if let Some(from) = self.index_of(item) {
            let entry = self.items.remove(from);
            self.items.insert(index.min(self.items.len()), entry);
        }
    }

    fn position(&self, item: &u64) -> Point {
        self.state(*item).position
    }

    fn scale(&self, item: &u64) -> f64 {
        self.state(*item).scale
    }

    fn rotation(&self, item: &u64) -> f64 {
        self.state(*item).rotation
    }

    fn flipped(&self, item: &u64) -> bool {
        self.state(*item).flipped
    }

    fn opacity(&self, item: &u64) -> f64 {
        self.state(*item).opacity
    }

    fn set_position(&mut self, item: &u64, position: Point) {
        self.calls.push(ViewerCall::SetPosition(*item, position));
        self.state_mut(*item).position = position;
    }

    fn set_scale(&mut self, item: &u64, scale: f64) {
        self.calls.push(ViewerCall::SetScale(*item, scale));
        self.state_mut(*item).scale = scale;
    }

    fn set_rotation(&mut self, item: &u64, degrees: f64) {
        self.calls.push(ViewerCall::SetRotation(*item, degrees));
        self.state_mut(*item).rotation = degrees;
    }

    fn set_flip(&mut self, item: &u64, flipped: bool) {
        self.calls.push(ViewerCall::SetFlip(*item, flipped));
        self.state_mut(*item).flipped = flipped;
    }

    fn set_opacity(&mut self, item: &u64, opacity: f64) {
        self.calls.push(ViewerCall::SetOpacity(*item, opacity));
        self.state_mut(*item).opacity = opacity;
    }

    fn fit_bounds(&mut self, bounds: Rect) {
        self.calls.push(ViewerCall::Fit(bounds));
    }
}
