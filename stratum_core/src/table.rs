// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contracts for the external data layer.
//!
//! File parsing stays outside this crate. An embedder implements
//! [`LoaderFactory`] for its formats; the synchronizers only ever see the
//! capability traits below, always through a
//! [`DataStore`](crate::data::DataStore).
//!
//! Data handles release their native resources when dropped. The store owns
//! them behind `Rc`, so a handle lives exactly as long as it is cached or
//! referenced by an in-flight pass.

use core::future::Future;

use kurbo::{Rect, Size};

use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::model::{DataSource, TableIndex};
use crate::scanline::Polygon;

/// One fully loaded table column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// Double-precision numbers.
    F64(Vec<f64>),
    /// Single-precision numbers.
    F32(Vec<f32>),
    /// Integers.
    I64(Vec<i64>),
    /// Booleans.
    Bool(Vec<bool>),
    /// Strings.
    Text(Vec<String>),
}

impl Column {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Returns `true` if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row `row` as a number, if the column is numeric.
    #[must_use]
    pub fn number(&self, row: usize) -> Option<f64> {
        match self {
            Self::F64(v) => v.get(row).copied(),
            Self::F32(v) => v.get(row).copied().map(f64::from),
            Self::I64(v) => v.get(row).map(|&n| n as f64),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Row `row` as a group name, formatted the way a group key is looked up
    /// in a property map.
    ///
    /// Integral numbers print without a fractional part, so an integer
    /// column and a float column holding the same labels agree.
    #[must_use]
    pub fn group_key(&self, row: usize) -> Option<String> {
        Some(match self {
            Self::Text(v) => v.get(row)?.clone(),
            Self::Bool(v) => v.get(row)?.to_string(),
            Self::I64(v) => v.get(row)?.to_string(),
            Self::F64(_) | Self::F32(_) => number_key(self.number(row)?),
        })
    }

    /// Row `row` serialized as JSON, the input of the group hash.
    ///
    /// Strings are quoted and escaped, integral numbers print without a
    /// fractional part, and non-finite numbers print as `null`.
    #[must_use]
    pub fn group_json(&self, row: usize) -> Option<String> {
        Some(match self {
            Self::Text(v) => serde_json::Value::from(v.get(row)?.as_str()).to_string(),
            Self::Bool(v) => v.get(row)?.to_string(),
            Self::I64(v) => v.get(row)?.to_string(),
            Self::F64(_) | Self::F32(_) => {
                let n = self.number(row)?;
                if n.is_finite() {
                    number_key(n)
                } else {
                    "null".to_owned()
                }
            }
        })
    }

    /// Name of the stored type, for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::F64(_) => "f64",
            Self::F32(_) => "f32",
            Self::I64(_) => "i64",
            Self::Bool(_) => "bool",
            Self::Text(_) => "text",
        }
    }
}

fn number_key(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else {
        // Adding zero folds `-0.0` into `0.0`, which prints as "0".
        format!("{}", n + 0.0)
    }
}

/// A loaded table with lazily loaded columns.
pub trait Table {
    /// Number of rows.
    fn len(&self) -> usize;

    /// Returns `true` if the table has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the available columns.
    fn columns(&self) -> &[String];

    /// Loads one column.
    ///
    /// Implementations should check `cancel` between chunks of work and
    /// return [`LoadError::Cancelled`] once it fires.
    fn load_column(
        &self,
        name: &str,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Column, LoadError>>;
}

/// A deep-zoom image the tiled viewer can open.
pub trait TiledImageData {
    /// Tile source descriptor passed to the viewer.
    fn tile_source(&self) -> &str;

    /// Full-resolution size in object units.
    fn size(&self) -> Size;
}

/// Point coordinates in object units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Positions {
    /// X coordinates.
    pub x: Vec<f32>,
    /// Y coordinates, same length as `x`.
    pub y: Vec<f32>,
}

/// A point cloud.
pub trait PointsData {
    /// Number of points.
    fn len(&self) -> usize;

    /// Returns `true` if the cloud has no points.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads all coordinates.
    fn load_positions(
        &self,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Positions, LoadError>>;
}

/// A collection of polygons with holes.
pub trait ShapesData {
    /// Number of shapes.
    fn len(&self) -> usize;

    /// Returns `true` if there are no shapes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounding box of every shape, in object units.
    fn bounds(&self) -> Rect;

    /// Loads all polygons, one per shape.
    fn load_polygons(
        &self,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Vec<Polygon>, LoadError>>;
}

/// Produces data handles from data sources.
///
/// One method per object kind. Loads are not cached here; the
/// [`DataStore`](crate::data::DataStore) wraps a factory and caches its
/// results.
pub trait LoaderFactory {
    /// Table handle.
    type Table: Table;
    /// Tiled image handle.
    type Image: TiledImageData;
    /// Label image handle.
    type Labels: TiledImageData;
    /// Point cloud handle.
    type Points: PointsData;
    /// Shape collection handle.
    type Shapes: ShapesData;

    /// Opens a table.
    fn load_table(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Self::Table, LoadError>>;

    /// Opens a tiled image.
    fn load_image(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Self::Image, LoadError>>;

    /// Opens a label image.
    fn load_labels(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Self::Labels, LoadError>>;

    /// Opens a point cloud. Point sources may read their coordinates from a
    /// registered table, hence the index.
    fn load_points(
        &self,
        source: &DataSource,
        tables: &TableIndex,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Self::Points, LoadError>>;

    /// Opens a shape collection.
    fn load_shapes(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<Self::Shapes, LoadError>>;
}
