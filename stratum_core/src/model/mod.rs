// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The declarative scene model.
//!
//! A [`Scene`] is owned by the embedder and replaced or edited between
//! synchronize passes. Nothing here holds GPU or viewer state; the
//! synchronizers diff successive scenes against what they last applied.

mod id;
mod scene;
mod source;
mod style;

pub use id::{LayerConfigId, LayerId, ObjectId, PropertyMapId, TableId};
pub use scene::{ImageStyle, Layer, LayerConfig, Object, ObjectKind, Scene};
pub use source::{DataSource, TableIndex};
pub use style::{
    AttributeSpec, Color, MapRef, MapValue, Marker, PointsStyle, PropertyMap, PropertyMaps,
    ShapesStyle,
};
