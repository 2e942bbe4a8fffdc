// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layers, objects, and the scene that holds them.

use serde::{Deserialize, Serialize};

use super::id::{LayerConfigId, LayerId, ObjectId};
use super::source::{DataSource, TableIndex};
use super::style::{PointsStyle, PropertyMaps, ShapesStyle};
use crate::config::ViewerOptions;
use crate::transform::Similarity;

/// A group of objects sharing a layer→world transform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Identity.
    pub id: LayerId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Hidden layers contribute zero-opacity items.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Opacity in `[0, 1]`.
    #[serde(default = "default_one")]
    pub opacity: f32,
    /// Layer→world transform.
    #[serde(default)]
    pub transform: Similarity,
    /// Multiplier applied to every point size in this layer.
    #[serde(default = "default_one")]
    pub point_size: f32,
}

impl Layer {
    /// Creates a visible, opaque layer with the identity transform.
    #[must_use]
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            name: String::new(),
            visible: true,
            opacity: 1.0,
            transform: Similarity::IDENTITY,
            point_size: 1.0,
        }
    }
}

/// Binds an object to one layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Identity, unique within the owning object.
    pub id: LayerConfigId,
    /// Target layer. Configs naming a layer that does not exist are ignored.
    pub layer: LayerId,
    /// Object→layer transform.
    #[serde(default)]
    pub transform: Similarity,
    /// Mirror horizontally. Honored for tiled images only.
    #[serde(default)]
    pub flip_x: bool,
}

impl LayerConfig {
    /// Creates an untransformed binding.
    #[must_use]
    pub fn new(id: LayerConfigId, layer: LayerId) -> Self {
        Self {
            id,
            layer,
            transform: Similarity::IDENTITY,
            flip_x: false,
        }
    }
}

/// Style of a tiled image or label image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStyle {
    /// Overrides merged over the loader-supplied viewer options.
    pub viewer_options: ViewerOptions,
}

/// What an object renders as.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ObjectKind {
    /// A deep-zoom image.
    Image(ImageStyle),
    /// A deep-zoom label (segmentation) image.
    Labels(ImageStyle),
    /// A styled point cloud.
    Points(PointsStyle),
    /// A styled polygon collection.
    Shapes(ShapesStyle),
}

/// A renderable object and its layer bindings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Identity.
    pub id: ObjectId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Hidden objects contribute zero-opacity items.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Opacity in `[0, 1]`.
    #[serde(default = "default_one")]
    pub opacity: f32,
    /// Where the object's data is loaded from.
    pub source: DataSource,
    /// One renderable item per entry, in order.
    #[serde(default)]
    pub layer_configs: Vec<LayerConfig>,
    /// Kind and kind-specific style.
    #[serde(flatten)]
    pub kind: ObjectKind,
}

impl Object {
    /// Creates a visible, opaque object without layer bindings.
    #[must_use]
    pub fn new(id: ObjectId, source: DataSource, kind: ObjectKind) -> Self {
        Self {
            id,
            name: String::new(),
            visible: true,
            opacity: 1.0,
            source,
            layer_configs: Vec::new(),
            kind,
        }
    }

    /// Adds a layer binding, builder style.
    #[must_use]
    pub fn on_layer(mut self, config: LayerConfig) -> Self {
        self.layer_configs.push(config);
        self
    }
}

/// Everything a synchronize pass reads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    /// Layers in draw order.
    pub layers: Vec<Layer>,
    /// Objects in draw order within each layer.
    pub objects: Vec<Object>,
    /// Tables referenced by attribute specs and point loaders.
    pub tables: TableIndex,
    /// Named property maps.
    pub property_maps: PropertyMaps,
}

impl Scene {
    /// Looks a layer up by id.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Looks an object up by id.
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.iter().find(|object| object.id == id)
    }

    /// Mutable variant of [`object`](Self::object).
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    /// Mutable variant of [`layer`](Self::layer).
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id == id)
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}
