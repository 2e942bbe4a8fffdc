// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Renderable items: one per (layer, object, layer config).

use core::fmt;

use kurbo::Affine;

use crate::model::{Layer, LayerConfig, LayerConfigId, LayerId, Object, ObjectId, Scene};
use crate::transform::compose;

/// Identity of a renderable item.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    /// Layer the item is drawn in.
    pub layer: LayerId,
    /// Object that owns the item.
    pub object: ObjectId,
    /// Binding that produced the item.
    pub config: LayerConfigId,
}

impl fmt::Debug for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemKey({}/{}/{})", self.layer, self.object, self.config)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "layer {} object {} config {}",
            self.layer, self.object, self.config
        )
    }
}

/// A renderable item borrowed from a scene.
#[derive(Clone, Copy, Debug)]
pub struct RenderItem<'a> {
    /// The item's layer.
    pub layer: &'a Layer,
    /// The item's object.
    pub object: &'a Object,
    /// The binding of `object` to `layer`.
    pub config: &'a LayerConfig,
}

impl RenderItem<'_> {
    /// Identity of this item.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey {
            layer: self.layer.id,
            object: self.object.id,
            config: self.config.id,
        }
    }

    /// Object→world transform.
    #[must_use]
    pub fn object_to_world(&self) -> Affine {
        compose(self.config.transform, self.layer.transform)
    }

    /// Item-level opacity: the product of layer and object opacity, or zero
    /// if either is hidden.
    #[must_use]
    pub fn opacity(&self) -> f32 {
        if self.layer.visible && self.object.visible {
            (self.layer.opacity * self.object.opacity).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Enumerates the items of `scene`, layer by layer, then object by object,
/// then binding by binding.
///
/// Bindings whose layer does not exist never match a layer and so produce no
/// item.
pub fn render_items(scene: &Scene) -> impl Iterator<Item = RenderItem<'_>> {
    scene.layers.iter().flat_map(move |layer| {
        scene.objects.iter().flat_map(move |object| {
            object
                .layer_configs
                .iter()
                .filter(move |config| config.layer == layer.id)
                .map(move |config| RenderItem {
                    layer,
                    object,
                    config,
                })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataSource, ImageStyle, LayerConfig, ObjectKind};

    fn object(id: u32, layers: &[u32]) -> Object {
        let mut object = Object::new(
            ObjectId(id),
            DataSource::new("mem", format!("o{id}")),
            ObjectKind::Image(ImageStyle::default()),
        );
        for (i, &layer) in layers.iter().enumerate() {
            object = object.on_layer(LayerConfig::new(
                LayerConfigId(u32::try_from(i).unwrap()),
                LayerId(layer),
            ));
        }
        object
    }

    #[test]
    fn items_are_ordered_layer_then_object() {
        let scene = Scene {
            layers: vec![Layer::new(LayerId(1)), Layer::new(LayerId(0))],
            objects: vec![object(10, &[0, 1]), object(11, &[1])],
            ..Scene::default()
        };
        let keys: Vec<(u32, u32)> = render_items(&scene)
            .map(|item| (item.layer.id.0, item.object.id.0))
            .collect();
        assert_eq!(keys, vec![(1, 10), (1, 11), (0, 10)]);
    }

    #[test]
    fn dangling_layer_configs_are_filtered() {
        let scene = Scene {
            layers: vec![Layer::new(LayerId(0))],
            objects: vec![object(10, &[0, 7])],
            ..Scene::default()
        };
        assert_eq!(render_items(&scene).count(), 1);
    }

    #[test]
    fn hidden_layers_zero_the_item_opacity() {
        let mut layer = Layer::new(LayerId(0));
        layer.opacity = 0.5;
        let mut obj = object(1, &[0]);
        obj.opacity = 0.5;
        let scene = Scene {
            layers: vec![layer],
            objects: vec![obj],
            ..Scene::default()
        };
        let item = render_items(&scene).next().unwrap();
        assert_eq!(item.opacity(), 0.25);
        let mut hidden = scene.clone();
        hidden.layers[0].visible = false;
        assert_eq!(render_items(&hidden).next().unwrap().opacity(), 0.0);
    }
}
