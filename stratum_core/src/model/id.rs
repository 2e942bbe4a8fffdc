// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identity types for scene entities.

use core::fmt;

use serde::{Deserialize, Serialize};

macro_rules! scene_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

scene_id!(
    /// Identifies a [`Layer`](super::Layer).
    LayerId
);

scene_id!(
    /// Identifies an [`Object`](super::Object).
    ObjectId
);

scene_id!(
    /// Identifies one [`LayerConfig`](super::LayerConfig) binding of an object.
    ///
    /// Unique within its object. Together with the layer and object ids it
    /// forms the identity of a renderable item.
    LayerConfigId
);

scene_id!(
    /// Identifies a table registered in a [`TableIndex`](super::TableIndex).
    TableId
);

scene_id!(
    /// Identifies a named [`PropertyMap`](super::PropertyMap) in the
    /// project-global registry.
    PropertyMapId
);
