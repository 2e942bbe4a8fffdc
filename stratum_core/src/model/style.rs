// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-item visual attributes and where their values come from.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::id::{PropertyMapId, TableId};

/// An 8-bit-per-channel RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Creates a color from its channels.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Creates a color from `0xRRGGBB`.
    #[must_use]
    pub const fn from_rgb_u32(v: u32) -> Self {
        Self {
            r: ((v >> 16) & 0xff) as u8,
            g: ((v >> 8) & 0xff) as u8,
            b: (v & 0xff) as u8,
        }
    }

    /// Parses `#rgb`, `#rrggbb`, or the same without the leading `#`.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        match hex.len() {
            3 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                let expand = |n: u32| ((n & 0xf) * 0x11) as u8;
                Some(Self::rgb(expand(v >> 8), expand(v >> 4), expand(v)))
            }
            6 => u32::from_str_radix(hex, 16).ok().map(Self::from_rgb_u32),
            _ => None,
        }
    }

    /// Packs the color with an alpha byte as `r | g << 8 | b << 16 | a << 24`.
    ///
    /// This matches WGSL's `unpack4x8unorm`, so one `u32` read yields RGBA.
    #[must_use]
    pub const fn pack(self, alpha: u8) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16 | (alpha as u32) << 24
    }
}

/// Point marker glyphs, indexed by their discriminant on the GPU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Marker {
    /// Filled disc.
    #[default]
    Circle = 0,
    /// Axis-aligned square.
    Square = 1,
    /// Square rotated by 45°.
    Diamond = 2,
    /// Upward triangle.
    TriangleUp = 3,
    /// Downward triangle.
    TriangleDown = 4,
    /// Plus sign.
    Cross = 5,
    /// Diagonal cross.
    X = 6,
    /// Unfilled circle.
    Ring = 7,
}

impl Marker {
    /// Every marker, in discriminant order.
    pub const ALL: [Self; 8] = [
        Self::Circle,
        Self::Square,
        Self::Diamond,
        Self::TriangleUp,
        Self::TriangleDown,
        Self::Cross,
        Self::X,
        Self::Ring,
    ];

    /// Looks a marker up by its kebab-case name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "circle" => Self::Circle,
            "square" => Self::Square,
            "diamond" => Self::Diamond,
            "triangle-up" => Self::TriangleUp,
            "triangle-down" => Self::TriangleDown,
            "cross" => Self::Cross,
            "x" => Self::X,
            "ring" => Self::Ring,
            _ => return None,
        })
    }

    /// Looks a marker up by its GPU index.
    #[must_use]
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// GPU index of this marker.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// An untyped value as it appears in a project-global property map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapValue {
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string (colors, marker names).
    Text(String),
}

/// Group name → value, with an optional fallback for unknown groups.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyMap<T> {
    /// Values keyed by group name.
    pub entries: BTreeMap<String, T>,
    /// Value for groups missing from `entries`.
    pub default: Option<T>,
}

impl<T> PropertyMap<T> {
    /// Creates an empty map without a default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            default: None,
        }
    }

    /// Adds an entry, builder style.
    #[must_use]
    pub fn with(mut self, group: impl Into<String>, value: T) -> Self {
        self.entries.insert(group.into(), value);
        self
    }

    /// Sets the default, builder style.
    #[must_use]
    pub fn with_default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Looks up a group, without applying the default.
    #[must_use]
    pub fn get(&self, group: &str) -> Option<&T> {
        self.entries.get(group)
    }
}

impl<T> Default for PropertyMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The project-global registry of named property maps.
///
/// Named maps are untyped; each attribute converts the entries it needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMaps(pub HashMap<PropertyMapId, PropertyMap<MapValue>>);

impl PropertyMaps {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a named map.
    pub fn insert(&mut self, id: PropertyMapId, map: PropertyMap<MapValue>) {
        self.0.insert(id, map);
    }

    /// Returns a named map.
    #[must_use]
    pub fn get(&self, id: PropertyMapId) -> Option<&PropertyMap<MapValue>> {
        self.0.get(&id)
    }
}

/// Reference to a property map: either registered by name or inline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapRef<T> {
    /// A map in the project-global [`PropertyMaps`] registry.
    Named(PropertyMapId),
    /// A map supplied on the object itself.
    Inline(PropertyMap<T>),
}

/// Where one attribute of an item gets its values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeSpec<T> {
    /// Every element gets the same value.
    Value(T),
    /// Values are read 1:1 from a table column.
    Values {
        /// Table holding the column.
        table: TableId,
        /// Column name.
        column: String,
    },
    /// Values are looked up by a categorical column through a map.
    ///
    /// Without a resolvable map each group gets a stable palette entry.
    Groups {
        /// Table holding the column.
        table: TableId,
        /// Column name.
        column: String,
        /// Optional group → value map.
        #[serde(default)]
        map: Option<MapRef<T>>,
    },
}

impl<T: Default> Default for AttributeSpec<T> {
    fn default() -> Self {
        Self::Value(T::default())
    }
}

/// Styling of a point cloud object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsStyle {
    /// Point size in object units.
    pub size: AttributeSpec<f32>,
    /// Point color.
    pub color: AttributeSpec<Color>,
    /// Per-point visibility.
    pub visibility: AttributeSpec<bool>,
    /// Per-point opacity in `[0, 1]`.
    pub opacity: AttributeSpec<f32>,
    /// Marker glyph.
    pub marker: AttributeSpec<Marker>,
}

impl Default for PointsStyle {
    fn default() -> Self {
        Self {
            size: AttributeSpec::Value(1.0),
            color: AttributeSpec::Value(Color::rgb(0x80, 0x80, 0x80)),
            visibility: AttributeSpec::Value(true),
            opacity: AttributeSpec::Value(1.0),
            marker: AttributeSpec::Value(Marker::Circle),
        }
    }
}

/// Styling of a shape cloud object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapesStyle {
    /// Fill color.
    pub color: AttributeSpec<Color>,
    /// Per-shape visibility.
    pub visibility: AttributeSpec<bool>,
    /// Per-shape opacity in `[0, 1]`.
    pub opacity: AttributeSpec<f32>,
    /// Outline width in object units; `0` draws fills only.
    pub stroke_width: f32,
}

impl Default for ShapesStyle {
    fn default() -> Self {
        Self {
            color: AttributeSpec::Value(Color::rgb(0x80, 0x80, 0x80)),
            visibility: AttributeSpec::Value(true),
            opacity: AttributeSpec::Value(1.0),
            stroke_width: 0.0,
        }
    }
}
