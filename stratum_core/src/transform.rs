// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Similarity transforms and their GPU encoding.
//!
//! A [`Similarity`] is the `(scale, rotation, translation)` triple stored on
//! layers and layer configs. It expands to `T · R · S` acting on column
//! vectors, i.e. scale and rotate about the origin first, translate last.
//!
//! Composition happens in [`kurbo::Affine`], which is exactly the 2-D 3×3
//! matrix with an implicit `[0 0 1]` bottom row. [`compose`] multiplies the
//! object→layer and layer→world transforms, [`decompose`] reads a
//! similarity back out of the composed matrix, and [`TransformEntry`] is the
//! std140 layout of one transform-table slot on the GPU.

use bytemuck::{Pod, Zeroable};
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Uniform scale, rotation in degrees, and translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Similarity {
    /// Uniform scale factor.
    pub scale: f64,
    /// Counter-clockwise rotation (y-up convention) in degrees.
    pub rotation: f64,
    /// Translation applied after scale and rotation.
    pub translation: Vec2,
}

impl Similarity {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        rotation: 0.0,
        translation: Vec2::ZERO,
    };

    /// Creates a similarity from its parts.
    #[must_use]
    pub const fn new(scale: f64, rotation: f64, translation: Vec2) -> Self {
        Self {
            scale,
            rotation,
            translation,
        }
    }

    /// Expands to the matrix `T(translation) · R(rotation) · S(scale)`.
    #[must_use]
    pub fn to_affine(self) -> Affine {
        Affine::translate(self.translation)
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale(self.scale)
    }

    /// Like [`to_affine`](Self::to_affine), but rotates about `pivot` instead
    /// of the origin: `T(translation) · T(pivot) · R · T(-pivot) · S`.
    #[must_use]
    pub fn to_affine_about(self, pivot: Point) -> Affine {
        let pivot = pivot.to_vec2();
        Affine::translate(self.translation + pivot)
            * Affine::rotate(self.rotation.to_radians())
            * Affine::translate(-pivot)
            * Affine::scale(self.scale)
    }

    /// Is every component finite?
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.scale.is_finite() && self.rotation.is_finite() && self.translation.is_finite()
    }
}

impl Default for Similarity {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Composes an object→layer and a layer→world transform into object→world.
#[must_use]
pub fn compose(object_to_layer: Similarity, layer_to_world: Similarity) -> Affine {
    layer_to_world.to_affine() * object_to_layer.to_affine()
}

/// Recovers a similarity from a matrix built out of similarities.
///
/// Scale is the length of the first column, rotation the angle of the first
/// column, and translation the third column. Shear and non-uniform scale are
/// not representable and are silently folded into these three values.
#[must_use]
pub fn decompose(m: Affine) -> Similarity {
    let [a, b, _c, _d, e, f] = m.as_coeffs();
    Similarity {
        scale: a.hypot(b),
        rotation: b.atan2(a).to_degrees(),
        translation: Vec2::new(e, f),
    }
}

/// Where a viewer that rotates items about their own center must put an item
/// so that it lands where `m` says.
///
/// `size` is the item's natural size in object units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Top-left corner of the unrotated item in world units.
    pub position: Point,
    /// World units per object unit.
    pub scale: f64,
    /// Rotation about the item's center, in degrees.
    pub rotation: f64,
}

impl Placement {
    /// Converts an object→world matrix into a center-pivot placement.
    ///
    /// With `c` the scaled half-size, the viewer maps `p` to
    /// `position + c + R·(s·p − c)`, so `position = t + R·c − c`.
    #[must_use]
    pub fn from_matrix(m: Affine, size: Size) -> Self {
        let sim = decompose(m);
        let half = Vec2::new(size.width * 0.5, size.height * 0.5) * sim.scale;
        let rotated = Affine::rotate(sim.rotation.to_radians()) * half.to_point();
        let position = (sim.translation + rotated.to_vec2() - half).to_point();
        Self {
            position,
            scale: sim.scale,
            rotation: sim.rotation,
        }
    }

    /// Object→world matrix equivalent to this placement.
    #[must_use]
    pub fn to_matrix(self, size: Size) -> Affine {
        let half = Point::new(size.width * 0.5, size.height * 0.5);
        Similarity::new(self.scale, self.rotation, self.position.to_vec2()).to_affine_about(
            Point::new(half.x * self.scale, half.y * self.scale),
        )
    }
}

/// One slot of the per-item transform table, laid out for a std140 uniform
/// block.
///
/// `matrix` holds the object→world transform as three column vectors padded
/// to `vec4`. `opacity` is the item-level opacity (zero when the item's layer
/// or object is hidden) and `size_scale` the layer's point-size multiplier.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformEntry {
    /// Column-major 3×3 matrix, each column padded to four floats.
    pub matrix: [[f32; 4]; 3],
    /// Item opacity multiplier.
    pub opacity: f32,
    /// Point-size multiplier.
    pub size_scale: f32,
    /// Padding to a 16-byte multiple.
    pub _pad: [f32; 2],
}

impl TransformEntry {
    /// Size of one entry in bytes.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Builds an entry from an object→world matrix.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "GPU matrices are single precision"
    )]
    pub fn new(m: Affine, opacity: f32, size_scale: f32) -> Self {
        let [a, b, c, d, e, f] = m.as_coeffs();
        Self {
            matrix: [
                [a as f32, b as f32, 0.0, 0.0],
                [c as f32, d as f32, 0.0, 0.0],
                [e as f32, f as f32, 1.0, 0.0],
            ],
            opacity,
            size_scale,
            _pad: [0.0; 2],
        }
    }
}
