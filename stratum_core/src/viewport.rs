// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The visible region handed to `draw`.

use kurbo::{Affine, Point, Rect, Size};

/// The world-space rectangle shown in a render target of a given pixel size.
///
/// World coordinates grow right and down, like image pixels. Clip space
/// grows right and up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Visible world rectangle.
    pub world: Rect,
    /// Render target size in physical pixels.
    pub pixels: Size,
}

impl Viewport {
    /// Creates a viewport.
    #[must_use]
    pub const fn new(world: Rect, pixels: Size) -> Self {
        Self { world, pixels }
    }

    /// Maps world coordinates to clip space, `[-1, 1]²` with y up.
    #[must_use]
    pub fn world_to_clip(&self) -> Affine {
        let w = self.world.width();
        let h = self.world.height();
        if w <= 0.0 || h <= 0.0 {
            return Affine::scale(0.0);
        }
        Affine::new([
            2.0 / w,
            0.0,
            0.0,
            -2.0 / h,
            -1.0 - 2.0 * self.world.x0 / w,
            1.0 + 2.0 * self.world.y0 / h,
        ])
    }

    /// Physical pixels per world unit along x.
    #[must_use]
    pub fn pixels_per_unit(&self) -> f64 {
        let w = self.world.width();
        if w > 0.0 { self.pixels.width / w } else { 0.0 }
    }

    /// Clip-space position of a world point.
    #[must_use]
    pub fn to_clip(&self, p: Point) -> Point {
        self.world_to_clip() * p
    }
}
