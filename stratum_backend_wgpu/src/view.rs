// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-draw view uniform.

use bytemuck::{Pod, Zeroable};
use stratum_core::transform::TransformEntry;
use stratum_core::viewport::Viewport;

/// `View` in both shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct ViewUniform {
    world_to_clip: [[f32; 4]; 3],
    pixels: [f32; 2],
    pixels_per_unit: f32,
    _pad: f32,
}

impl ViewUniform {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "GPU uniforms are single precision"
    )]
    pub(crate) fn new(viewport: &Viewport) -> Self {
        Self {
            world_to_clip: TransformEntry::new(viewport.world_to_clip(), 1.0, 1.0).matrix,
            pixels: [
                viewport.pixels.width.max(1.0) as f32,
                viewport.pixels.height.max(1.0) as f32,
            ],
            pixels_per_unit: viewport.pixels_per_unit() as f32,
            _pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Rect, Size};

    use super::*;

    #[test]
    fn layout_matches_the_shader() {
        assert_eq!(size_of::<ViewUniform>(), 64);
    }

    #[test]
    fn carries_the_clip_transform() {
        let viewport = Viewport::new(Rect::new(0.0, 0.0, 200.0, 100.0), Size::new(400.0, 200.0));
        let view = ViewUniform::new(&viewport);
        assert_eq!(view.world_to_clip[0], [0.01, 0.0, 0.0, 0.0]);
        assert_eq!(view.world_to_clip[1], [0.0, -0.02, 0.0, 0.0]);
        assert_eq!(view.world_to_clip[2], [-1.0, 1.0, 1.0, 0.0]);
        assert_eq!(view.pixels, [400.0, 200.0]);
        assert_eq!(view.pixels_per_unit, 2.0);
    }
}
