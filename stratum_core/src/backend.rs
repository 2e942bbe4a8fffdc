// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for GPU integrations.
//!
//! The synchronizers in this crate decide *what* to upload and *where*; a
//! backend owns the actual buffers and pipelines. Stratum splits the work
//! this way so the diffing logic can be tested against recording doubles
//! and reused with any GPU API.
//!
//! A backend provides:
//!
//! - **Storage**: one buffer per vertex attribute (points) or per data kind
//!   (shapes), reallocated by `resize`. A resize discards contents; the
//!   synchronizer follows every resize with a full upload.
//! - **Uploads**: element-range writes. Each call receives the whole CPU
//!   mirror of the buffer plus the dirty range, so a backend whose API needs
//!   aligned writes can widen the range without keeping its own copy.
//! - **Draw**: records draw commands into a backend-chosen target type
//!   (e.g. a render pass). Drawing never loads data.
//! - **Loss detection**: [`is_lost`](PointBackend::is_lost) reports a lost
//!   device so the synchronizer can suspend itself.
//!
//! # Crate boundaries
//!
//! `stratum_core` owns the model, resolution, encoding, diffing, and this
//! contract module. `stratum_backend_wgpu` implements the traits on wgpu.
//! Application code owns the device and the frame loop and wires them
//! together:
//!
//! ```rust,ignore
//! // On every scene edit:
//! previous_pass.cancel();
//! let cancel = CancelToken::new();
//! points.synchronize(&scene, &store, &cancel).await?;
//! shapes.synchronize(&scene, &store, &cancel).await?;
//!
//! // Every frame:
//! let mut pass = encoder.begin_render_pass(&desc);
//! shapes.draw(&mut pass, &viewport);
//! points.draw(&mut pass, &viewport);
//! ```

use core::ops::Range;

use crate::error::SyncError;
use crate::transform::TransformEntry;
use crate::viewport::Viewport;

/// A per-point vertex attribute buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointAttribute {
    /// `f32` x coordinate.
    X,
    /// `f32` y coordinate.
    Y,
    /// `f16` size.
    Size,
    /// Packed RGBA `u32`.
    Color,
    /// `u8` marker index.
    Marker,
    /// `u8` transform table slot.
    TransformIndex,
}

impl PointAttribute {
    /// Every attribute, in buffer order.
    pub const ALL: [Self; 6] = [
        Self::X,
        Self::Y,
        Self::Size,
        Self::Color,
        Self::Marker,
        Self::TransformIndex,
    ];

    /// Bytes per element.
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Self::X | Self::Y | Self::Color => 4,
            Self::Size => 2,
            Self::Marker | Self::TransformIndex => 1,
        }
    }

    /// Lower-case name, for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Size => "size",
            Self::Color => "color",
            Self::Marker => "marker",
            Self::TransformIndex => "transform_index",
        }
    }
}

/// GPU storage and drawing for point clouds.
pub trait PointBackend {
    /// What [`draw`](Self::draw) records into.
    type DrawTarget<'a>;

    /// Reallocates every attribute buffer for `points` elements. Contents
    /// are undefined afterwards.
    fn resize(&mut self, points: usize) -> Result<(), SyncError>;

    /// Writes `elements` of `attribute`. `all` is the complete CPU mirror of
    /// the attribute buffer, as bytes.
    fn upload(&mut self, attribute: PointAttribute, elements: Range<usize>, all: &[u8]);

    /// Replaces the transform table.
    fn upload_transforms(&mut self, entries: &[TransformEntry]);

    /// Records a draw of every resident point.
    fn draw(&self, target: &mut Self::DrawTarget<'_>, viewport: &Viewport);

    /// Has the device been lost since the backend was created?
    fn is_lost(&self) -> bool {
        false
    }
}

/// One slot of the shape item table.
///
/// Laid out for a std430 storage buffer (96 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShapeItemEntry {
    /// Object→world transform, as in [`TransformEntry`].
    pub matrix: [[f32; 4]; 3],
    /// Item bounds in object units: `[x0, y0, x1, y1]`.
    pub bounds: [f32; 4],
    /// Word offset of the item's scanline buffer.
    pub scanline_offset: u32,
    /// Index of the item's first shape in the color buffer.
    pub shape_base: u32,
    /// Scanlines in the item's buffer.
    pub num_scanlines: u32,
    /// Outline width in object units; zero draws fills only.
    pub stroke_width: f32,
    /// Item opacity multiplier.
    pub opacity: f32,
    /// Padding to a 16-byte multiple.
    pub _pad: [f32; 3],
}

impl ShapeItemEntry {
    /// Size of one entry in bytes.
    pub const SIZE: usize = size_of::<Self>();
}

/// GPU storage and drawing for shape collections.
pub trait ShapeBackend {
    /// What [`draw`](Self::draw) records into.
    type DrawTarget<'a>;

    /// Reallocates the color buffer for `shapes` elements and the scanline
    /// buffer for `words` words.
    fn resize(&mut self, shapes: usize, words: usize) -> Result<(), SyncError>;

    /// Writes `words` of the scanline buffer.
    fn upload_scanlines(&mut self, words: Range<usize>, all: &[u32]);

    /// Writes `shapes` of the packed color buffer.
    fn upload_colors(&mut self, shapes: Range<usize>, all: &[u32]);

    /// Replaces the item table.
    fn upload_items(&mut self, items: &[ShapeItemEntry]);

    /// Records a draw of every resident item.
    fn draw(&self, target: &mut Self::DrawTarget<'_>, viewport: &Viewport);

    /// Has the device been lost since the backend was created?
    fn is_lost(&self) -> bool {
        false
    }
}
