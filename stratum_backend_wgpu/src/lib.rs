// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! wgpu backend for Stratum point and shape overlays.
//!
//! [`WgpuPointBackend`] and [`WgpuShapeBackend`] implement the
//! [`PointBackend`](stratum_core::backend::PointBackend) and
//! [`ShapeBackend`](stratum_core::backend::ShapeBackend) contracts. Both
//! draw into a caller-owned [`wgpu::RenderPass`] with premultiplied alpha
//! blending, on top of whatever the pass already holds.
//!
//! # Usage
//!
//! ```rust,ignore
//! let context = GpuContext::new(device, queue, surface_format);
//! let mut points = PointSynchronizer::new(WgpuPointBackend::new(&context)?, SyncConfig::DEFAULT)?;
//! let mut shapes = ShapeSynchronizer::new(WgpuShapeBackend::new(&context)?, SyncConfig::DEFAULT)?;
//!
//! // After a scene edit:
//! points.synchronize(&scene, &store, &cancel).await?;
//! shapes.synchronize(&scene, &store, &cancel).await?;
//!
//! // Every frame:
//! let mut pass = encoder.begin_render_pass(&desc);
//! shapes.draw(&mut pass, &viewport);
//! points.draw(&mut pass, &viewport);
//! ```
//!
//! # Device loss
//!
//! [`GpuContext`] installs a device-lost callback. Once it fires, both
//! backends report `is_lost`, the synchronizers suspend themselves on their
//! next pass, and the embedder rebuilds the backends from a new context and
//! passes them to `context_restored`.
//!
//! # Requirements
//!
//! Point attributes are read from six storage buffers in the vertex stage,
//! which needs `max_storage_buffers_per_shader_stage >= 6` (the WebGPU
//! default is 8).
//!
//! Each draw rewrites the backend's view uniform through the queue, so one
//! backend draws with one viewport per submission.

mod buffer;
mod context;
mod points;
mod shapes;
mod view;

pub use context::GpuContext;
pub use points::WgpuPointBackend;
pub use shapes::WgpuShapeBackend;
