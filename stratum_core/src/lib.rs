// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declarative scene to GPU synchronization for deep-zoom overlays.
//!
//! `stratum_core` turns a declarative scene (layers, objects, and the
//! bindings between them) into incremental GPU buffer updates and tiled
//! viewer mutations. An embedder edits the [`Scene`](model::Scene) and calls
//! `synchronize` on each synchronizer; only what changed since the last pass
//! is resolved, encoded, and uploaded.
//!
//! # Architecture
//!
//! ```text
//!   Scene (layers × objects × layer configs)
//!       │
//!       ▼
//!   render_items() ──► RenderItem ──┬──► PointSynchronizer ──► PointBackend
//!                                   │          │
//!   DataStore ◄── LoaderFactory     ├──► ShapeSynchronizer ──► ShapeBackend
//!       │                           │          │
//!       └──► resolve() ─────────────┘          ▼
//!                                   └──► TiledImageReconciler ──► Viewer
//! ```
//!
//! **[`model`]**: The scene: layers with similarity transforms, objects
//! with a closed set of kinds and their styles, tables, and property maps.
//!
//! **[`data`]**: [`DataStore`](data::DataStore), the explicit cache around a
//! [`LoaderFactory`](table::LoaderFactory). Every load is stamped with a
//! generation so reloads are seen as identity changes.
//!
//! **[`attribute`]**: The generic attribute resolver: literals, value
//! columns, and group columns with property maps or a stable hash palette.
//!
//! **[`transform`]**: Similarity composition and decomposition, center-pivot
//! placements for viewers, and the GPU transform table entry.
//!
//! **[`scanline`]**: The scanline polygon encoder used by the shape shader.
//!
//! **[`points`]** / **[`shapes`]**: Buffer synchronizers. Each pass is
//! planned without side effects and then applied, so a cancelled pass leaves
//! buffers and bookkeeping untouched.
//!
//! **[`reconcile`]**: The tiled-image reconciler, driving an external
//! viewer through the [`Viewer`](reconcile::Viewer) contract.
//!
//! **[`backend`]**: The [`PointBackend`](backend::PointBackend) and
//! [`ShapeBackend`](backend::ShapeBackend) traits GPU integrations implement.
//!
//! **[`trace`]**: [`SyncSink`](trace::SyncSink) trait and event types for
//! pass instrumentation, with the [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod attribute;
pub mod backend;
pub mod cancel;
pub mod config;
pub mod data;
pub mod error;
pub mod items;
pub mod model;
pub mod points;
pub mod reconcile;
pub mod scanline;
pub mod shapes;
pub mod slice;
pub mod table;
pub mod trace;
pub mod transform;
pub mod viewport;

#[cfg(test)]
mod test_support;
