// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pretty-printing, log forwarding, and JSON recording for Stratum
//! diagnostics.
//!
//! This crate provides [`SyncSink`](stratum_core::trace::SyncSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`log_sink::LogSink`]: forwards events to the `log` facade.
//! - [`json::JsonLinesSink`]: one JSON object per event, for offline tools.
//!
//! Install one with `set_sink` on a synchronizer or reconciler.

pub mod json;
mod lines;
pub mod log_sink;
pub mod pretty;
