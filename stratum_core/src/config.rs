// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronizer limits and tiled-viewer item options.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::model::{Color, ObjectId};

/// Hard upper bound on the transform table length.
///
/// Transform indices are stored per point as a `u8`.
pub const MAX_ITEMS: usize = 256;

/// Hard upper bound on scanlines per encoded shape item.
pub const MAX_SCANLINES: u32 = 512;

/// Limits shared by the point and shape synchronizers.
///
/// Use one of the presets or construct directly and call
/// [`validate`](Self::validate).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of renderable items per synchronizer. Items past this
    /// are dropped with a warning.
    pub max_items: usize,
    /// Scanlines per encoded shape item.
    pub num_scanlines: u32,
}

impl SyncConfig {
    /// Full-capacity configuration.
    pub const DEFAULT: Self = Self {
        max_items: MAX_ITEMS,
        num_scanlines: MAX_SCANLINES,
    };

    /// Coarser scanlines for constrained devices. Halves the per-item
    /// scanline header and mask footprint.
    pub const LOW_MEMORY: Self = Self {
        max_items: MAX_ITEMS,
        num_scanlines: 256,
    };

    /// Checks that both limits are within the hard bounds.
    pub fn validate(&self) -> Result<(), SyncError> {
        if !(1..=MAX_ITEMS).contains(&self.max_items) {
            return Err(SyncError::config(
                None,
                format!("max_items must be in 1..={MAX_ITEMS}, got {}", self.max_items),
            ));
        }
        if !(1..=MAX_SCANLINES).contains(&self.num_scanlines) {
            return Err(SyncError::config(
                None,
                format!(
                    "num_scanlines must be in 1..={MAX_SCANLINES}, got {}",
                    self.num_scanlines
                ),
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How a tiled image is blended onto the items beneath it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compositing {
    /// Ordinary alpha blending.
    #[default]
    SourceOver,
    /// Additive blending, for fluorescence channels.
    Lighter,
    /// Multiplicative blending.
    Multiply,
    /// Screen blending.
    Screen,
}

/// Options handed to the tiled viewer when an item is created.
///
/// Every field is optional so that option sets can be layered: the loader
/// supplies a base, the object's style supplies overrides, and
/// [`merge`](Self::merge) combines them field by field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Tile source descriptor understood by the viewer.
    pub tile_source: Option<String>,
    /// Plain image URL. Mutually exclusive with `tile_source`.
    pub url: Option<String>,
    /// Load tiles even while the item is fully transparent.
    pub preload: Option<bool>,
    /// Blend mode.
    pub compositing: Option<Compositing>,
    /// Interpolate when magnifying tiles.
    pub smoothing: Option<bool>,
    /// Color drawn where tiles have not arrived yet.
    pub placeholder_fill: Option<Color>,
}

impl ViewerOptions {
    /// Returns `self` with every field that is set in `overrides` replaced.
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        Self {
            tile_source: overrides
                .tile_source
                .clone()
                .or_else(|| self.tile_source.clone()),
            url: overrides.url.clone().or_else(|| self.url.clone()),
            preload: overrides.preload.or(self.preload),
            compositing: overrides.compositing.or(self.compositing),
            smoothing: overrides.smoothing.or(self.smoothing),
            placeholder_fill: overrides.placeholder_fill.or(self.placeholder_fill),
        }
    }

    /// Resolves a style's `overrides` against the data's own tile source.
    ///
    /// The data's tile source is used only when `overrides` names neither a
    /// tile source nor a url.
    pub fn resolve(
        overrides: &Self,
        tile_source: &str,
        object: Option<ObjectId>,
    ) -> Result<Self, SyncError> {
        overrides.validate(object)?;
        if overrides.tile_source.is_some() || overrides.url.is_some() {
            return Ok(overrides.clone());
        }
        let base = Self {
            tile_source: Some(tile_source.to_owned()),
            ..Self::default()
        };
        Ok(base.merge(overrides))
    }

    /// Rejects contradictory option sets.
    pub fn validate(&self, object: Option<ObjectId>) -> Result<(), SyncError> {
        if self.tile_source.is_some() && self.url.is_some() {
            return Err(SyncError::config(
                object,
                "viewer options set both tile_source and url",
            ));
        }
        Ok(())
    }
}
