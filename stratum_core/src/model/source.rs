// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data source descriptors and the table registry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::TableId;

/// Where an object's or table's data lives.
///
/// The pair is opaque to the synchronizers: it is handed to the
/// [`LoaderFactory`](crate::table::LoaderFactory) and used as the cache key
/// in [`DataStore`](crate::data::DataStore).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataSource {
    /// Format tag, e.g. `"csv"` or `"zarr"`.
    pub format: String,
    /// Path or URL.
    pub location: String,
}

impl DataSource {
    /// Creates a source from its parts.
    #[must_use]
    pub fn new(format: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.format, self.location)
    }
}

/// Maps table ids referenced by attribute specs to their data sources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableIndex(pub BTreeMap<TableId, DataSource>);

impl TableIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a table.
    pub fn insert(&mut self, id: TableId, source: DataSource) {
        self.0.insert(id, source);
    }

    /// Returns a table's source.
    #[must_use]
    pub fn get(&self, id: TableId) -> Option<&DataSource> {
        self.0.get(&id)
    }
}
