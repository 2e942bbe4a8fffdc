// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The explicit data cache shared by all synchronizers.
//!
//! A [`DataStore`] wraps a [`LoaderFactory`] and memoizes every handle it
//! produces, keyed by [`DataSource`]. Entries are only removed by
//! [`unload`](DataStore::unload) or [`clear`](DataStore::clear); nothing
//! expires on its own.
//!
//! Each successful load is stamped with a fresh [`DataId`]. Synchronizers
//! record the id in their slices, so reloading a source (after an unload)
//! is seen as an identity change and forces a re-upload even when the
//! source string is unchanged.
//!
//! The store is single-threaded. No `RefCell` borrow is held across an
//! await, so concurrent passes may interleave freely; two passes racing to
//! load the same source both load it and the later insert wins.

use core::fmt;
use core::future::Future;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::model::{DataSource, TableId, TableIndex};
use crate::table::{Column, LoaderFactory, Table};

/// Load generation of a cached handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataId(pub u64);

/// A cached handle together with its load generation.
pub struct Loaded<T> {
    /// Load generation.
    pub id: DataId,
    /// The handle.
    pub data: Rc<T>,
}

impl<T> Clone for Loaded<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            data: Rc::clone(&self.data),
        }
    }
}

impl<T> fmt::Debug for Loaded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loaded")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

type Cache<T> = RefCell<HashMap<DataSource, Loaded<T>>>;

struct CachedColumn {
    source: DataSource,
    table: DataId,
    column: Rc<Column>,
}

/// Caches loader results for the lifetime of a project.
pub struct DataStore<F: LoaderFactory> {
    factory: F,
    next_id: Cell<u64>,
    tables: Cache<F::Table>,
    images: Cache<F::Image>,
    labels: Cache<F::Labels>,
    points: Cache<F::Points>,
    shapes: Cache<F::Shapes>,
    columns: RefCell<HashMap<(TableId, String), CachedColumn>>,
}

impl<F: LoaderFactory> fmt::Debug for DataStore<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("next_id", &self.next_id.get())
            .field("tables", &self.tables.borrow().len())
            .field("images", &self.images.borrow().len())
            .field("labels", &self.labels.borrow().len())
            .field("points", &self.points.borrow().len())
            .field("shapes", &self.shapes.borrow().len())
            .field("columns", &self.columns.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<F: LoaderFactory> DataStore<F> {
    /// Creates an empty store around a loader factory.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            next_id: Cell::new(0),
            tables: RefCell::default(),
            images: RefCell::default(),
            labels: RefCell::default(),
            points: RefCell::default(),
            shapes: RefCell::default(),
            columns: RefCell::default(),
        }
    }

    /// The wrapped factory.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn stamp(&self) -> DataId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        DataId(id)
    }

    async fn cached<T, Fut>(
        &self,
        cache: &Cache<T>,
        source: &DataSource,
        cancel: &CancelToken,
        load: impl FnOnce() -> Fut,
    ) -> Result<Loaded<T>, LoadError>
    where
        Fut: Future<Output = Result<T, LoadError>>,
    {
        if let Some(hit) = cache.borrow().get(source) {
            return Ok(hit.clone());
        }
        let data = load().await?;
        cancel.check_load()?;
        let loaded = Loaded {
            id: self.stamp(),
            data: Rc::new(data),
        };
        cache.borrow_mut().insert(source.clone(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the table stored at `source`, loading it on first use.
    pub async fn table(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<Loaded<F::Table>, LoadError> {
        self.cached(&self.tables, source, cancel, || {
            self.factory.load_table(source, cancel)
        })
        .await
    }

    /// Returns a registered table by id.
    pub async fn table_by_id(
        &self,
        table: TableId,
        index: &TableIndex,
        cancel: &CancelToken,
    ) -> Result<Loaded<F::Table>, LoadError> {
        let source = index
            .get(table)
            .ok_or_else(|| LoadError::NotFound(format!("table {table} is not registered")))?;
        self.table(source, cancel).await
    }

    /// Returns one column of a registered table, loading it on first use.
    ///
    /// Columns are cached per table id and column name, and tied to the
    /// load generation of their table: once the table is reloaded the column
    /// is loaded again too.
    pub async fn column(
        &self,
        table: TableId,
        name: &str,
        index: &TableIndex,
        cancel: &CancelToken,
    ) -> Result<Rc<Column>, LoadError> {
        let source = index
            .get(table)
            .ok_or_else(|| LoadError::NotFound(format!("table {table} is not registered")))?;
        let loaded = self.table(source, cancel).await?;
        let key = (table, name.to_owned());
        if let Some(hit) = self.columns.borrow().get(&key)
            && hit.table == loaded.id
        {
            return Ok(Rc::clone(&hit.column));
        }
        if !loaded.data.columns().iter().any(|c| c == name) {
            return Err(LoadError::MissingColumn {
                table,
                column: name.to_owned(),
            });
        }
        let column = Rc::new(loaded.data.load_column(name, cancel).await?);
        cancel.check_load()?;
        self.columns.borrow_mut().insert(
            key,
            CachedColumn {
                source: source.clone(),
                table: loaded.id,
                column: Rc::clone(&column),
            },
        );
        Ok(column)
    }

    /// Returns the tiled image stored at `source`.
    pub async fn image(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<Loaded<F::Image>, LoadError> {
        self.cached(&self.images, source, cancel, || {
            self.factory.load_image(source, cancel)
        })
        .await
    }

    /// Returns the label image stored at `source`.
    pub async fn labels(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<Loaded<F::Labels>, LoadError> {
        self.cached(&self.labels, source, cancel, || {
            self.factory.load_labels(source, cancel)
        })
        .await
    }

    /// Returns the point cloud stored at `source`.
    pub async fn points(
        &self,
        source: &DataSource,
        tables: &TableIndex,
        cancel: &CancelToken,
    ) -> Result<Loaded<F::Points>, LoadError> {
        self.cached(&self.points, source, cancel, || {
            self.factory.load_points(source, tables, cancel)
        })
        .await
    }

    /// Returns the shape collection stored at `source`.
    pub async fn shapes(
        &self,
        source: &DataSource,
        cancel: &CancelToken,
    ) -> Result<Loaded<F::Shapes>, LoadError> {
        self.cached(&self.shapes, source, cancel, || {
            self.factory.load_shapes(source, cancel)
        })
        .await
    }

    /// Drops every handle loaded from `source`, including cached columns of
    /// a table stored there. Returns `true` if anything was evicted.
    ///
    /// Handles still referenced by an in-flight pass stay alive until that
    /// pass drops them.
    pub fn unload(&self, source: &DataSource) -> bool {
        let mut evicted = false;
        evicted |= self.tables.borrow_mut().remove(source).is_some();
        evicted |= self.images.borrow_mut().remove(source).is_some();
        evicted |= self.labels.borrow_mut().remove(source).is_some();
        evicted |= self.points.borrow_mut().remove(source).is_some();
        evicted |= self.shapes.borrow_mut().remove(source).is_some();
        self.columns
            .borrow_mut()
            .retain(|_, cached| cached.source != *source);
        if evicted {
            log::debug!("unloaded {source}");
        }
        evicted
    }

    /// Drops every cached handle.
    pub fn clear(&self) {
        self.tables.borrow_mut().clear();
        self.images.borrow_mut().clear();
        self.labels.borrow_mut().clear();
        self.points.borrow_mut().clear();
        self.shapes.borrow_mut().clear();
        self.columns.borrow_mut().clear();
    }

    /// Returns `true` if a handle for `source` is cached.
    #[must_use]
    pub fn contains(&self, source: &DataSource) -> bool {
        self.tables.borrow().contains_key(source)
            || self.images.borrow().contains_key(source)
            || self.labels.borrow().contains_key(source)
            || self.points.borrow().contains_key(source)
            || self.shapes.borrow().contains_key(source)
    }
}

#[cfg(test)]
mod tests {
    use pollster::block_on;

    use super::*;
    use crate::test_support::MemoryLoader;

    fn fixture() -> (DataStore<MemoryLoader>, TableIndex, DataSource) {
        let source = DataSource::new("mem", "cells");
        let loader = MemoryLoader::new().with_table(
            source.clone(),
            vec![("area", Column::F64(vec![1.0, 2.0]))],
        );
        let mut index = TableIndex::new();
        index.insert(TableId(1), source.clone());
        (DataStore::new(loader), index, source)
    }

    #[test]
    fn repeated_loads_hit_the_cache() {
        let (store, _, source) = fixture();
        let cancel = CancelToken::new();
        let a = block_on(store.table(&source, &cancel)).unwrap();
        let b = block_on(store.table(&source, &cancel)).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.factory().loads(&source), 1);
    }

    #[test]
    fn unload_forces_a_new_generation() {
        let (store, index, source) = fixture();
        let cancel = CancelToken::new();
        let first = block_on(store.table(&source, &cancel)).unwrap();
        block_on(store.column(TableId(1), "area", &index, &cancel)).unwrap();
        assert!(store.unload(&source));
        assert!(!store.contains(&source));
        let second = block_on(store.table(&source, &cancel)).unwrap();
        assert!(second.id > first.id, "{:?} !> {:?}", second.id, first.id);
        assert!(!store.unload(&DataSource::new("mem", "nothing")));
    }

    #[test]
    fn columns_are_cached_per_table_generation() {
        let (store, index, _) = fixture();
        let cancel = CancelToken::new();
        let a = block_on(store.column(TableId(1), "area", &index, &cancel)).unwrap();
        let b = block_on(store.column(TableId(1), "area", &index, &cancel)).unwrap();
        assert!(Rc::ptr_eq(&a, &b), "second lookup reloaded the column");
        assert_eq!(*a, Column::F64(vec![1.0, 2.0]));
    }

    #[test]
    fn missing_tables_and_columns_are_reported() {
        let (store, index, _) = fixture();
        let cancel = CancelToken::new();
        let err = block_on(store.column(TableId(1), "perimeter", &index, &cancel)).unwrap_err();
        assert_eq!(
            err,
            LoadError::MissingColumn {
                table: TableId(1),
                column: "perimeter".into(),
            }
        );
        let err = block_on(store.column(TableId(9), "area", &index, &cancel)).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)), "unexpected {err:?}");
    }

    #[test]
    fn cancelled_loads_are_not_cached() {
        let (store, _, source) = fixture();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(
            block_on(store.table(&source, &cancel)).unwrap_err(),
            LoadError::Cancelled
        );
        assert!(!store.contains(&source));
    }
}
