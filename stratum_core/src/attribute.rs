// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The attribute resolver.
//!
//! Every per-element visual attribute goes through [`resolve`]. The
//! [`Attribute`] trait supplies what differs between attributes (default,
//! fallback palette, and conversions from column and map values); the
//! pipeline itself is shared:
//!
//! - [`AttributeSpec::Value`] fills every slot with the projected literal.
//! - [`AttributeSpec::Values`] converts a column row by row.
//! - [`AttributeSpec::Groups`] with a resolvable map looks each row's group
//!   name up in the map, falling back to the map default and then to the
//!   attribute default. Each distinct miss is warned about once.
//! - [`AttributeSpec::Groups`] without a resolvable map picks a palette entry
//!   by [`group_hash`], so a group keeps its color across passes and
//!   sessions.
//!
//! Resolution reads tables through the [`DataStore`] and never mutates a
//! data handle.

use core::fmt;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;

use half::f16;

use crate::cancel::CancelToken;
use crate::data::{DataId, DataStore};
use crate::error::ResolveError;
use crate::model::{
    AttributeSpec, Color, MapRef, MapValue, Marker, PropertyMap, PropertyMapId, PropertyMaps,
    TableId, TableIndex,
};
use crate::table::{Column, LoaderFactory};

/// Per-attribute behavior plugged into the shared pipeline.
pub trait Attribute {
    /// Value type.
    type Value: Clone + PartialEq + fmt::Debug + 'static;

    /// Attribute name, for diagnostics.
    const NAME: &'static str;

    /// Expected column type, for diagnostics.
    const EXPECTED: &'static str;

    /// Value used when a group map has neither an entry nor a default.
    fn default_value() -> Self::Value;

    /// Values picked by [`group_hash`] when no map applies. Never empty.
    fn palette() -> &'static [Self::Value];

    /// Converts one column row.
    fn from_column(column: &Column, row: usize) -> Option<Self::Value>;

    /// Converts one untyped property map value.
    fn from_map_value(value: &MapValue) -> Option<Self::Value>;
}

/// Point size in object units.
#[derive(Clone, Copy, Debug)]
pub struct SizeAttribute;

/// Fill color.
#[derive(Clone, Copy, Debug)]
pub struct ColorAttribute;

/// Per-element visibility.
#[derive(Clone, Copy, Debug)]
pub struct VisibilityAttribute;

/// Per-element opacity, clamped to `[0, 1]`.
#[derive(Clone, Copy, Debug)]
pub struct OpacityAttribute;

/// Point marker glyph.
#[derive(Clone, Copy, Debug)]
pub struct MarkerAttribute;

/// Categorical palette for group colors.
pub const GROUP_COLORS: [Color; 10] = [
    Color::from_rgb_u32(0x4e79a7),
    Color::from_rgb_u32(0xf28e2b),
    Color::from_rgb_u32(0xe15759),
    Color::from_rgb_u32(0x76b7b2),
    Color::from_rgb_u32(0x59a14f),
    Color::from_rgb_u32(0xedc948),
    Color::from_rgb_u32(0xb07aa1),
    Color::from_rgb_u32(0xff9da7),
    Color::from_rgb_u32(0x9c755f),
    Color::from_rgb_u32(0xbab0ac),
];

/// Color of elements without any color information.
pub const DEFAULT_COLOR: Color = Color::rgb(0x80, 0x80, 0x80);

#[expect(
    clippy::cast_possible_truncation,
    reason = "attribute values are single precision on the GPU"
)]
fn number_f32(column: &Column, row: usize) -> Option<f32> {
    column.number(row).map(|n| n as f32)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "only integral values in i64 range are cast"
)]
fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() < 9.0e15).then_some(n as i64)
}

impl Attribute for SizeAttribute {
    type Value = f32;
    const NAME: &'static str = "size";
    const EXPECTED: &'static str = "number";

    fn default_value() -> f32 {
        1.0
    }

    fn palette() -> &'static [f32] {
        &[1.0]
    }

    fn from_column(column: &Column, row: usize) -> Option<f32> {
        number_f32(column, row)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "attribute values are single precision on the GPU"
    )]
    fn from_map_value(value: &MapValue) -> Option<f32> {
        match value {
            MapValue::Number(n) => Some(*n as f32),
            MapValue::Bool(_) | MapValue::Text(_) => None,
        }
    }
}

impl Attribute for ColorAttribute {
    type Value = Color;
    const NAME: &'static str = "color";
    const EXPECTED: &'static str = "color (hex string or 0xRRGGBB integer)";

    fn default_value() -> Color {
        DEFAULT_COLOR
    }

    fn palette() -> &'static [Color] {
        &GROUP_COLORS
    }

    fn from_column(column: &Column, row: usize) -> Option<Color> {
        match column {
            Column::Text(v) => Color::from_hex(v.get(row)?),
            Column::Bool(_) => None,
            _ => integral(column.number(row)?)
                .and_then(|n| u32::try_from(n).ok())
                .map(Color::from_rgb_u32),
        }
    }

    fn from_map_value(value: &MapValue) -> Option<Color> {
        match value {
            MapValue::Text(s) => Color::from_hex(s),
            MapValue::Number(n) => integral(*n)
                .and_then(|n| u32::try_from(n).ok())
                .map(Color::from_rgb_u32),
            MapValue::Bool(_) => None,
        }
    }
}

impl Attribute for VisibilityAttribute {
    type Value = bool;
    const NAME: &'static str = "visibility";
    const EXPECTED: &'static str = "boolean";

    fn default_value() -> bool {
        true
    }

    fn palette() -> &'static [bool] {
        &[true]
    }

    fn from_column(column: &Column, row: usize) -> Option<bool> {
        match column {
            Column::Bool(v) => v.get(row).copied(),
            Column::Text(v) => match v.get(row)?.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => column.number(row).map(|n| n != 0.0),
        }
    }

    fn from_map_value(value: &MapValue) -> Option<bool> {
        match value {
            MapValue::Bool(b) => Some(*b),
            MapValue::Number(n) => Some(*n != 0.0),
            MapValue::Text(_) => None,
        }
    }
}

impl Attribute for OpacityAttribute {
    type Value = f32;
    const NAME: &'static str = "opacity";
    const EXPECTED: &'static str = "number";

    fn default_value() -> f32 {
        1.0
    }

    fn palette() -> &'static [f32] {
        &[1.0]
    }

    fn from_column(column: &Column, row: usize) -> Option<f32> {
        number_f32(column, row).map(|o| o.clamp(0.0, 1.0))
    }

    fn from_map_value(value: &MapValue) -> Option<f32> {
        SizeAttribute::from_map_value(value).map(|o| o.clamp(0.0, 1.0))
    }
}

impl Attribute for MarkerAttribute {
    type Value = Marker;
    const NAME: &'static str = "marker";
    const EXPECTED: &'static str = "marker name or index";

    fn default_value() -> Marker {
        Marker::Circle
    }

    fn palette() -> &'static [Marker] {
        &Marker::ALL
    }

    fn from_column(column: &Column, row: usize) -> Option<Marker> {
        match column {
            Column::Text(v) => Marker::from_name(v.get(row)?),
            Column::Bool(_) => None,
            _ => integral(column.number(row)?).and_then(Marker::from_index),
        }
    }

    fn from_map_value(value: &MapValue) -> Option<Marker> {
        match value {
            MapValue::Text(s) => Marker::from_name(s),
            MapValue::Number(n) => integral(*n).and_then(Marker::from_index),
            MapValue::Bool(_) => None,
        }
    }
}

/// Quantizes an opacity in `[0, 1]` to a byte.
#[must_use]
pub fn opacity_byte(opacity: f32) -> u8 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the value is clamped to [0, 255] first"
    )]
    let byte = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    byte
}

/// Narrows a size to the half-precision GPU format.
#[must_use]
pub fn size_half(size: f32) -> f16 {
    f16::from_f32(size)
}

/// djb2 over the UTF-16 code units of `json`, with wrapping 32-bit
/// arithmetic.
///
/// `json` is the JSON serialization of a group value (see
/// [`Column::group_json`]), so the string group `"1"` and the numeric group
/// `1` hash differently.
#[must_use]
pub fn group_hash(json: &str) -> u32 {
    json.encode_utf16().fold(5381_u32, |hash, unit| {
        hash.wrapping_mul(33).wrapping_add(u32::from(unit))
    })
}

/// Palette entry for a group without a map.
#[must_use]
pub fn palette_pick<A: Attribute>(json: &str) -> &'static A::Value {
    let palette = A::palette();
    &palette[group_hash(json) as usize % palette.len()]
}

/// Distinct misses remembered before the log starts over.
pub const MAX_MISSES: usize = 4096;

/// Remembers which group-map misses were already reported.
///
/// Holds at most [`MAX_MISSES`] entries; once full it forgets everything,
/// so a long-running session may repeat a warning.
#[derive(Debug, Default)]
pub struct MissLog {
    seen: RefCell<HashSet<(&'static str, TableId, String, String)>>,
}

impl MissLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Warns about a missing group unless this exact miss was seen before.
    /// Returns `true` if a warning was emitted.
    pub fn warn_once(
        &self,
        attribute: &'static str,
        table: TableId,
        column: &str,
        group: &str,
    ) -> bool {
        let miss = (attribute, table, column.to_owned(), group.to_owned());
        let mut seen = self.seen.borrow_mut();
        if seen.contains(&miss) {
            return false;
        }
        if seen.len() >= MAX_MISSES {
            seen.clear();
        }
        seen.insert(miss);
        log::warn!(
            "no {attribute} mapping for group {group:?} of table {table} column {column:?}; using default"
        );
        true
    }

    /// Forgets every reported miss.
    pub fn clear(&self) {
        self.seen.borrow_mut().clear();
    }

    /// Number of distinct misses reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    /// Returns `true` if no miss was reported yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }
}

/// Everything [`resolve`] reads besides the spec itself.
pub struct ResolveContext<'a, F: LoaderFactory> {
    /// Data cache the tables are read through.
    pub store: &'a DataStore<F>,
    /// Table registry of the scene.
    pub tables: &'a TableIndex,
    /// Named property maps of the scene.
    pub maps: &'a PropertyMaps,
    /// Miss deduplication, owned by the calling synchronizer.
    pub misses: &'a MissLog,
    /// Cancellation of the calling pass.
    pub cancel: &'a CancelToken,
}

impl<F: LoaderFactory> fmt::Debug for ResolveContext<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveContext")
            .field("tables", self.tables)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Converts a named, untyped map into a typed one. Entries that do not
/// convert are dropped with a warning.
fn typed_map<A: Attribute>(
    id: PropertyMapId,
    map: &PropertyMap<MapValue>,
) -> PropertyMap<A::Value> {
    let convert = |group: &str, value: &MapValue| {
        let typed = A::from_map_value(value);
        if typed.is_none() {
            log::warn!(
                "property map {id} entry {group:?}: {value:?} is not a valid {}",
                A::NAME
            );
        }
        typed
    };
    PropertyMap {
        entries: map
            .entries
            .iter()
            .filter_map(|(group, value)| Some((group.clone(), convert(group, value)?)))
            .collect(),
        default: map
            .default
            .as_ref()
            .and_then(|value| convert("<default>", value)),
    }
}

fn check_len(column: &str, expected: usize, actual: usize) -> Result<(), ResolveError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ResolveError::LengthMismatch {
            column: column.to_owned(),
            expected,
            actual,
        })
    }
}

/// Fills `out` with the projected values of `spec`.
///
/// `out.len()` is the number of elements of the item being styled; table
/// columns must have exactly that many rows.
pub async fn resolve<A, P, F>(
    spec: &AttributeSpec<A::Value>,
    out: &mut [P],
    ctx: &ResolveContext<'_, F>,
    project: impl Fn(&A::Value) -> P,
) -> Result<(), ResolveError>
where
    A: Attribute,
    F: LoaderFactory,
{
    match spec {
        AttributeSpec::Value(value) => {
            for slot in out.iter_mut() {
                *slot = project(value);
            }
        }
        AttributeSpec::Values { table, column: name } => {
            let column = ctx.store.column(*table, name, ctx.tables, ctx.cancel).await?;
            check_len(name, out.len(), column.len())?;
            for (row, slot) in out.iter_mut().enumerate() {
                let value = A::from_column(&column, row).ok_or_else(|| ResolveError::ColumnType {
                    column: name.clone(),
                    row,
                    expected: A::EXPECTED,
                })?;
                *slot = project(&value);
            }
        }
        AttributeSpec::Groups {
            table,
            column: name,
            map,
        } => {
            let column = ctx.store.column(*table, name, ctx.tables, ctx.cancel).await?;
            check_len(name, out.len(), column.len())?;
            let map: Option<Cow<'_, PropertyMap<A::Value>>> = match map {
                None => None,
                Some(MapRef::Inline(map)) => Some(Cow::Borrowed(map)),
                Some(MapRef::Named(id)) => {
                    let named = ctx.maps.get(*id).map(|map| Cow::Owned(typed_map::<A>(*id, map)));
                    if named.is_none() {
                        log::debug!(
                            "property map {id} is not registered; hashing {} groups",
                            A::NAME
                        );
                    }
                    named
                }
            };
            let fallback = A::default_value();
            for (row, slot) in out.iter_mut().enumerate() {
                let value = match &map {
                    Some(map) => {
                        let key = column.group_key(row).unwrap_or_default();
                        match map.get(&key) {
                            Some(value) => value,
                            None => {
                                ctx.misses.warn_once(A::NAME, *table, name, &key);
                                map.default.as_ref().unwrap_or(&fallback)
                            }
                        }
                    }
                    None => palette_pick::<A>(&column.group_json(row).unwrap_or_default()),
                };
                *slot = project(value);
            }
        }
    }
    Ok(())
}

/// Resolves `spec` into a fresh vector of `len` projected values.
pub async fn resolve_vec<A, P, F>(
    spec: &AttributeSpec<A::Value>,
    len: usize,
    ctx: &ResolveContext<'_, F>,
    project: impl Fn(&A::Value) -> P,
) -> Result<Vec<P>, ResolveError>
where
    A: Attribute,
    P: Clone + Default,
    F: LoaderFactory,
{
    let mut out = vec![P::default(); len];
    resolve::<A, P, F>(spec, &mut out, ctx, project).await?;
    Ok(out)
}

/// What an attribute's resolved values depend on besides the spec.
///
/// Two equal snapshots resolve to identical values, so a field whose
/// snapshot is unchanged does not need to be resolved or uploaded again.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSnapshot<T> {
    spec: AttributeSpec<T>,
    named_map: Option<PropertyMap<MapValue>>,
    table: Option<DataId>,
}

impl<T: Clone + PartialEq> FieldSnapshot<T> {
    /// Captures the current inputs of `spec`.
    ///
    /// Loads the referenced table (usually a cache hit) to learn its load
    /// generation.
    pub async fn capture<F: LoaderFactory>(
        spec: &AttributeSpec<T>,
        ctx: &ResolveContext<'_, F>,
    ) -> Result<Self, ResolveError> {
        let (table, named_map) = match spec {
            AttributeSpec::Value(_) => (None, None),
            AttributeSpec::Values { table, .. } => (Some(*table), None),
            AttributeSpec::Groups { table, map, .. } => {
                let named = match map {
                    Some(MapRef::Named(id)) => ctx.maps.get(*id).cloned(),
                    _ => None,
                };
                (Some(*table), named)
            }
        };
        let table = match table {
            Some(table) => Some(ctx.store.table_by_id(table, ctx.tables, ctx.cancel).await?.id),
            None => None,
        };
        Ok(Self {
            spec: spec.clone(),
            named_map,
            table,
        })
    }
}

#[cfg(test)]
mod tests {
    use pollster::block_on;

    use super::*;
    use crate::model::DataSource;
    use crate::test_support::MemoryLoader;

    struct Fixture {
        store: DataStore<MemoryLoader>,
        tables: TableIndex,
        maps: PropertyMaps,
        misses: MissLog,
        cancel: CancelToken,
    }

    impl Fixture {
        fn new() -> Self {
            let source = DataSource::new("mem", "cells");
            let loader = MemoryLoader::new().with_table(
                source.clone(),
                vec![
                    ("area", Column::F64(vec![2.0, 4.0, 8.0])),
                    (
                        "kind",
                        Column::Text(vec!["T cell".into(), "B cell".into(), "T cell".into()]),
                    ),
                    ("label", Column::Text(vec!["x".into(), "y".into(), "z".into()])),
                    ("cluster", Column::I64(vec![0, 1, 7])),
                ],
            );
            let mut tables = TableIndex::new();
            tables.insert(TableId(1), source);
            Self {
                store: DataStore::new(loader),
                tables,
                maps: PropertyMaps::new(),
                misses: MissLog::new(),
                cancel: CancelToken::new(),
            }
        }

        fn ctx(&self) -> ResolveContext<'_, MemoryLoader> {
            ResolveContext {
                store: &self.store,
                tables: &self.tables,
                maps: &self.maps,
                misses: &self.misses,
                cancel: &self.cancel,
            }
        }
    }

    fn groups<T>(column: &str, map: Option<MapRef<T>>) -> AttributeSpec<T> {
        AttributeSpec::Groups {
            table: TableId(1),
            column: column.into(),
            map,
        }
    }

    #[test]
    fn djb2_matches_reference_values() {
        assert_eq!(group_hash(""), 5381);
        assert_eq!(group_hash("\"a\""), 193_417_258);
        assert_eq!(group_hash("\"T cell\""), 1_886_079_229);
    }

    #[test]
    fn literals_fill_every_slot() {
        let f = Fixture::new();
        let out = block_on(resolve_vec::<SizeAttribute, _, _>(
            &AttributeSpec::Value(3.0),
            4,
            &f.ctx(),
            |&s| s * 2.0,
        ))
        .unwrap();
        assert_eq!(out, vec![6.0; 4]);
    }

    #[test]
    fn value_columns_convert_row_by_row() {
        let f = Fixture::new();
        let spec = AttributeSpec::Values {
            table: TableId(1),
            column: "area".into(),
        };
        let out = block_on(resolve_vec::<SizeAttribute, _, _>(&spec, 3, &f.ctx(), |&s| s)).unwrap();
        assert_eq!(out, vec![2.0, 4.0, 8.0]);
    }

    #[test]
    fn non_numeric_values_are_errors() {
        let f = Fixture::new();
        let spec = AttributeSpec::Values {
            table: TableId(1),
            column: "label".into(),
        };
        let err = block_on(resolve_vec::<SizeAttribute, f32, _>(&spec, 3, &f.ctx(), |&s| s))
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::ColumnType {
                column: "label".into(),
                row: 0,
                expected: "number",
            }
        );
    }

    #[test]
    fn column_length_must_match_the_item() {
        let f = Fixture::new();
        let spec = AttributeSpec::Values {
            table: TableId(1),
            column: "area".into(),
        };
        let err = block_on(resolve_vec::<SizeAttribute, f32, _>(&spec, 5, &f.ctx(), |&s| s))
            .unwrap_err();
        assert!(
            matches!(err, ResolveError::LengthMismatch { expected: 5, actual: 3, .. }),
            "unexpected {err:?}"
        );
    }

    #[test]
    fn empty_items_resolve_to_nothing() {
        let f = Fixture::new();
        let spec = AttributeSpec::Value(DEFAULT_COLOR);
        let out =
            block_on(resolve_vec::<ColorAttribute, Color, _>(&spec, 0, &f.ctx(), |&c| c)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn group_maps_fall_back_to_map_default_then_attribute_default() {
        let f = Fixture::new();
        let red = Color::rgb(255, 0, 0);
        let blue = Color::rgb(0, 0, 255);
        let with_default = PropertyMap::new().with("T cell", red).with_default(blue);
        let out = block_on(resolve_vec::<ColorAttribute, _, _>(
            &groups("kind", Some(MapRef::Inline(with_default))),
            3,
            &f.ctx(),
            |&c| c,
        ))
        .unwrap();
        assert_eq!(out, vec![red, blue, red]);

        let without_default = PropertyMap::new().with("T cell", red);
        let out = block_on(resolve_vec::<ColorAttribute, _, _>(
            &groups("kind", Some(MapRef::Inline(without_default))),
            3,
            &f.ctx(),
            |&c| c,
        ))
        .unwrap();
        assert_eq!(out, vec![red, DEFAULT_COLOR, red]);
    }

    #[test]
    fn miss_log_stays_bounded() {
        let misses = MissLog::new();
        for group in 0..MAX_MISSES {
            misses.warn_once("size", TableId(1), "kind", &group.to_string());
        }
        assert_eq!(misses.len(), MAX_MISSES);
        assert!(!misses.warn_once("size", TableId(1), "kind", "0"));
        assert!(misses.warn_once("size", TableId(1), "kind", "overflow"));
        assert_eq!(misses.len(), 1);
        misses.clear();
        assert!(misses.is_empty());
    }

    #[test]
    fn misses_are_reported_once_per_pattern() {
        let f = Fixture::new();
        let map = MapRef::Inline(PropertyMap::new().with("nothing", 1.0));
        for _ in 0..3 {
            block_on(resolve_vec::<SizeAttribute, f32, _>(
                &groups("kind", Some(map.clone())),
                3,
                &f.ctx(),
                |&s| s,
            ))
            .unwrap();
        }
        // "T cell" and "B cell".
        assert_eq!(f.misses.len(), 2);
    }

    #[test]
    fn named_maps_are_converted_from_map_values() {
        let mut f = Fixture::new();
        f.maps.insert(
            PropertyMapId(5),
            PropertyMap::new()
                .with("0", MapValue::Text("square".into()))
                .with("1", MapValue::Number(3.0))
                .with("7", MapValue::Bool(true)),
        );
        let out = block_on(resolve_vec::<MarkerAttribute, _, _>(
            &groups("cluster", Some(MapRef::Named(PropertyMapId(5)))),
            3,
            &f.ctx(),
            |&m| m,
        ))
        .unwrap();
        // The boolean entry does not convert, so group 7 misses.
        assert_eq!(out, vec![Marker::Square, Marker::TriangleUp, Marker::Circle]);
    }

    #[test]
    fn unmapped_groups_hash_deterministically() {
        let f = Fixture::new();
        let spec = groups("kind", None);
        let resolve = |spec: &AttributeSpec<Color>| {
            block_on(resolve_vec::<ColorAttribute, _, _>(spec, 3, &f.ctx(), |&c| c))
        };
        let first = resolve(&spec).unwrap();
        let second = resolve(&spec).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], first[2], "same group, different color");
        assert_eq!(first[0], GROUP_COLORS[9]);
        // An unregistered named map behaves like no map.
        let dangling = groups("kind", Some(MapRef::Named(PropertyMapId(99))));
        let third = resolve(&dangling).unwrap();
        assert_eq!(first, third);
        assert!(f.misses.is_empty());
    }

    #[test]
    fn opacity_quantizes_and_clamps() {
        assert_eq!(opacity_byte(0.0), 0);
        assert_eq!(opacity_byte(1.0), 255);
        assert_eq!(opacity_byte(0.5), 128);
        assert_eq!(opacity_byte(7.0), 255);
    }

    #[test]
    fn snapshots_track_named_maps_and_table_generations() {
        let mut f = Fixture::new();
        let spec: AttributeSpec<Color> = groups("kind", Some(MapRef::Named(PropertyMapId(1))));
        let before = block_on(FieldSnapshot::capture(&spec, &f.ctx())).unwrap();
        let map = PropertyMap::new().with("T cell", MapValue::Text("#fff".into()));
        f.maps.insert(PropertyMapId(1), map);
        let after_map = block_on(FieldSnapshot::capture(&spec, &f.ctx())).unwrap();
        assert_ne!(before, after_map);
        let source = DataSource::new("mem", "cells");
        f.store.unload(&source);
        let after_reload = block_on(FieldSnapshot::capture(&spec, &f.ctx())).unwrap();
        assert_ne!(after_map, after_reload);
    }
}
