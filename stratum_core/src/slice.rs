// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-item ranges of shared GPU buffers.
//!
//! Each synchronizer packs its items back to back into shared buffers. A
//! [`Slice`] records where one item lives and what was last applied to it.
//! Between passes the slices of a synchronizer partition `[0, total)`
//! exactly, in item order.

use core::ops::Range;

use crate::data::DataId;
use crate::items::ItemKey;

/// One item's range of the shared buffers.
#[derive(Clone, Debug, PartialEq)]
pub struct Slice<S> {
    /// Item identity.
    pub key: ItemKey,
    /// Load generation of the item's data.
    pub data: DataId,
    /// Transform table slot.
    pub index: usize,
    /// First element.
    pub offset: usize,
    /// Element count.
    pub len: usize,
    /// Inputs last resolved into this range.
    pub snapshot: S,
}

impl<S> Slice<S> {
    /// Element range of this slice.
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// Do both slices hold the same data at the same place?
    ///
    /// When this is `false` every field of the slice must be rewritten.
    #[must_use]
    pub fn same_place<T>(&self, other: &Slice<T>) -> bool {
        self.key == other.key
            && self.data == other.data
            && self.index == other.index
            && self.offset == other.offset
            && self.len == other.len
    }
}

/// Assigns back-to-back offsets to `lens`. Returns the offsets and the total.
#[must_use]
pub fn pack(lens: impl IntoIterator<Item = usize>) -> (Vec<usize>, usize) {
    let mut total = 0;
    let offsets = lens
        .into_iter()
        .map(|len| {
            let offset = total;
            total += len;
            offset
        })
        .collect();
    (offsets, total)
}

/// Do `slices` cover `[0, total)` back to back, without gaps or overlap?
#[must_use]
pub fn is_partition<S>(slices: &[Slice<S>], total: usize) -> bool {
    let mut next = 0;
    for slice in slices {
        if slice.offset != next {
            return false;
        }
        next += slice.len;
    }
    next == total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayerConfigId, LayerId, ObjectId};

    fn slice(offset: usize, len: usize) -> Slice<()> {
        Slice {
            key: ItemKey {
                layer: LayerId(0),
                object: ObjectId(0),
                config: LayerConfigId(0),
            },
            data: DataId(0),
            index: 0,
            offset,
            len,
            snapshot: (),
        }
    }

    #[test]
    fn pack_is_back_to_back() {
        let (offsets, total) = pack([3, 0, 5]);
        assert_eq!(offsets, vec![0, 3, 3]);
        assert_eq!(total, 8);
    }

    #[test]
    fn partition_rejects_gaps_and_short_totals() {
        assert!(is_partition(&[slice(0, 3), slice(3, 2)], 5));
        assert!(!is_partition(&[slice(0, 3), slice(4, 1)], 5));
        assert!(!is_partition(&[slice(0, 3)], 5));
        assert!(is_partition::<()>(&[], 0));
    }

    #[test]
    fn moving_a_slice_changes_its_place() {
        let a = slice(0, 3);
        let mut b = a.clone();
        assert!(a.same_place(&b));
        b.offset = 1;
        assert!(!a.same_place(&b));
    }
}
