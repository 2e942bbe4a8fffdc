// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scanline encoding of polygons with holes.
//!
//! A shape item is rasterized on the GPU by testing each fragment against the
//! edges that can possibly cross its row. To make that lookup cheap, the
//! item's bounding box is cut into horizontal bands ("scanlines") and every
//! edge is binned into the bands its y-extent touches.
//!
//! # Buffer layout
//!
//! The output is a flat array of 32-bit words. Words are `u32` or the bits of
//! an `f32`, depending on position. Offsets count words from the start of
//! this item's buffer.
//!
//! ```text
//! header:   S × [block_offset: u32, shape_count: u32, x_min: f32, x_max: f32]
//! scanline: mask: 4 × u32                      (one bit per X-bin, 128 bins)
//!           shape_count × block
//! block:    [polygon: u32, edge_count: u32, x_min: f32, x_max: f32]
//!           edge_count × [x0: f32, y0: f32, x1: f32, y1: f32]
//! ```
//!
//! `block_offset` points at the scanline's mask. Edges and x extents are in
//! object space; only the scanline and bin indices use coordinates
//! normalized to the bounds. Scanlines without edges keep their mask (all
//! zero) and carry `x_min = +∞`, `x_max = -∞`.
//!
//! With `n(e)` the edge's bounding box normalized to the bounds, edge `e`
//! belongs to scanline `s` when
//! `s ∈ [floor(S·min_y(n(e))), ceil(S·max_y(n(e)))] ∩ [0, S − 1]`, and sets
//! mask bins `[floor(128·min_x(n(e))), ceil(128·max_x(n(e)))] ∩ [0, 127]` in
//! every scanline it belongs to. Rings close
//! implicitly; rings with fewer than three vertices and zero-length edges are
//! skipped. Holes are binned exactly like exteriors and share their
//! polygon's block, so an even-odd test over the block handles them.
//! Within a scanline, blocks appear in polygon order.
//!
//! Encoding uses single-precision arithmetic throughout and is
//! bit-reproducible.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Number of X-bins per scanline mask.
pub const NUM_BINS: u32 = 128;

/// Words per header entry.
pub const HEADER_WORDS: usize = 4;

/// Words in a scanline's bin mask.
pub const MASK_WORDS: usize = (NUM_BINS / 32) as usize;

/// Words in a polygon block header.
pub const BLOCK_WORDS: usize = 4;

/// Words per edge.
pub const EDGE_WORDS: usize = 4;

/// A polygon with an exterior ring and any number of hole rings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Outer ring. The closing edge back to the first vertex is implicit.
    pub exterior: Vec<Point>,
    /// Inner rings.
    #[serde(default)]
    pub holes: Vec<Vec<Point>>,
}

impl Polygon {
    /// Creates a polygon without holes.
    #[must_use]
    pub fn new(exterior: Vec<Point>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    /// Adds a hole, builder style.
    #[must_use]
    pub fn with_hole(mut self, hole: Vec<Point>) -> Self {
        self.holes.push(hole);
        self
    }

    /// Bounding box of the exterior ring, or `None` if it is empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.exterior.iter();
        let first = points.next()?;
        Some(points.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)))
    }

    fn rings(&self) -> impl Iterator<Item = &[Point]> {
        core::iter::once(self.exterior.as_slice()).chain(self.holes.iter().map(Vec::as_slice))
    }
}

/// A decoded header entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanlineHeader {
    /// Word offset of the scanline's mask.
    pub block_offset: u32,
    /// Number of polygon blocks.
    pub shape_count: u32,
    /// Smallest x touched by an edge in this scanline.
    pub x_min: f32,
    /// Largest x touched by an edge in this scanline.
    pub x_max: f32,
}

/// A decoded polygon block.
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonBlock {
    /// Polygon index within the item.
    pub polygon: u32,
    /// Smallest x of the polygon's edges in this scanline.
    pub x_min: f32,
    /// Largest x of the polygon's edges in this scanline.
    pub x_max: f32,
    /// Edges as `[x0, y0, x1, y1]`.
    pub edges: Vec<[f32; 4]>,
}

struct Block {
    polygon: u32,
    x_min: f32,
    x_max: f32,
    edges: Vec<[f32; 4]>,
}

struct Line {
    mask: [u32; MASK_WORDS],
    x_min: f32,
    x_max: f32,
    blocks: Vec<Block>,
}

impl Line {
    fn new() -> Self {
        Self {
            mask: [0; MASK_WORDS],
            x_min: f32::INFINITY,
            x_max: f32::NEG_INFINITY,
            blocks: Vec::new(),
        }
    }

    fn add(&mut self, polygon: u32, edge: [f32; 4], bins: Option<(u32, u32)>) {
        let [x0, _, x1, _] = edge;
        let (x_lo, x_hi) = (x0.min(x1), x0.max(x1));
        if self.blocks.last().is_none_or(|block| block.polygon != polygon) {
            self.blocks.push(Block {
                polygon,
                x_min: f32::INFINITY,
                x_max: f32::NEG_INFINITY,
                edges: Vec::new(),
            });
        }
        let Some(block) = self.blocks.last_mut() else {
            return;
        };
        block.edges.push(edge);
        block.x_min = block.x_min.min(x_lo);
        block.x_max = block.x_max.max(x_hi);
        self.x_min = self.x_min.min(x_lo);
        self.x_max = self.x_max.max(x_hi);
        if let Some((first, last)) = bins {
            for bin in first..=last {
                self.mask[(bin / 32) as usize] |= 1 << (bin % 32);
            }
        }
    }
}

/// `[floor(n·lo), ceil(n·hi)] ∩ [0, n − 1]`, or `None` if empty.
#[expect(
    clippy::cast_possible_truncation,
    reason = "values are clamped into u32 range first"
)]
fn index_range(lo: f32, hi: f32, n: u32) -> Option<(u32, u32)> {
    let scale = n as f32;
    let first = (lo * scale).floor().max(0.0);
    let last = (hi * scale).ceil().min((n - 1) as f32);
    (first <= last).then_some((first as u32, last as u32))
}

fn word(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// The encoded scanline buffer of one shape item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanlineBuffer {
    num_scanlines: u32,
    words: Vec<u32>,
}

impl ScanlineBuffer {
    /// Encodes `polygons` over `num_scanlines` bands of `bounds`.
    ///
    /// Polygon indices in the output are positions in `polygons`.
    /// `num_scanlines` must be at least one.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "encoded coordinates are single precision"
    )]
    pub fn encode(polygons: &[Polygon], bounds: Rect, num_scanlines: u32) -> Self {
        let num_scanlines = num_scanlines.max(1);
        let sx = if bounds.width() > 0.0 { 1.0 / bounds.width() } else { 0.0 };
        let sy = if bounds.height() > 0.0 { 1.0 / bounds.height() } else { 0.0 };
        let normalize = |x: f64, y: f64| {
            (
                ((x - bounds.x0) * sx) as f32,
                ((y - bounds.y0) * sy) as f32,
            )
        };

        let mut lines: Vec<Line> = (0..num_scanlines).map(|_| Line::new()).collect();

        for (polygon, shape) in polygons.iter().enumerate() {
            let polygon = word(polygon);
            for ring in shape.rings().filter(|ring| ring.len() >= 3) {
                for (i, &start) in ring.iter().enumerate() {
                    let end = ring[(i + 1) % ring.len()];
                    let edge = [start.x as f32, start.y as f32, end.x as f32, end.y as f32];
                    if edge[0] == edge[2] && edge[1] == edge[3] {
                        continue;
                    }
                    let (nx_lo, ny_lo) = normalize(start.x.min(end.x), start.y.min(end.y));
                    let (nx_hi, ny_hi) = normalize(start.x.max(end.x), start.y.max(end.y));
                    let Some((first, last)) = index_range(ny_lo, ny_hi, num_scanlines) else {
                        continue;
                    };
                    let bins = index_range(nx_lo, nx_hi, NUM_BINS);
                    for s in first..=last {
                        lines[s as usize].add(polygon, edge, bins);
                    }
                }
            }
        }

        let header_len = num_scanlines as usize * HEADER_WORDS;
        let mut words = vec![0_u32; header_len];
        for (s, line) in lines.iter().enumerate() {
            let offset = word(words.len());
            let header = &mut words[s * HEADER_WORDS..(s + 1) * HEADER_WORDS];
            header[0] = offset;
            header[1] = word(line.blocks.len());
            header[2] = line.x_min.to_bits();
            header[3] = line.x_max.to_bits();
            words.extend_from_slice(&line.mask);
            for block in &line.blocks {
                words.extend_from_slice(&[
                    block.polygon,
                    word(block.edges.len()),
                    block.x_min.to_bits(),
                    block.x_max.to_bits(),
                ]);
                for edge in &block.edges {
                    words.extend(edge.iter().map(|v| v.to_bits()));
                }
            }
        }
        Self {
            num_scanlines,
            words,
        }
    }

    /// Number of scanlines.
    #[must_use]
    pub fn num_scanlines(&self) -> u32 {
        self.num_scanlines
    }

    /// The encoded words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Consumes the buffer, returning its words.
    #[must_use]
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// Decodes the header of scanline `s`.
    #[must_use]
    pub fn header(&self, s: u32) -> Option<ScanlineHeader> {
        let at = s as usize * HEADER_WORDS;
        let entry = self.words.get(at..at + HEADER_WORDS)?;
        Some(ScanlineHeader {
            block_offset: entry[0],
            shape_count: entry[1],
            x_min: f32::from_bits(entry[2]),
            x_max: f32::from_bits(entry[3]),
        })
    }

    /// The bin mask of scanline `s`.
    #[must_use]
    pub fn mask(&self, s: u32) -> Option<[u32; MASK_WORDS]> {
        let at = self.header(s)?.block_offset as usize;
        self.words.get(at..at + MASK_WORDS)?.try_into().ok()
    }

    /// Decodes the polygon blocks of scanline `s`.
    #[must_use]
    pub fn blocks(&self, s: u32) -> Option<Vec<PolygonBlock>> {
        let header = self.header(s)?;
        let mut at = header.block_offset as usize + MASK_WORDS;
        let mut blocks = Vec::with_capacity(header.shape_count as usize);
        for _ in 0..header.shape_count {
            let head = self.words.get(at..at + BLOCK_WORDS)?;
            let count = head[1] as usize;
            let body = self
                .words
                .get(at + BLOCK_WORDS..at + BLOCK_WORDS + count * EDGE_WORDS)?;
            blocks.push(PolygonBlock {
                polygon: head[0],
                x_min: f32::from_bits(head[2]),
                x_max: f32::from_bits(head[3]),
                edges: body
                    .chunks_exact(EDGE_WORDS)
                    .map(|e| {
                        [
                            f32::from_bits(e[0]),
                            f32::from_bits(e[1]),
                            f32::from_bits(e[2]),
                            f32::from_bits(e[3]),
                        ]
                    })
                    .collect(),
            });
            at += BLOCK_WORDS + count * EDGE_WORDS;
        }
        Some(blocks)
    }

    /// Total edge count of every scanline.
    #[must_use]
    pub fn edge_counts(&self) -> Vec<usize> {
        (0..self.num_scanlines)
            .map(|s| {
                self.blocks(s)
                    .map_or(0, |blocks| blocks.iter().map(|b| b.edges.len()).sum())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    const UNIT: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);

    #[test]
    fn unit_square_bins_into_four_scanlines() {
        let buffer = ScanlineBuffer::encode(&[Polygon::new(square(0.0, 0.0, 1.0, 1.0))], UNIT, 4);
        assert_eq!(buffer.edge_counts(), vec![3, 2, 2, 2]);
        for s in 0..4 {
            let header = buffer.header(s).unwrap();
            assert_eq!(header.shape_count, 1, "scanline {s}");
            assert_eq!(header.x_min, 0.0, "scanline {s}");
            assert_eq!(header.x_max, 1.0, "scanline {s}");
        }
    }

    #[test]
    fn offsets_are_words_from_buffer_start() {
        let buffer = ScanlineBuffer::encode(&[Polygon::new(square(0.0, 0.0, 1.0, 1.0))], UNIT, 4);
        // Header is 16 words; scanline 0 holds a mask, a block and 3 edges.
        assert_eq!(buffer.header(0).unwrap().block_offset, 16);
        assert_eq!(buffer.header(1).unwrap().block_offset, 16 + 4 + 4 + 12);
        assert_eq!(buffer.header(2).unwrap().block_offset, 36 + 4 + 4 + 8);
        assert_eq!(buffer.words().len(), 16 + 20 + 3 * 16);
    }

    #[test]
    fn holes_share_their_polygon_block() {
        let shape =
            Polygon::new(square(0.0, 0.0, 1.0, 1.0)).with_hole(square(0.25, 0.25, 0.75, 0.75));
        let buffer = ScanlineBuffer::encode(&[shape], UNIT, 4);
        let blocks = buffer.blocks(1).unwrap();
        assert_eq!(blocks.len(), 1);
        // Left and right of the exterior, the hole's bottom edge, and both
        // of the hole's vertical edges.
        assert_eq!(blocks[0].edges.len(), 5);
    }

    #[test]
    fn degenerate_rings_and_edges_are_skipped() {
        let sliver = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let repeated = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        let buffer = ScanlineBuffer::encode(&[sliver, repeated], UNIT, 2);
        let total: usize = buffer.edge_counts().iter().sum();
        // Triangle edges: bottom (line 0), right (lines 0–1), diagonal (0–1).
        assert_eq!(total, 5);
        let blocks = buffer.blocks(0).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].polygon, 1);
    }

    #[test]
    fn empty_scanlines_carry_sentinels() {
        let top = Polygon::new(square(0.0, 0.0, 1.0, 0.2));
        let buffer = ScanlineBuffer::encode(&[top], UNIT, 4);
        let header = buffer.header(3).unwrap();
        assert_eq!(header.shape_count, 0);
        assert_eq!(header.x_min, f32::INFINITY);
        assert_eq!(header.x_max, f32::NEG_INFINITY);
        assert_eq!(buffer.mask(3).unwrap(), [0; MASK_WORDS]);
    }

    #[test]
    fn blocks_follow_polygon_order_in_object_space() {
        let bounds = Rect::new(10.0, 10.0, 20.0, 20.0);
        let left = Polygon::new(square(10.0, 10.0, 12.0, 20.0));
        let right = Polygon::new(square(18.0, 10.0, 20.0, 20.0));
        let buffer = ScanlineBuffer::encode(&[left, right], bounds, 8);
        let blocks = buffer.blocks(4).unwrap();
        let order: Vec<u32> = blocks.iter().map(|b| b.polygon).collect();
        assert_eq!(order, vec![0, 1]);
        assert_eq!((blocks[0].x_min, blocks[0].x_max), (10.0, 12.0));
        assert_eq!((blocks[1].x_min, blocks[1].x_max), (18.0, 20.0));
        assert_eq!(blocks[0].edges[0], [10.0, 10.0, 12.0, 10.0]);
    }

    #[test]
    fn diagonal_edges_keep_their_full_extent_in_every_scanline() {
        let bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        let triangle = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ]);
        let buffer = ScanlineBuffer::encode(&[triangle], bounds, 4);

        let blocks = buffer.blocks(1).unwrap();
        assert_eq!(
            blocks[0].edges,
            vec![[10.0, 0.0, 10.0, 10.0], [10.0, 10.0, 0.0, 0.0]]
        );
        let header = buffer.header(1).unwrap();
        assert_eq!((header.x_min, header.x_max), (0.0, 10.0));
        // The diagonal spans every bin, not only the ones inside the band.
        assert_eq!(buffer.mask(1).unwrap(), [u32::MAX; MASK_WORDS]);
    }

    #[test]
    fn masks_use_normalized_bins_over_offset_bounds() {
        let bounds = Rect::new(-64.0, 100.0, 0.0, 164.0);
        // Normalized x in [0.5, 0.75]: bins 64..=96.
        let strip = Polygon::new(square(-32.0, 100.0, -16.0, 164.0));
        let buffer = ScanlineBuffer::encode(&[strip], bounds, 2);
        assert_eq!(buffer.mask(0).unwrap(), [0, 0, u32::MAX, 1]);
        let header = buffer.header(0).unwrap();
        assert_eq!((header.x_min, header.x_max), (-32.0, -16.0));
    }

    #[test]
    fn masks_cover_the_touched_bins() {
        let strip = Polygon::new(square(0.0, 0.0, 0.25, 1.0));
        let buffer = ScanlineBuffer::encode(&[strip], UNIT, 1);
        let mask = buffer.mask(0).unwrap();
        // Bins 0..=32 are set.
        assert_eq!(mask, [u32::MAX, 1, 0, 0]);
    }

    #[test]
    fn encoding_is_bit_reproducible() {
        let shape = Polygon::new(vec![
            Point::new(0.1, 0.7),
            Point::new(0.9, 0.3),
            Point::new(0.55, 0.95),
        ]);
        let a = ScanlineBuffer::encode(core::slice::from_ref(&shape), UNIT, 64);
        let b = ScanlineBuffer::encode(&[shape], UNIT, 64);
        assert_eq!(a, b);
    }
}
