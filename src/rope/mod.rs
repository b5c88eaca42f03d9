//! The B+ tree rope: an insertion-ordered symbol multiset with per-subtree
//! marginal counts.
//!
//! Interior nodes are *buckets*: a small header plus up to `max_children`
//! child records, each carrying the exact length and per-symbol totals of
//! its subtree. Leaves are run-length encoded byte blocks owned by the
//! [`rle`](crate::rle) codec. Inserts run in a single top-down pass that
//! splits full buckets on the way down, so no ascent is ever needed; rank
//! queries descend once, summing the records left of the chosen path.

mod debug;

use smallvec::SmallVec;

use crate::arena::{BlockArena, BlockRef, BucketArena, BucketRef};
use crate::rle;
use crate::{RopeOptions, SymbolCounts, SIGMA};

/// Maximum supported tree height; a rope that exceeds it indicates wildly
/// exceeded capacity.
const MAX_HEIGHT: usize = 80;

/// Bucket-wide attributes, kept out of the record array.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BucketHdr {
    /// Number of valid records in the bucket.
    pub n: u16,
    /// True iff the bucket's children are leaf blocks.
    pub is_bottom: bool,
}

/// Child descriptor: a subtree (or leaf block) with its exact totals.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Record {
    /// Bucket or block index, disambiguated by the owning bucket's
    /// `is_bottom` flag.
    pub child: u32,
    /// Total symbols in the subtree. Always equals `counts` summed.
    pub len: u64,
    /// Per-symbol totals in the subtree.
    pub counts: [u64; SIGMA],
}

/// Size and allocation figures for a rope.
#[derive(Debug, Clone, Default)]
pub struct RopeStats {
    /// Interior buckets allocated.
    pub buckets: usize,
    /// Leaf blocks allocated.
    pub leaves: usize,
    /// Bytes held by the bucket arena.
    pub bucket_bytes: usize,
    /// Bytes held by the block arena.
    pub leaf_bytes: usize,
    /// Levels from the root bucket down to the leaf blocks.
    pub height: usize,
}

/// A run-length encoded B+ rope over the 6-symbol alphabet.
///
/// Symbols are integers in `0..6`; symbol 0 is the sentinel used by the
/// string-insertion operations. Positions and counts are `u64`.
///
/// ```rust
/// use runrope::Rope;
///
/// let mut rope = Rope::new();
/// assert_eq!(rope.insert_run(0, 1, 1), 0);
/// assert_eq!(rope.symbol_counts()[1], 1);
/// ```
pub struct Rope {
    counts: SymbolCounts,
    fanout: usize,
    block_bytes: usize,
    root: BucketRef,
    buckets: BucketArena,
    blocks: BlockArena,
}

impl Rope {
    /// Create an empty rope with default parameters (fan-out 64, 512-byte
    /// blocks).
    pub fn new() -> Self {
        Self::with_options(RopeOptions::default())
    }

    /// Create an empty rope with the given options (normalized as in
    /// [`Self::with_params`]).
    pub fn with_options(options: RopeOptions) -> Self {
        Self::with_params(options.max_children, options.block_bytes)
    }

    /// Create an empty rope. `max_children` is rounded up to an even number
    /// of at least 4; `block_bytes` is rounded up to a multiple of 8 of at
    /// least 32.
    pub fn with_params(max_children: usize, block_bytes: usize) -> Self {
        let fanout = max_children.max(4);
        let fanout = fanout + (fanout & 1);
        let block_bytes = (block_bytes.max(32) + 7) & !7;

        let mut buckets = BucketArena::new(fanout);
        let mut blocks = BlockArena::new(block_bytes);
        let root = buckets.alloc();
        let first = blocks.alloc();
        *buckets.hdr_mut(root) = BucketHdr {
            n: 1,
            is_bottom: true,
        };
        buckets.record_mut(root, 0).child = first.raw();

        Rope {
            counts: [0; SIGMA],
            fanout,
            block_bytes,
            root,
            buckets,
            blocks,
        }
    }

    /// Total number of symbols in the rope.
    pub fn len(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// True if no symbol has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global per-symbol totals.
    pub fn symbol_counts(&self) -> &SymbolCounts {
        &self.counts
    }

    /// Normalized fan-out of interior buckets.
    pub fn max_children(&self) -> usize {
        self.fanout
    }

    /// Normalized leaf block capacity in bytes.
    pub fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    /// Allocation and shape figures.
    pub fn stats(&self) -> RopeStats {
        let mut height = 1;
        let mut cur = self.root;
        while !self.buckets.hdr(cur).is_bottom {
            cur = BucketRef::new(self.buckets.record(cur, 0).child as usize);
            height += 1;
        }
        RopeStats {
            buckets: self.buckets.len(),
            leaves: self.blocks.len(),
            bucket_bytes: self.buckets.allocated_bytes(),
            leaf_bytes: self.blocks.allocated_bytes(),
            height,
        }
    }

    /// Insert `count` copies of `sym` at position `pos` and return the
    /// BWT-style rank of the inserted run: the number of smaller symbols in
    /// the rope plus the occurrences of `sym` before `pos`, both on the
    /// state prior to this call.
    ///
    /// # Panics
    ///
    /// Panics if `sym >= 6`, `count == 0`, or `pos > self.len()`.
    pub fn insert_run(&mut self, pos: u64, sym: u8, count: u64) -> u64 {
        assert!((sym as usize) < SIGMA, "symbol {sym} out of range");
        assert!(count > 0, "empty run");
        assert!(pos <= self.len(), "position {pos} out of range");

        let sym_i = sym as usize;
        let mut z: u64 = self.counts[..sym_i].iter().sum();

        if self.buckets.hdr(self.root).n as usize == self.fanout {
            self.split_root();
        }

        let mut cur = self.root;
        let mut y = 0u64;
        let mut sub_len = self.len();
        let mut sub_sym = self.counts[sym_i];
        loop {
            let hdr = *self.buckets.hdr(cur);
            let (mut i, y0, z0) =
                self.find_slot(cur, hdr.n as usize, pos - y, sub_len, sub_sym, sym);
            y += y0;
            z += z0;

            if hdr.is_bottom {
                let rec = *self.buckets.record(cur, i);
                let block = BlockRef::new(rec.child as usize);
                let out = rle::insert(
                    self.blocks.block_mut(block),
                    pos - y,
                    sym,
                    count,
                    &rec.counts,
                );
                z += out.rank;
                {
                    let r = self.buckets.record_mut(cur, i);
                    r.len += count;
                    r.counts[sym_i] += count;
                }
                if out.used + rle::MIN_SPACE > self.block_bytes {
                    self.split_child(cur, i);
                }
                break;
            }

            let child = BucketRef::new(self.buckets.record(cur, i).child as usize);
            if self.buckets.hdr(child).n as usize == self.fanout {
                self.split_child(cur, i);
                let v = *self.buckets.record(cur, i);
                if pos - y > v.len {
                    y += v.len;
                    z += v.counts[sym_i];
                    i += 1;
                }
            }
            let rec = *self.buckets.record(cur, i);
            sub_len = rec.len;
            sub_sym = rec.counts[sym_i];
            {
                let r = self.buckets.record_mut(cur, i);
                r.len += count;
                r.counts[sym_i] += count;
            }
            cur = BucketRef::new(rec.child as usize);
        }

        self.counts[sym_i] += count;
        z
    }

    /// Per-symbol counts of the prefix of length `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos > self.len()`.
    pub fn rank(&self, pos: u64) -> SymbolCounts {
        assert!(pos <= self.len(), "position {pos} out of range");
        let mut acc = [0u64; SIGMA];
        let (block, start, _, counts) = self.descend(pos, &mut acc);
        rle::rank1(self.blocks.block(block), pos - start, &mut acc, &counts);
        acc
    }

    /// Prefix counts for two positions `x <= y`, sharing one descent when
    /// both land in the same leaf.
    ///
    /// # Panics
    ///
    /// Panics if `x > y` or `y > self.len()`.
    pub fn rank2(&self, x: u64, y: u64) -> (SymbolCounts, SymbolCounts) {
        assert!(x <= y, "rank2 positions out of order");
        assert!(y <= self.len(), "position {y} out of range");
        let mut cx = [0u64; SIGMA];
        let (block, start, len, counts) = self.descend(x, &mut cx);
        if y - start <= len {
            let mut cy = cx;
            rle::rank2(
                self.blocks.block(block),
                x - start,
                y - start,
                &mut cx,
                &mut cy,
                &counts,
            );
            (cx, cy)
        } else {
            rle::rank1(self.blocks.block(block), x - start, &mut cx, &counts);
            (cx, self.rank(y))
        }
    }

    /// Iterate over the leaf blocks in left-to-right order. Each item is the
    /// full block slice; decode it with [`rle::runs`].
    pub fn leaves(&self) -> Leaves<'_> {
        let mut stack = SmallVec::new();
        stack.push((self.root, 0usize));
        Leaves { rope: self, stack }
    }

    /// Iterate over the rope's `(symbol, run_length)` pairs in order.
    pub fn runs(&self) -> Runs<'_> {
        Runs {
            leaves: self.leaves(),
            cur: None,
        }
    }

    /// Walk to the leaf containing `pos`, adding the counts of every record
    /// left of the path into `acc`. Returns the leaf block, the position of
    /// its first symbol, and its record totals.
    fn descend(&self, pos: u64, acc: &mut SymbolCounts) -> (BlockRef, u64, u64, SymbolCounts) {
        let mut cur = self.root;
        let mut y = 0u64;
        let mut sub_len = self.len();
        let mut sub_counts = self.counts;
        loop {
            let hdr = *self.buckets.hdr(cur);
            let (i, y0) = self.find_slot_rank(cur, hdr.n as usize, pos - y, sub_len, &sub_counts, acc);
            y += y0;
            let rec = *self.buckets.record(cur, i);
            if hdr.is_bottom {
                return (BlockRef::new(rec.child as usize), y, rec.len, rec.counts);
            }
            sub_len = rec.len;
            sub_counts = rec.counts;
            cur = BucketRef::new(rec.child as usize);
        }
    }

    /// Locate the record containing relative position `rel`, scanning from
    /// whichever end is closer. Returns the record index, the total length
    /// of the records before it, and their `sym` count. A position on a
    /// record boundary belongs to the left record.
    fn find_slot(
        &self,
        bucket: BucketRef,
        n: usize,
        rel: u64,
        sub_len: u64,
        sub_sym: u64,
        sym: u8,
    ) -> (usize, u64, u64) {
        debug_assert!(rel <= sub_len);
        let recs = self.buckets.records(bucket);
        let sym_i = sym as usize;
        if rel <= sub_len / 2 {
            let mut y = 0u64;
            let mut z = 0u64;
            let mut i = 0usize;
            while y + recs[i].len < rel {
                y += recs[i].len;
                z += recs[i].counts[sym_i];
                i += 1;
                debug_assert!(i < n);
            }
            (i, y, z)
        } else {
            let mut end = sub_len;
            let mut suffix = 0u64;
            let mut i = n - 1;
            while end - recs[i].len >= rel {
                end -= recs[i].len;
                suffix += recs[i].counts[sym_i];
                i -= 1;
            }
            (i, end - recs[i].len, sub_sym - suffix - recs[i].counts[sym_i])
        }
    }

    /// [`Self::find_slot`] accumulating all six symbol counts for rank
    /// descents.
    fn find_slot_rank(
        &self,
        bucket: BucketRef,
        n: usize,
        rel: u64,
        sub_len: u64,
        sub_counts: &SymbolCounts,
        acc: &mut SymbolCounts,
    ) -> (usize, u64) {
        debug_assert!(rel <= sub_len);
        let recs = self.buckets.records(bucket);
        if rel <= sub_len / 2 {
            let mut y = 0u64;
            let mut i = 0usize;
            while y + recs[i].len < rel {
                for a in 0..SIGMA {
                    acc[a] += recs[i].counts[a];
                }
                y += recs[i].len;
                i += 1;
                debug_assert!(i < n);
            }
            (i, y)
        } else {
            let mut end = sub_len;
            let mut suffix = [0u64; SIGMA];
            let mut i = n - 1;
            while end - recs[i].len >= rel {
                end -= recs[i].len;
                for a in 0..SIGMA {
                    suffix[a] += recs[i].counts[a];
                }
                i -= 1;
            }
            for a in 0..SIGMA {
                acc[a] += sub_counts[a] - suffix[a] - recs[i].counts[a];
            }
            (i, end - recs[i].len)
        }
    }

    /// Grow the tree by one level: the old root becomes the single child of
    /// a fresh root whose record carries the rope's totals, then splits.
    fn split_root(&mut self) {
        let new_root = self.buckets.alloc();
        *self.buckets.hdr_mut(new_root) = BucketHdr {
            n: 1,
            is_bottom: false,
        };
        *self.buckets.record_mut(new_root, 0) = Record {
            child: self.root.raw(),
            len: self.len(),
            counts: self.counts,
        };
        self.root = new_root;
        self.split_child(new_root, 0);
    }

    /// Split the child of record `vi` in bucket `pb`, placing the new
    /// sibling record immediately after it. The parent must have a free
    /// slot, which the top-down protocol guarantees.
    fn split_child(&mut self, pb: BucketRef, vi: usize) {
        let hdr = *self.buckets.hdr(pb);
        let n = hdr.n as usize;
        debug_assert!(n < self.fanout, "parent bucket full during split");

        self.buckets.records_mut(pb).copy_within(vi + 1..n, vi + 2);
        self.buckets.hdr_mut(pb).n = (n + 1) as u16;

        let (w_child, w_len, w_counts) = if hdr.is_bottom {
            let left = BlockRef::new(self.buckets.record(pb, vi).child as usize);
            let right = self.blocks.alloc();
            {
                let (lb, rb) = self.blocks.pair_mut(left, right);
                rle::split(lb, rb);
            }
            let counts = rle::count(self.blocks.block(right));
            (right.raw(), counts.iter().sum(), counts)
        } else {
            let vb = BucketRef::new(self.buckets.record(pb, vi).child as usize);
            let wb = self.buckets.alloc();
            let half = self.fanout / 2;
            debug_assert_eq!(self.buckets.hdr(vb).n as usize, self.fanout);
            let moved: SmallVec<[Record; 32]> =
                self.buckets.records(vb)[half..].iter().copied().collect();
            self.buckets.records_mut(wb)[..half].copy_from_slice(&moved);
            *self.buckets.hdr_mut(wb) = BucketHdr {
                n: half as u16,
                is_bottom: self.buckets.hdr(vb).is_bottom,
            };
            self.buckets.hdr_mut(vb).n = half as u16;
            let mut counts = [0u64; SIGMA];
            let mut len = 0u64;
            for rec in &moved {
                len += rec.len;
                for a in 0..SIGMA {
                    counts[a] += rec.counts[a];
                }
            }
            (wb.raw(), len, counts)
        };

        {
            let v = self.buckets.record_mut(pb, vi);
            v.len -= w_len;
            for a in 0..SIGMA {
                v.counts[a] -= w_counts[a];
            }
        }
        *self.buckets.record_mut(pb, vi + 1) = Record {
            child: w_child,
            len: w_len,
            counts: w_counts,
        };
    }
}

impl Default for Rope {
    fn default() -> Self {
        Self::new()
    }
}

/// Left-to-right iterator over leaf blocks. See [`Rope::leaves`].
pub struct Leaves<'a> {
    rope: &'a Rope,
    stack: SmallVec<[(BucketRef, usize); 128]>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        loop {
            let (bucket, idx) = *self.stack.last()?;
            let hdr = *self.rope.buckets.hdr(bucket);
            if idx >= hdr.n as usize {
                self.stack.pop();
                if let Some(top) = self.stack.last_mut() {
                    top.1 += 1;
                }
                continue;
            }
            let rec = *self.rope.buckets.record(bucket, idx);
            if hdr.is_bottom {
                self.stack.last_mut().expect("non-empty stack").1 += 1;
                return Some(self.rope.blocks.block(BlockRef::new(rec.child as usize)));
            }
            debug_assert!(self.stack.len() < MAX_HEIGHT, "tree height exceeds limit");
            self.stack.push((BucketRef::new(rec.child as usize), 0));
        }
    }
}

/// Flattened `(symbol, run_length)` iterator. See [`Rope::runs`].
pub struct Runs<'a> {
    leaves: Leaves<'a>,
    cur: Option<rle::RunIter<'a>>,
}

impl Iterator for Runs<'_> {
    type Item = (u8, u64);

    fn next(&mut self) -> Option<(u8, u64)> {
        loop {
            if let Some(it) = &mut self.cur {
                if let Some(run) = it.next() {
                    return Some(run);
                }
            }
            self.cur = Some(rle::runs(self.leaves.next()?));
        }
    }
}
