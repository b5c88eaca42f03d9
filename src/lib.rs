//! # runrope
//!
//! A run-length encoded B+ rope over a 6-symbol alphabet, built for online
//! Burrows-Wheeler transform construction.
//!
//! ## Features
//!
//! - **Positional run inserts**: place a run of one symbol anywhere and get
//!   its BWT rank back from the same descent.
//! - **Rank queries**: per-symbol prefix counts at one or two positions in
//!   O(height + leaf scan).
//! - **String insertion**: single strings and radix-partitioned batches
//!   under the reverse-lexicographic-order discipline, equivalent to online
//!   BWT construction of the reversed string set.
//! - **Arena storage**: nodes and leaf blocks live in chunked arenas with
//!   compact index handles; dropping the rope frees everything at once.
//!
//! ## Example
//!
//! ```rust
//! use runrope::Rope;
//!
//! let mut rope = Rope::new();
//! // Two strings over symbols 1..6, each terminated by a zero byte.
//! rope.insert_multi(&[1, 2, 0, 2, 1, 0]);
//!
//! assert_eq!(rope.symbol_counts(), &[2, 2, 2, 0, 0, 0]);
//! let counts = rope.rank(rope.len());
//! assert_eq!(counts, *rope.symbol_counts());
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub(crate) mod arena;
mod bulk;
pub mod rle;
mod rope;

pub use rope::{Leaves, Rope, RopeStats, Runs};

use parking_lot::Mutex;

/// Alphabet size. Symbols are integers in `0..SIGMA`; symbol 0 is the
/// sentinel that terminates strings.
pub const SIGMA: usize = 6;

/// Per-symbol counters, indexed by symbol.
pub type SymbolCounts = [u64; SIGMA];

/// Construction parameters for a [`Rope`].
///
/// Values are normalized on construction: `max_children` is rounded up to
/// an even number of at least 4, `block_bytes` to a multiple of 8 of at
/// least 32.
#[derive(Debug, Clone)]
pub struct RopeOptions {
    /// Maximum fan-out of an interior bucket.
    pub max_children: usize,
    /// Capacity of a leaf's RLE byte buffer.
    pub block_bytes: usize,
}

impl Default for RopeOptions {
    fn default() -> Self {
        Self {
            max_children: 64,
            block_bytes: 512,
        }
    }
}

/// A [`Rope`] behind a mutex, for callers that need to share one rope
/// across threads.
///
/// The rope itself is single-threaded by design; every operation takes
/// exclusive access for its full duration. This wrapper supplies that
/// exclusion so the locking discipline lives in one place.
pub struct SyncRope {
    inner: Mutex<Rope>,
}

impl SyncRope {
    /// Create an empty rope with default parameters.
    pub fn new() -> Self {
        Self::with_options(RopeOptions::default())
    }

    /// Create an empty rope with the given options.
    pub fn with_options(options: RopeOptions) -> Self {
        SyncRope {
            inner: Mutex::new(Rope::with_options(options)),
        }
    }

    /// See [`Rope::insert_run`].
    pub fn insert_run(&self, pos: u64, sym: u8, count: u64) -> u64 {
        self.inner.lock().insert_run(pos, sym, count)
    }

    /// See [`Rope::rank`].
    pub fn rank(&self, pos: u64) -> SymbolCounts {
        self.inner.lock().rank(pos)
    }

    /// See [`Rope::rank2`].
    pub fn rank2(&self, x: u64, y: u64) -> (SymbolCounts, SymbolCounts) {
        self.inner.lock().rank2(x, y)
    }

    /// See [`Rope::insert_string_rlo`].
    pub fn insert_string_rlo(&self, s: &[u8]) {
        self.inner.lock().insert_string_rlo(s);
    }

    /// See [`Rope::insert_multi`].
    pub fn insert_multi(&self, buf: &[u8]) {
        self.inner.lock().insert_multi(buf);
    }

    /// Total number of symbols in the rope.
    pub fn len(&self) -> u64 {
        self.inner.lock().len()
    }

    /// True if no symbol has been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the global per-symbol totals.
    pub fn symbol_counts(&self) -> SymbolCounts {
        *self.inner.lock().symbol_counts()
    }

    /// Run `f` with exclusive access to the underlying rope, e.g. to
    /// iterate its leaves.
    pub fn with<R>(&self, f: impl FnOnce(&mut Rope) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl Default for SyncRope {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptests;
