//! Structural validation and dump helpers.

use std::fmt::Write;

use super::Rope;
use crate::arena::{BlockRef, BucketRef};
use crate::rle;
use crate::{SymbolCounts, SIGMA};

impl Rope {
    /// Check every structural invariant of the tree, panicking on the first
    /// violation: record totals match their subtrees, leaf decodes match
    /// their records, bucket fan-out and leaf sizes stay within bounds, and
    /// the root's totals equal the rope's global counts.
    pub fn validate(&self) {
        let (len, counts) = self.validate_bucket(self.root);
        assert_eq!(len, self.len(), "root length does not match global counts");
        assert_eq!(counts, self.counts, "root counts do not match global counts");
    }

    fn validate_bucket(&self, bucket: BucketRef) -> (u64, SymbolCounts) {
        let hdr = *self.buckets.hdr(bucket);
        let n = hdr.n as usize;
        assert!(n >= 1, "empty bucket");
        assert!(n <= self.fanout, "bucket over fan-out");

        let mut len = 0u64;
        let mut counts = [0u64; SIGMA];
        for i in 0..n {
            let rec = *self.buckets.record(bucket, i);
            let rec_sum: u64 = rec.counts.iter().sum();
            assert_eq!(rec.len, rec_sum, "record length does not match its counts");

            let (sub_len, sub_counts) = if hdr.is_bottom {
                let block = self.blocks.block(BlockRef::new(rec.child as usize));
                assert!(
                    rle::used_bytes(block) <= self.block_bytes,
                    "leaf overflows its block"
                );
                let c = rle::count(block);
                (c.iter().sum(), c)
            } else {
                self.validate_bucket(BucketRef::new(rec.child as usize))
            };
            assert_eq!(rec.len, sub_len, "record length does not match subtree");
            assert_eq!(rec.counts, sub_counts, "record counts do not match subtree");

            len += rec.len;
            for a in 0..SIGMA {
                counts[a] += rec.counts[a];
            }
        }
        (len, counts)
    }

    /// Render the tree structure as an indented outline, for debugging.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_bucket(self.root, 0, &mut out);
        out
    }

    fn dump_bucket(&self, bucket: BucketRef, depth: usize, out: &mut String) {
        let hdr = *self.buckets.hdr(bucket);
        for i in 0..hdr.n as usize {
            let rec = *self.buckets.record(bucket, i);
            let pad = "  ".repeat(depth);
            if hdr.is_bottom {
                let block = self.blocks.block(BlockRef::new(rec.child as usize));
                let _ = writeln!(
                    out,
                    "{pad}leaf len={} runs={} used={}",
                    rec.len,
                    rle::n_runs(block),
                    rle::used_bytes(block)
                );
            } else {
                let _ = writeln!(out, "{pad}bucket len={} counts={:?}", rec.len, rec.counts);
                self.dump_bucket(BucketRef::new(rec.child as usize), depth + 1, out);
            }
        }
    }
}
