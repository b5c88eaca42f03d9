//! String-level insertion: single strings and radix-partitioned batches,
//! both under the reverse-lexicographic-order (RLO) discipline that makes
//! the rope an online BWT of the reversed strings.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{Rope, SIGMA};

/// A group of strings sharing their first `depth` characters, waiting to
/// have the character at `depth` inserted. `[l, u)` is the group's context
/// interval in the coordinates of the rope as of the start of the group's
/// round; `[b, e)` is its slice of the string-pointer array.
#[derive(Clone, Copy, Debug)]
struct Task {
    depth: u32,
    l: u64,
    sym: u8,
    seq: u64,
    u: u64,
    b: usize,
    e: usize,
}

impl Task {
    fn key(&self) -> (u32, u64, u8, u64) {
        (self.depth, self.l, self.sym, self.seq)
    }
}

// Min-heap order: rounds first (depth), then position, then the class
// symbol (distinct classes can collide on `l` when their regions are
// empty), then creation order.
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Task {}

impl Rope {
    /// Insert one string under the RLO discipline, terminating it with a
    /// sentinel. Equivalent to a one-string [`Self::insert_multi`].
    ///
    /// # Panics
    ///
    /// Panics if any symbol of `s` is 0 or >= 6.
    pub fn insert_string_rlo(&mut self, s: &[u8]) {
        assert!(
            s.iter().all(|&c| c >= 1 && (c as usize) < SIGMA),
            "string symbols must be in 1..6"
        );
        let mut l = 0u64;
        let mut u = self.symbol_counts()[0];
        for &sym in s {
            let c = sym as usize;
            let (tl, tu) = self.rank2(l, u);
            let x = l + (0..c).map(|a| tu[a] - tl[a]).sum::<u64>();
            let z = self.insert_run(x, sym, 1);
            l = z + 1;
            u = l + (tu[c] - tl[c]);
        }
        self.insert_run(l, 0, 1);
    }

    /// Insert a batch of sentinel-terminated strings, interleaved by
    /// character depth so that strings agreeing on a prefix are processed
    /// together. `buf` is the concatenation of the strings, each terminated
    /// by a zero byte; the final byte must be zero. The result equals
    /// calling [`Self::insert_string_rlo`] for each string in order.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is empty, does not end with a sentinel, or contains
    /// a byte >= 6.
    pub fn insert_multi(&mut self, buf: &[u8]) {
        assert!(!buf.is_empty(), "bulk buffer is empty");
        assert_eq!(buf[buf.len() - 1], 0, "bulk buffer must end with a sentinel");
        assert!(
            buf.iter().all(|&c| (c as usize) < SIGMA),
            "bulk buffer symbol out of range"
        );

        // String start offsets.
        let mut ptr: Vec<usize> = Vec::new();
        let mut start = 0usize;
        for (i, &c) in buf.iter().enumerate() {
            if c == 0 {
                ptr.push(start);
                start = i + 1;
            }
        }
        let m = ptr.len();

        let mut heap: BinaryHeap<Task> = BinaryHeap::new();
        let mut seq = 0u64;
        heap.push(Task {
            depth: 0,
            l: 0,
            sym: 0,
            seq,
            u: self.symbol_counts()[0],
            b: 0,
            e: m,
        });
        seq += 1;

        let mut live = m as u64;
        let mut scratch = vec![0usize; m];
        let mut oracle = vec![0u8; m];

        // Round state: all tasks of one depth run against a snapshot of the
        // rope taken when the round starts. `shift` counts the symbols
        // inserted by earlier tasks of the round (all at smaller positions)
        // and converts task coordinates to live ones; `cum` tracks the
        // round's per-symbol inserts for the child-interval computation.
        let mut round_depth = u32::MAX;
        let mut c0 = [0u64; SIGMA];
        let mut m0 = 0u64;
        let mut shift = 0u64;
        let mut cum = [0u64; SIGMA];

        while let Some(t) = heap.pop() {
            if t.depth != round_depth {
                round_depth = t.depth;
                c0 = *self.symbol_counts();
                m0 = live;
                shift = 0;
                cum = [0u64; SIGMA];
            }

            // Radix-partition the group by its character at this depth.
            let mut c = [0u64; SIGMA];
            for i in t.b..t.e {
                let ch = buf[ptr[i] + t.depth as usize];
                oracle[i] = ch;
                c[ch as usize] += 1;
            }
            let mut ac = [0usize; SIGMA];
            for a in 1..SIGMA {
                ac[a] = ac[a - 1] + c[a - 1] as usize;
            }
            for i in t.b..t.e {
                let a = oracle[i] as usize;
                scratch[t.b + ac[a]] = ptr[i];
                ac[a] += 1;
            }
            ptr[t.b..t.e].copy_from_slice(&scratch[t.b..t.e]);

            let (tl, tu) = self.rank2(t.l + shift, t.u + shift);

            // Insert each class as one run, walking the interval left to
            // right; each class block grows by what was just inserted.
            let mut x = t.l + shift;
            for a in 0..SIGMA {
                if c[a] > 0 {
                    self.insert_run(x, a as u8, c[a]);
                }
                x += (tu[a] - tl[a]) + c[a];
            }

            // Child tasks, in round-start coordinates of the next round:
            // cumulative snapshot counts below the class, the class rank at
            // the group's left edge net of this round's earlier inserts, and
            // one pending row per string still live this round.
            let mut below = 0u64;
            let mut boff = t.b;
            for a in 0..SIGMA {
                if a > 0 && c[a] > 0 {
                    debug_assert!(tl[a] >= cum[a]);
                    let l2 = below + (tl[a] - cum[a]) + m0;
                    heap.push(Task {
                        depth: t.depth + 1,
                        l: l2,
                        sym: a as u8,
                        seq,
                        u: l2 + (tu[a] - tl[a]),
                        b: boff,
                        e: boff + c[a] as usize,
                    });
                    seq += 1;
                }
                below += c0[a];
                boff += c[a] as usize;
            }

            shift += (t.e - t.b) as u64;
            for a in 0..SIGMA {
                cum[a] += c[a];
            }
            live -= c[0];
        }
        debug_assert_eq!(live, 0);
    }
}

#[cfg(test)]
mod tests {
    use crate::{Rope, SIGMA};

    fn expand(rope: &Rope) -> Vec<u8> {
        let mut out = Vec::new();
        for (sym, len) in rope.runs() {
            out.extend(std::iter::repeat(sym).take(len as usize));
        }
        out
    }

    fn buffer_of(strings: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        for s in strings {
            buf.extend_from_slice(s);
            buf.push(0);
        }
        buf
    }

    fn sequential(strings: &[&[u8]], params: (usize, usize)) -> Rope {
        let mut rope = Rope::with_params(params.0, params.1);
        for s in strings {
            rope.insert_string_rlo(s);
        }
        rope
    }

    #[test]
    fn test_single_string_bwt() {
        let mut rope = Rope::with_params(64, 512);
        rope.insert_string_rlo(&[1, 2, 1]);
        rope.validate();
        assert_eq!(rope.symbol_counts(), &[1, 2, 1, 0, 0, 0]);
        // BWT of the reversed input "aba$": rows $aba, a$ab, aba$, ba$a.
        assert_eq!(expand(&rope), vec![1, 2, 0, 1]);
    }

    #[test]
    fn test_single_string_bwt_reversed_reading() {
        let mut rope = Rope::new();
        rope.insert_string_rlo(&[1, 1, 2]);
        // The rope is the BWT of the reversal "baa$".
        assert_eq!(expand(&rope), vec![1, 1, 2, 0]);
    }

    #[test]
    fn test_empty_string_is_one_sentinel() {
        let mut rope = Rope::new();
        rope.insert_string_rlo(&[]);
        assert_eq!(expand(&rope), vec![0]);
    }

    #[test]
    fn test_multi_two_strings() {
        let mut rope = Rope::with_params(64, 512);
        rope.insert_multi(&[1, 2, 0, 2, 1, 0]);
        rope.validate();
        assert_eq!(rope.symbol_counts(), &[2, 2, 2, 0, 0, 0]);
        assert_eq!(expand(&rope), vec![1, 2, 2, 0, 1, 0]);
    }

    #[test]
    fn test_multi_matches_sequential() {
        let cases: &[&[&[u8]]] = &[
            &[&[1, 2], &[2, 1]],
            &[&[1, 2, 3], &[1, 2], &[1, 2, 3]],
            &[&[], &[3], &[]],
            &[&[5, 5, 5], &[5, 5], &[5]],
            &[&[1], &[2], &[3], &[4], &[5]],
            &[&[2, 1, 4, 1], &[2, 1, 4], &[3, 1], &[2, 2]],
        ];
        for strings in cases {
            for &params in &[(4usize, 32usize), (64, 512)] {
                let mut multi = Rope::with_params(params.0, params.1);
                multi.insert_multi(&buffer_of(strings));
                multi.validate();
                let seq = sequential(strings, params);
                assert_eq!(
                    expand(&multi),
                    expand(&seq),
                    "multi != sequential for {strings:?} params {params:?}"
                );
            }
        }
    }

    #[test]
    fn test_multi_into_existing_rope() {
        let first: &[&[u8]] = &[&[3, 1], &[1, 3]];
        let second: &[&[u8]] = &[&[1, 2], &[3]];
        let mut multi = Rope::with_params(4, 32);
        multi.insert_multi(&buffer_of(first));
        multi.insert_multi(&buffer_of(second));
        multi.validate();
        let mut seq = Rope::with_params(4, 32);
        for s in first.iter().chain(second) {
            seq.insert_string_rlo(s);
        }
        assert_eq!(expand(&multi), expand(&seq));
    }

    #[test]
    fn test_multi_counts_match_buffer() {
        let buf = buffer_of(&[&[1, 2, 3, 4, 5], &[1, 1, 2], &[4]]);
        let mut rope = Rope::with_params(4, 32);
        rope.insert_multi(&buf);
        rope.validate();
        let mut want = [0u64; SIGMA];
        for &c in &buf {
            want[c as usize] += 1;
        }
        assert_eq!(rope.symbol_counts(), &want);
    }

    #[test]
    #[should_panic(expected = "sentinel")]
    fn test_multi_unterminated_panics() {
        let mut rope = Rope::new();
        rope.insert_multi(&[1, 2]);
    }

    #[test]
    #[should_panic(expected = "empty")]
    fn test_multi_empty_panics() {
        let mut rope = Rope::new();
        rope.insert_multi(&[]);
    }
}
