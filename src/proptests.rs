use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::{Rope, SIGMA};

/// Simple model implementation using a flat symbol vector for comparison
#[derive(Default, Clone)]
struct Model {
    seq: Vec<u8>,
}

impl Model {
    fn insert_run(&mut self, pos: usize, sym: u8, count: u64) -> u64 {
        let smaller = self.seq.iter().filter(|&&c| c < sym).count() as u64;
        let before = self.seq[..pos].iter().filter(|&&c| c == sym).count() as u64;
        self.seq
            .splice(pos..pos, std::iter::repeat(sym).take(count as usize));
        smaller + before
    }

    fn rank(&self, pos: usize) -> [u64; SIGMA] {
        let mut c = [0u64; SIGMA];
        for &s in &self.seq[..pos] {
            c[s as usize] += 1;
        }
        c
    }

    fn counts(&self) -> [u64; SIGMA] {
        self.rank(self.seq.len())
    }

    fn len(&self) -> usize {
        self.seq.len()
    }
}

/// Actions to test against both implementations
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(InsertRun),
    Rank(Pos),
    Rank2(Pos, Pos),
}

/// Position seed, reduced modulo the live length at execution time
#[derive(Debug, Clone)]
struct Pos(u64);

/// Parameters of one run insert
#[derive(Debug, Clone)]
struct InsertRun {
    pos: Pos,
    sym: u8,
    count: u64,
}

impl Arbitrary for Pos {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        any::<u64>().prop_map(Pos).boxed()
    }
}

impl Arbitrary for InsertRun {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Pos>(), 0u8..SIGMA as u8, 1u64..24)
            .prop_map(|(pos, sym, count)| InsertRun { pos, sym, count })
            .boxed()
    }
}

/// Test harness that executes actions on both Rope and Model
struct Test {
    rope: Rope,
    model: Model,
}

impl Test {
    fn new(max_children: usize, block_bytes: usize) -> Self {
        Test {
            rope: Rope::with_params(max_children, block_bytes),
            model: Model::default(),
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(ins) => {
                let pos = ins.pos.0 % (self.model.len() as u64 + 1);
                let rope_result = self.rope.insert_run(pos, ins.sym, ins.count);
                let model_result = self.model.insert_run(pos as usize, ins.sym, ins.count);
                assert_eq!(
                    rope_result, model_result,
                    "insert rank mismatch: pos={}, sym={}, count={}",
                    pos, ins.sym, ins.count
                );
            }
            Action::Rank(p) => {
                let pos = p.0 % (self.model.len() as u64 + 1);
                let rope_result = self.rope.rank(pos);
                let model_result = self.model.rank(pos as usize);
                assert_eq!(rope_result, model_result, "rank mismatch at {pos}");
            }
            Action::Rank2(p1, p2) => {
                let mut x = p1.0 % (self.model.len() as u64 + 1);
                let mut y = p2.0 % (self.model.len() as u64 + 1);
                if x > y {
                    std::mem::swap(&mut x, &mut y);
                }
                let (cx, cy) = self.rope.rank2(x, y);
                assert_eq!(cx, self.model.rank(x as usize), "rank2 lower at {x}");
                assert_eq!(cy, self.model.rank(y as usize), "rank2 upper at {y}");
            }
        }
    }

    fn check(&self) {
        self.rope.validate();
        assert_eq!(*self.rope.symbol_counts(), self.model.counts());
        let mut seq = Vec::new();
        for (sym, len) in self.rope.runs() {
            seq.extend(std::iter::repeat(sym).take(len as usize));
        }
        assert_eq!(seq, self.model.seq, "leaf reconstruction mismatch");
    }
}

fn string_set() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(1u8..SIGMA as u8, 0..8), 0..10)
}

proptest! {
    /// Tiny nodes and blocks so every action exercises splits.
    #[test]
    fn rope_matches_model_small_nodes(actions in prop::collection::vec(any::<Action>(), 0..300)) {
        let mut test = Test::new(4, 32);
        for action in actions {
            test.execute(action);
        }
        test.check();
    }

    #[test]
    fn rope_matches_model_default_nodes(actions in prop::collection::vec(any::<Action>(), 0..300)) {
        let mut test = Test::new(64, 512);
        for action in actions {
            test.execute(action);
        }
        test.check();
    }

    /// Bulk insertion equals inserting the strings one by one.
    #[test]
    fn multi_matches_sequential(strings in string_set()) {
        let mut buf = Vec::new();
        for s in &strings {
            buf.extend_from_slice(s);
            buf.push(0);
        }
        if buf.is_empty() {
            return Ok(());
        }

        let mut multi = Rope::with_params(4, 32);
        multi.insert_multi(&buf);
        multi.validate();

        let mut seq = Rope::with_params(4, 32);
        for s in &strings {
            seq.insert_string_rlo(s);
        }
        seq.validate();

        let expand = |rope: &Rope| {
            let mut out = Vec::new();
            for (sym, len) in rope.runs() {
                out.extend(std::iter::repeat(sym).take(len as usize));
            }
            out
        };
        prop_assert_eq!(expand(&multi), expand(&seq));
        prop_assert_eq!(multi.symbol_counts(), seq.symbol_counts());
    }
}
