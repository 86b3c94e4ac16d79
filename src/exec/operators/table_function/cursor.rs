// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Mixed-radix enumeration over the table functions bound to one row.
//!
//! The last function varies fastest. No counter is materialized: the position is derived from
//! each function's `eos` flag.

use crate::exec::table_function::FunctionCursor;

/// Where the enumeration stands for the bound row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pivot {
    /// The last function still has values.
    Current,
    /// Every function is exhausted; the row is done.
    RowDone,
    /// Functions `k..` are exhausted and `k - 1` is not.
    Roll(usize),
}

/// Scan from the last function down to find the first one that still has values.
pub fn locate_pivot<C: FunctionCursor>(fns: &[C]) -> Pivot {
    let last = fns.len().saturating_sub(1);
    for (i, f) in fns.iter().enumerate().rev() {
        if !f.eos() {
            return if i == last {
                Pivot::Current
            } else {
                Pivot::Roll(i + 1)
            };
        }
    }
    Pivot::RowDone
}

/// Carry into position `k - 1`: forward functions from `k - 1` down until one is not eos, then
/// reset every function after it. Returns `false` when the carry runs off the front, meaning
/// the row is exhausted.
pub fn roll<C: FunctionCursor>(fns: &mut [C], k: usize) -> bool {
    let mut stop = None;
    for i in (0..k.min(fns.len())).rev() {
        fns[i].forward(1);
        if !fns[i].eos() {
            stop = Some(i);
            break;
        }
    }
    let Some(stop) = stop else {
        return false;
    };
    for f in fns.iter_mut().skip(stop + 1) {
        f.reset();
    }
    true
}

/// True when some non-outer function has no values for the bound row.
pub fn is_inner_and_empty<C: FunctionCursor>(fns: &[C]) -> bool {
    fns.iter().any(|f| !f.is_outer() && f.current_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MockCursor {
        size: usize,
        offset: usize,
        eos: bool,
        outer: bool,
    }

    impl MockCursor {
        fn new(size: usize, outer: bool) -> Self {
            Self {
                size,
                offset: 0,
                eos: false,
                outer,
            }
        }

        fn at_eos(size: usize) -> Self {
            Self {
                eos: true,
                ..Self::new(size, false)
            }
        }
    }

    impl FunctionCursor for MockCursor {
        fn eos(&self) -> bool {
            self.eos
        }

        fn current_empty(&self) -> bool {
            self.size == 0
        }

        fn is_outer(&self) -> bool {
            self.outer
        }

        fn forward(&mut self, step: usize) {
            if self.size == 0 {
                self.eos = true;
                return;
            }
            self.offset += step;
            if self.offset >= self.size {
                self.eos = true;
            }
        }

        fn reset(&mut self) {
            self.offset = 0;
            self.eos = false;
        }
    }

    #[test]
    fn pivot_positions() {
        let live = || MockCursor::new(2, false);
        let done = || MockCursor::at_eos(2);
        assert_eq!(locate_pivot(&[live(), live(), live()]), Pivot::Current);
        assert_eq!(locate_pivot(&[live(), done(), done()]), Pivot::Roll(1));
        assert_eq!(locate_pivot(&[live(), live(), done()]), Pivot::Roll(2));
        assert_eq!(locate_pivot(&[done(), live(), done()]), Pivot::Roll(2));
        assert_eq!(locate_pivot(&[done(), done(), done()]), Pivot::RowDone);
    }

    #[test]
    fn roll_carries_and_resets_tail() {
        let mut fns = vec![MockCursor::new(2, false), MockCursor::new(3, false)];
        fns[1].forward(3);
        assert_eq!(locate_pivot(&fns), Pivot::Roll(1));
        assert!(roll(&mut fns, 1));
        assert_eq!(fns[0].offset, 1);
        assert!(!fns[1].eos);
        assert_eq!(fns[1].offset, 0);
    }

    #[test]
    fn roll_past_front_reports_row_exhausted() {
        let mut fns = vec![MockCursor::new(1, false), MockCursor::new(3, false)];
        fns[1].forward(3);
        assert!(!roll(&mut fns, 1));
        assert_eq!(locate_pivot(&fns), Pivot::RowDone);
    }

    #[test]
    fn roll_skips_exhausted_middle() {
        let mut fns = vec![
            MockCursor::new(2, false),
            MockCursor::new(1, false),
            MockCursor::new(1, false),
        ];
        fns[2].forward(1);
        assert_eq!(locate_pivot(&fns), Pivot::Roll(2));
        assert!(roll(&mut fns, 2));
        assert_eq!(fns[0].offset, 1);
        assert!(!fns[0].eos);
        for f in &fns[1..] {
            assert_eq!(f.offset, 0);
            assert!(!f.eos);
        }
    }

    #[test]
    fn full_enumeration_visits_product() {
        let mut fns = vec![MockCursor::new(2, false), MockCursor::new(3, false)];
        let mut visited = Vec::new();
        loop {
            match locate_pivot(&fns) {
                Pivot::RowDone => break,
                Pivot::Roll(k) => {
                    if !roll(&mut fns, k) {
                        continue;
                    }
                }
                Pivot::Current => {}
            }
            visited.push((fns[0].offset, fns[1].offset));
            fns[1].forward(1);
        }
        assert_eq!(
            visited,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn inner_empty_detection_ignores_outer() {
        let fns = vec![MockCursor::new(0, true), MockCursor::new(2, false)];
        assert!(!is_inner_and_empty(&fns));
        let fns = vec![MockCursor::new(0, false), MockCursor::new(2, true)];
        assert!(is_inner_and_empty(&fns));
    }
}
