//! Minimum-cost assignment with the Hungarian (Munkres) method.
//!
//! The solver is a small state machine. Each [`Step`] transforms the working
//! matrix or the matching and names the step that follows:
//!
//! ```text
//! Pad -> RowReduce -> ColReduce -> Cover <-> Adjust
//!                                    |
//!                                  Check -> Done
//! ```
//!
//! Costs are always reported from the caller's matrix, never from the
//! reduced working copy.

use std::collections::VecDeque;
use std::ops::{AddAssign, Sub, SubAssign};

use nalgebra::{DMatrix, Scalar};
use num_traits::{Bounded, Zero};
use tracing::trace;

/// Cell types the solver can work with.
pub trait Cost:
    Scalar + Copy + PartialOrd + Zero + Bounded + Sub<Output = Self> + SubAssign + AddAssign
{
}

impl<T> Cost for T where
    T: Scalar + Copy + PartialOrd + Zero + Bounded + Sub<Output = T> + SubAssign + AddAssign
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    row: usize,
    col: usize,
}

impl Allocation {
    pub fn assignment(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

/// A one-to-one set of (row, column) pairs, ordered by row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocations {
    pairs: Vec<Allocation>,
}

impl Allocations {
    pub fn assignment(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().map(Allocation::assignment)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Allocation> {
        self.pairs.iter()
    }

    /// Row assigned to `col`, if any.
    pub fn row_of(&self, col: usize) -> Option<usize> {
        self.pairs.iter().find(|a| a.col == col).map(|a| a.row)
    }

    /// Column assigned to `row`, if any.
    pub fn col_of(&self, row: usize) -> Option<usize> {
        self.pairs.iter().find(|a| a.row == row).map(|a| a.col)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    fn push(&mut self, row: usize, col: usize) {
        self.pairs.push(Allocation { row, col });
    }
}

/// Outcome of one [`Hungarian::solve`] call.
#[derive(Debug, Clone)]
pub struct Solution<T> {
    /// Whether a complete matching of the padded matrix was found.
    pub found: bool,
    /// Sum of the caller's costs over `allocations`; zero when not found.
    pub total_cost: T,
    /// Pairs inside the caller's matrix. Pairs on padding are dropped.
    pub allocations: Allocations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Pad,
    RowReduce,
    ColReduce,
    Cover,
    Adjust,
    Check,
    Done,
}

/// Working state for a single solve. Not reusable: `solve` consumes it.
#[derive(Debug)]
pub struct Hungarian<'a, T: Cost> {
    original: &'a DMatrix<T>,
    costs: DMatrix<T>,
    size: usize,
    row_match: Vec<Option<usize>>,
    col_match: Vec<Option<usize>>,
    covered_rows: Vec<bool>,
    covered_cols: Vec<bool>,
    adjustments: usize,
    allocations: Allocations,
    result: Option<T>,
}

impl<'a, T: Cost> Hungarian<'a, T> {
    pub fn new(costs: &'a DMatrix<T>) -> Self {
        let size = costs.nrows().max(costs.ncols());
        Self {
            original: costs,
            costs: costs.clone(),
            size,
            row_match: vec![None; size],
            col_match: vec![None; size],
            covered_rows: vec![false; size],
            covered_cols: vec![false; size],
            adjustments: 0,
            allocations: Allocations::default(),
            result: None,
        }
    }

    pub fn solve(self) -> Solution<T> {
        let mut allocations = Allocations::default();
        let result = self.solve_into(&mut allocations);
        Solution {
            found: result.is_some(),
            total_cost: result.unwrap_or_else(T::zero),
            allocations,
        }
    }

    /// Solves into a reusable buffer; returns the total cost if a complete
    /// matching was found. The buffer is left empty on failure.
    pub fn solve_into(mut self, allocations: &mut Allocations) -> Option<T> {
        allocations.clear();
        if self.original.iter().any(|c| c.partial_cmp(c).is_none()) {
            trace!("cost matrix holds incomparable values");
            return None;
        }

        self.allocations = std::mem::take(allocations);
        let mut step = if self.original.is_square() {
            Step::RowReduce
        } else {
            Step::Pad
        };
        while step != Step::Done {
            step = self.transition(step);
        }
        *allocations = std::mem::take(&mut self.allocations);
        self.result
    }

    fn transition(&mut self, step: Step) -> Step {
        match step {
            Step::Pad => {
                self.pad();
                Step::RowReduce
            }
            Step::RowReduce => {
                self.row_reduce();
                Step::ColReduce
            }
            Step::ColReduce => {
                self.col_reduce();
                Step::Cover
            }
            Step::Cover => self.cover(),
            Step::Adjust => self.adjust(),
            Step::Check => {
                self.check();
                Step::Done
            }
            Step::Done => Step::Done,
        }
    }

    fn pad(&mut self) {
        let costs = std::mem::replace(&mut self.costs, DMatrix::zeros(0, 0));
        self.costs = costs.resize(self.size, self.size, T::zero());
    }

    fn row_reduce(&mut self) {
        for mut row in self.costs.row_iter_mut() {
            let min = min_of(row.iter().copied());
            row.iter_mut().for_each(|c| *c -= min);
        }
    }

    fn col_reduce(&mut self) {
        for mut col in self.costs.column_iter_mut() {
            let min = min_of(col.iter().copied());
            col.iter_mut().for_each(|c| *c -= min);
        }
    }

    fn cover(&mut self) -> Step {
        self.claim_zeros();
        for row in 0..self.size {
            if self.row_match[row].is_none() {
                self.augment(row);
            }
        }
        self.mark_cover();

        let lines = self.covered_rows.iter().filter(|c| **c).count()
            + self.covered_cols.iter().filter(|c| **c).count();
        trace!(lines, size = self.size, "covered zeros");
        if lines == self.size {
            Step::Check
        } else {
            Step::Adjust
        }
    }

    // try to assign arbitrary zeroes on distinct rows and columns
    fn claim_zeros(&mut self) {
        for col in 0..self.size {
            if self.col_match[col].is_some() {
                continue;
            }

            for row in 0..self.size {
                if self.row_match[row].is_some() {
                    continue;
                }

                if self.costs[(row, col)].is_zero() {
                    self.row_match[row] = Some(col);
                    self.col_match[col] = Some(row);
                    // no more values are checked on this column
                    break;
                }
            }
        }
    }

    /// Breadth-first search for an alternating path of zeros from an
    /// unmatched row to an unmatched column; flips it when found.
    fn augment(&mut self, root: usize) -> bool {
        let mut parent = vec![None; self.size];
        let mut visited = vec![false; self.size];
        visited[root] = true;
        let mut queue = VecDeque::from([root]);

        while let Some(row) = queue.pop_front() {
            for col in 0..self.size {
                if parent[col].is_some() || !self.costs[(row, col)].is_zero() {
                    continue;
                }
                parent[col] = Some(row);

                match self.col_match[col] {
                    Some(next) if !visited[next] => {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                    Some(_) => {}
                    None => {
                        self.flip(col, &parent);
                        return true;
                    }
                }
            }
        }
        false
    }

    fn flip(&mut self, mut col: usize, parent: &[Option<usize>]) {
        while let Some(row) = parent[col] {
            let previous = self.row_match[row];
            self.row_match[row] = Some(col);
            self.col_match[col] = Some(row);
            match previous {
                Some(p) => col = p,
                None => break,
            }
        }
    }

    /// Minimum line cover for a maximum matching (König). Rows without a
    /// match are marked, then zeros in marked rows mark their columns and
    /// matched zeros in marked columns mark their rows, until nothing
    /// changes. Covered rows are the unmarked ones, covered columns the
    /// marked ones.
    fn mark_cover(&mut self) {
        let mut marked_rows = self
            .row_match
            .iter()
            .map(Option::is_none)
            .collect::<Vec<_>>();
        let mut marked_cols = vec![false; self.size];
        let mut pending = (0..self.size)
            .filter(|&r| marked_rows[r])
            .collect::<Vec<_>>();

        while let Some(row) = pending.pop() {
            for col in 0..self.size {
                if marked_cols[col] || !self.costs[(row, col)].is_zero() {
                    continue;
                }
                marked_cols[col] = true;
                if let Some(next) = self.col_match[col] {
                    if !marked_rows[next] {
                        marked_rows[next] = true;
                        pending.push(next);
                    }
                }
            }
        }

        for (covered, marked) in self.covered_rows.iter_mut().zip(&marked_rows) {
            *covered = !marked;
        }
        self.covered_cols.copy_from_slice(&marked_cols);
    }

    fn adjust(&mut self) -> Step {
        // Every adjustment either extends the matching or marks one more
        // row, so n * (n + 1) rounds always suffice.
        self.adjustments += 1;
        if self.adjustments > self.size * (self.size + 1) {
            trace!(adjustments = self.adjustments, "adjustment limit exceeded");
            return Step::Check;
        }

        let mut min = T::max_value();
        for col in 0..self.size {
            if self.covered_cols[col] {
                continue;
            }

            for row in 0..self.size {
                if self.covered_rows[row] {
                    continue;
                }

                let curr = self.costs[(row, col)];
                if curr < min {
                    min = curr;
                }
            }
        }
        if !(min > T::zero()) || min == T::max_value() {
            trace!("no positive uncovered minimum");
            return Step::Check;
        }

        for col in 0..self.size {
            for row in 0..self.size {
                match (self.covered_rows[row], self.covered_cols[col]) {
                    (false, false) => self.costs[(row, col)] -= min,
                    (true, true) => self.costs[(row, col)] += min,
                    _ => {}
                }
            }
        }

        // Matched zeros are covered exactly once, so they survive the
        // adjustment and the matching carries over to the next cover.
        self.covered_rows.fill(false);
        self.covered_cols.fill(false);
        Step::Cover
    }

    fn check(&mut self) {
        let (rows, cols) = self.original.shape();
        let mut pairs = 0;
        let mut total = T::zero();
        for row in 0..self.size {
            let Some(col) = self.row_match[row] else {
                continue;
            };
            if !self.costs[(row, col)].is_zero() {
                continue;
            }
            pairs += 1;
            if row < rows && col < cols {
                self.allocations.push(row, col);
                total += self.original[(row, col)];
            }
        }

        trace!(pairs, size = self.size, adjustments = self.adjustments, "checked matching");
        if pairs == self.size {
            self.result = Some(total);
        } else {
            self.allocations.clear();
        }
    }
}

fn min_of<T: Cost>(values: impl Iterator<Item = T>) -> T {
    values.fold(T::max_value(), |min, c| if c < min { c } else { min })
}

/// Solves `costs` into `assignments` and returns the total cost when a
/// complete assignment exists.
pub fn hungarian<T: Cost>(costs: &DMatrix<T>, assignments: &mut Allocations) -> Option<T> {
    Hungarian::new(costs).solve_into(assignments)
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_costs(costs: &DMatrix<f64>, assignments: &Allocations, cost_expected: f64) -> bool {
        (assignments
            .assignment()
            .map(|a| *costs.get(a).expect("within cost bounds"))
            .sum::<f64>()
            - cost_expected)
            .abs()
            < f64::EPSILON
    }

    fn solve_expect(costs: &DMatrix<f64>, expected_cost: f64) -> Allocations {
        let mut assignments = Allocations::default();
        let total = hungarian(costs, &mut assignments).expect("complete assignment");
        assert_eq!(total, expected_cost);
        assert!(assert_costs(costs, &assignments, expected_cost));
        assignments
    }

    /// Cheapest injective row-to-column map, by exhaustive search.
    fn brute_force(costs: &DMatrix<f64>) -> f64 {
        fn go(costs: &DMatrix<f64>, row: usize, used: &mut Vec<bool>) -> f64 {
            if row == costs.nrows() {
                return 0.;
            }
            let mut best = f64::INFINITY;
            for col in 0..costs.ncols() {
                if used[col] {
                    continue;
                }
                used[col] = true;
                best = best.min(costs[(row, col)] + go(costs, row + 1, used));
                used[col] = false;
            }
            best
        }
        if costs.nrows() > costs.ncols() {
            return brute_force(&costs.transpose());
        }
        go(costs, 0, &mut vec![false; costs.ncols()])
    }

    #[test]
    fn basic_two() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(2, 2,
            &[
                1., 2.,
                2., 1.,
            ]
        );
        solve_expect(&costs, 2.);
    }

    #[test]
    fn basic_two_rev() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(2, 2,
            &[
                1., 2.,
                2., 100.
            ]
        );
        solve_expect(&costs, 4.);
    }

    #[test]
    fn basic_four() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(4, 4,
            &[
                82., 83., 69., 92.,
                77., 37., 49., 92.,
                11., 69.,  5., 86.,
                 8.,  9., 98., 23.,
            ]
        );
        solve_expect(&costs, 140.);
        assert_eq!(brute_force(&costs), 140.);
    }

    #[test]
    fn basic_five() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(5, 5,
            &[
                10., 5.,13.,15.,16.,
                 3., 9.,18.,13., 6.,
                10., 7., 2., 2., 2.,
                 7.,11., 9., 7.,12.,
                 7., 9.,10., 4.,12.,
            ]
        );
        solve_expect(&costs, 23.);
    }

    #[test]
    fn basic_five_2() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(5, 5,
            &[
                20., 15., 18., 20., 25.,
                18., 20., 12., 14., 15.,
                21., 23., 25., 27., 25.,
                17., 18., 21., 23., 20.,
                18., 18., 16., 19., 20.,
            ]
        );
        solve_expect(&costs, 86.);
    }

    #[test]
    fn greedy_claim_needs_augmenting() {
        // The column-first greedy pass claims (0, 0) and leaves row 1
        // with no free zero; the only perfect matching goes through (0, 1).
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(3, 3,
            &[
                0., 0., 5.,
                0., 7., 7.,
                9., 0., 0.,
            ]
        );
        let assignments = solve_expect(&costs, 0.);
        assert_eq!(assignments.col_of(1), Some(0));
        assert_eq!(assignments.col_of(0), Some(1));
        assert_eq!(assignments.col_of(2), Some(2));
    }

    #[test]
    fn swapped_preferences() {
        let m = 200.;
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(2, 2,
            &[
                m,  0.,
                0., m,
            ]
        );
        let assignments = solve_expect(&costs, 0.);
        assert_eq!(assignments.row_of(1), Some(0));
        assert_eq!(assignments.row_of(0), Some(1));
    }

    #[test]
    fn indifferent_three() {
        let costs = DMatrix::<f64>::zeros(3, 3);
        let assignments = solve_expect(&costs, 0.);
        assert_eq!(assignments.len(), 3);
        let mut cols = assignments.iter().map(Allocation::col).collect::<Vec<_>>();
        cols.sort_unstable();
        assert_eq!(cols, [0, 1, 2]);
    }

    #[test]
    fn more_rows_than_columns() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(3, 2,
            &[
                4., 1.,
                2., 3.,
                1., 9.,
            ]
        );
        let solution = Hungarian::new(&costs).solve();
        assert!(solution.found);
        assert_eq!(solution.allocations.len(), 2);
        assert_eq!(solution.total_cost, 2.);
        assert_eq!(brute_force(&costs), 2.);
        assert!(solution.allocations.assignment().all(|(r, c)| r < 3 && c < 2));
    }

    #[test]
    fn more_columns_than_rows() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(2, 4,
            &[
                7., 3., 8., 2.,
                1., 6., 2., 9.,
            ]
        );
        let solution = Hungarian::new(&costs).solve();
        assert!(solution.found);
        assert_eq!(solution.allocations.len(), 2);
        assert_eq!(solution.total_cost, 3.);
        assert!(solution.allocations.assignment().all(|(r, c)| r < 2 && c < 4));
    }

    #[test]
    fn caller_matrix_is_untouched() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(3, 3,
            &[
                3., 1., 4.,
                1., 5., 9.,
                2., 6., 5.,
            ]
        );
        let before = costs.clone();
        let first = Hungarian::new(&costs).solve();
        let second = Hungarian::new(&costs).solve();
        assert_eq!(costs, before);
        assert_eq!(first.total_cost, second.total_cost);
        assert_eq!(first.total_cost, brute_force(&costs));
    }

    #[test]
    fn integer_costs() {
        #[rustfmt::skip]
        let costs = DMatrix::from_row_slice(3, 3,
            &[
                4_i64, 1, 3,
                2,     0, 5,
                3,     2, 2,
            ]
        );
        let solution = Hungarian::new(&costs).solve();
        assert!(solution.found);
        assert_eq!(solution.total_cost, 5);
    }

    #[test]
    fn incomparable_costs_are_not_solved() {
        let costs = DMatrix::from_row_slice(2, 2, &[1., f64::NAN, 2., 3.]);
        let mut assignments = Allocations::default();
        assert_eq!(hungarian(&costs, &mut assignments), None);
        assert!(assignments.is_empty());
    }

    #[test]
    fn empty_matrix() {
        let costs = DMatrix::<f64>::zeros(0, 0);
        let solution = Hungarian::new(&costs).solve();
        assert!(solution.found);
        assert!(solution.allocations.is_empty());

        let costs = DMatrix::<f64>::zeros(0, 3);
        let solution = Hungarian::new(&costs).solve();
        assert!(solution.found);
        assert!(solution.allocations.is_empty());
    }

    #[test]
    fn buffer_is_reused() {
        let mut assignments = Allocations::default();
        let big = DMatrix::from_row_slice(2, 2, &[1., 2., 2., 1.]);
        let small = DMatrix::from_row_slice(1, 1, &[7.]);
        assert_eq!(hungarian(&big, &mut assignments), Some(2.));
        assert_eq!(hungarian(&small, &mut assignments), Some(7.));
        assert_eq!(assignments.len(), 1);
    }
}
