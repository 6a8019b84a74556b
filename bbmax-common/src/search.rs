//! Depth-first branch and bound
//!
//! The search keeps an explicit stack of frames, one per assigned variable,
//! and never recurses. The unassigned variables are kept in
//! [ActiveVariables](struct.ActiveVariables.html), an array with a reverse
//! index so that removal and restoration are O(1).

use crate::{
    clause::{CONFLICT, NO_CONFLICT},
    config,
    formula::FormulaModel,
    literal::{Literal, Variable},
    memory::{Array, BoundedVector, HeapSpace, Vector},
    output::print_key_value,
};
use bbmax_macros::HeapSpace;
use serde_derive::{Deserialize, Serialize};
use std::{cmp, fs, io};

/// Which engine runs the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    DepthFirst,
    BestFirst,
}

impl Default for SearchMode {
    fn default() -> SearchMode {
        SearchMode::DepthFirst
    }
}

/// Runtime settings, usually read from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SearchConfig {
    pub mode: SearchMode,
    /// Below this many unassigned variables the dominance scan covers all of
    /// them at every step; above, it resumes where it stopped.
    pub propagation_window: usize,
    /// From this many unassigned variables on, branch on the last one
    /// instead of scoring all of them.
    pub cheap_branching_threshold: usize,
    /// Print an `o` line for every improvement.
    pub report_improvements: bool,
    pub verbosity: u8,
}

impl Default for SearchConfig {
    fn default() -> SearchConfig {
        SearchConfig {
            mode: SearchMode::DepthFirst,
            propagation_window: 5000,
            cheap_branching_threshold: 3000,
            report_improvements: true,
            verbosity: 0,
        }
    }
}

impl SearchConfig {
    pub fn from_toml(text: &str) -> Result<SearchConfig, toml::de::Error> {
        toml::from_str(text)
    }
    /// Read the settings from a TOML file.
    pub fn load(filename: &str) -> io::Result<SearchConfig> {
        let text = fs::read_to_string(filename)?;
        SearchConfig::from_toml(&text).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {}", filename, err),
            )
        })
    }
}

/// Counters that are printed at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub branches: usize,
    pub propagations: usize,
}

impl SearchStatistics {
    pub fn print(&self) {
        print_key_value("branches", self.branches);
        print_key_value("propagations", self.propagations);
    }
}

/// The unassigned variables, in heuristic order.
#[derive(Debug, Clone, HeapSpace)]
pub struct ActiveVariables {
    variables: Vector<Variable>,
    /// The index of each active variable in `variables`.
    position: Array<Variable, usize>,
}

const NOT_ACTIVE: usize = usize::max_value();

impl ActiveVariables {
    /// All variables of the model, sorted ascending by
    /// `hv1 * hv1 + min(hv1, hv2)` where `hv = 2 * binary + unit + occurrence`
    /// of the positive and negative literal. Ties go to the smaller variable.
    pub fn ordered(model: &impl FormulaModel) -> ActiveVariables {
        let maxvar = model.variable_count();
        let hv = |literal: Literal| {
            2.0 * model.binary_length(literal) as f64
                + model.unit_length(literal) as f64
                + model.occurrence_length(literal) as f64
        };
        let mut scored: Vec<(f64, Variable)> = Variable::range(maxvar)
            .map(|variable| {
                let hv1 = hv(variable.literal(true));
                let hv2 = hv(variable.literal(false));
                (hv1 * hv1 + hv1.min(hv2), variable)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let mut active = ActiveVariables {
            variables: Vector::with_capacity(maxvar),
            position: Array::new(NOT_ACTIVE, maxvar + 1),
        };
        for (_score, variable) in scored {
            active.restore(variable);
        }
        active
    }
    pub fn len(&self) -> usize {
        self.variables.len()
    }
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
    pub fn get(&self, index: usize) -> Variable {
        self.variables[index]
    }
    pub fn as_slice(&self) -> &[Variable] {
        &self.variables
    }
    pub fn contains(&self, variable: Variable) -> bool {
        self.position[variable] != NOT_ACTIVE
    }
    /// Remove a variable by moving the last one into its place.
    pub fn remove(&mut self, variable: Variable) {
        requires!(self.contains(variable));
        let index = self.position[variable];
        self.variables.swap_remove(index);
        if index < self.variables.len() {
            self.position[self.variables[index]] = index;
        }
        self.position[variable] = NOT_ACTIVE;
    }
    /// Append a variable.
    pub fn restore(&mut self, variable: Variable) {
        requires!(!self.contains(variable));
        self.position[variable] = self.variables.len();
        self.variables.push(variable);
    }
    /// Check that the reverse index is exact and that no active variable is
    /// assigned.
    pub fn assert_consistent(&self, model: &impl FormulaModel) {
        let mut count = 0;
        for variable in Variable::range(model.variable_count()) {
            let index = self.position[variable];
            if index == NOT_ACTIVE {
                invariant!(model.is_assigned(variable), "inactive variable {} is unassigned", variable);
                continue;
            }
            count += 1;
            invariant!(self.variables[index] == variable);
            invariant!(!model.is_assigned(variable), "active variable {} is assigned", variable);
        }
        invariant!(count == self.len());
    }
}

/// Scan for a variable where one polarity can be fixed without losing
/// optimality: assigning `v` is safe when the unit clauses of `v` weigh at
/// least as much as all active clauses containing `-v`.
///
/// The scan walks from `cursor` towards the front. With few variables left
/// it always starts at the end; otherwise it resumes where the previous scan
/// stopped and, once it has reached the front, stays exhausted until the
/// number of variables drops below the window.
///
/// Returns the literal to assign; `cursor` then points at its variable.
pub fn find_dominated(
    model: &impl FormulaModel,
    active: &ActiveVariables,
    cursor: &mut Option<usize>,
    window: usize,
) -> Option<Literal> {
    let count = active.len();
    requires!(count > 0);
    if count < window || cursor.map_or(false, |index| index >= count) {
        *cursor = Some(count - 1);
    }
    while let Some(index) = *cursor {
        let variable = active.get(index);
        let positive = variable.literal(true);
        if model.unit_length(positive) >= model.occurrence_length(-positive) {
            return Some(positive);
        }
        if model.unit_length(-positive) >= model.occurrence_length(positive) {
            return Some(-positive);
        }
        *cursor = index.checked_sub(1);
    }
    None
}

/// Choose the literal to branch on.
///
/// With many variables left, take the last active one and prefer the
/// polarity with the larger contribution plus unit and binary weight.
/// Otherwise score every variable by `hv1 * hv2 + min(occ(v), occ(-v))`
/// with `hv = contribution + binary + occurrence` and keep the best one,
/// ties going to the one scanned later (towards the front).
pub fn select_branch(model: &impl FormulaModel, active: &ActiveVariables, threshold: usize) -> Literal {
    requires!(!active.is_empty());
    if active.len() >= threshold {
        let variable = active.get(active.len() - 1);
        let weight = |literal: Literal| {
            model
                .lower_bound_contribution(literal)
                .saturating_add(model.unit_length(literal))
                .saturating_add(model.binary_length(literal))
        };
        let positive = variable.literal(true);
        return if weight(positive) > weight(-positive) {
            positive
        } else {
            -positive
        };
    }
    let mut best_score = -1.0;
    let mut best = None;
    for index in (0..active.len()).rev() {
        let positive = active.get(index).literal(true);
        let occurrence_positive = model.occurrence_length(positive);
        let occurrence_negative = model.occurrence_length(-positive);
        let hv1 = model.lower_bound_contribution(positive) as f64
            + model.binary_length(positive) as f64
            + occurrence_positive as f64;
        let hv2 = model.lower_bound_contribution(-positive) as f64
            + model.binary_length(-positive) as f64
            + occurrence_negative as f64;
        let score = hv1 * hv2 + cmp::min(occurrence_positive, occurrence_negative) as f64;
        if score >= best_score {
            best_score = score;
            best = Some(if hv2 > hv1 { -positive } else { positive });
        }
    }
    match best {
        Some(literal) => literal,
        None => unreachable!("no branching candidate"),
    }
}

/// The state of a stack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No alternative is left for this variable.
    Propagated,
    /// The given literal has not been tried yet.
    Pending(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    variable: Variable,
    state: FrameState,
}

/// Iterative depth-first branch and bound over a formula model.
///
/// The model records the best complete assignment as a side effect of
/// assignment, so the search itself only decides which literals to try.
pub struct BranchAndBoundSearch<'a, M: FormulaModel> {
    pub config: &'a SearchConfig,
    model: &'a mut M,
    active: ActiveVariables,
    stack: BoundedVector<Frame>,
    /// Position of the dominance scan; `None` once it reached the front.
    cursor: Option<usize>,
    pub statistics: SearchStatistics,
}

impl<'a, M: FormulaModel> BranchAndBoundSearch<'a, M> {
    pub fn new(model: &'a mut M, config: &'a SearchConfig) -> BranchAndBoundSearch<'a, M> {
        let active = ActiveVariables::ordered(&*model);
        let cursor = active.len().checked_sub(1);
        BranchAndBoundSearch {
            config,
            stack: BoundedVector::with_capacity(model.variable_count()),
            model,
            active,
            cursor,
            statistics: SearchStatistics::default(),
        }
    }

    pub fn active(&self) -> &ActiveVariables {
        &self.active
    }
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Search until every branch has been explored or pruned.
    pub fn run(mut self) -> SearchStatistics {
        let variables = self.model.variable_count();
        loop {
            let descended = if self.stack.len() == variables {
                false
            } else if self.model.best_minus_lower_bound() == 0 {
                false
            } else {
                self.step()
            };
            if !descended && !self.backtrack() {
                break;
            }
            if config::CHECK_PARTITION_INVARIANTS {
                self.active.assert_consistent(&*self.model);
                invariant!(self.active.len() + self.stack.len() == variables);
            }
            log!(
                self,
                3,
                "depth {} lower bound {}",
                self.stack.len(),
                self.model.lower_bound()
            );
        }
        log!(self, 1, "search space exhausted");
        self.statistics
    }

    /// Assign one more variable; returns false if the search has to
    /// backtrack instead.
    fn step(&mut self) -> bool {
        if let Some(literal) = find_dominated(
            &*self.model,
            &self.active,
            &mut self.cursor,
            self.config.propagation_window,
        ) {
            if self.model.assign_literal(literal) == CONFLICT {
                return false;
            }
            self.push(literal.var(), FrameState::Propagated);
            self.statistics.propagations += 1;
            return true;
        }
        let literal = select_branch(
            &*self.model,
            &self.active,
            self.config.cheap_branching_threshold,
        );
        let state = if self.model.assign_literal(literal) == NO_CONFLICT {
            FrameState::Pending(-literal)
        } else if self.model.assign_literal(-literal) == NO_CONFLICT {
            FrameState::Propagated
        } else {
            return false;
        };
        self.statistics.branches += 1;
        self.push(literal.var(), state);
        true
    }

    fn push(&mut self, variable: Variable, state: FrameState) {
        self.stack.push(Frame { variable, state });
        self.active.remove(variable);
    }

    /// Undo frames until one with a pending alternative can take it.
    /// Returns false once the stack is empty.
    fn backtrack(&mut self) -> bool {
        while let Some(frame) = self.stack.pop() {
            self.model.unassign_literal();
            if let FrameState::Pending(alternative) = frame.state {
                if self.model.assign_literal(alternative) == NO_CONFLICT {
                    self.stack.push(Frame {
                        variable: frame.variable,
                        state: FrameState::Propagated,
                    });
                    return true;
                }
            }
            self.active.restore(frame.variable);
        }
        false
    }
}

/// Run the depth-first search to completion.
pub fn depth_first_search(model: &mut impl FormulaModel, config: &SearchConfig) -> SearchStatistics {
    BranchAndBoundSearch::new(model, config).run()
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::{
        clause::MAXWEIGHT,
        formula::{Formula, WeightedFormula},
    };

    /// A deterministic pseudo-random formula.
    pub fn random_formula(seed: u64, maxvar: usize, clauses: usize, hard: bool) -> WeightedFormula {
        let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let mut next = move |bound: u64| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) % bound
        };
        let mut formula = WeightedFormula::new(maxvar);
        for _ in 0..clauses {
            let length = 1 + next(3) as usize;
            let literals: Vec<i32> = (0..length)
                .map(|_| {
                    let variable = 1 + next(maxvar as u64) as i32;
                    if next(2) == 0 {
                        variable
                    } else {
                        -variable
                    }
                })
                .collect();
            let weight = if hard && next(8) == 0 {
                MAXWEIGHT
            } else {
                1 + next(9)
            };
            formula.add_clause(&literals, weight);
        }
        formula
    }

    fn solve_depth_first(input: &WeightedFormula, config: &SearchConfig) -> (Formula, SearchStatistics) {
        let mut model = Formula::new(input);
        let statistics = depth_first_search(&mut model, config);
        (model, statistics)
    }

    #[test]
    fn single_unit_clause_is_propagated() {
        let mut input = WeightedFormula::new(1);
        input.add_clause(&[1], 10);
        let (model, statistics) = solve_depth_first(&input, &SearchConfig::default());
        assert_eq!(statistics.branches, 0);
        assert_eq!(model.best_cost(), Some(0));
        assert_eq!(model.solution(), vector![1]);
    }

    #[test]
    fn hard_clause_is_respected() {
        let mut input = WeightedFormula::new(3);
        input.add_clause(&[-2, -3], MAXWEIGHT);
        input.add_clause(&[1], 5);
        input.add_clause(&[-1, 2], 3);
        input.add_clause(&[3], 2);
        let (model, _) = solve_depth_first(&input, &SearchConfig::default());
        assert_eq!(model.best_cost(), Some(2));
        let solution = model.solution();
        assert!(solution[1] == -1 || solution[2] == -1);
        assert_eq!(input.cost(&solution), 2);
        assert_eq!(solution, vector![1, 1, -1]);
    }

    #[test]
    fn empty_formula() {
        let input = WeightedFormula::new(0);
        let (model, statistics) = solve_depth_first(&input, &SearchConfig::default());
        assert_eq!(model.best_cost(), Some(0));
        assert_eq!(statistics, SearchStatistics::default());
    }

    #[test]
    fn matches_brute_force() {
        for seed in 0..40 {
            let maxvar = 1 + (seed as usize % 12);
            let input = random_formula(seed, maxvar, 3 * maxvar, seed % 3 == 0);
            let optimum = input.brute_force_optimum();
            let (model, _) = solve_depth_first(&input, &SearchConfig::default());
            assert_eq!(model.best_cost(), Some(optimum), "seed {}", seed);
            assert_eq!(input.cost(&model.solution()), optimum, "seed {}", seed);
        }
    }

    #[test]
    fn matches_brute_force_with_cheap_heuristics() {
        let config = SearchConfig {
            propagation_window: 0,
            cheap_branching_threshold: 0,
            ..SearchConfig::default()
        };
        for seed in 100..130 {
            let maxvar = 1 + (seed as usize % 12);
            let input = random_formula(seed, maxvar, 4 * maxvar, seed % 2 == 0);
            let optimum = input.brute_force_optimum();
            let (model, _) = solve_depth_first(&input, &config);
            assert_eq!(model.best_cost(), Some(optimum), "seed {}", seed);
        }
    }

    #[test]
    fn unsatisfiable_hard_clauses() {
        let mut input = WeightedFormula::new(2);
        input.add_clause(&[1], MAXWEIGHT);
        input.add_clause(&[-1], MAXWEIGHT);
        input.add_clause(&[2], 1);
        let (model, _) = solve_depth_first(&input, &SearchConfig::default());
        assert_eq!(model.best_cost(), Some(MAXWEIGHT));
    }

    #[test]
    fn initial_order() {
        let mut input = WeightedFormula::new(3);
        input.add_clause(&[1, 2], 1);
        input.add_clause(&[1], 4);
        input.add_clause(&[3, -1], 1);
        let model = Formula::new(&input);
        let active = ActiveVariables::ordered(&model);
        // hv1: x1 = 2 + 4 + 5 = 11, x2 = 2 + 0 + 1 = 3, x3 = 3
        assert_eq!(active.as_slice(), &[Variable(2), Variable(3), Variable(1)]);
        active.assert_consistent(&model);
    }

    #[test]
    fn active_partition() {
        let input = random_formula(7, 6, 12, false);
        let model = Formula::new(&input);
        let mut active = ActiveVariables::ordered(&model);
        let order: Vec<Variable> = active.as_slice().to_vec();
        active.remove(order[1]);
        assert_eq!(active.len(), 5);
        assert_eq!(active.get(1), order[5]);
        assert!(!active.contains(order[1]));
        active.remove(order[5]);
        assert_eq!(active.get(1), order[4]);
        active.restore(order[5]);
        active.restore(order[1]);
        assert_eq!(active.len(), 6);
        for index in 0..active.len() {
            assert!(active.contains(active.get(index)));
        }
        active.assert_consistent(&model);
    }

    #[test]
    fn removing_the_moved_variable() {
        let input = random_formula(3, 3, 6, false);
        let model = Formula::new(&input);
        let mut active = ActiveVariables::ordered(&model);
        let order: Vec<Variable> = active.as_slice().to_vec();
        active.remove(order[0]);
        assert_eq!(active.get(0), order[2]);
        active.remove(order[2]);
        assert_eq!(active.as_slice(), &[order[1]]);
        active.remove(order[1]);
        assert!(active.is_empty());
        for &variable in &order {
            assert!(!active.contains(variable));
        }
        active.restore(order[1]);
        active.restore(order[0]);
        assert_eq!(active.get(1), order[0]);
        active.remove(order[1]);
        assert_eq!(active.as_slice(), &[order[0]]);
        assert!(active.contains(order[0]));
    }

    #[test]
    fn dominance_scan() {
        let mut input = WeightedFormula::new(2);
        input.add_clause(&[1, 2], 1);
        input.add_clause(&[-1, -2], 1);
        input.add_clause(&[-2], 3);
        let model = Formula::new(&input);
        let active = ActiveVariables::ordered(&model);
        let mut cursor = None;
        assert_eq!(
            find_dominated(&model, &active, &mut cursor, 10),
            Some(Literal::new(-2))
        );
        assert_eq!(active.get(cursor.unwrap()), Variable(2));
        // Large problems do not restart an exhausted scan.
        let mut input = WeightedFormula::new(2);
        input.add_clause(&[1, 2], 1);
        input.add_clause(&[-1, -2], 1);
        let model = Formula::new(&input);
        let active = ActiveVariables::ordered(&model);
        let mut cursor = Some(1);
        assert_eq!(find_dominated(&model, &active, &mut cursor, 0), None);
        assert_eq!(cursor, None);
        assert_eq!(find_dominated(&model, &active, &mut cursor, 0), None);
        let mut cursor = Some(5);
        assert_eq!(find_dominated(&model, &active, &mut cursor, 0), None);
    }

    #[test]
    fn branching_selection() {
        let mut input = WeightedFormula::new(3);
        input.add_clause(&[1, 2], 2);
        input.add_clause(&[-1, 2], 2);
        input.add_clause(&[1, 3], 1);
        input.add_clause(&[-3, -2], 1);
        let model = Formula::new(&input);
        let active = ActiveVariables::ordered(&model);
        // x1: hv1 = 3 + 3 = 6, hv2 = 2 + 2 = 4, score 24 + 2
        // x2: hv1 = 4 + 4 = 8, hv2 = 1 + 1 = 2, score 16 + 1
        // x3: hv1 = 2, hv2 = 2, score 4 + 1
        assert_eq!(select_branch(&model, &active, 100), Literal::new(1));
        // x2 has the highest initial score, so it is the last active one;
        // x2 weighs 4 against 1 for -x2.
        let last = active.get(active.len() - 1);
        assert_eq!(last, Variable(2));
        let cheap = select_branch(&model, &active, 0);
        assert_eq!(cheap.var(), last);
        assert_eq!(cheap, Literal::new(2));
    }

    #[test]
    fn config_from_toml() {
        let config = SearchConfig::from_toml("mode = \"best-first\"\npropagation-window = 7\n").unwrap();
        assert_eq!(config.mode, SearchMode::BestFirst);
        assert_eq!(config.propagation_window, 7);
        assert_eq!(config.cheap_branching_threshold, 3000);
        assert!(SearchConfig::from_toml("colour = 1").is_err());
        assert_eq!(SearchConfig::from_toml("").unwrap(), SearchConfig::default());
    }
}
