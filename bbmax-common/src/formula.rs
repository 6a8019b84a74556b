//! The formula model consumed by the search engines

use crate::{
    clause::{ClauseRef, MaybeConflict, Weight, CONFLICT, MAXWEIGHT, NO_CONFLICT},
    clausestore::ClauseStore,
    literal::{literal_array_len, Literal, Variable},
    memory::{Array, HeapSpace, Offset, Vector},
    output::print_objective,
};
use bbmax_macros::HeapSpace;
use std::{cmp, collections::HashMap};

/// What the search needs to know about a formula under a partial assignment.
///
/// All statistics refer to the active clauses: those that are not satisfied
/// and still have at least one unassigned literal.
pub trait FormulaModel {
    /// Number of variables, fixed for the lifetime of the model.
    fn variable_count(&self) -> usize;
    /// Weight of the active clauses containing the literal.
    fn occurrence_length(&self, literal: Literal) -> Weight;
    /// Weight of the active clauses whose only unassigned literal is this one.
    fn unit_length(&self, literal: Literal) -> Weight;
    /// Weight of the active clauses with two unassigned literals, one of
    /// which is this one.
    fn binary_length(&self, literal: Literal) -> Weight;
    /// The part of the lower bound that is owed to this literal.
    fn lower_bound_contribution(&self, literal: Literal) -> Weight;
    /// Minimum cost of any completion of the current partial assignment.
    fn lower_bound(&self) -> Weight;
    /// Best cost found so far minus the lower bound; zero means that this
    /// branch cannot improve.
    fn best_minus_lower_bound(&self) -> Weight;
    fn is_assigned(&self, variable: Variable) -> bool;
    /// Make the literal true.
    ///
    /// On `CONFLICT` the model is left unchanged.
    fn assign_literal(&mut self, literal: Literal) -> MaybeConflict;
    /// Undo the most recent successful [`assign_literal`](#tymethod.assign_literal).
    fn unassign_literal(&mut self);
    /// Cost of the best complete assignment seen so far.
    fn best_cost(&self) -> Option<Weight>;
    /// The best complete assignment, as `+1` / `-1` per variable.
    fn solution(&self) -> Vector<i8>;
}

/// A clause as given in the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightedClause {
    pub literals: Vector<Literal>,
    pub weight: Weight,
}

/// A weighted clause list, the input to [`Formula::new`](struct.Formula.html#method.new).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightedFormula {
    /// Variables are `1..=maxvar`.
    pub maxvar: usize,
    pub clauses: Vector<WeightedClause>,
}

impl WeightedFormula {
    pub fn new(maxvar: usize) -> WeightedFormula {
        WeightedFormula {
            maxvar,
            clauses: Vector::new(),
        }
    }
    /// Add a clause given in DIMACS notation. Weights above MAXWEIGHT are
    /// hard.
    pub fn add_clause(&mut self, literals: &[i32], weight: Weight) {
        let literals = literals.iter().map(|&value| Literal::new(value)).collect();
        self.push(literals, weight);
    }
    pub fn push(&mut self, literals: Vector<Literal>, weight: Weight) {
        for &literal in &literals {
            requires!(literal.var().0 != 0);
            self.maxvar = cmp::max(self.maxvar, literal.var().as_offset());
        }
        self.clauses.push(WeightedClause {
            literals,
            weight: cmp::min(weight, MAXWEIGHT),
        });
    }
    /// The weight of the clauses falsified by a complete assignment, given as
    /// one sign per variable.
    pub fn cost(&self, values: &[i8]) -> Weight {
        requires!(values.len() == self.maxvar);
        self.clauses
            .iter()
            .filter(|clause| {
                !clause
                    .literals
                    .iter()
                    .any(|&literal| values[literal.var().as_offset() - 1] == literal.sign())
            })
            .fold(0, |total: Weight, clause| {
                cmp::min(MAXWEIGHT, total.saturating_add(clause.weight))
            })
    }
    /// The cost of the best assignment by trying all of them.
    pub fn brute_force_optimum(&self) -> Weight {
        requires!(self.maxvar < 24);
        (0..1u32 << self.maxvar)
            .map(|bits| {
                let values: Vector<i8> = (0..self.maxvar)
                    .map(|i| if bits & (1 << i) != 0 { 1 } else { -1 })
                    .collect();
                self.cost(&values)
            })
            .min()
            .unwrap_or(0)
    }
}

/// Clamp a 128 bit accumulator to a weight.
fn clamp(value: u128) -> Weight {
    cmp::min(value, MAXWEIGHT as u128) as Weight
}

fn shift(accumulator: &mut u128, weight: u128, add: bool) {
    if add {
        *accumulator += weight;
    } else {
        *accumulator -= weight;
    }
}

/// The formula model backed by a [ClauseStore](../clausestore/struct.ClauseStore.html).
///
/// Assigning a literal updates the statistics of exactly the clauses that
/// contain the literal or its negation: their old contribution is retracted,
/// the store is updated and the new contribution is applied.
///
/// The lower bound is the cost of the falsified clauses plus, for every
/// unassigned variable `v`, `min(unit(v), unit(-v))`: one of the two sets of
/// unit clauses is falsified by any completion.
#[derive(Debug, HeapSpace)]
pub struct Formula {
    store: ClauseStore,
    maxvar: usize,
    /// Handles of the clauses, indexed densely.
    clauses: Vector<ClauseRef>,
    /// Number of true literals per clause.
    satisfied: Vector<u32>,
    /// Clause indices per literal.
    occurrences: Array<Literal, Vector<u32>>,
    occurrence: Array<Literal, u128>,
    unit: Array<Literal, u128>,
    binary: Array<Literal, u128>,
    /// Weight of the falsified clauses.
    cost: u128,
    /// Sum of `min(unit(v), unit(-v))` over all variables.
    unit_bound: u128,
    value: Array<Variable, i8>,
    trail: Vector<Literal>,
    best: Option<Weight>,
    best_values: Vector<i8>,
    /// Refuse assignments that raise the lower bound to the best cost.
    pub bound_conflicts: bool,
    /// Print an `o` line for every improvement.
    pub report_improvements: bool,
    /// Whether an `o` line has been printed.
    reported: bool,
}

impl Formula {
    /// Build the model.
    ///
    /// Duplicate literals are merged, tautologies and clauses of weight 0
    /// are dropped and identical clauses are merged by adding their weights.
    pub fn new(input: &WeightedFormula) -> Formula {
        let maxvar = input.maxvar;
        let literals = literal_array_len(maxvar);
        let mut formula = Formula {
            store: ClauseStore::new(maxvar),
            maxvar,
            clauses: Vector::new(),
            satisfied: Vector::new(),
            occurrences: Array::new(Vector::new(), literals),
            occurrence: Array::new(0, literals),
            unit: Array::new(0, literals),
            binary: Array::new(0, literals),
            cost: 0,
            unit_bound: 0,
            value: Array::new(0, maxvar + 1),
            trail: Vector::with_capacity(maxvar),
            best: None,
            best_values: Vector::new(),
            bound_conflicts: true,
            report_improvements: false,
            reported: false,
        };
        let mut known: HashMap<Vector<Literal>, usize> = HashMap::new();
        for clause in &input.clauses {
            if clause.weight == 0 {
                continue;
            }
            let mut literals = clause.literals.clone();
            literals.sort_unstable();
            literals.dedup();
            if literals.windows(2).any(|pair| pair[0].var() == pair[1].var()) {
                continue;
            }
            let weight = cmp::min(clause.weight, MAXWEIGHT);
            if let Some(&index) = known.get(&literals) {
                let handle = formula.clauses[index];
                let added = cmp::min(weight, MAXWEIGHT - formula.store.weight(handle));
                if added != 0 {
                    formula.store.add_weight(handle, added, true);
                }
                continue;
            }
            let index = formula.clauses.len();
            let handle = formula.store.add_clause(&literals, weight);
            for &literal in &literals {
                requires!(literal.var().as_offset() <= maxvar);
                formula.occurrences[literal].push(index as u32);
            }
            formula.clauses.push(handle);
            known.insert(literals, index);
        }
        formula.satisfied = Vector::fill(formula.clauses.len(), 0);
        for clause in 0..formula.clauses.len() {
            formula.update_statistics(clause, true);
        }
        if maxvar == 0 {
            formula.record_solution();
        }
        formula
    }

    /// Whether the best cost has already been printed as an `o` line.
    pub fn objective_reported(&self) -> bool {
        self.reported
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }
    pub fn store(&self) -> &ClauseStore {
        &self.store
    }
    /// The live literals of the clause with the given index.
    pub fn clause_literals(&mut self, clause: usize) -> &[Literal] {
        let handle = self.clauses[clause];
        self.store.literals(handle)
    }
    pub fn clause_weight(&self, clause: usize) -> Weight {
        self.store.weight(self.clauses[clause])
    }
    /// Weight of the clauses falsified by the current partial assignment.
    pub fn cost(&self) -> Weight {
        clamp(self.cost)
    }
    pub fn trail(&self) -> &[Literal] {
        &self.trail
    }

    /// Heap usage per component.
    pub fn memory_breakdown(&self) -> Vector<(&'static str, usize)> {
        vector![
            ("clause store", self.store.heap_space()),
            ("occurrence lists", self.occurrences.heap_space()),
            (
                "literal statistics",
                self.occurrence.heap_space() + self.unit.heap_space() + self.binary.heap_space()
            ),
            (
                "assignment",
                self.value.heap_space()
                    + self.trail.heap_space()
                    + self.best_values.heap_space()
                    + self.satisfied.heap_space()
                    + self.clauses.heap_space()
            ),
        ]
    }

    /// Add or retract the contribution of one clause to the statistics.
    fn update_statistics(&mut self, clause: usize, add: bool) {
        if self.satisfied[clause] != 0 {
            return;
        }
        let handle = self.clauses[clause];
        let weight = self.store.weight(handle) as u128;
        let literals = self.store.literals(handle);
        let length = literals.len();
        if length == 0 {
            shift(&mut self.cost, weight, add);
            return;
        }
        for &literal in literals {
            shift(&mut self.occurrence[literal], weight, add);
            match length {
                1 => {
                    let before = cmp::min(self.unit[literal], self.unit[-literal]);
                    shift(&mut self.unit[literal], weight, add);
                    let after = cmp::min(self.unit[literal], self.unit[-literal]);
                    self.unit_bound = self.unit_bound + after - before;
                }
                2 => shift(&mut self.binary[literal], weight, add),
                _ => (),
            }
        }
    }

    fn update_occurrences(&mut self, literal: Literal, add: bool) {
        for position in 0..self.occurrences[literal].len() {
            let clause = self.occurrences[literal][position] as usize;
            self.update_statistics(clause, add);
        }
    }

    /// Set (`assign = true`) or clear the value of the variable of `literal`.
    fn change_value(&mut self, literal: Literal, assign: bool) {
        let falsified = -literal;
        self.update_occurrences(literal, false);
        self.update_occurrences(falsified, false);
        if assign {
            self.store.assign_variable(falsified);
        } else {
            self.store.unassign_variable(falsified);
        }
        for position in 0..self.occurrences[falsified].len() {
            let handle = self.clauses[self.occurrences[falsified][position] as usize];
            if assign {
                self.store.decrease_length(handle);
            } else {
                self.store.increase_length(handle);
            }
        }
        for position in 0..self.occurrences[literal].len() {
            let clause = self.occurrences[literal][position] as usize;
            if assign {
                self.satisfied[clause] += 1;
            } else {
                self.satisfied[clause] -= 1;
            }
        }
        if assign {
            self.value[literal.var()] = literal.sign();
            self.trail.push(literal);
        } else {
            self.value[literal.var()] = 0;
            self.trail.pop();
        }
        self.update_occurrences(literal, true);
        self.update_occurrences(falsified, true);
    }

    fn best_or_unbounded(&self) -> Weight {
        self.best.unwrap_or(Weight::max_value())
    }

    /// Remember the current complete assignment if it improves the best one.
    fn record_solution(&mut self) {
        requires!(self.trail.len() == self.maxvar);
        let cost = self.cost();
        if cost >= self.best_or_unbounded() {
            return;
        }
        self.best = Some(cost);
        self.best_values = Variable::range(self.maxvar)
            .map(|variable| self.value[variable])
            .collect();
        if self.report_improvements && cost < MAXWEIGHT {
            print_objective(cost);
            self.reported = true;
        }
    }
}

impl FormulaModel for Formula {
    fn variable_count(&self) -> usize {
        self.maxvar
    }
    fn occurrence_length(&self, literal: Literal) -> Weight {
        clamp(self.occurrence[literal])
    }
    fn unit_length(&self, literal: Literal) -> Weight {
        clamp(self.unit[literal])
    }
    fn binary_length(&self, literal: Literal) -> Weight {
        clamp(self.binary[literal])
    }
    fn lower_bound_contribution(&self, literal: Literal) -> Weight {
        let unit = self.unit[literal];
        clamp(unit - cmp::min(unit, self.unit[-literal]))
    }
    fn lower_bound(&self) -> Weight {
        clamp(self.cost + self.unit_bound)
    }
    fn best_minus_lower_bound(&self) -> Weight {
        self.best_or_unbounded().saturating_sub(self.lower_bound())
    }
    fn is_assigned(&self, variable: Variable) -> bool {
        self.value[variable] != 0
    }
    fn assign_literal(&mut self, literal: Literal) -> MaybeConflict {
        requires!(!self.is_assigned(literal.var()));
        self.change_value(literal, true);
        if self.trail.len() == self.maxvar {
            self.record_solution();
            return NO_CONFLICT;
        }
        if self.bound_conflicts && self.lower_bound() >= self.best_or_unbounded() {
            self.change_value(literal, false);
            return CONFLICT;
        }
        NO_CONFLICT
    }
    fn unassign_literal(&mut self) {
        requires!(!self.trail.is_empty());
        let literal = *self.trail.last();
        self.change_value(literal, false);
    }
    fn best_cost(&self) -> Option<Weight> {
        self.best
    }
    fn solution(&self) -> Vector<i8> {
        self.best_values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(maxvar: usize, clauses: &[(&[i32], Weight)]) -> WeightedFormula {
        let mut formula = WeightedFormula::new(maxvar);
        for &(literals, weight) in clauses {
            formula.add_clause(literals, weight);
        }
        formula
    }

    fn lit(value: i32) -> Literal {
        Literal::new(value)
    }

    fn snapshot(model: &mut Formula) -> Vec<(Vec<i32>, Weight, bool)> {
        (0..model.clause_count())
            .map(|clause| {
                let mut literals: Vec<i32> = model
                    .clause_literals(clause)
                    .iter()
                    .map(|literal| literal.decode())
                    .collect();
                literals.sort();
                let handle = model.clauses[clause];
                (
                    literals,
                    model.clause_weight(clause),
                    model.store.is_deleted(handle),
                )
            })
            .collect()
    }

    fn statistics(model: &Formula) -> Vec<Weight> {
        let mut result = vec![model.lower_bound(), model.cost()];
        for value in 1..=model.variable_count() as i32 {
            for &literal in &[lit(value), lit(-value)] {
                result.push(model.occurrence_length(literal));
                result.push(model.unit_length(literal));
                result.push(model.binary_length(literal));
                result.push(model.lower_bound_contribution(literal));
            }
        }
        result
    }

    fn example() -> Formula {
        Formula::new(&formula(
            3,
            &[(&[1, 2], 3), (&[-1], 2), (&[1], 5), (&[2, -3, 1], 1)],
        ))
    }

    #[test]
    fn initial_statistics() {
        let model = example();
        assert_eq!(model.unit_length(lit(1)), 5);
        assert_eq!(model.unit_length(lit(-1)), 2);
        assert_eq!(model.binary_length(lit(1)), 3);
        assert_eq!(model.binary_length(lit(2)), 3);
        assert_eq!(model.occurrence_length(lit(1)), 9);
        assert_eq!(model.occurrence_length(lit(-3)), 1);
        assert_eq!(model.lower_bound(), 2);
        assert_eq!(model.lower_bound_contribution(lit(1)), 3);
        assert_eq!(model.lower_bound_contribution(lit(-1)), 0);
        assert_eq!(model.best_cost(), None);
        assert_eq!(model.best_minus_lower_bound(), Weight::max_value() - 2);
    }

    #[test]
    fn assignment_updates_statistics() {
        let mut model = example();
        assert_eq!(model.assign_literal(lit(-1)), NO_CONFLICT);
        assert_eq!(model.cost(), 5);
        assert_eq!(model.unit_length(lit(2)), 3);
        assert_eq!(model.binary_length(lit(2)), 1);
        assert_eq!(model.binary_length(lit(-3)), 1);
        assert_eq!(model.occurrence_length(lit(1)), 0);
        assert_eq!(model.lower_bound(), 5);
        assert!(model.is_assigned(Variable(1)));
        assert_eq!(model.trail(), &[lit(-1)]);
    }

    #[test]
    fn assignment_round_trip() {
        let mut model = example();
        let clauses = snapshot(&mut model);
        let before = statistics(&model);
        for &value in &[1, -1, 2, -2, 3, -3] {
            assert_eq!(model.assign_literal(lit(value)), NO_CONFLICT);
            model.unassign_literal();
            assert_eq!(snapshot(&mut model), clauses);
            assert_eq!(statistics(&model), before);
        }
        model.assign_literal(lit(2));
        let inner = snapshot(&mut model);
        let inner_statistics = statistics(&model);
        model.assign_literal(lit(-3));
        model.unassign_literal();
        assert_eq!(snapshot(&mut model), inner);
        assert_eq!(statistics(&model), inner_statistics);
        model.unassign_literal();
        assert_eq!(snapshot(&mut model), clauses);
        assert!(!model.is_assigned(Variable(2)));
    }

    #[test]
    fn clauses_are_normalized() {
        let model = Formula::new(&formula(
            3,
            &[
                (&[1, 2], 3),
                (&[2, 1, 2], 4),
                (&[1, -1, 3], 8),
                (&[3], 0),
                (&[-3], MAXWEIGHT),
                (&[-3], MAXWEIGHT),
            ],
        ));
        assert_eq!(model.clause_count(), 2);
        assert_eq!(model.clause_weight(0), 7);
        assert_eq!(model.store.saved_weight(model.clauses[0]), 7);
        assert_eq!(model.clause_weight(1), MAXWEIGHT);
        assert_eq!(model.occurrence_length(lit(3)), 0);
    }

    #[test]
    fn complete_assignments_are_recorded() {
        let mut model = Formula::new(&formula(2, &[(&[1], 5), (&[-1], 3), (&[2], 1)]));
        model.assign_literal(lit(1));
        model.assign_literal(lit(2));
        assert_eq!(model.best_cost(), Some(3));
        assert_eq!(model.solution(), vector![1, 1]);
        model.unassign_literal();
        model.unassign_literal();
        assert_eq!(model.assign_literal(lit(-1)), CONFLICT);
        assert!(!model.is_assigned(Variable(1)));
        assert!(model.trail().is_empty());
        assert_eq!(model.lower_bound(), 3);

        model.bound_conflicts = false;
        assert_eq!(model.assign_literal(lit(-1)), NO_CONFLICT);
        assert_eq!(model.best_minus_lower_bound(), 0);
        model.assign_literal(lit(2));
        assert_eq!(model.best_cost(), Some(3));
        assert_eq!(model.solution(), vector![1, 1]);
    }

    #[test]
    fn empty_formula_and_empty_clauses() {
        let model = Formula::new(&formula(0, &[(&[], 4), (&[], 2)]));
        assert_eq!(model.best_cost(), Some(6));
        assert!(model.solution().is_empty());

        let mut model = Formula::new(&formula(1, &[(&[], 4), (&[1], 1)]));
        assert_eq!(model.lower_bound(), 4);
        model.assign_literal(lit(-1));
        assert_eq!(model.best_cost(), Some(5));
    }

    #[test]
    fn hard_weights_saturate() {
        let mut model = Formula::new(&formula(
            2,
            &[(&[1], MAXWEIGHT), (&[-1], MAXWEIGHT), (&[1, 2], MAXWEIGHT)],
        ));
        assert_eq!(model.occurrence_length(lit(1)), MAXWEIGHT);
        assert_eq!(model.lower_bound(), MAXWEIGHT);
        model.bound_conflicts = false;
        model.assign_literal(lit(-1));
        assert_eq!(model.cost(), MAXWEIGHT);
        assert_eq!(model.lower_bound(), MAXWEIGHT);
    }

    #[test]
    fn cost_of_an_assignment() {
        let input = formula(3, &[(&[1, 2], 3), (&[-1], 2), (&[1], 5), (&[2, -3, 1], 1)]);
        assert_eq!(input.cost(&[1, 1, 1]), 2);
        assert_eq!(input.cost(&[-1, -1, 1]), 9);
        assert_eq!(input.brute_force_optimum(), 2);
    }
}
