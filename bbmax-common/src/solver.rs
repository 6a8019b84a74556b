//! Entry point that runs a search engine on a weighted formula

use crate::{
    bestfirst::best_first_search,
    clause::{Weight, MAXWEIGHT},
    formula::{Formula, FormulaModel, WeightedFormula},
    literal::{Literal, Variable},
    memory::{format_memory_usage, Vector},
    output::print_key_value,
    search::{depth_first_search, SearchConfig, SearchMode, SearchStatistics},
};

/// The result of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub mode: SearchMode,
    /// The optimum; MAXWEIGHT if every assignment violates a hard clause.
    pub cost: Weight,
    /// One sign per variable, `+1` for true.
    pub values: Vector<i8>,
    pub statistics: SearchStatistics,
    /// Whether the optimum was printed as an `o` line during the search.
    pub objective_reported: bool,
    /// Heap usage per component, taken before the model is dropped.
    pub memory: Vector<(&'static str, usize)>,
}

impl Outcome {
    /// Whether the optimum satisfies all hard clauses.
    pub fn is_satisfiable(&self) -> bool {
        self.cost < MAXWEIGHT
    }
    /// The optimal assignment as signed literals.
    pub fn literals(&self) -> Vector<Literal> {
        self.values
            .iter()
            .enumerate()
            .map(|(index, &sign)| Variable::new(index as u32 + 1).literal(sign > 0))
            .collect()
    }
    pub fn print_memory_breakdown(&self) {
        let mut total = 0;
        for &(name, bytes) in &self.memory {
            print_key_value(&format!("memory {} (MB)", name), format_memory_usage(bytes));
            total += bytes;
        }
        print_key_value("memory total (MB)", format_memory_usage(total));
    }
}

/// Find an optimal assignment with the engine selected in the config.
///
/// Best-first search needs the model to accept every assignment, so bound
/// conflicts are only enabled for depth-first search.
pub fn solve(formula: &WeightedFormula, config: &SearchConfig) -> Outcome {
    let mut model = Formula::new(formula);
    model.report_improvements = config.report_improvements;
    model.bound_conflicts = config.mode == SearchMode::DepthFirst;
    _log!(
        config.verbosity,
        1,
        "{} variables, {} clauses after normalization",
        model.variable_count(),
        model.clause_count()
    );
    let statistics = match config.mode {
        SearchMode::DepthFirst => depth_first_search(&mut model, config),
        SearchMode::BestFirst => best_first_search(&mut model, config),
    };
    let cost = model.best_cost();
    invariant!(cost.is_some(), "search ended without a complete assignment");
    Outcome {
        mode: config.mode,
        cost: cost.unwrap_or(MAXWEIGHT),
        values: model.solution(),
        statistics,
        objective_reported: model.objective_reported(),
        memory: model.memory_breakdown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tests::random_formula;

    fn quiet(mode: SearchMode) -> SearchConfig {
        SearchConfig {
            mode,
            report_improvements: false,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn engines_agree() {
        for seed in 300..320 {
            let maxvar = 2 + (seed as usize % 10);
            let formula = random_formula(seed, maxvar, 3 * maxvar, seed % 4 == 0);
            let depth_first = solve(&formula, &quiet(SearchMode::DepthFirst));
            let best_first = solve(&formula, &quiet(SearchMode::BestFirst));
            assert_eq!(depth_first.cost, formula.brute_force_optimum(), "seed {}", seed);
            assert_eq!(depth_first.cost, best_first.cost, "seed {}", seed);
            assert_eq!(formula.cost(&best_first.values), best_first.cost, "seed {}", seed);
            assert_eq!(best_first.mode, SearchMode::BestFirst);
        }
    }

    #[test]
    fn unsatisfiable() {
        let mut formula = WeightedFormula::new(1);
        formula.add_clause(&[1], MAXWEIGHT);
        formula.add_clause(&[-1], MAXWEIGHT);
        for &mode in &[SearchMode::DepthFirst, SearchMode::BestFirst] {
            let outcome = solve(&formula, &quiet(mode));
            assert!(!outcome.is_satisfiable());
            assert_eq!(outcome.values.len(), 1);
        }
    }

    #[test]
    fn objective_of_an_empty_formula_is_left_to_the_caller() {
        let config = SearchConfig {
            report_improvements: true,
            ..SearchConfig::default()
        };
        let outcome = solve(&WeightedFormula::new(0), &config);
        assert_eq!(outcome.cost, 0);
        assert!(outcome.is_satisfiable());
        assert!(!outcome.objective_reported);
        let mut formula = WeightedFormula::new(1);
        formula.add_clause(&[1], 3);
        assert!(solve(&formula, &config).objective_reported);
        assert!(!solve(&formula, &quiet(SearchMode::BestFirst)).objective_reported);
    }

    #[test]
    fn literals_of_the_solution() {
        let mut formula = WeightedFormula::new(3);
        formula.add_clause(&[1], 2);
        formula.add_clause(&[-2], 2);
        formula.add_clause(&[-3, 2], 1);
        let outcome = solve(&formula, &quiet(SearchMode::DepthFirst));
        assert_eq!(outcome.cost, 0);
        assert_eq!(
            outcome.literals(),
            vector![Literal::new(1), Literal::new(-2), Literal::new(-3)]
        );
        assert!(outcome.memory.iter().any(|&(name, _)| name == "clause store"));
    }
}
