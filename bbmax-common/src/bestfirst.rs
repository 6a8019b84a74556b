//! Recursive best-first branch and bound, without recursion
//!
//! Every depth `d` keeps the static lower bound of the branch taken
//! (`static_bound`) and its backed-up bound (`backed_up`, raised as
//! subtrees below are exhausted), the same pair for the deferred alternative,
//! and a cutoff: the subtree is abandoned as soon as its bound exceeds the
//! cutoff, at which point the better of the two branches is revisited.
//! The first complete assignment reached within its cutoff is optimal.

use crate::{
    clause::{Weight, MAXWEIGHT, NO_CONFLICT},
    formula::FormulaModel,
    literal::{Literal, Variable},
    memory::{BoundedVector, Vector},
    search::{find_dominated, select_branch, ActiveVariables, SearchConfig, SearchStatistics},
};
use std::{cmp, mem};

/// Bounds of one depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthBounds {
    pub static_bound: Weight,
    pub backed_up: Weight,
    pub alternative_static_bound: Weight,
    pub alternative_backed_up: Weight,
    pub cutoff: Weight,
}

impl DepthBounds {
    fn swap_branches(&mut self) {
        mem::swap(&mut self.static_bound, &mut self.alternative_static_bound);
        mem::swap(&mut self.backed_up, &mut self.alternative_backed_up);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Propagated,
    /// Branched; the literal is the polarity currently taken.
    Branched(Literal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    variable: Variable,
    step: Step,
}

/// Best-first search over a formula model.
///
/// The model must not refuse assignments because of its bound, so it has
/// to be run with bound conflicts disabled.
pub struct BestFirstSearch<'a, M: FormulaModel> {
    pub config: &'a SearchConfig,
    model: &'a mut M,
    active: ActiveVariables,
    stack: BoundedVector<Frame>,
    /// Indexed by depth, that is, by the stack length.
    bounds: Vector<DepthBounds>,
    cursor: Option<usize>,
    pub statistics: SearchStatistics,
}

impl<'a, M: FormulaModel> BestFirstSearch<'a, M> {
    pub fn new(model: &'a mut M, config: &'a SearchConfig) -> BestFirstSearch<'a, M> {
        let variables = model.variable_count();
        let active = ActiveVariables::ordered(&*model);
        let cursor = active.len().checked_sub(1);
        let mut bounds = Vector::fill(variables + 1, DepthBounds::default());
        let lower_bound = model.lower_bound();
        bounds[0] = DepthBounds {
            static_bound: lower_bound,
            backed_up: lower_bound,
            cutoff: MAXWEIGHT,
            ..DepthBounds::default()
        };
        BestFirstSearch {
            config,
            stack: BoundedVector::with_capacity(variables),
            model,
            active,
            bounds,
            cursor,
            statistics: SearchStatistics::default(),
        }
    }

    pub fn bounds(&self, depth: usize) -> DepthBounds {
        self.bounds[depth]
    }

    /// Search until a complete assignment is reached within its cutoff.
    pub fn run(mut self) -> SearchStatistics {
        let variables = self.model.variable_count();
        loop {
            let depth = self.stack.len();
            let current = self.bounds[depth];
            if current.static_bound > current.cutoff {
                self.bounds[depth].backed_up = cmp::max(current.backed_up, current.static_bound);
                if !self.backtrack() {
                    break;
                }
                continue;
            }
            if depth == variables {
                log!(self, 1, "optimum reached at cost {}", current.static_bound);
                break;
            }
            self.step();
            log!(
                self,
                3,
                "depth {} bound {} cutoff {}",
                self.stack.len(),
                self.bounds[self.stack.len()].backed_up,
                self.bounds[self.stack.len()].cutoff
            );
        }
        self.statistics
    }

    fn assign(&mut self, literal: Literal) {
        let result = self.model.assign_literal(literal);
        invariant!(
            result == NO_CONFLICT,
            "best-first search needs a model without bound conflicts"
        );
    }

    /// The backed-up bound of a child at `depth` with static bound `bound`:
    /// a parent whose own bound was raised passes it down.
    fn inherit(&self, depth: usize, bound: Weight) -> Weight {
        let parent = self.bounds[depth - 1];
        if parent.backed_up > parent.static_bound && parent.backed_up > bound {
            parent.backed_up
        } else {
            bound
        }
    }

    /// Recompute the lower bound of the branch just (re)assigned and fold
    /// it into the stored one, never beyond the alternative's static bound.
    fn merge_lower_bound(&mut self, depth: usize) {
        let fresh = self.model.lower_bound();
        if fresh <= self.bounds[depth].static_bound {
            return;
        }
        let merged = cmp::min(fresh, self.bounds[depth].alternative_static_bound);
        self.bounds[depth].static_bound = merged;
        if merged > self.bounds[depth].backed_up {
            self.bounds[depth].backed_up = self.inherit(depth, merged);
        }
    }

    fn step(&mut self) {
        if let Some(literal) = find_dominated(
            &*self.model,
            &self.active,
            &mut self.cursor,
            self.config.propagation_window,
        ) {
            self.assign(literal);
            self.push(literal.var(), Step::Propagated);
            self.statistics.propagations += 1;
            let depth = self.stack.len();
            let lower_bound = self.model.lower_bound();
            self.bounds[depth] = DepthBounds {
                static_bound: lower_bound,
                backed_up: self.inherit(depth, lower_bound),
                cutoff: self.bounds[depth - 1].cutoff,
                ..DepthBounds::default()
            };
            return;
        }
        let literal = select_branch(
            &*self.model,
            &self.active,
            self.config.cheap_branching_threshold,
        );
        self.push(literal.var(), Step::Branched(literal));
        let depth = self.stack.len();

        self.assign(-literal);
        let alternative = self.model.lower_bound();
        self.model.unassign_literal();
        self.assign(literal);
        let taken = self.model.lower_bound();
        self.bounds[depth] = DepthBounds {
            static_bound: taken,
            backed_up: self.inherit(depth, taken),
            alternative_static_bound: alternative,
            alternative_backed_up: self.inherit(depth, alternative),
            cutoff: 0,
        };
        if self.bounds[depth].alternative_backed_up < self.bounds[depth].backed_up {
            self.bounds[depth].swap_branches();
            self.stack.last_mut().step = Step::Branched(-literal);
            self.model.unassign_literal();
            self.assign(-literal);
            self.merge_lower_bound(depth);
        }
        self.bounds[depth].cutoff = cmp::min(
            self.bounds[depth - 1].cutoff,
            self.bounds[depth].alternative_backed_up,
        );
        self.statistics.branches += 1;
    }

    fn push(&mut self, variable: Variable, step: Step) {
        self.stack.push(Frame { variable, step });
        self.active.remove(variable);
    }

    /// Undo frames until a deferred alternative is good enough to be
    /// revived. Returns false once the stack is empty.
    fn backtrack(&mut self) -> bool {
        while !self.stack.is_empty() {
            let depth = self.stack.len();
            let frame = *self.stack.last();
            self.model.unassign_literal();
            if let Step::Branched(current) = frame.step {
                let parent_cutoff = self.bounds[depth - 1].cutoff;
                let bounds = &mut self.bounds[depth];
                if bounds.backed_up > bounds.alternative_backed_up {
                    bounds.swap_branches();
                    if bounds.backed_up <= parent_cutoff {
                        bounds.cutoff = cmp::min(parent_cutoff, bounds.alternative_backed_up);
                        self.stack.last_mut().step = Step::Branched(-current);
                        self.assign(-current);
                        self.merge_lower_bound(depth);
                        return true;
                    }
                } else {
                    invariant!(bounds.backed_up > parent_cutoff);
                }
            }
            let finished = self.bounds[depth].backed_up;
            invariant!(finished > self.bounds[depth].cutoff);
            invariant!(finished >= self.bounds[depth - 1].backed_up);
            self.bounds[depth - 1].backed_up = finished;
            self.stack.pop();
            self.active.restore(frame.variable);
        }
        false
    }
}

/// Run the best-first search to completion.
pub fn best_first_search(model: &mut impl FormulaModel, config: &SearchConfig) -> SearchStatistics {
    BestFirstSearch::new(model, config).run()
}
