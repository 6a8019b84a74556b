//! Solution reports and their verification
//!
//! A report is a TOML file that can be checked against the formula it
//! claims to solve, without trusting the solver.

use crate::{
    clause::{Weight, MAXWEIGHT},
    formula::WeightedFormula,
    memory::Vector,
    parser::open_file_for_writing,
    search::SearchMode,
    solver::Outcome,
};
use serde_derive::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Error, ErrorKind, Write},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    OptimumFound,
    /// Every assignment violates a hard clause.
    Unsatisfiable,
}

impl Status {
    /// The verdict of the `s` line.
    pub fn verdict(self) -> &'static str {
        match self {
            Status::OptimumFound => "OPTIMUM FOUND",
            Status::Unsatisfiable => "UNSATISFIABLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Report {
    pub status: Status,
    pub cost: Weight,
    pub mode: SearchMode,
    pub branches: usize,
    pub propagations: usize,
    /// Energy of the solution, for quadratic models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    /// The assignment in DIMACS notation, one literal per variable in order.
    pub values: Vector<i32>,
}

impl Report {
    pub fn new(outcome: &Outcome) -> Report {
        Report {
            status: if outcome.is_satisfiable() {
                Status::OptimumFound
            } else {
                Status::Unsatisfiable
            },
            cost: outcome.cost,
            mode: outcome.mode,
            branches: outcome.statistics.branches,
            propagations: outcome.statistics.propagations,
            energy: None,
            values: outcome.literals().iter().map(|literal| literal.decode()).collect(),
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
    pub fn from_toml(text: &str) -> Result<Report, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn write(&self, filename: &str) -> io::Result<()> {
        let text = self
            .to_toml()
            .map_err(|err| Error::new(ErrorKind::InvalidData, err.to_string()))?;
        let mut file = open_file_for_writing(filename)?;
        file.write_all(text.as_bytes())?;
        file.flush()
    }
    pub fn load(filename: &str) -> io::Result<Report> {
        let text = fs::read_to_string(filename)
            .map_err(|err| Error::new(err.kind(), format!("cannot open {}: {}", filename, err)))?;
        Report::from_toml(&text)
            .map_err(|err| Error::new(ErrorKind::InvalidData, format!("{}: {}", filename, err)))
    }

    /// The assignment as one sign per variable.
    fn signs(&self, formula: &WeightedFormula) -> Result<Vector<i8>, String> {
        if self.values.len() != formula.maxvar {
            return Err(format!(
                "the report assigns {} variables, the formula has {}",
                self.values.len(),
                formula.maxvar
            ));
        }
        let mut signs = Vector::with_capacity(self.values.len());
        for (index, &value) in self.values.iter().enumerate() {
            if value.checked_abs() != Some(index as i32 + 1) {
                return Err(format!(
                    "value number {} is {}, expected {} or -{}",
                    index + 1,
                    value,
                    index + 1,
                    index + 1
                ));
            }
            signs.push(if value > 0 { 1 } else { -1 });
        }
        Ok(signs)
    }

    /// Recompute the cost of the reported assignment and compare it with
    /// the reported cost and status.
    pub fn check(&self, formula: &WeightedFormula) -> Result<(), String> {
        let signs = self.signs(formula)?;
        let cost = formula.cost(&signs);
        if cost != self.cost {
            return Err(format!(
                "the assignment costs {}, the report claims {}",
                cost, self.cost
            ));
        }
        match self.status {
            Status::OptimumFound if cost == MAXWEIGHT => {
                Err("the assignment violates a hard clause".to_string())
            }
            Status::Unsatisfiable if cost < MAXWEIGHT => {
                Err("the assignment satisfies all hard clauses".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Additionally compare the cost with an independently computed optimum.
    pub fn check_optimum(&self, formula: &WeightedFormula, optimum: Weight) -> Result<(), String> {
        self.check(formula)?;
        if self.cost != optimum {
            return Err(format!(
                "the reported cost {} is not the optimum {}",
                self.cost, optimum
            ));
        }
        Ok(())
    }
}
