//! Quadratic models as weighted formulas
//!
//! A binary model `E(x) = offset + sum h_i x_i + sum J_ij x_i x_j` with
//! `x_i in {0, 1}` is scaled by `1 / precision`, rounded, and encoded so
//! that the cost of an assignment differs from the scaled energy by a
//! constant shift:
//!
//! | term      | clauses                                       | shift |
//! |-----------|-----------------------------------------------|-------|
//! | `h > 0`   | `(-x_i)` weight `h`                           | 0     |
//! | `h < 0`   | `(x_i)` weight `-h`                           | `-h`  |
//! | `J > 0`   | `(-x_i v -x_j)` weight `J`                    | 0     |
//! | `J < 0`   | `(x_i v x_j)`, `(-x_i v x_j)`, `(x_i v -x_j)` | `-J`  |
//!
//! Variable `i` (0-based) becomes DIMACS variable `i + 1`, true meaning
//! `x_i = 1`. Spin models (`s_i in {-1, +1}`) are rewritten with
//! `s = 2x - 1`, so a positive literal is spin `+1`.

use crate::{
    clause::{Weight, MAXWEIGHT},
    formula::WeightedFormula,
    memory::Vector,
};
use serde_derive::{Deserialize, Serialize};
use std::{
    cmp, fs,
    io::{self, Error, ErrorKind},
};

/// The domain of the variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableType {
    /// `x in {0, 1}`
    Binary,
    /// `s in {-1, +1}`
    Spin,
}

impl Default for VariableType {
    fn default() -> VariableType {
        VariableType::Binary
    }
}

/// A coupling `value * v_i * v_j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Interaction {
    pub i: usize,
    pub j: usize,
    pub value: f64,
}

fn default_precision() -> f64 {
    1e-6
}

/// A quadratic model, as read from TOML:
///
/// ```toml
/// vartype = "spin"
/// offset = 0.5
/// precision = 0.001
/// linear = [1.0, -2.0]
/// quadratic = [{ i = 0, j = 1, value = -1.5 }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuadraticModel {
    #[serde(default)]
    pub vartype: VariableType,
    #[serde(default)]
    pub offset: f64,
    /// Coefficients are rounded to multiples of this.
    #[serde(default = "default_precision")]
    pub precision: f64,
    /// The linear coefficient of each variable, by index.
    #[serde(default)]
    pub linear: Vector<f64>,
    #[serde(default)]
    pub quadratic: Vector<Interaction>,
}

/// A model encoded as a formula, with what it takes to map costs back to
/// energies.
#[derive(Debug, Clone, PartialEq)]
pub struct QuboEncoding {
    pub formula: WeightedFormula,
    /// Cost of an assignment minus its scaled energy (without offset).
    pub shift: Weight,
    pub precision: f64,
    pub offset: f64,
}

impl QuboEncoding {
    /// The energy of an assignment of the given cost.
    pub fn energy(&self, cost: Weight) -> f64 {
        (i128::from(cost) - i128::from(self.shift)) as f64 * self.precision + self.offset
    }
}

fn invalid(message: String) -> Error {
    Error::new(ErrorKind::InvalidData, message)
}

impl QuadraticModel {
    pub fn new(vartype: VariableType) -> QuadraticModel {
        QuadraticModel {
            vartype,
            offset: 0.0,
            precision: default_precision(),
            linear: Vector::new(),
            quadratic: Vector::new(),
        }
    }
    pub fn from_toml(text: &str) -> Result<QuadraticModel, toml::de::Error> {
        toml::from_str(text)
    }
    /// Read a model from a TOML file.
    pub fn load(filename: &str) -> io::Result<QuadraticModel> {
        let text = fs::read_to_string(filename)
            .map_err(|err| Error::new(err.kind(), format!("cannot open {}: {}", filename, err)))?;
        QuadraticModel::from_toml(&text).map_err(|err| invalid(format!("{}: {}", filename, err)))
    }

    /// One more than the largest variable index used.
    pub fn variable_count(&self) -> usize {
        self.quadratic
            .iter()
            .map(|interaction| cmp::max(interaction.i, interaction.j) + 1)
            .fold(self.linear.len(), cmp::max)
    }

    /// The energy of an assignment given as one sign per variable, where a
    /// positive sign is `x = 1` or `s = +1`.
    pub fn energy(&self, values: &[i8]) -> f64 {
        requires!(values.len() >= self.variable_count());
        let value = |index: usize| match self.vartype {
            VariableType::Binary => {
                if values[index] > 0 {
                    1.0
                } else {
                    0.0
                }
            }
            VariableType::Spin => f64::from(values[index].signum()),
        };
        let linear: f64 = self
            .linear
            .iter()
            .enumerate()
            .map(|(index, &h)| h * value(index))
            .sum();
        let quadratic: f64 = self
            .quadratic
            .iter()
            .map(|interaction| interaction.value * value(interaction.i) * value(interaction.j))
            .sum();
        self.offset + linear + quadratic
    }

    /// The equivalent binary model; diagonal couplings are folded into the
    /// linear part.
    pub fn to_binary(&self) -> QuadraticModel {
        let mut binary = QuadraticModel::new(VariableType::Binary);
        binary.precision = self.precision;
        binary.offset = self.offset;
        binary.linear = Vector::fill(self.variable_count(), 0.0);
        match self.vartype {
            VariableType::Binary => {
                for (index, &h) in self.linear.iter().enumerate() {
                    binary.linear[index] += h;
                }
                for &interaction in &self.quadratic {
                    if interaction.i == interaction.j {
                        binary.linear[interaction.i] += interaction.value;
                    } else {
                        binary.quadratic.push(interaction);
                    }
                }
            }
            VariableType::Spin => {
                // h s = 2h x - h
                for (index, &h) in self.linear.iter().enumerate() {
                    binary.linear[index] += 2.0 * h;
                    binary.offset -= h;
                }
                // J s_i s_j = 4J x_i x_j - 2J x_i - 2J x_j + J
                for &Interaction { i, j, value } in &self.quadratic {
                    if i == j {
                        binary.offset += value;
                        continue;
                    }
                    binary.quadratic.push(Interaction {
                        i,
                        j,
                        value: 4.0 * value,
                    });
                    binary.linear[i] -= 2.0 * value;
                    binary.linear[j] -= 2.0 * value;
                    binary.offset += value;
                }
            }
        }
        binary
    }

    /// Encode the model as a weighted formula.
    pub fn encode(&self) -> io::Result<QuboEncoding> {
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(invalid(format!("invalid precision {}", self.precision)));
        }
        let coefficients = self
            .linear
            .iter()
            .cloned()
            .chain(self.quadratic.iter().map(|interaction| interaction.value))
            .chain(Some(self.offset));
        for coefficient in coefficients {
            if !coefficient.is_finite() {
                return Err(invalid(format!("invalid coefficient {}", coefficient)));
            }
        }
        let binary = self.to_binary();
        let maxvar = binary.variable_count();
        if maxvar > i32::max_value() as usize {
            return Err(invalid(format!("too many variables: {}", maxvar)));
        }
        let scale = |value: f64| (value / binary.precision).round();
        let literal = |index: usize, positive: bool| {
            let variable = index as i32 + 1;
            if positive {
                variable
            } else {
                -variable
            }
        };
        let mut formula = WeightedFormula::new(maxvar);
        let mut shift: Weight = 0;
        for (index, &h) in binary.linear.iter().enumerate() {
            let scaled = scale(h);
            let weight = scaled.abs() as Weight;
            if weight == 0 {
                continue;
            }
            if scaled > 0.0 {
                formula.add_clause(&[literal(index, false)], weight);
            } else {
                formula.add_clause(&[literal(index, true)], weight);
                shift = cmp::min(MAXWEIGHT, shift.saturating_add(weight));
            }
        }
        for &Interaction { i, j, value } in &binary.quadratic {
            let scaled = scale(value);
            let weight = scaled.abs() as Weight;
            if weight == 0 {
                continue;
            }
            if scaled > 0.0 {
                formula.add_clause(&[literal(i, false), literal(j, false)], weight);
            } else {
                formula.add_clause(&[literal(i, true), literal(j, true)], weight);
                formula.add_clause(&[literal(i, false), literal(j, true)], weight);
                formula.add_clause(&[literal(i, true), literal(j, false)], weight);
                shift = cmp::min(MAXWEIGHT, shift.saturating_add(weight));
            }
        }
        Ok(QuboEncoding {
            formula,
            shift,
            precision: binary.precision,
            offset: binary.offset,
        })
    }
}
