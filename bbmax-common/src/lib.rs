//! Internal modules for bbmax

pub mod config;
#[macro_use]
pub mod macros;
pub mod output;
#[macro_use]
pub mod memory;
pub mod bestfirst;
pub mod clause;
pub mod clausestore;
pub mod formula;
pub mod input;
pub mod literal;
pub mod parser;
pub mod qubo;
pub mod report;
pub mod search;
pub mod solver;

pub use ansi_term;
