//! Variable and literal representations

use crate::memory::Offset;
use serde_derive::{Deserialize, Serialize};
use std::{fmt, fmt::Display, ops};

/// A propositional variable, numbered from 1.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, Default)]
pub struct Variable(pub u32);

/// A variable with a polarity.
///
/// Encoded as `2 * variable + negative`, so `literal ^ 1` is the negation
/// and literal-indexed tables need `2 * (maxvar + 1)` slots.
#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Literal {
    pub encoding: u32,
}

impl Variable {
    pub fn new(value: u32) -> Variable {
        Variable(value)
    }
    /// The literal of this variable with the given polarity.
    pub fn literal(self, positive: bool) -> Literal {
        Literal {
            encoding: self.0 * 2 + (!positive as u32),
        }
    }
    /// Iterate over the variables `1..=maxvar`.
    pub fn range(maxvar: usize) -> impl Iterator<Item = Variable> {
        (1..=maxvar as u32).map(Variable)
    }
}

impl Offset for Variable {
    fn as_offset(&self) -> usize {
        self.0 as usize
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Size of a literal-indexed table for variables `1..=maxvar`.
pub fn literal_array_len(maxvar: usize) -> usize {
    2 * (maxvar + 1)
}

impl Literal {
    /// Construct a new literal from the usual signed DIMACS representation.
    pub fn new(value: i32) -> Literal {
        requires!(value != i32::min_value());
        Literal {
            encoding: (value.abs() as u32) * 2 + ((value < 0) as u32),
        }
    }
    pub fn from_raw(encoding: u32) -> Literal {
        Literal { encoding }
    }
    /// The signed DIMACS representation.
    pub fn decode(self) -> i32 {
        let magnitude = self.var().0 as i32;
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }
    pub fn var(self) -> Variable {
        Variable(self.encoding / 2)
    }
    pub fn is_negative(self) -> bool {
        self.encoding & 1 != 0
    }
    /// `+1` for a positive literal, `-1` for a negative one.
    pub fn sign(self) -> i8 {
        if self.is_negative() {
            -1
        } else {
            1
        }
    }
}

impl Offset for Literal {
    fn as_offset(&self) -> usize {
        self.encoding as usize
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.decode())
    }
}

impl ops::Neg for Literal {
    type Output = Literal;
    fn neg(self) -> Literal {
        Literal {
            encoding: self.encoding ^ 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding() {
        assert_eq!(Literal::new(3).encoding, 6);
        assert_eq!(Literal::new(-3).encoding, 7);
        assert_eq!(-Literal::new(3), Literal::new(-3));
        assert_eq!(Literal::new(-5).decode(), -5);
        assert_eq!(Literal::new(-5).var(), Variable(5));
        assert_eq!(Variable(4).literal(false), Literal::new(-4));
        assert_eq!(Literal::new(-1).sign(), -1);
        assert_eq!(format!("{}", Literal::new(-12)), "-12");
    }
}
