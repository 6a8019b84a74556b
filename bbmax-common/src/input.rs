//! Byte reader with position tracking

use std::{
    io::{Error, ErrorKind, Result},
    iter::Peekable,
};

/// A peekable iterator over bytes that records line and column information.
pub struct Input<'a> {
    source: Peekable<Box<dyn Iterator<Item = u8> + 'a>>,
    /// The current line number
    line: usize,
    /// The current column
    column: usize,
}

impl<'a> Input<'a> {
    pub fn new(source: Box<dyn Iterator<Item = u8> + 'a>) -> Self {
        Input {
            source: source.peekable(),
            line: 1,
            column: 1,
        }
    }
    /// Read from an in-memory buffer.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Input::new(Box::new(bytes.iter().cloned()))
    }
    /// Look at the next byte without consuming it
    pub fn peek(&mut self) -> Option<u8> {
        self.source.peek().cloned()
    }
    pub fn line(&self) -> usize {
        self.line
    }
    /// Create an io::Error with the given message and position information.
    pub fn error(&self, why: &str) -> Error {
        Error::new(
            ErrorKind::InvalidData,
            format!("{} at line {} column {}", why, self.line, self.column),
        )
    }

    /// Parse an unsigned decimal number.
    ///
    /// Fails if there is no digit or if the value does not fit in a `u64`.
    pub fn parse_unsigned(&mut self) -> Result<u64> {
        if !self.peek().map_or(false, Self::is_digit) {
            return Err(self.error(Self::NUMBER));
        }
        let mut value: u64 = 0;
        while let Some(c) = self.peek() {
            if !Self::is_digit(c) {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|value| value.checked_add(u64::from(c - b'0')))
                .ok_or_else(|| self.error(Self::OVERFLOW))?;
            self.next();
        }
        Ok(value)
    }

    /// Parse a decimal number with an optional leading minus, in the range
    /// `[-i32::MAX, i32::MAX]`.
    pub fn parse_signed(&mut self) -> Result<i32> {
        let negative = self.peek() == Some(b'-');
        if negative {
            self.next();
        }
        let magnitude = self.parse_unsigned()?;
        if magnitude > i32::max_value() as u64 {
            return Err(self.error(Self::OVERFLOW));
        }
        let value = magnitude as i32;
        Ok(if negative { -value } else { value })
    }

    /// Skip spaces and tabs, but not line breaks.
    pub fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            if c != b' ' && c != b'\t' {
                break;
            }
            self.next();
        }
    }

    /// Parse zero or more spaces or linebreaks.
    pub fn skip_any_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !Self::is_space(c) {
                break;
            }
            self.next();
        }
    }

    /// Skip whitespace; fails unless at least one whitespace character or
    /// the end of input follows.
    pub fn skip_some_whitespace(&mut self) -> Result<()> {
        if let Some(c) = self.peek() {
            if !Self::is_space(c) {
                return Err(self.error(Self::SPACE));
            }
        }
        self.skip_any_whitespace();
        Ok(())
    }

    /// Consume everything up to and including the next newline.
    pub fn skip_line(&mut self) {
        while let Some(c) = self.next() {
            if c == b'\n' {
                break;
            }
        }
    }

    /// Consume the given bytes or fail with `why`.
    pub fn expect(&mut self, expected: &[u8], why: &str) -> Result<()> {
        for &byte in expected {
            if self.peek() != Some(byte) {
                return Err(self.error(why));
            }
            self.next();
        }
        Ok(())
    }

    /// A numeric overflow. This should only happen for user input.
    pub const OVERFLOW: &'static str = "overflow while parsing number";
    /// Parser error ("unexpected EOF")
    pub const EOF: &'static str = "premature end of file";
    pub const NUMBER: &'static str = "expected number";
    pub const SPACE: &'static str = "expected space";
    pub const HEADER: &'static str = "expected \"p cnf\" or \"p wcnf\"";
    pub const VARIABLE: &'static str = "variable out of range";

    /// Check if a character is a decimal digit.
    pub fn is_digit(value: u8) -> bool {
        value >= b'0' && value <= b'9'
    }

    /// Returns true if the character is one of the whitespace characters we allow.
    pub fn is_space(c: u8) -> bool {
        [b' ', b'\t', b'\n', b'\r'].iter().any(|&s| s == c)
    }
}

impl Iterator for Input<'_> {
    type Item = u8;
    fn next(&mut self) -> Option<u8> {
        self.source.next().map(|c| {
            if c == b'\n' {
                self.line += 1;
                self.column = 0;
            }
            self.column += 1;
            c
        })
    }
}
