//! Clause handles, weights and the per-clause header word

use crate::{literal::Literal, memory::Offset};
use bitfield::bitfield;
use static_assertions::const_assert;
use std::{fmt, mem::size_of};

/// Clause weights.
pub type Weight = u64;

/// The largest representable weight; hard clauses carry it and every weight
/// computation saturates here.
pub const MAXWEIGHT: Weight = (1 << 63) - 1;

/// The maximum number of literals in one clause.
pub const MAXLEN: usize = (1 << 27) - 1;

/// Number of arena slots in front of the literals: header, live weight and
/// saved weight (two slots each).
pub const CLAUSE_METADATA_SLOTS: usize = 5;

/// An opaque handle to a clause in the
/// [ClauseStore](../clausestore/struct.ClauseStore.html).
///
/// This is the offset of the clause header in the arena. Offset 0 is never
/// handed out.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default)]
pub struct ClauseRef(pub u32);

impl ClauseRef {
    /// The reserved handle that never names a clause.
    pub const NULL: ClauseRef = ClauseRef(0);
    pub fn is_null(self) -> bool {
        self == ClauseRef::NULL
    }
}

impl Offset for ClauseRef {
    fn as_offset(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClauseRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

bitfield! {
    /// The header word of a clause in the arena.
    pub struct ClauseHeader(u32);
    impl Debug;
    /// Number of literals that are not forced false.
    pub u32, length, set_length: 26, 0;
    /// Whether the literal block may contain forced-false literals in front.
    pub changed, set_changed: 27;
    /// Scheduled for deletion; the saved weight slots hold a reference count.
    pub special, set_special: 28;
    /// Free-use mark for the search.
    pub marked, set_marked: 29;
    /// Logically removed from the formula.
    pub deleted, set_deleted: 30;
}

impl ClauseHeader {
    pub fn from_raw(raw: u32) -> ClauseHeader {
        ClauseHeader(raw)
    }
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Header, weights and literals share the arena slots.
#[allow(dead_code)]
fn assert_primitive_sizes() {
    const_assert!(size_of::<Literal>() == 4);
    const_assert!(size_of::<ClauseRef>() == 4);
    const_assert!(size_of::<ClauseHeader>() == 4);
    const_assert!(MAXLEN < 1 << 27);
}

/// Whether an assignment raised the lower bound to the best known cost.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MaybeConflict(pub bool);

/// The assignment cannot lead to an improvement
pub const CONFLICT: MaybeConflict = MaybeConflict(true);
/// The assignment was applied
pub const NO_CONFLICT: MaybeConflict = MaybeConflict(false);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_do_not_overlap() {
        let mut header = ClauseHeader(0);
        header.set_length(MAXLEN as u32);
        assert!(!header.changed());
        header.set_deleted(true);
        header.set_marked(true);
        assert_eq!(header.length() as usize, MAXLEN);
        assert!(!header.special());
        header.set_length(3);
        assert!(header.deleted() && header.marked());
        assert_eq!(header.0, (1 << 30) | (1 << 29) | 3);
    }
}
