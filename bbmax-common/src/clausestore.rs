//! Arena for weighted clauses with a buddy allocator
//!
//! All clauses live in one flat buffer whose size is a power of two. A clause
//! occupies a block of `2^k` slots:
//!
//! ```text
//! head + 0        header (length and flags, see ClauseHeader)
//! head + 1..3     live weight (low word, high word)
//! head + 3..5     saved weight, or the reference count of a special clause
//! head + 5..      literals
//! ```
//!
//! Free blocks are kept in one singly linked list per size class; the first
//! slot of a free block holds the offset of the next one (0 terminates).
//! Freed blocks go back to their own class and are never merged with their
//! buddy.

use crate::{
    clause::{ClauseHeader, ClauseRef, Weight, CLAUSE_METADATA_SLOTS, MAXLEN, MAXWEIGHT},
    config,
    literal::{literal_array_len, Literal},
    memory::{Array, HeapSpace, Offset, Vector},
};
use bbmax_macros::HeapSpace;
use std::convert::TryFrom;

/// Base two logarithm of the initial arena size.
const INITIAL_LOG_CAPACITY: usize = 16;

const LIVE_WEIGHT: usize = 1;
const SAVED_WEIGHT: usize = 3;

/// The size class for a clause of the given length.
///
/// A clause of length `length` needs a block of `2^block_class(length)`
/// slots, the smallest power of two that holds `length + 5` slots.
pub fn block_class(length: usize) -> usize {
    let needed = length + CLAUSE_METADATA_SLOTS;
    needed.next_power_of_two().trailing_zeros() as usize
}

/// Stores the clauses and the set of literals that are currently false.
#[derive(Debug, HeapSpace)]
pub struct ClauseStore {
    /// The arena. Metadata slots are stored in the `encoding` of a literal.
    data: Vector<Literal>,
    /// For each size class `k`, the first free block of size `2^k`.
    free_heads: Vector<u32>,
    /// Literals that are false under the current partial assignment.
    forced_false: Array<Literal, bool>,
    /// Which offsets are heads of allocated clauses, only maintained with
    /// `config::CHECK_HANDLES`.
    allocated: Vector<bool>,
}

impl ClauseStore {
    /// Create an empty store for variables `1..=maxvar`.
    pub fn new(maxvar: usize) -> ClauseStore {
        let capacity = 1 << INITIAL_LOG_CAPACITY;
        let mut store = ClauseStore {
            data: Vector::fill(capacity, Literal::from_raw(0)),
            free_heads: Vector::fill(INITIAL_LOG_CAPACITY, 0),
            forced_false: Array::new(false, literal_array_len(maxvar)),
            allocated: Vector::new(),
        };
        if config::CHECK_HANDLES {
            store.allocated = Vector::fill(capacity, false);
        }
        // Offset 0 stays unused, the rest is covered by one block per class.
        for class in (0..INITIAL_LOG_CAPACITY).rev() {
            store.push_free_block(1 << class, class);
        }
        store
    }
    /// Number of slots in the arena.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
    /// Number of literals this store was sized for.
    pub fn literal_capacity(&self) -> usize {
        self.forced_false.size()
    }

    /// Store a new clause and return its handle.
    ///
    /// Live and saved weight are set to `weight`, all flags are clear except
    /// that a clause of weight 0 is created as deleted.
    pub fn add_clause(&mut self, literals: &[Literal], weight: Weight) -> ClauseRef {
        requires!(literals.len() <= MAXLEN);
        requires!(weight <= MAXWEIGHT);
        let class = block_class(literals.len());
        let (head, mut found) = loop {
            if let Some(k) = (class..self.free_heads.len()).find(|&k| self.free_heads[k] != 0) {
                break (self.free_heads[k] as usize, k);
            }
            self.double_capacity();
        };
        self.pop_free_block(found);
        while found > class {
            found -= 1;
            self.push_free_block(head + (1 << found), found);
        }
        let mut header = ClauseHeader::from_raw(0);
        header.set_length(literals.len() as u32);
        header.set_deleted(weight == 0);
        self.data[head] = Literal::from_raw(header.raw());
        self.write_weight(head + LIVE_WEIGHT, weight);
        self.write_weight(head + SAVED_WEIGHT, weight);
        let start = head + CLAUSE_METADATA_SLOTS;
        self.data[start..start + literals.len()].copy_from_slice(literals);
        if config::CHECK_HANDLES {
            self.allocated[head] = true;
        }
        ClauseRef(head as u32)
    }

    /// Double the arena. Existing offsets stay valid, the new upper half
    /// becomes one free block.
    fn double_capacity(&mut self) {
        let capacity = self.capacity();
        requires!(
            u32::try_from(2 * capacity).is_ok(),
            "clause arena exceeds 32 bit offsets"
        );
        self.data.resize(2 * capacity, Literal::from_raw(0));
        if config::CHECK_HANDLES {
            self.allocated.resize(2 * capacity, false);
        }
        let class = self.free_heads.len();
        invariant!(1 << class == capacity);
        self.free_heads.push(0);
        self.push_free_block(capacity, class);
    }

    fn push_free_block(&mut self, position: usize, class: usize) {
        invariant!(position % (1 << class) == 0);
        self.data[position] = Literal::from_raw(self.free_heads[class]);
        self.free_heads[class] = position as u32;
    }

    fn pop_free_block(&mut self, class: usize) {
        let head = self.free_heads[class] as usize;
        invariant!(head != 0);
        self.free_heads[class] = self.data[head].encoding;
    }

    /// Offsets of the free blocks in the given size class, most recently
    /// freed first.
    pub fn free_blocks(&self, class: usize) -> Vector<usize> {
        let mut blocks = Vector::new();
        let mut position = self.free_heads[class] as usize;
        while position != 0 {
            blocks.push(position);
            position = self.data[position].encoding as usize;
        }
        blocks
    }

    fn check_handle(&self, clause: ClauseRef) {
        requires!(!clause.is_null() && clause.as_offset() < self.capacity());
        if config::CHECK_HANDLES {
            requires!(
                self.allocated[clause.as_offset()],
                "stale clause handle {}",
                clause
            );
        }
    }

    fn header(&self, clause: ClauseRef) -> ClauseHeader {
        self.check_handle(clause);
        ClauseHeader::from_raw(self.data[clause.as_offset()].encoding)
    }

    fn set_header(&mut self, clause: ClauseRef, header: ClauseHeader) {
        self.data[clause.as_offset()] = Literal::from_raw(header.raw());
    }

    fn read_weight(&self, offset: usize) -> Weight {
        let low = self.data[offset].encoding as Weight;
        let high = self.data[offset + 1].encoding as Weight;
        low | (high << 32)
    }

    fn write_weight(&mut self, offset: usize, weight: Weight) {
        self.data[offset] = Literal::from_raw(weight as u32);
        self.data[offset + 1] = Literal::from_raw((weight >> 32) as u32);
    }

    /// The literal becomes false under the partial assignment.
    pub fn assign_variable(&mut self, literal: Literal) {
        requires!(!self.forced_false[literal]);
        self.forced_false[literal] = true;
    }
    /// Take back [`assign_variable`](#method.assign_variable).
    pub fn unassign_variable(&mut self, literal: Literal) {
        requires!(self.forced_false[literal]);
        self.forced_false[literal] = false;
    }
    pub fn is_forced_false(&self, literal: Literal) -> bool {
        self.forced_false[literal]
    }

    /// The number of literals that are not forced false, as maintained by
    /// the owner of the store.
    pub fn length(&self, clause: ClauseRef) -> usize {
        self.header(clause).length() as usize
    }
    pub fn increase_length(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!((header.length() as usize) < MAXLEN);
        header.set_length(header.length() + 1);
        header.set_changed(true);
        self.set_header(clause, header);
    }
    pub fn decrease_length(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!(header.length() > 0, "clause length would become negative");
        header.set_length(header.length() - 1);
        header.set_changed(true);
        self.set_header(clause, header);
    }

    /// The literals of a clause that are not forced false.
    ///
    /// If the length changed since the last call, the literal block is
    /// partitioned in place so that the live literals come first. Each
    /// forced-false literal in front is swapped with the next live literal
    /// behind the prefix, so the work is bounded by the position of the last
    /// live literal.
    pub fn literals(&mut self, clause: ClauseRef) -> &[Literal] {
        let mut header = self.header(clause);
        let length = header.length() as usize;
        let start = clause.as_offset() + CLAUSE_METADATA_SLOTS;
        if header.changed() {
            header.set_changed(false);
            self.set_header(clause, header);
            let mut back = start + length;
            for front in start..start + length {
                if !self.forced_false[self.data[front]] {
                    continue;
                }
                while self.forced_false[self.data[back]] {
                    back += 1;
                }
                self.data.swap(front, back);
                back += 1;
            }
        }
        &self.data[start..start + length]
    }

    pub fn weight(&self, clause: ClauseRef) -> Weight {
        self.check_handle(clause);
        self.read_weight(clause.as_offset() + LIVE_WEIGHT)
    }
    pub fn saved_weight(&self, clause: ClauseRef) -> Weight {
        requires!(!self.is_special(clause));
        self.read_weight(clause.as_offset() + SAVED_WEIGHT)
    }

    /// Increase the live weight (and the saved weight if `change_saved`).
    ///
    /// A deleted clause of weight 0 is revived.
    pub fn add_weight(&mut self, clause: ClauseRef, weight: Weight, change_saved: bool) {
        requires!(weight != 0);
        requires!(!self.is_special(clause));
        let current = self.weight(clause);
        if current == 0 {
            requires!(self.is_deleted(clause));
            self.remove_delete_flag(clause);
        }
        requires!(weight <= MAXWEIGHT - current, "clause weight exceeds MAXWEIGHT");
        let head = clause.as_offset();
        self.write_weight(head + LIVE_WEIGHT, current + weight);
        if change_saved {
            let saved = self.read_weight(head + SAVED_WEIGHT);
            requires!(weight <= MAXWEIGHT - saved, "clause weight exceeds MAXWEIGHT");
            self.write_weight(head + SAVED_WEIGHT, saved + weight);
        }
    }

    /// Decrease the live weight (and the saved weight if `change_saved`).
    ///
    /// A clause whose live weight drops to 0 is flagged as deleted.
    pub fn subtract_weight(&mut self, clause: ClauseRef, weight: Weight, change_saved: bool) {
        requires!(weight != 0);
        requires!(!self.is_deleted(clause));
        requires!(!self.is_special(clause));
        let current = self.weight(clause);
        requires!(weight <= current);
        let head = clause.as_offset();
        self.write_weight(head + LIVE_WEIGHT, current - weight);
        if change_saved {
            let saved = self.read_weight(head + SAVED_WEIGHT);
            requires!(saved >= weight);
            self.write_weight(head + SAVED_WEIGHT, saved - weight);
        }
        if current == weight {
            self.add_delete_flag(clause);
        }
    }

    /// Checkpoint the live weight.
    pub fn save_weight(&mut self, clause: ClauseRef) {
        requires!(!self.is_special(clause));
        let weight = self.weight(clause);
        self.write_weight(clause.as_offset() + SAVED_WEIGHT, weight);
    }

    /// Restore the live weight from the checkpoint; this never lowers it.
    pub fn reset_weight(&mut self, clause: ClauseRef) {
        requires!(!self.is_special(clause));
        let weight = self.weight(clause);
        let saved = self.saved_weight(clause);
        if weight == saved {
            return;
        }
        invariant!(weight < saved);
        self.write_weight(clause.as_offset() + LIVE_WEIGHT, saved);
        let mut header = self.header(clause);
        header.set_deleted(false);
        self.set_header(clause, header);
    }

    pub fn is_deleted(&self, clause: ClauseRef) -> bool {
        self.header(clause).deleted()
    }
    pub fn is_marked(&self, clause: ClauseRef) -> bool {
        self.header(clause).marked()
    }
    pub fn is_special(&self, clause: ClauseRef) -> bool {
        self.header(clause).special()
    }

    pub fn add_delete_flag(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!(!header.deleted(), "clause {} is already deleted", clause);
        header.set_deleted(true);
        self.set_header(clause, header);
    }
    pub fn remove_delete_flag(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!(header.deleted(), "clause {} is not deleted", clause);
        header.set_deleted(false);
        self.set_header(clause, header);
    }
    pub fn add_marker(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!(!header.marked(), "clause {} is already marked", clause);
        header.set_marked(true);
        self.set_header(clause, header);
    }
    pub fn remove_marker(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!(header.marked(), "clause {} is not marked", clause);
        header.set_marked(false);
        self.set_header(clause, header);
    }
    pub fn add_special_flag(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!(!header.special(), "clause {} is already special", clause);
        header.set_special(true);
        self.set_header(clause, header);
    }
    pub fn remove_special_flag(&mut self, clause: ClauseRef) {
        let mut header = self.header(clause);
        requires!(header.special(), "clause {} is not special", clause);
        header.set_special(false);
        self.set_header(clause, header);
    }

    /// Turn a clause of weight 0 into a shared one that is freed after
    /// [`decrease_counter`](#method.decrease_counter) has been called once
    /// per literal.
    ///
    /// The reference count replaces the saved weight.
    pub fn prepare_delete(&mut self, clause: ClauseRef) {
        requires!(self.weight(clause) == 0);
        let length = self.length(clause);
        self.add_special_flag(clause);
        self.write_weight(clause.as_offset() + SAVED_WEIGHT, length as Weight);
    }
    /// The remaining references to a special clause.
    pub fn reference_count(&self, clause: ClauseRef) -> usize {
        requires!(self.is_special(clause));
        self.read_weight(clause.as_offset() + SAVED_WEIGHT) as usize
    }
    /// Drop one reference; the last one frees the clause.
    pub fn decrease_counter(&mut self, clause: ClauseRef) {
        requires!(self.is_deleted(clause) && self.is_special(clause));
        let count = self.reference_count(clause);
        requires!(count > 0);
        self.write_weight(clause.as_offset() + SAVED_WEIGHT, (count - 1) as Weight);
        if count == 1 {
            self.delete_clause(clause);
        }
    }
    /// Return the block of a deleted special clause to its free list.
    ///
    /// The size class is computed from the current length, which is at most
    /// the length at allocation time.
    pub fn delete_clause(&mut self, clause: ClauseRef) {
        requires!(self.is_deleted(clause) && self.is_special(clause));
        let class = block_class(self.length(clause));
        let head = clause.as_offset();
        if config::CHECK_HANDLES {
            self.allocated[head] = false;
        }
        self.push_free_block(head, class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literals(values: &[i32]) -> Vector<Literal> {
        values.iter().map(|&value| Literal::new(value)).collect()
    }

    fn sorted(clause: &[Literal]) -> Vec<i32> {
        let mut values: Vec<i32> = clause.iter().map(|literal| literal.decode()).collect();
        values.sort();
        values
    }

    #[test]
    fn block_sizes() {
        assert_eq!(1 << block_class(0), 8);
        assert_eq!(1 << block_class(3), 8);
        assert_eq!(1 << block_class(4), 16);
        assert_eq!(1 << block_class(11), 16);
        assert_eq!(1 << block_class(12), 32);
        for length in 0..200 {
            let size = 1 << block_class(length);
            assert!(size >= length + 5);
            assert!(size / 2 < length + 5);
        }
    }

    #[test]
    fn blocks_do_not_overlap() {
        let mut store = ClauseStore::new(100);
        let mut blocks = Vec::new();
        for i in 0..300 {
            let length = (i * 7) % 40 + 1;
            let clause: Vector<Literal> = (1..=length as i32).map(Literal::new).collect();
            let handle = store.add_clause(&clause, 1 + i as Weight);
            let size = 1 << block_class(length);
            assert_eq!(handle.as_offset() % size, 0);
            blocks.push((handle.as_offset(), handle.as_offset() + size));
        }
        blocks.sort();
        assert!(blocks[0].0 > 0);
        for pair in blocks.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
        assert!(blocks.last().unwrap().1 <= store.capacity());
    }

    #[test]
    fn growth_preserves_handles() {
        let mut store = ClauseStore::new(30);
        let mut clauses = Vec::new();
        for i in 0..5000 {
            let values: Vec<i32> = (1..=20).map(|v| if (v + i) % 3 == 0 { -v } else { v }).collect();
            let handle = store.add_clause(&literals(&values), i as Weight + 1);
            clauses.push((handle, values));
        }
        assert!(store.capacity() > 1 << INITIAL_LOG_CAPACITY);
        assert!(store.capacity().is_power_of_two());
        for (i, (handle, values)) in clauses.iter().enumerate() {
            assert_eq!(store.weight(*handle), i as Weight + 1);
            assert_eq!(store.saved_weight(*handle), i as Weight + 1);
            assert_eq!(store.length(*handle), 20);
            let stored: Vec<i32> = store.literals(*handle).iter().map(|l| l.decode()).collect();
            assert_eq!(&stored, values);
        }
    }

    #[test]
    fn oversized_clause_doubles_repeatedly() {
        let mut store = ClauseStore::new(200_000);
        let clause: Vector<Literal> = (1..=200_000).map(Literal::new).collect();
        let handle = store.add_clause(&clause, 3);
        assert_eq!(store.capacity(), 1 << 19);
        assert_eq!(store.literals(handle).len(), 200_000);
    }

    #[test]
    fn compaction() {
        let mut store = ClauseStore::new(6);
        let clause = store.add_clause(&literals(&[1, -2, 3, 4, -5, 6]), 7);
        for &value in &[1, -5, 3] {
            store.assign_variable(Literal::new(value));
            store.decrease_length(clause);
        }
        let first: Vec<Literal> = store.literals(clause).to_vec();
        assert_eq!(sorted(&first), vec![-2, 4, 6]);
        assert!(first.iter().all(|&literal| !store.is_forced_false(literal)));
        let second: Vec<Literal> = store.literals(clause).to_vec();
        assert_eq!(first, second);

        store.unassign_variable(Literal::new(3));
        store.increase_length(clause);
        assert_eq!(sorted(store.literals(clause)), vec![-2, 3, 4, 6]);
        for &value in &[-2, 4, 6, 3] {
            store.assign_variable(Literal::new(value));
            store.decrease_length(clause);
        }
        assert!(store.literals(clause).is_empty());
        for &value in &[1, -5, -2, 4, 6, 3] {
            store.unassign_variable(Literal::new(value));
            store.increase_length(clause);
        }
        assert_eq!(sorted(store.literals(clause)), vec![-5, -2, 1, 3, 4, 6]);
    }

    #[test]
    fn weights_and_deletion_flag() {
        let mut store = ClauseStore::new(3);
        let clause = store.add_clause(&literals(&[1, 2]), 5);
        assert!(!store.is_deleted(clause));
        store.subtract_weight(clause, 5, false);
        assert_eq!(store.weight(clause), 0);
        assert!(store.is_deleted(clause));
        assert_eq!(store.saved_weight(clause), 5);
        store.reset_weight(clause);
        assert_eq!(store.weight(clause), 5);
        assert!(!store.is_deleted(clause));
        store.reset_weight(clause);
        assert_eq!(store.weight(clause), 5);

        store.add_weight(clause, 4, true);
        assert_eq!((store.weight(clause), store.saved_weight(clause)), (9, 9));
        store.subtract_weight(clause, 2, false);
        store.save_weight(clause);
        assert_eq!(store.saved_weight(clause), 7);
        store.subtract_weight(clause, 7, true);
        assert!(store.is_deleted(clause));
        assert_eq!(store.saved_weight(clause), 0);
        store.add_weight(clause, 1, false);
        assert!(!store.is_deleted(clause));

        let hard = store.add_clause(&literals(&[-3]), MAXWEIGHT);
        assert_eq!(store.weight(hard), MAXWEIGHT);
        let empty = store.add_clause(&[], 0);
        assert!(store.is_deleted(empty));
    }

    #[test]
    #[should_panic]
    fn weight_overflow_is_fatal() {
        let mut store = ClauseStore::new(1);
        let clause = store.add_clause(&literals(&[1]), MAXWEIGHT - 1);
        store.add_weight(clause, 2, false);
    }

    #[test]
    fn flags() {
        let mut store = ClauseStore::new(2);
        let clause = store.add_clause(&literals(&[1, -2]), 1);
        store.add_marker(clause);
        store.add_special_flag(clause);
        assert!(store.is_marked(clause) && store.is_special(clause));
        assert!(!store.is_deleted(clause));
        store.remove_marker(clause);
        store.remove_special_flag(clause);
        assert!(!store.is_marked(clause) && !store.is_special(clause));
        assert_eq!(store.length(clause), 2);
    }

    #[test]
    #[should_panic]
    fn double_marker_is_fatal() {
        let mut store = ClauseStore::new(2);
        let clause = store.add_clause(&literals(&[1, -2]), 1);
        store.add_marker(clause);
        store.add_marker(clause);
    }

    #[test]
    fn reference_counted_deletion() {
        let mut store = ClauseStore::new(4);
        let clause = store.add_clause(&literals(&[1, 2, 3]), 2);
        store.subtract_weight(clause, 2, true);
        store.prepare_delete(clause);
        assert_eq!(store.reference_count(clause), 3);
        assert_eq!(sorted(store.literals(clause)), vec![1, 2, 3]);
        store.decrease_counter(clause);
        store.decrease_counter(clause);
        let class = block_class(3);
        assert!(!store.free_blocks(class).contains(&clause.as_offset()));
        store.decrease_counter(clause);
        assert_eq!(store.free_blocks(class)[0], clause.as_offset());
        let reused = store.add_clause(&literals(&[4]), 1);
        assert_eq!(reused, clause);
        assert_eq!(store.weight(reused), 1);
        assert!(!store.is_special(reused));
    }

    #[test]
    fn freed_blocks_are_not_coalesced() {
        let mut store = ClauseStore::new(3);
        store.add_clause(&literals(&[1]), 1);
        let a = store.add_clause(&literals(&[2]), 1);
        let b = store.add_clause(&literals(&[3]), 1);
        // a and b are the two halves of a split block of class 4.
        assert_eq!(a.as_offset() ^ b.as_offset(), 8);
        for &clause in &[a, b] {
            store.subtract_weight(clause, 1, true);
            store.add_special_flag(clause);
            store.delete_clause(clause);
        }
        let class = block_class(1);
        let free = store.free_blocks(class);
        assert!(free.contains(&a.as_offset()) && free.contains(&b.as_offset()));
        let larger = store.free_blocks(class + 1);
        assert!(!larger.contains(&a.as_offset().min(b.as_offset())));
    }
}
