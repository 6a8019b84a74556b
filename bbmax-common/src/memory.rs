//! General purpose data structures
//!
//! These are `std::vec::Vec` wrappers with strongly-typed indexing and
//! bounds checks that can be switched off in release builds.
//!
//! - `Array<I, T>` requires a type that is used for indexing. This keeps
//!   per-literal and per-variable tables from being indexed by the wrong kind
//!   of key.
//! - `BoundedVector<T>` never reallocates after construction; we use it when
//!   the maximum size is known up front, for example the decision stack.

mod array;
mod boundedvector;
#[macro_use]
mod vector;

use std::convert::TryFrom;

pub use crate::memory::{
    array::Array,
    boundedvector::BoundedVector,
    vector::{assert_in_bounds, Vector},
};

/// Trait for types that can be used as an array index.
pub trait Offset {
    fn as_offset(&self) -> usize;
}

impl Offset for usize {
    fn as_offset(&self) -> usize {
        *self
    }
}

impl Offset for u32 {
    fn as_offset(&self) -> usize {
        *self as usize
    }
}

impl Offset for u64 {
    fn as_offset(&self) -> usize {
        requires!(usize::try_from(*self).is_ok());
        *self as usize
    }
}

/// A trait for objects that can report their memory usage on the heap
pub trait HeapSpace {
    /// The number of bytes allocated on the heap that this owns.
    fn heap_space(&self) -> usize;
}

impl<T: Copy> HeapSpace for T {
    fn heap_space(&self) -> usize {
        0
    }
}

/// Convert bytes to  megabytes for readability.
pub fn format_memory_usage(bytes: usize) -> String {
    format!("{:12}", bytes >> 20) // MB
}
