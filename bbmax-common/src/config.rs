//! Compile-time switches

/// Add command line flag `-v`.
pub const ENABLE_LOGGING: bool = true;
/// Whether to do bounds checking when accessing array elements.
pub const ENABLE_BOUNDS_CHECKING: bool = cfg!(debug_assertions);
/// Check the `requires!()` assertions at runtime (cheap).
pub const CHECK_PRECONDITIONS: bool = true;
/// Check the `invariant!()` assertions at runtime (cheap).
pub const CHECK_INVARIANTS: bool = true;
/// Reject clause handles that do not point to a live clause (one byte per arena slot).
pub const CHECK_HANDLES: bool = cfg!(debug_assertions);
/// Validate the active-variable partition after every search step (expensive).
pub const CHECK_PARTITION_INVARIANTS: bool = cfg!(debug_assertions);
