//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// True if `a` and `b` are within `tol` of each other.
pub fn near<T>(a: T, b: T, tol: T) -> bool
where
    T: Float,
{
    (a - b).abs() <= tol
}

/// True if `value` is within `tol` of zero.
pub fn near_zero<T>(value: T, tol: T) -> bool
where
    T: Float,
{
    value.abs() <= tol
}

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}
