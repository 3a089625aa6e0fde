use core::alloc::Layout;
use core::fmt;

/// The error type for the fallible allocation paths (`try_with_capacity`,
/// `try_reserve` and friends).
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TryReserveError {
    /// The bucket array for the planned capacity cannot be described by a
    /// valid [`Layout`] (its size would exceed `isize::MAX` bytes).
    CapacityOverflow,

    /// The memory allocator returned an error.
    AllocError {
        /// The layout of the allocation request that failed.
        layout: Layout,
    },
}

impl fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")?;
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str(" because the computed capacity exceeded the collection's maximum")
            }
            TryReserveError::AllocError { layout } => {
                write!(f, " because the allocator rejected a request of {} bytes", layout.size())
            }
        }
    }
}

impl core::error::Error for TryReserveError {}

/// Returned by [`LoadFactor::new`](crate::capacity::LoadFactor::new) for a
/// load factor that is not finite or not strictly positive.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct InvalidLoadFactor(pub f32);

impl fmt::Display for InvalidLoadFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal load factor: {}", self.0)
    }
}

impl core::error::Error for InvalidLoadFactor {}
