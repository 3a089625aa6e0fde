//! Capacity planning shared by every container in this crate.
//!
//! All functions here are pure arithmetic. Tables call into this module to
//! decide how many buckets to allocate and when to grow; nothing here ever
//! touches a table directly.
//!
//! The central rule is that a table built in one shot from `n` known entries
//! must never end up with more buckets than the same `n` entries would have
//! produced by being inserted one at a time into a default table.

use core::fmt;

use crate::error::InvalidLoadFactor;

/// The largest bucket count a table will ever allocate.
///
/// Requests beyond this are clamped rather than rejected. A table at this
/// size stops growing and simply accepts longer chains.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

/// Bucket count allocated on the first insertion into a table that was
/// created without a capacity hint.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// The fraction of buckets that may be populated before a table grows.
///
/// Must be finite and strictly positive. Values above `1.0` are allowed and
/// simply mean longer average chains.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct LoadFactor(f32);

impl LoadFactor {
    /// The load factor used when none is given: `0.75`.
    pub const DEFAULT: LoadFactor = LoadFactor(0.75);

    /// Creates a load factor, rejecting values that are not finite or not
    /// strictly positive.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use snug_hash::capacity::LoadFactor;
    ///
    /// assert!(LoadFactor::new(0.5).is_ok());
    /// assert!(LoadFactor::new(0.0).is_err());
    /// assert!(LoadFactor::new(f32::NAN).is_err());
    /// ```
    pub fn new(value: f32) -> Result<Self, InvalidLoadFactor> {
        if value.is_finite() && value > 0.0 {
            Ok(LoadFactor(value))
        } else {
            Err(InvalidLoadFactor(value))
        }
    }

    /// Returns the raw fraction.
    #[inline]
    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for LoadFactor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for LoadFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl TryFrom<f32> for LoadFactor {
    type Error = InvalidLoadFactor;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Returns the smallest power of two that is at least `minimum_capacity`.
///
/// Zero maps to `1` and anything above [`MAXIMUM_CAPACITY`] maps to
/// [`MAXIMUM_CAPACITY`]. Every bucket count this crate allocates passes
/// through here, so sized, copied, bulk-loaded and incrementally grown tables
/// all agree on rounding.
///
/// # Examples
///
/// ```rust
/// use snug_hash::capacity::{MAXIMUM_CAPACITY, table_size_for};
///
/// assert_eq!(table_size_for(0), 1);
/// assert_eq!(table_size_for(16), 16);
/// assert_eq!(table_size_for(17), 32);
/// assert_eq!(table_size_for(usize::MAX), MAXIMUM_CAPACITY);
/// ```
#[inline]
pub fn table_size_for(minimum_capacity: usize) -> usize {
    if minimum_capacity <= 1 {
        1
    } else if minimum_capacity >= MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else {
        minimum_capacity.next_power_of_two()
    }
}

/// Returns `floor(capacity * load_factor)`, the population a table of
/// `capacity` buckets may reach without growing.
///
/// A table at [`MAXIMUM_CAPACITY`] can no longer grow, so its threshold is
/// `usize::MAX`. An unallocated table (`capacity == 0`) has a threshold of
/// zero.
#[inline]
pub fn threshold_for(capacity: usize, load_factor: LoadFactor) -> usize {
    if capacity >= MAXIMUM_CAPACITY {
        return usize::MAX;
    }
    // f64 holds every capacity below 2^30 exactly, and the product of two
    // such values rounds at most once.
    (capacity as f64 * load_factor.get() as f64).floor() as usize
}

/// Returns the bucket count to allocate once, up front, for a table that is
/// about to receive exactly `entry_count` entries.
///
/// This is the smallest power of two whose threshold is at least
/// `entry_count`, clamped to [`MAXIMUM_CAPACITY`]. It never exceeds what
/// inserting the same entries one at a time would grow to. Returns `None` for
/// zero entries: nothing needs to be allocated.
///
/// # Examples
///
/// ```rust
/// use snug_hash::capacity::{LoadFactor, capacity_for_known_size};
///
/// let lf = LoadFactor::DEFAULT;
/// assert_eq!(capacity_for_known_size(0, lf), None);
/// assert_eq!(capacity_for_known_size(12, lf), Some(16));
/// assert_eq!(capacity_for_known_size(13, lf), Some(32));
/// ```
pub fn capacity_for_known_size(entry_count: usize, load_factor: LoadFactor) -> Option<usize> {
    if entry_count == 0 {
        return None;
    }

    // No `+ 1` here: `ceil(n / lf)` buckets already give a threshold of at
    // least `n`. Adding one doubles the table whenever `n / lf` is an exact
    // power of two.
    let wanted = (entry_count as f64 / load_factor.get() as f64).ceil();
    let mut capacity = if wanted >= MAXIMUM_CAPACITY as f64 {
        MAXIMUM_CAPACITY
    } else {
        table_size_for(wanted as usize)
    };

    // The division above may land a hair on either side of an exact boundary.
    // Settle against the same threshold rule the insert path uses.
    if capacity > 1 && threshold_for(capacity / 2, load_factor) >= entry_count {
        capacity /= 2;
    } else if capacity < MAXIMUM_CAPACITY && threshold_for(capacity, load_factor) < entry_count {
        capacity = table_size_for(capacity * 2);
    }

    Some(capacity)
}

/// Returns the bucket count a table grows to when a single insertion would
/// push it past its threshold.
///
/// An unallocated table grows to [`DEFAULT_INITIAL_CAPACITY`]; an allocated
/// one doubles, clamped to [`MAXIMUM_CAPACITY`].
#[inline]
pub fn grown_capacity(capacity: usize) -> usize {
    if capacity == 0 {
        table_size_for(DEFAULT_INITIAL_CAPACITY)
    } else {
        table_size_for(capacity.saturating_mul(2))
    }
}
