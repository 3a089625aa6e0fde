//! The raw table every container in this crate is built on.
//!
//! `HashTable<V>` stores values in a power-of-two array of buckets, each
//! holding a chain of `(hash, value)` slots. Callers supply the hash and an
//! equality predicate for every operation, so the table knows nothing about
//! keys. All sizing decisions are delegated to [`crate::capacity`].

use alloc::alloc::handle_alloc_error;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::fmt::Debug;

use crate::capacity;
use crate::capacity::LoadFactor;
use crate::error::TryReserveError;

struct Slot<V> {
    hash: u64,
    value: V,
}

type Bucket<V> = Vec<Slot<V>>;

/// Allocates `capacity` empty buckets without touching any existing table.
fn allocate_buckets<V>(capacity: usize) -> Result<Vec<Bucket<V>>, TryReserveError> {
    debug_assert!(capacity.is_power_of_two());

    let layout =
        Layout::array::<Bucket<V>>(capacity).map_err(|_| TryReserveError::CapacityOverflow)?;
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(capacity)
        .map_err(|_| TryReserveError::AllocError { layout })?;
    buckets.resize_with(capacity, Vec::new);
    Ok(buckets)
}

/// Unwraps the result of an allocation on an infallible path.
#[inline]
fn infallible<T>(result: Result<T, TryReserveError>) -> T {
    match result {
        Ok(value) => value,
        Err(TryReserveError::CapacityOverflow) => panic!("capacity overflow"),
        Err(TryReserveError::AllocError { layout }) => handle_alloc_error(layout),
    }
}

/// Chain and memory statistics for a table.
///
/// Available with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of values currently in the table
    pub populated: usize,
    /// Number of buckets allocated (0 while unallocated)
    pub capacity: usize,
    /// Population at which the next new value triggers growth
    pub threshold: usize,
    /// Configured load factor
    pub load_factor: f32,
    /// Number of buckets holding at least one value
    pub occupied_buckets: usize,
    /// Length of the longest chain
    pub longest_chain: usize,
    /// Bytes held by the bucket array and the chains
    pub total_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} threshold, {} buckets (load factor {:.2})",
            self.populated, self.threshold, self.capacity, self.load_factor
        );
        println!(
            "Buckets: {} occupied ({:.2}% utilization), longest chain {}",
            self.occupied_buckets,
            if self.capacity == 0 {
                0.0
            } else {
                (self.occupied_buckets as f64 / self.capacity as f64) * 100.0
            },
            self.longest_chain
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// A chained hash table with exact capacity planning.
///
/// `HashTable<V>` stores values of type `V`. Like other raw tables it
/// requires you to provide both the hash value and an equality predicate for
/// each operation.
///
/// The bucket array is allocated lazily on first insertion unless a capacity
/// is requested up front. It only ever grows: by doubling when a new value
/// would push the population past the threshold, or by a single planned jump
/// in [`reserve`](Self::reserve) and [`from_known_size`](Self::from_known_size).
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use snug_hash::hash_table::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
/// #
/// let mut table = HashTable::with_capacity(12);
/// assert_eq!(table.capacity(), 16);
///
/// for id in 0..12u64 {
///     table.insert(hash_id(id), id, |&v| v == id);
/// }
///
/// // Twelve values fit a 16-bucket table at the default load factor.
/// assert_eq!(table.capacity(), 16);
/// assert_eq!(table.find(hash_id(7), |&v| v == 7), Some(&7));
/// ```
pub struct HashTable<V> {
    buckets: Vec<Bucket<V>>,
    populated: usize,
    threshold: usize,
    load_factor: LoadFactor,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("populated", &self.populated)
            .field("capacity", &self.capacity())
            .field("threshold", &self.threshold)
            .field("load_factor", &self.load_factor)
            .finish()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    /// Clones by copy-construction: the clone is planned from the current
    /// population, not from this table's bucket count.
    fn clone(&self) -> Self {
        Self::from_known_size(
            self.populated,
            self.load_factor,
            self.slots().map(|slot| (slot.hash, slot.value.clone())),
        )
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashTable<V> {
    /// Creates an unallocated table with the default load factor.
    ///
    /// The first insertion allocates
    /// [`DEFAULT_INITIAL_CAPACITY`](capacity::DEFAULT_INITIAL_CAPACITY)
    /// buckets.
    pub fn new() -> Self {
        Self::with_load_factor(LoadFactor::DEFAULT)
    }

    /// Creates an unallocated table with the given load factor.
    pub fn with_load_factor(load_factor: LoadFactor) -> Self {
        Self {
            buckets: Vec::new(),
            populated: 0,
            threshold: 0,
            load_factor,
        }
    }

    /// Creates a table that can hold `capacity` values without growing.
    ///
    /// The bucket array is allocated immediately, sized by
    /// [`capacity_for_known_size`](capacity::capacity_for_known_size). A
    /// capacity of zero allocates nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use snug_hash::hash_table::HashTable;
    /// #
    /// let table: HashTable<String> = HashTable::with_capacity(13);
    /// assert_eq!(table.capacity(), 32);
    /// assert_eq!(table.threshold(), 24);
    ///
    /// let empty: HashTable<String> = HashTable::with_capacity(0);
    /// assert_eq!(empty.capacity(), 0);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_load_factor(capacity, LoadFactor::DEFAULT)
    }

    /// Creates a table with the given load factor that can hold `capacity`
    /// values without growing.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: LoadFactor) -> Self {
        infallible(Self::try_with_capacity_and_load_factor(capacity, load_factor))
    }

    /// Fallible version of [`with_capacity`](Self::with_capacity).
    pub fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        Self::try_with_capacity_and_load_factor(capacity, LoadFactor::DEFAULT)
    }

    /// Fallible version of
    /// [`with_capacity_and_load_factor`](Self::with_capacity_and_load_factor).
    pub fn try_with_capacity_and_load_factor(
        capacity: usize,
        load_factor: LoadFactor,
    ) -> Result<Self, TryReserveError> {
        let mut table = Self::with_load_factor(load_factor);
        table.try_reserve(capacity)?;
        Ok(table)
    }

    /// Builds a table from `known_size` pre-hashed values.
    ///
    /// The bucket array is planned once from `known_size` and allocated
    /// before any value is placed, so filling it never triggers a resize. A
    /// `known_size` of zero leaves the table unallocated.
    ///
    /// The values must be pairwise distinct under whatever equality the
    /// caller later uses for lookups, as with
    /// [`insert_unique`](Self::insert_unique). If the iterator yields more
    /// than `known_size` values the extra ones grow the table normally.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use snug_hash::capacity::LoadFactor;
    /// # use snug_hash::hash_table::HashTable;
    /// #
    /// let values = (0..12u64).map(|v| (v.wrapping_mul(0x9E37_79B9_7F4A_7C15), v));
    /// let table = HashTable::from_known_size(12, LoadFactor::DEFAULT, values);
    /// assert_eq!(table.len(), 12);
    /// assert_eq!(table.capacity(), 16);
    /// ```
    pub fn from_known_size(
        known_size: usize,
        load_factor: LoadFactor,
        values: impl IntoIterator<Item = (u64, V)>,
    ) -> Self {
        infallible(Self::try_from_known_size(known_size, load_factor, values))
    }

    /// Fallible version of [`from_known_size`](Self::from_known_size).
    ///
    /// Only the up-front allocation is fallible; if the iterator yields more
    /// than `known_size` values, growth past the plan aborts on allocation
    /// failure like any other insertion.
    pub fn try_from_known_size(
        known_size: usize,
        load_factor: LoadFactor,
        values: impl IntoIterator<Item = (u64, V)>,
    ) -> Result<Self, TryReserveError> {
        let mut table = Self::try_with_capacity_and_load_factor(known_size, load_factor)?;
        for (hash, value) in values {
            table.insert_unique(hash, value);
        }
        Ok(table)
    }

    /// Returns an iterator over all values in the table.
    ///
    /// The iterator yields `&V` references in an arbitrary order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use snug_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// table.insert(1, "a", |&v| v == "a");
    /// table.insert(2, "b", |&v| v == "b");
    ///
    /// let mut values: Vec<_> = table.iter().copied().collect();
    /// values.sort();
    /// assert_eq!(values, ["a", "b"]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: Default::default(),
            remaining: self.populated,
        }
    }

    fn slots(&self) -> impl Iterator<Item = &Slot<V>> {
        self.buckets.iter().flatten()
    }

    /// Returns an iterator that removes and yields all values from the table.
    ///
    /// The bucket array is kept, so the table's capacity is unchanged. Values
    /// not consumed before the iterator is dropped are dropped with it.
    pub fn drain(&mut self) -> Drain<'_, V> {
        Drain {
            table: self,
            bucket_index: 0,
        }
    }

    /// Returns `true` if the table contains no values.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of values in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns the number of buckets, or `0` while the bucket array has not
    /// been allocated.
    ///
    /// Always a power of two once allocated.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the population at which inserting one more new value makes
    /// the table grow.
    ///
    /// This is `floor(capacity * load_factor)`, `0` while unallocated.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Returns the load factor fixed at construction.
    pub fn load_factor(&self) -> LoadFactor {
        self.load_factor
    }

    /// Removes all values from the table, keeping the bucket array.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            self.populated -= bucket.len();
            bucket.clear();
        }
    }

    /// Retains only the values for which `f` returns `true`.
    ///
    /// The bucket array is kept.
    pub fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) {
        for bucket in &mut self.buckets {
            bucket.retain_mut(|slot| {
                let keep = f(&mut slot.value);
                if !keep {
                    self.populated -= 1;
                }
                keep
            });
        }
    }

    /// Makes room for `additional` more values in a single step.
    ///
    /// The target is planned from `len() + additional` by
    /// [`capacity_for_known_size`](capacity::capacity_for_known_size). If it
    /// is larger than the current bucket count the table is resized once to
    /// exactly that size; otherwise nothing happens. An unallocated table is
    /// allocated at the planned size.
    ///
    /// Values already present that are inserted again do not consume room,
    /// so the plan may overshoot when the caller's batch overlaps the
    /// table's contents.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use snug_hash::hash_table::HashTable;
    /// #
    /// let mut table: HashTable<u64> = HashTable::new();
    /// table.reserve(12);
    /// assert_eq!(table.capacity(), 16);
    ///
    /// // Already large enough; no change.
    /// table.reserve(5);
    /// assert_eq!(table.capacity(), 16);
    ///
    /// table.reserve(13);
    /// assert_eq!(table.capacity(), 32);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        infallible(self.try_reserve(additional));
    }

    /// Fallible version of [`reserve`](Self::reserve).
    ///
    /// On error the table is left exactly as it was.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let required = self.populated.saturating_add(additional);
        match capacity::capacity_for_known_size(required, self.load_factor) {
            Some(planned) if planned > self.capacity() => self.resize(planned),
            _ => Ok(()),
        }
    }

    /// Inserts `value`, replacing and returning an existing value for which
    /// `eq` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use snug_hash::hash_table::HashTable;
    /// #
    /// let mut table = HashTable::new();
    /// assert_eq!(table.insert(7, (1, "a"), |&(k, _)| k == 1), None);
    /// assert_eq!(table.insert(7, (1, "b"), |&(k, _)| k == 1), Some((1, "a")));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn insert(&mut self, hash: u64, value: V, eq: impl Fn(&V) -> bool) -> Option<V> {
        match self.entry(hash, eq) {
            Entry::Occupied(mut entry) => Some(core::mem::replace(entry.get_mut(), value)),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Inserts `value` without checking for an equal value already present.
    ///
    /// The caller must know the value is new. Inserting a duplicate is not
    /// unsafe, but lookups will only ever see one of the copies.
    pub fn insert_unique(&mut self, hash: u64, value: V) -> &mut V {
        VacantEntry { table: self, hash }.insert(value)
    }

    /// Removes and returns a value for which `eq` returns `true`.
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        let (bucket, index) = self.locate(hash, eq)?;
        self.populated -= 1;
        Some(self.buckets[bucket].swap_remove(index).value)
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use snug_hash::hash_table::{Entry, HashTable};
    /// #
    /// let mut table = HashTable::new();
    ///
    /// match table.entry(42, |&(k, _): &(u32, u32)| k == 1) {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert((1, 10));
    ///     }
    ///     Entry::Occupied(_) => unreachable!(),
    /// }
    ///
    /// table.entry(42, |&(k, _)| k == 1).or_insert((1, 0)).1 += 1;
    /// assert_eq!(table.find(42, |&(k, _)| k == 1), Some(&(1, 11)));
    /// ```
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        match self.locate(hash, eq) {
            Some((bucket, index)) => Entry::Occupied(OccupiedEntry {
                table: self,
                bucket,
                index,
            }),
            None => Entry::Vacant(VacantEntry { table: self, hash }),
        }
    }

    /// Finds a value for which `eq` returns `true`.
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let (bucket, index) = self.locate(hash, eq)?;
        Some(&self.buckets[bucket][index].value)
    }

    /// Finds a value for which `eq` returns `true` and returns a mutable
    /// reference to it.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let (bucket, index) = self.locate(hash, eq)?;
        Some(&mut self.buckets[bucket][index].value)
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        debug_assert!(!self.buckets.is_empty());
        hash as usize & (self.buckets.len() - 1)
    }

    fn locate(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<(usize, usize)> {
        if self.populated == 0 {
            return None;
        }

        let bucket = self.bucket_index(hash);
        self.buckets[bucket]
            .iter()
            .position(|slot| slot.hash == hash && eq(&slot.value))
            .map(|index| (bucket, index))
    }

    /// Grows the table if one more value would push it past the threshold.
    #[inline]
    fn maybe_grow(&mut self) {
        if self.populated >= self.threshold {
            self.grow();
        }
    }

    #[cold]
    fn grow(&mut self) {
        let mut capacity = capacity::grown_capacity(self.capacity());
        // A small load factor can leave a single doubling short of room for
        // one more value.
        while capacity < capacity::MAXIMUM_CAPACITY
            && capacity::threshold_for(capacity, self.load_factor) <= self.populated
        {
            capacity = capacity::grown_capacity(capacity);
        }

        if capacity > self.capacity() {
            infallible(self.resize(capacity));
        }
    }

    /// Moves every value into a freshly allocated array of `capacity`
    /// buckets.
    ///
    /// The new array is allocated before anything moves; on failure the
    /// table is untouched.
    fn resize(&mut self, capacity: usize) -> Result<(), TryReserveError> {
        debug_assert!(capacity > self.capacity());

        let buckets = allocate_buckets(capacity)?;
        let old = core::mem::replace(&mut self.buckets, buckets);
        self.threshold = capacity::threshold_for(capacity, self.load_factor);

        let mask = capacity - 1;
        for slot in old.into_iter().flatten() {
            self.buckets[slot.hash as usize & mask].push(slot);
        }

        Ok(())
    }

    /// Returns chain and memory statistics for the current table state.
    ///
    /// Available with the `stats` feature.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let occupied_buckets = self.buckets.iter().filter(|b| !b.is_empty()).count();
        let longest_chain = self.buckets.iter().map(Vec::len).max().unwrap_or(0);
        let chain_bytes: usize = self
            .buckets
            .iter()
            .map(|b| b.capacity() * core::mem::size_of::<Slot<V>>())
            .sum();

        DebugStats {
            populated: self.populated,
            capacity: self.capacity(),
            threshold: self.threshold,
            load_factor: self.load_factor.get(),
            occupied_buckets,
            longest_chain,
            total_bytes: self.buckets.capacity() * core::mem::size_of::<Bucket<V>>() + chain_bytes,
        }
    }
}

/// A view into a single entry in the table, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V> {
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, V>),
    /// A vacant entry.
    Vacant(VacantEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns a
    /// mutable reference to the value.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Modifies an occupied entry in place before any potential insert.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }
}

impl<'a, V> Entry<'a, V>
where
    V: Default,
{
    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(V::default)
    }
}

/// A view into a vacant entry in a `HashTable`.
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u64,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts `value`, growing the table first if the new population would
    /// exceed the threshold.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;
        table.maybe_grow();

        let bucket = table.bucket_index(self.hash);
        let chain = &mut table.buckets[bucket];
        let index = chain.len();
        chain.push(Slot {
            hash: self.hash,
            value,
        });
        table.populated += 1;

        debug_assert!(table.populated <= table.threshold);
        &mut chain[index].value
    }
}

/// A view into an occupied entry in a `HashTable`.
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    bucket: usize,
    index: usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.table.buckets[self.bucket][self.index].value
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.table.buckets[self.bucket][self.index].value
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.table.buckets[self.bucket][self.index].value
    }

    /// Removes the value from the table and returns it.
    pub fn remove(self) -> V {
        self.table.populated -= 1;
        self.table.buckets[self.bucket].swap_remove(self.index).value
    }
}

/// An iterator over the values of a `HashTable`.
pub struct Iter<'a, V> {
    buckets: core::slice::Iter<'a, Bucket<V>>,
    chain: core::slice::Iter<'a, Slot<V>>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.chain.next() {
                self.remaining -= 1;
                return Some(&slot.value);
            }
            self.chain = self.buckets.next()?.iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

/// A draining iterator over the values of a `HashTable`.
pub struct Drain<'a, V> {
    table: &'a mut HashTable<V>,
    bucket_index: usize,
}

impl<V> Iterator for Drain<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.bucket_index < self.table.buckets.len() {
            if let Some(slot) = self.table.buckets[self.bucket_index].pop() {
                self.table.populated -= 1;
                return Some(slot.value);
            }
            self.bucket_index += 1;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<V> ExactSizeIterator for Drain<'_, V> {}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in self {}
    }
}

/// A consuming iterator over the values of a `HashTable`.
pub struct IntoIter<V> {
    buckets: alloc::vec::IntoIter<Bucket<V>>,
    chain: alloc::vec::IntoIter<Slot<V>>,
    remaining: usize,
}

impl<V> Iterator for IntoIter<V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.chain.next() {
                self.remaining -= 1;
                return Some(slot.value);
            }
            self.chain = self.buckets.next()?.into_iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IntoIter<V> {}

impl<V> IntoIterator for HashTable<V> {
    type IntoIter = IntoIter<V>;
    type Item = V;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            buckets: self.buckets.into_iter(),
            chain: Vec::new().into_iter(),
            remaining: self.populated,
        }
    }
}

impl<'a, V> IntoIterator for &'a HashTable<V> {
    type IntoIter = Iter<'a, V>;
    type Item = &'a V;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::capacity::DEFAULT_INITIAL_CAPACITY;
    use crate::capacity::threshold_for;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u64 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish()
    }

    fn fill_sequential(state: &HashState, table: &mut HashTable<Item>, n: u64) {
        for k in 0..n {
            let hash = hash_key(state, k);
            table.insert(
                hash,
                Item {
                    key: k,
                    value: k as i32,
                },
                |v| v.key == k,
            );
        }
    }

    fn hashed_items(state: &HashState, n: u64) -> impl Iterator<Item = (u64, Item)> + '_ {
        (0..n).map(move |k| {
            (
                hash_key(state, k),
                Item {
                    key: k,
                    value: k as i32,
                },
            )
        })
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            match table.entry(hash, |v: &Item| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(Item {
                        key: k,
                        value: (k as i32) * 2,
                    });
                }
                Entry::Occupied(_) => panic!("unexpected occupied on first insert: {:#?}", table),
            }
        }
        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            let hash = hash_key(&state, k);
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: (k as i32) * 2
                }),
                "{:#?}",
                table
            );
        }

        let miss_hash = hash_key(&state, 999);
        assert!(table.find(miss_hash, |v| v.key == 999).is_none());
    }

    #[test]
    fn unallocated_until_first_insert() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.threshold(), 0);
        assert!(table.find(1, |_| true).is_none());
        assert!(table.remove(1, |_| true).is_none());

        fill_sequential(&state, &mut table, 1);
        assert_eq!(table.capacity(), DEFAULT_INITIAL_CAPACITY);
        assert_eq!(table.threshold(), 12);
    }

    #[test]
    fn sequential_growth_points() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();

        fill_sequential(&state, &mut table, 12);
        assert_eq!(table.capacity(), 16);

        fill_sequential(&state, &mut table, 13);
        assert_eq!(table.capacity(), 32);

        fill_sequential(&state, &mut table, 24);
        assert_eq!(table.capacity(), 32);

        fill_sequential(&state, &mut table, 25);
        assert_eq!(table.capacity(), 64);
    }

    #[test]
    fn replacing_does_not_grow() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 12);
        assert_eq!(table.capacity(), 16);

        // Every key already present: threshold is full but nothing is new.
        fill_sequential(&state, &mut table, 12);
        assert_eq!(table.len(), 12);
        assert_eq!(table.capacity(), 16);
    }

    #[test]
    fn with_capacity_sizes_for_entries() {
        for (n, expected) in [(0, 0), (1, 2), (6, 8), (12, 16), (13, 32), (96, 128)] {
            let table: HashTable<Item> = HashTable::with_capacity(n);
            assert_eq!(table.capacity(), expected, "n={n}");
            assert_eq!(table.threshold(), threshold_for(expected, LoadFactor::DEFAULT));
        }
    }

    #[test]
    fn with_capacity_then_fill_never_resizes() {
        let state = HashState::default();
        for n in 1..=128u64 {
            let mut table: HashTable<Item> = HashTable::with_capacity(n as usize);
            let planned = table.capacity();
            fill_sequential(&state, &mut table, n);
            assert_eq!(table.capacity(), planned, "n={n}");
        }
    }

    #[test]
    fn from_known_size_matches_plan() {
        let state = HashState::default();

        let empty = HashTable::from_known_size(0, LoadFactor::DEFAULT, hashed_items(&state, 0));
        assert_eq!(empty.capacity(), 0);

        let twelve = HashTable::from_known_size(12, LoadFactor::DEFAULT, hashed_items(&state, 12));
        assert_eq!(twelve.capacity(), 16);
        assert_eq!(twelve.len(), 12);

        let thirteen =
            HashTable::from_known_size(13, LoadFactor::DEFAULT, hashed_items(&state, 13));
        assert_eq!(thirteen.capacity(), 32);
        for k in 0..13 {
            assert!(thirteen.find(hash_key(&state, k), |v| v.key == k).is_some());
        }
    }

    #[test]
    fn from_known_size_undercount_grows() {
        let state = HashState::default();
        let table = HashTable::from_known_size(4, LoadFactor::DEFAULT, hashed_items(&state, 40));
        assert_eq!(table.len(), 40);
        assert_eq!(table.capacity(), 64);
        assert!(table.len() <= table.threshold());
    }

    #[test]
    fn reserve_on_allocated_table() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 10);
        assert_eq!(table.capacity(), 16);

        // 10 + 2 still fits in 16 buckets.
        table.reserve(2);
        assert_eq!(table.capacity(), 16);

        // 10 + 20 = 30 needs 64 buckets (threshold 48), skipping 32.
        table.reserve(20);
        assert_eq!(table.capacity(), 64);
        assert_eq!(table.threshold(), 48);

        for k in 0..10 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_some());
        }
    }

    #[test]
    fn reserve_zero_is_noop() {
        let mut table: HashTable<Item> = HashTable::new();
        table.reserve(0);
        assert_eq!(table.capacity(), 0);
    }

    #[test]
    fn remove_items() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 20);
        let capacity = table.capacity();

        for k in (0..20).step_by(2) {
            let removed = table.remove(hash_key(&state, k), |v| v.key == k);
            assert_eq!(removed.map(|v| v.key), Some(k));
        }
        assert_eq!(table.len(), 10);
        assert_eq!(table.capacity(), capacity);
        assert!(table.remove(hash_key(&state, 0), |v| v.key == 0).is_none());
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 4);

        let hash = hash_key(&state, 3);
        if let Some(item) = table.find_mut(hash, |v| v.key == 3) {
            item.value = 300;
        }
        assert_eq!(table.find(hash, |v| v.key == 3).map(|v| v.value), Some(300));
    }

    #[test]
    fn explicit_collision() {
        let mut table: HashTable<Item> = HashTable::new();
        for k in 0..10u64 {
            table.insert_unique(0xDEAD_BEEF, Item { key: k, value: 0 });
        }
        assert_eq!(table.debug_stats().longest_chain, 10);
        for k in 0..10u64 {
            assert!(table.find(0xDEAD_BEEF, |v| v.key == k).is_some());
        }
        assert!(table.find(0xDEAD_BEEF, |v| v.key == 10).is_none());
    }

    #[test]
    fn iter_and_drain() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 50);

        let iter = table.iter();
        assert_eq!(iter.len(), 50);
        let mut keys: vec::Vec<u64> = iter.map(|v| v.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..50).collect::<vec::Vec<_>>());

        let capacity = table.capacity();
        let mut drained: vec::Vec<u64> = table.drain().map(|v| v.key).collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..50).collect::<vec::Vec<_>>());
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
    }

    #[test]
    fn partial_drain_drops_rest() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 30);
        {
            let mut drain = table.drain();
            drain.next();
            drain.next();
        }
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn into_iter_yields_everything() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 17);
        let mut keys: vec::Vec<u64> = table.into_iter().map(|v| v.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..17).collect::<vec::Vec<_>>());
    }

    #[test]
    fn clear_and_retain_keep_capacity() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 40);
        let capacity = table.capacity();

        table.retain(|v| v.key % 4 == 0);
        assert_eq!(table.len(), 10);
        assert_eq!(table.capacity(), capacity);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
    }

    #[test]
    fn clone_is_replanned_from_population() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 100);
        assert_eq!(table.capacity(), 256);

        table.retain(|v| v.key < 12);
        let cloned = table.clone();
        assert_eq!(cloned.len(), 12);
        assert_eq!(cloned.capacity(), 16);
        for k in 0..12 {
            assert_eq!(
                cloned.find(hash_key(&state, k), |v| v.key == k),
                table.find(hash_key(&state, k), |v| v.key == k)
            );
        }

        table.clear();
        assert_eq!(table.clone().capacity(), 0);
    }

    #[test]
    fn entry_or_insert_with() {
        let mut table: HashTable<(String, u32)> = HashTable::new();
        for word in ["a", "b", "a", "c", "a"] {
            let hash = word.len() as u64 ^ word.as_bytes()[0] as u64;
            table
                .entry(hash, |(k, _)| k == word)
                .or_insert_with(|| (word.to_string(), 0))
                .1 += 1;
        }
        let a = table.find(1 ^ b'a' as u64, |(k, _)| k == "a");
        assert_eq!(a.map(|(_, n)| *n), Some(3));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn occupied_entry_remove() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 3);
        let hash = hash_key(&state, 1);
        match table.entry(hash, |v| v.key == 1) {
            Entry::Occupied(entry) => assert_eq!(entry.remove().key, 1),
            Entry::Vacant(_) => panic!("expected occupied"),
        }
        assert_eq!(table.len(), 2);
        assert!(table.find(hash, |v| v.key == 1).is_none());
    }

    #[test]
    fn small_load_factor_grows_far_enough() {
        let lf = LoadFactor::new(0.05).unwrap();
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_load_factor(lf);
        for k in 0..64u64 {
            table.insert_unique(
                hash_key(&state, k),
                Item {
                    key: k,
                    value: 0,
                },
            );
            assert!(table.len() <= table.threshold(), "{table:?}");
            assert!(table.capacity().is_power_of_two());
        }
    }

    #[test]
    fn debug_stats_snapshot() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 12);
        let stats = table.debug_stats();
        assert_eq!(stats.populated, 12);
        assert_eq!(stats.capacity, 16);
        assert_eq!(stats.threshold, 12);
        assert!(stats.occupied_buckets >= 1 && stats.occupied_buckets <= 12);
        assert!(stats.total_bytes > 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn retain_panic_keeps_len_in_sync() {
        use std::panic::AssertUnwindSafe;
        use std::panic::catch_unwind;

        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::new();
        fill_sequential(&state, &mut table, 20);

        let mut calls = 0;
        let result = catch_unwind(AssertUnwindSafe(|| {
            table.retain(|_| {
                calls += 1;
                if calls == 10 {
                    panic!("retain predicate");
                }
                false
            });
        }));
        assert!(result.is_err());

        assert_eq!(table.len(), 11);
        assert_eq!(table.iter().count(), table.len());
        assert_eq!(table.iter().len(), table.len());

        let clone = table.clone();
        assert_eq!(clone.len(), 11);
        assert_eq!(clone.capacity(), 16);

        assert_eq!(table.drain().count(), 11);
        assert!(table.is_empty());
    }

    #[cfg(feature = "std")]
    #[test]
    fn clear_with_panicking_drop_keeps_len_in_sync() {
        use std::panic::AssertUnwindSafe;
        use std::panic::catch_unwind;

        struct Bomb(bool);

        impl Drop for Bomb {
            fn drop(&mut self) {
                if self.0 {
                    panic!("drop");
                }
            }
        }

        let state = HashState::default();
        let mut table: HashTable<Bomb> = HashTable::new();
        for k in 0..20u64 {
            table.insert_unique(hash_key(&state, k), Bomb(k == 7));
        }

        let result = catch_unwind(AssertUnwindSafe(|| table.clear()));
        assert!(result.is_err());

        assert_eq!(table.iter().count(), table.len());
        table.clear();
        assert!(table.is_empty());
    }
}
