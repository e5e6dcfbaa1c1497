use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::error::Error;
use crate::hash_table;
use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;
use crate::hasher::DefaultHashBuilder;
use crate::policy::DefaultPolicy;
use crate::policy::MixPolicy;
use crate::policy::TablePolicy;

/// A hash set implemented over the Swiss [`HashTable`].
///
/// `HashSet<T, S, P>` stores values implementing `Hash + Eq`, hashes them
/// with a configurable builder `S`, and runs the table under the policy
/// bundle `P`. Lookups accept any borrowed form of the value type, so a
/// `HashSet<String>` answers queries for `&str` without allocating.
///
/// # Performance Characteristics
///
/// - **Memory**: 1 byte per slot overhead plus the size of `T`, at a 7/8
///   maximum load factor under the default policy.
#[derive(Clone)]
pub struct HashSet<T, S = DefaultHashBuilder, P: TablePolicy = DefaultPolicy> {
    table: HashTable<T, P>,
    hash_builder: S,
}

impl<T, S, P> Debug for HashSet<T, S, P>
where
    T: Debug + Hash + Eq,
    S: BuildHasher,
    P: TablePolicy,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut set = f.debug_set();
        for value in self.iter() {
            set.entry(value);
        }
        set.finish()
    }
}

impl<T, S, P> HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher,
    P: TablePolicy,
{
    /// Creates a new hash set with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new hash set with the specified capacity and hasher
    /// builder.
    ///
    /// The actual capacity may be larger than requested: slot counts are
    /// snapped to power-of-two group counts.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    #[inline]
    fn hash_of<Q>(&self, value: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        P::Mix::mix(self.hash_builder.hash_one(value))
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of elements the set can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all elements and releases the allocation.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves capacity for at least `additional` more elements.
    ///
    /// Reserving up front avoids rehash pauses while a known number of
    /// insertions is in flight, and keeps references valid across them.
    pub fn reserve(&mut self, additional: usize) {
        let Self {
            table,
            hash_builder,
        } = self;
        table.reserve(additional, |candidate| {
            P::Mix::mix(hash_builder.hash_one(candidate))
        });
    }

    /// Adds a value to the set.
    ///
    /// Returns `true` if the value was not already present. An equal value
    /// already in the set is kept and the argument is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashSet;
    ///
    /// let mut set: HashSet<u64> = HashSet::new();
    /// assert!(set.insert(7));
    /// assert!(!set.insert(7));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> bool {
        let Self {
            table,
            hash_builder,
        } = self;
        let hash = P::Mix::mix(hash_builder.hash_one(&value));
        match table.entry(
            hash,
            |candidate| *candidate == value,
            |candidate| P::Mix::mix(hash_builder.hash_one(candidate)),
        ) {
            TableEntry::Occupied(_) => false,
            TableEntry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// Returns `true` if the set contains a value equal to `value`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashSet;
    ///
    /// let mut set: HashSet<String> = HashSet::new();
    /// set.insert("borrowed lookups".to_string());
    /// assert!(set.contains("borrowed lookups"));
    /// assert!(!set.contains("missing"));
    /// ```
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(value).is_some()
    }

    /// Returns a reference to the stored value equal to `value`, if any.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(value);
        self.table.find(hash, |candidate| candidate.borrow() == value)
    }

    /// Returns a reference to the stored value equal to `value`, or
    /// [`Error::NotFound`].
    pub fn try_get<Q>(&self, value: &Q) -> Result<&T, Error>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(value).ok_or(Error::NotFound)
    }

    /// Removes a value from the set. Returns `true` if it was present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashSet;
    ///
    /// let mut set: HashSet<u64> = HashSet::new();
    /// set.insert(1);
    /// assert!(set.remove(&1));
    /// assert!(!set.remove(&1));
    /// ```
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.take(value).is_some()
    }

    /// Removes and returns the stored value equal to `value`, if any.
    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(value);
        self.table.remove(hash, |candidate| candidate.borrow() == value)
    }

    /// Removes and returns the stored value equal to `value`, or
    /// [`Error::NotFound`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::Error;
    /// use swiss_hash::HashSet;
    ///
    /// let mut set: HashSet<u64> = HashSet::new();
    /// set.insert(42);
    /// assert_eq!(set.try_erase(&42), Ok(42));
    /// assert_eq!(set.try_erase(&42), Err(Error::NotFound));
    /// ```
    pub fn try_erase<Q>(&mut self, value: &Q) -> Result<T, Error>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.take(value).ok_or(Error::NotFound)
    }

    /// Returns an iterator over the values of the set, in arbitrary order.
    pub fn iter(&self) -> Iter<'_, T, P> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator that removes and yields all values.
    ///
    /// The set is empty once the iterator is dropped.
    pub fn drain(&mut self) -> Drain<'_, T, P> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<T, S, P> HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    P: TablePolicy,
{
    /// Creates a new hash set using the default hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashSet;
    ///
    /// let set: HashSet<u64> = HashSet::new();
    /// assert!(set.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash set that can hold `capacity` elements without
    /// rehashing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S, P> Default for HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    P: TablePolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

/// An iterator over the values of a [`HashSet`].
///
/// This struct is created by the [`iter`] method on [`HashSet`].
///
/// [`iter`]: HashSet::iter
pub struct Iter<'a, T, P: TablePolicy = DefaultPolicy> {
    inner: hash_table::Iter<'a, T, P>,
}

impl<'a, T, P: TablePolicy> Iterator for Iter<'a, T, P> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A draining iterator over the values of a [`HashSet`].
///
/// This struct is created by the [`drain`] method on [`HashSet`].
///
/// [`drain`]: HashSet::drain
pub struct Drain<'a, T, P: TablePolicy = DefaultPolicy> {
    inner: hash_table::Drain<'a, T, P>,
}

impl<T, P: TablePolicy> Iterator for Drain<'_, T, P> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a, T, S, P> IntoIterator for &'a HashSet<T, S, P>
where
    T: Hash + Eq,
    S: BuildHasher,
    P: TablePolicy,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
