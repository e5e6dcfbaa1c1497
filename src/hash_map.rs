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

/// A hash map implemented over the Swiss [`HashTable`].
///
/// `HashMap<K, V, S, P>` stores key-value pairs where keys implement
/// `Hash + Eq`, hashes them with a configurable builder `S`, and runs the
/// table under the policy bundle `P`. The stored element is the `(K, V)`
/// pair; no operation hands out a mutable key, so a key is effectively
/// immutable from insertion to removal. Lookups accept any borrowed form
/// of the key type, so a `HashMap<String, _>` answers queries for `&str`
/// without allocating.
///
/// # Performance Characteristics
///
/// - **Memory**: 1 byte per slot overhead plus the size of `(K, V)`, at a
///   7/8 maximum load factor under the default policy.
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder, P: TablePolicy = DefaultPolicy> {
    table: HashTable<(K, V), P>,
    hash_builder: S,
}

impl<K, V, S, P> Debug for HashMap<K, V, S, P>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
    P: TablePolicy,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(key, value);
        }
        map.finish()
    }
}

impl<K, V, S, P> HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher,
    P: TablePolicy,
{
    /// Creates a new hash map with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new hash map with the specified capacity and hasher
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
    fn hash_of<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        P::Mix::mix(self.hash_builder.hash_one(key))
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of entries the map can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all entries and releases the allocation.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Reserves capacity for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        let Self {
            table,
            hash_builder,
        } = self;
        table.reserve(additional, |(key, _)| {
            P::Mix::mix(hash_builder.hash_one(key))
        });
    }

    /// Inserts a key-value pair, returning the previous value for the key
    /// if there was one.
    ///
    /// The existing key is kept when overwriting a value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashMap;
    ///
    /// let mut map: HashMap<&str, u32> = HashMap::new();
    /// assert_eq!(map.insert("a", 1), None);
    /// assert_eq!(map.insert("a", 3), Some(1));
    /// assert_eq!(map.get("a"), Some(&3));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entry(key) {
            Entry::Occupied(mut entry) => Some(entry.insert(value)),
            Entry::Vacant(entry) => {
                entry.insert(value);
                None
            }
        }
    }

    /// Returns a reference to the value for `key`, if any.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashMap;
    ///
    /// let mut map: HashMap<String, u32> = HashMap::new();
    /// map.insert("one".to_string(), 1);
    /// assert_eq!(map.get("one"), Some(&1));
    /// assert_eq!(map.get("two"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and value for `key`, if any.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.table
            .find(hash, |(candidate, _)| candidate.borrow() == key)
            .map(|(candidate, value)| (candidate, value))
    }

    /// Returns a mutable reference to the value for `key`, if any.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.table
            .find_mut(hash, |(candidate, _)| candidate.borrow() == key)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the map contains an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Returns a reference to the value for `key`, or [`Error::NotFound`].
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(Error::NotFound)
    }

    /// Removes the entry for `key`, returning its value if there was one.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes the entry for `key`, returning the stored key and value if
    /// there was one.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_of(key);
        self.table
            .remove(hash, |(candidate, _)| candidate.borrow() == key)
    }

    /// Removes the entry for `key` and returns its value, or
    /// [`Error::NotFound`].
    pub fn try_erase<Q>(&mut self, key: &Q) -> Result<V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove(key).ok_or(Error::NotFound)
    }

    /// Gets the entry for `key`, for in-place manipulation.
    ///
    /// The entry API folds the lookup and the insertion decision into one
    /// probe.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashMap;
    ///
    /// let mut tally: HashMap<&str, u32> = HashMap::new();
    /// for word in ["a", "b", "a"] {
    ///     *tally.entry(word).or_insert(0) += 1;
    /// }
    /// assert_eq!(tally.get("a"), Some(&2));
    /// assert_eq!(tally.get("b"), Some(&1));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, P> {
        let Self {
            table,
            hash_builder,
        } = self;
        let hash = P::Mix::mix(hash_builder.hash_one(&key));
        match table.entry(
            hash,
            |(candidate, _)| *candidate == key,
            |(candidate, _)| P::Mix::mix(hash_builder.hash_one(candidate)),
        ) {
            TableEntry::Occupied(base) => Entry::Occupied(OccupiedEntry { base }),
            TableEntry::Vacant(base) => Entry::Vacant(VacantEntry { base, key }),
        }
    }

    /// Returns an iterator over the entries of the map, in arbitrary
    /// order.
    pub fn iter(&self) -> Iter<'_, K, V, P> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, K, V, P> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, K, V, P> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator that removes and yields all entries.
    ///
    /// The map is empty once the iterator is dropped.
    pub fn drain(&mut self) -> Drain<'_, K, V, P> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<K, V, S, P> HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    P: TablePolicy,
{
    /// Creates a new hash map using the default hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::HashMap;
    ///
    /// let map: HashMap<u64, u64> = HashMap::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash map that can hold `capacity` entries without
    /// rehashing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S, P> Default for HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    P: TablePolicy,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A view into a single entry in a map, which is either vacant or
/// occupied.
///
/// This enum is constructed by the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub enum Entry<'a, K, V, P: TablePolicy = DefaultPolicy> {
    /// The key is present in the map.
    Occupied(OccupiedEntry<'a, K, V, P>),
    /// The key is not present in the map.
    Vacant(VacantEntry<'a, K, V, P>),
}

impl<'a, K, V, P: TablePolicy> Entry<'a, K, V, P> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value either way.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns
    /// a mutable reference to the value either way.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to the value if the entry is occupied, then returns the
    /// entry.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            vacant => vacant,
        }
    }

    /// The key this entry was looked up with.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, P> Entry<'a, K, V, P>
where
    V: Default,
    P: TablePolicy,
{
    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value either way.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in a map.
///
/// This struct is created by the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub struct VacantEntry<'a, K, V, P: TablePolicy = DefaultPolicy> {
    base: hash_table::VacantEntry<'a, (K, V), P>,
    key: K,
}

impl<'a, K, V, P: TablePolicy> VacantEntry<'a, K, V, P> {
    /// The key that would be inserted.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes ownership of the key without inserting.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the key with `value` and returns a mutable reference to the
    /// value.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.base.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in a map.
///
/// This struct is created by the [`entry`] method on [`HashMap`].
///
/// [`entry`]: HashMap::entry
pub struct OccupiedEntry<'a, K, V, P: TablePolicy = DefaultPolicy> {
    base: hash_table::OccupiedEntry<'a, (K, V), P>,
}

impl<'a, K, V, P: TablePolicy> OccupiedEntry<'a, K, V, P> {
    /// The stored key.
    pub fn key(&self) -> &K {
        &self.base.get().0
    }

    /// Gets a reference to the value.
    pub fn get(&self) -> &V {
        &self.base.get().1
    }

    /// Gets a mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.base.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value with the
    /// lifetime of the entry.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.base.into_mut().1
    }

    /// Replaces the value, returning the previous one.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }

    /// Removes the entry, returning the value.
    pub fn remove(self) -> V {
        self.base.remove().1
    }

    /// Removes the entry, returning the stored key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.base.remove()
    }
}

/// An iterator over the entries of a [`HashMap`].
///
/// This struct is created by the [`iter`] method on [`HashMap`].
///
/// [`iter`]: HashMap::iter
pub struct Iter<'a, K, V, P: TablePolicy = DefaultPolicy> {
    inner: hash_table::Iter<'a, (K, V), P>,
}

impl<'a, K, V, P: TablePolicy> Iterator for Iter<'a, K, V, P> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, value)| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An iterator over the keys of a [`HashMap`].
///
/// This struct is created by the [`keys`] method on [`HashMap`].
///
/// [`keys`]: HashMap::keys
pub struct Keys<'a, K, V, P: TablePolicy = DefaultPolicy> {
    inner: Iter<'a, K, V, P>,
}

impl<'a, K, V, P: TablePolicy> Iterator for Keys<'a, K, V, P> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }
}

/// An iterator over the values of a [`HashMap`].
///
/// This struct is created by the [`values`] method on [`HashMap`].
///
/// [`values`]: HashMap::values
pub struct Values<'a, K, V, P: TablePolicy = DefaultPolicy> {
    inner: Iter<'a, K, V, P>,
}

impl<'a, K, V, P: TablePolicy> Iterator for Values<'a, K, V, P> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }
}

/// A draining iterator over the entries of a [`HashMap`].
///
/// This struct is created by the [`drain`] method on [`HashMap`].
///
/// [`drain`]: HashMap::drain
pub struct Drain<'a, K, V, P: TablePolicy = DefaultPolicy> {
    inner: hash_table::Drain<'a, (K, V), P>,
}

impl<K, V, P: TablePolicy> Iterator for Drain<'_, K, V, P> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<'a, K, V, S, P> IntoIterator for &'a HashMap<K, V, S, P>
where
    K: Hash + Eq,
    S: BuildHasher,
    P: TablePolicy,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
