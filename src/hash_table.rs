//! A high-performance hash table with SIMD-scanned control byte metadata.
//!
//! The table keeps one control byte per slot in a contiguous array parallel
//! to the slot storage, both carved out of a single allocation. A control
//! byte is either `Empty` (never held an element), `Deleted` (a tombstone),
//! the single `Sentinel` terminating the array, or `Full` carrying the
//! low 7 bits of the element's hash. Because the three non-element states
//! all set the top bit, one SIMD compare over a 16-byte group answers
//! "which lanes could match this key" and a second answers "can probing
//! stop here".
//!
//! [`HashTable<V, P>`] stores values of type `V` and provides fast
//! insertion, lookup, and removal operations. This is a fairly low-level
//! structure that requires you to provide the hash value and an equality
//! predicate for each operation. Prefer the [`HashMap<K, V>`] or
//! [`HashSet<T>`] wrappers for a key-value or set interface unless you are
//! implementing your own map or set structure.
//!
//! ## Design
//!
//! A hash `H` is split once: `H >> 7` picks the starting group (masked by
//! the group count, which is always a power of two) and `H & 0x7F` is the
//! fragment written into the control byte. Lookup loads the starting
//! group's 16 control bytes, walks the lanes whose byte equals the
//! fragment, and compares keys only there. A group containing an `Empty`
//! lane ends the probe: the element, were it present, would have been
//! placed no later than that group. Otherwise the probe advances by the
//! collision policy — triangular strides by default, which visit every
//! group exactly once over a power-of-two group count.
//!
//! Erasure cannot simply mark a slot `Empty`: some other element's probe
//! chain may have had to pass through this group to reach a later one.
//! The slot becomes `Empty` only when its group still has another `Empty`
//! lane (so no chain ever continued past the group), and a `Deleted`
//! tombstone otherwise. Tombstones are skipped by lookups, reused by
//! insertion, and discarded wholesale at the next rehash.
//!
//! The growth ledger counts how many `Empty` lanes insertion may still
//! consume before live elements plus tombstones would exceed the load
//! factor (7/8 by default). Claiming an `Empty` lane spends one credit,
//! reusing a tombstone is free, and erasing back to `Empty` refunds one.
//! When the ledger hits zero the table rehashes to the smallest power-of-
//! two group count whose capacity covers the live count at the load
//! factor — which is the same group count when tombstones dominate, so a
//! tombstone-clogged table cleans itself without growing.
//!
//! All data lives in one type-erased allocation:
//! `[ control bytes | pad | slots ]`
//!
//! The control array is aligned to the group width and is exactly
//! `groups * 16` bytes; the final byte is the `Sentinel`, so there are
//! `groups * 16 - 1` slots. Group loads issued at group-aligned offsets
//! therefore never read out of bounds, and the iterator can skip dead
//! regions a group at a time, stopping when a loaded group contains the
//! sentinel rather than checking a length in the hot loop.
//!
//! ## Safety Invariants
//!
//! The implementation relies on the following key invariants:
//!
//! 1. **Control classes**: a slot holds an initialized value iff its
//!    control byte has the top bit clear. `Empty`, `Deleted`, and
//!    `Sentinel` slots are uninitialized and never read as `V`.
//! 2. **Sentinel**: `ctrl[groups * 16 - 1]` is the one and only sentinel
//!    byte. It is written at allocation time and never overwritten; no
//!    slot index ever equals the sentinel index.
//! 3. **Bounds**: every slot index handed around internally is less than
//!    `groups * 16 - 1`, and every group base is a multiple of 16 no
//!    greater than `(groups - 1) * 16`, so 16-byte loads stay in bounds.
//! 4. **Reachability**: a live element's slot lies on the probe path of
//!    its hash, in or before the first group containing an `Empty` lane.
//!    Erase preserves this by the Empty/Deleted rule above.
//! 5. **Ledger**: `growth_left = capacity * LOAD_NUM / LOAD_DEN - size -
//!    deleted`, which keeps at least one `Empty` lane in the table and
//!    with it termination of every probe.
//!
//! [`HashMap<K, V>`]: crate::hash_map::HashMap
//! [`HashSet<T>`]: crate::hash_set::HashSet

use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::control::DELETED;
use crate::control::EMPTY;
use crate::control::SENTINEL;
use crate::control::h1;
use crate::control::h2;
use crate::control::is_full;
use crate::policy::CachePolicy;
use crate::policy::DefaultPolicy;
use crate::policy::ProbePolicy;
use crate::policy::TablePolicy;
use crate::simd::Backend;

/// The stored representation of one element under policy `P`.
type Slot<V, P> = <<P as TablePolicy>::Cache as CachePolicy>::Slot<V>;

#[derive(Debug, Clone, Copy)]
struct DataLayout {
    layout: Layout,
    slots_offset: usize,
}

impl DataLayout {
    fn new<V, P: TablePolicy>(groups: usize) -> Self {
        let width = P::Group::WIDTH;
        let slot_count = if groups == 0 { 0 } else { groups * width - 1 };

        let ctrl_layout = Layout::from_size_align(groups * width, width)
            .expect("allocation size overflow");
        let slots_layout = Layout::array::<MaybeUninit<Slot<V, P>>>(slot_count)
            .expect("allocation size overflow");

        let (layout, slots_offset) = ctrl_layout
            .extend(slots_layout)
            .expect("allocation size overflow");

        DataLayout {
            layout,
            slots_offset,
        }
    }
}

/// A hash table with SIMD-scanned control byte metadata.
///
/// `HashTable<V, P>` stores values of type `V` under the compile-time
/// policy bundle `P` and provides fast insertion, lookup, and removal.
/// Unlike standard hash maps, this implementation requires you to provide
/// the hash value and an equality predicate for each operation.
///
/// ## Performance Characteristics
///
/// - **Memory**: 1 byte per slot overhead, plus the size of `V` (plus a
///   `u64` per slot under the hash-caching policy), at a 7/8 maximum load
///   factor by default.
pub struct HashTable<V, P: TablePolicy = DefaultPolicy> {
    layout: DataLayout,
    base: NonNull<u8>,

    /// Number of 16-byte control groups; zero until the first allocation,
    /// a power of two afterwards.
    groups: usize,
    size: usize,
    deleted: usize,
    growth_left: usize,

    _marker: PhantomData<Slot<V, P>>,
}

// SAFETY: The table exclusively owns its buffer; moving it across threads
// moves unique ownership of the stored values, and sharing it only permits
// reads of them.
unsafe impl<V: Send, P: TablePolicy> Send for HashTable<V, P> {}
// SAFETY: See above; `&HashTable` exposes only `&V` access.
unsafe impl<V: Sync, P: TablePolicy> Sync for HashTable<V, P> {}

impl<V, P: TablePolicy> Default for HashTable<V, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, P: TablePolicy> Debug for HashTable<V, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::vec::Vec;

        if self.groups == 0 {
            return f
                .debug_struct("HashTable")
                .field("metadata", &"unallocated")
                .field("size", &self.size)
                .field("capacity", &self.capacity())
                .finish();
        }

        let width = P::Group::WIDTH;
        let ctrl_map = (0..self.groups)
            .map(|group| {
                let mut lanes = Vec::with_capacity(width);
                for lane in 0..width {
                    let ctrl = self.ctrl(group * width + lane);
                    lanes.push(match ctrl {
                        EMPTY => String::from(".."),
                        DELETED => String::from("xx"),
                        SENTINEL => String::from("$$"),
                        fragment => format!("{fragment:02x}"),
                    });
                }
                lanes.join(" ")
            })
            .collect::<Vec<_>>();

        f.debug_struct("HashTable")
            .field("metadata", &ctrl_map)
            .field("size", &self.size)
            .field("tombstones", &self.deleted)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<V, P: TablePolicy> Clone for HashTable<V, P>
where
    V: Clone,
{
    /// Clones the table slot for slot.
    ///
    /// Tombstones are carried over so every probe chain in the copy follows
    /// the same control bytes as in the source. Control bytes for cloned
    /// elements are written only after the clone lands, so a panicking
    /// `Clone` unwinds through a consistent partial table: everything
    /// cloned so far is dropped and the allocation is freed.
    fn clone(&self) -> Self {
        if self.groups == 0 {
            return Self::new();
        }

        let mut new_table = Self::with_groups(self.groups);

        for index in 0..self.slot_count() {
            if self.ctrl(index) == DELETED {
                // SAFETY: `index` is below the slot count, which never
                // reaches the sentinel byte.
                unsafe { new_table.set_ctrl(index, DELETED) };
            }
        }

        for index in 0..self.slot_count() {
            let ctrl = self.ctrl(index);
            if !is_full(ctrl) {
                continue;
            }

            // SAFETY: A full control byte guarantees the source slot is
            // initialized. The destination table has the same group count,
            // so `index` is in bounds there as well, and its slot is
            // uninitialized until this write.
            unsafe {
                let source = (*self.slots_ptr().add(index)).assume_init_ref();
                let hash = P::Cache::cached_hash(source).unwrap_or_default();
                let duplicate = P::Cache::wrap(hash, P::Cache::value(source).clone());
                (*new_table.slots_ptr().add(index)).write(duplicate);
                new_table.set_ctrl(index, ctrl);
            }
            new_table.size += 1;
        }

        debug_assert_eq!(new_table.size, self.size);
        new_table.deleted = self.deleted;
        new_table.growth_left = self.growth_left;

        new_table
    }
}

impl<V, P: TablePolicy> Drop for HashTable<V, P> {
    fn drop(&mut self) {
        // SAFETY: Full control bytes mark initialized slots, and the
        // allocation (when present) matches `self.layout`.
        unsafe {
            if core::mem::needs_drop::<Slot<V, P>>() && self.size > 0 {
                for index in 0..self.slot_count() {
                    if is_full(self.ctrl(index)) {
                        (*self.slots_ptr().add(index)).assume_init_drop();
                    }
                }
            }

            if self.layout.layout.size() != 0 {
                alloc::alloc::dealloc(self.base.as_ptr(), self.layout.layout);
            }
        }
    }
}

impl<V, P: TablePolicy> HashTable<V, P> {
    const WIDTH: usize = P::Group::WIDTH;

    /// Creates a new, unallocated hash table.
    ///
    /// No memory is allocated until the first insertion or reservation.
    pub fn new() -> Self {
        Self {
            layout: DataLayout::new::<V, P>(0),
            base: NonNull::dangling(),
            groups: 0,
            size: 0,
            deleted: 0,
            growth_left: 0,
            _marker: PhantomData,
        }
    }

    /// Creates a new hash table that can hold `capacity` elements without
    /// rehashing.
    ///
    /// The actual capacity may be larger than requested: slot counts are
    /// snapped to power-of-two group counts.
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            Self::new()
        } else {
            Self::with_groups(Self::groups_for(capacity))
        }
    }

    fn with_groups(groups: usize) -> Self {
        debug_assert!(groups.is_power_of_two());

        let layout = DataLayout::new::<V, P>(groups);
        let ctrl_len = groups * Self::WIDTH;

        // SAFETY: `groups >= 1`, so the layout has nonzero size. Allocation
        // failure is handled; the control array is fully initialized to
        // `EMPTY` with the final byte overwritten by the sentinel.
        let base = unsafe {
            let raw = alloc::alloc::alloc(layout.layout);
            if raw.is_null() {
                handle_alloc_error(layout.layout);
            }

            core::ptr::write_bytes(raw, EMPTY, ctrl_len);
            *raw.add(ctrl_len - 1) = SENTINEL;

            NonNull::new_unchecked(raw)
        };

        Self {
            layout,
            base,
            groups,
            size: 0,
            deleted: 0,
            growth_left: Self::load_limit_for(ctrl_len - 1),
            _marker: PhantomData,
        }
    }

    /// Maximum live elements for `capacity` slots under the load factor.
    #[inline(always)]
    fn load_limit_for(capacity: usize) -> usize {
        capacity * P::LOAD_NUM / P::LOAD_DEN
    }

    /// The smallest power-of-two group count whose usable capacity holds
    /// `capacity` elements at the load factor.
    fn groups_for(capacity: usize) -> usize {
        let slots = capacity
            .checked_mul(P::LOAD_DEN)
            .expect("capacity overflow")
            .div_ceil(P::LOAD_NUM);
        // One extra lane pays for the sentinel.
        (slots + 1).div_ceil(Self::WIDTH).next_power_of_two()
    }

    #[inline(always)]
    fn ctrl_len(&self) -> usize {
        self.groups * Self::WIDTH
    }

    /// Number of storable slots; the sentinel lane holds no element.
    #[inline(always)]
    fn slot_count(&self) -> usize {
        if self.groups == 0 {
            0
        } else {
            self.ctrl_len() - 1
        }
    }

    /// Returns the number of elements the table can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        Self::load_limit_for(self.slot_count())
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[cfg(test)]
    pub(crate) fn tombstones(&self) -> usize {
        self.deleted
    }

    #[inline(always)]
    fn ctrl_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    #[inline(always)]
    fn ctrl(&self, index: usize) -> u8 {
        debug_assert!(index < self.ctrl_len());
        // SAFETY: Every control index below `ctrl_len` is within the
        // initialized control array.
        unsafe { *self.base.as_ptr().add(index) }
    }

    /// Writes a control byte.
    ///
    /// # Safety
    ///
    /// `index` must be below the slot count; the sentinel byte is never
    /// rewritten.
    #[inline(always)]
    unsafe fn set_ctrl(&mut self, index: usize, ctrl: u8) {
        debug_assert!(index < self.slot_count());
        // SAFETY: Caller keeps `index` below the slot count, which is
        // inside the control array.
        unsafe { *self.base.as_ptr().add(index) = ctrl }
    }

    #[inline(always)]
    fn slots_ptr(&self) -> *mut MaybeUninit<Slot<V, P>> {
        // SAFETY: `slots_offset` was produced by `Layout::extend` for this
        // allocation; for the unallocated table it is zero on a dangling
        // pointer that is never dereferenced.
        unsafe { self.base.as_ptr().add(self.layout.slots_offset).cast() }
    }

    /// Shared reference to the element in a slot.
    ///
    /// # Safety
    ///
    /// `index` must be a live slot (full control byte).
    #[inline(always)]
    unsafe fn element(&self, index: usize) -> &V {
        debug_assert!(index < self.slot_count());
        debug_assert!(is_full(self.ctrl(index)));
        // SAFETY: Caller guarantees the slot is live, hence initialized.
        unsafe { P::Cache::value((*self.slots_ptr().add(index)).assume_init_ref()) }
    }

    /// Exclusive reference to the element in a slot.
    ///
    /// # Safety
    ///
    /// `index` must be a live slot (full control byte).
    #[inline(always)]
    unsafe fn element_mut(&mut self, index: usize) -> &mut V {
        debug_assert!(index < self.slot_count());
        debug_assert!(is_full(self.ctrl(index)));
        // SAFETY: Caller guarantees the slot is live, hence initialized.
        unsafe { P::Cache::value_mut((*self.slots_ptr().add(index)).assume_init_mut()) }
    }

    /// Finds the slot index of the element matching `hash` and `eq`.
    ///
    /// Walks the probe sequence group by group: lanes whose control byte
    /// equals the hash fragment are compared with `eq`; a group containing
    /// an `Empty` lane ends the search.
    #[inline]
    fn find_index(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<usize> {
        if self.size == 0 {
            return None;
        }

        let fragment = h2(hash);
        let mask = self.groups - 1;
        let mut group = h1(hash) & mask;
        let mut stride = 0;

        loop {
            let base = group * Self::WIDTH;
            // SAFETY: `group` is masked below the group count, so the
            // 16-byte load at `base` stays inside the control array.
            let loaded = unsafe { P::Group::load(self.ctrl_ptr().add(base)) };

            for lane in P::Group::match_byte(loaded, fragment) {
                let index = base + lane;
                // SAFETY: A fragment byte has the top bit clear, so the
                // lane is full and below the sentinel index.
                if eq(unsafe { self.element(index) }) {
                    return Some(index);
                }
            }

            if P::Group::match_empty(loaded).any_set() {
                return None;
            }

            P::Probe::advance(&mut group, &mut stride, mask);
            debug_assert!(stride <= self.groups, "probe sequence exhausted the table");
        }
    }

    /// Returns a reference to the value matching `hash` and `eq`, if any.
    ///
    /// # Arguments
    ///
    /// * `hash` - The hash value of the element to find
    /// * `eq` - A predicate function that returns `true` for the element
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only yields live slots.
        Some(unsafe { self.element(index) })
    }

    /// Returns a mutable reference to the value matching `hash` and `eq`,
    /// if any.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only yields live slots.
        Some(unsafe { self.element_mut(index) })
    }

    /// Removes and returns the value matching `hash` and `eq`, if any.
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only yields live slots.
        Some(unsafe { self.erase_index(index) })
    }

    /// Destroys the element at `index` and retires its control byte.
    ///
    /// The byte becomes `Empty` when the slot's group still has another
    /// `Empty` lane: no probe chain ever continued past such a group, so
    /// nothing can be cut off. Otherwise it becomes a tombstone.
    ///
    /// # Safety
    ///
    /// `index` must be a live slot.
    unsafe fn erase_index(&mut self, index: usize) -> V {
        debug_assert!(is_full(self.ctrl(index)));

        let group_base = index & !(Self::WIDTH - 1);
        // SAFETY: `group_base` is group-aligned and below `ctrl_len`.
        let loaded = unsafe { P::Group::load(self.ctrl_ptr().add(group_base)) };

        let retired = if P::Group::match_empty(loaded).any_set() {
            self.growth_left += 1;
            EMPTY
        } else {
            self.deleted += 1;
            DELETED
        };

        self.size -= 1;
        // SAFETY: Caller guarantees `index` is a live slot, so it is below
        // the slot count and its slot is initialized; after the control
        // byte is retired the slot is treated as uninitialized again.
        unsafe {
            self.set_ctrl(index, retired);
            P::Cache::into_value((*self.slots_ptr().add(index)).assume_init_read())
        }
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// This method returns an [`Entry`] that allows for efficient insertion
    /// or modification of values, covering patterns like "insert if not
    /// present" or "update if present" with a single probe.
    ///
    /// A vacant entry has its destination slot already reserved: any rehash
    /// required by the load factor happens here, before the value exists in
    /// the table, and the value itself is moved exactly once.
    ///
    /// # Arguments
    ///
    /// * `hash` - The hash value for the entry
    /// * `eq` - A predicate function that returns `true` for matching
    ///   values
    /// * `rehash` - Recomputes the hash of a stored value; used when a
    ///   rehash must relocate elements and the policy does not cache hashes
    #[inline]
    pub fn entry(
        &mut self,
        hash: u64,
        eq: impl Fn(&V) -> bool,
        rehash: impl Fn(&V) -> u64,
    ) -> Entry<'_, V, P> {
        if self.groups == 0 {
            self.resize_to(Self::groups_for(1), &rehash);
        }

        if let Some(index) = self.find_index(hash, &eq) {
            return Entry::Occupied(OccupiedEntry { table: self, index });
        }

        let index = self.find_insert_index(hash, &rehash);
        Entry::Vacant(VacantEntry {
            table: self,
            hash,
            index,
        })
    }

    /// Picks the slot a new element will occupy, rehashing first when the
    /// growth ledger is exhausted.
    fn find_insert_index(&mut self, hash: u64, rehash: &dyn Fn(&V) -> u64) -> usize {
        loop {
            let (index, claims_empty) = self.probe_insert_position(hash);
            if claims_empty && self.growth_left == 0 {
                self.grow_for(self.size + 1, rehash);
                // Restart probing under the new group count.
                continue;
            }
            return index;
        }
    }

    /// Walks the probe sequence for an insertion position.
    ///
    /// The first `Deleted` lane seen anywhere along the run is remembered
    /// and preferred; otherwise the first `Empty` lane of the terminating
    /// group is used. Returns the index and whether it claims an `Empty`
    /// lane.
    fn probe_insert_position(&self, hash: u64) -> (usize, bool) {
        debug_assert!(self.groups > 0);

        let mask = self.groups - 1;
        let mut group = h1(hash) & mask;
        let mut stride = 0;
        let mut tombstone: Option<usize> = None;

        loop {
            let base = group * Self::WIDTH;
            // SAFETY: `group` is masked below the group count, so the
            // 16-byte load at `base` stays inside the control array.
            let loaded = unsafe { P::Group::load(self.ctrl_ptr().add(base)) };

            if tombstone.is_none() {
                if let Some(lane) = P::Group::match_byte(loaded, DELETED).first_set() {
                    tombstone = Some(base + lane);
                }
            }

            if let Some(lane) = P::Group::match_empty(loaded).first_set() {
                return match tombstone {
                    Some(index) => (index, false),
                    None => (base + lane, true),
                };
            }

            P::Probe::advance(&mut group, &mut stride, mask);
            debug_assert!(stride <= self.groups, "probe sequence exhausted the table");
        }
    }

    /// Reserves capacity for at least `additional` more elements.
    ///
    /// The collection may reserve more space to speculatively avoid
    /// frequent reallocations; capacity never decreases. Does nothing if
    /// capacity is already sufficient.
    ///
    /// # Arguments
    ///
    /// * `additional` - The number of additional elements the table should
    ///   be able to hold
    /// * `rehash` - Recomputes the hash of a stored value during
    ///   relocation
    pub fn reserve(&mut self, additional: usize, rehash: impl Fn(&V) -> u64) {
        let required = self
            .size
            .checked_add(additional)
            .expect("capacity overflow");
        if required > self.capacity() {
            self.resize_to(Self::groups_for(required), &rehash);
        }
    }

    #[cold]
    #[inline(never)]
    fn grow_for(&mut self, capacity: usize, rehash: &dyn Fn(&V) -> u64) {
        self.resize_to(Self::groups_for(capacity), rehash);
    }

    /// Relocates every live element into a fresh buffer with `groups`
    /// control groups.
    ///
    /// Insertion into the new buffer is unchecked — the source table
    /// guarantees uniqueness — so each element lands in the first `Empty`
    /// lane of the first non-full group on its probe path. Tombstones are
    /// not carried over.
    ///
    /// `rehash` may panic (it runs arbitrary user hashing when the policy
    /// does not cache hashes). Each source control byte is retired to
    /// `Empty` the moment its element's ownership moves, so an unwind
    /// drops every element exactly once: relocated ones with the new
    /// buffer, the rest with the old.
    fn resize_to(&mut self, groups: usize, rehash: &dyn Fn(&V) -> u64) {
        let mut new_table = Self::with_groups(groups);
        debug_assert!(new_table.capacity() >= self.size);

        if self.size > 0 {
            for index in 0..self.slot_count() {
                if !is_full(self.ctrl(index)) {
                    continue;
                }

                // SAFETY: A full byte guarantees an initialized slot. The
                // destination index comes from `first_empty_index`, which
                // only returns `Empty` lanes below the sentinel; the raw
                // copy transfers ownership (including any cached hash) and
                // the source byte is retired immediately afterwards.
                unsafe {
                    let slot = self.slots_ptr().add(index);
                    let hash = match P::Cache::cached_hash((*slot).assume_init_ref()) {
                        Some(hash) => hash,
                        None => rehash(P::Cache::value((*slot).assume_init_ref())),
                    };

                    let target = new_table.first_empty_index(hash);
                    core::ptr::copy_nonoverlapping(slot, new_table.slots_ptr().add(target), 1);
                    new_table.set_ctrl(target, h2(hash));
                    new_table.size += 1;
                    new_table.growth_left -= 1;

                    self.set_ctrl(index, EMPTY);
                }
            }
        }

        core::mem::swap(self, &mut new_table);
        // The old buffer holds no live elements; dropping it just frees.
        new_table.size = 0;
        new_table.deleted = 0;
    }

    /// First `Empty` lane of the first group on `hash`'s probe path that
    /// has one. Used for unchecked relocation only.
    fn first_empty_index(&self, hash: u64) -> usize {
        let mask = self.groups - 1;
        let mut group = h1(hash) & mask;
        let mut stride = 0;

        loop {
            let base = group * Self::WIDTH;
            // SAFETY: `group` is masked below the group count, so the
            // 16-byte load at `base` stays inside the control array.
            let loaded = unsafe { P::Group::load(self.ctrl_ptr().add(base)) };
            if let Some(lane) = P::Group::match_empty(loaded).first_set() {
                return base + lane;
            }

            P::Probe::advance(&mut group, &mut stride, mask);
            debug_assert!(stride <= self.groups, "probe sequence exhausted the table");
        }
    }

    /// Removes all elements and releases the allocation.
    ///
    /// All values are properly dropped if they implement `Drop`. After
    /// calling `clear()`, the table is back in the unallocated state.
    pub fn clear(&mut self) {
        if self.groups == 0 {
            return;
        }

        // SAFETY: Full control bytes mark initialized slots; the
        // allocation matches `self.layout` and is released exactly once
        // because the fields are reset to the unallocated state below.
        unsafe {
            if core::mem::needs_drop::<Slot<V, P>>() && self.size > 0 {
                for index in 0..self.slot_count() {
                    if is_full(self.ctrl(index)) {
                        (*self.slots_ptr().add(index)).assume_init_drop();
                    }
                }
            }

            alloc::alloc::dealloc(self.base.as_ptr(), self.layout.layout);
        }

        self.layout = DataLayout::new::<V, P>(0);
        self.base = NonNull::dangling();
        self.groups = 0;
        self.size = 0;
        self.deleted = 0;
        self.growth_left = 0;
    }

    /// The next live slot at or after `index`, skipping dead regions a
    /// group at a time.
    ///
    /// The fast path checks a single byte. The slow path aligns down to
    /// the containing group, masks off lanes before `index`, and then
    /// walks whole groups; a loaded group containing the sentinel ends
    /// the walk.
    fn next_live_slot(&self, mut index: usize) -> Option<usize> {
        if self.groups == 0 {
            return None;
        }
        debug_assert!(index <= self.slot_count());

        if index < self.slot_count() && is_full(self.ctrl(index)) {
            return Some(index);
        }

        loop {
            let base = index & !(Self::WIDTH - 1);
            // SAFETY: `base` is group-aligned and at most the last group's
            // base, so the 16-byte load stays inside the control array.
            let loaded = unsafe { P::Group::load(self.ctrl_ptr().add(base)) };

            if let Some(lane) = P::Group::match_full(loaded)
                .remove_below(index - base)
                .first_set()
            {
                return Some(base + lane);
            }

            if P::Group::match_byte(loaded, SENTINEL).any_set() {
                return None;
            }

            index = base + Self::WIDTH;
        }
    }

    /// Returns an iterator over all values in the table.
    ///
    /// The iterator yields `&V` references in internal layout order, which
    /// is arbitrary and may change after any rehash.
    pub fn iter(&self) -> Iter<'_, V, P> {
        Iter {
            table: self,
            cursor: 0,
        }
    }

    /// Returns an iterator that removes and yields all values from the
    /// table.
    ///
    /// After the iterator is dropped the table is empty but keeps its
    /// allocation. If the iterator is forgotten instead, the unyielded
    /// values stay in the table with conservative growth metadata; they
    /// are still dropped with the table.
    pub fn drain(&mut self) -> Drain<'_, V, P> {
        Drain {
            table: self,
            cursor: 0,
        }
    }

    /// Restores the metadata to the fully-empty state after a drain.
    fn reset_after_drain(&mut self) {
        debug_assert_eq!(self.size, 0);
        if self.groups == 0 {
            return;
        }

        // SAFETY: The control array is `ctrl_len` bytes; rewriting it to
        // all-`EMPTY` plus the sentinel is exactly its initial state.
        unsafe {
            core::ptr::write_bytes(self.base.as_ptr(), EMPTY, self.ctrl_len());
            *self.base.as_ptr().add(self.ctrl_len() - 1) = SENTINEL;
        }
        self.deleted = 0;
        self.growth_left = Self::load_limit_for(self.slot_count());
    }

    /// Walks the whole structure and asserts every invariant from the
    /// module documentation. Test builds only.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self, rehash: impl Fn(&V) -> u64) {
        if self.groups == 0 {
            assert_eq!(self.size, 0);
            assert_eq!(self.deleted, 0);
            assert_eq!(self.growth_left, 0);
            return;
        }

        assert!(self.groups.is_power_of_two());

        let mut full = 0;
        let mut deleted = 0;
        for index in 0..self.ctrl_len() {
            let ctrl = self.ctrl(index);
            if index == self.slot_count() {
                assert_eq!(ctrl, SENTINEL, "sentinel missing from the last lane");
                continue;
            }
            assert_ne!(ctrl, SENTINEL, "stray sentinel at {index}");
            if is_full(ctrl) {
                full += 1;
            } else if ctrl == DELETED {
                deleted += 1;
            } else {
                assert_eq!(ctrl, EMPTY);
            }
        }
        assert_eq!(full, self.size, "live byte count disagrees with size");
        assert_eq!(deleted, self.deleted, "tombstone count disagrees");
        assert_eq!(
            self.growth_left,
            self.capacity() - self.size - self.deleted,
            "growth ledger out of balance",
        );

        // Every live element must be reachable from its natural group
        // before any group containing an `Empty` lane.
        let mask = self.groups - 1;
        for index in 0..self.slot_count() {
            if !is_full(self.ctrl(index)) {
                continue;
            }
            // SAFETY: Full byte, live slot.
            let (hash, fragment) = unsafe {
                let slot = (*self.slots_ptr().add(index)).assume_init_ref();
                let hash = P::Cache::cached_hash(slot)
                    .unwrap_or_else(|| rehash(P::Cache::value(slot)));
                (hash, h2(hash))
            };
            assert_eq!(self.ctrl(index), fragment, "fragment mismatch at {index}");

            let home = index / Self::WIDTH;
            let mut group = h1(hash) & mask;
            let mut stride = 0;
            while group != home {
                let base = group * Self::WIDTH;
                // SAFETY: Group-aligned in-bounds load.
                let loaded = unsafe { P::Group::load(self.ctrl_ptr().add(base)) };
                assert!(
                    !P::Group::match_empty(loaded).any_set(),
                    "probe path to slot {index} crosses an empty lane",
                );
                P::Probe::advance(&mut group, &mut stride, mask);
                assert!(stride <= self.groups, "slot {index} unreachable");
            }
        }
    }
}

#[cfg(feature = "stats")]
mod stats {
    use super::*;

    /// Debug statistics for table analysis.
    #[derive(Debug, Clone)]
    pub struct DebugStats {
        /// Number of elements currently in the table.
        pub populated: usize,
        /// Maximum load capacity before a rehash.
        pub capacity: usize,
        /// Total number of slots allocated.
        pub total_slots: usize,
        /// Number of tombstoned slots.
        pub tombstones: usize,
        /// Load factor (populated / total slots).
        pub load_factor: f64,
        /// Total memory in bytes used by the table.
        pub total_bytes: usize,
    }

    #[cfg(feature = "std")]
    impl DebugStats {
        /// Pretty-print the debug statistics.
        pub fn print(&self) {
            println!("=== Hash Table Debug Statistics ===");
            println!(
                "Population: {}/{} ({:.2}% load factor)",
                self.populated,
                self.capacity,
                self.load_factor * 100.0
            );
            println!(
                "Slots: {} total, {} tombstoned",
                self.total_slots, self.tombstones
            );
            println!("Total Allocated: {} bytes", self.total_bytes);
        }
    }

    /// Histogram of groups probed per lookup of each live element.
    pub struct ProbeHistogram {
        /// `groups_probed[n]` counts elements found after probing `n + 1`
        /// groups; the final bucket also absorbs longer chains.
        pub groups_probed: [usize; 16],
    }

    #[cfg(feature = "std")]
    impl ProbeHistogram {
        /// Pretty-print the probe histogram.
        pub fn print(&self) {
            let max = self.groups_probed.iter().copied().max().unwrap_or(0);
            if max == 0 {
                println!("probe histogram: empty");
                return;
            }
            println!("groups probed per element:");
            for (length, &count) in self.groups_probed.iter().enumerate() {
                let bar = "#".repeat(count * 60 / max);
                println!("{:>2} | {} ({})", length + 1, bar, count);
            }
        }
    }

    impl<V, P: TablePolicy> HashTable<V, P> {
        /// Collects occupancy statistics.
        pub fn debug_stats(&self) -> DebugStats {
            let total_slots = self.slot_count();
            DebugStats {
                populated: self.size,
                capacity: self.capacity(),
                total_slots,
                tombstones: self.deleted,
                load_factor: if total_slots == 0 {
                    0.0
                } else {
                    self.size as f64 / total_slots as f64
                },
                total_bytes: self.layout.layout.size(),
            }
        }

        /// Measures the probe length of every live element.
        ///
        /// # Arguments
        ///
        /// * `rehash` - Recomputes the hash of a stored value when the
        ///   policy does not cache hashes
        pub fn probe_histogram(&self, rehash: impl Fn(&V) -> u64) -> ProbeHistogram {
            let mut histogram = ProbeHistogram {
                groups_probed: [0; 16],
            };
            if self.groups == 0 {
                return histogram;
            }

            let mask = self.groups - 1;
            for index in 0..self.slot_count() {
                if !is_full(self.ctrl(index)) {
                    continue;
                }
                // SAFETY: Full byte, live slot.
                let hash = unsafe {
                    let slot = (*self.slots_ptr().add(index)).assume_init_ref();
                    P::Cache::cached_hash(slot).unwrap_or_else(|| rehash(P::Cache::value(slot)))
                };

                let home = index / Self::WIDTH;
                let mut group = h1(hash) & mask;
                let mut stride = 0;
                let mut probed = 1;
                while group != home && stride <= self.groups {
                    P::Probe::advance(&mut group, &mut stride, mask);
                    probed += 1;
                }
                histogram.groups_probed[usize::min(probed - 1, 15)] += 1;
            }
            histogram
        }
    }
}

#[cfg(feature = "stats")]
pub use stats::DebugStats;
#[cfg(feature = "stats")]
pub use stats::ProbeHistogram;

/// A view into a single entry in the table, which is either vacant or
/// occupied.
///
/// This enum is constructed by the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V, P: TablePolicy = DefaultPolicy> {
    /// A vacant entry - no matching element is present in the table.
    Vacant(VacantEntry<'a, V, P>),
    /// An occupied entry - a matching element is present in the table.
    Occupied(OccupiedEntry<'a, V, P>),
}

impl<'a, V, P: TablePolicy> Entry<'a, V, P> {
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
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to the value if the entry is occupied; returns the
    /// mutable reference, or `None` for a vacant entry.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value either way.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the table.
///
/// This struct is created by the [`entry`] method on [`HashTable`] when no
/// matching element is present. The destination slot is already reserved;
/// inserting cannot rehash.
///
/// [`entry`]: HashTable::entry
pub struct VacantEntry<'a, V, P: TablePolicy = DefaultPolicy> {
    table: &'a mut HashTable<V, P>,
    hash: u64,
    index: usize,
}

impl<'a, V, P: TablePolicy> VacantEntry<'a, V, P> {
    /// Inserts a value into the vacant entry and returns a mutable
    /// reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        // SAFETY: `entry` reserved `self.index` as an `Empty` or `Deleted`
        // lane below the sentinel, and the exclusive borrow means nothing
        // has touched the table since. Writing the fragment byte and the
        // slot makes it live; the ledger update matches the lane's class.
        unsafe {
            let previous = self.table.ctrl(self.index);
            if previous == EMPTY {
                debug_assert!(self.table.growth_left > 0);
                self.table.growth_left -= 1;
            } else {
                debug_assert_eq!(previous, DELETED);
                self.table.deleted -= 1;
            }

            self.table.set_ctrl(self.index, h2(self.hash));
            self.table.size += 1;

            let slot = self.table.slots_ptr().add(self.index);
            (*slot).write(P::Cache::wrap(self.hash, value));
            P::Cache::value_mut((*slot).assume_init_mut())
        }
    }
}

/// A view into an occupied entry in the table.
///
/// This struct is created by the [`entry`] method on [`HashTable`] when a
/// matching element is present. It provides methods to access, modify, or
/// remove the existing value.
///
/// [`entry`]: HashTable::entry
pub struct OccupiedEntry<'a, V, P: TablePolicy = DefaultPolicy> {
    table: &'a mut HashTable<V, P>,
    index: usize,
}

// Safety invariant for OccupiedEntry methods:
// An `OccupiedEntry` is only created from an index returned by
// `find_index`, which yields live slots below the sentinel, and the
// exclusive borrow of the table keeps the slot live for the entry's
// lifetime. Element access and erasure at `self.index` are therefore safe.
impl<'a, V, P: TablePolicy> OccupiedEntry<'a, V, P> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe { self.table.element(self.index) }
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe { self.table.element_mut(self.index) }
    }

    /// Converts the entry into a mutable reference to the value with the
    /// lifetime of the entry.
    pub fn into_mut(self) -> &'a mut V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe { self.table.element_mut(self.index) }
    }

    /// Removes the entry from the table and returns the value.
    pub fn remove(self) -> V {
        // SAFETY: See safety invariant comment above `impl` block.
        unsafe { self.table.erase_index(self.index) }
    }
}

/// An iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`]. It
/// yields `&V` references in internal layout order.
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, V, P: TablePolicy = DefaultPolicy> {
    table: &'a HashTable<V, P>,
    cursor: usize,
}

impl<'a, V, P: TablePolicy> Iterator for Iter<'a, V, P> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.table.next_live_slot(self.cursor)?;
        self.cursor = index + 1;
        // SAFETY: `next_live_slot` only yields live slots.
        Some(unsafe { self.table.element(index) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.table.size))
    }
}

/// A draining iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`]. It
/// yields owned `V` values and empties the table as it iterates.
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, V, P: TablePolicy = DefaultPolicy> {
    table: &'a mut HashTable<V, P>,
    cursor: usize,
}

impl<V, P: TablePolicy> Iterator for Drain<'_, V, P> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.table.next_live_slot(self.cursor)?;
        self.cursor = index + 1;
        // SAFETY: `next_live_slot` only yields live slots; retiring the
        // control byte before reading hands ownership to the caller
        // exactly once. The exclusive borrow rules out lookups against the
        // intermediate metadata.
        unsafe {
            self.table.set_ctrl(index, EMPTY);
            self.table.size -= 1;
            Some(P::Cache::into_value(
                (*self.table.slots_ptr().add(index)).assume_init_read(),
            ))
        }
    }
}

impl<V, P: TablePolicy> Drop for Drain<'_, V, P> {
    fn drop(&mut self) {
        for _ in &mut *self {}
        self.table.reset_after_drain();
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::sync::atomic::AtomicUsize;
    use core::sync::atomic::Ordering;

    use crate::control::mix64;
    use crate::policy::Identity;
    use crate::policy::Linear;
    use crate::policy::NoStore;
    use crate::policy::Quadratic;
    use crate::policy::Store;

    use super::*;

    /// Policy probing linearly instead of with triangular strides.
    struct LinearPolicy;

    impl TablePolicy for LinearPolicy {
        type Group = crate::simd::DefaultBackend;
        type Probe = Linear;
        type Cache = NoStore;
        type Mix = Identity;
    }

    /// Policy caching the hash next to each element.
    struct CachingPolicy;

    impl TablePolicy for CachingPolicy {
        type Group = crate::simd::DefaultBackend;
        type Probe = Quadratic;
        type Cache = Store;
        type Mix = Identity;
    }

    /// Inserts `value` hashed by `hash_of`; the same function reproduces
    /// hashes during any relocation.
    fn insert_with<P: TablePolicy>(
        table: &mut HashTable<u64, P>,
        hash_of: impl Fn(&u64) -> u64 + Copy,
        value: u64,
    ) -> bool {
        match table.entry(hash_of(&value), |v| *v == value, hash_of) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    fn mixed(value: &u64) -> u64 {
        mix64(*value)
    }

    fn identity(value: &u64) -> u64 {
        *value
    }

    /// Degenerate hasher sending everything to one probe sequence.
    fn zero(_value: &u64) -> u64 {
        0
    }

    #[test]
    fn new_table_holds_nothing() {
        let table: HashTable<u64> = HashTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.find(17, |v| *v == 17), None);
        assert_eq!(table.iter().count(), 0);
        table.check_invariants(|v| *v);
    }

    #[test]
    fn first_insert_allocates() {
        let mut table: HashTable<u64> = HashTable::new();
        assert!(insert_with(&mut table, mixed, 1));
        assert_eq!(table.len(), 1);
        assert!(table.capacity() >= 1);
        assert_eq!(table.find(mix64(1), |v| *v == 1), Some(&1));
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn insert_twice_keeps_one() {
        let mut table: HashTable<u64> = HashTable::new();
        assert!(insert_with(&mut table, mixed, 42));
        assert!(!insert_with(&mut table, mixed, 42));
        assert_eq!(table.len(), 1);
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn hundred_inserts_then_erase() {
        let mut table: HashTable<u64> = HashTable::new();
        for value in 0..100 {
            assert!(insert_with(&mut table, mixed, value));
        }
        assert_eq!(table.len(), 100);
        assert!(table.find(mix64(50), |v| *v == 50).is_some());
        assert!(table.find(mix64(100), |v| *v == 100).is_none());

        assert_eq!(table.remove(mix64(50), |v| *v == 50), Some(50));
        assert_eq!(table.len(), 99);
        assert!(table.find(mix64(50), |v| *v == 50).is_none());
        assert_eq!(table.remove(mix64(50), |v| *v == 50), None);
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn fill_to_load_limit_then_rehash() {
        let mut table: HashTable<u64> = HashTable::with_capacity(13);
        // One 16-lane group: 15 slots, 13 usable at 7/8.
        assert_eq!(table.capacity(), 13);

        for value in 0..13 {
            assert!(insert_with(&mut table, identity, value));
            assert_eq!(table.capacity(), 13, "premature rehash at {value}");
        }

        assert!(insert_with(&mut table, identity, 13));
        assert!(table.capacity() > 13, "rehash did not trigger");
        for value in 0..14 {
            assert!(table.find(value, |v| *v == value).is_some());
        }
        table.check_invariants(|v| *v);
    }

    #[test]
    fn one_full_group_iterates() {
        let mut table: HashTable<u64> = HashTable::new();
        for value in 0..16 {
            assert!(insert_with(&mut table, mixed, value));
        }
        let mut found: Vec<u64> = table.iter().copied().collect();
        found.sort_unstable();
        assert_eq!(found, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn seventeen_elements_cross_groups() {
        let mut table: HashTable<u64> = HashTable::new();
        for value in 0..17 {
            assert!(insert_with(&mut table, mixed, value));
        }
        let mut found: Vec<u64> = table.iter().copied().collect();
        found.sort_unstable();
        assert_eq!(found, (0..17).collect::<Vec<_>>());
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn erase_with_empty_lane_leaves_no_tombstone() {
        let mut table: HashTable<u64> = HashTable::with_capacity(13);
        for value in 0..5 {
            insert_with(&mut table, identity, value);
        }
        assert_eq!(table.remove(3, |v| *v == 3), Some(3));
        assert_eq!(table.tombstones(), 0);
        table.check_invariants(|v| *v);
    }

    #[test]
    fn erase_in_full_group_leaves_tombstone_and_reuses_it() {
        // Two groups, 31 slots, 27 usable. Identity hashes 0..16 all start
        // at group 0 and fill it completely.
        let mut table: HashTable<u64> = HashTable::with_capacity(27);
        assert_eq!(table.capacity(), 27);
        for value in 0..16 {
            assert!(insert_with(&mut table, identity, value));
        }
        // Overflows group 0 into the next group on the probe path.
        assert!(insert_with(&mut table, identity, 16));
        table.check_invariants(|v| *v);

        assert_eq!(table.remove(5, |v| *v == 5), Some(5));
        assert_eq!(table.tombstones(), 1);
        // The chain through group 0 must survive the tombstone.
        assert!(table.find(16, |v| *v == 16).is_some());
        table.check_invariants(|v| *v);

        // A colliding insert reuses the tombstone.
        assert!(insert_with(&mut table, identity, 5));
        assert_eq!(table.tombstones(), 0);
        for value in 0..17 {
            assert!(table.find(value, |v| *v == value).is_some());
        }
        table.check_invariants(|v| *v);
    }

    #[test]
    fn iterate_past_many_tombstones() {
        let mut table: HashTable<u64> = HashTable::new();
        for value in 0..1000 {
            assert!(insert_with(&mut table, mixed, value));
        }
        for value in (0..1000).step_by(2) {
            assert_eq!(table.remove(mix64(value), |v| *v == value), Some(value));
        }
        assert_eq!(table.len(), 500);

        let mut found: Vec<u64> = table.iter().copied().collect();
        found.sort_unstable();
        assert_eq!(found.len(), 500);
        for (position, value) in found.iter().enumerate() {
            assert_eq!(*value, position as u64 * 2 + 1);
        }
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn reserve_grows_and_never_shrinks() {
        let mut table: HashTable<u64> = HashTable::new();
        table.reserve(1000, |v| mix64(*v));
        let reserved = table.capacity();
        assert!(reserved >= 1000);

        insert_with(&mut table, mixed, 1);
        insert_with(&mut table, mixed, 2);
        table.reserve(10, |v| mix64(*v));
        assert_eq!(table.capacity(), reserved);
        assert!(table.find(mix64(1), |v| *v == 1).is_some());
        assert!(table.find(mix64(2), |v| *v == 2).is_some());
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn clear_deallocates_and_restarts() {
        let mut table: HashTable<u64> = HashTable::new();
        for value in 0..100 {
            insert_with(&mut table, mixed, value);
        }
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.iter().count(), 0);
        table.check_invariants(|v| mix64(*v));

        assert!(insert_with(&mut table, mixed, 7));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn clear_runs_destructors() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted(u64);
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut table: HashTable<Counted> = HashTable::new();
        for value in 0..3 {
            match table.entry(mix64(value), |c| c.0 == value, |c| mix64(c.0)) {
                Entry::Vacant(entry) => {
                    entry.insert(Counted(value));
                }
                Entry::Occupied(_) => unreachable!(),
            }
        }

        let before = DROPS.load(Ordering::Relaxed);
        table.clear();
        assert_eq!(DROPS.load(Ordering::Relaxed) - before, 3);
    }

    #[test]
    fn move_only_values_work() {
        struct Token(u64);

        let mut table: HashTable<Token> = HashTable::new();
        for value in 0..50 {
            match table.entry(mix64(value), |t| t.0 == value, |t| mix64(t.0)) {
                Entry::Vacant(entry) => {
                    entry.insert(Token(value));
                }
                Entry::Occupied(_) => unreachable!(),
            }
        }
        assert_eq!(table.len(), 50);
        assert!(table.find(mix64(31), |t| t.0 == 31).is_some());
        assert_eq!(table.remove(mix64(31), |t| t.0 == 31).map(|t| t.0), Some(31));
        assert_eq!(table.len(), 49);
    }

    #[test]
    fn clone_is_deep() {
        let mut table: HashTable<String> = HashTable::new();
        let hash = |s: &String| mix64(s.len() as u64 * 31 + s.as_bytes()[0] as u64);
        for word in ["alpha", "beta", "gamma", "delta"] {
            let owned = word.to_string();
            match table.entry(hash(&owned), |s| *s == owned, hash) {
                Entry::Vacant(entry) => {
                    entry.insert(owned);
                }
                Entry::Occupied(_) => unreachable!(),
            }
        }

        let copy = table.clone();
        let alpha = "alpha".to_string();
        table.remove(hash(&alpha), |s| *s == alpha);

        assert_eq!(table.len(), 3);
        assert_eq!(copy.len(), 4);
        assert!(copy.find(hash(&alpha), |s| *s == alpha).is_some());
        copy.check_invariants(hash);
    }

    #[test]
    fn clone_preserves_probe_chains_through_tombstones() {
        let mut table: HashTable<u64> = HashTable::with_capacity(27);
        for value in 0..17 {
            insert_with(&mut table, identity, value);
        }
        table.remove(5, |v| *v == 5);
        assert_eq!(table.tombstones(), 1);

        let copy = table.clone();
        assert!(copy.find(16, |v| *v == 16).is_some());
        assert!(copy.find(5, |v| *v == 5).is_none());
        copy.check_invariants(|v| *v);
    }

    #[test]
    fn drain_yields_everything_and_empties() {
        let mut table: HashTable<u64> = HashTable::new();
        for value in 0..100 {
            insert_with(&mut table, mixed, value);
        }

        let mut drained: Vec<u64> = table.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, (0..100).collect::<Vec<_>>());
        assert!(table.is_empty());
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn dropping_a_partial_drain_drops_the_rest() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted(u64);
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut table: HashTable<Counted> = HashTable::new();
        for value in 0..10 {
            match table.entry(mix64(value), |c| c.0 == value, |c| mix64(c.0)) {
                Entry::Vacant(entry) => {
                    entry.insert(Counted(value));
                }
                Entry::Occupied(_) => unreachable!(),
            }
        }

        let before = DROPS.load(Ordering::Relaxed);
        {
            let mut drain = table.drain();
            drop(drain.next());
            drop(drain.next());
        }
        assert_eq!(DROPS.load(Ordering::Relaxed) - before, 10);
        assert!(table.is_empty());
        table.check_invariants(|c| mix64(c.0));
    }

    #[test]
    fn entry_or_insert_semantics() {
        let mut table: HashTable<u64> = HashTable::new();
        let value = table
            .entry(mix64(9), |v| *v == 9, |v| mix64(*v))
            .or_insert(9);
        assert_eq!(*value, 9);

        let modified = table
            .entry(mix64(9), |v| *v == 9, |v| mix64(*v))
            .and_modify(|v| *v += 1);
        assert_eq!(modified.copied(), Some(10));

        let missing = table
            .entry(mix64(11), |v| *v == 11, |v| mix64(*v))
            .and_modify(|v| *v += 1);
        assert!(missing.is_none());
    }

    #[test]
    fn occupied_entry_remove_erases() {
        let mut table: HashTable<u64> = HashTable::new();
        insert_with(&mut table, mixed, 3);
        match table.entry(mix64(3), |v| *v == 3, |v| mix64(*v)) {
            Entry::Occupied(entry) => assert_eq!(entry.remove(), 3),
            Entry::Vacant(_) => unreachable!(),
        }
        assert!(table.is_empty());
        table.check_invariants(|v| mix64(*v));
    }

    #[test]
    fn linear_probing_handles_collisions() {
        let mut table: HashTable<u64, LinearPolicy> = HashTable::with_capacity(27);
        // Same starting group for everything; linear probing spills into
        // consecutive groups.
        for value in 0..20 {
            assert!(insert_with(&mut table, zero, value));
        }
        for value in 0..20 {
            assert!(table.find(0, |v| *v == value).is_some());
        }
        assert_eq!(table.remove(0, |v| *v == 11), Some(11));
        assert!(table.find(0, |v| *v == 19).is_some());
        table.check_invariants(|_| 0);
    }

    #[test]
    fn cached_hashes_relocate_without_rehashing() {
        let mut table: HashTable<u64, CachingPolicy> = HashTable::new();
        // The rehash closure must never run: the policy caches hashes.
        let forbidden = |_: &u64| -> u64 { unreachable!("hash cache ignored") };

        for value in 0..200 {
            match table.entry(mix64(value), |v| *v == value, forbidden) {
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
                Entry::Occupied(_) => unreachable!(),
            }
        }
        assert_eq!(table.len(), 200);
        for value in 0..200 {
            assert!(table.find(mix64(value), |v| *v == value).is_some());
        }
        table.check_invariants(forbidden);
    }

    #[test]
    fn identity_collisions_across_groups() {
        // Keys 0, 128, 256 share a starting group whenever the group count
        // divides their h1 values to the same residue; with one group they
        // always do.
        let mut table: HashTable<u64> = HashTable::with_capacity(4);
        for value in [0u64, 128, 256] {
            assert!(insert_with(&mut table, identity, value));
        }
        for value in [0u64, 128, 256] {
            assert!(table.find(value, |v| *v == value).is_some());
        }

        assert_eq!(table.remove(0, |v| *v == 0), Some(0));
        assert!(table.find(128, |v| *v == 128).is_some());
        assert!(table.find(256, |v| *v == 256).is_some());

        assert!(insert_with(&mut table, identity, 384));
        for value in [128u64, 256, 384] {
            assert!(table.find(value, |v| *v == value).is_some());
        }
        table.check_invariants(|v| *v);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn stats_reflect_occupancy() {
        let mut table: HashTable<u64> = HashTable::new();
        for value in 0..40 {
            insert_with(&mut table, mixed, value);
        }
        table.remove(mix64(0), |v| *v == 0);

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 39);
        assert!(stats.total_slots >= 39);
        assert!(stats.load_factor > 0.0);

        let histogram = table.probe_histogram(|v| mix64(*v));
        assert_eq!(histogram.groups_probed.iter().sum::<usize>(), 39);
    }
}
