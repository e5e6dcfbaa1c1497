#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod control;

pub mod error;

/// A key-value map backed by the Swiss table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value interface with configurable hashers and policies.
pub mod hash_map;

/// A hash set backed by the Swiss table.
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable hashers and policies.
pub mod hash_set;

pub mod hash_table;

/// The bundled hasher.
pub mod hasher;

pub mod policy;

pub mod simd;

pub use error::Error;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::HashTable;
pub use hasher::DefaultHashBuilder;
pub use policy::DefaultPolicy;
