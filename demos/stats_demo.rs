use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use swiss_hash::HashTable;
use swiss_hash::hash_table::Entry;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 100_000)]
    target_capacity: usize,

    /// Erase every n-th element after filling, to show tombstone
    /// accounting. Zero erases nothing.
    #[arg(short = 'e', long = "erase_every", default_value_t = 0)]
    erase_every: usize,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: HashTable<u64> = HashTable::with_capacity(args.target_capacity);
    println!("Actual capacity: {}", table.capacity());
    println!("Filling table with u64 values...");

    let count = table.capacity();
    for value in 0..count as u64 {
        match table.entry(hash_u64(value), |&v| v == value, |&v| hash_u64(v)) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => {
                panic!("value already exists in table: {value}");
            }
        }
    }
    println!("Inserted {} values", table.len());

    if args.erase_every > 0 {
        let mut erased = 0usize;
        for value in (0..count as u64).step_by(args.erase_every) {
            if table.remove(hash_u64(value), |&v| v == value).is_some() {
                erased += 1;
            }
        }
        println!("Erased {erased} values (every {}th)", args.erase_every);
    }

    println!();
    table.debug_stats().print();
    println!();
    table.probe_histogram(|&v| hash_u64(v)).print();
}
