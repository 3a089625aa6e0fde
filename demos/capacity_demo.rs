use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use snug_hash::HashTable;
use snug_hash::LoadFactor;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "entries", default_value_t = 1000)]
    entries: usize,

    #[arg(short = 'l', long = "load_factor", default_value_t = 0.75)]
    load_factor: f32,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn fill(table: &mut HashTable<u64>, values: impl Iterator<Item = u64>) {
    for value in values {
        table.insert(hash_u64(value), value, |&v| v == value);
    }
}

fn main() {
    let args = Args::parse();
    let load_factor = match LoadFactor::new(args.load_factor) {
        Ok(load_factor) => load_factor,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    let n = args.entries as u64;

    println!(
        "Loading {} entries with load factor {}",
        args.entries,
        load_factor.get()
    );

    let mut sequential = HashTable::with_load_factor(load_factor);
    fill(&mut sequential, 0..n);
    println!("One at a time:      {} buckets", sequential.capacity());

    let mut sized = HashTable::with_capacity_and_load_factor(args.entries, load_factor);
    let planned = sized.capacity();
    fill(&mut sized, 0..n);
    println!(
        "Sized, then filled: {} buckets (planned {})",
        sized.capacity(),
        planned
    );

    let copied = HashTable::from_known_size(
        args.entries,
        load_factor,
        sequential.iter().map(|&v| (hash_u64(v), v)),
    );
    println!("Copied:             {} buckets", copied.capacity());

    let mut bulk = HashTable::with_load_factor(load_factor);
    fill(&mut bulk, 0..n / 2);
    bulk.reserve(args.entries - args.entries / 2);
    fill(&mut bulk, n / 2..n);
    println!("Half, then bulk:    {} buckets", bulk.capacity());

    let clone = sequential.clone();
    println!("Cloned:             {} buckets", clone.capacity());

    sized.debug_stats().print();
}
