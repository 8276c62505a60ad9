//! Benchmarks for hierarchy resolution and validation
//!
//! Run with: `cargo bench -p guildscope-core`
//!
//! These benchmarks measure the per-interaction hot paths:
//! - Building the effective parent map at session start
//! - Listing the children of a node (tree expansion)
//! - Validating a candidate parent (accepted and rejected)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use guildscope_core::db::{InMemoryRecordStore, RecordStore};
use guildscope_core::models::{rank, HierarchyOverride, Record};
use guildscope_core::services::{validate, HierarchyResolver};
use std::sync::Arc;

const GENERA: usize = 200;
const SPECIES_PER_GENUS: usize = 50;

/// One order, `GENERA` genera under it, `SPECIES_PER_GENUS` species per genus
fn synthetic_dataset() -> Arc<InMemoryRecordStore> {
    let mut records = vec![Record::new("O", "Agaricales", rank::ORDER, None)];
    for g in 0..GENERA {
        let genus_id = format!("G{}", g);
        records.push(Record::new(
            genus_id.clone(),
            format!("Genus {}", g),
            rank::GENUS,
            Some("O".to_string()),
        ));
        for s in 0..SPECIES_PER_GENUS {
            records.push(Record::new(
                format!("G{}S{}", g, s),
                format!("Genus {} species {}", g, s),
                rank::SPECIES,
                Some(genus_id.clone()),
            ));
        }
    }
    Arc::new(InMemoryRecordStore::new(records))
}

fn overrides() -> Vec<HierarchyOverride> {
    (0..GENERA)
        .step_by(10)
        .map(|g| HierarchyOverride::new(format!("G{}S0", g), Some("G0".to_string())))
        .collect()
}

fn bench_resolver(c: &mut Criterion) {
    let store = synthetic_dataset();

    c.bench_function("resolver_build_10k", |b| {
        b.iter(|| HierarchyResolver::new(black_box(store.clone()), overrides()))
    });

    let resolver = HierarchyResolver::new(store.clone(), overrides());
    c.bench_function("children_of_genus", |b| {
        b.iter(|| resolver.children(black_box(Some("G0"))))
    });
    c.bench_function("children_of_root", |b| {
        b.iter(|| resolver.children(black_box(None)))
    });
}

fn bench_validate(c: &mut Criterion) {
    let store = synthetic_dataset();
    let resolver = HierarchyResolver::new(store.clone(), overrides());
    let (Some(species), Some(genus), Some(order)) = (
        store.get_by_key("G150S7"),
        store.get_by_key("G3"),
        store.get_by_key("O"),
    ) else {
        panic!("synthetic dataset is missing expected ids");
    };

    c.bench_function("validate_species_under_genus", |b| {
        b.iter(|| validate(black_box(species.as_ref()), Some(genus.as_ref()), resolver.parent_map()))
    });
    c.bench_function("validate_rank_violation", |b| {
        b.iter(|| validate(black_box(order.as_ref()), Some(genus.as_ref()), resolver.parent_map()))
    });
}

criterion_group!(benches, bench_resolver, bench_validate);
criterion_main!(benches);
