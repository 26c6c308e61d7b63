//! Benchmarks for the core hot paths: space insertion, ECAN cycles, and PLN
//! iterations.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use noesis::atom::TruthValue;
use noesis::ecan::{EcanConfig, EcanEngine};
use noesis::pln::{PlnConfig, PlnEngine};
use noesis::space::AtomSpace;
use noesis::types::AtomType;

fn populated_space(nodes: usize) -> Arc<AtomSpace> {
    let space = Arc::new(AtomSpace::new());
    let mut prev = None;
    for i in 0..nodes {
        let atom = space
            .add_node(AtomType::ConceptNode, Some(&format!("n{i}")), None)
            .unwrap();
        if let Some(prev) = prev {
            space
                .add_link(
                    AtomType::ImplicationLink,
                    vec![prev, atom.id],
                    Some(TruthValue::new(0.8, 0.7)),
                )
                .unwrap();
        }
        prev = Some(atom.id);
    }
    space
}

fn bench_add_and_dedup(c: &mut Criterion) {
    c.bench_function("add_node_dedup_1k", |bench| {
        bench.iter(|| {
            let space = AtomSpace::new();
            for i in 0..1000 {
                // Every other add hits the structural index.
                black_box(
                    space
                        .add_node(AtomType::ConceptNode, Some(&format!("n{}", i / 2)), None)
                        .unwrap(),
                );
            }
        })
    });
}

fn bench_ecan_cycle(c: &mut Criterion) {
    let space = populated_space(500);
    let ecan = EcanEngine::new(
        Arc::clone(&space),
        EcanConfig {
            rng_seed: Some(0),
            ..Default::default()
        },
    )
    .unwrap();
    for atom in space.all().iter().take(100) {
        ecan.stimulate(atom.id, 200).unwrap();
    }

    c.bench_function("ecan_cycle_500", |bench| {
        bench.iter(|| black_box(ecan.cycle()))
    });
}

fn bench_pln_iteration(c: &mut Criterion) {
    let space = populated_space(40);
    let pln = PlnEngine::new(Arc::clone(&space), PlnConfig::default()).unwrap();

    c.bench_function("pln_iteration_40", |bench| {
        bench.iter(|| black_box(pln.infer(1)))
    });
}

criterion_group!(benches, bench_add_and_dedup, bench_ecan_cycle, bench_pln_iteration);
criterion_main!(benches);
