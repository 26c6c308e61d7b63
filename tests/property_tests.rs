//! Property-based tests for the noesis core.
//!
//! Uses proptest to check the invariants that must hold for all inputs, not
//! just hand-picked examples: structural de-duplication, incoming-set
//! consistency, focus bounds, STI bounds, and the formula properties.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use noesis::atom::{AtomId, TruthValue};
use noesis::ecan::{EcanConfig, EcanEngine};
use noesis::pln::formulas;
use noesis::space::AtomSpace;
use noesis::types::AtomType;

// ============================================================================
// Strategies
// ============================================================================

/// An arbitrary valid truth value.
fn arb_tv() -> impl Strategy<Value = TruthValue> {
    (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(s, c)| TruthValue::new(s, c))
}

/// A small alphabet of node names so collisions actually happen.
fn arb_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]).prop_map(str::to_string)
}

/// One mutation against the space.
#[derive(Debug, Clone)]
enum Op {
    AddNode(String),
    AddPair(String, String),
    RemoveNth(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_name().prop_map(Op::AddNode),
        (arb_name(), arb_name()).prop_map(|(a, b)| Op::AddPair(a, b)),
        (0usize..32).prop_map(Op::RemoveNth),
    ]
}

fn apply_ops(space: &AtomSpace, ops: &[Op]) {
    for op in ops {
        match op {
            Op::AddNode(name) => {
                space
                    .add_node(AtomType::ConceptNode, Some(name), None)
                    .unwrap();
            }
            Op::AddPair(a, b) => {
                let a = space
                    .add_node(AtomType::ConceptNode, Some(a), None)
                    .unwrap();
                let b = space
                    .add_node(AtomType::ConceptNode, Some(b), None)
                    .unwrap();
                space
                    .add_link(AtomType::ListLink, vec![a.id, b.id], None)
                    .unwrap();
            }
            Op::RemoveNth(n) => {
                let all = space.all();
                if !all.is_empty() {
                    space.remove(all[n % all.len()].id);
                }
            }
        }
    }
}

/// `B ∈ outgoing(A) ⇔ A ∈ incoming(B)` over the whole space.
fn incoming_sets_consistent(space: &AtomSpace) -> bool {
    let atoms = space.all();
    let live: HashSet<AtomId> = atoms.iter().map(|a| a.id).collect();
    for atom in &atoms {
        for &target in &atom.outgoing {
            if !live.contains(&target) {
                return false;
            }
            if !space.incoming_of(target).contains(&atom.id) {
                return false;
            }
        }
        for referer in space.incoming_of(atom.id) {
            match space.get(referer) {
                Some(link) if link.outgoing.contains(&atom.id) => {}
                _ => return false,
            }
        }
    }
    true
}

proptest! {
    /// Graph size equals the number of distinct structural keys added.
    #[test]
    fn size_equals_distinct_structural_keys(names in prop::collection::vec(arb_name(), 0..40)) {
        let space = AtomSpace::new();
        let mut distinct = HashSet::new();
        for name in &names {
            space.add_node(AtomType::ConceptNode, Some(name), None).unwrap();
            distinct.insert(name.clone());
        }
        prop_assert_eq!(space.size(), distinct.len());
    }

    /// Incoming sets stay consistent under arbitrary add/remove sequences.
    #[test]
    fn incoming_sets_consistent_under_mutation(ops in prop::collection::vec(arb_op(), 0..60)) {
        let space = AtomSpace::new();
        apply_ops(&space, &ops);
        prop_assert!(incoming_sets_consistent(&space));
    }

    /// Adding a node twice returns the same atom and leaves size unchanged.
    #[test]
    fn add_node_is_idempotent(name in arb_name(), tv in arb_tv()) {
        let space = AtomSpace::new();
        let first = space.add_node(AtomType::ConceptNode, Some(&name), Some(tv)).unwrap();
        let size = space.size();
        let second = space.add_node(AtomType::ConceptNode, Some(&name), None).unwrap();
        prop_assert_eq!(first.id, second.id);
        prop_assert_eq!(space.size(), size);
    }

    /// After a cycle the focus respects its bound and admission threshold.
    #[test]
    fn focus_bounded_after_cycle(
        stimulations in prop::collection::vec(0i64..2000, 1..30),
        max_af in 1usize..8,
    ) {
        let config = EcanConfig {
            max_af,
            rng_seed: Some(7),
            ..Default::default()
        };
        let space = Arc::new(AtomSpace::with_focus_capacity(max_af));
        let ecan = EcanEngine::new(Arc::clone(&space), config.clone()).unwrap();

        for (i, amount) in stimulations.iter().enumerate() {
            let atom = space
                .add_node(AtomType::ConceptNode, Some(&format!("n{i}")), None)
                .unwrap();
            ecan.stimulate(atom.id, *amount).unwrap();
        }
        ecan.cycle();

        let focus = space.focus();
        prop_assert!(focus.len() <= max_af);
        for member in &focus {
            prop_assert!(member.av.sti >= config.min_sti);
        }
    }

    /// STI stays inside [min_sti, max_sti] across ECAN operations.
    #[test]
    fn sti_bounded_after_ecan_operations(
        stimulations in prop::collection::vec(-5000i64..5000, 1..20),
        cycles in 1usize..4,
    ) {
        let config = EcanConfig {
            spread_probability: 1.0,
            rng_seed: Some(13),
            ..Default::default()
        };
        let space = Arc::new(AtomSpace::with_focus_capacity(config.max_af));
        let ecan = EcanEngine::new(Arc::clone(&space), config.clone()).unwrap();

        let mut prev: Option<AtomId> = None;
        for (i, amount) in stimulations.iter().enumerate() {
            let atom = space
                .add_node(AtomType::ConceptNode, Some(&format!("n{i}")), None)
                .unwrap();
            ecan.stimulate(atom.id, *amount).unwrap();
            if let Some(prev) = prev {
                space
                    .add_link(AtomType::AssociativeLink, vec![prev, atom.id], None)
                    .unwrap();
            }
            prev = Some(atom.id);
        }
        for _ in 0..cycles {
            ecan.cycle();
        }

        for atom in space.all() {
            prop_assert!(atom.av.sti >= config.min_sti);
            prop_assert!(atom.av.sti <= config.max_sti);
        }
    }

    /// Deduction confidence never decreases when premise confidences rise
    /// with strengths fixed.
    #[test]
    fn deduction_confidence_monotone(
        s1 in 0.0f64..=1.0,
        s2 in 0.0f64..=1.0,
        c1 in 0.0f64..=1.0,
        c2 in 0.0f64..=1.0,
        bump1 in 0.0f64..=1.0,
        bump2 in 0.0f64..=1.0,
    ) {
        let lo = formulas::deduction(TruthValue::new(s1, c1), TruthValue::new(s2, c2));
        let hi = formulas::deduction(
            TruthValue::new(s1, (c1 + bump1).min(1.0)),
            TruthValue::new(s2, (c2 + bump2).min(1.0)),
        );
        prop_assert!(hi.confidence >= lo.confidence - 1e-12);
    }

    /// Revision is symmetric up to floating tolerance.
    #[test]
    fn revision_symmetric(tv1 in arb_tv(), tv2 in arb_tv()) {
        let ab = formulas::revise(tv1, tv2, 1.2);
        let ba = formulas::revise(tv2, tv1, 1.2);
        prop_assert!(ab.approx_eq(&ba, 1e-9));
    }

    /// Truth values computed by any formula stay inside [0, 1]².
    #[test]
    fn formulas_stay_in_unit_square(tv1 in arb_tv(), tv2 in arb_tv()) {
        for tv in [
            formulas::deduction(tv1, tv2),
            formulas::induction(tv1, tv2),
            formulas::abduction(tv1, tv2),
            formulas::modus_ponens(tv1, tv2),
            formulas::revise(tv1, tv2, 1.2),
        ] {
            prop_assert!((0.0..=1.0).contains(&tv.strength));
            prop_assert!((0.0..=1.0).contains(&tv.confidence));
        }
    }
}
