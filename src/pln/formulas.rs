//! Truth-value formulas for the built-in inference rules.
//!
//! Pure functions over `(strength, confidence)` pairs. Premise order matters:
//! the first argument is always the rule's first premise.

use crate::atom::TruthValue;

/// Deduction: `A→B (s₁,c₁)`, `B→C (s₂,c₂)` ⊢ `A→C`.
///
/// Strength `s₁·s₂`; confidence `c₁·c₂·(1 − s₁ + s₁·s₂)`.
pub fn deduction(ab: TruthValue, bc: TruthValue) -> TruthValue {
    let s = ab.strength * bc.strength;
    let c = ab.confidence * bc.confidence * (1.0 - ab.strength + ab.strength * bc.strength);
    TruthValue::new(s, c)
}

/// Induction: `A→B (s₁,c₁)`, `A→C (s₂,c₂)` ⊢ `C→B`.
///
/// Strength `s₂`; confidence `c₁·c₂·s₁`.
pub fn induction(ab: TruthValue, ac: TruthValue) -> TruthValue {
    TruthValue::new(ac.strength, ab.confidence * ac.confidence * ab.strength)
}

/// Abduction: `A→B (s₁,c₁)`, `C→B (s₂,c₂)` ⊢ `A→C`.
///
/// Strength `s₁·s₂`; confidence `c₁·c₂`.
pub fn abduction(ab: TruthValue, cb: TruthValue) -> TruthValue {
    TruthValue::new(
        ab.strength * cb.strength,
        ab.confidence * cb.confidence,
    )
}

/// Modus ponens: `A→B (s₁,c₁)`, `A (s₂,c₂)` ⊢ `B`.
///
/// Strength `s₁·s₂`; confidence `c₁·c₂`.
pub fn modus_ponens(implication: TruthValue, antecedent: TruthValue) -> TruthValue {
    TruthValue::new(
        implication.strength * antecedent.strength,
        implication.confidence * antecedent.confidence,
    )
}

/// Revision: merge two truth values for the same statement.
///
/// Strength `(s₁c₁ + s₂c₂ − s₁s₂c₁c₂) / (c₁ + c₂ − c₁c₂)`; confidence
/// `(c₁ + c₂ − c₁c₂)·inflation`, clamped to 1. Symmetric in its premises.
/// Two vacuous inputs yield a vacuous mean.
pub fn revise(tv1: TruthValue, tv2: TruthValue, inflation: f64) -> TruthValue {
    let (s1, c1) = (tv1.strength, tv1.confidence);
    let (s2, c2) = (tv2.strength, tv2.confidence);
    let denom = c1 + c2 - c1 * c2;
    if denom <= f64::EPSILON {
        return TruthValue::new(0.5 * (s1 + s2), 0.0);
    }
    let s = (s1 * c1 + s2 * c2 - s1 * s2 * c1 * c2) / denom;
    let c = denom * inflation;
    TruthValue::new(s, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn deduction_matches_worked_example() {
        // (0.9, 0.8) chained with (0.7, 0.6).
        let tv = deduction(TruthValue::new(0.9, 0.8), TruthValue::new(0.7, 0.6));
        assert!((tv.strength - 0.63).abs() < EPS);
        // 0.8 * 0.6 * (1 - 0.9 + 0.63) = 0.48 * 0.73 = 0.3504
        assert!((tv.confidence - 0.3504).abs() < EPS);
    }

    #[test]
    fn deduction_confidence_monotone_in_premise_confidence() {
        let base = deduction(TruthValue::new(0.9, 0.5), TruthValue::new(0.7, 0.5));
        let better = deduction(TruthValue::new(0.9, 0.8), TruthValue::new(0.7, 0.9));
        assert!(better.confidence >= base.confidence);
    }

    #[test]
    fn induction_formula() {
        let tv = induction(TruthValue::new(0.8, 0.9), TruthValue::new(0.6, 0.5));
        assert!((tv.strength - 0.6).abs() < EPS);
        assert!((tv.confidence - 0.9 * 0.5 * 0.8).abs() < EPS);
    }

    #[test]
    fn abduction_formula() {
        let tv = abduction(TruthValue::new(0.8, 0.9), TruthValue::new(0.6, 0.5));
        assert!((tv.strength - 0.48).abs() < EPS);
        assert!((tv.confidence - 0.45).abs() < EPS);
    }

    #[test]
    fn modus_ponens_formula() {
        let tv = modus_ponens(TruthValue::new(0.9, 0.8), TruthValue::new(0.7, 0.6));
        assert!((tv.strength - 0.63).abs() < EPS);
        assert!((tv.confidence - 0.48).abs() < EPS);
    }

    #[test]
    fn revision_is_symmetric() {
        let a = TruthValue::new(0.9, 0.3);
        let b = TruthValue::new(0.2, 0.7);
        let ab = revise(a, b, 1.2);
        let ba = revise(b, a, 1.2);
        assert!(ab.approx_eq(&ba, EPS));
    }

    #[test]
    fn revision_confidence_clamps_at_one() {
        let a = TruthValue::new(0.9, 0.9);
        let b = TruthValue::new(0.8, 0.9);
        let tv = revise(a, b, 1.2);
        assert_eq!(tv.confidence, 1.0);
        assert!(tv.strength > 0.8 && tv.strength <= 0.9);
    }

    #[test]
    fn revision_of_vacuous_inputs_is_vacuous() {
        let tv = revise(TruthValue::new(0.2, 0.0), TruthValue::new(0.8, 0.0), 1.2);
        assert!(tv.is_vacuous());
        assert!((tv.strength - 0.5).abs() < EPS);
    }
}
