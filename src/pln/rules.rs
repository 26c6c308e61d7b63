//! The inference-rule registry.
//!
//! Every rule names the edge types of its two premises and produces a
//! conclusion edge with a computed truth value. Registration order is the
//! iteration order of an inference run, so the registry is deterministic.

use crate::atom::{Atom, AtomId, TruthValue};
use crate::space::AtomSpace;
use crate::types::AtomType;

use super::formulas;
use super::PlnConfig;

/// A conclusion edge proposed by a rule.
#[derive(Debug, Clone)]
pub struct Conclusion {
    /// Link type of the conclusion edge.
    pub atom_type: AtomType,
    /// Outgoing sequence of the conclusion edge.
    pub outgoing: Vec<AtomId>,
    /// Computed truth value.
    pub tv: TruthValue,
}

/// A premise-pattern + formula pair.
///
/// `apply` receives an ordered premise pair already filtered to the rule's
/// `premise_types`; it returns `None` when the pair does not match the
/// rule's structural pattern.
pub trait InferenceRule: Send + Sync {
    /// Stable rule name, used in inference records.
    fn name(&self) -> &'static str;

    /// Edge types of the first and second premise.
    fn premise_types(&self) -> (AtomType, AtomType);

    /// Try to derive a conclusion from an ordered premise pair.
    fn apply(
        &self,
        space: &AtomSpace,
        first: &Atom,
        second: &Atom,
        config: &PlnConfig,
    ) -> Option<Conclusion>;
}

/// Middle-term equality: same atom id, or `(type, name)` equality for nodes.
fn same_term(space: &AtomSpace, x: AtomId, y: AtomId) -> bool {
    if x == y {
        return true;
    }
    match (space.get(x), space.get(y)) {
        (Some(a), Some(b)) => {
            a.is_node() && b.is_node() && a.atom_type == b.atom_type && a.name == b.name
        }
        _ => false,
    }
}

fn distinct_terms(space: &AtomSpace, terms: &[AtomId]) -> bool {
    for (i, &x) in terms.iter().enumerate() {
        for &y in &terms[i + 1..] {
            if same_term(space, x, y) {
                return false;
            }
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

/// `A→B`, `B→C` ⊢ `A→C`.
pub struct DeductionRule;

impl InferenceRule for DeductionRule {
    fn name(&self) -> &'static str {
        "deduction"
    }

    fn premise_types(&self) -> (AtomType, AtomType) {
        (AtomType::ImplicationLink, AtomType::ImplicationLink)
    }

    fn apply(
        &self,
        space: &AtomSpace,
        first: &Atom,
        second: &Atom,
        _config: &PlnConfig,
    ) -> Option<Conclusion> {
        let &[a, b] = first.outgoing.as_slice() else { return None };
        let &[b2, c] = second.outgoing.as_slice() else { return None };
        if !same_term(space, b, b2) || !distinct_terms(space, &[a, b, c]) {
            return None;
        }
        Some(Conclusion {
            atom_type: AtomType::ImplicationLink,
            outgoing: vec![a, c],
            tv: formulas::deduction(first.tv, second.tv),
        })
    }
}

/// `A→B`, `A→C` ⊢ `C→B`.
pub struct InductionRule;

impl InferenceRule for InductionRule {
    fn name(&self) -> &'static str {
        "induction"
    }

    fn premise_types(&self) -> (AtomType, AtomType) {
        (AtomType::ImplicationLink, AtomType::ImplicationLink)
    }

    fn apply(
        &self,
        space: &AtomSpace,
        first: &Atom,
        second: &Atom,
        _config: &PlnConfig,
    ) -> Option<Conclusion> {
        let &[a, b] = first.outgoing.as_slice() else { return None };
        let &[a2, c] = second.outgoing.as_slice() else { return None };
        if !same_term(space, a, a2) || !distinct_terms(space, &[a, b, c]) {
            return None;
        }
        Some(Conclusion {
            atom_type: AtomType::ImplicationLink,
            outgoing: vec![c, b],
            tv: formulas::induction(first.tv, second.tv),
        })
    }
}

/// `A→B`, `C→B` ⊢ `A→C`.
pub struct AbductionRule;

impl InferenceRule for AbductionRule {
    fn name(&self) -> &'static str {
        "abduction"
    }

    fn premise_types(&self) -> (AtomType, AtomType) {
        (AtomType::ImplicationLink, AtomType::ImplicationLink)
    }

    fn apply(
        &self,
        space: &AtomSpace,
        first: &Atom,
        second: &Atom,
        _config: &PlnConfig,
    ) -> Option<Conclusion> {
        let &[a, b] = first.outgoing.as_slice() else { return None };
        let &[c, b2] = second.outgoing.as_slice() else { return None };
        if !same_term(space, b, b2) || !distinct_terms(space, &[a, b, c]) {
            return None;
        }
        Some(Conclusion {
            atom_type: AtomType::ImplicationLink,
            outgoing: vec![a, c],
            tv: formulas::abduction(first.tv, second.tv),
        })
    }
}

/// `A→B` plus an evaluation asserting `A` ⊢ an evaluation asserting `B`.
///
/// The asserting evaluation must carry `strength > 0.5` and at least the
/// configured minimum confidence. The conclusion keeps the premise
/// evaluation's remaining arguments, with the asserted term replaced.
pub struct ModusPonensRule;

impl InferenceRule for ModusPonensRule {
    fn name(&self) -> &'static str {
        "modus_ponens"
    }

    fn premise_types(&self) -> (AtomType, AtomType) {
        (AtomType::ImplicationLink, AtomType::EvaluationLink)
    }

    fn apply(
        &self,
        space: &AtomSpace,
        first: &Atom,
        second: &Atom,
        config: &PlnConfig,
    ) -> Option<Conclusion> {
        let &[a, b] = first.outgoing.as_slice() else { return None };
        let &asserted = second.outgoing.first()?;
        if !same_term(space, asserted, a) || same_term(space, a, b) {
            return None;
        }
        if second.tv.strength <= 0.5 || second.tv.confidence < config.min_confidence {
            return None;
        }
        let mut outgoing = vec![b];
        outgoing.extend_from_slice(&second.outgoing[1..]);
        Some(Conclusion {
            atom_type: AtomType::EvaluationLink,
            outgoing,
            tv: formulas::modus_ponens(first.tv, second.tv),
        })
    }
}

/// Two truth values for the same statement merge into one.
///
/// Structural de-duplication means two live atoms never share a statement,
/// so pair enumeration cannot fire this rule; its formula is applied through
/// the engine's revise path instead (see `ConclusionMode::Revise`).
pub struct RevisionRule;

impl InferenceRule for RevisionRule {
    fn name(&self) -> &'static str {
        "revision"
    }

    fn premise_types(&self) -> (AtomType, AtomType) {
        (AtomType::ImplicationLink, AtomType::ImplicationLink)
    }

    fn apply(
        &self,
        space: &AtomSpace,
        first: &Atom,
        second: &Atom,
        config: &PlnConfig,
    ) -> Option<Conclusion> {
        if first.id == second.id
            || first.atom_type != second.atom_type
            || first.outgoing.len() != second.outgoing.len()
        {
            return None;
        }
        let same_statement = first
            .outgoing
            .iter()
            .zip(&second.outgoing)
            .all(|(&x, &y)| same_term(space, x, y));
        if !same_statement {
            return None;
        }
        Some(Conclusion {
            atom_type: first.atom_type,
            outgoing: first.outgoing.clone(),
            tv: formulas::revise(first.tv, second.tv, config.revision_inflation_factor),
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered collection of inference rules.
pub struct RuleRegistry {
    rules: Vec<Box<dyn InferenceRule>>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The registry pre-loaded with the five built-in rules, in canonical
    /// order: deduction, induction, abduction, modus ponens, revision.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DeductionRule));
        registry.register(Box::new(InductionRule));
        registry.register(Box::new(AbductionRule));
        registry.register(Box::new(ModusPonensRule));
        registry.register(Box::new(RevisionRule));
        registry
    }

    /// Append a rule; it runs after everything already registered.
    pub fn register(&mut self, rule: Box<dyn InferenceRule>) {
        self.rules.push(rule);
    }

    /// Rules in registration order.
    pub fn rules(&self) -> &[Box<dyn InferenceRule>] {
        &self.rules
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::with_builtin_rules()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.name()))
            .finish()
    }
}
