//! PLN: the probabilistic inference engine.
//!
//! Holds a deterministic registry of inference rules and applies them over
//! the space's edges. Conclusion edges are written back through the
//! structural de-duplication path; the configured [`ConclusionMode`] decides
//! whether a pre-existing conclusion's truth value is overwritten or merged
//! with the revision formula.

pub mod formulas;
pub mod rules;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::atom::{AtomId, TruthValue};
use crate::error::{NoesisResult, PlnError};
use crate::space::AtomSpace;

use self::rules::{Conclusion, RuleRegistry};

/// How a conclusion lands on a pre-existing identical edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConclusionMode {
    /// The freshly computed truth value replaces the stored one.
    #[default]
    Overwrite,
    /// The stored and computed truth values merge via the revision formula.
    Revise,
}

/// Tunables for the inference engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlnConfig {
    /// Minimum confidence for a conclusion to be accepted.
    pub min_confidence: f64,
    /// Minimum strength for a conclusion to be accepted.
    pub strength_threshold: f64,
    /// Reserved for chained backward inference.
    pub max_inference_depth: usize,
    /// Confidence inflation applied by the revision formula.
    pub revision_inflation_factor: f64,
    /// Strength assigned to knowledge added without an explicit truth value.
    pub default_strength: f64,
    /// Confidence assigned to knowledge added without an explicit truth value.
    pub default_confidence: f64,
    /// Behaviour when a conclusion edge already exists.
    pub conclusion_mode: ConclusionMode,
}

impl Default for PlnConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.01,
            strength_threshold: 0.1,
            max_inference_depth: 5,
            revision_inflation_factor: 1.2,
            default_strength: 0.8,
            default_confidence: 0.5,
            conclusion_mode: ConclusionMode::Overwrite,
        }
    }
}

impl PlnConfig {
    fn validate(&self) -> Result<(), PlnError> {
        for (name, value) in [
            ("min_confidence", self.min_confidence),
            ("strength_threshold", self.strength_threshold),
            ("default_strength", self.default_strength),
            ("default_confidence", self.default_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PlnError::InvalidConfig {
                    message: format!("{name} ({value}) must lie in [0, 1]"),
                });
            }
        }
        if self.revision_inflation_factor < 1.0 {
            return Err(PlnError::InvalidConfig {
                message: format!(
                    "revision_inflation_factor ({}) must be at least 1",
                    self.revision_inflation_factor
                ),
            });
        }
        Ok(())
    }
}

/// One accepted inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRecord {
    /// Name of the rule that produced the conclusion.
    pub rule: String,
    /// The conclusion edge.
    pub conclusion: AtomId,
    /// The truth value stored on the conclusion after write-back.
    pub tv: TruthValue,
    /// Whether the conclusion edge was newly created.
    pub created: bool,
}

/// Result of an inference run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRun {
    /// Every inference that created an edge or changed a truth value.
    pub results: Vec<InferenceRecord>,
    /// Iterations executed (stops early once an iteration adds nothing).
    pub iterations: usize,
    /// Total accepted inferences across all iterations.
    pub total_inferences: usize,
}

/// The inference engine.
pub struct PlnEngine {
    space: Arc<AtomSpace>,
    config: PlnConfig,
    registry: RuleRegistry,
}

impl PlnEngine {
    /// Create an engine over the shared space with the built-in rules.
    pub fn new(space: Arc<AtomSpace>, config: PlnConfig) -> NoesisResult<Self> {
        Self::with_registry(space, config, RuleRegistry::with_builtin_rules())
    }

    /// Create an engine with a custom rule registry.
    pub fn with_registry(
        space: Arc<AtomSpace>,
        config: PlnConfig,
        registry: RuleRegistry,
    ) -> NoesisResult<Self> {
        config.validate()?;
        Ok(Self {
            space,
            config,
            registry,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &PlnConfig {
        &self.config
    }

    /// The rule registry.
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Run up to `max_iterations` passes over the rule registry.
    ///
    /// Each pass enumerates, per rule, all ordered premise pairs of the
    /// rule's premise types in insertion order, applies the formula, and
    /// writes accepted conclusions back into the space. A pass that neither
    /// creates an edge nor changes a truth value ends the run early.
    pub fn infer(&self, max_iterations: usize) -> InferenceRun {
        let mut results = Vec::new();
        let mut iterations = 0;

        for _ in 0..max_iterations {
            iterations += 1;
            let fresh = self.run_iteration(&mut results);
            tracing::debug!(iteration = iterations, fresh, "pln iteration complete");
            if fresh == 0 {
                break;
            }
        }

        InferenceRun {
            total_inferences: results.len(),
            results,
            iterations,
        }
    }

    fn run_iteration(&self, results: &mut Vec<InferenceRecord>) -> usize {
        // Premises are the edges present when the iteration starts; edges a
        // rule writes back become premises in the next iteration, not this
        // one. Each type's candidate list is snapshotted once, in insertion
        // order.
        let mut premises: std::collections::HashMap<crate::types::AtomType, Vec<crate::atom::Atom>> =
            std::collections::HashMap::new();
        for rule in self.registry.rules() {
            let (first_type, second_type) = rule.premise_types();
            for ty in [first_type, second_type] {
                premises
                    .entry(ty)
                    .or_insert_with(|| self.space.by_type(ty));
            }
        }

        let mut fresh = 0;
        for rule in self.registry.rules() {
            let (first_type, second_type) = rule.premise_types();
            let firsts = premises.get(&first_type).cloned().unwrap_or_default();
            let seconds = if second_type == first_type {
                firsts.clone()
            } else {
                premises.get(&second_type).cloned().unwrap_or_default()
            };

            for first in &firsts {
                for second in &seconds {
                    if first.id == second.id {
                        continue;
                    }
                    let Some(conclusion) = rule.apply(&self.space, first, second, &self.config)
                    else {
                        continue;
                    };
                    if conclusion.tv.confidence < self.config.min_confidence
                        || conclusion.tv.strength < self.config.strength_threshold
                    {
                        continue;
                    }
                    if let Some(record) = self.commit(rule.name(), conclusion) {
                        results.push(record);
                        fresh += 1;
                    }
                }
            }
        }
        fresh
    }

    /// Write a conclusion into the space. Returns a record when the write
    /// created the edge or changed its truth value.
    fn commit(&self, rule: &'static str, conclusion: Conclusion) -> Option<InferenceRecord> {
        let existing = self
            .space
            .find_link(conclusion.atom_type, &conclusion.outgoing);

        let (stored_tv, created) = match (&existing, self.config.conclusion_mode) {
            (Some(prior), ConclusionMode::Revise) => {
                let merged = formulas::revise(
                    prior.tv,
                    conclusion.tv,
                    self.config.revision_inflation_factor,
                );
                (merged, false)
            }
            (Some(_), ConclusionMode::Overwrite) => (conclusion.tv, false),
            (None, _) => (conclusion.tv, true),
        };

        if let Some(prior) = &existing {
            if prior.tv.approx_eq(&stored_tv, 1e-9) {
                return None;
            }
        }

        let atom = match self.space.add_link(
            conclusion.atom_type,
            conclusion.outgoing,
            Some(stored_tv),
        ) {
            Ok(atom) => atom,
            Err(err) => {
                // A premise vanished between enumeration and write-back;
                // skip the candidate and keep the run alive.
                tracing::debug!(rule, error = %err, "skipping inference candidate");
                return None;
            }
        };

        Some(InferenceRecord {
            rule: rule.to_string(),
            conclusion: atom.id,
            tv: stored_tv,
            created,
        })
    }

    /// Merge a truth value into a live atom with the revision formula.
    pub fn revise(&self, id: AtomId, incoming: TruthValue) -> NoesisResult<TruthValue> {
        let atom = self
            .space
            .get(id)
            .ok_or(PlnError::TargetNotFound { id: id.get() })?;
        let merged = formulas::revise(atom.tv, incoming, self.config.revision_inflation_factor);
        self.space.set_truth(id, merged).map_err(|_| PlnError::TargetNotFound { id: id.get() })?;
        Ok(merged)
    }
}

impl std::fmt::Debug for PlnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlnEngine")
            .field("rules", &self.registry)
            .field("mode", &self.config.conclusion_mode)
            .finish()
    }
}
