//! Knowledge encoding: categorical knowledge kinds → atom constructions.
//!
//! Clients hand over structured knowledge (a tagged variant); each kind maps
//! to a fixed atom construction over the space. Free-text parsing is the
//! caller's problem — a fact arrives as a triple, never as a sentence.

use serde::{Deserialize, Serialize};

use crate::atom::{Atom, TruthValue};
use crate::error::SpaceResult;
use crate::space::AtomSpace;
use crate::types::AtomType;

/// Which memory store a memory entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Episodic,
    Semantic,
    Working,
}

impl MemoryKind {
    fn node_type(self) -> AtomType {
        match self {
            MemoryKind::Episodic => AtomType::EpisodicMemoryNode,
            MemoryKind::Semantic => AtomType::SemanticMemoryNode,
            MemoryKind::Working => AtomType::WorkingMemoryNode,
        }
    }
}

/// Structured knowledge accepted by the encoding layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Knowledge {
    /// A bare concept.
    Concept { name: String },
    /// A subject–predicate–object assertion.
    Fact {
        subject: String,
        predicate: String,
        object: String,
    },
    /// An antecedent → consequent rule between concepts.
    Rule {
        antecedent: String,
        consequent: String,
    },
    /// A goal, optionally with an initial urgency (STI).
    Goal {
        name: String,
        #[serde(default)]
        urgency: Option<i64>,
    },
    /// A named procedure with ordered action steps.
    Procedure { name: String, steps: Vec<String> },
    /// A memory entry in one of the three memory stores.
    Memory {
        #[serde(rename = "memory_kind")]
        kind: MemoryKind,
        content: String,
    },
}

/// Encode knowledge into the space. Returns the anchoring atom.
///
/// Constructions:
/// - concept → `ConceptNode(name)`
/// - fact → `EvaluationLink(PredicateNode, ListLink(subject, object))`
/// - rule → `ImplicationLink(antecedent, consequent)`
/// - goal → `GoalNode(name)`, urgency lands as initial STI
/// - procedure → `ExecutionLink(ProcedureNode, SequentialLink(actions…))`
/// - memory → the matching memory-kind node
pub fn encode(space: &AtomSpace, knowledge: &Knowledge, tv: TruthValue) -> SpaceResult<Atom> {
    match knowledge {
        Knowledge::Concept { name } => space.add_node(AtomType::ConceptNode, Some(name), Some(tv)),

        Knowledge::Fact {
            subject,
            predicate,
            object,
        } => {
            let predicate = space.add_node(AtomType::PredicateNode, Some(predicate), None)?;
            let subject = space.add_node(AtomType::ConceptNode, Some(subject), None)?;
            let object = space.add_node(AtomType::ConceptNode, Some(object), None)?;
            let args = space.add_link(AtomType::ListLink, vec![subject.id, object.id], None)?;
            space.add_link(
                AtomType::EvaluationLink,
                vec![predicate.id, args.id],
                Some(tv),
            )
        }

        Knowledge::Rule {
            antecedent,
            consequent,
        } => {
            let antecedent = space.add_node(AtomType::ConceptNode, Some(antecedent), None)?;
            let consequent = space.add_node(AtomType::ConceptNode, Some(consequent), None)?;
            space.add_link(
                AtomType::ImplicationLink,
                vec![antecedent.id, consequent.id],
                Some(tv),
            )
        }

        Knowledge::Goal { name, urgency } => {
            let goal = space.add_node(AtomType::GoalNode, Some(name), Some(tv))?;
            if let Some(urgency) = urgency {
                space.update_attention(goal.id, |av| av.sti = *urgency);
            }
            space.get(goal.id).ok_or(crate::error::SpaceError::NotFound {
                id: goal.id.get(),
            })
        }

        Knowledge::Procedure { name, steps } => {
            let procedure = space.add_node(AtomType::ProcedureNode, Some(name), Some(tv))?;
            if steps.is_empty() {
                return Ok(procedure);
            }
            let mut actions = Vec::with_capacity(steps.len());
            for step in steps {
                let action = space.add_node(AtomType::ActionNode, Some(step), None)?;
                actions.push(action.id);
            }
            let sequence = space.add_link(AtomType::SequentialLink, actions, None)?;
            space.add_link(
                AtomType::ExecutionLink,
                vec![procedure.id, sequence.id],
                None,
            )?;
            Ok(procedure)
        }

        Knowledge::Memory { kind, content } => {
            space.add_node(kind.node_type(), Some(content), Some(tv))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv() -> TruthValue {
        TruthValue::new(0.8, 0.5)
    }

    #[test]
    fn concept_is_a_single_node() {
        let space = AtomSpace::new();
        let atom = encode(
            &space,
            &Knowledge::Concept { name: "sky".into() },
            tv(),
        )
        .unwrap();
        assert_eq!(atom.atom_type, AtomType::ConceptNode);
        assert_eq!(atom.tv, tv());
        assert_eq!(space.size(), 1);
    }

    #[test]
    fn fact_builds_evaluation_over_list() {
        let space = AtomSpace::new();
        let atom = encode(
            &space,
            &Knowledge::Fact {
                subject: "sky".into(),
                predicate: "has-color".into(),
                object: "blue".into(),
            },
            tv(),
        )
        .unwrap();

        assert_eq!(atom.atom_type, AtomType::EvaluationLink);
        assert_eq!(atom.tv, tv());
        // predicate + 2 concepts + list + evaluation
        assert_eq!(space.size(), 5);

        let predicate = space.get(atom.outgoing[0]).unwrap();
        assert_eq!(predicate.atom_type, AtomType::PredicateNode);
        assert_eq!(predicate.name.as_deref(), Some("has-color"));

        let args = space.get(atom.outgoing[1]).unwrap();
        assert_eq!(args.atom_type, AtomType::ListLink);
        assert_eq!(args.arity(), 2);
    }

    #[test]
    fn repeated_facts_reuse_structure() {
        let space = AtomSpace::new();
        let fact = Knowledge::Fact {
            subject: "sky".into(),
            predicate: "has-color".into(),
            object: "blue".into(),
        };
        let first = encode(&space, &fact, tv()).unwrap();
        let second = encode(&space, &fact, TruthValue::new(0.9, 0.9)).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(space.size(), 5);
        // Last writer's truth value wins.
        assert_eq!(second.tv, TruthValue::new(0.9, 0.9));
    }

    #[test]
    fn rule_is_an_implication() {
        let space = AtomSpace::new();
        let atom = encode(
            &space,
            &Knowledge::Rule {
                antecedent: "rain".into(),
                consequent: "wet-ground".into(),
            },
            tv(),
        )
        .unwrap();
        assert_eq!(atom.atom_type, AtomType::ImplicationLink);
        assert_eq!(atom.arity(), 2);
    }

    #[test]
    fn goal_urgency_becomes_sti() {
        let space = AtomSpace::new();
        let atom = encode(
            &space,
            &Knowledge::Goal {
                name: "learn".into(),
                urgency: Some(75),
            },
            tv(),
        )
        .unwrap();
        assert_eq!(atom.atom_type, AtomType::GoalNode);
        assert_eq!(atom.av.sti, 75);
    }

    #[test]
    fn procedure_builds_sequence_of_actions() {
        let space = AtomSpace::new();
        let atom = encode(
            &space,
            &Knowledge::Procedure {
                name: "brew-tea".into(),
                steps: vec!["boil".into(), "steep".into(), "pour".into()],
            },
            tv(),
        )
        .unwrap();
        assert_eq!(atom.atom_type, AtomType::ProcedureNode);

        let sequences = space.by_type(AtomType::SequentialLink);
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].arity(), 3);

        let executions = space.by_type(AtomType::ExecutionLink);
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].outgoing[0], atom.id);
    }

    #[test]
    fn memory_kinds_map_to_memory_nodes() {
        let space = AtomSpace::new();
        for (kind, expected) in [
            (MemoryKind::Episodic, AtomType::EpisodicMemoryNode),
            (MemoryKind::Semantic, AtomType::SemanticMemoryNode),
            (MemoryKind::Working, AtomType::WorkingMemoryNode),
        ] {
            let atom = encode(
                &space,
                &Knowledge::Memory {
                    kind,
                    content: format!("{kind:?}"),
                },
                tv(),
            )
            .unwrap();
            assert_eq!(atom.atom_type, expected);
        }
    }

    #[test]
    fn knowledge_deserializes_from_tagged_json() {
        let fact: Knowledge = serde_json::from_str(
            r#"{"kind":"fact","subject":"sky","predicate":"has-color","object":"blue"}"#,
        )
        .unwrap();
        assert!(matches!(fact, Knowledge::Fact { .. }));

        let goal: Knowledge =
            serde_json::from_str(r#"{"kind":"goal","name":"learn","urgency":10}"#).unwrap();
        assert!(matches!(goal, Knowledge::Goal { urgency: Some(10), .. }));
    }
}
