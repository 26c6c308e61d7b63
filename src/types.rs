//! The closed atom-type enumeration.
//!
//! Exact string tags are part of the wire contract: serialization, import,
//! and the query layer all speak these tags verbatim. The enumeration is
//! closed — constructing an atom with an unknown tag is an error, never a
//! fallback.

use serde::{Deserialize, Serialize};

use crate::error::AtomError;

/// Whether a type tags a node (arity 0) or a link (arity >= 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Node,
    Link,
}

macro_rules! atom_types {
    (
        nodes { $($node:ident),+ $(,)? }
        links { $($link:ident),+ $(,)? }
    ) => {
        /// Canonical atom types.
        ///
        /// Variant names are the wire tags; serde round-trips them verbatim.
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum AtomType {
            $($node,)+
            $($link,)+
        }

        impl AtomType {
            /// The wire tag for this type.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(AtomType::$node => stringify!($node),)+
                    $(AtomType::$link => stringify!($link),)+
                }
            }

            /// Node or link classification.
            pub fn class(self) -> TypeClass {
                match self {
                    $(AtomType::$node => TypeClass::Node,)+
                    $(AtomType::$link => TypeClass::Link,)+
                }
            }

            /// All node types, in canonical order.
            pub const NODE_TYPES: &'static [AtomType] = &[$(AtomType::$node),+];

            /// All link types, in canonical order.
            pub const LINK_TYPES: &'static [AtomType] = &[$(AtomType::$link),+];
        }

        impl std::str::FromStr for AtomType {
            type Err = AtomError;

            fn from_str(tag: &str) -> Result<Self, Self::Err> {
                match tag {
                    $(stringify!($node) => Ok(AtomType::$node),)+
                    $(stringify!($link) => Ok(AtomType::$link),)+
                    _ => Err(AtomError::UnknownType { tag: tag.to_string() }),
                }
            }
        }
    };
}

atom_types! {
    nodes {
        ConceptNode,
        PredicateNode,
        SchemaNode,
        ProcedureNode,
        GroundedPredicateNode,
        GroundedSchemaNode,
        VariableNode,
        TypedVariableNode,
        NumberNode,
        WordNode,
        DocumentNode,
        SentenceNode,
        PhraseNode,
        AnchorNode,
        TypeNode,
        TypeInhNode,
        ContextNode,
        TimeNode,
        TemporalNode,
        GoalNode,
        PlanNode,
        ActionNode,
        TaskNode,
        AgentNode,
        CognitiveProcessNode,
        EpisodicMemoryNode,
        SemanticMemoryNode,
        WorkingMemoryNode,
        RewardNode,
        MotivationNode,
        PLNRuleNode,
        PLNFormulaNode,
        PatternNode,
    }
    links {
        ListLink,
        SetLink,
        MemberLink,
        InheritanceLink,
        SimilarityLink,
        SubsetLink,
        AndLink,
        OrLink,
        NotLink,
        ImplicationLink,
        EquivalenceLink,
        EvaluationLink,
        ExecutionLink,
        ForAllLink,
        ExistsLink,
        AtTimeLink,
        BeforeLink,
        AfterLink,
        DuringLink,
        AtLocationLink,
        ContextLink,
        BindLink,
        GetLink,
        SatisfyLink,
        PlusLink,
        MinusLink,
        TimesLink,
        DivideLink,
        CondLink,
        ReferenceLink,
        AssociativeLink,
        SequentialLink,
        HebbianLink,
        AsymmetricHebbianLink,
        SymmetricHebbianLink,
        AttentionLink,
        EconomicLink,
        PatternLink,
        FrequentPatternLink,
        LearningLink,
        FeedbackLink,
    }
}

impl AtomType {
    /// Whether this type tags a node.
    pub fn is_node(self) -> bool {
        self.class() == TypeClass::Node
    }

    /// Whether this type tags a link.
    pub fn is_link(self) -> bool {
        self.class() == TypeClass::Link
    }

    /// Whether this is one of the hebbian link variants maintained by ECAN.
    pub fn is_hebbian(self) -> bool {
        matches!(
            self,
            AtomType::HebbianLink
                | AtomType::AsymmetricHebbianLink
                | AtomType::SymmetricHebbianLink
        )
    }

    /// All types, nodes first, in canonical order.
    pub fn all() -> impl Iterator<Item = AtomType> {
        Self::NODE_TYPES
            .iter()
            .chain(Self::LINK_TYPES.iter())
            .copied()
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
