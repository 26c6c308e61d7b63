//! # noesis
//!
//! A cognitive knowledge substrate combining a typed hypergraph store,
//! economic attention allocation, and probabilistic inference, hosted by a
//! plugin scheduler for periodic cognitive jobs.
//!
//! ## Architecture
//!
//! - **Atom model** (`atom`, `types`): immutable identity, mutable truth and
//!   attention values, a closed atom-type enumeration
//! - **Atom space** (`space`): multi-indexed storage of nodes and links with
//!   incoming sets, an attentional-focus set, and pattern queries
//! - **ECAN** (`ecan`): per-cycle rent, decay, importance spreading, focus
//!   update, forgetting, and Hebbian link maintenance over a conserved STI pool
//! - **PLN** (`pln`): rule-based probabilistic inference deriving new weighted
//!   edges from implication and evaluation structures
//! - **Scheduler** (`scheduler`): priority job queue with bounded concurrency,
//!   timeouts, retries, and a plugin registry
//!
//! ## Library usage
//!
//! ```no_run
//! use noesis::engine::{Engine, EngineConfig};
//! use noesis::types::AtomType;
//!
//! # fn main() -> noesis::error::NoesisResult<()> {
//! let engine = Engine::new(EngineConfig::default())?;
//! let space = engine.space();
//! let sun = space.add_node(AtomType::ConceptNode, Some("Sun"), None)?;
//! let star = space.add_node(AtomType::ConceptNode, Some("Star"), None)?;
//! space.add_link(AtomType::InheritanceLink, vec![sun.id, star.id], None)?;
//! # Ok(())
//! # }
//! ```

pub mod atom;
pub mod ecan;
pub mod encode;
pub mod engine;
pub mod error;
pub mod pln;
pub mod scheduler;
pub mod space;
pub mod types;
