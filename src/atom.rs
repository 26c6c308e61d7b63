//! Core atom types: identity, truth values, attention values.
//!
//! Atoms are the units of the substrate. Every node and link is identified by
//! an [`AtomId`] and carries a mutable [`TruthValue`] and [`AttentionValue`].
//! The [`AtomIdAllocator`] provides thread-safe id generation.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::AtomError;
use crate::types::AtomType;

/// Unique, niche-optimized identifier for an atom.
///
/// Uses `NonZeroU64` so that `Option<AtomId>` is the same size as `AtomId`
/// (the compiler uses 0 as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AtomId(NonZeroU64);

impl AtomId {
    /// Create an `AtomId` from a raw `u64`. Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(AtomId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atom:{}", self.0)
    }
}

/// Thread-safe atom id allocator.
///
/// Produces monotonically increasing ids starting from 1, so id order is
/// insertion order — the space's enumeration guarantees rely on this.
#[derive(Debug)]
pub struct AtomIdAllocator {
    next: AtomicU64,
}

impl AtomIdAllocator {
    /// Create a new allocator that starts from id 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Create an allocator that resumes from a given id.
    ///
    /// Used by import to continue past the highest reconstructed id.
    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.max(1)),
        }
    }

    /// Allocate the next atom id.
    pub fn next_id(&self) -> Result<AtomId, AtomError> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        AtomId::new(raw).ok_or(AtomError::AllocatorExhausted)
    }

    /// Bump the allocator so it will never hand out `id` or anything below it.
    pub fn reserve_through(&self, id: u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }

    /// The next id that *would* be allocated, without consuming it.
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for AtomIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Truth values
// ---------------------------------------------------------------------------

/// A `(strength, confidence)` pair, both clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    /// How strongly the statement holds.
    pub strength: f64,
    /// How much evidence backs the strength.
    pub confidence: f64,
}

impl TruthValue {
    /// Create a truth value, clamping both components to [0, 1].
    pub fn new(strength: f64, confidence: f64) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A truth value carrying no evidence.
    pub fn vacuous() -> Self {
        Self::new(0.5, 0.0)
    }

    /// Whether this truth value carries no evidence (`confidence == 0`).
    pub fn is_vacuous(&self) -> bool {
        self.confidence == 0.0
    }

    /// Approximate equality within `epsilon` on both components.
    pub fn approx_eq(&self, other: &TruthValue, epsilon: f64) -> bool {
        (self.strength - other.strength).abs() <= epsilon
            && (self.confidence - other.confidence).abs() <= epsilon
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self::vacuous()
    }
}

impl std::fmt::Display for TruthValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.strength, self.confidence)
    }
}

// ---------------------------------------------------------------------------
// Attention values
// ---------------------------------------------------------------------------

/// `(STI, LTI, VLTI)` — short-, long-, and very-long-term importance.
///
/// STI is signed and bounded by ECAN's `[min_sti, max_sti]`; LTI is
/// non-negative; VLTI is a sticky boolean protecting against forgetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttentionValue {
    /// Short-term importance.
    pub sti: i64,
    /// Long-term importance.
    pub lti: u64,
    /// Very-long-term importance flag; protects the atom from forgetting.
    pub vlti: bool,
}

impl AttentionValue {
    /// Create an attention value.
    pub fn new(sti: i64, lti: u64, vlti: bool) -> Self {
        Self { sti, lti, vlti }
    }
}

impl std::fmt::Display for AttentionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(sti:{}, lti:{}, vlti:{})", self.sti, self.lti, self.vlti)
    }
}

// ---------------------------------------------------------------------------
// Atoms
// ---------------------------------------------------------------------------

/// A node (arity 0, optional name) or a link (arity >= 1, ordered outgoing).
///
/// Type, name, and outgoing sequence are fixed at creation; only the truth
/// value, attention value, and side-map are mutable afterwards. Equality is
/// by id — structural identity is the space's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Unique identifier, assigned at creation.
    pub id: AtomId,
    /// Type tag from the closed enumeration.
    pub atom_type: AtomType,
    /// Node name; always `None` for links.
    pub name: Option<String>,
    /// Ordered outgoing references; always empty for nodes.
    pub outgoing: Vec<AtomId>,
    /// Truth value.
    pub tv: TruthValue,
    /// Attention value.
    pub av: AttentionValue,
    /// Opaque client annotations.
    #[serde(default)]
    pub values: HashMap<String, serde_json::Value>,
    /// Creation timestamp (seconds since UNIX epoch).
    pub created_at: u64,
}

impl Atom {
    /// Construct a node atom.
    pub(crate) fn node(id: AtomId, atom_type: AtomType, name: Option<String>, tv: TruthValue) -> Self {
        Self {
            id,
            atom_type,
            name,
            outgoing: Vec::new(),
            tv,
            av: AttentionValue::default(),
            values: HashMap::new(),
            created_at: now_secs(),
        }
    }

    /// Construct a link atom.
    pub(crate) fn link(id: AtomId, atom_type: AtomType, outgoing: Vec<AtomId>, tv: TruthValue) -> Self {
        Self {
            id,
            atom_type,
            name: None,
            outgoing,
            tv,
            av: AttentionValue::default(),
            values: HashMap::new(),
            created_at: now_secs(),
        }
    }

    /// Whether this atom is a node.
    pub fn is_node(&self) -> bool {
        self.atom_type.is_node()
    }

    /// Whether this atom is a link.
    pub fn is_link(&self) -> bool {
        self.atom_type.is_link()
    }

    /// The link arity (0 for nodes).
    pub fn arity(&self) -> usize {
        self.outgoing.len()
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Atom {}

/// Seconds since the UNIX epoch.
pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
