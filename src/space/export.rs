//! Graph export and import.
//!
//! The exported form is the wire contract: `{id, type, name, outgoing, tv,
//! av, timestamp}` per atom, `{atoms, size, timestamp}` per graph. Import
//! reconstructs in two passes — create all atoms by id, then re-link
//! outgoing references — dropping unknown outgoing ids silently.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::atom::{now_secs, Atom, AttentionValue, TruthValue};
use crate::types::AtomType;

use super::AtomSpace;

/// Exported truth value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TruthValueExport {
    pub strength: f64,
    pub confidence: f64,
}

/// Exported attention value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttentionValueExport {
    pub sti: i64,
    pub lti: u64,
    pub vlti: bool,
}

/// Exported atom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomExport {
    /// Raw atom id.
    pub id: u64,
    /// Wire type tag.
    #[serde(rename = "type")]
    pub atom_type: AtomType,
    /// Node name, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw outgoing ids.
    #[serde(default)]
    pub outgoing: Vec<u64>,
    /// Truth value.
    pub tv: TruthValueExport,
    /// Attention value.
    pub av: AttentionValueExport,
    /// Creation timestamp (seconds since UNIX epoch).
    pub timestamp: u64,
}

/// Exported graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub atoms: Vec<AtomExport>,
    pub size: usize,
    pub timestamp: u64,
}

impl From<&Atom> for AtomExport {
    fn from(atom: &Atom) -> Self {
        Self {
            id: atom.id.get(),
            atom_type: atom.atom_type,
            name: atom.name.clone(),
            outgoing: atom.outgoing.iter().map(|id| id.get()).collect(),
            tv: TruthValueExport {
                strength: atom.tv.strength,
                confidence: atom.tv.confidence,
            },
            av: AttentionValueExport {
                sti: atom.av.sti,
                lti: atom.av.lti,
                vlti: atom.av.vlti,
            },
            timestamp: atom.created_at,
        }
    }
}

impl AtomSpace {
    /// Export every live atom, in insertion order.
    pub fn export(&self) -> GraphExport {
        let atoms: Vec<AtomExport> = self.all().iter().map(AtomExport::from).collect();
        GraphExport {
            size: atoms.len(),
            atoms,
            timestamp: now_secs(),
        }
    }

    /// Reconstruct atoms from an export into this space.
    ///
    /// Two passes: first every atom is created under its original id, then
    /// outgoing references are re-linked. Unknown ids in outgoing sequences
    /// are dropped silently; a link whose entire outgoing was dropped is
    /// skipped (an empty link is invalid by construction). Atoms whose id is
    /// already live are skipped. Returns how many atoms were imported.
    pub fn import(&self, export: &GraphExport) -> usize {
        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        // Pass 1: materialise atoms under their original ids. Outgoing is
        // carried as exported; re-linking happens once all ids are known.
        let mut fresh: Vec<crate::atom::AtomId> = Vec::new();
        for entry in &export.atoms {
            let Some(id) = crate::atom::AtomId::new(entry.id) else {
                continue;
            };
            if self.atoms.contains_key(&id) {
                continue;
            }

            let tv = TruthValue::new(entry.tv.strength, entry.tv.confidence);
            let mut atom = if entry.atom_type.is_node() {
                Atom::node(id, entry.atom_type, entry.name.clone(), tv)
            } else {
                let outgoing: Vec<crate::atom::AtomId> = entry
                    .outgoing
                    .iter()
                    .filter_map(|&raw| crate::atom::AtomId::new(raw))
                    .collect();
                Atom::link(id, entry.atom_type, outgoing, tv)
            };
            atom.av = AttentionValue::new(entry.av.sti, entry.av.lti, entry.av.vlti);
            atom.created_at = entry.timestamp;

            self.allocator().reserve_through(entry.id);
            self.atoms.insert(id, atom);
            fresh.push(id);
        }

        // Pass 2: prune outgoing references that never landed. Dropping an
        // emptied link can orphan links that referenced it, so iterate to a
        // fixpoint before any index is built.
        let mut dropped: HashSet<crate::atom::AtomId> = HashSet::new();
        loop {
            let mut dropped_this_round = false;
            for &id in &fresh {
                if dropped.contains(&id) {
                    continue;
                }
                let outgoing = match self.atoms.get(&id) {
                    Some(a) if a.is_link() => a.outgoing.clone(),
                    _ => continue,
                };
                let live: Vec<crate::atom::AtomId> = outgoing
                    .iter()
                    .copied()
                    .filter(|t| self.atoms.contains_key(t) && !dropped.contains(t))
                    .collect();
                if live.is_empty() {
                    self.atoms.remove(&id);
                    dropped.insert(id);
                    dropped_this_round = true;
                } else if live.len() != outgoing.len() {
                    if let Some(mut atom) = self.atoms.get_mut(&id) {
                        atom.outgoing = live;
                    }
                }
            }
            if !dropped_this_round {
                break;
            }
        }

        // Pass 3: index the survivors and wire incoming sets.
        let mut imported = 0;
        for &id in &fresh {
            if dropped.contains(&id) {
                continue;
            }
            let atom = match self.atoms.get(&id) {
                Some(a) => a.value().clone(),
                None => continue,
            };
            self.index_atom(&atom);
            for &target in &atom.outgoing {
                self.incoming.entry(target).or_default().insert(id);
            }
            if atom.is_node() {
                self.node_count
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            } else {
                self.link_count
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            imported += 1;
        }

        imported
    }
}
