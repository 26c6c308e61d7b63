//! The atom space: a multi-indexed, in-memory hypergraph store.
//!
//! Atoms are owned exclusively by the space; all cross-atom references are by
//! [`AtomId`], with incoming sets maintained as index-only back-pointers, so
//! cyclic structures need no reference counting. Structural identity —
//! `(type, name)` for nodes, `(type, outgoing)` for links — is enforced by a
//! de-duplication index: re-adding returns the existing atom.
//!
//! Reads are lock-free over `DashMap` shards; structural mutations (add,
//! remove) are serialised by an internal mutex so the indexes never observe
//! each other mid-update.

pub mod export;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::atom::{Atom, AtomId, AtomIdAllocator, AttentionValue, TruthValue};
use crate::error::{SpaceError, SpaceResult};
use crate::types::AtomType;

/// Structural identity key for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum StructuralKey {
    Node(AtomType, Option<String>),
    Link(AtomType, Vec<AtomId>),
}

impl StructuralKey {
    fn of(atom: &Atom) -> Self {
        if atom.is_node() {
            StructuralKey::Node(atom.atom_type, atom.name.clone())
        } else {
            StructuralKey::Link(atom.atom_type, atom.outgoing.clone())
        }
    }
}

/// A conjunction of optional predicates matched against every atom field
/// supplied. No variable binding happens at this layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pattern {
    /// Match atoms of exactly this type.
    pub atom_type: Option<AtomType>,
    /// Match nodes with exactly this name.
    pub name: Option<String>,
    /// Match atoms of exactly this arity (0 selects nodes).
    pub arity: Option<usize>,
}

impl Pattern {
    fn matches(&self, atom: &Atom) -> bool {
        if let Some(ty) = self.atom_type {
            if atom.atom_type != ty {
                return false;
            }
        }
        if let Some(ref name) = self.name {
            if atom.name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(arity) = self.arity {
            if atom.arity() != arity {
                return false;
            }
        }
        true
    }
}

/// Aggregate counts describing the space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceStatistics {
    /// Total live atoms.
    pub total_atoms: usize,
    /// Live nodes.
    pub node_count: usize,
    /// Live links.
    pub link_count: usize,
    /// Per-type distribution, keyed by wire tag.
    pub per_type: HashMap<String, usize>,
    /// Current attentional-focus size.
    pub focus_size: usize,
}

/// The multi-indexed hypergraph store.
pub struct AtomSpace {
    /// Primary map: id → atom (source of truth).
    atoms: DashMap<AtomId, Atom>,
    /// Structural de-duplication index.
    structural: DashMap<StructuralKey, AtomId>,
    /// Type index.
    by_type: DashMap<AtomType, HashSet<AtomId>>,
    /// Name index (nodes only).
    by_name: DashMap<String, HashSet<AtomId>>,
    /// Incoming sets: id → ids of links referencing it.
    incoming: DashMap<AtomId, HashSet<AtomId>>,
    /// Attentional focus, kept in STI-descending order.
    focus: RwLock<Vec<AtomId>>,
    /// Upper bound on the focus set.
    focus_capacity: usize,
    /// Id allocator; monotonic, so id order is insertion order.
    allocator: AtomIdAllocator,
    /// Serialises structural mutation so the indexes stay consistent.
    mutation: Mutex<()>,
    node_count: AtomicUsize,
    link_count: AtomicUsize,
}

impl AtomSpace {
    /// Create an empty space with the default focus capacity (100).
    pub fn new() -> Self {
        Self::with_focus_capacity(100)
    }

    /// Create an empty space with an explicit focus capacity.
    pub fn with_focus_capacity(focus_capacity: usize) -> Self {
        Self {
            atoms: DashMap::new(),
            structural: DashMap::new(),
            by_type: DashMap::new(),
            by_name: DashMap::new(),
            incoming: DashMap::new(),
            focus: RwLock::new(Vec::new()),
            focus_capacity,
            allocator: AtomIdAllocator::new(),
            mutation: Mutex::new(()),
            node_count: AtomicUsize::new(0),
            link_count: AtomicUsize::new(0),
        }
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Add a node, or return the existing node of the same `(type, name)`.
    ///
    /// A supplied truth value overwrites the existing one on re-add.
    pub fn add_node(
        &self,
        atom_type: AtomType,
        name: Option<&str>,
        tv: Option<TruthValue>,
    ) -> SpaceResult<Atom> {
        if !atom_type.is_node() {
            return Err(SpaceError::NotANodeType {
                tag: atom_type.as_str().to_string(),
            });
        }

        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        let key = StructuralKey::Node(atom_type, name.map(str::to_string));
        if let Some(existing) = self.structural.get(&key).map(|r| *r.value()) {
            if let Some(tv) = tv {
                if let Some(mut atom) = self.atoms.get_mut(&existing) {
                    atom.tv = tv;
                }
            }
            return self
                .atoms
                .get(&existing)
                .map(|r| r.value().clone())
                .ok_or(SpaceError::NotFound { id: existing.get() });
        }

        let id = self.allocator.next_id()?;
        let atom = Atom::node(
            id,
            atom_type,
            name.map(str::to_string),
            tv.unwrap_or_default(),
        );
        self.index_atom(&atom);
        self.atoms.insert(id, atom.clone());
        self.node_count.fetch_add(1, Ordering::Relaxed);
        Ok(atom)
    }

    /// Add a link, or return the existing link of the same `(type, outgoing)`.
    ///
    /// Every referenced atom must already be in the space; the incoming sets
    /// of all referenced atoms are wired up. A supplied truth value overwrites
    /// the existing one on re-add.
    pub fn add_link(
        &self,
        atom_type: AtomType,
        outgoing: Vec<AtomId>,
        tv: Option<TruthValue>,
    ) -> SpaceResult<Atom> {
        if !atom_type.is_link() {
            return Err(SpaceError::NotALinkType {
                tag: atom_type.as_str().to_string(),
            });
        }
        if outgoing.is_empty() {
            return Err(SpaceError::EmptyOutgoing {
                tag: atom_type.as_str().to_string(),
            });
        }
        // Validate before touching any index: mutations are total or no-op.
        for &target in &outgoing {
            if !self.atoms.contains_key(&target) {
                return Err(SpaceError::UnknownReference { id: target.get() });
            }
        }

        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        let key = StructuralKey::Link(atom_type, outgoing.clone());
        if let Some(existing) = self.structural.get(&key).map(|r| *r.value()) {
            if let Some(tv) = tv {
                if let Some(mut atom) = self.atoms.get_mut(&existing) {
                    atom.tv = tv;
                }
            }
            return self
                .atoms
                .get(&existing)
                .map(|r| r.value().clone())
                .ok_or(SpaceError::NotFound { id: existing.get() });
        }

        let id = self.allocator.next_id()?;
        let atom = Atom::link(id, atom_type, outgoing, tv.unwrap_or_default());
        self.index_atom(&atom);
        for &target in &atom.outgoing {
            self.incoming.entry(target).or_default().insert(id);
        }
        self.atoms.insert(id, atom.clone());
        self.link_count.fetch_add(1, Ordering::Relaxed);
        Ok(atom)
    }

    /// Wire an atom into the structural, type, and name indexes.
    fn index_atom(&self, atom: &Atom) {
        self.structural.insert(StructuralKey::of(atom), atom.id);
        self.by_type.entry(atom.atom_type).or_default().insert(atom.id);
        if let Some(ref name) = atom.name {
            self.by_name.entry(name.clone()).or_default().insert(atom.id);
        }
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Remove an atom. Returns whether it existed.
    ///
    /// Removal cascades: every link that (transitively) references the atom
    /// is removed too, so outgoing sequences never hold dangling ids.
    pub fn remove(&self, id: AtomId) -> bool {
        !self.remove_cascading(id).is_empty()
    }

    /// Remove an atom and return everything the cascade took with it.
    ///
    /// The requested atom is first in the returned vector when it existed.
    /// ECAN's forgetting phase uses this to re-credit removed STI to its pool.
    pub fn remove_cascading(&self, id: AtomId) -> Vec<Atom> {
        let _guard = self.mutation.lock().expect("mutation lock poisoned");

        if !self.atoms.contains_key(&id) {
            return Vec::new();
        }

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some((_, atom)) = self.atoms.remove(&current) else {
                continue;
            };

            // Queue every link that references this atom.
            if let Some((_, referers)) = self.incoming.remove(&current) {
                stack.extend(referers);
            }

            self.structural.remove(&StructuralKey::of(&atom));
            if let Some(mut set) = self.by_type.get_mut(&atom.atom_type) {
                set.remove(&current);
            }
            if let Some(ref name) = atom.name {
                if let Some(mut set) = self.by_name.get_mut(name) {
                    set.remove(&current);
                }
            }
            for &target in &atom.outgoing {
                if let Some(mut set) = self.incoming.get_mut(&target) {
                    set.remove(&current);
                }
            }

            if atom.is_node() {
                self.node_count.fetch_sub(1, Ordering::Relaxed);
            } else {
                self.link_count.fetch_sub(1, Ordering::Relaxed);
            }
            removed.push(atom);
        }

        let removed_ids: HashSet<AtomId> = removed.iter().map(|a| a.id).collect();
        self.focus
            .write()
            .expect("focus lock poisoned")
            .retain(|f| !removed_ids.contains(f));

        removed
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Get an atom by id.
    pub fn get(&self, id: AtomId) -> Option<Atom> {
        self.atoms.get(&id).map(|r| r.value().clone())
    }

    /// Whether an atom with this id is live.
    pub fn has(&self, id: AtomId) -> bool {
        self.atoms.contains_key(&id)
    }

    /// Find a link by its structural identity, without creating it.
    pub fn find_link(&self, atom_type: AtomType, outgoing: &[AtomId]) -> Option<Atom> {
        let key = StructuralKey::Link(atom_type, outgoing.to_vec());
        let id = *self.structural.get(&key)?;
        self.get(id)
    }

    /// Find a node by its structural identity, without creating it.
    pub fn find_node(&self, atom_type: AtomType, name: Option<&str>) -> Option<Atom> {
        let key = StructuralKey::Node(atom_type, name.map(str::to_string));
        let id = *self.structural.get(&key)?;
        self.get(id)
    }

    /// All atoms of a type, in insertion order.
    pub fn by_type(&self, atom_type: AtomType) -> Vec<Atom> {
        let ids = self
            .by_type
            .get(&atom_type)
            .map(|r| r.value().iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        self.collect_sorted(ids)
    }

    /// All nodes with a name, in insertion order.
    pub fn by_name(&self, name: &str) -> Vec<Atom> {
        let ids = self
            .by_name
            .get(name)
            .map(|r| r.value().iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        self.collect_sorted(ids)
    }

    /// Ids of the links referencing an atom, ascending.
    pub fn incoming_of(&self, id: AtomId) -> Vec<AtomId> {
        let mut ids = self
            .incoming
            .get(&id)
            .map(|r| r.value().iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// All live atoms, in insertion order.
    pub fn all(&self) -> Vec<Atom> {
        let mut atoms: Vec<Atom> = self.atoms.iter().map(|r| r.value().clone()).collect();
        atoms.sort_unstable_by_key(|a| a.id);
        atoms
    }

    /// Number of live atoms.
    pub fn size(&self) -> usize {
        self.atoms.len()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.node_count.load(Ordering::Relaxed)
    }

    /// Number of live links.
    pub fn link_count(&self) -> usize {
        self.link_count.load(Ordering::Relaxed)
    }

    fn collect_sorted(&self, mut ids: Vec<AtomId>) -> Vec<Atom> {
        ids.sort_unstable();
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    // -----------------------------------------------------------------------
    // Value mutation
    // -----------------------------------------------------------------------

    /// Overwrite an atom's truth value.
    pub fn set_truth(&self, id: AtomId, tv: TruthValue) -> SpaceResult<()> {
        let mut atom = self
            .atoms
            .get_mut(&id)
            .ok_or(SpaceError::NotFound { id: id.get() })?;
        atom.tv = tv;
        Ok(())
    }

    /// Overwrite an atom's attention value.
    pub fn set_attention(&self, id: AtomId, av: AttentionValue) -> SpaceResult<()> {
        let mut atom = self
            .atoms
            .get_mut(&id)
            .ok_or(SpaceError::NotFound { id: id.get() })?;
        atom.av = av;
        Ok(())
    }

    /// Read-modify-write an atom's attention value. Returns false if missing.
    pub fn update_attention(&self, id: AtomId, f: impl FnOnce(&mut AttentionValue)) -> bool {
        match self.atoms.get_mut(&id) {
            Some(mut atom) => {
                f(&mut atom.av);
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every live atom's attention value.
    pub fn update_all_attention(&self, mut f: impl FnMut(AtomId, &mut AttentionValue)) {
        for mut entry in self.atoms.iter_mut() {
            let id = *entry.key();
            f(id, &mut entry.value_mut().av);
        }
    }

    /// Snapshot `(id, attention)` for every live atom, in insertion order.
    pub fn attention_snapshot(&self) -> Vec<(AtomId, AttentionValue)> {
        let mut snapshot: Vec<(AtomId, AttentionValue)> = self
            .atoms
            .iter()
            .map(|r| (*r.key(), r.value().av))
            .collect();
        snapshot.sort_unstable_by_key(|(id, _)| *id);
        snapshot
    }

    /// Set a side-map annotation on an atom.
    pub fn set_value(&self, id: AtomId, key: &str, value: serde_json::Value) -> SpaceResult<()> {
        let mut atom = self
            .atoms
            .get_mut(&id)
            .ok_or(SpaceError::NotFound { id: id.get() })?;
        atom.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Read a side-map annotation from an atom.
    pub fn get_value(&self, id: AtomId, key: &str) -> Option<serde_json::Value> {
        self.atoms.get(&id).and_then(|a| a.values.get(key).cloned())
    }

    // -----------------------------------------------------------------------
    // Attentional focus
    // -----------------------------------------------------------------------

    /// Add an atom to the focus. Returns false if the atom is missing, the
    /// focus is at capacity, or the atom is already a member.
    pub fn add_to_focus(&self, id: AtomId) -> bool {
        if !self.has(id) {
            return false;
        }
        let mut focus = self.focus.write().expect("focus lock poisoned");
        if focus.len() >= self.focus_capacity || focus.contains(&id) {
            return false;
        }
        focus.push(id);
        self.sort_focus(&mut focus);
        true
    }

    /// Remove an atom from the focus. Returns whether it was a member.
    pub fn remove_from_focus(&self, id: AtomId) -> bool {
        let mut focus = self.focus.write().expect("focus lock poisoned");
        let before = focus.len();
        focus.retain(|f| *f != id);
        focus.len() != before
    }

    /// Replace the focus wholesale. Truncated to capacity, STI-descending.
    pub fn set_focus(&self, ids: Vec<AtomId>) {
        let mut seen = HashSet::new();
        let ids: Vec<AtomId> = ids
            .into_iter()
            .filter(|id| self.has(*id) && seen.insert(*id))
            .collect();
        let mut focus = self.focus.write().expect("focus lock poisoned");
        *focus = ids;
        self.sort_focus(&mut focus);
        let cap = self.focus_capacity;
        focus.truncate(cap);
    }

    /// The focus members as atoms, highest STI first.
    pub fn focus(&self) -> Vec<Atom> {
        let ids = self.focus.read().expect("focus lock poisoned").clone();
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// The focus member ids, highest STI first.
    pub fn focus_ids(&self) -> Vec<AtomId> {
        self.focus.read().expect("focus lock poisoned").clone()
    }

    /// Current focus size.
    pub fn focus_size(&self) -> usize {
        self.focus.read().expect("focus lock poisoned").len()
    }

    /// The configured focus capacity.
    pub fn focus_capacity(&self) -> usize {
        self.focus_capacity
    }

    fn sort_focus(&self, focus: &mut [AtomId]) {
        focus.sort_by_key(|id| {
            let sti = self.atoms.get(id).map(|a| a.av.sti).unwrap_or(i64::MIN);
            (std::cmp::Reverse(sti), id.get())
        });
    }

    // -----------------------------------------------------------------------
    // Query & statistics
    // -----------------------------------------------------------------------

    /// All atoms matching every supplied field of the pattern.
    pub fn query(&self, pattern: &Pattern) -> Vec<Atom> {
        let candidates = if let Some(ty) = pattern.atom_type {
            self.by_type(ty)
        } else if let Some(ref name) = pattern.name {
            self.by_name(name)
        } else {
            self.all()
        };
        candidates
            .into_iter()
            .filter(|a| pattern.matches(a))
            .collect()
    }

    /// Aggregate counts: totals, node/link split, per-type distribution.
    pub fn statistics(&self) -> SpaceStatistics {
        let mut per_type = HashMap::new();
        for entry in self.by_type.iter() {
            let count = entry.value().len();
            if count > 0 {
                per_type.insert(entry.key().as_str().to_string(), count);
            }
        }
        SpaceStatistics {
            total_atoms: self.size(),
            node_count: self.node_count(),
            link_count: self.link_count(),
            per_type,
            focus_size: self.focus_size(),
        }
    }

    pub(crate) fn allocator(&self) -> &AtomIdAllocator {
        &self.allocator
    }
}

impl Default for AtomSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AtomSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomSpace")
            .field("atoms", &self.size())
            .field("nodes", &self.node_count())
            .field("links", &self.link_count())
            .field("focus", &self.focus_size())
            .finish()
    }
}
