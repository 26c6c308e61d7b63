//! ECAN: the economic attention-allocation engine.
//!
//! Short-term importance is treated as a conserved quantity. Each cycle
//! collects rent from the attentional focus, decays positive STI back into
//! the pool, spreads importance from focus members to their neighbours,
//! rebuilds the focus from the highest-STI atoms, and probabilistically
//! forgets unimportant atoms. Forgetting re-credits removed STI to the pool,
//! which keeps the conservation invariant approximate rather than exact.
//!
//! Per-atom failures never abort a cycle: an atom that disappears mid-phase
//! is simply skipped.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::atom::{Atom, AtomId, TruthValue};
use crate::error::{EcanError, NoesisResult};
use crate::space::AtomSpace;
use crate::types::AtomType;

/// Tunables for the attention economy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcanConfig {
    /// Maximum attentional-focus size.
    pub max_af: usize,
    /// Lower STI bound; also the focus admission threshold.
    pub min_sti: i64,
    /// Upper STI bound.
    pub max_sti: i64,
    /// Rent charged to every focus member per cycle.
    pub rent_amount: i64,
    /// Fraction of positive STI returned to the pool per cycle.
    pub decay_rate: f64,
    /// Fraction of a focus member's STI offered for spreading.
    pub diffusion_rate: f64,
    /// Per-neighbour probability that a spread transfer happens.
    pub spread_probability: f64,
    /// Per-candidate probability that a forgettable atom is removed.
    pub forget_probability: f64,
    /// Step size for hebbian truth-value strengthening.
    pub hebbian_learning_rate: f64,
    /// Initial STI pool.
    pub initial_sti_pool: i64,
    /// Initial LTI pool.
    pub initial_lti_pool: i64,
    /// Seed for the engine's RNG; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for EcanConfig {
    fn default() -> Self {
        Self {
            max_af: 100,
            min_sti: -1000,
            max_sti: 1000,
            rent_amount: 1,
            decay_rate: 0.01,
            diffusion_rate: 0.2,
            spread_probability: 0.1,
            forget_probability: 0.1,
            hebbian_learning_rate: 0.1,
            initial_sti_pool: 10_000,
            initial_lti_pool: 10_000,
            rng_seed: None,
        }
    }
}

impl EcanConfig {
    fn validate(&self) -> Result<(), EcanError> {
        if self.max_sti <= self.min_sti {
            return Err(EcanError::InvalidConfig {
                message: format!(
                    "max_sti ({}) must exceed min_sti ({})",
                    self.max_sti, self.min_sti
                ),
            });
        }
        for (name, rate) in [
            ("decay_rate", self.decay_rate),
            ("diffusion_rate", self.diffusion_rate),
            ("spread_probability", self.spread_probability),
            ("forget_probability", self.forget_probability),
            ("hebbian_learning_rate", self.hebbian_learning_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(EcanError::InvalidConfig {
                    message: format!("{name} ({rate}) must lie in [0, 1]"),
                });
            }
        }
        if self.max_af == 0 {
            return Err(EcanError::InvalidConfig {
                message: "max_af must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// What one cycle did, for observability and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Cycle number (1-based).
    pub cycle: u64,
    /// STI collected as rent from the focus.
    pub rent_collected: i64,
    /// STI returned to the pool by decay.
    pub decayed: i64,
    /// STI moved between atoms by spreading.
    pub spread_transferred: i64,
    /// Focus size after the focus-update phase.
    pub focus_size: usize,
    /// Atoms removed by forgetting (including cascaded links).
    pub forgotten: usize,
    /// Pool level after the cycle.
    pub sti_pool: i64,
}

/// Running statistics across cycles.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EcanStats {
    /// Cycles run so far.
    pub cycles_run: u64,
    /// Running average focus size.
    pub avg_focus_size: f64,
}

/// The attention-allocation engine.
///
/// Owns the STI/LTI pools; the atom population lives in the shared space.
pub struct EcanEngine {
    space: Arc<AtomSpace>,
    config: EcanConfig,
    sti_pool: AtomicI64,
    lti_pool: AtomicI64,
    rng: Mutex<StdRng>,
    stats: Mutex<EcanStats>,
}

impl EcanEngine {
    /// Create an engine over the shared space.
    pub fn new(space: Arc<AtomSpace>, config: EcanConfig) -> NoesisResult<Self> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            sti_pool: AtomicI64::new(config.initial_sti_pool),
            lti_pool: AtomicI64::new(config.initial_lti_pool),
            rng: Mutex::new(rng),
            stats: Mutex::new(EcanStats::default()),
            space,
            config,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EcanConfig {
        &self.config
    }

    /// Current STI pool level.
    pub fn sti_pool(&self) -> i64 {
        self.sti_pool.load(Ordering::Relaxed)
    }

    /// Current LTI pool level.
    pub fn lti_pool(&self) -> i64 {
        self.lti_pool.load(Ordering::Relaxed)
    }

    /// Running statistics.
    pub fn stats(&self) -> EcanStats {
        *self.stats.lock().expect("stats lock poisoned")
    }

    // -----------------------------------------------------------------------
    // The cycle
    // -----------------------------------------------------------------------

    /// Run one full attention cycle: rent, decay, spreading, focus update,
    /// forgetting, statistics.
    pub fn cycle(&self) -> CycleReport {
        let rent_collected = self.collect_rent();
        let decayed = self.decay();
        let spread_transferred = self.spread();
        let focus_size = self.update_focus();
        let forgotten = self.forget();

        let cycle = {
            let mut stats = self.stats.lock().expect("stats lock poisoned");
            stats.cycles_run += 1;
            let n = stats.cycles_run as f64;
            stats.avg_focus_size += (focus_size as f64 - stats.avg_focus_size) / n;
            stats.cycles_run
        };

        let report = CycleReport {
            cycle,
            rent_collected,
            decayed,
            spread_transferred,
            focus_size,
            forgotten,
            sti_pool: self.sti_pool(),
        };
        tracing::debug!(
            cycle,
            rent = rent_collected,
            decayed,
            spread = spread_transferred,
            focus = focus_size,
            forgotten,
            pool = report.sti_pool,
            "ecan cycle complete"
        );
        report
    }

    /// Phase 1: charge rent to every focus member.
    fn collect_rent(&self) -> i64 {
        let mut collected = 0;
        for id in self.space.focus_ids() {
            let min = self.config.min_sti;
            let rent = self.config.rent_amount;
            let mut delta = 0;
            self.space.update_attention(id, |av| {
                let after = (av.sti - rent).max(min);
                delta = av.sti - after;
                av.sti = after;
            });
            collected += delta;
        }
        self.credit_pool(collected);
        collected
    }

    /// Phase 2: decay positive STI back into the pool, rounding toward zero.
    fn decay(&self) -> i64 {
        let rate = self.config.decay_rate;
        let mut total = 0i64;
        self.space.update_all_attention(|_, av| {
            if av.sti > 0 {
                let delta = (av.sti as f64 * rate) as i64;
                av.sti -= delta;
                total += delta;
            }
        });
        self.credit_pool(total);
        total
    }

    /// Phase 3: spread importance from focus members to their neighbours.
    fn spread(&self) -> i64 {
        let mut transferred = 0i64;
        for id in self.space.focus_ids() {
            let Some(atom) = self.space.get(id) else {
                continue;
            };
            if atom.av.sti <= 2 * self.config.min_sti {
                continue;
            }
            let budget = atom.av.sti as f64 * self.config.diffusion_rate;
            if budget < 1.0 {
                continue;
            }

            let mut neighbours: Vec<AtomId> = self.space.incoming_of(id);
            for &target in &atom.outgoing {
                if !neighbours.contains(&target) {
                    neighbours.push(target);
                }
            }
            neighbours.retain(|n| *n != id);
            if neighbours.is_empty() {
                continue;
            }

            let share = (budget / neighbours.len() as f64) as i64;
            if share == 0 {
                continue;
            }

            for neighbour in neighbours {
                let roll: f64 = self.rng.lock().expect("rng lock poisoned").gen();
                if roll >= self.config.spread_probability {
                    continue;
                }
                let max = self.config.max_sti;
                let mut received = 0;
                let landed = self.space.update_attention(neighbour, |av| {
                    let after = (av.sti + share).min(max);
                    received = after - av.sti;
                    av.sti = after;
                });
                if !landed || received == 0 {
                    continue;
                }
                let min = self.config.min_sti;
                self.space.update_attention(id, |av| {
                    av.sti = (av.sti - received).max(min);
                });
                transferred += received;
            }
        }
        transferred
    }

    /// Phase 4: rebuild the focus from the highest-STI atoms.
    fn update_focus(&self) -> usize {
        let mut candidates: Vec<(AtomId, i64)> = self
            .space
            .attention_snapshot()
            .into_iter()
            .filter(|(_, av)| av.sti >= self.config.min_sti)
            .map(|(id, av)| (id, av.sti))
            .collect();
        candidates.sort_by_key(|(id, sti)| (std::cmp::Reverse(*sti), id.get()));
        candidates.truncate(self.config.max_af);
        self.space
            .set_focus(candidates.into_iter().map(|(id, _)| id).collect());
        self.space.focus_size()
    }

    /// Phase 5: probabilistically forget unprotected, unimportant atoms.
    fn forget(&self) -> usize {
        let threshold = 2 * self.config.min_sti;
        let mut forgotten = 0;
        for (id, av) in self.space.attention_snapshot() {
            if av.lti != 0 || av.vlti || av.sti >= threshold {
                continue;
            }
            let roll: f64 = self.rng.lock().expect("rng lock poisoned").gen();
            if roll >= self.config.forget_probability {
                continue;
            }
            let removed = self.space.remove_cascading(id);
            for atom in &removed {
                // Removed STI flows back to the pool.
                self.credit_pool(atom.av.sti);
            }
            forgotten += removed.len();
        }
        forgotten
    }

    // -----------------------------------------------------------------------
    // Direct operations
    // -----------------------------------------------------------------------

    /// Add `amount` to an atom's STI (clamped to the STI bounds), deducting
    /// the applied delta from the pool (clamped at zero). Returns the new STI.
    pub fn stimulate(&self, id: AtomId, amount: i64) -> NoesisResult<i64> {
        let min = self.config.min_sti;
        let max = self.config.max_sti;
        let mut applied = 0;
        let mut new_sti = 0;
        let found = self.space.update_attention(id, |av| {
            let after = av.sti.saturating_add(amount).clamp(min, max);
            applied = after - av.sti;
            av.sti = after;
            new_sti = after;
        });
        if !found {
            return Err(EcanError::TargetNotFound { id: id.get() }.into());
        }
        if applied != 0 {
            self.deduct_pool(applied);
        }
        Ok(new_sti)
    }

    /// Strengthen the hebbian association between two atoms.
    ///
    /// Ensures a `HebbianLink` exists between `a` and `b` — the pair is
    /// unordered for this link type, so `(a, b)` and `(b, a)` name the same
    /// association — and raises its truth value's strength toward 1 by the
    /// learning rate, and its confidence by a tenth of it.
    pub fn hebbian(&self, a: AtomId, b: AtomId) -> NoesisResult<Atom> {
        for endpoint in [a, b] {
            if !self.space.has(endpoint) {
                return Err(EcanError::EndpointNotFound { id: endpoint.get() }.into());
            }
        }

        let existing = self
            .space
            .find_link(AtomType::HebbianLink, &[a, b])
            .or_else(|| self.space.find_link(AtomType::HebbianLink, &[b, a]));
        let link = match existing {
            Some(link) => link,
            None => self
                .space
                .add_link(AtomType::HebbianLink, vec![a, b], None)?,
        };

        let rate = self.config.hebbian_learning_rate;
        let tv = TruthValue::new(
            link.tv.strength + rate * (1.0 - link.tv.strength),
            link.tv.confidence + 0.1 * rate,
        );
        self.space.set_truth(link.id, tv)?;
        self.space.get(link.id).ok_or_else(|| {
            EcanError::EndpointNotFound { id: link.id.get() }.into()
        })
    }

    /// Increment LTI for every atom whose STI meets `threshold`, drawing on
    /// the LTI pool. Returns the number of atoms consolidated.
    pub fn consolidate(&self, threshold: i64) -> usize {
        let mut consolidated = 0;
        for (id, av) in self.space.attention_snapshot() {
            if av.sti < threshold {
                continue;
            }
            if self.lti_pool.load(Ordering::Relaxed) <= 0 {
                break;
            }
            if self.space.update_attention(id, |av| av.lti += 1) {
                self.lti_pool.fetch_sub(1, Ordering::Relaxed);
                consolidated += 1;
            }
        }
        consolidated
    }

    fn credit_pool(&self, amount: i64) {
        self.sti_pool.fetch_add(amount, Ordering::Relaxed);
    }

    fn deduct_pool(&self, amount: i64) {
        let _ = self
            .sti_pool
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |pool| {
                Some((pool - amount).max(0))
            });
    }
}

impl std::fmt::Debug for EcanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcanEngine")
            .field("sti_pool", &self.sti_pool())
            .field("lti_pool", &self.lti_pool())
            .field("stats", &self.stats())
            .finish()
    }
}
