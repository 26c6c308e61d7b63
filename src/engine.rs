//! Engine facade: one self-contained cognitive core instance.
//!
//! The `Engine` owns an atom space, the ECAN and PLN engines, and the plugin
//! scheduler. Hosting layers create one engine per conversation; there is no
//! process-wide cognitive state. Lifetime is create → run → `shutdown` →
//! discard.

use std::sync::Arc;

use crate::atom::{Atom, AtomId, TruthValue};
use crate::ecan::{EcanConfig, EcanEngine, EcanStats};
use crate::encode::{self, Knowledge};
use crate::error::NoesisResult;
use crate::pln::{InferenceRun, PlnConfig, PlnEngine};
use crate::scheduler::{plugins, CogScheduler, SchedulerConfig, SchedulerStatistics};
use crate::space::{AtomSpace, Pattern, SpaceStatistics};

/// Aggregate configuration for a core instance.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub ecan: EcanConfig,
    pub pln: PlnConfig,
    pub scheduler: SchedulerConfig,
}

/// Rolled-up view over every subsystem's counters.
#[derive(Debug, Clone)]
pub struct EngineStatistics {
    pub space: SpaceStatistics,
    pub ecan: EcanStats,
    pub sti_pool: i64,
    pub lti_pool: i64,
    pub scheduler: SchedulerStatistics,
}

/// A cognitive core instance.
pub struct Engine {
    space: Arc<AtomSpace>,
    ecan: Arc<EcanEngine>,
    pln: Arc<PlnEngine>,
    scheduler: Arc<CogScheduler>,
}

impl Engine {
    /// Build a core instance. Built-in plugins are pre-registered; the
    /// scheduler's cycle loop starts with [`Engine::start`].
    pub fn new(config: EngineConfig) -> NoesisResult<Self> {
        let space = Arc::new(AtomSpace::with_focus_capacity(config.ecan.max_af));
        let ecan = Arc::new(EcanEngine::new(Arc::clone(&space), config.ecan)?);
        let pln = Arc::new(PlnEngine::new(Arc::clone(&space), config.pln)?);
        let scheduler = Arc::new(CogScheduler::new(
            Arc::clone(&space),
            Arc::clone(&ecan),
            Arc::clone(&pln),
            config.scheduler,
        ));
        plugins::register_builtins(&scheduler);

        tracing::info!(
            max_af = ecan.config().max_af,
            rules = pln.registry().len(),
            plugins = scheduler.plugin_ids().len(),
            "engine initialized"
        );

        Ok(Self {
            space,
            ecan,
            pln,
            scheduler,
        })
    }

    /// The atom space.
    pub fn space(&self) -> &Arc<AtomSpace> {
        &self.space
    }

    /// The attention engine.
    pub fn ecan(&self) -> &Arc<EcanEngine> {
        &self.ecan
    }

    /// The inference engine.
    pub fn pln(&self) -> &Arc<PlnEngine> {
        &self.pln
    }

    /// The job scheduler.
    pub fn scheduler(&self) -> &Arc<CogScheduler> {
        &self.scheduler
    }

    /// Start the scheduler's cycle loop. Requires a tokio runtime.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Encode structured knowledge into the space.
    ///
    /// Without an explicit truth value, the PLN defaults apply.
    pub fn add_knowledge(
        &self,
        knowledge: &Knowledge,
        tv: Option<TruthValue>,
    ) -> NoesisResult<Atom> {
        let tv = tv.unwrap_or_else(|| {
            TruthValue::new(
                self.pln.config().default_strength,
                self.pln.config().default_confidence,
            )
        });
        Ok(encode::encode(&self.space, knowledge, tv)?)
    }

    /// Pattern query over the space.
    pub fn query(&self, pattern: &Pattern) -> Vec<Atom> {
        self.space.query(pattern)
    }

    /// Run PLN inference.
    pub fn infer(&self, max_iterations: usize) -> InferenceRun {
        self.pln.infer(max_iterations)
    }

    /// The current attentional focus, highest STI first.
    pub fn focus(&self) -> Vec<Atom> {
        self.space.focus()
    }

    /// Stimulate a batch of atoms. Unknown ids are skipped; returns how many
    /// atoms were stimulated.
    pub fn stimulate(&self, ids: &[AtomId], amount: i64) -> usize {
        let mut stimulated = 0;
        for &id in ids {
            match self.ecan.stimulate(id, amount) {
                Ok(_) => stimulated += 1,
                Err(err) => {
                    tracing::debug!(%id, error = %err, "skipping stimulate target");
                }
            }
        }
        stimulated
    }

    /// Counters from every subsystem.
    pub fn statistics(&self) -> EngineStatistics {
        EngineStatistics {
            space: self.space.statistics(),
            ecan: self.ecan.stats(),
            sti_pool: self.ecan.sti_pool(),
            lti_pool: self.ecan.lti_pool(),
            scheduler: self.scheduler.statistics(),
        }
    }

    /// Best-effort shutdown: stops the scheduler and cancels running jobs.
    /// Idempotent; never fails.
    pub fn shutdown(&self) {
        self.scheduler.stop();
        tracing::info!("engine shut down");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("space", &self.space)
            .field("ecan", &self.ecan)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
