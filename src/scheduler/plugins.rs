//! Built-in cognitive plugins.
//!
//! Pre-registered on every engine: `pln` (one inference run), `ecan` (one
//! attention cycle), `patternMining` (frequent node types), `goalProcessing`
//! (active goals by STI), and `memoryConsolidation` (STI-driven LTI
//! promotion).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{PluginError, PluginResult};
use crate::types::AtomType;

use super::{CogScheduler, CognitivePlugin, PluginContext, PluginDescriptor};

fn u64_param(params: &Value, name: &str, default: u64) -> PluginResult<u64> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_u64().ok_or_else(|| PluginError::InvalidParameter {
            name: name.to_string(),
            message: format!("expected a non-negative integer, got {value}"),
        }),
    }
}

fn i64_param(params: &Value, name: &str, default: i64) -> PluginResult<i64> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_i64().ok_or_else(|| PluginError::InvalidParameter {
            name: name.to_string(),
            message: format!("expected an integer, got {value}"),
        }),
    }
}

/// One PLN inference run.
pub struct PlnPlugin;

#[async_trait]
impl CognitivePlugin for PlnPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: "pln".into(),
            name: "Probabilistic inference".into(),
            priority: 5,
        }
    }

    async fn execute(&self, ctx: PluginContext, params: Value) -> PluginResult<Value> {
        let max_iterations = u64_param(&params, "max_iterations", 3)? as usize;
        let run = ctx.pln.infer(max_iterations);
        Ok(json!({
            "iterations": run.iterations,
            "total_inferences": run.total_inferences,
        }))
    }
}

/// One ECAN attention cycle.
pub struct EcanPlugin;

#[async_trait]
impl CognitivePlugin for EcanPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: "ecan".into(),
            name: "Attention allocation".into(),
            priority: 5,
        }
    }

    async fn execute(&self, ctx: PluginContext, _params: Value) -> PluginResult<Value> {
        let report = ctx.ecan.cycle();
        serde_json::to_value(&report).map_err(|e| PluginError::Internal {
            message: format!("failed to serialize cycle report: {e}"),
        })
    }
}

/// Counts node types and emits those at or above `min_support`.
pub struct PatternMiningPlugin;

#[async_trait]
impl CognitivePlugin for PatternMiningPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: "patternMining".into(),
            name: "Pattern mining".into(),
            priority: 2,
        }
    }

    async fn execute(&self, ctx: PluginContext, params: Value) -> PluginResult<Value> {
        let min_support = u64_param(&params, "min_support", 2)? as usize;

        let stats = ctx.space.statistics();
        let mut patterns: Vec<(String, usize)> = stats
            .per_type
            .into_iter()
            .filter(|(tag, count)| {
                *count >= min_support
                    && tag
                        .parse::<AtomType>()
                        .map(|ty| ty.is_node())
                        .unwrap_or(false)
            })
            .collect();
        patterns.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(json!({
            "min_support": min_support,
            "patterns": patterns
                .into_iter()
                .map(|(tag, count)| json!({ "type": tag, "count": count }))
                .collect::<Vec<Value>>(),
        }))
    }
}

/// Returns goal atoms whose STI clears a threshold.
pub struct GoalProcessingPlugin;

#[async_trait]
impl CognitivePlugin for GoalProcessingPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: "goalProcessing".into(),
            name: "Goal processing".into(),
            priority: 3,
        }
    }

    async fn execute(&self, ctx: PluginContext, params: Value) -> PluginResult<Value> {
        let threshold = i64_param(&params, "sti_threshold", 0)?;

        let goals: Vec<Value> = ctx
            .space
            .by_type(AtomType::GoalNode)
            .into_iter()
            .filter(|goal| goal.av.sti > threshold)
            .map(|goal| {
                json!({
                    "id": goal.id.get(),
                    "name": goal.name,
                    "sti": goal.av.sti,
                })
            })
            .collect();

        Ok(json!({ "sti_threshold": threshold, "goals": goals }))
    }
}

/// Promotes high-STI atoms into longer-term importance.
pub struct MemoryConsolidationPlugin;

#[async_trait]
impl CognitivePlugin for MemoryConsolidationPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor {
            id: "memoryConsolidation".into(),
            name: "Memory consolidation".into(),
            priority: 1,
        }
    }

    async fn execute(&self, ctx: PluginContext, params: Value) -> PluginResult<Value> {
        let threshold = i64_param(&params, "sti_threshold", 50)?;
        let consolidated = ctx.ecan.consolidate(threshold);
        Ok(json!({
            "sti_threshold": threshold,
            "consolidated": consolidated,
        }))
    }
}

/// Register every built-in plugin on a scheduler.
pub fn register_builtins(scheduler: &CogScheduler) {
    scheduler.register_plugin(Arc::new(PlnPlugin));
    scheduler.register_plugin(Arc::new(EcanPlugin));
    scheduler.register_plugin(Arc::new(PatternMiningPlugin));
    scheduler.register_plugin(Arc::new(GoalProcessingPlugin));
    scheduler.register_plugin(Arc::new(MemoryConsolidationPlugin));
}
