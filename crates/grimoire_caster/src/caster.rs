// SPDX-License-Identifier: MIT OR Apache-2.0
//! Caster state: spells, mana, cooldowns and cast orchestration.

use crate::config::CasterConfig;
use crate::prediction::{CastRequest, CastResult, PredictionLedger};
use crate::spell::SpellDefinition;
use grimoire_graph::analysis::{compile_ability, resolve_root, CompiledAbility};
use grimoire_graph::context::{shared_variables, ExecutionContext, SharedVariables};
use grimoire_graph::evaluation::{ExecutionOptions, Interpreter, PendingContinuation};
use grimoire_graph::host::SpellHost;
use grimoire_graph::node::{NodeId, NodeKindTag, NodeRegistry, SpellNode};
use grimoire_graph::value::ActorId;
use grimoire_graph::{create_spell_registry, Graph};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the network a caster runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Authority {
    /// Casts execute and charge for real
    #[default]
    Authoritative,
    /// Casts run locally and are confirmed later
    Predicting,
}

/// Why a cast was refused
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum CastError {
    /// No spell of that name
    #[error("Unknown spell '{0}'")]
    UnknownSpell(String),

    /// Cooldown still running
    #[error("Spell '{spell}' is on cooldown for {remaining:.2}s")]
    OnCooldown {
        /// Spell name
        spell: String,
        /// Seconds left
        remaining: f32,
    },

    /// Not enough mana
    #[error("Spell '{spell}' needs {required:.1} mana, have {available:.1}")]
    InsufficientMana {
        /// Spell name
        spell: String,
        /// Cost of the cast
        required: f32,
        /// Mana available
        available: f32,
    },

    /// Graph has no nodes
    #[error("Spell '{0}' has no root node")]
    NoRoot(String),
}

/// Notifications emitted by a caster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CasterEvent {
    /// Mana changed
    ManaChanged {
        /// New value
        current: f32,
        /// Ceiling
        max: f32,
    },
    /// A cast ran
    SpellCast {
        /// Spell name
        spell: String,
        /// Mana charged
        mana_spent: f32,
        /// Whether this was a local prediction
        predicted: bool,
    },
    /// A cast was refused
    CastRejected {
        /// Spell name
        spell: String,
        /// Reason
        reason: CastError,
    },
    /// A cooldown expired
    CooldownReady {
        /// Spell name
        spell: String,
    },
    /// The authority accepted a predicted cast
    PredictionConfirmed {
        /// Spell name
        spell: String,
    },
    /// The authority refused a predicted cast
    PredictionRejected {
        /// Spell name
        spell: String,
        /// Mana given back
        refunded: f32,
    },
}

/// Summary of a cast that ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastOutcome {
    /// Spell name
    pub spell: String,
    /// Mana charged
    pub mana_spent: f32,
    /// Power accumulated by the graph
    pub spell_power: f32,
    /// Node executions
    pub executed: u32,
    /// Whether a ceiling cut the run short
    pub truncated: bool,
    /// Continuations left for later ticks
    pub scheduled: usize,
    /// Whether this was a local prediction
    pub predicted: bool,
}

/// Per-actor spell collection and resource economy
pub struct CasterState {
    /// Actor that casts
    pub caster: ActorId,
    authority: Authority,
    current_mana: f32,
    max_mana: f32,
    mana_regen_rate: f32,
    default_cooldown: f32,
    spells: IndexMap<String, SpellDefinition>,
    cooldowns: IndexMap<String, f32>,
    inventory: IndexMap<NodeId, SpellNode>,
    registry: NodeRegistry,
    blackboard: SharedVariables,
    options: ExecutionOptions,
    predictions: PredictionLedger,
    events: Vec<CasterEvent>,
}

impl CasterState {
    /// Create a caster from configuration
    pub fn new(caster: ActorId, config: &CasterConfig, authority: Authority) -> Self {
        let max_mana = config.max_mana.max(0.0);
        Self {
            caster,
            authority,
            current_mana: config.initial_mana().clamp(0.0, max_mana),
            max_mana,
            mana_regen_rate: config.mana_regen_rate,
            default_cooldown: config.default_cooldown,
            spells: IndexMap::new(),
            cooldowns: IndexMap::new(),
            inventory: IndexMap::new(),
            registry: create_spell_registry(),
            blackboard: shared_variables(),
            options: config.execution_options(),
            predictions: PredictionLedger::new(),
            events: Vec::new(),
        }
    }

    /// Network role
    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// Current mana
    pub fn current_mana(&self) -> f32 {
        self.current_mana
    }

    /// Mana ceiling
    pub fn max_mana(&self) -> f32 {
        self.max_mana
    }

    /// Overwrite mana, clamped to `[0, max_mana]`. Non-finite values are ignored.
    pub fn set_mana(&mut self, value: f32) {
        if !value.is_finite() {
            tracing::warn!("Ignoring non-finite mana value {}", value);
            return;
        }
        let clamped = value.clamp(0.0, self.max_mana);
        if clamped != self.current_mana {
            self.current_mana = clamped;
            self.events.push(CasterEvent::ManaChanged {
                current: clamped,
                max: self.max_mana,
            });
        }
    }

    fn consume_mana(&mut self, amount: f32) {
        self.set_mana(self.current_mana - amount);
    }

    fn restore_mana(&mut self, amount: f32) {
        self.set_mana(self.current_mana + amount);
    }

    /// Variables shared by every cast of this caster
    pub fn blackboard(&self) -> &SharedVariables {
        &self.blackboard
    }

    /// Node registry used by `add_spell_node`
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    // ---- Spell lifecycle ----

    /// Create a spell seeded with a Magic node.
    ///
    /// Returns `false` and logs when the name is taken.
    pub fn create_spell(&mut self, name: &str) -> bool {
        if self.spells.contains_key(name) {
            tracing::warn!("Spell '{}' already exists", name);
            return false;
        }
        let mut graph = Graph::new(name);
        if let Some(seed) = self.registry.create_default(NodeKindTag::Magic) {
            graph.add_node(seed);
        }
        let definition = SpellDefinition::new(name, graph).with_cooldown(self.default_cooldown);
        self.spells.insert(name.to_string(), definition);
        tracing::info!("Created spell '{}'", name);
        true
    }

    /// Add a prepared definition.
    ///
    /// Returns `false` and logs when the name is taken.
    pub fn insert_spell(&mut self, mut definition: SpellDefinition) -> bool {
        if self.spells.contains_key(&definition.name) {
            tracing::warn!("Spell '{}' already exists", definition.name);
            return false;
        }
        definition.refresh_cached_cost();
        tracing::info!(
            "Registered spell '{}' ({} nodes, cost {:.1})",
            definition.name,
            definition.graph.node_count(),
            definition.cached_mana_cost
        );
        self.spells.insert(definition.name.clone(), definition);
        true
    }

    /// Remove a spell, its cooldown and its pending continuations
    pub fn remove_spell(&mut self, name: &str) -> Option<SpellDefinition> {
        let removed = self.spells.shift_remove(name);
        if removed.is_none() {
            tracing::warn!("Cannot remove unknown spell '{}'", name);
        } else {
            self.cooldowns.shift_remove(name);
            tracing::info!("Removed spell '{}'", name);
        }
        removed
    }

    /// Spell by name
    pub fn spell(&self, name: &str) -> Option<&SpellDefinition> {
        self.spells.get(name)
    }

    /// Mutable spell by name
    pub fn spell_mut(&mut self, name: &str) -> Option<&mut SpellDefinition> {
        self.spells.get_mut(name)
    }

    /// Registered spell names in creation order
    pub fn spell_names(&self) -> impl Iterator<Item = &str> {
        self.spells.keys().map(String::as_str)
    }

    /// Add a default node of `kind` to the inventory
    pub fn add_spell_node(&mut self, kind: NodeKindTag) -> Option<NodeId> {
        let Some(node) = self.registry.create_default(kind) else {
            tracing::warn!("No template registered for {}", kind);
            return None;
        };
        let id = node.id;
        self.inventory.insert(id, node);
        tracing::debug!("Added {} node {} to inventory", kind, id);
        Some(id)
    }

    /// Remove a node from the inventory and from every spell graph.
    ///
    /// Returns `false` and logs when the node was nowhere to be found.
    pub fn remove_spell_node(&mut self, id: NodeId) -> bool {
        let mut found = self.inventory.shift_remove(&id).is_some();
        for definition in self.spells.values_mut() {
            if definition.graph.remove_node(id).is_some() {
                definition.memory.forget_node(id);
                definition.refresh_cached_cost();
                found = true;
            }
        }
        if !found {
            tracing::warn!("Cannot remove unknown node {}", id);
        }
        found
    }

    /// Nodes available for authoring
    pub fn inventory(&self) -> impl Iterator<Item = &SpellNode> {
        self.inventory.values()
    }

    // ---- Economy ----

    /// Fresh cost of a spell
    pub fn spell_cost(&self, name: &str) -> Option<f32> {
        self.spells.get(name).map(SpellDefinition::mana_cost)
    }

    /// Seconds of cooldown left, if any
    pub fn cooldown_remaining(&self, name: &str) -> Option<f32> {
        self.cooldowns.get(name).copied()
    }

    /// Check every precondition of a cast and return its cost
    pub fn check_cast(&self, name: &str) -> Result<f32, CastError> {
        let definition = self
            .spells
            .get(name)
            .ok_or_else(|| CastError::UnknownSpell(name.to_string()))?;
        if let Some(&remaining) = self.cooldowns.get(name) {
            return Err(CastError::OnCooldown {
                spell: name.to_string(),
                remaining,
            });
        }
        let cost = definition.mana_cost();
        if self.current_mana < cost {
            return Err(CastError::InsufficientMana {
                spell: name.to_string(),
                required: cost,
                available: self.current_mana,
            });
        }
        if definition.graph.is_empty() {
            return Err(CastError::NoRoot(name.to_string()));
        }
        Ok(cost)
    }

    /// Whether a cast would be accepted now
    pub fn can_cast(&self, name: &str) -> bool {
        self.check_cast(name).is_ok()
    }

    // ---- Casting ----

    /// Cast a spell.
    ///
    /// An authoritative caster checks, runs the graph, then charges mana and
    /// arms the cooldown. A predicting caster does the same against its local
    /// state, and forwards the request whether or not the local check passed.
    pub fn execute_spell(
        &mut self,
        host: &mut dyn SpellHost,
        request: CastRequest,
    ) -> Result<CastOutcome, CastError> {
        match self.authority {
            Authority::Authoritative => self.cast(host, &request, false),
            Authority::Predicting => {
                let result = self.cast(host, &request, true);
                let debited = result.as_ref().map_or(0.0, |outcome| outcome.mana_spent);
                self.predictions.record(request, debited);
                result
            }
        }
    }

    fn cast(
        &mut self,
        host: &mut dyn SpellHost,
        request: &CastRequest,
        predicted: bool,
    ) -> Result<CastOutcome, CastError> {
        let name = request.spell.as_str();
        let cost = match self.check_cast(name) {
            Ok(cost) => cost,
            Err(reason) => {
                tracing::info!("Cast of '{}' rejected: {}", name, reason);
                self.events.push(CasterEvent::CastRejected {
                    spell: name.to_string(),
                    reason: reason.clone(),
                });
                return Err(reason);
            }
        };

        let Some(definition) = self.spells.get_mut(name) else {
            return Err(CastError::UnknownSpell(name.to_string()));
        };
        let Some(root) = resolve_root(&definition.graph) else {
            return Err(CastError::NoRoot(name.to_string()));
        };

        let mut ctx = ExecutionContext::new(self.caster, self.blackboard.clone())
            .with_target(request.target)
            .with_location(request.location)
            .with_event(request.event)
            .with_started_at(host.now());

        let SpellDefinition {
            graph,
            memory,
            pending,
            cooldown_seconds,
            ..
        } = definition;
        let report = Interpreter::new(graph, host, memory, &self.options).run(root, &mut ctx);
        let scheduled = report.scheduled.len();
        pending.extend(report.scheduled);
        let cooldown = *cooldown_seconds;

        self.consume_mana(cost);
        if cooldown > 0.0 {
            self.cooldowns.insert(name.to_string(), cooldown);
        }

        tracing::info!(
            "Cast '{}'{}: {} node(s), power {:.2}, cost {:.1}, mana {:.1}/{:.1}",
            name,
            if predicted { " (predicted)" } else { "" },
            report.executed,
            ctx.spell_power,
            cost,
            self.current_mana,
            self.max_mana
        );
        self.events.push(CasterEvent::SpellCast {
            spell: name.to_string(),
            mana_spent: cost,
            predicted,
        });

        Ok(CastOutcome {
            spell: name.to_string(),
            mana_spent: cost,
            spell_power: ctx.spell_power,
            executed: report.executed,
            truncated: report.truncated,
            scheduled,
            predicted,
        })
    }

    // ---- Prediction ----

    /// Apply the authority's verdict to the oldest matching prediction
    pub fn apply_cast_result(&mut self, result: &CastResult) {
        let Some(prediction) = self.predictions.take_oldest(&result.spell) else {
            tracing::warn!("No outstanding prediction for '{}'", result.spell);
            return;
        };
        if result.success {
            tracing::debug!("Prediction of '{}' confirmed", result.spell);
            self.events.push(CasterEvent::PredictionConfirmed {
                spell: result.spell.clone(),
            });
            return;
        }

        let refunded = if prediction.did_debit() {
            let before = self.current_mana;
            self.restore_mana(result.actual_mana_cost);
            self.current_mana - before
        } else {
            0.0
        };
        tracing::info!(
            "Prediction of '{}' rejected, refunded {:.1} mana",
            result.spell,
            refunded
        );
        self.events.push(CasterEvent::PredictionRejected {
            spell: result.spell.clone(),
            refunded,
        });
    }

    /// Requests waiting to be sent to the authority
    pub fn drain_outbox(&mut self) -> Vec<CastRequest> {
        self.predictions.drain_outbox()
    }

    /// Outstanding predictions
    pub fn predictions(&self) -> &PredictionLedger {
        &self.predictions
    }

    // ---- Tick ----

    /// Advance the caster clock: regenerate mana, decay cooldowns and fire due
    /// continuations
    pub fn advance(&mut self, dt: f32, host: &mut dyn SpellHost) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        if self.current_mana < self.max_mana {
            self.restore_mana(self.mana_regen_rate * dt);
        }

        let mut ready = Vec::new();
        self.cooldowns.retain(|spell, remaining| {
            *remaining -= dt;
            if *remaining <= 0.0 {
                ready.push(spell.clone());
                false
            } else {
                true
            }
        });
        for spell in ready {
            tracing::debug!("Cooldown of '{}' finished", spell);
            self.events.push(CasterEvent::CooldownReady { spell });
        }

        for definition in self.spells.values_mut() {
            if definition.pending.is_empty() {
                continue;
            }
            let mut due = Vec::new();
            let mut waiting = Vec::new();
            for mut continuation in definition.pending.drain(..) {
                continuation.remaining -= dt;
                if continuation.remaining <= 0.0 {
                    due.push(continuation);
                } else {
                    waiting.push(continuation);
                }
            }
            if !due.is_empty() {
                let mut run = Interpreter::new(
                    &definition.graph,
                    &mut *host,
                    &mut definition.memory,
                    &self.options,
                );
                for continuation in due {
                    run.resume(continuation);
                }
                let report = run.finish();
                tracing::debug!(
                    "Resumed '{}': {} node(s), {} rescheduled",
                    definition.name,
                    report.executed,
                    report.scheduled.len()
                );
                waiting.extend(report.scheduled);
            }
            definition.pending = waiting;
        }
    }

    /// Continuations waiting for a spell
    pub fn pending_continuations(&self, name: &str) -> &[PendingContinuation] {
        self.spells.get(name).map_or(&[], |d| d.pending.as_slice())
    }

    /// Cost walk along the `ExecOut` chain of a spell's root
    pub fn compile_spell(&self, name: &str) -> Option<CompiledAbility> {
        let definition = self.spells.get(name)?;
        let root = resolve_root(&definition.graph)?;
        Some(compile_ability(&definition.graph, root))
    }

    /// Take queued notifications
    pub fn drain_events(&mut self) -> Vec<CasterEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_graph::host::Sandbox;

    fn caster(authority: Authority) -> CasterState {
        CasterState::new(ActorId(1), &CasterConfig::default(), authority)
    }

    #[test]
    fn test_create_spell_is_idempotent() {
        let mut state = caster(Authority::Authoritative);
        assert!(state.create_spell("Fireball"));
        assert!(!state.create_spell("Fireball"));
        assert_eq!(state.spell_cost("Fireball"), Some(20.0));
        assert!(state.remove_spell("Fireball").is_some());
        assert!(state.remove_spell("Fireball").is_none());
    }

    #[test]
    fn test_remove_spell_node_everywhere() {
        let mut state = caster(Authority::Authoritative);
        state.create_spell("Fireball");
        let seeded = state.spell("Fireball").unwrap().graph.node_ids().next().unwrap();
        let stocked = state.add_spell_node(NodeKindTag::Effect).unwrap();
        assert_eq!(state.inventory().count(), 1);

        assert!(state.remove_spell_node(seeded));
        assert!(state.remove_spell_node(stocked));
        assert!(!state.remove_spell_node(stocked));
        assert_eq!(state.spell_cost("Fireball"), Some(0.0));
        assert_eq!(
            state.check_cast("Fireball"),
            Err(CastError::NoRoot("Fireball".into()))
        );
    }

    #[test]
    fn test_unknown_spell_rejected() {
        let mut state = caster(Authority::Authoritative);
        let mut host = Sandbox::new();
        let err = state
            .execute_spell(&mut host, CastRequest::new("Nope"))
            .unwrap_err();
        assert_eq!(err, CastError::UnknownSpell("Nope".into()));
        assert!(matches!(
            state.drain_events().as_slice(),
            [CasterEvent::CastRejected { .. }]
        ));
    }

    #[test]
    fn test_regen_clamps_to_max() {
        let config = CasterConfig {
            starting_mana: Some(90.0),
            ..CasterConfig::default()
        };
        let mut state = CasterState::new(ActorId(1), &config, Authority::Authoritative);
        let mut host = Sandbox::new();
        state.advance(1.0, &mut host);
        assert_eq!(state.current_mana(), 95.0);
        state.advance(10.0, &mut host);
        assert_eq!(state.current_mana(), 100.0);
    }

    #[test]
    fn test_compile_spell() {
        let mut state = caster(Authority::Authoritative);
        state.create_spell("Fireball");
        let compiled = state.compile_spell("Fireball").unwrap();
        assert_eq!(compiled.nodes.len(), 1);
        assert_eq!(compiled.mana_cost, 20.0);
        assert!(state.compile_spell("Missing").is_none());
    }
}
