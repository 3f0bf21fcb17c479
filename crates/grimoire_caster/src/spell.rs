// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spell definitions owned by a caster.

use grimoire_graph::analysis::spell_mana_cost;
use grimoire_graph::evaluation::{PendingContinuation, SpellMemory};
use grimoire_graph::Graph;
use serde::{Deserialize, Serialize};

/// Input slot a spell is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputSlot {
    /// Slot 1
    Spell1,
    /// Slot 2
    Spell2,
    /// Slot 3
    Spell3,
    /// Slot 4
    Spell4,
    /// Slot 5
    Spell5,
}

/// A named spell graph with its cast settings and cross-cast state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellDefinition {
    /// Spell name, unique per caster
    pub name: String,
    /// Node graph
    pub graph: Graph,
    /// Cost shown to players; never used to gate a cast
    #[serde(default)]
    pub cached_mana_cost: f32,
    /// Seconds before the spell can be cast again
    #[serde(default)]
    pub cooldown_seconds: f32,
    /// Bound input slot
    #[serde(default)]
    pub input_binding: Option<InputSlot>,
    /// Variable histories and persisted values
    #[serde(skip)]
    pub memory: SpellMemory,
    /// Continuations waiting on the clock
    #[serde(skip)]
    pub pending: Vec<PendingContinuation>,
}

impl SpellDefinition {
    /// Create a definition around a graph
    pub fn new(name: impl Into<String>, graph: Graph) -> Self {
        let mut definition = Self {
            name: name.into(),
            graph,
            cached_mana_cost: 0.0,
            cooldown_seconds: 0.0,
            input_binding: None,
            memory: SpellMemory::new(),
            pending: Vec::new(),
        };
        definition.refresh_cached_cost();
        definition
    }

    /// Set the cooldown
    pub fn with_cooldown(mut self, seconds: f32) -> Self {
        self.cooldown_seconds = seconds.max(0.0);
        self
    }

    /// Bind to an input slot
    pub fn with_binding(mut self, slot: InputSlot) -> Self {
        self.input_binding = Some(slot);
        self
    }

    /// Current cost, recomputed from the graph
    pub fn mana_cost(&self) -> f32 {
        spell_mana_cost(&self.graph)
    }

    /// Update the display cost
    pub fn refresh_cached_cost(&mut self) {
        self.cached_mana_cost = self.mana_cost();
    }
}
