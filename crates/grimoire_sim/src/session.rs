// SPDX-License-Identifier: MIT OR Apache-2.0
//! Session files: actors, spells and a timeline of casts, stored as RON.
//!
//! Spell graphs are written with symbolic node keys and assembled through
//! [`Graph::connect`], so every link in a session is validated on load.

use grimoire_caster::{CastRequest, CasterConfig, ConfigError, InputSlot, SpellDefinition};
use grimoire_graph::graph::ConnectionError;
use grimoire_graph::node::{NodeKind, Rarity, SpellNode};
use grimoire_graph::port::names;
use grimoire_graph::value::{ActorId, Vec3};
use grimoire_graph::Graph;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Session loading errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// File could not be read
    #[error("Failed to read session: {0}")]
    Io(#[from] std::io::Error),

    /// RON syntax or shape error
    #[error("Failed to parse session: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Caster settings out of range
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Two nodes of one spell share a key
    #[error("Spell '{spell}' declares node '{key}' twice")]
    DuplicateNode {
        /// Spell name
        spell: String,
        /// Node key
        key: String,
    },

    /// A link names a node that was never declared
    #[error("Spell '{spell}' links unknown node '{key}'")]
    UnknownNode {
        /// Spell name
        spell: String,
        /// Node key
        key: String,
    },

    /// The graph refused a link
    #[error("Spell '{spell}' has an invalid link: {source}")]
    Connection {
        /// Spell name
        spell: String,
        /// Underlying error
        #[source]
        source: ConnectionError,
    },

    /// Other inconsistent settings
    #[error("Invalid session: {0}")]
    Invalid(String),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

fn default_caster() -> ActorId {
    ActorId(1)
}

fn default_tick_rate() -> f32 {
    30.0
}

fn default_duration() -> f32 {
    5.0
}

fn default_latency() -> f32 {
    0.1
}

fn default_max_health() -> f32 {
    100.0
}

fn default_from_pin() -> String {
    names::EXEC_OUT.to_string()
}

fn default_to_pin() -> String {
    names::EXEC_IN.to_string()
}

/// An actor placed in both worlds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSpec {
    /// Actor ID
    pub id: ActorId,
    /// Spawn location
    #[serde(default)]
    pub location: Vec3,
    /// Maximum health
    #[serde(default = "default_max_health")]
    pub max_health: f32,
}

/// A node declared under a symbolic key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Key used by links
    pub key: String,
    /// Display name; the kind name when absent
    #[serde(default)]
    pub name: Option<String>,
    /// Rarity tier
    #[serde(default)]
    pub rarity: Rarity,
    /// Unscaled cost; the kind default when absent
    #[serde(default)]
    pub mana_cost: Option<f32>,
    /// Kind and configuration
    pub kind: NodeKind,
}

/// A pin-to-pin link between two declared nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// Source node key
    pub from: String,
    /// Source pin
    #[serde(default = "default_from_pin")]
    pub from_pin: String,
    /// Target node key
    pub to: String,
    /// Target pin
    #[serde(default = "default_to_pin")]
    pub to_pin: String,
}

/// A spell written with symbolic node keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellSpec {
    /// Spell name
    pub name: String,
    /// Cooldown in seconds
    #[serde(default)]
    pub cooldown: f32,
    /// Input slot
    #[serde(default)]
    pub binding: Option<InputSlot>,
    /// Nodes in insertion order
    pub nodes: Vec<NodeSpec>,
    /// Links between nodes
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

impl SpellSpec {
    /// Assemble the graph and wrap it in a definition
    pub fn build(&self) -> Result<SpellDefinition> {
        let mut graph = Graph::new(self.name.as_str());
        let mut keys = IndexMap::new();
        for spec in &self.nodes {
            if keys.contains_key(&spec.key) {
                return Err(SessionError::DuplicateNode {
                    spell: self.name.clone(),
                    key: spec.key.clone(),
                });
            }
            let mut node = SpellNode::new(spec.kind.clone()).with_rarity(spec.rarity);
            if let Some(name) = &spec.name {
                node = node.with_name(name.as_str());
            }
            if let Some(cost) = spec.mana_cost {
                node = node.with_mana_cost(cost);
            }
            keys.insert(spec.key.clone(), graph.add_node(node));
        }

        let lookup = |key: &str| {
            keys.get(key).copied().ok_or_else(|| SessionError::UnknownNode {
                spell: self.name.clone(),
                key: key.to_string(),
            })
        };
        for link in &self.links {
            let from = lookup(&link.from)?;
            let to = lookup(&link.to)?;
            graph
                .connect(from, &link.from_pin, to, &link.to_pin)
                .map_err(|source| SessionError::Connection {
                    spell: self.name.clone(),
                    source,
                })?;
        }

        let mut definition = SpellDefinition::new(self.name.as_str(), graph)
            .with_cooldown(self.cooldown);
        definition.input_binding = self.binding;
        Ok(definition)
    }
}

/// A cast issued by the client at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCast {
    /// Seconds from session start
    pub at: f32,
    /// Request to issue
    pub request: CastRequest,
}

/// A complete simulation setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session name
    #[serde(default)]
    pub name: String,
    /// Economy and interpreter settings for both sides
    #[serde(default)]
    pub config: CasterConfig,
    /// Starting mana on the client; `config` decides when absent
    #[serde(default)]
    pub client_mana: Option<f32>,
    /// Starting mana on the server; `config` decides when absent
    #[serde(default)]
    pub server_mana: Option<f32>,
    /// Actor that owns the spells
    #[serde(default = "default_caster")]
    pub caster: ActorId,
    /// Simulation steps per second
    #[serde(default = "default_tick_rate")]
    pub tick_rate: f32,
    /// Seconds to simulate
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// One-way link latency in seconds
    #[serde(default = "default_latency")]
    pub latency: f32,
    /// Actors in the world
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
    /// Spells known to both sides
    #[serde(default)]
    pub spells: Vec<SpellSpec>,
    /// Client casts in time order
    #[serde(default)]
    pub casts: Vec<ScheduledCast>,
}

impl Session {
    /// Parse and validate a RON document
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let mut session: Session = ron::from_str(source)?;
        session.validate()?;
        session.casts.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(session)
    }

    /// Load a session file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let session = Self::from_ron_str(&content)?;
        tracing::info!(
            "Loaded session '{}' from {} ({} spells, {} casts)",
            session.name,
            path.display(),
            session.spells.len(),
            session.casts.len()
        );
        Ok(session)
    }

    /// Check settings and that every spell assembles
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.tick_rate.is_nan() || self.tick_rate <= 0.0 {
            return Err(SessionError::Invalid(format!(
                "tick_rate must be positive, got {}",
                self.tick_rate
            )));
        }
        if self.duration < 0.0 || self.latency < 0.0 {
            return Err(SessionError::Invalid(
                "duration and latency must be non-negative".to_string(),
            ));
        }
        for mana in [self.client_mana, self.server_mana].into_iter().flatten() {
            if !(0.0..=self.config.max_mana).contains(&mana) {
                return Err(SessionError::Invalid(format!(
                    "starting mana {} is outside 0..={}",
                    mana, self.config.max_mana
                )));
            }
        }
        for spell in &self.spells {
            spell.build()?;
        }
        Ok(())
    }

    /// Caster settings for one side
    pub fn config_with_mana(&self, starting_mana: Option<f32>) -> CasterConfig {
        CasterConfig {
            starting_mana: starting_mana.or(self.config.starting_mana),
            ..self.config.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUEL: &str = include_str!("../sessions/duel.ron");

    #[test]
    fn test_sample_session_parses() {
        let session = Session::from_ron_str(DUEL).unwrap();
        assert_eq!(session.caster, ActorId(1));
        assert_eq!(session.spells.len(), 2);
        assert_eq!(session.casts.len(), 3);
        let fireball = session.spells[0].build().unwrap();
        assert_eq!(fireball.graph.node_count(), 2);
        assert_eq!(fireball.cooldown_seconds, 1.0);
        assert_eq!(fireball.mana_cost(), 20.0);
    }

    #[test]
    fn test_unknown_link_target() {
        let spec = SpellSpec {
            name: "Broken".into(),
            cooldown: 0.0,
            binding: None,
            nodes: vec![NodeSpec {
                key: "a".into(),
                name: None,
                rarity: Rarity::Common,
                mana_cost: None,
                kind: NodeKind::default_for(grimoire_graph::NodeKindTag::Magic),
            }],
            links: vec![LinkSpec {
                from: "a".into(),
                from_pin: default_from_pin(),
                to: "b".into(),
                to_pin: default_to_pin(),
            }],
        };
        assert!(matches!(
            spec.build(),
            Err(SessionError::UnknownNode { key, .. }) if key == "b"
        ));
    }

    #[test]
    fn test_invalid_tick_rate() {
        let err = Session::from_ron_str("(tick_rate: 0.0)").unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
    }
}
