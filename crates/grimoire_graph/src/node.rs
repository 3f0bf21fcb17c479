// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spell node definitions, rarity scaling and the node registry.

use crate::nodes::{
    ConditionNode, EffectNode, FlowNode, MagicNode, NodeBehavior, TriggerNode, VariableNode,
};
use crate::port::PinDesc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rarity tier of a node.
///
/// Higher tiers monotonically scale power, cost, iteration caps and
/// connection limits, and unlock extra behavior on some node kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Rarity {
    /// Tier 1
    #[default]
    Common,
    /// Tier 2
    Uncommon,
    /// Tier 3
    Rare,
    /// Tier 4
    Epic,
    /// Tier 5
    Legendary,
}

impl Rarity {
    /// All tiers in ascending order
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    /// Multiplier applied to power and mana cost
    pub fn scale_factor(&self) -> f32 {
        match self {
            Self::Common => 1.0,
            Self::Uncommon => 1.25,
            Self::Rare => 1.5,
            Self::Epic => 2.0,
            Self::Legendary => 2.5,
        }
    }

    /// Upper bound on loop iterations and timer repeats
    pub fn loop_cap(&self) -> u32 {
        match self {
            Self::Common => 3,
            Self::Uncommon => 5,
            Self::Rare => 10,
            Self::Epic => 20,
            Self::Legendary => 50,
        }
    }

    /// Maximum number of connections on one execution output pin
    pub fn max_connections(&self) -> usize {
        match self {
            Self::Common => 1,
            Self::Uncommon => 2,
            Self::Rare => 3,
            Self::Epic => 4,
            Self::Legendary => 5,
        }
    }
}

/// Discriminant of [`NodeKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKindTag {
    /// Damage/elemental effect
    Magic,
    /// Branch predicate
    Condition,
    /// Direct actor mutation
    Effect,
    /// Control-flow combinator
    Flow,
    /// Typed storage and arithmetic
    Variable,
    /// Event-gated entry point
    Trigger,
}

impl NodeKindTag {
    /// All kinds in registry order
    pub const ALL: [NodeKindTag; 6] = [
        NodeKindTag::Magic,
        NodeKindTag::Condition,
        NodeKindTag::Effect,
        NodeKindTag::Flow,
        NodeKindTag::Variable,
        NodeKindTag::Trigger,
    ];

    /// Mana cost a fresh node of this kind starts with
    pub fn default_mana_cost(&self) -> f32 {
        match self {
            Self::Magic => 20.0,
            Self::Effect => 10.0,
            Self::Condition => 5.0,
            Self::Flow => 8.0,
            Self::Variable => 3.0,
            Self::Trigger => 0.0,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Magic => "Magic",
            Self::Condition => "Condition",
            Self::Effect => "Effect",
            Self::Flow => "Flow",
            Self::Variable => "Variable",
            Self::Trigger => "Trigger",
        }
    }

    /// Registry identifier of the default template for this kind
    pub fn template_id(&self) -> &'static str {
        match self {
            Self::Magic => "magic",
            Self::Condition => "condition",
            Self::Effect => "effect",
            Self::Flow => "flow",
            Self::Variable => "variable",
            Self::Trigger => "trigger",
        }
    }
}

impl fmt::Display for NodeKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed set of node kinds with their configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Magic node
    Magic(MagicNode),
    /// Condition node
    Condition(ConditionNode),
    /// Effect node
    Effect(EffectNode),
    /// Flow node
    Flow(FlowNode),
    /// Variable node
    Variable(VariableNode),
    /// Trigger node
    Trigger(TriggerNode),
}

impl NodeKind {
    /// Get the discriminant
    pub fn tag(&self) -> NodeKindTag {
        match self {
            Self::Magic(_) => NodeKindTag::Magic,
            Self::Condition(_) => NodeKindTag::Condition,
            Self::Effect(_) => NodeKindTag::Effect,
            Self::Flow(_) => NodeKindTag::Flow,
            Self::Variable(_) => NodeKindTag::Variable,
            Self::Trigger(_) => NodeKindTag::Trigger,
        }
    }

    /// Default configuration of a kind
    pub fn default_for(tag: NodeKindTag) -> Self {
        match tag {
            NodeKindTag::Magic => Self::Magic(MagicNode::default()),
            NodeKindTag::Condition => Self::Condition(ConditionNode::default()),
            NodeKindTag::Effect => Self::Effect(EffectNode::default()),
            NodeKindTag::Flow => Self::Flow(FlowNode::default()),
            NodeKindTag::Variable => Self::Variable(VariableNode::default()),
            NodeKindTag::Trigger => Self::Trigger(TriggerNode::default()),
        }
    }

    /// Behavior implementation for this kind
    pub fn behavior(&self) -> &dyn NodeBehavior {
        match self {
            Self::Magic(n) => n,
            Self::Condition(n) => n,
            Self::Effect(n) => n,
            Self::Flow(n) => n,
            Self::Variable(n) => n,
            Self::Trigger(n) => n,
        }
    }
}

/// A node instance in a spell graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellNode {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// Category label
    pub category: String,
    /// Icon asset name
    pub icon: Option<String>,
    /// Custom color
    pub color: Option<[u8; 3]>,
    /// Position in the editor canvas
    pub position: [f32; 2],
    /// Rarity tier
    pub rarity: Rarity,
    /// Unscaled mana cost contribution
    pub mana_cost: f32,
    /// Kind and its configuration
    pub kind: NodeKind,
}

impl SpellNode {
    /// Create a node of the given kind with default cosmetics and cost
    pub fn new(kind: NodeKind) -> Self {
        let tag = kind.tag();
        Self {
            id: NodeId::new(),
            name: tag.name().to_string(),
            description: String::new(),
            category: tag.name().to_string(),
            icon: None,
            color: None,
            position: [0.0, 0.0],
            rarity: Rarity::Common,
            mana_cost: tag.default_mana_cost(),
            kind,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the rarity
    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    /// Set the unscaled mana cost
    pub fn with_mana_cost(mut self, mana_cost: f32) -> Self {
        self.mana_cost = mana_cost;
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Kind discriminant
    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    /// Rarity multiplier
    pub fn rarity_scale_factor(&self) -> f32 {
        self.rarity.scale_factor()
    }

    /// Mana cost after rarity scaling
    pub fn scaled_mana_cost(&self) -> f32 {
        self.mana_cost * self.rarity.scale_factor()
    }

    /// Power this node contributes
    pub fn base_power(&self) -> f32 {
        self.kind.behavior().base_power(self.rarity)
    }

    /// Declared input pins
    pub fn input_pins(&self) -> Vec<PinDesc> {
        self.kind.behavior().input_pins()
    }

    /// Declared output pins
    pub fn output_pins(&self) -> Vec<PinDesc> {
        self.kind.behavior().output_pins()
    }

    /// Find an input pin by name
    pub fn input_pin(&self, name: &str) -> Option<PinDesc> {
        self.input_pins().into_iter().find(|p| p.name == name)
    }

    /// Find an output pin by name
    pub fn output_pin(&self, name: &str) -> Option<PinDesc> {
        self.output_pins().into_iter().find(|p| p.name == name)
    }
}

/// Template from which inventory nodes are created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    /// Unique template identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Description
    pub description: String,
    /// Rarity of created nodes
    pub rarity: Rarity,
    /// Prototype configuration
    pub kind: NodeKind,
}

impl NodeTemplate {
    /// Create a node instance with a fresh ID
    pub fn instantiate(&self) -> SpellNode {
        let mut node = SpellNode::new(self.kind.clone())
            .with_name(self.name.clone())
            .with_rarity(self.rarity);
        node.description = self.description.clone();
        node
    }
}

/// Registry of available node templates
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    templates: IndexMap<String, NodeTemplate>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Register a template, replacing any with the same ID
    pub fn register(&mut self, template: NodeTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Get a template by ID
    pub fn get(&self, id: &str) -> Option<&NodeTemplate> {
        self.templates.get(id)
    }

    /// Get all registered templates
    pub fn templates(&self) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values()
    }

    /// Get templates of a kind
    pub fn templates_of_kind(&self, tag: NodeKindTag) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values().filter(move |t| t.kind.tag() == tag)
    }

    /// Create a node from a template ID
    pub fn create_node(&self, id: &str) -> Option<SpellNode> {
        self.get(id).map(NodeTemplate::instantiate)
    }

    /// Create a node from the default template of a kind
    pub fn create_default(&self, tag: NodeKindTag) -> Option<SpellNode> {
        self.create_node(tag.template_id())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the registry of built-in spell node templates
pub fn create_spell_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register(NodeTemplate {
        id: "magic".to_string(),
        name: "Magic".to_string(),
        description: "Elemental damage with a projectile".to_string(),
        rarity: Rarity::Common,
        kind: NodeKind::Magic(MagicNode::default()),
    });

    registry.register(NodeTemplate {
        id: "condition".to_string(),
        name: "Condition".to_string(),
        description: "Branch on a predicate".to_string(),
        rarity: Rarity::Common,
        kind: NodeKind::Condition(ConditionNode::default()),
    });

    registry.register(NodeTemplate {
        id: "effect".to_string(),
        name: "Effect".to_string(),
        description: "Apply a direct effect to an actor".to_string(),
        rarity: Rarity::Common,
        kind: NodeKind::Effect(EffectNode::default()),
    });

    registry.register(NodeTemplate {
        id: "flow".to_string(),
        name: "Flow".to_string(),
        description: "Control the order of execution".to_string(),
        rarity: Rarity::Common,
        kind: NodeKind::Flow(FlowNode::default()),
    });

    registry.register(NodeTemplate {
        id: "variable".to_string(),
        name: "Variable".to_string(),
        description: "Store and combine typed values".to_string(),
        rarity: Rarity::Common,
        kind: NodeKind::Variable(VariableNode::default()),
    });

    registry.register(NodeTemplate {
        id: "trigger".to_string(),
        name: "Trigger".to_string(),
        description: "Gate the spell on an event".to_string(),
        rarity: Rarity::Common,
        kind: NodeKind::Trigger(TriggerNode::default()),
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::names;

    #[test]
    fn test_rarity_is_monotonic() {
        for pair in Rarity::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].scale_factor() < pair[1].scale_factor());
            assert!(pair[0].loop_cap() < pair[1].loop_cap());
            assert!(pair[0].max_connections() < pair[1].max_connections());
        }
    }

    #[test]
    fn test_default_costs() {
        assert_eq!(SpellNode::new(NodeKind::default_for(NodeKindTag::Magic)).mana_cost, 20.0);
        assert_eq!(SpellNode::new(NodeKind::default_for(NodeKindTag::Trigger)).mana_cost, 0.0);
        let epic = SpellNode::new(NodeKind::default_for(NodeKindTag::Effect)).with_rarity(Rarity::Epic);
        assert_eq!(epic.scaled_mana_cost(), 20.0);
    }

    #[test]
    fn test_base_pins_present() {
        let node = SpellNode::new(NodeKind::default_for(NodeKindTag::Magic));
        assert!(node.input_pin(names::EXEC_IN).is_some());
        assert!(node.output_pin(names::EXEC_OUT).is_some());
    }

    #[test]
    fn test_registry_creates_fresh_ids() {
        let registry = create_spell_registry();
        assert_eq!(registry.templates().count(), NodeKindTag::ALL.len());
        let a = registry.create_default(NodeKindTag::Flow).unwrap();
        let b = registry.create_default(NodeKindTag::Flow).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.tag(), NodeKindTag::Flow);
        assert!(registry.create_node("missing").is_none());
    }
}
