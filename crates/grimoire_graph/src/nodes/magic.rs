// SPDX-License-Identifier: MIT OR Apache-2.0
//! Magic node: elemental damage with a projectile.

use super::{base_input_pins, base_output_pins, NodeBehavior, NodeOutcome};
use crate::context::{names as vars, ExecutionContext};
use crate::evaluation::Interpreter;
use crate::host::Projectile;
use crate::node::{Rarity, SpellNode};
use crate::port::{names, PinDesc};
use crate::value::{TypedValue, ValueKind, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spell element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Element {
    /// Fire
    #[default]
    Fire,
    /// Water
    Water,
    /// Earth
    Earth,
    /// Electricity
    Electricity,
    /// Ice
    Ice,
    /// Plant
    Plant,
    /// Metal
    Metal,
    /// Poison
    Poison,
}

impl Element {
    /// All elements
    pub const ALL: [Element; 8] = [
        Element::Fire,
        Element::Water,
        Element::Earth,
        Element::Electricity,
        Element::Ice,
        Element::Plant,
        Element::Metal,
        Element::Poison,
    ];

    /// Name as stored in variables
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fire => "Fire",
            Self::Water => "Water",
            Self::Earth => "Earth",
            Self::Electricity => "Electricity",
            Self::Ice => "Ice",
            Self::Plant => "Plant",
            Self::Metal => "Metal",
            Self::Poison => "Poison",
        }
    }

    /// Parse a name produced by [`Element::name`]
    pub fn from_name(name: &str) -> Option<Element> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a follow-up element reacts with the previous one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInteraction {
    /// Element already present
    pub source: Element,
    /// Incoming element
    pub target: Element,
    /// Flavor text
    #[serde(default)]
    pub description: String,
    /// Damage multiplier
    pub damage_multiplier: f32,
    /// Duration of a sustained effect
    #[serde(default)]
    pub duration: f32,
    /// Whether the interaction leaves a sustained effect
    #[serde(default)]
    pub sustained: bool,
}

/// Element interaction lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementTable {
    /// Known interactions
    pub interactions: Vec<ElementInteraction>,
}

impl ElementTable {
    /// Find the interaction of a pair
    pub fn lookup(&self, source: Element, target: Element) -> Option<&ElementInteraction> {
        self.interactions
            .iter()
            .find(|i| i.source == source && i.target == target)
    }

    /// Damage multiplier of a pair; 1.0 when no interaction is known
    pub fn multiplier(&self, source: Element, target: Element) -> f32 {
        self.lookup(source, target)
            .map_or(1.0, |i| i.damage_multiplier)
    }
}

/// Magic node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagicNode {
    /// Unscaled damage
    pub base_damage: f32,
    /// Element
    pub element: Element,
    /// Projectile range
    pub range: f32,
    /// Cast time in seconds
    pub cast_time: f32,
}

impl Default for MagicNode {
    fn default() -> Self {
        Self {
            base_damage: 1.0,
            element: Element::Fire,
            range: 500.0,
            cast_time: 1.0,
        }
    }
}

impl NodeBehavior for MagicNode {
    fn input_pins(&self) -> Vec<PinDesc> {
        base_input_pins()
    }

    fn output_pins(&self) -> Vec<PinDesc> {
        let mut pins = base_output_pins();
        pins.push(PinDesc::data_output(names::DAMAGE, ValueKind::Float));
        pins.push(PinDesc::data_output(names::POWER, ValueKind::Float));
        pins
    }

    fn base_power(&self, rarity: Rarity) -> f32 {
        self.base_damage * rarity.scale_factor()
    }

    fn on_execute(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> NodeOutcome {
        let power = self.base_power(node.rarity);

        let previous = ctx
            .get(vars::LAST_ELEMENT)
            .as_str()
            .and_then(Element::from_name);
        let mut multiplier = 1.0;
        if let Some(previous) = previous {
            if let Some(interaction) = run.options().elements.lookup(previous, self.element) {
                multiplier = interaction.damage_multiplier;
                if interaction.sustained {
                    tracing::info!(
                        "{} + {}: {} for {:.2}s",
                        previous,
                        self.element,
                        interaction.description,
                        interaction.duration
                    );
                }
            }
        }
        let damage = power * multiplier;

        if let Some(target) = ctx.target {
            run.host_mut().apply_damage(target, damage, Some(self.element));
        } else {
            tracing::debug!("Magic '{}' has no target", node.name);
        }

        let location = run.host().location(ctx.caster).unwrap_or(Vec3::ZERO);
        run.host_mut().spawn_projectile(Projectile {
            owner: ctx.caster,
            element: self.element,
            location,
            lifespan: self.range / 1000.0,
        });

        ctx.spell_power += power;
        ctx.set_local(vars::LAST_ELEMENT, self.element.name());
        run.publish(node.id, names::DAMAGE, TypedValue::Float(damage));
        run.publish(node.id, names::POWER, TypedValue::Float(power));

        tracing::debug!(
            "Magic '{}' {} power={:.2} damage={:.2}",
            node.name,
            self.element,
            power,
            damage
        );
        NodeOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::shared_variables;
    use crate::evaluation::{ExecutionOptions, SpellMemory};
    use crate::graph::Graph;
    use crate::host::{Sandbox, SandboxActor, SideEffect, SpellHost};
    use crate::node::NodeKind;
    use crate::value::ActorId;

    fn world() -> Sandbox {
        let mut world = Sandbox::new();
        world.spawn(ActorId(1), SandboxActor::new(Vec3::new(1.0, 2.0, 3.0), 100.0));
        world.spawn(ActorId(2), SandboxActor::new(Vec3::ZERO, 100.0));
        world
    }

    #[test]
    fn test_damage_scales_with_rarity() {
        let mut graph = Graph::new("magic");
        let id = graph.add_node(
            SpellNode::new(NodeKind::Magic(MagicNode {
                base_damage: 10.0,
                ..MagicNode::default()
            }))
            .with_rarity(Rarity::Epic),
        );
        let mut host = world();
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables())
            .with_target(Some(ActorId(2)));
        Interpreter::new(&graph, &mut host, &mut memory, &options).run(id, &mut ctx);

        assert_eq!(ctx.spell_power, 20.0);
        assert_eq!(host.damage_dealt_to(ActorId(2)), 20.0);
        assert_eq!(host.health_fraction(ActorId(2)), Some(0.8));
        assert!(host.effects().iter().any(|e| matches!(
            e,
            SideEffect::Projectile(p) if p.lifespan == 0.5 && p.location == Vec3::new(1.0, 2.0, 3.0)
        )));
    }

    #[test]
    fn test_element_combo_multiplier() {
        let mut graph = Graph::new("combo");
        let water = graph.add_node(SpellNode::new(NodeKind::Magic(MagicNode {
            element: Element::Water,
            ..MagicNode::default()
        })));
        let shock = graph.add_node(SpellNode::new(NodeKind::Magic(MagicNode {
            element: Element::Electricity,
            ..MagicNode::default()
        })));
        graph.connect(water, names::EXEC_OUT, shock, names::EXEC_IN).unwrap();

        let options = ExecutionOptions::default().with_elements(ElementTable {
            interactions: vec![ElementInteraction {
                source: Element::Water,
                target: Element::Electricity,
                description: "Conducted".into(),
                damage_multiplier: 3.0,
                duration: 2.0,
                sustained: true,
            }],
        });
        let mut host = world();
        let mut memory = SpellMemory::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables())
            .with_target(Some(ActorId(2)));
        Interpreter::new(&graph, &mut host, &mut memory, &options).run(water, &mut ctx);

        assert_eq!(host.damage_dealt_to(ActorId(2)), 4.0);
        assert_eq!(ctx.get(vars::LAST_ELEMENT), TypedValue::from("Electricity"));
    }

    #[test]
    fn test_no_target_still_adds_power() {
        let mut graph = Graph::new("solo");
        let id = graph.add_node(SpellNode::new(NodeKind::Magic(MagicNode::default())));
        let mut host = world();
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        Interpreter::new(&graph, &mut host, &mut memory, &options).run(id, &mut ctx);

        assert_eq!(ctx.spell_power, 1.0);
        assert!(host
            .effects()
            .iter()
            .all(|e| !matches!(e, SideEffect::Damage { .. })));
    }
}
