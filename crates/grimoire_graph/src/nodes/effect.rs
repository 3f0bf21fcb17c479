// SPDX-License-Identifier: MIT OR Apache-2.0
//! Effect node: direct mutation of an actor.

use super::{base_output_pins, NodeBehavior, NodeOutcome};
use crate::context::ExecutionContext;
use crate::evaluation::Interpreter;
use crate::node::{Rarity, SpellNode};
use crate::port::{names, PinDesc};
use crate::value::{TypedValue, ValueKind, Vec3};
use serde::{Deserialize, Serialize};

/// Upward offset applied by a teleport
const TELEPORT_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 100.0);

/// Launch velocity applied by a knockback
const KNOCKBACK_VELOCITY: Vec3 = Vec3::new(0.0, 0.0, 300.0);

/// What an effect does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectType {
    /// Deal damage
    #[default]
    Damage,
    /// Move the actor up
    Teleport,
    /// Launch the actor up
    Knockback,
    /// Restore health
    Heal,
    /// Apply a timed status
    StatusEffect,
}

/// Timed status carried by an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusEffect {
    /// Damage over time
    #[default]
    Burning,
    /// Cannot move
    Frozen,
    /// Damage over time
    Poisoned,
    /// Cannot act
    Stunned,
}

/// Who an effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EffectTarget {
    /// The cast target; skipped when there is none
    #[default]
    Target,
    /// The caster
    Caster,
}

/// Effect node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectNode {
    /// Effect to apply
    pub effect_type: EffectType,
    /// Unscaled intensity
    pub intensity: f32,
    /// Status for [`EffectType::StatusEffect`]
    pub status: StatusEffect,
    /// Status duration in seconds
    pub status_duration: f32,
    /// Who receives the effect
    pub applies_to: EffectTarget,
}

impl Default for EffectNode {
    fn default() -> Self {
        Self {
            effect_type: EffectType::Damage,
            intensity: 1.0,
            status: StatusEffect::Burning,
            status_duration: 5.0,
            applies_to: EffectTarget::Target,
        }
    }
}

impl NodeBehavior for EffectNode {
    fn output_pins(&self) -> Vec<PinDesc> {
        let mut pins = base_output_pins();
        pins.push(PinDesc::data_output(names::POWER, ValueKind::Float));
        pins
    }

    fn base_power(&self, rarity: Rarity) -> f32 {
        self.intensity * rarity.scale_factor()
    }

    fn on_execute(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> NodeOutcome {
        let power = self.base_power(node.rarity);
        ctx.spell_power += power;
        run.publish(node.id, names::POWER, TypedValue::Float(power));

        let affected = match self.applies_to {
            EffectTarget::Caster => Some(ctx.caster),
            EffectTarget::Target => ctx.target,
        };
        let Some(actor) = affected else {
            tracing::debug!("Effect '{}' has no target", node.name);
            return NodeOutcome::Continue;
        };

        let host = run.host_mut();
        match self.effect_type {
            EffectType::Damage => {
                host.apply_damage(actor, power, None);
                tracing::debug!("Effect: applied {:.2} damage to {}", power, actor);
            }
            EffectType::Teleport => {
                let destination = host.location(actor).unwrap_or(Vec3::ZERO) + TELEPORT_OFFSET;
                host.teleport(actor, destination);
                tracing::debug!("Effect: teleported {} to {}", actor, destination);
            }
            EffectType::Knockback => {
                host.launch(actor, KNOCKBACK_VELOCITY);
                tracing::debug!("Effect: knocked back {}", actor);
            }
            EffectType::Heal => {
                host.heal(actor, power);
                tracing::debug!("Effect: healed {} by {:.2}", actor, power);
            }
            EffectType::StatusEffect => {
                host.apply_status(actor, self.status, self.status_duration);
                tracing::debug!(
                    "Effect: applied {:?} to {} for {:.2}s",
                    self.status,
                    actor,
                    self.status_duration
                );
            }
        }
        NodeOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::shared_variables;
    use crate::evaluation::{ExecutionOptions, SpellMemory};
    use crate::graph::Graph;
    use crate::host::{Sandbox, SandboxActor, SpellHost};
    use crate::node::NodeKind;
    use crate::value::ActorId;

    fn run_effect(effect: EffectNode, rarity: Rarity, target: Option<ActorId>) -> (Sandbox, f32) {
        let mut graph = Graph::new("effect");
        let id = graph.add_node(SpellNode::new(NodeKind::Effect(effect)).with_rarity(rarity));
        let mut host = Sandbox::new();
        host.spawn(ActorId(1), SandboxActor::new(Vec3::ZERO, 100.0));
        let mut hurt = SandboxActor::new(Vec3::new(5.0, 0.0, 0.0), 100.0);
        hurt.health = 50.0;
        host.spawn(ActorId(2), hurt);
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables()).with_target(target);
        Interpreter::new(&graph, &mut host, &mut memory, &options).run(id, &mut ctx);
        (host, ctx.spell_power)
    }

    #[test]
    fn test_heal_uses_scaled_intensity() {
        let effect = EffectNode {
            effect_type: EffectType::Heal,
            intensity: 10.0,
            ..EffectNode::default()
        };
        let (host, power) = run_effect(effect, Rarity::Rare, Some(ActorId(2)));
        assert_eq!(power, 15.0);
        assert_eq!(host.actor(ActorId(2)).unwrap().health, 65.0);
    }

    #[test]
    fn test_teleport_moves_up() {
        let effect = EffectNode {
            effect_type: EffectType::Teleport,
            ..EffectNode::default()
        };
        let (host, _) = run_effect(effect, Rarity::Common, Some(ActorId(2)));
        assert_eq!(host.location(ActorId(2)), Some(Vec3::new(5.0, 0.0, 100.0)));
    }

    #[test]
    fn test_status_on_caster() {
        let effect = EffectNode {
            effect_type: EffectType::StatusEffect,
            status: StatusEffect::Stunned,
            applies_to: EffectTarget::Caster,
            ..EffectNode::default()
        };
        let (host, _) = run_effect(effect, Rarity::Common, None);
        assert!(host.has_status(ActorId(1), StatusEffect::Stunned));
    }

    #[test]
    fn test_missing_target_skips_effect() {
        let (host, power) = run_effect(EffectNode::default(), Rarity::Common, None);
        assert_eq!(power, 1.0);
        assert!(host.effects().is_empty());
    }
}
