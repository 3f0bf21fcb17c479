// SPDX-License-Identifier: MIT OR Apache-2.0
//! Condition node: evaluates a predicate and branches on it.

use super::{base_input_pins, base_output_pins, NodeBehavior, NodeOutcome, StatusEffect};
use crate::context::{names as vars, ExecutionContext, VariableScope};
use crate::evaluation::Interpreter;
use crate::node::{Rarity, SpellNode};
use crate::port::{names, PinDesc};
use crate::value::{TypedValue, ValueKind};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tolerance of float equality
pub const EQUALITY_EPSILON: f32 = 0.001;

/// Predicate evaluated by a condition node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionType {
    /// Fire `True` when the predicate holds
    #[default]
    IfThen,
    /// Fire `True` or `False`
    IfThenElse,
    /// Numeric comparison of `ConditionValue`
    Compare,
    /// Health fraction of the target
    HealthCheck,
    /// Caster to target distance
    DistanceCheck,
    /// Uniform random draw
    RandomChance,
    /// Status carried by the target
    HasStatus,
    /// Seconds since the cast started
    TimeBased,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// `=` within [`EQUALITY_EPSILON`]
    Equal,
    /// `!=` beyond [`EQUALITY_EPSILON`]
    NotEqual,
    /// `>`
    #[default]
    Greater,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
}

impl ComparisonOp {
    /// Compare two floats
    pub fn compare(&self, a: f32, b: f32) -> bool {
        match self {
            Self::Equal => (a - b).abs() <= EQUALITY_EPSILON,
            Self::NotEqual => (a - b).abs() > EQUALITY_EPSILON,
            Self::Greater => a > b,
            Self::GreaterEqual => a >= b,
            Self::Less => a < b,
            Self::LessEqual => a <= b,
        }
    }
}

/// Condition node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionNode {
    /// Predicate
    pub condition_type: ConditionType,
    /// Operator for numeric predicates
    pub comparison: ComparisonOp,
    /// Threshold for numeric predicates
    pub comparison_value: f32,
    /// Base success chance for [`ConditionType::RandomChance`]
    pub random_chance: f32,
    /// Variable read by [`ConditionType::IfThen`]
    pub variable_name: String,
    /// Status queried by [`ConditionType::HasStatus`]
    pub status: StatusEffect,
}

impl Default for ConditionNode {
    fn default() -> Self {
        Self {
            condition_type: ConditionType::IfThen,
            comparison: ComparisonOp::Greater,
            comparison_value: 0.5,
            random_chance: 0.5,
            variable_name: "Health".to_string(),
            status: StatusEffect::Burning,
        }
    }
}

impl ConditionNode {
    /// Success chance after rarity boosts, clamped to `[0, 1]`
    pub fn adjusted_chance(&self, rarity: Rarity) -> f32 {
        let chance = match rarity {
            Rarity::Common => self.random_chance,
            Rarity::Uncommon => self.random_chance * 1.1,
            Rarity::Rare => self.random_chance * 1.25,
            Rarity::Epic => self.random_chance * 1.5,
            Rarity::Legendary => 1.0,
        };
        chance.clamp(0.0, 1.0)
    }

    fn evaluate(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> bool {
        match self.condition_type {
            ConditionType::IfThen | ConditionType::IfThenElse => self.evaluate_if_then(ctx),
            ConditionType::Compare => {
                let a = ctx.get(vars::CONDITION_VALUE).as_float().unwrap_or(0.0);
                let b = match ctx.get(vars::COMPARE_VALUE) {
                    TypedValue::Float(v) => v,
                    TypedValue::Int(v) => v as f32,
                    _ => self.comparison_value,
                };
                self.comparison.compare(a, b)
            }
            ConditionType::HealthCheck => {
                let subject = ctx.target.unwrap_or(ctx.caster);
                let Some(health) = run.host().health_fraction(subject) else {
                    return false;
                };
                ctx.set_local(vars::TARGET_HEALTH, health);
                self.comparison.compare(health, self.comparison_value)
            }
            ConditionType::DistanceCheck => {
                let Some(from) = run.host().location(ctx.caster) else {
                    return false;
                };
                let to = ctx
                    .target
                    .and_then(|t| run.host().location(t))
                    .or(ctx.target_location);
                let Some(to) = to else {
                    return false;
                };
                let distance = from.distance(to);
                ctx.set_local(vars::DISTANCE, distance);
                self.comparison.compare(distance, self.comparison_value)
            }
            ConditionType::RandomChance => {
                let draw: f32 = run.rng().random();
                let threshold = self.adjusted_chance(node.rarity);
                ctx.set_local(vars::RANDOM_VALUE, draw);
                ctx.set_local(vars::CHANCE_THRESHOLD, threshold);
                draw <= threshold
            }
            ConditionType::HasStatus => {
                let subject = ctx.target.unwrap_or(ctx.caster);
                let has = run.host().has_status(subject, self.status);
                ctx.set_local(vars::HAS_STATUS, has);
                has
            }
            ConditionType::TimeBased => {
                let elapsed = (run.host().now() - ctx.started_at) as f32;
                ctx.set_local(vars::TIME_SINCE_START, elapsed);
                self.comparison.compare(elapsed, self.comparison_value)
            }
        }
    }

    fn evaluate_if_then(&self, ctx: &ExecutionContext) -> bool {
        if let TypedValue::Bool(v) = ctx.get(vars::BOOL_CONDITION) {
            return v;
        }
        if ctx.has_variable(&self.variable_name, VariableScope::Local) {
            return ctx.get(&self.variable_name).is_truthy();
        }
        ctx.spell_power > self.comparison_value
    }

    fn apply_rarity_effects(
        &self,
        node: &SpellNode,
        result: bool,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) {
        match node.rarity {
            Rarity::Common => {}
            Rarity::Uncommon => ctx.set_local(vars::CONDITION_CONFIDENCE, 0.8_f32),
            Rarity::Rare => {
                let last = ctx.get(vars::LAST_CONDITION_RESULT);
                ctx.set_local(vars::PREVIOUS_CONDITION, last);
                ctx.set_local(vars::LAST_CONDITION_RESULT, result);
            }
            Rarity::Epic => {
                if ctx.has_variable(vars::SECONDARY_CONDITION, VariableScope::Local) {
                    let secondary = ctx.get(vars::SECONDARY_CONDITION).is_truthy();
                    ctx.set_local(vars::COMPLEX_CONDITION, result && secondary);
                }
            }
            Rarity::Legendary => {
                if result {
                    let mut alternate = ctx.create_child_context();
                    alternate.spell_power *= 0.5;
                    tracing::debug!(
                        "Condition '{}' runs the false branch on a child context",
                        node.name
                    );
                    run.fire_pin(node.id, names::FALSE, &mut alternate);
                }
            }
        }
    }
}

impl NodeBehavior for ConditionNode {
    fn input_pins(&self) -> Vec<PinDesc> {
        let mut pins = base_input_pins();
        pins.push(PinDesc::data_input(names::CONDITION_VALUE, ValueKind::Float));
        pins.push(PinDesc::data_input(vars::COMPARE_VALUE, ValueKind::Float));
        pins.push(PinDesc::data_input(names::BOOL_CONDITION, ValueKind::Bool));
        pins
    }

    fn output_pins(&self) -> Vec<PinDesc> {
        let mut pins = base_output_pins();
        pins.push(PinDesc::exec_output(names::TRUE));
        pins.push(PinDesc::exec_output(names::FALSE));
        pins.push(PinDesc::data_output(names::RESULT, ValueKind::Bool));
        pins
    }

    fn on_execute(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> NodeOutcome {
        let result = self.evaluate(node, ctx, run);
        ctx.set_local(vars::CONDITION_RESULT, result);
        ctx.set_local(vars::LAST_CONDITION_NODE, node.name.as_str());
        run.publish(node.id, names::RESULT, TypedValue::Bool(result));
        tracing::debug!(
            "Condition '{}' ({:?}) evaluated to {}",
            node.name,
            self.condition_type,
            result
        );

        self.apply_rarity_effects(node, result, ctx, run);

        if result {
            run.fire_pin(node.id, names::TRUE, ctx);
        } else if self.condition_type == ConditionType::IfThenElse {
            run.fire_pin(node.id, names::FALSE, ctx);
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
    use crate::host::{Sandbox, SandboxActor};
    use crate::node::{NodeId, NodeKind};
    use crate::nodes::{VariableNode, VariableOperation};
    use crate::value::{ActorId, Vec3};

    struct Branches {
        graph: Graph,
        condition: NodeId,
    }

    fn marker(name: &str) -> SpellNode {
        SpellNode::new(NodeKind::Variable(VariableNode {
            variable_name: name.to_string(),
            variable_type: ValueKind::Int,
            operation: VariableOperation::Increment,
            default_value: TypedValue::Int(0),
            scope: VariableScope::Global,
            ..VariableNode::default()
        }))
    }

    fn branches(condition: ConditionNode, rarity: Rarity) -> Branches {
        let mut graph = Graph::new("cond");
        let id = graph.add_node(SpellNode::new(NodeKind::Condition(condition)).with_rarity(rarity));
        let t = graph.add_node(marker("TrueHits"));
        let f = graph.add_node(marker("FalseHits"));
        graph.connect(id, names::TRUE, t, names::EXEC_IN).unwrap();
        graph.connect(id, names::FALSE, f, names::EXEC_IN).unwrap();
        Branches { graph, condition: id }
    }

    fn run(b: &Branches, ctx: &mut ExecutionContext, host: &mut Sandbox) {
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default().with_seed(7);
        Interpreter::new(&b.graph, host, &mut memory, &options).run(b.condition, ctx);
    }

    fn hits(ctx: &ExecutionContext, name: &str) -> i32 {
        ctx.get_variable(name, VariableScope::Global).as_int().unwrap_or(0)
    }

    #[test]
    fn test_compare_operators() {
        assert!(ComparisonOp::Equal.compare(1.0, 1.0005));
        assert!(!ComparisonOp::Equal.compare(1.0, 1.01));
        assert!(ComparisonOp::NotEqual.compare(1.0, 1.01));
        assert!(ComparisonOp::GreaterEqual.compare(2.0, 2.0));
        assert!(ComparisonOp::LessEqual.compare(1.0, 2.0));
        assert!(!ComparisonOp::Less.compare(2.0, 1.0));
    }

    #[test]
    fn test_if_then_else_is_exclusive() {
        let b = branches(
            ConditionNode {
                condition_type: ConditionType::IfThenElse,
                ..ConditionNode::default()
            },
            Rarity::Epic,
        );
        let mut host = Sandbox::new();

        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        ctx.set_local(vars::BOOL_CONDITION, false);
        run(&b, &mut ctx, &mut host);
        assert_eq!((hits(&ctx, "TrueHits"), hits(&ctx, "FalseHits")), (0, 1));
        assert_eq!(ctx.get(vars::CONDITION_RESULT), TypedValue::Bool(false));

        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        ctx.set_local(vars::BOOL_CONDITION, true);
        run(&b, &mut ctx, &mut host);
        assert_eq!((hits(&ctx, "TrueHits"), hits(&ctx, "FalseHits")), (1, 0));
    }

    #[test]
    fn test_if_then_has_no_false_branch() {
        let b = branches(ConditionNode::default(), Rarity::Common);
        let mut host = Sandbox::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        ctx.set_local("Health", 0);
        run(&b, &mut ctx, &mut host);
        assert_eq!((hits(&ctx, "TrueHits"), hits(&ctx, "FalseHits")), (0, 0));
    }

    #[test]
    fn test_if_then_falls_back_to_spell_power() {
        let b = branches(ConditionNode::default(), Rarity::Common);
        let mut host = Sandbox::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        ctx.spell_power = 0.6;
        run(&b, &mut ctx, &mut host);
        assert_eq!(hits(&ctx, "TrueHits"), 1);
    }

    #[test]
    fn test_legendary_quantum_branch_uses_child() {
        let b = branches(
            ConditionNode {
                condition_type: ConditionType::IfThenElse,
                ..ConditionNode::default()
            },
            Rarity::Legendary,
        );
        let mut host = Sandbox::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        ctx.set_local(vars::BOOL_CONDITION, true);
        run(&b, &mut ctx, &mut host);

        // the false branch ran on a private copy of the globals
        assert_eq!((hits(&ctx, "TrueHits"), hits(&ctx, "FalseHits")), (1, 0));
    }

    #[test]
    fn test_random_chance_legendary_always_passes() {
        let node = ConditionNode {
            condition_type: ConditionType::RandomChance,
            random_chance: 0.0,
            ..ConditionNode::default()
        };
        assert_eq!(node.adjusted_chance(Rarity::Legendary), 1.0);
        assert_eq!(node.adjusted_chance(Rarity::Epic), 0.0);
        let boosted = ConditionNode {
            random_chance: 0.8,
            ..ConditionNode::default()
        };
        assert_eq!(boosted.adjusted_chance(Rarity::Epic), 1.0);

        let b = branches(node, Rarity::Legendary);
        let mut host = Sandbox::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        run(&b, &mut ctx, &mut host);
        assert_eq!(ctx.get(vars::CHANCE_THRESHOLD), TypedValue::Float(1.0));
        assert_eq!(hits(&ctx, "TrueHits"), 1);
    }

    #[test]
    fn test_distance_check() {
        let b = branches(
            ConditionNode {
                condition_type: ConditionType::DistanceCheck,
                comparison: ComparisonOp::Less,
                comparison_value: 10.0,
                ..ConditionNode::default()
            },
            Rarity::Common,
        );
        let mut host = Sandbox::new();
        host.spawn(ActorId(1), SandboxActor::new(Vec3::ZERO, 100.0));
        host.spawn(ActorId(2), SandboxActor::new(Vec3::new(3.0, 4.0, 0.0), 100.0));

        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables())
            .with_target(Some(ActorId(2)));
        run(&b, &mut ctx, &mut host);
        assert_eq!(ctx.get(vars::DISTANCE), TypedValue::Float(5.0));
        assert_eq!(hits(&ctx, "TrueHits"), 1);

        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        run(&b, &mut ctx, &mut host);
        assert_eq!(ctx.get(vars::CONDITION_RESULT), TypedValue::Bool(false));
    }

    #[test]
    fn test_rare_keeps_previous_result() {
        let b = branches(ConditionNode::default(), Rarity::Rare);
        let mut host = Sandbox::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        ctx.set_local(vars::BOOL_CONDITION, true);
        run(&b, &mut ctx, &mut host);
        ctx.set_local(vars::BOOL_CONDITION, false);
        run(&b, &mut ctx, &mut host);
        assert_eq!(ctx.get(vars::PREVIOUS_CONDITION), TypedValue::Bool(true));
        assert_eq!(ctx.get(vars::LAST_CONDITION_RESULT), TypedValue::Bool(false));
    }
}
