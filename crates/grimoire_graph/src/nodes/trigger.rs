// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger node: event-gated entry point.

use super::{NodeBehavior, NodeOutcome};
use crate::context::{names as vars, ExecutionContext, TriggerEvent};
use crate::evaluation::{Interpreter, PendingContinuation};
use crate::node::SpellNode;
use crate::port::names;
use serde::{Deserialize, Serialize};

/// Trigger node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerNode {
    /// Event the trigger waits for
    pub event: TriggerEvent,
    /// Maximum caster-to-target distance for [`TriggerEvent::OnEnemyEnter`]
    pub trigger_range: f32,
    /// Seconds between re-fires for [`TriggerEvent::OnTimer`]; zero fires once
    pub timer_interval: f32,
}

impl Default for TriggerNode {
    fn default() -> Self {
        Self {
            event: TriggerEvent::OnCast,
            trigger_range: 100.0,
            timer_interval: 0.0,
        }
    }
}

impl TriggerNode {
    fn target_in_range(&self, ctx: &ExecutionContext, run: &Interpreter<'_>) -> bool {
        let host = run.host();
        let Some(origin) = host.location(ctx.caster) else {
            return false;
        };
        let target = ctx
            .target
            .and_then(|t| host.location(t))
            .or(ctx.target_location);
        target.is_some_and(|t| origin.distance(t) <= self.trigger_range)
    }

    /// Whether the trigger passes for the current cast
    pub fn passes(&self, ctx: &ExecutionContext, run: &Interpreter<'_>) -> bool {
        match self.event {
            TriggerEvent::OnCast | TriggerEvent::OnTimer => true,
            TriggerEvent::OnHit => ctx.event == TriggerEvent::OnHit,
            TriggerEvent::OnEnemyEnter => {
                ctx.event == TriggerEvent::OnEnemyEnter && self.target_in_range(ctx, run)
            }
        }
    }
}

impl NodeBehavior for TriggerNode {
    fn on_execute(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> NodeOutcome {
        let passed = self.passes(ctx, run);
        ctx.set_local(vars::TRIGGER_PASSED, passed);
        if !passed {
            tracing::debug!("Trigger '{}' ({:?}) did not pass", node.name, self.event);
            return NodeOutcome::Halt;
        }

        if self.event == TriggerEvent::OnTimer && self.timer_interval > 0.0 {
            let repeats = node.rarity.loop_cap().saturating_sub(1);
            run.schedule(PendingContinuation {
                repeats_left: repeats,
                interval: self.timer_interval,
                ..PendingContinuation::once(
                    node.id,
                    names::EXEC_OUT,
                    self.timer_interval,
                    ctx.clone(),
                )
            });
            tracing::debug!(
                "Trigger '{}' armed timer every {:.2}s",
                node.name,
                self.timer_interval
            );
        }
        NodeOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::shared_variables;
    use crate::evaluation::{ExecutionOptions, ExecutionReport, SpellMemory};
    use crate::graph::Graph;
    use crate::host::{Sandbox, SandboxActor};
    use crate::node::{NodeKind, Rarity};
    use crate::nodes::{VariableNode, VariableOperation};
    use crate::value::{ActorId, TypedValue, ValueKind, Vec3};

    fn run_trigger(
        trigger: TriggerNode,
        rarity: Rarity,
        event: TriggerEvent,
        target_at: Vec3,
    ) -> (ExecutionReport, ExecutionContext) {
        let mut graph = Graph::new("trigger");
        let id = graph.add_node(SpellNode::new(NodeKind::Trigger(trigger)).with_rarity(rarity));
        let after = graph.add_node(SpellNode::new(NodeKind::Variable(VariableNode {
            variable_name: "After".into(),
            variable_type: ValueKind::Int,
            operation: VariableOperation::Increment,
            default_value: TypedValue::Int(0),
            ..VariableNode::default()
        })));
        graph.connect(id, names::EXEC_OUT, after, names::EXEC_IN).unwrap();

        let mut host = Sandbox::new();
        host.spawn(ActorId(1), SandboxActor::new(Vec3::ZERO, 100.0));
        host.spawn(ActorId(2), SandboxActor::new(target_at, 100.0));
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables())
            .with_target(Some(ActorId(2)))
            .with_event(event);
        let report = Interpreter::new(&graph, &mut host, &mut memory, &options).run(id, &mut ctx);
        (report, ctx)
    }

    #[test]
    fn test_on_cast_passes() {
        let (_, ctx) = run_trigger(
            TriggerNode::default(),
            Rarity::Common,
            TriggerEvent::OnCast,
            Vec3::ZERO,
        );
        assert_eq!(ctx.get(vars::TRIGGER_PASSED), TypedValue::Bool(true));
        assert_eq!(ctx.get("After"), TypedValue::Int(1));
    }

    #[test]
    fn test_on_hit_requires_hit_event() {
        let trigger = TriggerNode {
            event: TriggerEvent::OnHit,
            ..TriggerNode::default()
        };
        let (report, ctx) =
            run_trigger(trigger.clone(), Rarity::Common, TriggerEvent::OnCast, Vec3::ZERO);
        assert_eq!(report.executed, 1);
        assert_eq!(ctx.get(vars::TRIGGER_PASSED), TypedValue::Bool(false));

        let (_, ctx) = run_trigger(trigger, Rarity::Common, TriggerEvent::OnHit, Vec3::ZERO);
        assert_eq!(ctx.get("After"), TypedValue::Int(1));
    }

    #[test]
    fn test_enemy_enter_checks_range() {
        let trigger = TriggerNode {
            event: TriggerEvent::OnEnemyEnter,
            trigger_range: 50.0,
            ..TriggerNode::default()
        };
        let near = Vec3::new(30.0, 0.0, 0.0);
        let far = Vec3::new(80.0, 0.0, 0.0);
        let (_, ctx) =
            run_trigger(trigger.clone(), Rarity::Common, TriggerEvent::OnEnemyEnter, near);
        assert_eq!(ctx.get("After"), TypedValue::Int(1));
        let (_, ctx) = run_trigger(trigger, Rarity::Common, TriggerEvent::OnEnemyEnter, far);
        assert!(ctx.get("After").is_none());
    }

    #[test]
    fn test_timer_schedules_repeats_up_to_loop_cap() {
        let trigger = TriggerNode {
            event: TriggerEvent::OnTimer,
            timer_interval: 2.0,
            ..TriggerNode::default()
        };
        let (report, _) = run_trigger(trigger, Rarity::Uncommon, TriggerEvent::OnCast, Vec3::ZERO);
        assert_eq!(report.scheduled.len(), 1);
        let pending = &report.scheduled[0];
        assert_eq!(pending.remaining, 2.0);
        assert_eq!(pending.interval, 2.0);
        assert_eq!(pending.repeats_left, 4);
    }
}
