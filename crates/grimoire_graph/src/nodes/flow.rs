// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow node: sequencing, loops, delays, parallel branches and gates.
//!
//! Flow nodes own their outgoing traversal; the interpreter never follows
//! `ExecOut` for them.

use super::{NodeBehavior, NodeOutcome};
use crate::context::{names as vars, ExecutionContext};
use crate::evaluation::{Interpreter, PendingContinuation};
use crate::node::{Rarity, SpellNode};
use crate::port::{names, PinDesc};
use crate::value::{TypedValue, ValueKind};
use serde::{Deserialize, Serialize};

/// Control-flow combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowType {
    /// Run each `ExecOut` target in order
    #[default]
    Sequence,
    /// Run `LoopBody` a bounded number of times
    Loop,
    /// Run `LoopBody` while `Condition` holds
    WhileLoop,
    /// Run `LoopBody` a counted number of times
    ForLoop,
    /// Continue through `ExecOut` after a delay
    Delay,
    /// Run up to three branches on isolated child contexts
    Parallel,
    /// Fire `True` or `False` on `Condition`
    Branch,
    /// Fire `Open` or `Closed` on `GateOpen`
    Gate,
}

/// Flow node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowNode {
    /// Combinator
    pub flow_type: FlowType,
    /// Requested iterations for loops
    pub max_iterations: u32,
    /// Delay in seconds
    pub delay_time: f32,
    /// Whether loops and sequences honor the break variable
    pub break_on_condition: bool,
    /// Bool variable that stops a loop or sequence
    pub break_variable: String,
}

impl Default for FlowNode {
    fn default() -> Self {
        Self {
            flow_type: FlowType::Sequence,
            max_iterations: 5,
            delay_time: 1.0,
            break_on_condition: false,
            break_variable: vars::SHOULD_BREAK.to_string(),
        }
    }
}

/// Read a bool variable; absent reads as `default`
fn flag(ctx: &ExecutionContext, name: &str, default: bool) -> bool {
    match ctx.get(name) {
        TypedValue::None => default,
        value => value.is_truthy(),
    }
}

impl FlowNode {
    fn should_break(&self, ctx: &ExecutionContext) -> bool {
        self.break_on_condition && ctx.get(&self.break_variable).as_bool() == Some(true)
    }

    /// Iterations for `Loop` and `ForLoop`: the override or configured count, capped by rarity
    pub fn iteration_count(&self, rarity: Rarity, ctx: &ExecutionContext) -> u32 {
        let requested = match ctx.get(vars::ITERATION_COUNT) {
            TypedValue::Int(n) => n.max(0) as u32,
            _ => self.max_iterations,
        };
        requested.min(rarity.loop_cap())
    }

    fn apply_rarity_effects(&self, rarity: Rarity, ctx: &mut ExecutionContext) {
        match rarity {
            Rarity::Common => {}
            Rarity::Uncommon => ctx.set_local(vars::TIMING_PRECISION, 0.9_f32),
            Rarity::Rare => ctx.set_local(vars::OPTIMIZED_LOOP, true),
            Rarity::Epic => ctx.set_local(vars::PARALLEL_SUPPORT, true),
            Rarity::Legendary => ctx.set_local(vars::QUANTUM_FLOW, true),
        }
    }

    fn run_sequence(&self, node: &SpellNode, ctx: &mut ExecutionContext, run: &mut Interpreter<'_>) {
        let targets = run.graph().targets_of(node.id, names::EXEC_OUT);
        let total = targets.len() as i32;
        for (index, target) in targets.into_iter().enumerate() {
            ctx.set_local(vars::SEQUENCE_INDEX, index as i32);
            ctx.set_local(vars::SEQUENCE_TOTAL, total);
            run.execute(target, ctx);
            if self.should_break(ctx) {
                tracing::debug!("Sequence '{}' broke at step {}", node.name, index);
                break;
            }
        }
    }

    fn run_loop(&self, node: &SpellNode, ctx: &mut ExecutionContext, run: &mut Interpreter<'_>) {
        let total = self.iteration_count(node.rarity, ctx);
        let mut iteration = 0;
        let mut keep_going = true;
        while keep_going && iteration < total && !self.should_break(ctx) {
            ctx.set_local(vars::LOOP_INDEX, iteration as i32);
            ctx.set_local(vars::LOOP_TOTAL, total as i32);
            run.publish(node.id, names::CURRENT_INDEX, TypedValue::Int(iteration as i32));
            run.fire_pin(node.id, names::LOOP_BODY, ctx);
            iteration += 1;
            keep_going = flag(ctx, vars::SHOULD_CONTINUE, true);
        }
        tracing::debug!("Loop '{}' completed {} iteration(s)", node.name, iteration);
        run.fire_pin(node.id, names::ON_COMPLETE, ctx);
    }

    fn run_for(&self, node: &SpellNode, ctx: &mut ExecutionContext, run: &mut Interpreter<'_>) {
        let total = self.iteration_count(node.rarity, ctx);
        for index in 0..total {
            ctx.set_local(vars::FOR_INDEX, index as i32);
            ctx.set_local(vars::FOR_TOTAL, total as i32);
            run.publish(node.id, names::CURRENT_INDEX, TypedValue::Int(index as i32));
            run.fire_pin(node.id, names::LOOP_BODY, ctx);
            if self.should_break(ctx) {
                tracing::debug!("For loop '{}' broke at iteration {}", node.name, index);
                break;
            }
        }
        run.fire_pin(node.id, names::ON_COMPLETE, ctx);
    }

    fn run_while(&self, node: &SpellNode, ctx: &mut ExecutionContext, run: &mut Interpreter<'_>) {
        let ceiling = run.limits().while_ceiling;
        let mut iteration = 0;
        while flag(ctx, vars::CONDITION, true) {
            if iteration >= ceiling {
                tracing::warn!("While loop '{}' hit the {} iteration ceiling", node.name, ceiling);
                break;
            }
            ctx.set_local(vars::WHILE_INDEX, iteration as i32);
            run.publish(node.id, names::CURRENT_INDEX, TypedValue::Int(iteration as i32));
            run.fire_pin(node.id, names::LOOP_BODY, ctx);
            iteration += 1;
        }
        run.fire_pin(node.id, names::ON_COMPLETE, ctx);
    }

    fn run_delay(&self, node: &SpellNode, ctx: &mut ExecutionContext, run: &mut Interpreter<'_>) {
        let requested = match ctx.get(vars::DELAY_TIME) {
            TypedValue::Float(v) => v,
            _ => self.delay_time,
        };
        let delay = (requested / node.rarity_scale_factor()).max(0.0);
        run.schedule(PendingContinuation::once(
            node.id,
            names::EXEC_OUT,
            delay,
            ctx.clone(),
        ));
    }

    fn run_parallel(&self, node: &SpellNode, ctx: &mut ExecutionContext, run: &mut Interpreter<'_>) {
        for branch in [names::BRANCH_1, names::BRANCH_2, names::BRANCH_3] {
            for target in run.graph().targets_of(node.id, branch) {
                let mut child = ctx.create_child_context();
                run.execute(target, &mut child);
                ctx.merge_child_context(&child);
            }
        }
        run.fire_pin(node.id, names::ON_ALL_COMPLETE, ctx);
    }
}

impl NodeBehavior for FlowNode {
    fn input_pins(&self) -> Vec<PinDesc> {
        vec![
            PinDesc::exec_input(names::EXEC_IN),
            PinDesc::data_input(vars::ITERATION_COUNT, ValueKind::Int),
            PinDesc::data_input(names::CONDITION, ValueKind::Bool),
            PinDesc::data_input(vars::DELAY_TIME, ValueKind::Float),
            PinDesc::data_input(names::GATE_OPEN, ValueKind::Bool),
        ]
    }

    fn output_pins(&self) -> Vec<PinDesc> {
        match self.flow_type {
            FlowType::Sequence | FlowType::Delay => vec![PinDesc::exec_output(names::EXEC_OUT)],
            FlowType::Loop | FlowType::WhileLoop | FlowType::ForLoop => vec![
                PinDesc::exec_output(names::LOOP_BODY),
                PinDesc::exec_output(names::ON_COMPLETE),
                PinDesc::data_output(names::CURRENT_INDEX, ValueKind::Int),
            ],
            FlowType::Parallel => vec![
                PinDesc::exec_output(names::BRANCH_1),
                PinDesc::exec_output(names::BRANCH_2),
                PinDesc::exec_output(names::BRANCH_3),
                PinDesc::exec_output(names::ON_ALL_COMPLETE),
            ],
            FlowType::Branch => vec![
                PinDesc::exec_output(names::TRUE),
                PinDesc::exec_output(names::FALSE),
            ],
            FlowType::Gate => vec![
                PinDesc::exec_output(names::OPEN),
                PinDesc::exec_output(names::CLOSED),
            ],
        }
    }

    fn follows_exec_out(&self) -> bool {
        false
    }

    fn on_execute(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> NodeOutcome {
        if !run.enter_guard(node.id) {
            return NodeOutcome::Halt;
        }
        tracing::debug!("Flow '{}' ({:?})", node.name, self.flow_type);
        self.apply_rarity_effects(node.rarity, ctx);

        match self.flow_type {
            FlowType::Sequence => self.run_sequence(node, ctx, run),
            FlowType::Loop => self.run_loop(node, ctx, run),
            FlowType::WhileLoop => self.run_while(node, ctx, run),
            FlowType::ForLoop => self.run_for(node, ctx, run),
            FlowType::Delay => self.run_delay(node, ctx, run),
            FlowType::Parallel => self.run_parallel(node, ctx, run),
            FlowType::Branch => {
                let pin = if flag(ctx, vars::CONDITION, true) {
                    names::TRUE
                } else {
                    names::FALSE
                };
                run.fire_pin(node.id, pin, ctx);
            }
            FlowType::Gate => {
                let pin = if flag(ctx, vars::GATE_OPEN, true) {
                    names::OPEN
                } else {
                    names::CLOSED
                };
                run.fire_pin(node.id, pin, ctx);
            }
        }

        run.leave_guard(node.id);
        NodeOutcome::Continue
    }
}
