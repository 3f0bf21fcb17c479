// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node kinds.

mod condition;
mod effect;
mod flow;
mod magic;
mod trigger;
mod variable;

pub use condition::{ComparisonOp, ConditionNode, ConditionType};
pub use effect::{EffectNode, EffectTarget, EffectType, StatusEffect};
pub use flow::{FlowNode, FlowType};
pub use magic::{Element, ElementInteraction, ElementTable, MagicNode};
pub use trigger::TriggerNode;
pub use variable::{apply_operation, VariableNode, VariableOperation};

use crate::context::ExecutionContext;
use crate::evaluation::Interpreter;
use crate::node::{Rarity, SpellNode};
use crate::port::{names, PinDesc};

/// Whether traversal continues after a node's own behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Continue through `ExecOut`
    Continue,
    /// Stop here
    Halt,
}

/// Behavior shared by all node kinds
pub trait NodeBehavior {
    /// Declared input pins
    fn input_pins(&self) -> Vec<PinDesc> {
        base_input_pins()
    }

    /// Declared output pins
    fn output_pins(&self) -> Vec<PinDesc> {
        base_output_pins()
    }

    /// Power contributed at a rarity
    fn base_power(&self, _rarity: Rarity) -> f32 {
        0.0
    }

    /// Whether the interpreter fires `ExecOut` after [`NodeBehavior::on_execute`].
    ///
    /// Kinds that own their traversal return `false`.
    fn follows_exec_out(&self) -> bool {
        true
    }

    /// Run the node's own behavior
    fn on_execute(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> NodeOutcome;

    /// Called once the node and everything it fired have finished
    fn on_execution_complete(&self, node: &SpellNode, ctx: &mut ExecutionContext) {
        tracing::trace!("Completed '{}' power={:.2}", node.name, ctx.spell_power);
    }
}

/// `ExecIn`
pub fn base_input_pins() -> Vec<PinDesc> {
    vec![PinDesc::exec_input(names::EXEC_IN)]
}

/// `ExecOut`
pub fn base_output_pins() -> Vec<PinDesc> {
    vec![PinDesc::exec_output(names::EXEC_OUT)]
}
