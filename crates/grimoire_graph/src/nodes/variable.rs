// SPDX-License-Identifier: MIT OR Apache-2.0
//! Variable node: typed storage with in-place arithmetic.

use super::{NodeBehavior, NodeOutcome};
use crate::context::{names as vars, ExecutionContext, VariableScope};
use crate::evaluation::Interpreter;
use crate::node::{Rarity, SpellNode};
use crate::port::{names, PinDesc};
use crate::value::{TypedValue, ValueKind};
use serde::{Deserialize, Serialize};

/// Default number of history entries kept per variable
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Operation performed on the variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VariableOperation {
    /// Read only
    #[default]
    Get,
    /// Overwrite
    Set,
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`, no-op on zero
    Divide,
    /// Smaller of the two
    Min,
    /// Larger of the two
    Max,
    /// Bound to the configured range
    Clamp,
    /// `a + 1`
    Increment,
    /// `a - 1`
    Decrement,
}

/// Variable node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableNode {
    /// Variable name
    pub variable_name: String,
    /// Declared type
    pub variable_type: ValueKind,
    /// Operation applied on execution
    pub operation: VariableOperation,
    /// Scope the variable lives in
    pub scope: VariableScope,
    /// Initial value, converted to `variable_type` when it differs
    pub default_value: TypedValue,
    /// Whether the value survives across casts (Legendary only)
    pub persistent: bool,
    /// Lower bound for [`VariableOperation::Clamp`]
    pub clamp_min: f32,
    /// Upper bound for [`VariableOperation::Clamp`]
    pub clamp_max: f32,
    /// History capacity (Rare and above)
    pub history_size: usize,
}

impl Default for VariableNode {
    fn default() -> Self {
        Self {
            variable_name: "MyVariable".to_string(),
            variable_type: ValueKind::Float,
            operation: VariableOperation::Get,
            scope: VariableScope::Local,
            default_value: TypedValue::Float(0.0),
            persistent: false,
            clamp_min: 0.0,
            clamp_max: 100.0,
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

/// Apply a binary or unary operation.
///
/// Only matching kinds combine (Vector by Float for scaling). Anything else,
/// and division by zero, returns `a` unchanged.
pub fn apply_operation(
    op: VariableOperation,
    a: &TypedValue,
    b: &TypedValue,
    clamp_min: f32,
    clamp_max: f32,
) -> TypedValue {
    use TypedValue::{Float, Int, Vector};
    use VariableOperation as Op;

    let result = match (op, a, b) {
        (Op::Add, Float(x), Float(y)) => Some(Float(x + y)),
        (Op::Add, Int(x), Int(y)) => Some(Int(x.wrapping_add(*y))),
        (Op::Add, Vector(x), Vector(y)) => Some(Vector(*x + *y)),

        (Op::Subtract, Float(x), Float(y)) => Some(Float(x - y)),
        (Op::Subtract, Int(x), Int(y)) => Some(Int(x.wrapping_sub(*y))),
        (Op::Subtract, Vector(x), Vector(y)) => Some(Vector(*x - *y)),

        (Op::Multiply, Float(x), Float(y)) => Some(Float(x * y)),
        (Op::Multiply, Int(x), Int(y)) => Some(Int(x.wrapping_mul(*y))),
        (Op::Multiply, Vector(x), Float(y)) => Some(Vector(*x * *y)),

        (Op::Divide, Float(x), Float(y)) if *y != 0.0 => Some(Float(x / y)),
        (Op::Divide, Int(x), Int(y)) => x.checked_div(*y).map(Int),

        (Op::Min, Float(x), Float(y)) => Some(Float(x.min(*y))),
        (Op::Min, Int(x), Int(y)) => Some(Int(*x.min(y))),
        (Op::Max, Float(x), Float(y)) => Some(Float(x.max(*y))),
        (Op::Max, Int(x), Int(y)) => Some(Int(*x.max(y))),

        (Op::Clamp, Float(x), _) => Some(Float(x.max(clamp_min).min(clamp_max))),
        (Op::Clamp, Int(x), _) => Some(Int((*x).max(clamp_min as i32).min(clamp_max as i32))),

        (Op::Increment, Float(x), _) => Some(Float(x + 1.0)),
        (Op::Increment, Int(x), _) => Some(Int(x.wrapping_add(1))),
        (Op::Decrement, Float(x), _) => Some(Float(x - 1.0)),
        (Op::Decrement, Int(x), _) => Some(Int(x.wrapping_sub(1))),

        _ => None,
    };

    result.unwrap_or_else(|| {
        if !matches!(op, Op::Get | Op::Set) {
            tracing::trace!("{:?} not defined for {:?} and {:?}", op, a.kind(), b.kind());
        }
        a.clone()
    })
}

impl VariableNode {
    /// Default value in the declared type
    pub fn typed_default(&self) -> TypedValue {
        if self.default_value.kind() == self.variable_type {
            self.default_value.clone()
        } else {
            let converted = self.default_value.convert_to(self.variable_type);
            if converted.kind() == self.variable_type {
                converted
            } else {
                TypedValue::zero(self.variable_type)
            }
        }
    }

    fn local_input(ctx: &ExecutionContext, name: &str) -> Option<TypedValue> {
        match ctx.get(name) {
            TypedValue::None => None,
            value => Some(value),
        }
    }

    fn next_value(&self, current: &TypedValue, ctx: &ExecutionContext) -> TypedValue {
        match self.operation {
            VariableOperation::Get => current.clone(),
            VariableOperation::Set => Self::local_input(ctx, vars::NEW_VALUE)
                .or_else(|| {
                    Self::local_input(ctx, vars::VALUE).map(|v| v.convert_to(self.variable_type))
                })
                .unwrap_or_else(|| self.typed_default()),
            op => {
                let operand = Self::local_input(ctx, vars::OPERAND_B)
                    .or_else(|| Self::local_input(ctx, vars::VALUE))
                    .unwrap_or_else(|| self.typed_default());
                apply_operation(op, current, &operand, self.clamp_min, self.clamp_max)
            }
        }
    }

    fn uses_persistence(&self, rarity: Rarity) -> bool {
        self.persistent && rarity == Rarity::Legendary
    }

    fn apply_rarity_effects(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) {
        let rarity = node.rarity;
        if rarity >= Rarity::Uncommon {
            ctx.set_local(vars::AUTO_CONVERT, true);
        }
        if rarity >= Rarity::Rare {
            let history = run.memory().history(node.id, &self.variable_name);
            let count = history.map_or(0, |h| h.len());
            let average = history.filter(|h| h.len() > 1).and_then(|h| h.float_average());
            ctx.set_local(vars::HISTORY_COUNT, count as i32);
            if count > 0 {
                ctx.set_local(vars::VARIABLE_HISTORY, "Available");
            }
            if rarity >= Rarity::Epic {
                if let Some(average) = average {
                    ctx.set_local(vars::VARIABLE_AVERAGE, average);
                }
            }
        }
        if rarity == Rarity::Legendary {
            ctx.set_local(vars::HAS_PERSISTENT_MEMORY, true);
        }
    }
}

impl NodeBehavior for VariableNode {
    fn input_pins(&self) -> Vec<PinDesc> {
        let mut pins = vec![
            PinDesc::exec_input(names::EXEC_IN),
            PinDesc::data_input(vars::VALUE, ValueKind::None),
            PinDesc::data_input(vars::OPERAND_B, ValueKind::None),
        ];
        if self.operation == VariableOperation::Set {
            pins.push(PinDesc::data_input(vars::NEW_VALUE, ValueKind::None));
        }
        pins
    }

    fn output_pins(&self) -> Vec<PinDesc> {
        vec![
            PinDesc::exec_output(names::EXEC_OUT),
            PinDesc::data_output(names::CURRENT_VALUE, ValueKind::None),
            PinDesc::data_output(names::PREVIOUS_VALUE, ValueKind::None),
            PinDesc::data_output(names::CHANGED, ValueKind::Bool),
        ]
    }

    fn on_execute(
        &self,
        node: &SpellNode,
        ctx: &mut ExecutionContext,
        run: &mut Interpreter<'_>,
    ) -> NodeOutcome {
        let name = self.variable_name.as_str();
        if !ctx.has_variable(name, self.scope) {
            ctx.set_variable(name, self.typed_default(), self.scope);
        }
        if self.uses_persistence(node.rarity) {
            if let Some(saved) = run.memory().persisted(name).cloned() {
                ctx.set_variable(name, saved, self.scope);
            }
        }

        let previous = ctx.get_variable(name, self.scope);
        let current = self.next_value(&previous, ctx);
        let changed = current != previous;
        if self.operation != VariableOperation::Get {
            ctx.set_variable(name, current.clone(), self.scope);
        }

        if changed {
            if node.rarity >= Rarity::Rare {
                let now = run.host().now();
                run.memory()
                    .history_mut(node.id, name, self.history_size.max(1))
                    .push(current.clone(), now);
            }
            if self.uses_persistence(node.rarity) {
                run.memory().persist(name, current.clone());
            }
        }

        tracing::debug!(
            "Variable '{}' {:?}: {} -> {}",
            name,
            self.operation,
            previous,
            current
        );

        ctx.set_local(vars::CURRENT_VALUE, current.clone());
        ctx.set_local(vars::PREVIOUS_VALUE, previous.clone());
        ctx.set_local(vars::VALUE_CHANGED, changed);
        run.publish(node.id, names::CURRENT_VALUE, current);
        run.publish(node.id, names::PREVIOUS_VALUE, previous);
        run.publish(node.id, names::CHANGED, TypedValue::Bool(changed));

        self.apply_rarity_effects(node, ctx, run);
        NodeOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::shared_variables;
    use crate::evaluation::{ExecutionOptions, SpellMemory};
    use crate::graph::Graph;
    use crate::host::Sandbox;
    use crate::node::NodeKind;
    use crate::value::{ActorId, Vec3};

    fn op(op: VariableOperation, a: TypedValue, b: TypedValue) -> TypedValue {
        apply_operation(op, &a, &b, 0.0, 100.0)
    }

    #[test]
    fn test_arithmetic_matching_kinds() {
        use TypedValue::{Float, Int, Vector};
        assert_eq!(op(VariableOperation::Add, Float(1.5), Float(2.0)), Float(3.5));
        assert_eq!(op(VariableOperation::Subtract, Int(5), Int(7)), Int(-2));
        assert_eq!(op(VariableOperation::Max, Int(5), Int(7)), Int(7));
        assert_eq!(
            op(VariableOperation::Multiply, Vector(Vec3::new(1.0, 2.0, 3.0)), Float(2.0)),
            Vector(Vec3::new(2.0, 4.0, 6.0))
        );
        assert_eq!(op(VariableOperation::Clamp, Float(250.0), TypedValue::None), Float(100.0));
        assert_eq!(op(VariableOperation::Clamp, Int(-3), TypedValue::None), Int(0));
    }

    #[test]
    fn test_mismatched_kinds_keep_left_operand() {
        use TypedValue::{Bool, Float, Int};
        assert_eq!(op(VariableOperation::Add, Float(1.0), Int(2)), Float(1.0));
        assert_eq!(op(VariableOperation::Multiply, Int(3), Float(2.0)), Int(3));
        assert_eq!(op(VariableOperation::Increment, Bool(true), TypedValue::None), Bool(true));
    }

    #[test]
    fn test_divide_by_zero_is_noop() {
        use TypedValue::{Float, Int};
        assert_eq!(op(VariableOperation::Divide, Float(9.0), Float(0.0)), Float(9.0));
        assert_eq!(op(VariableOperation::Divide, Int(9), Int(0)), Int(9));
        assert_eq!(op(VariableOperation::Divide, Int(9), Int(2)), Int(4));
        assert_eq!(op(VariableOperation::Divide, Int(i32::MIN), Int(-1)), Int(i32::MIN));
    }

    #[test]
    fn test_int_arithmetic_wraps() {
        use TypedValue::Int;
        assert_eq!(op(VariableOperation::Increment, Int(i32::MAX), TypedValue::None), Int(i32::MIN));
    }

    fn run_once(
        graph: &Graph,
        id: crate::node::NodeId,
        memory: &mut SpellMemory,
        ctx: &mut ExecutionContext,
    ) {
        let mut host = Sandbox::new();
        let options = ExecutionOptions::default();
        Interpreter::new(graph, &mut host, memory, &options).run(id, ctx);
    }

    #[test]
    fn test_set_converts_value_input() {
        let mut graph = Graph::new("set");
        let id = graph.add_node(SpellNode::new(NodeKind::Variable(VariableNode {
            variable_name: "Speed".into(),
            operation: VariableOperation::Set,
            ..VariableNode::default()
        })));
        let mut memory = SpellMemory::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        ctx.set_local(vars::VALUE, 4);
        run_once(&graph, id, &mut memory, &mut ctx);
        assert_eq!(ctx.get("Speed"), TypedValue::Float(4.0));
        assert_eq!(ctx.get(vars::PREVIOUS_VALUE), TypedValue::Float(0.0));
        assert_eq!(ctx.get(vars::VALUE_CHANGED), TypedValue::Bool(true));
    }

    #[test]
    fn test_rare_records_history() {
        let mut graph = Graph::new("history");
        let id = graph.add_node(
            SpellNode::new(NodeKind::Variable(VariableNode {
                variable_name: "Charge".into(),
                operation: VariableOperation::Increment,
                ..VariableNode::default()
            }))
            .with_rarity(Rarity::Epic),
        );
        let mut memory = SpellMemory::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        run_once(&graph, id, &mut memory, &mut ctx);
        run_once(&graph, id, &mut memory, &mut ctx);

        let history = memory.history(id, "Charge").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(ctx.get(vars::HISTORY_COUNT), TypedValue::Int(2));
        assert_eq!(ctx.get(vars::VARIABLE_AVERAGE), TypedValue::Float(1.5));
        assert_eq!(ctx.get(vars::AUTO_CONVERT), TypedValue::Bool(true));
    }

    #[test]
    fn test_oversized_history_size_is_safe() {
        let mut graph = Graph::new("history");
        let id = graph.add_node(
            SpellNode::new(NodeKind::Variable(VariableNode {
                variable_name: "Charge".into(),
                operation: VariableOperation::Increment,
                history_size: usize::MAX,
                ..VariableNode::default()
            }))
            .with_rarity(Rarity::Rare),
        );
        let mut memory = SpellMemory::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        run_once(&graph, id, &mut memory, &mut ctx);
        run_once(&graph, id, &mut memory, &mut ctx);

        assert_eq!(memory.history(id, "Charge").unwrap().len(), 2);
        assert_eq!(ctx.get("Charge"), TypedValue::Float(2.0));
    }

    #[test]
    fn test_legendary_persists_across_casts() {
        let mut graph = Graph::new("persist");
        let id = graph.add_node(
            SpellNode::new(NodeKind::Variable(VariableNode {
                variable_name: "Stacks".into(),
                variable_type: ValueKind::Int,
                operation: VariableOperation::Increment,
                default_value: TypedValue::Int(0),
                persistent: true,
                ..VariableNode::default()
            }))
            .with_rarity(Rarity::Legendary),
        );
        let mut memory = SpellMemory::new();
        for _ in 0..3 {
            let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
            run_once(&graph, id, &mut memory, &mut ctx);
        }
        assert_eq!(memory.persisted("Stacks"), Some(&TypedValue::Int(3)));
    }

    #[test]
    fn test_global_scope_visible_to_children() {
        let mut graph = Graph::new("global");
        let id = graph.add_node(SpellNode::new(NodeKind::Variable(VariableNode {
            variable_name: "Shared".into(),
            scope: VariableScope::Global,
            operation: VariableOperation::Increment,
            ..VariableNode::default()
        })));
        let mut memory = SpellMemory::new();
        let mut ctx = ExecutionContext::new(ActorId(1), shared_variables());
        run_once(&graph, id, &mut memory, &mut ctx);
        let child = ctx.create_child_context();
        assert_eq!(child.get("Shared"), TypedValue::Float(1.0));
        assert!(!ctx.locals().contains_key("Shared"));
    }
}
