// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spell graph interpreter.
//!
//! Execution is depth first, synchronous and single threaded: a node runs its
//! own behavior, then the nodes connected to its outgoing execution pins run
//! with the same context. All mutable bookkeeping for one run (published data
//! outputs, recursion counters, budgets, RNG and scheduled continuations)
//! lives in [`ExecutionState`], never on the nodes.

use crate::context::ExecutionContext;
use crate::graph::Graph;
use crate::host::SpellHost;
use crate::node::NodeId;
use crate::nodes::{ElementTable, NodeOutcome};
use crate::port::{names, PinType};
use crate::value::TypedValue;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Interpreter-wide ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Maximum nesting of node executions
    pub max_call_depth: u32,
    /// Maximum node executions per run
    pub max_node_executions: u32,
    /// Maximum simultaneous entries into one flow node
    pub recursion_ceiling: u32,
    /// Hard iteration ceiling for while loops
    pub while_ceiling: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            max_node_executions: 10_000,
            recursion_ceiling: 50,
            while_ceiling: 1000,
        }
    }
}

/// Options shared by every run of a caster
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Ceilings
    pub limits: ExecutionLimits,
    /// Element interaction table
    pub elements: ElementTable,
    /// Fixed RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl ExecutionOptions {
    /// Set the limits
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the element table
    pub fn with_elements(mut self, elements: ElementTable) -> Self {
        self.elements = elements;
        self
    }
}

/// Data outputs published by one node
#[derive(Debug, Clone, Default)]
pub struct NodeOutput {
    /// Output values by pin name
    pub values: IndexMap<String, TypedValue>,
}

impl NodeOutput {
    /// Create a new empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an output value
    pub fn set(&mut self, pin: &str, value: TypedValue) {
        self.values.insert(pin.to_string(), value);
    }

    /// Get an output value
    pub fn get(&self, pin: &str) -> Option<&TypedValue> {
        self.values.get(pin)
    }
}

/// One recorded variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Value after the operation
    pub value: TypedValue,
    /// Host clock when recorded
    pub timestamp: f64,
}

/// Fixed-size ring buffer of variable values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl VariableHistory {
    /// Create an empty history
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a value, evicting the oldest entry when full
    pub fn push(&mut self, value: TypedValue, timestamp: f64) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry { value, timestamp });
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Mean of the float entries
    pub fn float_average(&self) -> Option<f32> {
        let floats: Vec<f32> = self
            .entries
            .iter()
            .filter_map(|e| match e.value {
                TypedValue::Float(v) => Some(v),
                _ => None,
            })
            .collect();
        if floats.is_empty() {
            None
        } else {
            Some(floats.iter().sum::<f32>() / floats.len() as f32)
        }
    }
}

/// Per-spell state that survives across casts
#[derive(Debug, Clone, Default)]
pub struct SpellMemory {
    histories: HashMap<(NodeId, String), VariableHistory>,
    persistent: IndexMap<String, TypedValue>,
}

impl SpellMemory {
    /// Create empty memory
    pub fn new() -> Self {
        Self::default()
    }

    /// History of a variable as seen by one node
    pub fn history(&self, node: NodeId, variable: &str) -> Option<&VariableHistory> {
        self.histories.get(&(node, variable.to_string()))
    }

    /// History of a variable, created on first use
    pub fn history_mut(
        &mut self,
        node: NodeId,
        variable: &str,
        capacity: usize,
    ) -> &mut VariableHistory {
        self.histories
            .entry((node, variable.to_string()))
            .or_insert_with(|| VariableHistory::new(capacity))
    }

    /// Load a persisted value
    pub fn persisted(&self, variable: &str) -> Option<&TypedValue> {
        self.persistent.get(variable)
    }

    /// Persist a value
    pub fn persist(&mut self, variable: &str, value: TypedValue) {
        self.persistent.insert(variable.to_string(), value);
    }

    /// Forget everything recorded for a node
    pub fn forget_node(&mut self, node: NodeId) {
        self.histories.retain(|(n, _), _| *n != node);
    }
}

/// An execution pin to fire later
#[derive(Debug, Clone)]
pub struct PendingContinuation {
    /// Node owning the pin
    pub node: NodeId,
    /// Output pin to fire
    pub pin: String,
    /// Seconds until due
    pub remaining: f32,
    /// Context retained from the scheduling run
    pub context: ExecutionContext,
    /// Further repeats after this one
    pub repeats_left: u32,
    /// Seconds between repeats
    pub interval: f32,
}

impl PendingContinuation {
    /// A one-shot continuation
    pub fn once(node: NodeId, pin: &str, delay: f32, context: ExecutionContext) -> Self {
        Self {
            node,
            pin: pin.to_string(),
            remaining: delay,
            context,
            repeats_left: 0,
            interval: 0.0,
        }
    }
}

/// Scratch state of one run
#[derive(Debug)]
pub struct ExecutionState {
    rng: StdRng,
    active: HashMap<NodeId, u32>,
    outputs: HashMap<NodeId, NodeOutput>,
    call_depth: u32,
    executed: u32,
    truncated: bool,
    scheduled: Vec<PendingContinuation>,
    trace: Vec<NodeId>,
    completed: Vec<NodeId>,
}

impl ExecutionState {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            active: HashMap::new(),
            outputs: HashMap::new(),
            call_depth: 0,
            executed: 0,
            truncated: false,
            scheduled: Vec::new(),
            trace: Vec::new(),
            completed: Vec::new(),
        }
    }
}

/// Summary of a finished run
#[derive(Debug)]
pub struct ExecutionReport {
    /// Number of node executions
    pub executed: u32,
    /// Whether a ceiling cut the run short
    pub truncated: bool,
    /// Continuations scheduled during the run
    pub scheduled: Vec<PendingContinuation>,
    /// Executed nodes in order
    pub trace: Vec<NodeId>,
    /// Nodes in the order their completion hook ran
    pub completed: Vec<NodeId>,
}

/// Runs nodes of one graph against a host
pub struct Interpreter<'a> {
    graph: &'a Graph,
    host: &'a mut dyn SpellHost,
    memory: &'a mut SpellMemory,
    options: &'a ExecutionOptions,
    state: ExecutionState,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter for one run
    pub fn new(
        graph: &'a Graph,
        host: &'a mut dyn SpellHost,
        memory: &'a mut SpellMemory,
        options: &'a ExecutionOptions,
    ) -> Self {
        Self {
            graph,
            host,
            memory,
            options,
            state: ExecutionState::new(options.seed),
        }
    }

    /// Reseed the RNG of this run
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.state.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Execute `root` with `ctx` and return the report
    pub fn run(mut self, root: NodeId, ctx: &mut ExecutionContext) -> ExecutionReport {
        self.execute(root, ctx);
        self.finish()
    }

    /// Execute one node and everything it fires
    pub fn execute(&mut self, node_id: NodeId, ctx: &mut ExecutionContext) {
        let limits = self.options.limits;
        if self.state.executed >= limits.max_node_executions {
            if !self.state.truncated {
                tracing::warn!(
                    "Execution budget of {} nodes exhausted, truncating",
                    limits.max_node_executions
                );
            }
            self.state.truncated = true;
            return;
        }
        if self.state.call_depth >= limits.max_call_depth {
            tracing::warn!(
                "Call depth {} reached at node {}, truncating",
                limits.max_call_depth,
                node_id
            );
            self.state.truncated = true;
            return;
        }

        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            tracing::warn!("Node {} not found in graph '{}'", node_id, graph.name);
            return;
        };

        self.state.executed += 1;
        self.state.call_depth += 1;
        self.state.trace.push(node_id);
        ctx.spell_cost += node.scaled_mana_cost();

        self.bind_inputs(node_id, ctx);
        tracing::debug!(
            "Executing {} '{}' ({:?}) depth={}",
            node.tag(),
            node.name,
            node.rarity,
            ctx.depth
        );

        let behavior = node.kind.behavior();
        let outcome = behavior.on_execute(node, ctx, self);
        if outcome == NodeOutcome::Continue && behavior.follows_exec_out() {
            self.fire_pin(node_id, names::EXEC_OUT, ctx);
        }

        behavior.on_execution_complete(node, ctx);
        self.state.completed.push(node_id);
        self.state.call_depth -= 1;
    }

    /// Execute every node connected to an output pin, in connection order
    pub fn fire_pin(&mut self, node_id: NodeId, pin: &str, ctx: &mut ExecutionContext) {
        for target in self.graph.targets_of(node_id, pin) {
            self.execute(target, ctx);
        }
    }

    /// Fire a due continuation.
    ///
    /// Continuations whose node left the graph are dropped. Repeating
    /// continuations are rescheduled with the context they left behind.
    pub fn resume(&mut self, continuation: PendingContinuation) {
        if !self.graph.contains_node(continuation.node) {
            tracing::debug!(
                "Dropping continuation of removed node {}",
                continuation.node
            );
            return;
        }
        let mut ctx = continuation.context;
        self.fire_pin(continuation.node, &continuation.pin, &mut ctx);
        if continuation.repeats_left > 0 {
            self.schedule(PendingContinuation {
                node: continuation.node,
                pin: continuation.pin,
                remaining: continuation.interval,
                context: ctx,
                repeats_left: continuation.repeats_left - 1,
                interval: continuation.interval,
            });
        }
    }

    /// Finish the run
    pub fn finish(self) -> ExecutionReport {
        ExecutionReport {
            executed: self.state.executed,
            truncated: self.state.truncated,
            scheduled: self.state.scheduled,
            trace: self.state.trace,
            completed: self.state.completed,
        }
    }

    fn bind_inputs(&mut self, node_id: NodeId, ctx: &mut ExecutionContext) {
        let graph = self.graph;
        let Some(node) = graph.node(node_id) else {
            return;
        };
        for pin in node.input_pins() {
            if !matches!(pin.pin_type, PinType::Data(_)) {
                continue;
            }
            let Some(source) = graph.data_source(node_id, &pin.name) else {
                continue;
            };
            let value = self
                .state
                .outputs
                .get(&source.node)
                .and_then(|out| out.get(&source.pin))
                .cloned();
            if let Some(value) = value {
                ctx.set_local(&pin.name, value);
            }
        }
    }

    /// Publish a data output of a node
    pub fn publish(&mut self, node_id: NodeId, pin: &str, value: TypedValue) {
        self.state
            .outputs
            .entry(node_id)
            .or_default()
            .set(pin, value);
    }

    /// Last value published on a node's output pin
    pub fn output(&self, node_id: NodeId, pin: &str) -> Option<&TypedValue> {
        self.state.outputs.get(&node_id).and_then(|o| o.get(pin))
    }

    /// Queue a continuation
    pub fn schedule(&mut self, continuation: PendingContinuation) {
        tracing::debug!(
            "Scheduled '{}' on {} in {:.2}s",
            continuation.pin,
            continuation.node,
            continuation.remaining
        );
        self.state.scheduled.push(continuation);
    }

    /// Enter a guarded node; returns `false` when the recursion ceiling is exceeded.
    pub fn enter_guard(&mut self, node_id: NodeId) -> bool {
        let ceiling = self.options.limits.recursion_ceiling;
        let count = self.state.active.entry(node_id).or_insert(0);
        *count += 1;
        if *count > ceiling {
            tracing::warn!("Recursion limit {} reached on node {}", ceiling, node_id);
            *count = 0;
            return false;
        }
        true
    }

    /// Leave a guarded node
    pub fn leave_guard(&mut self, node_id: NodeId) {
        if let Some(count) = self.state.active.get_mut(&node_id) {
            *count = count.saturating_sub(1);
        }
    }

    /// The graph being run
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// The host world
    pub fn host(&self) -> &dyn SpellHost {
        &*self.host
    }

    /// The host world, mutably
    pub fn host_mut(&mut self) -> &mut dyn SpellHost {
        &mut *self.host
    }

    /// Cross-cast memory of the running spell
    pub fn memory(&mut self) -> &mut SpellMemory {
        &mut *self.memory
    }

    /// Run options
    pub fn options(&self) -> &ExecutionOptions {
        self.options
    }

    /// Limits of this run
    pub fn limits(&self) -> ExecutionLimits {
        self.options.limits
    }

    /// RNG of this run
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.state.rng
    }

    /// Number of node executions so far
    pub fn executed(&self) -> u32 {
        self.state.executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::shared_variables;
    use crate::host::Sandbox;
    use crate::node::{NodeKind, NodeKindTag, Rarity, SpellNode};
    use crate::nodes::{FlowNode, FlowType, VariableNode, VariableOperation};
    use crate::value::{ActorId, ValueKind};

    fn root_ctx() -> ExecutionContext {
        ExecutionContext::new(ActorId(1), shared_variables())
    }

    fn counter(name: &str) -> SpellNode {
        SpellNode::new(NodeKind::Variable(VariableNode {
            variable_name: name.to_string(),
            variable_type: ValueKind::Int,
            operation: VariableOperation::Increment,
            default_value: TypedValue::Int(0),
            ..VariableNode::default()
        }))
    }

    #[test]
    fn test_exec_out_chain_runs_in_order() {
        let mut graph = Graph::new("chain");
        let a = graph.add_node(counter("A"));
        let b = graph.add_node(counter("B"));
        graph.connect(a, names::EXEC_OUT, b, names::EXEC_IN).unwrap();

        let mut host = Sandbox::new();
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default().with_seed(1);
        let mut ctx = root_ctx();
        let report = Interpreter::new(&graph, &mut host, &mut memory, &options).run(a, &mut ctx);

        assert_eq!(report.trace, vec![a, b]);
        assert_eq!(report.completed, vec![b, a]);
        assert!(!report.truncated);
        assert_eq!(ctx.get("A"), TypedValue::Int(1));
        assert_eq!(ctx.get("B"), TypedValue::Int(1));
        assert_eq!(ctx.spell_cost, 6.0);
    }

    #[test]
    fn test_execution_budget_truncates() {
        let mut graph = Graph::new("loop");
        let outer = graph.add_node(
            SpellNode::new(NodeKind::Flow(FlowNode {
                flow_type: FlowType::Loop,
                max_iterations: 50,
                ..FlowNode::default()
            }))
            .with_rarity(Rarity::Legendary),
        );
        let inner = graph.add_node(counter("Hits"));
        graph.connect(outer, names::LOOP_BODY, inner, names::EXEC_IN).unwrap();

        let mut host = Sandbox::new();
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default().with_limits(ExecutionLimits {
            max_node_executions: 10,
            ..ExecutionLimits::default()
        });
        let mut ctx = root_ctx();
        let report =
            Interpreter::new(&graph, &mut host, &mut memory, &options).run(outer, &mut ctx);

        assert!(report.truncated);
        assert_eq!(report.executed, 10);
        assert_eq!(ctx.get("Hits"), TypedValue::Int(9));
    }

    #[test]
    fn test_missing_node_is_soft() {
        let graph = Graph::new("empty");
        let mut host = Sandbox::new();
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default();
        let mut ctx = root_ctx();
        let report = Interpreter::new(&graph, &mut host, &mut memory, &options)
            .run(NodeId::new(), &mut ctx);
        assert_eq!(report.executed, 0);
    }

    #[test]
    fn test_recursion_guard_resets_when_exceeded() {
        let graph = Graph::new("guard");
        let mut host = Sandbox::new();
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default().with_limits(ExecutionLimits {
            recursion_ceiling: 2,
            ..ExecutionLimits::default()
        });
        let mut run = Interpreter::new(&graph, &mut host, &mut memory, &options);
        let id = NodeId::new();
        assert!(run.enter_guard(id));
        assert!(run.enter_guard(id));
        assert!(!run.enter_guard(id));
        assert!(run.enter_guard(id));
        run.leave_guard(id);
        run.leave_guard(id);
        run.leave_guard(id);
        assert!(run.enter_guard(id));
    }

    #[test]
    fn test_history_ring_buffer() {
        let mut history = VariableHistory::new(3);
        for i in 0..5 {
            history.push(TypedValue::Float(i as f32), f64::from(i));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries().next().unwrap().value, TypedValue::Float(2.0));
        assert_eq!(history.float_average(), Some(3.0));
    }

    #[test]
    fn test_history_with_huge_capacity_allocates_lazily() {
        let mut history = VariableHistory::new(usize::MAX);
        history.push(TypedValue::Int(1), 0.0);
        history.push(TypedValue::Int(2), 1.0);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_data_output_binds_into_locals() {
        let mut graph = Graph::new("data");
        let looper = graph.add_node(SpellNode::new(NodeKind::Flow(FlowNode {
            flow_type: FlowType::Loop,
            max_iterations: 3,
            ..FlowNode::default()
        })));
        let sink = graph.add_node(SpellNode::new(NodeKind::Variable(VariableNode {
            variable_name: "Seen".into(),
            variable_type: ValueKind::Int,
            operation: VariableOperation::Set,
            ..VariableNode::default()
        })));
        graph.connect(looper, names::LOOP_BODY, sink, names::EXEC_IN).unwrap();
        graph.connect(looper, names::CURRENT_INDEX, sink, names::VALUE).unwrap();

        let mut host = Sandbox::new();
        let mut memory = SpellMemory::new();
        let options = ExecutionOptions::default();
        let mut ctx = root_ctx();
        Interpreter::new(&graph, &mut host, &mut memory, &options).run(looper, &mut ctx);

        assert_eq!(ctx.get("Seen"), TypedValue::Int(2));
        assert_eq!(graph.nodes_of_kind(NodeKindTag::Variable).count(), 1);
    }
}
