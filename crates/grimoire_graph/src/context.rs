// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution context threaded through a spell run.

use crate::value::{ActorId, TypedValue, Vec3};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

/// Ordered variable storage
pub type VariableMap = IndexMap<String, TypedValue>;

/// Global variables shared between a caster's blackboard and root contexts
pub type SharedVariables = Arc<RwLock<VariableMap>>;

/// Create an empty shared variable map
pub fn shared_variables() -> SharedVariables {
    Arc::new(RwLock::new(VariableMap::new()))
}

/// Reserved variable names written by built-in nodes
pub mod names {
    /// Result of the last condition
    pub const CONDITION_RESULT: &str = "ConditionResult";
    /// Name of the last condition node
    pub const LAST_CONDITION_NODE: &str = "LastConditionNode";
    /// Current sequence step
    pub const SEQUENCE_INDEX: &str = "SequenceIndex";
    /// Number of sequence steps
    pub const SEQUENCE_TOTAL: &str = "SequenceTotal";
    /// Current loop iteration
    pub const LOOP_INDEX: &str = "LoopIndex";
    /// Number of loop iterations
    pub const LOOP_TOTAL: &str = "LoopTotal";
    /// Current for-loop iteration
    pub const FOR_INDEX: &str = "ForIndex";
    /// Number of for-loop iterations
    pub const FOR_TOTAL: &str = "ForTotal";
    /// Current while-loop iteration
    pub const WHILE_INDEX: &str = "WhileIndex";
    /// Condition read by while loops and branches
    pub const CONDITION: &str = "Condition";
    /// Gate state
    pub const GATE_OPEN: &str = "GateOpen";
    /// Iteration count override
    pub const ITERATION_COUNT: &str = "IterationCount";
    /// Delay override in seconds
    pub const DELAY_TIME: &str = "DelayTime";
    /// Cleared to stop a loop early
    pub const SHOULD_CONTINUE: &str = "ShouldContinue";
    /// Default loop break variable
    pub const SHOULD_BREAK: &str = "ShouldBreak";
    /// Boolean bound to a condition node
    pub const BOOL_CONDITION: &str = "BoolCondition";
    /// Numeric compare input
    pub const CONDITION_VALUE: &str = "ConditionValue";
    /// Numeric compare threshold override
    pub const COMPARE_VALUE: &str = "CompareValue";
    /// Target health fraction
    pub const TARGET_HEALTH: &str = "TargetHealth";
    /// Caster to target distance
    pub const DISTANCE: &str = "Distance";
    /// Random draw
    pub const RANDOM_VALUE: &str = "RandomValue";
    /// Effective random threshold
    pub const CHANCE_THRESHOLD: &str = "ChanceThreshold";
    /// Status query result
    pub const HAS_STATUS: &str = "HasStatus";
    /// Seconds since the cast started
    pub const TIME_SINCE_START: &str = "TimeSinceStart";
    /// Confidence marker of uncommon conditions
    pub const CONDITION_CONFIDENCE: &str = "ConditionConfidence";
    /// Previous condition result
    pub const PREVIOUS_CONDITION: &str = "PreviousCondition";
    /// Last condition result
    pub const LAST_CONDITION_RESULT: &str = "LastConditionResult";
    /// Secondary condition combined by epic conditions
    pub const SECONDARY_CONDITION: &str = "SecondaryCondition";
    /// Combined condition result
    pub const COMPLEX_CONDITION: &str = "ComplexCondition";
    /// Rare flow marker
    pub const TIMING_PRECISION: &str = "TimingPrecision";
    /// Epic flow marker
    pub const OPTIMIZED_LOOP: &str = "OptimizedLoop";
    /// Legendary flow marker
    pub const PARALLEL_SUPPORT: &str = "ParallelSupport";
    /// Legendary flow marker
    pub const QUANTUM_FLOW: &str = "QuantumFlow";
    /// Variable value after the operation
    pub const CURRENT_VALUE: &str = "CurrentValue";
    /// Variable value before the operation
    pub const PREVIOUS_VALUE: &str = "PreviousValue";
    /// Whether the variable changed
    pub const VALUE_CHANGED: &str = "ValueChanged";
    /// Explicit value for a Set operation
    pub const NEW_VALUE: &str = "NewValue";
    /// Generic operand
    pub const VALUE: &str = "Value";
    /// Second operand override
    pub const OPERAND_B: &str = "OperandB";
    /// Uncommon variable marker
    pub const AUTO_CONVERT: &str = "AutoConvert";
    /// Number of history entries
    pub const HISTORY_COUNT: &str = "HistoryCount";
    /// Average of the float history
    pub const VARIABLE_AVERAGE: &str = "VariableAverage";
    /// Legendary variable marker
    pub const HAS_PERSISTENT_MEMORY: &str = "HasPersistentMemory";
    /// Rare variable marker
    pub const VARIABLE_HISTORY: &str = "VariableHistory";
    /// Element of the last magic node
    pub const LAST_ELEMENT: &str = "LastElement";
    /// Whether the last trigger passed
    pub const TRIGGER_PASSED: &str = "TriggerPassed";
}

/// Which variable table an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VariableScope {
    /// Context-local variables
    #[default]
    Local,
    /// Variables shared across the cast
    Global,
}

/// Event that started a cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerEvent {
    /// Player cast
    #[default]
    OnCast,
    /// Projectile or spell hit
    OnHit,
    /// Enemy entered range
    OnEnemyEnter,
    /// Timer fired
    OnTimer,
}

/// State threaded through one spell run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Casting actor
    pub caster: ActorId,
    /// Target actor
    pub target: Option<ActorId>,
    /// Target location
    pub target_location: Option<Vec3>,
    /// Event that started the cast
    pub event: TriggerEvent,
    /// Host clock at cast start, in seconds
    pub started_at: f64,
    /// Nesting depth; root is 0
    pub depth: u32,
    /// Accumulated spell power
    pub spell_power: f32,
    /// Accumulated cost of executed nodes
    pub spell_cost: f32,
    local: VariableMap,
    globals: SharedVariables,
}

impl ExecutionContext {
    /// Create a root context sharing the given globals
    pub fn new(caster: ActorId, globals: SharedVariables) -> Self {
        Self {
            caster,
            target: None,
            target_location: None,
            event: TriggerEvent::OnCast,
            started_at: 0.0,
            depth: 0,
            spell_power: 0.0,
            spell_cost: 0.0,
            local: VariableMap::new(),
            globals,
        }
    }

    /// Set the target actor
    pub fn with_target(mut self, target: Option<ActorId>) -> Self {
        self.target = target;
        self
    }

    /// Set the target location
    pub fn with_location(mut self, location: Option<Vec3>) -> Self {
        self.target_location = location;
        self
    }

    /// Set the trigger event
    pub fn with_event(mut self, event: TriggerEvent) -> Self {
        self.event = event;
        self
    }

    /// Set the start timestamp
    pub fn with_started_at(mut self, started_at: f64) -> Self {
        self.started_at = started_at;
        self
    }

    /// Write a variable
    pub fn set_variable(&mut self, name: &str, value: TypedValue, scope: VariableScope) {
        match scope {
            VariableScope::Local => {
                self.local.insert(name.to_string(), value);
            }
            VariableScope::Global => {
                self.globals.write().insert(name.to_string(), value);
            }
        }
    }

    /// Shorthand for a local write
    pub fn set_local(&mut self, name: &str, value: impl Into<TypedValue>) {
        self.set_variable(name, value.into(), VariableScope::Local);
    }

    /// Read a variable.
    ///
    /// Local reads fall back to globals; absent variables read as `None`.
    pub fn get_variable(&self, name: &str, scope: VariableScope) -> TypedValue {
        if scope == VariableScope::Local {
            if let Some(value) = self.local.get(name) {
                return value.clone();
            }
        }
        self.globals.read().get(name).cloned().unwrap_or_default()
    }

    /// Shorthand for a local read with global fallback
    pub fn get(&self, name: &str) -> TypedValue {
        self.get_variable(name, VariableScope::Local)
    }

    /// Check whether a variable exists
    pub fn has_variable(&self, name: &str, scope: VariableScope) -> bool {
        match scope {
            VariableScope::Local => {
                self.local.contains_key(name) || self.globals.read().contains_key(name)
            }
            VariableScope::Global => self.globals.read().contains_key(name),
        }
    }

    /// Remove all variables of a scope
    pub fn clear_variables(&mut self, scope: VariableScope) {
        match scope {
            VariableScope::Local => self.local.clear(),
            VariableScope::Global => self.globals.write().clear(),
        }
    }

    /// Derive a child context.
    ///
    /// The child copies locals and gets a private copy of the globals.
    pub fn create_child_context(&self) -> ExecutionContext {
        let globals = self.globals.read().clone();
        ExecutionContext {
            caster: self.caster,
            target: self.target,
            target_location: self.target_location,
            event: self.event,
            started_at: self.started_at,
            depth: self.depth + 1,
            spell_power: self.spell_power,
            spell_cost: self.spell_cost,
            local: self.local.clone(),
            globals: Arc::new(RwLock::new(globals)),
        }
    }

    /// Fold a child's globals back into this context, replacing ours
    pub fn merge_child_context(&mut self, child: &ExecutionContext) {
        if Arc::ptr_eq(&self.globals, &child.globals) {
            return;
        }
        let snapshot = child.globals.read().clone();
        *self.globals.write() = snapshot;
    }

    /// Local variables
    pub fn locals(&self) -> &VariableMap {
        &self.local
    }

    /// Snapshot of the global variables
    pub fn globals_snapshot(&self) -> VariableMap {
        self.globals.read().clone()
    }

    /// Handle to the shared globals
    pub fn globals(&self) -> &SharedVariables {
        &self.globals
    }

    /// Multi-line dump for logs
    pub fn debug_string(&self) -> String {
        let mut out = format!(
            "Context depth={} power={:.2} cost={:.2} caster={}",
            self.depth, self.spell_power, self.spell_cost, self.caster
        );
        if let Some(target) = self.target {
            let _ = write!(out, " target={target}");
        }
        if let Some(location) = self.target_location {
            let _ = write!(out, " location=({location})");
        }
        out.push_str("\nLocal:");
        for (name, value) in &self.local {
            let _ = write!(out, "\n  {name} = {value}");
        }
        out.push_str("\nGlobal:");
        for (name, value) in self.globals.read().iter() {
            let _ = write!(out, "\n  {name} = {value}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ActorId(1), shared_variables())
    }

    #[test]
    fn test_local_falls_back_to_global() {
        let mut c = ctx();
        c.set_variable("Health", TypedValue::Float(0.5), VariableScope::Global);
        assert_eq!(c.get("Health"), TypedValue::Float(0.5));
        assert!(c.has_variable("Health", VariableScope::Local));

        c.set_local("Health", 0.9_f32);
        assert_eq!(c.get("Health"), TypedValue::Float(0.9));
        assert_eq!(c.get_variable("Health", VariableScope::Global), TypedValue::Float(0.5));
    }

    #[test]
    fn test_global_read_ignores_locals() {
        let mut c = ctx();
        c.set_local("OnlyLocal", true);
        assert!(c.get_variable("OnlyLocal", VariableScope::Global).is_none());
        assert!(!c.has_variable("OnlyLocal", VariableScope::Global));
        assert!(c.get("Missing").is_none());
    }

    #[test]
    fn test_child_isolation_and_merge() {
        let mut parent = ctx();
        parent.set_variable("Shared", TypedValue::Int(1), VariableScope::Global);
        parent.set_local("L", 1);

        let mut child = parent.create_child_context();
        assert_eq!(child.depth, 1);
        child.set_variable("Shared", TypedValue::Int(2), VariableScope::Global);
        child.set_variable("New", TypedValue::Bool(true), VariableScope::Global);
        child.set_local("L", 2);

        assert_eq!(parent.get_variable("Shared", VariableScope::Global), TypedValue::Int(1));
        parent.merge_child_context(&child);
        assert_eq!(parent.get_variable("Shared", VariableScope::Global), TypedValue::Int(2));
        assert_eq!(parent.get_variable("New", VariableScope::Global), TypedValue::Bool(true));
        assert_eq!(parent.get("L"), TypedValue::Int(1));
    }

    #[test]
    fn test_root_shares_globals() {
        let globals = shared_variables();
        let mut c = ExecutionContext::new(ActorId(1), globals.clone());
        c.set_variable("X", TypedValue::Int(3), VariableScope::Global);
        assert_eq!(globals.read().get("X"), Some(&TypedValue::Int(3)));

        c.clear_variables(VariableScope::Global);
        assert!(globals.read().is_empty());
    }

    #[test]
    fn test_debug_string_lists_variables() {
        let mut c = ctx();
        c.set_local("A", 1);
        c.set_variable("B", TypedValue::Bool(false), VariableScope::Global);
        let dump = c.debug_string();
        assert!(dump.contains("A = 1"));
        assert!(dump.contains("B = false"));
    }
}
