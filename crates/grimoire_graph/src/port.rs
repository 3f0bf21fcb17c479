// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions for node inputs/outputs.

use crate::node::NodeId;
use crate::value::ValueKind;
use serde::{Deserialize, Serialize};

/// Well-known pin names
pub mod names {
    /// Execution entry
    pub const EXEC_IN: &str = "ExecIn";
    /// Default execution continuation
    pub const EXEC_OUT: &str = "ExecOut";
    /// Taken branch of a condition, branch or gate
    pub const TRUE: &str = "True";
    /// Untaken branch of a condition or branch
    pub const FALSE: &str = "False";
    /// Fired once per loop iteration
    pub const LOOP_BODY: &str = "LoopBody";
    /// Fired after a loop finishes
    pub const ON_COMPLETE: &str = "OnComplete";
    /// First parallel branch
    pub const BRANCH_1: &str = "Branch1";
    /// Second parallel branch
    pub const BRANCH_2: &str = "Branch2";
    /// Third parallel branch
    pub const BRANCH_3: &str = "Branch3";
    /// Fired after all parallel branches joined
    pub const ON_ALL_COMPLETE: &str = "OnAllComplete";
    /// Gate open output
    pub const OPEN: &str = "Open";
    /// Gate closed output
    pub const CLOSED: &str = "Closed";
    /// Condition result output
    pub const RESULT: &str = "Result";
    /// Loop index output
    pub const CURRENT_INDEX: &str = "CurrentIndex";
    /// Variable value after the operation
    pub const CURRENT_VALUE: &str = "CurrentValue";
    /// Variable value before the operation
    pub const PREVIOUS_VALUE: &str = "PreviousValue";
    /// Whether the variable operation changed the value
    pub const CHANGED: &str = "Changed";
    /// Damage dealt by a magic node
    pub const DAMAGE: &str = "Damage";
    /// Power contributed by a node
    pub const POWER: &str = "Power";
    /// Generic value input
    pub const VALUE: &str = "Value";
    /// Boolean condition input
    pub const CONDITION: &str = "Condition";
    /// Gate state input
    pub const GATE_OPEN: &str = "GateOpen";
    /// Numeric comparison input
    pub const CONDITION_VALUE: &str = "ConditionValue";
    /// Boolean condition input of a condition node
    pub const BOOL_CONDITION: &str = "BoolCondition";
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    /// Input pin
    Input,
    /// Output pin
    Output,
}

/// What flows through a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinType {
    /// Execution flow
    Execution,
    /// Typed data
    Data(ValueKind),
}

impl PinType {
    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PinType) -> bool {
        match (self, other) {
            (Self::Execution, Self::Execution) => true,
            (Self::Data(a), Self::Data(b)) => a.can_feed(*b),
            _ => false,
        }
    }

    /// Whether this is an execution pin
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution)
    }
}

/// Declared pin on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDesc {
    /// Pin name, unique per node and direction
    pub name: String,
    /// Pin direction
    pub direction: PinDirection,
    /// Pin type
    pub pin_type: PinType,
}

impl PinDesc {
    /// Execution input pin
    pub fn exec_input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PinDirection::Input,
            pin_type: PinType::Execution,
        }
    }

    /// Execution output pin
    pub fn exec_output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PinDirection::Output,
            pin_type: PinType::Execution,
        }
    }

    /// Data input pin
    pub fn data_input(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            direction: PinDirection::Input,
            pin_type: PinType::Data(kind),
        }
    }

    /// Data output pin
    pub fn data_output(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            direction: PinDirection::Output,
            pin_type: PinType::Data(kind),
        }
    }

    /// Check if a connection to another pin is valid
    pub fn can_connect(&self, other: &PinDesc) -> bool {
        if self.direction == other.direction {
            return false;
        }
        self.pin_type.can_connect_to(&other.pin_type)
    }
}

/// Far end of a connection: a node and one of its pins
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinRef {
    /// Node owning the pin
    pub node: NodeId,
    /// Pin name
    pub pin: String,
}

impl PinRef {
    /// Create a new pin reference
    pub fn new(node: NodeId, pin: impl Into<String>) -> Self {
        Self {
            node,
            pin: pin.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_does_not_mix_with_data() {
        let exec = PinDesc::exec_output(names::EXEC_OUT);
        let data = PinDesc::data_input(names::VALUE, ValueKind::None);
        assert!(!exec.can_connect(&data));
        assert!(exec.can_connect(&PinDesc::exec_input(names::EXEC_IN)));
    }

    #[test]
    fn test_same_direction_rejected() {
        let a = PinDesc::data_output(names::DAMAGE, ValueKind::Float);
        let b = PinDesc::data_output(names::POWER, ValueKind::Float);
        assert!(!a.can_connect(&b));
    }

    #[test]
    fn test_numeric_data_pins_connect() {
        let a = PinDesc::data_output(names::CURRENT_INDEX, ValueKind::Int);
        let b = PinDesc::data_input(names::CONDITION_VALUE, ValueKind::Float);
        assert!(a.can_connect(&b));
        let c = PinDesc::data_input(names::GATE_OPEN, ValueKind::Bool);
        assert!(!a.can_connect(&c));
    }
}
