// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed values that flow between spell nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Handle to an actor owned by the host world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// A 3D vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// The zero vector
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    /// Create a new vector
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: Vec3) -> f32 {
        (*self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X={:.3} Y={:.3} Z={:.3}", self.x, self.y, self.z)
    }
}

/// Kind tag of a [`TypedValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueKind {
    /// No value
    #[default]
    None,
    /// Floating point
    Float,
    /// 32-bit integer
    Int,
    /// Boolean
    Bool,
    /// String
    String,
    /// 3D vector
    Vector,
    /// Actor reference
    ObjectRef,
}

impl ValueKind {
    /// Check if a data pin of this kind can feed a pin of another kind.
    ///
    /// `None` acts as a wildcard.
    pub fn can_feed(&self, other: ValueKind) -> bool {
        if *self == ValueKind::None || other == ValueKind::None || *self == other {
            return true;
        }
        matches!(
            (self, other),
            (ValueKind::Int, ValueKind::Float) | (ValueKind::Float, ValueKind::Int)
        )
    }
}

/// A typed value stored in variables and carried by data pins.
///
/// Values are immutable; every operation produces a new value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TypedValue {
    /// No value
    #[default]
    None,
    /// Floating point
    Float(f32),
    /// 32-bit integer
    Int(i32),
    /// Boolean
    Bool(bool),
    /// String
    String(String),
    /// 3D vector
    Vector(Vec3),
    /// Actor reference (may be empty)
    ObjectRef(Option<ActorId>),
}

impl TypedValue {
    /// Get the kind tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::None => ValueKind::None,
            Self::Float(_) => ValueKind::Float,
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::String(_) => ValueKind::String,
            Self::Vector(_) => ValueKind::Vector,
            Self::ObjectRef(_) => ValueKind::ObjectRef,
        }
    }

    /// Check whether this is [`TypedValue::None`]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Numeric view of Float, Int and Bool values
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer payload, only for Int values
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean payload, only for Bool values
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Vector payload, only for Vector values
    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload, only for String values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness used by condition checks: Bool as-is, positive numbers are true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(v) => *v,
            Self::Float(v) => *v > 0.0,
            Self::Int(v) => *v > 0,
            _ => false,
        }
    }

    /// Explicit conversion to another kind.
    ///
    /// Vector, ObjectRef and None targets return the value unchanged.
    pub fn convert_to(&self, target: ValueKind) -> TypedValue {
        match target {
            ValueKind::Float => TypedValue::Float(match self {
                Self::Float(v) => *v,
                Self::Int(v) => *v as f32,
                Self::Bool(v) => {
                    if *v {
                        1.0
                    } else {
                        0.0
                    }
                }
                Self::String(s) => s.trim().parse().unwrap_or(0.0),
                _ => 0.0,
            }),
            ValueKind::Int => TypedValue::Int(match self {
                Self::Int(v) => *v,
                Self::Float(v) => *v as i32,
                Self::Bool(v) => i32::from(*v),
                Self::String(s) => s.trim().parse().unwrap_or(0),
                _ => 0,
            }),
            ValueKind::Bool => TypedValue::Bool(match self {
                Self::Bool(v) => *v,
                Self::Float(v) => *v != 0.0,
                Self::Int(v) => *v != 0,
                Self::String(s) => !s.is_empty(),
                _ => false,
            }),
            ValueKind::String => TypedValue::String(match self {
                Self::String(s) => s.clone(),
                Self::Float(v) => format!("{v:.2}"),
                Self::Int(v) => v.to_string(),
                Self::Bool(v) => v.to_string(),
                Self::Vector(v) => v.to_string(),
                _ => String::new(),
            }),
            ValueKind::Vector | ValueKind::ObjectRef | ValueKind::None => self.clone(),
        }
    }

    /// Zero value of a kind
    pub fn zero(kind: ValueKind) -> TypedValue {
        match kind {
            ValueKind::None => TypedValue::None,
            ValueKind::Float => TypedValue::Float(0.0),
            ValueKind::Int => TypedValue::Int(0),
            ValueKind::Bool => TypedValue::Bool(false),
            ValueKind::String => TypedValue::String(String::new()),
            ValueKind::Vector => TypedValue::Vector(Vec3::ZERO),
            ValueKind::ObjectRef => TypedValue::ObjectRef(None),
        }
    }
}

impl From<f32> for TypedValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec3> for TypedValue {
    fn from(v: Vec3) -> Self {
        Self::Vector(v)
    }
}

impl From<ActorId> for TypedValue {
    fn from(v: ActorId) -> Self {
        Self::ObjectRef(Some(v))
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Vector(v) => write!(f, "({v})"),
            Self::ObjectRef(Some(id)) => write!(f, "{id}"),
            Self::ObjectRef(None) => write!(f, "null"),
        }
    }
}
