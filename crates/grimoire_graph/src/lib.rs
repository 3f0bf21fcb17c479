// SPDX-License-Identifier: MIT OR Apache-2.0
//! Spell graph model and interpreter for Grimoire.
//!
//! A spell is a directed graph of typed nodes (Magic, Condition, Effect,
//! Flow, Variable, Trigger) joined pin to pin. Casting a spell walks the
//! graph from its root node, threading an [`ExecutionContext`] through every
//! node and calling into a [`SpellHost`] for side effects.
//!
//! ## Architecture
//!
//! - [`value`]: typed values and their conversions
//! - [`port`], [`connection`], [`graph`]: the graph arena and validation
//! - [`node`], [`nodes`]: node data and per-kind behavior
//! - [`context`]: variables and child contexts
//! - [`evaluation`]: the interpreter and per-run scratch state
//! - [`analysis`]: root resolution and cost walks

pub mod analysis;
pub mod connection;
pub mod context;
pub mod evaluation;
pub mod graph;
pub mod host;
pub mod node;
pub mod nodes;
pub mod port;
pub mod value;

pub use analysis::{compile_ability, resolve_root, spell_mana_cost, CompiledAbility};
pub use connection::{Connection, ConnectionId};
pub use context::{shared_variables, ExecutionContext, SharedVariables, TriggerEvent, VariableScope};
pub use evaluation::{
    ExecutionLimits, ExecutionOptions, ExecutionReport, Interpreter, PendingContinuation,
    SpellMemory,
};
pub use graph::{ConnectionError, Graph};
pub use host::{Sandbox, SandboxActor, SideEffect, SpellHost};
pub use node::{create_spell_registry, NodeId, NodeKind, NodeKindTag, NodeRegistry, Rarity, SpellNode};
pub use port::{PinDesc, PinDirection, PinRef, PinType};
pub use value::{ActorId, TypedValue, ValueKind, Vec3};
