// SPDX-License-Identifier: MIT OR Apache-2.0
//! World seam used by nodes to observe and mutate actors.
//!
//! The interpreter never touches a game world directly. Every query and side
//! effect goes through [`SpellHost`]; [`Sandbox`] is an in-memory world used
//! by tests and the simulator.

use crate::nodes::{Element, StatusEffect};
use crate::value::{ActorId, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A cosmetic projectile spawned by a magic node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Casting actor
    pub owner: ActorId,
    /// Element of the spawning node
    pub element: Element,
    /// Spawn location
    pub location: Vec3,
    /// Lifetime in seconds
    pub lifespan: f32,
}

/// Queries and side effects available to executing nodes
pub trait SpellHost {
    /// Current clock in seconds
    fn now(&self) -> f64;

    /// Location of an actor
    fn location(&self, actor: ActorId) -> Option<Vec3>;

    /// Health of an actor as a fraction of its maximum
    fn health_fraction(&self, actor: ActorId) -> Option<f32>;

    /// Whether an actor currently carries a status
    fn has_status(&self, actor: ActorId, status: StatusEffect) -> bool;

    /// Deal damage
    fn apply_damage(&mut self, target: ActorId, amount: f32, element: Option<Element>);

    /// Restore health
    fn heal(&mut self, target: ActorId, amount: f32);

    /// Move an actor instantly
    fn teleport(&mut self, actor: ActorId, location: Vec3);

    /// Launch an actor with a velocity
    fn launch(&mut self, actor: ActorId, velocity: Vec3);

    /// Apply a timed status
    fn apply_status(&mut self, actor: ActorId, status: StatusEffect, duration: f32);

    /// Spawn a cosmetic projectile
    fn spawn_projectile(&mut self, projectile: Projectile);
}

/// Actor record kept by the [`Sandbox`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxActor {
    /// World location
    pub location: Vec3,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Active statuses and their expiry time
    #[serde(default)]
    pub statuses: IndexMap<StatusEffect, f64>,
}

impl SandboxActor {
    /// Create an actor at full health
    pub fn new(location: Vec3, max_health: f32) -> Self {
        Self {
            location,
            health: max_health,
            max_health,
            statuses: IndexMap::new(),
        }
    }
}

/// A side effect recorded by the [`Sandbox`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SideEffect {
    /// Damage dealt
    Damage {
        /// Target
        target: ActorId,
        /// Amount
        amount: f32,
        /// Element, if elemental
        element: Option<Element>,
    },
    /// Health restored
    Heal {
        /// Target
        target: ActorId,
        /// Amount
        amount: f32,
    },
    /// Actor moved
    Teleport {
        /// Actor
        actor: ActorId,
        /// New location
        location: Vec3,
    },
    /// Actor launched
    Launch {
        /// Actor
        actor: ActorId,
        /// Launch velocity
        velocity: Vec3,
    },
    /// Status applied
    Status {
        /// Actor
        actor: ActorId,
        /// Status
        status: StatusEffect,
        /// Duration in seconds
        duration: f32,
    },
    /// Projectile spawned
    Projectile(Projectile),
}

/// In-memory world
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sandbox {
    clock: f64,
    actors: IndexMap<ActorId, SandboxActor>,
    effects: Vec<SideEffect>,
}

impl Sandbox {
    /// Create an empty world at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an actor
    pub fn spawn(&mut self, id: ActorId, actor: SandboxActor) {
        self.actors.insert(id, actor);
    }

    /// Get an actor
    pub fn actor(&self, id: ActorId) -> Option<&SandboxActor> {
        self.actors.get(&id)
    }

    /// Get an actor mutably
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut SandboxActor> {
        self.actors.get_mut(&id)
    }

    /// All actors
    pub fn actors(&self) -> impl Iterator<Item = (&ActorId, &SandboxActor)> {
        self.actors.iter()
    }

    /// Advance the clock and expire statuses
    pub fn advance(&mut self, dt: f32) {
        self.clock += f64::from(dt.max(0.0));
        let now = self.clock;
        for actor in self.actors.values_mut() {
            actor.statuses.retain(|_, expires| *expires > now);
        }
    }

    /// Recorded side effects in order
    pub fn effects(&self) -> &[SideEffect] {
        &self.effects
    }

    /// Take the recorded side effects
    pub fn drain_effects(&mut self) -> Vec<SideEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Total damage dealt to an actor so far
    pub fn damage_dealt_to(&self, target: ActorId) -> f32 {
        self.effects
            .iter()
            .filter_map(|e| match e {
                SideEffect::Damage { target: t, amount, .. } if *t == target => Some(*amount),
                _ => None,
            })
            .sum()
    }
}

impl SpellHost for Sandbox {
    fn now(&self) -> f64 {
        self.clock
    }

    fn location(&self, actor: ActorId) -> Option<Vec3> {
        self.actors.get(&actor).map(|a| a.location)
    }

    fn health_fraction(&self, actor: ActorId) -> Option<f32> {
        self.actors.get(&actor).map(|a| {
            if a.max_health > 0.0 {
                a.health / a.max_health
            } else {
                0.0
            }
        })
    }

    fn has_status(&self, actor: ActorId, status: StatusEffect) -> bool {
        self.actors
            .get(&actor)
            .is_some_and(|a| a.statuses.contains_key(&status))
    }

    fn apply_damage(&mut self, target: ActorId, amount: f32, element: Option<Element>) {
        if let Some(actor) = self.actors.get_mut(&target) {
            actor.health = (actor.health - amount).clamp(0.0, actor.max_health);
        }
        self.effects.push(SideEffect::Damage {
            target,
            amount,
            element,
        });
    }

    fn heal(&mut self, target: ActorId, amount: f32) {
        if let Some(actor) = self.actors.get_mut(&target) {
            actor.health = (actor.health + amount).clamp(0.0, actor.max_health);
        }
        self.effects.push(SideEffect::Heal { target, amount });
    }

    fn teleport(&mut self, actor: ActorId, location: Vec3) {
        if let Some(a) = self.actors.get_mut(&actor) {
            a.location = location;
        }
        self.effects.push(SideEffect::Teleport { actor, location });
    }

    fn launch(&mut self, actor: ActorId, velocity: Vec3) {
        self.effects.push(SideEffect::Launch { actor, velocity });
    }

    fn apply_status(&mut self, actor: ActorId, status: StatusEffect, duration: f32) {
        let expires = self.clock + f64::from(duration);
        if let Some(a) = self.actors.get_mut(&actor) {
            a.statuses.insert(status, expires);
        }
        self.effects.push(SideEffect::Status {
            actor,
            status,
            duration,
        });
    }

    fn spawn_projectile(&mut self, projectile: Projectile) {
        self.effects.push(SideEffect::Projectile(projectile));
    }
}
