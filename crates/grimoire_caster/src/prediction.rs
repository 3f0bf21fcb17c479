// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cast requests, authoritative results and the client-side prediction ledger.
//!
//! A predicting caster runs casts locally, remembers what it debited, and
//! forwards every request to the authority. Results come back in order and
//! are matched to the oldest outstanding prediction of the same spell.

use grimoire_graph::context::TriggerEvent;
use grimoire_graph::value::{ActorId, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A request to cast a spell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastRequest {
    /// Spell name
    pub spell: String,
    /// Target actor
    #[serde(default)]
    pub target: Option<ActorId>,
    /// Target location
    #[serde(default)]
    pub location: Option<Vec3>,
    /// Event that started the cast
    #[serde(default)]
    pub event: TriggerEvent,
}

impl CastRequest {
    /// Cast `spell` with no target
    pub fn new(spell: impl Into<String>) -> Self {
        Self {
            spell: spell.into(),
            target: None,
            location: None,
            event: TriggerEvent::OnCast,
        }
    }

    /// Set the target actor
    pub fn with_target(mut self, target: ActorId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the target location
    pub fn with_location(mut self, location: Vec3) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the trigger event
    pub fn with_event(mut self, event: TriggerEvent) -> Self {
        self.event = event;
        self
    }
}

/// The authority's verdict on a forwarded cast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastResult {
    /// Spell name
    pub spell: String,
    /// Whether the authority executed the cast
    pub success: bool,
    /// Mana the authority charged, or would have charged
    pub actual_mana_cost: f32,
}

/// A locally predicted cast awaiting its result
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Spell name
    pub spell: String,
    /// Mana debited locally; zero when the local check failed
    pub debited: f32,
}

impl Prediction {
    /// Whether the prediction took mana
    pub fn did_debit(&self) -> bool {
        self.debited > 0.0
    }
}

/// Outstanding predictions and requests not yet sent
#[derive(Debug, Clone, Default)]
pub struct PredictionLedger {
    pending: VecDeque<Prediction>,
    outbox: Vec<CastRequest>,
}

impl PredictionLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prediction and queue its request for the authority
    pub fn record(&mut self, request: CastRequest, debited: f32) {
        self.pending.push_back(Prediction {
            spell: request.spell.clone(),
            debited,
        });
        self.outbox.push(request);
    }

    /// Remove and return the oldest prediction of `spell`
    pub fn take_oldest(&mut self, spell: &str) -> Option<Prediction> {
        let index = self.pending.iter().position(|p| p.spell == spell)?;
        self.pending.remove(index)
    }

    /// Requests waiting to be sent
    pub fn drain_outbox(&mut self) -> Vec<CastRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Outstanding predictions, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &Prediction> {
        self.pending.iter()
    }

    /// Number of outstanding predictions
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
