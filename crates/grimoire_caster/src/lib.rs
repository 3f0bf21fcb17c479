// SPDX-License-Identifier: MIT OR Apache-2.0
//! Caster state for Grimoire.
//!
//! A [`CasterState`] owns one actor's spells and gates casting on mana and
//! cooldowns. On the authoritative side casts run and charge immediately.
//! A predicting caster runs them locally, forwards every request, and
//! reconciles when the authority's [`CastResult`] arrives.

pub mod caster;
pub mod config;
pub mod prediction;
pub mod spell;

pub use caster::{Authority, CastError, CastOutcome, CasterEvent, CasterState};
pub use config::{CasterConfig, ConfigError};
pub use prediction::{CastRequest, CastResult, Prediction, PredictionLedger};
pub use spell::{InputSlot, SpellDefinition};
