// SPDX-License-Identifier: MIT OR Apache-2.0
//! Caster configuration loaded from RON.

use grimoire_graph::evaluation::{ExecutionLimits, ExecutionOptions};
use grimoire_graph::nodes::ElementTable;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// RON syntax or shape error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Values out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Economy and interpreter settings of one caster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasterConfig {
    /// Mana ceiling
    pub max_mana: f32,
    /// Mana at creation; `None` starts full
    pub starting_mana: Option<f32>,
    /// Mana regenerated per second
    pub mana_regen_rate: f32,
    /// Cooldown given to spells made with `create_spell`
    pub default_cooldown: f32,
    /// Interpreter ceilings
    pub limits: ExecutionLimits,
    /// Element interaction table
    pub elements: ElementTable,
    /// Fixed RNG seed for reproducible casts
    pub rng_seed: Option<u64>,
}

impl Default for CasterConfig {
    fn default() -> Self {
        Self {
            max_mana: 100.0,
            starting_mana: None,
            mana_regen_rate: 5.0,
            default_cooldown: 0.0,
            limits: ExecutionLimits::default(),
            elements: ElementTable::default(),
            rng_seed: None,
        }
    }
}

impl CasterConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: CasterConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::info!("Loaded caster config from {}", path.display());
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !self.max_mana.is_finite() || self.max_mana < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_mana must be a non-negative number, got {}",
                self.max_mana
            )));
        }
        if let Some(start) = self.starting_mana {
            if !(0.0..=self.max_mana).contains(&start) {
                return Err(ConfigError::Invalid(format!(
                    "starting_mana {} is outside 0..={}",
                    start, self.max_mana
                )));
            }
        }
        if !self.mana_regen_rate.is_finite() || self.mana_regen_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mana_regen_rate must be non-negative, got {}",
                self.mana_regen_rate
            )));
        }
        if self.default_cooldown < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "default_cooldown must be non-negative, got {}",
                self.default_cooldown
            )));
        }
        if self.limits.max_call_depth == 0 || self.limits.max_node_executions == 0 {
            return Err(ConfigError::Invalid(
                "execution limits must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Mana at creation
    pub fn initial_mana(&self) -> f32 {
        self.starting_mana.unwrap_or(self.max_mana)
    }

    /// Interpreter options for casts
    pub fn execution_options(&self) -> ExecutionOptions {
        let options = ExecutionOptions::default()
            .with_limits(self.limits)
            .with_elements(self.elements.clone());
        match self.rng_seed {
            Some(seed) => options.with_seed(seed),
            None => options,
        }
    }
}
