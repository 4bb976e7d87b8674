//! Interpreter configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reference bound on the evaluation stack
pub const DEFAULT_STACK_LIMIT: usize = 1000;

/// Largest state vector an interpreter allocates by default (128 MiB per generation)
pub const DEFAULT_MAX_SLOTS: usize = 1 << 24;

/// Evaluation strategy for `tick()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Interpreter,
    /// Cranelift-compiled native code (requires the `jit` feature)
    Jit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Independent instances packed into each slot, one per bit (1..=64)
    pub lanes: usize,
    /// Deepest evaluation stack a program may need
    pub stack_limit: usize,
    /// Upper bound on the slot count a program header may declare
    pub max_slots: usize,
    pub backend: Backend,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            lanes: 64,
            stack_limit: DEFAULT_STACK_LIMIT,
            max_slots: DEFAULT_MAX_SLOTS,
            backend: Backend::Interpreter,
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lanes == 0 || self.lanes > 64 {
            return Err(Error::InvalidConfig(format!(
                "lanes must be in 1..=64, got {}",
                self.lanes
            )));
        }
        if self.max_slots == 0 {
            return Err(Error::InvalidConfig("max_slots must be at least 1".into()));
        }
        if self.backend == Backend::Jit && !cfg!(feature = "jit") {
            return Err(Error::InvalidConfig(
                "jit backend requested but the crate was built without the `jit` feature".into(),
            ));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn lane_mask(&self) -> u64 {
        if self.lanes >= 64 {
            u64::MAX
        } else {
            (1u64 << self.lanes) - 1
        }
    }
}
