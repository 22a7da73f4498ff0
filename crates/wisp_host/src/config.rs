use serde::Serialize;
use std::env;

pub const DEFAULT_STEP_BUDGET: u32 = 10_000;
pub const STEPS_ENV: &str = "WISP_STEPS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    /// Reduction steps granted to each evaluation.
    pub step_budget: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var(STEPS_ENV) {
            config.apply_steps(&raw);
        }
        config
    }

    fn apply_steps(&mut self, raw: &str) {
        match raw.trim().parse() {
            Ok(steps) => self.step_budget = steps,
            Err(_) => log::warn!("ignoring {STEPS_ENV}={raw:?}: not a step count"),
        }
    }
}
