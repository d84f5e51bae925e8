use common::constants::{HFPERCLK_RATE, NUM_TIMERS};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Timer base clock must be non-zero")]
    ZeroBaseClock,

    #[error("Board has {} timers, {0} requested", NUM_TIMERS)]
    TooManyTimers(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocConfig {
    // Hz, before each timer's prescaler.
    pub base_clock: u32,
    pub num_timers: usize,
}

impl Default for SocConfig {
    fn default() -> Self {
        SocConfig{
            base_clock: HFPERCLK_RATE,
            num_timers: NUM_TIMERS,
        }
    }
}

impl SocConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_clock == 0 {
            return Err(ConfigError::ZeroBaseClock);
        }
        if self.num_timers > NUM_TIMERS {
            return Err(ConfigError::TooManyTimers(self.num_timers));
        }
        Ok(())
    }
}
