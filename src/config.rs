//! Bus configuration
//!
//! Queue capacities and the overflow policy, with defaults matching the
//! classic chat server and optional environment overrides.

use std::env;

use crate::error::ConfigError;

/// Intake queue capacity (pending submitted events)
pub const DEFAULT_INTAKE_CAPACITY: usize = 100;

/// Per-subscriber mailbox capacity (pending payloads)
pub const DEFAULT_MAILBOX_CAPACITY: usize = 20;

const INTAKE_CAPACITY_VAR: &str = "CHAT_BUS_INTAKE_CAPACITY";
const MAILBOX_CAPACITY_VAR: &str = "CHAT_BUS_MAILBOX_CAPACITY";
const OVERFLOW_VAR: &str = "CHAT_BUS_OVERFLOW";

/// What the dispatcher does when a recipient's mailbox is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for room. One full mailbox stalls fan-out to every later
    /// recipient and every later event until it drains or is closed.
    #[default]
    Block,
    /// Skip the full mailbox for this event and keep going.
    DropNewest,
}

impl OverflowPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "block" => Some(Self::Block),
            "drop_newest" | "drop-newest" => Some(Self::DropNewest),
            _ => None,
        }
    }
}

/// Bus construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub intake_capacity: usize,
    pub mailbox_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl BusConfig {
    /// Load overrides from `CHAT_BUS_*` environment variables
    ///
    /// Unset variables keep their defaults; a set but unparsable one is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(INTAKE_CAPACITY_VAR) {
            config.intake_capacity = parse_capacity(INTAKE_CAPACITY_VAR, value)?;
        }
        if let Some(value) = lookup(MAILBOX_CAPACITY_VAR) {
            config.mailbox_capacity = parse_capacity(MAILBOX_CAPACITY_VAR, value)?;
        }
        if let Some(value) = lookup(OVERFLOW_VAR) {
            config.overflow = OverflowPolicy::parse(&value).ok_or(ConfigError::InvalidValue {
                name: OVERFLOW_VAR,
                value,
            })?;
        }

        Ok(config)
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

/// Capacities are clamped to at least 1 (tokio channels reject 0)
fn parse_capacity(name: &'static str, value: String) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) => Ok(n.max(1)),
        Err(_) => Err(ConfigError::InvalidValue { name, value }),
    }
}
