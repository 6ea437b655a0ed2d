//! Server configuration
//!
//! Compiled-in defaults, overridable through `TICTACTOE_*` environment
//! variables. Unparseable values are logged and the default is kept.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::ai::DEFAULT_RANDOM_MOVE_PROBABILITY;
use crate::cache::DEFAULT_CAPACITY;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

pub const REAPER_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const STALE_ROOM_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);
pub const PRESSURE_INTERVAL: Duration = Duration::from_secs(60);
pub const IDLE_ROOM_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const ROOM_SOFT_LIMIT: usize = 1_000;
pub const AI_MOVE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// How often stale rooms are swept
    pub reaper_interval: Duration,
    /// Rooms idle longer than this are removed regardless of status
    pub stale_room_timeout: Duration,
    /// How often the store size is checked for the pressure sweep
    pub pressure_interval: Duration,
    /// Non-playing rooms idle longer than this are removed under pressure
    pub idle_room_timeout: Duration,
    /// Room count above which the pressure sweep runs
    pub room_soft_limit: usize,
    /// Pause before the AI answers
    pub ai_move_delay: Duration,
    pub ai_random_move_probability: f64,
    pub score_cache_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            reaper_interval: REAPER_INTERVAL,
            stale_room_timeout: STALE_ROOM_TIMEOUT,
            pressure_interval: PRESSURE_INTERVAL,
            idle_room_timeout: IDLE_ROOM_TIMEOUT,
            room_soft_limit: ROOM_SOFT_LIMIT,
            ai_move_delay: AI_MOVE_DELAY,
            ai_random_move_probability: DEFAULT_RANDOM_MOVE_PROBABILITY,
            score_cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            parse(&lookup, key).map(Duration::from_secs).unwrap_or(default)
        };

        Self {
            bind_addr: lookup("TICTACTOE_ADDR").unwrap_or(defaults.bind_addr),
            reaper_interval: secs("TICTACTOE_REAPER_INTERVAL_SECS", defaults.reaper_interval),
            stale_room_timeout: secs("TICTACTOE_STALE_ROOM_SECS", defaults.stale_room_timeout),
            pressure_interval: secs("TICTACTOE_PRESSURE_INTERVAL_SECS", defaults.pressure_interval),
            idle_room_timeout: secs("TICTACTOE_IDLE_ROOM_SECS", defaults.idle_room_timeout),
            room_soft_limit: parse(&lookup, "TICTACTOE_ROOM_SOFT_LIMIT")
                .unwrap_or(defaults.room_soft_limit),
            ai_move_delay: parse(&lookup, "TICTACTOE_AI_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ai_move_delay),
            ai_random_move_probability: parse(&lookup, "TICTACTOE_AI_RANDOM_PROBABILITY")
                .unwrap_or(defaults.ai_random_move_probability),
            score_cache_capacity: parse(&lookup, "TICTACTOE_SCORE_CACHE_CAPACITY")
                .unwrap_or(defaults.score_cache_capacity),
        }
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}
