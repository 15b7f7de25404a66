use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Delay between committing a move and publishing its snapshot.
    pub settle_delay: Duration,
    pub position_store_path: String,
    /// Enables the force-outcome admin route.
    pub allow_force_outcome: bool,
    /// Per-match event bus capacity before slow subscribers lag.
    pub event_buffer: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            settle_delay: env::var("SETTLE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            position_store_path: env::var("POSITION_STORE_PATH")
                .unwrap_or(defaults.position_store_path),
            allow_force_outcome: env::var("ALLOW_FORCE_OUTCOME")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.allow_force_outcome),
            event_buffer: env::var("EVENT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_buffer),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            settle_delay: Duration::from_millis(100),
            position_store_path: "data/saved_positions.bin".to_string(),
            allow_force_outcome: false,
            event_buffer: 256,
        }
    }
}
