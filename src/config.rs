use std::env;

// Server Configuration
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_API_BIND_ADDRESS: &str = "127.0.0.1:8889";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const STATS_INTERVAL_SECS: u64 = 60;

// Data Source Configuration
pub const RATES_URL: &str = "https://www.cbr-xml-daily.ru/daily_json.js";

// Per-connection outbound queue; a subscriber that falls this far behind
// starts losing deliveries instead of stalling publish.
pub const SUBSCRIBER_QUEUE_SIZE: usize = 100;

pub struct Config {
    pub bind_address: String,
    pub api_bind_address: String,
    pub poll_interval_secs: u64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string()),
            api_bind_address: env::var("API_BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_API_BIND_ADDRESS.to_string()),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("Poll interval must be at least 1 second".to_string());
        }

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.bind_address));
        }

        if self.api_bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid API bind address: {}", self.api_bind_address));
        }

        Ok(())
    }

    pub fn log_config(&self) {
        println!("Server Configuration:");
        println!("  WebSocket Bind Address: {}", self.bind_address);
        println!("  API Bind Address: {}", self.api_bind_address);
        println!("  Poll Interval: {}s", self.poll_interval_secs);
        println!("  Log Level: {}", self.log_level);
    }
}
