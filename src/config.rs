//! Server configuration loaded from the environment

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// How long a dispute vote stays open
    pub vote_seconds: u64,
    /// Rows returned by the leaderboard route
    pub leaderboard_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            vote_seconds: 15,
            leaderboard_limit: 10,
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables
    ///
    /// BIND_ADDR, PORT, VOTE_SECONDS and LEADERBOARD_LIMIT are all optional;
    /// unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            port: env_or("PORT", defaults.port),
            vote_seconds: env_or("VOTE_SECONDS", defaults.vote_seconds).max(1),
            leaderboard_limit: env_or("LEADERBOARD_LIMIT", defaults.leaderboard_limit),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn vote_duration(&self) -> Duration {
        Duration::from_secs(self.vote_seconds)
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {}={:?}, using default {:?}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
