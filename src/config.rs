//! Process configuration.
//!
//! `PORT` is the only environment-driven setting (`RUST_LOG` belongs to the
//! log subscriber). Everything else is set in code.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::dispatcher::DEFAULT_DEADLINE;
use crate::error::Error;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, request_timeout: DEFAULT_DEADLINE }
    }
}

impl Config {
    /// Reads `PORT` from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(raw) = lookup("PORT") {
            config.port = raw.trim().parse()
                .map_err(|e| Error::Config(format!("PORT={raw:?}: {e}")))?;
        }
        Ok(config)
    }

    /// `0.0.0.0:<port>`.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_to_3000() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn reads_and_validates_port() {
        let config = Config::from_lookup(|k| (k == "PORT").then(|| "8080".to_owned())).unwrap();
        assert_eq!(config.port, 8080);

        let err = Config::from_lookup(|_| Some("eighty".to_owned())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
