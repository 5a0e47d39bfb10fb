//! Server configuration from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8080;

/// Listener and static file settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Directory holding the app-link association files.
    pub well_known_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            well_known_dir: PathBuf::from("./.well-known"),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `PORT`: listening port (default: 8080)
    /// - `CARDLINK_BIND_ADDR`: interface to bind (default: "0.0.0.0")
    /// - `CARDLINK_WELL_KNOWN_DIR`: app-link files (default: "./.well-known")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup. Unset or unusable values
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT")
            .map(|raw| parse_port(&raw))
            .unwrap_or(defaults.port);

        let bind_addr = match lookup("CARDLINK_BIND_ADDR") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Invalid CARDLINK_BIND_ADDR '{}', using {}",
                    raw,
                    defaults.bind_addr
                );
                defaults.bind_addr
            }),
            None => defaults.bind_addr,
        };

        let well_known_dir = lookup("CARDLINK_WELL_KNOWN_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.well_known_dir);

        Self {
            bind_addr,
            port,
            well_known_dir,
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_port(raw: &str) -> u16 {
    match raw.trim().parse::<u16>() {
        Ok(port) => port,
        Err(e) => {
            tracing::warn!("Invalid PORT '{}' ({}), using {}", raw, e, DEFAULT_PORT);
            DEFAULT_PORT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.listen_addr(), "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.well_known_dir, PathBuf::from("./.well-known"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9001"),
            ("CARDLINK_BIND_ADDR", "127.0.0.1"),
            ("CARDLINK_WELL_KNOWN_DIR", "/srv/cardlink/well-known"),
        ]);
        assert_eq!(config.listen_addr(), "127.0.0.1:9001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.well_known_dir, PathBuf::from("/srv/cardlink/well-known"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[("PORT", "eighty"), ("CARDLINK_BIND_ADDR", "localhost")]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(parse_port(" 3000 "), 3000);
        assert_eq!(parse_port("70000"), 8080);
    }
}
