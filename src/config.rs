//! Flat string configuration.
//!
//! Everything the server needs is read from a single `key → value` map, the
//! way it arrives from the environment or a `.env` loader. Values are parsed
//! on access; a bad value surfaces as [`Error::Config`] naming the key.
//!
//! | key | meaning | default |
//! |---|---|---|
//! | `BACKEND_SERVER_PORT` | listen port | required |
//! | `BACKEND_SERVER_HOST` | listen host | `0.0.0.0` |
//! | `BACKEND_SERVER_URL_PREFIX` | mount prefix, `/` = root | `/` |
//! | `USE_INNER_CORS` | `"true"` enables CORS | off |
//! | `USE_INNER_LOGGER` | `"true"` enables the request log | off |
//! | `CORS_ALLOW_ORIGIN` | `Access-Control-Allow-Origin` value | `*` |
//! | `STATIC_DIR` | directory served under `/static/` | `./ui/static` |

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use http::HeaderValue;

use crate::error::Error;

pub const PORT: &str = "BACKEND_SERVER_PORT";
pub const HOST: &str = "BACKEND_SERVER_HOST";
pub const URL_PREFIX: &str = "BACKEND_SERVER_URL_PREFIX";
pub const USE_INNER_CORS: &str = "USE_INNER_CORS";
pub const USE_INNER_LOGGER: &str = "USE_INNER_LOGGER";
pub const CORS_ALLOW_ORIGIN: &str = "CORS_ALLOW_ORIGIN";
pub const STATIC_DIR: &str = "STATIC_DIR";

const KEYS: [&str; 7] = [
    PORT,
    HOST,
    URL_PREFIX,
    USE_INNER_CORS,
    USE_INNER_LOGGER,
    CORS_ALLOW_ORIGIN,
    STATIC_DIR,
];

/// Read-only server configuration.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    values: HashMap<String, String>,
}

impl ServerConfig {
    /// Collects every recognised key present in the process environment.
    pub fn from_env() -> Self {
        KEYS.iter()
            .filter_map(|&key| std::env::var(key).ok().map(|v| (key.to_owned(), v)))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `true` only when `key` is set to the literal string `"true"`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    pub fn port(&self) -> Result<u16, Error> {
        let raw = self.get(PORT).ok_or(Error::Config { key: PORT, reason: "not set".into() })?;
        raw.trim().parse().map_err(|e| Error::Config {
            key: PORT,
            reason: format!("`{raw}`: {e}"),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let host = self.get(HOST).unwrap_or("0.0.0.0");
        let ip: IpAddr = host.parse().map_err(|e| Error::Config {
            key: HOST,
            reason: format!("`{host}`: {e}"),
        })?;
        Ok(SocketAddr::new(ip, self.port()?))
    }

    /// The mount prefix. Unset or empty means the root, `/`.
    pub fn url_prefix(&self) -> &str {
        match self.get(URL_PREFIX) {
            Some(p) if !p.is_empty() => p,
            _ => "/",
        }
    }

    pub fn static_dir(&self) -> PathBuf {
        PathBuf::from(self.get(STATIC_DIR).unwrap_or("./ui/static"))
    }

    pub fn cors_origin(&self) -> Result<HeaderValue, Error> {
        let raw = self.get(CORS_ALLOW_ORIGIN).unwrap_or("*");
        HeaderValue::from_str(raw).map_err(|e| Error::Config {
            key: CORS_ALLOW_ORIGIN,
            reason: e.to_string(),
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ServerConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl From<HashMap<String, String>> for ServerConfig {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_match_literal_true_only() {
        let cfg: ServerConfig = [
            (USE_INNER_CORS, "true"),
            (USE_INNER_LOGGER, "TRUE"),
        ]
        .into_iter()
        .collect();

        assert!(cfg.flag(USE_INNER_CORS));
        assert!(!cfg.flag(USE_INNER_LOGGER));
        assert!(!cfg.flag("MISSING"));
    }

    #[test]
    fn prefix_defaults_to_root() {
        assert_eq!(ServerConfig::default().url_prefix(), "/");
        let cfg: ServerConfig = [(URL_PREFIX, "")].into_iter().collect();
        assert_eq!(cfg.url_prefix(), "/");
        let cfg: ServerConfig = [(URL_PREFIX, "/api")].into_iter().collect();
        assert_eq!(cfg.url_prefix(), "/api");
    }

    #[test]
    fn port_errors_name_the_key() {
        let missing = ServerConfig::default().port().unwrap_err();
        assert!(matches!(missing, Error::Config { key: PORT, .. }));

        let cfg: ServerConfig = [(PORT, "http")].into_iter().collect();
        assert!(matches!(cfg.port(), Err(Error::Config { key: PORT, .. })));

        let cfg: ServerConfig = [(PORT, "8080"), (HOST, "127.0.0.1")].into_iter().collect();
        assert_eq!(cfg.socket_addr().unwrap(), "127.0.0.1:8080".parse().unwrap());
    }
}
