// Conjure
// Copyright (C) 2021  Wesley Merkel
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Connection settings.
//!
//! A [`Config`] says where the local socket binds, where the SuperCollider server lives, and how
//! long requests wait for replies. Settings can be built in code, read from a JSON file, and
//! overridden by environment variables.
//!
//! ```
//! use conjure::config::Config;
//! use std::time::Duration;
//!
//! let config = Config::default()
//!     .remote("192.168.1.20", 57110)
//!     .request_timeout(Duration::from_secs(2));
//! assert_eq!(config.remote_addr(), "192.168.1.20:57110");
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, env, fs, path::Path, time::Duration};

/// The default UDP port of scsynth.
pub const DEFAULT_REMOTE_PORT: u16 = 57110;

/// Client settings for talking to a SuperCollider server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host the local socket binds to. Defaults to `0.0.0.0`.
    pub local_host: String,

    /// Port the local socket binds to. Defaults to 0, which picks an ephemeral port.
    pub local_port: u16,

    /// Host of the SuperCollider server. Defaults to `127.0.0.1`.
    pub remote_host: String,

    /// Port of the SuperCollider server. Defaults to 57110.
    pub remote_port: u16,

    /// How long requests wait for a reply, in milliseconds. Defaults to 5000.
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            local_host: "0.0.0.0".to_owned(),
            local_port: 0,
            remote_host: "127.0.0.1".to_owned(),
            remote_port: DEFAULT_REMOTE_PORT,
            request_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Parses settings from a JSON document. Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Config> {
        let config = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Reads settings from a JSON file. Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Config::from_json_str(&json)
    }

    /// Applies overrides from the `CONJURE_*` environment variables.
    ///
    /// The recognized variables are `CONJURE_LOCAL_HOST`, `CONJURE_LOCAL_PORT`,
    /// `CONJURE_REMOTE_HOST`, `CONJURE_REMOTE_PORT`, and `CONJURE_REQUEST_TIMEOUT_MS`.
    pub fn with_env_overrides(self) -> Result<Config> {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Config>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(host) = lookup("CONJURE_LOCAL_HOST") {
            self.local_host = host;
        }
        if let Some(port) = parse_var(&lookup, "CONJURE_LOCAL_PORT")? {
            self.local_port = port;
        }
        if let Some(host) = lookup("CONJURE_REMOTE_HOST") {
            self.remote_host = host;
        }
        if let Some(port) = parse_var(&lookup, "CONJURE_REMOTE_PORT")? {
            self.remote_port = port;
        }
        if let Some(millis) = parse_var(&lookup, "CONJURE_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = millis;
        }
        Ok(self)
    }

    /// Sets the local bind address.
    pub fn local(mut self, host: impl Into<String>, port: u16) -> Config {
        self.local_host = host.into();
        self.local_port = port;
        self
    }

    /// Sets the server address.
    pub fn remote(mut self, host: impl Into<String>, port: u16) -> Config {
        self.remote_host = host.into();
        self.remote_port = port;
        self
    }

    /// Sets the default request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Config {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The local bind address in `host:port` form.
    pub fn local_addr(&self) -> String {
        format!("{}:{}", self.local_host, self.local_port)
    }

    /// The server address in `host:port` form.
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }

    /// The default request timeout.
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => match value.parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Env { name, value }.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempdir::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.local_addr(), "0.0.0.0:0");
        assert_eq!(config.remote_addr(), "127.0.0.1:57110");
        assert_eq!(config.request_timeout_duration(), Duration::from_millis(5000));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json_str(r#"{"remote_port": 57120}"#).unwrap();
        assert_eq!(
            config,
            Config {
                remote_port: 57120,
                ..Config::default()
            }
        );
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let config = Config::default().request_timeout(Duration::MAX);
        assert_eq!(config.request_timeout_ms, u64::MAX);

        let config =
            Config::from_json_str(r#"{"request_timeout_ms": 18446744073709551615}"#).unwrap();
        assert_eq!(
            config.request_timeout_duration(),
            Duration::from_millis(u64::MAX)
        );
    }

    #[test]
    fn test_json_file() {
        let dir = TempDir::new("conjure-config").unwrap();
        let path = dir.path().join("conjure.json");
        fs::write(
            &path,
            r#"{"remote_host": "10.0.0.2", "request_timeout_ms": 250}"#,
        )
        .unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.remote_addr(), "10.0.0.2:57110");
        assert_eq!(config.request_timeout_duration(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new("conjure-config").unwrap();
        let err = Config::from_json_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Read { .. })));
    }

    #[test]
    fn test_bad_json() {
        let err = Config::from_json_str(r#"{"remote_port": "loud"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = vec![
            ("CONJURE_REMOTE_HOST", "scsynth.local"),
            ("CONJURE_REMOTE_PORT", "57111"),
            ("CONJURE_REQUEST_TIMEOUT_MS", "100"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .with_overrides(|name| vars.get(name).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.remote_addr(), "scsynth.local:57111");
        assert_eq!(config.local_addr(), "0.0.0.0:0");
        assert_eq!(config.request_timeout_ms, 100);
    }

    #[test]
    fn test_bad_override() {
        let err = Config::default()
            .with_overrides(|name| {
                if name == "CONJURE_LOCAL_PORT" {
                    Some("many".to_owned())
                } else {
                    None
                }
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Env {
                name: "CONJURE_LOCAL_PORT",
                ..
            })
        ));
    }
}
