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

//! The error type shared by every part of the crate.

use rosc::OscError;
use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

/// A specialized [`Result`] type for conjure operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by conjure operations.
///
/// The variants fall into a handful of categories which can be checked with
/// [`is_transport`](Error::is_transport), [`is_timeout`](Error::is_timeout) and
/// [`is_protocol_failure`](Error::is_protocol_failure).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The local UDP socket could not be bound.
    #[error("binding to UDP socket: {0}")]
    Bind(#[source] io::Error),

    /// The local UDP socket could not be connected to the server address.
    #[error("connecting UDP socket to server: {0}")]
    Connect(#[source] io::Error),

    /// A datagram could not be handed to the socket.
    #[error("sending message to server: {0}")]
    Send(#[source] io::Error),

    /// The transport was closed before or while the operation ran.
    #[error("transport is closed")]
    Closed,

    /// An outgoing message could not be encoded.
    #[error("encoding OSC packet: {0:?}")]
    Encode(OscError),

    /// No reply with one of the accepted addresses arrived in time.
    #[error("no response for {addresses:?} within {timeout:?}")]
    RequestTimeout {
        addresses: Vec<String>,
        timeout: Duration,
    },

    /// The server reported that the referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// The server answered a command with `/fail`.
    #[error("server rejected {command}: {reason}")]
    Rejected { command: String, reason: String },

    /// A reply arrived with an accepted address but arguments of the wrong shape.
    #[error("unexpected reply arguments for {addr}")]
    UnexpectedReply { addr: String },

    /// A tree query reply did not follow the node tree grammar.
    #[error("malformed node tree: {reason}")]
    MalformedTree { reason: String },

    /// An entity was described without any of the fields needed to identify or create it.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// An operation needs a server-side id but the handle has not been created yet.
    #[error("{entity} has no server id")]
    Unbound { entity: &'static str },

    /// Configuration could not be loaded.
    #[error("loading configuration: {0}")]
    Config(#[from] ConfigError),

    /// A sound file to be read into a buffer does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// An external transcoder failed to convert a sound file.
    #[error("transcoding {path}: {reason}")]
    Transcode { path: PathBuf, reason: String },
}

/// The ways loading a [`Config`](crate::config::Config) can fail.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("environment variable {name} has invalid value {value:?}")]
    Env { name: &'static str, value: String },
}

impl Error {
    /// Returns true for socket failures. These are fatal to the transport that produced them.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Bind(_) | Error::Connect(_) | Error::Send(_) | Error::Closed | Error::Encode(_)
        )
    }

    /// Returns true if a request gave up waiting for its reply. Retrying is up to the caller.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::RequestTimeout { .. })
    }

    /// Returns true if the server answered with an explicit failure.
    pub fn is_protocol_failure(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Rejected { .. } | Error::UnexpectedReply { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::Closed.is_transport());
        assert!(Error::Send(io::Error::from(io::ErrorKind::ConnectionRefused)).is_transport());
        assert!(Error::RequestTimeout {
            addresses: vec!["/done".to_owned()],
            timeout: Duration::from_millis(10),
        }
        .is_timeout());
        assert!(Error::NotFound {
            entity: "group",
            id: 4
        }
        .is_protocol_failure());
        assert!(!Error::InvalidConfiguration("nothing").is_protocol_failure());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::NotFound {
                entity: "synth",
                id: 1001
            }
            .to_string(),
            "synth 1001 not found"
        );
        assert_eq!(
            Error::Rejected {
                command: "/b_query".to_owned(),
                reason: "index out of range".to_owned(),
            }
            .to_string(),
            "server rejected /b_query: index out of range"
        );
    }
}
