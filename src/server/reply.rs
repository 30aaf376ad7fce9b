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

//! Typed decodings of the replies the server sends back.

use super::{commands::ControlValue, private::Args};
use crate::error::{Error, Result};
use rosc::{OscMessage, OscType};
use serde::Serialize;

/// A `/fail` reply: the command that failed and the server's error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub command: String,
    pub reason: String,
}

impl Failure {
    /// Reads a `/fail` reply. Returns `None` for any other message.
    pub fn parse(message: &OscMessage) -> Option<Failure> {
        if message.addr != "/fail" {
            return None;
        }
        let mut args = Args::new(message);
        let command = args.string().unwrap_or_default();
        let reason = args.string().unwrap_or_default();
        Some(Failure { command, reason })
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Error {
        Error::Rejected {
            command: failure.command,
            reason: failure.reason,
        }
    }
}

/// Turns a `/fail` reply into [`Error::Rejected`] and passes everything else through.
pub fn check(message: OscMessage) -> Result<OscMessage> {
    match Failure::parse(&message) {
        Some(failure) => Err(failure.into()),
        None => Ok(message),
    }
}

fn unexpected(message: &OscMessage) -> Error {
    Error::UnexpectedReply {
        addr: message.addr.clone(),
    }
}

/// Sent in response to [`Status`](super::commands::Status).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReply {
    pub unit_generators: i32,
    pub synths: i32,
    pub groups: i32,
    pub synth_definitions: i32,
    pub average_cpu: f32,
    pub peak_cpu: f32,
    pub nominal_sample_rate: f64,
    pub actual_sample_rate: f64,
}

impl StatusReply {
    pub fn parse(message: &OscMessage) -> Result<StatusReply> {
        StatusReply::read(&mut Args::new(message)).ok_or_else(|| unexpected(message))
    }

    fn read(args: &mut Args<'_>) -> Option<StatusReply> {
        // The first argument is always 1 and means nothing.
        args.next()?;
        Some(StatusReply {
            unit_generators: args.int()?,
            synths: args.int()?,
            groups: args.int()?,
            synth_definitions: args.int()?,
            average_cpu: args.float()?,
            peak_cpu: args.float()?,
            nominal_sample_rate: args.double()?,
            actual_sample_rate: args.double()?,
        })
    }
}

/// Sent in response to [`Version`](super::commands::Version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReply {
    /// `scsynth` or `supernova`.
    pub program: String,
    pub major: i32,
    pub minor: i32,
    /// The patch version, such as `.0` or `.1-beta`.
    pub patch: String,
    pub branch: String,
    pub commit: String,
}

impl VersionReply {
    pub fn parse(message: &OscMessage) -> Result<VersionReply> {
        VersionReply::read(&mut Args::new(message)).ok_or_else(|| unexpected(message))
    }

    fn read(args: &mut Args<'_>) -> Option<VersionReply> {
        Some(VersionReply {
            program: args.string()?,
            major: args.int()?,
            minor: args.int()?,
            patch: args.string()?,
            branch: args.string()?,
            commit: args.string()?,
        })
    }
}

/// Information about a buffer, as sent in a `/b_info` reply.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct BufferInfo {
    pub buffer_number: i32,
    pub number_of_frames: i32,
    pub number_of_channels: i32,
    pub sample_rate: f32,
}

impl BufferInfo {
    /// True if the server has nothing allocated under this buffer number.
    pub fn is_free(&self) -> bool {
        self.number_of_channels == 0 && self.number_of_frames == 0
    }

    /// Reads every buffer described by a `/b_info` reply.
    pub fn parse_all(message: &OscMessage) -> Result<Vec<BufferInfo>> {
        if message.addr != "/b_info" || message.args.len() % 4 != 0 {
            return Err(unexpected(message));
        }
        message
            .args
            .chunks(4)
            .map(|chunk| match *chunk {
                [OscType::Int(buffer_number), OscType::Int(number_of_frames), OscType::Int(number_of_channels), OscType::Float(sample_rate)] => {
                    Ok(BufferInfo {
                        buffer_number,
                        number_of_frames,
                        number_of_channels,
                        sample_rate,
                    })
                }
                _ => Err(unexpected(message)),
            })
            .collect()
    }
}

/// Reads the index and value pairs of a `/c_set` reply.
pub fn control_bus_values(message: &OscMessage) -> Result<Vec<(i32, f32)>> {
    if message.addr != "/c_set" || message.args.len() % 2 != 0 {
        return Err(unexpected(message));
    }
    let mut args = Args::new(message);
    let mut values = Vec::with_capacity(message.args.len() / 2);
    while args.remaining() > 0 {
        match (args.int(), args.float()) {
            (Some(index), Some(value)) => values.push((index, value)),
            _ => return Err(unexpected(message)),
        }
    }
    Ok(values)
}

/// Reads the node id and control values of an `/n_set` reply.
///
/// Controls may be named by string or by index; indices are rendered as strings.
pub fn node_controls(message: &OscMessage) -> Result<(i32, Vec<(String, ControlValue)>)> {
    if message.addr != "/n_set" || message.args.len() % 2 != 1 {
        return Err(unexpected(message));
    }
    let mut args = Args::new(message);
    let node_id = args.int().ok_or_else(|| unexpected(message))?;
    let mut controls = Vec::new();
    while let (Some(name), Some(value)) = (args.next(), args.next()) {
        let name = match name {
            OscType::String(name) => name.clone(),
            OscType::Int(index) => index.to_string(),
            _ => return Err(unexpected(message)),
        };
        let value = ControlValue::from_osc(value).ok_or_else(|| unexpected(message))?;
        controls.push((name, value));
    }
    Ok((node_id, controls))
}
