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

//! Finding unused ids by asking the server.
//!
//! SuperCollider has no allocator endpoint, so ids are found by probing: synth ids one at a time
//! from [`SYNTH_ID_BASE`], buffer numbers [`BUFFER_PROBE_BLOCK`] at a time from 0.
//!
//! Neither strategy is atomic. Two allocations racing against the same server can pick the same
//! id, so creations that share a server should run one after another.

use crate::{
    buffer,
    error::{Error, Result},
    server::{reply::Failure, BufferInfo, Server, SynthGet},
};

/// The first node id tried for new synths.
pub const SYNTH_ID_BASE: i32 = 1000;

/// How many buffer numbers a single `/b_query` probes.
pub const BUFFER_PROBE_BLOCK: i32 = 10;

/// Returns the first id from `base` upwards for which `exists` returns false.
///
/// Ids are probed one at a time and probing stops at the first absent id.
pub fn first_absent<F>(base: i32, mut exists: F) -> Result<i32>
where
    F: FnMut(i32) -> Result<bool>,
{
    let mut id = base;
    while exists(id)? {
        id = id.checked_add(1).ok_or_else(|| Error::Rejected {
            command: "/s_get".to_owned(),
            reason: "node ids exhausted".to_owned(),
        })?;
    }
    Ok(id)
}

/// Returns the lowest buffer number whose info reports no frames and no channels.
///
/// `query` is given consecutive blocks of `block` numbers starting at 0 until one of them holds a
/// free buffer.
pub fn first_free_in_blocks<F>(block: i32, mut query: F) -> Result<i32>
where
    F: FnMut(Vec<i32>) -> Result<Vec<BufferInfo>>,
{
    let mut start = 0;
    loop {
        let infos = query((start..start + block).collect())?;
        if infos.is_empty() {
            return Err(Error::UnexpectedReply {
                addr: "/b_info".to_owned(),
            });
        }
        if let Some(id) = infos
            .iter()
            .filter(|info| info.is_free())
            .map(|info| info.buffer_number)
            .min()
        {
            return Ok(id);
        }
        start += block;
    }
}

/// Finds the lowest unused synth id at or above [`SYNTH_ID_BASE`].
pub fn synth_id(server: &Server) -> Result<i32> {
    let id = first_absent(SYNTH_ID_BASE, |id| synth_exists(server, id))?;
    log::debug!("allocated synth id {}", id);
    Ok(id)
}

/// Finds the lowest unused buffer number.
pub fn buffer_id(server: &Server) -> Result<i32> {
    let id = first_free_in_blocks(BUFFER_PROBE_BLOCK, |ids| buffer::query(server, ids))?;
    log::debug!("allocated buffer {}", id);
    Ok(id)
}

/// Asks the server whether a synth with this id exists.
pub(crate) fn synth_exists(server: &Server, id: i32) -> Result<bool> {
    let reply = server.send_sync(SynthGet::new(id))?;
    let exists = match reply.addr.as_str() {
        "/n_set" => true,
        "/fail" => match Failure::parse(&reply) {
            Some(failure) if failure.command != "/s_get" => return Err(failure.into()),
            _ => false,
        },
        _ => return Err(Error::UnexpectedReply { addr: reply.addr }),
    };
    log::debug!("probe synth {}: exists={}", id, exists);
    Ok(exists)
}
