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

//! Control buses.
//!
//! Control bus indices are chosen by the caller; nothing is allocated. A [`ControlBus`] can be
//! used as a synth control value to map the control to the bus.

use crate::{
    error::{Error, Result},
    server::{reply, ControlBusGet, ControlBusSetRange, ControlValue, Server},
};
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlBusSpec {
    pub id: Option<i32>,
}

/// A run of adjacent control buses starting at `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlBus {
    id: i32,
}

impl ControlBus {
    pub fn new(id: i32) -> ControlBus {
        ControlBus { id }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the [`ControlBusSpec`] has no id.
    pub fn from_spec(spec: ControlBusSpec) -> Result<ControlBus> {
        spec.id
            .map(ControlBus::new)
            .ok_or(Error::InvalidConfiguration("a control bus needs an id"))
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    /// Reads `count` buses starting at this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the last bus index does not fit in an `i32`.
    pub fn get(&self, server: &Server, count: usize) -> Result<Vec<f32>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let last = i32::try_from(count - 1)
            .ok()
            .and_then(|offset| self.id.checked_add(offset))
            .ok_or(Error::InvalidConfiguration("control bus range out of bounds"))?;
        Ok(query(server, self.id..=last)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// Writes `values` to adjacent buses starting at this one.
    pub fn set(&self, server: &Server, values: &[f32]) -> Result<()> {
        set_range(server, self.id, values)
    }
}

impl From<ControlBus> for ControlValue {
    fn from(bus: ControlBus) -> ControlValue {
        ControlValue::ControlBus(bus.id)
    }
}

impl From<&ControlBus> for ControlValue {
    fn from(bus: &ControlBus) -> ControlValue {
        ControlValue::ControlBus(bus.id)
    }
}

/// Reads the given buses. Returns `(index, value)` pairs in the order the server sends them.
///
/// No message is sent if `ids` is empty.
pub fn query(server: &Server, ids: impl IntoIterator<Item = i32>) -> Result<Vec<(i32, f32)>> {
    let ids: Vec<i32> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let reply = reply::check(server.send_sync(ControlBusGet::new(ids))?)?;
    reply::control_bus_values(&reply)
}

/// Writes `values` to adjacent buses starting at `id`. No message is sent if `values` is empty.
pub fn set_range(server: &Server, id: i32, values: &[f32]) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    server.send(ControlBusSetRange::new(id, values))
}
