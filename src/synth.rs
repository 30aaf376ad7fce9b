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

//! Synths.
//!
//! A [`Synth`] is a handle to a running instance of a synth definition. The synth definition must
//! already be loaded on the server.
//!
//! ```no_run
//! use conjure::{config::Config, node::Placement, server::{ControlValue, Server}, synth::Synth};
//!
//! let server = Server::connect(&Config::default())?;
//! let mut sine = Synth::new("sine");
//! sine.create(&server, Placement::default(), vec![("freq", 440.0_f32)])?;
//! // Follow control bus 3 from now on.
//! sine.set(&server, vec![("amp", ControlValue::ControlBus(3))])?;
//! # conjure::Result::Ok(())
//! ```

use crate::{
    alloc,
    error::{Error, Result},
    node::{Placement, Position},
    server::{
        reply, Control, ControlID, ControlValue, NodeFree, NodeMap, NodeSet, Server, SynthGet,
        SynthNew,
    },
};

/// What is known about a synth before a handle is made for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SynthSpec {
    pub synthdef: Option<String>,
    pub id: Option<i32>,
}

/// A handle to a synth on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synth {
    synthdef: Option<String>,
    id: Option<i32>,
}

impl Synth {
    /// An unbound synth of the given synth definition.
    pub fn new(synthdef: impl Into<String>) -> Synth {
        Synth {
            synthdef: Some(synthdef.into()),
            id: None,
        }
    }

    /// A handle to a synth that already exists on the server.
    pub fn existing(id: i32) -> Synth {
        Synth {
            synthdef: None,
            id: Some(id),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the [`SynthSpec`] has neither a synth definition nor an
    /// id.
    pub fn from_spec(spec: SynthSpec) -> Result<Synth> {
        if spec.synthdef.is_none() && spec.id.is_none() {
            return Err(Error::InvalidConfiguration(
                "a synth needs a synth definition or an id",
            ));
        }
        Ok(Synth {
            synthdef: spec.synthdef,
            id: spec.id,
        })
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    pub fn synthdef(&self) -> Option<&str> {
        self.synthdef.as_deref()
    }

    fn bound(&self) -> Result<i32> {
        self.id.ok_or(Error::Unbound { entity: "synth" })
    }

    /// Starts the synth at `placement` and then sets `controls` on it.
    ///
    /// The id is the lowest free one found by [`alloc::synth_id`]. Does nothing if the synth
    /// already has an id. Returns the id.
    pub fn create<C>(
        &mut self,
        server: &Server,
        placement: Placement<'_>,
        controls: impl IntoIterator<Item = C>,
    ) -> Result<i32>
    where
        C: Into<Control>,
    {
        if let Some(id) = self.id {
            return Ok(id);
        }
        self.create_positioned(server, placement.resolve()?, controls)
    }

    pub(crate) fn create_positioned<C>(
        &mut self,
        server: &Server,
        position: Position,
        controls: impl IntoIterator<Item = C>,
    ) -> Result<i32>
    where
        C: Into<Control>,
    {
        if let Some(id) = self.id {
            return Ok(id);
        }
        let synthdef = self
            .synthdef
            .clone()
            .ok_or(Error::InvalidConfiguration("a synth needs a synth definition to be created"))?;

        let id = alloc::synth_id(server)?;
        server.send(
            SynthNew::new(synthdef, id).add_action(position.add_action, position.target_id),
        )?;
        log::debug!("created synth {}", id);
        self.id = Some(id);

        let controls: Vec<Control> = controls.into_iter().map(C::into).collect();
        if !controls.is_empty() {
            self.set(server, controls)?;
        }
        Ok(id)
    }

    /// Reads the current value of one control.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the synth no longer exists.
    pub fn get(&self, server: &Server, control: impl Into<ControlID>) -> Result<ControlValue> {
        let id = self.bound()?;
        let reply = server.send_sync(SynthGet::new(id).control(control))?;
        if reply.addr == "/fail" {
            return Err(Error::NotFound { entity: "synth", id });
        }
        let (_, controls) = reply::node_controls(&reply)?;
        controls
            .into_iter()
            .next()
            .map(|(_, value)| value)
            .ok_or(Error::UnexpectedReply { addr: reply.addr })
    }

    /// Sets controls on the synth.
    ///
    /// Constant values are sent with one `/n_set`. Controls given a [`ControlValue::ControlBus`]
    /// are mapped to read that bus continuously with one `/n_map` instead.
    pub fn set<C>(&self, server: &Server, controls: impl IntoIterator<Item = C>) -> Result<()>
    where
        C: Into<Control>,
    {
        let id = self.bound()?;
        let mut values = Vec::new();
        let mut mappings = Vec::new();
        for control in controls.into_iter().map(C::into) {
            match control.value {
                ControlValue::ControlBus(bus) => mappings.push((control.id, bus)),
                _ => values.push(control),
            }
        }
        if !values.is_empty() {
            server.send(NodeSet::new(id, values))?;
        }
        if !mappings.is_empty() {
            server.send(NodeMap::new(id, mappings))?;
        }
        Ok(())
    }

    /// Sets controls by index, starting at control 0.
    pub fn set_indexed(&self, server: &Server, values: &[f32]) -> Result<()> {
        let id = self.bound()?;
        server.send(NodeSet::new(
            id,
            values
                .iter()
                .enumerate()
                .map(|(index, value)| Control::new(index as i32, *value)),
        ))
    }

    /// Frees the synth. Does nothing if the synth has no id.
    pub fn free(&mut self, server: &Server) -> Result<()> {
        if let Some(id) = self.id {
            server.send(NodeFree::new(vec![id]))?;
            self.id = None;
        }
        Ok(())
    }

    /// Returns a handle to synth `id` if it exists on the server.
    pub fn query(server: &Server, id: i32) -> Result<Option<Synth>> {
        Ok(if alloc::synth_exists(server, id)? {
            Some(Synth::existing(id))
        } else {
            None
        })
    }

    /// Asks the server whether the synth still exists.
    pub fn exists(&self, server: &Server) -> Result<bool> {
        alloc::synth_exists(server, self.bound()?)
    }
}
