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

//! Where nodes go in the server's node tree.
//!
//! A [`Placement`] names a position relative to a [`Target`], which is either a raw node id or a
//! [`Group`]/[`Synth`] handle. Placements are resolved into a [`Position`] once, when they are
//! used, so a handle target must already be bound to a server id by then.

use crate::{
    error::{Error, Result},
    group::Group,
    server::{Control, NodeOrder, Server},
    synth::Synth,
};

pub use crate::server::AddAction;

/// The node a [`Placement`] is relative to.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Id(i32),
    Group(&'a Group),
    Synth(&'a Synth),
}

impl Target<'_> {
    /// The server id of the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unbound`] if the target is a handle that has not been created yet.
    pub fn id(&self) -> Result<i32> {
        match self {
            Target::Id(id) => Ok(*id),
            Target::Group(group) => group.id().ok_or(Error::Unbound { entity: "group" }),
            Target::Synth(synth) => synth.id().ok_or(Error::Unbound { entity: "synth" }),
        }
    }
}

impl From<i32> for Target<'_> {
    fn from(id: i32) -> Self {
        Target::Id(id)
    }
}

impl<'a> From<&'a Group> for Target<'a> {
    fn from(group: &'a Group) -> Self {
        Target::Group(group)
    }
}

impl<'a> From<&'a Synth> for Target<'a> {
    fn from(synth: &'a Synth) -> Self {
        Target::Synth(synth)
    }
}

/// A position in the node tree relative to a target.
#[derive(Debug, Clone, Copy)]
pub enum Placement<'a> {
    /// At the head of the target group.
    Head(Target<'a>),
    /// At the tail of the target group.
    Tail(Target<'a>),
    /// Just before the target node.
    Before(Target<'a>),
    /// Just after the target node.
    After(Target<'a>),
    /// In place of the target node, which is freed.
    Replace(Target<'a>),
}

impl<'a> Placement<'a> {
    pub fn head(target: impl Into<Target<'a>>) -> Placement<'a> {
        Placement::Head(target.into())
    }

    pub fn tail(target: impl Into<Target<'a>>) -> Placement<'a> {
        Placement::Tail(target.into())
    }

    pub fn before(target: impl Into<Target<'a>>) -> Placement<'a> {
        Placement::Before(target.into())
    }

    pub fn after(target: impl Into<Target<'a>>) -> Placement<'a> {
        Placement::After(target.into())
    }

    pub fn replace(target: impl Into<Target<'a>>) -> Placement<'a> {
        Placement::Replace(target.into())
    }

    /// Turns the placement into an add action and a target id.
    pub fn resolve(&self) -> Result<Position> {
        let (add_action, target) = match self {
            Placement::Head(target) => (AddAction::HeadOfGroup, target),
            Placement::Tail(target) => (AddAction::TailOfGroup, target),
            Placement::Before(target) => (AddAction::BeforeNode, target),
            Placement::After(target) => (AddAction::AfterNode, target),
            Placement::Replace(target) => (AddAction::ReplaceNode, target),
        };
        Ok(Position {
            add_action,
            target_id: target.id()?,
        })
    }
}

impl Default for Placement<'_> {
    /// The head of the root group.
    fn default() -> Self {
        Placement::Head(Target::Id(0))
    }
}

/// A resolved [`Placement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub add_action: AddAction,
    pub target_id: i32,
}

/// A mutable reference to a synth or group handle.
///
/// Operations that take several nodes may create the unbound ones, which needs a mutable
/// reference.
#[derive(Debug)]
pub enum NodeMut<'a> {
    Group(&'a mut Group),
    Synth(&'a mut Synth),
}

impl NodeMut<'_> {
    pub fn id(&self) -> Option<i32> {
        match self {
            NodeMut::Group(group) => group.id(),
            NodeMut::Synth(synth) => synth.id(),
        }
    }

    fn create(&mut self, server: &Server, position: Position) -> Result<i32> {
        match self {
            NodeMut::Group(group) => group.create_positioned(server, position),
            NodeMut::Synth(synth) => {
                synth.create_positioned(server, position, Vec::<Control>::new())
            }
        }
    }
}

impl<'a> From<&'a mut Group> for NodeMut<'a> {
    fn from(group: &'a mut Group) -> Self {
        NodeMut::Group(group)
    }
}

impl<'a> From<&'a mut Synth> for NodeMut<'a> {
    fn from(synth: &'a mut Synth) -> Self {
        NodeMut::Synth(synth)
    }
}

/// An owned handle to a node found on the server.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeHandle {
    Group(Group),
    Synth(Synth),
}

impl NodeHandle {
    pub fn id(&self) -> Option<i32> {
        match self {
            NodeHandle::Group(group) => group.id(),
            NodeHandle::Synth(synth) => synth.id(),
        }
    }
}

/// Moves `nodes` to `placement`, keeping the order they are given in.
///
/// Handles that are not bound yet are created at the placement first. All of the nodes are then
/// moved with a single `/n_order`.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] for [`Placement::Replace`], which cannot be used to
/// reorder nodes. The check happens before anything is sent.
pub fn order(server: &Server, placement: Placement<'_>, nodes: &mut [NodeMut<'_>]) -> Result<()> {
    let position = placement.resolve()?;
    if position.add_action == AddAction::ReplaceNode {
        return Err(Error::InvalidConfiguration(
            "nodes cannot be reordered into a replace placement",
        ));
    }

    let mut ids = Vec::with_capacity(nodes.len());
    for node in nodes.iter_mut() {
        let id = match node.id() {
            Some(id) => id,
            None => node.create(server, position)?,
        };
        ids.push(id);
    }
    if ids.is_empty() {
        return Ok(());
    }
    server.send(NodeOrder::new(position.add_action, position.target_id, ids))
}
