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

//! Groups of nodes.
//!
//! A [`Group`] is a handle to a group on the server. It starts out unbound, gets an id when it is
//! created, and loses the id again when it is freed. The server owns the real state; a handle can
//! go stale if its group is freed by someone else.
//!
//! ```no_run
//! use conjure::{config::Config, group::Group, node::Placement, server::Server};
//!
//! let server = Server::connect(&Config::default())?;
//! let mut effects = Group::new();
//! effects.create_at(&server, Placement::tail(0))?;
//! let mut sources = Group::at(Placement::before(&effects))?;
//! sources.create(&server)?;
//! # conjure::Result::Ok(())
//! ```

use crate::{
    error::{Error, Result},
    node::{self, NodeHandle, NodeMut, Placement, Position, Target},
    server::{GroupFreeAll, GroupNew, NodeFree, Server},
    synth::Synth,
    tree::{self, GroupNode, Node},
};

/// The end of a group that nodes are added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Head,
    Tail,
}

/// A handle to a group on the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Group {
    id: Option<i32>,
    position: Position,
}

impl Group {
    /// An unbound group that will be created at the head of the root group.
    pub fn new() -> Group {
        Group::default()
    }

    /// A handle to a group that already exists on the server.
    pub fn existing(id: i32) -> Group {
        Group {
            id: Some(id),
            position: Position::default(),
        }
    }

    /// An unbound group that will be created at `placement`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unbound`] if the placement's target is a handle without an id.
    pub fn at(placement: Placement<'_>) -> Result<Group> {
        Ok(Group {
            id: None,
            position: placement.resolve()?,
        })
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    fn bound(&self) -> Result<i32> {
        self.id.ok_or(Error::Unbound { entity: "group" })
    }

    /// Creates the group at the placement it was constructed with.
    ///
    /// Does nothing if the group already has an id. Returns the id.
    pub fn create(&mut self, server: &Server) -> Result<i32> {
        self.create_positioned(server, self.position)
    }

    /// Creates the group at `placement`. Does nothing if the group already has an id.
    pub fn create_at(&mut self, server: &Server, placement: Placement<'_>) -> Result<i32> {
        if let Some(id) = self.id {
            return Ok(id);
        }
        let position = placement.resolve()?;
        self.create_positioned(server, position)
    }

    pub(crate) fn create_positioned(&mut self, server: &Server, position: Position) -> Result<i32> {
        if let Some(id) = self.id {
            return Ok(id);
        }

        let id = tree::query_tree(server, 0)?.max_group_id() + 1;
        server.send(GroupNew::new(id).add_action(position.add_action, position.target_id))?;
        // The server does not answer /g_new, so ask for the group to see whether it was made.
        tree::query_tree(server, id)?;

        log::debug!("created group {}", id);
        self.position = position;
        self.id = Some(id);
        Ok(id)
    }

    /// Frees the group and everything in it. Does nothing if the group has no id.
    pub fn free(&mut self, server: &Server) -> Result<()> {
        if let Some(id) = self.id {
            server.send(NodeFree::new(vec![id]))?;
            self.id = None;
        }
        Ok(())
    }

    /// Frees everything in the group, leaving the group itself.
    pub fn free_all(&self, server: &Server) -> Result<()> {
        server.send(GroupFreeAll::new(vec![self.bound()?]))
    }

    /// Moves `nodes` to one end of this group, creating any that are unbound.
    ///
    /// The nodes keep the order they are given in.
    pub fn add(&self, server: &Server, edge: Edge, nodes: &mut [NodeMut<'_>]) -> Result<()> {
        let target = Target::Id(self.bound()?);
        let placement = match edge {
            Edge::Head => Placement::Head(target),
            Edge::Tail => Placement::Tail(target),
        };
        node::order(server, placement, nodes)
    }

    /// The group's subtree as the server currently sees it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the group no longer exists.
    pub fn query(&self, server: &Server) -> Result<GroupNode> {
        tree::query_tree(server, self.bound()?)
    }

    /// Handles to the group's direct children.
    pub fn nodes(&self, server: &Server) -> Result<Vec<NodeHandle>> {
        let tree = self.query(server)?;
        Ok(tree
            .children
            .iter()
            .map(|node| match node {
                Node::Group(group) => NodeHandle::Group(Group::existing(group.id)),
                Node::Synth(synth) => NodeHandle::Synth(Synth::existing(synth.id)),
            })
            .collect())
    }
}
