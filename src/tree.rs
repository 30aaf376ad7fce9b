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

//! A decoder for node tree query replies.
//!
//! The server answers [`GroupQueryTree`] with a flat argument list that encodes a group's whole
//! subtree. The layout is:
//!
//! ```text
//! controls flag, root group id, child count, child...
//! ```
//!
//! where each child is a node id followed by a marker. A marker of `-1` means the node is a synth
//! and is followed by its synth definition name and, when the controls flag is non-zero, a control
//! count and that many name and value pairs. A marker of zero or more means the node is a group
//! with that many children, each encoded the same way.
//!
//! [`decode`] turns the argument list into a [`GroupNode`]. The arguments are consumed left to
//! right with no backtracking. Arguments left over after the tree is complete are ignored.
//!
//! ```
//! use conjure::tree;
//! use rosc::OscType;
//!
//! let args: Vec<OscType> = vec![
//!     0.into(), 0.into(), 1.into(),
//!     1000.into(), (-1).into(), "sine".into(),
//! ];
//! let root = tree::decode(&args)?;
//! assert_eq!(root.synth_ids(), vec![1000]);
//! # conjure::Result::Ok(())
//! ```

use crate::{
    error::{Error, Result},
    server::{reply::Failure, ControlValue, GroupQueryTree, Server},
};
use rosc::OscType;
use serde::Serialize;
use std::iter::repeat_with;

const SYNTH_MARKER: i32 = -1;

/// A node in a decoded tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Synth(SynthNode),
    Group(GroupNode),
}

impl Node {
    pub fn id(&self) -> i32 {
        match self {
            Node::Synth(synth) => synth.id,
            Node::Group(group) => group.id,
        }
    }

    fn decode(scanner: &mut Scanner<'_>, controls_included: bool) -> Result<Node> {
        let id = scanner.scan_i32("node id")?;
        let marker = scanner.scan_i32("child count")?;
        match marker {
            SYNTH_MARKER => Ok(Node::Synth(SynthNode::decode(
                scanner,
                id,
                controls_included,
            )?)),
            count if count >= 0 => Ok(Node::Group(GroupNode {
                id,
                children: dotimes(count as usize, || Node::decode(scanner, controls_included))?,
            })),
            _ => Err(malformed(format!(
                "node {} has invalid child count {}",
                id, marker
            ))),
        }
    }
}

/// A synth as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthNode {
    pub id: i32,

    /// The name of the synth definition the synth was created from.
    pub synthdef: String,

    /// Current control values in the order the server lists them. Empty if the query did not ask
    /// for controls. Controls reported by index are named by their index.
    pub controls: Vec<(String, ControlValue)>,
}

impl SynthNode {
    fn decode(scanner: &mut Scanner<'_>, id: i32, controls_included: bool) -> Result<SynthNode> {
        let synthdef = scanner.scan_string("synth definition name")?;
        let controls = if controls_included {
            let count = scanner.scan_count("control count")?;
            dotimes(count, || {
                Ok((scanner.scan_control_name()?, scanner.scan_control_value()?))
            })?
        } else {
            Vec::new()
        };
        Ok(SynthNode {
            id,
            synthdef,
            controls,
        })
    }

    /// The value of the named control, if the synth reported it.
    pub fn control(&self, name: &str) -> Option<ControlValue> {
        self.controls
            .iter()
            .find(|(control, _)| control == name)
            .map(|(_, value)| *value)
    }
}

/// A group and everything in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupNode {
    pub id: i32,

    /// Direct children in execution order.
    pub children: Vec<Node>,
}

impl GroupNode {
    /// Iterates over every node below this group, depth first, parents before their children.
    pub fn iter(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Finds a node below this group by id.
    pub fn find(&self, id: i32) -> Option<&Node> {
        self.iter().find(|node| node.id() == id)
    }

    /// The largest group id in this subtree, this group included.
    pub fn max_group_id(&self) -> i32 {
        self.group_ids().into_iter().fold(self.id, i32::max)
    }

    /// The ids of every group below this one.
    pub fn group_ids(&self) -> Vec<i32> {
        self.iter()
            .filter_map(|node| match node {
                Node::Group(group) => Some(group.id),
                Node::Synth(_) => None,
            })
            .collect()
    }

    /// The ids of every synth below this group.
    pub fn synth_ids(&self) -> Vec<i32> {
        self.iter()
            .filter_map(|node| match node {
                Node::Synth(synth) => Some(synth.id),
                Node::Group(_) => None,
            })
            .collect()
    }
}

/// The iterator returned by [`GroupNode::iter`].
#[derive(Debug)]
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        if let Node::Group(group) = node {
            self.stack.extend(group.children.iter().rev());
        }
        Some(node)
    }
}

/// Decodes the arguments of a `/g_queryTree.reply` message.
///
/// # Errors
///
/// Returns [`Error::MalformedTree`] if the arguments run out before the tree is complete, if an
/// argument has the wrong type, or if a child count is negative.
pub fn decode(args: &[OscType]) -> Result<GroupNode> {
    let mut scanner = Scanner::new(args);
    let controls_included = scanner.scan_i32("controls flag")? != 0;
    let id = scanner.scan_i32("root group id")?;
    let count = scanner.scan_count("child count")?;
    let children = dotimes(count, || Node::decode(&mut scanner, controls_included))?;
    if scanner.remaining() > 0 {
        log::warn!(
            "ignoring {} arguments after the tree of group {}",
            scanner.remaining(),
            id
        );
    }
    Ok(GroupNode { id, children })
}

/// Fetches the subtree of a group, including synth controls.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the group does not exist, and [`Error::MalformedTree`] if the
/// reply cannot be decoded.
pub fn query_tree(server: &Server, group_id: i32) -> Result<GroupNode> {
    let reply = server.send_sync(GroupQueryTree::new(group_id))?;
    if let Some(failure) = Failure::parse(&reply) {
        log::debug!("tree query for group {} failed: {}", group_id, failure.reason);
        return Err(if failure.command == "/g_queryTree" {
            Error::NotFound {
                entity: "group",
                id: group_id,
            }
        } else {
            failure.into()
        });
    }
    decode(&reply.args)
}

fn dotimes<T, F>(len: usize, func: F) -> Result<Vec<T>>
where
    F: FnMut() -> Result<T>,
{
    repeat_with(func).take(len).collect::<Result<_>>()
}

fn malformed(reason: String) -> Error {
    Error::MalformedTree { reason }
}

struct Scanner<'a> {
    args: &'a [OscType],
    position: usize,
}

impl<'a> Scanner<'a> {
    fn new(args: &'a [OscType]) -> Scanner<'a> {
        Scanner { args, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.args.len() - self.position
    }

    fn scan(&mut self, what: &str) -> Result<&'a OscType> {
        let arg = self.args.get(self.position).ok_or_else(|| {
            malformed(format!(
                "reply ended at argument {} while reading {}",
                self.position, what
            ))
        })?;
        self.position += 1;
        Ok(arg)
    }

    fn wrong_type(&self, what: &str, arg: &OscType) -> Error {
        malformed(format!(
            "argument {} should be {} but was {:?}",
            self.position - 1,
            what,
            arg
        ))
    }

    fn scan_i32(&mut self, what: &str) -> Result<i32> {
        match self.scan(what)? {
            OscType::Int(x) => Ok(*x),
            arg => Err(self.wrong_type(what, arg)),
        }
    }

    fn scan_count(&mut self, what: &str) -> Result<usize> {
        let count = self.scan_i32(what)?;
        if count < 0 {
            return Err(malformed(format!("negative {} {}", what, count)));
        }
        Ok(count as usize)
    }

    fn scan_string(&mut self, what: &str) -> Result<String> {
        match self.scan(what)? {
            OscType::String(x) => Ok(x.clone()),
            arg => Err(self.wrong_type(what, arg)),
        }
    }

    fn scan_control_name(&mut self) -> Result<String> {
        match self.scan("control name")? {
            OscType::String(name) => Ok(name.clone()),
            OscType::Int(index) => Ok(index.to_string()),
            arg => Err(self.wrong_type("control name", arg)),
        }
    }

    fn scan_control_value(&mut self) -> Result<ControlValue> {
        let arg = self.scan("control value")?;
        ControlValue::from_osc(arg).ok_or_else(|| self.wrong_type("control value", arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // group 0 { group 5 { synth 12 sine freq=440 }, group 3 {} }
    fn example() -> Vec<OscType> {
        vec![
            1.into(),
            0.into(),
            2.into(),
            5.into(),
            1.into(),
            12.into(),
            (-1).into(),
            "sine".into(),
            1.into(),
            "freq".into(),
            440.0_f32.into(),
            3.into(),
            0.into(),
        ]
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            decode(&example()).unwrap(),
            GroupNode {
                id: 0,
                children: vec![
                    Node::Group(GroupNode {
                        id: 5,
                        children: vec![Node::Synth(SynthNode {
                            id: 12,
                            synthdef: "sine".to_owned(),
                            controls: vec![("freq".to_owned(), ControlValue::Float(440.0))],
                        })],
                    }),
                    Node::Group(GroupNode {
                        id: 3,
                        children: vec![],
                    }),
                ],
            }
        );
    }

    #[test]
    fn test_truncated() {
        let mut args = example();
        args.pop();
        assert!(matches!(decode(&args), Err(Error::MalformedTree { .. })));
        assert!(matches!(decode(&[]), Err(Error::MalformedTree { .. })));
    }

    #[test]
    fn test_wrong_types() {
        let mut args = example();
        args[7] = 7.into();
        assert!(matches!(decode(&args), Err(Error::MalformedTree { .. })));

        let mut args = example();
        args[4] = (-2).into();
        assert!(matches!(decode(&args), Err(Error::MalformedTree { .. })));
    }

    #[test]
    fn test_without_controls() {
        let args: Vec<OscType> = vec![
            0.into(),
            1.into(),
            2.into(),
            1000.into(),
            (-1).into(),
            "sine".into(),
            1001.into(),
            (-1).into(),
            "saw".into(),
        ];
        let group = decode(&args).unwrap();
        assert_eq!(group.id, 1);
        assert_eq!(group.synth_ids(), vec![1000, 1001]);
        assert!(group.group_ids().is_empty());
    }

    #[test]
    fn test_mapped_controls_and_trailing_args() {
        let mut args: Vec<OscType> = vec![
            1.into(),
            0.into(),
            1.into(),
            1000.into(),
            (-1).into(),
            "sine".into(),
            2.into(),
            "freq".into(),
            "c4".into(),
            0.into(),
            1.into(),
        ];
        args.push("extra".into());

        let group = decode(&args).unwrap();
        match group.find(1000) {
            Some(Node::Synth(synth)) => {
                assert_eq!(synth.control("freq"), Some(ControlValue::ControlBus(4)));
                assert_eq!(synth.control("0"), Some(ControlValue::Int(1)));
                assert_eq!(synth.control("amp"), None);
            }
            other => panic!("expected synth 1000, got {:?}", other),
        }
    }

    #[test]
    fn test_traversal() {
        let group = decode(&example()).unwrap();
        assert_eq!(
            group.iter().map(Node::id).collect::<Vec<_>>(),
            vec![5, 12, 3]
        );
        assert_eq!(group.max_group_id(), 5);
        assert_eq!(group.group_ids(), vec![5, 3]);
        assert!(group.find(3).is_some());
        assert!(group.find(4).is_none());
    }

    #[test]
    fn test_serialize() {
        let group = decode(&example()).unwrap();
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["id"], json!(0));
        assert_eq!(json["children"][0]["type"], json!("group"));
        assert_eq!(json["children"][0]["children"][0]["type"], json!("synth"));
        assert_eq!(json["children"][0]["children"][0]["synthdef"], json!("sine"));
    }
}
