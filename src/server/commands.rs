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

use super::private::Message;
use rosc::{OscMessage, OscType};
use serde::Serialize;
use std::fmt;

/// OSC commands accepted by SuperCollider.
pub trait Command: fmt::Debug {
    #[doc(hidden)]
    fn into_message(self) -> OscMessage;
}

/// Commands the server answers.
///
/// The reply carries no request ID, so a command only declares the addresses its reply may
/// arrive on. See [`Server::request`](super::Server::request) for how replies are matched.
pub trait AsyncCommand: Command {
    #[doc(hidden)]
    fn reply_addresses(&self) -> &'static [&'static str];
}

impl Command for OscMessage {
    #[doc(hidden)]
    fn into_message(self) -> OscMessage {
        self
    }
}

/// Where a new or moved node goes relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddAction {
    /// Add the node to the the head of the group specified by the target ID.
    HeadOfGroup = 0,
    /// Add the node to the the tail of the group specified by the target ID.
    TailOfGroup = 1,
    /// Add the node just before the node specified by the target ID.
    BeforeNode = 2,
    /// Add the node just after the node specified by the target ID.
    AfterNode = 3,
    /// The node replaces the node specified by the target ID. The target node is freed.
    ReplaceNode = 4,
}

impl Default for AddAction {
    /// Returns `AddAction::HeadOfGroup`.
    fn default() -> AddAction {
        AddAction::HeadOfGroup
    }
}

/// An identifier for a synth definition's control.
///
/// The controls in a synth definition can be identified by their number or by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum ControlID {
    Index(i32),
    Name(String),
}

impl From<i32> for ControlID {
    fn from(index: i32) -> Self {
        Self::Index(index)
    }
}

impl From<String> for ControlID {
    fn from(name: String) -> Self {
        ControlID::Name(name)
    }
}

impl From<&str> for ControlID {
    fn from(name: &str) -> Self {
        ControlID::Name(name.to_owned())
    }
}

impl fmt::Display for ControlID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlID::Index(index) => write!(f, "{}", index),
            ControlID::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<ControlID> for OscType {
    fn from(id: ControlID) -> OscType {
        match id {
            ControlID::Index(index) => index.into(),
            ControlID::Name(name) => name.into(),
        }
    }
}

/// The value of a synth control.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub enum ControlValue {
    /// A constant integer value.
    Int(i32),

    /// A constant floating point value.
    Float(f32),

    /// The control reads continuously from this control bus.
    ControlBus(i32),

    /// The control reads continuously from this audio bus.
    AudioBus(i32),
}

impl From<i32> for ControlValue {
    fn from(n: i32) -> ControlValue {
        ControlValue::Int(n)
    }
}

impl From<f32> for ControlValue {
    fn from(n: f32) -> ControlValue {
        ControlValue::Float(n)
    }
}

impl ControlValue {
    /// Reads a control value as the server reports it.
    ///
    /// Mapped controls are reported as strings such as `"c3"` or `"a1"`.
    pub fn from_osc(arg: &OscType) -> Option<ControlValue> {
        match arg {
            OscType::Int(x) => Some(ControlValue::Int(*x)),
            OscType::Float(x) => Some(ControlValue::Float(*x)),
            OscType::String(s) => {
                let mut chars = s.chars();
                let rate = chars.next()?;
                let bus = chars.as_str().parse().ok()?;
                match rate {
                    'c' => Some(ControlValue::ControlBus(bus)),
                    'a' => Some(ControlValue::AudioBus(bus)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The numeric value of a constant control.
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            ControlValue::Int(x) => Some(x as f32),
            ControlValue::Float(x) => Some(x),
            ControlValue::ControlBus(_) | ControlValue::AudioBus(_) => None,
        }
    }

    fn into_osc_type(self) -> OscType {
        match self {
            ControlValue::Int(x) => x.into(),
            ControlValue::Float(x) => x.into(),
            ControlValue::ControlBus(x) => format!("c{}", x).into(),
            ControlValue::AudioBus(x) => format!("a{}", x).into(),
        }
    }
}

/// A synth control's ID and value pair.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct Control {
    pub(crate) id: ControlID,
    pub(crate) value: ControlValue,
}

impl Control {
    /// Creates a new control. The ID may be a [`String`], [`&str`](str), or [`i32`] and the
    /// value an [`i32`], [`f32`], or [`ControlValue`].
    pub fn new(id: impl Into<ControlID>, value: impl Into<ControlValue>) -> Control {
        Control {
            id: id.into(),
            value: value.into(),
        }
    }
}

impl<I, V> From<(I, V)> for Control
where
    I: Into<ControlID>,
    V: Into<ControlValue>,
{
    fn from((id, value): (I, V)) -> Control {
        Control::new(id, value)
    }
}

// =========================================================
// ==================== Master Controls ====================
// =========================================================

/// Quit program. Exits the synthesis server.
///
/// Replies with `/done` just before completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Quit {
    _hidden: (),
}

impl Quit {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Quit {
        Quit { _hidden: () }
    }
}

impl Command for Quit {
    fn into_message(self) -> OscMessage {
        Message::addr("/quit").build()
    }
}

impl AsyncCommand for Quit {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/done"]
    }
}

/// Query the status. Replies with `/status.reply`.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    _hidden: (),
}

impl Status {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Status {
        Status { _hidden: () }
    }
}

impl Command for Status {
    fn into_message(self) -> OscMessage {
        Message::addr("/status").build()
    }
}

impl AsyncCommand for Status {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/status.reply"]
    }
}

/// Query the server version. Replies with `/version.reply`.
#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    _hidden: (),
}

impl Version {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Version {
        Version { _hidden: () }
    }
}

impl Command for Version {
    fn into_message(self) -> OscMessage {
        Message::addr("/version").build()
    }
}

impl AsyncCommand for Version {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/version.reply"]
    }
}

/// Display incoming OSC messages on the server's console.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpOSC {
    level: i32,
}

impl DumpOSC {
    /// `level` is 0 to turn dumping off, 1 to print parsed contents, 2 to print hex, 3 for both.
    pub fn new(level: i32) -> DumpOSC {
        DumpOSC { level }
    }
}

impl Command for DumpOSC {
    fn into_message(self) -> OscMessage {
        Message::addr("/dumpOSC").arg(self.level).build()
    }
}

/// Notify when async commands have completed. Replies with `/synced` and the given ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Sync {
    id: i32,
}

impl Sync {
    pub fn new(id: i32) -> Sync {
        Sync { id }
    }
}

impl Command for Sync {
    fn into_message(self) -> OscMessage {
        Message::addr("/sync").arg(self.id).build()
    }
}

impl AsyncCommand for Sync {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/synced"]
    }
}

//
// ========== Node Commands ==========
//

/// Delete nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFree {
    node_ids: Vec<i32>,
}

impl NodeFree {
    pub fn new(node_ids: impl IntoIterator<Item = i32>) -> NodeFree {
        NodeFree {
            node_ids: node_ids.into_iter().collect(),
        }
    }
}

impl Command for NodeFree {
    fn into_message(self) -> OscMessage {
        Message::addr("/n_free").args(self.node_ids).build()
    }
}

/// Set a node's control values.
///
/// If the node is a group, the controls of every node in the group are set.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSet {
    node_id: i32,
    controls: Vec<Control>,
}

impl NodeSet {
    pub fn new<C>(node_id: i32, controls: impl IntoIterator<Item = C>) -> NodeSet
    where
        C: Into<Control>,
    {
        NodeSet {
            node_id,
            controls: controls.into_iter().map(C::into).collect(),
        }
    }
}

impl Command for NodeSet {
    fn into_message(self) -> OscMessage {
        Message::addr("/n_set")
            .arg(self.node_id)
            .args(self.controls.into_iter().flat_map(|control| {
                vec![control.id.into(), control.value.into_osc_type()]
            }))
            .build()
    }
}

/// Map controls to read continuously from control buses.
///
/// A bus index of -1 removes the mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMap {
    node_id: i32,
    mappings: Vec<(ControlID, i32)>,
}

impl NodeMap {
    pub fn new<I>(node_id: i32, mappings: impl IntoIterator<Item = (I, i32)>) -> NodeMap
    where
        I: Into<ControlID>,
    {
        NodeMap {
            node_id,
            mappings: mappings
                .into_iter()
                .map(|(control, bus)| (control.into(), bus))
                .collect(),
        }
    }
}

impl Command for NodeMap {
    fn into_message(self) -> OscMessage {
        Message::addr("/n_map")
            .arg(self.node_id)
            .args(
                self.mappings
                    .into_iter()
                    .flat_map(|(control, bus)| vec![control.into(), OscType::Int(bus)]),
            )
            .build()
    }
}

/// Move nodes relative to a target.
///
/// The nodes keep the order they are given in. [`AddAction::ReplaceNode`] is not allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOrder {
    add_action: AddAction,
    target_id: i32,
    node_ids: Vec<i32>,
}

impl NodeOrder {
    pub fn new(
        add_action: AddAction,
        target_id: i32,
        node_ids: impl IntoIterator<Item = i32>,
    ) -> NodeOrder {
        NodeOrder {
            add_action,
            target_id,
            node_ids: node_ids.into_iter().collect(),
        }
    }
}

impl Command for NodeOrder {
    fn into_message(self) -> OscMessage {
        Message::addr("/n_order")
            .arg(self.add_action as i32)
            .arg(self.target_id)
            .args(self.node_ids)
            .build()
    }
}

//
// ========== Synth Commands ==========
//

/// Create a new synth from a synth definition.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthNew {
    synthdef_name: String,
    synth_id: i32,
    add_action: AddAction,
    add_target_id: i32,
    controls: Vec<Control>,
}

impl SynthNew {
    pub fn new(synthdef_name: impl Into<String>, synth_id: i32) -> SynthNew {
        SynthNew {
            synthdef_name: synthdef_name.into(),
            synth_id,
            add_action: AddAction::default(),
            add_target_id: 0,
            controls: Vec::new(),
        }
    }

    pub fn add_action(mut self, add_action: AddAction, add_target_id: i32) -> SynthNew {
        self.add_action = add_action;
        self.add_target_id = add_target_id;
        self
    }

    pub fn controls<C>(mut self, controls: impl IntoIterator<Item = C>) -> SynthNew
    where
        C: Into<Control>,
    {
        self.controls = controls.into_iter().map(C::into).collect();
        self
    }
}

impl Command for SynthNew {
    fn into_message(self) -> OscMessage {
        Message::addr("/s_new")
            .arg(self.synthdef_name)
            .arg(self.synth_id)
            .arg(self.add_action as i32)
            .arg(self.add_target_id)
            .args(self.controls.into_iter().flat_map(|control| {
                vec![control.id.into(), control.value.into_osc_type()]
            }))
            .build()
    }
}

/// Get control values of a synth.
///
/// Replies with `/n_set` carrying the values, or `/fail` if the synth does not exist. With no
/// controls it doubles as an existence check.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthGet {
    synth_id: i32,
    controls: Vec<ControlID>,
}

impl SynthGet {
    pub fn new(synth_id: i32) -> SynthGet {
        SynthGet {
            synth_id,
            controls: Vec::new(),
        }
    }

    pub fn control(mut self, control: impl Into<ControlID>) -> SynthGet {
        self.controls.push(control.into());
        self
    }
}

impl Command for SynthGet {
    fn into_message(self) -> OscMessage {
        Message::addr("/s_get")
            .arg(self.synth_id)
            .args(self.controls)
            .build()
    }
}

impl AsyncCommand for SynthGet {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/n_set", "/fail"]
    }
}

//
// ========== Group Commands ==========
//

/// Create a new group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNew {
    group_id: i32,
    add_action: AddAction,
    add_target_id: i32,
}

impl GroupNew {
    pub fn new(group_id: i32) -> GroupNew {
        GroupNew {
            group_id,
            add_action: AddAction::default(),
            add_target_id: 0,
        }
    }

    pub fn add_action(mut self, add_action: AddAction, add_target_id: i32) -> GroupNew {
        self.add_action = add_action;
        self.add_target_id = add_target_id;
        self
    }
}

impl Command for GroupNew {
    fn into_message(self) -> OscMessage {
        Message::addr("/g_new")
            .arg(self.group_id)
            .arg(self.add_action as i32)
            .arg(self.add_target_id)
            .build()
    }
}

/// Deletes all nodes in the given groups, leaving the groups themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFreeAll {
    group_ids: Vec<i32>,
}

impl GroupFreeAll {
    pub fn new(group_ids: impl IntoIterator<Item = i32>) -> GroupFreeAll {
        GroupFreeAll {
            group_ids: group_ids.into_iter().collect(),
        }
    }
}

impl Command for GroupFreeAll {
    fn into_message(self) -> OscMessage {
        Message::addr("/g_freeAll").args(self.group_ids).build()
    }
}

/// Get a representation of a group's node subtree.
///
/// Replies with `/g_queryTree.reply`, or `/fail` if the group does not exist. See
/// [`tree`](crate::tree) for the reply's layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupQueryTree {
    group_id: i32,
    include_controls: bool,
}

impl GroupQueryTree {
    /// Creates a query that includes synth controls.
    pub fn new(group_id: i32) -> GroupQueryTree {
        GroupQueryTree {
            group_id,
            include_controls: true,
        }
    }

    pub fn without_controls(mut self) -> GroupQueryTree {
        self.include_controls = false;
        self
    }
}

impl Command for GroupQueryTree {
    fn into_message(self) -> OscMessage {
        Message::addr("/g_queryTree")
            .arg(self.group_id)
            .arg(self.include_controls as i32)
            .build()
    }
}

impl AsyncCommand for GroupQueryTree {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/g_queryTree.reply", "/fail"]
    }
}

//
// ========== Buffer Commands ==========
//

/// Allocate a zero filled buffer. Replies with `/done`.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAllocate {
    buffer_number: i32,
    number_of_frames: i32,
    number_of_channels: i32,
}

impl BufferAllocate {
    pub fn new(buffer_number: i32, number_of_frames: i32) -> BufferAllocate {
        BufferAllocate {
            buffer_number,
            number_of_frames,
            number_of_channels: 1,
        }
    }

    /// Number of channels. Defaults to 1.
    pub fn number_of_channels(mut self, number_of_channels: i32) -> BufferAllocate {
        self.number_of_channels = number_of_channels;
        self
    }
}

impl Command for BufferAllocate {
    fn into_message(self) -> OscMessage {
        Message::addr("/b_alloc")
            .arg(self.buffer_number)
            .arg(self.number_of_frames)
            .arg(self.number_of_channels)
            .build()
    }
}

impl AsyncCommand for BufferAllocate {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/done", "/fail"]
    }
}

/// Allocate a buffer and read a sound file into it. Replies with `/done`.
///
/// The path is on the server's filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAllocateRead {
    buffer_number: i32,
    file_path: String,
    starting_frame: i32,
    number_of_frames: i32,
}

impl BufferAllocateRead {
    pub fn new(buffer_number: i32, file_path: impl Into<String>) -> BufferAllocateRead {
        BufferAllocateRead {
            buffer_number,
            file_path: file_path.into(),
            starting_frame: 0,
            number_of_frames: 0,
        }
    }

    pub fn starting_frame(mut self, starting_frame: i32) -> BufferAllocateRead {
        self.starting_frame = starting_frame;
        self
    }

    /// The maximum number of frames to read. Zero or less reads the whole file.
    pub fn number_of_frames(mut self, number_of_frames: i32) -> BufferAllocateRead {
        self.number_of_frames = number_of_frames;
        self
    }
}

impl Command for BufferAllocateRead {
    fn into_message(self) -> OscMessage {
        Message::addr("/b_allocRead")
            .arg(self.buffer_number)
            .arg(self.file_path)
            .arg(self.starting_frame)
            .arg(self.number_of_frames)
            .build()
    }
}

impl AsyncCommand for BufferAllocateRead {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/done", "/fail"]
    }
}

/// Set a range of samples in a buffer.
///
/// Sends no reply; follow it with [`Sync`] to know it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSetRange {
    buffer_number: i32,
    starting_sample: i32,
    samples: Vec<f32>,
}

impl BufferSetRange {
    pub fn new(buffer_number: i32, starting_sample: i32, samples: &[f32]) -> BufferSetRange {
        BufferSetRange {
            buffer_number,
            starting_sample,
            samples: samples.to_vec(),
        }
    }
}

impl Command for BufferSetRange {
    fn into_message(self) -> OscMessage {
        Message::addr("/b_setn")
            .arg(self.buffer_number)
            .arg(self.starting_sample)
            .arg(self.samples.len() as i32)
            .args(self.samples)
            .build()
    }
}

/// Free buffer data. Replies with `/done`.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferFree {
    buffer_number: i32,
}

impl BufferFree {
    pub fn new(buffer_number: i32) -> BufferFree {
        BufferFree { buffer_number }
    }
}

impl Command for BufferFree {
    fn into_message(self) -> OscMessage {
        Message::addr("/b_free").arg(self.buffer_number).build()
    }
}

impl AsyncCommand for BufferFree {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/done", "/fail"]
    }
}

/// Get information on buffers.
///
/// Replies with one `/b_info` for all the buffers. Buffer numbers past the server's limit make it
/// reply with `/fail` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferQuery {
    buffer_numbers: Vec<i32>,
}

impl BufferQuery {
    pub fn new(buffer_numbers: impl IntoIterator<Item = i32>) -> BufferQuery {
        BufferQuery {
            buffer_numbers: buffer_numbers.into_iter().collect(),
        }
    }
}

impl Command for BufferQuery {
    fn into_message(self) -> OscMessage {
        Message::addr("/b_query").args(self.buffer_numbers).build()
    }
}

impl AsyncCommand for BufferQuery {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/b_info", "/fail"]
    }
}

//
// ========== Control Bus Commands ==========
//

/// Get control bus values. Replies with `/c_set` index/value pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlBusGet {
    bus_indices: Vec<i32>,
}

impl ControlBusGet {
    pub fn new(bus_indices: impl IntoIterator<Item = i32>) -> ControlBusGet {
        ControlBusGet {
            bus_indices: bus_indices.into_iter().collect(),
        }
    }
}

impl Command for ControlBusGet {
    fn into_message(self) -> OscMessage {
        Message::addr("/c_get").args(self.bus_indices).build()
    }
}

impl AsyncCommand for ControlBusGet {
    fn reply_addresses(&self) -> &'static [&'static str] {
        &["/c_set"]
    }
}

/// Set a range of adjacent control buses.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlBusSetRange {
    starting_index: i32,
    values: Vec<f32>,
}

impl ControlBusSetRange {
    pub fn new(starting_index: i32, values: &[f32]) -> ControlBusSetRange {
        ControlBusSetRange {
            starting_index,
            values: values.to_vec(),
        }
    }
}

impl Command for ControlBusSetRange {
    fn into_message(self) -> OscMessage {
        Message::addr("/c_setn")
            .arg(self.starting_index)
            .arg(self.values.len() as i32)
            .args(self.values)
            .build()
    }
}
