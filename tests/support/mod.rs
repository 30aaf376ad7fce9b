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

//! A stand-in for scsynth that keeps an in-memory model of the node tree, buffers, and control
//! buses, and answers commands the way the real server does.

#![allow(dead_code)]

use conjure::config::Config;
use rosc::{decoder::decode, encoder::encode, OscMessage, OscPacket, OscType};
use std::{
    collections::{BTreeMap, HashMap},
    net::{SocketAddr, UdpSocket},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    /// Records commands but never answers.
    Silent,
    /// Sends every reply twice.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeNode {
    Group {
        children: Vec<i32>,
    },
    Synth {
        synthdef: String,
        controls: Vec<(String, OscType)>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FakeBuffer {
    pub frames: i32,
    pub channels: i32,
    pub samples: Vec<f32>,
    pub path: Option<String>,
}

#[derive(Debug)]
pub struct State {
    pub nodes: HashMap<i32, FakeNode>,
    pub parents: HashMap<i32, i32>,
    pub buffers: BTreeMap<i32, FakeBuffer>,
    pub buses: HashMap<i32, f32>,
    pub received: Vec<OscMessage>,
}

impl Default for State {
    fn default() -> State {
        let mut nodes = HashMap::new();
        nodes.insert(
            0,
            FakeNode::Group {
                children: Vec::new(),
            },
        );
        State {
            nodes,
            parents: HashMap::new(),
            buffers: BTreeMap::new(),
            buses: HashMap::new(),
            received: Vec::new(),
        }
    }
}

impl State {
    pub fn add_group(&mut self, id: i32, parent: i32) {
        self.insert(
            id,
            FakeNode::Group {
                children: Vec::new(),
            },
            1,
            parent,
        )
        .unwrap();
    }

    pub fn add_synth(&mut self, id: i32, parent: i32, synthdef: &str) {
        self.insert(
            id,
            FakeNode::Synth {
                synthdef: synthdef.to_owned(),
                controls: Vec::new(),
            },
            1,
            parent,
        )
        .unwrap();
    }

    pub fn allocate_buffer(&mut self, id: i32, frames: i32, channels: i32) {
        self.buffers.insert(
            id,
            FakeBuffer {
                frames,
                channels,
                samples: vec![0.0; (frames * channels) as usize],
                path: None,
            },
        );
    }

    pub fn children(&self, id: i32) -> Vec<i32> {
        match self.nodes.get(&id) {
            Some(FakeNode::Group { children }) => children.clone(),
            _ => Vec::new(),
        }
    }

    pub fn controls(&self, id: i32) -> Vec<(String, OscType)> {
        match self.nodes.get(&id) {
            Some(FakeNode::Synth { controls, .. }) => controls.clone(),
            _ => Vec::new(),
        }
    }

    pub fn addresses(&self) -> Vec<String> {
        self.received
            .iter()
            .map(|message| message.addr.clone())
            .collect()
    }

    fn children_mut(&mut self, id: i32) -> Option<&mut Vec<i32>> {
        match self.nodes.get_mut(&id) {
            Some(FakeNode::Group { children }) => Some(children),
            _ => None,
        }
    }

    // Where a node goes for an add action, as (parent, index).
    fn locate(&self, action: i32, target: i32) -> Result<(i32, usize), String> {
        match action {
            0 | 1 => {
                let children = match self.nodes.get(&target) {
                    Some(FakeNode::Group { children }) => children,
                    _ => return Err(format!("Group {} not found", target)),
                };
                Ok((target, if action == 0 { 0 } else { children.len() }))
            }
            2..=4 => {
                let parent = *self
                    .parents
                    .get(&target)
                    .ok_or_else(|| format!("Node {} not found", target))?;
                let index = self
                    .children(parent)
                    .iter()
                    .position(|&id| id == target)
                    .ok_or_else(|| format!("Node {} not found", target))?;
                Ok((parent, if action == 3 { index + 1 } else { index }))
            }
            _ => Err(format!("invalid add action {}", action)),
        }
    }

    fn insert(&mut self, id: i32, node: FakeNode, action: i32, target: i32) -> Result<(), String> {
        if self.nodes.contains_key(&id) {
            return Err(format!("duplicate node ID {}", id));
        }
        let (parent, index) = self.locate(action, target)?;
        if let Some(children) = self.children_mut(parent) {
            children.insert(index, id);
        }
        self.nodes.insert(id, node);
        self.parents.insert(id, parent);
        if action == 4 {
            self.free(target);
        }
        Ok(())
    }

    fn detach(&mut self, id: i32) {
        if let Some(parent) = self.parents.remove(&id) {
            if let Some(children) = self.children_mut(parent) {
                children.retain(|&child| child != id);
            }
        }
    }

    fn free(&mut self, id: i32) {
        self.detach(id);
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: i32) {
        if let Some(FakeNode::Group { children }) = self.nodes.remove(&id) {
            for child in children {
                self.parents.remove(&child);
                self.free_subtree(child);
            }
        }
    }

    fn free_all(&mut self, id: i32) {
        for child in self.children(id) {
            self.free(child);
        }
    }

    fn order(&mut self, action: i32, target: i32, ids: Vec<i32>) {
        for &id in &ids {
            self.detach(id);
        }
        if let Ok((parent, index)) = self.locate(action, target) {
            for (offset, &id) in ids.iter().enumerate() {
                if let Some(children) = self.children_mut(parent) {
                    children.insert(index + offset, id);
                }
                self.parents.insert(id, parent);
            }
        }
    }

    fn set_control(&mut self, id: i32, name: String, value: OscType) {
        if let Some(FakeNode::Synth { controls, .. }) = self.nodes.get_mut(&id) {
            match controls.iter_mut().find(|(existing, _)| *existing == name) {
                Some(control) => control.1 = value,
                None => controls.push((name, value)),
            }
        }
    }

    fn encode_tree(&self, id: i32, with_controls: bool, out: &mut Vec<OscType>) {
        match &self.nodes[&id] {
            FakeNode::Group { children } => {
                out.push(OscType::Int(id));
                out.push(OscType::Int(children.len() as i32));
                for &child in children {
                    self.encode_tree(child, with_controls, out);
                }
            }
            FakeNode::Synth { synthdef, controls } => {
                out.push(OscType::Int(id));
                out.push(OscType::Int(-1));
                out.push(OscType::String(synthdef.clone()));
                if with_controls {
                    out.push(OscType::Int(controls.len() as i32));
                    for (name, value) in controls {
                        out.push(OscType::String(name.clone()));
                        out.push(value.clone());
                    }
                }
            }
        }
    }

    fn buffer_info(&self, id: i32) -> Vec<OscType> {
        let (frames, channels, sample_rate) = match self.buffers.get(&id) {
            Some(buffer) => (buffer.frames, buffer.channels, 44100.0),
            None => (0, 0, 0.0),
        };
        vec![
            OscType::Int(id),
            OscType::Int(frames),
            OscType::Int(channels),
            OscType::Float(sample_rate),
        ]
    }

    fn handle(&mut self, message: &OscMessage) -> Vec<OscMessage> {
        let args = &message.args;
        match message.addr.as_str() {
            "/status" => {
                let synths = self
                    .nodes
                    .values()
                    .filter(|node| matches!(node, FakeNode::Synth { .. }))
                    .count() as i32;
                let groups = self.nodes.len() as i32 - synths;
                vec![reply(
                    "/status.reply",
                    vec![
                        OscType::Int(1),
                        OscType::Int(0),
                        OscType::Int(synths),
                        OscType::Int(groups),
                        OscType::Int(0),
                        OscType::Float(0.5),
                        OscType::Float(1.5),
                        OscType::Double(44100.0),
                        OscType::Double(44100.0),
                    ],
                )]
            }
            "/version" => vec![reply(
                "/version.reply",
                vec![
                    "scsynth".into(),
                    OscType::Int(3),
                    OscType::Int(13),
                    ".0".into(),
                    "Version-3.13.0".into(),
                    "3188503".into(),
                ],
            )],
            "/quit" => vec![done("/quit", Vec::new())],
            "/sync" => vec![reply("/synced", vec![args[0].clone()])],
            "/g_new" => {
                let _ = self.insert(
                    int(&args[0]),
                    FakeNode::Group {
                        children: Vec::new(),
                    },
                    int(&args[1]),
                    int(&args[2]),
                );
                Vec::new()
            }
            "/s_new" => {
                let id = int(&args[1]);
                let node = FakeNode::Synth {
                    synthdef: string(&args[0]),
                    controls: Vec::new(),
                };
                if self.insert(id, node, int(&args[2]), int(&args[3])).is_ok() {
                    for pair in args[4..].chunks(2) {
                        self.set_control(id, control_name(&pair[0]), pair[1].clone());
                    }
                }
                Vec::new()
            }
            "/g_queryTree" => {
                let id = int(&args[0]);
                let with_controls = int(&args[1]) != 0;
                if !matches!(self.nodes.get(&id), Some(FakeNode::Group { .. })) {
                    return vec![fail("/g_queryTree", &format!("Group {} not found", id))];
                }
                let mut out = vec![OscType::Int(with_controls as i32)];
                self.encode_tree(id, with_controls, &mut out);
                vec![reply("/g_queryTree.reply", out)]
            }
            "/n_free" => {
                for arg in args {
                    self.free(int(arg));
                }
                Vec::new()
            }
            "/g_freeAll" => {
                for arg in args {
                    self.free_all(int(arg));
                }
                Vec::new()
            }
            "/n_order" => {
                let ids = args[2..].iter().map(int).collect();
                self.order(int(&args[0]), int(&args[1]), ids);
                Vec::new()
            }
            "/n_set" => {
                let id = int(&args[0]);
                for pair in args[1..].chunks(2) {
                    self.set_control(id, control_name(&pair[0]), pair[1].clone());
                }
                Vec::new()
            }
            "/n_map" => {
                let id = int(&args[0]);
                for pair in args[1..].chunks(2) {
                    let bus = OscType::String(format!("c{}", int(&pair[1])));
                    self.set_control(id, control_name(&pair[0]), bus);
                }
                Vec::new()
            }
            "/s_get" => {
                let id = int(&args[0]);
                let controls = match self.nodes.get(&id) {
                    Some(FakeNode::Synth { controls, .. }) => controls,
                    _ => return vec![fail("/s_get", &format!("Node {} not found", id))],
                };
                let mut out = vec![OscType::Int(id)];
                for arg in &args[1..] {
                    let name = control_name(arg);
                    let value = controls
                        .iter()
                        .find(|(existing, _)| *existing == name)
                        .map(|(_, value)| value.clone())
                        .unwrap_or(OscType::Float(0.0));
                    out.push(arg.clone());
                    out.push(value);
                }
                vec![reply("/n_set", out)]
            }
            "/b_query" => vec![reply(
                "/b_info",
                args.iter()
                    .flat_map(|arg| self.buffer_info(int(arg)))
                    .collect(),
            )],
            "/b_alloc" => {
                let id = int(&args[0]);
                let channels = args.get(2).map_or(1, int);
                self.allocate_buffer(id, int(&args[1]), channels);
                vec![done("/b_alloc", vec![OscType::Int(id)])]
            }
            "/b_allocRead" => {
                let id = int(&args[0]);
                let path = string(&args[1]);
                if !Path::new(&path).exists() {
                    return vec![fail("/b_allocRead", "File could not be opened")];
                }
                self.buffers.insert(
                    id,
                    FakeBuffer {
                        frames: 1000,
                        channels: 2,
                        samples: Vec::new(),
                        path: Some(path),
                    },
                );
                vec![done("/b_allocRead", vec![OscType::Int(id)])]
            }
            "/b_setn" => {
                let id = int(&args[0]);
                let start = int(&args[1]) as usize;
                if let Some(buffer) = self.buffers.get_mut(&id) {
                    for (offset, value) in args[3..].iter().enumerate() {
                        if let Some(sample) = buffer.samples.get_mut(start + offset) {
                            *sample = float(value);
                        }
                    }
                }
                Vec::new()
            }
            "/b_free" => {
                let id = int(&args[0]);
                self.buffers.remove(&id);
                vec![done("/b_free", vec![OscType::Int(id)])]
            }
            "/c_get" => {
                let mut out = Vec::new();
                for arg in args {
                    let index = int(arg);
                    out.push(OscType::Int(index));
                    out.push(OscType::Float(
                        self.buses.get(&index).copied().unwrap_or(0.0),
                    ));
                }
                vec![reply("/c_set", out)]
            }
            "/c_setn" => {
                let start = int(&args[0]);
                for (offset, value) in args[2..].iter().enumerate() {
                    self.buses.insert(start + offset as i32, float(value));
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

/// A fake scsynth listening on a local UDP port.
pub struct FakeScsynth {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl FakeScsynth {
    pub fn start() -> FakeScsynth {
        FakeScsynth::with_behavior(Behavior::Normal)
    }

    pub fn with_behavior(behavior: Behavior) -> FakeScsynth {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let state = Arc::clone(&state);
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve(socket, behavior, state, stop))
        };

        FakeScsynth {
            addr,
            state,
            stop,
            thread: Some(thread),
        }
    }

    /// Settings for a client of this server with a short request timeout.
    pub fn config(&self) -> Config {
        Config::default()
            .local("127.0.0.1", 0)
            .remote("127.0.0.1", self.addr.port())
            .request_timeout(Duration::from_millis(500))
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.state().addresses()
    }

    pub fn received(&self, addr: &str) -> Vec<OscMessage> {
        self.state()
            .received
            .iter()
            .filter(|message| message.addr == addr)
            .cloned()
            .collect()
    }
}

impl Drop for FakeScsynth {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(socket: UdpSocket, behavior: Behavior, state: Arc<Mutex<State>>, stop: Arc<AtomicBool>) {
    let mut buffer = vec![0_u8; 65536];
    while !stop.load(Ordering::SeqCst) {
        let (len, from) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(_) => continue,
        };
        let message = match decode(&buffer[..len]) {
            Ok(OscPacket::Message(message)) => message,
            _ => continue,
        };

        let replies = {
            let mut state = state.lock().unwrap();
            state.received.push(message.clone());
            state.handle(&message)
        };
        if behavior == Behavior::Silent {
            continue;
        }
        let copies = if behavior == Behavior::Duplicate { 2 } else { 1 };
        for reply in replies {
            let bytes = encode(&OscPacket::Message(reply)).unwrap();
            for _ in 0..copies {
                socket.send_to(&bytes, from).unwrap();
            }
        }
    }
}

fn reply(addr: &str, args: Vec<OscType>) -> OscMessage {
    OscMessage {
        addr: addr.to_owned(),
        args,
    }
}

fn done(command: &str, mut args: Vec<OscType>) -> OscMessage {
    args.insert(0, command.into());
    reply("/done", args)
}

fn fail(command: &str, reason: &str) -> OscMessage {
    reply("/fail", vec![command.into(), reason.into()])
}

fn int(arg: &OscType) -> i32 {
    match *arg {
        OscType::Int(x) => x,
        OscType::Float(x) => x as i32,
        ref other => panic!("expected a number, got {:?}", other),
    }
}

fn float(arg: &OscType) -> f32 {
    match *arg {
        OscType::Float(x) => x,
        OscType::Int(x) => x as f32,
        ref other => panic!("expected a number, got {:?}", other),
    }
}

fn string(arg: &OscType) -> String {
    match arg {
        OscType::String(x) => x.clone(),
        other => panic!("expected a string, got {:?}", other),
    }
}

fn control_name(arg: &OscType) -> String {
    match arg {
        OscType::String(name) => name.clone(),
        OscType::Int(index) => index.to_string(),
        other => panic!("expected a control name, got {:?}", other),
    }
}
