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

//! A Rust client for [SuperCollider](https://supercollider.github.io/)'s audio server.
//!
//! # Introduction
//!
//! **scsynth**, SuperCollider's real-time audio server, is controlled entirely through Open Sound
//! Control messages sent over UDP. Conjure speaks that protocol and gives the server's resources
//! Rust handles:
//!
//!  * [`server`](crate::server) - A [`Server`](server::Server) type that owns the UDP socket and
//!    matches replies to waiting requests, plus Rust definitions of the OSC commands it sends.
//!    See the [Server Command Reference] for what each command does.
//!
//!  * [`group`](crate::group), [`synth`](crate::synth), [`node`](crate::node) - Handles to nodes
//!    in the server's node tree, and the placement rules that say where new nodes go.
//!
//!  * [`buffer`](crate::buffer) - Sample buffers, allocated empty, filled from the client, or read
//!    from sound files.
//!
//!  * [`control_bus`](crate::control_bus) - Reading, writing, and mapping control buses.
//!
//!  * [`tree`](crate::tree) - A decoder for `/g_queryTree.reply` and the node tree it describes.
//!
//!  * [`alloc`](crate::alloc) - Finding free synth ids and buffer numbers by asking the server.
//!
//!  * [`expand`](crate::expand) - Multichannel expansion of argument lists.
//!
//! Handles are created unbound and receive an id from the server side allocator when they are
//! created. The server owns all real state; handles are only names for it.
//!
//! # Examples
//!
//! ```no_run
//! use conjure::{
//!     config::Config,
//!     control_bus::ControlBus,
//!     group::Group,
//!     node::Placement,
//!     server::Server,
//!     synth::Synth,
//! };
//!
//! fn main() -> conjure::Result<()> {
//!     // A SuperCollider server must be started outside of this program.
//!     let config = Config::default().with_env_overrides()?;
//!     let server = Server::connect(&config)?;
//!
//!     let mut voices = Group::new();
//!     voices.create_at(&server, Placement::head(0))?;
//!
//!     let mut sine = Synth::new("sine");
//!     sine.create(&server, Placement::tail(&voices), vec![("freq", 440.0_f32)])?;
//!
//!     // Let an LFO written to control bus 8 drive the amplitude.
//!     let lfo = ControlBus::new(8);
//!     sine.set(&server, vec![("amp", lfo)])?;
//!
//!     for tree in voices.query(&server)?.iter() {
//!         println!("{:?}", tree.id());
//!     }
//!
//!     server.reset()
//! }
//! ```
//!
//! # Logging
//!
//! Conjure logs through the [`log`](https://docs.rs/log) facade. Every outgoing command is logged
//! at `debug`, and replies that no request was waiting for are logged at `warn`.
//!
//! [Server Command Reference]: https://doc.sccode.org/Reference/Server-Command-Reference.html

pub mod alloc;
pub mod buffer;
pub mod config;
pub mod control_bus;
pub mod error;
pub mod expand;
pub mod group;
pub mod node;
pub mod server;
pub mod synth;
pub mod tree;

pub use error::{Error, Result};
