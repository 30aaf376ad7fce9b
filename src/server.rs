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

//! An OSC interface to SuperCollider.
//!
//! This module provides the request/response layer every other part of the crate is built on. The
//! primary components provided by this module are:
//!
//! * The [`Server`] type - A SuperCollider server client. Owns one UDP socket connected to the
//!   server and a background thread that receives replies.
//! * The command structs and the [`Command`] trait - The SuperCollider server is controlled by
//!   sending it command messages. [`Server::send`] accepts any [`Command`] and returns as soon as
//!   the datagram is handed to the socket.
//! * The [`AsyncCommand`] trait - Commands that the server answers. They declare the addresses
//!   their reply can arrive on, which lets [`Server::send_sync`] block until the reply comes back.
//! * The [`reply`] module - Typed decodings of the replies.
//!
//! # Matching replies to requests
//!
//! SuperCollider replies carry no request identifier. A request is therefore resolved by the first
//! incoming message whose address is one it accepts. When several requests are outstanding, the
//! oldest one accepting the address wins. Requests with overlapping address sets (two
//! [`BufferAllocate`]s both accepting `/done`, say) can be resolved with each other's replies, so
//! callers that care should not run them concurrently on the same server.
//!
//! Every request has a deadline. If no accepted reply arrives in time the request fails with
//! [`Error::RequestTimeout`](crate::Error::RequestTimeout) and a reply that shows up later is
//! dropped. Nothing is ever retried.
//!
//! # Commands
//!
//! Each command struct provides a [builder interface] for creating it. The required fields for
//! each command are given as positional arguments to the [constructor] (the `new` method on each
//! type), and the optional fields can be set using builder methods.
//!
//! ```
//! # use conjure::server::BufferAllocate;
//! // Required fields
//! let buffer_number = 1;
//! let number_of_frames = 65536;
//!
//! let command = BufferAllocate::new(buffer_number, number_of_frames)
//!     // Optional field
//!     .number_of_channels(2);
//! ```
//!
//! [builder interface]: https://rust-unofficial.github.io/patterns/patterns/builder.html
//! [constructor]: https://rust-unofficial.github.io/patterns/idioms/ctor.html

mod commands;
mod pending;
mod private;
pub mod reply;
mod transport;

pub use commands::*;
pub use reply::{BufferInfo, StatusReply, VersionReply};

use crate::{
    config::Config,
    error::{Error, Result},
};
use pending::Pending;
use rosc::{encoder::encode, OscMessage, OscPacket};
use std::{
    fmt,
    net::SocketAddr,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};
use transport::Transport;

/// A SuperCollider server.
///
/// `Server` is safe to share between threads; every method takes `&self`. See [the module level
/// documentation](self) for how replies are matched to requests.
pub struct Server {
    transport: Transport,
    pending: Arc<Pending>,
    request_timeout: Duration,

    // IDs used in /sync commands only need to be unique per client, so we do not need to persist
    // them.
    sync_id_counter: AtomicI32,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("closed", &self.transport.is_closed())
            .field("pending_requests", &self.pending.len())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Server {
    /// Connects to an externally running server.
    ///
    /// This function will not boot a SuperCollider server. You must start one separately.
    ///
    /// Returns immediately; the socket is bound in the background and every operation waits for
    /// it to be ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the receive thread cannot be started. Bind and connect failures are
    /// reported by the first operation that needs the socket.
    pub fn connect(config: &Config) -> Result<Server> {
        let pending = Arc::new(Pending::default());
        let receiver = Arc::clone(&pending);
        let transport = Transport::open(config, move |message| {
            if let Some(message) = receiver.resolve(message) {
                log::warn!("no request waiting for {:?}", message);
            }
        })?;
        log::debug!("connecting to {}", config.remote_addr());
        Ok(Server {
            transport,
            pending,
            request_timeout: config.request_timeout_duration(),
            sync_id_counter: AtomicI32::new(0),
        })
    }

    /// Runs `f` against a server of its own and closes that server afterwards.
    ///
    /// The server is closed whether `f` succeeds, fails, or panics.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use conjure::{config::Config, server::Server};
    ///
    /// let status = Server::with_private(&Config::default(), |server| server.status())?;
    /// println!("{} synths running", status.synths);
    /// # conjure::Result::Ok(())
    /// ```
    pub fn with_private<T, F>(config: &Config, f: F) -> Result<T>
    where
        F: FnOnce(&Server) -> Result<T>,
    {
        let server = Server::connect(config)?;
        let result = f(&server);
        server.close();
        result
    }

    /// Sends a command to the server.
    ///
    /// Sends a command to the SuperCollider server and immediately returns. This method will not
    /// wait for a reply; for that, see [`send_sync`](Server::send_sync).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// * The socket could not be bound or connected.
    /// * The command cannot be encoded into an OSC packet.
    /// * The OSC packet cannot be sent to the server.
    /// * The server has been closed.
    pub fn send(&self, command: impl Command) -> Result<()> {
        log::debug!("send: {:?}", command);
        let packet = OscPacket::Message(command.into_message());
        let bytes = encode(&packet).map_err(Error::Encode)?;
        self.transport.send(&bytes)
    }

    /// Sends a command and waits for the first reply with one of the `accepted` addresses.
    ///
    /// The request is registered before the command goes out, so a reply cannot slip past it.
    ///
    /// # Errors
    ///
    /// Returns everything [`send`](Server::send) does, plus
    /// [`Error::RequestTimeout`](crate::Error::RequestTimeout) if no accepted reply arrives within
    /// `timeout` and [`Error::Closed`](crate::Error::Closed) if the server is closed while
    /// waiting.
    pub fn request(
        &self,
        command: impl Command,
        accepted: &[&str],
        timeout: Duration,
    ) -> Result<OscMessage> {
        let ticket = self.pending.register(accepted, timeout);
        if let Err(err) = self.send(command) {
            self.pending.cancel(ticket.key());
            return Err(err);
        }
        self.pending.wait(ticket)
    }

    /// Sends a command and waits for its reply, using the default request timeout.
    ///
    /// The reply is returned as is; a `/fail` reply is not turned into an error here.
    pub fn send_sync(&self, command: impl AsyncCommand) -> Result<OscMessage> {
        let accepted = command.reply_addresses();
        self.request(command, accepted, self.request_timeout)
    }

    /// Waits for asynchronous commands to complete.
    ///
    /// Blocks until all asynchronous commands started before the current moment complete.
    pub fn sync(&self) -> Result<()> {
        self.send_sync(Sync::new(self.next_sync_id()))?;
        Ok(())
    }

    fn next_sync_id(&self) -> i32 {
        self.sync_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Frees every node and waits for the server to catch up.
    pub fn reset(&self) -> Result<()> {
        self.send(GroupFreeAll::new(vec![0]))?;
        self.sync()
    }

    /// Queries the server's load.
    pub fn status(&self) -> Result<StatusReply> {
        let reply = self.send_sync(Status::new())?;
        StatusReply::parse(&reply)
    }

    /// Queries the server's version.
    pub fn version(&self) -> Result<VersionReply> {
        let reply = self.send_sync(Version::new())?;
        VersionReply::parse(&reply)
    }

    /// Tells the server process to exit and waits for it to acknowledge.
    pub fn quit(&self) -> Result<()> {
        reply::check(self.send_sync(Quit::new())?)?;
        Ok(())
    }

    /// Sets how the server prints incoming messages to its console. See [`DumpOSC`].
    pub fn dump_osc(&self, level: i32) -> Result<()> {
        self.send(DumpOSC::new(level))
    }

    /// The timeout used by [`send_sync`](Server::send_sync).
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The number of requests waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// The local address of the socket, once it is bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Releases the socket. Requests still waiting fail with
    /// [`Error::Closed`](crate::Error::Closed). Calling this more than once is harmless.
    pub fn close(&self) {
        self.transport.close();
        self.pending.clear();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}
