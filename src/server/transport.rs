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

use crate::{
    config::Config,
    error::{Error, Result},
};
use rosc::{decoder::decode, OscMessage, OscPacket};
use std::{
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};

const MTU: usize = 65536;

// The receive loop wakes up this often to notice that the transport was closed.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One UDP socket bound locally and connected to a fixed peer.
///
/// Binding happens on the receive thread, so [`Transport::open`] returns before the socket is
/// usable. Everything that needs the socket goes through [`Transport::wait_ready`].
pub(crate) struct Transport {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    readiness: Condvar,
    closed: AtomicBool,
}

enum State {
    Binding,
    Ready(Arc<UdpSocket>),
    Failed(BindFailure),
    Closed,
}

// io::Error is not Clone, and every waiter needs its own copy of a bind failure.
struct BindFailure {
    connecting: bool,
    kind: io::ErrorKind,
    message: String,
}

impl BindFailure {
    fn new(connecting: bool, err: io::Error) -> BindFailure {
        BindFailure {
            connecting,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn to_error(&self) -> Error {
        let err = io::Error::new(self.kind, self.message.clone());
        if self.connecting {
            Error::Connect(err)
        } else {
            Error::Bind(err)
        }
    }
}

impl Transport {
    /// Starts binding a socket according to `config` and returns immediately.
    ///
    /// Every message received from the peer is passed to `on_message`, in arrival order, on the
    /// receive thread. Bundles are flattened into their messages.
    pub fn open<F>(config: &Config, on_message: F) -> Result<Transport>
    where
        F: FnMut(OscMessage) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Binding),
            readiness: Condvar::new(),
            closed: AtomicBool::new(false),
        });
        let local = config.local_addr();
        let remote = config.remote_addr();
        let thread_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("conjure-recv".to_owned())
            .spawn(move || match bind(&local, &remote) {
                Ok(socket) => {
                    let socket = Arc::new(socket);
                    if thread_shared.become_ready(Arc::clone(&socket)) {
                        recv_loop(&thread_shared, &socket, on_message);
                    }
                }
                Err(failure) => thread_shared.fail(failure),
            })
            .map_err(Error::Bind)?;
        Ok(Transport { shared })
    }

    /// Blocks until the socket is bound and connected.
    pub fn wait_ready(&self) -> Result<Arc<UdpSocket>> {
        let mut state = self.shared.lock_state();
        loop {
            match &*state {
                State::Ready(socket) => return Ok(Arc::clone(socket)),
                State::Failed(failure) => return Err(failure.to_error()),
                State::Closed => return Err(Error::Closed),
                State::Binding => {}
            }
            state = self
                .shared
                .readiness
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Hands one datagram to the socket.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let socket = self.wait_ready()?;
        if self.is_closed() {
            return Err(Error::Closed);
        }
        socket.send(bytes).map_err(Error::Send)?;
        Ok(())
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.wait_ready()?.local_addr().map_err(Error::Bind)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Stops the receive loop and releases the socket. Calling this more than once is harmless.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("closing transport");
        *self.shared.lock_state() = State::Closed;
        self.shared.readiness.notify_all();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Returns false if the transport was closed while the socket was being bound.
    fn become_ready(&self, socket: Arc<UdpSocket>) -> bool {
        let mut state = self.lock_state();
        if let State::Closed = *state {
            return false;
        }
        if let Ok(addr) = socket.local_addr() {
            log::debug!("transport ready on {}", addr);
        }
        *state = State::Ready(socket);
        self.readiness.notify_all();
        true
    }

    fn fail(&self, failure: BindFailure) {
        let mut state = self.lock_state();
        if let State::Binding = *state {
            log::error!("opening transport: {}", failure.to_error());
            *state = State::Failed(failure);
            self.readiness.notify_all();
        }
    }
}

fn bind(local: &str, remote: &str) -> std::result::Result<UdpSocket, BindFailure> {
    let socket = UdpSocket::bind(local).map_err(|err| BindFailure::new(false, err))?;
    socket
        .connect(remote)
        .map_err(|err| BindFailure::new(true, err))?;
    socket
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| BindFailure::new(false, err))?;
    Ok(socket)
}

fn recv_loop<F>(shared: &Shared, socket: &UdpSocket, mut on_message: F)
where
    F: FnMut(OscMessage),
{
    let mut buffer = vec![0_u8; MTU];

    while !shared.closed.load(Ordering::Acquire) {
        let len = match socket.recv(&mut buffer) {
            Ok(len) => len,
            Err(err) if is_poll_timeout(&err) => continue,
            // The peer's port was unreachable for an earlier datagram.
            Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
                log::debug!("server unreachable: {}", err);
                continue;
            }
            Err(err) => {
                log::error!("error receiving next packet from server: {}", err);
                thread::sleep(POLL_INTERVAL);
                continue;
            }
        };
        match decode(&buffer[..len]) {
            Ok(packet) => dispatch(packet, &mut on_message),
            Err(err) => log::error!("decoding OSC packet from server: {:?}", err),
        }
    }
    log::debug!("receive loop stopped");
}

fn is_poll_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn dispatch<F>(packet: OscPacket, on_message: &mut F)
where
    F: FnMut(OscMessage),
{
    match packet {
        OscPacket::Message(message) => {
            log::debug!("recv: {:?}", message);
            on_message(message);
        }
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                dispatch(packet, on_message);
            }
        }
    }
}
