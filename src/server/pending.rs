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

use crate::error::{Error, Result};
use rosc::OscMessage;
use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

/// Requests waiting for a reply, in registration order.
///
/// Replies carry no request ID, so an incoming message goes to the first waiter that accepts its
/// address. Two waiters with overlapping address sets can receive each other's replies.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    waiters: Mutex<Waiters>,
}

#[derive(Debug, Default)]
struct Waiters {
    next_key: u64,
    entries: Vec<Waiter>,
}

#[derive(Debug)]
struct Waiter {
    key: u64,
    accepted: Vec<String>,
    slot: mpsc::SyncSender<OscMessage>,
}

/// The waiting end of a registered request.
#[derive(Debug)]
pub(crate) struct Ticket {
    key: u64,
    accepted: Vec<String>,
    timeout: Duration,
    // None when the timeout reaches past anything an Instant can represent.
    deadline: Option<Instant>,
    slot: mpsc::Receiver<OscMessage>,
}

impl Ticket {
    pub fn key(&self) -> u64 {
        self.key
    }
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a request that accepts replies with any of the `accepted` addresses.
    pub fn register(&self, accepted: &[&str], timeout: Duration) -> Ticket {
        let accepted: Vec<String> = accepted.iter().map(|addr| (*addr).to_owned()).collect();
        let (sender, receiver) = mpsc::sync_channel(1);

        let mut waiters = self.lock();
        let key = waiters.next_key;
        waiters.next_key += 1;
        waiters.entries.push(Waiter {
            key,
            accepted: accepted.clone(),
            slot: sender,
        });

        Ticket {
            key,
            accepted,
            timeout,
            deadline: Instant::now().checked_add(timeout),
            slot: receiver,
        }
    }

    /// Hands `message` to the oldest waiter accepting its address and removes that waiter.
    ///
    /// Returns the message back if no waiter accepts it.
    pub fn resolve(&self, message: OscMessage) -> Option<OscMessage> {
        let waiter = {
            let mut waiters = self.lock();
            let index = waiters
                .entries
                .iter()
                .position(|waiter| waiter.accepted.iter().any(|addr| *addr == message.addr));
            match index {
                Some(index) => waiters.entries.remove(index),
                None => return Some(message),
            }
        };
        // The receiver is only gone if the waiter already gave up.
        let _ = waiter.slot.try_send(message);
        None
    }

    /// Removes a waiter. Returns false if it was already resolved or cleared.
    pub fn cancel(&self, key: u64) -> bool {
        let mut waiters = self.lock();
        match waiters.entries.iter().position(|waiter| waiter.key == key) {
            Some(index) => {
                waiters.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Blocks until the ticket's request is resolved or its deadline passes.
    pub fn wait(&self, ticket: Ticket) -> Result<OscMessage> {
        let deadline = match ticket.deadline {
            Some(deadline) => deadline,
            None => return ticket.slot.recv().map_err(|_| Error::Closed),
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        match ticket.slot.recv_timeout(remaining) {
            Ok(message) => Ok(message),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Closed),
            Err(RecvTimeoutError::Timeout) => {
                if self.cancel(ticket.key) {
                    log::debug!("request for {:?} timed out", ticket.accepted);
                    return Err(Error::RequestTimeout {
                        addresses: ticket.accepted,
                        timeout: ticket.timeout,
                    });
                }
                // Resolved or cleared between the timeout and the cancel.
                ticket.slot.try_recv().map_err(|_| Error::Closed)
            }
        }
    }

    /// The number of requests still waiting.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Drops every waiter. Their requests fail with [`Error::Closed`].
    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}
