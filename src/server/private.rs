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

use rosc::{OscMessage, OscType};

/// Builds an [`OscMessage`] one argument at a time.
pub struct Message(OscMessage);

impl Message {
    pub fn addr(addr: impl Into<String>) -> Message {
        Message(OscMessage {
            addr: addr.into(),
            args: Vec::new(),
        })
    }

    pub fn arg<T: Into<OscType>>(mut self, arg: T) -> Message {
        self.0.args.push(arg.into());
        self
    }

    pub fn args<I, T>(mut self, args: I) -> Message
    where
        I: IntoIterator<Item = T>,
        T: Into<OscType>,
    {
        self.0.args.extend(args.into_iter().map(T::into));
        self
    }

    pub fn build(self) -> OscMessage {
        self.0
    }
}

/// Pulls typed values off the front of a reply's arguments.
pub struct Args<'a> {
    args: std::slice::Iter<'a, OscType>,
}

impl<'a> Args<'a> {
    pub fn new(message: &'a OscMessage) -> Args<'a> {
        Args {
            args: message.args.iter(),
        }
    }

    pub fn next(&mut self) -> Option<&'a OscType> {
        self.args.next()
    }

    pub fn int(&mut self) -> Option<i32> {
        match self.args.next()? {
            OscType::Int(x) => Some(*x),
            _ => None,
        }
    }

    pub fn float(&mut self) -> Option<f32> {
        match self.args.next()? {
            OscType::Float(x) => Some(*x),
            OscType::Int(x) => Some(*x as f32),
            _ => None,
        }
    }

    pub fn double(&mut self) -> Option<f64> {
        match self.args.next()? {
            OscType::Double(x) => Some(*x),
            OscType::Float(x) => Some(f64::from(*x)),
            _ => None,
        }
    }

    pub fn string(&mut self) -> Option<String> {
        match self.args.next()? {
            OscType::String(x) => Some(x.clone()),
            _ => None,
        }
    }

    pub fn remaining(&self) -> usize {
        self.args.len()
    }
}
