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

//! Multichannel expansion.
//!
//! An argument list in which some arguments are vectors stands for several argument lists, one
//! per output channel. [`expand`] spells those lists out. Two rules are available:
//!
//! * [`Expansion::Parallel`] - SuperCollider's rule. There are as many channels as the longest
//!   vector has elements, and shorter vectors wrap around.
//! * [`Expansion::Cross`] - every combination of elements, the first argument varying slowest.
//!
//! Vectors nested in vectors expand again, with the same rule, after the outer level has been
//! expanded.
//!
//! ```
//! use conjure::expand::{expand, ExpandableValue, Expansion, Leaf};
//!
//! let freqs = ExpandableValue::from(vec![220.0_f32, 330.0]);
//! let channels = expand(&[freqs, 0.5_f32.into()], Expansion::Parallel);
//! assert_eq!(
//!     channels,
//!     vec![
//!         vec![Leaf::Scalar(220.0), Leaf::Scalar(0.5)],
//!         vec![Leaf::Scalar(330.0), Leaf::Scalar(0.5)],
//!     ]
//! );
//! ```

use std::slice;

/// An argument that may stand for several channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandableValue {
    Scalar(f32),
    Vector(Vec<ExpandableValue>),
    /// The output of another node, by id.
    NodeRef(i32),
}

impl From<f32> for ExpandableValue {
    fn from(x: f32) -> Self {
        ExpandableValue::Scalar(x)
    }
}

impl From<Vec<f32>> for ExpandableValue {
    fn from(xs: Vec<f32>) -> Self {
        ExpandableValue::Vector(xs.into_iter().map(ExpandableValue::Scalar).collect())
    }
}

impl From<Vec<ExpandableValue>> for ExpandableValue {
    fn from(values: Vec<ExpandableValue>) -> Self {
        ExpandableValue::Vector(values)
    }
}

impl ExpandableValue {
    fn as_leaf(&self) -> Option<Leaf> {
        match *self {
            ExpandableValue::Scalar(x) => Some(Leaf::Scalar(x)),
            ExpandableValue::NodeRef(id) => Some(Leaf::NodeRef(id)),
            ExpandableValue::Vector(_) => None,
        }
    }

    // The values this argument takes across channels at the outermost level.
    fn options(&self) -> &[ExpandableValue] {
        match self {
            ExpandableValue::Vector(values) => values.as_slice(),
            other => slice::from_ref(other),
        }
    }
}

/// A single channel's argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leaf {
    Scalar(f32),
    NodeRef(i32),
}

/// How vectors combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Parallel,
    Cross,
}

/// Expands an argument list into one list of leaves per channel.
///
/// A list with no vectors is a single channel. A list holding an empty vector has no channels.
pub fn expand(values: &[ExpandableValue], mode: Expansion) -> Vec<Vec<Leaf>> {
    if let Some(leaves) = values
        .iter()
        .map(ExpandableValue::as_leaf)
        .collect::<Option<Vec<_>>>()
    {
        return vec![leaves];
    }

    let options: Vec<&[ExpandableValue]> = values.iter().map(ExpandableValue::options).collect();
    if options.iter().any(|values| values.is_empty()) {
        return Vec::new();
    }

    let rows: Vec<Vec<ExpandableValue>> = match mode {
        Expansion::Parallel => {
            let width = options.iter().map(|values| values.len()).max().unwrap_or(0);
            (0..width)
                .map(|channel| {
                    options
                        .iter()
                        .map(|values| values[channel % values.len()].clone())
                        .collect()
                })
                .collect()
        }
        Expansion::Cross => options.iter().fold(vec![Vec::new()], |rows, &values| {
            rows.into_iter()
                .flat_map(move |row| {
                    values.iter().map(move |value| {
                        let mut row = row.clone();
                        row.push(value.clone());
                        row
                    })
                })
                .collect()
        }),
    };

    rows.iter().flat_map(|row| expand(row, mode)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use super::ExpandableValue::{NodeRef, Scalar, Vector};

    fn leaves(xs: &[f32]) -> Vec<Leaf> {
        xs.iter().copied().map(Leaf::Scalar).collect()
    }

    #[test]
    fn test_scalars_are_one_channel() {
        assert_eq!(
            expand(&[Scalar(1.0), NodeRef(1000)], Expansion::Parallel),
            vec![vec![Leaf::Scalar(1.0), Leaf::NodeRef(1000)]]
        );
    }

    #[test]
    fn test_parallel_wraps() {
        let channels = expand(
            &[vec![1.0_f32, 2.0, 3.0].into(), vec![10.0_f32, 20.0].into()],
            Expansion::Parallel,
        );
        assert_eq!(
            channels,
            vec![
                leaves(&[1.0, 10.0]),
                leaves(&[2.0, 20.0]),
                leaves(&[3.0, 10.0]),
            ]
        );
    }

    #[test]
    fn test_cross() {
        let channels = expand(
            &[vec![1.0_f32, 2.0].into(), Scalar(0.0), vec![10.0_f32, 20.0].into()],
            Expansion::Cross,
        );
        assert_eq!(
            channels,
            vec![
                leaves(&[1.0, 0.0, 10.0]),
                leaves(&[1.0, 0.0, 20.0]),
                leaves(&[2.0, 0.0, 10.0]),
                leaves(&[2.0, 0.0, 20.0]),
            ]
        );
    }

    #[test]
    fn test_nested() {
        let nested = Vector(vec![Scalar(1.0), vec![2.0_f32, 3.0].into()]);
        assert_eq!(
            expand(&[nested, Scalar(5.0)], Expansion::Parallel),
            vec![
                leaves(&[1.0, 5.0]),
                leaves(&[2.0, 5.0]),
                leaves(&[3.0, 5.0]),
            ]
        );
    }

    #[test]
    fn test_empty_vector() {
        assert!(expand(&[Vector(vec![]), Scalar(1.0)], Expansion::Parallel).is_empty());
        assert!(expand(&[Vector(vec![]), Scalar(1.0)], Expansion::Cross).is_empty());
        assert_eq!(expand(&[], Expansion::Cross), vec![Vec::<Leaf>::new()]);
    }
}
