// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! Arity discovery and index enumeration for metadata getters.
//!
//! Backends give no shape information for their getters: neither how many
//! indices a getter takes nor how far each index may run. The arity is found by
//! calling the getter with ever longer all-zero index tuples, and the index
//! space is walked by [`next_tuple`], which is steered by whether the previous
//! call succeeded.

use crate::backend::{BackendFault, CallError, MetadataStore, RawValue};

/// A multi-index into a getter's (possibly ragged) index space.
pub type IndexTuple = Vec<usize>;

/// Result of asking a store how many indices a getter takes.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// The getter takes `arity` indices and has a value at all zeros.
    Found { arity: usize, value: RawValue },
    /// The getter takes `arity` indices but returns nothing at all zeros.
    Empty { arity: usize },
    /// No arity up to the maximum matched the getter's signature.
    NoArity,
    /// The backend raised something other than a signature mismatch.
    Fault { arity: usize, fault: BackendFault },
}

/// Find the arity of getter `name` by calling it with `0..=max_arity` zero indices.
///
/// Only a signature mismatch moves the probe on to the next length; any other
/// error ends it as [`Probe::Fault`] at the length that raised it.
pub fn probe_arity<S>(store: &S, name: &str, max_arity: usize) -> Probe
where
    S: MetadataStore + ?Sized,
{
    for arity in 0..=max_arity {
        let zeros = vec![0; arity];
        match store.call(name, &zeros) {
            Ok(Some(value)) => return Probe::Found { arity, value },
            Ok(None) => return Probe::Empty { arity },
            Err(CallError::WrongSignature) => continue,
            Err(CallError::Fault(fault)) => return Probe::Fault { arity, fault },
            Err(other) => {
                let (kind, message) = other.describe();
                return Probe::Fault {
                    arity,
                    fault: BackendFault::new(kind, message),
                };
            }
        }
    }
    Probe::NoArity
}

/// Position of the rightmost nonzero element, or `None` if every element is zero.
///
/// ```
/// # use mmdata::enumerate::last_nonzero;
/// assert_eq!(last_nonzero(&[0, 2, 0, 0]), Some(1));
/// assert_eq!(last_nonzero(&[0, 0, 0]), None);
/// ```
pub fn last_nonzero(index: &[usize]) -> Option<usize> {
    index.iter().rposition(|&i| i != 0)
}

/// The index tuple to try after `index`, or `None` when the walk is over.
///
/// With `advance` set (the previous call succeeded) the last index is
/// incremented. Otherwise the rightmost nonzero index is reset to zero and a
/// carry goes into its left neighbour; when there is no left neighbour to carry
/// into the walk ends. Empty tuples always end the walk.
///
/// ```
/// # use mmdata::enumerate::next_tuple;
/// assert_eq!(next_tuple(&[0, 0, 1], true), Some(vec![0, 0, 2]));
/// assert_eq!(next_tuple(&[0, 0, 2], false), Some(vec![0, 1, 0]));
/// assert_eq!(next_tuple(&[0, 1, 2], false), Some(vec![0, 2, 0]));
/// assert_eq!(next_tuple(&[2, 0, 0], false), None);
/// ```
pub fn next_tuple(index: &[usize], advance: bool) -> Option<IndexTuple> {
    let last = index.len().checked_sub(1)?;
    let mut next = index.to_vec();
    if advance {
        next[last] += 1;
    } else {
        match last_nonzero(index) {
            Some(pos) if pos > 0 => {
                next[pos] = 0;
                next[pos - 1] += 1;
            }
            _ => return None,
        }
    }
    Some(next)
}
