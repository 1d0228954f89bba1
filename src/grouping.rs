// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! Collection of every value of a getter and collapse of repeated structure.

use crate::backend::{MetadataStore, RawValue};
use crate::enumerate::{IndexTuple, next_tuple};
use crate::value::{Converted, Value, convert_value};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Values of one getter after collapsing, in enumeration order.
pub type GroupedResult = Vec<(IndexTuple, Value)>;

/// Values of one getter after collapsing, each with the conversion that produced it.
pub type GroupedConversions = Vec<(IndexTuple, Converted)>;

/// Walk the index space of getter `name` and collect every value it yields.
///
/// `first` is the value already found at the all-zero index while probing the
/// getter. Every subsequent successful call keeps the walk in the innermost
/// index; every failed call carries into the next outer index. At most
/// `max_values` values are collected.
pub fn collect_values<S>(
    store: &S,
    name: &str,
    arity: usize,
    first: &RawValue,
    max_values: usize,
) -> Vec<(IndexTuple, Converted)>
where
    S: MetadataStore + ?Sized,
{
    let mut index = vec![0; arity];
    let mut values = vec![(index.clone(), convert_value(Some(first)))];
    let mut advance = true;
    while let Some(next) = next_tuple(&index, advance) {
        if values.len() >= max_values {
            log::warn!("{name}: stopped after {max_values} values");
            break;
        }
        index = next;
        match store.call(name, &index) {
            Ok(raw) => {
                values.push((index.clone(), convert_value(raw.as_ref())));
                advance = true;
            }
            Err(_) => advance = false,
        }
    }
    values
}

/// Collapse redundant structure in the values of one getter.
///
/// * all values equal: the last pair alone;
/// * otherwise, for indices with two or more components, every outer-index group
///   whose values are all equal becomes `((outer, count - 1), value)`;
/// * if no group is constant but all groups repeat the values of the last
///   group, the pairs of the last group alone;
/// * otherwise the input unchanged.
///
/// ```
/// # use mmdata::{group_values, Value};
/// let v = |i| Value::Int(i);
/// let grouped = group_values(vec![
///     (vec![0, 0], v(5)),
///     (vec![0, 1], v(5)),
///     (vec![1, 0], v(6)),
///     (vec![1, 1], v(6)),
///     (vec![1, 2], v(6)),
/// ]);
/// assert_eq!(grouped, vec![(vec![0, 1], v(5)), (vec![1, 2], v(6))]);
/// ```
pub fn group_values<T>(mut values: Vec<(IndexTuple, T)>) -> Vec<(IndexTuple, T)>
where
    T: PartialEq + Clone,
{
    if values.len() < 2 {
        return values;
    }
    if values.iter().map(|(_, v)| v).all_equal() {
        return values.split_off(values.len() - 1);
    }
    if values[0].0.len() < 2 {
        return values;
    }

    let mut groups: BTreeMap<usize, Vec<&(IndexTuple, T)>> = BTreeMap::new();
    for pair in &values {
        groups.entry(pair.0[0]).or_default().push(pair);
    }

    let mut collapsed = false;
    let mut tidy = Vec::with_capacity(values.len());
    for (outer, group) in &groups {
        if group.iter().map(|(_, v)| v).all_equal() {
            collapsed = true;
            let value = group[group.len() - 1].1.clone();
            tidy.push((vec![*outer, group.len() - 1], value));
        } else {
            tidy.extend(group.iter().map(|&pair| pair.clone()));
        }
    }
    if collapsed {
        return tidy;
    }

    let Some((_, last_group)) = groups.last_key_value() else {
        return values;
    };
    let repeated = groups.values().all(|group| {
        group.len() == last_group.len()
            && group.iter().zip(last_group.iter()).all(|(a, b)| a.1 == b.1)
    });
    if repeated {
        let n = last_group.len();
        values.split_off(values.len() - n)
    } else {
        values
    }
}
