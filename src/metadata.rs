// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! Flattening of a [`MetadataStore`] into a map of grouped values.

use crate::MmError;
use crate::backend::{BackendFault, MetadataStore};
use crate::enumerate::{IndexTuple, Probe};
use crate::grouping::{GroupedConversions, GroupedResult, collect_values, group_values};
use crate::value::Converted;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What happened when a getter was probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataStatus {
    /// The getter has a value.
    Found,
    /// The getter exists but returned nothing.
    None,
    /// The backend raised while the getter was probed.
    Jmiss,
}

impl fmt::Display for MetadataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetadataStatus::Found => "Found",
            MetadataStatus::None => "None",
            MetadataStatus::Jmiss => "Jmiss",
        };
        f.write_str(s)
    }
}

/// Parameters controlling which getters are enumerated and how far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOptions {
    /// Getter name prefix; it is stripped from the keys of the value map.
    pub prefix: String,
    /// Getters never called.
    pub denylist: Vec<String>,
    /// Largest number of index arguments tried while probing.
    pub max_arity: usize,
    /// Largest number of values collected for one getter.
    pub max_values_per_key: usize,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            prefix: "get".into(),
            denylist: [
                "getRoot",
                "getClass",
                "getXMLAnnotationValue",
                "getPixelsBinDataBigEndian",
            ]
            .map(String::from)
            .to_vec(),
            max_arity: 4,
            max_values_per_key: 65_536,
        }
    }
}

/// Grouped values keyed by getter name without prefix.
pub type MetadataMap = BTreeMap<String, GroupedResult>;
/// Grouped values with their conversion kinds, keyed like [`MetadataMap`].
pub type ConversionMap = BTreeMap<String, GroupedConversions>;
/// Probe status keyed by full getter name.
pub type StatusMap = BTreeMap<String, MetadataStatus>;

/// Path of the diagnostic log kept next to `filepath`.
pub fn diagnostic_log_path(filepath: &Path) -> PathBuf {
    let mut name = filepath.as_os_str().to_owned();
    name.push(".mmdata.log");
    PathBuf::from(name)
}

/// Append-only record of the backend faults met while enumerating a file.
/// The file is closed when the log is dropped.
struct DiagnosticLog {
    file: File,
}

impl DiagnosticLog {
    fn open(filepath: &Path) -> Result<Self, MmError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(diagnostic_log_path(filepath))?;
        Ok(Self { file })
    }

    fn record(&mut self, key: &str, fault: &BackendFault, arity: usize) -> Result<(), MmError> {
        writeln!(
            self.file,
            "({:?}, {:?}, {:?}, \"--\", {})",
            key, fault.kind, fault.message, arity
        )?;
        Ok(())
    }
}

/// Enumerate every getter of `store` and collect its grouped values.
///
/// Getters are selected by [`MetadataOptions::prefix`] minus the denylist. Each
/// is probed for its arity; getters with a value get every value collected and
/// grouped (see [`group_values`]). A backend fault on one getter marks it
/// [`MetadataStatus::Jmiss`] and enumeration goes on with the next one.
///
/// When `filepath` is given, each fault is appended as one line to
/// `<filepath>.mmdata.log`.
///
/// # Returns
/// - the grouped values keyed by getter name with the prefix stripped
/// - the status of every probed getter keyed by its full name
///
/// # Errors
/// Only I/O errors on the diagnostic log.
pub fn collect_metadata<S>(
    store: &S,
    filepath: Option<&Path>,
    options: &MetadataOptions,
) -> Result<(MetadataMap, StatusMap), MmError>
where
    S: MetadataStore + ?Sized,
{
    collect_with(store, filepath, options, |converted| converted.value)
}

/// Like [`collect_metadata`], but every value keeps the [`ConversionKind`] that
/// produced it. Grouping then compares value and kind together.
///
/// [`ConversionKind`]: crate::ConversionKind
pub fn collect_metadata_conversions<S>(
    store: &S,
    filepath: Option<&Path>,
    options: &MetadataOptions,
) -> Result<(ConversionMap, StatusMap), MmError>
where
    S: MetadataStore + ?Sized,
{
    collect_with(store, filepath, options, |converted| converted)
}

fn collect_with<S, T, F>(
    store: &S,
    filepath: Option<&Path>,
    options: &MetadataOptions,
    keep: F,
) -> Result<(BTreeMap<String, Vec<(IndexTuple, T)>>, StatusMap), MmError>
where
    S: MetadataStore + ?Sized,
    T: PartialEq + Clone,
    F: Fn(Converted) -> T,
{
    let wanted = |k: &String| k.starts_with(&options.prefix) && !options.denylist.contains(k);
    let keys: Vec<String> = store.accessor_names().into_iter().filter(wanted).collect();
    let max_values = options.max_values_per_key;

    let mut log = filepath.map(DiagnosticLog::open).transpose()?;
    let mut md = BTreeMap::new();
    let mut status = StatusMap::new();

    for key in keys {
        match store.arity(&key, options.max_arity) {
            Probe::Found { arity, value } => {
                let values = collect_values(store, &key, arity, &value, max_values)
                    .into_iter()
                    .map(|(index, converted)| (index, keep(converted)))
                    .collect();
                let name = key[options.prefix.len()..].to_string();
                md.insert(name, group_values(values));
                status.insert(key, MetadataStatus::Found);
            }
            Probe::Empty { .. } => {
                status.insert(key, MetadataStatus::None);
            }
            Probe::NoArity => {
                log::debug!("{key}: no arity up to {}", options.max_arity);
            }
            Probe::Fault { arity, fault } => {
                log::debug!("{key}: {fault} at arity {arity}");
                if let Some(log) = log.as_mut() {
                    log.record(&key, &fault, arity)?;
                }
                status.insert(key, MetadataStatus::Jmiss);
            }
        }
    }
    Ok((md, status))
}
