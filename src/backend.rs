// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! The adapter boundary between this crate and a file-format backend.
//!
//! A backend owns format decoding. It exposes two things: an [`ImageReader`]
//! giving access to series geometry and raw plane bytes, and a [`MetadataStore`]
//! giving access to named metadata getters whose number of index arguments is
//! not known up front.

use crate::enumerate::{self, Probe};
use crate::{MmError, PlaneIndex};
use std::fmt;
use std::path::Path;

/// A fault raised by the backend runtime, e.g. an exception thrown by a bridged library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFault {
    /// The backend's name for the fault (exception type).
    pub kind: String,
    pub message: String,
}

impl BackendFault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BackendFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BackendFault {}

/// Outcome of a failed metadata getter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The getter does not take this number of index arguments.
    WrongSignature,
    /// The getter takes this many arguments, but there is nothing at these indices.
    NoSuchIndex(String),
    /// Anything else the backend raised.
    Fault(BackendFault),
}

impl CallError {
    /// Kind and message, as recorded in the diagnostic log.
    pub fn describe(&self) -> (String, String) {
        match self {
            CallError::WrongSignature => ("WrongSignature".into(), String::new()),
            CallError::NoSuchIndex(msg) => ("NoSuchIndex".into(), msg.clone()),
            CallError::Fault(fault) => (fault.kind.clone(), fault.message.clone()),
        }
    }
}

/// A metadata value as handed out by the backend, before conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A boxed backend number, carried by its canonical text form.
    Number(String),
    /// An object exposing a nested value getter.
    Wrapped(Box<RawValue>),
    /// A unit-bearing quantity exposing a value and a unit symbol.
    Quantity { value: Box<RawValue>, unit: String },
    /// Anything else. `text` is its string form, if the backend can produce one.
    Opaque {
        type_name: String,
        text: Option<String>,
    },
}

impl RawValue {
    /// String form of the value as the backend would render it.
    /// Returns `None` when the value has no string form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawValue::Str(s) | RawValue::Number(s) => Some(s.clone()),
            RawValue::Bool(b) => Some(b.to_string()),
            RawValue::Int(i) => Some(i.to_string()),
            RawValue::Float(f) => Some(format!("{f:?}")),
            RawValue::Wrapped(inner) => inner.to_text(),
            RawValue::Quantity { value, unit } => value.to_text().map(|v| format!("{v} {unit}")),
            RawValue::Opaque { text, .. } => text.clone(),
        }
    }

    /// A quantity with a plain float value.
    pub fn quantity(value: f64, unit: impl Into<String>) -> Self {
        RawValue::Quantity {
            value: Box::new(RawValue::Float(value)),
            unit: unit.into(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Int(i)
    }
}

impl From<f64> for RawValue {
    fn from(f: f64) -> Self {
        RawValue::Float(f)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

/// Named metadata getters of an opened file.
pub trait MetadataStore {
    /// Every getter name the store exposes, including ones that are not metadata fields.
    fn accessor_names(&self) -> Vec<String>;

    /// Invoke getter `name` with `index.len()` integer arguments.
    fn call(&self, name: &str, index: &[usize]) -> Result<Option<RawValue>, CallError>;

    /// Number of index arguments `name` takes.
    ///
    /// The default implementation probes the getter with zero indices of
    /// increasing length (see [`enumerate::probe_arity`]). Stores that can
    /// introspect their getters should answer directly.
    fn arity(&self, name: &str, max_arity: usize) -> Probe {
        enumerate::probe_arity(self, name, max_arity)
    }
}

/// Stage position of a single plane as stored in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlanePosition {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl PlanePosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }
}

/// Per-series fields needed to build [`crate::CoreMetadata`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInfo {
    pub size_x: usize,
    pub size_y: usize,
    pub size_c: usize,
    pub size_z: usize,
    pub size_t: usize,
    pub significant_bits: u32,
    pub name: String,
    pub acquisition_date: Option<String>,
    pub plane_positions: Vec<PlanePosition>,
    pub physical_size_x: Option<f64>,
    pub physical_size_y: Option<f64>,
    pub physical_size_z: Option<f64>,
}

/// An opened file.
///
/// Readers are stateful: [`ImageReader::set_series`] changes what the size and
/// plane accessors refer to.
pub trait ImageReader {
    /// Human readable name of the file format, e.g. `"OME-TIFF"`.
    fn format(&self) -> String;
    fn series_count(&self) -> usize;
    fn set_series(&mut self, series: usize) -> Result<(), BackendFault>;
    /// Width of the current series.
    fn size_x(&self) -> usize;
    /// Height of the current series.
    fn size_y(&self) -> usize;
    fn bits_per_pixel(&self) -> u32;
    fn is_little_endian(&self) -> bool {
        true
    }
    /// Linear plane index of `(z, c, t)` in the current series.
    fn plane_index(&self, z: usize, c: usize, t: usize) -> Result<usize, BackendFault>;
    /// Raw bytes of plane `index` in the current series.
    fn open_bytes(&mut self, index: usize) -> Result<Vec<u8>, BackendFault>;
    fn image_info(&self, series: usize) -> Result<ImageInfo, BackendFault>;
    fn metadata_store(&self) -> &dyn MetadataStore;
}

/// A file-format backend runtime.
pub trait Backend {
    type Reader: ImageReader;

    /// Bring the runtime up. Called once per [`Session`].
    fn start(&mut self) -> Result<(), BackendFault>;
    /// Tear the runtime down. Called once per [`Session`].
    fn stop(&mut self);
    fn open(&self, path: &Path) -> Result<Self::Reader, BackendFault>;
}

/// A started backend.
///
/// Creating a session starts the backend and dropping it stops it, exactly once.
/// Every operation takes the session by reference.
///
/// ```no_run
/// # use mmdata::prelude::*;
/// # fn f<B: Backend>(backend: B) -> Result<(), MmError> {
/// let session = Session::new(backend)?;
/// let (md, mut reader) = session.read("tests/data/t4_1.tif")?;
/// let plane = reader.read(PlaneIndex::default().with_c(2), false)?;
/// println!("{:?} {:?}", md.core.size_x, plane.shape());
/// # Ok(())}
/// ```
pub struct Session<B: Backend> {
    backend: B,
    started: bool,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Result<Self, MmError> {
        let mut session = Self {
            backend,
            started: false,
        };
        session.start()?;
        Ok(session)
    }

    /// Starts the backend unless it is already running.
    pub fn start(&mut self) -> Result<(), MmError> {
        if !self.started {
            log::debug!("starting backend");
            self.backend.start()?;
            self.started = true;
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn open(&self, path: &Path) -> Result<B::Reader, MmError> {
        if !self.started {
            return Err(MmError::InvalidParams(
                "backend session is not started".into(),
            ));
        }
        Ok(self.backend.open(path)?)
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        if self.started {
            log::debug!("stopping backend");
            self.backend.stop();
            self.started = false;
        }
    }
}

/// Reads planes addressed by [`PlaneIndex`].
pub trait PlaneSource {
    fn read_plane(&mut self, index: PlaneIndex) -> Result<crate::Plane, MmError>;
}
