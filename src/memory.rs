// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! A backend holding already decoded files in memory.
//!
//! Each [`MemoryReader`] carries its series geometry, its planes and a
//! [`MemoryStore`] of metadata getters. [`MemoryReader::new`] fills the store
//! with the usual structural getters (`getImageCount`, `getPixelsSizeX`,
//! `getPlanePositionX`, ...); more can be added with [`MemoryReader::store_mut`].
//!
//! ```
//! # use mmdata::memory::*;
//! # use mmdata::{backend::ImageInfo, prelude::*};
//! # fn main() -> Result<(), MmError> {
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("one.tif");
//! std::fs::write(&path, b"")?;
//!
//! let info = ImageInfo { size_x: 4, size_y: 2, size_c: 1, size_z: 1, size_t: 1,
//!                        significant_bits: 16, ..Default::default() };
//! let file = MemoryReader::new("TIFF", vec![MemorySeries::filled(info, 9)]);
//! let session = Session::new(MemoryBackend::default().with_file(&path, file))?;
//! let options = ReadOptions { diagnostics: false, ..Default::default() };
//! let (md, mut reader) = session.read_with(&path, &options)?;
//! assert_eq!(md.core.size_x.as_slice(), &[4]);
//! assert_eq!(reader.read(PlaneIndex::default(), false)?.get(1, 3), Some(9));
//! # Ok(())}
//! ```

use crate::backend::{
    Backend, BackendFault, CallError, ImageInfo, ImageReader, MetadataStore, RawValue,
};
use crate::enumerate::IndexTuple;
use crate::{Plane, PlaneIndex};
use ndarray::Array2;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One metadata getter with a fixed arity and a sparse table of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    arity: usize,
    values: BTreeMap<IndexTuple, Option<RawValue>>,
    fault: Option<BackendFault>,
}

impl Accessor {
    /// A getter taking `arity` indices with no values yet.
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            values: BTreeMap::new(),
            fault: None,
        }
    }

    /// A getter taking no index.
    pub fn scalar(value: impl Into<RawValue>) -> Self {
        Self::new(0).with(&[], value)
    }

    /// A getter raising `fault` whenever it is called with `arity` indices.
    pub fn faulty(arity: usize, fault: BackendFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::new(arity)
        }
    }

    pub fn with(mut self, index: &[usize], value: impl Into<RawValue>) -> Self {
        self.values.insert(index.to_vec(), Some(value.into()));
        self
    }

    /// Declare `index` valid but empty.
    pub fn with_none(mut self, index: &[usize]) -> Self {
        self.values.insert(index.to_vec(), None);
        self
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, index: &[usize]) -> Result<Option<RawValue>, CallError> {
        if index.len() != self.arity {
            return Err(CallError::WrongSignature);
        }
        if let Some(fault) = &self.fault {
            return Err(CallError::Fault(fault.clone()));
        }
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| CallError::NoSuchIndex(format!("{index:?}")))
    }
}

/// Metadata getters by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    accessors: BTreeMap<String, Accessor>,
}

impl MemoryStore {
    pub fn insert(&mut self, name: impl Into<String>, accessor: Accessor) -> &mut Self {
        self.accessors.insert(name.into(), accessor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }

    /// Structural getters of `series`, laid out the way OME metadata stores them.
    pub fn from_series(series: &[MemorySeries]) -> Self {
        let mut store = Self::default();
        store.insert("getImageCount", Accessor::scalar(series.len() as i64));

        type Field = fn(&ImageInfo) -> Option<RawValue>;
        let per_image: [(&str, Field); 8] = [
            ("getImageName", |i| Some(RawValue::Str(i.name.clone()))),
            ("getImageAcquisitionDate", |i| {
                i.acquisition_date
                    .clone()
                    .map(|d| RawValue::Wrapped(Box::new(RawValue::Str(d))))
            }),
            ("getPixelsSizeX", |i| Some(positive_integer(i.size_x))),
            ("getPixelsSizeY", |i| Some(positive_integer(i.size_y))),
            ("getPixelsSizeC", |i| Some(positive_integer(i.size_c))),
            ("getPixelsSizeZ", |i| Some(positive_integer(i.size_z))),
            ("getPixelsSizeT", |i| Some(positive_integer(i.size_t))),
            ("getPixelsSignificantBits", |i| {
                Some(positive_integer(i.significant_bits as usize))
            }),
        ];
        for (name, field) in per_image {
            store.insert(name, per_series(series, field));
        }

        type Size = fn(&ImageInfo) -> Option<f64>;
        let physical_sizes: [(&str, Size); 3] = [
            ("getPixelsPhysicalSizeX", |i| i.physical_size_x),
            ("getPixelsPhysicalSizeY", |i| i.physical_size_y),
            ("getPixelsPhysicalSizeZ", |i| i.physical_size_z),
        ];
        for (name, size) in physical_sizes {
            store.insert(name, per_series(series, |i| size(i).map(micrometers)));
        }

        type Position = fn(&crate::backend::PlanePosition) -> Option<f64>;
        let per_plane: [(&str, Position); 3] = [
            ("getPlanePositionX", |p| p.x),
            ("getPlanePositionY", |p| p.y),
            ("getPlanePositionZ", |p| p.z),
        ];
        for (name, coordinate) in per_plane {
            let mut accessor = Accessor::new(2);
            for (s, ms) in series.iter().enumerate() {
                for (p, position) in ms.info.plane_positions.iter().enumerate() {
                    accessor = match coordinate(position) {
                        Some(v) => accessor.with(&[s, p], micrometers(v)),
                        None => accessor.with_none(&[s, p]),
                    };
                }
            }
            store.insert(name, accessor);
        }
        store
    }
}

/// One value per series, indexed by series.
fn per_series<F>(series: &[MemorySeries], field: F) -> Accessor
where
    F: Fn(&ImageInfo) -> Option<RawValue>,
{
    let mut accessor = Accessor::new(1);
    for (s, ms) in series.iter().enumerate() {
        accessor = match field(&ms.info) {
            Some(v) => accessor.with(&[s], v),
            None => accessor.with_none(&[s]),
        };
    }
    accessor
}

fn positive_integer(v: usize) -> RawValue {
    RawValue::Wrapped(Box::new(RawValue::Int(v as i64)))
}

fn micrometers(v: f64) -> RawValue {
    RawValue::quantity(v, "µm")
}

impl MetadataStore for MemoryStore {
    fn accessor_names(&self) -> Vec<String> {
        self.accessors.keys().cloned().collect()
    }

    fn call(&self, name: &str, index: &[usize]) -> Result<Option<RawValue>, CallError> {
        match self.accessors.get(name) {
            Some(accessor) => accessor.call(index),
            None => Err(CallError::Fault(BackendFault::new(
                "NoSuchMethodException",
                name,
            ))),
        }
    }
}

/// One series: its geometry and planes in `(z, c, t)` order, z fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySeries {
    pub info: ImageInfo,
    pub planes: Vec<Plane>,
}

impl MemorySeries {
    pub fn new(info: ImageInfo, planes: Vec<Plane>) -> Self {
        Self { info, planes }
    }

    /// A series whose every plane is filled with `value`.
    pub fn filled(info: ImageInfo, value: i16) -> Self {
        Self::from_fn(info, |_, _, _| value)
    }

    /// A series with `pixel(index, y, x)` in each plane.
    pub fn from_fn<F>(info: ImageInfo, mut pixel: F) -> Self
    where
        F: FnMut(PlaneIndex, usize, usize) -> i16,
    {
        let mut planes = Vec::with_capacity(info.size_z * info.size_c * info.size_t);
        for t in 0..info.size_t {
            for c in 0..info.size_c {
                for z in 0..info.size_z {
                    let index = PlaneIndex::new(0, z, c, t);
                    planes.push(Plane::Int16(Array2::from_shape_fn(
                        (info.size_y, info.size_x),
                        |(y, x)| pixel(index, y, x),
                    )));
                }
            }
        }
        Self { info, planes }
    }
}

/// An opened in-memory file.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryReader {
    format: String,
    series: Vec<MemorySeries>,
    current: usize,
    store: MemoryStore,
}

impl MemoryReader {
    pub fn new(format: impl Into<String>, series: Vec<MemorySeries>) -> Self {
        let store = MemoryStore::from_series(&series);
        Self {
            format: format.into(),
            series,
            current: 0,
            store,
        }
    }

    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    fn current(&self) -> Option<&MemorySeries> {
        self.series.get(self.current)
    }
}

impl ImageReader for MemoryReader {
    fn format(&self) -> String {
        self.format.clone()
    }

    fn series_count(&self) -> usize {
        self.series.len()
    }

    fn set_series(&mut self, series: usize) -> Result<(), BackendFault> {
        if series >= self.series.len() {
            return Err(BackendFault::new(
                "IllegalArgumentException",
                format!("Invalid series: {series}"),
            ));
        }
        self.current = series;
        Ok(())
    }

    fn size_x(&self) -> usize {
        self.current().map_or(0, |s| s.info.size_x)
    }

    fn size_y(&self) -> usize {
        self.current().map_or(0, |s| s.info.size_y)
    }

    fn bits_per_pixel(&self) -> u32 {
        self.current().map_or(0, |s| s.info.significant_bits)
    }

    fn plane_index(&self, z: usize, c: usize, t: usize) -> Result<usize, BackendFault> {
        let info = &self
            .current()
            .ok_or_else(|| BackendFault::new("IllegalStateException", "no series"))?
            .info;
        if z >= info.size_z || c >= info.size_c || t >= info.size_t {
            return Err(BackendFault::new(
                "IllegalArgumentException",
                format!("Invalid ZCT coordinate: ({z}, {c}, {t})"),
            ));
        }
        Ok(z + info.size_z * (c + info.size_c * t))
    }

    fn open_bytes(&mut self, index: usize) -> Result<Vec<u8>, BackendFault> {
        let Some(plane) = self.current().and_then(|s| s.planes.get(index)) else {
            let message = format!("Invalid image number: {index}");
            return Err(BackendFault::new("FormatException", message));
        };
        Ok(match plane {
            Plane::Int8(a) => a.iter().map(|&v| v as u8).collect(),
            Plane::Int16(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
        })
    }

    fn image_info(&self, series: usize) -> Result<ImageInfo, BackendFault> {
        let Some(s) = self.series.get(series) else {
            let message = series.to_string();
            return Err(BackendFault::new("IndexOutOfBoundsException", message));
        };
        Ok(s.info.clone())
    }

    fn metadata_store(&self) -> &dyn MetadataStore {
        &self.store
    }
}

/// How many times a [`MemoryBackend`] was started and stopped.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    pub starts: Rc<Cell<usize>>,
    pub stops: Rc<Cell<usize>>,
}

/// Files by path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: HashMap<PathBuf, MemoryReader>,
    lifecycle: Lifecycle,
}

impl MemoryBackend {
    pub fn with_file(mut self, path: impl AsRef<Path>, file: MemoryReader) -> Self {
        self.files.insert(path.as_ref().to_path_buf(), file);
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }
}

impl Backend for MemoryBackend {
    type Reader = MemoryReader;

    fn start(&mut self) -> Result<(), BackendFault> {
        self.lifecycle.starts.set(self.lifecycle.starts.get() + 1);
        Ok(())
    }

    fn stop(&mut self) {
        self.lifecycle.stops.set(self.lifecycle.stops.get() + 1);
    }

    fn open(&self, path: &Path) -> Result<MemoryReader, BackendFault> {
        let Some(file) = self.files.get(path) else {
            let message = format!("Unknown file format: {}", path.display());
            return Err(BackendFault::new("UnknownFormatException", message));
        };
        Ok(file.clone())
    }
}
