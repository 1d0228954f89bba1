// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! This library reads microscopy container files (multi-series, multi-channel,
//! multi-timepoint, multi-z images with stage positions) through a pluggable
//! file-format [`Backend`](backend::Backend), and provides:
//!
//! * a flat, grouped view of every metadata field the backend exposes, without
//!   knowing the shape of those fields up front ([`collect_metadata`]),
//! * the structural metadata of every series, consolidated across series
//!   ([`CoreMetadata`]),
//! * random access to 2-d planes ([`PlaneReader`]),
//! * stitching of stage-position tiles into one mosaic ([`stitch`]),
//! * comparison of two files ([`Session::diff`]).
//!
//! Format decoding itself is left to the backend. [`memory`] contains a
//! complete in-memory backend.
//!
//! Backends are single-threaded and stateful; every call is blocking.
//!
//! Copyright (c) 2021, 2025 Eadf <lacklustr@protonmail.com>.
//! License: MIT/Apache 2.0

pub mod backend;
mod core_metadata;
pub mod enumerate;
pub mod grouping;
pub mod memory;
pub mod metadata;
mod reader;
mod stitch;
#[cfg(feature = "opencv")]
pub mod utils;
mod value;

#[cfg(feature = "opencv")]
pub use opencv;

pub use backend::{Backend, BackendFault, ImageReader, MetadataStore, PlaneSource, Session};
pub use core_metadata::{Consolidated, CoreMetadata, Metadata, StagePosition, VoxelSize};
pub use enumerate::{IndexTuple, next_tuple};
pub use grouping::{GroupedConversions, GroupedResult, group_values};
pub use metadata::{
    MetadataOptions, MetadataStatus, collect_metadata, collect_metadata_conversions,
    diagnostic_log_path,
};
pub use reader::{PixelType, Plane, PlaneIndex, PlaneReader};
pub use stitch::{TileMap, stitch};
pub use value::{ConversionKind, Converted, Value, convert_numeric_field, convert_value};

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MmError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error(transparent)]
    Backend(#[from] BackendFault),
    #[error("Multiple positions within series {series}")]
    AmbiguousPosition { series: usize },
    #[error("Series {series} doesn't have an XY position")]
    MissingPosition { series: usize },
    #[error("Unsupported bit depth: {0} bits per pixel")]
    UnsupportedBitDepth(u32),
    #[error("Building tilemap failed: cell ({row}, {col}) matches series {series:?}")]
    StitchGeometry {
        row: usize,
        col: usize,
        series: Vec<usize>,
    },
    #[error("Unexpected plane size: expected {expected} got {found}")]
    PlaneShape { expected: usize, found: usize },
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "opencv")]
    #[error(transparent)]
    OpenCvError(#[from] opencv::Error),
    #[cfg(feature = "opencv")]
    #[error("Invalid path encoding {0}")]
    InvalidPathEncoding(PathBuf),
    #[error("Invalid parameter(s) {0}")]
    InvalidParams(String),
}

/// Parameters of [`Session::read_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Append backend faults met while enumerating metadata to `<file>.mmdata.log`.
    pub diagnostics: bool,
    pub metadata: MetadataOptions,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            diagnostics: true,
            metadata: MetadataOptions::default(),
        }
    }
}

impl<B: Backend> Session<B> {
    /// Open `path` with default [`ReadOptions`].
    pub fn read<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(Metadata, PlaneReader<B::Reader>), MmError> {
        self.read_with(path, &ReadOptions::default())
    }

    /// Open `path`, collect all of its metadata and return a reader for its planes.
    ///
    /// # Returns
    /// - `Metadata`: core metadata, every grouped metadata field and the probe status
    ///   of every metadata getter
    /// - `PlaneReader`: random access to the planes of the file
    ///
    /// # Errors
    /// - `MmError::NotFound` if `path` is not a file; the backend is not called
    /// - `MmError::UnsupportedBitDepth` if the file is not 8, 12 or 16 bit
    /// - `MmError::Backend` if the backend can not open the file
    pub fn read_with<P: AsRef<Path>>(
        &self,
        path: P,
        options: &ReadOptions,
    ) -> Result<(Metadata, PlaneReader<B::Reader>), MmError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MmError::NotFound(path.to_path_buf()));
        }
        let reader = self.open(path)?;
        let core = CoreMetadata::from_reader(&reader)?;
        let reader = PlaneReader::new(reader)?;
        let (full, status) = collect_metadata(
            reader.inner().metadata_store(),
            options.diagnostics.then_some(path),
            &options.metadata,
        )?;
        Ok((Metadata { core, full, status }, reader))
    }

    /// `true` if the two files have equal core metadata and equal pixels in every plane.
    ///
    /// A metadata mismatch is logged as a warning together with both core metadata.
    pub fn diff<P: AsRef<Path>, Q: AsRef<Path>>(&self, a: P, b: Q) -> Result<bool, MmError> {
        let (md_a, mut reader_a) = self.read(a)?;
        let (md_b, mut reader_b) = self.read(b)?;
        if md_a.core != md_b.core {
            let (core_a, core_b) = (&md_a.core, &md_b.core);
            log::warn!("Metadata mismatch:\nmd_a: {core_a:?}\nmd_b: {core_b:?}");
            return Ok(false);
        }
        for index in md_a.core.plane_indices() {
            if reader_a.read(index, false)? != reader_b.read(index, false)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub mod prelude {
    pub use super::{
        Backend, CoreMetadata, ImageReader, Metadata, MetadataOptions, MetadataStatus,
        MetadataStore, MmError, Plane, PlaneIndex, PlaneReader, ReadOptions, Session, TileMap,
        stitch,
    };
}
