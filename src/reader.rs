// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! Random access to 2-d planes of an opened file.

use crate::MmError;
use crate::backend::{ImageReader, PlaneSource};
use ndarray::Array2;

/// Pixel type of the planes of a file, fixed by its declared bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    Int8,
    Int16,
}

impl PixelType {
    /// 8 bits per pixel read as `Int8`, 12 and 16 as `Int16`.
    pub fn from_bits(bits: u32) -> Result<Self, MmError> {
        match bits {
            8 => Ok(PixelType::Int8),
            12 | 16 => Ok(PixelType::Int16),
            _ => Err(MmError::UnsupportedBitDepth(bits)),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Int8 => 1,
            PixelType::Int16 => 2,
        }
    }
}

/// One 2-d plane, indexed `[y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Plane {
    Int8(Array2<i8>),
    Int16(Array2<i16>),
}

impl Plane {
    /// Decode a raw pixel buffer of `size_y` rows by `size_x` columns.
    pub fn from_bytes(
        bytes: &[u8],
        pixel_type: PixelType,
        size_y: usize,
        size_x: usize,
        little_endian: bool,
    ) -> Result<Self, MmError> {
        let expected = size_y * size_x * pixel_type.bytes_per_pixel();
        if bytes.len() != expected {
            return Err(MmError::PlaneShape {
                expected,
                found: bytes.len(),
            });
        }
        Ok(match pixel_type {
            PixelType::Int8 => Plane::Int8(Array2::from_shape_vec(
                (size_y, size_x),
                bytes.iter().map(|&b| b as i8).collect(),
            )?),
            PixelType::Int16 => {
                let decode = if little_endian {
                    i16::from_le_bytes
                } else {
                    i16::from_be_bytes
                };
                let pixels = bytes
                    .chunks_exact(2)
                    .map(|b| decode([b[0], b[1]]))
                    .collect();
                Plane::Int16(Array2::from_shape_vec((size_y, size_x), pixels)?)
            }
        })
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            Plane::Int8(_) => PixelType::Int8,
            Plane::Int16(_) => PixelType::Int16,
        }
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Plane::Int8(a) => a.dim(),
            Plane::Int16(a) => a.dim(),
        }
    }

    /// The pixel at row `y`, column `x`.
    pub fn get(&self, y: usize, x: usize) -> Option<i64> {
        match self {
            Plane::Int8(a) => a.get((y, x)).map(|&v| v as i64),
            Plane::Int16(a) => a.get((y, x)).map(|&v| v as i64),
        }
    }

    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            Plane::Int8(a) => a.mapv(f64::from),
            Plane::Int16(a) => a.mapv(f64::from),
        }
    }
}

/// Address of a plane: series plus z, channel and time indices, all zero-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlaneIndex {
    pub series: usize,
    pub z: usize,
    pub c: usize,
    pub t: usize,
}

impl PlaneIndex {
    pub fn new(series: usize, z: usize, c: usize, t: usize) -> Self {
        Self { series, z, c, t }
    }

    pub fn with_series(self, series: usize) -> Self {
        Self { series, ..self }
    }

    pub fn with_z(self, z: usize) -> Self {
        Self { z, ..self }
    }

    pub fn with_c(self, c: usize) -> Self {
        Self { c, ..self }
    }

    pub fn with_t(self, t: usize) -> Self {
        Self { t, ..self }
    }
}

/// Reads planes of an opened file with a fixed pixel type.
pub struct PlaneReader<R: ImageReader> {
    reader: R,
    pixel_type: PixelType,
}

impl<R: ImageReader> PlaneReader<R> {
    /// Wrap `reader`.
    ///
    /// # Errors
    /// `MmError::UnsupportedBitDepth` unless the file declares 8, 12 or 16 bits per pixel.
    pub fn new(reader: R) -> Result<Self, MmError> {
        let pixel_type = PixelType::from_bits(reader.bits_per_pixel())?;
        Ok(Self { reader, pixel_type })
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn inner(&self) -> &R {
        &self.reader
    }

    /// Read the plane at `index`.
    ///
    /// `rescale` is accepted for API compatibility; pixel values are never rescaled.
    pub fn read(&mut self, index: PlaneIndex, rescale: bool) -> Result<Plane, MmError> {
        if rescale {
            log::debug!("rescaling is not applied");
        }
        self.reader.set_series(index.series)?;
        let plane = self.reader.plane_index(index.z, index.c, index.t)?;
        let bytes = self.reader.open_bytes(plane)?;
        Plane::from_bytes(
            &bytes,
            self.pixel_type,
            self.reader.size_y(),
            self.reader.size_x(),
            self.reader.is_little_endian(),
        )
    }
}

impl<R: ImageReader> PlaneSource for PlaneReader<R> {
    fn read_plane(&mut self, index: PlaneIndex) -> Result<Plane, MmError> {
        self.read(index, false)
    }
}
