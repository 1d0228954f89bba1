// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! OpenCV interop: planes and mosaics as `Mat`, and writing them to image files.

use super::{MmError, Plane};
use ndarray::Array2;
use opencv::core::{self, Mat, MatTrait, MatTraitConst, Scalar};
use opencv::imgcodecs;

fn array_to_mat<T>(array: &Array2<T>, typ: i32) -> Result<Mat, MmError>
where
    T: opencv::prelude::DataType + Copy,
{
    let (rows, cols) = array.dim();
    let (Ok(rows), Ok(cols)) = (i32::try_from(rows), i32::try_from(cols)) else {
        return Err(MmError::InvalidParams(format!(
            "array of {rows}x{cols} is too large for a Mat"
        )));
    };
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, typ, Scalar::all(0.0))?;
    for ((y, x), &v) in array.indexed_iter() {
        *mat.at_2d_mut::<T>(y as i32, x as i32)? = v;
    }
    Ok(mat)
}

/// A single channel `Mat` of the plane's pixel type (`CV_8S` or `CV_16S`).
///
/// ```no_run
/// # use mmdata::{prelude::*, utils::plane_to_mat};
/// # fn f<B: Backend>(session: &Session<B>) -> Result<(), MmError> {
/// let (_, mut reader) = session.read("tests/data/LC26GFP_1.tf8")?;
/// let mat = plane_to_mat(&reader.read(PlaneIndex::default(), false)?)?;
/// # Ok(())}
/// ```
pub fn plane_to_mat(plane: &Plane) -> Result<Mat, MmError> {
    match plane {
        Plane::Int8(a) => array_to_mat(a, core::CV_8SC1),
        Plane::Int16(a) => array_to_mat(a, core::CV_16SC1),
    }
}

/// A `CV_64F` single channel `Mat` of a stitched mosaic.
pub fn mosaic_to_mat(mosaic: &Array2<f64>) -> Result<Mat, MmError> {
    array_to_mat(mosaic, core::CV_64FC1)
}

/// Safe wrapper around OpenCV's `imwrite`
///
/// The mosaic is saved as 16 bit unsigned, values outside of `0..=65535` saturate.
///
/// # Errors
/// Returns `MmError::InvalidPathEncoding` if the path contains invalid Unicode characters.
///
/// Returns `MmError::OpenCvError` if OpenCV can not encode or write the file.
pub fn imwrite_mosaic<P: AsRef<std::path::Path>>(
    path: P,
    mosaic: &Array2<f64>,
) -> Result<bool, MmError> {
    let path = path.as_ref();
    let path_str = path
        .to_str()
        .ok_or_else(|| MmError::InvalidPathEncoding(path.to_path_buf()))?;
    let mut mat = Mat::default();
    mosaic_to_mat(mosaic)?.convert_to(&mut mat, core::CV_16UC1, 1.0, 0.0)?;
    let params = core::Vector::<i32>::new();
    Ok(imgcodecs::imwrite(path_str, &mat, &params)?)
}
