// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! Reassembly of stage-position tiles into one mosaic plane.

use crate::backend::PlaneSource;
use crate::{CoreMetadata, MmError, PlaneIndex};
use ndarray::{Array2, s};
use ordered_float::OrderedFloat;

/// Placement of series on a grid of distinct stage positions.
///
/// Rows follow the distinct Y coordinates and columns the distinct X
/// coordinates, both ascending. A cell is `None` when no series was acquired
/// at its position.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub cells: Array2<Option<usize>>,
}

impl TileMap {
    /// Build the grid from the stage positions in `core`.
    ///
    /// # Errors
    /// - `MmError::AmbiguousPosition` if a series reports more than one position
    /// - `MmError::MissingPosition` if a series has no XY position
    /// - `MmError::StitchGeometry` if two series share a grid cell
    pub fn from_core(core: &CoreMetadata) -> Result<Self, MmError> {
        if let Some(&series) = core.ambiguous_series.first() {
            return Err(MmError::AmbiguousPosition { series });
        }
        let positions = (0..core.size_s)
            .map(|series| {
                core.stage_position
                    .get(series)
                    .and_then(|p| p.xy())
                    .map(|(x, y)| (OrderedFloat(x), OrderedFloat(y)))
                    .ok_or(MmError::MissingPosition { series })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut xs: Vec<_> = positions.iter().map(|p| p.0).collect();
        let mut ys: Vec<_> = positions.iter().map(|p| p.1).collect();
        xs.sort_unstable();
        xs.dedup();
        ys.sort_unstable();
        ys.dedup();

        let mut cells = Array2::from_elem((ys.len(), xs.len()), None);
        for (row, y) in ys.iter().enumerate() {
            for (col, x) in xs.iter().enumerate() {
                let series: Vec<usize> = positions
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.0 == *x && p.1 == *y)
                    .map(|(i, _)| i)
                    .collect();
                match series.as_slice() {
                    [] => {}
                    [only] => cells[[row, col]] = Some(*only),
                    _ => return Err(MmError::StitchGeometry { row, col, series }),
                }
            }
        }
        Ok(Self {
            xs: xs.into_iter().map(|x| x.0).collect(),
            ys: ys.into_iter().map(|y| y.0).collect(),
            cells,
        })
    }

    /// `(rows, columns)`
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }
}

/// Stitch the `(c, t, z)` plane of every series into one mosaic.
///
/// Each series is placed at the grid cell of its stage position (see
/// [`TileMap`]); cells with no series stay zero. All series are assumed to have
/// the frame size of the first one.
///
/// # Returns
/// - `Ok(Array2<f64>)` of `size_y * rows` by `size_x * columns` pixels, indexed `[y, x]`
/// - `Err(MmError)` if the tile map can not be built or a plane can not be read;
///   nothing is returned in that case
///
/// ```no_run
/// # use mmdata::prelude::*;
/// # fn f<B: Backend>(session: &Session<B>) -> Result<(), MmError> {
/// let (md, mut reader) = session.read("tests/data/t4_1.tif")?;
/// let mosaic = stitch(&md.core, &mut reader, 3, 2, 0)?;
/// println!("{}", mosaic[[1236, 1488]]);
/// # Ok(())}
/// ```
pub fn stitch<P>(
    core: &CoreMetadata,
    source: &mut P,
    c: usize,
    t: usize,
    z: usize,
) -> Result<Array2<f64>, MmError>
where
    P: PlaneSource + ?Sized,
{
    let tiles = TileMap::from_core(core)?;
    let (rows, cols) = tiles.dim();
    let (Some(&size_y), Some(&size_x)) = (core.size_y.get(0), core.size_x.get(0)) else {
        return Err(MmError::InvalidParams("no series to stitch".into()));
    };

    let mut mosaic = Array2::<f64>::zeros((size_y * rows, size_x * cols));
    for ((row, col), cell) in tiles.cells.indexed_iter() {
        let Some(series) = *cell else {
            continue;
        };
        let plane = source.read_plane(PlaneIndex { series, z, c, t })?;
        if plane.shape() != (size_y, size_x) {
            return Err(MmError::PlaneShape {
                expected: size_y * size_x,
                found: plane.shape().0 * plane.shape().1,
            });
        }
        mosaic
            .slice_mut(s![
                row * size_y..(row + 1) * size_y,
                col * size_x..(col + 1) * size_x
            ])
            .assign(&plane.to_f64());
    }
    Ok(mosaic)
}
