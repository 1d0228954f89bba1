// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

//! Per-series structural metadata, consolidated across series.

use crate::backend::{ImageInfo, ImageReader, PlanePosition};
use crate::metadata::{MetadataMap, StatusMap};
use crate::{MmError, PlaneIndex};
use itertools::{Itertools, iproduct};

/// Stage coordinates at which a series was acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StagePosition {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl StagePosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// A position with no coordinates.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// The XY coordinates, when both are known.
    pub fn xy(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

/// Physical size of a voxel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoxelSize {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

/// A field either shared by every series or given per series.
#[derive(Debug, Clone, PartialEq)]
pub enum Consolidated<T> {
    Uniform(T),
    PerSeries(Vec<T>),
}

impl<T: PartialEq> Consolidated<T> {
    /// `Uniform` when every value is equal, `PerSeries` otherwise (including when empty).
    pub fn from_series(values: Vec<T>) -> Self {
        if !values.iter().all_equal() {
            return Consolidated::PerSeries(values);
        }
        match values.into_iter().next() {
            Some(first) => Consolidated::Uniform(first),
            None => Consolidated::PerSeries(Vec::new()),
        }
    }
}

impl<T> Consolidated<T> {
    /// The value for `series`.
    pub fn get(&self, series: usize) -> Option<&T> {
        match self {
            Consolidated::Uniform(v) => Some(v),
            Consolidated::PerSeries(values) => values.get(series),
        }
    }

    /// One element when uniform, one per series otherwise.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Consolidated::Uniform(v) => std::slice::from_ref(v),
            Consolidated::PerSeries(values) => values,
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, Consolidated::Uniform(_))
    }
}

/// Structural metadata of every series in a file.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreMetadata {
    /// Number of series.
    pub size_s: usize,
    pub file_format: String,
    pub size_x: Consolidated<usize>,
    pub size_y: Consolidated<usize>,
    pub size_c: Consolidated<usize>,
    pub size_z: Consolidated<usize>,
    pub size_t: Consolidated<usize>,
    pub bits: Consolidated<u32>,
    pub name: Consolidated<String>,
    pub date: Consolidated<Option<String>>,
    pub stage_position: Consolidated<StagePosition>,
    pub voxel_size: Consolidated<VoxelSize>,
    /// Series whose planes report more than one stage position.
    /// Their `stage_position` is unknown.
    pub ambiguous_series: Vec<usize>,
}

impl CoreMetadata {
    /// Read the core metadata of every series of `reader`.
    pub fn from_reader<R: ImageReader + ?Sized>(reader: &R) -> Result<Self, MmError> {
        let infos = (0..reader.series_count())
            .map(|s| reader.image_info(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_infos(reader.format(), &infos))
    }

    /// Consolidate per-series [`ImageInfo`].
    pub fn from_infos(file_format: String, infos: &[ImageInfo]) -> Self {
        let mut ambiguous_series = Vec::new();
        let stage_position: Vec<StagePosition> = infos
            .iter()
            .enumerate()
            .map(|(series, info)| match series_position(&info.plane_positions) {
                SeriesPosition::Single(p) => p,
                SeriesPosition::Incomplete => StagePosition::unknown(),
                SeriesPosition::Multiple => {
                    log::warn!("series {series}: multiple stage positions within a series");
                    ambiguous_series.push(series);
                    StagePosition::unknown()
                }
            })
            .collect();
        let field = |f: fn(&ImageInfo) -> usize| infos.iter().map(f).collect::<Vec<_>>();

        Self {
            size_s: infos.len(),
            file_format,
            size_x: Consolidated::from_series(field(|i| i.size_x)),
            size_y: Consolidated::from_series(field(|i| i.size_y)),
            size_c: Consolidated::from_series(field(|i| i.size_c)),
            size_z: Consolidated::from_series(field(|i| i.size_z)),
            size_t: Consolidated::from_series(field(|i| i.size_t)),
            bits: Consolidated::from_series(infos.iter().map(|i| i.significant_bits).collect()),
            name: Consolidated::from_series(infos.iter().map(|i| i.name.clone()).collect()),
            date: Consolidated::from_series(
                infos.iter().map(|i| i.acquisition_date.clone()).collect(),
            ),
            stage_position: Consolidated::from_series(stage_position),
            voxel_size: Consolidated::from_series(
                infos
                    .iter()
                    .map(|i| VoxelSize {
                        x: i.physical_size_x.and_then(round_physical_size),
                        y: i.physical_size_y.and_then(round_physical_size),
                        z: i.physical_size_z.and_then(round_physical_size),
                    })
                    .collect(),
            ),
            ambiguous_series,
        }
    }

    /// Every plane of every series, in `(series, t, c, z)` order.
    pub fn plane_indices(&self) -> impl Iterator<Item = PlaneIndex> + '_ {
        (0..self.size_s).flat_map(move |series| {
            let size = |field: &Consolidated<usize>| field.get(series).copied().unwrap_or(0);
            let size_t = size(&self.size_t);
            let size_c = size(&self.size_c);
            let size_z = size(&self.size_z);
            iproduct!(0..size_t, 0..size_c, 0..size_z)
                .map(move |(t, c, z)| PlaneIndex::new(series, z, c, t))
        })
    }
}

enum SeriesPosition {
    Single(StagePosition),
    /// No planes, or a plane lacking a coordinate.
    Incomplete,
    Multiple,
}

fn series_position(planes: &[PlanePosition]) -> SeriesPosition {
    let mut found: Option<StagePosition> = None;
    let mut multiple = false;
    for plane in planes {
        let (Some(x), Some(y), Some(z)) = (plane.x, plane.y, plane.z) else {
            return SeriesPosition::Incomplete;
        };
        let p = StagePosition::new(x, y, z);
        match found {
            None => found = Some(p),
            Some(first) if first != p => multiple = true,
            Some(_) => {}
        }
    }
    match found {
        _ if multiple => SeriesPosition::Multiple,
        Some(p) => SeriesPosition::Single(p),
        None => SeriesPosition::Incomplete,
    }
}

/// Round to 6 decimals; `None` for non-finite sizes.
fn round_physical_size(value: f64) -> Option<f64> {
    value.is_finite().then(|| (value * 1e6).round() / 1e6)
}

/// Everything known about a file's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub core: CoreMetadata,
    /// Every metadata getter's grouped values, keyed by field name.
    pub full: MetadataMap,
    /// Probe status of every metadata getter.
    pub status: StatusMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(size_x: usize, size_z: usize, positions: &[(f64, f64, f64)]) -> ImageInfo {
        ImageInfo {
            size_x,
            size_y: 256,
            size_c: 3,
            size_z,
            size_t: 4,
            significant_bits: 12,
            name: "tile".into(),
            acquisition_date: None,
            plane_positions: positions
                .iter()
                .map(|&(x, y, z)| PlanePosition::new(x, y, z))
                .collect(),
            physical_size_x: Some(0.133_333_333),
            physical_size_y: Some(0.133_333_333),
            physical_size_z: None,
        }
    }

    #[test]
    fn equal_fields_collapse_and_differing_fields_stay_per_series() {
        let infos = [
            info(512, 1, &[(1.0, 2.0, 0.0)]),
            info(512, 5, &[(3.0, 2.0, 0.0)]),
            info(512, 1, &[(1.0, 4.0, 0.0)]),
        ];
        let core = CoreMetadata::from_infos("OME-TIFF".into(), &infos);
        assert_eq!(core.size_s, 3);
        assert_eq!(core.size_x.as_slice(), &[512]);
        assert_eq!(core.size_z.as_slice(), &[1, 5, 1]);
        assert_eq!(core.bits, Consolidated::Uniform(12));
        assert_eq!(core.date, Consolidated::Uniform(None));
        assert_eq!(core.stage_position.as_slice().len(), 3);
        let second = StagePosition::new(3.0, 2.0, 0.0);
        assert_eq!(core.stage_position.get(1), Some(&second));
        let voxel = VoxelSize {
            x: Some(0.133333),
            y: Some(0.133333),
            z: None,
        };
        assert_eq!(core.voxel_size, Consolidated::Uniform(voxel));
        assert!(core.ambiguous_series.is_empty());
    }

    #[test]
    fn a_series_with_two_positions_is_flagged() {
        let infos = [
            info(512, 2, &[(1.0, 2.0, 0.0), (1.0, 2.0, 0.0)]),
            info(512, 2, &[(1.0, 2.0, 0.0), (1.5, 2.0, 0.0)]),
        ];
        let core = CoreMetadata::from_infos("OME-TIFF".into(), &infos);
        assert_eq!(core.ambiguous_series, vec![1]);
        let first = StagePosition::new(1.0, 2.0, 0.0);
        assert_eq!(
            core.stage_position,
            Consolidated::PerSeries(vec![first, StagePosition::unknown()])
        );
    }

    #[test]
    fn missing_coordinates_give_an_unknown_position() {
        let mut partial = info(64, 1, &[(1.0, 0.0, 0.0)]);
        partial.plane_positions[0].y = None;
        let core = CoreMetadata::from_infos("TIFF".into(), &[partial, info(64, 1, &[])]);
        let unknown = StagePosition::unknown();
        assert_eq!(core.stage_position, Consolidated::Uniform(unknown));
        assert_eq!(core.stage_position.get(7).and_then(|p| p.xy()), None);
    }

    #[test]
    fn plane_indices_follow_each_series_geometry() {
        let mut small = info(8, 1, &[]);
        small.size_c = 1;
        small.size_t = 2;
        let core = CoreMetadata::from_infos("TIFF".into(), &[small, info(8, 2, &[])]);
        let indices: Vec<_> = core.plane_indices().collect();
        assert_eq!(indices.len(), 2 + 2 * 3 * 4);
        assert_eq!(indices[0], PlaneIndex::new(0, 0, 0, 0));
        assert_eq!(indices[1], PlaneIndex::new(0, 0, 0, 1));
        assert_eq!(indices[2], PlaneIndex::new(1, 0, 0, 0));
        assert_eq!(indices[3], PlaneIndex::new(1, 1, 0, 0));
        assert_eq!(indices[4], PlaneIndex::new(1, 0, 1, 0));
        assert_eq!(indices.last(), Some(&PlaneIndex::new(1, 1, 2, 3)));
    }

    #[test]
    fn consolidation_of_empty_and_single_lists() {
        let empty = Consolidated::<u8>::from_series(vec![]);
        assert_eq!(empty, Consolidated::PerSeries(vec![]));
        let single = Consolidated::from_series(vec!["a"]);
        assert_eq!(single, Consolidated::Uniform("a"));
        assert!(!Consolidated::from_series(vec![1, 2]).is_uniform());
    }
}
