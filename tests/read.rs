// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

use mmdata::backend::{BackendFault, ImageInfo, PlanePosition, RawValue};
use mmdata::memory::{Accessor, MemoryBackend, MemoryReader, MemorySeries};
use mmdata::prelude::*;
use mmdata::{Consolidated, PixelType, StagePosition, Value, diagnostic_log_path};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SIZE_X: usize = 4;
const SIZE_Y: usize = 3;

fn pixel(series: usize, c: usize, t: usize, y: usize, x: usize) -> i16 {
    if (series, c, t, y, x) == (2, 1, 2, 2, 1) {
        return 7779;
    }
    (series * 2000 + c * 500 + t * 100 + y * 10 + x) as i16
}

/// A series of 2 channels and 3 time points acquired at `(x, y)`.
fn tile(series: usize, positions: &[(f64, f64)]) -> MemorySeries {
    let planes = 2 * 3;
    let plane_positions = (0..planes)
        .map(|p| {
            let (x, y) = positions[p % positions.len()];
            PlanePosition::new(x, y, -2.5)
        })
        .collect();
    let info = ImageInfo {
        size_x: SIZE_X,
        size_y: SIZE_Y,
        size_c: 2,
        size_z: 1,
        size_t: 3,
        significant_bits: 16,
        name: format!("tile {series}"),
        acquisition_date: Some("2014-05-26T14:30:12".into()),
        plane_positions,
        physical_size_x: Some(0.133_333_33),
        physical_size_y: Some(0.133_333_33),
        physical_size_z: None,
    };
    MemorySeries::from_fn(info, |i, y, x| pixel(series, i.c, i.t, y, x))
}

/// One single-position series per entry of `positions`.
fn tile_series(positions: &[(f64, f64)]) -> Vec<MemorySeries> {
    positions
        .iter()
        .enumerate()
        .map(|(s, &p)| tile(s, &[p]))
        .collect()
}

fn tiles(positions: &[(f64, f64)]) -> MemoryReader {
    MemoryReader::new("OME-TIFF", tile_series(positions))
}

struct Fixture {
    dir: TempDir,
    backend: MemoryBackend,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            backend: MemoryBackend::default(),
        }
    }

    fn add(mut self, name: &str, file: MemoryReader) -> Self {
        let path = self.path(name);
        std::fs::write(&path, b"").unwrap();
        self.backend = self.backend.with_file(&path, file);
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn session(self) -> (TempDir, Session<MemoryBackend>) {
        (self.dir, Session::new(self.backend).unwrap())
    }
}

const GRID: [(f64, f64); 4] = [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (100.0, 100.0)];

fn t4(dir: &Path) -> PathBuf {
    dir.join("t4_1.tif")
}

#[test]
fn file_not_found() {
    let (_dir, session) = Fixture::new().session();
    let path = Path::new("datafolder").join("pippo.tif");
    let err = session.read(&path).err().unwrap();
    assert!(matches!(err, MmError::NotFound(_)));
    let expected = format!("File not found: {}", path.display());
    assert!(err.to_string().contains(&expected));
}

#[test]
fn core_metadata_and_planes() {
    let (dir, session) = Fixture::new().add("t4_1.tif", tiles(&GRID)).session();
    let (md, mut reader) = session.read(t4(dir.path())).unwrap();

    assert_eq!(md.core.file_format, "OME-TIFF");
    assert_eq!(md.core.size_s, 4);
    assert_eq!(md.core.size_x.as_slice(), &[SIZE_X]);
    assert_eq!(md.core.size_c.as_slice(), &[2]);
    assert_eq!(md.core.size_t.as_slice(), &[3]);
    assert_eq!(md.core.bits.as_slice(), &[16]);
    assert_eq!(md.core.name.as_slice().len(), 4);
    assert_eq!(md.core.voxel_size.as_slice()[0].x, Some(0.133333));
    assert_eq!(
        md.core.stage_position.get(3),
        Some(&StagePosition::new(100.0, 100.0, -2.5))
    );
    assert_eq!(reader.pixel_type(), PixelType::Int16);

    // Y then X
    let plane = reader.read(PlaneIndex::new(2, 0, 1, 2), false).unwrap();
    assert_eq!(plane.shape(), (SIZE_Y, SIZE_X));
    assert_eq!(plane.get(2, 3), Some(pixel(2, 1, 2, 2, 3) as i64));
    let plane = reader.read(PlaneIndex::default().with_t(1), true).unwrap();
    assert_eq!(plane.get(0, 1), Some(pixel(0, 0, 1, 0, 1) as i64));
    assert!(reader.read(PlaneIndex::default().with_c(2), false).is_err());
}

#[test]
fn full_metadata_is_grouped() {
    let unsafe_root = Accessor::faulty(0, BackendFault::new("Unsafe", ""));
    let no_light = BackendFault::new("NullPointerException", "no light source");
    let mut file = tiles(&GRID);
    file.store_mut()
        .insert("getRoot", unsafe_root)
        .insert("getExperimenterEmail", Accessor::new(1).with_none(&[0]))
        .insert(
            "getChannelName",
            Accessor::new(2)
                .with(&[0, 0], "DAPI")
                .with(&[0, 1], "GFP")
                .with(&[1, 0], "DAPI")
                .with(&[1, 1], "GFP"),
        )
        .insert(
            "getLightSourceSettingsWavelength",
            Accessor::faulty(2, no_light),
        );
    let (dir, session) = Fixture::new().add("t4_1.tif", file).session();
    let path = t4(dir.path());
    let (md, _) = session.read(&path).unwrap();

    assert_eq!(md.full["ImageCount"], vec![(vec![], Value::Int(4))]);
    assert_eq!(
        md.full["PixelsSizeX"],
        vec![(vec![3], Value::Int(SIZE_X as i64))]
    );
    let um = |v: f64| Value::Quantity(Box::new(Value::Float(v)), "µm".into());
    assert_eq!(
        md.full["PlanePositionX"],
        vec![
            (vec![0, 5], um(0.0)),
            (vec![1, 5], um(100.0)),
            (vec![2, 5], um(0.0)),
            (vec![3, 5], um(100.0)),
        ]
    );
    assert_eq!(md.full["PlanePositionZ"], vec![(vec![3, 5], um(-2.5))]);
    assert_eq!(
        md.full["ChannelName"],
        vec![
            (vec![1, 0], Value::Str("DAPI".into())),
            (vec![1, 1], Value::Str("GFP".into())),
        ]
    );

    assert_eq!(md.status["getImageCount"], MetadataStatus::Found);
    assert_eq!(md.status["getExperimenterEmail"], MetadataStatus::None);
    assert_eq!(
        md.status["getLightSourceSettingsWavelength"],
        MetadataStatus::Jmiss
    );
    assert!(!md.status.contains_key("getRoot"));

    let log = std::fs::read_to_string(diagnostic_log_path(&path)).unwrap();
    let expected = "(\"getLightSourceSettingsWavelength\", \"NullPointerException\", \
                    \"no light source\", \"--\", 2)\n";
    assert_eq!(log, expected);
}

#[test]
fn diagnostics_can_be_turned_off() {
    let (dir, session) = Fixture::new().add("t4_1.tif", tiles(&GRID)).session();
    let options = ReadOptions {
        diagnostics: false,
        ..Default::default()
    };
    session.read_with(t4(dir.path()), &options).unwrap();
    assert!(!diagnostic_log_path(&t4(dir.path())).exists());
}

#[test]
fn tile_stitch() {
    let (dir, session) = Fixture::new().add("t4_1.tif", tiles(&GRID)).session();
    let (md, mut reader) = session.read(t4(dir.path())).unwrap();

    let mosaic = stitch(&md.core, &mut reader, 0, 0, 0).unwrap();
    assert_eq!(mosaic.dim(), (2 * SIZE_Y, 2 * SIZE_X));
    // Y then X
    let expected = pixel(3, 0, 0, 2, 1) as f64;
    assert_eq!(mosaic[[SIZE_Y + 2, SIZE_X + 1]], expected);
    assert_eq!(mosaic[[1, SIZE_X + 3]], pixel(1, 0, 0, 1, 3) as f64);

    let mosaic = stitch(&md.core, &mut reader, 1, 2, 0).unwrap();
    assert_eq!(mosaic[[SIZE_Y + 2, SIZE_X + 1]], 6721.0);
    assert_eq!(mosaic[[SIZE_Y, 0]], pixel(2, 1, 2, 0, 0) as f64);
}

#[test]
fn void_tile_stitch() {
    let positions = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)];
    let (dir, session) = Fixture::new().add("void.tif", tiles(&positions)).session();
    let (md, mut reader) = session.read(dir.path().join("void.tif")).unwrap();

    for c in 0..2 {
        for t in 0..3 {
            let mosaic = stitch(&md.core, &mut reader, c, t, 0).unwrap();
            let expected = pixel(2, c, t, 1, 2) as f64;
            assert_eq!(mosaic[[SIZE_Y + 1, SIZE_X + 2]], expected);
            // Void tiles are set to 0
            let void = mosaic.slice(ndarray::s![SIZE_Y.., ..SIZE_X]);
            assert!(void.iter().all(|&v| v == 0.0));
        }
    }
    let mosaic = stitch(&md.core, &mut reader, 1, 2, 0).unwrap();
    assert_eq!(mosaic[[SIZE_Y + 2, SIZE_X + 1]], 7779.0);
}

#[test]
fn ambiguous_position_refuses_to_stitch() {
    let mut series = tile_series(&GRID);
    series[1] = tile(1, &[(100.0, 0.0), (101.0, 0.0)]);
    let file = MemoryReader::new("OME-TIFF", series);
    let (dir, session) = Fixture::new().add("moved.tif", file).session();
    let (md, mut reader) = session.read(dir.path().join("moved.tif")).unwrap();

    assert_eq!(md.core.ambiguous_series, vec![1]);
    let unknown = StagePosition::unknown();
    assert_eq!(md.core.stage_position.get(1), Some(&unknown));
    let err = stitch(&md.core, &mut reader, 0, 0, 0).err().unwrap();
    assert!(matches!(err, MmError::AmbiguousPosition { series: 1 }));
}

#[test]
fn unsupported_bit_depth() {
    let mut series = tile(0, &[(0.0, 0.0)]);
    series.info.significant_bits = 32;
    let file = MemoryReader::new("OME-TIFF", vec![series]);
    let (dir, session) = Fixture::new().add("float.tif", file).session();
    let err = session.read(dir.path().join("float.tif")).err().unwrap();
    assert!(matches!(err, MmError::UnsupportedBitDepth(32)));
}

#[test]
fn diff_of_files() {
    let mut changed = tiles(&GRID);
    let mut other_pixels = tile_series(&GRID);
    other_pixels[3] = MemorySeries::from_fn(other_pixels[3].info.clone(), |_, _, _| 1);
    let email = Accessor::new(1).with(&[0], RawValue::from("a@b.c"));
    changed.store_mut().insert("getExperimenterEmail", email);
    let mut renamed = tile_series(&GRID);
    renamed[0].info.name = "renamed".into();

    let (dir, session) = Fixture::new()
        .add("a.tif", tiles(&GRID))
        .add("b.tif", changed)
        .add("c.tif", MemoryReader::new("OME-TIFF", other_pixels))
        .add("d.tif", MemoryReader::new("OME-TIFF", renamed))
        .session();
    let p = |name: &str| dir.path().join(name);

    assert!(session.diff(p("a.tif"), p("a.tif")).unwrap());
    assert!(session.diff(p("a.tif"), p("b.tif")).unwrap());
    assert!(!session.diff(p("a.tif"), p("c.tif")).unwrap());
    assert!(!session.diff(p("a.tif"), p("d.tif")).unwrap());
}

#[test]
fn consolidation_keeps_differing_fields_per_series() {
    let mut series = tile_series(&GRID);
    series[2].info.acquisition_date = None;
    let (dir, session) = Fixture::new()
        .add("dates.tif", MemoryReader::new("OME-TIFF", series))
        .session();
    let (md, _) = session.read(dir.path().join("dates.tif")).unwrap();
    let date = Some("2014-05-26T14:30:12".to_string());
    assert_eq!(
        md.core.date,
        Consolidated::PerSeries(vec![date.clone(), date.clone(), None, date])
    );
    assert_eq!(md.core.size_y, Consolidated::Uniform(SIZE_Y));
}
