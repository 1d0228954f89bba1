// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2021,2025 lacklustr@protonmail.com https://github.com/eadf

use mmdata::backend::{ImageInfo, PlanePosition};
use mmdata::memory::{MemoryBackend, MemoryReader, MemorySeries};
use mmdata::prelude::*;

/// Build a 3x2 grid of tiles, read it back and stitch channel 1 of every time point.
fn main() -> Result<(), MmError> {
    let dir = std::env::temp_dir().join("mmdata-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("grid.tif");
    std::fs::write(&path, b"")?;

    let series = (0..6)
        .map(|s| {
            let (x, y) = ((s % 3) as f64 * 166.4, (s / 3) as f64 * 166.4);
            let info = ImageInfo {
                size_x: 64,
                size_y: 48,
                size_c: 2,
                size_z: 1,
                size_t: 3,
                significant_bits: 12,
                name: format!("Pos{s}"),
                plane_positions: vec![PlanePosition::new(x, y, 0.0); 6],
                physical_size_x: Some(0.65),
                physical_size_y: Some(0.65),
                ..Default::default()
            };
            let pixel = move |i: PlaneIndex, y: usize, x: usize| {
                (s * 500 + i.c * 100 + i.t * 10 + (x + y) % 10) as i16
            };
            MemorySeries::from_fn(info, pixel)
        })
        .collect();
    let file = MemoryReader::new("OME-TIFF", series);
    let session = Session::new(MemoryBackend::default().with_file(&path, file))?;

    let now = std::time::Instant::now();
    let (md, mut reader) = session.read(&path)?;
    println!("Read {:?} in {:?}", path, now.elapsed());
    println!("{:#?}", md.core);
    for (key, values) in &md.full {
        println!("{key: <24} {values:?}");
    }

    let size_t = md.core.size_t.get(0).copied().unwrap_or(0);
    for t in 0..size_t {
        let now = std::time::Instant::now();
        let mosaic = stitch(&md.core, &mut reader, 1, t, 0)?;
        println!(
            "Stitched t={t} into {:?} in {:?}, max:{}",
            mosaic.dim(),
            now.elapsed(),
            mosaic.iter().copied().fold(f64::MIN, f64::max)
        );
        #[cfg(feature = "opencv")]
        mmdata::utils::imwrite_mosaic(dir.join(format!("mosaic_t{t}.png")), &mosaic)?;
    }
    println!("Same file: {}", session.diff(&path, &path)?);
    Ok(())
}
