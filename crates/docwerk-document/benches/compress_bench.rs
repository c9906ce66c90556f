// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the recompression hot path: downsampling plus JPEG
// encoding of a single embedded image at a mid and a top level.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, RgbImage};

use docwerk_core::CompressionLevel;
use docwerk_document::ImageProcessor;
use docwerk_document::pdf::LevelProfile;

fn synthetic_photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 251) as u8, (y % 241) as u8, ((x ^ y) % 239) as u8])
    }))
}

/// Re-encode a 2400x1800 image the way levels 6 and 9 do.
fn bench_image_reencode(c: &mut Criterion) {
    let source = synthetic_photo(2400, 1800);

    for n in [6u8, 9] {
        let Ok(level) = CompressionLevel::new(n) else {
            continue;
        };
        let profile = LevelProfile::for_level(level);
        c.bench_function(&format!("reencode level {n} (2400x1800)"), |b| {
            b.iter(|| {
                let mut processor = ImageProcessor::from_dynamic(black_box(source.clone()));
                if let Some(max_side) = profile.resize_above {
                    processor = processor.fit_within(max_side);
                }
                let jpeg = processor.to_jpeg(profile.jpeg_options());
                black_box(jpeg.map(|j| j.data.len()).unwrap_or(0));
            });
        });
    }
}

criterion_group!(benches, bench_image_reencode);
criterion_main!(benches);
