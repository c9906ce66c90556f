// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-level recompression tables: which images are touched, how they are
// re-encoded, and how the container is written back.

use docwerk_core::CompressionLevel;

use crate::image::JpegOptions;

/// Which image XObjects a level may recompress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScope {
    None,
    /// Only unfiltered or `/FlateDecode` images.
    LosslessSources,
    All,
}

/// How far non-image streams may be decoded for re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamDecode {
    None,
    /// Legacy filters (LZW, ASCII85, ...) rewritten as Flate.
    Specialized,
    /// Additionally Flate streams carrying predictor parameters.
    Generalized,
}

/// Cross-reference layout of the written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectIndex {
    /// Plain `xref` table.
    Classic,
    /// Whatever the input used.
    Preserve,
    /// Compact cross-reference stream.
    Generate,
}

/// Container save options for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    pub compress_streams: bool,
    pub decode: StreamDecode,
    pub object_index: ObjectIndex,
    pub recompress_flate: bool,
    /// Prune unreachable objects, renumber, stamp a content-derived `/ID`,
    /// and raise the header version to at least 1.5.
    pub canonical_rewrite: bool,
}

/// Everything the compressor needs to know about one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProfile {
    pub level: CompressionLevel,
    pub jpeg_quality: u8,
    /// Longest allowed side in pixels; `None` keeps dimensions.
    pub resize_above: Option<u32>,
    pub optimize_huffman: bool,
    pub progressive: bool,
    pub scope: ImageScope,
    pub save: SavePolicy,
}

impl LevelProfile {
    pub fn for_level(level: CompressionLevel) -> Self {
        let n = level.get();
        let jpeg_quality = match n {
            1 => 100,
            2 => 95,
            3 => 90,
            4 => 85,
            5 => 80,
            6 => 75,
            7 => 65,
            8 => 55,
            _ => 45,
        };
        let resize_above = match n {
            5 => Some(2000),
            6 => Some(1600),
            7 => Some(1400),
            8 => Some(1200),
            9 => Some(1000),
            _ => None,
        };
        let scope = match n {
            1 => ImageScope::None,
            2 => ImageScope::LosslessSources,
            _ => ImageScope::All,
        };

        Self {
            level,
            jpeg_quality,
            resize_above,
            optimize_huffman: n >= 3,
            progressive: n >= 5,
            scope,
            save: SavePolicy::for_level(level),
        }
    }

    pub fn jpeg_options(&self) -> JpegOptions {
        JpegOptions {
            quality: self.jpeg_quality,
            progressive: self.progressive,
            optimize_huffman: self.optimize_huffman,
        }
    }

    /// Alpha images are flattened to JPEG from level 5; below that they are
    /// re-deflated losslessly with their mask kept.
    pub fn flattens_alpha(&self) -> bool {
        self.level.get() >= 5
    }

    /// From level 3 a re-encoded image replaces the original even when larger.
    pub fn replaces_unconditionally(&self) -> bool {
        self.level.get() >= 3
    }
}

impl SavePolicy {
    pub fn for_level(level: CompressionLevel) -> Self {
        match level.get() {
            1 => Self {
                compress_streams: false,
                decode: StreamDecode::None,
                object_index: ObjectIndex::Classic,
                recompress_flate: false,
                canonical_rewrite: false,
            },
            2 => Self {
                compress_streams: true,
                decode: StreamDecode::Specialized,
                object_index: ObjectIndex::Preserve,
                recompress_flate: false,
                canonical_rewrite: false,
            },
            3 | 4 => Self {
                compress_streams: true,
                decode: StreamDecode::Specialized,
                object_index: ObjectIndex::Generate,
                recompress_flate: false,
                canonical_rewrite: false,
            },
            5 | 6 => Self {
                compress_streams: true,
                decode: StreamDecode::Generalized,
                object_index: ObjectIndex::Generate,
                recompress_flate: true,
                canonical_rewrite: false,
            },
            _ => Self {
                compress_streams: true,
                decode: StreamDecode::Generalized,
                object_index: ObjectIndex::Generate,
                recompress_flate: true,
                canonical_rewrite: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles() -> Vec<LevelProfile> {
        CompressionLevel::all().map(LevelProfile::for_level).collect()
    }

    #[test]
    fn quality_never_increases_with_level() {
        let profiles = profiles();
        for pair in profiles.windows(2) {
            assert!(pair[1].jpeg_quality <= pair[0].jpeg_quality);
        }
        assert_eq!(profiles[0].jpeg_quality, 100);
        assert_eq!(profiles[8].jpeg_quality, 45);
    }

    #[test]
    fn resize_threshold_never_increases_with_level() {
        let thresholds: Vec<u32> = profiles()
            .iter()
            .map(|p| p.resize_above.unwrap_or(u32::MAX))
            .collect();
        for pair in thresholds.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert_eq!(thresholds[4], 2000);
        assert_eq!(thresholds[8], 1000);
    }

    #[test]
    fn level_one_touches_nothing() {
        let profile = LevelProfile::for_level(CompressionLevel::new(1).unwrap());
        assert_eq!(profile.scope, ImageScope::None);
        assert!(!profile.save.compress_streams);
        assert_eq!(profile.save.object_index, ObjectIndex::Classic);
    }

    #[test]
    fn encoder_switches_follow_level() {
        let p2 = LevelProfile::for_level(CompressionLevel::new(2).unwrap());
        let p3 = LevelProfile::for_level(CompressionLevel::new(3).unwrap());
        let p5 = LevelProfile::for_level(CompressionLevel::new(5).unwrap());
        assert!(!p2.optimize_huffman && !p2.progressive);
        assert!(p3.optimize_huffman && !p3.progressive);
        assert!(p5.optimize_huffman && p5.progressive);
        assert!(!p3.flattens_alpha() && p5.flattens_alpha());
    }

    #[test]
    fn canonical_rewrite_only_at_top_levels() {
        for profile in profiles() {
            assert_eq!(profile.save.canonical_rewrite, profile.level.get() >= 7);
        }
    }

    #[test]
    fn decode_depth_is_monotonic() {
        let profiles = profiles();
        for pair in profiles.windows(2) {
            assert!(pair[1].save.decode >= pair[0].save.decode);
        }
    }
}
