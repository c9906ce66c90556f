// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Leveled, best-effort PDF recompression.
//
// Images are re-encoded per the level table, the container is written with the
// level's save policy into a temporary file next to the original, and the
// original is replaced only when the result is strictly smaller. Failures of
// any kind leave the original file untouched.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use docwerk_core::error::{DocwerkError, Result};
use docwerk_core::{CompressionLevel, CompressionSettings};
use lopdf::xref::XrefType;
use lopdf::{Document, Object, ObjectId, Stream};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::fingerprint;
use super::policy::{ImageScope, LevelProfile, ObjectIndex, SavePolicy, StreamDecode};
use super::xobject;

/// What one compression pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompressionReport {
    pub level: u8,
    pub original_size: u64,
    /// Size on disk afterwards; equals `original_size` unless replaced.
    pub final_size: u64,
    pub images_found: usize,
    pub images_recompressed: usize,
    pub images_skipped: usize,
    pub streams_recompressed: usize,
    /// Soft masks deleted after their image was flattened.
    pub masks_removed: usize,
    pub replaced: bool,
    /// Per-image and per-stream problems that did not stop the pass.
    pub warnings: Vec<String>,
}

impl CompressionReport {
    /// Size reduction in percent, 0 when nothing was replaced.
    pub fn reduction_percent(&self) -> f64 {
        if !self.replaced || self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.final_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Recompresses PDFs in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfCompressor;

impl PdfCompressor {
    pub fn new() -> Self {
        Self
    }

    /// Compress `pdf_path` if `settings` enable it.
    ///
    /// Returns `true` only when the file was made smaller and replaced. Every
    /// error is logged and reported as `false`.
    #[instrument(skip_all, fields(path = %pdf_path.display(), level = settings.level.get()))]
    pub fn compress(&self, pdf_path: &Path, settings: &CompressionSettings) -> bool {
        if !settings.enabled {
            return false;
        }
        match self.compress_with_report(pdf_path, settings.level) {
            Ok(report) => {
                for warning in &report.warnings {
                    debug!(warning = %warning, "Compression warning");
                }
                report.replaced
            }
            Err(err) => {
                warn!(error = %err, "Compression failed, original kept");
                false
            }
        }
    }

    /// Run one pass at `level` and describe what happened.
    #[instrument(skip_all, fields(path = %pdf_path.display(), level = level.get()))]
    pub fn compress_with_report(
        &self,
        pdf_path: &Path,
        level: CompressionLevel,
    ) -> Result<CompressionReport> {
        let original_size = std::fs::metadata(pdf_path)?.len();
        let mut doc = Document::load(pdf_path).map_err(|err| {
            DocwerkError::PdfError(format!("failed to open {}: {err}", pdf_path.display()))
        })?;
        let profile = LevelProfile::for_level(level);

        let mut report = CompressionReport {
            level: level.get(),
            original_size,
            final_size: original_size,
            ..CompressionReport::default()
        };

        let images = xobject::collect_page_images(&doc);
        report.images_found = images.len();
        if profile.scope != ImageScope::None {
            recompress_images(&mut doc, &images, &profile, &mut report);
        } else {
            report.images_skipped = images.len();
        }

        let bytes = render_with_policy(&mut doc, &profile.save, &images, &mut report)?;
        let written = replace_if_smaller(pdf_path, &bytes, original_size)?;
        if let Some(size) = written {
            report.final_size = size;
            report.replaced = true;
        }

        info!(
            original = report.original_size,
            final_size = report.final_size,
            images = report.images_recompressed,
            replaced = report.replaced,
            "Compression pass finished"
        );
        Ok(report)
    }
}

// -- Images -------------------------------------------------------------------

fn recompress_images(
    doc: &mut Document,
    images: &BTreeSet<ObjectId>,
    profile: &LevelProfile,
    report: &mut CompressionReport,
) {
    let mut dropped_masks = BTreeSet::new();
    for &id in images {
        match reencode_image(doc, id, profile) {
            Ok(Some(stream)) => {
                let old_mask = doc
                    .get_object(id)
                    .and_then(Object::as_stream)
                    .and_then(|old| old.dict.get(b"SMask"))
                    .and_then(Object::as_reference)
                    .ok();
                if let Some(mask) = old_mask
                    && !stream.dict.has(b"SMask")
                {
                    dropped_masks.insert(mask);
                }
                doc.objects.insert(id, Object::Stream(stream));
                report.images_recompressed += 1;
            }
            Ok(None) => report.images_skipped += 1,
            Err(err) => {
                warn!(object = id.0, error = %err, "Image left untouched");
                report.warnings.push(format!("image {} {}: {err}", id.0, id.1));
                report.images_skipped += 1;
            }
        }
    }
    report.masks_removed = remove_orphaned_masks(doc, &dropped_masks);
}

/// Delete soft masks no image refers to any more. Returns how many went.
fn remove_orphaned_masks(doc: &mut Document, candidates: &BTreeSet<ObjectId>) -> usize {
    if candidates.is_empty() {
        return 0;
    }
    let still_used: BTreeSet<ObjectId> = doc
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter_map(|stream| stream.dict.get(b"SMask").and_then(Object::as_reference).ok())
        .collect();

    let mut removed = 0;
    for mask in candidates.difference(&still_used) {
        if doc.objects.remove(mask).is_some() {
            debug!(object = mask.0, "Orphaned soft mask removed");
            removed += 1;
        }
    }
    removed
}

/// Produce a replacement stream for one image, or `None` to keep it.
fn reencode_image(
    doc: &Document,
    id: ObjectId,
    profile: &LevelProfile,
) -> Result<Option<Stream>> {
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(|err| DocwerkError::PdfError(format!("image object unreadable: {err}")))?;
    let filters = xobject::filter_names(&stream.dict);

    if profile.scope == ImageScope::LosslessSources && !xobject::is_flate_or_plain(&filters) {
        return Ok(None);
    }
    if xobject::is_image_mask(&stream.dict) {
        return Ok(None);
    }

    let mut processor = xobject::decode_image(doc, stream)?;
    let mask_id = stream.dict.get(b"SMask").and_then(Object::as_reference).ok();

    if let Some(mask_id) = mask_id {
        if !profile.flattens_alpha() {
            return lossless_reencode(stream, &filters);
        }
        let mask = xobject::decode_mask(doc, mask_id)?;
        processor = processor.with_alpha(&mask)?.flatten_on_white();
    }

    if let Some(max_side) = profile.resize_above {
        processor = processor.fit_within(max_side);
    }
    let jpeg = processor.to_jpeg(profile.jpeg_options())?;

    if !profile.replaces_unconditionally() && jpeg.data.len() >= stream.content.len() {
        return Ok(None);
    }

    let mut dict = stream.dict.clone();
    let stale: [&[u8]; 5] = [b"Filter", b"DecodeParms", b"Decode", b"Length", b"SMask"];
    for key in stale {
        dict.remove(key);
    }
    dict.set("Width", jpeg.width as i64);
    dict.set("Height", jpeg.height as i64);
    dict.set("BitsPerComponent", 8);
    dict.set(
        "ColorSpace",
        Object::Name(if jpeg.grayscale {
            b"DeviceGray".to_vec()
        } else {
            b"DeviceRGB".to_vec()
        }),
    );
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    debug!(
        object = id.0,
        before = stream.content.len(),
        after = jpeg.data.len(),
        "Image re-encoded as JPEG"
    );
    Ok(Some(Stream::new(dict, jpeg.data).with_compression(false)))
}

/// Re-deflate an alpha image's samples, keeping its mask. Only kept when smaller.
fn lossless_reencode(stream: &Stream, filters: &[Vec<u8>]) -> Result<Option<Stream>> {
    if !xobject::is_flate_or_plain(filters) {
        return Ok(None);
    }
    let samples = xobject::raw_samples(stream)?;
    let mut dict = stream.dict.clone();
    dict.remove(b"Filter");
    dict.remove(b"DecodeParms");

    let mut candidate = Stream::new(dict, samples);
    let _ = candidate.compress();
    let compressed = xobject::filter_names(&candidate.dict) == [b"FlateDecode".to_vec()];
    if compressed && candidate.content.len() < stream.content.len() {
        Ok(Some(candidate.with_compression(false)))
    } else {
        Ok(None)
    }
}

// -- Container ----------------------------------------------------------------

fn render_with_policy(
    doc: &mut Document,
    policy: &SavePolicy,
    images: &BTreeSet<ObjectId>,
    report: &mut CompressionReport,
) -> Result<Vec<u8>> {
    if policy.decode != StreamDecode::None || policy.recompress_flate {
        report.streams_recompressed = recompress_streams(doc, policy, images);
    }
    if policy.compress_streams {
        doc.compress();
    }

    match policy.object_index {
        ObjectIndex::Classic => {
            doc.reference_table.cross_reference_type = XrefType::CrossReferenceTable;
        }
        ObjectIndex::Generate => {
            doc.reference_table.cross_reference_type = XrefType::CrossReferenceStream;
        }
        ObjectIndex::Preserve => {}
    }

    if policy.canonical_rewrite {
        let pruned = doc.prune_objects();
        doc.renumber_objects();
        raise_version(doc, "1.5");
        debug!(pruned = pruned.len(), "Canonical rewrite");
        fingerprint::stamp_and_render(doc)
    } else {
        fingerprint::render(doc)
    }
}

/// Decode and re-deflate non-image streams the policy allows. Returns the
/// number of streams that got smaller.
fn recompress_streams(
    doc: &mut Document,
    policy: &SavePolicy,
    images: &BTreeSet<ObjectId>,
) -> usize {
    let mut count = 0;
    for (id, object) in doc.objects.iter_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if images.contains(id) || !stream.allows_compression || is_structural(stream) {
            continue;
        }
        if !stream_is_eligible(stream, policy) {
            continue;
        }
        let Ok(plain) = stream.decompressed_content() else {
            continue;
        };

        let mut dict = stream.dict.clone();
        dict.remove(b"Filter");
        dict.remove(b"DecodeParms");
        let mut candidate = Stream::new(dict, plain);
        let _ = candidate.compress();
        if candidate.dict.has(b"Filter") && candidate.content.len() < stream.content.len() {
            *stream = candidate;
            count += 1;
        }
    }
    count
}

fn stream_is_eligible(stream: &Stream, policy: &SavePolicy) -> bool {
    let filters = xobject::filter_names(&stream.dict);
    if filters.is_empty() {
        return false;
    }
    let lossy_or_image = filters.iter().any(|f| {
        matches!(
            f.as_slice(),
            b"DCTDecode" | b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode"
        )
    });
    if lossy_or_image {
        return false;
    }

    let flate_only = filters.len() == 1 && filters[0] == b"FlateDecode";
    if flate_only {
        if stream.dict.has(b"DecodeParms") {
            policy.decode >= StreamDecode::Generalized
        } else {
            policy.recompress_flate
        }
    } else {
        policy.decode >= StreamDecode::Specialized
    }
}

fn is_structural(stream: &Stream) -> bool {
    let kind = stream.dict.get(b"Type").and_then(Object::as_name).ok();
    let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok();
    matches!(kind, Some(b"XRef" | b"ObjStm")) || matches!(subtype, Some(b"Image"))
}

fn raise_version(doc: &mut Document, floor: &str) {
    let current: f32 = doc.version.parse().unwrap_or(0.0);
    let minimum: f32 = floor.parse().unwrap_or(0.0);
    if current < minimum {
        doc.version = floor.to_string();
    }
}

// -- Replacement --------------------------------------------------------------

/// Write `bytes` to a temporary file beside `target` and swap it in when it is
/// smaller than `original_size`. Returns the new size when replaced.
fn replace_if_smaller(target: &Path, bytes: &[u8], original_size: u64) -> Result<Option<u64>> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".docwerk-")
        .suffix(".tmp.pdf")
        .tempfile_in(dir)
        .map_err(|err| DocwerkError::on_write(err, dir))?;
    temp.write_all(bytes)?;
    temp.flush()?;

    let new_size = temp.as_file().metadata()?.len();
    if new_size >= original_size {
        debug!(new_size, original_size, "Result not smaller, discarded");
        return Ok(None);
    }
    temp.persist(target)
        .map_err(|err| DocwerkError::on_write(err.error, target))?;
    Ok(Some(new_size))
}
