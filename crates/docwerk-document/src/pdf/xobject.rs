// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image XObject discovery and pixel decoding on top of `lopdf`.

use std::collections::BTreeSet;

use docwerk_core::error::{DocwerkError, Result};
use image::GrayImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::image::ImageProcessor;

/// Maximum `/Parent` hops when looking for inherited page resources.
const MAX_TREE_DEPTH: usize = 64;

// -- Discovery ----------------------------------------------------------------

/// Every image XObject reachable from a page, including images nested in
/// form XObjects. Soft masks are excluded; they travel with their image.
pub fn collect_page_images(doc: &Document) -> BTreeSet<ObjectId> {
    let mut images = BTreeSet::new();
    let mut forms = BTreeSet::new();

    for page_id in doc.get_pages().into_values() {
        if let Some(resources) = page_resources(doc, page_id) {
            collect_from_resources(doc, resources, &mut images, &mut forms);
        }
    }

    let masks: Vec<ObjectId> = images
        .iter()
        .filter_map(|id| doc.get_object(*id).ok()?.as_stream().ok())
        .filter_map(|stream| stream.dict.get(b"SMask").ok()?.as_reference().ok())
        .collect();
    for mask in masks {
        images.remove(&mask);
    }
    images
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn collect_from_resources(
    doc: &Document,
    resources: &Dictionary,
    images: &mut BTreeSet<ObjectId>,
    forms: &mut BTreeSet<ObjectId>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
    else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else {
            continue;
        };
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            continue;
        };
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => {
                images.insert(id);
            }
            Ok(b"Form") if forms.insert(id) => {
                if let Some(nested) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|obj| resolve_dict(doc, obj))
                {
                    collect_from_resources(doc, nested, images, forms);
                }
            }
            _ => {}
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

// -- Stream inspection --------------------------------------------------------

/// Filter chain of a stream, outermost first. Empty when unfiltered.
pub fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn is_flate_or_plain(filters: &[Vec<u8>]) -> bool {
    filters.is_empty() || (filters.len() == 1 && filters[0] == b"FlateDecode")
}

pub fn is_dct(filters: &[Vec<u8>]) -> bool {
    filters.len() == 1 && filters[0] == b"DCTDecode"
}

/// Components per pixel of an image colour space, `None` when unsupported
/// (indexed, separation, pattern, ...).
pub fn color_channels(doc: &Document, dict: &Dictionary) -> Option<u8> {
    let space = resolve(doc, dict.get(b"ColorSpace").ok()?)?;
    match space {
        Object::Name(name) => channels_for_family(name),
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            if family == b"ICCBased" {
                let profile = resolve(doc, items.get(1)?)?.as_stream().ok()?;
                let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
                matches!(n, 1 | 3 | 4).then_some(n as u8)
            } else {
                channels_for_family(family)
            }
        }
        _ => None,
    }
}

fn channels_for_family(name: &[u8]) -> Option<u8> {
    match name {
        b"DeviceGray" | b"CalGray" => Some(1),
        b"DeviceRGB" | b"CalRGB" => Some(3),
        b"DeviceCMYK" => Some(4),
        _ => None,
    }
}

/// Positive `/Width` and `/Height` of an image dictionary.
pub fn dimensions(dict: &Dictionary) -> Result<(u32, u32)> {
    let read = |key: &[u8]| -> Result<u32> {
        dict.get(key)
            .and_then(Object::as_i64)
            .ok()
            .filter(|v| *v > 0 && *v <= u32::MAX as i64)
            .map(|v| v as u32)
            .ok_or_else(|| {
                DocwerkError::PdfError(format!(
                    "image has no valid /{}",
                    String::from_utf8_lossy(key)
                ))
            })
    };
    Ok((read(b"Width")?, read(b"Height")?))
}

pub fn bits_per_component(dict: &Dictionary) -> Option<i64> {
    dict.get(b"BitsPerComponent").and_then(Object::as_i64).ok()
}

pub fn is_image_mask(dict: &Dictionary) -> bool {
    matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)))
}

// -- Decoding -----------------------------------------------------------------

/// Raw 8-bit samples of an unfiltered or Flate image stream.
pub fn raw_samples(stream: &Stream) -> Result<Vec<u8>> {
    if filter_names(&stream.dict).is_empty() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|err| DocwerkError::PdfError(format!("cannot inflate image data: {err}")))
}

/// Decode an image stream into an [`ImageProcessor`].
pub fn decode_image(doc: &Document, stream: &Stream) -> Result<ImageProcessor> {
    let filters = filter_names(&stream.dict);
    let (width, height) = dimensions(&stream.dict)?;

    if is_dct(&filters) {
        if color_channels(doc, &stream.dict) == Some(4) {
            return Err(DocwerkError::ImageError("CMYK JPEG left as is".into()));
        }
        return ImageProcessor::from_bytes(&stream.content);
    }

    if !is_flate_or_plain(&filters) {
        let names: Vec<String> = filters
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        return Err(DocwerkError::ImageError(format!(
            "unsupported image filter {}",
            names.join("+")
        )));
    }

    if bits_per_component(&stream.dict) != Some(8) {
        return Err(DocwerkError::ImageError(
            "only 8-bit image samples are decoded".into(),
        ));
    }
    let channels = color_channels(doc, &stream.dict)
        .ok_or_else(|| DocwerkError::ImageError("unsupported colour space".into()))?;
    ImageProcessor::from_samples(width, height, channels, raw_samples(stream)?)
}

/// Decode a `/SMask` soft mask into a single-channel image.
pub fn decode_mask(doc: &Document, mask_id: ObjectId) -> Result<GrayImage> {
    let stream = doc
        .get_object(mask_id)
        .and_then(Object::as_stream)
        .map_err(|err| DocwerkError::PdfError(format!("soft mask unreadable: {err}")))?;
    let filters = filter_names(&stream.dict);
    let (width, height) = dimensions(&stream.dict)?;

    if is_dct(&filters) {
        return Ok(ImageProcessor::from_bytes(&stream.content)?
            .into_dynamic()
            .to_luma8());
    }
    if !is_flate_or_plain(&filters) || bits_per_component(&stream.dict) != Some(8) {
        return Err(DocwerkError::ImageError("unsupported soft mask encoding".into()));
    }
    let mut samples = raw_samples(stream)?;
    let expected = width as usize * height as usize;
    if samples.len() < expected {
        return Err(DocwerkError::ImageError("soft mask data is truncated".into()));
    }
    samples.truncate(expected);
    GrayImage::from_raw(width, height, samples)
        .ok_or_else(|| DocwerkError::ImageError("soft mask does not fit dimensions".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn filter_chain_from_name_or_array() {
        let single = dictionary! { "Filter" => "FlateDecode" };
        assert_eq!(filter_names(&single), vec![b"FlateDecode".to_vec()]);

        let chain = dictionary! {
            "Filter" => vec![Object::Name(b"ASCII85Decode".to_vec()), Object::Name(b"FlateDecode".to_vec())],
        };
        assert_eq!(filter_names(&chain).len(), 2);
        assert!(filter_names(&Dictionary::new()).is_empty());
    }

    #[test]
    fn channels_for_device_spaces() {
        let doc = Document::with_version("1.5");
        let rgb = dictionary! { "ColorSpace" => "DeviceRGB" };
        let gray = dictionary! { "ColorSpace" => "DeviceGray" };
        let indexed = dictionary! {
            "ColorSpace" => vec![Object::Name(b"Indexed".to_vec())],
        };
        assert_eq!(color_channels(&doc, &rgb), Some(3));
        assert_eq!(color_channels(&doc, &gray), Some(1));
        assert_eq!(color_channels(&doc, &indexed), None);
    }

    #[test]
    fn icc_based_uses_component_count() {
        let mut doc = Document::with_version("1.5");
        let icc = doc.add_object(Stream::new(dictionary! { "N" => 3 }, Vec::new()));
        let dict = dictionary! {
            "ColorSpace" => vec![Object::Name(b"ICCBased".to_vec()), Object::Reference(icc)],
        };
        assert_eq!(color_channels(&doc, &dict), Some(3));
    }

    #[test]
    fn raw_rgb_image_decodes() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![10; 12],
        );
        let processor = decode_image(&doc, &stream).expect("decode");
        assert_eq!((processor.width(), processor.height()), (2, 2));
    }

    #[test]
    fn unsupported_filter_is_reported() {
        let doc = Document::with_version("1.5");
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "Filter" => "JBIG2Decode",
            },
            vec![0; 4],
        );
        let err = decode_image(&doc, &stream).err().expect("should fail");
        assert!(err.to_string().contains("JBIG2Decode"));
    }
}
