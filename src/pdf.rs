//! lopdf-backed [`DocumentModel`].
//!
//! Finds image XObjects per page (including those nested in Form XObjects),
//! pulls them out as standalone JPEG/PNG files, swaps in recompressed JPEG
//! streams, and runs the final garbage collection + deflate pass.

use crate::error::ImageError;
use crate::model::{DocumentModel, ExtractedImage, ImageRef, SaveOptions};
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};

/// Image dictionary entries carried over when an image is replaced
const PRESERVED_IMAGE_KEYS: [&[u8]; 6] = [
    b"SMask",
    b"Intent",
    b"Interpolate",
    b"Metadata",
    b"OC",
    b"StructParent",
];

/// Dictionary types whose identity matters, so they are never merged
const IDENTITY_TYPES: [&[u8]; 8] = [
    b"Catalog",
    b"Pages",
    b"Page",
    b"Annot",
    b"Outlines",
    b"StructTreeRoot",
    b"StructElem",
    b"Sig",
];

/// A loaded PDF plus its page order
pub struct PdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn load_mem(bytes: &[u8]) -> Result<Self, lopdf::Error> {
        Document::load_mem(bytes).map(Self::from_document)
    }

    pub fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages().values().copied().collect();
        PdfDocument { doc, pages }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Garbage collection in increasing aggressiveness:
    /// 1 prunes unreachable objects, 2 also renumbers, 3 merges identical
    /// streams first, 4 merges identical plain objects too.
    fn collect_garbage(&mut self, level: u8) {
        if level >= 3 {
            let merged = merge_duplicate_objects(&mut self.doc, level >= 4);
            log::debug!("[Compact] merged {} duplicate objects", merged);
        }
        if level >= 1 {
            let pruned = self.doc.prune_objects();
            log::debug!("[Compact] pruned {} unreachable objects", pruned.len());
        }
        if level >= 2 {
            self.doc.renumber_objects();
        }
        self.pages = self.doc.get_pages().values().copied().collect();
    }
}

impl DocumentModel for PdfDocument {
    type SaveError = lopdf::Error;

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_images(&self, page: usize) -> Vec<ImageRef> {
        match self.pages.get(page) {
            Some(&page_id) => collect_page_images(&self.doc, page_id)
                .into_iter()
                .map(ImageRef::from)
                .collect(),
            None => Vec::new(),
        }
    }

    fn extract_image(&self, image: ImageRef) -> Result<ExtractedImage, ImageError> {
        let stream = match self.doc.get_object(image.into()) {
            Ok(Object::Stream(s)) => s,
            _ => return Err(ImageError::Extract("object is not a stream".to_string())),
        };
        extract_image_from_stream(&self.doc, stream)
    }

    fn replace_image(&mut self, image: ImageRef, jpeg: Vec<u8>) -> Result<(), ImageError> {
        let (width, height, color_space) = probe_jpeg(&jpeg)?;

        let stream = match self.doc.get_object_mut(image.into()) {
            Ok(Object::Stream(s)) => s,
            _ => return Err(ImageError::Replace("object is not a stream".to_string())),
        };

        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Image".to_vec()));
        dict.set("Width", Object::Integer(width as i64));
        dict.set("Height", Object::Integer(height as i64));
        dict.set("ColorSpace", Object::Name(color_space.to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        dict.set("Length", Object::Integer(jpeg.len() as i64));

        for key in PRESERVED_IMAGE_KEYS {
            if let Ok(value) = stream.dict.get(key) {
                dict.set(key.to_vec(), value.clone());
            }
        }
        // Color-key arrays are rejected at extraction, so only mask streams reach here
        if let Ok(Object::Reference(mask_id)) = stream.dict.get(b"Mask") {
            dict.set("Mask", Object::Reference(*mask_id));
        }

        *stream = Stream::new(dict, jpeg);
        Ok(())
    }

    fn save(&mut self, options: &SaveOptions) -> Result<Vec<u8>, lopdf::Error> {
        self.collect_garbage(options.garbage_level);

        if options.deflate {
            self.doc.compress();
        }

        let mut output_bytes = Vec::new();
        if options.garbage_level >= 3 {
            let packed = lopdf::SaveOptions::builder()
                .use_object_streams(true)
                .use_xref_streams(true)
                .compression_level(9)
                .build();
            self.doc.save_with_options(&mut output_bytes, packed)?;
        } else {
            self.doc.save_to(&mut output_bytes)?;
        }
        Ok(output_bytes)
    }
}

fn name_of(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        _ => Some(obj),
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> u32 {
    dict.get(key)
        .ok()
        .and_then(|v| match v {
            Object::Integer(n) if *n > 0 => u32::try_from(*n).ok(),
            _ => None,
        })
        .unwrap_or(0)
}

/// Filter names of a stream, outermost first
fn filter_names(stream: &Stream) -> Vec<String> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).to_string()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(name_of)
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Collect all image object IDs referenced from a page, in resource order
fn collect_page_images(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut images: Vec<ObjectId> = Vec::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();

    let page_dict = match doc.get_object(page_id) {
        Ok(Object::Dictionary(d)) => d,
        _ => return images,
    };

    let resources = get_page_resources(doc, page_dict);

    for obj_id in get_xobjects(doc, resources) {
        collect_images_recursive(doc, obj_id, &mut images, &mut seen);
    }

    images
}

/// Recursively collect images from an object (handles Form XObjects)
fn collect_images_recursive(
    doc: &Document,
    obj_id: ObjectId,
    images: &mut Vec<ObjectId>,
    seen: &mut HashSet<ObjectId>,
) {
    if !seen.insert(obj_id) {
        return;
    }

    let stream = match doc.get_object(obj_id) {
        Ok(Object::Stream(s)) => s,
        _ => return,
    };

    match stream.dict.get(b"Subtype").ok().and_then(name_of) {
        Some(b"Image") => images.push(obj_id),
        Some(b"Form") => {
            if let Ok(res) = stream.dict.get(b"Resources") {
                for child_id in get_xobjects(doc, Some(res)) {
                    collect_images_recursive(doc, child_id, images, seen);
                }
            }
        }
        _ => {}
    }
}

/// Page resources, following inherited /Resources up the page tree
fn get_page_resources<'a>(doc: &'a Document, page_dict: &'a Dictionary) -> Option<&'a Object> {
    if let Ok(resources) = page_dict.get(b"Resources") {
        return Some(resources);
    }

    let mut visited = HashSet::new();
    let mut current = page_dict;
    while let Ok(Object::Reference(parent_id)) = current.get(b"Parent") {
        if !visited.insert(*parent_id) {
            break;
        }
        match doc.get_object(*parent_id) {
            Ok(Object::Dictionary(parent_dict)) => {
                if let Ok(resources) = parent_dict.get(b"Resources") {
                    return Some(resources);
                }
                current = parent_dict;
            }
            _ => break,
        }
    }

    None
}

/// XObject references named in a resource dictionary
fn get_xobjects(doc: &Document, resources: Option<&Object>) -> Vec<ObjectId> {
    let res_dict = match resources.and_then(|r| resolve(doc, r)) {
        Some(Object::Dictionary(d)) => d,
        _ => return Vec::new(),
    };

    let xobj_dict = match res_dict.get(b"XObject").ok().and_then(|x| resolve(doc, x)) {
        Some(Object::Dictionary(d)) => d,
        _ => return Vec::new(),
    };

    xobj_dict
        .iter()
        .filter_map(|(_, value)| match value {
            Object::Reference(obj_id) => Some(*obj_id),
            _ => None,
        })
        .collect()
}

fn extract_image_from_stream(doc: &Document, stream: &Stream) -> Result<ExtractedImage, ImageError> {
    if !matches!(stream.dict.get(b"Subtype").ok().and_then(name_of), Some(b"Image")) {
        return Err(ImageError::Extract("not an image XObject".to_string()));
    }
    if let Ok(Object::Boolean(true)) = stream.dict.get(b"ImageMask") {
        return Err(ImageError::Extract("stencil masks are not recompressed".to_string()));
    }
    if let Ok(Object::Array(_)) = stream.dict.get(b"Mask") {
        return Err(ImageError::Extract(
            "color-key masked images are not recompressed".to_string(),
        ));
    }

    let width = dict_u32(&stream.dict, b"Width");
    let height = dict_u32(&stream.dict, b"Height");
    if width == 0 || height == 0 {
        return Err(ImageError::Extract("invalid dimensions".to_string()));
    }

    let stored_len = stream.content.len();
    let passthrough = |format: &str| ExtractedImage {
        data: stream.content.clone(),
        format: format.to_string(),
        width,
        height,
        stored_len,
    };

    let filters = filter_names(stream);
    match filters.last().map(String::as_str) {
        Some("DCTDecode") if filters.len() == 1 => {
            check_jpeg_passthrough(doc, stream)?;
            return Ok(passthrough("jpeg"));
        }
        Some("DCTDecode") => {
            return Err(ImageError::Extract("chained DCTDecode filters".to_string()))
        }
        Some("JPXDecode") => return Ok(passthrough("jpx")),
        Some("JBIG2Decode") => return Ok(passthrough("jb2")),
        Some("CCITTFaxDecode") => return Ok(passthrough("fax")),
        _ => {}
    }

    let img = decode_image_stream(doc, stream, width, height).map_err(ImageError::Extract)?;

    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| ImageError::Extract(format!("Failed to encode PNG: {}", e)))?;

    Ok(ExtractedImage {
        data: png_bytes,
        format: "png".to_string(),
        width,
        height,
        stored_len,
    })
}

/// A stored JPEG is only handed out when its bytes alone render the same as the PDF does
fn check_jpeg_passthrough(doc: &Document, stream: &Stream) -> Result<(), ImageError> {
    let components = match stream.dict.get(b"ColorSpace") {
        Ok(cs) => color_components(doc, cs).map_err(ImageError::Extract)?,
        Err(_) => 3,
    };
    if components == 4 {
        return Err(ImageError::Extract("CMYK JPEGs are not recompressed".to_string()));
    }
    if decode_ranges(stream, components)
        .map_err(ImageError::Extract)?
        .is_some()
    {
        return Err(ImageError::Extract("JPEG with a /Decode array".to_string()));
    }
    Ok(())
}

/// Per-component `(min, max)` of a /Decode array, or `None` when it is absent or the identity
fn decode_ranges(stream: &Stream, components: u32) -> Result<Option<Vec<(f32, f32)>>, String> {
    let entries = match stream.dict.get(b"Decode") {
        Ok(Object::Array(entries)) => entries,
        Ok(_) => return Err("/Decode is not an array".to_string()),
        Err(_) => return Ok(None),
    };
    let values = entries
        .iter()
        .map(|v| v.as_float())
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| format!("/Decode: {}", e))?;
    if values.len() != components as usize * 2 {
        return Err(format!(
            "/Decode has {} entries for {} components",
            values.len(),
            components
        ));
    }

    let ranges: Vec<(f32, f32)> = values.chunks(2).map(|pair| (pair[0], pair[1])).collect();
    if ranges.iter().all(|&(lo, hi)| lo == 0.0 && hi == 1.0) {
        return Ok(None);
    }
    Ok(Some(ranges))
}

/// Map 8-bit samples through a /Decode array
fn apply_decode(samples: &mut [u8], ranges: &[(f32, f32)]) {
    for pixel in samples.chunks_mut(ranges.len()) {
        for (sample, &(lo, hi)) in pixel.iter_mut().zip(ranges) {
            let value = lo + (*sample as f32 / 255.0) * (hi - lo);
            *sample = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
}

/// Undo Flate/LZW encoding of a stream
fn decode_stream_data(stream: &Stream) -> Result<Vec<u8>, String> {
    let filters = filter_names(stream);
    if filters.is_empty() {
        return Ok(stream.content.clone());
    }

    if filters == ["FlateDecode"] && !stream.dict.has(b"DecodeParms") {
        let mut decoder = ZlibDecoder::new(&stream.content[..]);
        let mut decoded = Vec::new();
        decoder
            .read_to_end(&mut decoded)
            .map_err(|e| e.to_string())?;
        return Ok(decoded);
    }

    // predictors and LZW are handled by lopdf
    stream.decompressed_content().map_err(|e| e.to_string())
}

/// Number of color components of an image color space
fn color_components(doc: &Document, obj: &Object) -> Result<u32, String> {
    match obj {
        Object::Reference(id) => {
            let resolved = doc.get_object(*id).map_err(|e| e.to_string())?;
            color_components(doc, resolved)
        }
        Object::Name(name) => match name.as_slice() {
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(3),
            b"DeviceGray" | b"G" | b"CalGray" => Ok(1),
            b"DeviceCMYK" | b"CMYK" => Ok(4),
            other => Err(format!(
                "Unsupported color space: {}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Array(arr) => match arr.first().and_then(name_of) {
            Some(b"ICCBased") => {
                let profile = arr
                    .get(1)
                    .and_then(|p| resolve(doc, p))
                    .ok_or("Missing ICC profile")?;
                match profile {
                    Object::Stream(s) => match s.dict.get(b"N") {
                        Ok(Object::Integer(n)) if [1, 3, 4].contains(n) => Ok(*n as u32),
                        _ => Err("ICC profile has unsupported /N".to_string()),
                    },
                    _ => Err("ICC profile is not a stream".to_string()),
                }
            }
            Some(b"CalRGB") => Ok(3),
            Some(b"CalGray") => Ok(1),
            Some(other) => Err(format!(
                "Unsupported color space: {}",
                String::from_utf8_lossy(other)
            )),
            None => Err("Empty color space array".to_string()),
        },
        _ => Err("Invalid color space".to_string()),
    }
}

/// Decode a raw (non-DCT) PDF image stream into pixels
fn decode_image_stream(
    doc: &Document,
    stream: &Stream,
    width: u32,
    height: u32,
) -> Result<DynamicImage, String> {
    let bits_per_component = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|b| match b {
            Object::Integer(n) => Some(*n),
            _ => None,
        })
        .unwrap_or(8);
    if bits_per_component != 8 {
        return Err(format!(
            "Unsupported bits per component: {}",
            bits_per_component
        ));
    }

    let components = match stream.dict.get(b"ColorSpace") {
        Ok(cs) => color_components(doc, cs)?,
        Err(_) => 3,
    };

    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or("Image dimensions overflow")?;
    let expected_size = pixels
        .checked_mul(components as usize)
        .ok_or("Image dimensions overflow")?;

    let mut decoded_data = decode_stream_data(stream)?;
    if decoded_data.len() < expected_size {
        return Err(format!(
            "Image data size mismatch: got {} expected {}",
            decoded_data.len(),
            expected_size
        ));
    }
    decoded_data.truncate(expected_size);
    if let Some(ranges) = decode_ranges(stream, components)? {
        apply_decode(&mut decoded_data, &ranges);
    }
    let data = decoded_data.as_slice();

    match components {
        1 => GrayImage::from_raw(width, height, data.to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "Failed to create grayscale image from raw data".to_string()),
        3 => RgbImage::from_raw(width, height, data.to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "Failed to create RGB image from raw data".to_string()),
        4 => {
            let mut rgb_data = Vec::with_capacity(pixels * 3);
            for chunk in data.chunks(4) {
                let c = chunk[0] as f32 / 255.0;
                let m = chunk[1] as f32 / 255.0;
                let y = chunk[2] as f32 / 255.0;
                let k = chunk[3] as f32 / 255.0;

                rgb_data.push(((1.0 - c) * (1.0 - k) * 255.0) as u8);
                rgb_data.push(((1.0 - m) * (1.0 - k) * 255.0) as u8);
                rgb_data.push(((1.0 - y) * (1.0 - k) * 255.0) as u8);
            }
            RgbImage::from_raw(width, height, rgb_data)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "Failed to create RGB image from CMYK data".to_string())
        }
        n => Err(format!("Unsupported component count: {}", n)),
    }
}

/// Width, height and PDF color space of a JPEG, read from its header
fn probe_jpeg(jpeg: &[u8]) -> Result<(u32, u32, &'static [u8]), ImageError> {
    let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(jpeg))
        .map_err(|e| ImageError::Replace(format!("not a JPEG: {}", e)))?;
    let (width, height) = decoder.dimensions();
    let color_space: &'static [u8] = match decoder.color_type() {
        image::ColorType::L8 | image::ColorType::L16 => b"DeviceGray",
        _ => b"DeviceRGB",
    };
    Ok((width, height, color_space))
}

/// Fold byte-identical objects into one and point every reference at the survivor.
/// Streams are always considered; plain dictionaries and arrays only with `include_plain`.
fn merge_duplicate_objects(doc: &mut Document, include_plain: bool) -> usize {
    let redirects: HashMap<ObjectId, ObjectId> = {
        let mut canonical: HashMap<(String, &[u8]), ObjectId> = HashMap::new();
        let mut redirects = HashMap::new();

        for (&id, object) in doc.objects.iter() {
            let key = match object {
                Object::Stream(stream) if is_mergeable_stream(stream) => (
                    format!("S{:?}", stream.dict),
                    stream.content.as_slice(),
                ),
                Object::Dictionary(dict) if include_plain && is_mergeable_dict(dict) => {
                    (format!("D{:?}", dict), &[][..])
                }
                Object::Array(arr) if include_plain => (format!("A{:?}", arr), &[][..]),
                _ => continue,
            };
            match canonical.entry(key) {
                Entry::Occupied(survivor) => {
                    redirects.insert(id, *survivor.get());
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }
        redirects
    };

    if redirects.is_empty() {
        return 0;
    }

    for id in redirects.keys() {
        doc.objects.remove(id);
    }
    for object in doc.objects.values_mut() {
        redirect_references(object, &redirects);
    }
    for (_, value) in doc.trailer.iter_mut() {
        redirect_references(value, &redirects);
    }

    redirects.len()
}

fn is_mergeable_stream(stream: &Stream) -> bool {
    !matches!(
        stream.dict.get(b"Type").ok().and_then(name_of),
        Some(b"XRef") | Some(b"ObjStm") | Some(b"Metadata")
    )
}

fn is_mergeable_dict(dict: &Dictionary) -> bool {
    if dict.has(b"Parent") {
        return false;
    }
    match dict.get(b"Type").ok().and_then(name_of) {
        Some(t) => !IDENTITY_TYPES.contains(&t),
        None => true,
    }
}

fn redirect_references(object: &mut Object, redirects: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(target) = redirects.get(id) {
                *id = *target;
            }
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                redirect_references(item, redirects);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                redirect_references(value, redirects);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                redirect_references(value, redirects);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use lopdf::dictionary;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn raw_rgb_stream(width: u32, height: u32) -> Stream {
        let pixels: Vec<u8> = (0..width * height * 3).map(|i| (i % 256) as u8).collect();
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(width as i64),
                "Height" => Object::Integer(height as i64),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "FlateDecode",
            },
            deflate(&pixels),
        )
    }

    /// One page whose resources name `images` as Im0, Im1, ...
    fn document_with(images: Vec<Object>) -> (Document, Vec<ObjectId>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let ids: Vec<ObjectId> = images.into_iter().map(|o| doc.add_object(o)).collect();

        let mut xobjects = Dictionary::new();
        for (i, id) in ids.iter().enumerate() {
            xobjects.set(format!("Im{}", i), Object::Reference(*id));
        }
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, ids)
    }

    #[test]
    fn raw_flate_image_is_extracted_as_png() {
        let (doc, ids) = document_with(vec![Object::Stream(raw_rgb_stream(120, 110))]);
        let pdf = PdfDocument::from_document(doc);

        let images = pdf.page_images(0);
        assert_eq!(images, vec![ImageRef::from(ids[0])]);

        let extracted = pdf.extract_image(images[0]).unwrap();
        assert_eq!(extracted.format, "png");
        assert_eq!((extracted.width, extracted.height), (120, 110));
        let decoded = image::load_from_memory_with_format(&extracted.data, ImageFormat::Png).unwrap();
        assert_eq!(decoded.to_rgb8().get_pixel(1, 0).0, [3, 4, 5]);
    }

    #[test]
    fn exotic_filters_keep_their_tag() {
        let mut jpx = raw_rgb_stream(200, 200);
        jpx.dict.set("Filter", "JPXDecode");
        jpx.content = vec![0u8; 64];
        let (doc, ids) = document_with(vec![Object::Stream(jpx)]);
        let pdf = PdfDocument::from_document(doc);

        let extracted = pdf.extract_image(ids[0].into()).unwrap();
        assert_eq!(extracted.format, "jpx");
        assert_eq!(extracted.stored_len, 64);
    }

    #[test]
    fn decode_array_is_applied_to_raw_pixels() {
        let pixels: Vec<u8> = (0..120 * 110).map(|i| (i % 200) as u8).collect();
        let mut gray = raw_rgb_stream(120, 110);
        gray.dict.set("ColorSpace", "DeviceGray");
        gray.dict.set("Decode", vec![Object::Integer(1), Object::Integer(0)]);
        gray.set_content(deflate(&pixels));
        let (doc, ids) = document_with(vec![Object::Stream(gray)]);
        let pdf = PdfDocument::from_document(doc);

        let extracted = pdf.extract_image(ids[0].into()).unwrap();
        let decoded = image::load_from_memory_with_format(&extracted.data, ImageFormat::Png)
            .unwrap()
            .to_luma8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255]);
        assert_eq!(decoded.get_pixel(5, 0).0, [250]);
        assert_eq!(decoded.get_pixel(199 % 120, 199 / 120).0, [56]);
    }

    #[test]
    fn identity_decode_is_ignored() {
        let mut stream = raw_rgb_stream(10, 10);
        stream.dict.set(
            "Decode",
            vec![0.into(), 1.into(), 0.into(), 1.into(), Object::Real(0.0), Object::Real(1.0)],
        );
        assert_eq!(decode_ranges(&stream, 3).unwrap(), None);

        stream.dict.set("Decode", vec![Object::Integer(1), Object::Integer(0)]);
        assert!(decode_ranges(&stream, 3).is_err());
        assert_eq!(decode_ranges(&stream, 1).unwrap(), Some(vec![(1.0, 0.0)]));
    }

    #[test]
    fn jpegs_that_need_the_pdf_to_render_are_not_extracted() {
        let mut inverted = raw_rgb_stream(200, 200);
        inverted.dict.set("Filter", "DCTDecode");
        inverted.dict.set(
            "Decode",
            vec![1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into()],
        );
        let mut cmyk = raw_rgb_stream(200, 200);
        cmyk.dict.set("Filter", "DCTDecode");
        cmyk.dict.set("ColorSpace", "DeviceCMYK");
        let mut plain = raw_rgb_stream(200, 200);
        plain.dict.set("Filter", "DCTDecode");
        plain.dict.set(
            "Decode",
            vec![0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into()],
        );
        let (doc, ids) = document_with(vec![
            Object::Stream(inverted),
            Object::Stream(cmyk),
            Object::Stream(plain),
        ]);
        let pdf = PdfDocument::from_document(doc);

        assert!(matches!(pdf.extract_image(ids[0].into()), Err(ImageError::Extract(_))));
        assert!(matches!(pdf.extract_image(ids[1].into()), Err(ImageError::Extract(_))));
        assert_eq!(pdf.extract_image(ids[2].into()).unwrap().format, "jpeg");
    }

    #[test]
    fn color_key_masked_images_are_not_extracted() {
        let mut keyed = raw_rgb_stream(200, 200);
        keyed.dict.set(
            "Mask",
            vec![0.into(), 10.into(), 0.into(), 10.into(), 0.into(), 10.into()],
        );
        let (doc, ids) = document_with(vec![Object::Stream(keyed)]);
        let pdf = PdfDocument::from_document(doc);

        assert!(matches!(pdf.extract_image(ids[0].into()), Err(ImageError::Extract(_))));
    }

    #[test]
    fn huge_declared_dimensions_fail_cleanly() {
        let mut huge = raw_rgb_stream(4, 4);
        huge.dict.set("Width", Object::Integer(u32::MAX as i64));
        huge.dict.set("Height", Object::Integer(u32::MAX as i64));
        let (doc, ids) = document_with(vec![Object::Stream(huge)]);
        let pdf = PdfDocument::from_document(doc);

        assert!(matches!(pdf.extract_image(ids[0].into()), Err(ImageError::Extract(_))));
    }

    #[test]
    fn stencil_masks_are_not_extracted() {
        let mut mask = raw_rgb_stream(200, 200);
        mask.dict.set("ImageMask", Object::Boolean(true));
        let (doc, ids) = document_with(vec![Object::Stream(mask)]);
        let pdf = PdfDocument::from_document(doc);

        assert!(matches!(
            pdf.extract_image(ids[0].into()),
            Err(ImageError::Extract(_))
        ));
    }

    #[test]
    fn images_inside_forms_are_found_once() {
        let mut doc = Document::with_version("1.5");
        let image_id = doc.add_object(Object::Stream(raw_rgb_stream(150, 150)));
        let form_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Inner" => image_id },
                },
            },
            b"q /Inner Do Q".to_vec(),
        )));
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => Object::Integer(1),
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Fm0" => form_id, "Im0" => image_id },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let pdf = PdfDocument::from_document(doc);
        assert_eq!(pdf.page_images(0), vec![ImageRef::from(image_id)]);
        assert!(pdf.page_images(1).is_empty());
    }

    #[test]
    fn replacement_rewrites_dictionary() {
        let mut original = raw_rgb_stream(300, 200);
        original.dict.set("SMask", Object::Reference((99, 0)));
        original
            .dict
            .set("Decode", vec![Object::Integer(1), Object::Integer(0)]);
        let (doc, ids) = document_with(vec![Object::Stream(original)]);
        let mut pdf = PdfDocument::from_document(doc);

        let small = DynamicImage::ImageRgb8(RgbImage::from_pixel(210, 140, image::Rgb([9, 9, 9])));
        let jpeg = crate::transform::encode_jpeg(&small, 75).unwrap();
        pdf.replace_image(ids[0].into(), jpeg.clone()).unwrap();

        let stream = match pdf.document().get_object(ids[0]).unwrap() {
            Object::Stream(s) => s,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(stream.content, jpeg);
        assert_eq!(dict_u32(&stream.dict, b"Width"), 210);
        assert_eq!(dict_u32(&stream.dict, b"Height"), 140);
        assert_eq!(filter_names(stream), vec!["DCTDecode".to_string()]);
        assert_eq!(stream.dict.get(b"SMask").unwrap(), &Object::Reference((99, 0)));
        assert!(!stream.dict.has(b"Decode"));
    }

    #[test]
    fn replacement_rejects_non_jpeg() {
        let (doc, ids) = document_with(vec![Object::Stream(raw_rgb_stream(300, 200))]);
        let mut pdf = PdfDocument::from_document(doc);
        assert!(matches!(
            pdf.replace_image(ids[0].into(), vec![1, 2, 3]),
            Err(ImageError::Replace(_))
        ));
    }

    #[test]
    fn duplicate_streams_are_merged() {
        let (mut doc, ids) = document_with(vec![
            Object::Stream(raw_rgb_stream(120, 120)),
            Object::Stream(raw_rgb_stream(120, 120)),
        ]);

        let merged = merge_duplicate_objects(&mut doc, false);
        assert_eq!(merged, 1);
        assert!(doc.objects.contains_key(&ids[0]));
        assert!(!doc.objects.contains_key(&ids[1]));

        let pdf = PdfDocument::from_document(doc);
        assert_eq!(
            pdf.page_images(0),
            vec![ImageRef::from(ids[0])],
            "both names now point at the survivor"
        );
    }

    #[test]
    fn garbage_collection_prunes_orphans() {
        let (mut doc, _) = document_with(vec![Object::Stream(raw_rgb_stream(120, 120))]);
        let orphan = doc.add_object(Object::Stream(raw_rgb_stream(130, 130)));
        let mut pdf = PdfDocument::from_document(doc);

        let keep = pdf
            .save(&SaveOptions {
                garbage_level: 0,
                deflate: false,
            })
            .unwrap();
        assert!(Document::load_mem(&keep).unwrap().objects.contains_key(&orphan));

        let pruned = pdf
            .save(&SaveOptions {
                garbage_level: 1,
                deflate: true,
            })
            .unwrap();
        assert!(pruned.len() < keep.len());
        assert_eq!(PdfDocument::load_mem(&pruned).unwrap().page_count(), 1);
    }

    #[test]
    fn high_garbage_levels_pack_object_streams() {
        let save_at = |level: u8| {
            let (doc, _) = document_with(vec![Object::Stream(raw_rgb_stream(120, 120))]);
            PdfDocument::from_document(doc)
                .save(&SaveOptions {
                    garbage_level: level,
                    deflate: true,
                })
                .unwrap()
        };
        let contains = |haystack: &[u8], needle: &[u8]| {
            haystack.windows(needle.len()).any(|w| w == needle)
        };

        let classic = save_at(2);
        let packed = save_at(3);
        assert!(!contains(&classic, b"/ObjStm"));
        assert!(contains(&packed, b"/ObjStm"));

        let reloaded = PdfDocument::load_mem(&packed).unwrap();
        assert_eq!(reloaded.page_count(), 1);
        assert_eq!(reloaded.page_images(0).len(), 1);
    }
}
