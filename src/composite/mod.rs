/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! PDF Compositing Engine
//!
//! Burns raster signature images into the pages of an existing PDF,
//! producing new document bytes. The input bytes are never mutated; every
//! composite starts from a fresh parse.
//!
//! Each signature image is decoded, split into an RGB image XObject plus a
//! DeviceGray soft mask carrying the alpha channel (both Flate-compressed),
//! registered in the page's XObject resources, and drawn by a content stream
//! appended after the existing page content so the mark always paints on
//! top. An optional "Signed: ..." label is drawn in small grey text below
//! the image.
//!
//! Failure handling is two-tier: a malformed source document or a placement
//! referencing a nonexistent page aborts the whole composite, while an
//! unreadable signature image only skips that placement and is reported in
//! [`CompositeOutcome::failures`].

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::GenericImageView;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CompositeError;
use crate::geometry::{to_page_space, FractionalPlacement, ImageDimensions, PageSize};
use crate::models::placement::SignaturePlacement;

/// Default label font size in points.
const DEFAULT_LABEL_FONT_SIZE: f64 = 7.0;
/// Gap between the image's bottom edge and the label baseline, in points.
const LABEL_GAP: f64 = 3.0;

/// One signature to embed: where it goes, the raster bytes, and an optional
/// label drawn beneath it.
#[derive(Debug, Clone)]
pub struct CompositeJob {
    pub placement: SignaturePlacement,
    /// Encoded image bytes (PNG or JPEG)
    pub image_bytes: Vec<u8>,
    /// e.g. "Signed: 2026-08-30"
    pub label: Option<String>,
}

/// A placement whose signature image could not be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementFailure {
    pub placement_id: Uuid,
    pub page: u32,
    pub reason: String,
}

/// The product of a composite run.
#[derive(Debug, Clone)]
pub struct CompositeOutcome {
    /// The new document bytes with all successful placements embedded
    pub bytes: Vec<u8>,
    /// Placements skipped because their image could not be decoded
    pub failures: Vec<PlacementFailure>,
}

/// The compositing engine. Stateless between runs; cheap to construct.
#[derive(Debug, Clone)]
pub struct CompositeEngine {
    label_font_size: f64,
}

impl Default for CompositeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEngine {
    pub fn new() -> Self {
        Self {
            label_font_size: DEFAULT_LABEL_FONT_SIZE,
        }
    }

    pub fn with_label_font_size(mut self, size: f64) -> Self {
        self.label_font_size = size;
        self
    }

    /// Embeds every job's signature into the document, returning new bytes.
    ///
    /// Placements are validated against the parsed document before anything
    /// is embedded, so a bad batch never produces a half-composited
    /// document. Image decode failures are collected per placement; all
    /// other placements still land.
    pub fn composite(
        &self,
        document_bytes: &[u8],
        jobs: &[CompositeJob],
    ) -> Result<CompositeOutcome, CompositeError> {
        let mut doc =
            Document::load_mem(document_bytes).map_err(CompositeError::DocumentParse)?;
        let pages = doc.get_pages();

        // validate the whole batch up front
        for job in jobs {
            job.placement
                .validate_bounds()
                .map_err(|reason| CompositeError::InvalidPlacement {
                    placement_id: job.placement.id,
                    reason,
                })?;
            if !pages.contains_key(&job.placement.page) {
                return Err(CompositeError::InvalidPlacement {
                    placement_id: job.placement.id,
                    reason: format!(
                        "page {} does not exist (document has {})",
                        job.placement.page,
                        pages.len()
                    ),
                });
            }
        }

        let mut failures = Vec::new();
        for (index, job) in jobs.iter().enumerate() {
            let page_id = pages[&job.placement.page];
            match self.embed_signature(&mut doc, page_id, index, job) {
                Ok(()) => {
                    debug!(
                        placement_id = %job.placement.id,
                        page = job.placement.page,
                        "Embedded signature"
                    );
                }
                Err(EmbedError::Image(reason)) => {
                    warn!(
                        placement_id = %job.placement.id,
                        page = job.placement.page,
                        %reason,
                        "Skipping placement with unreadable signature image"
                    );
                    failures.push(PlacementFailure {
                        placement_id: job.placement.id,
                        page: job.placement.page,
                        reason,
                    });
                }
                Err(EmbedError::Pdf(e)) => return Err(CompositeError::DocumentParse(e)),
            }
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(CompositeError::Serialize)?;

        Ok(CompositeOutcome { bytes, failures })
    }

    fn embed_signature(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        index: usize,
        job: &CompositeJob,
    ) -> Result<(), EmbedError> {
        let img = image::load_from_memory(&job.image_bytes)
            .map_err(|e| EmbedError::Image(e.to_string()))?;
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(EmbedError::Image("image has zero dimensions".to_string()));
        }
        let rgba = img.to_rgba8();

        // split RGBA into an RGB stream and a gray alpha stream
        let mut rgb_buf = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha_buf = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            rgb_buf.extend_from_slice(&[r, g, b]);
            alpha_buf.push(a);
        }

        let compressed_rgb = deflate(&rgb_buf)?;
        let compressed_alpha = deflate(&alpha_buf)?;

        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            compressed_alpha,
        ));

        let xobject_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
                "SMask" => Object::Reference(smask_id),
            },
            compressed_rgb,
        ));

        let image_name = format!("CsIm{}", index);
        ensure_direct_resources(doc, page_id)?;
        register_xobject(doc, page_id, &image_name, xobject_id)?;
        if job.label.is_some() {
            register_label_font(doc, page_id)?;
        }

        let page_size = page_size(doc, page_id);
        let frac = FractionalPlacement {
            x: job.placement.x,
            y: job.placement.y,
            width: job.placement.width,
        };
        let dims = ImageDimensions { width, height };
        let rect = to_page_space(page_size, frac, dims);

        let mut ops = format!(
            "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
            rect.width, rect.height, rect.x, rect.y, image_name
        );
        if let Some(label) = &job.label {
            let baseline = (rect.y - self.label_font_size - LABEL_GAP).max(2.0);
            ops.push_str(&format!(
                "q\nBT\n/{} {} Tf\n0.5 0.5 0.5 rg\n{} {} Td\n({}) Tj\nET\nQ\n",
                LABEL_FONT_NAME,
                self.label_font_size,
                rect.x,
                baseline,
                escape_pdf_string(label)
            ));
        }

        let stream_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));
        append_content(doc, page_id, stream_id)?;

        Ok(())
    }
}

const LABEL_FONT_NAME: &str = "CsHelv";

enum EmbedError {
    /// The signature image could not be decoded; skip this placement
    Image(String),
    /// The document structure broke mid-edit; abort the composite
    Pdf(lopdf::Error),
}

impl From<lopdf::Error> for EmbedError {
    fn from(e: lopdf::Error) -> Self {
        EmbedError::Pdf(e)
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, EmbedError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| EmbedError::Image(format!("compression failed: {}", e)))
}

/// Replaces an indirect `Resources` reference with a direct copy so the page
/// can be edited in place.
fn ensure_direct_resources(doc: &mut Document, page_id: ObjectId) -> Result<(), lopdf::Error> {
    let resolved = {
        let page = doc.get_object(page_id)?.as_dict()?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(doc.get_object(*id)?.as_dict()?.clone()),
            _ => None,
        }
    };
    if let Some(dict) = resolved {
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Resources", Object::Dictionary(dict));
    }
    Ok(())
}

fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<(), lopdf::Error> {
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

    if !page.has(b"Resources") {
        page.set("Resources", Object::Dictionary(dictionary! {}));
    }
    let resources = page.get_mut(b"Resources")?.as_dict_mut()?;
    if !resources.has(b"XObject") {
        resources.set("XObject", Object::Dictionary(dictionary! {}));
    }
    let xobjects = resources.get_mut(b"XObject")?.as_dict_mut()?;
    xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
    Ok(())
}

fn register_label_font(doc: &mut Document, page_id: ObjectId) -> Result<(), lopdf::Error> {
    let already_registered = {
        let page = doc.get_object(page_id)?.as_dict()?;
        page.get(b"Resources")
            .ok()
            .and_then(|r| r.as_dict().ok())
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|f| f.as_dict().ok())
            .map_or(false, |fonts| fonts.has(LABEL_FONT_NAME.as_bytes()))
    };
    if already_registered {
        return Ok(());
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    if !page.has(b"Resources") {
        page.set("Resources", Object::Dictionary(dictionary! {}));
    }
    let resources = page.get_mut(b"Resources")?.as_dict_mut()?;
    if !resources.has(b"Font") {
        resources.set("Font", Object::Dictionary(dictionary! {}));
    }
    let fonts = resources.get_mut(b"Font")?.as_dict_mut()?;
    fonts.set(
        LABEL_FONT_NAME.as_bytes().to_vec(),
        Object::Reference(font_id),
    );
    Ok(())
}

/// Appends a content stream after the page's existing content, preserving
/// whatever shape `Contents` already has.
fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    stream_id: ObjectId,
) -> Result<(), lopdf::Error> {
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

    let new_contents = match page.remove(b"Contents") {
        Some(Object::Reference(existing)) => Object::Array(vec![
            Object::Reference(existing),
            Object::Reference(stream_id),
        ]),
        Some(Object::Array(mut array)) => {
            array.push(Object::Reference(stream_id));
            Object::Array(array)
        }
        _ => Object::Reference(stream_id),
    };
    page.set("Contents", new_contents);
    Ok(())
}

/// Resolves the page's MediaBox, walking the Parent chain for inherited
/// values. Falls back to US Letter when nothing resolvable is found.
fn page_size(doc: &Document, page_id: ObjectId) -> PageSize {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            break;
        };
        if let Ok(mb) = dict.get(b"MediaBox") {
            if let Some(size) = media_box_size(doc, mb) {
                return size;
            }
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok());
    }
    PageSize {
        width: 612.0,
        height: 792.0,
    }
}

fn media_box_size(doc: &Document, media_box: &Object) -> Option<PageSize> {
    let resolved = match media_box {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let array = resolved.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let nums: Vec<f64> = array.iter().filter_map(as_number).collect();
    if nums.len() != 4 {
        return None;
    }
    let width = (nums[2] - nums[0]).abs();
    let height = (nums[3] - nums[1]).abs();
    if width > 0.0 && height > 0.0 {
        Some(PageSize { width, height })
    } else {
        None
    }
}

fn as_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Escapes characters with special meaning inside a PDF literal string.
fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}
