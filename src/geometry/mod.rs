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

//! Coordinate conversions between UI space and PDF page space.
//!
//! Three coordinate systems meet here:
//!
//! - **Container space**: pixels inside a rendered page container, top-left
//!   origin, y grows downward. Scale-dependent.
//! - **Fractional space**: position and width as fractions (0-1) of the
//!   container or page dimensions, top-left origin. Scale-independent; this
//!   is the stored representation.
//! - **Page space**: PDF points, bottom-left origin, y grows upward.
//!
//! Height is never stored or converted independently. It always derives from
//! the embedded image's aspect ratio at the moment of conversion, so a
//! signature can never be distorted by a stale stored height.
//!
//! All functions here are pure; the same inputs always produce the same
//! output rectangle.

use serde::{Deserialize, Serialize};

/// Pixel dimensions of the rendered page container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Pixel dimensions of a raster signature image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    /// Height over width. Zero-width images degenerate to a 1:1 ratio rather
    /// than dividing by zero.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width == 0 {
            1.0
        } else {
            self.height as f64 / self.width as f64
        }
    }
}

/// A rectangle in container space (pixels, top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A rectangle in page space (points, bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The scale-independent placement representation: left, top, and width as
/// fractions of the page dimensions, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionalPlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

/// Converts a container-space rectangle to fractions of the container.
/// Height is intentionally dropped; it is recomputed from the image aspect
/// ratio wherever the placement is rendered or embedded.
pub fn to_fraction(container: ContainerSize, rect: PixelRect) -> FractionalPlacement {
    FractionalPlacement {
        x: rect.x / container.width,
        y: rect.y / container.height,
        width: rect.width / container.width,
    }
}

/// Converts a fractional placement back to container-space pixels, deriving
/// the height from the image aspect ratio.
pub fn to_absolute(
    container: ContainerSize,
    placement: FractionalPlacement,
    image: ImageDimensions,
) -> PixelRect {
    let width = placement.width * container.width;
    PixelRect {
        x: placement.x * container.width,
        y: placement.y * container.height,
        width,
        height: width * image.aspect_ratio(),
    }
}

/// Converts a fractional placement to page space for embedding.
///
/// The y-axis flips here: fractional y measures from the top of the page,
/// page space measures from the bottom, and the resulting y names the
/// rectangle's *bottom* edge, so the derived height participates in the
/// inversion.
pub fn to_page_space(
    page: PageSize,
    placement: FractionalPlacement,
    image: ImageDimensions,
) -> PageRect {
    let width = placement.width * page.width;
    let height = width * image.aspect_ratio();
    PageRect {
        x: placement.x * page.width,
        y: page.height - placement.y * page.height - height,
        width,
        height,
    }
}
