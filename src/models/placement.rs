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

//! Signature Placement Model
//!
//! A placement is a rectangle on a specific page where a signature image
//! belongs. Coordinates are stored as fractions of the page dimensions
//! (top-left origin), so a placement is valid regardless of render or zoom
//! scale. Height is never stored; it derives from the embedded image's
//! aspect ratio at composite time, which guarantees no distortion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default placement seeded when a document owner shares a document without
/// placing any marks: one box in the bottom area of page 1.
pub const DEFAULT_PLACEMENT_X: f64 = 0.1;
pub const DEFAULT_PLACEMENT_Y: f64 = 0.8;
pub const DEFAULT_PLACEMENT_WIDTH: f64 = 0.25;

/// A placed signature mark on a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignaturePlacement {
    /// Identifier unique within a document
    pub id: Uuid,
    /// The document this placement belongs to
    pub document_id: Uuid,
    /// The signature request expected to fill this placement, once assigned
    pub request_id: Option<Uuid>,
    /// 1-indexed page number
    pub page: u32,
    /// Left edge as a fraction (0-1) of page width
    pub x: f64,
    /// Top edge as a fraction (0-1) of page height
    pub y: f64,
    /// Width as a fraction (0-1) of page width
    pub width: f64,
    /// Whether the document is incomplete without this placement signed
    pub required: bool,
    /// Human-readable hint, e.g. "Signature", "Initials"
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SignaturePlacement {
    /// Checks the fractional-bounds invariants: `0 <= x, y <= 1`,
    /// `width > 0`, and `x + width <= 1` so the mark stays within the page.
    ///
    /// Page range cannot be checked here; the compositing engine verifies it
    /// against the actual document.
    pub fn validate_bounds(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err(format!("page must be 1-indexed, got {}", self.page));
        }
        if !(0.0..=1.0).contains(&self.x) || !(0.0..=1.0).contains(&self.y) {
            return Err(format!(
                "position ({}, {}) outside the unit square",
                self.x, self.y
            ));
        }
        if self.width <= 0.0 {
            return Err(format!("width must be positive, got {}", self.width));
        }
        if self.x + self.width > 1.0 + f64::EPSILON {
            return Err(format!(
                "right edge {} exceeds page width",
                self.x + self.width
            ));
        }
        Ok(())
    }
}

/// Fields required to create a new placement.
#[derive(Debug, Clone)]
pub struct NewSignaturePlacement {
    pub document_id: Uuid,
    pub request_id: Option<Uuid>,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub required: bool,
    pub label: String,
}

impl NewSignaturePlacement {
    /// The system default placement for a document with no explicit marks.
    pub fn system_default(document_id: Uuid) -> Self {
        NewSignaturePlacement {
            document_id,
            request_id: None,
            page: 1,
            x: DEFAULT_PLACEMENT_X,
            y: DEFAULT_PLACEMENT_Y,
            width: DEFAULT_PLACEMENT_WIDTH,
            required: true,
            label: "Signature".to_string(),
        }
    }
}
