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

//! Overlay Interaction Model
//!
//! A headless state machine for positioning signature marks on a rendered
//! page. The host UI feeds pointer events in; the board tracks drag and
//! resize gestures, clamps rectangles to the container, locks resizing to
//! the image aspect ratio, and emits a scale-independent
//! [`FractionalPlacement`] only when a gesture ends.
//!
//! Nothing is committed mid-gesture: intermediate pointer positions mutate
//! the working rectangle but only [`OverlayBoard::end_interaction`] produces
//! a placement, and [`OverlayBoard::cancel_interaction`] restores the
//! rectangle the gesture started from.
//!
//! Until the container dimensions are known (the page is still rendering),
//! every handler is a no-op; there is nothing meaningful to clamp against.

use uuid::Uuid;

use crate::geometry::{to_fraction, ContainerSize, FractionalPlacement, ImageDimensions, PixelRect};

/// Minimum overlay width in container pixels. Resizing below this snaps back.
pub const MIN_OVERLAY_WIDTH: f64 = 50.0;

/// A pointer event position in container-space pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

/// One signature mark being positioned.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub id: Uuid,
    /// 1-indexed page the overlay sits on
    pub page: u32,
    /// Working rectangle in container space
    pub rect: PixelRect,
    /// Pixel dimensions of the signature image, for aspect locking
    pub image: ImageDimensions,
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    Dragging {
        overlay_id: Uuid,
        /// Pointer offset from the rectangle's top-left at grab time
        grab_dx: f64,
        grab_dy: f64,
        origin: PixelRect,
    },
    Resizing {
        overlay_id: Uuid,
        start_width: f64,
        start_pointer_x: f64,
        origin: PixelRect,
    },
}

/// The positioning board for one rendered page view.
#[derive(Debug)]
pub struct OverlayBoard {
    container: Option<ContainerSize>,
    overlays: Vec<Overlay>,
    selected: Option<Uuid>,
    gesture: Gesture,
}

impl Default for OverlayBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayBoard {
    pub fn new() -> Self {
        Self {
            container: None,
            overlays: Vec::new(),
            selected: None,
            gesture: Gesture::Idle,
        }
    }

    /// Sets (or updates) the rendered container dimensions. Interaction is
    /// disabled until this has been called with a non-degenerate size.
    pub fn set_container(&mut self, size: ContainerSize) {
        if size.width > 0.0 && size.height > 0.0 {
            self.container = Some(size);
        }
    }

    pub fn container(&self) -> Option<ContainerSize> {
        self.container
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    /// Adds an overlay at the given rectangle and selects it.
    pub fn add_overlay(&mut self, page: u32, rect: PixelRect, image: ImageDimensions) -> Uuid {
        let id = Uuid::new_v4();
        self.overlays.push(Overlay {
            id,
            page,
            rect,
            image,
        });
        self.selected = Some(id);
        id
    }

    /// Removes an overlay, cancelling any gesture on it.
    pub fn remove(&mut self, id: Uuid) {
        if self.gesture_target() == Some(id) {
            self.gesture = Gesture::Idle;
        }
        self.overlays.retain(|o| o.id != id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    pub fn select(&mut self, id: Uuid) {
        if self.overlays.iter().any(|o| o.id == id) {
            self.selected = Some(id);
        }
    }

    /// Starts dragging an overlay from the given pointer position.
    pub fn begin_drag(&mut self, id: Uuid, pointer: PointerPosition) {
        if self.container.is_none() {
            return;
        }
        if let Some(overlay) = self.overlays.iter().find(|o| o.id == id) {
            self.selected = Some(id);
            self.gesture = Gesture::Dragging {
                overlay_id: id,
                grab_dx: pointer.x - overlay.rect.x,
                grab_dy: pointer.y - overlay.rect.y,
                origin: overlay.rect,
            };
        }
    }

    /// Starts resizing an overlay from its corner handle.
    pub fn begin_resize(&mut self, id: Uuid, pointer: PointerPosition) {
        if self.container.is_none() {
            return;
        }
        if let Some(overlay) = self.overlays.iter().find(|o| o.id == id) {
            self.selected = Some(id);
            self.gesture = Gesture::Resizing {
                overlay_id: id,
                start_width: overlay.rect.width,
                start_pointer_x: pointer.x,
                origin: overlay.rect,
            };
        }
    }

    /// Updates the active gesture with a new pointer position.
    pub fn pointer_move(&mut self, pointer: PointerPosition) {
        let Some(container) = self.container else {
            return;
        };

        match self.gesture {
            Gesture::Idle => {}
            Gesture::Dragging {
                overlay_id,
                grab_dx,
                grab_dy,
                ..
            } => {
                if let Some(overlay) = self.overlays.iter_mut().find(|o| o.id == overlay_id) {
                    let max_x = (container.width - overlay.rect.width).max(0.0);
                    let max_y = (container.height - overlay.rect.height).max(0.0);
                    overlay.rect.x = (pointer.x - grab_dx).clamp(0.0, max_x);
                    overlay.rect.y = (pointer.y - grab_dy).clamp(0.0, max_y);
                }
            }
            Gesture::Resizing {
                overlay_id,
                start_width,
                start_pointer_x,
                ..
            } => {
                if let Some(overlay) = self.overlays.iter_mut().find(|o| o.id == overlay_id) {
                    let proposed = start_width + (pointer.x - start_pointer_x);
                    // the container edge wins over the minimum width when the
                    // overlay sits closer to the edge than the minimum allows
                    let max_width = (container.width - overlay.rect.x).max(0.0);
                    let width = proposed.max(MIN_OVERLAY_WIDTH).min(max_width);
                    overlay.rect.width = width;
                    overlay.rect.height = width * overlay.image.aspect_ratio();
                }
            }
        }
    }

    /// Commits the active gesture, returning the overlay's id and its new
    /// scale-independent placement. Returns `None` when no gesture is active
    /// or the container is unknown.
    pub fn end_interaction(&mut self) -> Option<(Uuid, FractionalPlacement)> {
        let container = self.container?;
        let id = self.gesture_target()?;
        self.gesture = Gesture::Idle;

        let overlay = self.overlays.iter().find(|o| o.id == id)?;
        Some((id, to_fraction(container, overlay.rect)))
    }

    /// Abandons the active gesture, restoring the rectangle it started from.
    pub fn cancel_interaction(&mut self) {
        let restore = match self.gesture {
            Gesture::Idle => None,
            Gesture::Dragging {
                overlay_id, origin, ..
            }
            | Gesture::Resizing {
                overlay_id, origin, ..
            } => Some((overlay_id, origin)),
        };
        self.gesture = Gesture::Idle;

        if let Some((id, origin)) = restore {
            if let Some(overlay) = self.overlays.iter_mut().find(|o| o.id == id) {
                overlay.rect = origin;
            }
        }
    }

    fn gesture_target(&self) -> Option<Uuid> {
        match self.gesture {
            Gesture::Idle => None,
            Gesture::Dragging { overlay_id, .. } | Gesture::Resizing { overlay_id, .. } => {
                Some(overlay_id)
            }
        }
    }
}
