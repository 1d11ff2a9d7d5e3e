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

//! # Countersign
//!
//! A Rust library for electronic signature workflows and PDF compositing.
//!
//! Countersign turns a hand-drawn or typed signature plus user-placed page
//! coordinates into a permanently embedded mark inside an existing PDF, while
//! tracking the lifecycle of who was asked to sign, whether they did, and when
//! requests expire.
//!
//! ## Architecture
//!
//! - [`geometry`] - pure conversions between UI-space fractions and PDF
//!   page-space coordinates (bottom-left origin, inverted y-axis)
//! - [`overlay`] - the interaction model for dragging/resizing a signature
//!   mark on a rendered page, expressed as an explicit state machine
//! - [`ledger`] - the authoritative state machine for signature requests
//!   (bearer tokens, expiry, signed/declined transitions)
//! - [`composite`] - burns raster signature images into PDF pages, producing
//!   new document bytes
//! - [`workflow`] - the orchestrator gluing the above into the signer-facing
//!   flow, against external storage and notification collaborators
//! - [`dal`] / [`database`] - SQLite persistence for the request ledger
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use countersign::{Database, SignatureLedger, Signer};
//!
//! let database = Database::new("signing.db");
//! database.run_migrations().await?;
//!
//! let ledger = SignatureLedger::new(countersign::dal::DAL::new(database));
//! let request = ledger
//!     .create_request(document_id, Signer::new("jo@example.com", "Jo"), None, None)
//!     .await?;
//! ```

pub mod composite;
pub mod dal;
pub mod database;
pub mod error;
pub mod geometry;
pub mod ledger;
pub mod models;
pub mod overlay;
pub mod workflow;

pub use composite::{CompositeEngine, CompositeJob, CompositeOutcome, PlacementFailure};
pub use database::Database;
pub use error::{CompositeError, LedgerError, WorkflowError};
pub use geometry::{ContainerSize, FractionalPlacement, ImageDimensions, PageRect, PageSize, PixelRect};
pub use ledger::SignatureLedger;
pub use models::placement::{NewSignaturePlacement, SignaturePlacement};
pub use models::signature_request::{
    NewSignatureRequest, RequestStatus, SignatureKind, SignatureRequest, Signer,
};
pub use overlay::{OverlayBoard, PointerPosition};
pub use workflow::{
    DocumentStore, DocumentVariant, Notifier, SigningMetadata, SigningSession, WorkflowConfig,
    WorkflowOrchestrator,
};

/// Initializes the tracing subscriber for logging.
///
/// Uses `RUST_LOG` when set, otherwise falls back to the provided filter
/// (default `info`). Safe to call more than once; later calls are no-ops.
pub fn init_logging(filter: Option<&str>) {
    let fallback = filter.unwrap_or("info");
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
