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

//! Error types for the signing workflow.
//!
//! Each subsystem has its own taxonomy; the orchestrator wraps them in
//! [`WorkflowError`] so callers can map failures to signer-facing messages
//! without exposing internal identifiers or stack details.

use thiserror::Error;
use uuid::Uuid;

use crate::models::signature_request::RequestStatus;

/// Errors produced by the signature request ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No request matches the given id, document, or token.
    #[error("Signature request not found")]
    NotFound,

    /// The request's `expires_at` has passed. Evaluated at read time from the
    /// stored deadline, never from a cached status.
    #[error("Signature request {request_id} has expired")]
    Expired { request_id: Uuid },

    /// An illegal state-machine transition was attempted, e.g. signing a
    /// request that is already signed or declined.
    #[error("Illegal transition for request {request_id}: {current} -> {attempted}")]
    InvalidState {
        request_id: Uuid,
        current: RequestStatus,
        attempted: RequestStatus,
    },

    /// A decline was recorded without a reason.
    #[error("A decline reason is required")]
    MissingDeclineReason,

    /// A placement violates its bounds invariants.
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Failed to get a connection from the pool.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A stored row could not be decoded into a domain value.
    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),
}

/// Errors produced by the compositing engine.
///
/// A malformed source document or an out-of-range placement aborts the whole
/// composite before anything is embedded. A single unreadable signature image
/// is NOT an error at this level; it is collected per placement in
/// [`crate::composite::CompositeOutcome::failures`] while the rest of the
/// batch proceeds.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// The source document bytes could not be parsed. Fatal.
    #[error("Unreadable source document: {0}")]
    DocumentParse(lopdf::Error),

    /// A placement references a page outside the document, or its fractional
    /// rectangle falls outside the unit square. Fatal, never silently dropped.
    #[error("Invalid placement {placement_id}: {reason}")]
    InvalidPlacement { placement_id: Uuid, reason: String },

    /// Serializing the modified document failed.
    #[error("Failed to serialize composited document: {0}")]
    Serialize(std::io::Error),
}

/// Errors surfaced by the workflow orchestrator.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Composite(#[from] CompositeError),

    /// The document store collaborator failed.
    #[error("Document store error: {0}")]
    Storage(String),

    /// The notifier collaborator failed where delivery is mandatory.
    #[error("Notification error: {0}")]
    Notification(String),
}

impl WorkflowError {
    /// A short, signer-safe description of the failure.
    ///
    /// Never includes internal identifiers; suitable for rendering on the
    /// signer-facing "cannot sign" page.
    pub fn signer_message(&self) -> &'static str {
        match self {
            WorkflowError::Ledger(LedgerError::NotFound) => {
                "This signing link is not valid."
            }
            WorkflowError::Ledger(LedgerError::Expired { .. }) => {
                "This signing link has expired."
            }
            WorkflowError::Ledger(LedgerError::InvalidState { .. }) => {
                "This document was already signed or declined."
            }
            _ => "Something went wrong. Please contact the document owner.",
        }
    }
}
