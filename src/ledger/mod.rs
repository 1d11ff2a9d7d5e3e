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

//! Signature Request Ledger
//!
//! The authoritative state machine for signature requests. The ledger owns
//! token generation and validation, the status lifecycle
//! (`pending -> sent -> viewed -> signed | declined`), read-time expiry
//! classification, and placement bookkeeping.
//!
//! Access tokens are bearer credentials. They are generated from 32 bytes of
//! OS randomness, compared via SHA-256 digest equality rather than direct
//! string comparison, and must never be logged at INFO level or above.
//!
//! Expiry is evaluated against the stored `expires_at` at read time, never
//! cached in the status column. A request whose stored status says `sent`
//! still reads as expired once its deadline passes, and terminal transitions
//! re-check the deadline inside their transaction.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::LedgerError;
use crate::models::placement::{NewSignaturePlacement, SignaturePlacement};
use crate::models::signature_request::{
    NewSignatureRequest, RequestStatus, SignatureKind, SignatureRequest, Signer,
};

/// Days until a request expires when the caller does not pick a deadline.
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// The signature request ledger.
///
/// Cheap to clone; all state lives in the database behind the DAL.
#[derive(Clone, Debug)]
pub struct SignatureLedger {
    dal: DAL,
}

impl SignatureLedger {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    /// Creates a signature request for a document and signer.
    ///
    /// Generates a fresh access token. When `expires_at` is `None` the
    /// request expires [`DEFAULT_EXPIRY_DAYS`] from now; pass an explicit
    /// deadline to override.
    pub async fn create_request(
        &self,
        document_id: Uuid,
        signer: Signer,
        signing_order: Option<i32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<SignatureRequest, LedgerError> {
        let expires_at =
            expires_at.unwrap_or_else(|| Utc::now() + Duration::days(DEFAULT_EXPIRY_DAYS));
        let access_token = generate_access_token();

        let request = self
            .dal
            .signature_requests()
            .create(NewSignatureRequest {
                document_id,
                signer,
                access_token,
                signing_order,
                expires_at: Some(expires_at),
            })
            .await?;

        info!(
            request_id = %request.id,
            document_id = %document_id,
            expires_at = %expires_at,
            "Created signature request"
        );
        Ok(request)
    }

    /// Resolves an access token to its signature request.
    ///
    /// The token is matched against the document's requests by SHA-256
    /// digest equality. An unknown token yields `NotFound` without revealing
    /// whether the document exists; a matched but past-deadline request
    /// yields `Expired`.
    pub async fn validate_token(
        &self,
        document_id: Uuid,
        token: &str,
    ) -> Result<SignatureRequest, LedgerError> {
        let token_digest = Sha256::digest(token.as_bytes());

        let requests = self
            .dal
            .signature_requests()
            .list_for_document(document_id)
            .await?;

        let request = requests
            .into_iter()
            .find(|r| Sha256::digest(r.access_token.as_bytes()) == token_digest)
            .ok_or(LedgerError::NotFound)?;

        if self.is_expired(&request) {
            debug!(request_id = %request.id, "Token resolved to an expired request");
            return Err(LedgerError::Expired {
                request_id: request.id,
            });
        }

        debug!(request_id = %request.id, "Token validated");
        Ok(request)
    }

    /// True when the request's deadline has passed. Terminal requests never
    /// read as expired; their outcome was reached in time.
    pub fn is_expired(&self, request: &SignatureRequest) -> bool {
        if request.status.is_terminal() {
            return false;
        }
        matches!(request.expires_at, Some(deadline) if deadline <= Utc::now())
    }

    /// The status a reader should see: the stored status, overridden to
    /// `Expired` when the deadline has passed on a non-terminal request.
    pub fn effective_status(&self, request: &SignatureRequest) -> RequestStatus {
        if self.is_expired(request) {
            RequestStatus::Expired
        } else {
            request.status
        }
    }

    /// Fetches a request by id.
    pub async fn get_request(&self, request_id: Uuid) -> Result<SignatureRequest, LedgerError> {
        self.dal.signature_requests().get_by_id(request_id).await
    }

    /// The effective status of a request by id: stored status with the
    /// read-time expiry override applied.
    pub async fn get_request_status(&self, request_id: Uuid) -> Result<RequestStatus, LedgerError> {
        let request = self.get_request(request_id).await?;
        Ok(self.effective_status(&request))
    }

    /// Lists a document's requests, oldest first.
    pub async fn list_requests_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<SignatureRequest>, LedgerError> {
        self.dal
            .signature_requests()
            .list_for_document(document_id)
            .await
    }

    /// Marks a request as sent after its invitation went out.
    pub async fn mark_sent(&self, request_id: Uuid) -> Result<SignatureRequest, LedgerError> {
        let request = self.dal.signature_requests().mark_sent(request_id).await?;
        debug!(request_id = %request_id, "Request marked sent");
        Ok(request)
    }

    /// Marks a request as viewed when the signer first opens the link.
    /// Idempotent for repeat visits.
    pub async fn mark_viewed(&self, request_id: Uuid) -> Result<SignatureRequest, LedgerError> {
        let request = self.dal.signature_requests().mark_viewed(request_id).await?;
        debug!(request_id = %request_id, "Request marked viewed");
        Ok(request)
    }

    /// Records a signature, moving the request to its `signed` terminal
    /// state with audit metadata. Exactly one of two concurrent submissions
    /// succeeds; the other gets `InvalidState`.
    pub async fn record_signature(
        &self,
        request_id: Uuid,
        signature_data: String,
        signature_kind: SignatureKind,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<SignatureRequest, LedgerError> {
        let request = self
            .dal
            .signature_requests()
            .record_signature(request_id, signature_data, signature_kind, ip_address, user_agent)
            .await?;

        info!(
            request_id = %request_id,
            document_id = %request.document_id,
            kind = signature_kind.as_str(),
            "Signature recorded"
        );
        Ok(request)
    }

    /// Records a decline with its mandatory reason.
    pub async fn record_decline(
        &self,
        request_id: Uuid,
        reason: &str,
    ) -> Result<SignatureRequest, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::MissingDeclineReason);
        }

        let request = self
            .dal
            .signature_requests()
            .record_decline(request_id, reason.to_string())
            .await?;

        info!(
            request_id = %request_id,
            document_id = %request.document_id,
            "Decline recorded"
        );
        Ok(request)
    }

    /// True when every required placement on the document has been signed.
    ///
    /// A required placement with no assigned request can never be satisfied,
    /// so the document is not fully executed. A document with no required
    /// placements falls back to request-level completion: at least one
    /// request exists and all of them are signed.
    pub async fn is_document_fully_executed(
        &self,
        document_id: Uuid,
    ) -> Result<bool, LedgerError> {
        let requests = self
            .dal
            .signature_requests()
            .list_for_document(document_id)
            .await?;
        let placements = self.dal.placements().list_for_document(document_id).await?;

        let required: Vec<&SignaturePlacement> =
            placements.iter().filter(|p| p.required).collect();

        if required.is_empty() {
            return Ok(!requests.is_empty()
                && requests.iter().all(|r| r.status == RequestStatus::Signed));
        }

        Ok(required.iter().all(|placement| {
            placement.request_id.map_or(false, |request_id| {
                requests
                    .iter()
                    .any(|r| r.id == request_id && r.status == RequestStatus::Signed)
            })
        }))
    }

    /// Adds a placement after validating its fractional bounds.
    pub async fn add_placement(
        &self,
        new_placement: NewSignaturePlacement,
    ) -> Result<SignaturePlacement, LedgerError> {
        let candidate = SignaturePlacement {
            id: Uuid::nil(),
            document_id: new_placement.document_id,
            request_id: new_placement.request_id,
            page: new_placement.page,
            x: new_placement.x,
            y: new_placement.y,
            width: new_placement.width,
            required: new_placement.required,
            label: new_placement.label.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        candidate
            .validate_bounds()
            .map_err(LedgerError::InvalidPlacement)?;

        self.dal.placements().create(new_placement).await
    }

    /// Lists a document's placements, oldest first.
    pub async fn placements_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<SignaturePlacement>, LedgerError> {
        self.dal.placements().list_for_document(document_id).await
    }

    /// Returns the document's placements, seeding the system default (bottom
    /// of page 1) when the owner placed no marks before sharing.
    pub async fn placements_or_default(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<SignaturePlacement>, LedgerError> {
        let placements = self.dal.placements().list_for_document(document_id).await?;
        if !placements.is_empty() {
            return Ok(placements);
        }

        debug!(document_id = %document_id, "No placements; seeding system default");
        let seeded = self
            .dal
            .placements()
            .create(NewSignaturePlacement::system_default(document_id))
            .await?;
        Ok(vec![seeded])
    }

    /// Ties a placement to the request expected to fill it.
    pub async fn assign_request(
        &self,
        placement_id: Uuid,
        request_id: Uuid,
    ) -> Result<SignaturePlacement, LedgerError> {
        self.dal
            .placements()
            .assign_request(placement_id, request_id)
            .await
    }
}

/// Generates a new bearer token: 32 bytes of OS randomness, hex-encoded.
fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
