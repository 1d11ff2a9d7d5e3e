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

//! Workflow Orchestrator
//!
//! Glues the ledger, the compositing engine, and the external collaborators
//! into the signer-facing flow: share a document, let a signer open their
//! link, composite their signature into the PDF, and notify the owner when
//! everyone required has signed (or someone declined).
//!
//! The orchestrator holds no state of its own. Status authority stays with
//! the ledger; document bytes stay with the [`DocumentStore`].
//!
//! Signing links carry bearer tokens, so URLs produced here must never be
//! logged at INFO level or above.

pub mod collaborators;
pub mod config;

pub use collaborators::{DocumentStore, DocumentVariant, Notifier};
pub use config::WorkflowConfig;

use std::sync::Arc;

use base64::Engine;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::composite::{CompositeEngine, CompositeJob, CompositeOutcome};
use crate::error::{LedgerError, WorkflowError};
use crate::ledger::SignatureLedger;
use crate::models::placement::SignaturePlacement;
use crate::models::signature_request::{RequestStatus, SignatureKind, SignatureRequest, Signer};

/// Audit metadata captured from the signer's request at signing time.
/// Non-authoritative; recorded as-is in the ledger.
#[derive(Debug, Clone, Default)]
pub struct SigningMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Everything a signing UI needs after a signer opens their link.
#[derive(Debug)]
pub struct SigningSession {
    pub request: SignatureRequest,
    /// Placements this signer is expected to fill
    pub placements: Vec<SignaturePlacement>,
    /// The current document rendition to render
    pub document_bytes: Vec<u8>,
}

/// The signer-facing workflow engine.
pub struct WorkflowOrchestrator {
    ledger: SignatureLedger,
    engine: CompositeEngine,
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    config: WorkflowConfig,
}

impl WorkflowOrchestrator {
    pub fn new(
        ledger: SignatureLedger,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        config: WorkflowConfig,
    ) -> Self {
        let engine = CompositeEngine::new().with_label_font_size(config.label_font_size());
        Self {
            ledger,
            engine,
            store,
            notifier,
            config,
        }
    }

    pub fn ledger(&self) -> &SignatureLedger {
        &self.ledger
    }

    /// Shares a document with one or more signers.
    ///
    /// Seeds the default placement when the owner placed no marks, creates
    /// one request per signer, sends each invitation, and marks requests
    /// sent as invitations go out. With `sequential` set, signers get
    /// ascending signing order starting at 1.
    ///
    /// When there is exactly one signer, every unassigned placement is
    /// assigned to their request.
    ///
    /// A notification failure aborts the share mid-way: requests created so
    /// far stay `pending` and can be re-sent.
    pub async fn share_document(
        &self,
        document_id: Uuid,
        signers: Vec<Signer>,
        sequential: bool,
    ) -> Result<Vec<SignatureRequest>, WorkflowError> {
        let placements = self.ledger.placements_or_default(document_id).await?;
        let expires_at = Utc::now() + Duration::days(self.config.expiry_days());

        let single_signer = signers.len() == 1;
        let mut requests = Vec::with_capacity(signers.len());
        for (index, signer) in signers.into_iter().enumerate() {
            let signing_order = sequential.then_some(index as i32 + 1);
            let request = self
                .ledger
                .create_request(document_id, signer, signing_order, Some(expires_at))
                .await?;

            if single_signer {
                for placement in placements.iter().filter(|p| p.request_id.is_none()) {
                    self.ledger.assign_request(placement.id, request.id).await?;
                }
            }

            let url = self.signing_url(&request);
            self.notifier
                .send_signing_invite(&request, &url)
                .await
                .map_err(WorkflowError::Notification)?;
            let request = self.ledger.mark_sent(request.id).await?;

            requests.push(request);
        }

        info!(
            document_id = %document_id,
            signers = requests.len(),
            "Document shared for signing"
        );
        Ok(requests)
    }

    /// The signing link for a request: `{base}/sign/{document_id}?token=...`.
    pub fn signing_url(&self, request: &SignatureRequest) -> Url {
        let mut url = self.config.base_url().clone();
        {
            let mut segments = url
                .path_segments_mut()
                .expect("base URL cannot be a base");
            segments.pop_if_empty();
            segments.push("sign");
            segments.push(&request.document_id.to_string());
        }
        url.query_pairs_mut()
            .append_pair("token", &request.access_token);
        url
    }

    /// Opens a signing session from a signer's link.
    ///
    /// Validates the token, marks the request viewed (idempotently), and
    /// returns the request, the signer's placements, and the document bytes
    /// to render. The latest signed rendition is served when earlier signers
    /// have already left their marks.
    pub async fn begin_signing(
        &self,
        document_id: Uuid,
        token: &str,
    ) -> Result<SigningSession, WorkflowError> {
        let request = self.ledger.validate_token(document_id, token).await?;
        let request = self.ledger.mark_viewed(request.id).await?;

        let placements = self.placements_for_request(&request).await?;
        let document_bytes = self.current_document_bytes(document_id).await?;

        info!(
            request_id = %request.id,
            document_id = %document_id,
            "Signing session opened"
        );
        Ok(SigningSession {
            request,
            placements,
            document_bytes,
        })
    }

    /// Completes signing: composites the signature image into the document,
    /// stores the new rendition, records the terminal transition, and
    /// notifies the owner if the document is now fully executed.
    ///
    /// The ledger transition is the atomicity gate and comes after storage:
    /// a transient store failure surfaces before the request turns terminal,
    /// leaving the ledger pre-completion so the signer can retry. Exactly one
    /// of two concurrent submissions wins `record_signature`.
    pub async fn complete_signing(
        &self,
        document_id: Uuid,
        token: &str,
        signature_image: Vec<u8>,
        signature_kind: SignatureKind,
        metadata: SigningMetadata,
    ) -> Result<SignatureRequest, WorkflowError> {
        let request = self.ledger.validate_token(document_id, token).await?;
        // reject replayed links before touching storage; the in-transaction
        // check below still decides races
        if request.status.is_terminal() {
            return Err(LedgerError::InvalidState {
                request_id: request.id,
                current: request.status,
                attempted: RequestStatus::Signed,
            }
            .into());
        }
        let placements = self.placements_for_request(&request).await?;
        let document_bytes = self.current_document_bytes(document_id).await?;

        let label = format!("Signed: {}", Utc::now().format("%Y-%m-%d"));
        let jobs: Vec<CompositeJob> = placements
            .iter()
            .map(|placement| CompositeJob {
                placement: placement.clone(),
                image_bytes: signature_image.clone(),
                label: Some(label.clone()),
            })
            .collect();

        let CompositeOutcome { bytes, failures } =
            self.engine.composite(&document_bytes, &jobs)?;
        for failure in &failures {
            warn!(
                request_id = %request.id,
                placement_id = %failure.placement_id,
                page = failure.page,
                reason = %failure.reason,
                "Placement skipped during composite"
            );
        }

        self.store
            .put_document(document_id, DocumentVariant::Signed, bytes)
            .await
            .map_err(WorkflowError::Storage)?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(&signature_image);
        let request = self
            .ledger
            .record_signature(
                request.id,
                encoded,
                signature_kind,
                metadata.ip_address,
                metadata.user_agent,
            )
            .await?;

        for placement in placements.iter().filter(|p| p.request_id.is_none()) {
            self.ledger.assign_request(placement.id, request.id).await?;
        }

        info!(
            request_id = %request.id,
            document_id = %document_id,
            "Signing completed"
        );

        if self.ledger.is_document_fully_executed(document_id).await? {
            self.notify_completion(document_id).await;
        }

        Ok(request)
    }

    /// Records a decline and tells the document owner.
    pub async fn decline_signing(
        &self,
        document_id: Uuid,
        token: &str,
        reason: &str,
    ) -> Result<SignatureRequest, WorkflowError> {
        let request = self.ledger.validate_token(document_id, token).await?;
        let request = self.ledger.record_decline(request.id, reason).await?;

        match self.store.document_owner(document_id).await {
            Ok(owner) => {
                if let Err(e) = self.notifier.send_decline_notice(&owner, &request).await {
                    warn!(document_id = %document_id, error = %e, "Decline notice failed");
                }
            }
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "Could not resolve document owner");
            }
        }

        info!(
            request_id = %request.id,
            document_id = %document_id,
            "Signing declined"
        );
        Ok(request)
    }

    /// Placements this request is expected to fill: those assigned to it,
    /// plus any still unassigned when this is the document's only request
    /// (claimed on completion). With multiple signers an unassigned
    /// placement belongs to nobody until the owner assigns it, so no signer
    /// can fill someone else's mark by completing first.
    async fn placements_for_request(
        &self,
        request: &SignatureRequest,
    ) -> Result<Vec<SignaturePlacement>, WorkflowError> {
        let placements = self
            .ledger
            .placements_or_default(request.document_id)
            .await?;
        let requests = self
            .ledger
            .list_requests_for_document(request.document_id)
            .await?;
        let sole_request = requests.len() == 1;
        Ok(placements
            .into_iter()
            .filter(|p| {
                p.request_id == Some(request.id) || (sole_request && p.request_id.is_none())
            })
            .collect())
    }

    /// The latest rendition: the signed copy when one exists, otherwise the
    /// original.
    async fn current_document_bytes(&self, document_id: Uuid) -> Result<Vec<u8>, WorkflowError> {
        if let Some(bytes) = self
            .store
            .get_document(document_id, DocumentVariant::Signed)
            .await
            .map_err(WorkflowError::Storage)?
        {
            return Ok(bytes);
        }
        self.store
            .get_document(document_id, DocumentVariant::Original)
            .await
            .map_err(WorkflowError::Storage)?
            .ok_or_else(|| WorkflowError::Storage(format!("document {} not found", document_id)))
    }

    /// Completion notices are best-effort; a delivery failure never undoes
    /// recorded signatures.
    async fn notify_completion(&self, document_id: Uuid) {
        match self.store.document_owner(document_id).await {
            Ok(owner) => {
                if let Err(e) = self
                    .notifier
                    .send_completion_notice(&owner, document_id)
                    .await
                {
                    warn!(document_id = %document_id, error = %e, "Completion notice failed");
                }
            }
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "Could not resolve document owner");
            }
        }
    }
}
