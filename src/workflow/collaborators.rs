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

//! External collaborator traits.
//!
//! Document storage and notification delivery live outside this crate; the
//! orchestrator only sees these seams. Implementations return plain string
//! errors, which the orchestrator wraps into [`crate::WorkflowError`].

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::models::signature_request::SignatureRequest;

/// Which rendition of a document to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentVariant {
    /// The document as uploaded, before any signatures
    Original,
    /// The latest composited rendition with embedded signatures
    Signed,
}

/// Storage for document bytes, keyed by document id and variant.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document rendition. `Ok(None)` means the variant does not
    /// exist yet (e.g. nobody has signed, so there is no `Signed` copy).
    async fn get_document(
        &self,
        document_id: Uuid,
        variant: DocumentVariant,
    ) -> Result<Option<Vec<u8>>, String>;

    /// Stores (or replaces) a document rendition.
    async fn put_document(
        &self,
        document_id: Uuid,
        variant: DocumentVariant,
        bytes: Vec<u8>,
    ) -> Result<(), String>;

    /// The email address of the document's owner, for completion and
    /// decline notices.
    async fn document_owner(&self, document_id: Uuid) -> Result<String, String>;
}

/// Outbound notifications to signers and document owners.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Invites a signer via their signing link.
    async fn send_signing_invite(
        &self,
        request: &SignatureRequest,
        signing_url: &Url,
    ) -> Result<(), String>;

    /// Tells the owner every required signature has landed.
    async fn send_completion_notice(
        &self,
        owner_email: &str,
        document_id: Uuid,
    ) -> Result<(), String>;

    /// Tells the owner a signer declined, including their reason.
    async fn send_decline_notice(
        &self,
        owner_email: &str,
        request: &SignatureRequest,
    ) -> Result<(), String>;
}
