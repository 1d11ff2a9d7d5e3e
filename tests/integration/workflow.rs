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

//! End-to-end workflow tests against in-memory storage and notification
//! collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use serial_test::serial;
use url::Url;
use uuid::Uuid;

use countersign::{
    DocumentStore, DocumentVariant, LedgerError, NewSignaturePlacement, Notifier, RequestStatus,
    SignatureKind, SignatureRequest, Signer, SigningMetadata, WorkflowConfig, WorkflowError,
    WorkflowOrchestrator,
};

use crate::fixtures::{get_or_init_fixture, sample_pdf, sample_png};

const OWNER_EMAIL: &str = "owner@example.com";

struct MemoryStore {
    docs: Mutex<HashMap<(Uuid, DocumentVariant), Vec<u8>>>,
}

impl MemoryStore {
    fn with_original(document_id: Uuid, bytes: Vec<u8>) -> Arc<Self> {
        let mut docs = HashMap::new();
        docs.insert((document_id, DocumentVariant::Original), bytes);
        Arc::new(Self {
            docs: Mutex::new(docs),
        })
    }

    fn signed_copy(&self, document_id: Uuid) -> Option<Vec<u8>> {
        self.docs
            .lock()
            .unwrap()
            .get(&(document_id, DocumentVariant::Signed))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(
        &self,
        document_id: Uuid,
        variant: DocumentVariant,
    ) -> Result<Option<Vec<u8>>, String> {
        Ok(self.docs.lock().unwrap().get(&(document_id, variant)).cloned())
    }

    async fn put_document(
        &self,
        document_id: Uuid,
        variant: DocumentVariant,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        self.docs.lock().unwrap().insert((document_id, variant), bytes);
        Ok(())
    }

    async fn document_owner(&self, _document_id: Uuid) -> Result<String, String> {
        Ok(OWNER_EMAIL.to_string())
    }
}

/// A document store whose next `put_document` calls fail, then recover.
struct FlakyStore {
    docs: Mutex<HashMap<(Uuid, DocumentVariant), Vec<u8>>>,
    puts_to_fail: Mutex<u32>,
}

impl FlakyStore {
    fn with_original(document_id: Uuid, bytes: Vec<u8>, puts_to_fail: u32) -> Arc<Self> {
        let mut docs = HashMap::new();
        docs.insert((document_id, DocumentVariant::Original), bytes);
        Arc::new(Self {
            docs: Mutex::new(docs),
            puts_to_fail: Mutex::new(puts_to_fail),
        })
    }

    fn signed_copy(&self, document_id: Uuid) -> Option<Vec<u8>> {
        self.docs
            .lock()
            .unwrap()
            .get(&(document_id, DocumentVariant::Signed))
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get_document(
        &self,
        document_id: Uuid,
        variant: DocumentVariant,
    ) -> Result<Option<Vec<u8>>, String> {
        Ok(self.docs.lock().unwrap().get(&(document_id, variant)).cloned())
    }

    async fn put_document(
        &self,
        document_id: Uuid,
        variant: DocumentVariant,
        bytes: Vec<u8>,
    ) -> Result<(), String> {
        let mut remaining = self.puts_to_fail.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err("transient storage outage".to_string());
        }
        self.docs.lock().unwrap().insert((document_id, variant), bytes);
        Ok(())
    }

    async fn document_owner(&self, _document_id: Uuid) -> Result<String, String> {
        Ok(OWNER_EMAIL.to_string())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    invites: Mutex<Vec<(Uuid, Url)>>,
    completions: Mutex<Vec<(String, Uuid)>>,
    declines: Mutex<Vec<(String, Uuid)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_signing_invite(
        &self,
        request: &SignatureRequest,
        signing_url: &Url,
    ) -> Result<(), String> {
        self.invites
            .lock()
            .unwrap()
            .push((request.id, signing_url.clone()));
        Ok(())
    }

    async fn send_completion_notice(
        &self,
        owner_email: &str,
        document_id: Uuid,
    ) -> Result<(), String> {
        self.completions
            .lock()
            .unwrap()
            .push((owner_email.to_string(), document_id));
        Ok(())
    }

    async fn send_decline_notice(
        &self,
        owner_email: &str,
        request: &SignatureRequest,
    ) -> Result<(), String> {
        self.declines
            .lock()
            .unwrap()
            .push((owner_email.to_string(), request.id));
        Ok(())
    }
}

async fn orchestrator(
    store: Arc<dyn DocumentStore>,
    notifier: Arc<RecordingNotifier>,
) -> WorkflowOrchestrator {
    let fixture = get_or_init_fixture().await;
    let ledger = {
        let mut f = fixture.lock().unwrap();
        f.reset_database();
        f.get_ledger()
    };
    let config = WorkflowConfig::new(Url::parse("https://sign.example.com").unwrap());
    WorkflowOrchestrator::new(ledger, store, notifier, config)
}

fn token_from_invite(url: &Url) -> String {
    url.query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.to_string())
        .expect("invite URL carries a token")
}

#[tokio::test]
#[serial]
async fn share_sends_invites_and_builds_signing_links() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(2));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store, notifier.clone()).await;

    let requests = flow
        .share_document(
            document_id,
            vec![Signer::new("sam@example.com", "Sam")],
            false,
        )
        .await
        .unwrap();

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, RequestStatus::Sent);

    let invites = notifier.invites.lock().unwrap().clone();
    assert_eq!(invites.len(), 1);
    let (invited_request, url) = &invites[0];
    assert_eq!(*invited_request, requests[0].id);
    assert_eq!(url.host_str(), Some("sign.example.com"));
    assert_eq!(url.path(), format!("/sign/{}", document_id));
    assert_eq!(token_from_invite(url), requests[0].access_token);

    // the sole signer owns the seeded default placement
    let placements = flow
        .ledger()
        .placements_for_document(document_id)
        .await
        .unwrap();
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].request_id, Some(requests[0].id));
}

#[tokio::test]
#[serial]
async fn full_signing_flow_embeds_and_notifies() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(2));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store.clone(), notifier.clone()).await;

    flow.share_document(
        document_id,
        vec![Signer::new("sam@example.com", "Sam")],
        false,
    )
    .await
    .unwrap();
    let token = token_from_invite(&notifier.invites.lock().unwrap()[0].1);

    let session = flow.begin_signing(document_id, &token).await.unwrap();
    assert_eq!(session.request.status, RequestStatus::Viewed);
    assert_eq!(session.placements.len(), 1);
    assert_eq!(session.document_bytes, sample_pdf(2));

    let signature = sample_png(400, 150);
    let signed = flow
        .complete_signing(
            document_id,
            &token,
            signature.clone(),
            SignatureKind::Drawn,
            SigningMetadata {
                ip_address: Some("203.0.113.9".to_string()),
                user_agent: Some("TestAgent/1.0".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(signed.status, RequestStatus::Signed);
    assert_eq!(
        signed.signature_data.as_deref().unwrap(),
        base64::engine::general_purpose::STANDARD.encode(&signature)
    );
    assert_eq!(signed.ip_address.as_deref(), Some("203.0.113.9"));

    // the signed rendition exists, parses, and carries the embedded mark
    let signed_bytes = store.signed_copy(document_id).unwrap();
    let doc = lopdf::Document::load_mem(&signed_bytes).unwrap();
    let pages = doc.get_pages();
    let page = doc.get_object(pages[&1]).unwrap().as_dict().unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    assert!(resources.get(b"XObject").unwrap().as_dict().unwrap().has(b"CsIm0"));

    // one signer, fully executed, owner notified once
    let completions = notifier.completions.lock().unwrap();
    assert_eq!(completions.as_slice(), &[(OWNER_EMAIL.to_string(), document_id)]);
}

#[tokio::test]
#[serial]
async fn sequential_share_orders_signers() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(1));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store, notifier).await;

    let requests = flow
        .share_document(
            document_id,
            vec![
                Signer::new("first@example.com", "First"),
                Signer::new("second@example.com", "Second"),
            ],
            true,
        )
        .await
        .unwrap();

    assert_eq!(requests[0].signing_order, Some(1));
    assert_eq!(requests[1].signing_order, Some(2));

    // with multiple signers nobody auto-claims the default placement
    let placements = flow
        .ledger()
        .placements_for_document(document_id)
        .await
        .unwrap();
    assert!(placements.iter().all(|p| p.request_id.is_none()));
}

#[tokio::test]
#[serial]
async fn two_signers_complete_on_their_own_placements() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(1));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store.clone(), notifier.clone()).await;

    // two explicit marks, one per signer
    let p1 = flow
        .ledger()
        .add_placement(NewSignaturePlacement {
            document_id,
            request_id: None,
            page: 1,
            x: 0.1,
            y: 0.8,
            width: 0.2,
            required: true,
            label: "Tenant".to_string(),
        })
        .await
        .unwrap();
    let p2 = flow
        .ledger()
        .add_placement(NewSignaturePlacement {
            document_id,
            request_id: None,
            page: 1,
            x: 0.6,
            y: 0.8,
            width: 0.2,
            required: true,
            label: "Landlord".to_string(),
        })
        .await
        .unwrap();

    let requests = flow
        .share_document(
            document_id,
            vec![
                Signer::new("tenant@example.com", "Tenant"),
                Signer::new("landlord@example.com", "Landlord"),
            ],
            false,
        )
        .await
        .unwrap();
    flow.ledger().assign_request(p1.id, requests[0].id).await.unwrap();
    flow.ledger().assign_request(p2.id, requests[1].id).await.unwrap();

    let invites = notifier.invites.lock().unwrap().clone();
    let token_a = token_from_invite(&invites[0].1);
    let token_b = token_from_invite(&invites[1].1);

    flow.complete_signing(
        document_id,
        &token_a,
        sample_png(300, 100),
        SignatureKind::Drawn,
        SigningMetadata::default(),
    )
    .await
    .unwrap();

    // one of two required marks signed: not done yet
    assert!(notifier.completions.lock().unwrap().is_empty());
    assert!(!flow
        .ledger()
        .is_document_fully_executed(document_id)
        .await
        .unwrap());

    // the second signer composites on top of the first rendition
    let session_b = flow.begin_signing(document_id, &token_b).await.unwrap();
    assert_eq!(session_b.document_bytes, store.signed_copy(document_id).unwrap());
    assert_eq!(session_b.placements.len(), 1);
    assert_eq!(session_b.placements[0].id, p2.id);

    flow.complete_signing(
        document_id,
        &token_b,
        sample_png(300, 100),
        SignatureKind::Typed,
        SigningMetadata::default(),
    )
    .await
    .unwrap();

    assert!(flow
        .ledger()
        .is_document_fully_executed(document_id)
        .await
        .unwrap());
    assert_eq!(notifier.completions.lock().unwrap().len(), 1);

    // both marks survive in the final rendition
    let final_bytes = store.signed_copy(document_id).unwrap();
    let doc = lopdf::Document::load_mem(&final_bytes).unwrap();
    let pages = doc.get_pages();
    let page = doc.get_object(pages[&1]).unwrap().as_dict().unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    assert!(xobjects.has(b"CsIm0"));
}

#[tokio::test]
#[serial]
async fn storage_failure_leaves_signing_retryable() {
    let document_id = Uuid::new_v4();
    let store = FlakyStore::with_original(document_id, sample_pdf(1), 1);
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store.clone(), notifier.clone()).await;

    let requests = flow
        .share_document(
            document_id,
            vec![Signer::new("sam@example.com", "Sam")],
            false,
        )
        .await
        .unwrap();
    let token = token_from_invite(&notifier.invites.lock().unwrap()[0].1);

    let err = flow
        .complete_signing(
            document_id,
            &token,
            sample_png(200, 80),
            SignatureKind::Drawn,
            SigningMetadata::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Storage(_)));

    // the request never turned terminal and no partial rendition exists
    let status = flow
        .ledger()
        .get_request_status(requests[0].id)
        .await
        .unwrap();
    assert_eq!(status, RequestStatus::Sent);
    assert!(store.signed_copy(document_id).is_none());
    assert!(notifier.completions.lock().unwrap().is_empty());

    // once storage recovers, the same link completes normally
    let signed = flow
        .complete_signing(
            document_id,
            &token,
            sample_png(200, 80),
            SignatureKind::Drawn,
            SigningMetadata::default(),
        )
        .await
        .unwrap();
    assert_eq!(signed.status, RequestStatus::Signed);
    assert!(store.signed_copy(document_id).is_some());
    assert_eq!(notifier.completions.lock().unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn first_completer_cannot_claim_other_signers_marks() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(1));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store, notifier.clone()).await;

    let requests = flow
        .share_document(
            document_id,
            vec![
                Signer::new("first@example.com", "First"),
                Signer::new("second@example.com", "Second"),
            ],
            false,
        )
        .await
        .unwrap();
    let invites = notifier.invites.lock().unwrap().clone();
    let token_a = token_from_invite(&invites[0].1);

    flow.complete_signing(
        document_id,
        &token_a,
        sample_png(300, 100),
        SignatureKind::Drawn,
        SigningMetadata::default(),
    )
    .await
    .unwrap();

    // the seeded default placement belongs to nobody, so the document stays
    // open and the owner hears nothing yet
    let placements = flow
        .ledger()
        .placements_for_document(document_id)
        .await
        .unwrap();
    assert!(placements.iter().all(|p| p.request_id.is_none()));
    assert!(!flow
        .ledger()
        .is_document_fully_executed(document_id)
        .await
        .unwrap());
    assert!(notifier.completions.lock().unwrap().is_empty());

    // the second signer is still expected
    let status_b = flow
        .ledger()
        .get_request_status(requests[1].id)
        .await
        .unwrap();
    assert_eq!(status_b, RequestStatus::Sent);
}

#[tokio::test]
#[serial]
async fn decline_records_reason_and_notifies_owner() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(1));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store, notifier.clone()).await;

    flow.share_document(
        document_id,
        vec![Signer::new("sam@example.com", "Sam")],
        false,
    )
    .await
    .unwrap();
    let token = token_from_invite(&notifier.invites.lock().unwrap()[0].1);

    // a reason is mandatory
    let err = flow
        .decline_signing(document_id, &token, "  ")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Ledger(LedgerError::MissingDeclineReason)
    ));

    let declined = flow
        .decline_signing(document_id, &token, "Names are wrong")
        .await
        .unwrap();
    assert_eq!(declined.status, RequestStatus::Declined);
    assert_eq!(declined.decline_reason.as_deref(), Some("Names are wrong"));

    let declines = notifier.declines.lock().unwrap();
    assert_eq!(declines.as_slice(), &[(OWNER_EMAIL.to_string(), declined.id)]);
}

#[tokio::test]
#[serial]
async fn invalid_tokens_map_to_safe_signer_messages() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(1));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store, notifier).await;

    let err = flow
        .begin_signing(document_id, "0000000000000000")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Ledger(LedgerError::NotFound)));
    assert_eq!(err.signer_message(), "This signing link is not valid.");
}

#[tokio::test]
#[serial]
async fn signed_links_cannot_be_reused() {
    let document_id = Uuid::new_v4();
    let store = MemoryStore::with_original(document_id, sample_pdf(1));
    let notifier = Arc::new(RecordingNotifier::default());
    let flow = orchestrator(store.clone(), notifier.clone()).await;

    flow.share_document(
        document_id,
        vec![Signer::new("sam@example.com", "Sam")],
        false,
    )
    .await
    .unwrap();
    let token = token_from_invite(&notifier.invites.lock().unwrap()[0].1);

    flow.complete_signing(
        document_id,
        &token,
        sample_png(200, 80),
        SignatureKind::Drawn,
        SigningMetadata::default(),
    )
    .await
    .unwrap();
    let signed_bytes = store.signed_copy(document_id).unwrap();

    let err = flow
        .complete_signing(
            document_id,
            &token,
            sample_png(200, 80),
            SignatureKind::Drawn,
            SigningMetadata::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Ledger(LedgerError::InvalidState { .. })
    ));
    assert_eq!(
        err.signer_message(),
        "This document was already signed or declined."
    );
    // the replay never touched the stored rendition
    assert_eq!(store.signed_copy(document_id).unwrap(), signed_bytes);
}
