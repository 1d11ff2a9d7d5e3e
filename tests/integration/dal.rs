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

//! DAL-level tests: persistence round trips and the status state machine at
//! the storage boundary.

use chrono::{Duration, Utc};
use serial_test::serial;
use uuid::Uuid;

use countersign::dal::DAL;
use countersign::{
    LedgerError, NewSignatureRequest, NewSignaturePlacement, RequestStatus, SignatureKind, Signer,
};

use crate::fixtures::get_or_init_fixture;

async fn fresh_dal() -> DAL {
    let fixture = get_or_init_fixture().await;
    let mut f = fixture.lock().unwrap();
    f.reset_database();
    f.get_dal()
}

fn new_request(document_id: Uuid, token: &str) -> NewSignatureRequest {
    NewSignatureRequest {
        document_id,
        signer: Signer::new("signer@example.com", "Sam Signer"),
        access_token: token.to_string(),
        signing_order: None,
        expires_at: Some(Utc::now() + Duration::days(30)),
    }
}

#[tokio::test]
#[serial]
async fn create_and_get_round_trip() {
    let dal = fresh_dal().await;
    let document_id = Uuid::new_v4();

    let created = dal
        .signature_requests()
        .create(new_request(document_id, "token-a"))
        .await
        .unwrap();

    assert_eq!(created.status, RequestStatus::Pending);
    assert_eq!(created.document_id, document_id);
    assert_eq!(created.signer_email, "signer@example.com");
    assert_eq!(created.signer_role, "signer");
    assert!(created.signed_at.is_none());
    assert!(created.signature_data.is_none());

    let fetched = dal.signature_requests().get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.access_token, "token-a");
    assert_eq!(fetched.expires_at, created.expires_at);
}

#[tokio::test]
#[serial]
async fn get_by_id_unknown_is_not_found() {
    let dal = fresh_dal().await;
    let err = dal
        .signature_requests()
        .get_by_id(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));
}

#[tokio::test]
#[serial]
async fn list_for_document_filters_and_orders() {
    let dal = fresh_dal().await;
    let doc_a = Uuid::new_v4();
    let doc_b = Uuid::new_v4();

    let first = dal
        .signature_requests()
        .create(new_request(doc_a, "t1"))
        .await
        .unwrap();
    let second = dal
        .signature_requests()
        .create(new_request(doc_a, "t2"))
        .await
        .unwrap();
    dal.signature_requests()
        .create(new_request(doc_b, "t3"))
        .await
        .unwrap();

    let listed = dal
        .signature_requests()
        .list_for_document(doc_a)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id);
    assert_eq!(listed[1].id, second.id);
}

#[tokio::test]
#[serial]
async fn sent_and_viewed_transitions_are_ordered_and_idempotent() {
    let dal = fresh_dal().await;
    let request = dal
        .signature_requests()
        .create(new_request(Uuid::new_v4(), "t"))
        .await
        .unwrap();

    let sent = dal.signature_requests().mark_sent(request.id).await.unwrap();
    assert_eq!(sent.status, RequestStatus::Sent);

    // repeat send is a no-op
    let sent_again = dal.signature_requests().mark_sent(request.id).await.unwrap();
    assert_eq!(sent_again.status, RequestStatus::Sent);

    let viewed = dal
        .signature_requests()
        .mark_viewed(request.id)
        .await
        .unwrap();
    assert_eq!(viewed.status, RequestStatus::Viewed);

    // repeat view is a no-op
    let viewed_again = dal
        .signature_requests()
        .mark_viewed(request.id)
        .await
        .unwrap();
    assert_eq!(viewed_again.status, RequestStatus::Viewed);

    // sending after viewing is illegal
    let err = dal
        .signature_requests()
        .mark_sent(request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState { .. }));
}

#[tokio::test]
#[serial]
async fn record_signature_writes_audit_fields_once() {
    let dal = fresh_dal().await;
    let request = dal
        .signature_requests()
        .create(new_request(Uuid::new_v4(), "t"))
        .await
        .unwrap();

    let signed = dal
        .signature_requests()
        .record_signature(
            request.id,
            "aW1hZ2U=".to_string(),
            SignatureKind::Drawn,
            Some("203.0.113.9".to_string()),
            Some("TestAgent/1.0".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(signed.status, RequestStatus::Signed);
    assert!(signed.signed_at.is_some());
    assert_eq!(signed.signature_data.as_deref(), Some("aW1hZ2U="));
    assert_eq!(signed.signature_kind, Some(SignatureKind::Drawn));
    assert_eq!(signed.ip_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(signed.user_agent.as_deref(), Some("TestAgent/1.0"));

    // a second submission loses
    let err = dal
        .signature_requests()
        .record_signature(
            request.id,
            "b3RoZXI=".to_string(),
            SignatureKind::Typed,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidState {
            current: RequestStatus::Signed,
            ..
        }
    ));

    // and the first signature is untouched
    let fetched = dal.signature_requests().get_by_id(request.id).await.unwrap();
    assert_eq!(fetched.signature_data.as_deref(), Some("aW1hZ2U="));
    assert_eq!(fetched.signature_kind, Some(SignatureKind::Drawn));
}

#[tokio::test]
#[serial]
async fn record_decline_is_terminal() {
    let dal = fresh_dal().await;
    let request = dal
        .signature_requests()
        .create(new_request(Uuid::new_v4(), "t"))
        .await
        .unwrap();

    let declined = dal
        .signature_requests()
        .record_decline(request.id, "Wrong document version".to_string())
        .await
        .unwrap();
    assert_eq!(declined.status, RequestStatus::Declined);
    assert!(declined.declined_at.is_some());
    assert_eq!(
        declined.decline_reason.as_deref(),
        Some("Wrong document version")
    );

    // no resurrection: neither signing nor viewing works afterwards
    let err = dal
        .signature_requests()
        .record_signature(request.id, "eA==".to_string(), SignatureKind::Drawn, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState { .. }));

    let err = dal
        .signature_requests()
        .mark_viewed(request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState { .. }));
}

#[tokio::test]
#[serial]
async fn past_deadline_blocks_signer_transitions() {
    let dal = fresh_dal().await;
    let mut new = new_request(Uuid::new_v4(), "t");
    new.expires_at = Some(Utc::now() - Duration::hours(1));
    let request = dal.signature_requests().create(new).await.unwrap();

    // the stored status is still pending, but the deadline wins
    let err = dal
        .signature_requests()
        .mark_viewed(request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Expired { .. }));

    let err = dal
        .signature_requests()
        .record_signature(request.id, "eA==".to_string(), SignatureKind::Drawn, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Expired { .. }));

    let err = dal
        .signature_requests()
        .record_decline(request.id, "too late anyway".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Expired { .. }));

    let fetched = dal.signature_requests().get_by_id(request.id).await.unwrap();
    assert_eq!(fetched.status, RequestStatus::Pending);
}

#[tokio::test]
#[serial]
async fn placements_round_trip_and_assignment() {
    let dal = fresh_dal().await;
    let document_id = Uuid::new_v4();

    let placement = dal
        .placements()
        .create(NewSignaturePlacement {
            document_id,
            request_id: None,
            page: 2,
            x: 0.15,
            y: 0.6,
            width: 0.3,
            required: true,
            label: "Initials".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(placement.page, 2);
    assert!(placement.required);
    assert!(placement.request_id.is_none());

    let listed = dal.placements().list_for_document(document_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].label, "Initials");

    let request = dal
        .signature_requests()
        .create(new_request(document_id, "t"))
        .await
        .unwrap();
    let assigned = dal
        .placements()
        .assign_request(placement.id, request.id)
        .await
        .unwrap();
    assert_eq!(assigned.request_id, Some(request.id));

    let err = dal
        .placements()
        .assign_request(Uuid::new_v4(), request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));
}
