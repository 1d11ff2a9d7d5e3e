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

//! Signature request persistence operations.
//!
//! Terminal transitions (`record_signature`, `record_decline`) follow a
//! load-classify-conditional-update pattern inside a single transaction:
//! the row is read, its stored status and deadline are classified, and the
//! update only happens if the transition is legal. Combined with the
//! single-connection pool this makes concurrent submissions resolve to
//! exactly one winner; the loser observes `InvalidState` or `Expired`.

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use super::models::{
    current_timestamp_string, string_to_datetime, uuid_to_blob, NewSqliteSignatureRequest,
    SqliteSignatureRequest,
};
use super::DAL;
use crate::database::schema::signature_requests;
use crate::error::LedgerError;
use crate::models::signature_request::{
    NewSignatureRequest, RequestStatus, SignatureKind, SignatureRequest,
};

/// Data access layer for signature request operations.
#[derive(Clone)]
pub struct SignatureRequestDAL<'a> {
    dal: &'a DAL,
}

/// True when the stored deadline has passed. Rows with no deadline never
/// expire.
fn deadline_passed(expires_at: &Option<String>) -> Result<bool, LedgerError> {
    match expires_at {
        Some(s) => {
            let deadline = string_to_datetime(s).map_err(LedgerError::Corrupt)?;
            Ok(deadline <= Utc::now())
        }
        None => Ok(false),
    }
}

fn parse_status(row: &SqliteSignatureRequest) -> Result<RequestStatus, LedgerError> {
    RequestStatus::parse(&row.status)
        .ok_or_else(|| LedgerError::Corrupt(format!("unknown status '{}'", row.status)))
}

impl<'a> SignatureRequestDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new signature request record. New requests always start in
    /// the `pending` status.
    pub async fn create(
        &self,
        new_request: NewSignatureRequest,
    ) -> Result<SignatureRequest, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        // UUIDs and timestamps are generated client-side for SQLite
        let id = Uuid::new_v4();
        let now = current_timestamp_string();
        let id_blob = uuid_to_blob(&id);

        let sqlite_new = NewSqliteSignatureRequest {
            id: id_blob.clone(),
            document_id: uuid_to_blob(&new_request.document_id),
            signer_email: new_request.signer.email,
            signer_name: new_request.signer.name,
            signer_role: new_request.signer.role,
            access_token: new_request.access_token,
            status: RequestStatus::Pending.as_str().to_string(),
            signing_order: new_request.signing_order,
            expires_at: new_request
                .expires_at
                .map(|dt| super::models::datetime_to_string(&dt)),
            created_at: now.clone(),
            updated_at: now,
        };

        conn.interact(move |conn| {
            diesel::insert_into(signature_requests::table)
                .values(&sqlite_new)
                .execute(conn)
        })
        .await
        .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        let row: SqliteSignatureRequest = conn
            .interact(move |conn| signature_requests::table.find(id_blob).first(conn))
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(row.into())
    }

    /// Retrieves a signature request by its identifier.
    pub async fn get_by_id(&self, id: Uuid) -> Result<SignatureRequest, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(&id);
        let row: Option<SqliteSignatureRequest> = conn
            .interact(move |conn| {
                signature_requests::table
                    .find(id_blob)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        row.map(SignatureRequest::from).ok_or(LedgerError::NotFound)
    }

    /// Lists all signature requests for a document, oldest first.
    pub async fn list_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<SignatureRequest>, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let doc_blob = uuid_to_blob(&document_id);
        let rows: Vec<SqliteSignatureRequest> = conn
            .interact(move |conn| {
                signature_requests::table
                    .filter(signature_requests::document_id.eq(doc_blob))
                    .order(signature_requests::created_at.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(rows.into_iter().map(SignatureRequest::from).collect())
    }

    /// Marks a request as sent. Legal from `pending`; idempotent when
    /// already `sent`.
    pub async fn mark_sent(&self, id: Uuid) -> Result<SignatureRequest, LedgerError> {
        self.transition(id, |status, row| match status {
            RequestStatus::Pending => Ok(Some(RequestStatus::Sent)),
            RequestStatus::Sent => Ok(None),
            current => Err(LedgerError::InvalidState {
                request_id: blob_id(row),
                current,
                attempted: RequestStatus::Sent,
            }),
        })
        .await
    }

    /// Marks a request as viewed. Legal from `pending` and `sent`;
    /// idempotent when already `viewed`. Fails with `Expired` past the
    /// deadline regardless of stored status.
    pub async fn mark_viewed(&self, id: Uuid) -> Result<SignatureRequest, LedgerError> {
        self.transition(id, |status, row| {
            if deadline_passed(&row.expires_at)? && !status.is_terminal() {
                return Err(LedgerError::Expired {
                    request_id: blob_id(row),
                });
            }
            match status {
                RequestStatus::Pending | RequestStatus::Sent => Ok(Some(RequestStatus::Viewed)),
                RequestStatus::Viewed => Ok(None),
                current => Err(LedgerError::InvalidState {
                    request_id: blob_id(row),
                    current,
                    attempted: RequestStatus::Viewed,
                }),
            }
        })
        .await
    }

    /// Records a signature, transitioning the request to the `signed`
    /// terminal state.
    ///
    /// Legal from `pending`, `sent`, and `viewed`, and only before the
    /// deadline. `signed_at` and the audit metadata are written in the same
    /// transaction as the status flip.
    pub async fn record_signature(
        &self,
        id: Uuid,
        signature_data: String,
        signature_kind: SignatureKind,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<SignatureRequest, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(&id);
        let row: SqliteSignatureRequest = conn
            .interact(move |conn| {
                conn.transaction::<_, LedgerError, _>(|conn| {
                    let row: Option<SqliteSignatureRequest> = signature_requests::table
                        .find(&id_blob)
                        .first(conn)
                        .optional()?;
                    let row = row.ok_or(LedgerError::NotFound)?;

                    let status = parse_status(&row)?;
                    if status.is_terminal() {
                        return Err(LedgerError::InvalidState {
                            request_id: blob_id(&row),
                            current: status,
                            attempted: RequestStatus::Signed,
                        });
                    }
                    if deadline_passed(&row.expires_at)? {
                        return Err(LedgerError::Expired {
                            request_id: blob_id(&row),
                        });
                    }

                    let now = current_timestamp_string();
                    diesel::update(signature_requests::table.find(&id_blob))
                        .set((
                            signature_requests::status.eq(RequestStatus::Signed.as_str()),
                            signature_requests::signed_at.eq(Some(now.clone())),
                            signature_requests::signature_data.eq(Some(signature_data)),
                            signature_requests::signature_kind
                                .eq(Some(signature_kind.as_str().to_string())),
                            signature_requests::ip_address.eq(ip_address),
                            signature_requests::user_agent.eq(user_agent),
                            signature_requests::updated_at.eq(now),
                        ))
                        .execute(conn)?;

                    Ok(signature_requests::table.find(&id_blob).first(conn)?)
                })
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(row.into())
    }

    /// Records a decline, transitioning the request to the `declined`
    /// terminal state. The reason is mandatory and validated upstream.
    pub async fn record_decline(
        &self,
        id: Uuid,
        reason: String,
    ) -> Result<SignatureRequest, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(&id);
        let row: SqliteSignatureRequest = conn
            .interact(move |conn| {
                conn.transaction::<_, LedgerError, _>(|conn| {
                    let row: Option<SqliteSignatureRequest> = signature_requests::table
                        .find(&id_blob)
                        .first(conn)
                        .optional()?;
                    let row = row.ok_or(LedgerError::NotFound)?;

                    let status = parse_status(&row)?;
                    if status.is_terminal() {
                        return Err(LedgerError::InvalidState {
                            request_id: blob_id(&row),
                            current: status,
                            attempted: RequestStatus::Declined,
                        });
                    }
                    if deadline_passed(&row.expires_at)? {
                        return Err(LedgerError::Expired {
                            request_id: blob_id(&row),
                        });
                    }

                    let now = current_timestamp_string();
                    diesel::update(signature_requests::table.find(&id_blob))
                        .set((
                            signature_requests::status.eq(RequestStatus::Declined.as_str()),
                            signature_requests::declined_at.eq(Some(now.clone())),
                            signature_requests::decline_reason.eq(Some(reason)),
                            signature_requests::updated_at.eq(now),
                        ))
                        .execute(conn)?;

                    Ok(signature_requests::table.find(&id_blob).first(conn)?)
                })
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(row.into())
    }

    /// Applies a non-terminal status transition decided by `classify`.
    ///
    /// `classify` returns `Some(next)` to update, `None` for an idempotent
    /// no-op, or an error for an illegal transition. Runs inside one
    /// transaction.
    async fn transition<F>(&self, id: Uuid, classify: F) -> Result<SignatureRequest, LedgerError>
    where
        F: FnOnce(RequestStatus, &SqliteSignatureRequest) -> Result<Option<RequestStatus>, LedgerError>
            + Send
            + 'static,
    {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(&id);
        let row: SqliteSignatureRequest = conn
            .interact(move |conn| {
                conn.transaction::<_, LedgerError, _>(|conn| {
                    let row: Option<SqliteSignatureRequest> = signature_requests::table
                        .find(&id_blob)
                        .first(conn)
                        .optional()?;
                    let row = row.ok_or(LedgerError::NotFound)?;

                    let status = parse_status(&row)?;
                    if let Some(next) = classify(status, &row)? {
                        let now = current_timestamp_string();
                        diesel::update(signature_requests::table.find(&id_blob))
                            .set((
                                signature_requests::status.eq(next.as_str()),
                                signature_requests::updated_at.eq(now),
                            ))
                            .execute(conn)?;
                    }

                    Ok(signature_requests::table.find(&id_blob).first(conn)?)
                })
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(row.into())
    }
}

fn blob_id(row: &SqliteSignatureRequest) -> Uuid {
    super::models::blob_to_uuid(&row.id).expect("Invalid UUID in database")
}
