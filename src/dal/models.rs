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

//! SQLite row models for the ledger tables.
//!
//! UUIDs are stored as BLOB (Vec<u8>), timestamps as TEXT (RFC3339 strings),
//! and booleans as INTEGER (0/1). These models are internal to the DAL and
//! converted to/from domain types at the DAL boundary.

use crate::database::schema::*;
use diesel::prelude::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::placement::SignaturePlacement;
use crate::models::signature_request::{RequestStatus, SignatureKind, SignatureRequest};

// ============================================================================
// Signature Request Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = signature_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteSignatureRequest {
    pub id: Vec<u8>,
    pub document_id: Vec<u8>,
    pub signer_email: String,
    pub signer_name: String,
    pub signer_role: String,
    pub access_token: String,
    pub status: String,
    pub signing_order: Option<i32>,
    pub expires_at: Option<String>,
    pub signed_at: Option<String>,
    pub declined_at: Option<String>,
    pub decline_reason: Option<String>,
    pub signature_data: Option<String>,
    pub signature_kind: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = signature_requests)]
pub struct NewSqliteSignatureRequest {
    pub id: Vec<u8>,
    pub document_id: Vec<u8>,
    pub signer_email: String,
    pub signer_name: String,
    pub signer_role: String,
    pub access_token: String,
    pub status: String,
    pub signing_order: Option<i32>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// Placement Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = signature_placements)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteSignaturePlacement {
    pub id: Vec<u8>,
    pub document_id: Vec<u8>,
    pub request_id: Option<Vec<u8>>,
    pub page: i32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub required: i32,
    pub label: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = signature_placements)]
pub struct NewSqliteSignaturePlacement {
    pub id: Vec<u8>,
    pub document_id: Vec<u8>,
    pub request_id: Option<Vec<u8>>,
    pub page: i32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub required: i32,
    pub label: String,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// Conversion Utilities
// ============================================================================

/// Convert a UUID to SQLite BLOB format (Vec<u8>)
pub fn uuid_to_blob(uuid: &Uuid) -> Vec<u8> {
    uuid.as_bytes().to_vec()
}

/// Convert SQLite BLOB format back to a UUID
pub fn blob_to_uuid(blob: &[u8]) -> Result<Uuid, String> {
    Uuid::from_slice(blob).map_err(|e| format!("Invalid UUID blob: {}", e))
}

/// Convert a DateTime to SQLite TEXT format (RFC3339)
pub fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Convert SQLite TEXT format back to a DateTime
pub fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp '{}': {}", s, e))
}

/// Current timestamp in SQLite TEXT format
pub fn current_timestamp_string() -> String {
    datetime_to_string(&Utc::now())
}

// ============================================================================
// Domain Conversions
// ============================================================================

impl From<SqliteSignatureRequest> for SignatureRequest {
    fn from(row: SqliteSignatureRequest) -> Self {
        SignatureRequest {
            id: blob_to_uuid(&row.id).expect("Invalid UUID in database"),
            document_id: blob_to_uuid(&row.document_id).expect("Invalid UUID in database"),
            signer_email: row.signer_email,
            signer_name: row.signer_name,
            signer_role: row.signer_role,
            access_token: row.access_token,
            status: RequestStatus::parse(&row.status).expect("Invalid status in database"),
            signing_order: row.signing_order,
            expires_at: row
                .expires_at
                .map(|s| string_to_datetime(&s).expect("Invalid timestamp in database")),
            signed_at: row
                .signed_at
                .map(|s| string_to_datetime(&s).expect("Invalid timestamp in database")),
            declined_at: row
                .declined_at
                .map(|s| string_to_datetime(&s).expect("Invalid timestamp in database")),
            decline_reason: row.decline_reason,
            signature_data: row.signature_data,
            signature_kind: row
                .signature_kind
                .map(|s| SignatureKind::parse(&s).expect("Invalid signature kind in database")),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: string_to_datetime(&row.created_at).expect("Invalid timestamp in database"),
            updated_at: string_to_datetime(&row.updated_at).expect("Invalid timestamp in database"),
        }
    }
}

impl From<SqliteSignaturePlacement> for SignaturePlacement {
    fn from(row: SqliteSignaturePlacement) -> Self {
        SignaturePlacement {
            id: blob_to_uuid(&row.id).expect("Invalid UUID in database"),
            document_id: blob_to_uuid(&row.document_id).expect("Invalid UUID in database"),
            request_id: row
                .request_id
                .map(|b| blob_to_uuid(&b).expect("Invalid UUID in database")),
            page: row.page as u32,
            x: row.x,
            y: row.y,
            width: row.width,
            required: row.required != 0,
            label: row.label,
            created_at: string_to_datetime(&row.created_at).expect("Invalid timestamp in database"),
            updated_at: string_to_datetime(&row.updated_at).expect("Invalid timestamp in database"),
        }
    }
}
