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

//! Signature Request Model
//!
//! A signature request is the durable record of one signer's invitation to
//! sign one document: identity, bearer token, status, and audit timestamps.
//! Requests are never deleted; they are the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored lifecycle states of a signature request.
///
/// `Expired` is a read-time classification derived from `expires_at`; it is
/// never written to storage, so a late write cannot resurrect a request past
/// its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Sent,
    Viewed,
    Signed,
    Declined,
    Expired,
}

impl RequestStatus {
    /// The storage representation. `Expired` is never stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Sent => "sent",
            RequestStatus::Viewed => "viewed",
            RequestStatus::Signed => "signed",
            RequestStatus::Declined => "declined",
            RequestStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "sent" => Some(RequestStatus::Sent),
            "viewed" => Some(RequestStatus::Viewed),
            "signed" => Some(RequestStatus::Signed),
            "declined" => Some(RequestStatus::Declined),
            "expired" => Some(RequestStatus::Expired),
            _ => None,
        }
    }

    /// Terminal states permit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Signed | RequestStatus::Declined)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the signer produced the signature image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    Drawn,
    Typed,
    Uploaded,
}

impl SignatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureKind::Drawn => "drawn",
            SignatureKind::Typed => "typed",
            SignatureKind::Uploaded => "uploaded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "drawn" => Some(SignatureKind::Drawn),
            "typed" => Some(SignatureKind::Typed),
            "uploaded" => Some(SignatureKind::Uploaded),
            _ => None,
        }
    }
}

/// Identity of the party asked to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub email: String,
    pub name: String,
    pub role: String,
}

impl Signer {
    /// Creates a signer with the default `signer` role.
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Signer {
            email: email.into(),
            name: name.into(),
            role: "signer".to_string(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

/// A signature request record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRequest {
    /// Unique identifier for the request
    pub id: Uuid,
    /// Reference to the target document (external entity)
    pub document_id: Uuid,
    /// Email address of the signer
    pub signer_email: String,
    /// Display name of the signer
    pub signer_name: String,
    /// Role of the signer, e.g. "signer", "witness"
    pub signer_role: String,
    /// High-entropy bearer token granting signing access without a session.
    /// Must never appear in logs at INFO level or above.
    pub access_token: String,
    /// Stored status; use the ledger's effective-status predicate for reads
    pub status: RequestStatus,
    /// Position in a sequential multi-signer workflow; `None` means parallel
    pub signing_order: Option<i32>,
    /// Deadline after which the request reads as expired
    pub expires_at: Option<DateTime<Utc>>,
    /// Set exactly once, on the signed terminal transition
    pub signed_at: Option<DateTime<Utc>>,
    /// Set exactly once, on the declined terminal transition
    pub declined_at: Option<DateTime<Utc>>,
    /// Reason supplied by a declining signer
    pub decline_reason: Option<String>,
    /// Captured signature image, base64-encoded
    pub signature_data: Option<String>,
    /// How the signature image was produced
    pub signature_kind: Option<SignatureKind>,
    /// Signer IP captured at signing time (non-authoritative audit metadata)
    pub ip_address: Option<String>,
    /// Signer user agent captured at signing time
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new signature request.
#[derive(Debug, Clone)]
pub struct NewSignatureRequest {
    pub document_id: Uuid,
    pub signer: Signer,
    pub access_token: String,
    pub signing_order: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}
