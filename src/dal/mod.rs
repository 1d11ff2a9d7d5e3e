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

//! Data Access Layer for the signature ledger.
//!
//! All SQL lives here. Domain types cross the boundary in both directions;
//! the SQLite row representations (BLOB UUIDs, RFC3339 TEXT timestamps,
//! INTEGER booleans) never leave this module.
//!
//! Status transitions that must be atomic (`record_signature`,
//! `record_decline`) run as load-classify-conditional-update inside a single
//! SQLite transaction, so two concurrent submissions for one request resolve
//! to exactly one winner.

pub mod models;
pub mod placement;
pub mod signature_request;

use crate::database::Database;
use placement::PlacementDAL;
use signature_request::SignatureRequestDAL;

/// Entry point for all ledger persistence operations.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Signature request operations.
    pub fn signature_requests(&self) -> SignatureRequestDAL<'_> {
        SignatureRequestDAL::new(self)
    }

    /// Placement operations.
    pub fn placements(&self) -> PlacementDAL<'_> {
        PlacementDAL::new(self)
    }
}
