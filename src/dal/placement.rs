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

//! Placement persistence operations.

use diesel::prelude::*;
use uuid::Uuid;

use super::models::{
    current_timestamp_string, uuid_to_blob, NewSqliteSignaturePlacement, SqliteSignaturePlacement,
};
use super::DAL;
use crate::database::schema::signature_placements;
use crate::error::LedgerError;
use crate::models::placement::{NewSignaturePlacement, SignaturePlacement};

/// Data access layer for placement operations.
#[derive(Clone)]
pub struct PlacementDAL<'a> {
    dal: &'a DAL,
}

impl<'a> PlacementDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new placement record.
    pub async fn create(
        &self,
        new_placement: NewSignaturePlacement,
    ) -> Result<SignaturePlacement, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id = Uuid::new_v4();
        let now = current_timestamp_string();
        let id_blob = uuid_to_blob(&id);

        let sqlite_new = NewSqliteSignaturePlacement {
            id: id_blob.clone(),
            document_id: uuid_to_blob(&new_placement.document_id),
            request_id: new_placement.request_id.map(|u| uuid_to_blob(&u)),
            page: new_placement.page as i32,
            x: new_placement.x,
            y: new_placement.y,
            width: new_placement.width,
            required: new_placement.required as i32,
            label: new_placement.label,
            created_at: now.clone(),
            updated_at: now,
        };

        conn.interact(move |conn| {
            diesel::insert_into(signature_placements::table)
                .values(&sqlite_new)
                .execute(conn)
        })
        .await
        .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        let row: SqliteSignaturePlacement = conn
            .interact(move |conn| signature_placements::table.find(id_blob).first(conn))
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(row.into())
    }

    /// Retrieves a placement by its identifier.
    pub async fn get_by_id(&self, id: Uuid) -> Result<SignaturePlacement, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(&id);
        let row: Option<SqliteSignaturePlacement> = conn
            .interact(move |conn| {
                signature_placements::table
                    .find(id_blob)
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        row.map(SignaturePlacement::from)
            .ok_or(LedgerError::NotFound)
    }

    /// Lists all placements for a document, oldest first.
    pub async fn list_for_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<SignaturePlacement>, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let doc_blob = uuid_to_blob(&document_id);
        let rows: Vec<SqliteSignaturePlacement> = conn
            .interact(move |conn| {
                signature_placements::table
                    .filter(signature_placements::document_id.eq(doc_blob))
                    .order(signature_placements::created_at.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(rows.into_iter().map(SignaturePlacement::from).collect())
    }

    /// Assigns a signature request to an existing placement.
    pub async fn assign_request(
        &self,
        placement_id: Uuid,
        request_id: Uuid,
    ) -> Result<SignaturePlacement, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(&placement_id);
        let request_blob = uuid_to_blob(&request_id);

        let updated = {
            let id_blob = id_blob.clone();
            conn.interact(move |conn| {
                diesel::update(signature_placements::table.find(&id_blob))
                    .set((
                        signature_placements::request_id.eq(Some(request_blob)),
                        signature_placements::updated_at.eq(current_timestamp_string()),
                    ))
                    .execute(conn)
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??
        };
        if updated == 0 {
            return Err(LedgerError::NotFound);
        }

        let row: SqliteSignaturePlacement = conn
            .interact(move |conn| signature_placements::table.find(id_blob).first(conn))
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        Ok(row.into())
    }
}
