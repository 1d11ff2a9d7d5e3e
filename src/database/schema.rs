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

//! Diesel schema for the SQLite ledger.
//!
//! UUIDs are stored as BLOB, timestamps as RFC3339 TEXT, and booleans as
//! INTEGER (0/1), matching the migration DDL.

diesel::table! {
    signature_requests (id) {
        id -> Binary,
        document_id -> Binary,
        signer_email -> Text,
        signer_name -> Text,
        signer_role -> Text,
        access_token -> Text,
        status -> Text,
        signing_order -> Nullable<Integer>,
        expires_at -> Nullable<Text>,
        signed_at -> Nullable<Text>,
        declined_at -> Nullable<Text>,
        decline_reason -> Nullable<Text>,
        signature_data -> Nullable<Text>,
        signature_kind -> Nullable<Text>,
        ip_address -> Nullable<Text>,
        user_agent -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    signature_placements (id) {
        id -> Binary,
        document_id -> Binary,
        request_id -> Nullable<Binary>,
        page -> Integer,
        x -> Double,
        y -> Double,
        width -> Double,
        required -> Integer,
        label -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(signature_requests, signature_placements);
