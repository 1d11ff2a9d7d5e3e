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

//! SQLite connection pool for the ledger.
//!
//! Provides an async connection pool via `deadpool-diesel`. The pool is
//! capped at a single connection: SQLite has limited concurrent write
//! support even with WAL mode, and a single connection serializes writes
//! instead of surfacing "database is locked" errors. Status transitions
//! rely on this serialization for their atomicity.
//!
//! # Example
//!
//! ```rust,no_run
//! use countersign::Database;
//!
//! # async fn example() {
//! let db = Database::new("signatures.db");
//! db.run_migrations().await.expect("migrations failed");
//! # }
//! ```

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use tracing::info;

/// A shared handle to the SQLite connection pool.
///
/// `Database` is `Clone`; each clone references the same underlying pool
/// and can be handed to the DAL, the ledger, and test fixtures freely.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a new connection pool for the given SQLite location.
    ///
    /// Accepts a file path, `:memory:`, a `file:` URI (e.g.
    /// `file:test?mode=memory&cache=shared`), or a `sqlite://`-prefixed
    /// path.
    ///
    /// # Panics
    ///
    /// Panics if the connection pool cannot be created.
    pub fn new(connection_string: &str) -> Self {
        let connection_url = Self::build_sqlite_url(connection_string);
        let manager = Manager::new(connection_url, Runtime::Tokio1);
        // SQLite has limited concurrent write support even with WAL mode.
        // A single connection avoids "database is locked" errors.
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: 1)");

        Self { pool }
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    /// Gets a pooled connection.
    pub async fn get_connection(
        &self,
    ) -> Result<
        deadpool::managed::Object<Manager>,
        deadpool::managed::PoolError<deadpool_diesel::Error>,
    > {
        self.pool.get().await
    }

    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending migrations, setting concurrency pragmas first.
    pub async fn run_migrations(&self) -> Result<(), String> {
        use diesel_migrations::MigrationHarness;

        let conn = self.pool.get().await.map_err(|e| e.to_string())?;
        conn.interact(|conn| {
            use diesel::prelude::*;

            // WAL mode allows concurrent reads during writes
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| format!("Failed to set WAL mode: {}", e))?;
            // busy_timeout makes SQLite wait 30s instead of immediately failing on locks
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| format!("Failed to set busy_timeout: {}", e))?;

            conn.run_pending_migrations(crate::database::MIGRATIONS)
                .map(|_| ())
                .map_err(|e| format!("Failed to run migrations: {}", e))
        })
        .await
        .map_err(|e| format!("Failed to run migrations: {}", e))??;

        Ok(())
    }
}
