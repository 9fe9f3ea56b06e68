//! SQLite-backed key-value store.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::store::{KeyValueStore, StoreError, schema};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::records)]
struct Record {
    #[allow(dead_code)]
    key: String,
    value: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = schema::records)]
struct NewRecord<'a> {
    key: &'a str,
    value: &'a str,
    updated_at: chrono::NaiveDateTime,
}

/// Key-value store persisted in a single `records` table.
///
/// One connection is held for the lifetime of the store so that
/// `":memory:"` databases survive between calls.
pub struct SqliteStore {
    db_path: String,
    conn: Mutex<SqliteConnection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens the database at `db_path` and applies pending migrations.
    ///
    /// Use `":memory:"` for an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path))]
    pub fn open(db_path: impl Into<String>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        let mut conn = SqliteConnection::establish(&db_path)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::backend(format!("Migration failed: {e}")))?;
        info!(path = %db_path, migrations = applied.len(), "Opened SQLite store");
        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    /// Path the store was opened with.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

impl KeyValueStore for SqliteStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.lock();
        let record = schema::records::table
            .filter(schema::records::key.eq(key))
            .select(Record::as_select())
            .first(&mut *conn)
            .optional()?;
        debug!(found = record.is_some(), "Record lookup");
        Ok(record.map(|r| r.value))
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let record = NewRecord {
            key,
            value,
            updated_at: chrono::Utc::now().naive_utc(),
        };
        diesel::replace_into(schema::records::table)
            .values(&record)
            .execute(&mut *conn)?;
        debug!("Record written");
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let deleted = diesel::delete(schema::records::table.filter(schema::records::key.eq(key)))
            .execute(&mut *conn)?;
        debug!(deleted, "Record removed");
        Ok(())
    }
}
