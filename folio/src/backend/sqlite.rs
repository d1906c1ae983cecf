use super::{merge_patch, validate_order_field, Direction, DocumentBackend, MigrationRecord, OrderBy};
use crate::document::RawDocument;
use crate::error::{FolioError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite backend: every collection lives in one `documents` table with a JSON
/// data column. `seq` preserves insertion order for unordered reads.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = SqliteBackend { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = SqliteBackend { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                data_json TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

            CREATE TABLE IF NOT EXISTS migrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed-width so that text ordering matches chronological ordering
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| FolioError::Backend(format!("Bad timestamp '{raw}': {e}")))
}

/// Raw row as read from the table, decoded after the statement finishes
struct DocumentRow {
    id: String,
    created_at: String,
    updated_at: String,
    data_json: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DocumentRow {
            id: row.get(0)?,
            created_at: row.get(1)?,
            updated_at: row.get(2)?,
            data_json: row.get(3)?,
        })
    }

    fn into_document(self) -> Result<RawDocument> {
        Ok(RawDocument {
            id: self.id,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            data: serde_json::from_str(&self.data_json)?,
        })
    }
}

impl DocumentBackend for SqliteBackend {
    fn insert(&self, collection: &str, doc: &RawDocument) -> Result<()> {
        let data_json = serde_json::to_string(&doc.data)?;
        self.conn.execute(
            "INSERT INTO documents (collection, id, created_at, updated_at, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                collection,
                doc.id,
                format_timestamp(&doc.created_at),
                format_timestamp(&doc.updated_at),
                data_json
            ],
        )?;
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, created_at, updated_at, data_json FROM documents
                 WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                DocumentRow::from_row,
            )
            .optional()?;
        row.map(DocumentRow::into_document).transpose()
    }

    fn get_all(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<RawDocument>> {
        let order_clause = match order {
            None => "seq ASC".to_string(),
            Some(order) => {
                validate_order_field(&order.field)?;
                let column = match order.field.as_str() {
                    "createdAt" => "created_at".to_string(),
                    "updatedAt" => "updated_at".to_string(),
                    field => format!("json_extract(data_json, '$.{field}')"),
                };
                let direction = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{column} {direction}, seq ASC")
            }
        };

        let sql = format!(
            "SELECT id, created_at, updated_at, data_json FROM documents
             WHERE collection = ?1 ORDER BY {order_clause}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![collection], DocumentRow::from_row)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?.into_document()?);
        }
        Ok(docs)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut doc = self
            .get(collection, id)?
            .ok_or_else(|| FolioError::not_found(collection, id))?;
        merge_patch(&mut doc.data, patch);

        let data_json = serde_json::to_string(&doc.data)?;
        self.conn.execute(
            "UPDATE documents SET data_json = ?1, updated_at = ?2
             WHERE collection = ?3 AND id = ?4",
            params![data_json, format_timestamp(&updated_at), collection, id],
        )?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        if deleted == 0 {
            return Err(FolioError::not_found(collection, id));
        }
        Ok(())
    }

    fn collections(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    fn record_migration(&self, description: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO migrations (description, applied_at) VALUES (?1, ?2)",
            params![description, format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    fn migration_history(&self) -> Result<Vec<MigrationRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT description, applied_at FROM migrations ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut history = Vec::new();
        for row in rows {
            let (description, applied_at) = row?;
            history.push(MigrationRecord {
                description,
                applied_at: parse_timestamp(&applied_at)?,
            });
        }
        Ok(history)
    }
}
